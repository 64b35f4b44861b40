//! 能力层：think / output 抽象与 Mock 实现

pub mod mock;
pub mod traits;

pub use mock::{CollectingOutput, LogOutput, MockThink, HARDCODED_REPLY};
pub use traits::{Output, Think};
