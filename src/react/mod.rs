//! 认知层：overthink 状态机、过程事件与主循环

pub mod events;
pub mod loop_;
pub mod state;

pub use events::OverthinkEvent;
pub use loop_::{Agent, AgentConfig, OverthinkResult, OverthinkSession};
pub use state::{Phase, TerminalReason};
