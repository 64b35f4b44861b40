//! 消息与生成记录
//!
//! - **message**: Role / FunctionCall / Message（OpenAI 兼容格式）
//! - **transcript**: 单次 overthink 内只追加的消息序列

pub mod message;
pub mod transcript;

pub use message::{FunctionCall, Message, Role};
pub use transcript::Transcript;
