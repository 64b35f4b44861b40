//! 核心层：错误分类与调用失败策略

pub mod error;

pub use error::{
    ActionInvocationError, AgentError, ArgumentDecodeError, InvocationErrorPolicy, SchemaError,
};
