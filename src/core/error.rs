//! Agent 错误类型与调用失败策略
//!
//! SchemaError 在注册时即返回；ArgumentDecodeError 与未注册动作在循环内本地恢复；
//! ActionInvocationError 的去向由 InvocationErrorPolicy 决定（观察或上抛）。

use thiserror::Error;

/// 动作签名无法推导为调用规范（注册时报错，不会延迟到调用时）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Action has no resolvable name")]
    MissingName,

    #[error("Duplicate parameter '{param}' in action '{action}'")]
    DuplicateParameter { action: String, param: String },

    #[error("Action '{0}' declares more than one context parameter")]
    MultipleContextParameters(String),

    #[error("Unsupported signature shape for '{action}': {reason}")]
    UnsupportedShape { action: String, reason: String },
}

/// 推理能力返回的 function_call.arguments 不是合法的 JSON 对象
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed arguments for '{action}': {detail}")]
pub struct ArgumentDecodeError {
    pub action: String,
    pub arguments: String,
    pub detail: String,
}

/// 动作本身执行失败（返回 Err 或 panic，异步与阻塞动作一致）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Action '{action}' failed: {message}")]
pub struct ActionInvocationError {
    pub action: String,
    pub message: String,
}

/// overthink 过程中向调用方返回的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    ActionInvocation(#[from] ActionInvocationError),

    #[error("Think failed: {0}")]
    Think(String),

    #[error("Output failed: {0}")]
    Output(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// 动作执行失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationErrorPolicy {
    /// 将 "error: <message>" 作为 function 结果写回，让模型下一轮自行修正
    #[default]
    Observe,
    /// 终止循环并把错误返回给 overthink 调用方
    Propagate,
}
