//! Overthink - 函数调用智能体的 think → act → observe 循环
//!
//! 模块划分：
//! - **actions**: 动作签名与调用规范推导、注册表、执行器（上下文注入、阻塞动作线程池）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类与动作失败处理策略
//! - **llm**: think / output 能力抽象与 Mock 实现
//! - **memory**: 消息与生成记录
//! - **observability**: 日志初始化
//! - **react**: overthink 状态机与主循环

pub mod actions;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;

pub use crate::actions::{describe, Action, ActionRegistry, CallSpecification, Context, Describe};
pub use crate::core::AgentError;
pub use crate::memory::{Message, Role};
pub use crate::react::{Agent, AgentConfig, OverthinkResult, OverthinkSession, TerminalReason};
