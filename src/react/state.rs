//! overthink 状态机
//!
//! Reasoning(d) -> [Acting(d, call)] -> Reasoning(d+1) ... -> Terminal(reason)

use serde::{Deserialize, Serialize};

use crate::memory::FunctionCall;

/// 循环终止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// 已到最大深度，本轮请求的动作不再执行
    MaxDepth,
    /// 模型给出最终回复，或请求了不可用的动作，或参数无法解码
    FinalAnswer,
    /// 动作没有返回值
    NullActionResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Reasoning { depth: usize },
    Acting { depth: usize, call: FunctionCall },
    Terminal { depth: usize, reason: TerminalReason },
}
