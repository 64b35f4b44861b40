//! overthink 过程事件：用于向前端推送每一轮的思考、动作调用与观察

use serde::Serialize;

use crate::react::TerminalReason;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverthinkEvent {
    /// 进入新的一轮
    Round { depth: usize, max_depth: usize },
    /// 正在调用 think
    Thinking,
    /// 调用动作
    ActionCall {
        action: String,
        arguments: serde_json::Value,
    },
    /// 动作返回（预览，避免过长）
    Observation { action: String, preview: String },
    /// 本地恢复的失败（参数解码失败、不可用动作、被捕获的动作错误）
    ActionFailure { action: String, reason: String },
    /// 循环结束
    Terminal { depth: usize, reason: TerminalReason },
}
