//! emoji_reaction 动作（演示与测试用）
//!
//! 模拟给用户消息加表情；stop 为 true 时不返回结果，直接结束本轮。

use anyhow::anyhow;
use serde_json::Value;

use crate::actions::schema::{describe, ParamType, Parameter, Signature};
use crate::actions::Action;

pub const EMOJI_REACTION: &str = "emoji_reaction";

pub fn emoji_reaction() -> Action {
    let signature = Signature::new(EMOJI_REACTION)
        .param(Parameter::required("emoji", ParamType::String))
        .param(Parameter::optional("stop", ParamType::Boolean, false));

    Action::new(signature, |_ctx, args| async move {
        let Some(emoji) = args.get("emoji").and_then(Value::as_str) else {
            return Err(anyhow!("missing emoji"));
        };
        let stop = args.get("stop").and_then(Value::as_bool).unwrap_or(false);
        let reaction = format!("AI is feeling {emoji}");
        tracing::info!(%reaction, "emoji reaction");
        Ok((!stop).then(|| Value::String(reaction)))
    })
    .describe(
        describe(
            "Sometimes the only right answer is a reaction, \
             call to add an emoji to the user's message.",
        )
        .param(
            "emoji",
            "A single emoji representing emotional reaction, avoid using the flags and transport emojis.",
        )
        .param("stop", "Signals that the reaction is the end of response"),
    )
}
