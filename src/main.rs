//! Overthink 演示程序
//!
//! 入口：加载配置、初始化日志，注册 emoji_reaction，用 Mock think 跑一次 overthink 并输出生成记录。

use std::sync::Arc;

use anyhow::Context as _;
use overthink::actions::{emoji_reaction, EMOJI_REACTION};
use overthink::llm::{LogOutput, MockThink};
use overthink::{observability, Agent, AgentConfig, Context, Message};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config = AgentConfig::load(None).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config load failed, using defaults");
        AgentConfig::default()
    });

    let think = Arc::new(MockThink::scripted(vec![Message::function_call(
        EMOJI_REACTION,
        r#"{"emoji":"👍"}"#,
    )]));
    let agent = Agent::with_actions(
        config,
        think,
        Arc::new(LogOutput),
        [emoji_reaction()],
    )
    .context("Failed to register actions")?;

    let messages = vec![
        Message::user("@nombo> Yeah, i think so"),
        Message::user("@molly> @assistant, please emoji react?"),
    ];
    let result = agent
        .overthink(messages, Context::new().with("channel", 999))
        .await
        .context("overthink failed")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to serialize result")?
    );
    Ok(())
}
