//! 可插拔能力：think（产生下一条 assistant 消息）与 output（消费最终生成记录）
//!
//! 核心不对 think 施加重试或超时策略；基于网络 API 的实现自行负责重试与退避。

use std::sync::Arc;

use async_trait::async_trait;

use crate::actions::{CallSpecification, Context};
use crate::memory::Message;

/// 推理能力：根据完整 prompt 与可用动作规范，给出下一条消息（文本或 function_call）
#[async_trait]
pub trait Think: Send + Sync {
    async fn think(
        &self,
        prompt: &[Message],
        functions: &[CallSpecification],
    ) -> Result<Message, String>;
}

/// 输出能力：overthink 返回前的最后一个钩子（如发送到聊天频道）
#[async_trait]
pub trait Output: Send + Sync {
    async fn output(&self, generated: &[Message], context: &Context) -> Result<(), String>;
}

#[async_trait]
impl<T: Think + ?Sized> Think for Arc<T> {
    async fn think(
        &self,
        prompt: &[Message],
        functions: &[CallSpecification],
    ) -> Result<Message, String> {
        (**self).think(prompt, functions).await
    }
}

#[async_trait]
impl<T: Output + ?Sized> Output for Arc<T> {
    async fn output(&self, generated: &[Message], context: &Context) -> Result<(), String> {
        (**self).output(generated, context).await
    }
}
