//! Mock 能力（用于测试与演示，无需 API）
//!
//! MockThink 按脚本依次返回消息，脚本用尽后返回固定回复；CollectingOutput 收集每次输出，
//! LogOutput 把生成记录逐条写入日志。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::actions::{CallSpecification, Context};
use crate::llm::{Output, Think};
use crate::memory::Message;

/// 脚本用尽后的默认回复
pub const HARDCODED_REPLY: &str = "I'm hardcoded, i don't know";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock 推理：先消费脚本，再重复 fallback
#[derive(Debug)]
pub struct MockThink {
    script: Mutex<VecDeque<Message>>,
    fallback: Message,
    calls: AtomicUsize,
    last_prompt: Mutex<Vec<Message>>,
    last_functions: Mutex<Vec<CallSpecification>>,
}

impl Default for MockThink {
    fn default() -> Self {
        Self::hardcoded(HARDCODED_REPLY)
    }
}

impl MockThink {
    fn with(script: Vec<Message>, fallback: Message) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(Vec::new()),
            last_functions: Mutex::new(Vec::new()),
        }
    }

    /// 永远回复同一段文本
    pub fn hardcoded(reply: impl Into<String>) -> Self {
        Self::with(Vec::new(), Message::assistant(reply))
    }

    /// 永远请求调用同一个动作
    pub fn always_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::with(Vec::new(), Message::function_call(name, arguments))
    }

    /// 依次返回脚本中的消息，用尽后返回 HARDCODED_REPLY
    pub fn scripted(script: Vec<Message>) -> Self {
        Self::with(script, Message::assistant(HARDCODED_REPLY))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Vec<Message> {
        lock(&self.last_prompt).clone()
    }

    pub fn last_functions(&self) -> Vec<CallSpecification> {
        lock(&self.last_functions).clone()
    }
}

#[async_trait]
impl Think for MockThink {
    async fn think(
        &self,
        prompt: &[Message],
        functions: &[CallSpecification],
    ) -> Result<Message, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_prompt) = prompt.to_vec();
        *lock(&self.last_functions) = functions.to_vec();
        let next = lock(&self.script).pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

/// 收集每次 output 调用的生成记录与上下文
#[derive(Debug, Default)]
pub struct CollectingOutput {
    outputs: Mutex<Vec<(Vec<Message>, Context)>>,
}

impl CollectingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outputs(&self) -> Vec<(Vec<Message>, Context)> {
        lock(&self.outputs).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.outputs).len()
    }
}

#[async_trait]
impl Output for CollectingOutput {
    async fn output(&self, generated: &[Message], context: &Context) -> Result<(), String> {
        lock(&self.outputs).push((generated.to_vec(), context.clone()));
        Ok(())
    }
}

/// 把生成记录逐条写入 info 日志
#[derive(Debug, Default)]
pub struct LogOutput;

#[async_trait]
impl Output for LogOutput {
    async fn output(&self, generated: &[Message], context: &Context) -> Result<(), String> {
        for m in generated {
            let line = serde_json::to_string(m).map_err(|e| e.to_string())?;
            tracing::info!(message = %line, "out>");
        }
        tracing::info!(context = %serde_json::Value::Object(context.as_map().clone()), "output done");
        Ok(())
    }
}
