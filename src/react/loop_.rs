//! overthink 主循环
//!
//! Think -> (可选) Act -> Observe -> 下一轮 Think，直到模型给出最终回复、动作无返回值或达到最大深度。
//! 轮次用显式循环驱动，(depth, transcript) 作为可变状态，调用栈不随 max_depth 增长。
//!
//! 深度约定：max_depth 限制的是「执行动作的轮数」。depth == max_depth 的一轮仍会 think 一次，
//! 若该轮请求动作则不执行，以 MaxDepth 结束；因此 max_depth = 0 时恰好 think 一次、不执行动作。

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::actions::{
    decode_arguments, Action, ActionInvoker, ActionRegistry, CallSpecification, Context,
    Observation,
};
use crate::config::{load_config, AppConfig, DEFAULT_MAX_DEPTH, DEFAULT_SYSTEM_PROMPT};
use crate::core::{AgentError, InvocationErrorPolicy};
use crate::llm::{Output, Think};
use crate::memory::{FunctionCall, Message, Transcript};
use crate::react::{OverthinkEvent, Phase, TerminalReason};

/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// Agent 配置；构造后不可变
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub system_prompt: String,
    pub max_depth: usize,
    pub disabled_actions: HashSet<String>,
    pub error_policy: InvocationErrorPolicy,
    pub worker_threads: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            disabled_actions: HashSet::new(),
            error_policy: InvocationErrorPolicy::default(),
            worker_threads: crate::actions::executor::DEFAULT_WORKER_THREADS,
        }
    }
}

impl AgentConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            system_prompt: cfg.agent.system_prompt.clone(),
            max_depth: cfg.agent.max_depth,
            disabled_actions: cfg.agent.disabled_actions.iter().cloned().collect(),
            error_policy: cfg.actions.error_policy,
            worker_threads: cfg.actions.worker_threads,
        }
    }

    /// 从配置文件与环境变量加载
    pub fn load(config_path: Option<std::path::PathBuf>) -> Result<Self, AgentError> {
        let cfg = load_config(config_path).map_err(|e| AgentError::ConfigError(e.to_string()))?;
        Ok(Self::from_app_config(&cfg))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn disable_action(mut self, name: impl Into<String>) -> Self {
        self.disabled_actions.insert(name.into());
        self
    }

    pub fn with_error_policy(mut self, policy: InvocationErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n;
        self
    }
}

/// overthink 返回值：透传的上下文、到达的深度、原始历史与完整生成记录
#[derive(Debug, Clone, Serialize)]
pub struct OverthinkResult {
    pub context: Context,
    pub depth: usize,
    pub messages: Vec<Message>,
    pub generated: Vec<Message>,
    pub terminal: TerminalReason,
}

/// 单次 overthink 的可选项：取消令牌与事件通道
#[derive(Default, Clone)]
pub struct OverthinkSession {
    pub cancel_token: CancellationToken,
    pub event_tx: Option<UnboundedSender<OverthinkEvent>>,
}

impl OverthinkSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<OverthinkEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send(&self, ev: OverthinkEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    fn check_cancelled(&self) -> Result<(), AgentError> {
        if self.cancel_token.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        Ok(())
    }
}

/// 递归控制器：持有配置、动作注册表、执行器与 think / output 能力
///
/// 动作注册需要 `&mut self`；注册完成后可放入 `Arc` 供多个会话并发调用 overthink。
pub struct Agent {
    config: AgentConfig,
    registry: ActionRegistry,
    invoker: ActionInvoker,
    think: Arc<dyn Think>,
    output: Arc<dyn Output>,
}

impl Agent {
    pub fn new(config: AgentConfig, think: Arc<dyn Think>, output: Arc<dyn Output>) -> Self {
        let invoker = ActionInvoker::new(config.worker_threads);
        Self {
            config,
            registry: ActionRegistry::new(),
            invoker,
            think,
            output,
        }
    }

    /// 构造并一次性注册初始动作；任一签名不可用即返回 AgentError::Schema
    pub fn with_actions(
        config: AgentConfig,
        think: Arc<dyn Think>,
        output: Arc<dyn Output>,
        actions: impl IntoIterator<Item = Action>,
    ) -> Result<Self, AgentError> {
        let mut agent = Self::new(config, think, output);
        for action in actions {
            agent.add_action(action)?;
        }
        tracing::info!(actions = ?agent.registry.names(), "agent ready");
        Ok(agent)
    }

    pub fn add_action(&mut self, action: Action) -> Result<CallSpecification, AgentError> {
        let spec = self.registry.register(action)?;
        tracing::debug!(action = %spec.name, "action registered");
        Ok(spec)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn invoker(&self) -> &ActionInvoker {
        &self.invoker
    }

    /// 提供给 think 的动作规范：注册顺序，排除已禁用的动作
    pub fn functions_spec(&self) -> Vec<CallSpecification> {
        self.registry
            .list_specifications()
            .into_iter()
            .filter(|s| !self.config.disabled_actions.contains(&s.name))
            .collect()
    }

    fn is_available(&self, name: &str) -> bool {
        self.registry.contains(name) && !self.config.disabled_actions.contains(name)
    }

    fn build_prompt(&self, history: &[Message], transcript: &Transcript) -> Vec<Message> {
        let mut prompt = Vec::with_capacity(1 + history.len() + transcript.len());
        prompt.push(Message::system(self.config.system_prompt.clone()));
        prompt.extend_from_slice(history);
        prompt.extend_from_slice(transcript.messages());
        prompt
    }

    pub async fn overthink(
        &self,
        messages: Vec<Message>,
        context: Context,
    ) -> Result<OverthinkResult, AgentError> {
        self.overthink_with(messages, context, &OverthinkSession::new())
            .await
    }

    /// 执行 overthink；取消令牌在每轮开始前与 think 返回后检查，取消后不再调用 output
    pub async fn overthink_with(
        &self,
        messages: Vec<Message>,
        context: Context,
        session: &OverthinkSession,
    ) -> Result<OverthinkResult, AgentError> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("overthink", %run_id);
        self.run(messages, context, session).instrument(span).await
    }

    async fn run(
        &self,
        messages: Vec<Message>,
        context: Context,
        session: &OverthinkSession,
    ) -> Result<OverthinkResult, AgentError> {
        let functions = self.functions_spec();
        let mut transcript = Transcript::new();
        let mut phase = Phase::Reasoning { depth: 0 };

        let (depth, reason) = loop {
            phase = match phase {
                Phase::Reasoning { depth } => {
                    session.check_cancelled()?;
                    session.send(OverthinkEvent::Round {
                        depth,
                        max_depth: self.config.max_depth,
                    });
                    tracing::debug!(depth, ?context, "overthink round");

                    let prompt = self.build_prompt(&messages, &transcript);
                    session.send(OverthinkEvent::Thinking);
                    let reply = self
                        .think
                        .think(&prompt, &functions)
                        .await
                        .map_err(AgentError::Think)?;
                    session.check_cancelled()?;

                    transcript.push(reply);
                    let call = transcript.last().and_then(|m| m.function_call.clone());
                    self.after_think(depth, call, session)
                }
                Phase::Acting { depth, call } => {
                    self.act(depth, call, &context, &mut transcript, session)
                        .await?
                }
                Phase::Terminal { depth, reason } => break (depth, reason),
            };
        };

        tracing::info!(depth, ?reason, generated = transcript.len(), "end of thought");
        session.send(OverthinkEvent::Terminal { depth, reason });
        self.output
            .output(transcript.messages(), &context)
            .await
            .map_err(AgentError::Output)?;

        Ok(OverthinkResult {
            context,
            depth,
            messages,
            generated: transcript.into_messages(),
            terminal: reason,
        })
    }

    /// 根据 think 结果决定下一状态
    fn after_think(
        &self,
        depth: usize,
        call: Option<FunctionCall>,
        session: &OverthinkSession,
    ) -> Phase {
        let Some(call) = call else {
            return Phase::Terminal {
                depth,
                reason: TerminalReason::FinalAnswer,
            };
        };

        if !self.is_available(&call.name) {
            tracing::warn!(
                action = %call.name,
                arguments = %call.arguments,
                disabled = self.config.disabled_actions.contains(&call.name),
                "requested action unavailable, ending as final answer"
            );
            session.send(OverthinkEvent::ActionFailure {
                action: call.name,
                reason: "action unavailable".to_string(),
            });
            return Phase::Terminal {
                depth,
                reason: TerminalReason::FinalAnswer,
            };
        }

        if depth >= self.config.max_depth {
            tracing::info!(action = %call.name, depth, "max depth reached, action not invoked");
            return Phase::Terminal {
                depth,
                reason: TerminalReason::MaxDepth,
            };
        }

        Phase::Acting { depth, call }
    }

    /// 解码参数并执行动作，把观察写回 transcript
    async fn act(
        &self,
        depth: usize,
        call: FunctionCall,
        context: &Context,
        transcript: &mut Transcript,
        session: &OverthinkSession,
    ) -> Result<Phase, AgentError> {
        let final_answer = Phase::Terminal {
            depth,
            reason: TerminalReason::FinalAnswer,
        };

        let arguments = match decode_arguments(&call.name, &call.arguments) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(
                    action = %e.action,
                    arguments = %e.arguments,
                    detail = %e.detail,
                    "malformed action arguments, ending as final answer"
                );
                session.send(OverthinkEvent::ActionFailure {
                    action: call.name,
                    reason: e.to_string(),
                });
                return Ok(final_answer);
            }
        };
        let Some(action) = self.registry.lookup(&call.name) else {
            return Ok(final_answer);
        };

        session.send(OverthinkEvent::ActionCall {
            action: call.name.clone(),
            arguments: serde_json::Value::Object(arguments.clone()),
        });
        tracing::debug!(action = %call.name, arguments = %call.arguments, "running action");

        let observation = match self.invoker.invoke(action, arguments, context).await {
            Ok(value) => Observation::from_result(value),
            Err(e) => match self.config.error_policy {
                InvocationErrorPolicy::Observe => {
                    tracing::warn!(
                        action = %e.action,
                        arguments = %call.arguments,
                        error = %e.message,
                        "action failed, observing error"
                    );
                    session.send(OverthinkEvent::ActionFailure {
                        action: call.name.clone(),
                        reason: e.message.clone(),
                    });
                    Observation::Text(format!("error: {}", e.message))
                }
                InvocationErrorPolicy::Propagate => {
                    tracing::error!(
                        action = %e.action,
                        arguments = %call.arguments,
                        error = %e.message,
                        "action failed, aborting overthink"
                    );
                    return Err(e.into());
                }
            },
        };

        match observation {
            Observation::Nothing => Ok(Phase::Terminal {
                depth,
                reason: TerminalReason::NullActionResult,
            }),
            Observation::Text(content) => {
                session.send(OverthinkEvent::Observation {
                    action: call.name.clone(),
                    preview: preview(&content),
                });
                transcript.push(Message::function_result(call.name, content));
                Ok(Phase::Reasoning { depth: depth + 1 })
            }
        }
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!("{}...", s.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>())
    } else {
        s.to_string()
    }
}
