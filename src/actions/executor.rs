//! 动作执行器
//!
//! 负责参数解码、上下文注入与分发：阻塞动作经 Semaphore 限流后放入 spawn_blocking 工作线程，
//! 异步动作直接 await。两条路径上的 panic 都转为 ActionInvocationError。
//! 每次调用输出结构化审计日志（JSON）。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::actions::registry::{Action, Arguments, Callable};
use crate::actions::Context;
use crate::core::{ActionInvocationError, ArgumentDecodeError};

/// 动作返回 true 时写回的观察文本
pub const DONE_OBSERVATION: &str = "Done!";
/// 默认阻塞工作线程许可数
pub const DEFAULT_WORKER_THREADS: usize = 4;
const ARGS_PREVIEW_CHARS: usize = 200;

/// 动作结果映射后的观察
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// 动作没有返回值：本轮结束，不追加 function 消息
    Nothing,
    Text(String),
}

impl Observation {
    /// None / null → Nothing；true → "Done!"；字符串原样；其它值序列化为紧凑 JSON
    pub fn from_result(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => Observation::Nothing,
            Some(Value::Bool(true)) => Observation::Text(DONE_OBSERVATION.to_string()),
            Some(Value::String(s)) => Observation::Text(s),
            Some(other) => Observation::Text(other.to_string()),
        }
    }
}

/// 解析 function_call.arguments；必须是 JSON 对象
pub fn decode_arguments(action: &str, raw: &str) -> Result<Arguments, ArgumentDecodeError> {
    let decode_err = |detail: String| ArgumentDecodeError {
        action: action.to_string(),
        arguments: raw.to_string(),
        detail,
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(decode_err(format!("expected a JSON object, got {other}"))),
        Err(e) => Err(decode_err(e.to_string())),
    }
}

/// 动作执行器：持有阻塞工作线程池的许可
#[derive(Clone)]
pub struct ActionInvoker {
    pool: Arc<Semaphore>,
}

impl Default for ActionInvoker {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_THREADS)
    }
}

impl ActionInvoker {
    pub fn new(worker_threads: usize) -> Self {
        Self {
            pool: Arc::new(Semaphore::new(worker_threads.max(1))),
        }
    }

    /// 当前空闲的阻塞工作许可数
    pub fn available_workers(&self) -> usize {
        self.pool.available_permits()
    }

    /// 调用动作；声明了上下文参数的动作会收到 context 的副本作为第一个实参
    pub async fn invoke(
        &self,
        action: &Action,
        arguments: Arguments,
        context: &Context,
    ) -> Result<Option<Value>, ActionInvocationError> {
        let name = action.name().to_string();
        let start = Instant::now();
        let args_preview = args_preview(&arguments);
        let ctx = action.accepts_context().then(|| context.clone());

        let result = match action.callable() {
            Callable::Async(f) => Self::run_async(f.as_ref(), ctx, arguments).await,
            Callable::Blocking(f) => self.run_blocking(Arc::clone(f), ctx, arguments).await,
        };

        let (ok, outcome) = match &result {
            Ok(None) | Ok(Some(Value::Null)) => (true, "empty"),
            Ok(Some(_)) => (true, "ok"),
            Err(_) => (false, "error"),
        };
        let audit = serde_json::json!({
            "event": "action_audit",
            "action": name,
            "ok": ok,
            "outcome": outcome,
            "blocking": action.is_blocking(),
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "action");

        result.map_err(|message| ActionInvocationError {
            action: name,
            message,
        })
    }

    /// 构造 future 与 poll 过程中的 panic 都被捕获
    async fn run_async(
        f: &crate::actions::registry::AsyncFn,
        ctx: Option<Context>,
        arguments: Arguments,
    ) -> Result<Option<Value>, String> {
        let fut = std::panic::catch_unwind(AssertUnwindSafe(|| f(ctx, arguments)))
            .map_err(|p| format!("action panicked: {}", panic_message(p.as_ref())))?;
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(p) => Err(format!("action panicked: {}", panic_message(p.as_ref()))),
        }
    }

    /// 许可随任务移入工作线程，任务结束即释放；调用方中途放弃也不会泄漏
    async fn run_blocking(
        &self,
        f: Arc<dyn Fn(Option<Context>, Arguments) -> crate::actions::ActionOutput + Send + Sync>,
        ctx: Option<Context>,
        arguments: Arguments,
    ) -> Result<Option<Value>, String> {
        let permit = Arc::clone(&self.pool)
            .acquire_owned()
            .await
            .map_err(|e| format!("worker pool closed: {e}"))?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f(ctx, arguments)
        })
        .await
        .map_err(|e| format!("worker failed: {e}"))?
        .map_err(|e| e.to_string())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn args_preview(args: &Arguments) -> String {
    let s = Value::Object(args.clone()).to_string();
    if s.chars().count() > ARGS_PREVIEW_CHARS {
        format!("{}...", s.chars().take(ARGS_PREVIEW_CHARS).collect::<String>())
    } else {
        s
    }
}
