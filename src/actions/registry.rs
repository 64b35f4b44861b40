//! 动作注册表
//!
//! Action 持有签名、describe 元数据与可调用体（异步 / 阻塞两种）；ActionRegistry 按推导出的名字
//! 存储，保持注册顺序。同名再次注册直接覆盖前者（后注册者生效，位置保持不变）。

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::actions::schema::{derive, CallSpecification, Describe, Signature};
use crate::actions::Context;
use crate::core::SchemaError;

/// 动作实参：模型给出的 JSON 对象，原样传入
pub type Arguments = Map<String, Value>;

/// 动作返回值：Ok(None) 表示没有可观察结果；Err 表示动作本身失败
pub type ActionOutput = anyhow::Result<Option<Value>>;

pub type ActionFuture = BoxFuture<'static, ActionOutput>;

pub(crate) type AsyncFn = dyn Fn(Option<Context>, Arguments) -> ActionFuture + Send + Sync;
type BlockingFn = dyn Fn(Option<Context>, Arguments) -> ActionOutput + Send + Sync;

/// 可调用体；第一个参数为注入的上下文（仅当签名声明了上下文参数时为 Some）
#[derive(Clone)]
pub enum Callable {
    /// 直接在调度器上 await
    Async(Arc<AsyncFn>),
    /// 同步阻塞实现，由 ActionInvoker 交给工作线程池执行
    Blocking(Arc<BlockingFn>),
}

/// 已注册的动作
#[derive(Clone)]
pub struct Action {
    signature: Signature,
    metadata: Option<Describe>,
    callable: Callable,
}

impl Action {
    /// 异步动作
    pub fn new<F, Fut>(signature: Signature, f: F) -> Self
    where
        F: Fn(Option<Context>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionOutput> + Send + 'static,
    {
        Self {
            signature,
            metadata: None,
            callable: Callable::Async(Arc::new(move |ctx, args| f(ctx, args).boxed())),
        }
    }

    /// 同步阻塞动作（文件、子进程、CPU 密集等）
    pub fn blocking<F>(signature: Signature, f: F) -> Self
    where
        F: Fn(Option<Context>, Arguments) -> ActionOutput + Send + Sync + 'static,
    {
        Self {
            signature,
            metadata: None,
            callable: Callable::Blocking(Arc::new(f)),
        }
    }

    /// typed 异步动作：参数由 schemars Schema 推导，调用时反序列化为 `A`
    ///
    /// 反序列化失败按动作失败处理（交给 InvocationErrorPolicy）。
    pub fn typed<A, F, Fut>(name: impl Into<String>, f: F) -> Result<Self, SchemaError>
    where
        A: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionOutput> + Send + 'static,
    {
        let signature = Signature::from_args::<A>(name)?;
        let f = Arc::new(f);
        Ok(Self::new(signature, move |_ctx, args| {
            let f = Arc::clone(&f);
            let typed = serde_json::from_value::<A>(Value::Object(args));
            async move {
                match typed {
                    Ok(a) => f(a).await,
                    Err(e) => Err(e.into()),
                }
            }
        }))
    }

    /// 附加 describe 元数据；可多次调用，后者覆盖同名键
    pub fn describe(mut self, metadata: Describe) -> Self {
        self.metadata = Some(match self.metadata.take() {
            Some(existing) => existing.merge(metadata),
            None => metadata,
        });
        self
    }

    pub fn name(&self) -> &str {
        self.signature.name.trim()
    }

    pub fn accepts_context(&self) -> bool {
        self.signature.accepts_context()
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self.callable, Callable::Blocking(_))
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn metadata(&self) -> Option<&Describe> {
        self.metadata.as_ref()
    }

    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    /// 按需重新推导调用规范
    pub fn specification(&self) -> Result<CallSpecification, SchemaError> {
        derive(&self.signature, self.metadata.as_ref())
    }

    /// 判断两个 Action 是否共享同一个可调用体
    pub fn same_callable(&self, other: &Action) -> bool {
        match (&self.callable, &other.callable) {
            (Callable::Async(a), Callable::Async(b)) => Arc::ptr_eq(a, b),
            (Callable::Blocking(a), Callable::Blocking(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name())
            .field("accepts_context", &self.accepts_context())
            .field("is_blocking", &self.is_blocking())
            .finish()
    }
}

struct Entry {
    action: Action,
    spec: CallSpecification,
}

/// 动作注册表：按名称查找，规范列表按注册顺序返回
///
/// 注册需要 `&mut self`，应在并发使用前完成；之后只读共享（如放入 `Arc`）无需加锁。
#[derive(Default)]
pub struct ActionRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册动作并返回推导出的规范；签名不可用时立即返回 SchemaError
    pub fn register(&mut self, action: Action) -> Result<CallSpecification, SchemaError> {
        let spec = action.specification()?;
        let entry = Entry {
            action,
            spec: spec.clone(),
        };
        match self.index.get(&spec.name) {
            Some(&i) => {
                tracing::debug!(action = %spec.name, "action re-registered, replacing previous");
                self.entries[i] = entry;
            }
            None => {
                self.index.insert(spec.name.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
        Ok(spec)
    }

    pub fn lookup(&self, name: &str) -> Option<&Action> {
        self.index.get(name).map(|&i| &self.entries[i].action)
    }

    pub fn specification(&self, name: &str) -> Option<&CallSpecification> {
        self.index.get(name).map(|&i| &self.entries[i].spec)
    }

    pub fn list_specifications(&self) -> Vec<CallSpecification> {
        self.entries.iter().map(|e| e.spec.clone()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.spec.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
