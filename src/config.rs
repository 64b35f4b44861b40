//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `OVERTHINK__*` 覆盖（双下划线表示嵌套，如 `OVERTHINK__AGENT__MAX_DEPTH=3`）。

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::InvocationErrorPolicy;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You're a helpful agent";
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentSection,
    pub actions: ActionsSection,
}

/// [agent] 段：系统提示词、最大递归深度、禁用的动作
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default)]
    pub disabled_actions: Vec<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_depth: default_max_depth(),
            disabled_actions: Vec::new(),
        }
    }
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// [actions] 段：阻塞动作工作线程数、动作失败处理策略
#[derive(Debug, Clone, Deserialize)]
pub struct ActionsSection {
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    #[serde(default)]
    pub error_policy: InvocationErrorPolicy,
}

impl Default for ActionsSection {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            error_policy: InvocationErrorPolicy::default(),
        }
    }
}

fn default_worker_threads() -> usize {
    crate::actions::executor::DEFAULT_WORKER_THREADS
}

/// 依次尝试的默认配置文件（取第一个存在的）
const DEFAULT_CONFIG_FILES: [&str; 3] = ["config/default.toml", "../config/default.toml", "default.toml"];
const ENV_PREFIX: &str = "OVERTHINK";

/// 加载配置：默认文件 < 显式文件 < 环境变量，后者覆盖前者；不存在的文件直接跳过
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let default_file = DEFAULT_CONFIG_FILES
        .into_iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf);
    let explicit_file = config_path.filter(|p| p.exists());

    default_file
        .into_iter()
        .chain(explicit_file)
        .fold(config::Config::builder(), |builder, file| {
            builder.add_source(config::File::from(file).required(false))
        })
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
