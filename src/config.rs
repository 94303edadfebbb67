//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SCOUT__*` 覆盖（双下划线表示嵌套，
//! 如 `SCOUT__LLM__BASE_URL=...`）。角色参数（模型、温度、system prompt）按角色名分段配置。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub roles: RolesSection,
    pub retrieval: RetrievalSection,
    pub browser: BrowserSection,
    pub credentials: CredentialsSection,
}

/// [app] 段：应用名与运行预算
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 单次运行允许的最大重规划轮数
    pub max_rounds: usize,
    /// 单次角色调用（含 Executor 整个工具循环）的时限（秒）
    pub turn_timeout_secs: u64,
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            max_rounds: 15,
            turn_timeout_secs: 180,
            tool_timeout_secs: 30,
        }
    }
}

/// [llm] 段：端点与嵌入模型（各角色共用）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: Option<String>,
    pub embedding_model: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: None,
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

/// 单个角色的 LLM 参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoleSection {
    pub model: String,
    pub temperature: Option<f32>,
    /// system prompt 内联文本；未设置时用内置默认
    pub system_prompt: Option<String>,
}

impl Default for RoleSection {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: None,
            system_prompt: None,
        }
    }
}

/// [roles] 段：四个角色各自的模型配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RolesSection {
    pub planner: RoleSection,
    pub executor: RoleSection,
    pub replanner: RoleSection,
    pub solver: RoleSection,
}

/// [retrieval] 段：语料路径、top-k、抓取与探测超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    /// 预嵌入语料（JSONL，每行 text / link / embedding）
    pub corpus_path: Option<PathBuf>,
    pub top_k: usize,
    /// 页面抓取超时（秒）
    pub fetch_timeout_secs: u64,
    /// 单条链接存在性探测超时（秒）
    pub probe_timeout_secs: u64,
    pub max_result_chars: usize,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            corpus_path: None,
            top_k: 10,
            fetch_timeout_secs: 10,
            probe_timeout_secs: 3,
            max_result_chars: 8000,
        }
    }
}

/// [browser] 段：会话与截图
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    /// 凭据表中使用的会话 id
    pub session_id: String,
    pub screenshot_dir: PathBuf,
    /// 会话预热等待上限（秒）
    pub ready_timeout_secs: u64,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            session_id: "default".to_string(),
            screenshot_dir: PathBuf::from("screenshots"),
            ready_timeout_secs: 30,
        }
    }
}

/// 单个会话的隐私凭据（不进入模型可见文本）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialSection {
    pub account: String,
    pub password: String,
}

/// [credentials] 段：会话 id → 凭据
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CredentialsSection {
    pub sessions: HashMap<String, CredentialSection>,
}

/// 从 config 目录加载配置，环境变量 SCOUT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SCOUT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SCOUT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.retrieval.top_k, 10);
        assert_eq!(cfg.app.max_rounds, 15);
        assert!(cfg.credentials.sessions.is_empty());
    }
}
