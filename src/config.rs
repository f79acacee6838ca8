//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CHECKLIST__*` 覆盖（双下划线表示嵌套，如 `CHECKLIST__LLM__PROVIDER=mock`）。

use std::path::PathBuf;

use serde::Deserialize;

/// API Key 环境变量，按顺序查找
pub const API_KEY_VARS: [&str; 2] = ["OPENROUTER_API_KEY", "OPENAI_API_KEY"];

/// 存储目录覆盖变量
pub const STORAGE_DIR_VAR: &str = "CHECKLIST_STORAGE_DIR";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub user: UserSection,
}

/// [app] 段：应用名、清单存储目录、Prompt 覆盖目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    pub storage_dir: PathBuf,
    /// 设置后优先从该目录读取 `<template_id>.md`
    pub prompts_dir: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            storage_dir: PathBuf::from("storage/checklists"),
            prompts_dir: None,
        }
    }
}

/// [llm] 段：后端选择、采样温度、重试与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openrouter / openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    /// 首次调用之外的额外重试次数
    pub max_retries: u32,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            base_url: Some("https://openrouter.ai/api/v1".to_string()),
            temperature: 0.2,
            max_retries: 1,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [user] 段：用户偏好，写入语义记忆
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserSection {
    pub handle: Option<String>,
    pub tone: String,
    pub timezone: Option<String>,
}

impl Default for UserSection {
    fn default() -> Self {
        Self {
            handle: None,
            tone: "collaborative".to_string(),
            timezone: None,
        }
    }
}

impl AppConfig {
    /// 依次读取 OPENROUTER_API_KEY、OPENAI_API_KEY，忽略空值
    pub fn api_key(&self) -> Option<String> {
        API_KEY_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty())
    }

    /// 清单存储目录；CHECKLIST_STORAGE_DIR 优先
    pub fn storage_dir(&self) -> PathBuf {
        match std::env::var(STORAGE_DIR_VAR) {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
            _ => self.app.storage_dir.clone(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 CHECKLIST__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CHECKLIST__*（双下划线表示嵌套键）
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
        config::Environment::with_prefix("CHECKLIST")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 重新从磁盘与环境变量加载配置
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.provider, "openrouter");
        assert_eq!(cfg.llm.model, "openai/gpt-4o-mini");
        assert_eq!(cfg.llm.max_retries, 1);
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert_eq!(cfg.user.tone, "collaborative");
        assert_eq!(cfg.app.storage_dir, PathBuf::from("storage/checklists"));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[llm]\nprovider = \"mock\"\ntemperature = 0.7\n\n[user]\nhandle = \"ada\""
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert!((cfg.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.user.handle.as_deref(), Some("ada"));
        // 未出现的键保持默认
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert_eq!(cfg.user.tone, "collaborative");
    }
}
