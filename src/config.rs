use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError, FileError};

/// 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "SITE_ANALYZER_CONFIG";

/// axe-core 的候选加载源（按顺序尝试）
pub const DEFAULT_AXE_SOURCES: [&str; 3] = [
    "https://unpkg.com/axe-core@4.8.2/axe.min.js",
    "https://cdn.jsdelivr.net/npm/axe-core@4.8.2/axe.min.js",
    "https://cdnjs.cloudflare.com/ajax/libs/axe-core/4.8.2/axe.min.js",
];

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP 服务端口
    pub server_port: u16,
    /// 同时存活的浏览器实例上限
    pub max_renderers: usize,
    /// 单个批次允许的 URL 数量
    pub max_urls_per_batch: usize,
    /// 页面导航超时（秒）
    pub navigation_timeout_secs: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// 会话保留时间（秒，从创建时刻起算）
    pub session_ttl_secs: u64,
    /// 过期会话清理间隔（秒）
    pub sweep_interval_secs: u64,
    /// 报告输出目录
    pub report_dir: String,
    /// 浏览器可执行文件路径（为空时自动探测）
    pub chrome_executable: Option<String>,
    // --- LLM 配置 ---
    pub llm_api_key: Option<String>,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 文本生成调用超时（秒）
    pub narrative_timeout_secs: u64,
    // --- 无障碍规则引擎 ---
    pub axe_sources: Vec<String>,
    pub axe_fetch_timeout_secs: u64,
    /// 校验时是否解析域名并拦截内网地址
    pub resolve_hostnames: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            max_renderers: 3,
            max_urls_per_batch: 10,
            navigation_timeout_secs: 30,
            viewport_width: 1366,
            viewport_height: 768,
            session_ttl_secs: 30 * 60,
            sweep_interval_secs: 5 * 60,
            report_dir: "reports".to_string(),
            chrome_executable: None,
            llm_api_key: None,
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4".to_string(),
            narrative_timeout_secs: 60,
            axe_sources: DEFAULT_AXE_SOURCES.iter().map(|s| s.to_string()).collect(),
            axe_fetch_timeout_secs: 10,
            resolve_hostnames: true,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 加载配置：默认值 → TOML 文件（可选）→ 环境变量
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        let config = base.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取配置，缺省项使用默认值
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::File(FileError::ReadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            AppError::Config(ConfigError::ParseFailed { source, .. }) => {
                AppError::Config(ConfigError::ParseFailed {
                    path: path.display().to_string(),
                    source,
                })
            }
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.llm_api_key = config.llm_api_key.as_deref().and_then(clean_api_key);
        Ok(config)
    }

    /// 仅从环境变量构建（基于默认值）
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// 用环境变量覆盖已有配置
    pub fn apply_env(self) -> Self {
        Self {
            server_port: env_parse("PORT").unwrap_or(self.server_port),
            max_renderers: env_parse("MAX_RENDERERS").unwrap_or(self.max_renderers),
            max_urls_per_batch: env_parse("MAX_URLS_PER_BATCH").unwrap_or(self.max_urls_per_batch),
            navigation_timeout_secs: env_parse("NAVIGATION_TIMEOUT_SECS")
                .unwrap_or(self.navigation_timeout_secs),
            session_ttl_secs: env_parse("SESSION_TTL_SECS").unwrap_or(self.session_ttl_secs),
            sweep_interval_secs: env_parse("SWEEP_INTERVAL_SECS")
                .unwrap_or(self.sweep_interval_secs),
            report_dir: std::env::var("REPORT_DIR").unwrap_or(self.report_dir),
            chrome_executable: std::env::var("CHROME_EXECUTABLE")
                .ok()
                .or(self.chrome_executable),
            llm_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .and_then(|k| clean_api_key(&k))
                .or(self.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            narrative_timeout_secs: env_parse("NARRATIVE_TIMEOUT_SECS")
                .unwrap_or(self.narrative_timeout_secs),
            resolve_hostnames: env_parse("RESOLVE_HOSTNAMES").unwrap_or(self.resolve_hostnames),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            ..self
        }
    }

    /// 检查数值配置项，任何一项为 0 都无法运行
    pub fn validate(&self) -> AppResult<()> {
        let positive = [
            ("max_renderers", self.max_renderers as u64),
            ("max_urls_per_batch", self.max_urls_per_batch as u64),
            ("navigation_timeout_secs", self.navigation_timeout_secs),
            ("session_ttl_secs", self.session_ttl_secs),
            // tokio::time::interval 不接受 0
            ("sweep_interval_secs", self.sweep_interval_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "必须大于 0".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// 是否配置了文本生成服务
    pub fn narrative_configured(&self) -> bool {
        self.llm_api_key.is_some()
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn narrative_timeout(&self) -> Duration {
        Duration::from_secs(self.narrative_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// 清理 API key 中的空白和换行，空值视为未配置
fn clean_api_key(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\t'))
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_renderers, 3);
        assert_eq!(config.max_urls_per_batch, 10);
        assert_eq!(config.navigation_timeout(), Duration::from_secs(30));
        assert_eq!(config.session_ttl(), Duration::from_secs(1800));
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.axe_sources.len(), 3);
        assert!(!config.narrative_configured());
    }

    #[test]
    fn test_toml_partial_override() {
        let config = Config::from_toml_str(
            r#"
            max_renderers = 5
            report_dir = "out"
            llm_api_key = "  sk-test\r\n"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_renderers, 5);
        assert_eq!(config.report_dir, "out");
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-test"));
        // 未写的项保持默认
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_blank_api_key_is_unconfigured() {
        assert_eq!(clean_api_key(" \t\r\n "), None);
        assert_eq!(clean_api_key("abc\tdef"), Some("abcdef".to_string()));
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let result = Config::from_toml_str("max_renderers = \"many\"");
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::ParseFailed { .. }))
        ));
    }

    #[test]
    fn test_invalid_toml_file_reports_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("site_analyzer.toml");
        std::fs::write(&path, "sweep_interval_secs = [").unwrap();

        match Config::from_file(&path) {
            Err(AppError::Config(ConfigError::ParseFailed { path: reported, .. })) => {
                assert!(reported.ends_with("site_analyzer.toml"));
            }
            other => panic!("应为配置解析错误: {:?}", other.map(|_| ())),
        }
    }

    fn rejected_key(config: Config) -> Option<String> {
        match config.validate() {
            Err(AppError::Config(ConfigError::InvalidValue { key, .. })) => Some(key),
            _ => None,
        }
    }

    #[test]
    fn test_defaults_pass_validation() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let config = Config {
            sweep_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(rejected_key(config).as_deref(), Some("sweep_interval_secs"));
    }

    #[test]
    fn test_zero_session_ttl_rejected() {
        let config = Config {
            session_ttl_secs: 0,
            ..Config::default()
        };
        assert_eq!(rejected_key(config).as_deref(), Some("session_ttl_secs"));
    }

    #[test]
    fn test_zero_navigation_timeout_rejected() {
        let config = Config {
            navigation_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(
            rejected_key(config).as_deref(),
            Some("navigation_timeout_secs")
        );
    }

    #[test]
    fn test_zero_counts_rejected() {
        let config = Config {
            max_renderers: 0,
            ..Config::default()
        };
        assert_eq!(rejected_key(config).as_deref(), Some("max_renderers"));

        let config = Config {
            max_urls_per_batch: 0,
            ..Config::default()
        };
        assert_eq!(rejected_key(config).as_deref(), Some("max_urls_per_batch"));
    }
}
