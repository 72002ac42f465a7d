use serde::{Deserialize, Serialize};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 请求校验错误（批次不会被创建）
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 分析器错误
    #[error("分析错误: {0}")]
    Analysis(#[from] AnalysisError),
    /// 文本生成服务错误
    #[error("文本生成错误: {0}")]
    Narrative(#[from] NarrativeError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 会话错误
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 批次已被取消
    #[error("批次已取消")]
    Cancelled,
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 请求校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    /// URL 列表为空
    #[error("URL 列表不能为空")]
    EmptyUrlList,
    /// URL 数量超过上限
    #[error("URL 数量 {count} 超过上限 {max}")]
    TooManyUrls { count: usize, max: usize },
    /// URL 无法解析
    #[error("无法解析 URL: {url}")]
    MalformedUrl { url: String },
    /// 协议不是 http/https
    #[error("不支持的协议 {scheme} ({url})")]
    UnsupportedScheme { url: String, scheme: String },
    /// 指向本机或内网地址
    #[error("禁止访问本机或内网地址: {url}")]
    BlockedHost { url: String },
    /// 请求体不是 `{"urls": [...]}`
    #[error("请求体无效: {reason}")]
    InvalidBody { reason: String },
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动浏览器失败: {source}")]
    StartupFailed { source: BoxError },
    /// 创建页面失败
    #[error("创建页面失败: {source}")]
    PageCreationFailed { source: BoxError },
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed { url: String, source: BoxError },
    /// 导航超时
    #[error("导航到 {url} 超时 ({timeout_secs} 秒)")]
    NavigationTimeout { url: String, timeout_secs: u64 },
    /// 页面已关闭或崩溃
    #[error("页面已关闭: {reason}")]
    TargetClosed { reason: String },
    /// 执行脚本失败
    #[error("执行脚本失败: {source}")]
    ScriptExecutionFailed { source: BoxError },
    /// 浏览器进程已退出（批次无法继续）
    #[error("浏览器 #{id} 进程已退出")]
    RendererExited { id: u64 },
}

/// 分析器错误
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// 分析器返回了无法识别的数据
    #[error("{analyzer} 返回了无效数据: {detail}")]
    InvalidPayload { analyzer: String, detail: String },
    /// 外部规则引擎不可用
    #[error("无障碍规则引擎不可用")]
    RulesEngineUnavailable,
}

/// 文本生成服务错误
#[derive(Debug, Error)]
pub enum NarrativeError {
    /// API 调用失败
    #[error("API调用失败 (模型: {model}): {source}")]
    ApiCallFailed { model: String, source: BoxError },
    /// 返回内容为空
    #[error("返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 调用超时
    #[error("调用超时 ({timeout_secs} 秒)")]
    Timeout { timeout_secs: u64 },
    /// 请求构建失败
    #[error("构建请求失败: {source}")]
    InvalidRequest { source: BoxError },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed { path: String, source: BoxError },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed { path: String, source: BoxError },
}

/// 会话错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// 会话不存在（或已过期被清理）
    #[error("会话不存在: {id}")]
    NotFound { id: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件不是合法的 TOML
    #[error("TOML解析失败 ({path}): {source}")]
    ParseFailed { path: String, source: BoxError },
    /// 配置值无效
    #[error("配置项 {key} 无效: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// 单页错误分类（写入 PageError）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Navigation,
    Timeout,
    Analysis,
    Cancelled,
    Internal,
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;
        match err {
            CdpError::NotFound | CdpError::FrameNotFound(_) => {
                AppError::Browser(BrowserError::TargetClosed {
                    reason: err.to_string(),
                })
            }
            other => AppError::Browser(BrowserError::ScriptExecutionFailed {
                source: Box::new(other),
            }),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Analysis(AnalysisError::InvalidPayload {
            analyzer: "json".to_string(),
            detail: err.to_string(),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(ConfigError::ParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<async_openai::error::OpenAIError> for AppError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        AppError::Narrative(NarrativeError::InvalidRequest {
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Other(format!("HTTP 请求失败: {}", err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器启动错误
    pub fn browser_startup_failed(source: impl Into<BoxError>) -> Self {
        AppError::Browser(BrowserError::StartupFailed {
            source: source.into(),
        })
    }

    /// 创建导航失败错误
    pub fn navigation_failed(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        AppError::Browser(BrowserError::NavigationFailed {
            url: url.into(),
            source: source.into(),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建分析数据无效错误
    pub fn invalid_payload(analyzer: impl Into<String>, detail: impl Into<String>) -> Self {
        AppError::Analysis(AnalysisError::InvalidPayload {
            analyzer: analyzer.into(),
            detail: detail.into(),
        })
    }

    /// 单页错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Browser(BrowserError::NavigationTimeout { .. })
            | AppError::Narrative(NarrativeError::Timeout { .. }) => ErrorKind::Timeout,
            AppError::Browser(
                BrowserError::NavigationFailed { .. }
                | BrowserError::TargetClosed { .. }
                | BrowserError::PageCreationFailed { .. },
            ) => ErrorKind::Navigation,
            AppError::Analysis(_)
            | AppError::Browser(BrowserError::ScriptExecutionFailed { .. }) => ErrorKind::Analysis,
            AppError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Internal,
        }
    }

    /// 是否为页面级故障（分析器遇到时不降级，直接向上传播）
    pub fn is_navigation_level(&self) -> bool {
        matches!(
            self,
            AppError::Browser(
                BrowserError::NavigationFailed { .. }
                    | BrowserError::NavigationTimeout { .. }
                    | BrowserError::TargetClosed { .. }
            ) | AppError::Cancelled
        )
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
