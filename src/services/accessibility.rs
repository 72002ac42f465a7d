//! 无障碍分析 - 业务能力层
//!
//! 两级策略：
//! 1. 按顺序尝试从多个来源加载 axe-core 并执行 WCAG 2.x A/AA 规则
//! 2. 全部来源失败时，执行本地的基础结构检查（lang、alt、label、按钮名、链接名）
//!
//! 两级都失败时向上返回错误，由流程层标记为降级。

use std::sync::Arc;
use std::time::Duration;

use phf::phf_map;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, AppError, AppResult};
use crate::infrastructure::{eval_as, PageProbe};
use crate::models::{AccessibilityEngine, AccessibilityFacts, Violation};

/// 规则 ID → 说明
static RULE_DESCRIPTIONS: phf::Map<&'static str, &'static str> = phf_map! {
    // ARIA
    "aria-allowed-attr" => "使用了该角色不支持的 ARIA 属性",
    "aria-required-children" => "ARIA 角色缺少必需的子元素",
    "aria-valid-attr" => "ARIA 属性名无效",
    "aria-valid-attr-value" => "ARIA 属性值不正确",
    "aria-input-field-name" => "ARIA 输入框缺少可访问名称",
    "aria-hidden-focus" => "aria-hidden=\"true\" 内包含可聚焦元素",
    // 颜色对比度
    "color-contrast" => "文字与背景的对比度不足",
    "color-contrast-enhanced" => "对比度未达到增强标准",
    // 表单
    "label" => "表单元素缺少标签",
    "form-field-multiple-labels" => "表单字段有多个标签",
    "select-name" => "下拉框缺少可访问名称",
    "button-name" => "按钮缺少可访问名称",
    // 图片
    "image-alt" => "图片缺少 alt 属性",
    "input-image-alt" => "图片按钮缺少 alt 属性",
    "area-alt" => "图像映射的 area 元素缺少 alt 属性",
    // 链接
    "link-name" => "链接缺少可访问名称",
    "link-in-text-block" => "链接无法与周围文字区分",
    // 语言与文档结构
    "html-has-lang" => "html 标签缺少 lang 属性",
    "html-lang-valid" => "html 标签的 lang 属性无效",
    "document-title" => "页面缺少标题",
    "duplicate-id" => "存在重复的 ID",
    "duplicate-id-aria" => "ARIA 引用的 ID 重复",
    // 地标
    "region" => "页面内容未包含在地标元素中",
    "landmark-unique" => "地标角色不唯一",
    "bypass" => "页面缺少跳过导航的链接",
    // 其他
    "meta-viewport" => "viewport meta 禁止了缩放",
    "tabindex" => "tabindex 属性值不正确",
    "frame-title" => "frame 或 iframe 缺少标题",
};

/// 按规则 ID 取说明，未收录时使用引擎自带的 help
pub fn describe_rule(id: &str) -> Option<&'static str> {
    RULE_DESCRIPTIONS.get(id).copied()
}

pub(crate) const AXE_RUN_SCRIPT: &str = r#"
(async () => {
    if (typeof window.axe === 'undefined') {
        throw new Error('axe-core not available');
    }
    const results = await window.axe.run(document, {
        runOnly: { type: 'tag', values: ['wcag2a', 'wcag2aa', 'wcag21a', 'wcag21aa'] }
    });
    return results.violations.map(v => ({
        id: v.id,
        help: v.help,
        impact: v.impact,
        description: v.description,
        nodes: v.nodes.length
    }));
})()
"#;

pub(crate) const BASIC_CHECK_SCRIPT: &str = r#"
(() => {
    const found = [];
    const html = document.documentElement;
    if (!html.hasAttribute('lang') || !html.getAttribute('lang').trim()) {
        found.push({ id: 'html-has-lang', impact: 'serious', nodes: 1 });
    }

    const imgs = document.querySelectorAll('img:not([alt])').length;
    if (imgs > 0) {
        found.push({ id: 'image-alt', impact: 'critical', nodes: imgs });
    }

    let inputs = 0;
    document.querySelectorAll(
        'input:not([type="hidden"]):not([aria-label]):not([aria-labelledby])'
    ).forEach(input => {
        const byFor = input.id ? document.querySelectorAll(`label[for="${CSS.escape(input.id)}"]`).length : 0;
        if (byFor === 0 && !input.closest('label')) {
            inputs++;
        }
    });
    if (inputs > 0) {
        found.push({ id: 'label', impact: 'critical', nodes: inputs });
    }

    let buttons = 0;
    document.querySelectorAll('button:not([aria-label]):not([aria-labelledby])').forEach(b => {
        if (!b.textContent.trim()) buttons++;
    });
    if (buttons > 0) {
        found.push({ id: 'button-name', impact: 'serious', nodes: buttons });
    }

    let links = 0;
    document.querySelectorAll('a[href]:not([aria-label]):not([aria-labelledby])').forEach(a => {
        if (!a.textContent.trim()) links++;
    });
    if (links > 0) {
        found.push({ id: 'link-name', impact: 'serious', nodes: links });
    }

    return found;
})()
"#;

#[derive(Debug, Deserialize)]
struct RawViolation {
    id: String,
    #[serde(default)]
    help: Option<String>,
    #[serde(default)]
    impact: Option<String>,
    #[serde(default)]
    description: Option<String>,
    nodes: usize,
}

impl RawViolation {
    fn into_violation(self) -> Violation {
        let help = describe_rule(&self.id)
            .map(str::to_string)
            .or(self.help)
            .unwrap_or_else(|| self.id.clone());
        let description = self.description.unwrap_or_else(|| help.clone());
        Violation {
            id: self.id,
            help,
            impact: self.impact,
            description,
            nodes: self.nodes,
        }
    }
}

/// axe-core 脚本加载器
///
/// 成功取到的脚本在进程内缓存；失败不缓存，下一页会重新尝试
pub struct AxeLoader {
    sources: Vec<String>,
    client: reqwest::Client,
    script: OnceCell<Arc<String>>,
}

impl AxeLoader {
    pub fn new(sources: Vec<String>, fetch_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_default();
        Self {
            sources,
            client,
            script: OnceCell::new(),
        }
    }

    /// 不加载外部引擎（只使用基础检查）
    pub fn disabled() -> Self {
        Self::new(Vec::new(), Duration::from_secs(1))
    }

    /// 获取 axe-core 脚本，所有来源都失败时返回 None
    pub async fn script(&self) -> Option<Arc<String>> {
        self.script
            .get_or_try_init(|| self.fetch_from_sources())
            .await
            .ok()
            .cloned()
    }

    async fn fetch_from_sources(&self) -> AppResult<Arc<String>> {
        for url in &self.sources {
            debug!("📥 axe-core 加载尝试: {}", url);
            match self.fetch(url).await {
                Ok(body) => {
                    info!("✅ axe-core 加载成功: {}", url);
                    return Ok(Arc::new(body));
                }
                Err(e) => warn!("⚠️ axe-core 来源失败 {}: {}", url, e),
            }
        }
        Err(AnalysisError::RulesEngineUnavailable.into())
    }

    async fn fetch(&self, url: &str) -> AppResult<String> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        if body.trim().is_empty() {
            return Err(AppError::invalid_payload("axe-core", "脚本内容为空"));
        }
        Ok(body)
    }
}

/// 无障碍分析器
pub struct AccessibilityAnalyzer {
    loader: AxeLoader,
}

impl AccessibilityAnalyzer {
    pub fn new(loader: AxeLoader) -> Self {
        Self { loader }
    }

    /// 执行无障碍检查
    pub async fn analyze<P>(&self, probe: &P) -> AppResult<AccessibilityFacts>
    where
        P: PageProbe + ?Sized,
    {
        match self.run_axe(probe).await {
            Ok(violations) => {
                info!("✅ 无障碍分析完成: 检测到 {} 个问题", violations.len());
                return Ok(AccessibilityFacts {
                    engine: AccessibilityEngine::Axe,
                    violations,
                    degraded: false,
                });
            }
            Err(e) if e.is_navigation_level() => return Err(e),
            Err(e) => warn!("⚠️ axe-core 不可用（{}），执行基础检查", e),
        }

        let violations = self.run_basic_checks(probe).await?;
        info!("✅ 基础无障碍检查完成: 检测到 {} 个问题", violations.len());
        Ok(AccessibilityFacts {
            engine: AccessibilityEngine::Basic,
            violations,
            degraded: true,
        })
    }

    async fn run_axe<P>(&self, probe: &P) -> AppResult<Vec<Violation>>
    where
        P: PageProbe + ?Sized,
    {
        let script = self
            .loader
            .script()
            .await
            .ok_or(AppError::Analysis(AnalysisError::RulesEngineUnavailable))?;

        let inject = format!(
            "(() => {{\n{}\n;return typeof window.axe !== 'undefined';\n}})()",
            script
        );
        let loaded: bool = eval_as(probe, "accessibility", &inject).await?;
        if !loaded {
            return Err(AnalysisError::RulesEngineUnavailable.into());
        }

        let raw: Vec<RawViolation> = eval_as(probe, "accessibility", AXE_RUN_SCRIPT).await?;
        Ok(raw.into_iter().map(RawViolation::into_violation).collect())
    }

    async fn run_basic_checks<P>(&self, probe: &P) -> AppResult<Vec<Violation>>
    where
        P: PageProbe + ?Sized,
    {
        let raw: Vec<RawViolation> = eval_as(probe, "accessibility", BASIC_CHECK_SCRIPT).await?;
        Ok(raw.into_iter().map(RawViolation::into_violation).collect())
    }
}
