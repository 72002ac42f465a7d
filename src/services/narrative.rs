//! 改进建议生成 - 业务能力层
//!
//! 只负责"把分析数据变成一段 HTML 建议"，不关心流程
//!
//! ## 三种结果
//! - 未配置服务：本地按规则生成建议（`fallback`）
//! - 已配置但调用失败 / 超时 / 批次被取消：没有建议（`unavailable`）
//! - 调用成功：`llm`
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（自定义 API 端点和模型）

use std::fmt::Write as _;
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, NarrativeError};
use crate::models::{
    AccessibilityFacts, LeadFacts, MobileFacts, NarrativeSource, PerformanceFacts, Scores,
    SeoFacts,
};
use crate::utils::html::{escape_html, grade_label};
use crate::utils::logging::truncate_text;

const SYSTEM_PROMPT: &str = "你是一名经验丰富的 UX/UI 设计师，同时也是 B2B 营销专家。\
回答必须是 HTML 片段，不要使用 Markdown，不要使用 div、ul、li 标签，\
所有条目都写成 <p>・内容</p> 的形式。";

/// 列入提示词的无障碍问题上限
const MAX_VIOLATIONS_IN_PROMPT: usize = 10;

/// 生成建议所需的全部数据
#[derive(Debug, Clone, Copy)]
pub struct NarrativeInput<'a> {
    pub url: &'a str,
    pub title: Option<&'a str>,
    pub scores: &'a Scores,
    pub performance: &'a PerformanceFacts,
    pub seo: &'a SeoFacts,
    pub mobile: &'a MobileFacts,
    pub accessibility: &'a AccessibilityFacts,
    pub lead: &'a LeadFacts,
}

/// 生成结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narrative {
    pub html: Option<String>,
    pub source: NarrativeSource,
}

/// 改进建议生成服务
///
/// 职责：
/// - 调用文本生成服务，得到一段 HTML 建议
/// - 未配置时按规则生成
/// - 任何失败都不向上返回错误
pub struct NarrativeService {
    client: Option<Client<OpenAIConfig>>,
    model_name: String,
    timeout: Duration,
}

impl NarrativeService {
    pub fn new(config: &Config) -> Self {
        match config.llm_api_key.as_deref() {
            Some(key) => Self::with_endpoint(
                key,
                &config.llm_api_base_url,
                &config.llm_model_name,
                config.narrative_timeout(),
            ),
            None => Self::unconfigured(),
        }
    }

    /// 指定端点创建（兼容 OpenAI API 的服务）
    pub fn with_endpoint(api_key: &str, api_base: &str, model: &str, timeout: Duration) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        Self {
            client: Some(Client::with_config(openai_config)),
            model_name: model.to_string(),
            timeout,
        }
    }

    /// 未配置服务，只使用规则生成
    pub fn unconfigured() -> Self {
        Self {
            client: None,
            model_name: String::new(),
            timeout: Duration::ZERO,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// 生成改进建议
    ///
    /// 调用受 `timeout` 和批次取消信号共同约束
    pub async fn generate(
        &self,
        input: &NarrativeInput<'_>,
        cancel: &CancellationToken,
    ) -> Narrative {
        let Some(client) = &self.client else {
            debug!("未配置文本生成服务，使用规则生成建议");
            return Narrative {
                html: Some(fallback_suggestions(input)),
                source: NarrativeSource::Fallback,
            };
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            r = tokio::time::timeout(self.timeout, self.request(client, input)) => match r {
                Ok(r) => r,
                Err(_) => Err(NarrativeError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                }
                .into()),
            },
        };

        match result {
            Ok(content) => {
                info!("✅ 改进建议生成完成: {}", input.url);
                Narrative {
                    html: Some(format!("<div class=\"ai-suggestions\">{}</div>", content)),
                    source: NarrativeSource::Llm,
                }
            }
            Err(e) => {
                warn!("⚠️ 改进建议生成失败 {}: {}", input.url, e);
                Narrative {
                    html: None,
                    source: NarrativeSource::Unavailable,
                }
            }
        }
    }

    async fn request(
        &self,
        client: &Client<OpenAIConfig>,
        input: &NarrativeInput<'_>,
    ) -> AppResult<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(build_prompt(input))
                .build()?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.7)
            .max_tokens(2500u32)
            .build()?;

        debug!("📤 发送改进建议请求: 模型 {}", self.model_name);

        let response = client.chat().create(request).await.map_err(|e| {
            NarrativeError::ApiCallFailed {
                model: self.model_name.clone(),
                source: Box::new(e),
            }
        })?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| NarrativeError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        debug!("📥 收到改进建议: {}", truncate_text(&content, 80));
        Ok(content)
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "有"
    } else {
        "无"
    }
}

fn or_unset(value: Option<&str>) -> String {
    value
        .map(|v| format!("\"{}\"", v))
        .unwrap_or_else(|| "未设置".to_string())
}

fn ms_or_unknown(value: Option<u64>) -> String {
    value
        .map(|v| format!("{}ms", v))
        .unwrap_or_else(|| "无法测量".to_string())
}

/// 构建用户提示词
pub fn build_prompt(input: &NarrativeInput<'_>) -> String {
    let s = input.scores;
    let p = input.performance;
    let seo = input.seo;
    let m = input.mobile;
    let a = input.accessibility;
    let l = input.lead;

    let mut prompt = String::new();
    let _ = writeln!(prompt, "请根据以下网站分析结果，给出具体可执行的改进建议。\n");
    let _ = writeln!(prompt, "URL: {}", input.url);
    let _ = writeln!(prompt, "标题: {}", input.title.unwrap_or("未设置"));
    let _ = writeln!(
        prompt,
        "总分: {}/25 ({}%)\n",
        s.overall,
        s.percentage()
    );

    let _ = writeln!(prompt, "【性能】{}/5", s.performance);
    let _ = writeln!(prompt, "- 加载时间: {}ms", p.load_time);
    let _ = writeln!(prompt, "- DOMContentLoaded: {}", ms_or_unknown(p.dom_content_loaded));
    let _ = writeln!(
        prompt,
        "- First Contentful Paint: {}\n",
        ms_or_unknown(p.first_contentful_paint)
    );

    let _ = writeln!(prompt, "【SEO】{}/5", s.seo);
    let _ = writeln!(prompt, "- title: {}", or_unset(seo.title.as_deref()));
    let _ = writeln!(
        prompt,
        "- meta description: {}",
        or_unset(seo.meta_description.as_deref())
    );
    let _ = writeln!(
        prompt,
        "- 标题结构: H1={}, H2={}, H3={}",
        seo.headings.h1, seo.headings.h2, seo.headings.h3
    );
    let _ = writeln!(
        prompt,
        "- 图片: 共 {} 张, 有 alt {} 张, 无 alt {} 张\n",
        seo.images.total, seo.images.with_alt, seo.images.without_alt
    );

    let _ = writeln!(prompt, "【移动端】{}/5", s.mobile);
    let _ = writeln!(prompt, "- viewport: {}", m.viewport.as_deref().unwrap_or("未设置"));
    let _ = writeln!(prompt, "- 媒体查询: {}", yes_no(m.has_media_queries));
    let _ = writeln!(
        prompt,
        "- 触控目标: 共 {} 个, 尺寸合适 {} 个, 过小 {} 个\n",
        m.touch_targets.total_targets,
        m.touch_targets.adequate_targets,
        m.touch_targets.small_targets
    );

    let _ = writeln!(prompt, "【无障碍】{}/5", s.accessibility);
    if a.violations.is_empty() {
        let _ = writeln!(prompt, "- 未检测到问题");
    } else {
        let _ = writeln!(prompt, "- 检测到 {} 个问题:", a.violation_count());
        for v in a.violations.iter().take(MAX_VIOLATIONS_IN_PROMPT) {
            let _ = writeln!(
                prompt,
                "  - {} ({}): {} 个节点",
                v.help,
                v.impact.as_deref().unwrap_or("unknown"),
                v.nodes
            );
        }
    }
    prompt.push('\n');

    let _ = writeln!(prompt, "【B2B 获客能力】{}/5", s.b2b_lead);
    let _ = writeln!(prompt, "- 表单: {} 个, CTA: {} 个", l.form_count, l.cta_count);
    let _ = writeln!(prompt, "- 联系页面: {}", yes_no(l.has_contact_page));
    let _ = writeln!(prompt, "- 案例页面: {}", yes_no(l.has_case_studies));
    let _ = writeln!(prompt, "- 价格页面: {}", yes_no(l.has_pricing_page));
    let _ = writeln!(prompt, "- 资料下载: {}", yes_no(l.has_resource_downloads));
    let _ = writeln!(prompt, "- 公司信息: {}\n", yes_no(l.has_company_info));

    let _ = writeln!(
        prompt,
        "请按以下结构输出：<h3>1. 优先改进项（前 5 项）</h3>、<h3>2. 具体实现方法</h3>、\
<h3>3. 预期效果</h3>、<h3>4. B2B 专项改进</h3>、<h3>5. 改进后的衡量方法</h3>。"
    );
    prompt
}

/// 按规则生成改进建议（未配置文本生成服务时使用）
pub fn fallback_suggestions(input: &NarrativeInput<'_>) -> String {
    let s = input.scores;
    let mut html = String::from("<div class=\"ai-suggestions\">\n");
    let _ = writeln!(html, "<h2>🔍 网站分析与改进建议</h2>");
    let _ = writeln!(
        html,
        "<h3>📊 总体评价: {}/25 ({}%)</h3>",
        s.overall,
        s.percentage()
    );
    let _ = writeln!(html, "<h3>🚨 优先改进项</h3>");

    let mut sections = 0;

    if s.performance <= 3 {
        sections += 1;
        let _ = writeln!(
            html,
            "<h4>🚀 性能 ({}/5, {})</h4>",
            s.performance,
            grade_label(s.performance)
        );
        if input.performance.load_time > super::scoring::SLOW_LOAD_MS {
            let _ = writeln!(
                html,
                "<p>・<strong>优化页面加载速度</strong>（当前 {}ms）：压缩图片并转换为 WebP，合并压缩 CSS/JavaScript，考虑使用 CDN</p>",
                input.performance.load_time
            );
        }
    }

    if s.seo <= 3 {
        sections += 1;
        let _ = writeln!(html, "<h4>🔍 SEO ({}/5, {})</h4>", s.seo, grade_label(s.seo));
        if input.seo.title.is_none() {
            let _ = writeln!(html, "<p>・<strong>设置 title 标签</strong>（未设置）</p>");
        }
        if input.seo.meta_description.is_none() {
            let _ = writeln!(
                html,
                "<p>・<strong>设置 meta description</strong>（未设置）</p>"
            );
        }
    }

    if s.mobile <= 3 {
        sections += 1;
        let _ = writeln!(
            html,
            "<h4>📱 移动端 ({}/5, {})</h4>",
            s.mobile,
            grade_label(s.mobile)
        );
        if input.mobile.viewport.is_none() {
            let _ = writeln!(html, "<p>・<strong>添加 viewport meta 标签</strong></p>");
        }
        if input.mobile.touch_targets.small_targets > 0 {
            let _ = writeln!(
                html,
                "<p>・<strong>增大触控目标尺寸</strong>（{} 个小于 44px）</p>",
                input.mobile.touch_targets.small_targets
            );
        }
    }

    if s.accessibility <= 3 {
        sections += 1;
        let _ = writeln!(
            html,
            "<h4>♿ 无障碍 ({}/5, {})</h4>",
            s.accessibility,
            grade_label(s.accessibility)
        );
        for v in input.accessibility.violations.iter().take(5) {
            let _ = writeln!(
                html,
                "<p>・<strong>{}</strong>（{} 个节点）</p>",
                escape_html(&v.help),
                v.nodes
            );
        }
    }

    if s.b2b_lead <= 3 {
        sections += 1;
        let _ = writeln!(
            html,
            "<h4>🏢 B2B 获客能力 ({}/5, {})</h4>",
            s.b2b_lead,
            grade_label(s.b2b_lead)
        );
        let _ = writeln!(
            html,
            "<p>・<strong>优化 CTA 按钮</strong>：把咨询、资料申请按钮放在醒目位置</p>"
        );
        if !input.lead.has_case_studies {
            let _ = writeln!(
                html,
                "<p>・<strong>补充客户案例</strong>：用具体案例提升可信度</p>"
            );
        }
        if !input.lead.has_pricing_page {
            let _ = writeln!(
                html,
                "<p>・<strong>公开价格与服务详情</strong>：提供决策所需的信息</p>"
            );
        }
    }

    if sections == 0 {
        let _ = writeln!(html, "<p>・各项指标均已达到良好水平，请继续保持</p>");
    }

    html.push_str("</div>");
    html
}
