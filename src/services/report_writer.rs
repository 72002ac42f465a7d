//! 报告写入服务 - 业务能力层
//!
//! 只负责"把单页结果写成 HTML 报告"，不关心流程

use std::fmt::Write as _;
use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{AccessibilityEngine, PageResult};
use crate::utils::html::{escape_html, grade_label};

/// 报告输出
///
/// 批次处理器对每个成功的页面调用一次，只关心成功或失败
#[async_trait]
pub trait ReportEmitter: Send + Sync {
    async fn emit(
        &self,
        session_id: &str,
        index: usize,
        result: &PageResult,
    ) -> AppResult<PathBuf>;
}

/// HTML 报告写入器
///
/// 输出路径：`{report_dir}/{session_id}/{序号:02}-{主机名}.html`
pub struct HtmlReportWriter {
    report_dir: PathBuf,
}

impl HtmlReportWriter {
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
        }
    }

    /// 报告文件路径
    pub fn report_path(&self, session_id: &str, index: usize, url: &str) -> PathBuf {
        self.report_dir
            .join(sanitize(session_id))
            .join(format!("{:02}-{}.html", index + 1, host_slug(url)))
    }
}

#[async_trait]
impl ReportEmitter for HtmlReportWriter {
    async fn emit(
        &self,
        session_id: &str,
        index: usize,
        result: &PageResult,
    ) -> AppResult<PathBuf> {
        let path = self.report_path(session_id, index, &result.url);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| AppError::file_write_failed(dir.display().to_string(), e))?;
        }

        let html = render_report(result);
        tokio::fs::write(&path, html)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

        debug!("报告已写入: {}", path.display());
        Ok(path)
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn host_slug(url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "page".to_string());
    sanitize(&host)
}

fn check(flag: bool) -> &'static str {
    if flag {
        "有 ✅"
    } else {
        "无 ❌"
    }
}

fn opt_ms(value: Option<u64>) -> String {
    value
        .map(|v| format!("{}ms", v))
        .unwrap_or_else(|| "无法测量".to_string())
}

/// 渲染完整的报告页面
pub fn render_report(r: &PageResult) -> String {
    let s = &r.scores;
    let title = r.seo.title.as_deref().unwrap_or(&r.url);

    let mut html = String::new();
    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, "<html lang=\"zh\">\n<head>\n<meta charset=\"utf-8\">");
    let _ = writeln!(
        html,
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">"
    );
    let _ = writeln!(html, "<title>分析报告 - {}</title>", escape_html(title));
    let _ = writeln!(
        html,
        "<style>body{{font-family:sans-serif;max-width:960px;margin:2rem auto;padding:0 1rem;line-height:1.6}}\
table{{border-collapse:collapse}}td,th{{border:1px solid #ccc;padding:.4rem .8rem}}\
.degraded{{color:#a60}}</style>"
    );
    let _ = writeln!(html, "</head>\n<body>");
    let _ = writeln!(html, "<h1>📊 {}</h1>", escape_html(title));
    let _ = writeln!(html, "<p>{}</p>", escape_html(&r.url));

    // 评分表
    let _ = writeln!(html, "<table class=\"score-table\">");
    let _ = writeln!(html, "<tr><th>项目</th><th>分数</th><th>评价</th></tr>");
    for (label, score) in [
        ("性能", s.performance),
        ("SEO", s.seo),
        ("移动端", s.mobile),
        ("无障碍", s.accessibility),
        ("B2B 获客能力", s.b2b_lead),
    ] {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}/5</td><td>{}</td></tr>",
            label,
            score,
            grade_label(score)
        );
    }
    let _ = writeln!(
        html,
        "<tr><td><strong>总分</strong></td><td><strong>{}/25</strong></td><td>{}%</td></tr>",
        s.overall,
        s.percentage()
    );
    let _ = writeln!(html, "</table>");

    let degraded = |flag: bool| {
        if flag {
            " <span class=\"degraded\">(未能完整检查)</span>"
        } else {
            ""
        }
    };

    let p = &r.performance;
    let _ = writeln!(html, "<h2>🚀 性能{}</h2>", degraded(p.degraded));
    let _ = writeln!(html, "<p><strong>加载时间:</strong> {}ms</p>", p.load_time);
    let _ = writeln!(
        html,
        "<p><strong>DOMContentLoaded:</strong> {}</p>",
        opt_ms(p.dom_content_loaded)
    );
    let _ = writeln!(
        html,
        "<p><strong>First Contentful Paint:</strong> {}</p>",
        opt_ms(p.first_contentful_paint)
    );

    let seo = &r.seo;
    let _ = writeln!(html, "<h2>🔍 SEO{}</h2>", degraded(seo.degraded));
    let _ = writeln!(
        html,
        "<p><strong>标题:</strong> {}</p>",
        seo.title.as_deref().map(escape_html).unwrap_or_else(|| "未设置".to_string())
    );
    let _ = writeln!(
        html,
        "<p><strong>meta description:</strong> {}</p>",
        seo.meta_description
            .as_deref()
            .map(escape_html)
            .unwrap_or_else(|| "未设置".to_string())
    );
    let _ = writeln!(
        html,
        "<p><strong>标题结构:</strong> H1 {} / H2 {} / H3 {}</p>",
        seo.headings.h1, seo.headings.h2, seo.headings.h3
    );
    let _ = writeln!(
        html,
        "<p><strong>图片 alt:</strong> {}/{}</p>",
        seo.images.with_alt, seo.images.total
    );

    let m = &r.mobile;
    let _ = writeln!(html, "<h2>📱 移动端{}</h2>", degraded(m.degraded));
    let _ = writeln!(
        html,
        "<p><strong>viewport:</strong> {}</p>",
        m.viewport.as_deref().map(escape_html).unwrap_or_else(|| "未设置".to_string())
    );
    let _ = writeln!(html, "<p><strong>媒体查询:</strong> {}</p>", check(m.has_media_queries));
    let _ = writeln!(
        html,
        "<p><strong>触控目标:</strong> {}/{} 个尺寸合适</p>",
        m.touch_targets.adequate_targets, m.touch_targets.total_targets
    );

    let a = &r.accessibility;
    let engine = match a.engine {
        AccessibilityEngine::Axe => "axe-core",
        AccessibilityEngine::Basic => "基础检查",
        AccessibilityEngine::Unavailable => "不可用",
    };
    let _ = writeln!(html, "<h2>♿ 无障碍{}</h2>", degraded(a.degraded));
    let _ = writeln!(html, "<p><strong>检查引擎:</strong> {}</p>", engine);
    if a.violations.is_empty() {
        let _ = writeln!(html, "<p>未检测到问题</p>");
    } else {
        let _ = writeln!(html, "<p><strong>检测到的问题:</strong> {} 项</p>", a.violation_count());
        for v in &a.violations {
            let _ = writeln!(
                html,
                "<p>・<strong>{}</strong> [{}] {} 个节点</p>",
                escape_html(&v.help),
                escape_html(v.impact.as_deref().unwrap_or("unknown")),
                v.nodes
            );
        }
    }

    let l = &r.lead;
    let _ = writeln!(html, "<h2>🏢 B2B 获客能力{}</h2>", degraded(l.degraded));
    if let Some(msg) = &l.message {
        let _ = writeln!(html, "<p>{}</p>", escape_html(msg));
    }
    let _ = writeln!(html, "<p><strong>表单:</strong> {} 个</p>", l.form_count);
    let _ = writeln!(html, "<p><strong>CTA:</strong> {} 个</p>", l.cta_count);
    for (label, flag) in [
        ("联系页面", l.has_contact_page),
        ("客户案例", l.has_case_studies),
        ("价格页面", l.has_pricing_page),
        ("资料下载", l.has_resource_downloads),
        ("公司信息", l.has_company_info),
        ("FAQ", l.has_faq),
        ("隐私政策", l.has_privacy_policy),
    ] {
        let _ = writeln!(html, "<p><strong>{}:</strong> {}</p>", label, check(flag));
    }

    let _ = writeln!(html, "<h2>💡 改进建议</h2>");
    match &r.suggestions {
        // 建议片段本身就是 HTML
        Some(fragment) => {
            let _ = writeln!(html, "{}", fragment);
        }
        None => {
            let _ = writeln!(html, "<p>改进建议获取失败</p>");
        }
    }

    let _ = writeln!(html, "</body>\n</html>");
    html
}
