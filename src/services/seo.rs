//! SEO 分析 - 业务能力层
//!
//! 直接在文档 HTML 上做正则提取，不依赖页面

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{HeadingCounts, ImageCounts, SeoFacts};

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static META_NAME_FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\s+name=["']description["']\s+content=["'](.*?)["']"#)
        .expect("valid regex")
});
static META_CONTENT_FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\s+content=["'](.*?)["']\s+name=["']description["']"#)
        .expect("valid regex")
});
static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>.*?</h1>").expect("valid regex"));
static H2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h2[^>]*>.*?</h2>").expect("valid regex"));
static H3_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h3[^>]*>.*?</h3>").expect("valid regex"));
static IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img[^>]*>").expect("valid regex"));
static IMG_WITH_ALT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]*alt=["'][^"']*["'][^>]*>"#).expect("valid regex")
});

/// 从文档 HTML 提取 SEO 数据
pub fn extract_seo(html: &str) -> SeoFacts {
    let title = capture_non_empty(&TITLE_RE, html);
    let meta_description = capture_non_empty(&META_NAME_FIRST_RE, html)
        .or_else(|| capture_non_empty(&META_CONTENT_FIRST_RE, html));

    let total = IMG_RE.find_iter(html).count();
    let with_alt = IMG_WITH_ALT_RE.find_iter(html).count();

    SeoFacts {
        title,
        meta_description,
        headings: HeadingCounts {
            h1: H1_RE.find_iter(html).count(),
            h2: H2_RE.find_iter(html).count(),
            h3: H3_RE.find_iter(html).count(),
        },
        images: ImageCounts {
            total,
            with_alt,
            without_alt: total.saturating_sub(with_alt),
        },
        degraded: false,
    }
}

fn capture_non_empty(re: &Regex, html: &str) -> Option<String> {
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}
