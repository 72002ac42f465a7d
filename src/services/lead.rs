//! 获客能力分析 - 业务能力层
//!
//! 启发式评估页面承接商务咨询的能力：联系入口、公司信息、表单、CTA 等

use serde::Deserialize;

use crate::error::AppResult;
use crate::infrastructure::{eval_as, PageProbe};
use crate::models::LeadFacts;

/// 未配置文本生成服务时的提示
pub const NOT_CONFIGURED_MESSAGE: &str = "未配置文本生成服务，获客能力按默认 3 分计";

pub(crate) const LEAD_SCRIPT: &str = r#"
(() => {
    const text = (document.body ? document.body.innerText : '').slice(0, 200000);
    const links = Array.from(document.querySelectorAll('a[href]')).slice(0, 2000).map(a => ({
        text: (a.textContent || '').trim().slice(0, 200),
        href: a.getAttribute('href') || ''
    }));
    const buttons = Array.from(document.querySelectorAll(
        'button, input[type="submit"], input[type="button"], [role="button"]'
    )).slice(0, 1000).map(b => ((b.textContent || b.value || '') + '').trim().slice(0, 200));
    return {
        text,
        formCount: document.querySelectorAll('form').length,
        links,
        buttons
    };
})()
"#;

const CONTACT_WORDING: &[&str] = &["お問い合わせ", "問い合わせ", "联系我们", "咨询", "contact us"];
const COMPANY_WORDING: &[&str] = &["会社概要", "企業情報", "公司简介", "关于我们", "about us"];

const CONTACT_LINK: &[&str] = &["contact", "inquiry", "問い合わせ", "联系", "咨询"];
const CASE_STUDY_LINK: &[&str] = &["case", "works", "customers", "事例", "実績", "案例"];
const PRICING_LINK: &[&str] = &["pricing", "price", "plan", "料金", "価格", "价格"];
const DOWNLOAD_LINK: &[&str] = &["download", "whitepaper", "資料", "下载", "白皮书"];
const COMPANY_LINK: &[&str] = &["about", "company", "会社概要", "企業情報", "公司", "关于我们"];
const FAQ_LINK: &[&str] = &["faq", "よくある質問", "常见问题"];
const PRIVACY_LINK: &[&str] = &["privacy", "プライバシー", "隐私"];
const CTA_WORDING: &[&str] = &[
    "お問い合わせ",
    "資料請求",
    "無料",
    "申し込",
    "contact",
    "demo",
    "trial",
    "free",
    "get started",
    "sign up",
    "免费",
    "咨询",
    "预约",
    "立即",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkSignal {
    pub text: String,
    pub href: String,
}

/// 页面上采集到的原始信号
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSignals {
    pub text: String,
    pub form_count: usize,
    #[serde(default)]
    pub links: Vec<LinkSignal>,
    #[serde(default)]
    pub buttons: Vec<String>,
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|n| lower.contains(&n.to_lowercase()))
}

impl LeadSignals {
    fn has_link(&self, needles: &[&str]) -> bool {
        self.links
            .iter()
            .any(|l| contains_any(&l.text, needles) || contains_any(&l.href, needles))
    }

    fn cta_count(&self) -> usize {
        let buttons = self
            .buttons
            .iter()
            .filter(|b| contains_any(b, CTA_WORDING))
            .count();
        let links = self
            .links
            .iter()
            .filter(|l| contains_any(&l.text, CTA_WORDING))
            .count();
        buttons + links
    }
}

/// 根据采集到的信号计算获客能力
///
/// 未配置文本生成服务时固定 3 分（其余数据照常填写）；
/// 否则基础 2 分，出现联系方式文案 +1，出现公司信息文案 +1，上限 5 分
pub fn evaluate_lead(signals: &LeadSignals, narrative_configured: bool) -> LeadFacts {
    let has_contact_wording = contains_any(&signals.text, CONTACT_WORDING);
    let has_company_wording = contains_any(&signals.text, COMPANY_WORDING);

    let mut facts = LeadFacts {
        score: 3,
        message: None,
        form_count: signals.form_count,
        cta_count: signals.cta_count(),
        has_contact_page: signals.has_link(CONTACT_LINK),
        has_case_studies: signals.has_link(CASE_STUDY_LINK),
        has_pricing_page: signals.has_link(PRICING_LINK),
        has_resource_downloads: signals.has_link(DOWNLOAD_LINK),
        has_company_info: has_company_wording || signals.has_link(COMPANY_LINK),
        has_faq: signals.has_link(FAQ_LINK),
        has_privacy_policy: signals.has_link(PRIVACY_LINK),
        degraded: false,
    };

    if !narrative_configured {
        facts.message = Some(NOT_CONFIGURED_MESSAGE.to_string());
        facts.degraded = true;
        return facts;
    }

    let mut score = 2u8;
    if has_contact_wording {
        score += 1;
    }
    if has_company_wording {
        score += 1;
    }
    facts.score = score.min(5);
    facts
}

/// 采集页面信号并评估获客能力
pub async fn analyze_lead<P>(probe: &P, narrative_configured: bool) -> AppResult<LeadFacts>
where
    P: PageProbe + ?Sized,
{
    let signals: LeadSignals = eval_as(probe, "lead", LEAD_SCRIPT).await?;
    Ok(evaluate_lead(&signals, narrative_configured))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(text: &str) -> LeadSignals {
        LeadSignals {
            text: text.to_string(),
            form_count: 1,
            links: vec![
                LinkSignal {
                    text: "料金プラン".to_string(),
                    href: "/pricing".to_string(),
                },
                LinkSignal {
                    text: "Privacy".to_string(),
                    href: "/privacy-policy".to_string(),
                },
            ],
            buttons: vec!["無料で試す".to_string(), "Search".to_string()],
        }
    }

    #[test]
    fn test_score_counts_contact_and_company_wording() {
        let facts = evaluate_lead(&signals("お問い合わせはこちら。会社概要"), true);
        assert_eq!(facts.score, 4);
        assert!(!facts.degraded);
        assert!(facts.has_pricing_page);
        assert!(facts.has_privacy_policy);
        assert!(facts.has_company_info);
        assert!(!facts.has_faq);
        assert_eq!(facts.cta_count, 1);
        assert_eq!(facts.form_count, 1);
    }

    #[test]
    fn test_base_score_without_signals() {
        let facts = evaluate_lead(&signals("nothing relevant"), true);
        assert_eq!(facts.score, 2);
    }

    #[test]
    fn test_unconfigured_narrative_gives_fixed_three() {
        let facts = evaluate_lead(&signals("お問い合わせ 会社概要"), false);
        assert_eq!(facts.score, 3);
        assert!(facts.degraded);
        assert_eq!(facts.message.as_deref(), Some(NOT_CONFIGURED_MESSAGE));
        // 其余数据照常采集
        assert!(facts.has_pricing_page);
    }

    #[test]
    fn test_english_wording_is_case_insensitive() {
        let facts = evaluate_lead(&signals("Contact Us | About Us"), true);
        assert_eq!(facts.score, 4);
    }
}
