//! 请求校验
//!
//! 先检查数量，再逐个检查 URL：协议必须是 http/https，
//! 主机不能是本机、内网、链路本地地址；开启解析时域名解析出的地址同样检查。

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use reqwest::Url;
use tracing::debug;

use crate::error::{AppResult, ValidationError};

/// 校验待分析的 URL 列表，返回规范化后的 URL
pub async fn validate_urls(
    urls: &[String],
    max_urls: usize,
    resolve_hostnames: bool,
) -> AppResult<Vec<String>> {
    if urls.is_empty() {
        return Err(ValidationError::EmptyUrlList.into());
    }
    if urls.len() > max_urls {
        return Err(ValidationError::TooManyUrls {
            count: urls.len(),
            max: max_urls,
        }
        .into());
    }

    let mut validated = Vec::with_capacity(urls.len());
    for raw in urls {
        validated.push(validate_url(raw, resolve_hostnames).await?);
    }
    Ok(validated)
}

/// 校验单个 URL
pub async fn validate_url(raw: &str, resolve_hostnames: bool) -> AppResult<String> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|_| ValidationError::MalformedUrl {
        url: raw.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::UnsupportedScheme {
                url: raw.to_string(),
                scheme: other.to_string(),
            }
            .into())
        }
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ValidationError::MalformedUrl {
            url: raw.to_string(),
        })?;
    let blocked = || ValidationError::BlockedHost {
        url: raw.to_string(),
    };

    // IPv6 字面量带方括号
    let bare_host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare_host.parse::<IpAddr>() {
        if is_blocked_ip(ip) {
            return Err(blocked().into());
        }
        return Ok(url.to_string());
    }

    let lower = bare_host.to_ascii_lowercase();
    let lower = lower.trim_end_matches('.');
    if lower == "localhost" || lower.ends_with(".localhost") {
        return Err(blocked().into());
    }

    if resolve_hostnames {
        let port = url.port_or_known_default().unwrap_or(80);
        match tokio::net::lookup_host((lower, port)).await {
            Ok(addrs) => {
                for addr in addrs {
                    if is_blocked_ip(addr.ip()) {
                        return Err(blocked().into());
                    }
                }
            }
            // 解析失败不算校验错误，导航时会记录为页面错误
            Err(e) => debug!("域名解析失败 {}: {}", lower, e),
        }
    }

    Ok(url.to_string())
}

/// 是否为禁止访问的地址
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_blocked_v4(v4);
            }
            is_blocked_v6(v6)
        }
    }
}

fn is_blocked_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_blocked_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7
        || (first & 0xfe00) == 0xfc00
        // fe80::/10
        || (first & 0xffc0) == 0xfe80
}
