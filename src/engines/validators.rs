// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::ScraperError;
use std::net::IpAddr;
use tokio::net::lookup_host;
use url::Url;

/// 抓取源访问策略
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePolicy {
    /// 拒绝解析到私有地址的主机 (防止 SSRF)
    pub block_private_networks: bool,
    /// 禁止的域名，包含子域名
    pub blocked_domains: Vec<String>,
}

/// 校验抓取源格式
///
/// 只接受带主机名的 http / https URL
pub fn validate_source(source: &str) -> Result<Url, ScraperError> {
    let url = Url::parse(source.trim())
        .map_err(|e| ScraperError::Validation(format!("Invalid URL '{}': {}", source, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ScraperError::Validation(format!(
            "Unsupported URL scheme '{}' in '{}'",
            url.scheme(),
            source
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ScraperError::Validation(format!(
            "URL has no host: '{}'",
            source
        )));
    }

    Ok(url)
}

/// 按策略检查抓取源
///
/// 先检查域名黑名单，再在需要时解析 DNS 检查私有地址
pub async fn enforce_policy(url: &Url, policy: &SourcePolicy) -> Result<(), ScraperError> {
    let host = url
        .host_str()
        .ok_or_else(|| ScraperError::Validation("Missing host".to_string()))?;

    validate_domain_blacklist(host, &policy.blocked_domains)?;

    if !policy.block_private_networks {
        return Ok(());
    }

    if host == "localhost" {
        return Err(ScraperError::Validation(
            "SSRF protection: localhost is not allowed".to_string(),
        ));
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs = lookup_host(format!("{}:{}", host, port))
        .await
        .map_err(|e| ScraperError::connection(format!("DNS lookup failed: {}", e), url.as_str()))?;

    for addr in addrs {
        if is_private_ip(addr.ip()) {
            return Err(ScraperError::Validation(format!(
                "SSRF protection: Private IP access is not allowed: {}",
                addr.ip()
            )));
        }
    }

    Ok(())
}

/// 检查主机是否在黑名单域名中
pub fn validate_domain_blacklist(host: &str, blacklist: &[String]) -> Result<(), ScraperError> {
    for domain in blacklist {
        if host == domain || host.ends_with(&format!(".{}", domain)) {
            return Err(ScraperError::Validation(format!(
                "Domain {} is in blacklist",
                host
            )));
        }
    }
    Ok(())
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let [a, b, ..] = ipv4.octets();
            a == 10
                || (a == 172 && (16..=31).contains(&b))
                || (a == 192 && b == 168)
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_multicast()
                || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            let first = ipv6.segments()[0];
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // fc00::/7
                || (first & 0xfe00) == 0xfc00
                // fe80::/10
                || (first & 0xffc0) == 0xfe80
                || ipv6.is_multicast()
        }
    }
}
