// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 以字符串形式解析相对链接
///
/// 基准地址无法解析时返回 None
pub fn resolve_against(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    resolve_url(&base, href).ok().map(String::from)
}

/// 依次尝试多个基准地址解析链接，全部失败时原样返回
pub fn absolutize(bases: &[&str], href: &str) -> String {
    bases
        .iter()
        .filter(|base| !base.is_empty())
        .find_map(|base| resolve_against(base, href))
        .unwrap_or_else(|| href.to_string())
}
