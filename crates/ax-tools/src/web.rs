//! `HttpWebProvider` — the reference [`WebProvider`] implementation.
//!
//! Fetch safety properties, carried over from the host this crate descends
//! from:
//! - Hard timeout (default 20s, configurable via `AX_WEB_TIMEOUT_SECS`)
//! - Max response size (default 5MB, configurable via `AX_WEB_MAX_BYTES`)
//! - Max text output (default 250k chars, configurable via
//!   `AX_WEB_MAX_TEXT_CHARS`)
//! - Redirect limit (5 hops)
//! - SSRF guard: only `http`/`https` schemes, and every resolved address for
//!   the host must be public — DNS resolution happens before the request is
//!   sent, not after, so a bare IP literal can't bypass the check.
//!
//! Search uses a separately configured JSON search endpoint (e.g. a
//! self-hosted SearXNG instance) rather than a specific vendor SDK, matching
//! the same "configurable endpoint, not a vendor integration" shape as
//! `ax-providers`'s adapters.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use ax_domain::error::{Error, Result};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Url;
use serde_json::Value;

use crate::traits::{FetchResult, SearchHit, WebProvider};

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || is_v4_shared_address(v4)
                || is_v4_documentation(v4)
                || is_v4_benchmarking(v4)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || is_v6_unique_local(v6)
                || is_v6_link_local(v6)
        }
    }
}

/// 100.64.0.0/10 — Shared address space (RFC 6598 / CGNAT).
fn is_v4_shared_address(ip: &Ipv4Addr) -> bool {
    let o = ip.octets();
    o[0] == 100 && (o[1] & 0xC0) == 64
}

/// Documentation ranges: 192.0.2.0/24, 198.51.100.0/24, 203.0.113.0/24.
fn is_v4_documentation(ip: &Ipv4Addr) -> bool {
    let o = ip.octets();
    (o[0] == 192 && o[1] == 0 && o[2] == 2)
        || (o[0] == 198 && o[1] == 51 && o[2] == 100)
        || (o[0] == 203 && o[1] == 0 && o[2] == 113)
}

/// Benchmarking range: 198.18.0.0/15.
fn is_v4_benchmarking(ip: &Ipv4Addr) -> bool {
    let o = ip.octets();
    o[0] == 198 && (o[1] & 0xFE) == 18
}

/// Unique-local addresses: fc00::/7 (in practice fd00::/8).
fn is_v6_unique_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xFE00) == 0xFC00
}

/// Link-local addresses: fe80::/10.
fn is_v6_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xFFC0) == 0xFE80
}

/// Validate a URL for SSRF safety before making a request: only `http`(s),
/// and every address the host resolves to must be public.
fn validate_url(raw_url: &str) -> std::result::Result<(), String> {
    let parsed = Url::parse(raw_url).map_err(|e| format!("invalid URL: {e}"))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("blocked scheme: {other}:// (only http/https allowed)")),
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| "URL has no host".to_string())?;
    let port = parsed.port_or_known_default().unwrap_or(80);

    let addr_str = format!("{host}:{port}");
    let addrs: Vec<_> = addr_str
        .to_socket_addrs()
        .map_err(|e| format!("DNS resolution failed for {host}: {e}"))?
        .collect();

    if addrs.is_empty() {
        return Err(format!("DNS resolution returned no addresses for {host}"));
    }

    for addr in &addrs {
        if is_private_ip(&addr.ip()) {
            return Err(format!(
                "blocked request to private/internal address: {host} resolves to {}",
                addr.ip()
            ));
        }
    }

    Ok(())
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// HTML-to-text extraction without a parser dependency: strips tags,
/// drops script/style bodies, collapses whitespace, decodes common entities.
fn html_to_text(html: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;
    let mut tag_buf = String::new();

    for ch in html.chars() {
        if out.chars().count() >= max_chars {
            break;
        }
        match ch {
            '<' => {
                in_tag = true;
                tag_buf.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let tag_lower = tag_buf.to_lowercase();
                if tag_lower.starts_with("script") {
                    in_script = true;
                } else if tag_lower.starts_with("/script") {
                    in_script = false;
                } else if tag_lower.starts_with("style") {
                    in_style = true;
                } else if tag_lower.starts_with("/style") {
                    in_style = false;
                }
                if tag_lower.starts_with('/')
                    && matches!(
                        tag_lower.trim_start_matches('/'),
                        "p" | "div"
                            | "h1"
                            | "h2"
                            | "h3"
                            | "h4"
                            | "h5"
                            | "h6"
                            | "li"
                            | "tr"
                            | "br"
                            | "article"
                            | "section"
                            | "header"
                            | "footer"
                            | "blockquote"
                    )
                {
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                } else if tag_lower == "br" || tag_lower == "br/" {
                    out.push('\n');
                }
                tag_buf.clear();
            }
            _ if in_tag => tag_buf.push(ch),
            _ if in_script || in_style => {}
            _ => out.push(ch),
        }
    }

    let out = out
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");

    let mut result = String::new();
    let mut prev_newline = false;
    for line in out.lines() {
        let trimmed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if trimmed.is_empty() {
            if !prev_newline {
                result.push('\n');
                prev_newline = true;
            }
        } else {
            result.push_str(&trimmed);
            result.push('\n');
            prev_newline = false;
        }
    }
    result.trim().to_string()
}

pub struct HttpWebProvider {
    client: reqwest::Client,
    max_bytes: usize,
    max_text_chars: usize,
    search_base_url: Option<String>,
}

impl HttpWebProvider {
    pub fn new() -> Result<Self> {
        let timeout_s = std::env::var("AX_WEB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(20);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_s))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Other(format!("build web client: {e}")))?;

        Ok(Self {
            client,
            max_bytes: env_usize("AX_WEB_MAX_BYTES", 5 * 1024 * 1024),
            max_text_chars: env_usize("AX_WEB_MAX_TEXT_CHARS", 250_000),
            search_base_url: std::env::var("AX_WEB_SEARCH_BASE_URL").ok(),
        })
    }
}

#[async_trait]
impl WebProvider for HttpWebProvider {
    async fn fetch(&self, url: &str, extract_text: bool) -> Result<FetchResult> {
        validate_url(url).map_err(Error::Other)?;

        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, "ax/1.0")
            .header("Accept", "text/html,application/xhtml+xml,application/json,text/plain")
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let mut stream = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Http(e.to_string()))?;
            if buf.len() + chunk.len() > self.max_bytes {
                return Err(Error::Other(format!(
                    "response exceeded {} byte limit",
                    self.max_bytes
                )));
            }
            buf.extend_from_slice(&chunk);
        }

        let text = if extract_text && content_type.contains("html") {
            html_to_text(&String::from_utf8_lossy(&buf), self.max_text_chars)
        } else {
            let s = String::from_utf8_lossy(&buf).to_string();
            if s.chars().count() > self.max_text_chars {
                s.chars().take(self.max_text_chars).collect()
            } else {
                s
            }
        };

        Ok(FetchResult {
            url: url.to_string(),
            status,
            content_type,
            bytes: buf.len(),
            text,
        })
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let base = self.search_base_url.as_deref().ok_or_else(|| {
            Error::Config("AX_WEB_SEARCH_BASE_URL not configured".into())
        })?;

        let resp = self
            .client
            .get(format!("{}/search", base.trim_end_matches('/')))
            .query(&[("q", query), ("format", "json")])
            .header(USER_AGENT, "ax/1.0")
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let body: Value = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        let results = body
            .get("results")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(results
            .into_iter()
            .take(limit)
            .filter_map(|r| {
                Some(SearchHit {
                    title: r.get("title")?.as_str()?.to_string(),
                    url: r.get("url")?.as_str()?.to_string(),
                    snippet: r
                        .get("content")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_to_text_strips_tags() {
        let html = "<html><body><h1>Hello</h1><p>World</p><script>var x=1;</script></body></html>";
        let text = html_to_text(html, 10_000);
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
        assert!(!text.contains("var x=1"));
    }

    #[test]
    fn html_to_text_decodes_entities() {
        let text = html_to_text("<p>A &amp; B &lt; C</p>", 10_000);
        assert!(text.contains("A & B < C"));
    }

    #[test]
    fn html_to_text_respects_char_limit() {
        let html = "<p>This is a very long text that should be truncated</p>";
        let text = html_to_text(html, 10);
        assert!(text.chars().count() <= 15);
    }

    #[test]
    fn is_private_ip_detects_loopback_and_rfc1918() {
        assert!(is_private_ip(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_ip(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_ip(&"172.16.0.1".parse().unwrap()));
        assert!(is_private_ip(&"192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn is_private_ip_detects_cloud_metadata() {
        assert!(is_private_ip(&"169.254.169.254".parse().unwrap()));
    }

    #[test]
    fn is_private_ip_allows_public_addresses() {
        assert!(!is_private_ip(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_ip(
            &"2607:f8b0:4004:800::200e".parse().unwrap()
        ));
    }

    #[test]
    fn validate_url_rejects_non_http_schemes() {
        assert!(validate_url("file:///etc/passwd").is_err());
        assert!(validate_url("ftp://example.com/file").is_err());
        assert!(validate_url("data:text/html,<h1>hi</h1>").is_err());
    }

    #[test]
    fn validate_url_rejects_loopback_and_private_targets() {
        assert!(validate_url("http://127.0.0.1/admin").is_err());
        assert!(validate_url("http://169.254.169.254/latest/meta-data/").is_err());
        assert!(validate_url("http://[::1]/admin").is_err());
    }

    #[test]
    fn validate_url_rejects_malformed_urls() {
        assert!(validate_url("not a url at all").is_err());
        assert!(validate_url("http:///path").is_err());
    }
}
