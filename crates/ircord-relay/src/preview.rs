//! Link previews: page title, video length and a short description of URLs
//! posted on Discord, sent to the linked IRC channel.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use ircord_core::Word;
use ircord_format::UptimeUnits;
use regex::Regex;
use tracing::{debug, warn};

use crate::context::BridgeContext;
use crate::error::Result;

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));
static META: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\s[^>]*>").expect("valid meta regex"));
static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z][\w:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attr regex")
});
static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p(?:\s[^>]*)?>(.*?)</p>").expect("valid paragraph regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?T?(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("valid duration regex")
});

/// What a page says about itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagePreview {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Video length in seconds.
    pub duration: Option<u64>,
}

impl PagePreview {
    /// Lines to post: `(title | 1h 2m 3s)` and `(description)`.
    /// Nothing without a title.
    pub fn lines(&self, units: UptimeUnits<'_>) -> Vec<String> {
        let Some(title) = &self.title else {
            return Vec::new();
        };
        let mut head = title.clone();
        if let Some(secs) = self.duration {
            head.push_str(" | ");
            head.push_str(&format_video_length(secs, units));
        }
        let mut lines = vec![format!("({head})")];
        if let Some(desc) = &self.description {
            lines.push(format!("({desc})"));
        }
        lines
    }
}

fn meta_tags(html: &str) -> Vec<HashMap<String, String>> {
    META.find_iter(html)
        .map(|tag| {
            ATTR.captures_iter(tag.as_str())
                .map(|c| {
                    let value = c.get(2).or_else(|| c.get(3)).map_or("", |m| m.as_str());
                    (c[1].to_lowercase(), value.to_string())
                })
                .collect()
        })
        .collect()
}

fn meta_content(tags: &[HashMap<String, String>], attr: &str, value: &str) -> Option<String> {
    tags.iter()
        .find(|t| t.get(attr).is_some_and(|v| v.eq_ignore_ascii_case(value)))
        .and_then(|t| t.get("content"))
        .map(|c| clean_text(c))
        .filter(|c| !c.is_empty())
}

/// Strip tags, decode entities, collapse whitespace.
fn clean_text(raw: &str) -> String {
    let text = TAG.replace_all(raw, " ");
    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Seconds in an ISO-8601 duration such as `PT1H2M3S`.
pub fn parse_iso_duration(value: &str) -> Option<u64> {
    let caps = ISO_DURATION.captures(value.trim())?;
    let part = |i: usize| caps.get(i).map_or(Ok(0), |m| m.as_str().parse::<u64>());
    let (days, hours, minutes, seconds) = (part(1).ok()?, part(2).ok()?, part(3).ok()?, part(4).ok()?);
    Some(((days * 24 + hours) * 60 + minutes) * 60 + seconds)
}

/// `1h 2m 3s`, or `2m 3s` under an hour.
pub fn format_video_length(secs: u64, units: UptimeUnits<'_>) -> String {
    let (hours, rem) = (secs / 3600, secs % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    if hours > 0 {
        format!(
            "{hours}{} {minutes}{} {seconds}{}",
            units.hour, units.minute, units.second
        )
    } else {
        format!("{minutes}{} {seconds}{}", units.minute, units.second)
    }
}

/// Extract title, description and video length from an HTML page.
pub fn extract_preview(html: &str) -> PagePreview {
    let tags = meta_tags(html);
    let title = TITLE
        .captures(html)
        .map(|c| clean_text(&c[1]))
        .filter(|t| !t.is_empty());
    let description = meta_content(&tags, "property", "og:description")
        .or_else(|| meta_content(&tags, "name", "twitter:description"))
        .or_else(|| meta_content(&tags, "name", "description"))
        .or_else(|| {
            PARAGRAPH
                .captures(html)
                .map(|c| clean_text(&c[1]))
                .filter(|p| !p.is_empty())
        });
    let duration = tags
        .iter()
        .find(|t| t.get("itemprop").is_some_and(|v| v == "duration"))
        .and_then(|t| t.get("content"))
        .and_then(|c| parse_iso_duration(c));
    PagePreview {
        title,
        description,
        duration,
    }
}

/// Most of a page read while looking for a preview.
const MAX_PAGE_BYTES: usize = 512 * 1024;

/// Append `chunk` to `body` without growing past `limit`; true once full.
fn append_capped(body: &mut Vec<u8>, chunk: &[u8], limit: usize) -> bool {
    let room = limit.saturating_sub(body.len());
    body.extend_from_slice(&chunk[..chunk.len().min(room)]);
    body.len() >= limit
}

async fn fetch_preview(http: &reqwest::Client, url: &str) -> Result<Option<PagePreview>> {
    let mut resp = http.get(url).send().await?.error_for_status()?;
    let is_html = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("html"));
    if !is_html {
        return Ok(None);
    }
    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        if append_capped(&mut body, &chunk, MAX_PAGE_BYTES) {
            debug!(%url, "page truncated for preview");
            break;
        }
    }
    Ok(Some(extract_preview(&String::from_utf8_lossy(&body))))
}

/// Preview `urls` on `irc_channel` from a background task, one second from now.
pub fn schedule_preview(ctx: &Arc<BridgeContext>, urls: Vec<String>, irc_channel: &str) {
    if !ctx.config.preview.enabled || urls.is_empty() {
        return;
    }
    let ctx_job = Arc::clone(ctx);
    let channel = irc_channel.to_string();
    let job = async move {
        tokio::spawn(preview_urls(ctx_job, urls, channel));
    };
    if let Err(e) = ctx.scheduler.schedule("", 1.0, job) {
        warn!(error = %e, "could not schedule link preview");
    }
}

async fn preview_urls(ctx: Arc<BridgeContext>, urls: Vec<String>, irc_channel: String) {
    for url in urls.iter().take(ctx.config.preview.max_urls) {
        match fetch_preview(&ctx.http, url).await {
            Ok(Some(preview)) => {
                let lang = ctx.language();
                let units = UptimeUnits {
                    day: ctx.locale.word(&lang, Word::DayShort),
                    hour: ctx.locale.word(&lang, Word::HourShort),
                    minute: ctx.locale.word(&lang, Word::MinuteShort),
                    second: ctx.locale.word(&lang, Word::SecondShort),
                };
                for line in preview.lines(units) {
                    ctx.say_on_irc(&irc_channel, &line);
                }
            }
            Ok(None) => debug!(%url, "not an html page, no preview"),
            Err(e) => warn!(%url, error = %e, "link preview failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
        <title>  Rust &amp; IRC
        </title>
        <meta content="A video about bridges" property="og:description">
        <meta name="description" content="fallback">
        <meta itemprop="duration" content="PT1H2M3S">
        </head><body><p>first</p></body></html>"#;

    #[test]
    fn extracts_title_description_and_duration() {
        let preview = extract_preview(PAGE);
        assert_eq!(preview.title.as_deref(), Some("Rust & IRC"));
        assert_eq!(preview.description.as_deref(), Some("A video about bridges"));
        assert_eq!(preview.duration, Some(3723));
        assert_eq!(
            preview.lines(UptimeUnits::default()),
            vec!["(Rust & IRC | 1h 2m 3s)", "(A video about bridges)"]
        );
    }

    #[test]
    fn description_falls_back_to_first_paragraph() {
        let html = "<title>T</title><pre>x</pre><p class=\"lead\">Hello <b>world</b></p>";
        let preview = extract_preview(html);
        assert_eq!(preview.description.as_deref(), Some("Hello world"));
        assert_eq!(preview.duration, None);
    }

    #[test]
    fn no_title_means_no_lines() {
        let preview = extract_preview("<p>only text</p>");
        assert!(preview.lines(UptimeUnits::default()).is_empty());
    }

    #[test]
    fn short_videos_omit_hours() {
        assert_eq!(parse_iso_duration("PT4M5S"), Some(245));
        assert_eq!(format_video_length(245, UptimeUnits::default()), "4m 5s");
        assert_eq!(parse_iso_duration("garbage"), None);
    }

    #[test]
    fn entities_decode() {
        assert_eq!(decode_entities("a &lt;b&gt; &#39;c&#x27; & d"), "a <b> 'c' & d");
    }

    #[test]
    fn body_stops_growing_at_the_cap() {
        let mut body = Vec::new();
        assert!(!append_capped(&mut body, b"abcd", 10));
        assert!(append_capped(&mut body, b"efghijkl", 10));
        assert_eq!(body, b"abcdefghij");
        assert!(append_capped(&mut body, b"more", 10));
        assert_eq!(body.len(), 10);
    }

    /// Serve one HTML response on a loopback port and return its URL.
    async fn serve_once(body: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = sock.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = sock.write_all(head.as_bytes()).await;
            let _ = sock.write_all(body.as_bytes()).await;
        });
        format!("http://{addr}/")
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn fetches_title_from_small_page() {
        let url = serve_once(PAGE.to_string()).await;
        let preview = fetch_preview(&client(), &url).await.unwrap().unwrap();
        assert_eq!(preview.title.as_deref(), Some("Rust & IRC"));
    }

    #[tokio::test]
    async fn ignores_content_past_the_cap() {
        let page = format!("<html>{}<title>late</title></html>", " ".repeat(MAX_PAGE_BYTES));
        let url = serve_once(page).await;
        let preview = fetch_preview(&client(), &url).await.unwrap().unwrap();
        assert_eq!(preview.title, None);
    }
}
