use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;

static CUSTOM_EMOJI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a?:(\w*):\d*>").expect("valid emoji regex"));

/// Rewrite Discord custom emoji markup `<:name:123>` (or `<a:name:123>`) to `:name:`.
pub fn rewrite_custom_emoji(text: &str) -> String {
    CUSTOM_EMOJI.replace_all(text, ":$1:").into_owned()
}

/// First `max_chars` characters of `text` followed by `...` when it is longer.
pub fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Collapse doubled angle brackets left over from nesting nick wrappers.
pub fn tidy_tags(text: &str) -> String {
    text.replace("<<", "<")
        .replace(">>", ">")
        .replace("<[", "[")
        .replace("]>", "]")
}

/// `HH:MM` of `ts` shifted by `shift_hours`.
pub fn local_hhmm(ts: DateTime<Utc>, shift_hours: i64) -> String {
    (ts + chrono::Duration::hours(shift_hours))
        .format("%H:%M")
        .to_string()
}

/// Localized unit suffixes for [`format_uptime`].
#[derive(Debug, Clone, Copy)]
pub struct UptimeUnits<'a> {
    pub day: &'a str,
    pub hour: &'a str,
    pub minute: &'a str,
    pub second: &'a str,
}

impl Default for UptimeUnits<'_> {
    fn default() -> Self {
        Self {
            day: "d",
            hour: "h",
            minute: "m",
            second: "s",
        }
    }
}

/// Render an elapsed time as `1d 2h 3m 4s`, omitting zero leading units.
pub fn format_uptime(elapsed: Duration, units: UptimeUnits<'_>) -> String {
    let total = elapsed.as_secs();
    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}{}", units.day));
    }
    if days > 0 || hours > 0 {
        parts.push(format!("{hours}{}", units.hour));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        parts.push(format!("{minutes}{}", units.minute));
    }
    parts.push(format!("{seconds}{}", units.second));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn custom_emoji_markup_is_reduced_to_name() {
        assert_eq!(
            rewrite_custom_emoji("hi <:wave:1234> and <a:dance:99>"),
            "hi :wave: and :dance:"
        );
        assert_eq!(rewrite_custom_emoji("no emoji <here>"), "no emoji <here>");
    }

    #[test]
    fn shorten_respects_char_boundaries() {
        assert_eq!(shorten("short", 70), "short");
        let long = "ä".repeat(80);
        let out = shorten(&long, 70);
        assert_eq!(out.chars().count(), 73);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn tidy_collapses_nested_wrappers() {
        assert_eq!(tidy_tags("<<nick>> said <[x]>"), "<nick> said [x]");
    }

    #[test]
    fn hhmm_applies_shift_and_wraps() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 23, 15, 0).unwrap();
        assert_eq!(local_hhmm(ts, 2), "01:15");
        assert_eq!(local_hhmm(ts, 0), "23:15");
    }

    #[test]
    fn uptime_formatting() {
        let units = UptimeUnits::default();
        assert_eq!(format_uptime(Duration::from_secs(0), units), "0s");
        assert_eq!(format_uptime(Duration::from_secs(65), units), "1m 5s");
        assert_eq!(
            format_uptime(Duration::from_secs(86_400 + 2 * 3_600 + 3 * 60 + 4), units),
            "1d 2h 3m 4s"
        );
        assert_eq!(format_uptime(Duration::from_secs(86_400), units), "1d 0h 0m 0s");
    }
}
