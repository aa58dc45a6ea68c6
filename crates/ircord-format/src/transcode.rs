//! IRC control codes <-> Discord markdown.
//!
//! Both directions protect underscores inside URL tokens (words starting with
//! `http` or `<http`) so a link such as `https://host/a_b_c` never turns into
//! italics.

use std::sync::LazyLock;

use regex::Regex;

pub const BOLD: char = '\x02';
pub const COLOR: char = '\x03';
pub const RESET: char = '\x0f';
pub const REVERSE: char = '\x16';
pub const ITALIC: char = '\x1d';
pub const UNDERLINE: char = '\x1f';

/// Placeholder for underscores inside URL tokens while markers are rewritten.
const URL_UNDERSCORE: char = '\u{E000}';

static COLOR_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x03(\d{1,2}(,\d{1,2})?)?").expect("valid color regex"));

fn is_url_token(token: &str) -> bool {
    token.starts_with("http") || token.starts_with("<http")
}

fn protect_urls(text: &str) -> String {
    text.split(' ')
        .map(|token| {
            if is_url_token(token) {
                token.replace('_', &URL_UNDERSCORE.to_string())
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn restore_urls(text: &str) -> String {
    text.replace(URL_UNDERSCORE, "_")
}

/// Convert an IRC line to Discord markdown.
///
/// Colors and resets are dropped, underline is treated as italic. Unclosed
/// runs are closed at the end of the line, innermost first, so the markdown
/// emitted always has paired markers.
pub fn irc_to_markdown(text: &str) -> String {
    let protected = protect_urls(text);
    let mut m = COLOR_CODE.replace_all(&protected, "").into_owned();
    m.retain(|c| c != RESET && c != REVERSE);
    let m = m.replace(UNDERLINE, &ITALIC.to_string());
    restore_urls(&emphasis_to_markdown(&m))
}

/// Rewrite bold and italic codes as markdown.
///
/// Adjacent bold and italic codes become `***` only when both open or both
/// close there; italic opened that way also closes as `*`.
fn emphasis_to_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    // Open runs in opening order, each with the marker it was opened with.
    let mut open: Vec<(char, &'static str)> = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != BOLD && c != ITALIC {
            out.push(c);
            continue;
        }
        let other = if c == BOLD { ITALIC } else { BOLD };
        if chars.peek() == Some(&other) {
            if open.is_empty() {
                chars.next();
                out.push_str("***");
                open.push((BOLD, "**"));
                open.push((ITALIC, "*"));
                continue;
            }
            if opened_together(&open) {
                chars.next();
                out.push_str("***");
                open.clear();
                continue;
            }
        }
        toggle(&mut out, &mut open, c);
    }

    if opened_together(&open) {
        out.push_str("***");
    } else {
        while let Some((_, marker)) = open.pop() {
            out.push_str(marker);
        }
    }
    out
}

/// Bold and a `*` italic are the only open runs.
fn opened_together(open: &[(char, &'static str)]) -> bool {
    open.len() == 2 && open.iter().any(|&(m, s)| m == ITALIC && s == "*")
}

fn toggle(out: &mut String, open: &mut Vec<(char, &'static str)>, code: char) {
    if let Some(i) = open.iter().position(|&(m, _)| m == code) {
        out.push_str(open.remove(i).1);
    } else {
        let marker = if code == BOLD { "**" } else { "_" };
        out.push_str(marker);
        open.push((code, marker));
    }
}

/// Replace every `marker` with `code`, unless the marker occurs only once.
fn replace_paired(text: &str, marker: &str, code: &str) -> String {
    if text.matches(marker).count() == 1 {
        text.to_string()
    } else {
        text.replace(marker, code)
    }
}

/// Convert Discord markdown to IRC control codes.
///
/// Markers are rewritten longest first (`***`, `**`, `*`); code fences are
/// removed and `_` becomes italic. A marker that appears exactly once is left
/// literal.
pub fn markdown_to_irc(text: &str) -> String {
    let bold_italic = format!("{ITALIC}{BOLD}");
    let mut m = protect_urls(text);
    m = replace_paired(&m, "***", &bold_italic);
    m = replace_paired(&m, "**", &BOLD.to_string());
    m = replace_paired(&m, "*", &ITALIC.to_string());
    m = replace_paired(&m, "```", "");
    m = replace_paired(&m, "_", &ITALIC.to_string());
    restore_urls(&m)
}

/// Remove every IRC formatting code.
pub fn strip_irc_formatting(text: &str) -> String {
    let mut m = COLOR_CODE.replace_all(text, "").into_owned();
    m.retain(|c| !matches!(c, BOLD | RESET | REVERSE | ITALIC | UNDERLINE));
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irc_bold_and_italic_become_markdown() {
        assert_eq!(irc_to_markdown("\x02hi\x02 there"), "**hi** there");
        assert_eq!(irc_to_markdown("\x1dit\x1d"), "_it_");
        assert_eq!(irc_to_markdown("\x1funder\x1f"), "_under_");
        assert_eq!(irc_to_markdown("\x02\x1dboth\x1d\x02"), "***both***");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(
            irc_to_markdown("**hi** http://x.com/a_b"),
            "**hi** http://x.com/a_b"
        );
        assert_eq!(markdown_to_irc("nothing special here"), "nothing special here");
    }

    #[test]
    fn unclosed_irc_runs_are_closed() {
        assert_eq!(irc_to_markdown("\x02loud"), "**loud**");
        assert_eq!(irc_to_markdown("\x1dlean"), "_lean_");
        let out = irc_to_markdown("\x02a\x02 \x02b");
        assert_eq!(out.matches("**").count() % 2, 0);
    }

    #[test]
    fn unclosed_runs_close_innermost_first() {
        assert_eq!(irc_to_markdown("\x02a\x1d"), "**a_**");
        assert_eq!(irc_to_markdown("\x1da\x02"), "_a**_");
        assert_eq!(irc_to_markdown("\x02\x1da"), "***a***");
        assert_eq!(irc_to_markdown("\x1d\x02a\x02 b"), "***a** b*");
    }

    #[test]
    fn adjacent_close_and_open_do_not_collapse() {
        assert_eq!(irc_to_markdown("\x1dx\x1d\x02y\x02"), "_x_**y**");
        assert_eq!(irc_to_markdown("\x1d\x02both\x02\x1d"), "***both***");
    }

    #[test]
    fn closed_output_has_even_marker_counts() {
        let lines = [
            "\x02a\x1d",
            "\x1da\x02",
            "\x02\x1da",
            "\x1fx\x02y\x1fz",
            "\x02a\x02 \x02b",
            "\x1d\x02a\x02 b",
            "\x02\x1dx\x1d y\x1d",
            "\x0304red\x02 bold\x1f under",
        ];
        for line in lines {
            let out = irc_to_markdown(line);
            assert_eq!(out.matches('*').count() % 2, 0, "{line:?} -> {out:?}");
            assert_eq!(out.matches('_').count() % 2, 0, "{line:?} -> {out:?}");
        }
    }

    #[test]
    fn balanced_markdown_reaches_a_fixed_point() {
        let messages = [
            "**bold** and *it* and ***both***",
            "_soft_ words",
            "plain **b** text",
            "see https://a.com/x_y and **b**",
            "```code``` then *lean*",
        ];
        for m in messages {
            let once = markdown_to_irc(m);
            let twice = markdown_to_irc(&irc_to_markdown(&once));
            assert_eq!(twice, once, "{m:?}");
            assert_eq!(markdown_to_irc(&irc_to_markdown(&twice)), twice, "{m:?}");
        }
    }

    #[test]
    fn colors_and_resets_are_dropped() {
        assert_eq!(irc_to_markdown("\x0304,12red\x03 text\x0f"), "red text");
        assert_eq!(irc_to_markdown("\x033green"), "green");
    }

    #[test]
    fn url_underscores_survive_both_directions() {
        assert_eq!(
            irc_to_markdown("see \x1dhttp://a.com/x_y_z\x1d"),
            "see _http://a.com/x_y_z_"
        );
        assert_eq!(
            markdown_to_irc("see https://a.com/x_y and <https://b.org/p_q>"),
            "see https://a.com/x_y and <https://b.org/p_q>"
        );
    }

    #[test]
    fn markdown_markers_become_control_codes() {
        assert_eq!(
            markdown_to_irc("**bold** and *it* and ***both***"),
            "\x02bold\x02 and \x1dit\x1d and \x1d\x02both\x1d\x02"
        );
        assert_eq!(markdown_to_irc("_soft_"), "\x1dsoft\x1d");
        assert_eq!(markdown_to_irc("```code```"), "code");
    }

    #[test]
    fn lone_markers_stay_literal() {
        assert_eq!(markdown_to_irc("5 * 3"), "5 * 3");
        assert_eq!(markdown_to_irc("snake_case"), "snake_case");
    }

    #[test]
    fn strip_removes_all_codes() {
        assert_eq!(
            strip_irc_formatting("\x02b\x02 \x0304c\x03 \x1di\x1d\x0f"),
            "b c i"
        );
    }
}
