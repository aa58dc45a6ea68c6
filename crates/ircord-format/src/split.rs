/// Longest IRC protocol line the bridge emits, excluding CRLF.
pub const IRC_LINE_MAX: usize = 479;

/// Maximum characters per Discord message (2000 is the limit; we use 1950 for safety).
pub const DISCORD_CHUNK_MAX: usize = 1950;

/// Largest char boundary in `s` that is `<= at`, but never 0 for a non-empty `s`.
fn cut_point(s: &str, at: usize) -> usize {
    if at >= s.len() {
        return s.len();
    }
    let mut i = at;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    if i == 0 {
        s.chars().next().map_or(0, char::len_utf8)
    } else {
        i
    }
}

/// Split `text` into pieces of at most `max_bytes` bytes on space boundaries.
///
/// A word longer than `max_bytes` is cut at a char boundary.
pub fn split_irc_line(text: &str, max_bytes: usize) -> Vec<String> {
    let max_bytes = max_bytes.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split(' ') {
        let needed = if current.is_empty() {
            word.len()
        } else {
            current.len() + 1 + word.len()
        };
        if needed <= max_bytes {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        let mut rest = word;
        while rest.len() > max_bytes {
            let cut = cut_point(rest, max_bytes);
            lines.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        current.push_str(rest);
    }

    if !current.trim().is_empty() {
        lines.push(current);
    }
    lines
}

/// Split `text` into chunks of at most [`DISCORD_CHUNK_MAX`] bytes, preferring
/// splits on newline, then space boundaries.
pub fn chunk_discord(text: &str) -> Vec<String> {
    if text.len() <= DISCORD_CHUNK_MAX {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.len() > DISCORD_CHUNK_MAX {
        let window = &remaining[..cut_point(remaining, DISCORD_CHUNK_MAX)];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(window.len());

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_line_is_untouched() {
        assert_eq!(split_irc_line("hello world", 100), vec!["hello world"]);
        assert!(split_irc_line("", 100).is_empty());
    }

    #[test]
    fn words_are_kept_whole() {
        let lines = split_irc_line("aaa bbb ccc ddd", 7);
        assert_eq!(lines, vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn overlong_word_is_cut() {
        let lines = split_irc_line(&"x".repeat(25), 10);
        assert_eq!(lines, vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]);
    }

    #[test]
    fn cuts_never_split_multibyte_chars() {
        let text = "ö".repeat(20);
        for line in split_irc_line(&text, 7) {
            assert!(line.len() <= 7);
            assert!(line.chars().all(|c| c == 'ö'));
        }
    }

    #[test]
    fn short_text_is_single_chunk() {
        assert_eq!(chunk_discord("Hello, world!"), vec!["Hello, world!"]);
    }

    #[test]
    fn long_text_splits_on_newline() {
        let line = "a".repeat(1000);
        let chunks = chunk_discord(&format!("{line}\n{line}"));
        assert_eq!(chunks.len(), 2);
        for c in &chunks {
            assert!(c.len() <= DISCORD_CHUNK_MAX, "chunk too large: {}", c.len());
        }
    }

    #[test]
    fn very_long_multibyte_word_still_splits() {
        let chunks = chunk_discord(&"é".repeat(3000));
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.len() <= DISCORD_CHUNK_MAX);
        }
    }
}
