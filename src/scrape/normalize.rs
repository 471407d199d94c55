//! Payload normalization rules, unit-tested exhaustively: small, pure
//! string helpers in the same style as the crate's other trivial
//! string utilities.

use regex::Regex;
use std::sync::OnceLock;

const INVALID_AUTHORS: &[&str] = &["anon", "[deleted]", "unknown"];

/// Ensure a leading `/` and strip a trailing `/`.
pub fn normalize_permalink(permalink: &str) -> String {
    let mut s = if permalink.starts_with('/') {
        permalink.to_string()
    } else {
        format!("/{permalink}")
    };
    while s.len() > 1 && s.ends_with('/') {
        s.pop();
    }
    s
}

/// True if the URL looks like an image: `.jpg/.jpeg/.png/.webp/.gif`,
/// optionally followed by a query string.
pub fn looks_like_image(url: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)\.(jpg|jpeg|png|webp|gif)(\?.*)?$").expect("valid regex")
    });
    re.is_match(url.trim())
}

/// Reject the literal placeholder author values.
pub fn is_valid_author(author: &str) -> bool {
    !INVALID_AUTHORS.contains(&author)
}

/// Unescape the small set of HTML entities Reddit-style payloads carry.
pub fn html_unescape(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Repeatedly strip trailing `.`, `,`, `)`, `]`, `;` from a URL — guards
/// against sentence punctuation leaking into an extracted link.
pub fn strip_trailing_punctuation(url: &str) -> String {
    let mut s = url.to_string();
    while s
        .chars()
        .last()
        .map(|c| matches!(c, '.' | ',' | ')' | ']' | ';'))
        .unwrap_or(false)
    {
        s.pop();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permalink_gets_leading_slash() {
        assert_eq!(normalize_permalink("r/board/abc"), "/r/board/abc");
    }

    #[test]
    fn permalink_strips_trailing_slash() {
        assert_eq!(normalize_permalink("/r/board/abc/"), "/r/board/abc");
    }

    #[test]
    fn permalink_keeps_root_slash() {
        assert_eq!(normalize_permalink("/"), "/");
    }

    #[test]
    fn image_extensions_match_with_query_string() {
        assert!(looks_like_image("https://i.imgur.com/abc.jpg?width=600"));
        assert!(looks_like_image("https://i.imgur.com/abc.PNG"));
        assert!(!looks_like_image("https://example.com/page.html"));
    }

    #[test]
    fn rejects_placeholder_authors() {
        assert!(!is_valid_author("anon"));
        assert!(!is_valid_author("[deleted]"));
        assert!(!is_valid_author("unknown"));
        assert!(is_valid_author("real_user"));
    }

    #[test]
    fn unescapes_html_entities() {
        assert_eq!(html_unescape("Tom &amp; Jerry &lt;3&gt;"), "Tom & Jerry <3>");
        assert_eq!(html_unescape("&quot;quoted&quot; &#39;it&#39;s&#39;"), "\"quoted\" 'it's'");
    }

    #[test]
    fn strips_trailing_punctuation_repeatedly() {
        assert_eq!(
            strip_trailing_punctuation("https://example.com/a)).,;"),
            "https://example.com/a"
        );
        assert_eq!(strip_trailing_punctuation("https://example.com/a"), "https://example.com/a");
    }
}
