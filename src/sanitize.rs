use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static SCRIPT_BLOCKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script>").expect("script pattern"));
static HTML_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag pattern"));

const DANGEROUS_PROTOCOLS: &[&str] = &["javascript:", "data:", "vbscript:", "file:", "about:"];

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Strips markup from untrusted free-text input, escapes what remains and
/// caps the length in characters.
pub fn sanitize_text(input: &str, max_len: usize) -> String {
    let without_scripts = SCRIPT_BLOCKS.replace_all(input, "");
    let without_tags = HTML_TAGS.replace_all(&without_scripts, "");
    let escaped = escape_html(without_tags.trim());
    escaped.chars().take(max_len).collect()
}

/// Vets an untrusted URL string: trims it, rejects dangerous protocols and
/// anything that is not well-formed http(s). Returns the trimmed URL when
/// acceptable.
pub fn sanitize_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    let lower = url.to_ascii_lowercase();
    if DANGEROUS_PROTOCOLS
        .iter()
        .any(|protocol| lower.starts_with(protocol))
    {
        return None;
    }

    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return None;
    }

    let parsed = Url::parse(url).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }

    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_text_strips_markup() {
        assert_eq!(
            sanitize_text("<script>alert(1)</script>hello", 100),
            "hello"
        );
        assert_eq!(sanitize_text("<b>bold</b> text", 100), "bold text");
        assert_eq!(sanitize_text("a & b < c", 100), "a &amp; b &lt; c");
    }

    #[test]
    fn test_sanitize_text_caps_length() {
        let long = "x".repeat(2000);
        assert_eq!(sanitize_text(&long, 500).len(), 500);
    }

    #[test]
    fn test_sanitize_url_accepts_http() {
        assert_eq!(
            sanitize_url("  https://example.com/page "),
            Some("https://example.com/page".to_string())
        );
        assert!(sanitize_url("http://example.com").is_some());
    }

    #[test]
    fn test_sanitize_url_rejects_dangerous_protocols() {
        assert_eq!(sanitize_url("javascript:alert(1)"), None);
        assert_eq!(sanitize_url("data:text/html,<h1>x</h1>"), None);
        assert_eq!(sanitize_url("file:///etc/passwd"), None);
        assert_eq!(sanitize_url("ftp://example.com"), None);
        assert_eq!(sanitize_url("example.com"), None);
        assert_eq!(sanitize_url(""), None);
    }
}
