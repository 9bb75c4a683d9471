//! Tag extraction from authority response payloads.
//!
//! WSAA sometimes returns the login ticket as escaped markup inside the SOAP
//! body instead of a decoded structure. One extraction routine serves both the
//! primary and the fallback path so the two cannot drift apart.

/// Extract the text content of the first `<name>...</name>` element, accepting
/// both literal and entity-escaped angle brackets.
pub(crate) fn extract_tag(text: &str, name: &str) -> Option<String> {
    extract_between(text, &format!("<{}>", name), &format!("</{}>", name)).or_else(|| {
        extract_between(
            text,
            &format!("&lt;{}&gt;", name),
            &format!("&lt;/{}&gt;", name),
        )
    })
}

/// Extract the text content of every `<name>...</name>` element, in order.
pub(crate) fn extract_all_tags(text: &str, name: &str) -> Vec<String> {
    let mut found = collect_between(text, &format!("<{}>", name), &format!("</{}>", name));
    if found.is_empty() {
        found = collect_between(
            text,
            &format!("&lt;{}&gt;", name),
            &format!("&lt;/{}&gt;", name),
        );
    }
    found
}

fn extract_between(text: &str, open: &str, close: &str) -> Option<String> {
    let start = text.find(open)? + open.len();
    let end = text[start..].find(close)? + start;
    Some(unescape(text[start..end].trim()))
}

fn collect_between(text: &str, open: &str, close: &str) -> Vec<String> {
    let mut results = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        let content_start = start + open.len();
        match rest[content_start..].find(close) {
            Some(offset) => {
                let content_end = content_start + offset;
                results.push(unescape(rest[content_start..content_end].trim()));
                rest = &rest[content_end + close.len()..];
            }
            None => break,
        }
    }
    results
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
