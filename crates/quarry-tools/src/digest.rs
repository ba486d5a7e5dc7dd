use crate::search::WebResult;

/// Render results as blank-line separated `Title/URL/Content` blocks, each
/// content excerpt cut to `excerpt_chars` characters.
#[must_use]
pub fn format_digest(results: &[WebResult], excerpt_chars: usize) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "Title: {}\nURL: {}\nContent: {}...",
                r.title,
                r.url,
                excerpt(&r.content, excerpt_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Leading `max_chars` characters of `content`, cut on a char boundary.
#[must_use]
pub fn excerpt(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}
