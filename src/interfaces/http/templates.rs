//! Embedded HTML pages with `{{name}}` placeholders.

const INDEX: &str = include_str!("templates/index.html");
const STATUS: &str = include_str!("templates/status.html");
const ERROR: &str = include_str!("templates/error.html");

pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Substitute every `{{key}}` with the escaped value in one pass, so
/// substituted text is never scanned again. Unknown placeholders stay as is.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let key = &after[..end];
        match values.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => out.push_str(&escape(value)),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

pub fn index_page(default_max_posts: usize, max_posts_limit: usize) -> String {
    let max_posts = default_max_posts.to_string();
    let limit = max_posts_limit.to_string();
    render(
        INDEX,
        &[("max_posts", max_posts.as_str()), ("max_posts_limit", limit.as_str())],
    )
}

pub fn status_page(session_id: &str, profile_url: &str, status: &str, message: &str, progress: u8) -> String {
    let progress = progress.to_string();
    render(
        STATUS,
        &[
            ("session_id", session_id),
            ("profile_url", profile_url),
            ("status", status),
            ("message", message),
            ("progress", progress.as_str()),
        ],
    )
}

pub fn error_page(message: &str) -> String {
    render(ERROR, &[("message", message)])
}
