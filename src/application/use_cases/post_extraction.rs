//! Turns serialized profile/feed HTML into post records.
//!
//! Everything here is pure: the browser layer hands over `document`
//! snapshots and these functions pick them apart with CSS selectors, so the
//! selector cascades can be exercised against fixture markup.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

use crate::domain::post::{Post, UNKNOWN_DATE};

pub const UNKNOWN_PROFILE: &str = "Unknown Profile";

const POST_CONTAINERS: &[&str] = &[
    ".update-components-actor",
    ".feed-shared-update-v2",
    ".occludable-update",
    ".profile-activity-card",
    ".artdeco-card",
    ".activity-card",
    "div[data-urn]",
];

const TEXT_CONTAINERS: &[&str] = &[
    ".feed-shared-update-v2__description",
    ".feed-shared-text",
    ".update-components-text",
    ".feed-shared-update__description",
    ".update-components-update-content",
    ".activity-card__content",
];

const PARAGRAPHS: &str = "p, span.break-words, div.break-words";

const FALLBACK_TEXT: &[&str] = &[
    ".feed-shared-update-v2__description",
    ".feed-shared-text",
    ".update-components-text",
    ".feed-shared-update__description",
    ".update-components-update-content",
    ".update-components-text span",
    ".activity-card__content",
    "p, span",
];

const DATE_SELECTORS: &[&str] = &[
    ".feed-shared-actor__sub-description",
    ".feed-shared-time-ago",
    ".update-components-actor__sub-description",
    "time",
    ".activity-card__date",
];

const LIKES_SELECTORS: &[&str] = &[
    ".social-details-social-counts__reactions-count",
    r#"span[data-test-id="social-actions__reaction-count"]"#,
    r#"button[aria-label*="reactions"]"#,
];

const COMMENTS_SELECTORS: &[&str] = &[
    ".social-details-social-counts__comments",
    r#"button[aria-label*="comment"]"#,
];

const SHARES_SELECTORS: &[&str] = &[
    ".social-details-social-counts__item--right-aligned",
    r#"button[aria-label*="repost"]"#,
];

const NAME_SELECTORS: &[&str] = &[
    "h1.text-heading-xlarge",
    "h1.pv-top-card-section__name",
    "h1.pv-text-details__title",
    ".profile-card-one-to-one__container h1",
    ".ph5 h1",
    "h1",
];

/// Trailing markers LinkedIn appends to collapsed posts.
const TRUNCATION_MARKERS: &[&str] = &["...more", "…more", "see more", "See more"];

const MIN_TEXT_LEN: usize = 5;

/// URN kinds that resolve under `/feed/update/`.
const FEED_URN_PREFIXES: &[&str] = &["urn:li:activity:", "urn:li:ugcPost:", "urn:li:share:"];

static COUNT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:[,.]\d+)?)\s*([KkMm])?").unwrap());

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"linkedin\.com/in/([^/?#]+)").unwrap());

/// Compact relative dates such as `3d`, `2w`, `1mo`, `5h`.
static SHORT_AGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b\d+\s*(?:s|m|h|d|w|mo|yr|y)\b").unwrap());

static LOGIN_MARKERS: Lazy<Selector> =
    Lazy::new(|| selector(r#"a[href*="login"], form[action*="login"], .profile-unavailable, .guest-view"#));

static ANY_ELEMENT: Lazy<Selector> = Lazy::new(|| selector("a, button, span, div, p, li"));

static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e:?}"))
}

fn select_all<'a>(root: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(sel) => root.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

fn select_first<'a>(root: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    select_all(root, css).into_iter().next()
}

/// Elements that start and end their own line when rendered.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "section", "article", "header", "footer", "blockquote", "h1", "h2",
    "h3", "h4", "h5", "h6", "tr", "pre",
];

const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Approximates the browser's `innerText`: `<br>` and block boundaries break
/// lines, whitespace runs inside text collapse to one space, each line is
/// trimmed and consecutive blank lines fold into one.
fn inner_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    render_into(element, &mut raw);

    let mut lines: Vec<&str> = Vec::new();
    for line in raw.split('\n').map(str::trim) {
        if line.is_empty() && lines.last().map_or(true, |last| last.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last() == Some(&"") {
        lines.pop();
    }
    lines.join("\n")
}

fn render_into(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            push_collapsed(out, text);
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();
        if name == "br" {
            out.push('\n');
        } else if HIDDEN_TAGS.contains(&name) {
            continue;
        } else if BLOCK_TAGS.contains(&name) {
            break_line(out);
            render_into(child, out);
            break_line(out);
        } else {
            render_into(child, out);
        }
    }
}

fn push_collapsed(out: &mut String, text: &str) {
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !out.ends_with(' ') && !out.ends_with('\n') {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
    }
}

fn break_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| String::from(&**t)))
        .collect::<String>()
        .trim()
        .to_string()
}

fn usable_text(text: &str) -> bool {
    !text.is_empty() && !text.starts_with("Translate") && !text.contains("...more")
}

/// Whether the page is a login wall, a guest view or the login form itself.
pub fn login_required(url: &str, html: &str) -> bool {
    if url.contains("login") || url.contains("signup") {
        return true;
    }

    let document = Html::parse_document(html);
    if document.select(&LOGIN_MARKERS).next().is_some() {
        return true;
    }

    document.select(&ANY_ELEMENT).any(|el| {
        let text = own_text(el);
        text == "Sign in" || text == "Join now"
    })
}

pub fn profile_name(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = document.root_element();

    for css in NAME_SELECTORS {
        if let Some(element) = select_first(root, css) {
            let name = inner_text(element);
            if !name.is_empty() {
                return name;
            }
        }
    }

    if let Some(title) = document.select(&TITLE).next() {
        let title = inner_text(title);
        if let Some((name, _)) = title.split_once(" | LinkedIn") {
            let name = name.trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }

    UNKNOWN_PROFILE.to_string()
}

pub fn profile_username(url: &str) -> Option<String> {
    USERNAME_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn activity_url(username: &str) -> String {
    format!("https://www.linkedin.com/in/{}/recent-activity/all/", username)
}

/// Parse engagement counts such as `1,2K`, `3.4M` or `57 reactions`.
/// A comma is read as a decimal separator. Unparseable text counts as 0.
pub fn parse_count(text: &str) -> u64 {
    let Some(caps) = COUNT_PATTERN.captures(text) else {
        return 0;
    };
    let number = caps[1].replace(',', ".");
    let Ok(mut value) = number.parse::<f64>() else {
        return 0;
    };
    match caps.get(2).map(|m| m.as_str().to_ascii_uppercase()) {
        Some(ref m) if m == "K" => value *= 1_000.0,
        Some(ref m) if m == "M" => value *= 1_000_000.0,
        _ => {}
    }
    value as u64
}

fn looks_like_date(text: &str) -> bool {
    text.contains("ago")
        || text.contains("day")
        || text.contains("week")
        || text.contains("month")
        || SHORT_AGE_PATTERN.is_match(text)
}

fn post_text(element: ElementRef<'_>) -> String {
    let mut best = String::new();

    for css in TEXT_CONTAINERS {
        let Some(container) = select_first(element, css) else {
            continue;
        };
        let paragraphs: Vec<String> = select_all(container, PARAGRAPHS)
            .into_iter()
            .map(inner_text)
            .filter(|text| usable_text(text))
            .collect();
        if paragraphs.is_empty() {
            continue;
        }
        let combined = paragraphs.join("\n\n");
        if combined.len() > best.len() {
            best = combined;
        }
    }

    if !best.is_empty() {
        return best;
    }

    for css in FALLBACK_TEXT {
        for candidate in select_all(element, css) {
            let text = inner_text(candidate);
            if text.len() > MIN_TEXT_LEN && usable_text(&text) && text.len() > best.len() {
                best = text;
            }
        }
    }

    best
}

fn post_date(element: ElementRef<'_>) -> String {
    for css in DATE_SELECTORS {
        if let Some(found) = select_first(element, css) {
            let text = inner_text(found);
            if !text.is_empty() && looks_like_date(&text) {
                return text;
            }
        }
    }

    select_all(element, "span")
        .into_iter()
        .map(inner_text)
        .find(|text| text.contains("ago"))
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}

fn first_count(element: ElementRef<'_>, selectors: &[&str]) -> Option<u64> {
    for css in selectors {
        if let Some(found) = select_first(element, css) {
            let text = inner_text(found);
            let text = if text.is_empty() {
                found.value().attr("aria-label").unwrap_or_default().to_string()
            } else {
                text
            };
            return Some(parse_count(&text));
        }
    }
    None
}

fn post_likes(element: ElementRef<'_>) -> u64 {
    if let Some(likes) = first_count(element, LIKES_SELECTORS) {
        return likes;
    }
    select_all(element, "span")
        .into_iter()
        .map(inner_text)
        .find(|text| text.contains("Like"))
        .map(|text| parse_count(&text))
        .unwrap_or(0)
}

/// Permalink built from the first feed URN on the element or its ancestors.
fn post_url(element: ElementRef<'_>) -> Option<String> {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .filter_map(|el| el.value().attr("data-urn"))
        .find(|urn| FEED_URN_PREFIXES.iter().any(|prefix| urn.starts_with(prefix)))
        .map(|urn| format!("https://www.linkedin.com/feed/update/{}/", urn))
}

/// Extract every post currently present in the document, first occurrence
/// of each text wins.
pub fn extract_posts(html: &str) -> Vec<Post> {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let mut posts: Vec<Post> = Vec::new();
    let mut seen = HashSet::new();

    for css in POST_CONTAINERS {
        for element in select_all(root, css) {
            let text = post_text(element);
            if text.is_empty() || !seen.insert(text.clone()) {
                continue;
            }

            posts.push(Post {
                date: post_date(element),
                likes: post_likes(element),
                comments: first_count(element, COMMENTS_SELECTORS).unwrap_or(0),
                shares: first_count(element, SHARES_SELECTORS).unwrap_or(0),
                url: post_url(element),
                text,
            });
        }
    }

    posts
}

/// Append posts whose text is not already collected, up to `limit` in total.
/// Returns how many were added.
pub fn merge_unique(existing: &mut Vec<Post>, incoming: Vec<Post>, limit: usize) -> usize {
    let mut seen: HashSet<String> = existing.iter().map(|p| p.text.clone()).collect();
    let mut added = 0;
    for post in incoming {
        if existing.len() >= limit {
            break;
        }
        if seen.insert(post.text.clone()) {
            existing.push(post);
            added += 1;
        }
    }
    added
}

/// Drop a trailing "see more" style marker left by collapsed posts.
pub fn clean_post_text(text: &str) -> String {
    let trimmed = text.trim_end();
    for marker in TRUNCATION_MARKERS {
        if let Some(stripped) = trimmed.strip_suffix(marker) {
            return stripped.trim_end().to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVITY_PAGE: &str = r#"
        <html><head><title>Jane Doe | LinkedIn</title></head>
        <body>
          <div class="feed-shared-update-v2" data-urn="urn:li:activity:7001">
            <span class="update-components-actor__sub-description">2d • Edited</span>
            <div class="update-components-text">
              <span class="break-words">First paragraph of the launch post.</span>
              <span class="break-words">Second paragraph with details.</span>
              <span class="break-words">Translate post</span>
            </div>
            <span class="social-details-social-counts__reactions-count">1,2K</span>
            <button aria-label="34 comments on Jane Doe's post">34 comments</button>
            <button aria-label="5 reposts of Jane Doe's post">5 reposts</button>
          </div>
          <div class="feed-shared-update-v2" data-urn="urn:li:activity:7002">
            <time>3 weeks ago</time>
            <div class="feed-shared-text"><p>Short update about hiring.</p></div>
          </div>
          <div class="feed-shared-update-v2" data-urn="urn:li:activity:7003">
            <div class="feed-shared-text"><p>ok</p></div>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_extract_posts_reads_text_date_and_counts() {
        let posts = extract_posts(ACTIVITY_PAGE);
        assert_eq!(posts.len(), 3);

        let first = &posts[0];
        assert_eq!(
            first.text,
            "First paragraph of the launch post.\n\nSecond paragraph with details."
        );
        assert_eq!(first.date, "2d • Edited");
        assert_eq!(first.likes, 1200);
        assert_eq!(first.comments, 34);
        assert_eq!(first.shares, 5);
        assert_eq!(
            first.url.as_deref(),
            Some("https://www.linkedin.com/feed/update/urn:li:activity:7001/")
        );

        let second = &posts[1];
        assert_eq!(second.text, "Short update about hiring.");
        assert_eq!(second.date, "3 weeks ago");
        assert_eq!(second.likes, 0);
    }

    #[test]
    fn test_overlapping_containers_do_not_duplicate_posts() {
        let html = r#"
            <div data-urn="urn:li:activity:1">
              <div class="feed-shared-update-v2">
                <div class="feed-shared-text"><p>Nested post body text</p></div>
              </div>
            </div>
        "#;
        let posts = extract_posts(html);
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].url.as_deref(),
            Some("https://www.linkedin.com/feed/update/urn:li:activity:1/")
        );
        assert_eq!(posts[0].date, UNKNOWN_DATE);
    }

    #[test]
    fn test_line_breaks_survive_extraction() {
        let html = r#"
            <div class="feed-shared-update-v2" data-urn="urn:li:activity:9">
              <div class="update-components-text">
                <span class="break-words"><span dir="ltr">Excited to share our launch!<br><br>We shipped v2 today.<br>Thanks team</span></span>
              </div>
            </div>
        "#;
        let posts = extract_posts(html);
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].text,
            "Excited to share our launch!\n\nWe shipped v2 today.\nThanks team"
        );
    }

    #[test]
    fn test_source_whitespace_collapses() {
        let html = r#"
            <div class="feed-shared-update-v2">
              <div class="feed-shared-text">
                <p>
                  A sentence wrapped
                  over   several lines.
                </p>
                <p>Second<script>var x = 1;</script> paragraph</p>
              </div>
            </div>
        "#;
        let posts = extract_posts(html);
        assert_eq!(posts[0].text, "A sentence wrapped over several lines.\n\nSecond paragraph");
    }

    #[test]
    fn test_ugc_post_urn_and_ancestor_lookup() {
        let html = r#"
            <div data-urn="urn:li:ugcPost:42">
              <div class="feed-shared-update-v2" data-urn="urn:li:aggregate:1">
                <div class="feed-shared-text"><p>Posted from a ugc container</p></div>
              </div>
            </div>
        "#;
        let posts = extract_posts(html);
        assert_eq!(
            posts[0].url.as_deref(),
            Some("https://www.linkedin.com/feed/update/urn:li:ugcPost:42/")
        );
    }

    #[test]
    fn test_fallback_text_takes_longest_span() {
        let html = r#"
            <div class="activity-card">
              <span>Tiny</span>
              <span>A longer standalone text block</span>
              <span>Read the ...more</span>
            </div>
        "#;
        let posts = extract_posts(html);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].text, "A longer standalone text block");
    }

    #[test]
    fn test_cards_without_text_are_skipped() {
        let html = r#"<div class="artdeco-card"><img src="x.png"></div>"#;
        assert!(extract_posts(html).is_empty());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("57"), 57);
        assert_eq!(parse_count("1K"), 1000);
        assert_eq!(parse_count("2,3K"), 2300);
        assert_eq!(parse_count("1.5m"), 1_500_000);
        assert_eq!(parse_count("Like"), 0);
        assert_eq!(parse_count("128 reactions"), 128);
        assert_eq!(parse_count(""), 0);
    }

    #[test]
    fn test_login_required_detection() {
        let wall = r#"<nav><a href="https://www.linkedin.com/login?trk=x">Sign in</a></nav>"#;
        assert!(login_required("https://www.linkedin.com/in/jane/", wall));

        let join = r#"<div><button>Join now</button></div>"#;
        assert!(login_required("https://www.linkedin.com/", join));

        let guest = r#"<main class="guest-view"></main>"#;
        assert!(login_required("https://www.linkedin.com/in/jane/", guest));

        assert!(login_required("https://www.linkedin.com/signup/cold-join", "<html></html>"));

        let feed = r#"<main><h1>Home</h1><a href="/in/jane/">Jane</a></main>"#;
        assert!(!login_required("https://www.linkedin.com/feed/", feed));
    }

    #[test]
    fn test_profile_name_selectors_and_title_fallback() {
        let html = r#"<div class="ph5"><h1 class="text-heading-xlarge"> Jane Doe </h1></div>"#;
        assert_eq!(profile_name(html), "Jane Doe");

        let html = r#"<html><head><title>John Roe | LinkedIn</title></head><body></body></html>"#;
        assert_eq!(profile_name(html), "John Roe");

        assert_eq!(profile_name("<h1>\n   Jane\n   Doe\n</h1>"), "Jane Doe");

        assert_eq!(profile_name("<html><body></body></html>"), UNKNOWN_PROFILE);
    }

    #[test]
    fn test_profile_username() {
        assert_eq!(
            profile_username("https://www.linkedin.com/in/jane-doe-123/").as_deref(),
            Some("jane-doe-123")
        );
        assert_eq!(
            profile_username("https://www.linkedin.com/in/jane?trk=feed").as_deref(),
            Some("jane")
        );
        assert!(profile_username("https://www.linkedin.com/company/acme/").is_none());
        assert_eq!(
            activity_url("jane"),
            "https://www.linkedin.com/in/jane/recent-activity/all/"
        );
    }

    #[test]
    fn test_merge_unique_respects_limit_and_duplicates() {
        let mut posts = vec![Post::new("a post", UNKNOWN_DATE)];
        let incoming = vec![
            Post::new("a post", UNKNOWN_DATE),
            Post::new("b post", UNKNOWN_DATE),
            Post::new("c post", UNKNOWN_DATE),
        ];
        let added = merge_unique(&mut posts, incoming, 2);
        assert_eq!(added, 1);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].text, "b post");
    }

    #[test]
    fn test_clean_post_text() {
        assert_eq!(clean_post_text("Great news ...more"), "Great news");
        assert_eq!(clean_post_text("Great news\nsee more"), "Great news");
        assert_eq!(clean_post_text("Great news See more  "), "Great news");
        assert_eq!(clean_post_text("Nothing to strip"), "Nothing to strip");
    }
}
