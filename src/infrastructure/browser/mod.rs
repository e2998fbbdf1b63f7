//! Browser automation layer.
//!
//! The scraping use cases talk to a [`BrowserPage`]; the production
//! implementation drives Chromium over the DevTools protocol with
//! chromiumoxide, either by launching a fresh instance or by attaching to a
//! browser that already exposes a remote-debugging port.

mod chrome;
mod discovery;

pub use chrome::ChromeSession;
pub use discovery::find_debugger_endpoint;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::domain::error::Result;
use crate::infrastructure::config::BrowserSettings;

/// Element lookup understood by [`BrowserPage::click_first`].
///
/// `Text` matches elements of `tag` whose rendered text contains `needle`
/// (case-insensitive), the equivalent of `a:has-text("Activity")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ElementQuery {
    Css { selector: &'static str },
    Text { tag: &'static str, needle: &'static str },
}

impl fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementQuery::Css { selector } => f.write_str(selector),
            ElementQuery::Text { tag, needle } => write!(f, "{}:has-text(\"{}\")", tag, needle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    Loaded,
    /// The load did not finish in time; the partially rendered page is still usable.
    TimedOut,
}

#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<NavigationOutcome>;

    async fn current_url(&self) -> Result<String>;

    /// Full serialized DOM of the current document.
    async fn content(&self) -> Result<String>;

    async fn wait(&self, duration: Duration);

    async fn scroll_height(&self) -> Result<i64>;

    async fn scroll_to_bottom(&self) -> Result<()>;

    /// Clicks every button, span or link whose text contains one of `labels`.
    /// Returns the number of clicked elements.
    async fn expand_truncated(&self, labels: &[&str]) -> Result<usize>;

    /// Clicks the first element found for the queries, tried in order.
    async fn click_first(&self, queries: &[ElementQuery]) -> Result<Option<ElementQuery>>;

    /// Types `query` into the site search box and submits it.
    /// Returns `false` when the page has no search box.
    async fn search(&self, query: &str) -> Result<bool>;

    async fn screenshot(&self, path: &Path) -> Result<()>;
}

/// Attach to a running browser when one exposes a debugging port, otherwise
/// launch a new Chromium.
pub async fn open_session(settings: &BrowserSettings) -> Result<ChromeSession> {
    match find_debugger_endpoint(&settings.debugger_ports, settings.discovery_timeout()).await {
        Some(ws_url) => {
            info!(endpoint = %ws_url, "Connecting to existing browser");
            ChromeSession::connect(&ws_url, settings).await
        }
        None => {
            info!("Launching new browser");
            ChromeSession::launch(settings).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_display_matches_selector_syntax() {
        let css = ElementQuery::Css {
            selector: r#"a[href*="recent-activity/shares"]"#,
        };
        assert_eq!(css.to_string(), r#"a[href*="recent-activity/shares"]"#);

        let text = ElementQuery::Text {
            tag: "nav a",
            needle: "Activity",
        };
        assert_eq!(text.to_string(), r#"nav a:has-text("Activity")"#);
    }

    #[test]
    fn test_query_serializes_for_page_scripts() {
        let text = ElementQuery::Text {
            tag: "a",
            needle: "Posts",
        };
        let json = serde_json::to_value(text).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["tag"], "a");
        assert_eq!(json["needle"], "Posts");
    }
}
