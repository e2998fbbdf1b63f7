use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::application::use_cases::post_extraction::{
    activity_url, extract_posts, login_required, merge_unique, profile_name, profile_username,
    UNKNOWN_PROFILE,
};
use crate::domain::error::Result;
use crate::domain::post::{Post, ScrapeResults};
use crate::infrastructure::browser::{BrowserPage, ElementQuery};
use crate::infrastructure::config::ScrapeSettings;
use crate::infrastructure::storage::screenshot_path;

pub const HOME_URL: &str = "https://www.linkedin.com/";
pub const LOGIN_URL: &str = "https://www.linkedin.com/login";
pub const FEED_URL: &str = "https://www.linkedin.com/feed/";

const ACTIVITY_TABS: &[ElementQuery] = &[
    ElementQuery::Css { selector: r#"a[href*="recent-activity/shares"]"# },
    ElementQuery::Css { selector: r#"a[href*="recent-activity/posts"]"# },
    ElementQuery::Css { selector: r#"a[href*="detail/recent-activity"]"# },
    ElementQuery::Text { tag: "a", needle: "Activity" },
    ElementQuery::Text { tag: "a", needle: "Posts" },
    ElementQuery::Text { tag: "a", needle: "Articles" },
    ElementQuery::Text { tag: "nav a", needle: "Activity" },
];

const SEE_MORE_LABELS: &[&str] = &["see more", "...more", "…more", "read more"];

/// Drives a logged-in browser page through a profile and collects its posts.
pub struct ProfileScraper<'a, P: BrowserPage> {
    page: &'a P,
    settings: &'a ScrapeSettings,
    screenshots_dir: Option<PathBuf>,
}

impl<'a, P: BrowserPage> ProfileScraper<'a, P> {
    pub fn new(page: &'a P, settings: &'a ScrapeSettings) -> Self {
        Self {
            page,
            settings,
            screenshots_dir: None,
        }
    }

    pub fn with_screenshots(mut self, dir: PathBuf) -> Self {
        if self.settings.screenshots {
            self.screenshots_dir = Some(dir);
        }
        self
    }

    async fn open(&self, url: &str, settle: std::time::Duration) -> Result<()> {
        self.page.goto(url, self.settings.navigation_timeout()).await?;
        self.page.wait(settle).await;
        Ok(())
    }

    async fn snapshot(&self, label: &str) {
        let Some(dir) = &self.screenshots_dir else {
            return;
        };
        let path = screenshot_path(dir, label);
        if let Err(e) = self.page.screenshot(&path).await {
            warn!(label, error = %e, "Failed to take screenshot");
        }
    }

    async fn login_required_here(&self) -> Result<bool> {
        let url = self.page.current_url().await?;
        let html = self.page.content().await?;
        Ok(login_required(&url, &html))
    }

    /// Make sure the browser holds a LinkedIn session, waiting for the user to
    /// sign in by hand when it does not.
    pub async fn ensure_logged_in(&self) -> Result<bool> {
        info!("Checking if already logged in to LinkedIn...");
        self.open(HOME_URL, self.settings.login_check_delay()).await?;

        if !self.login_required_here().await? {
            info!("Already logged in to LinkedIn");
            return Ok(true);
        }

        info!("Not logged in. Opening LinkedIn login page...");
        self.page
            .goto(LOGIN_URL, self.settings.navigation_timeout())
            .await?;
        info!("Please log in to LinkedIn manually in the browser window");

        let poll = self.settings.login_poll_interval();
        let attempts = if poll.is_zero() {
            0
        } else {
            self.settings.login_timeout().as_millis() / poll.as_millis()
        };
        for _ in 0..attempts {
            if self.page.current_url().await?.contains("/feed") {
                info!("Successfully logged in to LinkedIn");
                return Ok(true);
            }
            self.page.wait(poll).await;
        }

        let url = self.page.current_url().await?;
        if url.contains("linkedin.com") && !url.contains("/login") {
            info!(url = %url, "Login wait expired but the session looks logged in");
            return Ok(true);
        }

        info!("Waiting a bit longer for login...");
        self.page.wait(self.settings.login_grace()).await;
        if !self.login_required_here().await? {
            info!("Successfully logged in to LinkedIn after waiting");
            return Ok(true);
        }

        warn!("Login did not complete in time");
        Ok(false)
    }

    /// Scrape up to `max_posts` posts. Failures are folded into a placeholder
    /// result so the caller always has something to export.
    pub async fn scrape_profile(&self, profile_url: &str, max_posts: usize) -> ScrapeResults {
        info!(profile_url, max_posts, "Starting scraping of LinkedIn profile");
        match self.try_scrape_profile(profile_url, max_posts).await {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, "Error scraping LinkedIn profile");
                ScrapeResults::failure(
                    "Error",
                    profile_url,
                    format!("Error scraping LinkedIn profile: {}", e),
                )
            }
        }
    }

    async fn try_scrape_profile(&self, profile_url: &str, max_posts: usize) -> Result<ScrapeResults> {
        self.open(profile_url, self.settings.settle_delay()).await?;

        if self.login_required_here().await? {
            warn!("LinkedIn login required");
            if !self.ensure_logged_in().await? {
                return Ok(ScrapeResults::failure(
                    "Login Failed",
                    profile_url,
                    "LinkedIn login failed. Please try again.",
                ));
            }
            info!(profile_url, "Navigating back to profile");
            self.open(profile_url, self.settings.settle_delay()).await?;
        }

        self.snapshot("profile").await;

        let name = profile_name(&self.page.content().await?);
        info!(profile_name = %name, "Profile name");

        let mut posts: Vec<Post> = Vec::new();

        match self.open_activity_tab(&name).await {
            Ok(true) => {
                let found = self.collect_posts(max_posts).await;
                info!(count = found.len(), "Extracted posts from activity tab");
                merge_unique(&mut posts, found, max_posts);
            }
            Ok(false) => warn!("Could not find activity/posts tab"),
            Err(e) => warn!(error = %e, "Error navigating to posts tab"),
        }

        if posts.len() < max_posts {
            if let Err(e) = self.collect_from_activity_url(profile_url, &mut posts, max_posts).await {
                warn!(error = %e, "Error with direct activity URL");
            }
        }

        if posts.len() < max_posts {
            if let Err(e) = self.collect_from_feed(&name, &mut posts, max_posts).await {
                warn!(error = %e, "Error with main feed search");
            }
        }

        posts.truncate(max_posts);
        info!(total = posts.len(), "Total posts found");
        Ok(ScrapeResults::new(name, profile_url, posts))
    }

    /// Reach a page listing the profile's posts: the activity tab, the
    /// recent-activity URL, or as a last resort the feed filtered by a search.
    async fn open_activity_tab(&self, name: &str) -> Result<bool> {
        if let Some(tab) = self.page.click_first(ACTIVITY_TABS).await? {
            info!(tab = %tab, "Clicked activity tab");
            self.page.wait(self.settings.settle_delay()).await;
            self.snapshot("tab_clicked").await;
            return Ok(true);
        }

        let current = self.page.current_url().await?;
        if let Some(username) = profile_username(&current) {
            let url = activity_url(&username);
            info!(url = %url, "Trying direct navigation to activity URL");
            match self.open(&url, self.settings.settle_delay()).await {
                Ok(()) => {
                    self.snapshot("direct_activity").await;
                    return Ok(true);
                }
                Err(e) => warn!(error = %e, "Error navigating directly to activity URL"),
            }
        }

        info!("Trying to access main feed as fallback");
        self.open(FEED_URL, self.settings.settle_delay()).await?;
        self.snapshot("feed").await;
        if name != UNKNOWN_PROFILE && self.page.search(name).await? {
            info!(query = %name, "Searching for posts by profile name");
            self.page.wait(self.settings.settle_delay()).await;
        }
        Ok(true)
    }

    async fn collect_from_activity_url(
        &self,
        profile_url: &str,
        posts: &mut Vec<Post>,
        max_posts: usize,
    ) -> Result<()> {
        let Some(username) = profile_username(profile_url) else {
            return Ok(());
        };
        let url = activity_url(&username);
        info!(url = %url, "Trying direct activity URL");
        self.open(&url, self.settings.settle_delay()).await?;

        let found = self.collect_posts(max_posts - posts.len()).await;
        let count = found.len();
        merge_unique(posts, found, max_posts);
        info!(count, "Extracted posts from direct activity URL");
        Ok(())
    }

    async fn collect_from_feed(&self, name: &str, posts: &mut Vec<Post>, max_posts: usize) -> Result<()> {
        info!("Trying main feed as last resort");
        self.open(FEED_URL, self.settings.settle_delay()).await?;

        if name != UNKNOWN_PROFILE && self.page.search(name).await? {
            info!(query = %name, "Searching feed");
            self.page.wait(self.settings.settle_delay()).await;
        }

        // Feed results mix authors; keep only posts mentioning the profile.
        let found: Vec<Post> = self
            .collect_posts(max_posts - posts.len())
            .await
            .into_iter()
            .filter(|post| post.text.contains(name))
            .collect();
        let added = merge_unique(posts, found, max_posts);
        info!(added, "Added posts from main feed");
        Ok(())
    }

    /// Scroll the current page, expanding collapsed posts and harvesting them
    /// after each scroll. Errors end the loop but keep what was collected.
    pub async fn collect_posts(&self, max_posts: usize) -> Vec<Post> {
        let mut posts = Vec::new();
        if max_posts == 0 {
            return posts;
        }
        if let Err(e) = self.scroll_and_extract(&mut posts, max_posts).await {
            error!(error = %e, collected = posts.len(), "Error extracting posts");
        }
        posts.truncate(max_posts);
        posts
    }

    async fn scroll_and_extract(&self, posts: &mut Vec<Post>, max_posts: usize) -> Result<()> {
        let mut last_height = self.page.scroll_height().await?;
        let mut stalled = 0;

        for attempt in 1..=self.settings.max_scroll_attempts {
            if posts.len() >= max_posts {
                break;
            }

            self.page.scroll_to_bottom().await?;
            self.page.wait(self.settings.scroll_delay()).await;

            let height = self.page.scroll_height().await?;
            if height == last_height {
                stalled += 1;
                if stalled >= self.settings.stalled_scroll_limit {
                    debug!(attempt, "Page stopped growing");
                    break;
                }
            } else {
                stalled = 0;
            }
            last_height = height;

            let expanded = self.page.expand_truncated(SEE_MORE_LABELS).await?;
            if expanded > 0 {
                debug!(expanded, "Expanded 'see more' content");
                self.page.wait(self.settings.expand_delay()).await;
            }

            let html = self.page.content().await?;
            merge_unique(posts, extract_posts(&html), max_posts);
            info!(attempt, found = posts.len(), "Posts after scroll");

            if self.settings.screenshot_every > 0 && attempt % self.settings.screenshot_every == 0 {
                self.snapshot(&format!("scroll_{}", attempt)).await;
            }
        }

        Ok(())
    }
}
