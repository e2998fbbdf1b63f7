//! Application configuration.
//!
//! Values are layered with figment: built-in defaults, then an optional TOML
//! file, then `POSTSCRAPER_*` environment variables (nested keys use `__`,
//! e.g. `POSTSCRAPER_SERVER__PORT=8080`).

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::error::Result;

pub const CONFIG_FILE: &str = "postscraper.toml";
pub const CONFIG_PATH_ENV: &str = "POSTSCRAPER_CONFIG";
const ENV_PREFIX: &str = "POSTSCRAPER_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub browser: BrowserSettings,
    pub scrape: ScrapeSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run Chromium without a window. Manual login needs a visible window.
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub default_timeout_secs: u64,
    pub launch_timeout_secs: u64,
    /// Pause after every page interaction.
    pub action_delay_ms: u64,
    /// Local ports probed for an already running browser with remote debugging.
    pub debugger_ports: Vec<u16>,
    pub discovery_timeout_secs: u64,
    pub chrome_executable: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            viewport_width: 1280,
            viewport_height: 1024,
            default_timeout_secs: 90,
            launch_timeout_secs: 60,
            action_delay_ms: 100,
            debugger_ports: vec![9222, 9223, 9224],
            discovery_timeout_secs: 2,
            chrome_executable: None,
        }
    }
}

impl BrowserSettings {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }

    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    pub default_max_posts: usize,
    pub navigation_timeout_ms: u64,
    /// Wait after a navigation so client-side rendering can finish.
    pub settle_delay_ms: u64,
    /// Shorter wait used after opening the home page for the login check.
    pub login_check_delay_ms: u64,
    pub scroll_delay_ms: u64,
    pub max_scroll_attempts: usize,
    /// Consecutive scrolls without page growth before giving up.
    pub stalled_scroll_limit: usize,
    pub expand_delay_ms: u64,
    pub login_timeout_secs: u64,
    pub login_poll_interval_ms: u64,
    pub login_grace_secs: u64,
    pub screenshots: bool,
    pub screenshot_every: usize,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            default_max_posts: crate::domain::scrape_session::DEFAULT_MAX_POSTS,
            navigation_timeout_ms: 60_000,
            settle_delay_ms: 5_000,
            login_check_delay_ms: 3_000,
            scroll_delay_ms: 2_000,
            max_scroll_attempts: 20,
            stalled_scroll_limit: 3,
            expand_delay_ms: 500,
            login_timeout_secs: 300,
            login_poll_interval_ms: 1_000,
            login_grace_secs: 30,
            screenshots: true,
            screenshot_every: 5,
        }
    }
}

impl ScrapeSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn login_check_delay(&self) -> Duration {
        Duration::from_millis(self.login_check_delay_ms)
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }

    pub fn expand_delay(&self) -> Duration {
        Duration::from_millis(self.expand_delay_ms)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn login_poll_interval(&self) -> Duration {
        Duration::from_millis(self.login_poll_interval_ms)
    }

    pub fn login_grace(&self) -> Duration {
        Duration::from_secs(self.login_grace_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub directory: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
        }
    }
}

impl AppConfig {
    /// Load from `POSTSCRAPER_CONFIG` if set, otherwise `postscraper.toml` in the
    /// working directory. A missing file is not an error.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config = Self::figment(path).extract()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
