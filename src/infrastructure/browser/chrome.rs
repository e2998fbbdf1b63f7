use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use chromiumoxide::Handler;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{BrowserPage, ElementQuery, NavigationOutcome};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::BrowserSettings;

const LAUNCH_ATTEMPTS: u64 = 3;

const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--no-sandbox",
    "--start-maximized",
    "--disable-extensions",
    "--disable-default-apps",
    "--disable-popup-blocking",
    "--no-first-run",
    "--no-default-browser-check",
];

const SEARCH_INPUT: &str = r#"input[placeholder*="Search"], input[aria-label*="Search"]"#;

const CLICK_QUERY_SCRIPT: &str = r#"
(query) => {
    let element = null;
    if (query.kind === 'css') {
        element = document.querySelector(query.selector);
    } else {
        const needle = query.needle.toLowerCase();
        element = Array.from(document.querySelectorAll(query.tag))
            .find((el) => (el.innerText || el.textContent || '').toLowerCase().includes(needle)) || null;
    }
    if (!element) return false;
    element.click();
    return true;
}
"#;

const EXPAND_SCRIPT: &str = r#"
(labels) => {
    const wanted = labels.map((label) => label.toLowerCase());
    let clicked = 0;
    for (const el of document.querySelectorAll('button, span, a')) {
        if (el.children.length > 2) continue;
        const text = (el.innerText || el.textContent || '').trim().toLowerCase();
        if (!text || text.length > 40) continue;
        if (wanted.some((label) => text.includes(label))) {
            try {
                el.click();
                clicked += 1;
            } catch (e) {}
        }
    }
    return clicked;
}
"#;

/// A Chromium tab driven over the DevTools protocol.
pub struct ChromeSession {
    browser: Mutex<Browser>,
    /// Opened for this session only, never one of the user's tabs.
    page: Page,
    handler_task: JoinHandle<()>,
    /// Attached to a browser the user started; only our tab is closed.
    attached: bool,
    action_delay: Duration,
    /// Throwaway profile of a launched browser, removed on drop.
    _profile_dir: Option<TempDir>,
}

fn viewport(settings: &BrowserSettings) -> Viewport {
    Viewport {
        width: settings.viewport_width,
        height: settings.viewport_height,
        ..Viewport::default()
    }
}

/// The launch viewport, applied to a tab opened in someone else's browser.
fn device_metrics(settings: &BrowserSettings) -> SetDeviceMetricsOverrideParams {
    SetDeviceMetricsOverrideParams::new(
        i64::from(settings.viewport_width),
        i64::from(settings.viewport_height),
        1.0,
        false,
    )
}

/// A fresh profile per launch, so concurrent sessions never share
/// Chrome's profile lock.
fn profile_dir() -> Result<TempDir> {
    Ok(tempfile::Builder::new()
        .prefix("postscraper-profile-")
        .tempdir()?)
}

impl ChromeSession {
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let profile_dir = profile_dir()?;

        let mut builder = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .viewport(viewport(settings))
            .user_data_dir(profile_dir.path())
            .request_timeout(settings.default_timeout())
            .launch_timeout(settings.launch_timeout());
        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        if let Some(executable) = &settings.chrome_executable {
            builder = builder.chrome_executable(executable);
        }
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| AppError::BrowserError(format!("Failed to build browser config: {}", e)))?;

        let mut last_error = None;
        for attempt in 1..=LAUNCH_ATTEMPTS {
            match Browser::launch(config.clone()).await {
                Ok((browser, handler)) => {
                    let handler_task = spawn_handler(handler);
                    let page = browser.new_page("about:blank").await?;
                    info!(attempt, "Chromium launched");
                    return Ok(Self {
                        browser: Mutex::new(browser),
                        page,
                        handler_task,
                        attached: false,
                        action_delay: settings.action_delay(),
                        _profile_dir: Some(profile_dir),
                    });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Browser launch failed");
                    last_error = Some(e);
                    if attempt < LAUNCH_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(1000 * attempt)).await;
                    }
                }
            }
        }

        Err(AppError::BrowserError(format!(
            "Failed to launch browser after {} attempts: {}",
            LAUNCH_ATTEMPTS,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string())
        )))
    }

    pub async fn connect(ws_url: &str, settings: &BrowserSettings) -> Result<Self> {
        let (browser, handler) = Browser::connect(ws_url).await?;
        let handler_task = spawn_handler(handler);

        let page = browser.new_page("about:blank").await?;
        page.execute(device_metrics(settings)).await?;

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler_task,
            attached: true,
            action_delay: settings.action_delay(),
            _profile_dir: None,
        })
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Shut the browser down if this session launched it, otherwise close
    /// only the tab this session opened.
    pub async fn close(&self) -> Result<()> {
        if self.attached {
            if let Err(e) = self.page.clone().close().await {
                warn!(error = %e, "Failed to close session tab");
            }
        } else {
            let mut browser = self.browser.lock().await;
            browser.close().await?;
            if let Err(e) = browser.wait().await {
                warn!(error = %e, "Browser process did not exit cleanly");
            }
        }
        self.handler_task.abort();
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        self.page
            .evaluate(script)
            .await?
            .into_value::<T>()
            .map_err(|e| AppError::BrowserError(format!("Unexpected script result: {}", e)))
    }

    async fn pause(&self) {
        if !self.action_delay.is_zero() {
            tokio::time::sleep(self.action_delay).await;
        }
    }
}

fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                // Unknown CDP events fail to deserialize and are harmless.
                let message = e.to_string();
                if !message.contains("data did not match any variant") {
                    warn!(error = %message, "Browser handler error");
                }
            }
        }
    })
}

#[async_trait]
impl BrowserPage for ChromeSession {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<NavigationOutcome> {
        let outcome = match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => NavigationOutcome::Loaded,
            Ok(Err(CdpError::Timeout)) | Err(_) => {
                warn!(url, "Timeout while loading page, continuing with partial content");
                NavigationOutcome::TimedOut
            }
            Ok(Err(e)) => return Err(e.into()),
        };
        self.pause().await;
        Ok(outcome)
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn scroll_height(&self) -> Result<i64> {
        self.eval("document.body.scrollHeight").await
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await?;
        self.pause().await;
        Ok(())
    }

    async fn expand_truncated(&self, labels: &[&str]) -> Result<usize> {
        let labels = serde_json::to_string(labels)
            .map_err(|e| AppError::Internal(format!("Failed to encode labels: {}", e)))?;
        let script = format!("({})({})", EXPAND_SCRIPT.trim(), labels);
        let clicked: usize = self.eval(&script).await?;
        if clicked > 0 {
            self.pause().await;
        }
        Ok(clicked)
    }

    async fn click_first(&self, queries: &[ElementQuery]) -> Result<Option<ElementQuery>> {
        for query in queries {
            let encoded = serde_json::to_string(query)
                .map_err(|e| AppError::Internal(format!("Failed to encode query: {}", e)))?;
            let script = format!("({})({})", CLICK_QUERY_SCRIPT.trim(), encoded);
            match self.eval::<bool>(&script).await {
                Ok(true) => {
                    info!(selector = %query, "Clicked element");
                    self.pause().await;
                    return Ok(Some(*query));
                }
                Ok(false) => continue,
                Err(e) => warn!(selector = %query, error = %e, "Error clicking element"),
            }
        }
        Ok(None)
    }

    async fn search(&self, query: &str) -> Result<bool> {
        let input = match self.page.find_element(SEARCH_INPUT).await {
            Ok(input) => input,
            Err(_) => return Ok(false),
        };
        input.click().await?;
        input.type_str(query).await?;
        input.press_key("Enter").await?;
        self.pause().await;
        Ok(true)
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let png = self.page.screenshot(params).await?;
        tokio::fs::write(path, png).await?;
        info!(path = %path.display(), "Screenshot saved");
        Ok(())
    }
}
