use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use crate::application::use_cases::scrape_profile::ProfileScraper;
use crate::application::use_cases::session_registry::SessionRegistry;
use crate::domain::error::{AppError, Result};
use crate::domain::scrape_session::{ScrapeRequest, ScrapeStatus};
use crate::infrastructure::browser::{open_session, BrowserPage};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::csv::CsvExporter;
use crate::infrastructure::storage::ensure_screenshots_dir;
use crate::shared::{add_log, SharedLogs};

const LOG_SOURCE: &str = "Scraper";
pub const LOGIN_FAILED_MESSAGE: &str = "Failed to log in to LinkedIn.";

/// Starts background work for a freshly created session.
pub trait JobLauncher: Send + Sync {
    fn launch(&self, session_id: String, request: ScrapeRequest);
}

/// Runs one browser-backed scrape per session on the tokio runtime.
#[derive(Clone)]
pub struct ScrapeJobRunner {
    registry: SessionRegistry,
    config: Arc<AppConfig>,
    logs: SharedLogs,
    runtime: Handle,
}

impl ScrapeJobRunner {
    pub fn new(registry: SessionRegistry, config: Arc<AppConfig>, logs: SharedLogs, runtime: Handle) -> Self {
        Self {
            registry,
            config,
            logs,
            runtime,
        }
    }

    /// Run a session to completion. Errors end up in the session, never in
    /// the caller.
    pub async fn run(&self, id: &str, request: &ScrapeRequest) {
        let tracker = ProgressTracker {
            registry: &self.registry,
            logs: &self.logs,
            id,
        };

        if let Err(e) = self.execute(&tracker, request).await {
            error!(session_id = id, error = %e, "Error in scraper job");
            tracker.fail(&e);
        }
    }

    async fn execute(&self, tracker: &ProgressTracker<'_>, request: &ScrapeRequest) -> Result<PathBuf> {
        tracker.step(
            ScrapeStatus::CheckingLogin,
            "Checking if already logged in to LinkedIn...",
            20,
        );
        let session = open_session(&self.config.browser)
            .await
            .map_err(login_failed)?;
        let outcome = drive(&session, tracker, request, &self.config).await;

        if session.is_attached() {
            info!("Leaving attached browser open");
        }
        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close browser");
        }

        outcome
    }
}

impl JobLauncher for ScrapeJobRunner {
    fn launch(&self, session_id: String, request: ScrapeRequest) {
        let runner = self.clone();
        self.runtime.spawn(async move {
            runner.run(&session_id, &request).await;
        });
    }
}

/// Mirrors session transitions into the registry and the log buffer.
struct ProgressTracker<'a> {
    registry: &'a SessionRegistry,
    logs: &'a SharedLogs,
    id: &'a str,
}

impl ProgressTracker<'_> {
    fn step(&self, status: ScrapeStatus, message: &str, progress: u8) {
        info!(session_id = self.id, status = %status, progress, "{}", message);
        add_log(self.logs, "INFO", LOG_SOURCE, &format!("[{}] {}", self.id, message));
        self.registry.update(self.id, status, message, Some(progress));
    }

    fn fail(&self, err: &AppError) {
        let message = match err {
            AppError::LoginError(msg) => msg.clone(),
            other => format!("Error: {}", other),
        };
        add_log(self.logs, "ERROR", LOG_SOURCE, &format!("[{}] {}", self.id, message));
        self.registry.update(self.id, ScrapeStatus::Error, message, None);
    }
}

/// Anything going wrong before the session is known to be logged in is
/// reported as a failed login.
fn login_failed(err: AppError) -> AppError {
    warn!(error = %err, "Login phase failed");
    AppError::LoginError(LOGIN_FAILED_MESSAGE.to_string())
}

/// Login, scrape and save on an already opened page.
async fn drive<P: BrowserPage>(
    page: &P,
    tracker: &ProgressTracker<'_>,
    request: &ScrapeRequest,
    config: &AppConfig,
) -> Result<PathBuf> {
    let mut scraper = ProfileScraper::new(page, &config.scrape);
    if config.scrape.screenshots {
        scraper = scraper.with_screenshots(ensure_screenshots_dir(&config.output.directory)?);
    }

    if !scraper.ensure_logged_in().await.map_err(login_failed)? {
        return Err(AppError::LoginError(LOGIN_FAILED_MESSAGE.to_string()));
    }

    tracker.step(
        ScrapeStatus::Scraping,
        &format!("Scraping {} posts from {}...", request.max_posts, request.profile_url),
        30,
    );
    let results = scraper.scrape_profile(&request.profile_url, request.max_posts).await;

    tracker.step(ScrapeStatus::Saving, "Saving results to CSV file...", 90);
    let path = CsvExporter::new(&config.output.directory).save(&results, None)?;

    tracker.registry.set_result(tracker.id, path.clone());
    tracker.step(
        ScrapeStatus::Complete,
        &format!("Successfully saved {} posts to CSV.", results.posts.len()),
        100,
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::scrape_profile::fake::{instant_settings, FakePage};
    use crate::application::use_cases::scrape_profile::{HOME_URL, LOGIN_URL};
    use crate::infrastructure::config::OutputSettings;
    use crate::shared::new_log_buffer;

    const PROFILE: &str = "https://www.linkedin.com/in/jane-doe/";
    const ACTIVITY: &str = "https://www.linkedin.com/in/jane-doe/recent-activity/all/";

    fn config(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            scrape: instant_settings(),
            output: OutputSettings {
                directory: dir.to_path_buf(),
            },
            ..AppConfig::default()
        }
    }

    fn setup() -> (SessionRegistry, SharedLogs, String, ScrapeRequest) {
        let registry = SessionRegistry::new();
        let request = ScrapeRequest::new(PROFILE, 5).unwrap();
        let id = registry.create(&request);
        (registry, new_log_buffer(), id, request)
    }

    #[tokio::test]
    async fn test_drive_completes_and_records_csv() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let (registry, logs, id, request) = setup();
        let tracker = ProgressTracker {
            registry: &registry,
            logs: &logs,
            id: &id,
        };
        let page = FakePage::default()
            .with_page(HOME_URL, "<html><body><h1>Feed</h1></body></html>")
            .with_page(PROFILE, r#"<html><body><h1 class="text-heading-xlarge">Jane Doe</h1></body></html>"#)
            .with_page(
                ACTIVITY,
                r#"<html><body><div class="feed-shared-update-v2"><div class="feed-shared-text"><p>Hello network</p></div><time>1 day ago</time></div></body></html>"#,
            );

        let path = drive(&page, &tracker, &request, &config).await.unwrap();
        assert!(path.exists());
        assert!(path.starts_with(dir.path()));

        let session = registry.get(&id).unwrap();
        assert_eq!(session.status, ScrapeStatus::Complete);
        assert_eq!(session.progress, 100);
        assert_eq!(session.message, "Successfully saved 1 posts to CSV.");
        assert!(session.finished_at.is_some());
        assert_eq!(registry.result_path(&id), Some(path.clone()));

        let csv = std::fs::read_to_string(&path).unwrap();
        assert!(csv.contains("\"Hello network\",\"1 day ago\""));

        let entries = crate::shared::log_buffer::snapshot(&logs);
        assert_eq!(entries.len(), 3);
        assert!(entries[0].message.contains("Scraping 5 posts from"));
    }

    #[tokio::test]
    async fn test_login_failure_sets_error_message() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let (registry, logs, id, request) = setup();
        let tracker = ProgressTracker {
            registry: &registry,
            logs: &logs,
            id: &id,
        };
        let page = FakePage::default()
            .with_page(HOME_URL, r#"<html><body><a href="/login">Sign in</a></body></html>"#)
            .with_page(LOGIN_URL, "<html><body></body></html>");

        let err = drive(&page, &tracker, &request, &config).await.unwrap_err();
        tracker.fail(&err);

        let session = registry.get(&id).unwrap();
        assert_eq!(session.status, ScrapeStatus::Error);
        assert_eq!(session.message, LOGIN_FAILED_MESSAGE);
        assert!(registry.result_path(&id).is_none());
    }

    #[tokio::test]
    async fn test_browser_errors_during_login_check_read_as_login_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let (registry, logs, id, request) = setup();
        let tracker = ProgressTracker {
            registry: &registry,
            logs: &logs,
            id: &id,
        };
        let page = FakePage {
            fail_navigation: true,
            ..FakePage::default()
        };

        let err = drive(&page, &tracker, &request, &config).await.unwrap_err();
        assert!(matches!(&err, AppError::LoginError(msg) if msg == LOGIN_FAILED_MESSAGE));
        tracker.fail(&err);
        assert_eq!(registry.get(&id).unwrap().message, LOGIN_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_browser_launch_failure_reads_as_login_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.browser.debugger_ports = Vec::new();
        config.browser.headless = true;
        config.browser.chrome_executable = Some(dir.path().join("no-such-chrome"));
        let (registry, logs, id, request) = setup();
        let runner = ScrapeJobRunner::new(registry.clone(), Arc::new(config), logs.clone(), Handle::current());

        runner.run(&id, &request).await;

        let session = registry.get(&id).unwrap();
        assert_eq!(session.status, ScrapeStatus::Error);
        assert_eq!(session.message, LOGIN_FAILED_MESSAGE);
        assert_eq!(session.progress, 20);

        let entries = crate::shared::log_buffer::snapshot(&logs);
        assert!(entries[0].message.contains("Checking if already logged in"));
    }

    #[test]
    fn test_other_errors_are_prefixed() {
        let (registry, logs, id, _) = setup();
        let tracker = ProgressTracker {
            registry: &registry,
            logs: &logs,
            id: &id,
        };

        tracker.fail(&AppError::BrowserError("no chrome".to_string()));
        let session = registry.get(&id).unwrap();
        assert_eq!(session.message, "Error: Browser error: no chrome");

        let entries = crate::shared::log_buffer::snapshot(&logs);
        assert_eq!(entries[0].level, "ERROR");
    }
}
