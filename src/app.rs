use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::application::use_cases::scrape_job::{ScrapeJobRunner, LOGIN_FAILED_MESSAGE};
use crate::application::use_cases::scrape_profile::ProfileScraper;
use crate::application::use_cases::session_registry::SessionRegistry;
use crate::domain::error::{AppError, Result};
use crate::domain::scrape_session::ScrapeRequest;
use crate::infrastructure::browser::{open_session, BrowserPage};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::csv::CsvExporter;
use crate::infrastructure::storage::{ensure_output_root, ensure_screenshots_dir};
use crate::interfaces::cli::{Cli, Command};
use crate::interfaces::http::{start_server, HttpState};
use crate::shared::{add_log, new_log_buffer};

pub async fn run() -> Result<()> {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    match Cli::parse().command() {
        Command::Serve { host, port, config } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Command::Scrape {
            profile_url,
            max_posts,
            output,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let max_posts = max_posts.unwrap_or(config.scrape.default_max_posts);
            let request = ScrapeRequest::new(profile_url, max_posts)?;
            let path = scrape_once(&config, &request, output).await?;
            info!(path = %path.display(), "Scraping completed");
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    ensure_output_root(&config.output.directory)?;

    let config = Arc::new(config);
    let registry = SessionRegistry::new();
    let logs = new_log_buffer();
    let runner = ScrapeJobRunner::new(
        registry.clone(),
        config.clone(),
        logs.clone(),
        tokio::runtime::Handle::current(),
    );

    let host = config.server.host.clone();
    let port = config.server.port;
    let server = start_server(
        HttpState {
            registry,
            launcher: Arc::new(runner),
            logs: logs.clone(),
            config,
        },
        &host,
        port,
    )?;

    info!(host = %host, port, "HTTP server started");
    add_log(&logs, "INFO", "System", &format!("HTTP server started on {}:{}", host, port));
    server.await?;
    Ok(())
}

/// Terminal flow: login, scrape and save without the web front end.
async fn scrape_once(config: &AppConfig, request: &ScrapeRequest, output: Option<PathBuf>) -> Result<PathBuf> {
    let session = open_session(&config.browser).await?;
    let outcome = scrape_with(&session, config, request, output.as_deref()).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close browser");
    }
    outcome
}

async fn scrape_with<P: BrowserPage>(
    page: &P,
    config: &AppConfig,
    request: &ScrapeRequest,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let mut scraper = ProfileScraper::new(page, &config.scrape);
    if config.scrape.screenshots {
        scraper = scraper.with_screenshots(ensure_screenshots_dir(&config.output.directory)?);
    }

    if !scraper.ensure_logged_in().await? {
        return Err(AppError::LoginError(LOGIN_FAILED_MESSAGE.to_string()));
    }

    let results = scraper
        .scrape_profile(&request.profile_url, request.max_posts)
        .await;
    info!(posts = results.posts.len(), profile_name = %results.profile_name, "Scrape finished");

    CsvExporter::new(&config.output.directory).save(&results, output)
}
