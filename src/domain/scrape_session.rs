use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use validator::Validate;

use crate::domain::error::{AppError, Result};

pub const DEFAULT_MAX_POSTS: usize = 50;
/// Upper bound enforced on `ScrapeRequest::max_posts`.
pub const MAX_POSTS_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    Initializing,
    CheckingLogin,
    Scraping,
    Saving,
    Complete,
    Error,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Initializing => "initializing",
            ScrapeStatus::CheckingLogin => "checking_login",
            ScrapeStatus::Scraping => "scraping",
            ScrapeStatus::Saving => "saving",
            ScrapeStatus::Complete => "complete",
            ScrapeStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScrapeStatus::Complete | ScrapeStatus::Error)
    }
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScrapeRequest {
    #[validate(url)]
    pub profile_url: String,
    #[validate(range(min = 1, max = MAX_POSTS_LIMIT))]
    pub max_posts: usize,
}

impl ScrapeRequest {
    pub fn new(profile_url: impl Into<String>, max_posts: usize) -> Result<Self> {
        let request = Self {
            profile_url: profile_url.into().trim().to_string(),
            max_posts,
        };
        request.validate()?;

        let scheme = url::Url::parse(&request.profile_url)
            .map(|url| url.scheme().to_string())
            .map_err(|e| AppError::ValidationError(format!("Invalid profile URL: {}", e)))?;
        if scheme != "http" && scheme != "https" {
            return Err(AppError::ValidationError(format!(
                "Profile URL must use http or https, got {}",
                scheme
            )));
        }

        Ok(request)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSession {
    pub id: String,
    pub profile_url: String,
    pub max_posts: usize,
    pub status: ScrapeStatus,
    pub message: String,
    pub progress: u8,
    pub csv_path: Option<PathBuf>,
    pub started_at: i64,
    pub finished_at: Option<i64>,
}

impl ScrapeSession {
    pub fn new(id: String, request: &ScrapeRequest) -> Self {
        Self {
            id,
            profile_url: request.profile_url.clone(),
            max_posts: request.max_posts,
            status: ScrapeStatus::Initializing,
            message: "Starting LinkedIn scraper...".to_string(),
            progress: 0,
            csv_path: None,
            started_at: chrono::Utc::now().timestamp_millis(),
            finished_at: None,
        }
    }

    pub fn advance(&mut self, status: ScrapeStatus, message: impl Into<String>, progress: Option<u8>) {
        self.status = status;
        self.message = message.into();
        if let Some(progress) = progress {
            self.progress = progress.min(100);
        }
        if status.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(chrono::Utc::now().timestamp_millis());
        }
    }
}
