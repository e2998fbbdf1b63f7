use chrono::Local;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_DATE: &str = "Unknown date";

/// A single post scraped from a profile's activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub text: String,
    pub date: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Post {
    pub fn new(text: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            date: date.into(),
            likes: 0,
            comments: 0,
            shares: 0,
            url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResults {
    pub profile_name: String,
    pub profile_url: String,
    pub posts: Vec<Post>,
    pub scrape_date: String,
}

impl ScrapeResults {
    pub fn new(profile_name: impl Into<String>, profile_url: impl Into<String>, posts: Vec<Post>) -> Self {
        Self {
            profile_name: profile_name.into(),
            profile_url: profile_url.into(),
            posts,
            scrape_date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Placeholder result carrying one post that explains why nothing was scraped.
    pub fn failure(
        profile_name: impl Into<String>,
        profile_url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let today = Local::now().format("%Y-%m-%d").to_string();
        Self::new(profile_name, profile_url, vec![Post::new(message, today)])
    }
}
