use chrono::Local;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::scrape_session::{ScrapeRequest, ScrapeSession, ScrapeStatus};

/// In-memory table of scraping sessions, shared between the HTTP handlers
/// and the background jobs. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, ScrapeSession>>>,
}

/// `20240101120000-1a2b3c4d`
pub fn new_session_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", Local::now().format("%Y%m%d%H%M%S"), &suffix[..8])
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ScrapeSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create(&self, request: &ScrapeRequest) -> String {
        let mut sessions = self.lock();
        let mut id = new_session_id();
        while sessions.contains_key(&id) {
            id = new_session_id();
        }
        sessions.insert(id.clone(), ScrapeSession::new(id.clone(), request));
        id
    }

    pub fn get(&self, id: &str) -> Option<ScrapeSession> {
        self.lock().get(id).cloned()
    }

    /// Returns false when the session is unknown.
    pub fn update(&self, id: &str, status: ScrapeStatus, message: impl Into<String>, progress: Option<u8>) -> bool {
        match self.lock().get_mut(id) {
            Some(session) => {
                session.advance(status, message, progress);
                true
            }
            None => false,
        }
    }

    pub fn set_result(&self, id: &str, path: PathBuf) -> bool {
        match self.lock().get_mut(id) {
            Some(session) => {
                session.csv_path = Some(path);
                true
            }
            None => false,
        }
    }

    pub fn result_path(&self, id: &str) -> Option<PathBuf> {
        self.lock().get(id).and_then(|session| session.csv_path.clone())
    }

    /// All sessions, newest first.
    pub fn list(&self) -> Vec<ScrapeSession> {
        let mut sessions: Vec<ScrapeSession> = self.lock().values().cloned().collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| b.id.cmp(&a.id)));
        sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ScrapeRequest {
        ScrapeRequest::new("https://www.linkedin.com/in/jane-doe/", 10).unwrap()
    }

    #[test]
    fn test_session_id_format() {
        let id = new_session_id();
        let (stamp, suffix) = id.split_once('-').unwrap();
        assert_eq!(stamp.len(), 14);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_create_and_update() {
        let registry = SessionRegistry::new();
        let id = registry.create(&request());

        let session = registry.get(&id).unwrap();
        assert_eq!(session.status, ScrapeStatus::Initializing);
        assert_eq!(session.progress, 0);
        assert_eq!(session.max_posts, 10);

        assert!(registry.update(&id, ScrapeStatus::Scraping, "Scraping...", Some(30)));
        let session = registry.get(&id).unwrap();
        assert_eq!(session.status, ScrapeStatus::Scraping);
        assert_eq!(session.message, "Scraping...");
        assert_eq!(session.progress, 30);

        assert!(!registry.update("missing", ScrapeStatus::Error, "x", None));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_ids_do_not_collide() {
        let registry = SessionRegistry::new();
        let a = registry.create(&request());
        let b = registry.create(&request());
        assert_ne!(a, b);
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn test_result_path() {
        let registry = SessionRegistry::new();
        let id = registry.create(&request());
        assert!(registry.result_path(&id).is_none());

        assert!(registry.set_result(&id, PathBuf::from("output/posts.csv")));
        assert_eq!(registry.result_path(&id), Some(PathBuf::from("output/posts.csv")));
        assert!(!registry.set_result("missing", PathBuf::from("x.csv")));
    }

    #[test]
    fn test_clones_share_state() {
        let registry = SessionRegistry::new();
        let clone = registry.clone();
        let id = clone.create(&request());
        assert!(registry.get(&id).is_some());
    }
}
