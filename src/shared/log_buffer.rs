use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

const MAX_ENTRIES: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub type SharedLogs = Arc<Mutex<Vec<LogEntry>>>;

pub fn new_log_buffer() -> SharedLogs {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn add_log_entry(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) -> LogEntry {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    let mut logs = logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    logs.push(entry.clone());
    if logs.len() > MAX_ENTRIES {
        logs.remove(0);
    }
    entry
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    add_log_entry(logs, level, source, message);
}

pub fn snapshot(logs: &Mutex<Vec<LogEntry>>) -> Vec<LogEntry> {
    logs.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_is_capped() {
        let logs = new_log_buffer();
        for i in 0..(MAX_ENTRIES + 5) {
            add_log(&logs, "INFO", "Test", &format!("message {}", i));
        }
        let entries = snapshot(&logs);
        assert_eq!(entries.len(), MAX_ENTRIES);
        assert_eq!(entries[0].message, "message 5");
        assert_eq!(entries.last().unwrap().message, format!("message {}", MAX_ENTRIES + 4));
    }

    #[test]
    fn test_entry_fields() {
        let logs = new_log_buffer();
        let entry = add_log_entry(&logs, "ERROR", "Scraper", "boom");
        assert_eq!(entry.level, "ERROR");
        assert_eq!(entry.source, "Scraper");
        assert_eq!(entry.time.len(), "12:00:00".len());
    }
}
