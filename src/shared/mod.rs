pub mod log_buffer;

pub use log_buffer::{add_log, add_log_entry, new_log_buffer, LogEntry, SharedLogs};
