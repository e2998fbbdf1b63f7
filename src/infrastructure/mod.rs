pub mod browser;
pub mod config;
pub mod csv;
pub mod storage;
