pub mod post_extraction;
pub mod scrape_job;
pub mod scrape_profile;
pub mod session_registry;
