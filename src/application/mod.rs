pub mod use_cases;

pub use use_cases::scrape_job::{JobLauncher, ScrapeJobRunner};
pub use use_cases::scrape_profile::ProfileScraper;
pub use use_cases::session_registry::SessionRegistry;
