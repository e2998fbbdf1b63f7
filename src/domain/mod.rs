pub mod error;
pub mod post;
pub mod scrape_session;
