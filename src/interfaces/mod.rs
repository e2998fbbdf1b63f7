pub mod cli;
pub mod http;
