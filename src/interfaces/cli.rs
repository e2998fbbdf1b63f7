use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "postscraper")]
#[command(about = "Scrape posts from a LinkedIn profile through a real browser")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run the web front end (default)
    Serve {
        /// Address to bind, overrides the configured host
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, overrides the configured port
        #[arg(short, long)]
        port: Option<u16>,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Scrape one profile from the terminal and write a CSV file
    Scrape {
        /// Profile URL, e.g. https://www.linkedin.com/in/username/
        profile_url: String,

        /// Maximum number of posts to collect
        #[arg(short, long)]
        max_posts: Option<usize>,

        /// CSV file to write, defaults to a timestamped file in the output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// The subcommand to run, `serve` when none was given.
    pub fn command(self) -> Command {
        self.command.unwrap_or(Command::Serve {
            host: None,
            port: None,
            config: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::try_parse_from(["postscraper"]).unwrap();
        assert_eq!(
            cli.command(),
            Command::Serve {
                host: None,
                port: None,
                config: None
            }
        );
    }

    #[test]
    fn test_parse_scrape() {
        let cli = Cli::try_parse_from([
            "postscraper",
            "scrape",
            "https://www.linkedin.com/in/jane-doe/",
            "--max-posts",
            "20",
            "-o",
            "jane.csv",
        ])
        .unwrap();
        assert_eq!(
            cli.command(),
            Command::Scrape {
                profile_url: "https://www.linkedin.com/in/jane-doe/".to_string(),
                max_posts: Some(20),
                output: Some(PathBuf::from("jane.csv")),
                config: None,
            }
        );
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from(["postscraper", "serve", "--host", "0.0.0.0", "-p", "8080"]).unwrap();
        assert!(matches!(
            cli.command(),
            Command::Serve { host: Some(ref h), port: Some(8080), config: None } if h == "0.0.0.0"
        ));
    }

    #[test]
    fn test_scrape_requires_url() {
        assert!(Cli::try_parse_from(["postscraper", "scrape"]).is_err());
    }
}
