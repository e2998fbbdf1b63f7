// ============================================================
// CSV WRITER
// ============================================================
// Writes a profile header block followed by one row per post

use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::application::use_cases::post_extraction::clean_post_text;
use crate::domain::error::{AppError, Result};
use crate::domain::post::ScrapeResults;
use crate::infrastructure::storage::{default_csv_name, ensure_output_root};

const PROFILE_HEADER: [&str; 3] = ["Profile Name", "Profile URL", "Scrape Date"];
const POST_HEADER: [&str; 6] = ["Post Text", "Date", "Likes", "Comments", "Shares", "URL"];

/// CSV exporter for scrape results
pub struct CsvExporter {
    /// Directory used when no explicit path is given
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Save results to `path`, or to a timestamped file in the output
    /// directory when no path is given. Returns the written path.
    pub fn save(&self, results: &ScrapeResults, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                path.to_path_buf()
            }
            None => ensure_output_root(&self.output_dir)?.join(default_csv_name(&results.profile_name)),
        };

        let file = BufWriter::new(File::create(&path)?);
        let mut out = self.write(results, file)?;
        out.flush()?;

        info!(path = %path.display(), posts = results.posts.len(), "Results saved");
        Ok(path)
    }

    /// Write the CSV layout into any writer and hand it back.
    pub fn write<W: Write>(&self, results: &ScrapeResults, out: W) -> Result<W> {
        let mut writer = Self::builder().from_writer(out);
        writer.write_record(PROFILE_HEADER)?;
        writer.write_record([
            results.profile_name.as_str(),
            results.profile_url.as_str(),
            results.scrape_date.as_str(),
        ])?;

        // A record with no fields would still come out as `""`, so the
        // separator line goes straight to the underlying writer.
        let mut out = Self::finish(writer)?;
        out.write_all(b"\n")?;

        let mut writer = Self::builder().from_writer(out);
        writer.write_record(POST_HEADER)?;
        for post in &results.posts {
            writer.write_record([
                clean_post_text(&post.text),
                post.date.clone(),
                post.likes.to_string(),
                post.comments.to_string(),
                post.shares.to_string(),
                post.url.clone().unwrap_or_default(),
            ])?;
        }

        Self::finish(writer)
    }

    fn builder() -> WriterBuilder {
        let mut builder = WriterBuilder::new();
        builder
            .quote_style(QuoteStyle::Always)
            .double_quote(true)
            .terminator(Terminator::Any(b'\n'))
            .flexible(true);
        builder
    }

    fn finish<W: Write>(writer: Writer<W>) -> Result<W> {
        writer
            .into_inner()
            .map_err(|e| AppError::IoError(format!("CSV write failed: {}", e.error())))
    }
}
