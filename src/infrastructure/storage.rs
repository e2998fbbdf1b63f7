use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

pub fn ensure_output_root(output_dir: &Path) -> std::io::Result<PathBuf> {
    ensure_dir(output_dir)?;
    Ok(output_dir.to_path_buf())
}

pub fn ensure_screenshots_dir(output_dir: &Path) -> std::io::Result<PathBuf> {
    let screenshots_dir = output_dir.join("screenshots");
    ensure_dir(&screenshots_dir)?;
    Ok(screenshots_dir)
}

/// `linkedin_{label}_{timestamp}.png` inside the screenshots directory.
pub fn screenshot_path(screenshots_dir: &Path, label: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    screenshots_dir.join(format!("linkedin_{}_{}.png", label, timestamp))
}

/// Default export file name for a profile, e.g. `linkedin_posts_Jane_Doe_20240101_120000.csv`.
pub fn default_csv_name(profile_name: &str) -> String {
    let safe_name: String = profile_name
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .map(|c| if matches!(c, ' ' | '/' | '\\') { '_' } else { c })
        .collect();
    let date_str = Local::now().format("%Y%m%d_%H%M%S");
    format!("linkedin_posts_{}_{}.csv", safe_name, date_str)
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_csv_name_sanitizes_profile() {
        let name = default_csv_name("Jane Doe/Acme");
        assert!(name.starts_with("linkedin_posts_Jane_Doe_Acme_"));
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn test_default_csv_name_drops_quotes_and_control_chars() {
        let name = default_csv_name("Robert \"Bob\" Smith");
        assert!(name.starts_with("linkedin_posts_Robert_Bob_Smith_"));

        let name = default_csv_name("Jane\nDoe\t\\x");
        assert!(name.starts_with("linkedin_posts_JaneDoe_x_"));
        assert!(!name.chars().any(char::is_control));
    }

    #[test]
    fn test_screenshots_dir_is_created() {
        let root = tempfile::tempdir().unwrap();
        let dir = ensure_screenshots_dir(&root.path().join("out")).unwrap();
        assert!(dir.is_dir());

        let shot = screenshot_path(&dir, "profile");
        assert!(shot.starts_with(&dir));
        assert!(shot.to_string_lossy().contains("linkedin_profile_"));
    }
}
