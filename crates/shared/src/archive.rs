use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Archived digests are named `dd-mm-YYYY.html`.
pub const DATE_FORMAT: &str = "%d-%m-%Y";
pub const EXTENSION: &str = "html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub date: NaiveDate,
    pub filename: String,
}

impl ArchiveEntry {
    /// e.g. "March 15, 2024"
    pub fn display_date(&self) -> String {
        self.date.format("%B %d, %Y").to_string()
    }
}

/// Flat directory of rendered digests, one file per generation date.
#[derive(Debug, Clone)]
pub struct Archive {
    dir: PathBuf,
}

impl Archive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn filename_for(date: NaiveDate) -> String {
        format!("{}.{}", date.format(DATE_FORMAT), EXTENSION)
    }

    /// The date encoded in an archive filename, if it is one.
    pub fn parse_filename(filename: &str) -> Option<NaiveDate> {
        let stem = filename.strip_suffix(&format!(".{}", EXTENSION))?;
        NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
    }

    /// Write a rendered digest; a second save on the same date replaces the first.
    pub fn save(&self, html: &str, date: NaiveDate) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create archive directory: {}", self.dir.display())
        })?;

        let filepath = self.dir.join(Self::filename_for(date));
        fs::write(&filepath, html)
            .with_context(|| format!("Failed to write digest: {}", filepath.display()))?;

        Ok(filepath)
    }

    /// All archived digests, newest first. Files that are not archive names are ignored.
    pub fn list(&self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();

        if !self.dir.exists() {
            return Ok(entries);
        }

        for entry in fs::read_dir(&self.dir).context("Failed to read archive directory")? {
            let entry = entry?;
            let filename = entry.file_name().to_string_lossy().into_owned();

            match Self::parse_filename(&filename) {
                Some(date) => entries.push(ArchiveEntry { date, filename }),
                None => debug!(%filename, "Ignoring non-archive file"),
            }
        }

        entries.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(entries)
    }

    /// Read one archived digest. Only well-formed archive names are accepted,
    /// so callers may pass user input straight through.
    pub fn load(&self, filename: &str) -> Result<Option<String>> {
        if Self::parse_filename(filename).is_none() {
            return Ok(None);
        }

        let filepath = self.dir.join(filename);
        if !filepath.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&filepath)
            .with_context(|| format!("Failed to read digest: {}", filepath.display()))?;
        Ok(Some(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "<html></html>").unwrap();
    }

    #[test]
    fn test_list_orders_newest_first_and_skips_bad_names() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "01-02-2024.html");
        touch(tmp.path(), "15-03-2024.html");
        touch(tmp.path(), "not-a-date.html");

        let entries = Archive::new(tmp.path()).list().unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["15-03-2024.html", "01-02-2024.html"]);
    }

    #[test]
    fn test_list_sorts_by_date_not_name() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "31-01-2023.html");
        touch(tmp.path(), "02-01-2024.html");
        touch(tmp.path(), "30-12-2023.html");

        let entries = Archive::new(tmp.path()).list().unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(
            names,
            vec!["02-01-2024.html", "30-12-2023.html", "31-01-2023.html"]
        );
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = Archive::new(tmp.path().join("nope"));
        assert!(archive.list().unwrap().is_empty());
    }

    #[test]
    fn test_parse_filename() {
        assert_eq!(
            Archive::parse_filename("15-03-2024.html"),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
        assert_eq!(Archive::parse_filename("15-03-2024.txt"), None);
        assert_eq!(Archive::parse_filename("32-01-2024.html"), None);
        assert_eq!(Archive::parse_filename("../15-03-2024.html"), None);
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = Archive::new(tmp.path().join("archive"));
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

        let path = archive.save("<p>digest</p>", date).unwrap();
        assert!(path.ends_with("01-02-2024.html"));
        assert_eq!(
            archive.load("01-02-2024.html").unwrap().as_deref(),
            Some("<p>digest</p>")
        );
    }

    #[test]
    fn test_load_rejects_traversal_and_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = Archive::new(tmp.path());
        assert_eq!(archive.load("../../etc/passwd").unwrap(), None);
        assert_eq!(archive.load("01-01-2020.html").unwrap(), None);
    }

    #[test]
    fn test_entry_display_date() {
        let entry = ArchiveEntry {
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            filename: "15-03-2024.html".into(),
        };
        assert_eq!(entry.display_date(), "March 15, 2024");
    }
}
