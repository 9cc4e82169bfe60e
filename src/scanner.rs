use crate::config::Config;
use crate::errors::{Error, Result};
use ignore::WalkBuilder;
use std::ffi::OsStr;
use std::path::PathBuf;
use tracing::{debug, info};

/// Collects the files a run will visit.
///
/// Every regular file under the root is returned, except those inside a
/// directory whose name matches an entry of the ignore list. Names are
/// compared case-insensitively, and a matching directory is pruned together
/// with its whole subtree. Hidden files and `.gitignore` rules are not
/// consulted; only the ignore list decides.
pub struct Scanner {
    root: PathBuf,
    ignore_dirs: Vec<String>,
}

impl Scanner {
    pub fn new<I, S>(root: impl Into<PathBuf>, ignore_dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            root: root.into(),
            ignore_dirs: ignore_dirs
                .into_iter()
                .map(|d| d.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.root(), config.ignore_dirs())
    }

    /// Walks the root and returns absolute, sorted, de-duplicated file paths.
    ///
    /// Any walk error (unreadable root, a directory vanishing mid-walk) fails
    /// the whole scan.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        info!(root = %self.root.display(), "scanning directory");

        let root = std::path::absolute(&self.root).map_err(|e| self.scan_error(e.into()))?;
        let mut walker = WalkBuilder::new(&root);
        walker.standard_filters(false).follow_links(false);

        let ignore_dirs = self.ignore_dirs.clone();
        walker.filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if is_dir && entry.depth() > 0 && is_ignored(&ignore_dirs, entry.file_name()) {
                debug!(path = %entry.path().display(), "ignoring directory");
                return false;
            }
            true
        });

        let mut files = Vec::new();
        for entry in walker.build() {
            let entry = entry.map_err(|e| self.scan_error(e))?;
            if entry.file_type().is_some_and(|ft| ft.is_file()) {
                debug!(path = %entry.path().display(), "found file");
                files.push(entry.into_path());
            }
        }

        files.sort();
        files.dedup();
        info!(count = files.len(), "scan complete");
        Ok(files)
    }

    fn scan_error(&self, source: ignore::Error) -> Error {
        Error::Scan {
            root: self.root.clone(),
            source,
        }
    }
}

fn is_ignored(ignore_dirs: &[String], name: &OsStr) -> bool {
    let name = name.to_string_lossy().to_lowercase();
    ignore_dirs.iter().any(|d| *d == name)
}
