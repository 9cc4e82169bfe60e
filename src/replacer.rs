use crate::aggregator::{ReplaceOutcome, RunSummary};
use crate::cancel::CancellationToken;
use crate::config::{Config, ReplacePair};
use crate::dispatcher::{AnyDispatcher, Dispatcher, FileProcessor};
use crate::engine;
use crate::errors::{FileError, Result};
use crate::scanner::Scanner;
use indicatif::ProgressBar;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Applies a fixed list of pairs to files, one file at a time.
///
/// A `Replacer` holds no per-run state, so a single instance is shared by
/// every worker.
pub struct Replacer {
    pairs: Vec<ReplacePair>,
    dry_run: bool,
}

impl Replacer {
    pub fn new(pairs: Vec<ReplacePair>, dry_run: bool) -> Self {
        Self { pairs, dry_run }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.replacements().to_vec(), config.dry_run())
    }

    /// Processes a single file.
    ///
    /// The process is as follows:
    /// 1. The whole file is read into memory.
    /// 2. Every pair is applied in order.
    /// 3. If the bytes changed and this is not a dry run, the new content is
    ///    written atomically with the original permissions.
    ///
    /// Read and write failures are returned inside the outcome.
    pub fn process_file(&self, path: &Path, cancel: &CancellationToken) -> ReplaceOutcome {
        if cancel.is_cancelled() {
            debug!(path = %path.display(), "run cancelled, skipping file");
            return ReplaceOutcome::cancelled(path);
        }

        let content = match fs::read(path) {
            Ok(content) => content,
            Err(source) => {
                return ReplaceOutcome::failed(FileError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let result = engine::apply(&content, &self.pairs);
        for (pair, count) in self.pairs.iter().zip(&result.counts) {
            if *count > 0 {
                info!(
                    path = %path.display(),
                    search = %pair.search,
                    count,
                    "found matches"
                );
            }
        }

        let total = result.total();
        if total == 0 {
            debug!(path = %path.display(), "no matches, skipping file");
            return ReplaceOutcome::untouched(path);
        }

        let outcome = ReplaceOutcome {
            total_replacements: total,
            content_changed: result.changed,
            ..ReplaceOutcome::untouched(path)
        };

        if !result.changed {
            debug!(path = %path.display(), "content unchanged, skipping write");
            return outcome;
        }
        if self.dry_run {
            info!(path = %path.display(), count = total, "would update file");
            return outcome;
        }
        if cancel.is_cancelled() {
            debug!(path = %path.display(), "run cancelled before write");
            return ReplaceOutcome::cancelled(path);
        }

        if let Err(source) = write_atomic(path, &result.content) {
            return ReplaceOutcome::failed(FileError::Write {
                path: path.to_path_buf(),
                source,
            });
        }
        info!(path = %path.display(), count = total, "updated file");
        outcome
    }
}

impl FileProcessor for Replacer {
    fn process(&self, path: &Path, cancel: &CancellationToken) -> ReplaceOutcome {
        self.process_file(path, cancel)
    }
}

/// Replaces the content of `path` through a temporary file in the same
/// directory, so readers see either the old bytes or the new ones.
///
/// The target must be writable by the caller. The rename itself only needs
/// directory access, so a read-only file is refused up front.
fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let perms = fs::metadata(path)?.permissions();
    if perms.readonly() {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "file is read-only",
        ));
    }
    drop(OpenOptions::new().write(true).open(path)?);

    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(content)?;
    temp_file.as_file().sync_all()?;
    fs::set_permissions(temp_file.path(), perms)?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Runs a complete replacement pass: scan, dispatch, summarise.
///
/// Fails only for whole-run problems (unreadable root, pool setup). Per-file
/// errors are logged and counted in the summary.
pub fn run_replace(
    config: &Config,
    cancel: &CancellationToken,
    progress: ProgressBar,
) -> Result<RunSummary> {
    info!(
        pairs = config.replacements().len(),
        "starting replacement"
    );
    for (i, pair) in config.replacements().iter().enumerate() {
        info!(
            "pair #{}: '{}' -> '{}'",
            i + 1,
            pair.search,
            pair.replace
        );
    }
    if config.dry_run() {
        info!("dry run, no files will be modified");
    }

    let files = Scanner::from_config(config).scan()?;

    info!(
        workers = config.workers(),
        mode = ?config.mode(),
        "dispatching {} files",
        files.len()
    );
    let dispatcher = AnyDispatcher::from_config(config, progress)?;
    let replacer = Replacer::from_config(config);
    let summary = dispatcher.dispatch(files, &replacer, cancel)?;

    if let Some(reason) = cancel.reason() {
        info!(%reason, "run was cancelled");
    }
    info!(
        files_touched = summary.files_touched,
        total_replacements = summary.total_replacements,
        failed = summary.failed,
        "replacement complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchMode;
    use tempfile::TempDir;

    fn replacer(pairs: &[(&str, &str)], dry_run: bool) -> Replacer {
        Replacer::new(
            pairs.iter().map(|(s, r)| ReplacePair::new(*s, *r)).collect(),
            dry_run,
        )
    }

    #[test]
    fn test_rewrites_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "hello world, hello").unwrap();

        let outcome = replacer(&[("hello", "hi")], false).process_file(&file, &CancellationToken::new());

        assert!(outcome.error.is_none());
        assert!(outcome.content_changed);
        assert_eq!(outcome.total_replacements, 2);
        assert_eq!(fs::read_to_string(&file).unwrap(), "hi world, hi");
    }

    #[test]
    fn test_dry_run_leaves_file_alone() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "hello").unwrap();

        let outcome = replacer(&[("hello", "hi")], true).process_file(&file, &CancellationToken::new());

        assert!(outcome.content_changed);
        assert_eq!(outcome.total_replacements, 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello");
    }

    #[test]
    fn test_identity_pair_does_not_write() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "same").unwrap();
        let before = fs::metadata(&file).unwrap().modified().unwrap();

        let outcome = replacer(&[("same", "same")], false).process_file(&file, &CancellationToken::new());

        assert_eq!(outcome.total_replacements, 1);
        assert!(!outcome.content_changed);
        assert_eq!(fs::metadata(&file).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let outcome = replacer(&[("a", "b")], false)
            .process_file(&temp_dir.path().join("missing"), &CancellationToken::new());
        assert!(matches!(outcome.error, Some(FileError::Read { .. })));
    }

    #[test]
    fn test_cancelled_token_skips_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "hello").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = replacer(&[("hello", "hi")], false).process_file(&file, &cancel);

        assert!(outcome.cancelled);
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_are_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("run.sh");
        fs::write(&file, "echo old").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o755)).unwrap();

        replacer(&[("old", "new")], false).process_file(&file, &CancellationToken::new());

        let mode = fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
        assert_eq!(fs::read_to_string(&file).unwrap(), "echo new");
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_file_is_a_write_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("locked.txt");
        fs::write(&file, "hello").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o444)).unwrap();

        let outcome = replacer(&[("hello", "hi")], false).process_file(&file, &CancellationToken::new());

        assert!(matches!(outcome.error, Some(FileError::Write { .. })));
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello");
        assert_eq!(fs::metadata(&file).unwrap().permissions().mode() & 0o777, 0o444);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_failure_does_not_stop_the_run() {
        use std::os::unix::fs::PermissionsExt;

        for mode in [DispatchMode::Queue, DispatchMode::FanOut] {
            let temp_dir = TempDir::new().unwrap();
            fs::write(temp_dir.path().join("a.txt"), "hello a").unwrap();
            fs::write(temp_dir.path().join("b.txt"), "hello b").unwrap();
            let locked = temp_dir.path().join("c.txt");
            fs::write(&locked, "hello c").unwrap();
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o444)).unwrap();

            let config = Config::builder(temp_dir.path())
                .pair(ReplacePair::new("hello", "hi"))
                .workers(2)
                .mode(mode)
                .build()
                .unwrap();
            let summary = run_replace(&config, &CancellationToken::new(), ProgressBar::hidden()).unwrap();

            assert_eq!(summary.files_processed, 3, "{mode:?}");
            assert_eq!(summary.failed, 1, "{mode:?}");
            assert_eq!(summary.files_touched, 2, "{mode:?}");
            assert_eq!(fs::read_to_string(temp_dir.path().join("a.txt")).unwrap(), "hi a");
            assert_eq!(fs::read_to_string(temp_dir.path().join("b.txt")).unwrap(), "hi b");
            assert_eq!(fs::read_to_string(&locked).unwrap(), "hello c");
        }
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..5 {
            fs::write(temp_dir.path().join(format!("{i}.txt")), "foo").unwrap();
        }
        let config = Config::builder(temp_dir.path())
            .pair(ReplacePair::new("foo", "bar"))
            .workers(2)
            .build()
            .unwrap();

        let summary = run_replace(&config, &CancellationToken::new(), ProgressBar::hidden()).unwrap();

        assert_eq!(summary.files_touched, 5);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 5);
    }

    #[test]
    fn test_run_replace_in_both_modes() {
        for mode in [DispatchMode::Queue, DispatchMode::FanOut] {
            let temp_dir = TempDir::new().unwrap();
            fs::write(temp_dir.path().join("a.txt"), "hello world").unwrap();
            fs::write(temp_dir.path().join("b.txt"), "hello there").unwrap();
            fs::write(temp_dir.path().join("c.txt"), "nothing").unwrap();

            let config = Config::builder(temp_dir.path())
                .pair(ReplacePair::new("hello", "hi"))
                .workers(2)
                .mode(mode)
                .build()
                .unwrap();
            let summary = run_replace(&config, &CancellationToken::new(), ProgressBar::hidden()).unwrap();

            assert_eq!(summary.files_processed, 3, "{mode:?}");
            assert_eq!(summary.files_touched, 2, "{mode:?}");
            assert_eq!(summary.total_replacements, 2, "{mode:?}");
            assert_eq!(
                fs::read_to_string(temp_dir.path().join("a.txt")).unwrap(),
                "hi world"
            );
        }
    }
}
