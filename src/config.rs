use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, File};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Directory names skipped when no ignore list is given.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[".git", "node_modules", "vendor", "build", "dist"];

/// Name of the per-user configuration directory.
const CONFIG_DIR_NAME: &str = "swapr";

/// A literal search string and what to replace it with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacePair {
    pub search: String,
    pub replace: String,
}

impl ReplacePair {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
        }
    }
}

/// How file paths are handed to workers.
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchMode {
    /// Fill a closed queue with every path and let a fixed set of workers drain it.
    #[default]
    Queue,
    /// Spawn one task per file and gate active processing with admission tokens.
    FanOut,
}

/// The validated settings for one run.
///
/// A `Config` can only be obtained through [`ConfigBuilder::build`], which
/// rejects empty pair lists, empty search strings and a zero worker count.
/// It cannot be changed afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    ignore_dirs: Vec<String>,
    replacements: Vec<ReplacePair>,
    debug: bool,
    dry_run: bool,
    workers: NonZeroUsize,
    mode: DispatchMode,
}

impl Config {
    /// Starts a builder rooted at `root` with the default ignore list.
    pub fn builder(root: impl Into<PathBuf>) -> ConfigBuilder {
        ConfigBuilder::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ignore_dirs(&self) -> &[String] {
        &self.ignore_dirs
    }

    pub fn replacements(&self) -> &[ReplacePair] {
        &self.replacements
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn workers(&self) -> usize {
        self.workers.get()
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }
}

/// Collects settings from config files and the command line before validation.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    root: PathBuf,
    ignore_dirs: Vec<String>,
    replacements: Vec<ReplacePair>,
    debug: bool,
    dry_run: bool,
    workers: Option<usize>,
    mode: DispatchMode,
}

impl ConfigBuilder {
    fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|d| d.to_string()).collect(),
            replacements: Vec::new(),
            debug: false,
            dry_run: false,
            workers: None,
            mode: DispatchMode::default(),
        }
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Replaces the ignore list. Blank entries are dropped.
    pub fn ignore_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_dirs = dirs
            .into_iter()
            .map(Into::into)
            .map(|d: String| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        self
    }

    /// Appends a pair unless an identical one is already queued.
    pub fn pair(mut self, pair: ReplacePair) -> Self {
        if !self.replacements.contains(&pair) {
            self.replacements.push(pair);
        }
        self
    }

    pub fn pairs(self, pairs: impl IntoIterator<Item = ReplacePair>) -> Self {
        pairs.into_iter().fold(self, ConfigBuilder::pair)
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Layers a parsed config file underneath whatever has been set so far.
    ///
    /// Pairs from the file come first; scalar settings from the file only
    /// apply where the caller did not set them explicitly afterwards.
    /// Relative `root` and `pairs_file` entries resolve against `base_dir`,
    /// the directory holding the config file.
    pub fn merge_file(mut self, file: ConfigFile, base_dir: &Path) -> Result<Self> {
        if let Some(root) = file.root {
            self.root = if root.is_absolute() {
                root
            } else {
                base_dir.join(root)
            };
        }
        if let Some(dirs) = file.ignore_dirs {
            self = self.ignore_dirs(dirs);
        }
        let mut pairs = file.replacements;
        if let Some(pairs_file) = file.pairs_file {
            let path = if pairs_file.is_absolute() {
                pairs_file
            } else {
                base_dir.join(pairs_file)
            };
            pairs.extend(load_pairs_file(&path)?);
        }
        let queued = std::mem::take(&mut self.replacements);
        self = self.pairs(pairs).pairs(queued);
        self.debug |= file.debug;
        self.dry_run |= file.dry_run;
        if self.workers.is_none() {
            self.workers = file.workers;
        }
        if let Some(mode) = file.mode {
            self.mode = mode;
        }
        Ok(self)
    }

    /// Validates the collected settings and freezes them into a [`Config`].
    pub fn build(self) -> Result<Config> {
        if self.replacements.is_empty() {
            return Err("no replacement pairs given (use --search/--replace, --pairs or --pairs-file)".into());
        }
        if let Some(pos) = self.replacements.iter().position(|p| p.search.is_empty()) {
            return Err(format!("replacement pair #{} has an empty search string", pos + 1).into());
        }
        let workers = self.workers.unwrap_or_else(num_cpus::get);
        let workers = NonZeroUsize::new(workers)
            .ok_or_else(|| Error::Config("worker count must be at least 1".to_string()))?;

        Ok(Config {
            root: self.root,
            ignore_dirs: self.ignore_dirs,
            replacements: self.replacements,
            debug: self.debug,
            dry_run: self.dry_run,
            workers,
            mode: self.mode,
        })
    }
}

/// The on-disk YAML configuration. Every key is optional.
///
/// ```yaml
/// root: ./web
/// ignore_dirs: [.git, node_modules]
/// replacements:
///   - search: http://cdn.old
///     replace: https://cdn.new
/// pairs_file: pairs.txt
/// dry_run: true
/// workers: 8
/// mode: fan-out
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub ignore_dirs: Option<Vec<String>>,
    #[serde(default)]
    pub replacements: Vec<ReplacePair>,
    #[serde(default)]
    pub pairs_file: Option<PathBuf>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub mode: Option<DispatchMode>,
}

/// A utility for locating and loading configuration files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Finds the configuration file by searching in a prioritized list of locations.
    ///
    /// The search order is:
    /// 1. `config_path` as given (absolute, or relative to the current directory).
    /// 2. A path relative to `working_dir`.
    /// 3. Inside the user config directory (`~/.config/swapr` on Linux).
    /// 4. Inside `~/.swapr`.
    /// 5. Next to the executable.
    pub fn find_config(config_path: &Path, working_dir: &Path) -> Result<PathBuf> {
        let mut candidates = vec![config_path.to_path_buf()];
        if !config_path.is_absolute() {
            candidates.push(working_dir.join(config_path));
            if let Some(dir) = dirs::config_dir() {
                candidates.push(dir.join(CONFIG_DIR_NAME).join(config_path));
            }
            if let Some(home) = env::var_os("HOME") {
                candidates.push(
                    PathBuf::from(home)
                        .join(format!(".{CONFIG_DIR_NAME}"))
                        .join(config_path),
                );
            }
            if let Some(exe_dir) = env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
            {
                candidates.push(exe_dir.join(config_path));
            }
        }

        if let Some(found) = candidates.iter().find(|c| c.is_file()) {
            return Ok(found.clone());
        }

        let tried: Vec<String> = candidates.iter().map(|c| c.display().to_string()).collect();
        Err(format!(
            "Config file '{}' not found. Searched in:\n  - {}",
            config_path.display(),
            tried.join("\n  - ")
        )
        .into())
    }

    /// Loads a [`ConfigFile`] from a YAML file.
    pub fn load(path: &Path) -> Result<ConfigFile> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
pub fn split_comma_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `"search1:replace1,search2:replace2"`.
///
/// Each entry is split on its first `:`, so the replacement may itself
/// contain colons. An entry without a colon is rejected.
pub fn parse_pairs_list(list: &str) -> Result<Vec<ReplacePair>> {
    list.split(',')
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((search, replace)) => Ok(ReplacePair::new(search, replace)),
            None => Err(Error::Config(format!(
                "malformed pair '{entry}', expected 'search:replace'"
            ))),
        })
        .collect()
}

/// Parses a pairs file: one `search replace` per line, whitespace separated.
///
/// Blank lines and lines starting with `#` are skipped. Fields beyond the
/// second are ignored.
pub fn parse_pairs_file(content: &str) -> Result<Vec<ReplacePair>> {
    let mut pairs = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(search), Some(replace)) => pairs.push(ReplacePair::new(search, replace)),
            _ => {
                return Err(Error::Config(format!(
                    "line {}: expected 'search replace', got '{line}'",
                    idx + 1
                )));
            }
        }
    }
    Ok(pairs)
}

/// Reads and parses a pairs file from disk.
pub fn load_pairs_file(path: &Path) -> Result<Vec<ReplacePair>> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read pairs file {}: {e}", path.display())))?;
    parse_pairs_file(&content)
}
