use crate::config::{
    Config, ConfigLoader, DispatchMode, ReplacePair, load_pairs_file, parse_pairs_list,
    split_comma_list,
};
use crate::errors::Result;
use crate::output_formatter::OutputFormat;
use clap::Parser;
use std::env;
use std::path::{Path, PathBuf};

/// Concurrent literal find-and-replace across a directory tree.
///
/// `swapr` walks a directory, skips ignored directory names, and applies an
/// ordered list of `search -> replace` pairs to every file it finds.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Concurrent literal find-and-replace across a directory tree",
    long_about = "swapr - bulk, in-place string substitution over a directory tree.

Pairs are plain strings (no regex) and are applied in the order given, each
one seeing the result of the previous one.

QUICK EXAMPLES:
  swapr -d . -s 'http://cdn.old' -r 'https://cdn.new'   # Single pair
  swapr -d . -p 'foo:bar,baz:qux' --dry-run             # Preview several pairs
  swapr -d src --pairs-file pairs.txt -w 8              # Pairs from a file
  swapr -c swapr.yaml -m fan-out -f json                # Config file, JSON summary

Pairs file format (one pair per line, '#' starts a comment):
  old_name new_name
  http:// https://"
)]
pub struct Args {
    /// The root directory to process. Defaults to the current directory.
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// A single string to search for.
    #[arg(short, long, requires = "replace")]
    pub search: Option<String>,

    /// The string to replace `--search` with.
    #[arg(short, long, requires = "search", allow_hyphen_values = true)]
    pub replace: Option<String>,

    /// A list of pairs: "search1:replace1,search2:replace2".
    #[arg(short, long)]
    pub pairs: Option<String>,

    /// A file with one "search replace" pair per line.
    #[arg(long)]
    pub pairs_file: Option<PathBuf>,

    /// Path to a YAML configuration file. Command-line flags override it.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// A comma-separated list of directory names to skip (replaces the defaults).
    #[arg(short, long)]
    pub ignore: Option<String>,

    /// Report what would change without modifying any file.
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,

    /// The number of files processed concurrently. Defaults to the number of logical CPU cores.
    #[arg(short, long, env = "SWAPR_WORKERS")]
    pub workers: Option<usize>,

    /// How work is handed to workers.
    #[arg(short, long, value_enum)]
    pub mode: Option<DispatchMode>,

    /// The output format for the final summary.
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,

    /// Show a progress bar while files are processed.
    #[arg(long)]
    pub progress: bool,
}

impl Args {
    /// Merges the optional config file with the flags and validates the result.
    pub fn into_config(self) -> Result<Config> {
        let cwd = env::current_dir()?;
        self.into_config_from(&cwd)
    }

    fn into_config_from(self, cwd: &Path) -> Result<Config> {
        let mut builder = Config::builder(".");

        if let Some(config_path) = &self.config {
            let found = ConfigLoader::find_config(config_path, cwd)?;
            let file = ConfigLoader::load(&found)?;
            let base_dir = found.parent().unwrap_or(cwd).to_path_buf();
            builder = builder.merge_file(file, &base_dir)?;
        }

        if let Some(dir) = self.dir {
            builder = builder.root(dir);
        }
        if let Some(ignore) = &self.ignore {
            builder = builder.ignore_dirs(split_comma_list(ignore));
        }
        if let Some(pairs) = &self.pairs {
            builder = builder.pairs(parse_pairs_list(pairs)?);
        }
        if let Some(pairs_file) = &self.pairs_file {
            builder = builder.pairs(load_pairs_file(pairs_file)?);
        }
        if let (Some(search), Some(replace)) = (self.search, self.replace) {
            builder = builder.pair(ReplacePair::new(search, replace));
        }
        if self.dry_run {
            builder = builder.dry_run(true);
        }
        if self.debug {
            builder = builder.debug(true);
        }
        if let Some(workers) = self.workers {
            builder = builder.workers(workers);
        }
        if let Some(mode) = self.mode {
            builder = builder.mode(mode);
        }

        builder.build()
    }
}

/// Parses command-line arguments and returns the populated `Args` struct.
pub fn parse_args() -> Args {
    Args::parse()
}
