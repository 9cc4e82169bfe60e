//! `swapr` is a library for bulk, concurrent, literal find-and-replace.
//!
//! It provides the core logic for the `swapr` command-line tool but can also be used
//! as a standalone library. The main components are:
//!
//! - `Scanner`: Collects the files under a root, pruning ignored directory names.
//! - `engine`: Applies an ordered list of literal pairs to an in-memory buffer.
//! - `Replacer`: Reads, substitutes and atomically rewrites a single file.
//! - `dispatcher`: Spreads files over a bounded set of workers, either through a
//!   pre-filled queue or through per-file tasks gated by admission permits.
//! - `Aggregator`: Collects per-file outcomes into a `RunSummary`.
//! - `config`: Validated run settings, pair parsing and YAML config files.

pub mod aggregator;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod output_formatter;
pub mod replacer;
pub mod scanner;

// Re-export main types for easier access by library users.
pub use aggregator::{Aggregator, ReplaceOutcome, RunSummary};
pub use cancel::CancellationToken;
pub use config::{Config, DispatchMode, ReplacePair};
pub use dispatcher::{Dispatcher, FanOutDispatcher, FileProcessor, QueueDispatcher};
pub use errors::{Error, FileError, Result};
pub use output_formatter::{OutputFormat, OutputFormatter};
pub use replacer::{Replacer, run_replace};
pub use scanner::Scanner;
