//! The main entry point for the `swapr` command-line application.
//!
//! This file parses arguments, installs logging and hands the validated
//! configuration to the `swapr` library.

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use swapr::cli;
use swapr::{CancellationToken, OutputFormatter, logging, run_replace};

fn main() -> anyhow::Result<()> {
    let args = cli::parse_args();
    let format = args.format;
    let show_progress = args.progress;

    let config = args.into_config().context("invalid configuration")?;
    logging::init(config.debug())?;

    let progress = if show_progress {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files")
                .context("invalid progress template")?
                .progress_chars("##-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let cancel = CancellationToken::new();
    let summary = run_replace(&config, &cancel, progress)
        .with_context(|| format!("replacement under {} failed", config.root().display()))?;

    let mut stdout = std::io::stdout().lock();
    OutputFormatter::new(format, config.dry_run()).write_summary(&mut stdout, &summary)?;
    Ok(())
}
