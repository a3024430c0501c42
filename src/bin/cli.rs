// Chapterize - Audible audiobook chapter splitter
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use chapterize::config::Settings;
use chapterize::convert::{run_batch, BookConverter, ConvertOptions};
use chapterize::file::expand_patterns;
use chapterize::watch::{Daemon, WatchSettings};
use chapterize::FfmpegEngine;

#[derive(Parser)]
#[command(name = "chapterize")]
#[command(version, about = "Split Audible audiobooks into chapter MP3s", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert the given files once
    Convert(ConvertArgs),
    /// Watch a directory and convert files as they arrive
    Watch(WatchArgs),
}

/// Author/title directory switches shared by both subcommands
#[derive(Args)]
struct LayoutArgs {
    /// Nest output under an author directory
    #[arg(long = "author-dir", overrides_with = "no_author_dir")]
    author_dir: bool,
    /// Write output without an author directory
    #[arg(long = "no-author-dir", overrides_with = "author_dir")]
    no_author_dir: bool,
    /// Nest output under a title directory
    #[arg(long = "title-dir", overrides_with = "no_title_dir")]
    title_dir: bool,
    /// Write output without a title directory
    #[arg(long = "no-title-dir", overrides_with = "title_dir")]
    no_title_dir: bool,
}

impl LayoutArgs {
    fn apply(&self, options: &mut ConvertOptions) {
        if let Some(value) = switch(self.author_dir, self.no_author_dir) {
            options.use_author_dir = value;
        }
        if let Some(value) = switch(self.title_dir, self.no_title_dir) {
            options.use_title_dir = value;
        }
    }
}

fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

#[derive(Args)]
struct ConvertArgs {
    /// Output directory
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Override the author read from the file
    #[arg(short, long)]
    author: Option<String>,
    /// Override the title read from the file
    #[arg(short, long)]
    title: Option<String>,
    #[command(flatten)]
    layout: LayoutArgs,
    /// Keep going when the cover cannot be exported
    #[arg(short, long)]
    force: bool,
    /// Activation bytes, comma separated to try several
    #[arg(short = 'b', long)]
    activation_bytes: Option<String>,
    /// More output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Files or glob patterns
    #[arg(required = true)]
    files: Vec<String>,
}

#[derive(Args)]
struct WatchArgs {
    /// Output directory
    #[arg(short, long)]
    out: Option<PathBuf>,
    #[command(flatten)]
    layout: LayoutArgs,
    /// Activation bytes, comma separated to try several
    #[arg(short = 'b', long)]
    activation_bytes: Option<String>,
    /// Number of worker threads
    #[arg(short, long)]
    threads: Option<usize>,
    /// Seconds a file must stay the same size before it is converted
    #[arg(short, long)]
    interval: Option<u64>,
    /// More output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Directory to watch (defaults to INPUT_DIR)
    path: Option<PathBuf>,
}

fn init_logging(verbosity: u8) {
    // Respect RUST_LOG if set, otherwise pick a level from the verbosity
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_target(false);

    match verbosity {
        0 => builder.with_level(false).without_time().init(),
        1 => builder.without_time().init(),
        _ => builder.init(),
    }
}

fn base_options(settings: &Settings, out: Option<PathBuf>, activation_bytes: Option<String>) -> ConvertOptions {
    let mut options = ConvertOptions::from_settings(settings);
    if let Some(out) = out {
        options.output_dir = if out.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            out
        };
    }
    if let Some(bytes) = activation_bytes.filter(|b| !b.trim().is_empty()) {
        options.activation_bytes = Some(bytes);
    }
    options
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted");
            trigger.cancel();
        }
    });
    token
}

async fn convert(settings: Settings, args: ConvertArgs) -> Result<()> {
    let mut options = base_options(&settings, args.out, args.activation_bytes);
    options.author = args.author;
    options.title = args.title;
    options.force = args.force;
    args.layout.apply(&mut options);

    let files = expand_patterns(&args.files).context("Invalid file pattern")?;
    if files.is_empty() {
        tracing::warn!("Nothing to convert");
        return Ok(());
    }

    let converter = BookConverter::new(Arc::new(FfmpegEngine::new()));
    let cancel = shutdown_on_ctrl_c();
    let report = run_batch(&converter, &options, &files, &cancel).await?;

    tracing::info!(
        converted = report.converted.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        "Batch finished"
    );
    Ok(())
}

async fn watch(settings: Settings, args: WatchArgs) -> Result<()> {
    let Some(root) = args.path.or_else(|| settings.input_dir.clone()) else {
        let mut cmd = Cli::command();
        let usage = cmd
            .find_subcommand_mut("watch")
            .map(|sub| sub.render_usage().to_string())
            .unwrap_or_default();
        eprintln!("{usage}");
        eprintln!("A directory to watch is required (argument or INPUT_DIR)");
        std::process::exit(1);
    };

    let threads = args.threads.unwrap_or(settings.threads);
    if threads == 0 {
        anyhow::bail!("--threads must be at least 1");
    }

    let mut options = base_options(&settings, args.out, args.activation_bytes);
    args.layout.apply(&mut options);

    let watch_settings = WatchSettings {
        root,
        options,
        threads,
        interval: args
            .interval
            .map(Duration::from_secs)
            .unwrap_or(settings.interval),
    };

    let converter = BookConverter::new(Arc::new(FfmpegEngine::new()));
    let daemon = Daemon::new(watch_settings, converter)?;
    daemon.run(shutdown_on_ctrl_c()).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::from_env().context("Invalid environment configuration")?;

    let cli_verbosity = match &cli.command {
        Commands::Convert(args) => args.verbose,
        Commands::Watch(args) => args.verbose,
    };
    init_logging(settings.verbosity.saturating_add(cli_verbosity));

    match cli.command {
        Commands::Convert(args) => convert(settings, args).await,
        Commands::Watch(args) => watch(settings, args).await,
    }
}
