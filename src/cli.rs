use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

use crate::commands::{self, CommandReport};
use crate::logging;

#[derive(Debug, Parser)]
#[command(
    name = "esmp-sync",
    version,
    about = "Keep a Notion song database in sync with a folder of audio files"
)]
pub struct Cli {
    /// Debug-level logs on stderr (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one snapshot pass: archive orphans, then create missing records.
    Sync(SyncArgs),
    /// Initial pass, then follow the folder until Ctrl-C.
    Watch(WatchArgs),
    /// Show how file names decompose into id, title and status tags.
    Parse(ParseArgs),
    /// Print the resolved configuration with secrets redacted.
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Source folder; defaults to FOLDER_PATH.
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Append the run to sync_output.log and send a notification.
    #[arg(long)]
    pub notify: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Start watching without the initial snapshot pass.
    #[arg(long)]
    pub skip_initial: bool,
}

#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Base names, with or without extension.
    #[arg(required = true)]
    pub names: Vec<String>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(long)]
    pub json: bool,
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn print_report(report: &CommandReport) {
    print!("{}", report.to_text());
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn strip_extension(name: &str) -> String {
    crate::esmp::source::base_name(std::path::Path::new(name)).unwrap_or_else(|| name.to_string())
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl-C; stopping");
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Sync(args) => {
            let options = commands::sync::SyncOptions {
                dir: args.dir,
                notify: args.notify,
            };
            let run = runtime()?.block_on(commands::sync::run(&options))?;
            if args.json {
                print_json(&run)?;
            } else {
                print_report(&run.report);
            }
        }
        Command::Watch(args) => {
            let options = commands::watch::WatchOptions {
                dir: args.dir,
                skip_initial: args.skip_initial,
            };
            let report = runtime()?.block_on(commands::watch::run(&options, ctrl_c()))?;
            print_report(&report);
        }
        Command::Parse(args) => {
            let names = args
                .names
                .iter()
                .map(|name| strip_extension(name))
                .collect::<Vec<_>>();
            let (report, items) = commands::parse::run(&names)?;
            if args.json {
                print_json(&items)?;
            } else {
                print_report(&report);
            }
        }
        Command::Status(args) => {
            let report = commands::status::run()?;
            if args.json {
                print_json(&report)?;
            } else {
                print_report(&report);
            }
        }
    }

    Ok(())
}
