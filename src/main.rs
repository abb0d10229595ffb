//! fmkit - recursive file operations with progress and change monitoring.
//!
//! Usage:
//!   fmkit chmod 644 [--mask 777] [-R] PATHS...   Change permission bits
//!   fmkit chown [--uid U] [--gid G] [-R] PATHS... Change ownership
//!   fmkit rm PATHS...                            Delete recursively
//!   fmkit count [--json] PATHS...                Count entries and bytes
//!   fmkit watch DIR [--seconds N]                Print change events
//!
//! Set `FMKIT_LOG` (e.g. `FMKIT_LOG=debug`) to see library logs on stderr.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use fmkit_core::{DeepCount, LocalFs, Location, Vfs};
use fmkit_monitor::{MonitorConfig, MonitorRegistry};
use fmkit_ops::{
    ChangeAttrOptions, DeepCounter, JobHandle, JobSummary, JobUpdate, ModeChange, start_change_attr,
    start_delete,
};

#[derive(Parser)]
#[command(
    name = "fmkit",
    version,
    about = "Recursive file operations with progress and change monitoring"
)]
struct Cli {
    /// Cancel the job on the first error instead of letting it decide
    #[arg(long, global = true)]
    abort_on_error: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Change permission bits
    Chmod {
        /// New permission bits, in octal
        #[arg(value_parser = parse_octal)]
        mode: u32,

        /// Only bits in this octal mask are changed
        #[arg(short, long, value_parser = parse_octal, default_value = "7777")]
        mask: u32,

        /// Descend into directories
        #[arg(short = 'R', long)]
        recursive: bool,

        /// Paths or URIs to change
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Change owning user and/or group
    Chown {
        /// New owning user id
        #[arg(short, long)]
        uid: Option<u32>,

        /// New owning group id
        #[arg(short, long)]
        gid: Option<u32>,

        /// Descend into directories
        #[arg(short = 'R', long)]
        recursive: bool,

        /// Paths or URIs to change
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Delete files and directory trees
    Rm {
        /// Paths or URIs to delete
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Count entries and bytes under the given paths
    Count {
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,

        /// Paths to count
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print change events for a directory
    Watch {
        /// Directory to watch
        dir: String,

        /// Stop after this many seconds
        #[arg(short, long, default_value = "10")]
        seconds: u64,
    },
}

#[derive(Serialize)]
struct CountReport {
    roots: Vec<String>,
    #[serde(flatten)]
    count: DeepCount,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    let registry = MonitorRegistry::new(MonitorConfig::default());
    let vfs: Arc<dyn Vfs> = Arc::new(LocalFs::new());

    let result = match cli.command {
        Command::Chmod {
            mode,
            mask,
            recursive,
            paths,
        } => {
            let options = ChangeAttrOptions::builder()
                .mode(ModeChange::new(mode, mask))
                .recursive(recursive)
                .build()
                .context("Invalid mode")?;
            let roots = parse_locations(&paths)?;
            let handle = start_change_attr(vfs, registry.clone(), roots, options);
            follow_job(handle, cli.abort_on_error).await
        }
        Command::Chown {
            uid,
            gid,
            recursive,
            paths,
        } => {
            let mut builder = ChangeAttrOptions::builder();
            if let Some(uid) = uid {
                builder.uid(uid);
            }
            if let Some(gid) = gid {
                builder.gid(gid);
            }
            let options = builder
                .recursive(recursive)
                .build()
                .context("Give --uid and/or --gid")?;
            let roots = parse_locations(&paths)?;
            let handle = start_change_attr(vfs, registry.clone(), roots, options);
            follow_job(handle, cli.abort_on_error).await
        }
        Command::Rm { paths } => {
            let roots = parse_locations(&paths)?;
            let handle = start_delete(vfs, registry.clone(), roots);
            follow_job(handle, cli.abort_on_error).await
        }
        Command::Count { json, paths } => run_count(vfs, &paths, json).await,
        Command::Watch { dir, seconds } => {
            run_watch(&registry, &dir, Duration::from_secs(seconds)).await
        }
    };

    registry.shutdown();
    result
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FMKIT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_octal(s: &str) -> std::result::Result<u32, String> {
    let digits = s.trim_start_matches("0o");
    u32::from_str_radix(digits, 8).map_err(|e| format!("'{}' is not an octal mode: {}", s, e))
}

/// Accept URIs as given and resolve plain paths against the current directory.
fn parse_location(input: &str) -> Result<Location> {
    if input.contains("://") {
        return Location::parse(input).with_context(|| format!("Invalid location '{}'", input));
    }
    let path = std::path::absolute(Path::new(input))
        .with_context(|| format!("Invalid path '{}'", input))?;
    Ok(Location::from_path(path))
}

fn parse_locations(inputs: &[String]) -> Result<Vec<Location>> {
    inputs.iter().map(|input| parse_location(input)).collect()
}

/// Print a job's progress to stderr and turn its summary into an exit status.
async fn follow_job(mut handle: JobHandle, abort_on_error: bool) -> Result<()> {
    let mut current = String::new();
    let mut summary: Option<JobSummary> = None;

    while let Some(update) = handle.recv().await {
        match update {
            JobUpdate::Prepared(total) => tracing::debug!("prepared, total {}", total),
            JobUpdate::CurrentFile(name) => current = name,
            JobUpdate::Percent(ratio) => {
                eprint!("\r{:5.1}% {:<40}", ratio * 100.0, truncate(&current, 40));
                let _ = std::io::stderr().flush();
            }
            JobUpdate::Error(report) => {
                eprintln!();
                eprintln!("error: {}", report.message);
                if abort_on_error {
                    handle.cancel();
                }
            }
            JobUpdate::Complete(done) => summary = Some(done),
        }
    }
    eprintln!();

    let Some(summary) = summary else {
        bail!("Job ended without reporting completion");
    };

    if summary.cancelled {
        bail!("Cancelled after {} of {} {}", summary.finished, summary.total, summary.unit);
    }
    if !summary.is_success() {
        bail!("Stopped with {} error(s)", summary.errors);
    }
    eprintln!("Done: {} {}", summary.finished, summary.unit);
    Ok(())
}

async fn run_count(vfs: Arc<dyn Vfs>, paths: &[String], json: bool) -> Result<()> {
    let roots = parse_locations(paths)?;
    let names: Vec<String> = roots.iter().map(ToString::to_string).collect();

    let count = tokio::task::spawn_blocking(move || DeepCounter::new(vfs.as_ref()).count(&roots))
        .await
        .context("Count failed")?;

    if json {
        let report = CountReport {
            roots: names,
            count,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} files, {} directories, {}",
            count.files,
            count.dirs,
            format_size(count.bytes)
        );
    }
    Ok(())
}

async fn run_watch(registry: &MonitorRegistry, dir: &str, duration: Duration) -> Result<()> {
    let location = parse_location(dir)?;
    let handle = registry
        .directory_watch(&location)
        .with_context(|| format!("Cannot watch {}", location))?;
    if handle.is_dummy() {
        eprintln!("{} cannot be watched natively; no events will arrive", location);
    }
    eprintln!("Watching {} for {}s", location, duration.as_secs());

    let mut events = handle.subscribe();
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            received = events.recv() => match received {
                Ok(event) => println!("{:<18} {}", event.kind.to_string(), event.location),
                Err(RecvError::Lagged(missed)) => eprintln!("({} events dropped)", missed),
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.cancel();
    Ok(())
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(s.chars().count() - (max_len - 3)).collect();
        format!("...{}", tail)
    }
}
