use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use animregen::synthetic::{ChecksumRendererFactory, LayeredDocument};

#[derive(Parser, Debug)]
#[command(name = "animregen", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Regenerate frames of a synthetic layered document and print the run report as JSON.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Dirty frames as `start..end` (end exclusive) or a single index. Repeatable.
    #[arg(long = "frames", required = true, value_parser = animregen::FrameRange::parse)]
    frames: Vec<animregen::FrameRange>,

    /// Options JSON file (see `RegenOpts`). Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Upper bound on parallel workers.
    #[arg(long)]
    max_workers: Option<usize>,

    /// Batch mode: the first failing frame fails the whole run.
    #[arg(long)]
    batch: bool,

    /// Make this frame fail to render. Repeatable.
    #[arg(long = "fail-frame")]
    fail_frames: Vec<u64>,

    /// Size of the synthetic document in MiB.
    #[arg(long, default_value_t = 4)]
    doc_mib: u32,

    /// Pretend this much memory is available instead of asking the OS.
    #[arg(long)]
    available_mib: Option<u64>,

    /// Artificial per-frame render time in milliseconds.
    #[arg(long, default_value_t = 0)]
    frame_delay_ms: u64,

    /// Include per-frame checksums in the output.
    #[arg(long)]
    checksums: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let mut opts = match &args.config {
        Some(path) => animregen::RegenOpts::from_path(path)?,
        None => animregen::RegenOpts::default(),
    };
    if args.max_workers.is_some() {
        opts.max_workers = args.max_workers;
    }
    if args.batch {
        opts.batch_mode = true;
    }

    let doc = LayeredDocument::with_footprint_mib(args.doc_mib)
        .with_context(|| format!("create {} MiB document", args.doc_mib))?;
    let source = animregen::SourceDocument::new(doc);

    let factory = ChecksumRendererFactory::new()
        .with_failing_frames(args.fail_frames.iter().copied().map(animregen::FrameIndex))
        .with_frame_delay(Duration::from_millis(args.frame_delay_ms));
    let checksums = factory.checksums().clone();

    let frames = args.frames.iter().flat_map(|r| r.frames());
    let policy = animregen::FrameList::ascending(frames);

    let mut scheduler =
        animregen::RegenerationScheduler::new(source, Arc::new(policy), Arc::new(factory), opts)?;
    if let Some(mib) = args.available_mib {
        let bytes = mib
            .checked_mul(1 << 20)
            .ok_or_else(|| anyhow::anyhow!("--available-mib {mib} is too large"))?;
        scheduler = scheduler.with_memory_probe(Arc::new(animregen::FixedMemoryProbe(bytes)));
    }

    let ctx = animregen::ExecutionContext::new()
        .with_reporter(Arc::new(animregen::LogProgressReporter));
    let report = scheduler.regenerate_range(&ctx);

    let out = if args.checksums {
        serde_json::json!({ "report": report, "checksums": checksums.snapshot() })
    } else {
        serde_json::to_value(&report).context("serialize report")?
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&out).context("serialize report")?
    );

    Ok(match report.outcome {
        animregen::RegenOutcome::Complete => ExitCode::SUCCESS,
        animregen::RegenOutcome::Failed => ExitCode::from(1),
        animregen::RegenOutcome::Cancelled => ExitCode::from(2),
    })
}
