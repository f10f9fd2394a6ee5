use anyhow::Result;
use clap::Parser;
use ironbrc::Runner;
use ironbrc::io::chunks::DEFAULT_CHUNK_SIZE;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "metrics")]
use ironbrc::metrics::RunMetrics;

/// Per-key min/mean/max over a `key;value` measurements file.
#[derive(Parser, Debug)]
#[command(name = "ironbrc", version, about)]
struct Cli {
    /// Measurements file; `.gz`, `.zst`, `.bz2` and `.xz` are decompressed.
    path: PathBuf,

    /// Target chunk size in bytes before extending to the next newline.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Worker threads (default: number of CPUs).
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Aggregate on the calling thread only.
    #[arg(long, conflicts_with = "threads")]
    sequential: bool,

    /// Validate every number instead of trusting the input format.
    #[arg(long)]
    strict: bool,

    /// Write run statistics as JSON to this file.
    #[cfg(feature = "metrics")]
    #[arg(long, value_name = "FILE")]
    metrics_out: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over -v when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_thread_names(verbose >= 3)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!(?cli, "parsed arguments");

    let runner = (if cli.sequential { Runner::sequential() } else { Runner::parallel(cli.threads) })
        .with_chunk_size(cli.chunk_size)
        .strict(cli.strict);

    #[cfg(feature = "metrics")]
    let metrics = RunMetrics::new();
    #[cfg(feature = "metrics")]
    let runner = runner.with_metrics(metrics.clone());

    let result = runner.run_path(&cli.path)?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "{result}")?;
    out.flush()?;

    #[cfg(feature = "metrics")]
    {
        metrics.log();
        if let Some(path) = &cli.metrics_out {
            metrics.save_to_file(path)?;
        }
    }

    Ok(())
}
