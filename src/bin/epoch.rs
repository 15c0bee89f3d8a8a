use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ethash_dag::{CacheInfo, DagConfig, Epoch, SeedHashCache};
use tracing_subscriber::EnvFilter;

/// Print the DAG descriptor of every epoch in `FROM..TO`.
#[derive(Debug, Parser)]
#[command(name = "epoch", version)]
struct Args {
    /// First epoch (inclusive)
    from: Epoch,
    /// Last epoch (exclusive)
    to: Epoch,
    /// TOML file with a custom schedule
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print cache descriptors only
    #[arg(long)]
    cache_only: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "epoch failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> ethash_dag::Result<()> {
    let config = match &args.config {
        Some(path) => DagConfig::from_file(path)?,
        None => DagConfig::default(),
    };
    let seeds = SeedHashCache::with_checkpoint_interval(config.seed_checkpoint_interval)?;
    let schedule = config.schedule;

    tracing::info!(
        from = %args.from,
        to = %args.to,
        epochs = args.to.as_u64().saturating_sub(args.from.as_u64()),
        "calculating dag descriptors"
    );

    for e in args.from.as_u64()..args.to.as_u64() {
        let epoch = Epoch::new(e);
        // sizes first: they reject epochs past the bound before the seed chain
        let size = schedule.full_size(epoch)?;
        let cache_size = schedule.cache_size(epoch)?;
        let info = ethash_dag::DagInfo {
            epoch,
            seedhash: seeds.seed_hash(epoch),
            size,
            cache_size,
        };
        let line = if args.cache_only {
            serde_json::to_string(&CacheInfo::from(info))
        } else {
            serde_json::to_string(&info)
        };
        match line {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::error!(%epoch, error = %e, "failed to encode descriptor"),
        }
    }
    Ok(())
}
