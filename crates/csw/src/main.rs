//! csw - Cached file watcher
//!
//! Reads a file through a cache bridge and prints every value the bridge
//! emits, optionally refreshing on a timer or when the file changes.

mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cachestream::{signal, BridgeConfig, CacheBridge, JsonPersistence, Origin};
use clap::Parser;
use futures::StreamExt;
use tracing::{error, info};

use crate::watch::{file_source, modified_since};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to read
    #[arg(short, long)]
    file: PathBuf,

    /// Flush the cached contents every N seconds
    #[arg(short, long, conflicts_with = "watch")]
    every: Option<u64>,

    /// Flush when the file is modified
    #[arg(short, long)]
    watch: bool,

    /// How often to check the file when watching (milliseconds)
    #[arg(long, default_value_t = 500)]
    poll_ms: u64,

    /// Persist the cached contents in this directory
    #[arg(short, long)]
    persist_dir: Option<PathBuf>,

    /// Persistence key (defaults to the file name)
    #[arg(short, long)]
    key: Option<String>,

    /// Stop after this many values
    #[arg(short, long)]
    count: Option<usize>,
}

impl Args {
    fn persistence_key(&self) -> String {
        self.key.clone().unwrap_or_else(|| {
            self.file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "csw".to_string())
        })
    }

    fn config(&self) -> Result<BridgeConfig<String>> {
        let mut config = BridgeConfig::new();

        if let Some(secs) = self.every {
            let period = Duration::from_secs(secs);
            config = config.flush_on(move |_| Ok(signal::after(period)));
        } else if self.watch {
            let path = self.file.clone();
            let poll = Duration::from_millis(self.poll_ms);
            config = config
                .flush_on(move |cached| Ok(modified_since(path.clone(), cached.loaded_at(), poll)))
                .expiry_probe_window(Duration::from_millis(100));
        }

        if let Some(dir) = &self.persist_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            let manager = JsonPersistence::<String>::in_dir(dir)?;
            config = config
                .persistence(Arc::new(manager))
                .persistence_key(self.persistence_key());
        }

        Ok(config)
    }
}

fn origin_label(origin: Origin) -> &'static str {
    match origin {
        Origin::Loader => "loaded",
        Origin::Persistence => "restored",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Starting csw v{}", env!("CARGO_PKG_VERSION"));
    info!("Reading {}", args.file.display());
    if let Some(dir) = &args.persist_dir {
        info!("Persisting to {} as {}", dir.display(), args.persistence_key());
    }

    let bridge = CacheBridge::new(file_source(args.file.clone()), args.config()?)?;
    let mut values = bridge.subscribe_cached();
    let mut seen = 0;

    loop {
        tokio::select! {
            next = values.next() => match next {
                Some(Ok(cached)) => {
                    seen += 1;
                    println!("--- {} ({})", args.file.display(), origin_label(cached.origin()));
                    println!("{}", cached.value());
                    if args.count.is_some_and(|count| seen >= count) {
                        break;
                    }
                }
                Some(Err(e)) => {
                    error!("Failed to read {}: {}", args.file.display(), e);
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    let stats = bridge.stats();
    info!(
        "Loads: {}, restores: {}, flushes: {}",
        stats.loads(),
        stats.restores(),
        stats.flushes()
    );
    Ok(())
}
