//! tcgcache maintenance CLI
//!
//! Operational entry points over a cache directory: per-namespace
//! accounting, expired-entry sweeps, and scans (which self-heal corrupt
//! records as a side effect). Synchronization against a real price store
//! needs an application-provided adapter and lives behind the library API.

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tcgcache::cache::{CacheStore, Namespace};
use tcgcache::config::CacheConfig;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Maintenance tooling for a tcgcache cache directory
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache root directory
    #[arg(long, env = "TCGCACHE_ROOT", default_value = ".tcgcache")]
    root: std::path::PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print per-namespace entry counts and sizes
    Stats,
    /// Remove expired entries from every namespace
    Cleanup,
    /// Walk one namespace, removing corrupt records on the way
    Scan {
        /// Namespace to walk (identification, card_data, ebay_url, pricing)
        namespace: Namespace,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let config = CacheConfig::rooted_at(&args.root);
    let store = CacheStore::open(config).await?;
    info!(root = %args.root.display(), "cache store opened");

    match args.command {
        Command::Stats => {
            for namespace in Namespace::ALL {
                let report = store.namespace_report(namespace).await?;
                println!("{}", serde_json::to_string(&report)?);
            }
        }
        Command::Cleanup => {
            let mut total = 0u64;
            for namespace in Namespace::ALL {
                let removed = store.cleanup_expired(namespace).await?;
                if removed > 0 {
                    info!(%namespace, removed, "expired entries removed");
                }
                total += removed;
            }
            println!("removed {total} expired entries");
        }
        Command::Scan { namespace } => {
            let mut scan = store.scan_namespace(namespace).await?;
            let mut valid = 0u64;
            while let Some(entry) = scan.next().await? {
                valid += 1;
                if entry.is_expired() {
                    warn!(key = %entry.key(), "entry past TTL");
                }
            }
            println!("{namespace}: {valid} valid entries");
        }
    }

    Ok(())
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
