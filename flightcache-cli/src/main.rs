//! flightcache CLI
//!
//! Demonstrates the single-flight resolver against simulated slow producers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flightcache_cache::{CacheResolver, ResolveOptions};
use flightcache_core::{ResolveError, ResolverConfig};

/// flightcache - single-flight memoizing cache demos
#[derive(Parser)]
#[command(name = "flightcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Resolver default TTL in seconds (falls back to FLIGHTCACHE_DEFAULT_TTL_SECONDS)
    #[arg(long, global = true)]
    default_ttl_seconds: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fire many concurrent callers at one key and count producer runs
    Coalesce {
        /// Number of concurrent callers
        #[arg(short, long, default_value = "10")]
        callers: usize,
        /// Simulated producer latency in milliseconds
        #[arg(short, long, default_value = "100")]
        delay_ms: u64,
    },

    /// Show expiry and TTL override resurrection
    Expire {
        /// Per-call TTL in milliseconds
        #[arg(short, long, default_value = "50")]
        ttl_ms: u64,
        /// Simulated producer latency in milliseconds
        #[arg(short, long, default_value = "10")]
        delay_ms: u64,
    },

    /// Show that a failed computation is not cached
    Failure,
}

/// Error type of the simulated producers.
#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("simulated upstream failure")]
    Upstream,
}

type DemoResolver = CacheResolver<String, DemoError>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "flightcache=debug,info"
    } else {
        "flightcache=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match cli.default_ttl_seconds {
        Some(seconds) => ResolverConfig::with_default_ttl(seconds),
        None => ResolverConfig::from_env().context("Failed to load resolver config")?,
    };
    let resolver = DemoResolver::with_config(config).context("Invalid resolver config")?;
    info!(default_ttl = ?resolver.default_ttl(), "Resolver ready");

    match cli.command {
        Commands::Coalesce { callers, delay_ms } => cmd_coalesce(&resolver, callers, delay_ms).await,
        Commands::Expire { ttl_ms, delay_ms } => cmd_expire(&resolver, ttl_ms, delay_ms).await,
        Commands::Failure => cmd_failure(&resolver).await,
    }
}

/// Producer that records its invocation and answers `value` after `delay_ms`.
fn slow_producer(
    runs: &Arc<AtomicUsize>,
    value: String,
    delay_ms: u64,
) -> impl FnOnce() -> BoxFuture<'static, Result<String, DemoError>> + Send + 'static {
    let runs = Arc::clone(runs);
    move || {
        runs.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(value)
        }
        .boxed()
    }
}

/// N concurrent callers, one producer run
async fn cmd_coalesce(resolver: &DemoResolver, callers: usize, delay_ms: u64) -> Result<()> {
    println!(
        "{} {} callers on one key",
        "🛫 Coalescing".cyan().bold(),
        callers
    );

    let runs = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let pending = (0..callers).map(|i| {
        resolver.get_or_resolve(
            "coalesce",
            slow_producer(&runs, format!("value from caller #{i}"), delay_ms),
        )
    });
    let results = join_all(pending).await;
    let elapsed = start.elapsed();

    let mut values = Vec::with_capacity(results.len());
    for result in results {
        values.push(result.context("Coalesced call failed")?);
    }

    let runs = runs.load(Ordering::SeqCst);
    println!("   {} {}", "Producer runs:".dimmed(), runs);
    println!("   {} {}", "Shared value:".dimmed(), values.first().map_or("-", String::as_str));
    println!("   {} {:?}", "Wall time:".dimmed(), elapsed);

    ensure!(runs == 1, "expected a single producer run, saw {runs}");
    ensure!(
        values.windows(2).all(|pair| pair[0] == pair[1]),
        "callers observed different values"
    );
    println!("\n{}", "✅ All callers shared one computation".green().bold());

    Ok(())
}

/// Expiry, then resurrection through a longer override
async fn cmd_expire(resolver: &DemoResolver, ttl_ms: u64, delay_ms: u64) -> Result<()> {
    let ttl = Duration::from_millis(ttl_ms);
    println!("{} TTL {:?}", "⏱️  Expiry with".cyan().bold(), ttl);

    let runs = Arc::new(AtomicUsize::new(0));
    let call = |value: &str, ttl: Duration| {
        resolver.resolve(
            ResolveOptions::new()
                .key("expire")
                .producer(slow_producer(&runs, value.to_string(), delay_ms))
                .ttl(ttl),
        )
    };

    let first = call("first", ttl).await?;
    println!("   {} {}", "t=0:".dimmed(), first);

    // Measured from entry creation, which happened before the producer's delay.
    tokio::time::sleep(ttl / 4).await;
    let hit = call("second", ttl).await?;
    println!("   {} {} (cached)", "before expiry:".dimmed(), hit);

    tokio::time::sleep(ttl).await;
    let fresh = call("third", ttl).await?;
    println!("   {} {} (recomputed)", "after expiry:".dimmed(), fresh);

    tokio::time::sleep(ttl + Duration::from_millis(delay_ms)).await;
    let resurrected = call("fourth", ttl * 100).await?;
    println!(
        "   {} {} (longer override applied before the expiry check)",
        "after expiry, longer TTL:".dimmed(),
        resurrected
    );

    println!("   {} {}", "Producer runs:".dimmed(), runs.load(Ordering::SeqCst));
    Ok(())
}

/// A failed computation is evicted, so the retry runs its producer
async fn cmd_failure(resolver: &DemoResolver) -> Result<()> {
    println!("{}", "💥 Failing producer".cyan().bold());

    let failed = resolver
        .get_or_resolve("failure", || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err(DemoError::Upstream)
        })
        .await;

    match failed {
        Err(ResolveError::ProducerFailure(err)) => {
            println!("   {} {}", "First call failed:".yellow(), err);
        }
        Err(other) => return Err(other).context("Unexpected resolve error"),
        Ok(value) => anyhow::bail!("expected a failure, got {value}"),
    }

    ensure!(
        !resolver.contains_key("failure"),
        "failed entry should have been evicted"
    );

    let recovered = resolver
        .get_or_resolve("failure", || async { Ok("recovered".to_string()) })
        .await?;
    println!("   {} {}", "Retry succeeded:".green(), recovered);

    println!("\n{}", "✅ Failure was not cached".green().bold());
    Ok(())
}
