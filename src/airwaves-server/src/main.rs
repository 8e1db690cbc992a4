use airwaves_cache::{AudioCache, CacheLayout, CacheMaintenance, HttpAudioSource};
use airwaves_core::{
    init_logging, AppDirs, CatalogStore, Config, EpisodeId, MemoryStore, Origin, ProgramId,
};
use airwaves_server::{router, AppState};
use airwaves_sync::{RefreshOptions, Scheduler};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sr_provider::{SrConfig, SrOrigin};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Staging files older than this are assumed orphaned at startup.
const LEFTOVER_TEMP_AGE: Duration = Duration::from_secs(3600);

#[derive(Debug, Parser)]
#[command(name = "airwaves", version, about = "Radio episode audio cache and server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API and run the background prefetch scheduler
    Serve {
        /// Listen address (overrides config)
        #[arg(long)]
        bind: Option<String>,
        /// Catalog seed JSON (overrides config)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Refresh programs once and print the summary
    Refresh {
        /// Program id; repeat for several
        #[arg(long = "program", required = true)]
        programs: Vec<String>,
        /// Trailing window in days (overrides config)
        #[arg(long)]
        window_days: Option<u32>,
        /// Prefetch workers (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Inspect or clean the on-disk audio cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Debug, Subcommand)]
enum CacheCommand {
    /// Show size and age of cached audio
    Stats,
    /// Delete cached audio older than the given age
    Prune {
        #[arg(long)]
        max_age_hours: u64,
    },
    /// Print where an episode's audio is cached
    Path { episode_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = AppDirs::discover()?;
    let config = Config::load_or_default(&dirs)?;
    let _logging = init_logging(&config.logging, &dirs)?;

    match cli.command {
        Command::Serve { bind, catalog } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let catalog = catalog.or_else(|| config.server.catalog.clone());
            serve(&config, &bind, catalog.as_deref()).await
        }
        Command::Refresh {
            programs,
            window_days,
            concurrency,
            catalog,
        } => {
            let mut options = refresh_options(&config);
            if let Some(days) = window_days {
                options.window = days_to_duration(days);
            }
            if let Some(concurrency) = concurrency {
                options.concurrency = concurrency;
            }
            let catalog = catalog.or_else(|| config.server.catalog.clone());
            let state = build_state(&config, catalog.as_deref())?;
            let programs: Vec<ProgramId> = programs.into_iter().map(ProgramId::new).collect();
            let summary = state.refresher.refresh_programs(&programs, options).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Cache(command) => run_cache_command(&config, command),
    }
}

async fn serve(config: &Config, bind: &str, catalog: Option<&Path>) -> Result<()> {
    let state = build_state(config, catalog)?;

    let maintenance = CacheMaintenance::new(state.cache.layout().clone());
    let swept = maintenance.sweep_temp_files(LEFTOVER_TEMP_AGE)?;
    if !swept.is_empty() {
        tracing::info!(count = swept.len(), "removed leftover temporary downloads");
    }

    if config.prefetch.enabled {
        let scheduler = Arc::new(Scheduler::new(
            state.refresher.clone(),
            config.prefetch.interval(),
        ));
        scheduler.start();
    } else {
        tracing::info!("background prefetch disabled");
    }

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        cache_root = %config.cache.root.display(),
        ttl_hours = config.cache.ttl_hours,
        "airwaves listening"
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

fn build_state(config: &Config, catalog: Option<&Path>) -> Result<AppState> {
    let store: Arc<dyn CatalogStore> = match catalog {
        Some(path) => Arc::new(MemoryStore::from_seed_file(path)?),
        None => Arc::new(MemoryStore::new()),
    };
    let origin: Arc<dyn Origin> = Arc::new(SrOrigin::new(SrConfig {
        base_url: config.origin.base_url.clone(),
        timeout: Duration::from_secs(config.origin.timeout_secs),
    })?);
    let source = HttpAudioSource::new(config.cache.download_timeout())?;
    let cache = Arc::new(AudioCache::new(
        CacheLayout::new(&config.cache.root),
        config.cache.ttl(),
        Arc::new(source),
    ));
    Ok(AppState::new(store, origin, cache, refresh_options(config)))
}

fn refresh_options(config: &Config) -> RefreshOptions {
    RefreshOptions {
        window: days_to_duration(config.prefetch.window_days),
        concurrency: config.prefetch.concurrency,
    }
}

fn days_to_duration(days: u32) -> Duration {
    hours_to_duration(u64::from(days).saturating_mul(24))
}

fn hours_to_duration(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(3600))
}

fn run_cache_command(config: &Config, command: CacheCommand) -> Result<()> {
    let layout = CacheLayout::new(&config.cache.root);
    match command {
        CacheCommand::Stats => {
            let stats = CacheMaintenance::new(layout.clone()).stats()?;
            println!("Cache: {}", layout.episodes_dir().display());
            println!("  files: {}", stats.file_count);
            println!("  bytes: {}", stats.total_size);
            if let Some(oldest) = stats.oldest_file {
                println!("  oldest: {}", describe_age(oldest));
            }
            if let Some(newest) = stats.newest_file {
                println!("  newest: {}", describe_age(newest));
            }
        }
        CacheCommand::Prune { max_age_hours } => {
            let removed = CacheMaintenance::new(layout)
                .prune(hours_to_duration(max_age_hours))?;
            tracing::info!(count = removed.len(), max_age_hours, "pruned cache");
            println!("Removed {} cached file(s)", removed.len());
        }
        CacheCommand::Path { episode_id } => {
            let path = layout.episode_path(&EpisodeId::new(episode_id));
            let marker = if path.exists() { "" } else { " (not cached)" };
            println!("{}{}", path.display(), marker);
        }
    }
    Ok(())
}

fn describe_age(at: SystemTime) -> String {
    match SystemTime::now().duration_since(at) {
        Ok(age) => format!("{}h ago", age.as_secs() / 3600),
        Err(_) => "in the future".to_string(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
