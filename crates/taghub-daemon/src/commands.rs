//! Command implementations for the taghub daemon.
//!
//! - start: load config, open storage, wire the hub, run scheduled jobs
//!   until Ctrl+C or SIGTERM
//! - admin: one-shot maintenance and inspection against the local database

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use taghub_ingest::{
    ArticleQuery, DisabledRelay, EscapeSanitizer, EventPublisher, HttpEventRelay,
    HttpRelayConfig, IngestionCoordinator, RateLimiter,
};
use taghub_prober::{AccessibilityProber, AuthorProber, HttpProbe, ProberConfig};
use taghub_scheduler::jobs::{
    create_author_probe_job, create_compaction_job, create_probe_job, create_rate_limit_prune_job,
    create_sweep_job, AuthorProbeJobConfig, CompactionJobConfig, ProbeJobConfig,
    RateLimitPruneJobConfig, SweepJobConfig,
};
use taghub_scheduler::{SchedulerConfig, SchedulerService};
use taghub_storage::Storage;
use taghub_types::Settings;

use crate::cli::AdminCommands;

/// CLI overrides, applied after every other configuration source.
#[derive(Debug, Default, Clone)]
pub struct Overrides<'a> {
    pub config_path: Option<&'a str>,
    pub db_path: Option<&'a str>,
    pub log_level: Option<&'a str>,
}

/// Load layered settings and apply CLI overrides.
pub fn load_settings(overrides: &Overrides<'_>) -> Result<Settings> {
    let mut settings =
        Settings::load(overrides.config_path).context("Failed to load configuration")?;
    if let Some(db_path) = overrides.db_path {
        settings.db_path = db_path.to_string();
    }
    if let Some(log_level) = overrides.log_level {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_tracing(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Every long-lived component, constructed once and shared by `Arc`.
pub struct Hub {
    pub storage: Arc<Storage>,
    pub limiter: Arc<RateLimiter>,
    pub coordinator: Arc<IngestionCoordinator>,
    pub prober: Arc<AccessibilityProber>,
    pub author_prober: Arc<AuthorProber>,
    relay_task: Option<JoinHandle<()>>,
}

impl Hub {
    /// Open storage and wire the components.
    ///
    /// With `with_relay` set and the relay enabled in settings, events are
    /// POSTed downstream; otherwise they are discarded.
    pub fn build(settings: &Settings, with_relay: bool) -> Result<Self> {
        let db_path = settings.expanded_db_path();
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        info!(path = ?db_path, "Opening storage");
        let storage = Arc::new(Storage::open(&db_path).context("Failed to open storage")?);

        let mut relay_task = None;
        let publisher: Arc<dyn EventPublisher> = match HttpRelayConfig::from_settings(&settings.relay)
            .context("Invalid relay configuration")?
        {
            Some(config) if with_relay => {
                info!(endpoint = %config.endpoint, "Event relay enabled");
                let (relay, handle) =
                    HttpEventRelay::spawn(config).context("Failed to start event relay")?;
                relay_task = Some(handle);
                Arc::new(relay)
            }
            _ => Arc::new(DisabledRelay),
        };

        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(
            settings.ingest.min_post_interval_ms,
        )));
        let coordinator = Arc::new(IngestionCoordinator::new(
            storage.clone(),
            limiter.clone(),
            Arc::new(EscapeSanitizer),
            publisher,
            settings.ingest.clone(),
        ));

        let prober_config = ProberConfig::from(&settings.probe);
        let probe: Arc<HttpProbe> = Arc::new(
            HttpProbe::new(prober_config.timeout).context("Failed to build HTTP probe")?,
        );
        let prober = Arc::new(
            AccessibilityProber::new(coordinator.clone(), probe.clone(), prober_config.clone())
                .context("Invalid prober configuration")?,
        );
        let author_prober = Arc::new(
            AuthorProber::new(coordinator.authors().clone(), probe, prober_config)
                .context("Invalid prober configuration")?,
        );

        Ok(Self {
            storage,
            limiter,
            coordinator,
            prober,
            author_prober,
            relay_task,
        })
    }

    /// Register the scheduled jobs.
    pub async fn register_jobs(&self, scheduler: &SchedulerService, settings: &Settings) -> Result<()> {
        let jobs = &settings.jobs;
        create_probe_job(scheduler, self.prober.clone(), ProbeJobConfig::from_settings(jobs))
            .await
            .context("Failed to register probe job")?;
        create_sweep_job(scheduler, self.prober.clone(), SweepJobConfig::from_settings(jobs))
            .await
            .context("Failed to register sweep job")?;
        create_author_probe_job(
            scheduler,
            self.author_prober.clone(),
            AuthorProbeJobConfig::from_settings(jobs),
        )
        .await
        .context("Failed to register author probe job")?;
        create_rate_limit_prune_job(
            scheduler,
            self.limiter.clone(),
            RateLimitPruneJobConfig::from_settings(jobs),
        )
        .await
        .context("Failed to register rate limit prune job")?;
        create_compaction_job(
            scheduler,
            self.storage.clone(),
            CompactionJobConfig::from_settings(jobs),
        )
        .await
        .context("Failed to register compaction job")?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

/// Start the daemon.
///
/// 1. Load configuration (defaults -> files -> env -> CLI)
/// 2. Open RocksDB storage and wire the hub
/// 3. Register and start scheduled jobs
/// 4. Shut down gracefully on SIGINT/SIGTERM
pub async fn start_daemon(overrides: Overrides<'_>) -> Result<()> {
    let settings = load_settings(&overrides)?;
    init_tracing(&settings.log_level)?;

    info!("taghub daemon starting...");
    info!(
        db_path = %settings.db_path,
        log_level = %settings.log_level,
        timezone = %settings.jobs.timezone,
        relay = settings.relay.enabled,
        "Configuration loaded"
    );

    let mut hub = Hub::build(&settings, true)?;

    let mut scheduler = SchedulerService::new(SchedulerConfig::with_timezone(
        settings.jobs.timezone.clone(),
    ))
    .await
    .context("Failed to create scheduler")?;
    hub.register_jobs(&scheduler, &settings).await?;
    scheduler.start().await.context("Failed to start scheduler")?;

    shutdown_signal().await;

    if let Err(e) = scheduler.shutdown().await {
        warn!(error = %e, "Scheduler shutdown failed");
    }
    for status in scheduler.registry().get_all_status() {
        info!(
            job = %status.job_name,
            runs = status.run_count,
            errors = status.error_count,
            last_result = ?status.last_result,
            "Job summary"
        );
    }

    // Dropping the last publisher handle lets the relay drain and exit
    let relay_task = hub.relay_task.take();
    drop(scheduler);
    drop(hub);
    if let Some(task) = relay_task {
        if tokio::time::timeout(Duration::from_millis(settings.relay.timeout_ms), task)
            .await
            .is_err()
        {
            warn!("Event relay did not drain before shutdown");
        }
    }

    info!("taghub daemon stopped");
    Ok(())
}

/// Run an admin command against the local database.
pub async fn handle_admin(overrides: Overrides<'_>, command: AdminCommands) -> Result<()> {
    let settings = load_settings(&overrides)?;
    init_tracing(&settings.log_level)?;

    if command == AdminCommands::Config {
        let mut shown = settings.clone();
        if shown.relay.shared_secret.is_some() {
            shown.relay.shared_secret = Some("********".to_string());
        }
        print!("{}", toml::to_string_pretty(&shown).context("Failed to render configuration")?);
        return Ok(());
    }

    let hub = Hub::build(&settings, false)?;

    match command {
        AdminCommands::Stats => {
            let stats = hub.storage.get_stats().context("Failed to read stats")?;
            println!("Database Statistics");
            println!("===================");
            println!("Path:      {}", settings.db_path);
            println!("Articles:  {}", stats.article_count);
            println!("Tags:      {}", stats.tag_count);
            println!("Relations: {}", stats.relation_count);
            println!("Authors:   {}", stats.author_count);
            println!("Disk:      {} bytes", stats.disk_usage_bytes);
        }
        AdminCommands::Compact => {
            println!("Compacting...");
            hub.storage.compact().context("Compaction failed")?;
            println!("Compaction complete");
        }
        AdminCommands::Probe => {
            let report = hub.prober.run().await.context("Probe run failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        AdminCommands::Sweep => {
            let report = hub.prober.sweep().await.context("Sweep failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        AdminCommands::ProbeAuthors => {
            let report = hub.author_prober.run().await.context("Author probe run failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        AdminCommands::TopTags { limit } => {
            let query = ArticleQuery::from_coordinator(&hub.coordinator);
            for tag in query.get_most_used_tags(limit).context("Tag query failed")? {
                println!("{:>6}  {}", tag.reference_count, tag.title);
            }
        }
        AdminCommands::ByTags {
            tags,
            exclude_host,
            page_size,
        } => {
            let query = ArticleQuery::from_coordinator(&hub.coordinator);
            let found = query
                .get_articles_by_tags(&tags, exclude_host.as_deref(), page_size)
                .context("Article query failed")?;
            println!("{}", serde_json::to_string_pretty(&found)?);
        }
        AdminCommands::Config => {}
    }

    hub.storage.flush().context("Failed to flush storage")?;
    Ok(())
}
