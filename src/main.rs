//! shopwatch: storefront health watcher.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                            SHOPWATCH                             │
//!   │                                                                  │
//!   │  ┌───────────┐   trigger   ┌─────────────┐   rows   ┌─────────┐  │
//!   │  │ scheduler │───────────▶│ ingest cycle │◀─────────│ sources │◀─┼── storefront
//!   │  │ cadences  │             │ map → dedup  │          │ retries │  │   feeds
//!   │  └───────────┘             └──────┬──────┘          └─────────┘  │
//!   │                                   │ append (atomic)              │
//!   │                                   ▼                              │
//!   │                            ┌─────────────┐                       │
//!   │                            │    store    │ snapshots + runs      │
//!   │                            └──────┬──────┘                       │
//!   │                                   │                              │
//!   │             ┌─────────────────────┼──────────────────┐           │
//!   │             ▼                     ▼                  ▼           │
//!   │      ┌────────────┐        ┌────────────┐     ┌────────────┐     │
//!   │      │   latest   │        │ timeseries │     │  summary   │     │
//!   │      │   state    │        │ buckets/pN │     │ TTL cache  │     │
//!   │      └─────┬──────┘        └─────┬──────┘     └─────┬──────┘     │
//!   │            └──────────────┬──────┴──────────────────┘            │
//!   │                           ▼                                      │
//!   │                    ┌─────────────┐                               │
//!   │                    │  admin API  │◀──────────────────────────────┼── shopwatch-cli
//!   │                    └─────────────┘                               │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use shopwatch::admin::{self, AdminState};
use shopwatch::clock::{Clock, SystemClock};
use shopwatch::config::load_or_default;
use shopwatch::lifecycle::signals::shutdown_on_signal;
use shopwatch::lifecycle::startup::{build_jobs, open_store};
use shopwatch::lifecycle::Shutdown;
use shopwatch::observability::{logging, metrics};
use shopwatch::query::Window;
use shopwatch::scheduler::Scheduler;
use shopwatch::summary::{DashboardService, MemoryCache, Summary};

/// Grace period for in-flight cycles after a shutdown signal.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "shopwatch")]
#[command(about = "Polls storefront feeds, classifies them and keeps a snapshot history", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "Starting shopwatch"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = open_store(&config.store)?;

    let mut scheduler = Scheduler::new(
        Arc::clone(&clock),
        Arc::clone(&store),
        Duration::from_secs(config.scheduler.misfire_grace_secs),
    );
    for spec in build_jobs(&config, Arc::clone(&store), Arc::clone(&clock))? {
        scheduler.register(spec.job, spec.cadence)?;
    }
    let handles = scheduler.handles();
    if handles.is_empty() {
        tracing::warn!("No jobs enabled; only the admin API will run");
    }

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let mut admin_task = None;
    if config.admin.enabled {
        let default_window = Window::parse_or_default(Some(&config.summary.default_window));
        let dashboard = DashboardService::new(
            Arc::clone(&store),
            Arc::new(MemoryCache::<Arc<Summary>>::new(Arc::clone(&clock))),
            Arc::clone(&clock),
            Duration::from_secs(config.summary.ttl_secs),
        )
        .with_default_window(default_window);

        let state = AdminState {
            api_key: Arc::from(config.admin.api_key.as_str()),
            store: Arc::clone(&store),
            jobs: Arc::new(handles),
            dashboard: Arc::new(dashboard),
            clock: Arc::clone(&clock),
            started_at: clock.now(),
        };
        let router = admin::setup_admin_router(state, Duration::from_secs(config.admin.request_timeout_secs));
        let listener = TcpListener::bind(config.admin.bind_address.as_str()).await?;
        admin_task = Some(tokio::spawn(admin::serve(listener, router, shutdown.clone())));
    }

    let job_tasks = scheduler.start(&shutdown);
    shutdown.wait().await;

    tracing::info!("Waiting for in-flight cycles to finish");
    let drain = async {
        for task in job_tasks {
            let _ = task.await;
        }
        if let Some(task) = admin_task {
            match task.await {
                Ok(Err(err)) => tracing::error!(error = %err, "Admin API stopped with error"),
                Err(err) => tracing::error!(error = %err, "Admin API task failed"),
                Ok(Ok(())) => {}
            }
        }
    };
    if tokio::time::timeout(SHUTDOWN_DEADLINE, drain).await.is_err() {
        tracing::warn!("Shutdown deadline passed, exiting with cycles still running");
    }

    tracing::info!("shopwatch stopped");
    Ok(())
}
