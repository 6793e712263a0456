//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the configured snapshot store
//! - Build one source, mapper and ingest job per enabled job section
//! - Register every job with the scheduler under its cadence
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Jobs share one HTTP client and one store

use chrono::FixedOffset;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::schema::{StoreBackend, StoreConfig, WatchConfig};
use crate::domain::carts::CartsMapper;
use crate::domain::eol::EolMapper;
use crate::domain::health::HealthMapper;
use crate::domain::orders::OrdersMapper;
use crate::domain::pagespeed::{PageType, PagespeedMapper};
use crate::domain::payments::PaymentsMapper;
use crate::domain::{AliasTable, Classifier, DomainMapper};
use crate::ingest::IngestJob;
use crate::resilience::{build_http_client, RetryPolicy};
use crate::scheduler::{Cadence, CadenceError, Job};
use crate::sources::http::{FeedShape, HttpJsonSource};
use crate::sources::probe::PageProbeSource;
use crate::sources::SourceAdapter;
use crate::store::{MemoryStore, SharedStore, SqliteStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("cannot open store: {0}")]
    Store(#[from] StoreError),

    #[error("cannot build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("job `{job}`: invalid URL `{url}`: {source}")]
    Url {
        job: String,
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("job `{job}`: {source}")]
    Cadence {
        job: String,
        #[source]
        source: CadenceError,
    },

    #[error("clock.utc_offset_minutes out of range: {0}")]
    UtcOffset(i32),
}

/// A job ready to be registered with the scheduler.
pub struct JobSpec {
    pub job: Arc<dyn Job>,
    pub cadence: Cadence,
}

pub fn open_store(config: &StoreConfig) -> Result<SharedStore, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; history is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            tracing::info!(path = %config.path, "Opening SQLite store");
            Ok(Arc::new(SqliteStore::open(&config.path)?))
        }
    }
}

fn parse_url(job: &str, raw: &str) -> Result<url::Url, StartupError> {
    url::Url::parse(raw).map_err(|source| StartupError::Url {
        job: job.to_string(),
        url: raw.to_string(),
        source,
    })
}

fn cadence(job: &str, config: &crate::config::schema::CadenceConfig) -> Result<Cadence, StartupError> {
    Cadence::from_config(config).map_err(|source| StartupError::Cadence { job: job.to_string(), source })
}

/// Wires sources, mappers and the store into scheduler-ready jobs.
struct JobFactory<'a> {
    config: &'a WatchConfig,
    client: reqwest::Client,
    store: SharedStore,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    retry: RetryPolicy,
}

impl JobFactory<'_> {
    fn feed<'q>(
        &self,
        name: &str,
        url: &str,
        shape: FeedShape,
        query: impl IntoIterator<Item = (&'q String, &'q String)>,
    ) -> Result<Arc<dyn SourceAdapter>, StartupError> {
        let mut source = HttpJsonSource::new(name, self.client.clone(), parse_url(name, url)?, shape)
            .with_retry(self.retry);
        if let Some(key) = &self.config.http.api_key {
            source = source.with_query(self.config.http.api_key_param.clone(), key.clone());
        }
        for (k, v) in query {
            source = source.with_query(k.clone(), v.clone());
        }
        Ok(Arc::new(source))
    }

    fn job<M: DomainMapper>(
        &self,
        name: &str,
        source: Arc<dyn SourceAdapter>,
        mapper: M,
        schedule: &crate::config::schema::CadenceConfig,
    ) -> Result<JobSpec, StartupError> {
        let job = IngestJob::new(name, source, mapper, Arc::clone(&self.store), Arc::clone(&self.clock))
            .with_utc_offset(self.offset);
        Ok(JobSpec { job: Arc::new(job), cadence: cadence(name, schedule)? })
    }
}

/// Build every enabled job from configuration.
pub fn build_jobs(
    config: &WatchConfig,
    store: SharedStore,
    clock: Arc<dyn Clock>,
) -> Result<Vec<JobSpec>, StartupError> {
    let offset_minutes = config.clock.utc_offset_minutes;
    let offset = FixedOffset::east_opt(offset_minutes * 60).ok_or(StartupError::UtcOffset(offset_minutes))?;
    let factory = JobFactory {
        config,
        client: build_http_client(&config.http)?,
        store,
        clock,
        offset,
        retry: RetryPolicy::from_config(&config.retries),
    };
    let jobs = &config.jobs;
    let mut specs = Vec::new();

    let p = &jobs.payments;
    if p.enabled {
        let source = factory.feed(&p.name, &p.url, FeedShape::Data, &p.query)?;
        let mapper = PaymentsMapper::new(Classifier::new(p.thresholds), AliasTable::from_pairs(p.aliases.clone()));
        specs.push(factory.job(&p.name, source, mapper, &p.schedule)?);
    }

    let o = &jobs.orders_delayed;
    if o.enabled {
        let source = factory.feed(&o.name, &o.url, FeedShape::ListOrItems, &o.query)?;
        let mapper = OrdersMapper::new(Classifier::with_alternate(o.standard, o.dropshipping));
        specs.push(factory.job(&o.name, source, mapper, &o.schedule)?);
    }

    let e = &jobs.eol_products;
    if e.enabled {
        let source = factory.feed(&e.name, &e.url, FeedShape::SeverityBuckets, &e.query)?;
        specs.push(factory.job(&e.name, source, EolMapper::new(Classifier::new(e.thresholds)), &e.schedule)?);
    }

    let ps = &jobs.pagespeed;
    if ps.enabled {
        let pages = vec![
            (PageType::Home, parse_url(&ps.name, &ps.home_url)?),
            (PageType::Product, parse_url(&ps.name, &ps.product_url)?),
        ];
        let source: Arc<dyn SourceAdapter> = Arc::new(
            PageProbeSource::new(&ps.name, factory.client.clone(), pages)
                .with_sanity_warnings(ps.count_sanity_warnings),
        );
        specs.push(factory.job(&ps.name, source, PagespeedMapper::new(ps.home, ps.product), &ps.schedule)?);
    }

    let c = &jobs.carts_stale;
    if c.enabled {
        let source = factory.feed(&c.name, &c.url, FeedShape::ListOrItems, &c.query)?;
        specs.push(factory.job(&c.name, source, CartsMapper::new(Classifier::new(c.thresholds)), &c.schedule)?);
    }

    let h = &jobs.service_health;
    if h.enabled {
        let source = factory.feed(&h.name, &h.url, FeedShape::Object, &h.query)?;
        let mapper = HealthMapper::new(h.service.clone(), Classifier::new(h.thresholds));
        specs.push(factory.job(&h.name, source, mapper, &h.schedule)?);
    }

    for spec in &specs {
        tracing::info!(job = %spec.job.name(), "Job configured");
    }
    Ok(specs)
}
