use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use farewatch_core::extraction::{CarOffer, ExtractionError, LaunchError, QuoteSet};
use farewatch_core::search_url::{ensure_currency, filler_count, normalize, SearchUrl};
use farewatch_core::CoreError;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregator::FlightAggregator;
use crate::plausibility::PlausibilityPolicy;
use crate::session::{BrowserPool, PageSession, PoolError};

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub attempt_timeout: Duration,
    pub retry_delay: Duration,
    pub currency: String,
    /// Where page markup of failed attempts is written; disabled when unset
    pub diagnostics_dir: Option<PathBuf>,
    pub plausibility: PlausibilityPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_secs(5),
            currency: "BRL".to_string(),
            diagnostics_dir: None,
            plausibility: PlausibilityPolicy::default(),
        }
    }
}

/// A rewrite of the search URL to try
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    AsIs,
    Fillers(usize),
}

impl Variant {
    pub fn apply(self, url: &str) -> String {
        match self {
            Variant::AsIs => url.to_string(),
            Variant::Fillers(count) => normalize(url, count),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::AsIs => write!(f, "original URL"),
            Variant::Fillers(count) => write!(f, "{} fillers", count),
        }
    }
}

/// Which failed attempt is reported when both variants fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reported {
    First,
    Second,
}

/// Order in which filler variants are attempted for a given filler count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantPlan {
    pub first: Variant,
    pub second: Variant,
    pub reported: Reported,
}

impl VariantPlan {
    pub fn for_count(count: usize) -> Self {
        match count {
            c if c < 11 => Self {
                first: Variant::Fillers(11),
                second: Variant::Fillers(12),
                reported: Reported::Second,
            },
            11 => Self {
                first: Variant::Fillers(11),
                second: Variant::Fillers(12),
                reported: Reported::First,
            },
            _ => Self {
                first: Variant::AsIs,
                second: Variant::Fillers(11),
                reported: Reported::First,
            },
        }
    }
}

#[derive(Debug)]
pub enum ScrapeOutcome {
    Found(QuoteSet),
    /// The searched date has passed; the owning trip has been removed
    Expired,
}

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error(transparent)]
    InvalidQueryFormat(#[from] CoreError),
    #[error("Extraction failed for {url}: {source}")]
    Extraction {
        url: String,
        #[source]
        source: ExtractionError,
    },
    #[error("Browser unavailable: {0}")]
    Infrastructure(#[from] LaunchError),
}

enum AttemptError {
    Launch(LaunchError),
    Extraction(ExtractionError),
}

impl From<PoolError> for AttemptError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::Launch(e) => AttemptError::Launch(e),
            PoolError::Page(e) => AttemptError::Extraction(e),
        }
    }
}

/// Runs one logical scrape of a search URL: filler variants, per-attempt
/// timeout, plausibility retry and stale-date cleanup.
pub struct ScrapeOrchestrator {
    pool: Arc<BrowserPool>,
    aggregator: Arc<FlightAggregator>,
    config: OrchestratorConfig,
}

impl ScrapeOrchestrator {
    pub fn new(
        pool: Arc<BrowserPool>,
        aggregator: Arc<FlightAggregator>,
        config: OrchestratorConfig,
    ) -> Self {
        Self { pool, aggregator, config }
    }

    /// Scrape the flights of a search URL.
    ///
    /// `owner` is the trip monitoring this URL, removed when the date has passed.
    pub async fn scrape(&self, url: &str, owner: Option<Uuid>) -> Result<ScrapeOutcome, ScrapeError> {
        let search = SearchUrl::parse(url)?;
        let url = search.as_str();

        let plan = VariantPlan::for_count(search.filler_count());
        let first_url = plan.first.apply(url);

        let found = match self.attempt_flights(&first_url).await {
            Ok(set) => set,
            Err(AttemptError::Launch(e)) => return Err(ScrapeError::Infrastructure(e)),
            Err(AttemptError::Extraction(e)) if e.is_terminal() => return self.expire(owner).await,
            Err(AttemptError::Extraction(first_err)) => {
                info!("Attempt with {} failed ({}), trying {}", plan.first, first_err, plan.second);
                let second_url = plan.second.apply(url);

                match self.attempt_flights(&second_url).await {
                    Ok(set) => set,
                    Err(AttemptError::Launch(e)) => return Err(ScrapeError::Infrastructure(e)),
                    Err(AttemptError::Extraction(e)) if e.is_terminal() => {
                        return self.expire(owner).await
                    }
                    Err(AttemptError::Extraction(second_err)) => {
                        let (url, source) = match plan.reported {
                            Reported::First => (first_url, first_err),
                            Reported::Second => (second_url, second_err),
                        };
                        return Err(ScrapeError::Extraction { url, source });
                    }
                }
            }
        };

        let confirmed = self.confirm_plausible(found).await?;
        Ok(ScrapeOutcome::Found(confirmed))
    }

    /// Cheapest car for a rental search. Car searches have no filler variants.
    pub async fn scrape_car(&self, url: &str) -> Result<CarOffer, ScrapeError> {
        let mut session = self.pool.acquire().await.map_err(|e| match e {
            PoolError::Launch(e) => ScrapeError::Infrastructure(e),
            PoolError::Page(source) => ScrapeError::Extraction { url: url.to_string(), source },
        })?;

        let result = self.bounded(session.extract_car_offer(url)).await;
        let result = result.and_then(|offer| {
            if offer.price > 0.0 {
                Ok(offer)
            } else {
                Err(ExtractionError::NoResults)
            }
        });
        let result = self.finish(session, url, result).await;

        result.map_err(|source| ScrapeError::Extraction { url: url.to_string(), source })
    }

    async fn attempt_flights(&self, url: &str) -> Result<QuoteSet, AttemptError> {
        let mut session = self.pool.acquire().await?;
        let target = ensure_currency(url, &self.config.currency);

        let result = self.bounded(session.extract_flights(&target)).await;
        let result = result.and_then(|mut set| {
            set.retain_priced();
            if set.is_empty() {
                return Err(ExtractionError::NoResults);
            }
            set.source_url = url.to_string();
            Ok(set)
        });

        self.finish(session, url, result)
            .await
            .map_err(AttemptError::Extraction)
    }

    async fn bounded<T>(
        &self,
        work: impl Future<Output = Result<T, ExtractionError>>,
    ) -> Result<T, ExtractionError> {
        match timeout(self.config.attempt_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(ExtractionError::Timeout(self.config.attempt_timeout)),
        }
    }

    /// Keep diagnostics of a faulted attempt and hand the page back
    async fn finish<T>(
        &self,
        mut session: PageSession,
        url: &str,
        result: Result<T, ExtractionError>,
    ) -> Result<T, ExtractionError> {
        if matches!(result, Err(ExtractionError::Timeout(_)) | Err(ExtractionError::Fault(_))) {
            self.capture_diagnostics(&mut session, url).await;
        }
        self.pool.release(session).await;
        result
    }

    async fn capture_diagnostics(&self, session: &mut PageSession, url: &str) {
        let Some(dir) = &self.config.diagnostics_dir else {
            return;
        };

        let html = match timeout(SNAPSHOT_TIMEOUT, session.snapshot()).await {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => {
                warn!("Could not snapshot failed page: {}", e);
                return;
            }
            Err(_) => {
                warn!("Snapshot of failed page timed out");
                return;
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("Could not create diagnostics dir {}: {}", dir.display(), e);
            return;
        }
        let path = dir.join(format!(
            "failure-{}-f{}.html",
            Utc::now().format("%Y%m%dT%H%M%S%3f"),
            filler_count(url)
        ));
        match tokio::fs::write(&path, html).await {
            Ok(()) => info!("Saved page snapshot to {}", path.display()),
            Err(e) => warn!("Could not write {}: {}", path.display(), e),
        }
    }

    /// Re-scrape once when the result looks like a glitch; keep the first
    /// result unless the retry also produced data.
    async fn confirm_plausible(&self, first: QuoteSet) -> Result<QuoteSet, ScrapeError> {
        let prices: Vec<i32> = first.prices().collect();
        if !self.config.plausibility.is_suspicious(&prices) {
            return Ok(first);
        }

        warn!(
            "Suspicious prices for {} (lowest {:?}, highest {:?}), retrying",
            first.source_url,
            first.lowest_price(),
            first.highest_price()
        );
        sleep(self.config.retry_delay).await;

        match self.attempt_flights(&first.source_url).await {
            Ok(second) => Ok(second),
            Err(AttemptError::Launch(e)) => Err(ScrapeError::Infrastructure(e)),
            Err(AttemptError::Extraction(e)) => {
                warn!("Plausibility retry failed ({}), keeping first result", e);
                Ok(first)
            }
        }
    }

    async fn expire(&self, owner: Option<Uuid>) -> Result<ScrapeOutcome, ScrapeError> {
        if let Some(trip_id) = owner {
            info!(%trip_id, "Search date has passed, removing trip");
            if let Err(e) = self.aggregator.remove_trip(trip_id).await {
                warn!(%trip_id, "Failed to remove expired trip: {}", e);
            }
        }
        Ok(ScrapeOutcome::Expired)
    }
}
