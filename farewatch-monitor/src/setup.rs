use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use farewatch_core::dates::{expand_range, parse_display_date, to_token_date};
use farewatch_core::extraction::QuoteSet;
use farewatch_core::i18n::{format_money, render, text, Language, MessageKey};
use farewatch_core::repository::{FlightRepository, StoreResult, TripRepository};
use farewatch_core::search_url::{normalize, substitute_date};
use farewatch_core::session_store::{PendingSetup, SetupSessionStore};
use farewatch_shared::MonitoredTrip;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::orchestrator::{ScrapeError, ScrapeOrchestrator, ScrapeOutcome};

/// Widest date range, in days on each side, a user may ask for
pub const MAX_DATE_RANGE: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Search date has already passed")]
    DatePassed,
    #[error("No pending setup for this user")]
    NoPending,
    #[error("Date range must be between 0 and 5 days, got {0}")]
    InvalidRange(u32),
    #[error("Could not read search date {0:?}")]
    UnreadableDate(String),
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
    #[error("Storage error: {0}")]
    Store(String),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for SetupError {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        SetupError::Store(e.to_string())
    }
}

impl SetupError {
    /// Text shown to the user. Details stay in the logs.
    pub fn user_message(&self, lang: Language) -> String {
        let key = match self {
            SetupError::DatePassed => MessageKey::SetupDatePassed,
            SetupError::NoPending => MessageKey::SetupNoPending,
            _ => MessageKey::SetupFailed,
        };
        text(lang, key).to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetupPreview {
    pub display_date: String,
    pub lowest_price: i32,
}

impl SetupPreview {
    pub fn message(&self, lang: Language) -> String {
        render(
            lang,
            MessageKey::SetupPreview,
            &[
                ("date", self.display_date.as_str()),
                ("price", format_money(f64::from(self.lowest_price)).as_str()),
            ],
        )
    }
}

#[derive(Debug, Clone)]
pub struct SetupSummary {
    pub trips: Vec<MonitoredTrip>,
    pub dates_tried: usize,
}

impl SetupSummary {
    pub fn message(&self, lang: Language) -> String {
        if self.trips.is_empty() {
            return text(lang, MessageKey::SetupNothingMonitored).to_string();
        }
        render(
            lang,
            MessageKey::SetupDone,
            &[
                ("trips", self.trips.len().to_string().as_str()),
                ("dates", self.dates_tried.to_string().as_str()),
            ],
        )
    }
}

/// Two-step creation of monitors: preview a search URL, then monitor it
/// across a range of nearby dates.
pub struct MonitorSetup {
    orchestrator: Arc<ScrapeOrchestrator>,
    trips: Arc<dyn TripRepository>,
    flights: Arc<dyn FlightRepository>,
    sessions: Arc<dyn SetupSessionStore>,
    session_ttl: Duration,
}

impl MonitorSetup {
    pub fn new(
        orchestrator: Arc<ScrapeOrchestrator>,
        trips: Arc<dyn TripRepository>,
        flights: Arc<dyn FlightRepository>,
        sessions: Arc<dyn SetupSessionStore>,
        session_ttl: Duration,
    ) -> Self {
        Self { orchestrator, trips, flights, sessions, session_ttl }
    }

    /// Scrape the URL once and park it until the user picks a date range
    pub async fn begin(&self, user_id: i64, url: &str) -> Result<SetupPreview, SetupError> {
        let set = match self.orchestrator.scrape(url.trim(), None).await? {
            ScrapeOutcome::Found(set) => set,
            ScrapeOutcome::Expired => return Err(SetupError::DatePassed),
        };

        let pending = PendingSetup {
            url: set.source_url.clone(),
            display_date: set.date.clone(),
            created_at: Utc::now(),
        };
        self.sessions.put(user_id, &pending, self.session_ttl).await?;
        info!(user_id, date = %set.date, "Setup waiting for date range");

        Ok(SetupPreview {
            lowest_price: set.lowest_price().unwrap_or_default(),
            display_date: set.date,
        })
    }

    /// Create one trip per date of `base ± range` that returns quotes
    pub async fn confirm(
        &self,
        user_id: i64,
        range: u32,
        today: NaiveDate,
    ) -> Result<SetupSummary, SetupError> {
        if range > MAX_DATE_RANGE {
            return Err(SetupError::InvalidRange(range));
        }
        let pending = self.sessions.take(user_id).await?.ok_or(SetupError::NoPending)?;

        let base = match base_date(&pending, today) {
            Ok(base) => base,
            Err(e) => {
                // Keep the setup parked for another attempt
                self.sessions.put(user_id, &pending, self.session_ttl).await?;
                return Err(e);
            }
        };

        // The 12-filler form is the exact encoding of the descriptor
        let canonical = normalize(&pending.url, 12);
        let base_token = to_token_date(base);
        let dates = expand_range(base, range);
        let mut trips = Vec::new();

        for date in dates.iter().copied() {
            if date < today {
                debug!(%date, "Skipping past date");
                continue;
            }

            let url = if date == base {
                pending.url.clone()
            } else {
                let moved = substitute_date(&canonical, &base_token, &to_token_date(date));
                if moved == canonical {
                    warn!(%date, "Could not locate {} in search token, skipping", base_token);
                    continue;
                }
                moved
            };

            match self.orchestrator.scrape(&url, None).await {
                Ok(ScrapeOutcome::Found(set)) => trips.push(self.create_trip(user_id, &set).await?),
                Ok(ScrapeOutcome::Expired) => info!(%date, "Date already passed, skipping"),
                Err(e @ ScrapeError::Infrastructure(_)) => return Err(e.into()),
                Err(e) => warn!(%date, "No flights for date: {}", e),
            }
        }

        info!(user_id, created = trips.len(), dates = dates.len(), "Setup finished");
        Ok(SetupSummary { trips, dates_tried: dates.len() })
    }

    async fn create_trip(&self, user_id: i64, set: &QuoteSet) -> StoreResult<MonitoredTrip> {
        let trip = MonitoredTrip::new(user_id, set.source_url.clone(), set.date.clone());
        self.trips.create_trip(&trip).await?;
        self.flights.replace_flights(trip.id, set.to_new_flights()).await?;
        info!(trip_id = %trip.id, user_id, date = %trip.date, "Created monitored trip");
        Ok(trip)
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<MonitoredTrip>, SetupError> {
        Ok(self.trips.list_trips_for_user(user_id).await?)
    }

    /// Stop monitoring a trip. Returns false when the user does not own it.
    pub async fn stop(&self, user_id: i64, trip_id: Uuid) -> Result<bool, SetupError> {
        let stopped = self.trips.deactivate_trip(trip_id, user_id).await?;
        if stopped {
            info!(%trip_id, user_id, "Stopped monitoring");
        }
        Ok(stopped)
    }
}

fn base_date(pending: &PendingSetup, today: NaiveDate) -> Result<NaiveDate, SetupError> {
    let base = parse_display_date(&pending.display_date, today)
        .ok_or_else(|| SetupError::UnreadableDate(pending.display_date.clone()))?;
    if base < today {
        return Err(SetupError::DatePassed);
    }
    Ok(base)
}
