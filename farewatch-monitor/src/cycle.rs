use std::sync::Arc;
use std::time::Instant;

use farewatch_core::extraction::LaunchError;
use farewatch_core::repository::{CarRentalRepository, TripRepository};
use farewatch_shared::{CarRental, MonitoredTrip};
use tracing::{error, info};
use uuid::Uuid;

use crate::aggregator::{FlightAggregator, Replacement};
use crate::car::CarPriceEngine;
use crate::history::PriceHistoryEngine;
use crate::notifier::AlertNotifier;
use crate::orchestrator::{ScrapeError, ScrapeOrchestrator, ScrapeOutcome};

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Infrastructure fault, aborting cycle: {0}")]
    Infrastructure(#[from] LaunchError),
    #[error("Could not list monitors: {0}")]
    Store(String),
}

#[derive(Debug, thiserror::Error)]
enum CheckError {
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
    #[error("Storage error: {0}")]
    Store(String),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CheckError {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CheckError::Store(e.to_string())
    }
}

enum ItemStatus {
    Checked { alerted: bool },
    Expired,
    Gone,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub checked: usize,
    pub alerts: usize,
    pub expired: usize,
    pub failed: usize,
}

impl CycleReport {
    fn tally(&mut self, kind: &str, id: Uuid, result: Result<ItemStatus, CheckError>) -> Result<(), CycleError> {
        match result {
            Ok(ItemStatus::Checked { alerted }) => {
                self.checked += 1;
                if alerted {
                    self.alerts += 1;
                }
            }
            Ok(ItemStatus::Expired) => self.expired += 1,
            Ok(ItemStatus::Gone) => info!(%id, "{} removed during check", kind),
            Err(CheckError::Scrape(ScrapeError::Infrastructure(e))) => {
                return Err(CycleError::Infrastructure(e))
            }
            Err(e) => {
                error!(%id, "Failed to check {}: {}", kind, e);
                self.failed += 1;
            }
        }
        Ok(())
    }
}

/// One pass over every active trip, then every active rental.
///
/// Items are checked one at a time; a failing item is logged and skipped.
/// Only an unavailable browser aborts the pass.
pub struct CheckCycle {
    trips: Arc<dyn TripRepository>,
    rentals: Arc<dyn CarRentalRepository>,
    orchestrator: Arc<ScrapeOrchestrator>,
    aggregator: Arc<FlightAggregator>,
    history: Arc<PriceHistoryEngine>,
    cars: Arc<CarPriceEngine>,
    notifier: Arc<AlertNotifier>,
}

impl CheckCycle {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        rentals: Arc<dyn CarRentalRepository>,
        orchestrator: Arc<ScrapeOrchestrator>,
        aggregator: Arc<FlightAggregator>,
        history: Arc<PriceHistoryEngine>,
        cars: Arc<CarPriceEngine>,
        notifier: Arc<AlertNotifier>,
    ) -> Self {
        Self { trips, rentals, orchestrator, aggregator, history, cars, notifier }
    }

    pub async fn run(&self) -> Result<CycleReport, CycleError> {
        let started = Instant::now();
        let mut report = CycleReport::default();

        // A listing failure skips only its own kind of monitor
        let trips_listed = match self.trips.list_active_trips().await {
            Ok(trips) => {
                info!(count = trips.len(), "Checking monitored trips");
                for trip in &trips {
                    let result = self.check_trip(trip).await;
                    report.tally("trip", trip.id, result)?;
                }
                Ok(())
            }
            Err(e) => {
                error!("Could not list monitored trips: {}", e);
                Err(e.to_string())
            }
        };

        let rentals_listed = match self.rentals.list_active_rentals().await {
            Ok(rentals) => {
                info!(count = rentals.len(), "Checking car rentals");
                for rental in &rentals {
                    let result = self.check_rental(rental).await;
                    report.tally("rental", rental.id, result)?;
                }
                Ok(())
            }
            Err(e) => {
                error!("Could not list car rentals: {}", e);
                Err(e.to_string())
            }
        };

        if let (Err(trips), Err(rentals)) = (&trips_listed, &rentals_listed) {
            return Err(CycleError::Store(format!("trips: {}; rentals: {}", trips, rentals)));
        }

        info!(
            checked = report.checked,
            alerts = report.alerts,
            expired = report.expired,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Check cycle finished"
        );
        Ok(report)
    }

    async fn check_trip(&self, trip: &MonitoredTrip) -> Result<ItemStatus, CheckError> {
        // 1. Scrape
        let set = match self.orchestrator.scrape(&trip.url, Some(trip.id)).await? {
            ScrapeOutcome::Found(set) => set,
            ScrapeOutcome::Expired => return Ok(ItemStatus::Expired),
        };

        // 2. Keep the variant that worked
        self.aggregator.correct_url(trip, &set.source_url).await?;

        // 3. Baseline must be read before the flights are replaced
        let baseline = self.history.baseline(trip.id).await?;
        if self.aggregator.replace(trip.id, &set).await? == Replacement::TripGone {
            return Ok(ItemStatus::Gone);
        }

        // 4. History and alert
        let Some(lowest) = set.lowest_price() else {
            return Ok(ItemStatus::Checked { alerted: false });
        };
        let evaluation = self.history.record(trip.id, baseline, lowest).await?;
        let Some(alert) = evaluation.alert else {
            return Ok(ItemStatus::Checked { alerted: false });
        };

        let current = MonitoredTrip {
            url: set.source_url.clone(),
            ..trip.clone()
        };
        let alerted = match self.notifier.notify_trip(&current, &set, &alert).await {
            Ok(()) => true,
            Err(e) => {
                error!(trip_id = %trip.id, "Failed to send price alert: {}", e);
                false
            }
        };
        Ok(ItemStatus::Checked { alerted })
    }

    async fn check_rental(&self, rental: &CarRental) -> Result<ItemStatus, CheckError> {
        let offer = self.orchestrator.scrape_car(&rental.search_url()).await?;

        let evaluation = self.cars.record(rental, &offer).await?;
        let Some(alert) = evaluation.alert else {
            return Ok(ItemStatus::Checked { alerted: false });
        };

        let alerted = match self.notifier.notify_rental(rental, &offer, &alert).await {
            Ok(()) => true,
            Err(e) => {
                error!(rental_id = %rental.id, "Failed to send car price alert: {}", e);
                false
            }
        };
        Ok(ItemStatus::Checked { alerted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::OrchestratorConfig;
    use crate::session::BrowserPool;
    use crate::testing::{quote_set, RecordingSink, ScriptedBrowser, ScriptedLauncher};
    use farewatch_core::extraction::{BrowserLauncher, CarOffer, ExtractionError};
    use farewatch_core::messaging::AlertSink;
    use farewatch_core::repository::{
        CarPriceHistoryRepository, FlightRepository, PriceHistoryRepository,
    };
    use farewatch_core::search_url::{filler_count, normalize};
    use crate::testing::InMemoryStore;
    use async_trait::async_trait;
    use farewatch_core::repository::StoreResult;
    use std::time::Duration;

    const SAMPLE: &str = "https://www.google.com/travel/flights/search?tfs=CBwQAhopEgoyMDI1LTA5LTI2ag0IAxIJL20vMDFweTg3cgwIAxIIL20vMDZnbXJAAUgBcAGCAQsI____________AZgBAg&tfu=EgoIABAAGAAgAigB";

    fn cycle_with(
        store: &Arc<InMemoryStore>,
        launcher: Arc<dyn BrowserLauncher>,
        sink: Arc<dyn AlertSink>,
    ) -> CheckCycle {
        cycle_listing_from(store, store.clone(), store.clone(), launcher, sink)
    }

    fn cycle_listing_from(
        store: &Arc<InMemoryStore>,
        trips: Arc<dyn TripRepository>,
        rentals: Arc<dyn CarRentalRepository>,
        launcher: Arc<dyn BrowserLauncher>,
        sink: Arc<dyn AlertSink>,
    ) -> CheckCycle {
        let pool = Arc::new(BrowserPool::new(launcher));
        let aggregator = Arc::new(FlightAggregator::new(store.clone(), store.clone()));
        let config = OrchestratorConfig {
            retry_delay: Duration::from_millis(1),
            ..OrchestratorConfig::default()
        };
        let orchestrator = Arc::new(ScrapeOrchestrator::new(pool, aggregator.clone(), config));
        CheckCycle::new(
            trips,
            rentals,
            orchestrator,
            aggregator,
            Arc::new(PriceHistoryEngine::new(store.clone(), store.clone(), store.clone())),
            Arc::new(CarPriceEngine::new(store.clone(), store.clone())),
            Arc::new(AlertNotifier::new(sink, store.clone())),
        )
    }

    /// Listings that always fail, as with a lost database connection
    struct Unreachable;

    fn refused<T>() -> StoreResult<T> {
        Err("connection refused".into())
    }

    #[async_trait]
    impl TripRepository for Unreachable {
        async fn create_trip(&self, _trip: &MonitoredTrip) -> StoreResult<Uuid> {
            refused()
        }
        async fn get_trip(&self, _id: Uuid) -> StoreResult<Option<MonitoredTrip>> {
            refused()
        }
        async fn list_active_trips(&self) -> StoreResult<Vec<MonitoredTrip>> {
            refused()
        }
        async fn list_trips_for_user(&self, _user_id: i64) -> StoreResult<Vec<MonitoredTrip>> {
            refused()
        }
        async fn update_trip_url(&self, _id: Uuid, _url: &str) -> StoreResult<()> {
            refused()
        }
        async fn deactivate_trip(&self, _id: Uuid, _user_id: i64) -> StoreResult<bool> {
            refused()
        }
        async fn delete_trip(&self, _id: Uuid) -> StoreResult<()> {
            refused()
        }
    }

    #[async_trait]
    impl CarRentalRepository for Unreachable {
        async fn create_rental(&self, _rental: &CarRental) -> StoreResult<Uuid> {
            refused()
        }
        async fn get_rental(&self, _id: Uuid) -> StoreResult<Option<CarRental>> {
            refused()
        }
        async fn list_active_rentals(&self) -> StoreResult<Vec<CarRental>> {
            refused()
        }
        async fn update_last_price(&self, _id: Uuid, _price: f64, _url: &str) -> StoreResult<()> {
            refused()
        }
        async fn delete_rental(&self, _id: Uuid) -> StoreResult<()> {
            refused()
        }
    }

    fn sample_rental() -> CarRental {
        CarRental::new(
            21,
            "GRU".to_string(),
            "2025-09-26".to_string(),
            "2025-09-30".to_string(),
            400.0,
        )
    }

    async fn seeded_trip(store: &Arc<InMemoryStore>, url: &str, prices: &[i32]) -> MonitoredTrip {
        let trip = MonitoredTrip::new(21, url.to_string(), "sex., 26 de set.".to_string());
        store.create_trip(&trip).await.unwrap();
        store
            .replace_flights(trip.id, quote_set(prices).to_new_flights())
            .await
            .unwrap();
        trip
    }

    #[tokio::test]
    async fn test_drop_is_recorded_replaced_and_alerted() {
        let store = Arc::new(InMemoryStore::new());
        let trip = seeded_trip(&store, SAMPLE, &[200, 220]).await;
        let browser = Arc::new(ScriptedBrowser::new());
        browser.push_flights(Ok(quote_set(&[190, 230])));
        let sink = Arc::new(RecordingSink::new());
        let cycle = cycle_with(&store, Arc::new(ScriptedLauncher::new(browser)), sink.clone());

        let report = cycle.run().await.unwrap();

        assert_eq!(report, CycleReport { checked: 1, alerts: 1, expired: 0, failed: 0 });
        let history = store.price_history(trip.id).await.unwrap();
        assert_eq!(history.iter().map(|h| h.price).collect::<Vec<_>>(), vec![190]);
        let mut prices: Vec<i32> = store.list_flights(trip.id).await.unwrap().iter().map(|f| f.price).collect();
        prices.sort();
        assert_eq!(prices, vec![190, 230]);

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("decreased by R$ 10.00 (5.0%)"));
        assert!(sent[0].trend.is_none());
    }

    #[tokio::test]
    async fn test_failing_trip_does_not_stop_the_cycle() {
        let store = Arc::new(InMemoryStore::new());
        let broken = seeded_trip(&store, SAMPLE, &[300]).await;
        let healthy = seeded_trip(&store, SAMPLE, &[300]).await;
        let browser = Arc::new(ScriptedBrowser::new());
        browser
            .push_flights(Err(ExtractionError::Fault("selector not found".to_string())))
            .push_flights(Err(ExtractionError::NoResults))
            .push_flights(Ok(quote_set(&[300])));
        let cycle = cycle_with(&store, Arc::new(ScriptedLauncher::new(browser)), Arc::new(RecordingSink::new()));

        let report = cycle.run().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.checked, 1);
        assert!(store.get_trip(broken.id).await.unwrap().is_some());
        assert!(store.price_history(healthy.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_launch_failure_aborts_cycle() {
        let store = Arc::new(InMemoryStore::new());
        seeded_trip(&store, SAMPLE, &[300]).await;
        seeded_trip(&store, SAMPLE, &[300]).await;
        let cycle = cycle_with(&store, Arc::new(ScriptedLauncher::failing()), Arc::new(RecordingSink::new()));

        let err = cycle.run().await.unwrap_err();

        assert!(matches!(err, CycleError::Infrastructure(_)));
    }

    #[tokio::test]
    async fn test_expired_trip_is_removed() {
        let store = Arc::new(InMemoryStore::new());
        let trip = seeded_trip(&store, SAMPLE, &[300]).await;
        let browser = Arc::new(ScriptedBrowser::new());
        browser.push_flights(Err(ExtractionError::StaleDate));
        let cycle = cycle_with(&store, Arc::new(ScriptedLauncher::new(browser)), Arc::new(RecordingSink::new()));

        let report = cycle.run().await.unwrap();

        assert_eq!(report.expired, 1);
        assert!(store.get_trip(trip.id).await.unwrap().is_none());
        assert!(store.list_flights(trip.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_history() {
        let store = Arc::new(InMemoryStore::new());
        let trip = seeded_trip(&store, SAMPLE, &[300]).await;
        let browser = Arc::new(ScriptedBrowser::new());
        browser.push_flights(Ok(quote_set(&[250])));
        let cycle = cycle_with(&store, Arc::new(ScriptedLauncher::new(browser)), Arc::new(RecordingSink::failing()));

        let report = cycle.run().await.unwrap();

        assert_eq!(report.alerts, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(store.price_history(trip.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_working_variant_replaces_stored_url() {
        let store = Arc::new(InMemoryStore::new());
        let trip = seeded_trip(&store, &normalize(SAMPLE, 10), &[300]).await;
        let browser = Arc::new(ScriptedBrowser::new());
        browser.push_flights(Ok(quote_set(&[300])));
        let cycle = cycle_with(&store, Arc::new(ScriptedLauncher::new(browser)), Arc::new(RecordingSink::new()));

        cycle.run().await.unwrap();

        let stored = store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(filler_count(&stored.url), 11);
    }

    #[tokio::test]
    async fn test_inactive_trips_are_skipped() {
        let store = Arc::new(InMemoryStore::new());
        let trip = seeded_trip(&store, SAMPLE, &[300]).await;
        store.deactivate_trip(trip.id, trip.user_id).await.unwrap();
        let browser = Arc::new(ScriptedBrowser::new());
        let cycle = cycle_with(&store, Arc::new(ScriptedLauncher::new(browser.clone())), Arc::new(RecordingSink::new()));

        let report = cycle.run().await.unwrap();

        assert_eq!(report, CycleReport::default());
        assert!(browser.visited().is_empty());
    }

    #[tokio::test]
    async fn test_rental_drop_is_alerted() {
        let store = Arc::new(InMemoryStore::new());
        let rental = sample_rental();
        store.create_rental(&rental).await.unwrap();
        let browser = Arc::new(ScriptedBrowser::new());
        browser.push_car(Ok(CarOffer {
            title: "Fiat Mobi".to_string(),
            price: 350.0,
            url: rental.search_url(),
        }));
        let sink = Arc::new(RecordingSink::new());
        let cycle = cycle_with(&store, Arc::new(ScriptedLauncher::new(browser.clone())), sink.clone());

        let report = cycle.run().await.unwrap();

        assert_eq!(report.alerts, 1);
        assert_eq!(browser.visited(), vec![rental.search_url()]);
        assert_eq!(store.car_price_history(rental.id).await.unwrap().len(), 1);
        assert!(sink.sent()[0].text.contains("Fiat Mobi"));
    }

    #[tokio::test]
    async fn test_trip_listing_failure_still_checks_rentals() {
        let store = Arc::new(InMemoryStore::new());
        let rental = sample_rental();
        store.create_rental(&rental).await.unwrap();
        let browser = Arc::new(ScriptedBrowser::new());
        browser.push_car(Ok(CarOffer {
            title: "Fiat Mobi".to_string(),
            price: 350.0,
            url: rental.search_url(),
        }));
        let sink = Arc::new(RecordingSink::new());
        let cycle = cycle_listing_from(
            &store,
            Arc::new(Unreachable),
            store.clone(),
            Arc::new(ScriptedLauncher::new(browser.clone())),
            sink.clone(),
        );

        let report = cycle.run().await.unwrap();

        assert_eq!(report, CycleReport { checked: 1, alerts: 1, expired: 0, failed: 0 });
        assert_eq!(browser.visited(), vec![rental.search_url()]);
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_both_listings_failing_is_a_store_error() {
        let store = Arc::new(InMemoryStore::new());
        let browser = Arc::new(ScriptedBrowser::new());
        let cycle = cycle_listing_from(
            &store,
            Arc::new(Unreachable),
            Arc::new(Unreachable),
            Arc::new(ScriptedLauncher::new(browser.clone())),
            Arc::new(RecordingSink::new()),
        );

        let err = cycle.run().await.unwrap_err();

        assert!(matches!(err, CycleError::Store(ref msg) if msg.contains("connection refused")));
        assert_eq!(browser.pages_opened(), 0);
    }
}
