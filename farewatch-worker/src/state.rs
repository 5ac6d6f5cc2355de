use std::sync::Arc;
use std::time::Duration;

use farewatch_core::extraction::BrowserLauncher;
use farewatch_core::messaging::AlertSink;
use farewatch_core::repository::{
    CarPriceHistoryRepository, CarRentalRepository, FlightRepository, PriceHistoryRepository,
    TripRepository, UserRepository,
};
use farewatch_core::session_store::SetupSessionStore;
use farewatch_infra::app_config::MonitorConfig;
use farewatch_infra::rental_repo::PgRentalStore;
use farewatch_infra::trip_repo::PgTripStore;
use farewatch_infra::user_repo::PgUserRepository;
use farewatch_infra::DbClient;
use farewatch_monitor::{
    AlertNotifier, BrowserPool, CarPriceEngine, CheckCycle, FlightAggregator, MonitorSetup,
    OrchestratorConfig, PlausibilityPolicy, PriceHistoryEngine, ScrapeOrchestrator,
};

/// Every persistence port the monitor needs
#[derive(Clone)]
pub struct Stores {
    pub trips: Arc<dyn TripRepository>,
    pub flights: Arc<dyn FlightRepository>,
    pub history: Arc<dyn PriceHistoryRepository>,
    pub rentals: Arc<dyn CarRentalRepository>,
    pub car_history: Arc<dyn CarPriceHistoryRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Stores {
    pub fn postgres(db: &DbClient) -> Self {
        let trips = Arc::new(PgTripStore::new(db.pool.clone()));
        let rentals = Arc::new(PgRentalStore::new(db.pool.clone()));
        Self {
            trips: trips.clone(),
            flights: trips.clone(),
            history: trips,
            rentals: rentals.clone(),
            car_history: rentals,
            users: Arc::new(PgUserRepository::new(db.pool.clone())),
        }
    }

    /// Every port served by one store, e.g. a single in-process implementation
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: TripRepository
            + FlightRepository
            + PriceHistoryRepository
            + CarRentalRepository
            + CarPriceHistoryRepository
            + UserRepository
            + 'static,
    {
        Self {
            trips: store.clone(),
            flights: store.clone(),
            history: store.clone(),
            rentals: store.clone(),
            car_history: store.clone(),
            users: store,
        }
    }
}

pub fn orchestrator_config(monitor: &MonitorConfig) -> OrchestratorConfig {
    OrchestratorConfig {
        attempt_timeout: Duration::from_secs(monitor.attempt_timeout_secs),
        retry_delay: Duration::from_secs(monitor.retry_delay_secs),
        currency: monitor.currency.clone(),
        diagnostics_dir: monitor.diagnostics_dir.clone(),
        plausibility: PlausibilityPolicy {
            floor: monitor.plausibility_floor,
            ratio: monitor.plausibility_ratio,
        },
    }
}

/// Wired services shared by the scheduler and the setup surface
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<BrowserPool>,
    pub cycle: Arc<CheckCycle>,
    pub setup: Arc<MonitorSetup>,
}

impl AppState {
    pub fn new(
        stores: Stores,
        launcher: Arc<dyn BrowserLauncher>,
        sink: Arc<dyn AlertSink>,
        sessions: Arc<dyn SetupSessionStore>,
        monitor: &MonitorConfig,
    ) -> Self {
        Self::with_orchestrator_config(stores, launcher, sink, sessions, monitor, orchestrator_config(monitor))
    }

    pub fn with_orchestrator_config(
        stores: Stores,
        launcher: Arc<dyn BrowserLauncher>,
        sink: Arc<dyn AlertSink>,
        sessions: Arc<dyn SetupSessionStore>,
        monitor: &MonitorConfig,
        orchestrator: OrchestratorConfig,
    ) -> Self {
        let pool = Arc::new(BrowserPool::new(launcher));
        let aggregator = Arc::new(FlightAggregator::new(stores.trips.clone(), stores.flights.clone()));
        let orchestrator = Arc::new(ScrapeOrchestrator::new(pool.clone(), aggregator.clone(), orchestrator));

        let history = Arc::new(PriceHistoryEngine::new(
            stores.trips.clone(),
            stores.flights.clone(),
            stores.history.clone(),
        ));
        let cars = Arc::new(CarPriceEngine::new(stores.rentals.clone(), stores.car_history.clone()));
        let notifier = Arc::new(AlertNotifier::new(sink, stores.users.clone()));

        let cycle = Arc::new(CheckCycle::new(
            stores.trips.clone(),
            stores.rentals.clone(),
            orchestrator.clone(),
            aggregator,
            history,
            cars,
            notifier,
        ));
        let setup = Arc::new(MonitorSetup::new(
            orchestrator,
            stores.trips,
            stores.flights,
            sessions,
            Duration::from_secs(monitor.setup_session_ttl_secs),
        ));

        Self { pool, cycle, setup }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_orchestrator_config_follows_monitor_section() {
        let monitor = MonitorConfig {
            attempt_timeout_secs: 45,
            retry_delay_secs: 2,
            plausibility_floor: 150,
            plausibility_ratio: 0.5,
            currency: "USD".to_string(),
            diagnostics_dir: Some(PathBuf::from("/var/lib/farewatch/failures")),
            ..MonitorConfig::default()
        };

        let config = orchestrator_config(&monitor);

        assert_eq!(config.attempt_timeout, Duration::from_secs(45));
        assert_eq!(config.retry_delay, Duration::from_secs(2));
        assert_eq!(config.currency, "USD");
        assert_eq!(config.plausibility, PlausibilityPolicy { floor: 150, ratio: 0.5 });
        assert_eq!(config.diagnostics_dir, Some(PathBuf::from("/var/lib/farewatch/failures")));
    }
}
