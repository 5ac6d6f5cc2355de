pub mod session;
pub mod plausibility;
pub mod orchestrator;
pub mod aggregator;
pub mod history;
pub mod car;
pub mod notifier;
pub mod setup;
pub mod cycle;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use session::{BrowserPool, PageSession, PoolError};
pub use plausibility::PlausibilityPolicy;
pub use orchestrator::{OrchestratorConfig, ScrapeError, ScrapeOrchestrator, ScrapeOutcome, VariantPlan};
pub use aggregator::{FlightAggregator, Replacement};
pub use history::{Evaluation, Extremum, PriceAlert, PriceChange, PriceHistoryEngine};
pub use car::CarPriceEngine;
pub use notifier::AlertNotifier;
pub use setup::{MonitorSetup, SetupError, SetupPreview, SetupSummary};
pub use cycle::{CheckCycle, CycleError, CycleReport};
