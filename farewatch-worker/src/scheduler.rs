use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use farewatch_monitor::{CheckCycle, CycleError};
use farewatch_core::extraction::LaunchError;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

/// Drives `CheckCycle::run` at a fixed interval until shutdown.
///
/// A cycle that overruns the interval swallows the ticks it missed, so at
/// most one cycle is ever in flight.
pub struct Scheduler {
    cycle: Arc<CheckCycle>,
    period: Duration,
    run_on_startup: bool,
}

impl Scheduler {
    pub fn new(cycle: Arc<CheckCycle>, period: Duration, run_on_startup: bool) -> Self {
        Self { cycle, period, run_on_startup }
    }

    /// Returns the number of cycles completed, or the launch failure that
    /// stopped the loop.
    pub async fn run<F>(&self, shutdown: F) -> Result<u64, LaunchError>
    where
        F: Future<Output = ()>,
    {
        let start = if self.run_on_startup {
            Instant::now()
        } else {
            Instant::now() + self.period
        };
        let mut ticker = interval_at(start, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            period_secs = self.period.as_secs(),
            run_on_startup = self.run_on_startup,
            "Scheduler started"
        );

        let mut completed = 0u64;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(completed, "Scheduler stopping");
                    return Ok(completed);
                }
                _ = ticker.tick() => {
                    match self.cycle.run().await {
                        Ok(_) => completed += 1,
                        Err(CycleError::Infrastructure(e)) => {
                            error!("Browser unavailable, stopping scheduler: {}", e);
                            return Err(e);
                        }
                        // Listing failures are retried on the next tick
                        Err(e) => error!("Check cycle failed: {}", e),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AppState, Stores};
    use farewatch_infra::app_config::MonitorConfig;
    use farewatch_core::session_store::MemorySessionStore;
    use farewatch_monitor::testing::{InMemoryStore, RecordingSink, ScriptedBrowser, ScriptedLauncher};
    use farewatch_core::repository::TripRepository;
    use farewatch_shared::MonitoredTrip;

    const SAMPLE: &str = "https://www.google.com/travel/flights/search?tfs=CBwQAhopEgoyMDI1LTA5LTI2ag0IAxIJL20vMDFweTg3cgwIAxIIL20vMDZnbXJAAUgBcAGCAQsI____________AZgBAg&tfu=EgoIABAAGAAgAigB";

    fn state_with(store: Arc<InMemoryStore>, launcher: ScriptedLauncher) -> AppState {
        AppState::new(
            Stores::shared(store),
            Arc::new(launcher),
            Arc::new(RecordingSink::new()),
            Arc::new(MemorySessionStore::new()),
            &MonitorConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_runs_on_startup_then_stops_on_shutdown() {
        let state = state_with(
            Arc::new(InMemoryStore::new()),
            ScriptedLauncher::new(Arc::new(ScriptedBrowser::new())),
        );
        let scheduler = Scheduler::new(state.cycle.clone(), Duration::from_secs(3600), true);

        let completed = scheduler
            .run(tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();

        assert_eq!(completed, 1);
    }

    #[tokio::test]
    async fn test_waits_a_full_period_when_not_running_on_startup() {
        let state = state_with(
            Arc::new(InMemoryStore::new()),
            ScriptedLauncher::new(Arc::new(ScriptedBrowser::new())),
        );
        let scheduler = Scheduler::new(state.cycle.clone(), Duration::from_secs(3600), false);

        let completed = scheduler
            .run(tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();

        assert_eq!(completed, 0);
    }

    #[tokio::test]
    async fn test_launch_failure_stops_the_loop() {
        let store = Arc::new(InMemoryStore::new());
        let trip = MonitoredTrip::new(5, SAMPLE.to_string(), "sex., 26 de set.".to_string());
        store.create_trip(&trip).await.unwrap();
        let state = state_with(store, ScriptedLauncher::failing());
        let scheduler = Scheduler::new(state.cycle.clone(), Duration::from_millis(10), true);

        let result = scheduler.run(std::future::pending()).await;

        assert!(matches!(result, Err(LaunchError::Failed(_))));
    }
}
