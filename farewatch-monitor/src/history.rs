use std::sync::Arc;

use chrono::{DateTime, Utc};
use farewatch_core::repository::{
    FlightRepository, PriceHistoryRepository, StoreResult, TripRepository,
};
use farewatch_shared::{PriceTrend, TrendPoint};
use tracing::{debug, info};
use uuid::Uuid;

/// Smallest absolute change, in percent, that is worth a notification
pub const ALERT_THRESHOLD_PERCENT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increased,
    Decreased,
}

/// Movement of the lowest price relative to the alerting baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceChange {
    pub baseline: f64,
    pub observed: f64,
}

impl PriceChange {
    /// None when there is no usable baseline
    pub fn between(baseline: f64, observed: f64) -> Option<Self> {
        (baseline > 0.0).then_some(Self { baseline, observed })
    }

    pub fn delta(&self) -> f64 {
        self.observed - self.baseline
    }

    pub fn percent(&self) -> f64 {
        self.delta() * 100.0 / self.baseline
    }

    pub fn direction(&self) -> Option<Direction> {
        if self.observed > self.baseline {
            Some(Direction::Increased)
        } else if self.observed < self.baseline {
            Some(Direction::Decreased)
        } else {
            None
        }
    }

    pub fn crosses_threshold(&self) -> bool {
        self.percent().abs() >= ALERT_THRESHOLD_PERCENT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    LowestEver,
    HighestEver,
}

impl Extremum {
    /// Compare an observation with the prices recorded before it.
    /// A tie with the historical minimum counts as a new lowest.
    pub fn classify(observed: f64, prior: &[f64]) -> Option<Self> {
        if prior.is_empty() {
            return None;
        }
        let min = prior.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prior.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if observed <= min {
            Some(Extremum::LowestEver)
        } else if observed >= max {
            Some(Extremum::HighestEver)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceAlert {
    pub change: PriceChange,
    pub extremum: Option<Extremum>,
    /// Present once the history holds more than one point
    pub trend: Option<PriceTrend>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub recorded: bool,
    pub alert: Option<PriceAlert>,
}

/// Build the alert for an observation already appended to its history.
///
/// `prior` holds the points recorded before the observation.
pub(crate) fn evaluate(
    baseline: Option<f64>,
    observed: f64,
    observed_at: DateTime<Utc>,
    prior: &[TrendPoint],
) -> Option<PriceAlert> {
    let change = PriceChange::between(baseline?, observed)?;
    if !change.crosses_threshold() {
        return None;
    }

    let prior_prices: Vec<f64> = prior.iter().map(|p| p.price).collect();
    let extremum = Extremum::classify(observed, &prior_prices);

    let trend = (!prior.is_empty()).then(|| {
        let mut points = prior.to_vec();
        points.push(TrendPoint { price: observed, timestamp: observed_at });
        PriceTrend::new(points)
    });

    Some(PriceAlert { change, extremum, trend })
}

/// Keeps the price timeline of flight trips and decides when a change is worth an alert.
pub struct PriceHistoryEngine {
    trips: Arc<dyn TripRepository>,
    flights: Arc<dyn FlightRepository>,
    history: Arc<dyn PriceHistoryRepository>,
}

impl PriceHistoryEngine {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        flights: Arc<dyn FlightRepository>,
        history: Arc<dyn PriceHistoryRepository>,
    ) -> Self {
        Self { trips, flights, history }
    }

    /// Latest recorded price, or the cheapest stored flight when nothing is recorded yet.
    ///
    /// Must be read before the flights of the current observation are stored.
    pub async fn baseline(&self, trip_id: Uuid) -> StoreResult<Option<f64>> {
        if let Some(latest) = self.history.latest_price(trip_id).await? {
            return Ok(Some(f64::from(latest.price)));
        }

        let cheapest = self
            .flights
            .list_flights(trip_id)
            .await?
            .iter()
            .map(|f| f.price)
            .min();
        Ok(cheapest.map(f64::from))
    }

    /// Record the lowest price of a new observation when it differs from the baseline
    pub async fn record(
        &self,
        trip_id: Uuid,
        baseline: Option<f64>,
        lowest: i32,
    ) -> StoreResult<Evaluation> {
        let observed = f64::from(lowest);
        if baseline == Some(observed) {
            debug!(%trip_id, lowest, "Lowest price unchanged");
            return Ok(Evaluation::default());
        }

        // 1. The trip may have been deleted while it was being scraped
        if self.trips.get_trip(trip_id).await?.is_none() {
            return Ok(Evaluation::default());
        }

        // 2. Extremes are judged against the history before this point
        let prior: Vec<TrendPoint> = self
            .history
            .price_history(trip_id)
            .await?
            .into_iter()
            .map(|p| TrendPoint { price: f64::from(p.price), timestamp: p.timestamp })
            .collect();

        // 3. Append
        let point = self.history.append_price(trip_id, lowest).await?;
        info!(%trip_id, lowest, ?baseline, "Recorded new lowest price");

        Ok(Evaluation {
            recorded: true,
            alert: evaluate(baseline, observed, point.timestamp, &prior),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::quote_set;
    use crate::testing::InMemoryStore;
    use farewatch_shared::MonitoredTrip;

    #[test]
    fn test_threshold_is_inclusive() {
        let exact = PriceChange::between(200.0, 190.0).unwrap();
        assert_eq!(exact.percent(), -5.0);
        assert!(exact.crosses_threshold());

        let below = PriceChange::between(1000.0, 1049.0).unwrap();
        assert!((below.percent() - 4.9).abs() < 1e-9);
        assert!(!below.crosses_threshold());
    }

    #[test]
    fn test_change_direction() {
        assert_eq!(PriceChange::between(100.0, 120.0).unwrap().direction(), Some(Direction::Increased));
        assert_eq!(PriceChange::between(100.0, 80.0).unwrap().direction(), Some(Direction::Decreased));
        assert_eq!(PriceChange::between(100.0, 100.0).unwrap().direction(), None);
        assert!(PriceChange::between(0.0, 100.0).is_none());
    }

    #[test]
    fn test_extremum_against_prior_history() {
        let prior = [100.0, 120.0, 90.0];
        assert_eq!(Extremum::classify(80.0, &prior), Some(Extremum::LowestEver));
        assert_eq!(Extremum::classify(130.0, &prior), Some(Extremum::HighestEver));
        assert_eq!(Extremum::classify(100.0, &prior), None);
        assert_eq!(Extremum::classify(90.0, &prior), Some(Extremum::LowestEver));
        assert_eq!(Extremum::classify(100.0, &[]), None);
    }

    #[test]
    fn test_evaluate_without_history_has_no_trend() {
        let alert = evaluate(Some(200.0), 180.0, Utc::now(), &[]).unwrap();
        assert!(alert.trend.is_none());
        assert!(alert.extremum.is_none());
    }

    #[test]
    fn test_evaluate_small_change_is_silent() {
        assert!(evaluate(Some(200.0), 195.0, Utc::now(), &[]).is_none());
        assert!(evaluate(None, 195.0, Utc::now(), &[]).is_none());
    }

    async fn seeded_trip(store: &Arc<InMemoryStore>, prices: &[i32]) -> Uuid {
        let trip = MonitoredTrip::new(5, "https://www.google.com/travel/flights?tfs=a".to_string(), "6 de jun.".to_string());
        store.create_trip(&trip).await.unwrap();
        store
            .replace_flights(trip.id, quote_set(prices).to_new_flights())
            .await
            .unwrap();
        trip.id
    }

    fn engine(store: &Arc<InMemoryStore>) -> PriceHistoryEngine {
        PriceHistoryEngine::new(store.clone(), store.clone(), store.clone())
    }

    #[tokio::test]
    async fn test_baseline_falls_back_to_cheapest_flight() {
        let store = Arc::new(InMemoryStore::new());
        let trip_id = seeded_trip(&store, &[220, 200]).await;
        let engine = engine(&store);

        assert_eq!(engine.baseline(trip_id).await.unwrap(), Some(200.0));

        store.append_price(trip_id, 210).await.unwrap();
        assert_eq!(engine.baseline(trip_id).await.unwrap(), Some(210.0));
    }

    #[tokio::test]
    async fn test_drop_of_five_percent_alerts() {
        let store = Arc::new(InMemoryStore::new());
        let trip_id = seeded_trip(&store, &[200, 220]).await;
        let engine = engine(&store);

        let baseline = engine.baseline(trip_id).await.unwrap();
        let evaluation = engine.record(trip_id, baseline, 190).await.unwrap();

        assert!(evaluation.recorded);
        let alert = evaluation.alert.unwrap();
        assert_eq!(alert.change.percent(), -5.0);
        assert_eq!(alert.change.delta(), -10.0);
        assert!(alert.trend.is_none());

        let history = store.price_history(trip_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].price, 190);
    }

    #[tokio::test]
    async fn test_small_change_is_recorded_without_alert() {
        let store = Arc::new(InMemoryStore::new());
        let trip_id = seeded_trip(&store, &[1000]).await;
        let engine = engine(&store);

        let evaluation = engine.record(trip_id, Some(1000.0), 1049).await.unwrap();

        assert!(evaluation.recorded);
        assert!(evaluation.alert.is_none());
        assert_eq!(store.price_history(trip_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_price_is_not_recorded() {
        let store = Arc::new(InMemoryStore::new());
        let trip_id = seeded_trip(&store, &[300]).await;
        let engine = engine(&store);

        let evaluation = engine.record(trip_id, Some(300.0), 300).await.unwrap();

        assert_eq!(evaluation, Evaluation::default());
        assert!(store.price_history(trip_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_alert_carries_trend_and_extremum() {
        let store = Arc::new(InMemoryStore::new());
        let trip_id = seeded_trip(&store, &[100]).await;
        for price in [100, 120, 90] {
            store.append_price(trip_id, price).await.unwrap();
        }
        let engine = engine(&store);

        let baseline = engine.baseline(trip_id).await.unwrap();
        let alert = engine.record(trip_id, baseline, 80).await.unwrap().alert.unwrap();

        assert_eq!(alert.extremum, Some(Extremum::LowestEver));
        let trend = alert.trend.unwrap();
        assert_eq!(trend.points.len(), 4);
        assert_eq!(trend.points.last().unwrap().price, 80.0);
    }

    #[tokio::test]
    async fn test_deleted_trip_is_not_recorded() {
        let store = Arc::new(InMemoryStore::new());
        let trip_id = seeded_trip(&store, &[300]).await;
        store.delete_trip(trip_id).await.unwrap();

        let evaluation = engine(&store).record(trip_id, Some(300.0), 200).await.unwrap();

        assert!(!evaluation.recorded);
        assert!(store.price_history(trip_id).await.unwrap().is_empty());
    }
}
