use std::sync::Arc;

use farewatch_core::extraction::QuoteSet;
use farewatch_core::repository::{FlightRepository, StoreResult, TripRepository};
use farewatch_shared::MonitoredTrip;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    Replaced(usize),
    /// The trip was removed while it was being checked
    TripGone,
}

/// Owns the flight rows of each trip. Every observation replaces the whole set.
pub struct FlightAggregator {
    trips: Arc<dyn TripRepository>,
    flights: Arc<dyn FlightRepository>,
}

impl FlightAggregator {
    pub fn new(trips: Arc<dyn TripRepository>, flights: Arc<dyn FlightRepository>) -> Self {
        Self { trips, flights }
    }

    pub async fn replace(&self, trip_id: Uuid, quotes: &QuoteSet) -> StoreResult<Replacement> {
        if self.trips.get_trip(trip_id).await?.is_none() {
            warn!(%trip_id, "Trip no longer exists, skipping flight update");
            return Ok(Replacement::TripGone);
        }

        let count = self
            .flights
            .replace_flights(trip_id, quotes.to_new_flights())
            .await?;
        info!(%trip_id, count, "Replaced flights");
        Ok(Replacement::Replaced(count))
    }

    /// Delete a trip together with its flights and history
    pub async fn remove_trip(&self, trip_id: Uuid) -> StoreResult<()> {
        self.trips.delete_trip(trip_id).await?;
        info!(%trip_id, "Removed trip");
        Ok(())
    }

    /// Point the trip at the URL variant that worked. Returns whether it changed.
    pub async fn correct_url(&self, trip: &MonitoredTrip, url: &str) -> StoreResult<bool> {
        if trip.url == url {
            return Ok(false);
        }
        self.trips.update_trip_url(trip.id, url).await?;
        info!(trip_id = %trip.id, "Updated trip URL to working variant");
        Ok(true)
    }
}
