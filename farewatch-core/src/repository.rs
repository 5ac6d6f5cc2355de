use async_trait::async_trait;
use uuid::Uuid;
use farewatch_shared::{
    CarPriceHistory, CarRental, Flight, MonitoredTrip, NewFlight, PriceHistory, User,
};

pub type StoreResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Repository trait for monitored trips
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn create_trip(&self, trip: &MonitoredTrip) -> StoreResult<Uuid>;

    async fn get_trip(&self, id: Uuid) -> StoreResult<Option<MonitoredTrip>>;

    async fn list_active_trips(&self) -> StoreResult<Vec<MonitoredTrip>>;

    async fn list_trips_for_user(&self, user_id: i64) -> StoreResult<Vec<MonitoredTrip>>;

    async fn update_trip_url(&self, id: Uuid, url: &str) -> StoreResult<()>;

    /// Stop monitoring; returns false when the trip is not owned by the user
    async fn deactivate_trip(&self, id: Uuid, user_id: i64) -> StoreResult<bool>;

    /// Removes the trip with its flights and price history
    async fn delete_trip(&self, id: Uuid) -> StoreResult<()>;
}

/// Repository trait for the flight rows of a trip
#[async_trait]
pub trait FlightRepository: Send + Sync {
    async fn list_flights(&self, trip_id: Uuid) -> StoreResult<Vec<Flight>>;

    /// Delete every flight of the trip and insert the new set, in one transaction
    async fn replace_flights(&self, trip_id: Uuid, flights: Vec<NewFlight>) -> StoreResult<usize>;
}

/// Repository trait for the price timeline of a trip
#[async_trait]
pub trait PriceHistoryRepository: Send + Sync {
    async fn append_price(&self, trip_id: Uuid, price: i32) -> StoreResult<PriceHistory>;

    async fn latest_price(&self, trip_id: Uuid) -> StoreResult<Option<PriceHistory>>;

    /// Ordered by timestamp ascending
    async fn price_history(&self, trip_id: Uuid) -> StoreResult<Vec<PriceHistory>>;
}

/// Repository trait for car rental monitors
#[async_trait]
pub trait CarRentalRepository: Send + Sync {
    async fn create_rental(&self, rental: &CarRental) -> StoreResult<Uuid>;

    async fn get_rental(&self, id: Uuid) -> StoreResult<Option<CarRental>>;

    async fn list_active_rentals(&self) -> StoreResult<Vec<CarRental>>;

    async fn update_last_price(&self, id: Uuid, price: f64, url: &str) -> StoreResult<()>;

    async fn delete_rental(&self, id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait CarPriceHistoryRepository: Send + Sync {
    async fn append_car_price(&self, rental_id: Uuid, price: f64) -> StoreResult<CarPriceHistory>;

    /// Ordered by timestamp ascending
    async fn car_price_history(&self, rental_id: Uuid) -> StoreResult<Vec<CarPriceHistory>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: i64) -> StoreResult<Option<User>>;

    async fn upsert_user(&self, user: &User) -> StoreResult<()>;
}
