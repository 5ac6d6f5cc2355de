//! Every repository contract over process memory.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use farewatch_core::repository::{
    CarPriceHistoryRepository, CarRentalRepository, FlightRepository, PriceHistoryRepository,
    StoreResult, TripRepository, UserRepository,
};
use farewatch_shared::{
    CarPriceHistory, CarRental, Flight, MonitoredTrip, NewFlight, PriceHistory, User,
};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    // insertion order doubles as creation order
    trips: Vec<MonitoredTrip>,
    flights: HashMap<Uuid, Vec<Flight>>,
    history: HashMap<Uuid, Vec<PriceHistory>>,
    rentals: Vec<CarRental>,
    car_history: HashMap<Uuid, Vec<CarPriceHistory>>,
    users: HashMap<i64, User>,
}

/// Every repository contract over one mutex-guarded set of tables
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| "in-memory store lock poisoned".into())
    }
}

#[async_trait]
impl TripRepository for InMemoryStore {
    async fn create_trip(&self, trip: &MonitoredTrip) -> StoreResult<Uuid> {
        self.tables()?.trips.push(trip.clone());
        Ok(trip.id)
    }

    async fn get_trip(&self, id: Uuid) -> StoreResult<Option<MonitoredTrip>> {
        Ok(self.tables()?.trips.iter().find(|t| t.id == id).cloned())
    }

    async fn list_active_trips(&self) -> StoreResult<Vec<MonitoredTrip>> {
        Ok(self.tables()?.trips.iter().filter(|t| t.is_active).cloned().collect())
    }

    async fn list_trips_for_user(&self, user_id: i64) -> StoreResult<Vec<MonitoredTrip>> {
        Ok(self
            .tables()?
            .trips
            .iter()
            .filter(|t| t.user_id == user_id && t.is_active)
            .cloned()
            .collect())
    }

    async fn update_trip_url(&self, id: Uuid, url: &str) -> StoreResult<()> {
        if let Some(trip) = self.tables()?.trips.iter_mut().find(|t| t.id == id) {
            trip.url = url.to_string();
            trip.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn deactivate_trip(&self, id: Uuid, user_id: i64) -> StoreResult<bool> {
        let mut tables = self.tables()?;
        match tables.trips.iter_mut().find(|t| t.id == id && t.user_id == user_id) {
            Some(trip) => {
                trip.is_active = false;
                trip.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_trip(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.trips.retain(|t| t.id != id);
        tables.flights.remove(&id);
        tables.history.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl FlightRepository for InMemoryStore {
    async fn list_flights(&self, trip_id: Uuid) -> StoreResult<Vec<Flight>> {
        Ok(self.tables()?.flights.get(&trip_id).cloned().unwrap_or_default())
    }

    async fn replace_flights(&self, trip_id: Uuid, flights: Vec<NewFlight>) -> StoreResult<usize> {
        let rows: Vec<Flight> = flights.into_iter().map(|f| f.into_flight(trip_id)).collect();
        let count = rows.len();
        self.tables()?.flights.insert(trip_id, rows);
        Ok(count)
    }
}

#[async_trait]
impl PriceHistoryRepository for InMemoryStore {
    async fn append_price(&self, trip_id: Uuid, price: i32) -> StoreResult<PriceHistory> {
        let point = PriceHistory::new(trip_id, price);
        self.tables()?.history.entry(trip_id).or_default().push(point.clone());
        Ok(point)
    }

    async fn latest_price(&self, trip_id: Uuid) -> StoreResult<Option<PriceHistory>> {
        Ok(self
            .tables()?
            .history
            .get(&trip_id)
            .and_then(|points| points.last().cloned()))
    }

    async fn price_history(&self, trip_id: Uuid) -> StoreResult<Vec<PriceHistory>> {
        Ok(self.tables()?.history.get(&trip_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl CarRentalRepository for InMemoryStore {
    async fn create_rental(&self, rental: &CarRental) -> StoreResult<Uuid> {
        self.tables()?.rentals.push(rental.clone());
        Ok(rental.id)
    }

    async fn get_rental(&self, id: Uuid) -> StoreResult<Option<CarRental>> {
        Ok(self.tables()?.rentals.iter().find(|r| r.id == id).cloned())
    }

    async fn list_active_rentals(&self) -> StoreResult<Vec<CarRental>> {
        Ok(self.tables()?.rentals.iter().filter(|r| r.is_active).cloned().collect())
    }

    async fn update_last_price(&self, id: Uuid, price: f64, url: &str) -> StoreResult<()> {
        if let Some(rental) = self.tables()?.rentals.iter_mut().find(|r| r.id == id) {
            rental.last_price = price;
            rental.url = Some(url.to_string());
            rental.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_rental(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.rentals.retain(|r| r.id != id);
        tables.car_history.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl CarPriceHistoryRepository for InMemoryStore {
    async fn append_car_price(&self, rental_id: Uuid, price: f64) -> StoreResult<CarPriceHistory> {
        let point = CarPriceHistory::new(rental_id, price);
        self.tables()?
            .car_history
            .entry(rental_id)
            .or_default()
            .push(point.clone());
        Ok(point)
    }

    async fn car_price_history(&self, rental_id: Uuid) -> StoreResult<Vec<CarPriceHistory>> {
        Ok(self.tables()?.car_history.get(&rental_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        self.tables()?.users.insert(user.id, user.clone());
        Ok(())
    }
}
