use async_trait::async_trait;
use chrono::{DateTime, Utc};
use farewatch_core::repository::{
    FlightRepository, PriceHistoryRepository, StoreResult, TripRepository,
};
use farewatch_shared::{Flight, MonitoredTrip, NewFlight, PriceHistory, StopDetail};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres-backed trips, their flights and their price history
pub struct PgTripStore {
    pool: PgPool,
}

impl PgTripStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    user_id: i64,
    url: String,
    date: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TripRow> for MonitoredTrip {
    fn from(row: TripRow) -> Self {
        MonitoredTrip {
            id: row.id,
            user_id: row.user_id,
            url: row.url,
            date: row.date,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    trip_id: Uuid,
    origin: String,
    destination: String,
    date: String,
    departure_time: String,
    arrival_time: String,
    duration: String,
    airline: String,
    stops: String,
    price: i32,
    emissions: String,
    stop_details: Json<Vec<StopDetail>>,
    created_at: DateTime<Utc>,
}

impl From<FlightRow> for Flight {
    fn from(row: FlightRow) -> Self {
        Flight {
            id: row.id,
            trip_id: row.trip_id,
            origin: row.origin,
            destination: row.destination,
            date: row.date,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            duration: row.duration,
            airline: row.airline,
            stops: row.stops,
            price: row.price,
            emissions: row.emissions,
            stop_details: row.stop_details.0,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PriceRow {
    id: Uuid,
    trip_id: Uuid,
    price: i32,
    recorded_at: DateTime<Utc>,
}

impl From<PriceRow> for PriceHistory {
    fn from(row: PriceRow) -> Self {
        PriceHistory {
            id: row.id,
            trip_id: row.trip_id,
            price: row.price,
            timestamp: row.recorded_at,
        }
    }
}

const TRIP_COLUMNS: &str = "id, user_id, url, date, is_active, created_at, updated_at";

#[async_trait]
impl TripRepository for PgTripStore {
    async fn create_trip(&self, trip: &MonitoredTrip) -> StoreResult<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO monitored_trips (id, user_id, url, date, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(trip.id)
        .bind(trip.user_id)
        .bind(&trip.url)
        .bind(&trip.date)
        .bind(trip.is_active)
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(trip.id)
    }

    async fn get_trip(&self, id: Uuid) -> StoreResult<Option<MonitoredTrip>> {
        let row = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {} FROM monitored_trips WHERE id = $1",
            TRIP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_active_trips(&self) -> StoreResult<Vec<MonitoredTrip>> {
        let rows = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {} FROM monitored_trips WHERE is_active ORDER BY created_at",
            TRIP_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_trips_for_user(&self, user_id: i64) -> StoreResult<Vec<MonitoredTrip>> {
        let rows = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {} FROM monitored_trips WHERE user_id = $1 AND is_active ORDER BY created_at",
            TRIP_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_trip_url(&self, id: Uuid, url: &str) -> StoreResult<()> {
        sqlx::query("UPDATE monitored_trips SET url = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn deactivate_trip(&self, id: Uuid, user_id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE monitored_trips SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_trip(&self, id: Uuid) -> StoreResult<()> {
        // Flights and price history go with it (ON DELETE CASCADE)
        sqlx::query("DELETE FROM monitored_trips WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FlightRepository for PgTripStore {
    async fn list_flights(&self, trip_id: Uuid) -> StoreResult<Vec<Flight>> {
        let rows = sqlx::query_as::<_, FlightRow>(
            r#"
            SELECT id, trip_id, origin, destination, date, departure_time, arrival_time,
                   duration, airline, stops, price, emissions, stop_details, created_at
            FROM flights
            WHERE trip_id = $1
            ORDER BY price
            "#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn replace_flights(&self, trip_id: Uuid, flights: Vec<NewFlight>) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM flights WHERE trip_id = $1")
            .bind(trip_id)
            .execute(&mut *tx)
            .await?;

        let count = flights.len();
        for flight in flights {
            let flight = flight.into_flight(trip_id);
            sqlx::query(
                r#"
                INSERT INTO flights (id, trip_id, origin, destination, date, departure_time,
                                     arrival_time, duration, airline, stops, price, emissions,
                                     stop_details, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(flight.id)
            .bind(flight.trip_id)
            .bind(&flight.origin)
            .bind(&flight.destination)
            .bind(&flight.date)
            .bind(&flight.departure_time)
            .bind(&flight.arrival_time)
            .bind(&flight.duration)
            .bind(&flight.airline)
            .bind(&flight.stops)
            .bind(flight.price)
            .bind(&flight.emissions)
            .bind(Json(&flight.stop_details))
            .bind(flight.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(count)
    }
}

#[async_trait]
impl PriceHistoryRepository for PgTripStore {
    async fn append_price(&self, trip_id: Uuid, price: i32) -> StoreResult<PriceHistory> {
        let point = PriceHistory::new(trip_id, price);
        sqlx::query("INSERT INTO price_history (id, trip_id, price, recorded_at) VALUES ($1, $2, $3, $4)")
            .bind(point.id)
            .bind(point.trip_id)
            .bind(point.price)
            .bind(point.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(point)
    }

    async fn latest_price(&self, trip_id: Uuid) -> StoreResult<Option<PriceHistory>> {
        let row = sqlx::query_as::<_, PriceRow>(
            r#"
            SELECT id, trip_id, price, recorded_at
            FROM price_history
            WHERE trip_id = $1
            ORDER BY recorded_at DESC
            LIMIT 1
            "#,
        )
        .bind(trip_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn price_history(&self, trip_id: Uuid) -> StoreResult<Vec<PriceHistory>> {
        let rows = sqlx::query_as::<_, PriceRow>(
            "SELECT id, trip_id, price, recorded_at FROM price_history WHERE trip_id = $1 ORDER BY recorded_at",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
