use async_trait::async_trait;
use chrono::{DateTime, Utc};
use farewatch_core::repository::{CarPriceHistoryRepository, CarRentalRepository, StoreResult};
use farewatch_shared::{CarPriceHistory, CarRental};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgRentalStore {
    pool: PgPool,
}

impl PgRentalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RentalRow {
    id: Uuid,
    user_id: i64,
    airport_code: String,
    start_date: String,
    end_date: String,
    url: Option<String>,
    last_price: f64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RentalRow> for CarRental {
    fn from(row: RentalRow) -> Self {
        CarRental {
            id: row.id,
            user_id: row.user_id,
            airport_code: row.airport_code,
            start_date: row.start_date,
            end_date: row.end_date,
            url: row.url,
            last_price: row.last_price,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CarPriceRow {
    id: Uuid,
    rental_id: Uuid,
    price: f64,
    recorded_at: DateTime<Utc>,
}

const RENTAL_COLUMNS: &str =
    "id, user_id, airport_code, start_date, end_date, url, last_price, is_active, created_at, updated_at";

#[async_trait]
impl CarRentalRepository for PgRentalStore {
    async fn create_rental(&self, rental: &CarRental) -> StoreResult<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO car_rentals (id, user_id, airport_code, start_date, end_date, url,
                                     last_price, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(rental.id)
        .bind(rental.user_id)
        .bind(&rental.airport_code)
        .bind(&rental.start_date)
        .bind(&rental.end_date)
        .bind(&rental.url)
        .bind(rental.last_price)
        .bind(rental.is_active)
        .bind(rental.created_at)
        .bind(rental.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(rental.id)
    }

    async fn get_rental(&self, id: Uuid) -> StoreResult<Option<CarRental>> {
        let row = sqlx::query_as::<_, RentalRow>(&format!(
            "SELECT {} FROM car_rentals WHERE id = $1",
            RENTAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_active_rentals(&self) -> StoreResult<Vec<CarRental>> {
        let rows = sqlx::query_as::<_, RentalRow>(&format!(
            "SELECT {} FROM car_rentals WHERE is_active ORDER BY created_at",
            RENTAL_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_last_price(&self, id: Uuid, price: f64, url: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE car_rentals SET last_price = $2, url = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(price)
        .bind(url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_rental(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM car_rentals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CarPriceHistoryRepository for PgRentalStore {
    async fn append_car_price(&self, rental_id: Uuid, price: f64) -> StoreResult<CarPriceHistory> {
        let point = CarPriceHistory::new(rental_id, price);
        sqlx::query(
            "INSERT INTO car_price_history (id, rental_id, price, recorded_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(point.id)
        .bind(point.rental_id)
        .bind(point.price)
        .bind(point.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(point)
    }

    async fn car_price_history(&self, rental_id: Uuid) -> StoreResult<Vec<CarPriceHistory>> {
        let rows = sqlx::query_as::<_, CarPriceRow>(
            "SELECT id, rental_id, price, recorded_at FROM car_price_history WHERE rental_id = $1 ORDER BY recorded_at",
        )
        .bind(rental_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CarPriceHistory {
                id: row.id,
                rental_id: row.rental_id,
                price: row.price,
                timestamp: row.recorded_at,
            })
            .collect())
    }
}
