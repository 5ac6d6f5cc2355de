use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// A chat user that owns monitors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub language: String,
}

impl User {
    pub fn new(id: i64, language: impl Into<String>) -> Self {
        Self { id, language: language.into() }
    }
}

/// A recurring flight search watched on behalf of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredTrip {
    pub id: Uuid,
    pub user_id: i64,
    /// Canonical search URL; replaced when a different filler variant succeeds
    pub url: String,
    /// Date as echoed by the search page (e.g. "sex., 6 de jun.")
    pub date: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonitoredTrip {
    pub fn new(user_id: i64, url: String, date: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            url,
            date,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Layover information attached to a flight
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StopDetail {
    pub airport: String,
    pub airport_name: String,
    pub duration: String,
}

/// Flight row as persisted for a trip. The whole set is replaced on every check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub date: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub duration: String,
    pub airline: String,
    pub stops: String,
    pub price: i32,
    pub emissions: String,
    pub stop_details: Vec<StopDetail>,
    pub created_at: DateTime<Utc>,
}

/// Flight row before it is bound to a trip and given an id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewFlight {
    pub origin: String,
    pub destination: String,
    pub date: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub duration: String,
    pub airline: String,
    pub stops: String,
    pub price: i32,
    pub emissions: String,
    pub stop_details: Vec<StopDetail>,
}

impl NewFlight {
    pub fn into_flight(self, trip_id: Uuid) -> Flight {
        Flight {
            id: Uuid::new_v4(),
            trip_id,
            origin: self.origin,
            destination: self.destination,
            date: self.date,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            duration: self.duration,
            airline: self.airline,
            stops: self.stops,
            price: self.price,
            emissions: self.emissions,
            stop_details: self.stop_details,
            created_at: Utc::now(),
        }
    }
}

/// One observed lowest price of a trip. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub price: i32,
    pub timestamp: DateTime<Utc>,
}

impl PriceHistory {
    pub fn new(trip_id: Uuid, price: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            price,
            timestamp: Utc::now(),
        }
    }
}

/// A car rental search watched on behalf of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarRental {
    pub id: Uuid,
    pub user_id: i64,
    pub airport_code: String,
    pub start_date: String,
    pub end_date: String,
    pub url: Option<String>,
    /// Last price observed; the alerting baseline for the next check
    pub last_price: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CarRental {
    pub fn new(
        user_id: i64,
        airport_code: String,
        start_date: String,
        end_date: String,
        last_price: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            airport_code,
            start_date,
            end_date,
            url: None,
            last_price,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Search page listing the cheapest cars for this rental window
    pub fn search_url(&self) -> String {
        format!(
            "https://www.kayak.com.br/cars/{}/{}/{}?sort=price_a",
            self.airport_code, self.start_date, self.end_date
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarPriceHistory {
    pub id: Uuid,
    pub rental_id: Uuid,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl CarPriceHistory {
    pub fn new(rental_id: Uuid, price: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            rental_id,
            price,
            timestamp: Utc::now(),
        }
    }
}
