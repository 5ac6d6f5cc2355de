use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use farewatch_shared::{NewFlight, StopDetail};
use serde::{Deserialize, Serialize};

/// One priced itinerary as read from the search page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub departure_time: String,
    pub arrival_time: String,
    pub duration: String,
    pub airline: String,
    pub stops_label: String,
    /// 0 means the page did not render a readable price
    pub price: i32,
    pub emissions: String,
    #[serde(default)]
    pub stop_details: Vec<StopDetail>,
}

/// Everything one extraction returns for a search URL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuoteSet {
    pub quotes: Vec<Quote>,
    pub origin: String,
    pub destination: String,
    pub date: String,
    /// URL variant that produced these quotes
    #[serde(default)]
    pub source_url: String,
}

impl QuoteSet {
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn prices(&self) -> impl Iterator<Item = i32> + '_ {
        self.quotes.iter().map(|q| q.price)
    }

    pub fn lowest_price(&self) -> Option<i32> {
        self.prices().min()
    }

    pub fn highest_price(&self) -> Option<i32> {
        self.prices().max()
    }

    /// Drop quotes whose price could not be read
    pub fn retain_priced(&mut self) {
        self.quotes.retain(|q| q.price > 0);
    }

    /// Flight rows for persisting this observation
    pub fn to_new_flights(&self) -> Vec<NewFlight> {
        self.quotes
            .iter()
            .map(|q| NewFlight {
                origin: self.origin.clone(),
                destination: self.destination.clone(),
                date: self.date.clone(),
                departure_time: q.departure_time.clone(),
                arrival_time: q.arrival_time.clone(),
                duration: q.duration.clone(),
                airline: q.airline.clone(),
                stops: q.stops_label.clone(),
                price: q.price,
                emissions: q.emissions.clone(),
                stop_details: q.stop_details.clone(),
            })
            .collect()
    }
}

/// Cheapest car offered for a rental search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarOffer {
    pub title: String,
    pub price: f64,
    pub url: String,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ExtractionError {
    #[error("No results found")]
    NoResults,
    #[error("Search date has already passed")]
    StaleDate,
    #[error("Attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("Extraction failed: {0}")]
    Fault(String),
}

impl ExtractionError {
    /// Stale dates never get better by retrying another variant
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::StaleDate)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Browser process failed to launch: {0}")]
    Failed(String),
}

/// A page session inside the automation browser.
///
/// Implementations navigate, wait for results and read the DOM; the engine
/// only sees the data shape and the error signals.
#[async_trait]
pub trait ExtractionPage: Send {
    async fn extract_flights(&mut self, url: &str) -> Result<QuoteSet, ExtractionError>;

    async fn extract_car_offer(&mut self, url: &str) -> Result<CarOffer, ExtractionError>;

    /// Current page markup, kept for offline debugging of failed attempts
    async fn snapshot(&mut self) -> Result<String, ExtractionError>;

    async fn close(&mut self);
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn is_connected(&self) -> bool;

    async fn new_page(&self) -> Result<Box<dyn ExtractionPage>, ExtractionError>;

    async fn close(&self);
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Browser>, LaunchError>;
}
