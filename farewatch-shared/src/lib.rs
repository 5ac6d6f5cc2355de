pub mod models;

pub use models::entities::{
    CarPriceHistory, CarRental, Flight, MonitoredTrip, NewFlight, PriceHistory, StopDetail, User,
};
pub use models::events::{PriceAlertEvent, PriceTrend, TrendPoint};
