use chrono::{DateTime, Utc};

/// One point of a price timeline, as handed to the chart renderer
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct TrendPoint {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Price timeline attached to an alert when there is something to plot
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct PriceTrend {
    pub points: Vec<TrendPoint>,
}

impl PriceTrend {
    /// Points are sorted by timestamp ascending.
    pub fn new(mut points: Vec<TrendPoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self { points }
    }
}

/// Published for the chat collaborator, which renders the chart and delivers the text
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PriceAlertEvent {
    pub user_id: i64,
    pub text: String,
    pub trend: Option<PriceTrend>,
    pub sent_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_trend_is_sorted() {
        let now = Utc::now();
        let trend = PriceTrend::new(vec![
            TrendPoint { price: 190.0, timestamp: now },
            TrendPoint { price: 200.0, timestamp: now - Duration::hours(1) },
        ]);
        assert_eq!(trend.points[0].price, 200.0);
        assert_eq!(trend.points[1].price, 190.0);
    }

    #[test]
    fn test_alert_event_json_shape() {
        let event = PriceAlertEvent {
            user_id: 99,
            text: "hello".to_string(),
            trend: None,
            sent_at: 1_700_000_000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["user_id"], 99);
        assert!(json["trend"].is_null());
    }
}
