use std::sync::Arc;

use farewatch_core::extraction::{CarOffer, QuoteSet};
use farewatch_core::i18n::{format_money, render, text, Language, MessageKey};
use farewatch_core::messaging::AlertSink;
use farewatch_core::repository::{StoreResult, UserRepository};
use farewatch_shared::{CarRental, MonitoredTrip};
use tracing::{info, warn};

use crate::history::{Direction, Extremum, PriceAlert};

fn change_lines(lang: Language, alert: &PriceAlert) -> Vec<String> {
    let change = &alert.change;
    let direction = match change.direction() {
        Some(Direction::Increased) => text(lang, MessageKey::Increased),
        _ => text(lang, MessageKey::Decreased),
    };
    let delta = format_money(change.delta().abs());
    let percent = format!("{:.1}", change.percent().abs());

    let mut lines = vec![
        render(
            lang,
            MessageKey::PriceChanged,
            &[("direction", direction), ("delta", delta.as_str()), ("percent", percent.as_str())],
        ),
        render(lang, MessageKey::NewPrice, &[("price", format_money(change.observed).as_str())]),
        render(lang, MessageKey::PreviousPrice, &[("price", format_money(change.baseline).as_str())]),
    ];

    match alert.extremum {
        Some(Extremum::LowestEver) => lines.push(text(lang, MessageKey::NewLowestEver).to_string()),
        Some(Extremum::HighestEver) => lines.push(text(lang, MessageKey::NewHighestEver).to_string()),
        None => {}
    }
    lines
}

fn icon(alert: &PriceAlert) -> &'static str {
    match alert.change.direction() {
        Some(Direction::Increased) => "📈",
        _ => "📉",
    }
}

pub fn compose_trip_alert(
    lang: Language,
    trip: &MonitoredTrip,
    quotes: &QuoteSet,
    alert: &PriceAlert,
) -> String {
    let mut lines = vec![
        render(lang, MessageKey::FlightAlertTitle, &[("icon", icon(alert))]),
        format!("{} → {} ({})", quotes.origin, quotes.destination, trip.date),
        String::new(),
    ];
    lines.extend(change_lines(lang, alert));
    lines.push(String::new());
    lines.push(render(lang, MessageKey::ViewFlights, &[("url", trip.url.as_str())]));
    lines.join("\n")
}

pub fn compose_car_alert(
    lang: Language,
    rental: &CarRental,
    offer: &CarOffer,
    alert: &PriceAlert,
) -> String {
    let mut lines = vec![
        render(lang, MessageKey::CarAlertTitle, &[("icon", icon(alert))]),
        format!("{}: {} → {}", rental.airport_code, rental.start_date, rental.end_date),
        offer.title.clone(),
        String::new(),
    ];
    lines.extend(change_lines(lang, alert));
    lines.push(String::new());
    lines.push(render(lang, MessageKey::ViewCars, &[("url", offer.url.as_str())]));
    lines.join("\n")
}

/// Composes alert texts in the owner's language and hands them to the chat sink
pub struct AlertNotifier {
    sink: Arc<dyn AlertSink>,
    users: Arc<dyn UserRepository>,
}

impl AlertNotifier {
    pub fn new(sink: Arc<dyn AlertSink>, users: Arc<dyn UserRepository>) -> Self {
        Self { sink, users }
    }

    pub async fn language_of(&self, user_id: i64) -> Language {
        match self.users.get_user(user_id).await {
            Ok(Some(user)) => Language::from_code(&user.language),
            Ok(None) => Language::default(),
            Err(e) => {
                warn!(user_id, "Could not load user language: {}", e);
                Language::default()
            }
        }
    }

    pub async fn notify_trip(
        &self,
        trip: &MonitoredTrip,
        quotes: &QuoteSet,
        alert: &PriceAlert,
    ) -> StoreResult<()> {
        let lang = self.language_of(trip.user_id).await;
        let text = compose_trip_alert(lang, trip, quotes, alert);
        self.sink.send_alert(trip.user_id, &text, alert.trend.clone()).await?;
        info!(trip_id = %trip.id, user_id = trip.user_id, "Sent price alert");
        Ok(())
    }

    pub async fn notify_rental(
        &self,
        rental: &CarRental,
        offer: &CarOffer,
        alert: &PriceAlert,
    ) -> StoreResult<()> {
        let lang = self.language_of(rental.user_id).await;
        let text = compose_car_alert(lang, rental, offer, alert);
        self.sink.send_alert(rental.user_id, &text, alert.trend.clone()).await?;
        info!(rental_id = %rental.id, user_id = rental.user_id, "Sent car price alert");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::PriceChange;
    use crate::testing::{quote_set, RecordingSink};
    use farewatch_core::repository::UserRepository;
    use crate::testing::InMemoryStore;
    use farewatch_shared::User;

    fn drop_alert() -> PriceAlert {
        PriceAlert {
            change: PriceChange::between(200.0, 190.0).unwrap(),
            extremum: Some(Extremum::LowestEver),
            trend: None,
        }
    }

    fn trip() -> MonitoredTrip {
        MonitoredTrip::new(
            42,
            "https://www.google.com/travel/flights?tfs=abc".to_string(),
            "sex., 26 de set.".to_string(),
        )
    }

    #[test]
    fn test_trip_alert_text_in_english() {
        let text = compose_trip_alert(Language::En, &trip(), &quote_set(&[190]), &drop_alert());

        assert!(text.starts_with("📉 Price update"));
        assert!(text.contains("The lowest price has decreased by R$ 10.00 (5.0%)"));
        assert!(text.contains("New price: R$ 190.00"));
        assert!(text.contains("Previous price: R$ 200.00"));
        assert!(text.contains("New lowest price ever"));
        assert!(text.contains("(https://www.google.com/travel/flights?tfs=abc)"));
    }

    #[test]
    fn test_car_alert_text_in_portuguese() {
        let rental = CarRental::new(
            42,
            "GRU".to_string(),
            "2025-09-26".to_string(),
            "2025-09-30".to_string(),
            300.0,
        );
        let offer = CarOffer {
            title: "Fiat Mobi".to_string(),
            price: 330.0,
            url: "https://www.kayak.com.br/cars/x".to_string(),
        };
        let alert = PriceAlert {
            change: PriceChange::between(300.0, 330.0).unwrap(),
            extremum: None,
            trend: None,
        };

        let text = compose_car_alert(Language::Pt, &rental, &offer, &alert);

        assert!(text.starts_with("📈"));
        assert!(text.contains("O menor preço subiu R$ 30.00 (10.0%)"));
        assert!(text.contains("GRU: 2025-09-26 → 2025-09-30"));
        assert!(!text.contains("histórico"));
    }

    #[tokio::test]
    async fn test_notifier_uses_owner_language() {
        let store = Arc::new(InMemoryStore::new());
        store.upsert_user(&User::new(42, "pt-BR")).await.unwrap();
        let sink = Arc::new(RecordingSink::new());
        let notifier = AlertNotifier::new(sink.clone(), store);

        notifier.notify_trip(&trip(), &quote_set(&[190]), &drop_alert()).await.unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, 42);
        assert!(sent[0].text.contains("O menor preço caiu"));
    }

    #[tokio::test]
    async fn test_unknown_user_gets_english() {
        let store = Arc::new(InMemoryStore::new());
        let sink = Arc::new(RecordingSink::new());
        let notifier = AlertNotifier::new(sink, store);

        assert_eq!(notifier.language_of(9).await, Language::En);
    }
}
