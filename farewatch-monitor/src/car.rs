use std::sync::Arc;

use farewatch_core::extraction::CarOffer;
use farewatch_core::repository::{CarPriceHistoryRepository, CarRentalRepository, StoreResult};
use farewatch_shared::{CarRental, TrendPoint};
use tracing::{debug, info};

use crate::history::{evaluate, Evaluation};

/// Price timeline of car rentals. The last observed price is the baseline.
pub struct CarPriceEngine {
    rentals: Arc<dyn CarRentalRepository>,
    history: Arc<dyn CarPriceHistoryRepository>,
}

impl CarPriceEngine {
    pub fn new(
        rentals: Arc<dyn CarRentalRepository>,
        history: Arc<dyn CarPriceHistoryRepository>,
    ) -> Self {
        Self { rentals, history }
    }

    pub async fn record(&self, rental: &CarRental, offer: &CarOffer) -> StoreResult<Evaluation> {
        if rental.last_price == offer.price {
            debug!(rental_id = %rental.id, price = offer.price, "Car price unchanged");
            return Ok(Evaluation::default());
        }

        if self.rentals.get_rental(rental.id).await?.is_none() {
            return Ok(Evaluation::default());
        }

        let prior: Vec<TrendPoint> = self
            .history
            .car_price_history(rental.id)
            .await?
            .into_iter()
            .map(|p| TrendPoint { price: p.price, timestamp: p.timestamp })
            .collect();

        let point = self.history.append_car_price(rental.id, offer.price).await?;
        self.rentals
            .update_last_price(rental.id, offer.price, &offer.url)
            .await?;
        info!(
            rental_id = %rental.id,
            price = offer.price,
            previous = rental.last_price,
            "Recorded new car price"
        );

        let baseline = (rental.last_price > 0.0).then_some(rental.last_price);
        Ok(Evaluation {
            recorded: true,
            alert: evaluate(baseline, offer.price, point.timestamp, &prior),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryStore;

    fn offer(price: f64) -> CarOffer {
        CarOffer {
            title: "Renault Kwid ou similar".to_string(),
            price,
            url: "https://www.kayak.com.br/cars/GRU/2025-09-26/2025-09-30?sort=price_a".to_string(),
        }
    }

    async fn seeded_rental(store: &Arc<InMemoryStore>, last_price: f64) -> CarRental {
        let rental = CarRental::new(
            3,
            "GRU".to_string(),
            "2025-09-26".to_string(),
            "2025-09-30".to_string(),
            last_price,
        );
        store.create_rental(&rental).await.unwrap();
        rental
    }

    #[tokio::test]
    async fn test_car_drop_alerts_and_moves_baseline() {
        let store = Arc::new(InMemoryStore::new());
        let rental = seeded_rental(&store, 400.0).await;
        let engine = CarPriceEngine::new(store.clone(), store.clone());

        let evaluation = engine.record(&rental, &offer(360.0)).await.unwrap();

        let alert = evaluation.alert.unwrap();
        assert_eq!(alert.change.percent(), -10.0);
        let stored = store.get_rental(rental.id).await.unwrap().unwrap();
        assert_eq!(stored.last_price, 360.0);
        assert!(stored.url.is_some());
        assert_eq!(store.car_price_history(rental.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_car_small_change_is_silent_but_recorded() {
        let store = Arc::new(InMemoryStore::new());
        let rental = seeded_rental(&store, 400.0).await;
        let engine = CarPriceEngine::new(store.clone(), store.clone());

        let evaluation = engine.record(&rental, &offer(390.0)).await.unwrap();

        assert!(evaluation.recorded);
        assert!(evaluation.alert.is_none());
    }

    #[tokio::test]
    async fn test_car_same_price_is_ignored() {
        let store = Arc::new(InMemoryStore::new());
        let rental = seeded_rental(&store, 400.0).await;
        let engine = CarPriceEngine::new(store.clone(), store.clone());

        let evaluation = engine.record(&rental, &offer(400.0)).await.unwrap();

        assert!(!evaluation.recorded);
        assert!(store.car_price_history(rental.id).await.unwrap().is_empty());
    }
}
