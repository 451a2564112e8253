use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::order::{Order, OrderStatus};

/// The order backend as the tracking core sees it: history, the confirm
/// transition, and rating submission. Everything else the backend does is out
/// of scope here.
#[async_trait]
pub trait OrderApi: Send + Sync {
    async fn fetch_history(&self) -> Result<Vec<Order>, AppError>;
    async fn confirm_delivery(&self, order_id: u64) -> Result<OrderStatus, AppError>;
    async fn submit_rating(&self, order_id: u64, stars: u8, comment: &str)
    -> Result<(), AppError>;
}

pub struct HttpOrderApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpOrderApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct ConfirmResponse {
    status: OrderStatus,
}

#[derive(Serialize)]
struct RatingRequest<'a> {
    stars: u8,
    comment: &'a str,
}

#[async_trait]
impl OrderApi for HttpOrderApi {
    async fn fetch_history(&self) -> Result<Vec<Order>, AppError> {
        let url = format!("{}/orders/history", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| AppError::Api(format!("order history request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Api(format!(
                "order history returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|err| AppError::Api(format!("invalid order history payload: {err}")))
    }

    async fn confirm_delivery(&self, order_id: u64) -> Result<OrderStatus, AppError> {
        let url = format!("{}/orders/{order_id}/confirm", self.base_url);
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|err| AppError::Api(format!("confirm request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Api(format!(
                "confirm returned {}",
                response.status()
            )));
        }

        let body: ConfirmResponse = response
            .json()
            .await
            .map_err(|err| AppError::Api(format!("invalid confirm payload: {err}")))?;
        Ok(body.status)
    }

    async fn submit_rating(
        &self,
        order_id: u64,
        stars: u8,
        comment: &str,
    ) -> Result<(), AppError> {
        let url = format!("{}/orders/{order_id}/rating", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&RatingRequest { stars, comment })
            .send()
            .await
            .map_err(|err| AppError::Api(format!("rating request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Api(format!(
                "rating returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// In-memory order history. Replaced wholesale on every reload; per-order UI
/// state must key off the order id, never a position in this list.
pub struct SnapshotStore {
    orders: RwLock<Arc<Vec<Order>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Swaps in a new history, sorted descending by id (newest first).
    pub async fn replace(&self, mut orders: Vec<Order>) {
        orders.sort_by(|a, b| b.id.cmp(&a.id));
        *self.orders.write().await = Arc::new(orders);
    }

    pub async fn snapshot(&self) -> Arc<Vec<Order>> {
        self.orders.read().await.clone()
    }

    pub async fn get(&self, order_id: u64) -> Option<Order> {
        self.orders
            .read()
            .await
            .iter()
            .find(|order| order.id == order_id)
            .cloned()
    }

    pub async fn count(&self) -> usize {
        self.orders.read().await.len()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::location::GeoPoint;
    use crate::models::order::PaymentStatus;

    fn order(id: u64) -> Order {
        Order {
            id,
            status: OrderStatus::Pending,
            scheduled_delivery: None,
            need_delivery: true,
            customer_location: GeoPoint { lat: 9.03, lng: 38.74 },
            items: vec![],
            total: 0.0,
            payment_status: PaymentStatus::Pending,
            delivery_person: None,
            rating: None,
            is_rated: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn replace_sorts_descending_by_id() {
        let store = SnapshotStore::new();
        store.replace(vec![order(3), order(11), order(7)]).await;

        let snapshot = store.snapshot().await;
        let ids: Vec<u64> = snapshot.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![11, 7, 3]);
    }

    #[tokio::test]
    async fn get_finds_orders_by_id_after_replacement() {
        let store = SnapshotStore::new();
        store.replace(vec![order(1), order(2)]).await;
        store.replace(vec![order(2), order(5)]).await;

        assert!(store.get(5).await.is_some());
        assert!(store.get(1).await.is_none());
        assert_eq!(store.count().await, 2);
    }
}
