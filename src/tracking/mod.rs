pub mod gate;
pub mod session;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::classify::{Tab, classify};
use crate::error::AppError;
use crate::models::location::{GeoPoint, Route};
use crate::models::order::OrderStatus;
use crate::state::AppState;

/// Latest known courier position and drawable route for one tracked order.
#[derive(Debug, Clone, Serialize)]
pub struct CourierTrack {
    pub courier: GeoPoint,
    pub route: Route,
    pub updated_at: DateTime<Utc>,
}

/// Fetches the order history and swaps it in wholesale, with bounded
/// retry/backoff. On final failure the previous snapshot is retained rather
/// than leaving the user with nothing.
pub async fn reload_snapshot(state: &AppState) -> Result<(), AppError> {
    let mut attempt: u32 = 0;
    loop {
        match state.orders_api.fetch_history().await {
            Ok(orders) => {
                state.gates.sync(&orders);
                state.store.replace(orders).await;
                state
                    .metrics
                    .snapshot_reloads_total
                    .with_label_values(&["success"])
                    .inc();
                state.resync.notify_one();
                return Ok(());
            }
            Err(err) => {
                state
                    .metrics
                    .snapshot_reloads_total
                    .with_label_values(&["error"])
                    .inc();

                if attempt >= state.reload_retry_attempts {
                    error!(error = %err, "order history reload failed; keeping previous snapshot");
                    return Err(err);
                }

                let backoff = state.reload_retry_backoff * 2u32.saturating_pow(attempt);
                warn!(
                    error = %err,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "order history fetch failed; retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

/// Confirm-delivery. Guarded per order against concurrent duplicates; on
/// success nothing is flipped optimistically, the whole snapshot is reloaded
/// and everything re-derived from the server's answer. Returns whether the
/// rating collector opened.
pub async fn confirm_delivery(state: &AppState, order_id: u64) -> Result<bool, AppError> {
    let order = state
        .store
        .get(order_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    if !order.status.can_confirm(order.need_delivery) {
        return Err(AppError::Conflict(format!(
            "order {order_id} is not awaiting confirmation"
        )));
    }

    if state.confirms_in_flight.insert(order_id, ()).is_some() {
        return Err(AppError::Conflict(format!(
            "confirmation for order {order_id} is already in flight"
        )));
    }

    let result = state.orders_api.confirm_delivery(order_id).await;
    state.confirms_in_flight.remove(&order_id);

    let status = match result {
        Ok(status) => {
            state
                .metrics
                .confirm_requests_total
                .with_label_values(&["success"])
                .inc();
            status
        }
        Err(err) => {
            state
                .metrics
                .confirm_requests_total
                .with_label_values(&["error"])
                .inc();
            return Err(err);
        }
    };

    info!(order_id, status = ?status, "delivery confirmed");

    let opened = status == OrderStatus::Delivered && state.gates.open(order_id, order.is_rated);

    if let Err(err) = reload_snapshot(state).await {
        warn!(order_id, error = %err, "snapshot reload after confirm failed");
    }

    Ok(opened)
}

/// Submits a rating through the gate. Stars are validated here; the gate
/// refuses duplicates and concurrent submissions, and a failed call returns
/// the collector to `Open` so the user can retry.
pub async fn submit_rating(
    state: &AppState,
    order_id: u64,
    stars: u8,
    comment: &str,
) -> Result<(), AppError> {
    if !(1..=5).contains(&stars) {
        return Err(AppError::BadRequest(
            "stars must be between 1 and 5".to_string(),
        ));
    }

    state.gates.begin_submission(order_id)?;

    let result = state.orders_api.submit_rating(order_id, stars, comment).await;
    let success = result.is_ok();
    state.gates.finish_submission(order_id, success);
    state
        .metrics
        .rating_submissions_total
        .with_label_values(&[if success { "success" } else { "error" }])
        .inc();
    result?;

    info!(order_id, stars, "rating submitted");

    if let Err(err) = reload_snapshot(state).await {
        warn!(order_id, error = %err, "snapshot reload after rating failed");
    }

    Ok(())
}

/// Per-second pass over the snapshot: re-classifies every order against the
/// moving clock and wakes the session supervisor when one crosses a schedule
/// boundary (active → missed, or a reload shifted tabs).
pub async fn run_countdown_loop(
    state: Arc<AppState>,
    mut ticks: broadcast::Receiver<DateTime<Utc>>,
) {
    info!("countdown loop started");
    let mut last: HashMap<u64, Tab> = HashMap::new();

    loop {
        let now = match ticks.recv().await {
            Ok(now) => now,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let snapshot = state.store.snapshot().await;
        let mut changed = false;
        let mut current = HashMap::with_capacity(snapshot.len());

        for order in snapshot.iter() {
            let tab = classify(order, now);
            if let Some(previous) = last.get(&order.id)
                && *previous != tab
            {
                info!(order_id = order.id, from = ?previous, to = ?tab, "order changed tab");
                changed = true;
            }
            current.insert(order.id, tab);
        }

        last = current;
        if changed {
            state.resync.notify_one();
        }
    }

    warn!("countdown loop stopped: tick channel closed");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::models::location::GeoPoint;
    use crate::models::order::{Order, PaymentStatus};
    use crate::orders::OrderApi;
    use crate::tracking::gate::GateState;

    fn order(id: u64, status: OrderStatus, need_delivery: bool, is_rated: bool) -> Order {
        Order {
            id,
            status,
            scheduled_delivery: Some((Utc::now() + ChronoDuration::hours(3)).to_rfc3339()),
            need_delivery,
            customer_location: GeoPoint { lat: 9.03, lng: 38.74 },
            items: vec![],
            total: 250.0,
            payment_status: PaymentStatus::FullyPaid,
            delivery_person: None,
            rating: None,
            is_rated,
            created_at: Utc::now(),
        }
    }

    struct FakeOrderApi {
        orders: Mutex<Vec<Order>>,
        fetch_failures: AtomicU32,
        fetch_calls: AtomicU32,
        confirm_result: OrderStatus,
    }

    impl FakeOrderApi {
        fn new(orders: Vec<Order>) -> Self {
            Self {
                orders: Mutex::new(orders),
                fetch_failures: AtomicU32::new(0),
                fetch_calls: AtomicU32::new(0),
                confirm_result: OrderStatus::Delivered,
            }
        }

        fn failing_first(orders: Vec<Order>, failures: u32) -> Self {
            let api = Self::new(orders);
            api.fetch_failures.store(failures, Ordering::SeqCst);
            api
        }
    }

    #[async_trait]
    impl OrderApi for FakeOrderApi {
        async fn fetch_history(&self) -> Result<Vec<Order>, AppError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.fetch_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fetch_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(AppError::Api("history unavailable".to_string()));
            }
            Ok(self.orders.lock().unwrap().clone())
        }

        async fn confirm_delivery(&self, order_id: u64) -> Result<OrderStatus, AppError> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders
                .iter_mut()
                .find(|o| o.id == order_id)
                .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;
            order.status = self.confirm_result;
            Ok(self.confirm_result)
        }

        async fn submit_rating(
            &self,
            order_id: u64,
            stars: u8,
            comment: &str,
        ) -> Result<(), AppError> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders
                .iter_mut()
                .find(|o| o.id == order_id)
                .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;
            order.is_rated = true;
            order.rating = Some(crate::models::order::Rating {
                stars,
                comment: comment.to_string(),
            });
            Ok(())
        }
    }

    fn state_with(api: FakeOrderApi) -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::new(api),
            16,
            2,
            Duration::from_millis(1),
        ))
    }

    #[tokio::test]
    async fn reload_retries_then_succeeds() {
        let api = FakeOrderApi::failing_first(vec![order(1, OrderStatus::Pending, true, false)], 1);
        let state = state_with(api);

        reload_snapshot(&state).await.unwrap();
        assert_eq!(state.store.count().await, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_keep_previous_snapshot() {
        let failing = state_with(FakeOrderApi::failing_first(vec![], 10));
        failing
            .store
            .replace(vec![order(7, OrderStatus::Pending, true, false)])
            .await;

        assert!(reload_snapshot(&failing).await.is_err());
        assert_eq!(failing.store.count().await, 1);
        assert!(failing.store.get(7).await.is_some());
    }

    #[tokio::test]
    async fn confirm_opens_gate_and_reloads() {
        let state = state_with(FakeOrderApi::new(vec![order(
            41,
            OrderStatus::InTransit,
            true,
            false,
        )]));
        reload_snapshot(&state).await.unwrap();

        let opened = confirm_delivery(&state, 41).await.unwrap();
        assert!(opened);
        assert_eq!(state.gates.state(41), GateState::Open);

        let reloaded = state.store.get(41).await.unwrap();
        assert_eq!(reloaded.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn confirm_is_refused_for_wrong_status() {
        let state = state_with(FakeOrderApi::new(vec![order(
            41,
            OrderStatus::Pending,
            true,
            false,
        )]));
        reload_snapshot(&state).await.unwrap();

        assert!(matches!(
            confirm_delivery(&state, 41).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn confirm_unknown_order_is_not_found() {
        let state = state_with(FakeOrderApi::new(vec![]));
        assert!(matches!(
            confirm_delivery(&state, 99).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn self_pickup_confirms_from_pending() {
        let state = state_with(FakeOrderApi::new(vec![order(
            8,
            OrderStatus::Pending,
            false,
            false,
        )]));
        reload_snapshot(&state).await.unwrap();

        let opened = confirm_delivery(&state, 8).await.unwrap();
        assert!(opened);
    }

    #[tokio::test]
    async fn rating_flows_through_gate_and_marks_order() {
        let state = state_with(FakeOrderApi::new(vec![order(
            41,
            OrderStatus::InTransit,
            true,
            false,
        )]));
        reload_snapshot(&state).await.unwrap();
        confirm_delivery(&state, 41).await.unwrap();

        submit_rating(&state, 41, 4, "fast").await.unwrap();
        assert_eq!(state.gates.state(41), GateState::Submitted);

        let reloaded = state.store.get(41).await.unwrap();
        assert!(reloaded.is_rated);
        assert_eq!(reloaded.rating.unwrap().stars, 4);

        // Never reopens, even across subsequent reloads.
        reload_snapshot(&state).await.unwrap();
        assert!(!state.gates.open(41, state.store.get(41).await.unwrap().is_rated));
        assert!(matches!(
            submit_rating(&state, 41, 5, "again").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn rating_stars_are_validated() {
        let state = state_with(FakeOrderApi::new(vec![]));
        assert!(matches!(
            submit_rating(&state, 1, 0, "").await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            submit_rating(&state, 1, 6, "").await,
            Err(AppError::BadRequest(_))
        ));
    }
}
