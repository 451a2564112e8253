use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::order::{Order, OrderStatus};

/// Lifecycle tab an order belongs to at a given instant. Never persisted;
/// always recomputed because "now" moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Active,
    Missed,
    Completed,
    None,
}

/// Single authoritative call site for the schedule comparison. Delivered wins
/// unconditionally; an absent or unparsable schedule puts the order in no tab.
pub fn classify(order: &Order, now: DateTime<Utc>) -> Tab {
    if order.status == OrderStatus::Delivered {
        return Tab::Completed;
    }

    match order.scheduled_at() {
        Some(scheduled) if scheduled >= now => Tab::Active,
        Some(_) => Tab::Missed,
        None => Tab::None,
    }
}

#[derive(Debug, Default)]
pub struct TabView {
    pub active: Vec<Order>,
    pub missed: Vec<Order>,
    pub completed: Vec<Order>,
}

pub fn partition(orders: &[Order], now: DateTime<Utc>) -> TabView {
    let mut view = TabView::default();
    for order in orders {
        match classify(order, now) {
            Tab::Active => view.active.push(order.clone()),
            Tab::Missed => view.missed.push(order.clone()),
            Tab::Completed => view.completed.push(order.clone()),
            Tab::None => {}
        }
    }
    view
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::location::GeoPoint;
    use crate::models::order::PaymentStatus;

    fn order(id: u64, status: OrderStatus, schedule: Option<String>) -> Order {
        Order {
            id,
            status,
            scheduled_delivery: schedule,
            need_delivery: true,
            customer_location: GeoPoint { lat: 9.03, lng: 38.74 },
            items: vec![],
            total: 120.0,
            payment_status: PaymentStatus::FullyPaid,
            delivery_person: None,
            rating: None,
            is_rated: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn delivered_is_completed_regardless_of_schedule() {
        let now = Utc::now();
        let cases = [
            None,
            Some("garbage".to_string()),
            Some((now + Duration::hours(3)).to_rfc3339()),
            Some((now - Duration::hours(3)).to_rfc3339()),
        ];
        for schedule in cases {
            let o = order(1, OrderStatus::Delivered, schedule);
            assert_eq!(classify(&o, now), Tab::Completed);
        }
    }

    #[test]
    fn future_schedule_is_active_past_is_missed() {
        let now = Utc::now();
        let future = order(1, OrderStatus::InTransit, Some((now + Duration::minutes(5)).to_rfc3339()));
        let past = order(2, OrderStatus::Confirmed, Some((now - Duration::minutes(5)).to_rfc3339()));
        assert_eq!(classify(&future, now), Tab::Active);
        assert_eq!(classify(&past, now), Tab::Missed);
    }

    #[test]
    fn schedule_exactly_now_counts_as_active() {
        let now = Utc::now();
        let o = order(1, OrderStatus::Pending, Some(now.to_rfc3339()));
        assert_eq!(classify(&o, now), Tab::Active);
    }

    #[test]
    fn missing_or_unparsable_schedule_lands_in_no_tab() {
        let now = Utc::now();
        let missing = order(1, OrderStatus::Pending, None);
        let garbage = order(2, OrderStatus::InTransit, Some("tomorrow-ish".to_string()));
        assert_eq!(classify(&missing, now), Tab::None);
        assert_eq!(classify(&garbage, now), Tab::None);

        let view = partition(&[missing, garbage], now);
        assert!(view.active.is_empty());
        assert!(view.missed.is_empty());
        assert!(view.completed.is_empty());
    }

    #[test]
    fn partition_fans_orders_into_three_views() {
        let now = Utc::now();
        let orders = vec![
            order(1, OrderStatus::InTransit, Some((now + Duration::hours(1)).to_rfc3339())),
            order(2, OrderStatus::Pending, Some((now - Duration::hours(1)).to_rfc3339())),
            order(3, OrderStatus::Delivered, None),
            order(4, OrderStatus::Pending, None),
        ];
        let view = partition(&orders, now);
        assert_eq!(view.active.len(), 1);
        assert_eq!(view.missed.len(), 1);
        assert_eq!(view.completed.len(), 1);
        assert_eq!(view.active[0].id, 1);
        assert_eq!(view.missed[0].id, 2);
        assert_eq!(view.completed[0].id, 3);
    }
}
