use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::classify::{Tab, classify};
use crate::models::order::{Order, OrderStatus};

pub const MS_PER_DAY: i64 = 86_400_000;
pub const MS_PER_HOUR: i64 = 3_600_000;
pub const MS_PER_MINUTE: i64 = 60_000;
pub const MS_PER_SECOND: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountdownState {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

/// Derived every tick, never stored. `Delivered` is terminal: once an order
/// reaches it the countdown is suspended permanently for that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CountdownDisplay {
    Counting {
        #[serde(flatten)]
        left: CountdownState,
        severity: Severity,
    },
    Delayed {
        days_overdue: i64,
    },
    Delivered,
}

impl CountdownDisplay {
    pub fn severity(&self) -> Severity {
        match self {
            CountdownDisplay::Counting { severity, .. } => *severity,
            CountdownDisplay::Delayed { .. } => Severity::Error,
            CountdownDisplay::Delivered => Severity::Success,
        }
    }
}

impl fmt::Display for CountdownDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountdownDisplay::Counting { left, .. } => write!(
                f,
                "{}d {}h {}m {}s",
                left.days, left.hours, left.minutes, left.seconds
            ),
            CountdownDisplay::Delayed { days_overdue } => write!(
                f,
                "{days_overdue} day{} overdue",
                if *days_overdue == 1 { "" } else { "s" }
            ),
            CountdownDisplay::Delivered => write!(f, "Delivered"),
        }
    }
}

/// Remaining-or-overdue breakdown for a scheduled instant. Overdue rounds up
/// to whole days; remaining time decomposes by successive remainders.
pub fn countdown(scheduled: DateTime<Utc>, now: DateTime<Utc>) -> CountdownDisplay {
    let diff = scheduled.signed_duration_since(now).num_milliseconds();

    if diff < 0 {
        let days_overdue = (-diff + MS_PER_DAY - 1) / MS_PER_DAY;
        return CountdownDisplay::Delayed { days_overdue };
    }

    let days = diff / MS_PER_DAY;
    let rem = diff % MS_PER_DAY;
    let hours = rem / MS_PER_HOUR;
    let rem = rem % MS_PER_HOUR;
    let minutes = rem / MS_PER_MINUTE;
    let seconds = (rem % MS_PER_MINUTE) / MS_PER_SECOND;

    let severity = if days == 0 && hours < 2 {
        Severity::Warning
    } else {
        Severity::Success
    };

    CountdownDisplay::Counting {
        left: CountdownState {
            days,
            hours,
            minutes,
            seconds,
        },
        severity,
    }
}

/// Countdown for one order; `None` means the order has no valid schedule and
/// is simply skipped by the ticking views.
pub fn order_countdown(order: &Order, now: DateTime<Utc>) -> Option<CountdownDisplay> {
    if order.status == OrderStatus::Delivered {
        return Some(CountdownDisplay::Delivered);
    }
    order.scheduled_at().map(|scheduled| countdown(scheduled, now))
}

/// One line for the order card strip: past orders show a date, active ones a
/// ticking countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleSummary {
    Delivered { date: String },
    Missed { scheduled_for: String },
    Counting { countdown: CountdownDisplay },
}

impl fmt::Display for ScheduleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleSummary::Delivered { date } => write!(f, "Delivered on {date}"),
            ScheduleSummary::Missed { scheduled_for } => {
                write!(f, "Missed, scheduled for {scheduled_for}")
            }
            ScheduleSummary::Counting { countdown } => countdown.fmt(f),
        }
    }
}

fn card_date(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// Card strip for one order; the single consolidated call site for the date
/// comparison. Delivered shows the delivery date (falling back to the order
/// date when the schedule never parsed), missed shows the blown schedule,
/// active orders get the live countdown. `None` means the card has no time
/// line at all.
pub fn summary(order: &Order, now: DateTime<Utc>) -> Option<ScheduleSummary> {
    match classify(order, now) {
        Tab::Completed => Some(ScheduleSummary::Delivered {
            date: card_date(order.scheduled_at().unwrap_or(order.created_at)),
        }),
        Tab::Missed => Some(ScheduleSummary::Missed {
            scheduled_for: card_date(order.scheduled_at()?),
        }),
        Tab::Active => Some(ScheduleSummary::Counting {
            countdown: countdown(order.scheduled_at()?, now),
        }),
        Tab::None => None,
    }
}

/// Free-running per-second clock. Owns the recurring task; dropping the
/// engine (or calling `shutdown`) aborts it deterministically.
pub struct CountdownEngine {
    tick_tx: broadcast::Sender<DateTime<Utc>>,
    handle: JoinHandle<()>,
}

impl CountdownEngine {
    pub fn start(interval: Duration) -> Self {
        let (tick_tx, _unused_rx) = broadcast::channel(8);
        let tx = tick_tx.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let _ = tx.send(Utc::now());
            }
        });

        Self { tick_tx, handle }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DateTime<Utc>> {
        self.tick_tx.subscribe()
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for CountdownEngine {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::models::location::GeoPoint;
    use crate::models::order::PaymentStatus;

    fn order(status: OrderStatus, schedule: Option<String>) -> Order {
        Order {
            id: 7,
            status,
            scheduled_delivery: schedule,
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

    #[test]
    fn ninety_minutes_out_is_a_warning() {
        let now = Utc::now();
        let display = countdown(now + ChronoDuration::minutes(90), now);
        assert_eq!(
            display,
            CountdownDisplay::Counting {
                left: CountdownState {
                    days: 0,
                    hours: 1,
                    minutes: 30,
                    seconds: 0,
                },
                severity: Severity::Warning,
            }
        );
    }

    #[test]
    fn three_hours_out_is_success() {
        let now = Utc::now();
        let display = countdown(now + ChronoDuration::hours(3), now);
        assert_eq!(display.severity(), Severity::Success);
    }

    #[test]
    fn twenty_five_hours_late_rounds_up_to_two_days() {
        let now = Utc::now();
        let display = countdown(now - ChronoDuration::hours(25), now);
        assert_eq!(display, CountdownDisplay::Delayed { days_overdue: 2 });
        assert_eq!(display.severity(), Severity::Error);
        assert_eq!(display.to_string(), "2 days overdue");
    }

    #[test]
    fn one_hour_late_is_one_day_overdue() {
        let now = Utc::now();
        let display = countdown(now - ChronoDuration::hours(1), now);
        assert_eq!(display, CountdownDisplay::Delayed { days_overdue: 1 });
        assert_eq!(display.to_string(), "1 day overdue");
    }

    #[test]
    fn delivered_order_is_terminal() {
        let now = Utc::now();
        let o = order(
            OrderStatus::Delivered,
            Some((now - ChronoDuration::days(3)).to_rfc3339()),
        );
        assert_eq!(order_countdown(&o, now), Some(CountdownDisplay::Delivered));
    }

    #[test]
    fn order_without_valid_schedule_is_skipped() {
        let now = Utc::now();
        assert_eq!(order_countdown(&order(OrderStatus::Pending, None), now), None);
        assert_eq!(
            order_countdown(&order(OrderStatus::InTransit, Some("soon".to_string())), now),
            None
        );
    }

    #[test]
    fn summary_shows_delivery_date_for_completed_orders() {
        let now = Utc::now();
        let o = order(
            OrderStatus::Delivered,
            Some("2026-08-12T09:00:00+00:00".to_string()),
        );
        let line = summary(&o, now).unwrap();
        assert_eq!(
            line,
            ScheduleSummary::Delivered {
                date: "2026-08-12".to_string(),
            }
        );
        assert_eq!(line.to_string(), "Delivered on 2026-08-12");
    }

    #[test]
    fn summary_for_delivered_order_without_schedule_uses_order_date() {
        let now = Utc::now();
        let o = order(OrderStatus::Delivered, None);
        let expected = o.created_at.format("%Y-%m-%d").to_string();
        assert_eq!(
            summary(&o, now).unwrap(),
            ScheduleSummary::Delivered { date: expected }
        );
    }

    #[test]
    fn summary_shows_blown_schedule_for_missed_orders() {
        let now = Utc::now();
        let scheduled = now - ChronoDuration::days(2);
        let o = order(OrderStatus::InTransit, Some(scheduled.to_rfc3339()));
        let line = summary(&o, now).unwrap();
        assert_eq!(
            line,
            ScheduleSummary::Missed {
                scheduled_for: scheduled.format("%Y-%m-%d").to_string(),
            }
        );
        assert!(line.to_string().starts_with("Missed, scheduled for "));
    }

    #[test]
    fn summary_counts_down_for_active_orders() {
        let now = Utc::now();
        let o = order(
            OrderStatus::InTransit,
            Some((now + ChronoDuration::minutes(90)).to_rfc3339()),
        );
        match summary(&o, now).unwrap() {
            ScheduleSummary::Counting { countdown } => {
                assert_eq!(countdown.severity(), Severity::Warning);
            }
            other => panic!("expected a live countdown, got {other:?}"),
        }
    }

    #[test]
    fn summary_is_absent_without_a_usable_schedule() {
        let now = Utc::now();
        assert_eq!(summary(&order(OrderStatus::Pending, None), now), None);
        assert_eq!(
            summary(&order(OrderStatus::InTransit, Some("soon".to_string())), now),
            None
        );
    }

    #[tokio::test]
    async fn engine_broadcasts_ticks_until_dropped() {
        let engine = CountdownEngine::start(Duration::from_millis(5));
        let mut ticks = engine.subscribe();
        ticks.recv().await.unwrap();
        ticks.recv().await.unwrap();
        drop(engine);

        loop {
            match ticks.recv().await {
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
