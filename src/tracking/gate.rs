use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::AppError;
use crate::models::order::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Closed,
    Open,
    Submitting,
    Submitted,
}

/// At-most-one rating per order. Keyed by order id so the state survives
/// wholesale replacement of the order list, and `Submitted` is absorbing:
/// once an order is rated the collector never reopens for it.
pub struct RatingGates {
    gates: DashMap<u64, GateState>,
}

impl RatingGates {
    pub fn new() -> Self {
        Self {
            gates: DashMap::new(),
        }
    }

    pub fn state(&self, order_id: u64) -> GateState {
        self.gates
            .get(&order_id)
            .map(|entry| *entry)
            .unwrap_or(GateState::Closed)
    }

    /// Opens the collector for an order. Returns true only the first time;
    /// an already-rated order is pinned to `Submitted` instead.
    pub fn open(&self, order_id: u64, is_rated: bool) -> bool {
        if is_rated {
            self.gates.insert(order_id, GateState::Submitted);
            return false;
        }

        match self.gates.entry(order_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(GateState::Open);
                true
            }
        }
    }

    /// Moves an open collector to `Submitting`. Submission is refused, not
    /// silently dropped, while one is already in flight.
    pub fn begin_submission(&self, order_id: u64) -> Result<(), AppError> {
        let mut entry = self.gates.entry(order_id).or_insert(GateState::Closed);
        match *entry {
            GateState::Open => {
                *entry = GateState::Submitting;
                Ok(())
            }
            GateState::Submitting => Err(AppError::Conflict(format!(
                "rating for order {order_id} is already being submitted"
            ))),
            GateState::Submitted => Err(AppError::Conflict(format!(
                "order {order_id} is already rated"
            ))),
            GateState::Closed => Err(AppError::Conflict(format!(
                "rating collector is not open for order {order_id}"
            ))),
        }
    }

    pub fn finish_submission(&self, order_id: u64, success: bool) {
        let next = if success {
            GateState::Submitted
        } else {
            GateState::Open
        };
        self.gates.insert(order_id, next);
    }

    /// Re-pins gates from a fresh snapshot; the server is the source of truth
    /// for `is_rated`.
    pub fn sync(&self, orders: &[Order]) {
        for order in orders {
            if order.is_rated {
                self.gates.insert(order.id, GateState::Submitted);
            }
        }
    }
}

impl Default for RatingGates {
    fn default() -> Self {
        Self::new()
    }
}
