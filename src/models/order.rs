use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Prepared,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// The two client-initiated transitions: confirm-delivery from InTransit
    /// for delivery orders, or from Pending for self-pickup orders. Every
    /// other transition belongs to the server.
    pub fn can_confirm(self, need_delivery: bool) -> bool {
        match self {
            OrderStatus::InTransit => need_delivery,
            OrderStatus::Pending => !need_delivery,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    PartialPayment,
    FullyPaid,
    OnDelivery,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub stars: u8,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPerson {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub status: OrderStatus,
    /// Raw wire value; parsed lazily so an unparsable timestamp degrades to
    /// "no schedule" instead of failing deserialization of the whole history.
    #[serde(default)]
    pub scheduled_delivery: Option<String>,
    pub need_delivery: bool,
    pub customer_location: GeoPoint,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub delivery_person: Option<DeliveryPerson>,
    #[serde(default)]
    pub rating: Option<Rating>,
    #[serde(default)]
    pub is_rated: bool,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.scheduled_delivery.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc))
    }
}
