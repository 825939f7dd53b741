//! Domain Entities - Read-model views
//!
//! These are the shapes returned by the data-access capabilities.
//! They carry no behaviour; the write side owns the business rules.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Full public description of a conference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConferenceDetails {
    pub id: Uuid,
    /// Short code used in URLs
    pub code: String,
    pub name: String,
    pub description: String,
    pub location: String,
    pub tagline: String,
    pub twitter_search: String,
    /// Start date as stored by the write side (ISO 8601)
    pub start_date: String,
}

/// Lightweight conference reference used for headers and links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConferenceAlias {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub tagline: String,
}

/// A seat type offered by a published conference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatType {
    pub id: Uuid,
    pub conference_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub available_quantity: i64,
}

/// One priced line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedOrderLine {
    pub position: i64,
    pub description: String,
    pub unit_price: f64,
    pub quantity: i64,
    pub line_total: f64,
}

/// Order with its computed totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedOrder {
    pub order_id: Uuid,
    pub order_version: i64,
    pub total: f64,
    pub lines: Vec<PricedOrderLine>,
    /// Present once seats are reserved (ISO 8601)
    pub reservation_expiration: Option<String>,
    pub is_free_of_charge: bool,
}

/// Payment handled by an external processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThirdPartyProcessorPayment {
    pub id: Uuid,
    pub state: String,
    pub payment_source_id: Uuid,
    pub description: String,
    pub total_amount: f64,
}
