//! Invoice line item model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Line item on a persisted invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub line_item_id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Option<Uuid>,
    /// Kept denormalized for history even when a product is referenced.
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_rate: Decimal,
    /// Line subtotal, VAT inclusive.
    pub subtotal: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a line item alongside its invoice.
#[derive(Debug, Clone)]
pub struct CreateLineItem {
    pub product_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_rate: Decimal,
    pub subtotal: Decimal,
}
