//! Product catalog model. Products act as line-item templates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub code: Option<String>,
    pub description: String,
    pub unit_price: Decimal,
    /// VAT rate in percent (21.0, 10.5, 0.0, ...).
    pub vat_rate: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub code: Option<String>,
    pub description: String,
    pub unit_price: Decimal,
    pub vat_rate: Decimal,
}
