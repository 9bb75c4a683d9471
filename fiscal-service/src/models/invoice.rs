//! Invoice model.
//!
//! An invoice row is only ever written after the authority returned a
//! conclusive outcome: approved rows carry the CAE and its due date, rejected
//! rows carry the rejection reasons. There is no draft state.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Fiscal document kind, with its AFIP wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    FacturaA,
    FacturaB,
    FacturaC,
}

impl InvoiceKind {
    pub fn code(&self) -> i16 {
        match self {
            InvoiceKind::FacturaA => 1,
            InvoiceKind::FacturaB => 6,
            InvoiceKind::FacturaC => 11,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(InvoiceKind::FacturaA),
            6 => Some(InvoiceKind::FacturaB),
            11 => Some(InvoiceKind::FacturaC),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceKind::FacturaA => "factura_a",
            InvoiceKind::FacturaB => "factura_b",
            InvoiceKind::FacturaC => "factura_c",
        }
    }
}

/// Conclusive authority outcome recorded on the invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Approved,
    Rejected,
}

impl AuthorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationStatus::Approved => "approved",
            AuthorizationStatus::Rejected => "rejected",
        }
    }

}

/// Durable invoice record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub point_of_sale_id: Uuid,
    pub client_id: Uuid,
    pub kind_code: i16,
    /// Official number assigned through the authority's sequence.
    pub number: i64,
    pub issued_utc: DateTime<Utc>,
    pub net_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub status: String,
    /// Electronic authorization code, present iff approved.
    pub cae: Option<String>,
    pub cae_due: Option<NaiveDate>,
    pub observations: Option<String>,
    /// Authority rejection reasons, present iff rejected.
    pub rejection_reasons: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

/// Input for persisting an invoice after a conclusive authorization outcome.
#[derive(Debug, Clone)]
pub struct CreateInvoiceRecord {
    pub point_of_sale_id: Uuid,
    pub client_id: Uuid,
    pub kind_code: i16,
    pub number: i64,
    pub issued_utc: DateTime<Utc>,
    pub net_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub status: AuthorizationStatus,
    pub cae: Option<String>,
    pub cae_due: Option<NaiveDate>,
    pub observations: Option<String>,
    pub rejection_reasons: Option<Vec<String>>,
}
