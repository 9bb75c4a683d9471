//! Client (invoice recipient) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub client_id: Uuid,
    pub name: String,
    /// AFIP document type code: 80 = CUIT, 96 = DNI, 99 = consumidor final.
    pub document_type: i32,
    pub document_number: String,
    pub address: Option<String>,
    pub email: Option<String>,
    /// VAT condition, e.g. "Responsable Inscripto", "Monotributo".
    pub vat_condition: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a client.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub name: String,
    pub document_type: i32,
    pub document_number: String,
    pub address: Option<String>,
    pub email: Option<String>,
    pub vat_condition: Option<String>,
}

/// Mutable client fields refreshed when inline details match an existing row.
#[derive(Debug, Clone, Default)]
pub struct UpdateClientDetails {
    pub name: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub vat_condition: Option<String>,
}
