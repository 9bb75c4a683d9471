//! Request and response shapes for the HTTP API.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Invoice, LineItem, PointOfSale};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub point_of_sale_id: Uuid,
    /// Document kind wire code: 1 (Factura A), 6 (Factura B), 11 (Factura C).
    pub kind_code: i16,
    /// Reference to an existing client. Takes precedence over `client`.
    pub client_id: Option<Uuid>,
    #[validate(nested)]
    pub client: Option<InlineClientDetails>,
    #[validate(length(min = 1, message = "At least one line item is required"), nested)]
    pub items: Vec<LineItemInput>,
    /// Declared totals, reconciled server-side against the per-line breakdown.
    pub net_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
}

/// Client details supplied inline on an invoice. Matched against existing
/// clients by document number.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InlineClientDetails {
    #[validate(length(min = 1, message = "Client name is required"))]
    pub name: String,
    /// Document type code, 80 (CUIT) when omitted.
    pub document_type: Option<i32>,
    #[validate(length(min = 1, message = "Client document number is required"))]
    pub document_number: String,
    pub address: Option<String>,
    #[validate(email(message = "Invalid client email"))]
    pub email: Option<String>,
    pub vat_condition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LineItemInput {
    pub product_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Line item description is required"))]
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Rate in percent. Service default applies when omitted.
    pub vat_rate: Option<Decimal>,
    /// VAT-inclusive line subtotal.
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub invoice_id: Uuid,
    pub point_of_sale_id: Uuid,
    pub client_id: Uuid,
    pub kind_code: i16,
    pub number: i64,
    pub issued_utc: DateTime<Utc>,
    pub net_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub status: String,
    pub cae: Option<String>,
    pub cae_due: Option<NaiveDate>,
    pub observations: Option<String>,
    pub rejection_reasons: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            invoice_id: invoice.invoice_id,
            point_of_sale_id: invoice.point_of_sale_id,
            client_id: invoice.client_id,
            kind_code: invoice.kind_code,
            number: invoice.number,
            issued_utc: invoice.issued_utc,
            net_total: invoice.net_total,
            tax_total: invoice.tax_total,
            total: invoice.total,
            status: invoice.status,
            cae: invoice.cae,
            cae_due: invoice.cae_due,
            observations: invoice.observations,
            rejection_reasons: invoice.rejection_reasons,
            created_utc: invoice.created_utc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceDetailResponse {
    #[serde(flatten)]
    pub invoice: InvoiceResponse,
    pub items: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Point of sale view without the credential file paths.
#[derive(Debug, Serialize)]
pub struct PointOfSaleResponse {
    pub point_of_sale_id: Uuid,
    pub number: i32,
    pub name: Option<String>,
    pub cuit: String,
    pub production: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<PointOfSale> for PointOfSaleResponse {
    fn from(pos: PointOfSale) -> Self {
        Self {
            point_of_sale_id: pos.point_of_sale_id,
            number: pos.number,
            name: pos.name,
            cuit: pos.cuit,
            production: pos.production,
            created_utc: pos.created_utc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TestConnectionResponse {
    pub status: String,
    pub ticket_expires_at: DateTime<Utc>,
    /// Last Factura C number the authority reports for this point of sale.
    pub last_factura_c_number: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    pub code: Option<String>,
    #[validate(length(min = 1, message = "Product description is required"))]
    pub description: String,
    pub unit_price: Decimal,
    /// Rate in percent. Service default applies when omitted.
    pub vat_rate: Option<Decimal>,
}
