//! Transport seam for the two authority services.
//!
//! Implementations own the wire encoding. The response shape contract is what
//! matters here: login yields three named fields (possibly still wrapped in
//! escaped markup), invoice submission yields an approved/rejected verdict
//! with code/expiry or reasons.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::Environment;

/// Login response as delivered by the transport layer.
#[derive(Debug, Clone)]
pub enum LoginResponse {
    /// The transport already decoded the ticket fields.
    Decoded {
        token: String,
        sign: String,
        expiration: String,
    },
    /// Raw payload; the client extracts the fields itself. This is the
    /// fallback path for transports that fail to decode their own response.
    Raw(String),
}

/// Authenticated call header for WSFEv1 operations.
#[derive(Debug, Clone)]
pub struct WireCredentials {
    pub token: String,
    pub sign: String,
    pub cuit: String,
}

/// One VAT bucket of the invoice being submitted.
#[derive(Debug, Clone)]
pub struct WireTaxLine {
    /// Rate in percent.
    pub rate: Decimal,
    /// Taxable base (net) amount.
    pub base: Decimal,
    /// Tax amount.
    pub amount: Decimal,
}

/// Invoice header + tax breakdown submitted for authorization.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub point_of_sale: i32,
    pub kind_code: i16,
    pub number: i64,
    pub issue_date: NaiveDate,
    pub document_type: i32,
    pub document_number: i64,
    pub net_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub tax_lines: Vec<WireTaxLine>,
}

/// Verdict decoded from the authorization response.
#[derive(Debug, Clone)]
pub struct WireAuthorization {
    /// "A" approved, "R" rejected.
    pub result: String,
    pub cae: Option<String>,
    /// CAE due date in the authority's `%Y%m%d` format.
    pub cae_due: Option<String>,
    pub observations: Vec<String>,
    pub errors: Vec<String>,
}

/// Remote calls against WSAA and WSFEv1. Implementations hold no state about
/// invoices or tickets; retries and caching live above this trait.
#[async_trait]
pub trait AuthorityTransport: Send + Sync {
    /// Submit a signed login request and return the (possibly undecoded)
    /// ticket payload.
    async fn login(&self, env: Environment, signed_request: &[u8]) -> Result<LoginResponse>;

    /// Last invoice number the authority has authorized for the pair.
    async fn last_authorized(
        &self,
        env: Environment,
        credentials: &WireCredentials,
        point_of_sale: i32,
        kind_code: i16,
    ) -> Result<i64>;

    /// Submit an invoice for authorization and decode the verdict. A business
    /// rejection is a normal verdict, not an `Err`.
    async fn submit_invoice(
        &self,
        env: Environment,
        credentials: &WireCredentials,
        request: &AuthorizationRequest,
    ) -> Result<WireAuthorization>;
}
