//! Invoice authorization orchestrator.
//!
//! Drives one invoice through the full sequence: validate inputs, resolve the
//! point of sale and client, ensure a valid access ticket, fetch the next
//! official number, compute the tax breakdown, request the CAE, and persist
//! the conclusive record. Numbering is a read-then-increment against a counter
//! owned by the authority, so the numbering and submission steps run under a
//! per-(point of sale, kind) mutex rather than retrying on conflict.

use anyhow::anyhow;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{CreateInvoiceRequest, InlineClientDetails};
use crate::models::{
    AuthorizationStatus, Client, CreateInvoiceRecord, CreateLineItem, Invoice, InvoiceKind,
    NewClient, UpdateClientDetails,
};
use crate::services::afip::{
    AfipClient, AuthorizationOutcome, AuthorizationRequest, TicketManager, WireTaxLine,
};
use crate::services::metrics::INVOICES_AUTHORIZED_TOTAL;
use crate::services::store::InvoiceStore;
use crate::services::tax;

/// Accepted drift between declared totals and the computed breakdown, one
/// currency minor unit.
fn tolerance() -> Decimal {
    Decimal::new(1, 2)
}

pub struct InvoiceAuthorizer {
    store: Arc<dyn InvoiceStore>,
    afip: Arc<AfipClient>,
    tickets: Arc<TicketManager>,
    /// One lock per (point of sale, kind): two concurrent authorizations for
    /// the same pair would otherwise read the same last number and submit the
    /// same candidate.
    numbering_locks: DashMap<(Uuid, i16), Arc<Mutex<()>>>,
    default_vat_rate: Decimal,
}

impl InvoiceAuthorizer {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        afip: Arc<AfipClient>,
        tickets: Arc<TicketManager>,
        default_vat_rate: Decimal,
    ) -> Self {
        Self {
            store,
            afip,
            tickets,
            numbering_locks: DashMap::new(),
            default_vat_rate,
        }
    }

    /// Authorize and persist one invoice. A fiscal rejection is a valid
    /// terminal outcome and comes back as a persisted rejected invoice; errors
    /// mean no conclusive answer was reached and nothing was persisted.
    pub async fn authorize(&self, request: CreateInvoiceRequest) -> Result<Invoice, AppError> {
        request.validate()?;

        let kind = InvoiceKind::from_code(request.kind_code).ok_or_else(|| {
            AppError::BadRequest(anyhow!("Unknown invoice kind code {}", request.kind_code))
        })?;

        let point_of_sale = self
            .store
            .get_point_of_sale(request.point_of_sale_id)
            .await?
            .ok_or_else(|| AppError::BadRequest(anyhow!("Point of sale not found")))?;

        if !Path::new(&point_of_sale.certificate_path).exists()
            || !Path::new(&point_of_sale.private_key_path).exists()
        {
            return Err(AppError::BadRequest(anyhow!(
                "Credential files not configured for point of sale {}",
                point_of_sale.number
            )));
        }
        let issuer = point_of_sale.issuer();

        let client = self.resolve_client(&request).await?;
        let document_number = numeric_document(&client)?;

        let (items, tax_lines) = self.compute_breakdown(&request)?;

        let ticket = self.tickets.ensure_valid_ticket(&issuer).await?;

        let lock = self
            .numbering_locks
            .entry((point_of_sale.point_of_sale_id, kind.code()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;

        let last_number = self
            .afip
            .last_authorized_number(&ticket, &issuer, point_of_sale.number, kind)
            .await?;
        let number = last_number + 1;

        tracing::info!(
            point_of_sale = point_of_sale.number,
            kind = kind.as_str(),
            number = number,
            "requesting authorization"
        );

        let outcome = self
            .afip
            .request_authorization(
                &ticket,
                &issuer,
                &AuthorizationRequest {
                    point_of_sale: point_of_sale.number,
                    kind_code: kind.code(),
                    number,
                    issue_date: Utc::now().date_naive(),
                    document_type: client.document_type,
                    document_number,
                    net_total: request.net_total,
                    tax_total: request.tax_total,
                    total: request.total,
                    tax_lines,
                },
            )
            .await?;

        drop(guard);

        let record = build_record(&point_of_sale.point_of_sale_id, &client, kind, number, &request, &outcome);
        let result_label = record.status.as_str();

        let invoice = match self.store.insert_invoice(&record, &items).await {
            Ok(invoice) => invoice,
            Err(err) => {
                // The authority already consumed the number; losing the local
                // record here requires manual reconciliation, so the CAE must
                // reach the log before the error propagates.
                if let AuthorizationOutcome::Approved { cae, .. } = &outcome {
                    tracing::error!(
                        point_of_sale = point_of_sale.number,
                        kind = kind.as_str(),
                        number = number,
                        cae = %cae,
                        "invoice approved by authority but local persistence failed"
                    );
                }
                return Err(err);
            }
        };

        INVOICES_AUTHORIZED_TOTAL
            .with_label_values(&[result_label])
            .inc();

        Ok(invoice)
    }

    /// Explicit client reference wins; otherwise find-or-create from inline
    /// details, refreshing mutable fields on an existing match.
    async fn resolve_client(&self, request: &CreateInvoiceRequest) -> Result<Client, AppError> {
        if let Some(client_id) = request.client_id {
            return self
                .store
                .get_client(client_id)
                .await?
                .ok_or_else(|| AppError::BadRequest(anyhow!("Client not found")));
        }

        let details = request.client.as_ref().ok_or_else(|| {
            AppError::BadRequest(anyhow!(
                "Either client_id or inline client details are required"
            ))
        })?;

        match self
            .store
            .find_client_by_document(&details.document_number)
            .await?
        {
            Some(existing) => {
                self.store
                    .update_client_details(existing.client_id, &update_from(details))
                    .await
            }
            None => {
                self.store
                    .create_client(&NewClient {
                        name: details.name.clone(),
                        document_type: details.document_type.unwrap_or(80),
                        document_number: details.document_number.clone(),
                        address: details.address.clone(),
                        email: details.email.clone(),
                        vat_condition: details.vat_condition.clone(),
                    })
                    .await
            }
        }
    }

    /// Per-line VAT breakdown plus reconciliation of declared totals against
    /// the computed sums.
    fn compute_breakdown(
        &self,
        request: &CreateInvoiceRequest,
    ) -> Result<(Vec<CreateLineItem>, Vec<WireTaxLine>), AppError> {
        let mut items = Vec::with_capacity(request.items.len());
        let mut by_rate: BTreeMap<Decimal, (Decimal, Decimal)> = BTreeMap::new();
        let mut net_sum = Decimal::ZERO;
        let mut tax_sum = Decimal::ZERO;
        let mut subtotal_sum = Decimal::ZERO;

        for item in &request.items {
            let rate = item.vat_rate.unwrap_or(self.default_vat_rate);
            let breakdown = tax::split_inclusive(item.subtotal, rate);

            net_sum += breakdown.net;
            tax_sum += breakdown.tax;
            subtotal_sum += item.subtotal;

            let bucket = by_rate.entry(rate).or_insert((Decimal::ZERO, Decimal::ZERO));
            bucket.0 += breakdown.net;
            bucket.1 += breakdown.tax;

            items.push(CreateLineItem {
                product_id: item.product_id,
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                vat_rate: rate,
                subtotal: item.subtotal,
            });
        }

        let reconciled = (net_sum - request.net_total).abs() <= tolerance()
            && (tax_sum - request.tax_total).abs() <= tolerance()
            && (subtotal_sum - request.total).abs() <= tolerance();
        if !reconciled {
            return Err(AppError::BadRequest(anyhow!(
                "Declared totals do not reconcile with the computed tax breakdown \
                 (computed net {:.2}, tax {:.2}, total {:.2})",
                net_sum,
                tax_sum,
                subtotal_sum
            )));
        }

        let tax_lines = by_rate
            .into_iter()
            .map(|(rate, (base, amount))| WireTaxLine { rate, base, amount })
            .collect();

        Ok((items, tax_lines))
    }
}

fn update_from(details: &InlineClientDetails) -> UpdateClientDetails {
    UpdateClientDetails {
        name: Some(details.name.clone()),
        address: details.address.clone(),
        email: details.email.clone(),
        vat_condition: details.vat_condition.clone(),
    }
}

/// The authority takes the recipient document as a number.
fn numeric_document(client: &Client) -> Result<i64, AppError> {
    let digits: String = client
        .document_number
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest(anyhow!("Client document number is not numeric")))
}

fn build_record(
    point_of_sale_id: &Uuid,
    client: &Client,
    kind: InvoiceKind,
    number: i64,
    request: &CreateInvoiceRequest,
    outcome: &AuthorizationOutcome,
) -> CreateInvoiceRecord {
    let (status, cae, cae_due, observations, rejection_reasons) = match outcome {
        AuthorizationOutcome::Approved {
            cae,
            cae_due,
            observations,
        } => (
            AuthorizationStatus::Approved,
            Some(cae.clone()),
            Some(*cae_due),
            join_nonempty(observations),
            None,
        ),
        AuthorizationOutcome::Rejected {
            reasons,
            observations,
        } => (
            AuthorizationStatus::Rejected,
            None,
            None,
            join_nonempty(observations),
            Some(reasons.clone()),
        ),
    };

    CreateInvoiceRecord {
        point_of_sale_id: *point_of_sale_id,
        client_id: client.client_id,
        kind_code: kind.code(),
        number,
        issued_utc: Utc::now(),
        net_total: request.net_total,
        tax_total: request.tax_total,
        total: request.total,
        status,
        cae,
        cae_due,
        observations,
        rejection_reasons,
    }
}

fn join_nonempty(parts: &[String]) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}
