//! Invoice endpoints.
//!
//! Creation goes through the authorization orchestrator, so a successful
//! response always carries a conclusive authority outcome, approved or
//! rejected.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{CreateInvoiceRequest, InvoiceDetailResponse, InvoiceResponse, ListQuery};
use crate::AppState;

pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    let invoice = state.authorizer.authorize(payload).await?;

    tracing::info!(
        invoice_id = %invoice.invoice_id,
        number = invoice.number,
        status = %invoice.status,
        "Invoice recorded"
    );

    Ok((StatusCode::CREATED, Json(InvoiceResponse::from(invoice))))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);

    let invoices = state.db.list_invoices(limit, offset).await?;
    Ok(Json(invoices.into_iter().map(InvoiceResponse::from).collect()))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetailResponse>, AppError> {
    let invoice = state
        .db
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    let items = state.db.list_invoice_items(invoice_id).await?;

    Ok(Json(InvoiceDetailResponse {
        invoice: InvoiceResponse::from(invoice),
        items,
    }))
}
