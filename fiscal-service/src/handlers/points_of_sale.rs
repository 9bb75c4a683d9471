//! Point of sale endpoints.
//!
//! Registration takes a multipart form because each point of sale carries its
//! authority-issued certificate and private key, which are stored on disk and
//! referenced by path from the database row.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{PointOfSaleResponse, TestConnectionResponse};
use crate::models::{InvoiceKind, NewPointOfSale};
use crate::services::InvoiceStore;
use crate::AppState;

struct RegistrationForm {
    number: Option<i32>,
    name: Option<String>,
    cuit: Option<String>,
    production: bool,
    certificate: Option<Vec<u8>>,
    private_key: Option<Vec<u8>>,
}

async fn read_form(mut multipart: Multipart) -> Result<RegistrationForm, AppError> {
    let mut form = RegistrationForm {
        number: None,
        name: None,
        cuit: None,
        production: false,
        certificate: None,
        private_key: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid multipart payload: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read field: {}", e)))?;

        match field_name.as_str() {
            "number" => {
                let text = String::from_utf8_lossy(&data);
                form.number = Some(text.trim().parse::<i32>().map_err(|_| {
                    AppError::BadRequest(anyhow::anyhow!("Point of sale number must be an integer"))
                })?);
            }
            "name" => form.name = Some(String::from_utf8_lossy(&data).trim().to_string()),
            "cuit" => form.cuit = Some(String::from_utf8_lossy(&data).trim().to_string()),
            "production" => {
                form.production = matches!(
                    String::from_utf8_lossy(&data).trim(),
                    "true" | "1" | "yes"
                );
            }
            "certificate" => form.certificate = Some(data.to_vec()),
            "private_key" => form.private_key = Some(data.to_vec()),
            _ => {}
        }
    }

    Ok(form)
}

pub async fn create_point_of_sale(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<PointOfSaleResponse>), AppError> {
    let form = read_form(multipart).await?;

    let number = form
        .number
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing field: number")))?;
    let name = form.name.filter(|n| !n.is_empty());
    let cuit = form
        .cuit
        .filter(|c| c.chars().all(|ch| ch.is_ascii_digit()) && !c.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing or invalid field: cuit")))?;
    let certificate = form
        .certificate
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing file: certificate")))?;
    let private_key = form
        .private_key
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing file: private_key")))?;

    let certs_dir = &state.config.afip.certs_dir;
    tokio::fs::create_dir_all(certs_dir).await?;

    let certificate_path = certs_dir.join(format!("{}_{}.crt", cuit, number));
    let private_key_path = certs_dir.join(format!("{}_{}.key", cuit, number));
    tokio::fs::write(&certificate_path, &certificate).await?;
    tokio::fs::write(&private_key_path, &private_key).await?;

    tracing::info!(number = number, cuit = %cuit, production = form.production, "Registering point of sale");

    let pos = state
        .db
        .create_point_of_sale(&NewPointOfSale {
            number,
            name,
            cuit,
            certificate_path: certificate_path.to_string_lossy().into_owned(),
            private_key_path: private_key_path.to_string_lossy().into_owned(),
            production: form.production,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(PointOfSaleResponse::from(pos))))
}

pub async fn list_points_of_sale(
    State(state): State<AppState>,
) -> Result<Json<Vec<PointOfSaleResponse>>, AppError> {
    let rows = state.db.list_points_of_sale().await?;
    Ok(Json(rows.into_iter().map(PointOfSaleResponse::from).collect()))
}

pub async fn delete_point_of_sale(
    State(state): State<AppState>,
    Path(point_of_sale_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let pos = state
        .db
        .delete_point_of_sale(point_of_sale_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Point of sale not found")))?;

    // Credential file cleanup is best effort; the row is already gone.
    if tokio::fs::remove_file(&pos.certificate_path).await.is_err() {
        tracing::warn!(path = %pos.certificate_path, "Could not remove certificate file");
    }
    if tokio::fs::remove_file(&pos.private_key_path).await.is_err() {
        tracing::warn!(path = %pos.private_key_path, "Could not remove private key file");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Run a live round trip against the authority for this point of sale:
/// authenticate (reusing the cached ticket when valid) and ask for the last
/// authorized Factura C number.
pub async fn test_connection(
    State(state): State<AppState>,
    Path(point_of_sale_id): Path<Uuid>,
) -> Result<Json<TestConnectionResponse>, AppError> {
    let pos = state
        .db
        .get_point_of_sale(point_of_sale_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Point of sale not found")))?;

    let issuer = pos.issuer();
    let ticket = state.tickets.ensure_valid_ticket(&issuer).await?;
    let last_number = state
        .afip
        .last_authorized_number(&ticket, &issuer, pos.number, InvoiceKind::FacturaC)
        .await?;

    Ok(Json(TestConnectionResponse {
        status: "connected".to_string(),
        ticket_expires_at: ticket.expires_at,
        last_factura_c_number: last_number,
    }))
}
