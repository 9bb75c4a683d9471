//! Product catalog endpoints.

use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::CreateProductRequest;
use crate::models::{NewProduct, Product};
use crate::AppState;

pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    payload.validate()?;

    let product = state
        .db
        .create_product(&NewProduct {
            code: payload.code,
            description: payload.description,
            unit_price: payload.unit_price,
            vat_rate: payload
                .vat_rate
                .unwrap_or(state.config.afip.default_vat_rate),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = state.db.list_products().await?;
    Ok(Json(products))
}
