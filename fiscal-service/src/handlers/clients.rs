//! Client listing. Clients are created or refreshed through invoice
//! authorization, not through a standalone write endpoint.

use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::models::Client;
use crate::AppState;

pub async fn list_clients(State(state): State<AppState>) -> Result<Json<Vec<Client>>, AppError> {
    let clients = state.db.list_clients().await?;
    Ok(Json(clients))
}
