//! Persistence contract consumed by the authorization orchestrator.

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    Client, CreateInvoiceRecord, CreateLineItem, Invoice, NewClient, PointOfSale,
    UpdateClientDetails,
};

/// Lookup and append operations the orchestrator needs. The invoice write is
/// the only mutation of fiscal state and happens strictly after a conclusive
/// authority outcome.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn get_point_of_sale(&self, id: Uuid) -> Result<Option<PointOfSale>, AppError>;

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, AppError>;

    async fn find_client_by_document(
        &self,
        document_number: &str,
    ) -> Result<Option<Client>, AppError>;

    async fn create_client(&self, input: &NewClient) -> Result<Client, AppError>;

    async fn update_client_details(
        &self,
        id: Uuid,
        update: &UpdateClientDetails,
    ) -> Result<Client, AppError>;

    /// Append the invoice header and all its line items as one unit: both
    /// durable together, or neither.
    async fn insert_invoice(
        &self,
        record: &CreateInvoiceRecord,
        items: &[CreateLineItem],
    ) -> Result<Invoice, AppError>;
}
