pub mod afip;
pub mod authorizer;
pub mod database;
pub mod metrics;
pub mod store;
pub mod tax;

pub use authorizer::InvoiceAuthorizer;
pub use database::Database;
pub use store::InvoiceStore;
