//! Data models for fiscal-service.

pub mod client;
pub mod invoice;
pub mod line_item;
pub mod point_of_sale;
pub mod product;

pub use client::{Client, NewClient, UpdateClientDetails};
pub use invoice::{AuthorizationStatus, CreateInvoiceRecord, Invoice, InvoiceKind};
pub use line_item::{CreateLineItem, LineItem};
pub use point_of_sale::{NewPointOfSale, PointOfSale};
pub use product::{NewProduct, Product};
