//! Database service for fiscal-service.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    Client, CreateInvoiceRecord, CreateLineItem, Invoice, LineItem, NewClient, NewPointOfSale,
    NewProduct, PointOfSale, Product, UpdateClientDetails,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::InvoiceStore;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "fiscal-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Point of Sale Operations
    // -------------------------------------------------------------------------

    /// Register a point of sale.
    #[instrument(skip(self, input), fields(number = input.number))]
    pub async fn create_point_of_sale(
        &self,
        input: &NewPointOfSale,
    ) -> Result<PointOfSale, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_point_of_sale"])
            .start_timer();

        let point_of_sale = sqlx::query_as::<_, PointOfSale>(
            r#"
            INSERT INTO points_of_sale (point_of_sale_id, number, name, cuit, certificate_path, private_key_path, production)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING point_of_sale_id, number, name, cuit, certificate_path, private_key_path, production, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.number)
        .bind(&input.name)
        .bind(&input.cuit)
        .bind(&input.certificate_path)
        .bind(&input.private_key_path)
        .bind(input.production)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Point of sale {} already registered",
                    input.number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create point of sale: {}", e)),
        })?;

        timer.observe_duration();

        info!(
            point_of_sale_id = %point_of_sale.point_of_sale_id,
            number = point_of_sale.number,
            "Point of sale registered"
        );

        Ok(point_of_sale)
    }

    /// List points of sale.
    #[instrument(skip(self))]
    pub async fn list_points_of_sale(&self) -> Result<Vec<PointOfSale>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_points_of_sale"])
            .start_timer();

        let rows = sqlx::query_as::<_, PointOfSale>(
            r#"
            SELECT point_of_sale_id, number, name, cuit, certificate_path, private_key_path, production, created_utc
            FROM points_of_sale
            ORDER BY number
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list points of sale: {}", e)))?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Delete a point of sale. Returns the deleted row so the caller can
    /// remove its credential files.
    #[instrument(skip(self), fields(point_of_sale_id = %id))]
    pub async fn delete_point_of_sale(&self, id: Uuid) -> Result<Option<PointOfSale>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_point_of_sale"])
            .start_timer();

        let deleted = sqlx::query_as::<_, PointOfSale>(
            r#"
            DELETE FROM points_of_sale
            WHERE point_of_sale_id = $1
            RETURNING point_of_sale_id, number, name, cuit, certificate_path, private_key_path, production, created_utc
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete point of sale: {}", e)))?;

        timer.observe_duration();

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Client Operations
    // -------------------------------------------------------------------------

    /// List clients.
    #[instrument(skip(self))]
    pub async fn list_clients(&self) -> Result<Vec<Client>, AppError> {
        let rows = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, name, document_type, document_number, address, email, vat_condition, created_utc
            FROM clients
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list clients: {}", e)))?;

        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Product Operations
    // -------------------------------------------------------------------------

    /// Create a product.
    #[instrument(skip(self, input))]
    pub async fn create_product(&self, input: &NewProduct) -> Result<Product, AppError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (product_id, code, description, unit_price, vat_rate)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING product_id, code, description, unit_price, vat_rate, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.code)
        .bind(&input.description)
        .bind(input.unit_price)
        .bind(input.vat_rate)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Product code already exists"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create product: {}", e)),
        })?;

        Ok(product)
    }

    /// List products.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let rows = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, code, description, unit_price, vat_rate, created_utc
            FROM products
            ORDER BY description
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list products: {}", e)))?;

        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// List invoices, newest first.
    #[instrument(skip(self))]
    pub async fn list_invoices(&self, limit: i64, offset: i64) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let rows = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, point_of_sale_id, client_id, kind_code, number, issued_utc,
                   net_total, tax_total, total, status, cae, cae_due, observations,
                   rejection_reasons, created_utc
            FROM invoices
            ORDER BY issued_utc DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Get an invoice by id.
    #[instrument(skip(self), fields(invoice_id = %id))]
    pub async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, point_of_sale_id, client_id, kind_code, number, issued_utc,
                   net_total, tax_total, total, status, cae, cae_due, observations,
                   rejection_reasons, created_utc
            FROM invoices
            WHERE invoice_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        Ok(invoice)
    }

    /// Line items of an invoice.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn list_invoice_items(&self, invoice_id: Uuid) -> Result<Vec<LineItem>, AppError> {
        let rows = sqlx::query_as::<_, LineItem>(
            r#"
            SELECT line_item_id, invoice_id, product_id, description, quantity, unit_price,
                   vat_rate, subtotal, created_utc
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY created_utc
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list invoice items: {}", e))
        })?;

        Ok(rows)
    }
}

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self), fields(point_of_sale_id = %id))]
    async fn get_point_of_sale(&self, id: Uuid) -> Result<Option<PointOfSale>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_point_of_sale"])
            .start_timer();

        let row = sqlx::query_as::<_, PointOfSale>(
            r#"
            SELECT point_of_sale_id, number, name, cuit, certificate_path, private_key_path, production, created_utc
            FROM points_of_sale
            WHERE point_of_sale_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get point of sale: {}", e)))?;

        timer.observe_duration();

        Ok(row)
    }

    #[instrument(skip(self), fields(client_id = %id))]
    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, AppError> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, name, document_type, document_number, address, email, vat_condition, created_utc
            FROM clients
            WHERE client_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get client: {}", e)))?;

        Ok(client)
    }

    #[instrument(skip(self))]
    async fn find_client_by_document(
        &self,
        document_number: &str,
    ) -> Result<Option<Client>, AppError> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, name, document_type, document_number, address, email, vat_condition, created_utc
            FROM clients
            WHERE document_number = $1
            "#,
        )
        .bind(document_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find client: {}", e)))?;

        Ok(client)
    }

    #[instrument(skip(self, input))]
    async fn create_client(&self, input: &NewClient) -> Result<Client, AppError> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (client_id, name, document_type, document_number, address, email, vat_condition)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING client_id, name, document_type, document_number, address, email, vat_condition, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(input.document_type)
        .bind(&input.document_number)
        .bind(&input.address)
        .bind(&input.email)
        .bind(&input.vat_condition)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Client with document {} already exists",
                    input.document_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create client: {}", e)),
        })?;

        info!(client_id = %client.client_id, "Client created");

        Ok(client)
    }

    #[instrument(skip(self, update), fields(client_id = %id))]
    async fn update_client_details(
        &self,
        id: Uuid,
        update: &UpdateClientDetails,
    ) -> Result<Client, AppError> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients
            SET name = COALESCE($2, name),
                address = COALESCE($3, address),
                email = COALESCE($4, email),
                vat_condition = COALESCE($5, vat_condition)
            WHERE client_id = $1
            RETURNING client_id, name, document_type, document_number, address, email, vat_condition, created_utc
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.address)
        .bind(&update.email)
        .bind(&update.vat_condition)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update client: {}", e)))?;

        Ok(client)
    }

    #[instrument(
        skip(self, record, items),
        fields(number = record.number, kind_code = record.kind_code)
    )]
    async fn insert_invoice(
        &self,
        record: &CreateInvoiceRecord,
        items: &[CreateLineItem],
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let rejection_reasons = record
            .rejection_reasons
            .as_ref()
            .map(|reasons| serde_json::json!(reasons));

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (invoice_id, point_of_sale_id, client_id, kind_code, number,
                                  issued_utc, net_total, tax_total, total, status, cae, cae_due,
                                  observations, rejection_reasons)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING invoice_id, point_of_sale_id, client_id, kind_code, number, issued_utc,
                      net_total, tax_total, total, status, cae, cae_due, observations,
                      rejection_reasons, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.point_of_sale_id)
        .bind(record.client_id)
        .bind(record.kind_code)
        .bind(record.number)
        .bind(record.issued_utc)
        .bind(record.net_total)
        .bind(record.tax_total)
        .bind(record.total)
        .bind(record.status.as_str())
        .bind(&record.cae)
        .bind(record.cae_due)
        .bind(&record.observations)
        .bind(rejection_reasons)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice number {} already recorded for this point of sale",
                    record.number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice: {}", e)),
        })?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (line_item_id, invoice_id, product_id, description,
                                           quantity, unit_price, vat_rate, subtotal)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice.invoice_id)
            .bind(item.product_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.vat_rate)
            .bind(item.subtotal)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            number = invoice.number,
            status = %invoice.status,
            "Invoice persisted"
        );

        Ok(invoice)
    }
}
