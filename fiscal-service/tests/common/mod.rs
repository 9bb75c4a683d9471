#![allow(dead_code)]

//! Shared test doubles: an in-memory authority transport, a no-op request
//! signer, and an in-memory invoice store.

use async_trait::async_trait;
use chrono::Utc;
use fiscal_service::models::{
    Client, CreateInvoiceRecord, CreateLineItem, Invoice, LineItem, NewClient, PointOfSale,
    UpdateClientDetails,
};
use fiscal_service::services::afip::{
    AfipClient, AuthorityTransport, AuthorizationRequest, Environment, FileTicketCache,
    IssuerIdentity, LoginResponse, TicketManager, TraSigner, WireAuthorization, WireCredentials,
};
use fiscal_service::services::{InvoiceAuthorizer, InvoiceStore};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Login payload in the escaped-markup shape the real authority produces.
pub const ESCAPED_LOGIN_PAYLOAD: &str = "&lt;loginTicketResponse&gt;&lt;credentials&gt;&lt;token&gt;T1&lt;/token&gt;&lt;sign&gt;S1&lt;/sign&gt;&lt;/credentials&gt;&lt;header&gt;&lt;expirationTime&gt;2030-01-01T00:00:00&lt;/expirationTime&gt;&lt;/header&gt;&lt;/loginTicketResponse&gt;";

/// Authority double. The last-authorized counter advances on each approved
/// submission, matching how the real sequence behaves.
pub struct MockTransport {
    pub login_calls: AtomicUsize,
    pub last_authorized_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub fail_login: AtomicBool,
    pub fail_last_authorized: AtomicBool,
    pub fail_submit: AtomicBool,
    pub last_number: AtomicI64,
    pub verdict: Mutex<WireAuthorization>,
    pub submitted_numbers: Mutex<Vec<i64>>,
}

impl MockTransport {
    pub fn new(last_number: i64) -> Self {
        Self {
            login_calls: AtomicUsize::new(0),
            last_authorized_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            fail_login: AtomicBool::new(false),
            fail_last_authorized: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
            last_number: AtomicI64::new(last_number),
            verdict: Mutex::new(WireAuthorization {
                result: "A".to_string(),
                cae: Some("CAE123".to_string()),
                cae_due: Some("20250630".to_string()),
                observations: vec![],
                errors: vec![],
            }),
            submitted_numbers: Mutex::new(Vec::new()),
        }
    }

    pub fn set_verdict(&self, verdict: WireAuthorization) {
        *self.verdict.lock().unwrap() = verdict;
    }

    pub fn rejected(reasons: Vec<&str>) -> WireAuthorization {
        WireAuthorization {
            result: "R".to_string(),
            cae: None,
            cae_due: None,
            observations: vec![],
            errors: reasons.into_iter().map(String::from).collect(),
        }
    }
}

#[async_trait]
impl AuthorityTransport for MockTransport {
    async fn login(
        &self,
        _env: Environment,
        _signed_request: &[u8],
    ) -> anyhow::Result<LoginResponse> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_login.load(Ordering::SeqCst) {
            anyhow::bail!("certificate not authorized");
        }
        Ok(LoginResponse::Raw(ESCAPED_LOGIN_PAYLOAD.to_string()))
    }

    async fn last_authorized(
        &self,
        _env: Environment,
        _credentials: &WireCredentials,
        _point_of_sale: i32,
        _kind_code: i16,
    ) -> anyhow::Result<i64> {
        self.last_authorized_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_last_authorized.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset by peer");
        }
        Ok(self.last_number.load(Ordering::SeqCst))
    }

    async fn submit_invoice(
        &self,
        _env: Environment,
        _credentials: &WireCredentials,
        request: &AuthorizationRequest,
    ) -> anyhow::Result<WireAuthorization> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_submit.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset by peer");
        }
        self.submitted_numbers.lock().unwrap().push(request.number);

        let verdict = self.verdict.lock().unwrap().clone();
        if verdict.result == "A" {
            self.last_number.store(request.number, Ordering::SeqCst);
        }
        Ok(verdict)
    }
}

/// Signer that skips real CMS signing.
pub struct StaticSigner;

#[async_trait]
impl TraSigner for StaticSigner {
    async fn sign(&self, _tra_xml: &str, _issuer: &IssuerIdentity) -> anyhow::Result<Vec<u8>> {
        Ok(b"signed".to_vec())
    }
}

#[derive(Default)]
struct StoreInner {
    points_of_sale: HashMap<Uuid, PointOfSale>,
    clients: Vec<Client>,
    invoices: Vec<Invoice>,
    items: Vec<LineItem>,
}

/// In-memory store mirroring the persistence contract, including the
/// uniqueness of (point of sale, kind, number).
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point_of_sale(&self, pos: PointOfSale) {
        self.inner
            .lock()
            .unwrap()
            .points_of_sale
            .insert(pos.point_of_sale_id, pos);
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.inner.lock().unwrap().invoices.clone()
    }

    pub fn clients(&self) -> Vec<Client> {
        self.inner.lock().unwrap().clients.clone()
    }

    pub fn items_for(&self, invoice_id: Uuid) -> Vec<LineItem> {
        self.inner
            .lock()
            .unwrap()
            .items
            .iter()
            .filter(|item| item.invoice_id == invoice_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn get_point_of_sale(&self, id: Uuid) -> Result<Option<PointOfSale>, AppError> {
        Ok(self.inner.lock().unwrap().points_of_sale.get(&id).cloned())
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .clients
            .iter()
            .find(|c| c.client_id == id)
            .cloned())
    }

    async fn find_client_by_document(
        &self,
        document_number: &str,
    ) -> Result<Option<Client>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .clients
            .iter()
            .find(|c| c.document_number == document_number)
            .cloned())
    }

    async fn create_client(&self, input: &NewClient) -> Result<Client, AppError> {
        let client = Client {
            client_id: Uuid::new_v4(),
            name: input.name.clone(),
            document_type: input.document_type,
            document_number: input.document_number.clone(),
            address: input.address.clone(),
            email: input.email.clone(),
            vat_condition: input.vat_condition.clone(),
            created_utc: Utc::now(),
        };
        self.inner.lock().unwrap().clients.push(client.clone());
        Ok(client)
    }

    async fn update_client_details(
        &self,
        id: Uuid,
        update: &UpdateClientDetails,
    ) -> Result<Client, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let client = inner
            .clients
            .iter_mut()
            .find(|c| c.client_id == id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;
        if let Some(name) = &update.name {
            client.name = name.clone();
        }
        if update.address.is_some() {
            client.address = update.address.clone();
        }
        if update.email.is_some() {
            client.email = update.email.clone();
        }
        if update.vat_condition.is_some() {
            client.vat_condition = update.vat_condition.clone();
        }
        Ok(client.clone())
    }

    async fn insert_invoice(
        &self,
        record: &CreateInvoiceRecord,
        items: &[CreateLineItem],
    ) -> Result<Invoice, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let duplicate = inner.invoices.iter().any(|i| {
            i.point_of_sale_id == record.point_of_sale_id
                && i.kind_code == record.kind_code
                && i.number == record.number
        });
        if duplicate {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice number {} already recorded for this point of sale",
                record.number
            )));
        }

        let invoice = Invoice {
            invoice_id: Uuid::new_v4(),
            point_of_sale_id: record.point_of_sale_id,
            client_id: record.client_id,
            kind_code: record.kind_code,
            number: record.number,
            issued_utc: record.issued_utc,
            net_total: record.net_total,
            tax_total: record.tax_total,
            total: record.total,
            status: record.status.as_str().to_string(),
            cae: record.cae.clone(),
            cae_due: record.cae_due,
            observations: record.observations.clone(),
            rejection_reasons: record
                .rejection_reasons
                .as_ref()
                .map(|reasons| serde_json::json!(reasons)),
            created_utc: Utc::now(),
        };
        for item in items {
            inner.items.push(LineItem {
                line_item_id: Uuid::new_v4(),
                invoice_id: invoice.invoice_id,
                product_id: item.product_id,
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                vat_rate: item.vat_rate,
                subtotal: item.subtotal,
                created_utc: Utc::now(),
            });
        }
        inner.invoices.push(invoice.clone());
        Ok(invoice)
    }
}

/// Write dummy credential files so the existence checks pass.
pub fn write_credentials(dir: &Path, cuit: &str, number: i32) -> (String, String) {
    let cert = dir.join(format!("{}_{}.crt", cuit, number));
    let key = dir.join(format!("{}_{}.key", cuit, number));
    std::fs::write(&cert, "test certificate").unwrap();
    std::fs::write(&key, "test key").unwrap();
    (
        cert.to_string_lossy().into_owned(),
        key.to_string_lossy().into_owned(),
    )
}

pub fn point_of_sale(dir: &Path, number: i32) -> PointOfSale {
    let cuit = "20111111112".to_string();
    let (certificate_path, private_key_path) = write_credentials(dir, &cuit, number);
    PointOfSale {
        point_of_sale_id: Uuid::new_v4(),
        number,
        name: Some(format!("Sucursal {}", number)),
        cuit,
        certificate_path,
        private_key_path,
        production: false,
        created_utc: Utc::now(),
    }
}

/// Fully wired orchestrator over the in-memory doubles.
pub struct Harness {
    pub transport: Arc<MockTransport>,
    pub store: Arc<MemoryStore>,
    pub tickets: Arc<TicketManager>,
    pub afip: Arc<AfipClient>,
    pub authorizer: Arc<InvoiceAuthorizer>,
    pub dirs: TempDir,
}

impl Harness {
    pub fn new(last_number: i64) -> Self {
        let dirs = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new(last_number));
        let store = Arc::new(MemoryStore::new());
        let afip = Arc::new(AfipClient::new(transport.clone(), Arc::new(StaticSigner)));
        let tickets = Arc::new(TicketManager::new(
            FileTicketCache::new(dirs.path().join("cache")),
            afip.clone(),
            chrono::Duration::seconds(300),
        ));
        let authorizer = Arc::new(InvoiceAuthorizer::new(
            store.clone(),
            afip.clone(),
            tickets.clone(),
            dec("21"),
        ));
        Self {
            transport,
            store,
            tickets,
            afip,
            authorizer,
            dirs,
        }
    }

    pub fn register_point_of_sale(&self, number: i32) -> PointOfSale {
        let pos = point_of_sale(self.dirs.path(), number);
        self.store.add_point_of_sale(pos.clone());
        pos
    }
}
