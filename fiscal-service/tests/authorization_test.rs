//! Invoice authorization flow against in-memory doubles.

mod common;

use chrono::NaiveDate;
use common::{dec, Harness, MockTransport};
use fiscal_service::dtos::{CreateInvoiceRequest, InlineClientDetails, LineItemInput};
use service_core::error::AppError;
use std::sync::atomic::Ordering;
use uuid::Uuid;

fn inline_client(name: &str, document_number: &str) -> InlineClientDetails {
    InlineClientDetails {
        name: name.to_string(),
        document_type: Some(80),
        document_number: document_number.to_string(),
        address: None,
        email: None,
        vat_condition: Some("Responsable Inscripto".to_string()),
    }
}

/// One item of 121.00 at 21%: net 100.00, tax 21.00.
fn single_item_request(point_of_sale_id: Uuid) -> CreateInvoiceRequest {
    CreateInvoiceRequest {
        point_of_sale_id,
        kind_code: 11,
        client_id: None,
        client: Some(inline_client("Juan Pérez", "20222222223")),
        items: vec![LineItemInput {
            product_id: None,
            description: "Servicio mensual".to_string(),
            quantity: dec("1"),
            unit_price: dec("121.00"),
            vat_rate: None,
            subtotal: dec("121.00"),
        }],
        net_total: dec("100.00"),
        tax_total: dec("21.00"),
        total: dec("121.00"),
    }
}

#[tokio::test]
async fn approved_invoice_gets_next_number_and_cae() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);

    let invoice = harness
        .authorizer
        .authorize(single_item_request(pos.point_of_sale_id))
        .await
        .unwrap();

    assert_eq!(invoice.number, 151);
    assert_eq!(invoice.kind_code, 11);
    assert_eq!(invoice.status, "approved");
    assert_eq!(invoice.cae.as_deref(), Some("CAE123"));
    assert_eq!(
        invoice.cae_due,
        Some(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap())
    );
    assert!(invoice.rejection_reasons.is_none());

    let items = harness.store.items_for(invoice.invoice_id);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].vat_rate, dec("21"));
}

#[tokio::test]
async fn rejected_invoice_is_persisted_with_reasons() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);
    harness
        .transport
        .set_verdict(MockTransport::rejected(vec!["CUIT inválido"]));

    let invoice = harness
        .authorizer
        .authorize(single_item_request(pos.point_of_sale_id))
        .await
        .unwrap();

    assert_eq!(invoice.status, "rejected");
    assert!(invoice.cae.is_none());
    assert!(invoice.cae_due.is_none());
    assert_eq!(
        invoice.rejection_reasons,
        Some(serde_json::json!(["CUIT inválido"]))
    );
    assert_eq!(harness.store.invoices().len(), 1);
}

#[tokio::test]
async fn mismatched_totals_are_refused_before_submission() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);

    let mut request = single_item_request(pos.point_of_sale_id);
    request.net_total = dec("90.00");

    let err = harness.authorizer.authorize(request).await;

    assert!(matches!(err, Err(AppError::BadRequest(_))));
    assert_eq!(harness.transport.submit_calls.load(Ordering::SeqCst), 0);
    assert!(harness.store.invoices().is_empty());
}

#[tokio::test]
async fn unknown_point_of_sale_is_refused() {
    let harness = Harness::new(150);

    let err = harness
        .authorizer
        .authorize(single_item_request(Uuid::new_v4()))
        .await;

    assert!(matches!(err, Err(AppError::BadRequest(_))));
    assert_eq!(harness.transport.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_kind_code_is_refused() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);

    let mut request = single_item_request(pos.point_of_sale_id);
    request.kind_code = 42;

    let err = harness.authorizer.authorize(request).await;

    assert!(matches!(err, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn empty_item_list_fails_validation() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);

    let mut request = single_item_request(pos.point_of_sale_id);
    request.items.clear();

    let err = harness.authorizer.authorize(request).await;

    assert!(matches!(err, Err(AppError::ValidationError(_))));
}

#[tokio::test]
async fn concurrent_authorizations_get_distinct_numbers() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);

    let (a, b) = tokio::join!(
        harness
            .authorizer
            .authorize(single_item_request(pos.point_of_sale_id)),
        harness
            .authorizer
            .authorize(single_item_request(pos.point_of_sale_id)),
    );

    let mut numbers = vec![a.unwrap().number, b.unwrap().number];
    numbers.sort_unstable();
    assert_eq!(numbers, vec![151, 152]);

    let submitted = harness.transport.submitted_numbers.lock().unwrap().clone();
    assert_eq!(submitted.len(), 2);
    assert_ne!(submitted[0], submitted[1]);
}

#[tokio::test]
async fn inline_client_is_created_once_and_refreshed() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);

    harness
        .authorizer
        .authorize(single_item_request(pos.point_of_sale_id))
        .await
        .unwrap();
    assert_eq!(harness.store.clients().len(), 1);

    let mut second = single_item_request(pos.point_of_sale_id);
    second.client = Some(inline_client("Juan P. Pérez", "20222222223"));
    harness.authorizer.authorize(second).await.unwrap();

    let clients = harness.store.clients();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].name, "Juan P. Pérez");
}

#[tokio::test]
async fn explicit_client_reference_is_used_as_is() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);

    let first = harness
        .authorizer
        .authorize(single_item_request(pos.point_of_sale_id))
        .await
        .unwrap();

    let mut request = single_item_request(pos.point_of_sale_id);
    request.client_id = Some(first.client_id);
    request.client = None;

    let second = harness.authorizer.authorize(request).await.unwrap();

    assert_eq!(second.client_id, first.client_id);
    assert_eq!(harness.store.clients().len(), 1);
}

#[tokio::test]
async fn missing_client_information_is_refused() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);

    let mut request = single_item_request(pos.point_of_sale_id);
    request.client = None;

    let err = harness.authorizer.authorize(request).await;

    assert!(matches!(err, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn mixed_rates_reconcile_per_line() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);

    // 121.00 at 21% plus 110.50 at 10.5%: net 200.00, tax 31.50.
    let request = CreateInvoiceRequest {
        point_of_sale_id: pos.point_of_sale_id,
        kind_code: 11,
        client_id: None,
        client: Some(inline_client("Juan Pérez", "20222222223")),
        items: vec![
            LineItemInput {
                product_id: None,
                description: "Servicio".to_string(),
                quantity: dec("1"),
                unit_price: dec("121.00"),
                vat_rate: Some(dec("21")),
                subtotal: dec("121.00"),
            },
            LineItemInput {
                product_id: None,
                description: "Alimento".to_string(),
                quantity: dec("1"),
                unit_price: dec("110.50"),
                vat_rate: Some(dec("10.5")),
                subtotal: dec("110.50"),
            },
        ],
        net_total: dec("200.00"),
        tax_total: dec("31.50"),
        total: dec("231.50"),
    };

    let invoice = harness.authorizer.authorize(request).await.unwrap();

    assert_eq!(invoice.status, "approved");
    assert_eq!(harness.store.items_for(invoice.invoice_id).len(), 2);
}

#[tokio::test]
async fn persistence_conflict_after_approval_propagates_error() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);

    harness
        .authorizer
        .authorize(single_item_request(pos.point_of_sale_id))
        .await
        .unwrap();

    // Roll the authority counter back so the next request submits number 151
    // again; the approval succeeds but the local write hits the uniqueness
    // constraint.
    harness.transport.last_number.store(150, Ordering::SeqCst);

    let err = harness
        .authorizer
        .authorize(single_item_request(pos.point_of_sale_id))
        .await;

    assert!(matches!(err, Err(AppError::Conflict(_))));
    assert_eq!(harness.transport.submit_calls.load(Ordering::SeqCst), 2);
    assert_eq!(harness.store.invoices().len(), 1);
}

#[tokio::test]
async fn numbering_failure_is_authority_unavailable() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);
    harness
        .transport
        .fail_last_authorized
        .store(true, Ordering::SeqCst);

    let err = harness
        .authorizer
        .authorize(single_item_request(pos.point_of_sale_id))
        .await;

    assert!(matches!(err, Err(AppError::AuthorityUnavailable(_))));
    assert_eq!(harness.transport.submit_calls.load(Ordering::SeqCst), 0);
    assert!(harness.store.invoices().is_empty());
}

#[tokio::test]
async fn submission_failure_is_authority_unavailable() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);
    harness.transport.fail_submit.store(true, Ordering::SeqCst);

    let err = harness
        .authorizer
        .authorize(single_item_request(pos.point_of_sale_id))
        .await;

    assert!(matches!(err, Err(AppError::AuthorityUnavailable(_))));
    assert_eq!(harness.transport.submit_calls.load(Ordering::SeqCst), 1);
    assert!(harness.store.invoices().is_empty());
}

#[tokio::test]
async fn failed_login_aborts_without_submission() {
    let harness = Harness::new(150);
    let pos = harness.register_point_of_sale(3);
    harness.transport.fail_login.store(true, Ordering::SeqCst);

    let err = harness
        .authorizer
        .authorize(single_item_request(pos.point_of_sale_id))
        .await;

    assert!(matches!(err, Err(AppError::AuthenticationFailed(_))));
    assert_eq!(harness.transport.submit_calls.load(Ordering::SeqCst), 0);
    assert!(harness.store.invoices().is_empty());
}
