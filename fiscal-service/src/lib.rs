pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;

use axum::middleware::from_fn;
use axum::{
    routing::{delete, get, post},
    Router,
};
use chrono::Duration;
use secrecy::ExposeSecret;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use services::afip::{
    AfipClient, FileTicketCache, OpensslCmsSigner, SoapTransport, TicketManager,
};
use services::{Database, InvoiceAuthorizer};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub afip: Arc<AfipClient>,
    pub tickets: Arc<TicketManager>,
    pub authorizer: Arc<InvoiceAuthorizer>,
}

pub struct Application {
    port: u16,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        std::fs::create_dir_all(&config.afip.certs_dir)?;
        std::fs::create_dir_all(&config.afip.ticket_cache_dir)?;

        let afip = Arc::new(AfipClient::new(
            Arc::new(SoapTransport::new()),
            Arc::new(OpensslCmsSigner),
        ));
        let tickets = Arc::new(TicketManager::new(
            FileTicketCache::new(config.afip.ticket_cache_dir.clone()),
            afip.clone(),
            Duration::seconds(config.afip.ticket_safety_margin_secs),
        ));
        let authorizer = Arc::new(InvoiceAuthorizer::new(
            Arc::new(db.clone()),
            afip.clone(),
            tickets.clone(),
            config.afip.default_vat_rate,
        ));

        services::metrics::init_metrics();

        let state = AppState {
            db,
            config: config.clone(),
            afip,
            tickets,
            authorizer,
        };

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics_handler))
            .route("/invoices", post(handlers::invoices::create_invoice))
            .route("/invoices", get(handlers::invoices::list_invoices))
            .route("/invoices/:id", get(handlers::invoices::get_invoice))
            .route(
                "/points-of-sale",
                post(handlers::points_of_sale::create_point_of_sale),
            )
            .route(
                "/points-of-sale",
                get(handlers::points_of_sale::list_points_of_sale),
            )
            .route(
                "/points-of-sale/:id",
                delete(handlers::points_of_sale::delete_point_of_sale),
            )
            .route(
                "/points-of-sale/:id/test-connection",
                get(handlers::points_of_sale::test_connection),
            )
            .route("/products", post(handlers::products::create_product))
            .route("/products", get(handlers::products::list_products))
            .route("/clients", get(handlers::clients::list_clients))
            .layer(cors)
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .with_state(state);

        Ok(Self {
            port: config.server.port,
            router,
        })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        tracing::info!("Listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;

        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}
