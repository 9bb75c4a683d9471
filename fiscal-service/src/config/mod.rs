use anyhow::{Context, Result};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use secrecy::Secret;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub afip: AfipConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Settings for the AFIP integration.
#[derive(Deserialize, Clone, Debug)]
pub struct AfipConfig {
    /// Directory where uploaded certificates and private keys are stored.
    pub certs_dir: PathBuf,
    /// Directory holding cached access tickets, one file per issuer.
    pub ticket_cache_dir: PathBuf,
    /// A cached ticket expiring within this window is renewed instead of used.
    pub ticket_safety_margin_secs: i64,
    /// VAT rate (percent) applied to line items that do not specify one.
    pub default_vat_rate: Decimal,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("FISCAL_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("FISCAL_SERVICE_PORT")
            .unwrap_or_else(|_| "3007".to_string())
            .parse()?;

        let db_url =
            env::var("FISCAL_DATABASE_URL").context("FISCAL_DATABASE_URL must be set")?;
        let max_connections = env::var("FISCAL_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("FISCAL_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let certs_dir = env::var("FISCAL_CERTS_DIR").unwrap_or_else(|_| "./certs".to_string());
        let ticket_cache_dir =
            env::var("FISCAL_TICKET_CACHE_DIR").unwrap_or_else(|_| "./cache".to_string());
        let ticket_safety_margin_secs = env::var("FISCAL_TICKET_SAFETY_MARGIN_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()?;
        let default_vat_rate = env::var("FISCAL_DEFAULT_VAT_RATE")
            .unwrap_or_else(|_| "21".to_string())
            .parse::<Decimal>()
            .context("FISCAL_DEFAULT_VAT_RATE must be a decimal percentage")?;

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            afip: AfipConfig {
                certs_dir: PathBuf::from(certs_dir),
                ticket_cache_dir: PathBuf::from(ticket_cache_dir),
                ticket_safety_margin_secs,
                default_vat_rate,
            },
            service_name: "fiscal-service".to_string(),
        })
    }
}
