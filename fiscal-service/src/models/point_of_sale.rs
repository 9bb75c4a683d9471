//! Point of sale model.
//!
//! A point of sale is an AFIP-registered emission point. It owns the issuer
//! credential material (certificate + private key paths) used to authenticate
//! against the authority.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::PathBuf;
use uuid::Uuid;

use crate::services::afip::{Environment, IssuerIdentity};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PointOfSale {
    pub point_of_sale_id: Uuid,
    /// AFIP point-of-sale number.
    pub number: i32,
    pub name: Option<String>,
    /// Issuer tax id.
    pub cuit: String,
    pub certificate_path: String,
    pub private_key_path: String,
    /// True targets the production endpoints, false homologation.
    pub production: bool,
    pub created_utc: DateTime<Utc>,
}

impl PointOfSale {
    /// Issuer identity derived from this point of sale's configuration.
    pub fn issuer(&self) -> IssuerIdentity {
        IssuerIdentity {
            cuit: self.cuit.clone(),
            certificate_path: PathBuf::from(&self.certificate_path),
            private_key_path: PathBuf::from(&self.private_key_path),
            environment: if self.production {
                Environment::Production
            } else {
                Environment::Testing
            },
        }
    }
}

/// Input for registering a point of sale.
#[derive(Debug, Clone)]
pub struct NewPointOfSale {
    pub number: i32,
    pub name: Option<String>,
    pub cuit: String,
    pub certificate_path: String,
    pub private_key_path: String,
    pub production: bool,
}
