//! AFIP fiscal authority integration.
//!
//! Two remote services are involved: WSAA (authentication, hands out a
//! time-bounded access ticket for a signed login request) and WSFEv1
//! (electronic invoicing: last authorized number, CAE requests). Wire encoding
//! and CMS signing stay behind the [`AuthorityTransport`] and [`TraSigner`]
//! traits; this module owns the protocol and session semantics on top.

pub mod client;
pub mod manager;
mod markup;
pub mod signer;
pub mod soap;
pub mod ticket;
pub mod transport;

pub use client::{AfipClient, AuthorizationOutcome};
pub use manager::TicketManager;
pub use signer::{OpensslCmsSigner, TraSigner};
pub use soap::SoapTransport;
pub use ticket::{AccessTicket, FileTicketCache};
pub use transport::{
    AuthorityTransport, AuthorizationRequest, LoginResponse, WireAuthorization, WireCredentials,
    WireTaxLine,
};

use std::path::PathBuf;

/// Which set of AFIP endpoints a point of sale talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    /// Homologation (testing) endpoints.
    Testing,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Testing => "testing",
            Environment::Production => "production",
        }
    }

    /// WSAA login endpoint.
    pub fn wsaa_url(&self) -> &'static str {
        match self {
            Environment::Testing => "https://wsaahomo.afip.gov.ar/ws/services/LoginCms",
            Environment::Production => "https://wsaa.afip.gov.ar/ws/services/LoginCms",
        }
    }

    /// WSFEv1 invoicing endpoint.
    pub fn wsfe_url(&self) -> &'static str {
        match self {
            Environment::Testing => "https://wswhomo.afip.gov.ar/wsfev1/service.asmx",
            Environment::Production => "https://servicios1.afip.gov.ar/wsfev1/service.asmx",
        }
    }
}

/// Issuer credential material, owned by point-of-sale configuration.
#[derive(Debug, Clone)]
pub struct IssuerIdentity {
    pub cuit: String,
    pub certificate_path: PathBuf,
    pub private_key_path: PathBuf,
    pub environment: Environment,
}

impl IssuerIdentity {
    /// Cache key for this issuer's access ticket.
    pub fn cache_key(&self) -> String {
        format!("{}-{}", self.cuit, self.environment.as_str())
    }
}
