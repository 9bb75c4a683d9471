//! Access ticket and its on-disk cache.
//!
//! WSAA tickets are valid for hours, so they are cached outside process memory
//! and reused across restarts. A load that cannot produce a complete ticket
//! reads as absent rather than a partial value.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::fs;
use std::path::PathBuf;

use super::IssuerIdentity;

/// Credential handed out by WSAA. Replaced, never mutated, on renewal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTicket {
    pub token: String,
    pub sign: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessTicket {
    /// True while the ticket remains usable for at least `margin` more.
    pub fn is_valid_for(&self, margin: Duration) -> bool {
        self.expires_at > Utc::now() + margin
    }
}

/// File-backed ticket cache keyed by issuer identity.
#[derive(Debug, Clone)]
pub struct FileTicketCache {
    dir: PathBuf,
}

impl FileTicketCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, issuer: &IssuerIdentity) -> PathBuf {
        self.dir.join(format!("ta-{}.json", issuer.cache_key()))
    }

    /// Load the cached ticket for an issuer. Missing, unreadable or incomplete
    /// entries all read as absent.
    pub fn load(&self, issuer: &IssuerIdentity) -> Option<AccessTicket> {
        let raw = fs::read_to_string(self.entry_path(issuer)).ok()?;
        let ticket: AccessTicket = serde_json::from_str(&raw).ok()?;
        if ticket.token.is_empty() || ticket.sign.is_empty() {
            return None;
        }
        Some(ticket)
    }

    /// Persist a ticket atomically (write-to-temp + rename) so concurrent
    /// readers never observe a partial entry.
    pub fn store(&self, issuer: &IssuerIdentity, ticket: &AccessTicket) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.entry_path(issuer);
        let tmp = path.with_extension("json.tmp");
        let encoded = serde_json::to_vec_pretty(ticket)
            .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
