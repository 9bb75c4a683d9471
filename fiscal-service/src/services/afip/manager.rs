//! Access ticket lifecycle.
//!
//! Decides whether the cached ticket is still usable or must be renewed, and
//! owns the renewal. A per-issuer mutex covers the whole check-renew-store
//! section so two callers observing a stale cache cannot interleave logins and
//! cache writes.

use chrono::Duration;
use dashmap::DashMap;
use service_core::error::AppError;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::client::AfipClient;
use super::ticket::{AccessTicket, FileTicketCache};
use super::IssuerIdentity;
use crate::services::metrics::TICKET_RENEWALS_TOTAL;

pub struct TicketManager {
    cache: FileTicketCache,
    client: Arc<AfipClient>,
    /// A ticket expiring within this window counts as stale, guarding against
    /// expiry mid-request.
    safety_margin: Duration,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TicketManager {
    pub fn new(cache: FileTicketCache, client: Arc<AfipClient>, safety_margin: Duration) -> Self {
        Self {
            cache,
            client,
            safety_margin,
            locks: DashMap::new(),
        }
    }

    /// Return a ticket guaranteed to outlive the safety margin, renewing
    /// through a login if the cached one is absent or stale.
    pub async fn ensure_valid_ticket(
        &self,
        issuer: &IssuerIdentity,
    ) -> Result<AccessTicket, AppError> {
        let lock = self
            .locks
            .entry(issuer.cache_key())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(cached) = self.cache.load(issuer) {
            if cached.is_valid_for(self.safety_margin) {
                tracing::debug!(cuit = %issuer.cuit, "reusing cached access ticket");
                return Ok(cached);
            }
            tracing::info!(
                cuit = %issuer.cuit,
                expires_at = %cached.expires_at,
                "cached access ticket stale, renewing"
            );
        }

        let fresh = self.client.login(issuer).await?;
        self.cache.store(issuer, &fresh)?;
        TICKET_RENEWALS_TOTAL
            .with_label_values(&[issuer.environment.as_str()])
            .inc();
        Ok(fresh)
    }
}
