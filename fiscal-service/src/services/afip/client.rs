//! Client for the two authority services.
//!
//! Owns protocol semantics: building the login ticket request, normalizing the
//! two login response shapes into one [`AccessTicket`], and turning the raw
//! authorization verdict into a typed outcome. Holds no persistent state.

use anyhow::anyhow;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use service_core::error::AppError;
use std::sync::Arc;

use super::markup::extract_tag;
use super::ticket::AccessTicket;
use super::transport::{
    AuthorityTransport, AuthorizationRequest, LoginResponse, WireAuthorization, WireCredentials,
};
use super::IssuerIdentity;
use crate::models::InvoiceKind;
use crate::services::metrics::{AUTHORITY_REQUESTS_TOTAL, AUTHORITY_REQUEST_DURATION};

/// Service id the login ticket is requested for.
const SERVICE_ID: &str = "wsfe";
/// Requested ticket lifetime. The authority caps this at 12 hours.
const TICKET_TTL_SECS: i64 = 43_200;

/// Conclusive answer from the authority for one submitted invoice.
///
/// `Rejected` is a valid terminal outcome, not an error; failures that prevent
/// reaching a conclusive answer surface as `AppError` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    Approved {
        cae: String,
        cae_due: NaiveDate,
        observations: Vec<String>,
    },
    Rejected {
        reasons: Vec<String>,
        observations: Vec<String>,
    },
}

pub struct AfipClient {
    transport: Arc<dyn AuthorityTransport>,
    signer: Arc<dyn super::signer::TraSigner>,
}

impl AfipClient {
    pub fn new(
        transport: Arc<dyn AuthorityTransport>,
        signer: Arc<dyn super::signer::TraSigner>,
    ) -> Self {
        Self { transport, signer }
    }

    /// Acquire a fresh access ticket for the issuer.
    pub async fn login(&self, issuer: &IssuerIdentity) -> Result<AccessTicket, AppError> {
        let timer = AUTHORITY_REQUEST_DURATION
            .with_label_values(&["login"])
            .start_timer();

        let result = self.login_inner(issuer).await;

        timer.observe_duration();
        AUTHORITY_REQUESTS_TOTAL
            .with_label_values(&["login", outcome_label(&result)])
            .inc();
        result
    }

    async fn login_inner(&self, issuer: &IssuerIdentity) -> Result<AccessTicket, AppError> {
        let tra = build_tra(SERVICE_ID, Duration::seconds(TICKET_TTL_SECS));
        let signed = self
            .signer
            .sign(&tra, issuer)
            .await
            .map_err(AppError::AuthenticationFailed)?;

        let response = self
            .transport
            .login(issuer.environment, &signed)
            .await
            .map_err(AppError::AuthenticationFailed)?;

        let ticket = ticket_from_login_response(response)?;
        tracing::info!(
            cuit = %issuer.cuit,
            environment = issuer.environment.as_str(),
            expires_at = %ticket.expires_at,
            "access ticket obtained"
        );
        Ok(ticket)
    }

    /// Last invoice number the authority has authorized for the pair. The
    /// caller adds 1 to obtain the next candidate.
    pub async fn last_authorized_number(
        &self,
        ticket: &AccessTicket,
        issuer: &IssuerIdentity,
        point_of_sale: i32,
        kind: InvoiceKind,
    ) -> Result<i64, AppError> {
        let timer = AUTHORITY_REQUEST_DURATION
            .with_label_values(&["last_authorized"])
            .start_timer();

        let result = self
            .transport
            .last_authorized(
                issuer.environment,
                &credentials(ticket, issuer),
                point_of_sale,
                kind.code(),
            )
            .await
            .map_err(AppError::AuthorityUnavailable);

        timer.observe_duration();
        AUTHORITY_REQUESTS_TOTAL
            .with_label_values(&["last_authorized", outcome_label(&result)])
            .inc();
        result
    }

    /// Submit an invoice for authorization.
    pub async fn request_authorization(
        &self,
        ticket: &AccessTicket,
        issuer: &IssuerIdentity,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, AppError> {
        let timer = AUTHORITY_REQUEST_DURATION
            .with_label_values(&["authorize"])
            .start_timer();

        let result = self
            .transport
            .submit_invoice(issuer.environment, &credentials(ticket, issuer), request)
            .await
            .map_err(AppError::AuthorityUnavailable)
            .and_then(outcome_from_wire);

        timer.observe_duration();
        AUTHORITY_REQUESTS_TOTAL
            .with_label_values(&["authorize", outcome_label(&result)])
            .inc();
        result
    }
}

fn credentials(ticket: &AccessTicket, issuer: &IssuerIdentity) -> WireCredentials {
    WireCredentials {
        token: ticket.token.clone(),
        sign: ticket.sign.clone(),
        cuit: issuer.cuit.clone(),
    }
}

fn outcome_label<T>(result: &Result<T, AppError>) -> &'static str {
    if result.is_ok() { "ok" } else { "error" }
}

/// Login ticket request XML.
fn build_tra(service: &str, ttl: Duration) -> String {
    let now = Utc::now();
    // Generation backdated slightly to tolerate clock skew against the
    // authority.
    let generation = now - Duration::seconds(60);
    let expiration = now + ttl;
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<loginTicketRequest version="1.0">
  <header>
    <uniqueId>{}</uniqueId>
    <generationTime>{}</generationTime>
    <expirationTime>{}</expirationTime>
  </header>
  <service>{}</service>
</loginTicketRequest>"#,
        now.timestamp(),
        generation.to_rfc3339_opts(SecondsFormat::Secs, true),
        expiration.to_rfc3339_opts(SecondsFormat::Secs, true),
        service,
    )
}

/// Normalize both login response shapes into one complete ticket. Anything
/// short of all three fields is a failure, never a partial ticket.
fn ticket_from_login_response(response: LoginResponse) -> Result<AccessTicket, AppError> {
    let (token, sign, expiration) = match response {
        LoginResponse::Decoded {
            token,
            sign,
            expiration,
        } => (Some(token), Some(sign), Some(expiration)),
        LoginResponse::Raw(payload) => (
            extract_tag(&payload, "token"),
            extract_tag(&payload, "sign"),
            extract_tag(&payload, "expirationTime"),
        ),
    };

    match (token, sign, expiration) {
        (Some(token), Some(sign), Some(expiration))
            if !token.is_empty() && !sign.is_empty() =>
        {
            Ok(AccessTicket {
                token,
                sign,
                expires_at: parse_expiration(&expiration)?,
            })
        }
        _ => Err(AppError::AuthenticationFailed(anyhow!(
            "login response missing token, sign or expiration"
        ))),
    }
}

/// The authority emits expirations both with and without a UTC offset.
fn parse_expiration(raw: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(AppError::AuthenticationFailed(anyhow!(
        "unparseable ticket expiration '{}'",
        raw
    )))
}

/// Map the wire verdict to a typed outcome. Only a malformed verdict is an
/// error here; "R" is a conclusive business answer.
fn outcome_from_wire(wire: WireAuthorization) -> Result<AuthorizationOutcome, AppError> {
    match wire.result.as_str() {
        "A" => {
            let cae = wire.cae.filter(|c| !c.is_empty()).ok_or_else(|| {
                AppError::AuthorityUnavailable(anyhow!("approved response carried no CAE"))
            })?;
            let cae_due = wire
                .cae_due
                .as_deref()
                .and_then(parse_cae_due)
                .ok_or_else(|| {
                    AppError::AuthorityUnavailable(anyhow!(
                        "approved response carried no parseable CAE due date"
                    ))
                })?;
            Ok(AuthorizationOutcome::Approved {
                cae,
                cae_due,
                observations: wire.observations,
            })
        }
        "R" => {
            let reasons = if wire.errors.is_empty() {
                wire.observations.clone()
            } else {
                wire.errors
            };
            Ok(AuthorizationOutcome::Rejected {
                reasons,
                observations: wire.observations,
            })
        }
        other => Err(AppError::AuthorityUnavailable(anyhow!(
            "unrecognized authorization result '{}'",
            other
        ))),
    }
}

fn parse_cae_due(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}
