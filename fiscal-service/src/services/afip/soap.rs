//! Default SOAP transport over HTTP.
//!
//! Thin envelope templates for the three operations the service uses. Response
//! decoding reuses the shared tag extraction, so a login payload that arrives
//! as escaped markup flows through the same fallback path the client applies.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use std::time::Duration;

use super::markup::{extract_all_tags, extract_tag};
use super::transport::{
    AuthorityTransport, AuthorizationRequest, LoginResponse, WireAuthorization, WireCredentials,
};
use super::Environment;

const WSFE_NAMESPACE: &str = "http://ar.gov.afip.dif.FEV1/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct SoapTransport {
    client: Client,
}

impl SoapTransport {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    async fn post(&self, url: &str, action: &str, envelope: String) -> Result<String> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", action)
            .body(envelope)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;

        let status = response.status();
        let body = response.text().await.context("reading response body")?;
        tracing::debug!(url = %url, status = %status, "authority response");

        if !status.is_success() {
            return Err(anyhow!("authority returned HTTP {}: {}", status, body));
        }
        if let Some(fault) = extract_tag(&body, "faultstring") {
            return Err(anyhow!("authority SOAP fault: {}", fault));
        }
        Ok(body)
    }

    fn auth_block(credentials: &WireCredentials) -> String {
        format!(
            "<ar:Auth><ar:Token>{}</ar:Token><ar:Sign>{}</ar:Sign><ar:Cuit>{}</ar:Cuit></ar:Auth>",
            credentials.token, credentials.sign, credentials.cuit
        )
    }
}

impl Default for SoapTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthorityTransport for SoapTransport {
    async fn login(&self, env: Environment, signed_request: &[u8]) -> Result<LoginResponse> {
        let cms = BASE64.encode(signed_request);
        let envelope = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:wsaa="http://wsaa.view.sua.dvadac.desein.afip.gov">
  <soapenv:Body>
    <wsaa:loginCms><wsaa:in0>{}</wsaa:in0></wsaa:loginCms>
  </soapenv:Body>
</soapenv:Envelope>"#,
            cms
        );

        let body = self.post(env.wsaa_url(), "urn:LoginCms", envelope).await?;

        // The ticket sits inside loginCmsReturn as escaped markup. Hand the
        // payload back raw; the client normalizes both shapes identically.
        match extract_tag(&body, "loginCmsReturn") {
            Some(payload) => Ok(LoginResponse::Raw(payload)),
            None => Ok(LoginResponse::Raw(body)),
        }
    }

    async fn last_authorized(
        &self,
        env: Environment,
        credentials: &WireCredentials,
        point_of_sale: i32,
        kind_code: i16,
    ) -> Result<i64> {
        let envelope = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:ar="{ns}">
  <soapenv:Body>
    <ar:FECompUltimoAutorizado>
      {auth}
      <ar:PtoVta>{pos}</ar:PtoVta>
      <ar:CbteTipo>{kind}</ar:CbteTipo>
    </ar:FECompUltimoAutorizado>
  </soapenv:Body>
</soapenv:Envelope>"#,
            ns = WSFE_NAMESPACE,
            auth = Self::auth_block(credentials),
            pos = point_of_sale,
            kind = kind_code,
        );

        let body = self
            .post(
                env.wsfe_url(),
                "http://ar.gov.afip.dif.FEV1/FECompUltimoAutorizado",
                envelope,
            )
            .await?;

        if let Some(msg) = extract_all_tags(&body, "Msg").into_iter().next() {
            if extract_tag(&body, "CbteNro").is_none() {
                return Err(anyhow!("numbering query failed: {}", msg));
            }
        }

        let number = extract_tag(&body, "CbteNro")
            .ok_or_else(|| anyhow!("numbering response missing CbteNro"))?;
        number
            .parse::<i64>()
            .with_context(|| format!("unparseable invoice number '{}'", number))
    }

    async fn submit_invoice(
        &self,
        env: Environment,
        credentials: &WireCredentials,
        request: &AuthorizationRequest,
    ) -> Result<WireAuthorization> {
        let tax_lines = request
            .tax_lines
            .iter()
            .map(|line| {
                format!(
                    "<ar:AlicIva><ar:Id>{}</ar:Id><ar:BaseImp>{}</ar:BaseImp><ar:Importe>{}</ar:Importe></ar:AlicIva>",
                    vat_rate_code(line.rate),
                    line.base.round_dp(2),
                    line.amount.round_dp(2),
                )
            })
            .collect::<String>();

        let envelope = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:ar="{ns}">
  <soapenv:Body>
    <ar:FECAESolicitar>
      {auth}
      <ar:FeCAEReq>
        <ar:FeCabReq><ar:CantReg>1</ar:CantReg><ar:PtoVta>{pos}</ar:PtoVta><ar:CbteTipo>{kind}</ar:CbteTipo></ar:FeCabReq>
        <ar:FeDetReq>
          <ar:FECAEDetRequest>
            <ar:Concepto>1</ar:Concepto>
            <ar:DocTipo>{doc_type}</ar:DocTipo>
            <ar:DocNro>{doc_nro}</ar:DocNro>
            <ar:CbteDesde>{number}</ar:CbteDesde>
            <ar:CbteHasta>{number}</ar:CbteHasta>
            <ar:CbteFch>{date}</ar:CbteFch>
            <ar:ImpTotal>{total}</ar:ImpTotal>
            <ar:ImpTotConc>0</ar:ImpTotConc>
            <ar:ImpNeto>{net}</ar:ImpNeto>
            <ar:ImpOpEx>0</ar:ImpOpEx>
            <ar:ImpTrib>0</ar:ImpTrib>
            <ar:ImpIVA>{tax}</ar:ImpIVA>
            <ar:MonId>PES</ar:MonId>
            <ar:MonCotiz>1</ar:MonCotiz>
            <ar:Iva>{tax_lines}</ar:Iva>
          </ar:FECAEDetRequest>
        </ar:FeDetReq>
      </ar:FeCAEReq>
    </ar:FECAESolicitar>
  </soapenv:Body>
</soapenv:Envelope>"#,
            ns = WSFE_NAMESPACE,
            auth = Self::auth_block(credentials),
            pos = request.point_of_sale,
            kind = request.kind_code,
            doc_type = request.document_type,
            doc_nro = request.document_number,
            number = request.number,
            date = request.issue_date.format("%Y%m%d"),
            total = request.total.round_dp(2),
            net = request.net_total.round_dp(2),
            tax = request.tax_total.round_dp(2),
            tax_lines = tax_lines,
        );

        let body = self
            .post(
                env.wsfe_url(),
                "http://ar.gov.afip.dif.FEV1/FECAESolicitar",
                envelope,
            )
            .await?;

        let result = extract_tag(&body, "Resultado")
            .ok_or_else(|| anyhow!("authorization response missing Resultado"))?;

        Ok(WireAuthorization {
            result,
            cae: extract_tag(&body, "CAE").filter(|c| !c.is_empty()),
            cae_due: extract_tag(&body, "CAEFchVto").filter(|d| !d.is_empty()),
            observations: extract_all_tags(&body, "Obs")
                .iter()
                .filter_map(|obs| extract_tag(obs, "Msg"))
                .collect(),
            errors: extract_all_tags(&body, "Err")
                .iter()
                .filter_map(|err| extract_tag(err, "Msg"))
                .collect(),
        })
    }
}

/// AFIP VAT rate codes for the AlicIva block.
fn vat_rate_code(rate: rust_decimal::Decimal) -> u8 {
    let rate = rate.round_dp(2);
    if rate == rust_decimal::Decimal::new(105, 1) {
        4 // 10.5%
    } else if rate == rust_decimal::Decimal::from(27) {
        6
    } else if rate == rust_decimal::Decimal::ZERO {
        3
    } else {
        5 // 21%
    }
}
