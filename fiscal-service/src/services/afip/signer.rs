//! CMS signing of login requests.
//!
//! The authority requires the login ticket request to be CMS-signed with the
//! issuer's certificate. The signing primitive itself is delegated to the
//! `openssl` binary; this module only owns the seam.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use uuid::Uuid;

use super::IssuerIdentity;

/// Signs a login ticket request on behalf of an issuer.
#[async_trait]
pub trait TraSigner: Send + Sync {
    /// Returns the DER-encoded CMS structure for the given request XML.
    async fn sign(&self, tra_xml: &str, issuer: &IssuerIdentity) -> Result<Vec<u8>>;
}

/// Signer that shells out to `openssl cms`.
pub struct OpensslCmsSigner;

#[async_trait]
impl TraSigner for OpensslCmsSigner {
    async fn sign(&self, tra_xml: &str, issuer: &IssuerIdentity) -> Result<Vec<u8>> {
        if !issuer.certificate_path.exists() {
            return Err(anyhow!(
                "certificate file {} not found",
                issuer.certificate_path.display()
            ));
        }
        if !issuer.private_key_path.exists() {
            return Err(anyhow!(
                "private key file {} not found",
                issuer.private_key_path.display()
            ));
        }

        let input_path = scratch_path("tra", "xml");
        tokio::fs::write(&input_path, tra_xml)
            .await
            .context("writing login request to scratch file")?;

        let output = Command::new("openssl")
            .arg("cms")
            .arg("-sign")
            .arg("-in")
            .arg(&input_path)
            .arg("-signer")
            .arg(&issuer.certificate_path)
            .arg("-inkey")
            .arg(&issuer.private_key_path)
            .arg("-nodetach")
            .arg("-outform")
            .arg("DER")
            .output()
            .await
            .context("spawning openssl")?;

        let _ = tokio::fs::remove_file(&input_path).await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("openssl cms signing failed: {}", stderr.trim()));
        }
        if output.stdout.is_empty() {
            return Err(anyhow!("openssl cms produced no output"));
        }

        Ok(output.stdout)
    }
}

fn scratch_path(prefix: &str, extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}-{}.{}", prefix, Uuid::new_v4(), extension))
}
