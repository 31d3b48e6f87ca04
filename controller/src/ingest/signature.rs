//! Webhook signature verification (`X-Hub-Signature-256`)

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::IngestError;
use crate::utils::hex;

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "sha256=";

fn mac(secret: &str, body: &[u8]) -> Result<HmacSha256, IngestError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| IngestError::InvalidSignature)?;
    mac.update(body);
    Ok(mac)
}

/// Signature header value for a payload
pub fn sign(secret: &str, body: &[u8]) -> Result<String, IngestError> {
    let digest = mac(secret, body)?.finalize().into_bytes();
    Ok(format!("{}{}", PREFIX, hex::encode(digest)))
}

/// Verify a signature header against the payload.
///
/// A missing or empty header is always rejected. With an empty secret any
/// present header is accepted.
pub fn verify(secret: &str, signature: Option<&str>, body: &[u8]) -> Result<(), IngestError> {
    let signature = match signature {
        Some(s) if !s.is_empty() => s,
        _ => return Err(IngestError::InvalidSignature),
    };
    if secret.is_empty() {
        return Ok(());
    }

    let digest = signature
        .strip_prefix(PREFIX)
        .and_then(hex::decode)
        .ok_or(IngestError::InvalidSignature)?;

    mac(secret, body)?
        .verify_slice(&digest)
        .map_err(|_| IngestError::InvalidSignature)
}
