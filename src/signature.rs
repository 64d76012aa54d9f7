//! HMAC-SHA256 signing of raw webhook bodies.
//!
//! Both directions operate on the literal bytes on the wire: outbound signs
//! the serialized body that is sent, inbound verifies the body exactly as it
//! was received.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SCHEME_PREFIX: &str = "sha256=";

/// Outbound signature header.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
/// Alternative signature header accepted from providers.
pub const SIGNATURE_HEADER_ALT: &str = "x-signature";

/// Sign `raw_body` with `secret`, producing `sha256=<hex>`.
pub fn sign(secret: &str, raw_body: &[u8]) -> String {
    let encoded = digest(secret.as_bytes(), raw_body)
        .map(hex::encode)
        .unwrap_or_default();
    format!("{SCHEME_PREFIX}{encoded}")
}

/// Check `signature` against `raw_body`. The `sha256=` prefix is optional.
///
/// Fails closed: an empty secret or anything other than the exact lowercase
/// hex digest yields `false`.
pub fn verify(raw_body: &[u8], signature: &str, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }

    let provided = signature.trim();
    let provided = provided.strip_prefix(SCHEME_PREFIX).unwrap_or(provided);

    let Some(expected) = digest(secret.as_bytes(), raw_body).map(hex::encode) else {
        return false;
    };
    // compared as text so a case change in any hex digit is a mismatch;
    // ct_eq returns 0 on length mismatch without inspecting contents
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

fn digest(key: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).ok()?;
    mac.update(data);
    Some(mac.finalize().into_bytes().to_vec())
}
