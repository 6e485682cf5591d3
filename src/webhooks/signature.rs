//! Delivery authentication with HMAC-SHA256.
//!
//! GitHub signs every delivery with the repository's webhook secret and sends
//! the digest as `X-Hub-Signature-256: sha256=<hex>`. Verification runs on the
//! raw body bytes, before any JSON parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Decodes a `sha256=<hex>` header value.
///
/// Returns `None` on a missing prefix, another algorithm, or bad hex.
///
/// ```
/// use tracker_sync::webhooks::parse_signature_header;
///
/// assert_eq!(parse_signature_header("sha256=0aff"), Some(vec![0x0a, 0xff]));
/// assert!(parse_signature_header("sha1=0aff").is_none());
/// assert!(parse_signature_header("sha256=zz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    hex::decode(header.strip_prefix("sha256=")?).ok()
}

fn mac_for(secret: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length.
    HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size")
}

/// Computes `sha256=<hex>` for `payload` under `secret`.
pub fn sign_payload(payload: &[u8], secret: &[u8]) -> String {
    let mut mac = mac_for(secret);
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Checks `signature_header` against the digest of `payload`.
///
/// The comparison is constant-time and rejects digests of the wrong length.
/// A missing secret is verified as the empty string.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(claimed) = parse_signature_header(signature_header) else {
        return false;
    };
    let mut mac = mac_for(secret);
    mac.update(payload);
    mac.verify_slice(&claimed).is_ok()
}
