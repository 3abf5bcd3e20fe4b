use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex HMAC-SHA256 signature for a raw payload.
pub fn sign(raw: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(raw);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify an inbound webhook signature against the raw body as received.
///
/// With no secret configured, verification is skipped and the call is
/// treated as valid; this is a development-mode escape hatch and is logged
/// loudly every time it fires. Never panics, never errors.
pub fn verify(raw: &[u8], signature: Option<&str>, secret: Option<&str>) -> bool {
    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => {
            log::warn!("webhook signature verification SKIPPED: no WEBHOOK_SECRET configured");
            return true;
        }
    };
    let Some(signature) = signature else {
        return false;
    };

    let expected = sign(raw, secret);
    constant_time_eq(&expected, signature)
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
