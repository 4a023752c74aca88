//! Request fingerprinting: salted IP/UA hashing for click tracking
//! without storing raw client identifiers.

use sha2::{Digest, Sha256};

/// SHA-256 of `"{salt}:{value}"`, hex-encoded.
pub fn hash_value(value: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// The client IP to attribute a request to: the first `X-Forwarded-For`
/// entry if present, else the given remote address.
pub fn extract_ip(forwarded_for: Option<&str>, remote_addr: &str) -> String {
    match forwarded_for.and_then(|xff| xff.split(',').next()) {
        Some(first) if !first.trim().is_empty() => first.trim().to_string(),
        _ => remote_addr.to_string(),
    }
}

/// Hash of the client IP, salted.
pub fn ip_hash(ip: &str, salt: &str) -> String {
    hash_value(ip, salt)
}

/// Hash of the user agent, or `None` if it is empty/whitespace-only — the
/// validator treats an absent UA hash as a bot signal, not a hash of "".
pub fn ua_hash(user_agent: &str, salt: &str) -> Option<String> {
    if user_agent.trim().is_empty() {
        None
    } else {
        Some(hash_value(user_agent, salt))
    }
}
