use sha2::{Digest, Sha256};

/// Return `true` when `value` already looks like a SHA-256 digest (64 hex chars).
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Hash an email address for the conversions API.
///
/// Formula: sha256(lowercase(trim(email))) as 64 lowercase hex chars.
/// Values that are already digests are passed through lowercased so a client
/// that hashes on its side is not double-hashed.
pub fn hash_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if is_sha256_hex(trimmed) {
        return Some(trimmed.to_ascii_lowercase());
    }
    Some(sha256_hex(&trimmed.to_lowercase()))
}

/// Hash a phone number for the conversions API.
///
/// Only digits are kept (country code included, no `+`, spaces or dashes).
pub fn hash_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if is_sha256_hex(trimmed) {
        return Some(trimmed.to_ascii_lowercase());
    }
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    Some(sha256_hex(&digits))
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
