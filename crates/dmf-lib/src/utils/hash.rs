use sha1::{Digest, Sha1};

/// Hash an identity string into a filesystem-safe token (uppercase hex).
/// Only used to normalize names; no cryptographic property is relied upon.
pub fn identity_hash(value: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(value.as_bytes());
    hex::encode_upper(hasher.finalize())
}
