//! Anchor-style instruction discriminators.
//!
//! The discriminator of an instruction is the first 8 bytes of
//! `SHA-256("global:" + snake_case(name))`.

use sha2::{Digest, Sha256};

/// Namespace prefix for instruction discriminators.
pub const GLOBAL_NAMESPACE: &str = "global";

/// Length of a discriminator in bytes.
pub const SIGHASH_LEN: usize = 8;

/// Compute the 8-byte discriminator for an instruction name.
pub fn sighash(name: &str) -> [u8; SIGHASH_LEN] {
    namespaced_sighash(GLOBAL_NAMESPACE, name)
}

/// Compute `SHA-256(namespace:snake_case(name))[..8]`.
pub fn namespaced_sighash(namespace: &str, name: &str) -> [u8; SIGHASH_LEN] {
    let preimage = format!("{namespace}:{}", to_snake_case(name));
    let digest = Sha256::digest(preimage.as_bytes());

    let mut out = [0u8; SIGHASH_LEN];
    out.copy_from_slice(&digest[..SIGHASH_LEN]);
    out
}

/// Convert an identifier to snake_case.
///
/// Word boundaries are lower-to-upper transitions, the last capital of an
/// acronym run (`HTTPServer` -> `http_server`) and any non-alphanumeric
/// character, which is dropped.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    let mut pending_sep = false;

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            pending_sep = true;
            continue;
        }

        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        let boundary = match prev {
            Some(p) if p.is_alphanumeric() => {
                (c.is_uppercase() && (p.is_lowercase() || p.is_ascii_digit()))
                    || (c.is_uppercase()
                        && p.is_uppercase()
                        && next.is_some_and(|n| n.is_lowercase()))
            }
            _ => false,
        };

        if (boundary || pending_sep) && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(c.to_lowercase());
    }

    out
}
