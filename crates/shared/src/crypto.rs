//! Cryptographic utilities: hashing and short-code generation.

use sha2::{Digest, Sha256};

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derives a 6-character base36 ride short code from a seed string (typically
/// the ride's UUID, optionally with a salt appended on collision re-roll).
///
/// The digest is SHA-256'd, then the first 6 bytes are reduced mod 36 and
/// mapped into the base36 alphabet. Callers re-roll by changing `salt`.
pub fn short_code(seed: &str, salt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(salt.to_le_bytes());
    let digest = hasher.finalize();

    digest
        .iter()
        .take(6)
        .map(|b| BASE36_ALPHABET[(*b as usize) % BASE36_ALPHABET.len()] as char)
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_short_code_length() {
        let code = short_code("00000000-0000-0000-0000-000000000000", 0);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_short_code_deterministic() {
        let a = short_code("ride-id-abc", 0);
        let b = short_code("ride-id-abc", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_code_salt_changes_output() {
        let a = short_code("ride-id-abc", 0);
        let b = short_code("ride-id-abc", 1);
        assert_ne!(a, b);
    }
}
