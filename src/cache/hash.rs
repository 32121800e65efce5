// src/cache/hash.rs

//! blake3 helpers for content and configuration fingerprints.

use blake3::Hasher;

/// Hash of a byte buffer, hex encoded.
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Hash an ordered list of strings.
///
/// Each part is length-prefixed so that `["ab", "c"]` and `["a", "bc"]`
/// hash differently.
pub fn hash_parts<S: AsRef<str>>(parts: &[S]) -> String {
    let mut hasher = Hasher::new();
    for part in parts {
        let bytes = part.as_ref().as_bytes();
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_hash_is_blake3_hex() {
        let hash = hash_bytes(b"hello world");
        assert_eq!(
            hash,
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
    }

    #[test]
    fn parts_are_length_prefixed() {
        assert_ne!(hash_parts(&["ab", "c"]), hash_parts(&["a", "bc"]));
        assert_eq!(hash_parts(&["a", "b"]), hash_parts(&["a".to_string(), "b".to_string()]));
    }
}
