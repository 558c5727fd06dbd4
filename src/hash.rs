use std::fmt;

use sha2::{Digest, Sha256};

use crate::Error;

/// SHA-256 hash used for content addressing
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    /// create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// parse from hex string
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let bytes = hex::decode(s).map_err(|_| Error::InvalidHashHex(s.to_string()))?;
        if bytes.len() != 32 {
            return Err(Error::InvalidHashHex(s.to_string()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// abbreviated hex for display
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }

    /// split into path components for the object store
    /// returns (first 2 hex chars, remaining 62 hex chars)
    pub fn to_path_components(&self) -> (String, String) {
        let hex = self.to_hex();
        (hex[..2].to_string(), hex[2..].to_string())
    }

    /// whether the hex form starts with the given prefix
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(prefix)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..12])
    }
}

/// compute the hash of an object body under its framing header
///
/// every stored object is addressed by SHA-256 over
/// `"<kind> <body_len>\0"` followed by the body bytes, so identical
/// content always maps to the same key regardless of when it was written.
pub fn object_hash(kind: &str, body: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b" ");
    hasher.update(body.len().to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(body);
    Hash(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_roundtrip() {
        let original =
            Hash::from_hex("abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789")
                .unwrap();
        let hex = original.to_hex();
        let parsed = Hash::from_hex(&hex).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_hash_invalid_hex() {
        assert!(Hash::from_hex("not valid hex").is_err());
        assert!(Hash::from_hex("abcd").is_err()); // too short
        assert!(Hash::from_hex(
            "abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789ff"
        )
        .is_err()); // too long
    }

    #[test]
    fn test_hash_path_components() {
        let h =
            Hash::from_hex("abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789")
                .unwrap();
        let (dir, file) = h.to_path_components();
        assert_eq!(dir, "ab");
        assert_eq!(
            file,
            "cdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789"
        );
    }

    #[test]
    fn test_object_hash_determinism() {
        let h1 = object_hash("blob", b"hello");
        let h2 = object_hash("blob", b"hello");
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_object_hash_depends_on_kind() {
        assert_ne!(object_hash("blob", b"hello"), object_hash("tree", b"hello"));
    }

    #[test]
    fn test_object_hash_depends_on_content() {
        assert_ne!(object_hash("blob", b"hello"), object_hash("blob", b"world"));
    }

    #[test]
    fn test_object_hash_length_in_header() {
        // "blob 5\0hello" and "blob 6\0hello!" must differ even on shared prefix
        let h1 = object_hash("blob", b"hello");
        let h2 = object_hash("blob", b"hello!");
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_known_digest() {
        // sha256("blob 0\0") for the empty blob
        let h = object_hash("blob", b"");
        let mut hasher = Sha256::new();
        hasher.update(b"blob 0\0");
        let expected = Hash::from_bytes(hasher.finalize().into());
        assert_eq!(h, expected);
    }

    #[test]
    fn test_matches_prefix() {
        let h = object_hash("blob", b"prefix test");
        let hex = h.to_hex();
        assert!(h.matches_prefix(&hex[..7]));
        assert!(h.matches_prefix(&hex));
        assert!(!h.matches_prefix("zzzz"));
    }
}
