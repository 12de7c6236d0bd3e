//! Content hashing
//!
//! Cache entries are named after the SHA-1 digest of the input buffer,
//! rendered as 40 lowercase hex characters.

use sha1::{Digest, Sha1};
use std::fmt;

/// SHA-1 digest of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 20]);

impl ContentHash {
    /// Hash `data`
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&Sha1::digest(data));
        Self(bytes)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_digests() {
        assert_eq!(
            ContentHash::compute(b"abc").to_string(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            ContentHash::compute(b"").to_string(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    proptest! {
        #[test]
        fn renders_forty_lowercase_hex(data in any::<Vec<u8>>()) {
            let s = ContentHash::compute(&data).to_string();
            prop_assert_eq!(s.len(), 40);
            prop_assert!(s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        }

        #[test]
        fn distinct_inputs_hash_apart(a in any::<Vec<u8>>(), b in any::<Vec<u8>>()) {
            prop_assume!(a != b);
            prop_assert_ne!(ContentHash::compute(&a), ContentHash::compute(&b));
        }
    }
}
