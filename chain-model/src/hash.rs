//! Header hashing.

use cryptoxide::blake2b::Blake2b;
use cryptoxide::digest::Digest;
use std::fmt;

pub const HASH_SIZE: usize = 32;

/// Blake2b-256 digest identifying a block by its header.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeaderHash([u8; HASH_SIZE]);

impl HeaderHash {
    /// The all-zero hash, used as the parent of the very first block.
    pub fn zero() -> Self {
        HeaderHash([0; HASH_SIZE])
    }

    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        HeaderHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Digest of the concatenation of `parts`.
    pub fn digest(parts: &[&[u8]]) -> Self {
        let mut context = Blake2b::new(HASH_SIZE);
        for part in parts {
            context.input(part);
        }
        let mut out = [0; HASH_SIZE];
        context.result(&mut out);
        HeaderHash(out)
    }
}

impl fmt::Display for HeaderHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for HeaderHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HeaderHash({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = HeaderHash::digest(&[b"block", b"header"]);
        let b = HeaderHash::digest(&[b"block", b"header"]);
        assert_eq!(a, b);
    }

    #[test]
    fn digest_depends_on_input() {
        let a = HeaderHash::digest(&[b"block"]);
        let b = HeaderHash::digest(&[b"other"]);
        assert_ne!(a, b);
        assert_ne!(a, HeaderHash::zero());
    }

    #[test]
    fn display_is_hex() {
        let rendered = HeaderHash::zero().to_string();
        assert_eq!(rendered.len(), HASH_SIZE * 2);
        assert!(rendered.chars().all(|c| c == '0'));
    }
}
