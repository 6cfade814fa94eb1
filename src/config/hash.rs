//! Configuration hashing for change detection.
//!
//! This module provides deterministic hashing of access declarations so a
//! plan can name the desired policy it was computed from.

use sha2::{Digest, Sha256};

use crate::access::AccessDeclaration;

/// Hasher for computing configuration hashes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new configuration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of a list of declarations.
    ///
    /// The hash ignores order and duplicates, since neither changes the
    /// tuples the list denotes.
    #[must_use]
    pub fn hash_declarations(&self, declarations: &[AccessDeclaration]) -> String {
        let mut lines: Vec<String> = declarations
            .iter()
            .map(|d| {
                format!(
                    "{}\u{1f}{}\u{1f}{}",
                    d.service(),
                    d.plan().unwrap_or_default(),
                    d.org().unwrap_or_default()
                )
            })
            .collect();
        lines.sort_unstable();
        lines.dedup();

        let mut hasher = Sha256::new();
        for line in &lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }

        hex::encode(hasher.finalize())
    }

    /// Returns a short version of a hash (first 12 characters).
    #[must_use]
    pub fn short_hash(hash: &str) -> &str {
        hash.get(..12).unwrap_or(hash)
    }
}
