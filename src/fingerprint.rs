//! Content fingerprints used as cache keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A value uniquely identifying a computation's inputs.
///
/// Computed as an md5 hex digest over the ordered input parts. Two
/// fingerprints compare equal exactly when every contributing part was
/// byte-identical, which is what makes them usable as cache keys for build
/// results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest an ordered sequence of input parts.
    pub fn of<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let mut ctx = md5::Context::new();
        for part in parts {
            let part = part.as_ref();
            // Length-prefix each part so ("ab", "c") and ("a", "bc") differ.
            ctx.consume((part.len() as u64).to_le_bytes());
            ctx.consume(part);
        }
        Fingerprint(format!("{:x}", ctx.compute()))
    }

    /// Fingerprint of a source text plus the option set it was built with.
    pub fn of_content(content: &str, options: &str) -> Self {
        Self::of([content.as_bytes(), options.as_bytes()])
    }

    /// The hex digest string.
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
