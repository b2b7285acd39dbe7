// ## 📂 File: `src/crypto/digest.rs`

//! SHA-1 modification detection code for version 1 envelopes.

use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

use crate::constants::MDC_DIGEST_LEN;

/// Incremental MDC computation over `prefix || plaintext || 0xD3 0x14`.
#[derive(Clone, Default)]
pub struct MdcHasher {
    inner: Sha1,
}

impl MdcHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> [u8; MDC_DIGEST_LEN] {
        self.inner.finalize().into()
    }
}

/// One-shot MDC digest.
pub fn compute_mdc(data: &[u8]) -> [u8; MDC_DIGEST_LEN] {
    let mut hasher = MdcHasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Constant-time digest comparison.
#[inline]
pub fn mdc_matches(expected: &[u8], actual: &[u8]) -> bool {
    expected.len() == actual.len() && bool::from(expected.ct_eq(actual))
}
