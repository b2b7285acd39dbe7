// ## src/crypto/kdf.rs

//! Message key derivation for version 2 envelopes.
//!
//! HKDF-SHA256 with the session key as IKM, the packet salt as salt and the
//! five-byte AD prefix as info. Output is `key_size + nonce_len - 8` bytes:
//! the message key followed by the IV prefix. The last eight IV bytes are left
//! zero for the chunk index.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::constants::{COUNTER_LEN, SALT_LEN};
use crate::crypto::types::CryptoError;

/// Derived key and nonce base for one message.
pub struct MessageKeys {
    pub key: Zeroizing<Vec<u8>>,
    /// Full nonce length, low eight bytes zero.
    pub iv: Vec<u8>,
}

impl std::fmt::Debug for MessageKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageKeys")
            .field("key_len", &self.key.len())
            .field("iv", &hex::encode(&self.iv))
            .finish()
    }
}

pub fn derive_message_keys(
    session_key: &[u8],
    salt: &[u8; SALT_LEN],
    info: &[u8],
    key_len: usize,
    nonce_len: usize,
) -> Result<MessageKeys, CryptoError> {
    if nonce_len < COUNTER_LEN {
        return Err(CryptoError::InvalidNonceLen { expected: COUNTER_LEN, actual: nonce_len });
    }
    let prefix_len = nonce_len - COUNTER_LEN;

    let hk = Hkdf::<Sha256>::new(Some(salt), session_key);
    let mut okm = vec![0u8; key_len + prefix_len];
    hk.expand(info, &mut okm)
        .map_err(|_| CryptoError::Failure("HKDF expand failed (SHA-256)".into()))?;

    let key = Zeroizing::new(okm[..key_len].to_vec());
    let mut iv = vec![0u8; nonce_len];
    iv[..prefix_len].copy_from_slice(&okm[key_len..]);
    okm.zeroize();

    Ok(MessageKeys { key, iv })
}
