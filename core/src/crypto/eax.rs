// ## 📂 File: `src/crypto/eax.rs`

//! EAX authenticated encryption built on the crate's CMAC.
//!
//! ```text
//! N   = OMAC_0(nonce)
//! H   = OMAC_1(associated data)
//! C   = CTR_N(plaintext)
//! tag = N xor OMAC_2(C) xor H
//! ```
//!
//! `OMAC_t(M)` is CMAC over a block holding `t` in its last byte, followed by `M`.

use aes::cipher::consts::U16;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockCipher, BlockEncrypt, BlockSizeUser, KeyInit};
use ctr::cipher::{InnerIvInit, StreamCipher};
use subtle::ConstantTimeEq;

use crate::constants::{BLOCK_LEN, TAG_LEN};
use crate::crypto::cmac::{xor_in_place, Cmac, MacTag};
use crate::crypto::types::CryptoError;

const EAX_NONCE_LEN: usize = 16;

#[derive(Clone)]
pub struct Eax<C> {
    mac: Cmac<C>,
}

impl<C> Eax<C>
where
    C: BlockCipher + BlockEncrypt + BlockSizeUser<BlockSize = U16> + KeyInit + Clone,
{
    pub fn new_from_slice(key: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self { mac: Cmac::new_from_slice(key)? })
    }

    /// Encrypt `plaintext`, returning `ciphertext || tag`.
    pub fn encrypt(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        check_nonce(nonce)?;

        let n = self.omac(0, nonce);
        let h = self.omac(1, aad);

        let mut out = Vec::with_capacity(plaintext.len() + TAG_LEN);
        out.extend_from_slice(plaintext);
        self.apply_ctr(&n, &mut out);

        let mut tag = self.omac(2, &out);
        xor_in_place(&mut tag, &n);
        xor_in_place(&mut tag, &h);
        out.extend_from_slice(&tag);
        Ok(out)
    }

    /// Verify the trailing tag in constant time, then decrypt.
    pub fn decrypt(&self, nonce: &[u8], aad: &[u8], ciphertext_and_tag: &[u8]) -> Result<Vec<u8>, CryptoError> {
        check_nonce(nonce)?;
        if ciphertext_and_tag.len() < TAG_LEN {
            return Err(CryptoError::TagMismatch);
        }
        let (ciphertext, tag) = ciphertext_and_tag.split_at(ciphertext_and_tag.len() - TAG_LEN);

        let n = self.omac(0, nonce);
        let h = self.omac(1, aad);
        let mut expected = self.omac(2, ciphertext);
        xor_in_place(&mut expected, &n);
        xor_in_place(&mut expected, &h);

        if !bool::from(expected.ct_eq(tag)) {
            return Err(CryptoError::TagMismatch);
        }

        let mut out = ciphertext.to_vec();
        self.apply_ctr(&n, &mut out);
        Ok(out)
    }

    fn omac(&self, domain: u8, data: &[u8]) -> MacTag {
        let mut input = Vec::with_capacity(BLOCK_LEN + data.len());
        input.extend_from_slice(&[0u8; BLOCK_LEN - 1]);
        input.push(domain);
        input.extend_from_slice(data);
        self.mac.compute(&input)
    }

    fn apply_ctr(&self, iv: &MacTag, buf: &mut [u8]) {
        let core = ctr::CtrCore::<C, ctr::flavors::Ctr128BE>::inner_iv_init(
            self.mac.cipher().clone(),
            GenericArray::from_slice(iv),
        );
        let mut keystream = ctr::Ctr128BE::<C>::from_core(core);
        keystream.apply_keystream(buf);
    }
}

fn check_nonce(nonce: &[u8]) -> Result<(), CryptoError> {
    if nonce.len() != EAX_NONCE_LEN {
        return Err(CryptoError::InvalidNonceLen { expected: EAX_NONCE_LEN, actual: nonce.len() });
    }
    Ok(())
}
