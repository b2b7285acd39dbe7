// ## 📂 File: `src/crypto/cmac.rs`

//! CMAC (OMAC1, RFC 4493) over a 128-bit block cipher.
//!
//! - Subkeys K1/K2 come from doubling `E_K(0^128)` in GF(2^128).
//! - A complete final block is XORed with K1, anything else is padded `10*` and XORed with K2.
//! - The empty message counts as one incomplete block.
//!
//! Callers compare tags with `subtle::ConstantTimeEq`, never `==`.

use aes::cipher::consts::U16;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, BlockSizeUser, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use zeroize::Zeroize;

use crate::constants::BLOCK_LEN;
use crate::crypto::types::{CryptoError, SymmetricAlgorithm};

/// Reduction constant for x^128 + x^7 + x^2 + x + 1.
const RB: u8 = 0x87;

pub type MacTag = [u8; BLOCK_LEN];

#[derive(Clone)]
pub struct Cmac<C> {
    cipher: C,
    k1: [u8; BLOCK_LEN],
    k2: [u8; BLOCK_LEN],
}

impl<C> Drop for Cmac<C> {
    fn drop(&mut self) {
        self.k1.zeroize();
        self.k2.zeroize();
    }
}

impl<C> Cmac<C>
where
    C: BlockEncrypt + BlockSizeUser<BlockSize = U16>,
{
    pub fn new(cipher: C) -> Self {
        let mut l = [0u8; BLOCK_LEN];
        encrypt_block(&cipher, &mut l);
        let k1 = dbl(&l);
        let k2 = dbl(&k1);
        l.zeroize();
        Self { cipher, k1, k2 }
    }

    pub fn new_from_slice(key: &[u8]) -> Result<Self, CryptoError>
    where
        C: KeyInit,
    {
        let cipher = C::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLen {
            expected: C::key_size(),
            actual: key.len(),
        })?;
        Ok(Self::new(cipher))
    }

    /// The keyed block cipher, shared with modes built on top of CMAC.
    pub fn cipher(&self) -> &C {
        &self.cipher
    }

    /// Zero-IV CBC-MAC over `message` with the final block masked by K1 or K2.
    pub fn compute(&self, message: &[u8]) -> MacTag {
        let blocks = if message.is_empty() {
            1
        } else {
            (message.len() + BLOCK_LEN - 1) / BLOCK_LEN
        };
        let complete = !message.is_empty() && message.len() % BLOCK_LEN == 0;

        let mut x = [0u8; BLOCK_LEN];
        for block in message.chunks(BLOCK_LEN).take(blocks - 1) {
            xor_in_place(&mut x, block);
            encrypt_block(&self.cipher, &mut x);
        }

        let tail = &message[(blocks - 1) * BLOCK_LEN..];
        let mut last = [0u8; BLOCK_LEN];
        if complete {
            last.copy_from_slice(tail);
            xor_in_place(&mut last, &self.k1);
        } else {
            last[..tail.len()].copy_from_slice(tail);
            last[tail.len()] = 0x80;
            xor_in_place(&mut last, &self.k2);
        }

        xor_in_place(&mut x, &last);
        encrypt_block(&self.cipher, &mut x);
        x
    }

    #[cfg(test)]
    fn subkeys(&self) -> ([u8; BLOCK_LEN], [u8; BLOCK_LEN]) {
        (self.k1, self.k2)
    }
}

/// CMAC tag of `message` under `key` for the given cipher.
pub fn derive_mac(
    cipher: SymmetricAlgorithm,
    key: &[u8],
    message: &[u8],
) -> Result<MacTag, CryptoError> {
    let tag = match cipher {
        SymmetricAlgorithm::Aes128 => Cmac::<Aes128>::new_from_slice(key)?.compute(message),
        SymmetricAlgorithm::Aes192 => Cmac::<Aes192>::new_from_slice(key)?.compute(message),
        SymmetricAlgorithm::Aes256 => Cmac::<Aes256>::new_from_slice(key)?.compute(message),
    };
    Ok(tag)
}

#[inline]
pub(crate) fn encrypt_block<C>(cipher: &C, block: &mut [u8; BLOCK_LEN])
where
    C: BlockEncrypt + BlockSizeUser<BlockSize = U16>,
{
    cipher.encrypt_block(GenericArray::from_mut_slice(&mut block[..]));
}

#[inline]
pub(crate) fn xor_in_place(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// Multiply by x in GF(2^128). Branch-free on the carried-out bit.
fn dbl(block: &[u8; BLOCK_LEN]) -> [u8; BLOCK_LEN] {
    let mut out = [0u8; BLOCK_LEN];
    let mut carry = 0u8;
    for i in (0..BLOCK_LEN).rev() {
        out[i] = (block[i] << 1) | carry;
        carry = block[i] >> 7;
    }
    let mask = 0u8.wrapping_sub(block[0] >> 7);
    out[BLOCK_LEN - 1] ^= RB & mask;
    out
}
