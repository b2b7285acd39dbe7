pub mod types;
pub mod cmac;
pub mod eax;
pub mod aead;
pub mod aad;
pub mod nonce;
pub mod kdf;
pub mod digest;
pub mod cfb;

pub use types::*;
pub use cmac::{derive_mac, Cmac, MacTag};
pub use eax::Eax;
pub use aead::AeadImpl;
pub use aad::{AadFamily, AssociatedData, AAD_PREFIX_LEN};
pub use nonce::{ChunkNonce, NonceSchedule};
pub use kdf::{derive_message_keys, MessageKeys};
pub use digest::{compute_mdc, mdc_matches, MdcHasher};
pub use cfb::{CfbDecryptor, CfbEncryptor};
