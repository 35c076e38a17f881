#![warn(missing_docs)]

//! cowtree packing subsystem: the codecs applied to every blob before it reaches the store.
//!
//! Pack path:   Cleartext → Packing (plain | compress | seal) → Ciphertext
//! Unpack path: Ciphertext → Packing (selected by descriptor) → Cleartext
//!
//! Codecs form a closed set (`Packing`), selected at runtime by the one-byte
//! descriptor that directory entries record next to each blob key.

pub mod compression;
pub mod encryption;
pub mod error;
pub mod packing;

pub use compression::Compression;
pub use encryption::{Cipher, EncryptionKey};
pub use error::PackError;
pub use packing::{PackContext, Packing};
