/// cchat Crypto Library
///
/// Shared-password symmetric encryption (AES-256-GCM).
/// Every participant derives the same key from the same secret and a fixed salt,
/// so there is no per-user key separation and no forward secrecy.
/// The server never links this crate: it only relays ciphertext.

pub mod encrypt;
pub mod keys;

pub use encrypt::{CipherBundle, DecryptError};
pub use keys::derive_key;
