use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::keys::derive_key;

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("ciphertext is not valid base64")]
    Encoding(#[from] base64::DecodeError),
    #[error("ciphertext too short ({0} bytes)")]
    Truncated(usize),
    #[error("wrong password or corrupted message")]
    Authentication,
    #[error("decrypted text is not UTF-8")]
    NotUtf8,
}

/// Encrypt a plaintext message with AES-256-GCM.
/// Returns (ciphertext, nonce).
pub fn encrypt_message(key: &[u8; 32], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok((ciphertext, nonce_bytes.to_vec()))
}

/// Decrypt a ciphertext message with AES-256-GCM.
pub fn decrypt_message(
    key: &[u8; 32],
    ciphertext: &[u8],
    nonce: &[u8],
) -> Result<Vec<u8>, DecryptError> {
    if nonce.len() != NONCE_LEN {
        return Err(DecryptError::Truncated(nonce.len()));
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let nonce = Nonce::from_slice(nonce);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| DecryptError::Authentication)
}

/// Session-scoped text cipher. Wire ciphertext is base64(`nonce || sealed`).
#[derive(Clone)]
pub struct CipherBundle {
    key: [u8; 32],
}

impl CipherBundle {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn from_password(secret: &str) -> Result<Self> {
        Ok(Self::new(derive_key(secret)?))
    }

    pub fn encrypt_text(&self, text: &str) -> Result<String> {
        let (sealed, nonce) = encrypt_message(&self.key, text.as_bytes())?;
        let mut blob = nonce;
        blob.extend_from_slice(&sealed);
        Ok(BASE64.encode(blob))
    }

    pub fn decrypt_text(&self, token: &str) -> Result<String, DecryptError> {
        let blob = BASE64.decode(token)?;
        if blob.len() <= NONCE_LEN {
            return Err(DecryptError::Truncated(blob.len()));
        }
        let (nonce, sealed) = blob.split_at(NONCE_LEN);
        let plaintext = decrypt_message(&self.key, sealed, nonce)?;
        String::from_utf8(plaintext).map_err(|_| DecryptError::NotUtf8)
    }
}

impl std::fmt::Debug for CipherBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherBundle(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let bundle = CipherBundle::new(key(7));
        let token = bundle.encrypt_text("Hello from cchat!").unwrap();
        assert!(!token.contains("Hello"));
        assert_eq!(bundle.decrypt_text(&token).unwrap(), "Hello from cchat!");
    }

    #[test]
    fn same_text_encrypts_differently() {
        let bundle = CipherBundle::new(key(7));
        assert_ne!(bundle.encrypt_text("x").unwrap(), bundle.encrypt_text("x").unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let token = CipherBundle::new(key(1)).encrypt_text("Secret message").unwrap();
        let result = CipherBundle::new(key(2)).decrypt_text(&token);
        assert!(matches!(result, Err(DecryptError::Authentication)));
    }

    #[test]
    fn garbage_input_fails_cleanly() {
        let bundle = CipherBundle::new(key(1));
        assert!(matches!(bundle.decrypt_text("not base64!!"), Err(DecryptError::Encoding(_))));
        assert!(matches!(bundle.decrypt_text("AAAA"), Err(DecryptError::Truncated(3))));
    }

    #[test]
    fn password_bundles_interoperate() {
        let a = CipherBundle::from_password("shared").unwrap();
        let b = CipherBundle::from_password("shared").unwrap();
        let token = a.encrypt_text("hi").unwrap();
        assert_eq!(b.decrypt_text(&token).unwrap(), "hi");
    }
}
