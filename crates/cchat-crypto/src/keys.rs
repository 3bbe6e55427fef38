use anyhow::{Result, anyhow};
use argon2::Argon2;

/// Fixed salt shared by every client. Keeps setup to "everyone types the same password".
pub const SHARED_SALT: &[u8] = b"cchat-shared-salt";

/// Derive a 256-bit AES key from the shared secret.
/// The secret itself is never stored; callers keep only the derived key, in memory.
pub fn derive_key(secret: &str) -> Result<[u8; 32]> {
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(secret.as_bytes(), SHARED_SALT, &mut key)
        .map_err(|e| anyhow!("Key derivation failed: {}", e))?;
    Ok(key)
}
