//! Encryption for the persisted session.
//!
//! Sealed layout: `MAGIC | salt (16) | nonce (12) | ciphertext`. The key is
//! derived from the passphrase with Argon2 using the per-file salt.

use anyhow::{anyhow, bail, Result};
use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;

const MAGIC: &[u8; 4] = b"TSV1";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const PASSPHRASE_BYTES: usize = 32;

pub struct Vault {
    passphrase: String,
}

/// Random hex passphrase for a new vault.
pub fn generate_passphrase() -> String {
    let mut bytes = [0u8; PASSPHRASE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl Vault {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }

    fn derive_key(&self, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(self.passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| anyhow!("Failed to derive session key: {}", e))?;
        Ok(key)
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let key = self.derive_key(&salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| anyhow!("Failed to encrypt session"))?;

        let mut sealed = Vec::with_capacity(MAGIC.len() + SALT_LEN + NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(MAGIC);
        sealed.extend_from_slice(&salt);
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        let header = MAGIC.len() + SALT_LEN + NONCE_LEN;
        if sealed.len() <= header || &sealed[..MAGIC.len()] != MAGIC {
            bail!("Session file is not a sealed session");
        }
        let salt = &sealed[MAGIC.len()..MAGIC.len() + SALT_LEN];
        let nonce = &sealed[MAGIC.len() + SALT_LEN..header];

        let key = self.derive_key(salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        cipher
            .decrypt(Nonce::from_slice(nonce), &sealed[header..])
            .map_err(|_| anyhow!("Failed to decrypt session (wrong key or corrupted file)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_open() {
        let vault = Vault::new(generate_passphrase());
        let sealed = vault.seal(b"{\"access_token\":\"abc\"}").unwrap();
        assert_eq!(&sealed[..4], MAGIC);
        assert!(!sealed.windows(3).any(|w| w == b"abc"));
        assert_eq!(vault.open(&sealed).unwrap(), b"{\"access_token\":\"abc\"}");
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let sealed = Vault::new("right").seal(b"secret").unwrap();
        assert!(Vault::new("wrong").open(&sealed).is_err());
    }

    #[test]
    fn test_tampered_or_foreign_data_fails() {
        let vault = Vault::new("p");
        let mut sealed = vault.seal(b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        assert!(vault.open(&sealed).is_err());
        assert!(vault.open(b"{\"plain\": true}").is_err());
    }

    #[test]
    fn test_generate_passphrase() {
        let a = generate_passphrase();
        assert_eq!(a.len(), PASSPHRASE_BYTES * 2);
        assert_ne!(a, generate_passphrase());
    }
}
