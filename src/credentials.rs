//! Credential encryption and resolution.
//!
//! Per-link API keys are stored encrypted (`EncryptedSecret`, hex encoded).
//! At webhook time the resolver turns a link into usable tokens, applying the
//! precedence rules:
//!
//! - Linear: anonymous events always use the application admin key; otherwise
//!   the global `LINEAR_API_KEY` wins over the link's decrypted key.
//! - GitHub: the global `GITHUB_API_KEY` wins over the link's decrypted key.

use std::fmt;
use std::sync::Arc;

use aes_gcm::aead::rand_core::RngCore as _;
use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use thiserror::Error;

use crate::config::CredentialOverrides;
use crate::types::{EncryptedSecret, SyncLink};

const KEY_BYTES: usize = 32;
const NONCE_BYTES: usize = 12;
const AAD: &[u8] = b"tracker-sync-credential";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no encryption key configured")]
    MissingKey,

    #[error("encryption key must be 32 bytes (raw) or 64 hex characters")]
    InvalidKey,

    #[error("stored credential is not valid hex")]
    Encoding(#[from] hex::FromHexError),

    #[error("stored credential IV must be {NONCE_BYTES} bytes")]
    InvalidIv,

    #[error("credential encryption failed")]
    Encrypt,

    /// Wrong key or tampered ciphertext.
    #[error("credential integrity check failed")]
    Decrypt,

    #[error("decrypted credential is not valid UTF-8")]
    Utf8,

    #[error("anonymous events require LINEAR_APPLICATION_ADMIN_KEY")]
    MissingAdminKey,
}

/// Symmetric encryption of stored API keys.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret, CredentialError>;

    fn decrypt(&self, secret: &EncryptedSecret) -> Result<String, CredentialError>;
}

/// AES-256-GCM with a random 96-bit IV per secret.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    /// Builds a cipher from a 64-character hex key or a 32-byte raw key.
    pub fn from_key(key: &str) -> Result<Self, CredentialError> {
        let key_material = if key.len() == KEY_BYTES * 2 {
            hex::decode(key).map_err(|_| CredentialError::InvalidKey)?
        } else if key.len() == KEY_BYTES {
            key.as_bytes().to_vec()
        } else {
            return Err(CredentialError::InvalidKey);
        };

        let cipher =
            Aes256Gcm::new_from_slice(&key_material).map_err(|_| CredentialError::InvalidKey)?;
        Ok(AesGcmCipher { cipher })
    }
}

impl fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesGcmCipher(..)")
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret, CredentialError> {
        let mut nonce = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: AAD,
                },
            )
            .map_err(|_| CredentialError::Encrypt)?;

        Ok(EncryptedSecret {
            ciphertext: hex::encode(ciphertext),
            iv: hex::encode(nonce),
        })
    }

    fn decrypt(&self, secret: &EncryptedSecret) -> Result<String, CredentialError> {
        let nonce = hex::decode(&secret.iv)?;
        if nonce.len() != NONCE_BYTES {
            return Err(CredentialError::InvalidIv);
        }
        let ciphertext = hex::decode(&secret.ciphertext)?;

        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: AAD,
                },
            )
            .map_err(|_| CredentialError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CredentialError::Utf8)
    }
}

/// Tokens for one webhook's worth of remote calls.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub github_token: String,
    pub linear_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("github_token", &"<redacted>")
            .field("linear_token", &"<redacted>")
            .finish()
    }
}

/// Applies the precedence rules between global overrides and stored keys.
#[derive(Clone)]
pub struct CredentialResolver {
    overrides: CredentialOverrides,
    cipher: Option<Arc<dyn Cipher>>,
}

impl CredentialResolver {
    pub fn new(overrides: CredentialOverrides, cipher: Option<Arc<dyn Cipher>>) -> Self {
        CredentialResolver { overrides, cipher }
    }

    pub fn resolve(&self, link: &SyncLink, anonymous: bool) -> Result<Credentials, CredentialError> {
        let linear_token = if anonymous {
            self.overrides
                .linear_admin_key
                .clone()
                .ok_or(CredentialError::MissingAdminKey)?
        } else {
            match &self.overrides.linear_api_key {
                Some(key) => key.clone(),
                None => self.decrypt(&link.sync.linear_api_key)?,
            }
        };

        let github_token = match &self.overrides.github_api_key {
            Some(key) => key.clone(),
            None => self.decrypt(&link.sync.github_api_key)?,
        };

        Ok(Credentials {
            github_token,
            linear_token,
        })
    }

    /// Decrypts a GitHub key for work outside a webhook (the retry sweep).
    pub fn github_token(&self, link: &SyncLink) -> Result<String, CredentialError> {
        match &self.overrides.github_api_key {
            Some(key) => Ok(key.clone()),
            None => self.decrypt(&link.sync.github_api_key),
        }
    }

    fn decrypt(&self, secret: &EncryptedSecret) -> Result<String, CredentialError> {
        self.cipher
            .as_ref()
            .ok_or(CredentialError::MissingKey)?
            .decrypt(secret)
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("has_cipher", &self.cipher.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;
    use proptest::prelude::*;

    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn cipher() -> AesGcmCipher {
        AesGcmCipher::from_key(HEX_KEY).unwrap()
    }

    fn link_with_keys(cipher: &AesGcmCipher) -> SyncLink {
        let mut link = fixtures::link();
        link.sync.github_api_key = cipher.encrypt("ghp_stored").unwrap();
        link.sync.linear_api_key = cipher.encrypt("lin_stored").unwrap();
        link
    }

    #[test]
    fn key_formats() {
        assert!(AesGcmCipher::from_key(HEX_KEY).is_ok());
        assert!(AesGcmCipher::from_key("0123456789abcdef0123456789abcdef").is_ok());
        assert!(matches!(
            AesGcmCipher::from_key("short"),
            Err(CredentialError::InvalidKey)
        ));
        assert!(matches!(
            AesGcmCipher::from_key(&"zz".repeat(32)),
            Err(CredentialError::InvalidKey)
        ));
    }

    #[test]
    fn encryption_uses_fresh_iv() {
        let cipher = cipher();
        let a = cipher.encrypt("secret").unwrap();
        let b = cipher.encrypt("secret").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_eq!(a.iv.len(), NONCE_BYTES * 2);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let cipher = cipher();
        let mut secret = cipher.encrypt("secret").unwrap();
        let flipped = if secret.ciphertext.starts_with('0') { "1" } else { "0" };
        secret.ciphertext.replace_range(0..1, flipped);
        assert!(matches!(cipher.decrypt(&secret), Err(CredentialError::Decrypt)));
    }

    #[test]
    fn wrong_key_fails() {
        let secret = cipher().encrypt("secret").unwrap();
        let other = AesGcmCipher::from_key(&"ab".repeat(32)).unwrap();
        assert!(matches!(other.decrypt(&secret), Err(CredentialError::Decrypt)));
    }

    #[test]
    fn stored_keys_used_without_overrides() {
        let cipher = Arc::new(cipher());
        let link = link_with_keys(&cipher);
        let resolver = CredentialResolver::new(CredentialOverrides::default(), Some(cipher));

        let creds = resolver.resolve(&link, false).unwrap();
        assert_eq!(creds.github_token, "ghp_stored");
        assert_eq!(creds.linear_token, "lin_stored");
    }

    #[test]
    fn global_overrides_win() {
        let cipher = Arc::new(cipher());
        let link = link_with_keys(&cipher);
        let overrides = CredentialOverrides {
            linear_api_key: Some("lin_global".into()),
            github_api_key: Some("ghp_global".into()),
            linear_admin_key: None,
        };
        let resolver = CredentialResolver::new(overrides, Some(cipher));

        let creds = resolver.resolve(&link, false).unwrap();
        assert_eq!(creds.github_token, "ghp_global");
        assert_eq!(creds.linear_token, "lin_global");
    }

    #[test]
    fn anonymous_events_always_use_admin_key() {
        let cipher = Arc::new(cipher());
        let link = link_with_keys(&cipher);
        let overrides = CredentialOverrides {
            linear_api_key: Some("lin_global".into()),
            github_api_key: None,
            linear_admin_key: Some("lin_admin".into()),
        };
        let resolver = CredentialResolver::new(overrides, Some(cipher));

        let creds = resolver.resolve(&link, true).unwrap();
        assert_eq!(creds.linear_token, "lin_admin");
        assert_eq!(creds.github_token, "ghp_stored");
    }

    #[test]
    fn anonymous_without_admin_key_fails() {
        let cipher = Arc::new(cipher());
        let link = link_with_keys(&cipher);
        let resolver = CredentialResolver::new(CredentialOverrides::default(), Some(cipher));
        assert!(matches!(
            resolver.resolve(&link, true),
            Err(CredentialError::MissingAdminKey)
        ));
    }

    #[test]
    fn missing_cipher_is_reported() {
        let link = fixtures::link();
        let resolver = CredentialResolver::new(CredentialOverrides::default(), None);
        assert!(matches!(
            resolver.resolve(&link, false),
            Err(CredentialError::MissingKey)
        ));
    }

    #[test]
    fn debug_redacts_tokens() {
        let creds = Credentials {
            github_token: "ghp_secret".into(),
            linear_token: "lin_secret".into(),
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret"));
    }

    proptest! {
        #[test]
        fn decrypt_inverts_encrypt(plaintext in "\\PC{0,64}") {
            let cipher = cipher();
            let secret = cipher.encrypt(&plaintext).unwrap();
            prop_assert_eq!(cipher.decrypt(&secret).unwrap(), plaintext);
        }
    }
}
