use std::fmt;
use std::fs;

use anyhow::{Context, Result};
use jsonwebtoken::{DecodingKey, EncodingKey};
use shared::types::AuthConfig;
use tracing::{info, warn};

use crate::security::AuthError;

/// The service's RSA keypair, loaded once at startup and read-only after.
///
/// Either half may be absent: a verify-only deployment has no private key.
/// Using a missing half is reported as [`AuthError::KeyNotConfigured`],
/// never as a bad token.
#[derive(Clone, Default)]
pub struct TokenKeys {
    signing: Option<EncodingKey>,
    verification: Option<DecodingKey>,
}

impl TokenKeys {
    /// Build from PEM bytes (PKCS#1 or PKCS#8 private key, SPKI or PKCS#1
    /// public key).
    pub fn from_pem(private_pem: Option<&[u8]>, public_pem: Option<&[u8]>) -> Result<Self, AuthError> {
        let signing = private_pem
            .map(EncodingKey::from_rsa_pem)
            .transpose()
            .map_err(|e| AuthError::KeyNotConfigured(format!("invalid signing key: {}", e)))?;

        let verification = public_pem
            .map(DecodingKey::from_rsa_pem)
            .transpose()
            .map_err(|e| AuthError::KeyNotConfigured(format!("invalid verification key: {}", e)))?;

        Ok(Self {
            signing,
            verification,
        })
    }

    /// Only the public half; issuing tokens will fail.
    pub fn verify_only(public_pem: &[u8]) -> Result<Self, AuthError> {
        Self::from_pem(None, Some(public_pem))
    }

    /// Read the PEM files named in the auth config (env overrides applied).
    pub fn load(config: &AuthConfig) -> Result<Self> {
        let private_pem = match config.resolved_private_key_path() {
            Some(path) => Some(
                fs::read(&path).with_context(|| format!("Failed to read signing key {}", path))?,
            ),
            None => {
                warn!("No signing key configured; token issuing is disabled");
                None
            }
        };

        let public_path = config
            .resolved_public_key_path()
            .context("No verification key configured")?;
        let public_pem = fs::read(&public_path)
            .with_context(|| format!("Failed to read verification key {}", public_path))?;

        let keys = Self::from_pem(private_pem.as_deref(), Some(&public_pem))
            .context("Failed to parse token keys")?;

        info!(
            "Token keys loaded (signing: {}, verification: {})",
            keys.can_sign(),
            keys.can_verify()
        );
        Ok(keys)
    }

    pub fn signing_key(&self) -> Result<&EncodingKey, AuthError> {
        self.signing
            .as_ref()
            .ok_or_else(|| AuthError::KeyNotConfigured("signing key is not configured".into()))
    }

    pub fn verification_key(&self) -> Result<&DecodingKey, AuthError> {
        self.verification
            .as_ref()
            .ok_or_else(|| AuthError::KeyNotConfigured("verification key is not configured".into()))
    }

    pub fn can_sign(&self) -> bool {
        self.signing.is_some()
    }

    pub fn can_verify(&self) -> bool {
        self.verification.is_some()
    }
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key material stays out of logs.
        f.debug_struct("TokenKeys")
            .field("signing", &self.can_sign())
            .field("verification", &self.can_verify())
            .finish()
    }
}
