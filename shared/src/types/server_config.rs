use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// PEM file holding the RSA private key used to sign tokens.
    ///
    /// Optional: a verify-only deployment can omit it, in which case any
    /// attempt to issue a token fails with a key-configuration error.
    /// `JWT_PRIVATE_KEY_PATH` takes priority over this field.
    pub private_key_path: Option<String>,
    /// PEM file holding the RSA public key used to verify tokens.
    /// `JWT_PUBLIC_KEY_PATH` takes priority over this field.
    pub public_key_path: Option<String>,
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_minutes: u64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_minutes: u64,
    #[serde(default = "default_opaque_issuer")]
    pub opaque_issuer: String,
    /// Paths that skip identity resolution. `:name` segments match anything.
    #[serde(default)]
    pub public_paths: HashSet<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinksConfig {
    #[serde(default = "default_qr_path")]
    pub qr_path: String,
    #[serde(default = "default_doc_path")]
    pub doc_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub links: LinksConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// Full bind address, e.g. `"0.0.0.0:1337"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port.unwrap_or(1337))
    }
}

impl AuthConfig {
    pub fn access_token_ttl_secs(&self) -> u64 {
        self.access_token_ttl_minutes * 60
    }

    pub fn refresh_token_ttl_secs(&self) -> u64 {
        self.refresh_token_ttl_minutes * 60
    }

    /// Resolve the signing key path with `JWT_PRIVATE_KEY_PATH` taking
    /// priority over the config file field.
    pub fn resolved_private_key_path(&self) -> Option<String> {
        resolve_path("JWT_PRIVATE_KEY_PATH", self.private_key_path.as_ref())
    }

    /// Resolve the verification key path with `JWT_PUBLIC_KEY_PATH` taking
    /// priority over the config file field.
    ///
    /// Returns `None` when neither source is set (startup treats this as a
    /// hard error).
    pub fn resolved_public_key_path(&self) -> Option<String> {
        resolve_path("JWT_PUBLIC_KEY_PATH", self.public_key_path.as_ref())
    }
}

fn resolve_path(env_var: &str, fallback: Option<&String>) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| fallback.cloned())
        .filter(|s| !s.trim().is_empty())
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            qr_path: default_qr_path(),
            doc_path: default_doc_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

pub fn default_port() -> Option<u16> {
    Some(1337)
}

pub fn default_access_ttl() -> u64 {
    60
}

pub fn default_refresh_ttl() -> u64 {
    60 * 24 * 30
}

pub fn default_opaque_issuer() -> String {
    "issuer".to_string()
}

pub fn default_qr_path() -> String {
    "/orbit".to_string()
}

pub fn default_doc_path() -> String {
    "/doc/file/v1".to_string()
}
