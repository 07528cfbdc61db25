use std::fs;
use tracing::{debug, error, info};

use crate::types::server_config::{AppConfig, ConfigError};

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Loading configuration from: {}", path);

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path);

    parse_config(&contents)
}

/// Parse and validate configuration text without touching the filesystem.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config: AppConfig = toml::from_str(contents)?;

    info!("Configuration loaded successfully");
    debug!("Config: {:?}", config);

    validate_config(&config)?;

    info!("Config validated");

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.bind.trim().is_empty() {
        return Err(ConfigError::InvalidConfig("bind cannot be empty".into()));
    }

    if config.auth.access_token_ttl_minutes == 0 {
        return Err(ConfigError::InvalidConfig(
            "access_token_ttl_minutes must be greater than 0".into(),
        ));
    }

    // Without a verification key no call can ever be authenticated, so
    // reject the config up front instead of failing every request later.
    if config.auth.resolved_public_key_path().is_none() {
        return Err(ConfigError::InvalidConfig(
            "public_key_path must be set via the JWT_PUBLIC_KEY_PATH env var or auth.public_key_path config field"
                .into(),
        ));
    }

    for path in [&config.links.qr_path, &config.links.doc_path] {
        if !path.starts_with('/') {
            return Err(ConfigError::InvalidConfig(format!(
                "link path must start with '/': {}",
                path
            )));
        }
    }

    Ok(())
}
