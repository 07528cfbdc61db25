pub mod identity;
pub mod json_error;
pub mod jwt;
pub mod server_config;

pub use self::identity::{Account, DIFF_HOUR_UNSET, Identity, ScopeFields};
pub use self::json_error::ErrorResponse;
pub use self::jwt::{OpaqueClaims, UserClaims};
pub use self::server_config::{AppConfig, AuthConfig, ConfigError, LinksConfig, ServerConfig};
