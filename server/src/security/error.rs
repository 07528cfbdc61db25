use hyper::StatusCode;
use shared::types::ErrorResponse;
use thiserror::Error;

/// Failure taxonomy for identity resolution and token handling.
///
/// Codecs surface the first failure they hit; the resolver forwards these
/// unchanged so the transport can choose the user-visible response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No credential was presented at all.
    #[error("no credential presented")]
    Unauthenticated,

    /// Structurally invalid token, wrong algorithm, bad signature or
    /// unusable claims.
    #[error("malformed token: {0}")]
    TokenMalformed(String),

    /// Signature checked out but the expiry is in the past.
    #[error("token expired")]
    TokenExpired,

    /// Server misconfiguration: a signing or verification key is missing or
    /// unusable. Never reported as an invalid token.
    #[error("key not configured: {0}")]
    KeyNotConfigured(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl AuthError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "SYS.MSG.UNAUTHENTICATED_ERROR",
            Self::TokenMalformed(_) => "SYS.MSG.VALIDATION_MALFORMED_ERROR",
            Self::TokenExpired => "SYS.MSG.VALIDATION_EXPIRED_ERROR",
            Self::KeyNotConfigured(_) => "SYS.MSG.INTERNAL_ERROR",
            Self::InvalidArgument(_) => "SYS.MSG.INVALID_ARGUMENT_ERROR",
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Authentication required".to_string(),
            Self::TokenMalformed(_) => "Invalid access token".to_string(),
            Self::TokenExpired => "Access token has expired".to_string(),
            // Configuration detail stays in the logs.
            Self::KeyNotConfigured(_) => "An internal error occurred".to_string(),
            Self::InvalidArgument(reason) => format!("Invalid argument: {}", reason),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::TokenMalformed(_) | Self::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            Self::KeyNotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.to_code(), &self.to_message())
    }

    /// Configuration faults are fatal to the service, not to the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::KeyNotConfigured(_))
    }
}
