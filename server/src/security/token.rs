use std::sync::Arc;

use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use jsonwebtoken::{Algorithm, Header, Validation};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::types::{Account, AuthConfig, DIFF_HOUR_UNSET, OpaqueClaims, UserClaims};
use tracing::debug;

use crate::security::clock::{SharedClock, SystemClock, calculate_expiry, is_expired};
use crate::security::scope_suffix;
use crate::security::{AuthError, TokenKeys};

/// Every token is signed and verified with this algorithm only.
pub const ALGORITHM: Algorithm = Algorithm::RS256;

const DEFAULT_ACCESS_TTL_SECS: i64 = 60 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 60 * 60 * 24 * 30;

/// Issues and verifies signed identity tokens and opaque payload tokens.
///
/// Cheap to clone; the keypair is shared and never mutated.
#[derive(Clone)]
pub struct TokenCodec {
    keys: Arc<TokenKeys>,
    clock: SharedClock,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    opaque_issuer: String,
}

impl TokenCodec {
    pub fn new(keys: TokenKeys) -> Self {
        Self {
            keys: Arc::new(keys),
            clock: Arc::new(SystemClock),
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            opaque_issuer: "issuer".to_string(),
        }
    }

    pub fn from_config(keys: TokenKeys, config: &AuthConfig) -> Self {
        Self::new(keys)
            .with_access_ttl(config.access_token_ttl_secs() as i64)
            .with_refresh_ttl(config.refresh_token_ttl_secs() as i64)
            .with_issuer(&config.opaque_issuer)
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_access_ttl(mut self, secs: i64) -> Self {
        self.access_ttl_secs = secs;
        self
    }

    /// Lifetime advertised to clients for refresh tokens. The token itself
    /// carries no expiry.
    pub fn with_refresh_ttl(mut self, secs: i64) -> Self {
        self.refresh_ttl_secs = secs;
        self
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.opaque_issuer = issuer.to_string();
        self
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    // ── Identity tokens ───────────────────────────────────────────────────────

    /// Sign the authentication fields of `account`.
    ///
    /// Refresh tokens carry no expiry. Access tokens expire `ttl_secs` from
    /// now; a negative ttl yields a token that is already expired.
    pub fn generate(
        &self,
        account: &Account,
        is_refresh: bool,
        ttl_secs: i64,
    ) -> Result<String, AuthError> {
        let exp = if is_refresh {
            None
        } else {
            Some(calculate_expiry(self.clock.now(), ttl_secs))
        };

        let claims = UserClaims::from_account(account, exp);
        let token = self.sign(&claims)?;

        debug!(
            "Issued {} token for user_id={}",
            if is_refresh { "refresh" } else { "access" },
            account.id
        );
        Ok(token)
    }

    pub fn generate_access(&self, account: &Account) -> Result<String, AuthError> {
        self.generate(account, false, self.access_ttl_secs)
    }

    pub fn generate_refresh(&self, account: &Account) -> Result<String, AuthError> {
        self.generate(account, true, 0)
    }

    /// Verify an identity token and return its raw claims.
    ///
    /// Anything from the `|||` delimiter on is scope suffix and is cut off
    /// before the signature is checked.
    pub fn verify(&self, token: &str) -> Result<UserClaims, AuthError> {
        let (bare, _) = scope_suffix::split(token);
        self.decode_checked(bare, |c: &UserClaims| c.exp)
    }

    /// [`verify`](Self::verify) followed by conversion to a typed account.
    pub fn verify_account(&self, token: &str) -> Result<Account, AuthError> {
        claims_to_account(self.verify(token)?)
    }

    // ── Opaque tokens ─────────────────────────────────────────────────────────

    /// Wrap an arbitrary payload under the `data` claim, with issuer and an
    /// expiry `ttl_secs` from now.
    pub fn make_opaque_token<T: Serialize>(
        &self,
        payload: &T,
        ttl_secs: i64,
    ) -> Result<String, AuthError> {
        let claims = OpaqueClaims {
            iss: self.opaque_issuer.clone(),
            exp: calculate_expiry(self.clock.now(), ttl_secs),
            data: payload,
        };
        self.sign(&claims)
    }

    /// Verify an opaque token and return its `data` payload.
    pub fn parse_opaque_token<T: DeserializeOwned>(&self, token: &str) -> Result<T, AuthError> {
        let claims: OpaqueClaims<T> = self.decode_checked(token, |c: &OpaqueClaims<T>| Some(c.exp))?;
        Ok(claims.data)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn sign<C: Serialize>(&self, claims: &C) -> Result<String, AuthError> {
        let key = self.keys.signing_key()?;
        jsonwebtoken::encode(&Header::new(ALGORITHM), claims, key).map_err(map_encode_error)
    }

    /// Signature first, then expiry against our own clock, so an expired
    /// token is only reported as such when its signature is good.
    fn decode_checked<C, F>(&self, token: &str, expiry_of: F) -> Result<C, AuthError>
    where
        C: DeserializeOwned,
        F: Fn(&C) -> Option<i64>,
    {
        let key = self.keys.verification_key()?;

        if token.is_empty() {
            return Err(AuthError::TokenMalformed("empty token".into()));
        }

        let data = jsonwebtoken::decode::<C>(token, key, &validation()).map_err(map_decode_error)?;

        if let Some(exp) = expiry_of(&data.claims) {
            if is_expired(exp, self.clock.now()) {
                return Err(AuthError::TokenExpired);
            }
        }

        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("keys", &self.keys)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("opaque_issuer", &self.opaque_issuer)
            .finish()
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(ALGORITHM);
    // Expiry is checked after decoding, against the injected clock. Refresh
    // tokens have no `exp`, so nothing is required.
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.required_spec_claims.clear();
    validation
}

fn map_decode_error(err: JwtError) -> AuthError {
    match err.kind() {
        JwtErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenMalformed(err.to_string()),
    }
}

fn map_encode_error(err: JwtError) -> AuthError {
    match err.kind() {
        JwtErrorKind::InvalidRsaKey(_) | JwtErrorKind::InvalidKeyFormat => {
            AuthError::KeyNotConfigured(err.to_string())
        }
        _ => AuthError::InvalidArgument(err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Trust boundary: wire claims -> typed account
// ---------------------------------------------------------------------------

/// Convert verified claims into an [`Account`].
///
/// Missing numeric claims read as 0 and a missing offset as the sentinel.
/// A missing user id, or any numeric claim that does not parse, makes the
/// token unusable.
pub fn claims_to_account(claims: UserClaims) -> Result<Account, AuthError> {
    if claims.user_id.trim().is_empty() {
        return Err(AuthError::TokenMalformed("missing userId claim".into()));
    }

    Ok(Account {
        id: parse_claim("userId", &claims.user_id)?,
        username: Some(claims.username).filter(|u| !u.is_empty()),
        partner_id: parse_claim("partnerId", &claims.partner_id)?,
        partner_code: claims.partner_code.unwrap_or_default(),
        partner_name: claims.partner_name,
        full_name: claims.full_name,
        device_id: parse_claim("deviceId", &claims.device_id)?,
        account_type: parse_claim("accountType", &claims.account_type)?,
        ip: claims.ip,
        diff_hour: claims.diff_hour.trim().parse().unwrap_or(DIFF_HOUR_UNSET),
    })
}

fn parse_claim<T>(name: &str, value: &str) -> Result<T, AuthError>
where
    T: std::str::FromStr + Default,
{
    let value = value.trim();
    if value.is_empty() {
        return Ok(T::default());
    }
    value
        .parse()
        .map_err(|_| AuthError::TokenMalformed(format!("claim {} is not a valid integer", name)))
}
