use hyper::header::{AUTHORIZATION, HeaderMap};
use shared::types::{Account, Identity, ScopeFields};
use tracing::{debug, warn};

use crate::security::{AuthError, TokenCodec, scope_suffix};

pub const BEARER_PREFIX: &str = "Bearer ";

/// Anything that can hand over the raw authorization value of a call.
pub trait CredentialSource {
    fn authorization(&self) -> Option<&str>;
}

impl CredentialSource for HeaderMap {
    fn authorization(&self) -> Option<&str> {
        self.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
    }
}

/// Turns a presented credential into the caller's [`Identity`].
///
/// Both entry points, the ambient per-call source and an explicit token
/// string, end in the same merge, so resolving the same call twice yields
/// the same identity.
#[derive(Clone, Debug)]
pub struct IdentityResolver {
    tokens: TokenCodec,
}

impl IdentityResolver {
    pub fn new(tokens: TokenCodec) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    /// Resolve the credential carried by `source`.
    pub fn resolve_from<S>(&self, source: &S) -> Result<Identity, AuthError>
    where
        S: CredentialSource + ?Sized,
    {
        self.resolve(source.authorization().unwrap_or_default())
    }

    /// Resolve `"[Bearer ]<signed token>[|||<scope suffix>]"`.
    ///
    /// An empty value is `Unauthenticated` and nothing is parsed. Token
    /// errors are returned as the codec reported them.
    pub fn resolve(&self, raw: &str) -> Result<Identity, AuthError> {
        if raw.trim().is_empty() {
            debug!("No authorization value presented");
            return Err(AuthError::Unauthenticated);
        }

        let token = raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw);
        let (bare, scope) = scope_suffix::parse(token);
        if bare.is_empty() {
            return Err(AuthError::InvalidArgument("empty bearer token".into()));
        }

        let account = self.tokens.verify_account(bare).inspect_err(|e| {
            warn!("Rejected credential: {}", e.to_code());
        })?;

        let identity = Identity::merge(account, scope);
        debug!("Resolved identity: {}", identity);
        Ok(identity)
    }

    /// Issue an access token for `account` with `scope` appended, ready to
    /// be presented back as a bearer credential.
    pub fn issue_access_token(
        &self,
        account: &Account,
        scope: &ScopeFields,
    ) -> Result<String, AuthError> {
        let token = self.tokens.generate_access(account)?;
        Ok(scope_suffix::append(&token, scope))
    }
}
