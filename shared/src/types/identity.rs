use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel time-zone offset meaning "unspecified, do not shift".
pub const DIFF_HOUR_UNSET: f64 = -99.0;

// ---------------------------------------------------------------------------
// Account (signed fragment)
// ---------------------------------------------------------------------------

/// The authentication fields of a caller, i.e. exactly what gets signed into
/// an identity token.
///
/// Tenant scope (company / branch / department) is deliberately absent: it
/// travels in the unsigned scope suffix, see [`ScopeFields`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub username: Option<String>,
    pub partner_id: i64,
    pub partner_code: String,
    pub partner_name: String,
    pub full_name: String,
    pub device_id: i64,
    pub account_type: i32,
    pub ip: String,
    /// Offset recorded at login. `DIFF_HOUR_UNSET` when the client sent none.
    pub diff_hour: f64,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            id: 0,
            username: None,
            partner_id: 0,
            partner_code: String::new(),
            partner_name: String::new(),
            full_name: String::new(),
            device_id: 0,
            account_type: 0,
            ip: String::new(),
            diff_hour: DIFF_HOUR_UNSET,
        }
    }
}

// ---------------------------------------------------------------------------
// Scope (unsigned suffix)
// ---------------------------------------------------------------------------

/// Advisory tenant scope carried after the `|||` delimiter.
///
/// Never covered by the token signature. Treat as context supplied by the
/// transport, not as proof of membership.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeFields {
    pub company_id: i64,
    pub branch_id: i64,
    pub department_id: i64,
    pub diff_hour: f64,
}

impl ScopeFields {
    pub fn new(company_id: i64, branch_id: i64, department_id: i64, diff_hour: f64) -> Self {
        Self {
            company_id,
            branch_id,
            department_id,
            diff_hour,
        }
    }

    /// True when no suffix needs to be emitted for this scope.
    pub fn is_default(&self) -> bool {
        self.company_id == 0
            && self.branch_id == 0
            && self.department_id == 0
            && self.diff_hour == DIFF_HOUR_UNSET
    }
}

impl Default for ScopeFields {
    fn default() -> Self {
        Self::new(0, 0, 0, DIFF_HOUR_UNSET)
    }
}

// ---------------------------------------------------------------------------
// Identity (resolved caller)
// ---------------------------------------------------------------------------

/// The caller of one inbound request: verified account fields merged with
/// the advisory scope suffix.
///
/// Built fresh per call and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: i64,
    pub username: Option<String>,
    pub partner_id: i64,
    pub partner_code: String,
    pub partner_name: String,
    pub full_name: String,
    pub device_id: i64,
    pub account_type: i32,
    pub ip: String,
    pub diff_hour: f64,
    pub company_id: i64,
    pub branch_id: i64,
    pub department_id: i64,
}

impl Identity {
    /// Merge a verified account with its scope.
    ///
    /// The suffix offset wins when it was supplied; otherwise the signed
    /// offset recorded at login is used.
    pub fn merge(account: Account, scope: ScopeFields) -> Self {
        let diff_hour = if scope.diff_hour != DIFF_HOUR_UNSET {
            scope.diff_hour
        } else {
            account.diff_hour
        };

        Self {
            user_id: account.id,
            username: account.username,
            partner_id: account.partner_id,
            partner_code: account.partner_code,
            partner_name: account.partner_name,
            full_name: account.full_name,
            device_id: account.device_id,
            account_type: account.account_type,
            ip: account.ip,
            diff_hour,
            company_id: scope.company_id,
            branch_id: scope.branch_id,
            department_id: scope.department_id,
        }
    }

    pub fn scope(&self) -> ScopeFields {
        ScopeFields::new(
            self.company_id,
            self.branch_id,
            self.department_id,
            self.diff_hour,
        )
    }

    pub fn has_diff_hour(&self) -> bool {
        self.diff_hour != DIFF_HOUR_UNSET
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user_id={}, partner_id={}, company_id={}, branch_id={}, department_id={}",
            self.user_id, self.partner_id, self.company_id, self.branch_id, self.department_id
        )
    }
}
