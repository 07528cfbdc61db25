use serde::{Deserialize, Serialize};

use crate::types::identity::Account;

/// Claims embedded in every identity token issued by the service.
///
/// Every field is string-typed on the wire: numeric values are stringified
/// when the token is built and parsed back when it is verified. Existing
/// clients depend on this, so do not switch the numbers to JSON numbers.
///
/// Access tokens carry `exp`; refresh tokens omit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserClaims {
    #[serde(default)]
    pub user_id: String,

    #[serde(default)]
    pub partner_id: String,

    /// Only emitted when the account has one; older tokens never carry it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_code: Option<String>,

    #[serde(default)]
    pub partner_name: String,

    /// Offset at login time, e.g. `"7"`, `"2.5"` or the sentinel `"-99"`.
    #[serde(default)]
    pub diff_hour: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub full_name: String,

    #[serde(default)]
    pub device_id: String,

    #[serde(default)]
    pub account_type: String,

    #[serde(default)]
    pub ip: String,

    /// Standard JWT expiry (Unix timestamp, seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl UserClaims {
    pub fn from_account(account: &Account, exp: Option<i64>) -> Self {
        Self {
            user_id: account.id.to_string(),
            partner_id: account.partner_id.to_string(),
            partner_code: Some(account.partner_code.clone()).filter(|c| !c.is_empty()),
            partner_name: account.partner_name.clone(),
            diff_hour: account.diff_hour.to_string(),
            username: account.username.clone().unwrap_or_default(),
            full_name: account.full_name.clone(),
            device_id: account.device_id.to_string(),
            account_type: account.account_type.to_string(),
            ip: account.ip.clone(),
            exp,
        }
    }

    pub fn is_refresh(&self) -> bool {
        self.exp.is_none()
    }
}

/// Claims of a short-lived, non-identity token (password reset links and
/// similar). The caller's payload lives under `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpaqueClaims<T> {
    pub iss: String,
    pub exp: i64,
    pub data: T,
}
