//! Unsigned tenant scope appended to a signed token.
//!
//! Wire form: `<signed token>|||<company>|<branch>|<department>[|<diff hour>]`.
//! The suffix is outside the signature; see [`ScopeFields`].

use shared::types::{DIFF_HOUR_UNSET, ScopeFields};

/// Separates the signed token from its scope suffix.
pub const DELIMITER: &str = "|||";

const FIELD_SEPARATOR: char = '|';

/// Value an id field decodes to when present but not an integer.
pub const UNPARSEABLE_ID: i64 = -1;

/// Split `token` at the first delimiter into `(bare token, suffix)`.
pub fn split(token: &str) -> (&str, Option<&str>) {
    match token.split_once(DELIMITER) {
        Some((bare, suffix)) => (bare, Some(suffix)),
        None => (token, None),
    }
}

/// Append `scope` to `token`, replacing any suffix already present.
///
/// The default scope leaves `token` untouched, suffix included. Otherwise
/// three fields are emitted when the offset is unset, four when it is set.
pub fn append(token: &str, scope: &ScopeFields) -> String {
    if scope.is_default() {
        return token.to_string();
    }

    let (bare, _) = split(token);

    let mut out = format!(
        "{}{}{}{sep}{}{sep}{}",
        bare,
        DELIMITER,
        scope.company_id,
        scope.branch_id,
        scope.department_id,
        sep = FIELD_SEPARATOR
    );
    if scope.diff_hour != DIFF_HOUR_UNSET {
        out.push(FIELD_SEPARATOR);
        out.push_str(&scope.diff_hour.to_string());
    }
    out
}

pub fn append_fields(
    token: &str,
    company_id: i64,
    branch_id: i64,
    department_id: i64,
    diff_hour: f64,
) -> String {
    append(
        token,
        &ScopeFields::new(company_id, branch_id, department_id, diff_hour),
    )
}

/// Split `token` into its bare part and scope. Never fails.
///
/// A missing suffix, or one with fewer than three fields, is the default
/// scope. A missing fourth field (older tokens) leaves the offset unset.
pub fn parse(token: &str) -> (&str, ScopeFields) {
    let (bare, suffix) = split(token);
    let scope = suffix.map(parse_suffix).unwrap_or_default();
    (bare, scope)
}

/// Decode the fields after the delimiter.
///
/// Id fields that are present but not integers decode to
/// [`UNPARSEABLE_ID`]; an offset that is not a number leaves it unset.
pub fn parse_suffix(suffix: &str) -> ScopeFields {
    let parts: Vec<&str> = suffix.split(FIELD_SEPARATOR).collect();
    if parts.len() < 3 {
        return ScopeFields::default();
    }

    let id = |s: &str| s.parse::<i64>().unwrap_or(UNPARSEABLE_ID);
    let diff_hour = parts
        .get(3)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(DIFF_HOUR_UNSET);

    ScopeFields::new(id(parts[0]), id(parts[1]), id(parts[2]), diff_hour)
}
