//! Keyless tamper-evidence for shareable links.
//!
//! The checksum is the hex SHA-256 of `"<path>?<canonical query>"` where the
//! canonical query is the link's own parameters, minus `checksum`, sorted by
//! key and form-encoded. Anyone who knows the scheme can produce a valid
//! checksum; it catches accidental or casual edits, nothing more.

use sha2::{Digest, Sha256};
use tracing::debug;

pub const CHECKSUM_PARAM: &str = "checksum";

/// Hex SHA-256 of an already canonical `path?query` string.
pub fn sign(path_and_query: &str) -> String {
    sign_bytes(path_and_query.as_bytes())
}

fn sign_bytes(canonical: &[u8]) -> String {
    hex::encode(Sha256::digest(canonical))
}

/// Canonical string for `path` with `params`, as signed by [`sign_params`].
pub fn canonical_string<K, V>(path: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    format!("{}?{}", path, encode_query(params))
}

/// Checksum for a link to `path` carrying `params`.
pub fn sign_params<K, V>(path: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    sign(&canonical_string(path, params))
}

/// Append a checksum to `params` and render the final link.
///
/// The checksum lands in its sorted position like any other parameter.
pub fn signed_link<K, V>(path: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let checksum = sign_params(path, params);

    let mut all: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_ref()))
        .collect();
    all.push((CHECKSUM_PARAM, checksum.as_str()));

    canonical_string(path, &all)
}

/// Check the `checksum` parameter of a path or full URL.
///
/// Never errors: a missing or empty checksum, or any mismatch, is `false`.
/// Scheme and authority, when present, are ignored; only the path and query
/// take part. The path is hashed percent-decoded and query values are
/// re-encoded from their raw bytes, so escapes that are not UTF-8 survive.
pub fn verify(url: &str) -> bool {
    let (raw_path, query) = split_path_and_query(url);

    let mut checksum: Option<Vec<u8>> = None;
    let mut rest: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    for (key, value) in parse_query(query) {
        if key == CHECKSUM_PARAM.as_bytes() {
            // First occurrence wins, every occurrence is removed.
            checksum.get_or_insert(value);
        } else {
            rest.push((key, value));
        }
    }

    let Some(checksum) = checksum.filter(|c| !c.is_empty()) else {
        debug!("Link has no checksum: {}", raw_path);
        return false;
    };

    let mut canonical = urlencoding::decode_binary(raw_path.as_bytes()).into_owned();
    canonical.push(b'?');
    canonical.extend_from_slice(encode_pairs(&rest).as_bytes());

    let expected = sign_bytes(&canonical);
    if checksum == expected.as_bytes() {
        return true;
    }

    debug!(
        "Link checksum mismatch: client={} server={} ({})",
        String::from_utf8_lossy(&checksum),
        expected,
        String::from_utf8_lossy(&canonical)
    );
    false
}

/// Sorted, form-encoded query string.
///
/// Keys are sorted bytewise; values of a repeated key keep their relative
/// order. Only `A-Z a-z 0-9 - _ . ~` are left as-is, space becomes `+`,
/// everything else is `%XX`.
pub fn encode_query<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let bytes: Vec<(&[u8], &[u8])> = params
        .iter()
        .map(|(k, v)| (k.as_ref().as_bytes(), v.as_ref().as_bytes()))
        .collect();
    encode_pairs(&bytes)
}

fn encode_pairs<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let mut sorted: Vec<(&[u8], &[u8])> = params
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_ref()))
        .collect();
    // Stable: equal keys keep insertion order.
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Form-encode one component.
///
/// `form_urlencoded` keeps `*` and escapes `~`; links have always been
/// signed with the opposite convention, so those two are swapped back.
fn escape(component: &[u8]) -> String {
    form_urlencoded::byte_serialize(component)
        .collect::<String>()
        .replace('*', "%2A")
        .replace("%7E", "~")
}

/// Split a raw query into decoded `(key, value)` byte pairs.
///
/// `+` is a space, `%2B` a literal plus. Decoding stops at bytes, so `%FF`
/// stays `0xFF` instead of becoming a replacement character.
fn parse_query(query: &str) -> Vec<(Vec<u8>, Vec<u8>)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (unescape(key), unescape(value))
        })
        .collect()
}

fn unescape(component: &str) -> Vec<u8> {
    let spaced = component.replace('+', " ");
    urlencoding::decode_binary(spaced.as_bytes()).into_owned()
}

/// Split off scheme/authority and fragment, returning `(path, query)`.
fn split_path_and_query(url: &str) -> (&str, &str) {
    let without_fragment = url.split('#').next().unwrap_or(url);

    let path_start = match without_fragment.find("://") {
        Some(scheme_end) => {
            let after = &without_fragment[scheme_end + 3..];
            match after.find(['/', '?']) {
                Some(i) => scheme_end + 3 + i,
                None => without_fragment.len(),
            }
        }
        None => 0,
    };

    let rest = &without_fragment[path_start..];
    match rest.split_once('?') {
        Some((path, query)) => (path, query),
        None => (rest, ""),
    }
}
