use hyper::Request;
use hyper::header::{AUTHORIZATION, HOST, HeaderMap, HeaderName, HeaderValue, ORIGIN};
use tracing::{debug, warn};

use crate::security::{BEARER_PREFIX, CredentialSource};

pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_SCHEME: &str = "x-forwarded-scheme";
pub const GATEWAY_ORIGIN: &str = "grpcgateway-origin";

/// Extract a header value as a string
pub fn get_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(|s| {
        debug!("Retrieved header: {}", name);
        s.to_string()
    })
}

/// Like [`get_header_value`] but treats blank values as absent.
fn non_blank(headers: &HeaderMap, name: &str) -> Option<String> {
    get_header_value(headers, name).filter(|v| !v.trim().is_empty())
}

/// Extract bearer token from Authorization header
/// Format: "Authorization: Bearer <token>[|||<scope>]"
pub fn get_bearer_token(headers: &HeaderMap) -> Option<String> {
    get_header_value(headers, AUTHORIZATION.as_str()).and_then(|auth| {
        if let Some(token) = auth.strip_prefix(BEARER_PREFIX) {
            debug!("Bearer token extracted");
            Some(token.to_string())
        } else {
            warn!("Invalid or missing Bearer token");
            None
        }
    })
}

// ---------------------------------------------------------------------------
// Per-call metadata
// ---------------------------------------------------------------------------

/// The ambient metadata of one inbound call: its credential plus what is
/// needed to build links back to the caller's host.
///
/// Captured once per request (the identity layer stores it in request
/// extensions) and read as often as needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallMetadata {
    pub authorization: Option<String>,
    /// The request's own `Host`, or `X-Forwarded-Host` when it has none.
    pub forwarded_host: Option<String>,
    pub forwarded_scheme: Option<String>,
    pub origin: Option<String>,
    pub gateway_origin: Option<String>,
    /// Path and query of the request, e.g. `/doc/file/v1/view?id=1&checksum=..`.
    pub pattern: Option<String>,
}

impl CallMetadata {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            authorization: non_blank(headers, AUTHORIZATION.as_str()),
            forwarded_host: non_blank(headers, HOST.as_str())
                .or_else(|| non_blank(headers, X_FORWARDED_HOST)),
            forwarded_scheme: non_blank(headers, X_FORWARDED_SCHEME),
            origin: non_blank(headers, ORIGIN.as_str()),
            gateway_origin: non_blank(headers, GATEWAY_ORIGIN),
            pattern: None,
        }
    }

    pub fn from_request<B>(req: &Request<B>) -> Self {
        let pattern = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string());

        Self {
            pattern,
            ..Self::from_headers(req.headers())
        }
    }

    /// Headers to forward the caller's credential on a downstream call.
    ///
    /// The authorization value goes out without its `Bearer ` prefix (the
    /// scope suffix is kept), followed by the origin headers when present.
    pub fn outgoing_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let Some(auth) = self.authorization.as_deref() else {
            return headers;
        };
        let token = auth.strip_prefix(BEARER_PREFIX).unwrap_or(auth);

        let pairs = [
            (AUTHORIZATION, Some(token)),
            (HeaderName::from_static(GATEWAY_ORIGIN), self.gateway_origin.as_deref()),
            (ORIGIN, self.origin.as_deref()),
            (HeaderName::from_static(X_FORWARDED_HOST), self.forwarded_host.as_deref()),
        ];

        for (name, value) in pairs {
            let Some(value) = value else { continue };
            match HeaderValue::from_str(value) {
                Ok(v) => {
                    headers.insert(name, v);
                }
                Err(e) => warn!("Dropping unforwardable header {}: {}", name, e),
            }
        }

        headers
    }
}

impl CredentialSource for CallMetadata {
    fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/doc/file/v1/view?id=1&checksum=abc");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn captures_call_metadata() {
        let req = request(&[
            ("authorization", "Bearer t|||1|2|3"),
            ("x-forwarded-host", "app.example.com"),
            ("x-forwarded-scheme", "https"),
            ("host", "internal:1337"),
        ]);
        let call = CallMetadata::from_request(&req);
        assert_eq!(call.authorization.as_deref(), Some("Bearer t|||1|2|3"));
        assert_eq!(call.forwarded_host.as_deref(), Some("internal:1337"));
        assert_eq!(call.forwarded_scheme.as_deref(), Some("https"));
        assert_eq!(
            call.pattern.as_deref(),
            Some("/doc/file/v1/view?id=1&checksum=abc")
        );
    }

    #[test]
    fn host_header_wins_over_forwarded_host() {
        let call = CallMetadata::from_request(&request(&[
            ("x-forwarded-host", "app.example.com"),
            ("host", "internal:1337"),
        ]));
        assert_eq!(call.forwarded_host.as_deref(), Some("internal:1337"));
        assert_eq!(call.authorization, None);
    }

    #[test]
    fn forwarded_host_is_the_fallback() {
        let call = CallMetadata::from_request(&request(&[("x-forwarded-host", "app.example.com")]));
        assert_eq!(call.forwarded_host.as_deref(), Some("app.example.com"));

        let call = CallMetadata::from_request(&request(&[("host", " ")]));
        assert_eq!(call.forwarded_host, None);
    }

    #[test]
    fn bearer_token_requires_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(get_bearer_token(&headers).as_deref(), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(get_bearer_token(&headers), None);
    }

    #[test]
    fn outgoing_headers_strip_bearer_and_keep_suffix() {
        let call = CallMetadata {
            authorization: Some("Bearer t|||1|2|3".into()),
            origin: Some("https://app.example.com".into()),
            forwarded_host: Some("app.example.com".into()),
            ..CallMetadata::default()
        };
        let out = call.outgoing_headers();
        assert_eq!(out.get(AUTHORIZATION).unwrap(), "t|||1|2|3");
        assert_eq!(out.get(ORIGIN).unwrap(), "https://app.example.com");
        assert_eq!(out.get(X_FORWARDED_HOST).unwrap(), "app.example.com");
        assert!(out.get(GATEWAY_ORIGIN).is_none());
    }

    #[test]
    fn nothing_is_forwarded_without_credential() {
        let call = CallMetadata {
            origin: Some("https://app.example.com".into()),
            ..CallMetadata::default()
        };
        assert!(call.outgoing_headers().is_empty());
    }
}
