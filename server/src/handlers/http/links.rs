//! Shareable links back into the service: QR code landing URLs carrying an
//! opaque id, and document URLs guarded by a checksum.

use shared::types::LinksConfig;
use thiserror::Error;
use tracing::debug;

use crate::handlers::http::utils::CallMetadata;
use crate::security::{AuthError, id_codec, link_checksum};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("missing request info")]
    MissingRequestInfo,

    #[error("missing host in request headers")]
    MissingHost,

    #[error(transparent)]
    InvalidId(#[from] AuthError),
}

impl LinkError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::MissingRequestInfo => "SYS.MSG.MISSING_REQUEST_INFO_FROM_HEADER",
            Self::MissingHost => "SYS.MSG.MISSING_HOST_FROM_REQUEST_HEADER",
            Self::InvalidId(e) => e.to_code(),
        }
    }
}

/// How a document link opens the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMethod {
    #[default]
    Download,
    View,
    Preview,
}

impl AccessMethod {
    /// Anything other than `view` or `preview` means download.
    pub fn from_name(name: &str) -> Self {
        match name {
            "view" => Self::View,
            "preview" => Self::Preview,
            _ => Self::Download,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::View => "view",
            Self::Preview => "preview",
        }
    }
}

/// Identifies a stored file by its upload coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocFile {
    pub iuid: String,
    pub company_id: i64,
    pub branch_id: i64,
    pub service: String,
    pub screen: String,
    pub feature: String,
}

#[derive(Debug, Clone)]
pub struct LinkBuilder {
    qr_path: String,
    doc_path: String,
}

impl LinkBuilder {
    pub fn new(config: &LinksConfig) -> Self {
        Self {
            qr_path: config.qr_path.trim_end_matches('/').to_string(),
            doc_path: config.doc_path.trim_end_matches('/').to_string(),
        }
    }

    pub fn qr_path(&self) -> &str {
        &self.qr_path
    }

    // ── QR codes ──────────────────────────────────────────────────────────────

    /// Absolute landing URL for `id`, pointed at the host the caller used.
    ///
    /// Uses the forwarded host with the forwarded scheme (default `http`);
    /// without a host, falls back to `Origin`.
    pub fn build_qr_code_url(
        &self,
        call: Option<&CallMetadata>,
        id: i64,
    ) -> Result<String, LinkError> {
        let call = call.ok_or(LinkError::MissingRequestInfo)?;
        let opaque = id_codec::obfuscate(id)?;

        if let Some(host) = call.forwarded_host.as_deref() {
            let scheme = call.forwarded_scheme.as_deref().unwrap_or("http");
            return Ok(format!("{}://{}{}/{}", scheme, host, self.qr_path, opaque));
        }

        match call.origin.as_deref() {
            Some(origin) => Ok(format!(
                "{}{}/{}",
                origin.trim_end_matches('/'),
                self.qr_path,
                opaque
            )),
            None => Err(LinkError::MissingHost),
        }
    }

    // ── Documents ─────────────────────────────────────────────────────────────

    /// Relative document URL carrying `params` and their checksum.
    pub fn build_doc_url<K, V>(&self, params: &[(K, V)], method: AccessMethod) -> String
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let path = format!("{}/{}", self.doc_path, method.as_str());
        let url = link_checksum::signed_link(&path, params);
        debug!("Built document link: {}", path);
        url
    }

    pub fn build_doc_url_with_token(
        &self,
        document_id: i64,
        token: &str,
        method: AccessMethod,
    ) -> String {
        self.build_doc_url(
            &[("id", document_id.to_string().as_str()), ("token", token)],
            method,
        )
    }

    pub fn build_doc_url_with_full_path(&self, full_path: &str, method: AccessMethod) -> String {
        self.build_doc_url(&[("fullPath", full_path)], method)
    }

    pub fn build_doc_url_for_file(&self, file: &DocFile, method: AccessMethod) -> String {
        let company = file.company_id.to_string();
        let branch = file.branch_id.to_string();
        self.build_doc_url(
            &[
                ("iuid", file.iuid.as_str()),
                ("companyId", company.as_str()),
                ("branchId", branch.as_str()),
                ("service", file.service.as_str()),
                ("screen", file.screen.as_str()),
                ("feature", file.feature.as_str()),
            ],
            method,
        )
    }
}

/// Check the checksum of the URL the current call arrived on.
pub fn verify_call_checksum(call: &CallMetadata) -> bool {
    call.pattern
        .as_deref()
        .is_some_and(link_checksum::verify)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> LinkBuilder {
        LinkBuilder::new(&LinksConfig::default())
    }

    #[test]
    fn qr_url_uses_forwarded_host_and_scheme() {
        let call = CallMetadata {
            forwarded_host: Some("app.example.com".into()),
            forwarded_scheme: Some("https".into()),
            ..CallMetadata::default()
        };
        let url = builder().build_qr_code_url(Some(&call), 12345).unwrap();
        let opaque = id_codec::obfuscate(12345).unwrap();
        assert_eq!(url, format!("https://app.example.com/orbit/{}", opaque));
    }

    #[test]
    fn qr_url_defaults_to_http() {
        let call = CallMetadata {
            forwarded_host: Some("h".into()),
            ..CallMetadata::default()
        };
        let url = builder().build_qr_code_url(Some(&call), 1).unwrap();
        assert!(url.starts_with("http://h/orbit/"));
    }

    #[test]
    fn qr_url_falls_back_to_origin() {
        let call = CallMetadata {
            origin: Some("https://web.example.com/".into()),
            ..CallMetadata::default()
        };
        let url = builder().build_qr_code_url(Some(&call), 1).unwrap();
        assert!(url.starts_with("https://web.example.com/orbit/"));
    }

    #[test]
    fn qr_url_errors() {
        let b = builder();
        assert_eq!(
            b.build_qr_code_url(None, 1).unwrap_err(),
            LinkError::MissingRequestInfo
        );
        assert_eq!(
            b.build_qr_code_url(Some(&CallMetadata::default()), 1)
                .unwrap_err()
                .to_code(),
            "SYS.MSG.MISSING_HOST_FROM_REQUEST_HEADER"
        );
        let call = CallMetadata {
            forwarded_host: Some("h".into()),
            ..CallMetadata::default()
        };
        assert!(matches!(
            b.build_qr_code_url(Some(&call), -5),
            Err(LinkError::InvalidId(_))
        ));
    }

    #[test]
    fn doc_urls_verify() {
        let b = builder();
        let url = b.build_doc_url_with_token(42, "tok en", AccessMethod::View);
        assert!(url.starts_with("/doc/file/v1/view?checksum="));
        assert!(url.contains("&id=42&token=tok+en"));
        assert!(link_checksum::verify(&url));

        let file = DocFile {
            iuid: "u-1".into(),
            company_id: 3,
            branch_id: 4,
            service: "svc".into(),
            screen: "scr".into(),
            feature: "f".into(),
        };
        let url = b.build_doc_url_for_file(&file, AccessMethod::from_name("zip"));
        assert!(url.starts_with("/doc/file/v1/download?"));
        assert!(link_checksum::verify(&url));

        let url = b.build_doc_url_with_full_path("/a/b c.pdf", AccessMethod::Preview);
        assert!(url.contains("fullPath=%2Fa%2Fb+c.pdf"));
        assert!(link_checksum::verify(&url));
    }

    #[test]
    fn call_checksum_uses_pattern() {
        let url = builder().build_doc_url_with_token(1, "t", AccessMethod::Download);
        let mut call = CallMetadata {
            pattern: Some(url.clone()),
            ..CallMetadata::default()
        };
        assert!(verify_call_checksum(&call));

        call.pattern = Some(url.replace("id=1", "id=2"));
        assert!(!verify_call_checksum(&call));

        call.pattern = None;
        assert!(!verify_call_checksum(&call));
    }
}
