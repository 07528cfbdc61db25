use anyhow::Result;
use http::request::Parts;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::types::Identity;
use tracing::{debug, info};

use crate::AppState;
use crate::handlers::http::links::{AccessMethod, verify_call_checksum};
use crate::handlers::http::routes::{call_metadata, last_segment, query_param};
use crate::handlers::http::utils::*;
use crate::security::{AuthError, id_codec, link_checksum};

/// Payload of the opaque token embedded in a document link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentGrant {
    pub user_id: i64,
    pub document_id: i64,
}

fn parse_id(raw: &str) -> Result<i64, AuthError> {
    raw.parse::<i64>()
        .map_err(|_| AuthError::InvalidArgument(format!("invalid id: {}", raw)))
}

/// `GET <qr_path>/:id` resolves the opaque id of a scanned code.
pub async fn handle_qr_landing(parts: Parts, _state: AppState) -> Result<Response<JsonBody>> {
    match id_codec::try_deobfuscate(last_segment(&parts)) {
        Ok(id) => deliver_success_json(Some(json!({ "id": id }))),
        Err(e) => Ok(auth_error_response(&e)),
    }
}

/// `GET <doc_path>/:method` serves a checksum-guarded document link.
pub async fn handle_document(parts: Parts, state: AppState) -> Result<Response<JsonBody>> {
    let call = call_metadata(&parts);
    if !verify_call_checksum(&call) {
        return deliver_error_json(
            "SYS.MSG.INVALID_CHECKSUM",
            "Link checksum mismatch",
            StatusCode::FORBIDDEN,
        );
    }

    let method = AccessMethod::from_name(last_segment(&parts));

    let Some(token) = query_param(&parts, "token") else {
        return deliver_success_json(Some(json!({ "method": method.as_str() })));
    };

    match state.resolver.tokens().parse_opaque_token::<DocumentGrant>(&token) {
        Ok(grant) => {
            info!(
                "Document {} opened for user_id={} ({})",
                grant.document_id,
                grant.user_id,
                method.as_str()
            );
            deliver_success_json(Some(json!({
                "method": method.as_str(),
                "documentId": grant.document_id,
                "userId": grant.user_id,
            })))
        }
        Err(e) => Ok(auth_error_response(&e)),
    }
}

/// `GET /links/verify?url=...`
pub async fn handle_verify_link(parts: Parts, _state: AppState) -> Result<Response<JsonBody>> {
    match query_param(&parts, "url") {
        Some(url) => {
            let valid = link_checksum::verify(&url);
            debug!("Checked link checksum: valid={}", valid);
            deliver_success_json(Some(json!({ "valid": valid })))
        }
        None => Ok(auth_error_response(&AuthError::InvalidArgument(
            "missing url parameter".into(),
        ))),
    }
}

/// `GET /links/qr/:id` builds the landing URL for a plain id.
pub async fn handle_qr_link(
    parts: Parts,
    state: AppState,
    _identity: Identity,
) -> Result<Response<JsonBody>> {
    let id = match parse_id(last_segment(&parts)) {
        Ok(id) => id,
        Err(e) => return Ok(auth_error_response(&e)),
    };

    let call = call_metadata(&parts);
    match state.links.build_qr_code_url(Some(&call), id) {
        Ok(url) => deliver_success_json(Some(json!({ "url": url }))),
        Err(e) => deliver_error_json(e.to_code(), &e.to_string(), StatusCode::BAD_REQUEST),
    }
}

/// `GET /links/doc/:id?method=view` builds a document link carrying an
/// opaque grant for the caller.
pub async fn handle_doc_link(
    parts: Parts,
    state: AppState,
    identity: Identity,
) -> Result<Response<JsonBody>> {
    let document_id = match parse_id(last_segment(&parts)) {
        Ok(id) => id,
        Err(e) => return Ok(auth_error_response(&e)),
    };
    let method = query_param(&parts, "method")
        .map(|m| AccessMethod::from_name(&m))
        .unwrap_or_default();

    let grant = DocumentGrant {
        user_id: identity.user_id,
        document_id,
    };
    let tokens = state.resolver.tokens();
    let token = match tokens.make_opaque_token(&grant, tokens.access_ttl_secs()) {
        Ok(token) => token,
        Err(e) => return Ok(auth_error_response(&e)),
    };

    let url = state.links.build_doc_url_with_token(document_id, &token, method);
    deliver_success_json(Some(json!({ "url": url })))
}
