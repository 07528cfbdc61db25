use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use http::request::Parts;
use hyper::{Method, Request, Response, StatusCode};
use shared::types::{Identity, LinksConfig};
use tracing::warn;

use crate::AppState;
use crate::handlers::http::endpoints;
use crate::handlers::http::utils::*;

// ---------------------------------------------------------------------------
// Handler type aliases
// ---------------------------------------------------------------------------
//
// Two tiers:
//
//   OpenHandler    no identity.  Receives (parts, state).
//                  Use for: /health, QR landing pages, checksum-guarded links.
//
//   AuthedHandler  resolved identity.  Receives (parts, state, identity).
//                  The identity comes from the identity layer when present,
//                  otherwise the router resolves the credential itself.
//
// None of the routes read a body, so handlers only ever see the head.

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response<JsonBody>>> + Send>>;

type OpenHandler = Box<dyn Fn(Parts, AppState) -> HandlerFuture + Send + Sync>;

type AuthedHandler = Box<dyn Fn(Parts, AppState, Identity) -> HandlerFuture + Send + Sync>;

enum RouteKind {
    Open(OpenHandler),
    Authed(AuthedHandler),
}

struct Route {
    method: Method,
    path: String,
    kind: RouteKind,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .finish()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// GET with no identity check.
    pub fn get<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Parts, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<JsonBody>>> + Send + 'static,
    {
        self.routes.push(Route {
            method: Method::GET,
            path: path.to_string(),
            kind: RouteKind::Open(Box::new(move |parts, state| Box::pin(handler(parts, state)))),
        });
        self
    }

    /// GET that only runs for a caller whose credential resolves.
    pub fn get_authed<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Parts, AppState, Identity) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<JsonBody>>> + Send + 'static,
    {
        self.routes.push(Route {
            method: Method::GET,
            path: path.to_string(),
            kind: RouteKind::Authed(Box::new(move |parts, state, identity| {
                Box::pin(handler(parts, state, identity))
            })),
        });
        self
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    pub async fn route<B>(&self, req: Request<B>, state: AppState) -> Result<Response<JsonBody>> {
        let (parts, _) = req.into_parts();
        let method = parts.method.clone();
        let path = parts.uri.path().to_string();

        for route in &self.routes {
            if route.method != method || !Self::path_matches(&route.path, &path) {
                continue;
            }

            return match &route.kind {
                RouteKind::Open(h) => h(parts, state).await,

                RouteKind::Authed(h) => {
                    let identity = match parts.extensions.get::<Identity>() {
                        Some(identity) => Ok(identity.clone()),
                        None => state.resolver.resolve_from(&parts.headers),
                    };
                    match identity {
                        Ok(identity) => h(parts, state, identity).await,
                        Err(e) => {
                            warn!("Rejected {} {}: {}", method, path, e.to_code());
                            Ok(auth_error_response(&e))
                        }
                    }
                }
            };
        }

        deliver_error_json("SYS.MSG.NOT_FOUND", "Endpoint not found", StatusCode::NOT_FOUND)
            .context("Failed to deliver 404 response")
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    pub fn path_matches(route_path: &str, request_path: &str) -> bool {
        // Strip query string from incoming request path before comparing.
        let clean = request_path.split('?').next().unwrap_or(request_path);

        if route_path == clean {
            return true;
        }

        // Segment-by-segment matching for `:param` wildcards.
        // e.g.  "/orbit/:id"  matches  "/orbit/3yQ"
        let route_segs: Vec<&str> = route_path.split('/').collect();
        let path_segs: Vec<&str> = clean.split('/').collect();

        if route_segs.len() != path_segs.len() {
            return false;
        }

        route_segs
            .iter()
            .zip(path_segs.iter())
            .all(|(r, p)| r.starts_with(':') || r == p)
    }
}

/// Last path segment, i.e. the value of a trailing `:param`.
pub fn last_segment(parts: &Parts) -> &str {
    parts.uri.path().rsplit('/').next().unwrap_or_default()
}

/// First value of query parameter `name`, percent-decoded.
pub fn query_param(parts: &Parts, name: &str) -> Option<String> {
    let query = parts.uri.query()?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// The call's metadata as captured by the identity layer, or captured here
/// when the router runs without it.
pub fn call_metadata(parts: &Parts) -> CallMetadata {
    parts
        .extensions
        .get::<CallMetadata>()
        .cloned()
        .unwrap_or_else(|| CallMetadata {
            pattern: parts.uri.path_and_query().map(|pq| pq.as_str().to_string()),
            ..CallMetadata::from_headers(&parts.headers)
        })
}

// ---------------------------------------------------------------------------
// Service router
// ---------------------------------------------------------------------------

pub fn build_router(links: &LinksConfig) -> Router {
    let qr_route = format!("{}/:id", links.qr_path.trim_end_matches('/'));
    let doc_route = format!("{}/:method", links.doc_path.trim_end_matches('/'));

    Router::new()
        // ── Open ─────────────────────────────────────────────────────────────
        .get("/health", |_parts, _state| async move {
            deliver_success_json::<()>(None).context("Failed to deliver health")
        })
        .get(&qr_route, |parts, state| async move {
            endpoints::handle_qr_landing(parts, state)
                .await
                .context("QR landing failed")
        })
        .get(&doc_route, |parts, state| async move {
            endpoints::handle_document(parts, state)
                .await
                .context("Document link failed")
        })
        .get("/links/verify", |parts, state| async move {
            endpoints::handle_verify_link(parts, state)
                .await
                .context("Link verification failed")
        })
        // ── Authed ───────────────────────────────────────────────────────────
        .get_authed("/whoami", |_parts, _state, identity| async move {
            deliver_success_json(Some(identity)).context("Failed to deliver identity")
        })
        .get_authed("/links/qr/:id", |parts, state, identity| async move {
            endpoints::handle_qr_link(parts, state, identity)
                .await
                .context("QR link failed")
        })
        .get_authed("/links/doc/:id", |parts, state, identity| async move {
            endpoints::handle_doc_link(parts, state, identity)
                .await
                .context("Document link build failed")
        })
}
