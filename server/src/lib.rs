//! Identity and secure-link service.
//!
//! Resolves the caller of every request from a signed bearer token plus its
//! unsigned scope suffix, and builds shareable links (opaque-id QR landing
//! URLs, checksum-guarded document URLs) back into the service.

use std::convert::Infallible;
use std::sync::Arc;

use hyper::{Request, Response, StatusCode};
use shared::types::AppConfig;
use tracing::error;

pub mod handlers;
pub mod security;
pub mod tower_middle;

use handlers::http::links::LinkBuilder;
use handlers::http::routes::Router;
use handlers::http::utils::{JsonBody, deliver_error_json, full};
use security::{IdentityResolver, TokenCodec};

/// Everything a handler needs. Cheap to clone; nothing in it changes after
/// startup.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub resolver: IdentityResolver,
    pub links: LinkBuilder,
}

impl AppState {
    pub fn new(config: AppConfig, tokens: TokenCodec) -> Self {
        let links = LinkBuilder::new(&config.links);
        Self {
            config: Arc::new(config),
            resolver: IdentityResolver::new(tokens),
            links,
        }
    }
}

/// Route one request, turning handler failures into a 500 JSON error.
pub async fn dispatch<B>(
    router: Arc<Router>,
    state: AppState,
    req: Request<B>,
) -> Result<Response<JsonBody>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match router.route(req, state).await {
        Ok(response) => Ok(response),
        Err(e) => {
            error!("{} {} failed: {:#}", method, path, e);
            Ok(deliver_error_json(
                "SYS.MSG.INTERNAL_ERROR",
                "Internal server error",
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .unwrap_or_else(|_| {
                let mut res = Response::new(full("{}"));
                *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                res
            }))
        }
    }
}
