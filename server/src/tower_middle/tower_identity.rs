use hyper::{Request, Response};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

use crate::handlers::http::routes::Router;
use crate::handlers::http::utils::{CallMetadata, JsonBody, auth_error_response};
use crate::security::IdentityResolver;

/// Tower layer that resolves the caller's identity
///
/// Every request gets its [`CallMetadata`] stored in extensions. Requests to
/// non-public paths must also carry a credential that resolves; the
/// resulting [`shared::types::Identity`] is stored next to it, and anything
/// that fails is answered with the JSON error for that failure.
#[derive(Clone)]
pub struct IdentityLayer {
    resolver: IdentityResolver,
    public_paths: Arc<HashSet<String>>,
}

impl IdentityLayer {
    pub fn new(resolver: IdentityResolver, public_paths: HashSet<String>) -> Self {
        Self {
            resolver,
            public_paths: Arc::new(public_paths),
        }
    }
}

impl<S> Layer<S> for IdentityLayer {
    type Service = IdentityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IdentityService {
            inner,
            resolver: self.resolver.clone(),
            public_paths: self.public_paths.clone(),
        }
    }
}

#[derive(Clone)]
pub struct IdentityService<S> {
    inner: S,
    resolver: IdentityResolver,
    public_paths: Arc<HashSet<String>>,
}

impl<S> IdentityService<S> {
    fn is_public(&self, path: &str) -> bool {
        self.public_paths
            .iter()
            .any(|pattern| Router::path_matches(pattern, path))
    }
}

impl<S, ReqBody> Service<Request<ReqBody>> for IdentityService<S>
where
    S: Service<Request<ReqBody>, Response = Response<JsonBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let call = CallMetadata::from_request(&req);
        let public = self.is_public(req.uri().path());

        let resolved = if public {
            None
        } else {
            Some(self.resolver.resolve_from(&call))
        };
        req.extensions_mut().insert(call);

        // The clone left behind has not been polled; the ready one is taken.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match resolved {
                None => {
                    debug!("Public path {}, skipping identity", req.uri().path());
                }
                Some(Ok(identity)) => {
                    req.extensions_mut().insert(identity);
                }
                Some(Err(e)) => return Ok(auth_error_response(&e)),
            }

            inner.call(req).await
        })
    }
}
