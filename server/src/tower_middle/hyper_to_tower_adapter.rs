use hyper::service::Service as HyperService;
use hyper::{Request, Response};
use std::future::Future;
use std::task::{Context, Poll};
use tower::Service as TowerService;

/// Lets a hyper `service_fn` sit underneath tower layers.
///
/// Hyper services take `&self` and are always ready; tower services take
/// `&mut self` and are polled for readiness first.
#[derive(Clone, Debug)]
pub struct HyperToTowerAdapter<S> {
    inner: S,
}

impl<S> HyperToTowerAdapter<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, ReqBody, ResBody> TowerService<Request<ReqBody>> for HyperToTowerAdapter<S>
where
    S: HyperService<Request<ReqBody>, Response = Response<ResBody>> + Clone,
    S::Future: Future + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        self.inner.call(req)
    }
}
