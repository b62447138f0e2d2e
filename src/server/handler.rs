use std::future::Future;

use crate::http::request::Request;
use crate::http::response::Response;

/// Application callback that turns one request into one response.
///
/// A single handler instance is shared by every session and may be called
/// concurrently from any runtime thread. An `Err` ends only the session
/// that produced it.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request) -> impl Future<Output = anyhow::Result<Response>> + Send;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Response>> + Send,
{
    fn call(&self, req: Request) -> impl Future<Output = anyhow::Result<Response>> + Send {
        self(req)
    }
}
