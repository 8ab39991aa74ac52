use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::DomainEvent;

/// Outcome of a single handler invocation.
pub type HandlerResult = anyhow::Result<()>;

/// Consumes events of the names it is subscribed to.
///
/// Handlers run on the bus worker pool, detached from the publisher. Returning
/// an error (or panicking) only produces a failure report.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: Arc<DomainEvent>) -> HandlerResult;
}

/// Adapter turning an async closure into an [`EventHandler`].
pub struct FnHandler<F>(F);

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Arc<DomainEvent>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Arc<DomainEvent>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, event: Arc<DomainEvent>) -> HandlerResult {
        (self.0)(event).await
    }
}
