use crate::core::Result;
use async_trait::async_trait;
use std::future::Future;

/// Asynchronous read behind one cache key.
#[async_trait]
pub trait QueryFetcher<T>: Send + Sync {
    async fn fetch(&self) -> Result<T>;
}

/// Adapts an async closure into a [`QueryFetcher`].
pub struct FnFetcher<F>(pub F);

#[async_trait]
impl<T, F, Fut> QueryFetcher<T> for FnFetcher<F>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send,
{
    async fn fetch(&self) -> Result<T> {
        (self.0)().await
    }
}
