use crate::core::Result;
use async_trait::async_trait;
use std::future::Future;

/// The external write a mutation performs.
#[async_trait]
pub trait MutationWriter<R>: Send + Sync {
    async fn write(&self, record: R) -> Result<()>;
}

/// Adapts an async closure into a [`MutationWriter`].
pub struct FnWriter<F>(pub F);

#[async_trait]
impl<R, F, Fut> MutationWriter<R> for FnWriter<F>
where
    R: Send + 'static,
    F: Fn(R) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn write(&self, record: R) -> Result<()> {
        (self.0)(record).await
    }
}
