use std::{future::Future, sync::Arc};

use {anyhow::Result, async_trait::async_trait, futures::future::BoxFuture};

use crate::context::Context;

// ── Middleware ──────────────────────────────────────────────────────────────

/// One link in the chain.
///
/// A middleware either consumes the current event — it returns without
/// calling `next.run(ctx)` and the chain stops there — or declines it by
/// handing the context to `next`.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: Context, next: Next) -> Result<()>;
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    async fn handle(&self, ctx: Context, next: Next) -> Result<()> {
        (**self).handle(ctx, next).await
    }
}

// ── Next ────────────────────────────────────────────────────────────────────

/// Continuation over the remaining links of the chain.
pub struct Next {
    stack: Arc<[Arc<dyn Middleware>]>,
    index: usize,
}

impl Next {
    pub(crate) fn new(stack: Arc<[Arc<dyn Middleware>]>) -> Self {
        Self { stack, index: 0 }
    }

    /// Run the rest of the chain. A `Next` past the last link is a no-op.
    pub fn run(self, ctx: Context) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            let Some(mw) = self.stack.get(self.index) else {
                return Ok(());
            };
            let mw = Arc::clone(mw);
            let rest = Next {
                stack: self.stack,
                index: self.index + 1,
            };
            mw.handle(ctx, rest).await
        })
    }
}

// ── Function middleware ─────────────────────────────────────────────────────

struct FnMiddleware<F>(F);

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Context, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, ctx: Context, next: Next) -> Result<()> {
        (self.0)(ctx, next).await
    }
}

/// Wrap an async closure as a [`Middleware`].
pub fn from_fn<F, Fut>(f: F) -> impl Middleware
where
    F: Fn(Context, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    FnMiddleware(f)
}
