use std::sync::Arc;

use {anyhow::Result, serde_json::Value, tracing::debug};

use crate::{
    context::{Context, EventKind},
    middleware::{Middleware, Next},
};

/// Ordered middleware chain plus the entry point a transport drives events
/// through.
#[derive(Default)]
pub struct Pipeline {
    stack: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Append a middleware to the end of the chain.
    pub fn layer(mut self, mw: impl Middleware + 'static) -> Self {
        self.stack.push(Arc::new(mw));
        self
    }

    /// Set the context's current event and run it through the chain.
    pub async fn dispatch(&self, ctx: &Context, kind: EventKind, message: Value) -> Result<()> {
        ctx.set_event(kind, message);
        debug!(ctx = %ctx.id(), %kind, "dispatching event");
        let stack: Arc<[Arc<dyn Middleware>]> = Arc::from(self.stack.as_slice());
        Next::new(stack).run(ctx.clone()).await
    }
}
