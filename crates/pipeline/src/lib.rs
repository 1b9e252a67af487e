//! Middleware pipeline for message-driven transports.
//!
//! A transport produces a [`Context`] per connection, updates it with each
//! inbound event, and drives it through an ordered chain of [`Middleware`].
//! Each link either consumes the event (returns without calling
//! [`Next::run`]) or declines it (calls `next.run(ctx)` so the rest of the
//! chain sees it).

pub mod context;
pub mod middleware;
pub mod pipeline;

pub use {
    context::{Context, EventKind},
    middleware::{Middleware, Next, from_fn},
    pipeline::Pipeline,
};
