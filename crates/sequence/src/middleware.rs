use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    confab_pipeline::{Context, EventKind, Middleware, Next},
    tracing::{debug, warn},
    uuid::Uuid,
};

use crate::{
    interpreter::{self, Disposition, Fate, Policy},
    routine::Routine,
    state::{Registry, SequenceState},
};

/// One chain link multiplexing a routine across every context it sees.
///
/// The adapter owns the conversation side-table: each context gets its own
/// routine instance on first sight, keyed by the context id. Construct one
/// through [`on_connect`], [`interruptible`] or [`uninterruptible`].
pub struct SequenceMiddleware {
    id: Uuid,
    routine: Arc<dyn Routine>,
    policy: Policy,
    registry: Registry,
}

impl SequenceMiddleware {
    fn new(routine: impl Routine, policy: Policy) -> Self {
        Self {
            id: Uuid::new_v4(),
            routine: Arc::new(routine),
            policy,
            registry: Registry::new(),
        }
    }
}

#[async_trait]
impl Middleware for SequenceMiddleware {
    async fn handle(&self, ctx: Context, next: Next) -> Result<()> {
        if ctx.kind() == EventKind::Close {
            self.registry.remove(ctx.id());
            return next.run(ctx).await;
        }

        let Some(mut state) = self.registry.take_or_create(ctx.id(), || {
            debug!(adapter = %self.id, ctx = %ctx.id(), "new conversation");
            SequenceState::arm(self.routine.as_ref(), &ctx, self.policy.start_gated)
        }) else {
            // Conversation already completed or was abandoned.
            return next.run(ctx).await;
        };

        match interpreter::drive(&mut state, &ctx, self.routine.as_ref(), self.policy).await {
            Ok((disposition, fate)) => {
                match fate {
                    Fate::Keep => self.registry.restore(ctx.id(), state),
                    Fate::Retire => {
                        debug!(adapter = %self.id, ctx = %ctx.id(), "conversation retired");
                        self.registry.retire(ctx.id());
                    },
                }
                match disposition {
                    Disposition::Consumed => Ok(()),
                    Disposition::Declined => next.run(ctx).await,
                }
            },
            Err(err) => {
                // Leave the conversation exactly where it was and surface
                // the failure to whoever dispatched the event.
                self.registry.restore(ctx.id(), state);
                warn!(adapter = %self.id, ctx = %ctx.id(), error = %err, "sequence step failed");
                Err(err.into())
            },
        }
    }
}

// ── Adapter constructors ────────────────────────────────────────────────────

/// Connection-lifecycle sequence: the routine starts when the context's
/// `Open` event arrives and a completed routine re-arms for the next one.
/// Failed matches leave the conversation alive.
pub fn on_connect(routine: impl Routine) -> SequenceMiddleware {
    SequenceMiddleware::new(
        routine,
        Policy {
            start_gated: true,
            interruptible: true,
        },
    )
}

/// Message sequence that survives non-matching traffic: a failed predicate
/// or assertion leaves the suspension in place for the next message.
pub fn interruptible(routine: impl Routine) -> SequenceMiddleware {
    SequenceMiddleware::new(
        routine,
        Policy {
            start_gated: false,
            interruptible: true,
        },
    )
}

/// Misspelled alias of [`interruptible`], kept for compatibility.
pub fn interuptable(routine: impl Routine) -> SequenceMiddleware {
    interruptible(routine)
}

/// Strict message sequence: the first failed predicate or assertion
/// abandons the conversation for that context permanently.
pub fn uninterruptible(routine: impl Routine) -> SequenceMiddleware {
    SequenceMiddleware::new(
        routine,
        Policy {
            start_gated: false,
            interruptible: false,
        },
    )
}

/// Misspelled alias of [`uninterruptible`], kept for compatibility.
pub fn uninteruptable(routine: impl Routine) -> SequenceMiddleware {
    uninterruptible(routine)
}
