//! Drives one conversation forward against one incoming event.
//!
//! A step runs to completion before control returns to the adapter: chained
//! `Assertion` and `Await` commands are resolved eagerly within the step,
//! but at most one message-kind command is matched against the incoming
//! event.

use {
    confab_pipeline::{Context, EventKind},
    tracing::{debug, warn},
};

use crate::{
    command::SequenceCommand,
    error::{Error, Result},
    routine::{Resume, Routine, Step},
    state::{Pending, SequenceState},
};

/// The two policy flags an adapter binds (spelled out to keep call sites
/// readable).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Policy {
    /// Gate the routine's first advance behind the `Open` event, and
    /// replace a completed routine with a fresh instance awaiting the next
    /// `Open`.
    pub(crate) start_gated: bool,
    /// A failed predicate or assertion keeps the conversation alive for
    /// the next event instead of abandoning it.
    pub(crate) interruptible: bool,
}

/// What happened to the incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// The event belongs to this conversation; the chain stops here.
    Consumed,
    /// Not ours — hand it to the rest of the chain.
    Declined,
}

/// What happens to the conversation's registry entry after the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fate {
    Keep,
    Retire,
}

fn disposition(consumed: bool) -> Disposition {
    if consumed {
        Disposition::Consumed
    } else {
        Disposition::Declined
    }
}

/// Advance `state` against the context's current event.
///
/// On error the state is left exactly where it was (a failed `Await`
/// operation keeps its pending command; the caller restores the entry).
pub(crate) async fn drive(
    state: &mut SequenceState,
    ctx: &Context,
    routine: &dyn Routine,
    policy: Policy,
) -> Result<(Disposition, Fate)> {
    let mut consumed = false;

    loop {
        let Some(pending) = state.pending.take() else {
            // Nothing pending yet: run the routine to its first suspension.
            match state.routine.advance(None)? {
                Step::Yielded(command) => {
                    state.pending = Some(Pending::Command(command));
                    continue;
                },
                Step::Complete => return Ok((disposition(consumed), Fate::Retire)),
            }
        };

        match pending {
            Pending::Start => {
                if consumed || ctx.kind() != EventKind::Open {
                    // Not our start event (or this event already started a
                    // fresh instance); keep waiting.
                    state.pending = Some(Pending::Start);
                    return Ok((disposition(consumed), Fate::Keep));
                }
                debug!(ctx = %ctx.id(), "start event opens conversation");
                consumed = true;
                match state.routine.advance(None)? {
                    Step::Yielded(command) => {
                        state.pending = Some(Pending::Command(command));
                    },
                    Step::Complete => rearm(state, ctx, routine),
                }
            },

            Pending::Command(SequenceCommand::Assertion(predicate)) => {
                if !predicate() {
                    // A failed assertion consumes nothing; the event always
                    // falls through to the rest of the chain.
                    if policy.interruptible {
                        state.pending =
                            Some(Pending::Command(SequenceCommand::Assertion(predicate)));
                        return Ok((Disposition::Declined, Fate::Keep));
                    }
                    debug!(ctx = %ctx.id(), "assertion failed, abandoning conversation");
                    return Ok((Disposition::Declined, Fate::Retire));
                }
                match state.routine.advance(Some(Resume::Asserted))? {
                    Step::Yielded(command) => {
                        state.pending = Some(Pending::Command(command));
                    },
                    Step::Complete => return Ok((disposition(consumed), Fate::Retire)),
                }
            },

            Pending::Command(SequenceCommand::Await(operation)) => {
                // Restore the suspension before awaiting: a failed
                // operation must leave the conversation where it was, and
                // the retained thunk lets the next event retry it.
                let operation_fut = operation();
                state.pending = Some(Pending::Command(SequenceCommand::Await(operation)));
                let value = match operation_fut.await {
                    Ok(value) => value,
                    Err(source) => {
                        warn!(ctx = %ctx.id(), error = %source, "sequence operation failed");
                        return Err(Error::Operation(source));
                    },
                };
                state.pending = None;
                match state.routine.advance(Some(Resume::Resolved(value)))? {
                    Step::Yielded(command) => {
                        state.pending = Some(Pending::Command(command));
                    },
                    Step::Complete => {
                        if policy.start_gated {
                            rearm(state, ctx, routine);
                        } else {
                            return Ok((disposition(consumed), Fate::Retire));
                        }
                    },
                }
            },

            Pending::Command(
                command @ (SequenceCommand::MatchMessage(_) | SequenceCommand::GetMessage),
            ) => {
                if consumed {
                    // One event never satisfies two message commands.
                    state.pending = Some(Pending::Command(command));
                    return Ok((Disposition::Consumed, Fate::Keep));
                }
                if ctx.kind() != EventKind::Message {
                    // This conversation has nothing to say about other
                    // event kinds; its suspension survives untouched.
                    state.pending = Some(Pending::Command(command));
                    return Ok((Disposition::Declined, Fate::Keep));
                }

                let message = ctx.message();
                let matched = match &command {
                    SequenceCommand::MatchMessage(predicate) => predicate(&message),
                    _ => true,
                };
                if !matched {
                    if policy.interruptible {
                        state.pending = Some(Pending::Command(command));
                        return Ok((Disposition::Declined, Fate::Keep));
                    }
                    debug!(ctx = %ctx.id(), "message match failed, abandoning conversation");
                    return Ok((Disposition::Declined, Fate::Retire));
                }

                debug!(ctx = %ctx.id(), "message consumed by conversation");
                consumed = true;
                match state.routine.advance(Some(Resume::Message(message)))? {
                    Step::Yielded(command) => {
                        state.pending = Some(Pending::Command(command));
                    },
                    Step::Complete => {
                        if policy.start_gated {
                            rearm(state, ctx, routine);
                        } else {
                            return Ok((Disposition::Consumed, Fate::Retire));
                        }
                    },
                }
            },
        }
    }
}

/// Replace a completed start-gated routine with a fresh instance parked on
/// the next start event.
fn rearm(state: &mut SequenceState, ctx: &Context, routine: &dyn Routine) {
    debug!(ctx = %ctx.id(), "conversation complete, re-arming for next start event");
    *state = SequenceState::arm(routine, ctx, true);
}
