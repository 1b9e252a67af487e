//! Suspendable conversation sequences for confab pipelines.
//!
//! A sequence expresses a multi-step conversational protocol — "wait for
//! message X, assert condition Y, await an operation, wait for message Z" —
//! as one straight-line async routine instead of a state machine scattered
//! across handlers. The routine suspends by yielding a [`SequenceCommand`]
//! through its [`Sequence`] handle; the interpreter resumes it when a
//! matching message or a completed operation arrives, and multiplexes one
//! suspended routine per context behind a single middleware link.
//!
//! An event is *consumed* when it resumes a conversation (the chain stops
//! at the adapter) and *declined* otherwise (the chain continues). Failed
//! predicates are control flow, not errors: an [`interruptible`]
//! conversation retries on the next message, an [`uninterruptible`] one is
//! abandoned for good. [`on_connect`] scopes the routine to the connection
//! lifecycle, starting it at the `Open` event and re-arming it on
//! completion.

pub mod command;
pub mod error;
pub mod middleware;
pub mod routine;

mod interpreter;
mod state;

pub use {
    command::{SequenceCommand, assert, await_operation, get_message, match_message},
    error::{Error, Result},
    middleware::{
        SequenceMiddleware, interruptible, interuptable, on_connect, uninterruptible,
        uninteruptable,
    },
    routine::{Resume, Routine, Sequence},
};
