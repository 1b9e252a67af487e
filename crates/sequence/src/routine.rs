use std::{
    future::Future,
    sync::{Arc, Mutex},
    task::{Context as TaskContext, Poll},
};

use {
    anyhow::Result,
    futures::{future::BoxFuture, task::noop_waker_ref},
    serde_json::Value,
};

use confab_pipeline::Context;

use crate::command::{self, SequenceCommand};

// ── Routine factory ─────────────────────────────────────────────────────────

/// Factory for one conversation's routine.
///
/// Invoked once per conversation (and again when a start-gated conversation
/// re-arms). The returned future is the routine body: straight-line async
/// code that suspends by awaiting yield points of its [`Sequence`] handle
/// and terminates by returning.
///
/// The body must not await anything else — the interpreter resumes it only
/// when a matching event or a completed operation arrives, so a foreign
/// future would leave it stuck and is reported as a fatal error.
pub trait Routine: Send + Sync + 'static {
    fn begin(&self, ctx: Context, seq: Sequence) -> BoxFuture<'static, Result<()>>;
}

impl<F, Fut> Routine for F
where
    F: Fn(Context, Sequence) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn begin(&self, ctx: Context, seq: Sequence) -> BoxFuture<'static, Result<()>> {
        Box::pin(self(ctx, seq))
    }
}

// ── Resumption values ───────────────────────────────────────────────────────

/// What a routine receives back from a yield point.
#[derive(Debug, Clone, PartialEq)]
pub enum Resume {
    /// The payload of the matched message.
    Message(Value),
    /// A passed assertion carries nothing.
    Asserted,
    /// The value the awaited operation resolved to.
    Resolved(Value),
}

// ── Sequence handle ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Slot {
    command: Option<SequenceCommand>,
    resume: Option<Resume>,
}

/// The yield handle a routine suspends through.
///
/// [`Sequence::issue`] is the primitive; the other methods are sugar over
/// the corresponding [`command`] constructors.
#[derive(Clone)]
pub struct Sequence {
    slot: Arc<Mutex<Slot>>,
}

impl Sequence {
    /// Yield `command` and suspend until the interpreter resumes the
    /// routine with a value.
    pub async fn issue(&self, command: SequenceCommand) -> Resume {
        YieldPoint {
            slot: Arc::clone(&self.slot),
            command: Some(command),
        }
        .await
    }

    /// Wait for the next message; resolves to its payload.
    pub async fn message(&self) -> Value {
        match self.issue(command::get_message()).await {
            Resume::Message(value) => value,
            other => unreachable!("get_message resumed with {other:?}"),
        }
    }

    /// Wait for a message satisfying `predicate`; resolves to its payload.
    pub async fn match_message<F>(&self, predicate: F) -> Value
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        match self.issue(command::match_message(predicate)).await {
            Resume::Message(value) => value,
            other => unreachable!("match_message resumed with {other:?}"),
        }
    }

    /// Suspend on `predicate`; resolves once it holds.
    pub async fn assert<F>(&self, predicate: F)
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.issue(command::assert(predicate)).await;
    }

    /// Run the supplied operation; resolves to its value.
    pub async fn perform<F, Fut>(&self, operation: F) -> Value
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        match self.issue(command::await_operation(operation)).await {
            Resume::Resolved(value) => value,
            other => unreachable!("await_operation resumed with {other:?}"),
        }
    }
}

/// First poll publishes the command and parks; the next poll (after the
/// interpreter stored a resume value) completes.
struct YieldPoint {
    slot: Arc<Mutex<Slot>>,
    command: Option<SequenceCommand>,
}

impl Future for YieldPoint {
    type Output = Resume;

    fn poll(self: std::pin::Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<Resume> {
        let this = self.get_mut();
        let mut slot = this.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(command) = this.command.take() {
            slot.command = Some(command);
            return Poll::Pending;
        }
        match slot.resume.take() {
            Some(value) => Poll::Ready(value),
            None => Poll::Pending,
        }
    }
}

// ── Driving a routine ───────────────────────────────────────────────────────

/// Outcome of advancing a routine by one step.
#[derive(Debug)]
pub(crate) enum Step {
    /// The routine suspended on a new command.
    Yielded(SequenceCommand),
    /// The routine body returned.
    Complete,
}

/// A spawned routine plus the slot it exchanges commands and resume values
/// through. Each advance polls the future exactly once, so a routine is
/// resumed exactly once per value.
pub(crate) struct RoutineHandle {
    fut: Option<BoxFuture<'static, Result<()>>>,
    slot: Arc<Mutex<Slot>>,
}

impl RoutineHandle {
    pub(crate) fn spawn(routine: &dyn Routine, ctx: &Context) -> Self {
        let slot = Arc::new(Mutex::new(Slot::default()));
        let seq = Sequence {
            slot: Arc::clone(&slot),
        };
        Self {
            fut: Some(routine.begin(ctx.clone(), seq)),
            slot,
        }
    }

    /// Resume the routine with `resume` (or bootstrap it with `None`) and
    /// run it to its next suspension point or to completion.
    pub(crate) fn advance(&mut self, resume: Option<Resume>) -> crate::Result<Step> {
        let Some(fut) = self.fut.as_mut() else {
            return Ok(Step::Complete);
        };

        {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            slot.resume = resume;
            slot.command = None;
        }

        let mut task_cx = TaskContext::from_waker(noop_waker_ref());
        match fut.as_mut().poll(&mut task_cx) {
            Poll::Ready(result) => {
                self.fut = None;
                result.map_err(crate::Error::Routine)?;
                Ok(Step::Complete)
            },
            Poll::Pending => {
                let command = {
                    let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
                    // An unconsumed resume value must not leak into a later
                    // yield point.
                    slot.resume = None;
                    slot.command.take()
                };
                match command {
                    Some(command) => Ok(Step::Yielded(command)),
                    None => {
                        self.fut = None;
                        Err(crate::Error::ForeignSuspend)
                    },
                }
            },
        }
    }
}
