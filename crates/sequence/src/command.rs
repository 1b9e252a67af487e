use std::{fmt, future::Future, sync::Arc};

use {anyhow::Result, futures::future::BoxFuture, serde_json::Value};

/// Predicate over an inbound message payload.
pub type MessagePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Predicate evaluated against no input.
pub type AssertPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Thunk producing the asynchronous operation behind an `Await` command.
///
/// Kept invocable rather than consumed so a failed operation can be retried
/// when the next event reaches the conversation.
pub type Operation = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A suspension point yielded by a routine.
///
/// Commands are pure data: constructing one has no effect until the
/// interpreter reaches it.
#[derive(Clone)]
pub enum SequenceCommand {
    /// Suspend until a message arrives whose payload satisfies the
    /// predicate.
    MatchMessage(MessagePredicate),
    /// Suspend until any message arrives.
    GetMessage,
    /// Suspend on a condition that consumes no event; evaluated the moment
    /// an event reaches the conversation.
    Assertion(AssertPredicate),
    /// Suspend until the supplied operation resolves; consumes no event.
    Await(Operation),
}

/// Suspend until a message satisfying `predicate` arrives.
pub fn match_message<F>(predicate: F) -> SequenceCommand
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    SequenceCommand::MatchMessage(Arc::new(predicate))
}

/// Suspend until any message arrives.
pub fn get_message() -> SequenceCommand {
    SequenceCommand::GetMessage
}

/// Suspend on `predicate`; a failed assertion declines the current event.
pub fn assert<F>(predicate: F) -> SequenceCommand
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    SequenceCommand::Assertion(Arc::new(predicate))
}

/// Suspend until the operation produced by `operation` resolves.
pub fn await_operation<F, Fut>(operation: F) -> SequenceCommand
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    SequenceCommand::Await(Arc::new(move || Box::pin(operation())))
}

impl fmt::Debug for SequenceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MatchMessage(_) => f.write_str("MatchMessage"),
            Self::GetMessage => f.write_str("GetMessage"),
            Self::Assertion(_) => f.write_str("Assertion"),
            Self::Await(_) => f.write_str("Await"),
        }
    }
}

/// Structural equality: same variant, and for closure-carrying variants the
/// same underlying closure (pointer identity). A retained pending command
/// compares equal to itself across failed match attempts.
impl PartialEq for SequenceCommand {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::MatchMessage(a), Self::MatchMessage(b)) => Arc::ptr_eq(a, b),
            (Self::GetMessage, Self::GetMessage) => true,
            (Self::Assertion(a), Self::Assertion(b)) => Arc::ptr_eq(a, b),
            (Self::Await(a), Self::Await(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
