use std::{
    fmt,
    sync::{Arc, RwLock},
};

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
    uuid::Uuid,
};

// ── EventKind ───────────────────────────────────────────────────────────────

/// The kind of event currently flowing through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The connection was established. Carries no payload.
    Open,
    /// An inbound message with a payload.
    Message,
    /// The connection is going away. Middleware should release any
    /// per-connection state it holds.
    Close,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Message => write!(f, "message"),
            Self::Close => write!(f, "close"),
        }
    }
}

// ── Context ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Event {
    kind: EventKind,
    message: Value,
}

struct ContextInner {
    id: Uuid,
    event: RwLock<Event>,
}

/// Per-connection context handle.
///
/// One `Context` is created when a connection opens and lives for the whole
/// connection. The transport updates the current event before each dispatch;
/// middleware reads it through [`Context::kind`] and [`Context::message`].
/// Clones share the same connection — the handle is cheap to pass around.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: Uuid::new_v4(),
                event: RwLock::new(Event {
                    kind: EventKind::Open,
                    message: Value::Null,
                }),
            }),
        }
    }

    /// Stable identity of the connection this context belongs to.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Kind of the event currently being dispatched.
    pub fn kind(&self) -> EventKind {
        self.inner
            .event
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .kind
    }

    /// Payload of the event currently being dispatched.
    pub fn message(&self) -> Value {
        self.inner
            .event
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .message
            .clone()
    }

    /// Replace the current event. Called by the transport (or [`Pipeline`])
    /// before running the chain — never by middleware.
    ///
    /// [`Pipeline`]: crate::Pipeline
    pub fn set_event(&self, kind: EventKind, message: Value) {
        let mut event = self.inner.event.write().unwrap_or_else(|e| e.into_inner());
        event.kind = kind;
        event.message = message;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let event = self.inner.event.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("kind", &event.kind)
            .field("message", &event.message)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn context_starts_as_open() {
        let ctx = Context::new();
        assert_eq!(ctx.kind(), EventKind::Open);
        assert_eq!(ctx.message(), Value::Null);
    }

    #[test]
    fn clones_share_the_event() {
        let ctx = Context::new();
        let clone = ctx.clone();
        ctx.set_event(EventKind::Message, json!({"n": 1}));
        assert_eq!(clone.kind(), EventKind::Message);
        assert_eq!(clone.message(), json!({"n": 1}));
        assert_eq!(clone.id(), ctx.id());
    }

    #[test]
    fn distinct_contexts_have_distinct_ids() {
        assert_ne!(Context::new().id(), Context::new().id());
    }

    #[test]
    fn event_kind_display_matches_serde() {
        for kind in [EventKind::Open, EventKind::Message, EventKind::Close] {
            let json = serde_json::to_string(&kind).unwrap_or_default();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }
}
