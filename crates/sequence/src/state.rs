use std::{collections::HashMap, sync::Mutex};

use uuid::Uuid;

use confab_pipeline::Context;

use crate::{
    command::SequenceCommand,
    routine::{Routine, RoutineHandle},
};

// ── Sequence state ──────────────────────────────────────────────────────────

/// The suspension a conversation is parked on.
#[derive(Debug)]
pub(crate) enum Pending {
    /// Synthetic start gate: the routine is not advanced until the
    /// connection's `Open` event arrives. Distinct from the public command
    /// vocabulary.
    Start,
    Command(SequenceCommand),
}

/// One conversation: the routine plus its current suspension point.
/// `pending` is `None` only before the first advance.
pub(crate) struct SequenceState {
    pub(crate) routine: RoutineHandle,
    pub(crate) pending: Option<Pending>,
}

impl SequenceState {
    pub(crate) fn arm(routine: &dyn Routine, ctx: &Context, start_gated: bool) -> Self {
        Self {
            routine: RoutineHandle::spawn(routine, ctx),
            pending: start_gated.then_some(Pending::Start),
        }
    }
}

// ── Registry ────────────────────────────────────────────────────────────────

enum Entry {
    Running(SequenceState),
    /// The conversation completed or was abandoned. The tombstone keeps a
    /// later event from restarting the routine; it is dropped with the
    /// connection's `Close` event.
    Retired,
}

/// Side-table of conversations owned by one adapter, keyed by context id.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Mutex<HashMap<Uuid, Entry>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Take the context's running state for one interpreter step, creating
    /// it on first sight. Returns `None` for a retired conversation.
    ///
    /// The entry is absent while the step runs; the transport is expected
    /// to deliver one event at a time per connection.
    pub(crate) fn take_or_create(
        &self,
        id: Uuid,
        create: impl FnOnce() -> SequenceState,
    ) -> Option<SequenceState> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(entries.get(&id), Some(Entry::Retired)) {
            return None;
        }
        match entries.remove(&id) {
            Some(Entry::Running(state)) => Some(state),
            _ => Some(create()),
        }
    }

    /// Put a still-live conversation back after a step.
    pub(crate) fn restore(&self, id: Uuid, state: SequenceState) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(id, Entry::Running(state));
    }

    /// End the conversation for this context, permanently.
    pub(crate) fn retire(&self, id: Uuid) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(id, Entry::Retired);
    }

    /// Drop whatever the context holds — called when it closes.
    pub(crate) fn remove(&self, id: Uuid) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(&id);
    }

    #[cfg(test)]
    pub(crate) fn is_retired(&self, id: Uuid) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        matches!(entries.get(&id), Some(Entry::Retired))
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.is_empty()
    }
}
