//! Snapshot request mailbox.
//!
//! Hands snapshot commands from asynchronous requesters (UI actions, host messages,
//! timers) to the core, which only looks for work at its own polling points.
//!
//! Model:
//! - `queue`: FIFO of commands nobody has looked at yet.
//! - `active`: the single command currently offered to the core.
//!
//! `active` is filled lazily from the front of the queue by the first peek/consume that
//! finds it empty. Peeking is free to repeat; consuming the request id is the one
//! irrevocable hand-off and discards the command.
//!
//! The mailbox is an ordinary value: construct one per runtime and share it through an
//! `Arc` with every producer. All state sits behind one mutex so producers on other
//! threads cannot break FIFO order or the single active slot.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};


/// What the core is asked to do with a snapshot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SnapshotKind {
    Save,
    Load,
}

impl SnapshotKind {
    /// Code reported through `js_snapshot_take_kind`.
    pub const fn code(self) -> i32 {
        match self {
            SnapshotKind::Save => crate::abi::snapshot_codes::SAVE,
            SnapshotKind::Load => crate::abi::snapshot_codes::LOAD,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            crate::abi::snapshot_codes::SAVE => Some(SnapshotKind::Save),
            crate::abi::snapshot_codes::LOAD => Some(SnapshotKind::Load),
            _ => None,
        }
    }
}

/// One pending request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SnapshotCommand {
    pub kind: SnapshotKind,
    /// Caller-assigned correlation id. Uniqueness is the caller's job.
    pub request_id: u32,
}

#[derive(Debug, Default)]
struct Slots {
    queue: VecDeque<SnapshotCommand>,
    active: Option<SnapshotCommand>,
}

impl Slots {
    fn ensure_active(&mut self) -> Option<&SnapshotCommand> {
        if self.active.is_none() {
            self.active = self.queue.pop_front();
        }
        self.active.as_ref()
    }
}

/// Single-consumer hand-off buffer for snapshot commands.
///
/// The queue is unbounded: producers are never blocked or refused.
#[derive(Debug, Default)]
pub struct SnapshotMailbox {
    slots: Mutex<Slots>,
}

impl SnapshotMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    // Every operation leaves `Slots` consistent, so a panic elsewhere while holding the
    // lock does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a command to the tail of the queue.
    pub fn enqueue(&self, kind: SnapshotKind, request_id: u32) {
        let mut slots = self.lock();
        slots.queue.push_back(SnapshotCommand { kind, request_id });
        log::debug!(
            "snapshot mailbox: queued {kind:?} request {request_id} ({} pending)",
            slots.queue.len() + usize::from(slots.active.is_some())
        );
    }

    /// Kind of the active command, promoting the queue head if nothing is active.
    ///
    /// Repeated calls return the same value until [`Self::consume_request_id`] runs.
    pub fn peek_kind(&self) -> Option<SnapshotKind> {
        self.lock().ensure_active().map(|command| command.kind)
    }

    /// Take the active command's request id, discarding the command.
    ///
    /// Returns `None` when nothing is pending.
    pub fn consume_request_id(&self) -> Option<u32> {
        let mut slots = self.lock();
        slots.ensure_active();
        slots.active.take().map(|command| command.request_id)
    }

    /// Peek at the whole active command without consuming it.
    pub fn peek(&self) -> Option<SnapshotCommand> {
        self.lock().ensure_active().copied()
    }

    /// Commands not yet consumed (queued plus active).
    pub fn len(&self) -> usize {
        let slots = self.lock();
        slots.queue.len() + usize::from(slots.active.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
