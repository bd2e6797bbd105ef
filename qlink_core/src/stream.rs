//! Per-agent stream over the arena's systems.

use crate::arena::QuantumArena;
use crate::ownership::Holder;
use crate::sink::Progress;
use crate::system::SystemView;
use std::iter::FusedIterator;
use std::sync::Arc;

/// Yields a [`SystemView`] for every system of the arena, in index order.
///
/// Each agent gets its own stream over the same shared arena. Iterating
/// advances the agent's progress counter: it reads `i` while system `i` is
/// being processed and the system count once the stream is exhausted.
///
/// The stream owns its handles, so the agent context stays free for
/// sending and receiving while it is being iterated.
pub struct SystemStream {
    arena: Arc<QuantumArena>,
    holder: Holder,
    progress: Arc<Progress>,
    next: usize,
}

impl SystemStream {
    pub(crate) fn new(arena: Arc<QuantumArena>, holder: Holder, progress: Arc<Progress>) -> Self {
        Self { arena, holder, progress, next: 0 }
    }
}

impl Iterator for SystemStream {
    type Item = SystemView;

    fn next(&mut self) -> Option<SystemView> {
        let count = self.arena.system_count();
        if self.next >= count {
            self.progress.set(count);
            return None;
        }
        let index = self.next;
        self.next += 1;
        self.progress.set(index);
        // In range by construction
        self.arena.view_as(index, self.holder).ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.arena.system_count().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SystemStream {}

impl FusedIterator for SystemStream {}
