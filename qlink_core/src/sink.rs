//! Results sink and progress board.
//!
//! Every agent publishes at most one result, keyed by its id. The sink is
//! shared by all agent threads; it is only read back as [`Results`] by
//! [`Simulation::run`](crate::Simulation::run), after every agent has been
//! joined.

use crate::error::SinkError;
use qlink_env::AgentId;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Progress counter of one agent.
#[derive(Debug, Default)]
pub struct Progress {
    current: AtomicUsize,
    total: AtomicUsize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(total),
        }
    }

    /// Returns `(current, total)`.
    pub fn get(&self) -> (usize, usize) {
        (self.current.load(Ordering::Relaxed), self.total.load(Ordering::Relaxed))
    }

    /// Sets the current value, clamped to the total.
    pub fn set(&self, current: usize) {
        let total = self.total.load(Ordering::Relaxed);
        self.current.store(current.min(total), Ordering::Relaxed);
    }

    /// Advances by one, saturating at the total.
    pub fn increment(&self) {
        let total = self.total.load(Ordering::Relaxed);
        let _ = self
            .current
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| (c < total).then_some(c + 1));
    }

    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// Completed fraction in [0, 1]; 1 when the total is 0.
    pub fn fraction(&self) -> f64 {
        let (current, total) = self.get();
        if total == 0 {
            1.0
        } else {
            current as f64 / total as f64
        }
    }
}

/// Point-in-time progress of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEntry {
    pub agent: AgentId,
    pub current: usize,
    pub total: usize,
}

type ProgressMap = Arc<Mutex<BTreeMap<AgentId, Arc<Progress>>>>;

/// Read-only view of every agent's progress, safe to poll during a run.
#[derive(Clone, Default)]
pub struct ProgressBoard {
    entries: ProgressMap,
}

impl ProgressBoard {
    /// Returns every agent's progress, ordered by agent id.
    pub fn snapshot(&self) -> Vec<ProgressEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .map(|(agent, progress)| {
                let (current, total) = progress.get();
                ProgressEntry { agent: agent.clone(), current, total }
            })
            .collect()
    }

    /// Returns the registered agent ids.
    pub fn agents(&self) -> Vec<AgentId> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.keys().cloned().collect()
    }

    /// Returns true once every registered counter is full.
    pub fn is_complete(&self) -> bool {
        self.snapshot().iter().all(|e| e.current >= e.total)
    }
}

impl fmt::Debug for ProgressBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.snapshot()).finish()
    }
}

struct SinkInner<R> {
    results: Mutex<HashMap<AgentId, R>>,
    progress: ProgressMap,
}

/// Write-once store for per-agent results, shared by all agent threads.
///
/// Agents write through [`AgentContext::output`](crate::AgentContext::output).
/// Nothing outside the crate can read the sink; results only come back as
/// [`Results`] from [`Simulation::run`](crate::Simulation::run).
///
/// ```compile_fail
/// let sink = qlink_core::ResultsSink::<u8>::new();
/// let _ = sink.drain();
/// ```
pub struct ResultsSink<R> {
    inner: Arc<SinkInner<R>>,
}

impl<R> Clone for ResultsSink<R> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<R> Default for ResultsSink<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ResultsSink<R> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SinkInner {
                results: Mutex::new(HashMap::new()),
                progress: Arc::new(Mutex::new(BTreeMap::new())),
            }),
        }
    }

    /// Stores an agent's result.
    ///
    /// # Errors
    /// `SinkError::AlreadyPublished` if the agent already published one; the
    /// first result is kept.
    pub fn publish(&self, agent: &AgentId, result: R) -> Result<(), SinkError> {
        let mut results = self.inner.results.lock().unwrap_or_else(PoisonError::into_inner);
        if results.contains_key(agent) {
            return Err(SinkError::AlreadyPublished(agent.clone()));
        }
        results.insert(agent.clone(), result);
        Ok(())
    }

    /// Registers (or re-registers) the progress counter of an agent.
    pub fn register(&self, agent: &AgentId, total: usize) -> Arc<Progress> {
        let progress = Arc::new(Progress::new(total));
        let mut entries = self.inner.progress.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(agent.clone(), Arc::clone(&progress));
        progress
    }

    pub fn progress_board(&self) -> ProgressBoard {
        ProgressBoard { entries: Arc::clone(&self.inner.progress) }
    }

    /// Returns true if both handles point to the same sink.
    pub fn same_sink(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Takes every published result out of the sink.
    pub(crate) fn drain(&self) -> Results<R> {
        let mut results = self.inner.results.lock().unwrap_or_else(PoisonError::into_inner);
        Results { entries: std::mem::take(&mut *results) }
    }
}

impl<R> fmt::Debug for ResultsSink<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultsSink").finish_non_exhaustive()
    }
}

/// Results of a finished run, keyed by agent id.
#[derive(Debug, Clone, PartialEq)]
pub struct Results<R> {
    entries: HashMap<AgentId, R>,
}

impl<R> Results<R> {
    /// Returns an agent's result.
    pub fn get(&self, agent: &str) -> Option<&R> {
        self.entries.get(agent)
    }

    /// Removes and returns an agent's result.
    pub fn take(&mut self, agent: &str) -> Option<R> {
        self.entries.remove(agent)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &R)> {
        self.entries.iter()
    }

    /// Returns the agent ids that published, sorted.
    pub fn agents(&self) -> Vec<&AgentId> {
        let mut agents: Vec<_> = self.entries.keys().collect();
        agents.sort();
        agents
    }

    pub fn into_inner(self) -> HashMap<AgentId, R> {
        self.entries
    }
}

impl<R> IntoIterator for Results<R> {
    type Item = (AgentId, R);
    type IntoIter = std::collections::hash_map::IntoIter<AgentId, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
