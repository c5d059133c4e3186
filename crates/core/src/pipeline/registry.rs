//! # Active Run Registry
//!
//! Advisory lock by blog id: at most one in-process run per blog. The
//! registry lives only in memory and is created empty when the process
//! starts. After a restart nothing is active, so a blog whose persisted status
//! still names an in-flight stage can always be resumed. Crash recovery relies
//! on this.

use crate::error::{PipelineError, PipelineResult};
use crate::state::BlogId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// What holds a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// The sequencer loop; the only holder that honours pause requests
    Pipeline,
    /// A one-shot operation (topic generation, topic pick, delete)
    Exclusive,
}

/// Shared state of one registered run
#[derive(Debug)]
pub struct RunSignal {
    kind: RunKind,
    pause_requested: AtomicBool,
    started_at: DateTime<Utc>,
}

impl RunSignal {
    fn new(kind: RunKind) -> Self {
        Self {
            kind,
            pause_requested: AtomicBool::new(false),
            started_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> RunKind {
        self.kind
    }

    pub fn pause_requested(&self) -> bool {
        self.pause_requested.load(Ordering::SeqCst)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// In-memory set of blogs with a registered run
#[derive(Debug, Default)]
pub struct ActiveRuns {
    runs: Mutex<HashMap<BlogId, Arc<RunSignal>>>,
}

impl ActiveRuns {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BlogId, Arc<RunSignal>>> {
        // The map holds no invariants a panicking holder could break
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a run for `id`, or fail with `AlreadyActive`.
    ///
    /// The returned guard deregisters on drop, including during unwinding.
    pub fn try_register(self: &Arc<Self>, id: BlogId, kind: RunKind) -> PipelineResult<RunGuard> {
        let mut runs = self.lock();
        if runs.contains_key(&id) {
            return Err(PipelineError::AlreadyActive(id));
        }
        let signal = Arc::new(RunSignal::new(kind));
        runs.insert(id, Arc::clone(&signal));
        tracing::debug!(blog_id = id, ?kind, "run registered");

        Ok(RunGuard {
            registry: Arc::clone(self),
            id,
            signal,
        })
    }

    pub fn is_active(&self, id: BlogId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Ask the pipeline loop for `id` to stop at its next stage boundary.
    ///
    /// Returns `false` when no loop is registered. An `Exclusive` holder
    /// never reads the flag, so it is left untouched.
    pub fn request_pause(&self, id: BlogId) -> bool {
        match self.lock().get(&id) {
            Some(signal) if signal.kind == RunKind::Pipeline => {
                signal.pause_requested.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    pub fn started_at(&self, id: BlogId) -> Option<DateTime<Utc>> {
        self.lock().get(&id).map(|s| s.started_at())
    }

    pub fn active_ids(&self) -> Vec<BlogId> {
        let mut ids: Vec<_> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn release(&self, id: BlogId, signal: &Arc<RunSignal>) {
        let mut runs = self.lock();
        if runs.get(&id).is_some_and(|s| Arc::ptr_eq(s, signal)) {
            runs.remove(&id);
            tracing::debug!(blog_id = id, "run deregistered");
        }
    }
}

/// Proof of registration for one blog
#[derive(Debug)]
pub struct RunGuard {
    registry: Arc<ActiveRuns>,
    id: BlogId,
    signal: Arc<RunSignal>,
}

impl RunGuard {
    pub fn blog_id(&self) -> BlogId {
        self.id
    }

    pub fn kind(&self) -> RunKind {
        self.signal.kind()
    }

    pub fn pause_requested(&self) -> bool {
        self.signal.pause_requested()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.release(self.id, &self.signal);
    }
}
