//! Worker state shared between the control surface (spec §4.1's public operations, invoked
//! from the Manager's delivery thread) and the worker's recipe loop. Mirrors the teacher's
//! `Context<T>` idiom — an `Arc<(Mutex<_>, Condvar)>` pair the control surface locks for the
//! duration of each call and notifies after mutating — but carries the richer state the
//! recipe loop needs rather than a single cancellation flag.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::worker::state::{RecipeVersion, StateDescriptor};

/// Bounds `recipe_count` so it never grows without limit; any monotonically increasing tag
/// with a staleness check would do (spec §9, open question 3).
pub const RECIPE_COUNT_RESET: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbortMode {
    #[default]
    None,
    Soft,
    Hard,
}

/// A consistent snapshot of the fields the recipe loop needs to run one iteration, taken
/// under a single lock acquisition so `status`/`version`/`recipe_count` never mix across two
/// different loads.
pub struct RecipeLoad {
    pub version: Option<RecipeVersion>,
    pub recipe_count: u64,
    pub status: usize,
    pub state: Option<StateDescriptor>,
}

pub struct SharedState {
    pub version: Option<RecipeVersion>,
    pub states: Vec<StateDescriptor>,
    pub status: usize,
    pub run: bool,
    pub abort_mode: AbortMode,
    pub recipe_count: u64,
    pub done_set: HashSet<String>,
    pub waiting: Option<String>,
    pub end: bool,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            version: None,
            states: Vec::new(),
            status: 0,
            run: false,
            abort_mode: AbortMode::None,
            recipe_count: 0,
            done_set: HashSet::new(),
            waiting: None,
            end: false,
        }
    }
}

/// Cloneable handle onto the shared worker state. `lock()`/`notify_all()` are the only two
/// primitives every control-surface operation needs; the recipe loop additionally parks on
/// [`Self::wait_until_runnable`].
#[derive(Clone)]
pub struct WorkerHandle(Arc<(Mutex<SharedState>, Condvar)>);

impl WorkerHandle {
    pub fn new() -> Self {
        Self(Arc::new((Mutex::new(SharedState::default()), Condvar::new())))
    }

    pub fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.0 .0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn notify_all(&self) {
        self.0 .1.notify_all();
    }

    /// Blocks the recipe loop until `run` becomes true, never holding the lock across the
    /// wait itself (the condvar wait releases it).
    pub fn wait_until_runnable(&self) {
        let mut guard = self.0 .0.lock().unwrap_or_else(|e| e.into_inner());
        while !guard.run {
            guard = self.0 .1.wait(guard).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// The Wait Barrier: blocks until `sid` is in `done_set` or `run` goes false, then
    /// reports which. Runs on the worker thread itself (Design Note (a), spec §9): no
    /// isolation benefit for this one builtin, but no cross-process wake primitive needed
    /// either.
    pub fn wait_for_done(&self, sid: &str) -> bool {
        let mut guard = self.0 .0.lock().unwrap_or_else(|e| e.into_inner());
        guard.waiting = Some(sid.to_string());
        while !guard.done_set.contains(sid) && guard.run {
            guard = self.0 .1.wait(guard).unwrap_or_else(|e| e.into_inner());
        }
        let done = guard.done_set.contains(sid);
        guard.waiting = None;
        done
    }
}

impl Default for WorkerHandle {
    fn default() -> Self {
        Self::new()
    }
}
