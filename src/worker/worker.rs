//! The States Worker (spec §4.1): the recipe loop and the public control surface the
//! Manager's delivery thread calls into (`load`, `abort`, `kill`, `state_done`,
//! `is_waiting`, `get_version`). Split teacher-style into an unstarted builder and a running
//! handle (mirroring `supervisor::runner::SupervisorRunner<Stopped/Running>`), so
//! construction and thread spawn are visibly separate steps.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use crate::context::Context;
use crate::worker::error::WorkerError;
use crate::worker::executor::{RunningStep, StepRunner};
use crate::worker::manager::{Manager, StateLog};
use crate::worker::modules::ModuleSet;
use crate::worker::shared::{AbortMode, RecipeLoad, WorkerHandle, RECIPE_COUNT_RESET};
use crate::worker::state::{StateDescriptor, BUILTIN_COMMENT, BUILTIN_WAIT};
use crate::worker::state_executor::ExecutionOutcome;

/// Delay between successfully completed states within a recipe.
const WAIT_STATE: Duration = Duration::from_secs(1);
/// Delay before retrying a recipe from the start after a state fails.
const WAIT_STATE_RETRY: Duration = Duration::from_secs(2);
/// Delay between `send` retries when the Manager rejects or is absent.
const WAIT_RESEND: Duration = Duration::from_secs(2);

/// A States Worker that hasn't spawned its recipe-loop thread yet.
pub struct Worker {
    init: String,
    manager: Arc<dyn Manager>,
    steps: Arc<dyn StepRunner>,
    modules: Arc<dyn ModuleSet>,
    recipe_delay: Duration,
}

/// A running States Worker: the thread-safe control surface plus the join handle of its
/// recipe-loop thread.
pub struct RunningWorker {
    handle: WorkerHandle,
    kill_cancel: Context<bool>,
    delay_cancel: Context<bool>,
    join: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new(
        init: impl Into<String>,
        manager: Arc<dyn Manager>,
        steps: Arc<dyn StepRunner>,
        modules: Arc<dyn ModuleSet>,
        recipe_delay: Duration,
    ) -> Self {
        Self {
            init: init.into(),
            manager,
            steps,
            modules,
            recipe_delay,
        }
    }

    pub fn run(self) -> RunningWorker {
        let handle = WorkerHandle::new();
        let kill_cancel = Context::<bool>::new();
        let delay_cancel = Context::<bool>::new();

        let loop_handle = handle.clone();
        let loop_kill_cancel = kill_cancel.clone();
        let loop_delay_cancel = delay_cancel.clone();
        let init = self.init;
        let manager = self.manager;
        let steps = self.steps;
        let modules = self.modules;
        let recipe_delay = self.recipe_delay;

        let join = thread::spawn(move || {
            recipe_loop(
                loop_handle,
                loop_kill_cancel,
                loop_delay_cancel,
                init,
                manager,
                steps,
                modules,
                recipe_delay,
            )
        });

        RunningWorker {
            handle,
            kill_cancel,
            delay_cancel,
            join: Some(join),
        }
    }
}

impl RunningWorker {
    /// Replaces the active recipe. `states` of `None` resumes the previously loaded recipe
    /// under a new version tag; `Some(&[])` is rejected (spec §4.1).
    pub fn load(&self, version: impl Into<String>, states: Option<Vec<StateDescriptor>>) -> Result<(), WorkerError> {
        if let Some(states) = &states {
            if states.is_empty() {
                return Err(WorkerError::InvalidRecipe("states must be non-empty when provided".to_string()));
            }
        }

        let mut guard = self.handle.lock();
        if let Some(states) = states {
            guard.states = states;
            guard.status = 0;
        }
        guard.version = Some(version.into());
        guard.run = true;
        guard.abort_mode = AbortMode::None;
        guard.recipe_count = (guard.recipe_count + 1) % RECIPE_COUNT_RESET;
        drop(guard);
        self.handle.notify_all();
        Ok(())
    }

    /// Requests termination. `kill=false` lets the current state finish naturally but still
    /// wakes an in-progress recipe delay (spec §5); `kill=true` additionally hard-terminates
    /// the currently executing state. `end=true` additionally stops the Manager once the
    /// loop exits. Idempotent: soft after hard never de-escalates.
    pub fn abort(&self, kill: bool, end: bool) {
        let mut guard = self.handle.lock();
        guard.run = false;
        if end {
            guard.end = true;
        }
        let escalate = kill && guard.abort_mode != AbortMode::Hard;
        if escalate || guard.abort_mode == AbortMode::None {
            guard.abort_mode = if kill { AbortMode::Hard } else { AbortMode::Soft };
        }
        drop(guard);
        self.handle.notify_all();
        let _ = self.delay_cancel.cancel_all(true);
        if kill {
            let _ = self.kill_cancel.cancel_all(true);
        }
    }

    /// Hard-stops the current state without terminating the worker thread. Equivalent to
    /// `abort(kill=true, end=false)` scoped to the current attempt.
    pub fn kill(&self) {
        self.abort(true, false);
    }

    pub fn state_done(&self, sid: impl Into<String>) {
        let mut guard = self.handle.lock();
        guard.done_set.insert(sid.into());
        drop(guard);
        self.handle.notify_all();
    }

    pub fn is_waiting(&self) -> bool {
        self.handle.lock().waiting.is_some()
    }

    pub fn get_version(&self) -> Option<String> {
        self.handle.lock().version.clone()
    }

    /// Blocks until the recipe-loop thread exits (only happens after `abort(.., end=true)`).
    pub fn join(mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn recipe_loop(
    handle: WorkerHandle,
    kill_cancel: Context<bool>,
    delay_cancel: Context<bool>,
    init: String,
    manager: Arc<dyn Manager>,
    steps: Arc<dyn StepRunner>,
    modules: Arc<dyn ModuleSet>,
    recipe_delay: Duration,
) {
    loop {
        handle.wait_until_runnable();
        run_recipe(
            &handle,
            &kill_cancel,
            &delay_cancel,
            &init,
            manager.as_ref(),
            steps.as_ref(),
            modules.as_ref(),
            recipe_delay,
        );

        let (end, abort_mode) = {
            let guard = handle.lock();
            (guard.end, guard.abort_mode)
        };
        if end {
            manager.stop();
            return;
        }

        let mut guard = handle.lock();
        guard.run = false;
        guard.status = 0;
        guard.abort_mode = AbortMode::None;
        let _ = abort_mode;
    }
}

fn run_recipe(
    handle: &WorkerHandle,
    kill_cancel: &Context<bool>,
    delay_cancel: &Context<bool>,
    init: &str,
    manager: &dyn Manager,
    steps: &dyn StepRunner,
    modules: &dyn ModuleSet,
    recipe_delay: Duration,
) {
    loop {
        let load = {
            let guard = handle.lock();
            if !guard.run {
                return;
            }
            if guard.states.is_empty() {
                drop(guard);
                handle.lock().run = false;
                return;
            }
            RecipeLoad {
                version: guard.version.clone(),
                recipe_count: guard.recipe_count,
                status: guard.status,
                state: guard.states.get(guard.status).cloned(),
            }
        };

        let Some(state) = load.state else {
            handle.lock().status = 0;
            continue;
        };

        if load.status == 0 {
            if let Err(err) = modules.reload() {
                warn!(error = %err, "can't load states modules");
                if handle.lock().run {
                    send_report(
                        handle,
                        manager,
                        init,
                        &load.version,
                        load.recipe_count,
                        &state.id,
                        &ExecutionOutcome::failure("Can't load states modules."),
                    );
                }
                handle.lock().run = false;
                return;
            }
        }

        let outcome = run_one_state(&state, handle, kill_cancel, steps);

        if handle.lock().run {
            send_report(handle, manager, init, &load.version, load.recipe_count, &state.id, &outcome);
        }

        if outcome.result {
            let (len, hard_abort) = {
                let guard = handle.lock();
                (guard.states.len(), guard.abort_mode == AbortMode::Hard)
            };
            if hard_abort {
                handle.lock().run = false;
                return;
            }
            if load.status + 1 < len {
                thread::sleep(WAIT_STATE);
                handle.lock().status = load.status + 1;
            } else {
                info!(recipe = %load.version.clone().unwrap_or_default(), "recipe completed, starting inter-cycle delay");
                crate::worker::delay::run(recipe_delay, delay_cancel);
                let mut guard = handle.lock();
                guard.status = 0;
                if guard.abort_mode != AbortMode::None {
                    guard.run = false;
                }
            }
        } else {
            let abort_mode = handle.lock().abort_mode;
            if abort_mode != AbortMode::None {
                handle.lock().run = false;
                return;
            }
            handle.lock().status = 0;
            thread::sleep(WAIT_STATE_RETRY);
        }

        if !handle.lock().run {
            return;
        }
    }
}

fn run_one_state(state: &StateDescriptor, handle: &WorkerHandle, kill_cancel: &Context<bool>, steps: &dyn StepRunner) -> ExecutionOutcome {
    if state.module == BUILTIN_COMMENT {
        return ExecutionOutcome::success();
    }
    if state.module == BUILTIN_WAIT {
        return if handle.wait_for_done(&state.id) {
            ExecutionOutcome::success()
        } else {
            ExecutionOutcome {
                result: false,
                comment: None,
                out_log: None,
            }
        };
    }

    let running: Arc<dyn RunningStep> = match steps.start(state) {
        Ok(running) => Arc::from(running),
        Err(err) => return ExecutionOutcome::failure(format!("Internal error: {err}")),
    };

    let watcher = running.clone();
    let watcher_cancel = kill_cancel.clone();
    let kill_watcher = thread::spawn(move || {
        if matches!(watcher_cancel.wait_condvar(), Ok(true)) {
            watcher.kill();
        }
    });

    let outcome = running.wait();
    let _ = kill_cancel.cancel_all(false);
    let _ = kill_watcher.join();
    outcome
}

fn send_report(
    handle: &WorkerHandle,
    manager: &dyn Manager,
    init: &str,
    version: &Option<String>,
    recipe_count: u64,
    sid: &str,
    outcome: &ExecutionOutcome,
) {
    let log = StateLog {
        init: init.to_string(),
        version: version.clone().unwrap_or_default(),
        sid: sid.to_string(),
        result: outcome.result,
        comment: outcome.comment.clone(),
        out_log: outcome.out_log.clone(),
    };

    loop {
        let still_current = {
            let guard = handle.lock();
            guard.run && guard.recipe_count == recipe_count
        };
        if !still_current {
            return;
        }

        match manager.send(&log) {
            Ok(true) => return,
            Ok(false) => {}
            Err(err) => warn!(error = %err, "manager rejected state-log delivery"),
        }
        thread::sleep(WAIT_RESEND);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::manager::Manager;
    use serde_json::Map;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingManager {
        sent: Mutex<Vec<StateLog>>,
    }

    impl Manager for RecordingManager {
        fn send(&self, log: &StateLog) -> Result<bool, crate::worker::error::ManagerError> {
            self.sent.lock().unwrap().push(log.clone());
            Ok(true)
        }
        fn stop(&self) {}
    }

    struct StubStep;
    struct StubRunning(bool);
    impl StepRunner for StubStep {
        fn start(&self, _state: &StateDescriptor) -> Result<Box<dyn RunningStep>, crate::worker::error::ExecError> {
            Ok(Box::new(StubRunning(true)))
        }
    }
    impl RunningStep for StubRunning {
        fn wait(&self) -> ExecutionOutcome {
            if self.0 {
                ExecutionOutcome::success()
            } else {
                ExecutionOutcome::failure("stub failure")
            }
        }
        fn kill(&self) {}
    }

    struct AlwaysOkModuleSet;
    impl ModuleSet for AlwaysOkModuleSet {
        fn reload(&self) -> Result<(), crate::worker::modules::ModuleLoadError> {
            Ok(())
        }
    }

    fn comment_state(id: &str) -> StateDescriptor {
        StateDescriptor {
            id: id.to_string(),
            module: BUILTIN_COMMENT.to_string(),
            parameter: Map::new(),
        }
    }

    #[test]
    fn happy_recipe_reports_each_state_once_per_cycle() {
        let manager = Arc::new(RecordingManager::default());
        let worker = Worker::new("agent-1", manager.clone(), Arc::new(StubStep), Arc::new(AlwaysOkModuleSet), Duration::ZERO).run();

        worker
            .load("v1", Some(vec![comment_state("a"), comment_state("b")]))
            .unwrap();

        // Two full cycles cost ~2s (one WAIT_STATE pause between "a" and "b" per cycle);
        // give it margin before cutting the recipe off.
        thread::sleep(Duration::from_millis(2300));
        worker.abort(false, true);
        worker.join();

        let sent = manager.sent.lock().unwrap();
        let sids: Vec<&str> = sent.iter().take(4).map(|l| l.sid.as_str()).collect();
        assert_eq!(sids, vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn wait_barrier_completes_once_state_done_is_called() {
        let manager = Arc::new(RecordingManager::default());
        let worker = Worker::new("agent-1", manager, Arc::new(StubStep), Arc::new(AlwaysOkModuleSet), Duration::ZERO).run();

        let wait_state = StateDescriptor {
            id: "w".to_string(),
            module: BUILTIN_WAIT.to_string(),
            parameter: Map::new(),
        };
        worker.load("v1", Some(vec![wait_state])).unwrap();

        thread::sleep(Duration::from_millis(100));
        assert!(worker.is_waiting());

        worker.state_done("w");
        thread::sleep(Duration::from_millis(100));
        assert!(!worker.is_waiting());

        worker.abort(false, true);
        worker.join();
    }

    #[test]
    fn hard_abort_stops_worker_within_two_seconds() {
        struct SleepForever;
        struct SleepRunning(Arc<std::sync::atomic::AtomicBool>);
        impl StepRunner for SleepForever {
            fn start(&self, _state: &StateDescriptor) -> Result<Box<dyn RunningStep>, crate::worker::error::ExecError> {
                Ok(Box::new(SleepRunning(Arc::new(std::sync::atomic::AtomicBool::new(false)))))
            }
        }
        impl RunningStep for SleepRunning {
            fn wait(&self) -> ExecutionOutcome {
                while !self.0.load(std::sync::atomic::Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(10));
                }
                ExecutionOutcome::failure("killed")
            }
            fn kill(&self) {
                self.0.store(true, std::sync::atomic::Ordering::Release);
            }
        }

        let manager = Arc::new(RecordingManager::default());
        let worker = Worker::new("agent-1", manager, Arc::new(SleepForever), Arc::new(AlwaysOkModuleSet), Duration::ZERO).run();
        worker
            .load(
                "v1",
                Some(vec![StateDescriptor {
                    id: "slow".to_string(),
                    module: "cmd".to_string(),
                    parameter: Map::new(),
                }]),
            )
            .unwrap();

        thread::sleep(Duration::from_millis(200));
        let started = Instant::now();
        worker.abort(true, true);
        worker.join();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn soft_abort_wakes_an_in_progress_recipe_delay() {
        let manager = Arc::new(RecordingManager::default());
        let worker = Worker::new(
            "agent-1",
            manager,
            Arc::new(StubStep),
            Arc::new(AlwaysOkModuleSet),
            Duration::from_secs(300),
        )
        .run();

        worker.load("v1", Some(vec![comment_state("a")])).unwrap();

        // Let the single-state recipe finish once and enter its inter-cycle delay.
        thread::sleep(Duration::from_millis(300));
        let started = Instant::now();
        worker.abort(false, true);
        worker.join();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn load_rejects_empty_states() {
        let manager = Arc::new(RecordingManager::default());
        let worker = Worker::new("agent-1", manager, Arc::new(StubStep), Arc::new(AlwaysOkModuleSet), Duration::ZERO).run();
        let err = worker.load("v1", Some(vec![])).unwrap_err();
        assert!(matches!(err, WorkerError::InvalidRecipe(_)));
        worker.abort(false, true);
        worker.join();
    }

    #[test]
    fn module_reload_failure_reports_and_clears_run() {
        struct AlwaysFailModuleSet;
        impl ModuleSet for AlwaysFailModuleSet {
            fn reload(&self) -> Result<(), crate::worker::modules::ModuleLoadError> {
                Err(crate::worker::modules::ModuleLoadError::NotFound {
                    root: "/nonexistent".to_string(),
                    name: "base".to_string(),
                })
            }
        }

        let manager = Arc::new(RecordingManager::default());
        let worker = Worker::new("agent-1", manager.clone(), Arc::new(StubStep), Arc::new(AlwaysFailModuleSet), Duration::ZERO).run();

        worker.load("v1", Some(vec![comment_state("a")])).unwrap();
        thread::sleep(Duration::from_millis(200));

        let sent = manager.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sid, "a");
        assert!(!sent[0].result);
        assert_eq!(sent[0].comment.as_deref(), Some("Can't load states modules."));
        drop(sent);

        worker.abort(false, true);
        worker.join();
    }
}
