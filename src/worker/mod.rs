//! The States Worker and everything it's built from (spec §4): recipe/state data types,
//! the control surface and recipe loop, the Child Executor, the Wait Barrier's shared
//! state, the recipe delay, the watch-trigger checksum store, and the Manager/State
//! Executor contracts plus their reference implementations.

pub mod checksum;
pub mod delay;
pub mod error;
pub mod exec_state;
pub mod executor;
pub mod manager;
pub mod modules;
pub mod shared;
pub mod state;
pub mod state_executor;
pub mod worker;

pub use executor::{ReExecStepRunner, RunningStep, StepRunner};
pub use manager::{FileManager, Manager, StateLog};
pub use modules::{DirectoryModuleSet, ModuleSet};
pub use state::{Recipe, StateDescriptor, BUILTIN_COMMENT, BUILTIN_WAIT};
pub use state_executor::{ExecutionOutcome, ShellStateExecutor, StateExecutor};
pub use worker::{RunningWorker, Worker};
