//! flowdispatch - execution dispatch and scheduling core for workflow orchestration
//!
//! Two tightly related pieces: an [`Executor`] contract that lets a workflow
//! runner submit flow and task work to a pluggable backend without knowing
//! which one, with a gated check-then-run dispatch protocol on top; and a
//! [`Schedule`] family that computes the next occurrence timestamps for
//! recurring or one-off triggers.

pub mod core;
pub mod execution;
pub mod schedule;

// Re-export commonly used types
pub use crate::core::{
    ambient, init_ambient, ExecutionContext, State, StateKind, StateUpdate, EXECUTOR_KEY,
};
pub use execution::{
    run_flow, run_task, DispatchError, ExecutionError, Executor, ExecutorError, FlowRunner,
    InlineExecutor, PooledExecutor, StageFuture, StageResult, StateFuture, TaskRunner, WaitError,
};
pub use schedule::{CronSchedule, DateSchedule, IntervalSchedule, Schedule, ScheduleError};
