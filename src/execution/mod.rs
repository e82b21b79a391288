//! Executor contract, backends, and the gated dispatch protocol

pub mod dispatch;
pub mod executor;
pub mod inline;
pub mod pool;
pub mod runner;

pub use dispatch::{run_flow, run_task, DispatchError};
pub use executor::{
    ExecutionError, Executor, ExecutorError, StageFuture, StageResult, StateFuture, WaitError,
};
pub use inline::InlineExecutor;
pub use pool::PooledExecutor;
pub use runner::{FlowRunner, TaskRunner};
