//! Executor contract - the primitive submit/wait interface every backend implements

use crate::core::{State, StateKind, StateUpdate};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{timeout_at, Instant};
use tracing::warn;
use uuid::Uuid;

/// What a submitted stage resolves to
pub type StageResult = Result<StateUpdate, ExecutionError>;

/// A unit of work handed to a backend
pub type StageFuture = Pin<Box<dyn Future<Output = StageResult> + Send + 'static>>;

/// Error raised inside a submitted stage
///
/// Captured by the backend and carried in the [`StateFuture`]; it surfaces
/// when the future is resolved, never at submit time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("stage failed: {0}")]
    Stage(String),

    #[error("stage panicked: {0}")]
    Panic(String),

    #[error("executor was shut down before the stage resolved")]
    Abandoned,

    #[error("executor has not been started")]
    NotStarted,
}

/// Error from waiting on futures. A timeout is a distinguished outcome,
/// separate from a future that resolved with an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("timed out after {budget:?} with {unresolved} future(s) unresolved")]
    Timeout { budget: Duration, unresolved: usize },
}

/// Backend lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("executor already started")]
    AlreadyStarted,
}

/// Opaque handle to a pending or completed stage
///
/// Created by [`Executor::submit`], consumed by [`Executor::wait`] (or
/// [`StateFuture::resolve`] directly). The backend owns the computation;
/// callers only pass the handle around.
#[derive(Debug)]
pub struct StateFuture {
    id: Uuid,
    inner: FutureInner,
}

#[derive(Debug)]
enum FutureInner {
    Ready(StageResult),
    Pending(oneshot::Receiver<StageResult>),
}

impl StateFuture {
    /// An already-resolved future, for backends that execute inline
    pub(crate) fn ready(result: StageResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            inner: FutureInner::Ready(result),
        }
    }

    /// A pending future plus the sender the backend resolves it with
    pub(crate) fn pending() -> (Self, oneshot::Sender<StageResult>) {
        let (tx, rx) = oneshot::channel();
        let future = Self {
            id: Uuid::new_v4(),
            inner: FutureInner::Pending(rx),
        };
        (future, tx)
    }

    /// Identifier for log correlation
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Block until the stage completes. A backend that dropped the reply
    /// channel without resolving reports [`ExecutionError::Abandoned`];
    /// this never hangs.
    pub async fn resolve(self) -> StageResult {
        match self.inner {
            FutureInner::Ready(result) => result,
            FutureInner::Pending(rx) => rx.await.unwrap_or(Err(ExecutionError::Abandoned)),
        }
    }
}

/// The backend contract: submit stages, wait on their futures.
///
/// Implementations range from fully synchronous (submit executes inline) to
/// worker pools. Callers must not assume either model: a stage submitted
/// after another may observe its result only through `wait`.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Backend name, recorded into every dispatched stage's context
    fn name(&self) -> &str;

    /// Acquire backend resources. Pairs with [`Executor::shutdown`]; the
    /// backend must also release its resources when dropped, so nothing
    /// leaks on an early exit path.
    async fn start(&self) -> Result<(), ExecutorError>;

    /// Release backend resources. Futures still pending resolve as
    /// [`ExecutionError::Abandoned`] once their stage can no longer run.
    async fn shutdown(&self);

    /// Schedule a stage for execution. Never blocks beyond the backend's
    /// queue admission, and never surfaces stage errors directly: they are
    /// carried in the returned future.
    async fn submit(&self, stage: StageFuture) -> StateFuture;

    /// Resolve `futures` in input order under one shared deadline.
    ///
    /// Results come back in the same order the futures were passed in. When
    /// the budget elapses first, the whole call reports [`WaitError::Timeout`]
    /// with the number of still-unresolved futures.
    async fn wait(
        &self,
        futures: Vec<StateFuture>,
        timeout: Option<Duration>,
    ) -> Result<Vec<StageResult>, WaitError> {
        let mut results = Vec::with_capacity(futures.len());
        match timeout {
            None => {
                for future in futures {
                    results.push(future.resolve().await);
                }
            }
            Some(budget) => {
                let deadline = Instant::now() + budget;
                let mut remaining = futures.into_iter();
                while let Some(future) = remaining.next() {
                    match timeout_at(deadline, future.resolve()).await {
                        Ok(result) => results.push(result),
                        Err(_) => {
                            let unresolved = 1 + remaining.len();
                            warn!(
                                "wait timed out after {:?} with {} future(s) unresolved",
                                budget, unresolved
                            );
                            return Err(WaitError::Timeout { budget, unresolved });
                        }
                    }
                }
            }
        }
        Ok(results)
    }

    /// Construct a new State for the target status, attaching `data` and
    /// `message`. Pure - touches no backend resources. Backends may
    /// override it to attach provenance metadata.
    fn set_state(
        &self,
        _current: &State,
        target: StateKind,
        data: Option<Value>,
        message: Option<String>,
    ) -> State {
        State {
            status: target,
            data,
            message,
        }
    }
}
