//! Gated two-phase dispatch - check-then-run submission over any backend

use crate::core::{ExecutionContext, State, StateUpdate};
use crate::execution::executor::{
    ExecutionError, Executor, StageFuture, StateFuture, WaitError,
};
use crate::execution::runner::{FlowRunner, TaskRunner};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Errors escaping a dispatch. Stage failures and wait timeouts pass
/// through untranslated; the protocol itself never swallows them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Wait(#[from] WaitError),
}

/// Dispatch a task run through the check and run stages.
///
/// The check stage is submitted first and its future resolved before the
/// run stage is ever submitted, so a failed or blocked trigger incurs no
/// run-stage cost. Each stage falls back independently: a check that
/// leaves the state unchanged returns the original `state`; a run that
/// leaves it unchanged returns the check stage's State.
pub async fn run_task(
    executor: &dyn Executor,
    runner: Arc<dyn TaskRunner>,
    state: State,
    upstream_states: HashMap<String, State>,
    inputs: HashMap<String, Value>,
    ignore_trigger: bool,
    context: ExecutionContext,
) -> Result<State, DispatchError> {
    let dispatch_id = Uuid::new_v4();
    let context = context.with_ambient().with_executor(executor.name());

    let check_stage: StageFuture = {
        let runner = Arc::clone(&runner);
        let state = state.clone();
        let context = context.clone();
        Box::pin(async move {
            runner
                .check(state, upstream_states, ignore_trigger, context)
                .await
        })
    };
    debug!("dispatch {}: submitting check stage", dispatch_id);
    let future = executor.submit(check_stage).await;

    let checked = match resolve_one(executor, future).await? {
        StateUpdate::Unchanged => {
            debug!("dispatch {}: check stage left state unchanged", dispatch_id);
            return Ok(state);
        }
        StateUpdate::Changed(checked) => checked,
    };

    let run_stage: StageFuture = {
        let checked = checked.clone();
        let context = context.clone();
        Box::pin(async move { runner.run(checked, inputs, context).await })
    };
    debug!("dispatch {}: submitting run stage", dispatch_id);
    let future = executor.submit(run_stage).await;

    let update = resolve_one(executor, future).await?;
    if update.is_unchanged() {
        debug!("dispatch {}: run stage left state unchanged", dispatch_id);
    }
    Ok(update.into_state(checked))
}

/// Dispatch flow-level work: a single stage invoking the flow runner.
///
/// Returns the backend's future directly; when resolved, the flow's final
/// State arrives as `Changed(state)`.
pub async fn run_flow(
    executor: &dyn Executor,
    runner: Arc<dyn FlowRunner>,
    state: State,
    task_states: HashMap<String, State>,
    start_tasks: Vec<String>,
    return_tasks: Vec<String>,
    parameters: HashMap<String, Value>,
    context: ExecutionContext,
) -> StateFuture {
    let context = context.with_ambient().with_executor(executor.name());
    let stage: StageFuture = Box::pin(async move {
        runner
            .run(state, task_states, start_tasks, return_tasks, context, parameters)
            .await
            .map(StateUpdate::Changed)
    });
    let future = executor.submit(stage).await;
    debug!("submitted flow stage {}", future.id());
    future
}

async fn resolve_one(
    executor: &dyn Executor,
    future: StateFuture,
) -> Result<StateUpdate, DispatchError> {
    let mut results = executor.wait(vec![future], None).await?;
    match results.pop() {
        Some(Ok(update)) => Ok(update),
        Some(Err(e)) => Err(DispatchError::Execution(e)),
        // wait returns one result per input future; a missing entry means
        // the backend dropped it.
        None => Err(DispatchError::Execution(ExecutionError::Abandoned)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StateKind, EXECUTOR_KEY};
    use crate::execution::executor::{ExecutorError, StageResult};
    use crate::execution::inline::InlineExecutor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Delegates to the inline backend while counting submissions, so tests
    /// can prove a stage was never submitted.
    struct CountingExecutor {
        inner: InlineExecutor,
        submissions: AtomicUsize,
    }

    impl CountingExecutor {
        fn new() -> Self {
            Self {
                inner: InlineExecutor::new(),
                submissions: AtomicUsize::new(0),
            }
        }

        fn submissions(&self) -> usize {
            self.submissions.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Executor for CountingExecutor {
        fn name(&self) -> &str {
            "counting"
        }

        async fn start(&self) -> Result<(), ExecutorError> {
            self.inner.start().await
        }

        async fn shutdown(&self) {
            self.inner.shutdown().await
        }

        async fn submit(&self, stage: StageFuture) -> StateFuture {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            self.inner.submit(stage).await
        }
    }

    struct StubRunner {
        check: StageResult,
        run: StageResult,
        seen_contexts: Mutex<Vec<ExecutionContext>>,
    }

    impl StubRunner {
        fn new(check: StageResult, run: StageResult) -> Self {
            Self {
                check,
                run,
                seen_contexts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TaskRunner for StubRunner {
        async fn check(
            &self,
            _state: State,
            _upstream_states: HashMap<String, State>,
            _ignore_trigger: bool,
            context: ExecutionContext,
        ) -> StageResult {
            self.seen_contexts.lock().unwrap().push(context);
            self.check.clone()
        }

        async fn run(
            &self,
            _state: State,
            _inputs: HashMap<String, Value>,
            context: ExecutionContext,
        ) -> StageResult {
            self.seen_contexts.lock().unwrap().push(context);
            self.run.clone()
        }
    }

    fn state(kind: StateKind) -> State {
        State::new(kind)
    }

    async fn dispatch(
        executor: &CountingExecutor,
        runner: Arc<StubRunner>,
        initial: State,
    ) -> Result<State, DispatchError> {
        run_task(
            executor,
            runner,
            initial,
            HashMap::new(),
            HashMap::new(),
            false,
            ExecutionContext::new(),
        )
        .await
    }

    #[tokio::test]
    async fn test_unchanged_check_short_circuits_run() {
        let executor = CountingExecutor::new();
        let runner = Arc::new(StubRunner::new(
            Ok(StateUpdate::Unchanged),
            Ok(StateUpdate::Changed(state(StateKind::Success))),
        ));
        let initial = state(StateKind::Pending).with_message("untouched");

        let result = dispatch(&executor, runner, initial.clone()).await.unwrap();

        // The original State comes back and the run stage is never submitted.
        assert_eq!(result, initial);
        assert_eq!(executor.submissions(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_run_falls_back_to_checked_state() {
        let executor = CountingExecutor::new();
        let checked = state(StateKind::Running).with_message("trigger passed");
        let runner = Arc::new(StubRunner::new(
            Ok(StateUpdate::Changed(checked.clone())),
            Ok(StateUpdate::Unchanged),
        ));

        let result = dispatch(&executor, runner, state(StateKind::Pending))
            .await
            .unwrap();

        assert_eq!(result, checked);
        assert_eq!(executor.submissions(), 2);
    }

    #[tokio::test]
    async fn test_run_state_wins_when_both_stages_change() {
        let executor = CountingExecutor::new();
        let final_state = state(StateKind::Success).with_data(json!({"rows": 7}));
        let runner = Arc::new(StubRunner::new(
            Ok(StateUpdate::Changed(state(StateKind::Running))),
            Ok(StateUpdate::Changed(final_state.clone())),
        ));

        let result = dispatch(&executor, runner, state(StateKind::Pending))
            .await
            .unwrap();

        assert_eq!(result, final_state);
        assert_eq!(executor.submissions(), 2);
    }

    #[tokio::test]
    async fn test_check_error_propagates_and_skips_run() {
        let executor = CountingExecutor::new();
        let runner = Arc::new(StubRunner::new(
            Err(ExecutionError::Stage("trigger evaluation failed".to_string())),
            Ok(StateUpdate::Changed(state(StateKind::Success))),
        ));

        let err = dispatch(&executor, runner, state(StateKind::Pending))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DispatchError::Execution(ExecutionError::Stage(
                "trigger evaluation failed".to_string()
            ))
        );
        assert_eq!(executor.submissions(), 1);
    }

    #[tokio::test]
    async fn test_run_error_propagates() {
        let executor = CountingExecutor::new();
        let runner = Arc::new(StubRunner::new(
            Ok(StateUpdate::Changed(state(StateKind::Running))),
            Err(ExecutionError::Stage("task body failed".to_string())),
        ));

        let err = dispatch(&executor, runner, state(StateKind::Pending))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Execution(ExecutionError::Stage(_))
        ));
        assert_eq!(executor.submissions(), 2);
    }

    #[tokio::test]
    async fn test_stage_context_carries_executor_and_request_entries() {
        let executor = CountingExecutor::new();
        let runner = Arc::new(StubRunner::new(
            Ok(StateUpdate::Changed(state(StateKind::Running))),
            Ok(StateUpdate::Changed(state(StateKind::Success))),
        ));

        let mut request = ExecutionContext::new();
        request.insert("task_run_id", json!("run-42"));
        run_task(
            &executor,
            Arc::clone(&runner) as Arc<dyn TaskRunner>,
            state(StateKind::Pending),
            HashMap::new(),
            HashMap::new(),
            false,
            request,
        )
        .await
        .unwrap();

        let seen = runner.seen_contexts.lock().unwrap();
        assert_eq!(seen.len(), 2);
        for context in seen.iter() {
            assert_eq!(context.get(EXECUTOR_KEY), Some(&json!("counting")));
            assert_eq!(context.get("task_run_id"), Some(&json!("run-42")));
        }
    }

    struct StubFlowRunner {
        result: Result<State, ExecutionError>,
    }

    #[async_trait]
    impl FlowRunner for StubFlowRunner {
        async fn run(
            &self,
            _state: State,
            _task_states: HashMap<String, State>,
            _start_tasks: Vec<String>,
            _return_tasks: Vec<String>,
            _context: ExecutionContext,
            _parameters: HashMap<String, Value>,
        ) -> Result<State, ExecutionError> {
            self.result.clone()
        }
    }

    #[tokio::test]
    async fn test_run_flow_returns_future_of_final_state() {
        let executor = CountingExecutor::new();
        let final_state = state(StateKind::Success).with_message("flow finished");
        let runner = Arc::new(StubFlowRunner {
            result: Ok(final_state.clone()),
        });

        let future = run_flow(
            &executor,
            runner,
            state(StateKind::Pending),
            HashMap::new(),
            Vec::new(),
            Vec::new(),
            HashMap::new(),
            ExecutionContext::new(),
        )
        .await;

        assert_eq!(executor.submissions(), 1);
        assert_eq!(
            future.resolve().await,
            Ok(StateUpdate::Changed(final_state))
        );
    }

    #[tokio::test]
    async fn test_run_flow_error_surfaces_on_resolve() {
        let executor = CountingExecutor::new();
        let runner = Arc::new(StubFlowRunner {
            result: Err(ExecutionError::Stage("flow blew up".to_string())),
        });

        let future = run_flow(
            &executor,
            runner,
            state(StateKind::Pending),
            HashMap::new(),
            Vec::new(),
            Vec::new(),
            HashMap::new(),
            ExecutionContext::new(),
        )
        .await;

        assert_eq!(
            future.resolve().await,
            Err(ExecutionError::Stage("flow blew up".to_string()))
        );
    }
}
