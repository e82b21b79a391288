//! Runner collaborator traits
//!
//! The graph model, trigger rules, and the run routines themselves live
//! outside this crate; dispatch only needs the entry points below.

use crate::core::{ExecutionContext, State};
use crate::execution::executor::{ExecutionError, StageResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// The two stages of a task run, consumed by the gated dispatch protocol.
///
/// `check` evaluates trigger and eligibility rules over the upstream states
/// and either produces a candidate State or signals no change; `run`
/// performs the actual work. Both report "leave the state alone" through
/// [`StateUpdate::Unchanged`](crate::core::StateUpdate::Unchanged) rather
/// than by erroring.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn check(
        &self,
        state: State,
        upstream_states: HashMap<String, State>,
        ignore_trigger: bool,
        context: ExecutionContext,
    ) -> StageResult;

    async fn run(
        &self,
        state: State,
        inputs: HashMap<String, Value>,
        context: ExecutionContext,
    ) -> StageResult;
}

/// A flow's own internal scheduling over its task graph, exposed as a
/// single entry routine returning the flow's final State.
#[async_trait]
pub trait FlowRunner: Send + Sync {
    async fn run(
        &self,
        state: State,
        task_states: HashMap<String, State>,
        start_tasks: Vec<String>,
        return_tasks: Vec<String>,
        context: ExecutionContext,
        parameters: HashMap<String, Value>,
    ) -> Result<State, ExecutionError>;
}
