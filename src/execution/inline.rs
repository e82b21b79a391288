//! Inline backend - stages execute immediately on the caller's task

use crate::execution::executor::{
    ExecutionError, Executor, ExecutorError, StageFuture, StateFuture,
};
use async_trait::async_trait;
use tracing::debug;

/// A fully synchronous backend with no resources of its own.
///
/// `submit` runs the stage to completion before returning, which the
/// contract permits for inline backends; the returned future is already
/// resolved. Stage errors and panics still surface only at `wait` time.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl InlineExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for InlineExecutor {
    fn name(&self) -> &str {
        "inline"
    }

    async fn start(&self) -> Result<(), ExecutorError> {
        // No resources to acquire.
        Ok(())
    }

    async fn shutdown(&self) {}

    async fn submit(&self, stage: StageFuture) -> StateFuture {
        // Run the stage in its own task so a panic is captured and carried
        // in the future, exactly as the pooled backend reports it.
        let result = match tokio::spawn(stage).await {
            Ok(result) => result,
            Err(e) => Err(ExecutionError::Panic(e.to_string())),
        };
        let future = StateFuture::ready(result);
        debug!("stage {} executed inline", future.id());
        future
    }
}
