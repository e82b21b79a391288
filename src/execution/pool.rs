//! Worker-pool backend - stages run on a fixed set of tokio workers

use crate::execution::executor::{
    ExecutionError, Executor, ExecutorError, StageFuture, StageResult, StateFuture,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

struct Job {
    id: Uuid,
    stage: StageFuture,
    reply: oneshot::Sender<StageResult>,
}

struct Pool {
    tx: mpsc::UnboundedSender<Job>,
    handles: Vec<JoinHandle<()>>,
}

/// A backend running stages on `workers` concurrent tokio tasks.
///
/// Workers are spawned by `start` and drain a shared job queue; `shutdown`
/// closes the queue and joins them. Dropping the executor also closes the
/// queue, so the workers wind down even when `shutdown` is never reached.
pub struct PooledExecutor {
    workers: usize,
    pool: Mutex<Option<Pool>>,
}

impl PooledExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            pool: Mutex::new(None),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

#[async_trait]
impl Executor for PooledExecutor {
    fn name(&self) -> &str {
        "pool"
    }

    async fn start(&self) -> Result<(), ExecutorError> {
        let mut pool = self.pool.lock().await;
        if pool.is_some() {
            return Err(ExecutorError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..self.workers)
            .map(|index| {
                let rx = Arc::clone(&rx);
                tokio::spawn(worker(index, rx))
            })
            .collect();

        *pool = Some(Pool { tx, handles });
        info!("worker pool started with {} workers", self.workers);
        Ok(())
    }

    async fn shutdown(&self) {
        let taken = self.pool.lock().await.take();
        if let Some(pool) = taken {
            // Closing the queue lets the workers finish what is already
            // admitted, then exit.
            drop(pool.tx);
            for handle in pool.handles {
                let _ = handle.await;
            }
            info!("worker pool stopped");
        }
    }

    async fn submit(&self, stage: StageFuture) -> StateFuture {
        let pool = self.pool.lock().await;
        let Some(pool) = pool.as_ref() else {
            return StateFuture::ready(Err(ExecutionError::NotStarted));
        };

        let (future, reply) = StateFuture::pending();
        let job = Job {
            id: future.id(),
            stage,
            reply,
        };
        // A closed queue means shutdown raced this submission; the dropped
        // reply sender resolves the future as abandoned.
        let _ = pool.tx.send(job);
        future
    }
}

async fn worker(index: usize, rx: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>) {
    loop {
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else { break };

        debug!("worker {} running stage {}", index, job.id);
        // Run each stage in its own task so a panic is contained and
        // reported through the future instead of killing the worker.
        let result = match tokio::spawn(job.stage).await {
            Ok(result) => result,
            Err(e) => Err(ExecutionError::Panic(e.to_string())),
        };
        let _ = job.reply.send(result);
    }
}
