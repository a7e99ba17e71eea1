//! Tool batch execution strategies.
//!
//! The chat engine hands a batch of tool calls plus a runner closure to
//! [`execute_batch`]. Whatever the strategy, three guarantees hold:
//!
//! 1. Results come back in the *original request order*, even when execution
//!    completes out of order.
//! 2. An individual failure never cancels siblings; the runner stringifies
//!    errors into the outcome.
//! 3. At most `max` executions are in flight at once for the bounded
//!    strategies.

use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use tokio::sync::Semaphore;

use crate::message::ToolCall;
use crate::tools::ToolOutcome;

/// How a chat executes the tool calls of one assistant message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConcurrencyStrategy {
    /// One call at a time, in request order.
    #[default]
    Sequential,
    /// Fan out on the blocking thread pool, bounded by `max_concurrency`.
    /// Suits tool bodies that do synchronous I/O.
    Threads(usize),
    /// Fan out as cooperative tasks under a counting semaphore.
    Tasks(usize),
}

impl ConcurrencyStrategy {
    /// The in-flight bound, when the strategy has one.
    pub fn max_concurrency(&self) -> Option<usize> {
        match self {
            ConcurrencyStrategy::Sequential => Some(1),
            ConcurrencyStrategy::Threads(n) | ConcurrencyStrategy::Tasks(n) => Some((*n).max(1)),
        }
    }
}

/// Runner for one tool call. The closure owns everything it needs (hooks,
/// wrappers, context) and never fails: errors are already stringified into
/// the returned outcome.
pub type ToolRunner = Arc<dyn Fn(ToolCall) -> BoxFuture<'static, ToolOutcome> + Send + Sync>;

fn panic_outcome() -> ToolOutcome {
    ToolOutcome::Text("Error: ExecutionError: tool task panicked".to_string())
}

/// Executes `calls` with the given strategy and returns outcomes aligned with
/// the request order of `calls`.
pub async fn execute_batch(
    strategy: ConcurrencyStrategy,
    calls: &[ToolCall],
    run: ToolRunner,
) -> Vec<ToolOutcome> {
    match strategy {
        ConcurrencyStrategy::Sequential => {
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in calls {
                outcomes.push(run(call.clone()).await);
            }
            outcomes
        }
        ConcurrencyStrategy::Tasks(max) => {
            let semaphore = Arc::new(Semaphore::new(max.max(1)));
            let handles: Vec<_> = calls
                .iter()
                .cloned()
                .map(|call| {
                    let semaphore = Arc::clone(&semaphore);
                    let run = Arc::clone(&run);
                    tokio::spawn(async move {
                        // Closing never happens while the batch runs.
                        let _permit = semaphore.acquire_owned().await;
                        run(call).await
                    })
                })
                .collect();
            join_all(handles)
                .await
                .into_iter()
                .map(|joined| joined.unwrap_or_else(|_| panic_outcome()))
                .collect()
        }
        ConcurrencyStrategy::Threads(max) => {
            let semaphore = Arc::new(Semaphore::new(max.max(1)));
            let handle = tokio::runtime::Handle::current();
            let handles: Vec<_> = calls
                .iter()
                .cloned()
                .map(|call| {
                    let semaphore = Arc::clone(&semaphore);
                    let run = Arc::clone(&run);
                    let handle = handle.clone();
                    tokio::task::spawn_blocking(move || {
                        let _permit = handle.block_on(semaphore.acquire_owned());
                        handle.block_on(run(call))
                    })
                })
                .collect();
            join_all(handles)
                .await
                .into_iter()
                .map(|joined| joined.unwrap_or_else(|_| panic_outcome()))
                .collect()
        }
    }
}
