//! Batched writes with bounded concurrency.
//!
//! Items are split into fixed-size chunks; each chunk is handed to a caller
//! supplied insert function. At most `concurrency` chunks are in flight,
//! gated by a counting semaphore on the async path and by a fixed number of
//! worker threads on the blocking path.
//!
//! An ordered plan requires `concurrency == 1` and is rejected otherwise;
//! it runs chunks in sequence and stops at the first failure. Unordered plans
//! run every chunk and report all failures. Any failed, skipped or cancelled
//! chunk turns the outcome into [`DataApiError::PartialBatch`], which keeps
//! the results of the chunks that did complete.

use crate::error::{ChunkFailure, DataApiError, Result};
use crate::model::InsertManyOptions;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 50;
pub const DEFAULT_CONCURRENCY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    chunk_size: usize,
    concurrency: usize,
    ordered: bool,
}

impl BatchPlan {
    /// Validate a plan. Ordered plans must use a concurrency of exactly 1.
    pub fn new(chunk_size: usize, concurrency: usize, ordered: bool) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DataApiError::usage("chunk size must be greater than zero"));
        }
        if concurrency == 0 {
            return Err(DataApiError::usage("concurrency must be greater than zero"));
        }
        if ordered && concurrency != 1 {
            return Err(DataApiError::usage(format!(
                "ordered inserts require concurrency 1 (got {concurrency})"
            )));
        }
        Ok(Self { chunk_size, concurrency, ordered })
    }

    pub fn unordered() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, concurrency: DEFAULT_CONCURRENCY, ordered: false }
    }

    pub fn ordered() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, concurrency: 1, ordered: true }
    }

    /// Plan for an `insertMany` call: unset concurrency defaults to 1 when
    /// ordered and [`DEFAULT_CONCURRENCY`] otherwise.
    pub fn for_insert(options: &InsertManyOptions) -> Result<Self> {
        let fallback = if options.ordered { 1 } else { DEFAULT_CONCURRENCY };
        Self::new(
            options.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            options.concurrency.unwrap_or(fallback),
            options.ordered,
        )
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size)
    }

    fn split<T>(&self, items: Vec<T>) -> Vec<Vec<T>> {
        let mut chunks = Vec::with_capacity(self.chunk_count(items.len()));
        let mut items = items.into_iter().peekable();
        while items.peek().is_some() {
            chunks.push(items.by_ref().take(self.chunk_size).collect());
        }
        chunks
    }
}

/// Merged result of a fully successful batched write.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<R> {
    /// Per-item results, in chunk order.
    pub results: Vec<R>,
    pub chunks: usize,
}

enum ChunkOutcome<R> {
    Done(usize, Vec<R>),
    Failed(usize, DataApiError),
    Skipped(usize),
}

#[derive(Debug, Clone)]
pub struct BatchedConcurrentWriter {
    plan: BatchPlan,
    cancel: Option<CancellationToken>,
}

impl BatchedConcurrentWriter {
    pub fn new(plan: BatchPlan) -> Self {
        Self { plan, cancel: None }
    }

    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Run `insert_chunk` over every chunk (async).
    pub async fn insert_all<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        insert_chunk: F,
    ) -> Result<BatchOutcome<R>>
    where
        R: Serialize,
        F: Fn(usize, Vec<T>) -> Fut,
        Fut: Future<Output = Result<Vec<R>>>,
    {
        let chunks = self.plan.split(items);
        let total = chunks.len();
        let mut outcomes = Vec::with_capacity(total);

        if self.plan.ordered {
            let mut halted = false;
            for (index, chunk) in chunks.into_iter().enumerate() {
                if halted || self.cancelled() {
                    outcomes.push(ChunkOutcome::Skipped(index));
                    continue;
                }
                match insert_chunk(index, chunk).await {
                    Ok(results) => outcomes.push(ChunkOutcome::Done(index, results)),
                    Err(err) => {
                        halted = true;
                        outcomes.push(ChunkOutcome::Failed(index, err));
                    }
                }
            }
            return self.finish(total, outcomes);
        }

        let gate = Arc::new(Semaphore::new(self.plan.concurrency));
        let insert_chunk = &insert_chunk;
        let mut pending: FuturesUnordered<_> = chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let gate = gate.clone();
                async move {
                    let Ok(_permit) = gate.acquire_owned().await else {
                        return ChunkOutcome::Skipped(index);
                    };
                    if self.cancelled() {
                        return ChunkOutcome::Skipped(index);
                    }
                    match insert_chunk(index, chunk).await {
                        Ok(results) => ChunkOutcome::Done(index, results),
                        Err(err) => ChunkOutcome::Failed(index, err),
                    }
                }
            })
            .collect();

        while let Some(outcome) = pending.next().await {
            outcomes.push(outcome);
        }
        self.finish(total, outcomes)
    }

    /// Run `insert_chunk` over every chunk on up to `concurrency` threads.
    pub fn insert_all_blocking<T, R, F>(
        &self,
        items: Vec<T>,
        insert_chunk: F,
    ) -> Result<BatchOutcome<R>>
    where
        T: Send,
        R: Serialize + Send,
        F: Fn(usize, Vec<T>) -> Result<Vec<R>> + Sync,
    {
        let chunks = self.plan.split(items);
        let total = chunks.len();
        let queue: Mutex<VecDeque<(usize, Vec<T>)>> =
            Mutex::new(chunks.into_iter().enumerate().collect());
        let outcomes: Mutex<Vec<ChunkOutcome<R>>> = Mutex::new(Vec::with_capacity(total));
        let halted = AtomicBool::new(false);

        let work = || loop {
            let next = match queue.lock() {
                Ok(mut queue) => queue.pop_front(),
                Err(_) => None,
            };
            let Some((index, chunk)) = next else { break };
            let outcome = if halted.load(Ordering::SeqCst) || self.cancelled() {
                ChunkOutcome::Skipped(index)
            } else {
                match insert_chunk(index, chunk) {
                    Ok(results) => ChunkOutcome::Done(index, results),
                    Err(err) => {
                        if self.plan.ordered {
                            halted.store(true, Ordering::SeqCst);
                        }
                        ChunkOutcome::Failed(index, err)
                    }
                }
            };
            if let Ok(mut outcomes) = outcomes.lock() {
                outcomes.push(outcome);
            }
        };

        let workers = self.plan.concurrency.min(total);
        if workers <= 1 {
            work();
        } else {
            std::thread::scope(|scope| {
                for _ in 0..workers {
                    scope.spawn(&work);
                }
            });
        }

        let outcomes = outcomes
            .into_inner()
            .map_err(|_| DataApiError::usage("batch result accumulator poisoned"))?;
        self.finish(total, outcomes)
    }

    fn finish<R: Serialize>(
        &self,
        total: usize,
        outcomes: Vec<ChunkOutcome<R>>,
    ) -> Result<BatchOutcome<R>> {
        let mut done: Vec<(usize, Vec<R>)> = Vec::new();
        let mut failed = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                ChunkOutcome::Done(index, results) => done.push((index, results)),
                ChunkOutcome::Failed(index, error) => {
                    failed.push(ChunkFailure { chunk: index, error })
                }
                ChunkOutcome::Skipped(index) => skipped.push(index),
            }
        }
        done.sort_by_key(|(index, _)| *index);
        failed.sort_by_key(|f| f.chunk);
        skipped.sort_unstable();

        if failed.is_empty() && skipped.is_empty() {
            debug!(target: "astra_data_api::batch", chunks = total, "batched write complete");
            let results = done.into_iter().flat_map(|(_, results)| results).collect();
            return Ok(BatchOutcome { results, chunks: total });
        }

        warn!(
            target: "astra_data_api::batch",
            chunks = total,
            failed = failed.len(),
            skipped = skipped.len(),
            "batched write incomplete"
        );
        let succeeded = done.iter().map(|(index, _)| *index).collect();
        let completed = done
            .into_iter()
            .flat_map(|(_, results)| results)
            .map(|r| serde_json::to_value(r).unwrap_or(serde_json::Value::Null))
            .collect();
        Err(DataApiError::PartialBatch { succeeded, failed, skipped, completed })
    }
}
