//! Fan-out/fan-in execution of a cell
//!
//! Every iteration runs as its own task. With a limit, tasks first take a
//! permit from a semaphore so at most `limit` calls are in flight. Outcomes
//! come back over a channel; the collector waits until all N have arrived or
//! the barrier deadline passes, at which point outstanding tasks are aborted
//! and recorded as timeouts.

use super::{run_iteration, BenchmarkHarness, IterationOutcome, Payload};
use crate::{
    backend::CacheBackend,
    error::{AppError, Result},
    models::{CellResult, FailureRecord},
    types::Operation,
};
use futures::future::join_all;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinHandle,
    time::{sleep, Instant},
};

/// Upper bound on buffered outcomes between tasks and the collector
const CHANNEL_CAPACITY: usize = 1024;

pub(crate) async fn collect(
    harness: &BenchmarkHarness,
    backend: Arc<dyn CacheBackend>,
    operation: Operation,
    payload: &Payload,
    limit: Option<usize>,
    cell: &mut CellResult,
    correlation_id: &str,
) -> Result<()> {
    let config = harness.config().clone();
    let backend_name = cell.backend.clone();
    let iterations = config.iterations;
    let payload = Arc::new(payload.clone());
    let limiter = limit.map(|permits| Arc::new(Semaphore::new(permits)));
    let (sender, mut receiver) = mpsc::channel::<(usize, IterationOutcome)>(CHANNEL_CAPACITY.min(iterations).max(1));

    let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(iterations);
    for index in 0..iterations {
        let backend = backend.clone();
        let payload = payload.clone();
        let config = config.clone();
        let limiter = limiter.clone();
        let sender = sender.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };

            let outcome = run_iteration(backend.as_ref(), operation, &payload, index, &config).await;
            let _ = sender.send((index, outcome)).await;
        }));
    }
    drop(sender);

    let deadline = sleep(config.barrier_timeout);
    tokio::pin!(deadline);

    let mut arrived = vec![false; iterations];
    let mut remaining = iterations;
    let barrier_started = Instant::now();
    let mut aborted: Option<AppError> = None;

    while remaining > 0 {
        tokio::select! {
            received = receiver.recv() => {
                let Some((index, outcome)) = received else { break };
                arrived[index] = true;
                remaining -= 1;
                if let Err(e) = harness.record(&backend_name, outcome, cell, correlation_id).await {
                    aborted = Some(e);
                    break;
                }
            }
            _ = &mut deadline => break,
        }
    }

    for task in &tasks {
        task.abort();
    }

    if let Some(error) = aborted {
        let _ = join_all(tasks).await;
        return Err(error);
    }

    // Outcomes that landed in the channel while the deadline fired still count
    while let Ok((index, outcome)) = receiver.try_recv() {
        arrived[index] = true;
        remaining -= 1;
        harness.record(&backend_name, outcome, cell, correlation_id).await?;
    }

    if remaining > 0 {
        let error = AppError::timeout(format!(
            "{} of {} iterations still outstanding after the {:?} barrier deadline ({:?} elapsed)",
            remaining,
            iterations,
            config.barrier_timeout,
            barrier_started.elapsed()
        ));
        for index in arrived.iter().enumerate().filter(|(_, done)| !**done).map(|(i, _)| i) {
            let outcome = IterationOutcome::Failed(FailureRecord::new(index, &error, false), error.clone());
            harness.record(&backend_name, outcome, cell, correlation_id).await?;
        }
    }

    let _ = join_all(tasks).await;
    Ok(())
}
