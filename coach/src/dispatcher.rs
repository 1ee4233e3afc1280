//! Bounded worker pool for batches of independent work.
//!
//! The pool owns a fixed set of long-lived threads that pull jobs from a
//! shared queue, so at most `concurrency` units run at once. A batch is
//! submitted with [`WorkerPool::run`], which blocks until every unit has
//! finished and returns the results in completion order.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of worker threads.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `concurrency` worker threads (at least one).
    pub fn new(concurrency: usize) -> Result<Self> {
        let concurrency = concurrency.max(1);
        let (sender, receiver) = unbounded::<Job>();

        let mut workers = Vec::with_capacity(concurrency);
        for id in 0..concurrency {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("coach-worker-{}", id))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                })
                .with_context(|| format!("Failed to spawn worker thread {}", id))?;
            workers.push(handle);
        }

        debug!(concurrency, "Worker pool started");
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.workers.len()
    }

    /// Run `worker_fn` over every item and collect the results.
    ///
    /// Results arrive in completion order, not submission order. Every item
    /// runs to completion even when another fails; if any unit returned an
    /// error or panicked, the first failure is returned after the whole
    /// batch has drained and no results are handed back.
    pub fn run<T, R, F>(&self, items: Vec<T>, worker_fn: F) -> Result<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Result<R> + Send + Sync + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("Worker pool is shut down"))?;

        let total = items.len();
        let worker_fn = Arc::new(worker_fn);
        let (result_tx, result_rx) = unbounded::<(usize, Result<R>)>();

        for (index, item) in items.into_iter().enumerate() {
            let worker_fn = Arc::clone(&worker_fn);
            let result_tx = result_tx.clone();
            let job: Job = Box::new(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker_fn(item)));
                // Release captured state before the caller can observe the result
                drop(worker_fn);
                let result = match outcome {
                    Ok(result) => result,
                    Err(payload) => Err(anyhow!("worker panicked: {}", panic_message(&payload))),
                };
                let _ = result_tx.send((index, result));
            });
            sender
                .send(job)
                .map_err(|_| anyhow!("Worker pool queue is closed"))?;
        }
        drop(result_tx);

        let mut results = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for _ in 0..total {
            let (index, result) = result_rx
                .recv()
                .map_err(|_| anyhow!("Worker exited before reporting a result"))?;
            match result {
                Ok(value) => results.push(value),
                Err(e) => {
                    error!(unit = index, error = %e, "Work unit failed");
                    failures.push((index, e));
                }
            }
        }

        if let Some((index, first)) = failures.into_iter().next() {
            return Err(first.context(format!(
                "work unit {} of {} failed; batch discarded",
                index + 1,
                total
            )));
        }
        Ok(results)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue lets every worker fall out of its recv loop
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_runs_every_item() {
        let pool = WorkerPool::new(3).unwrap();
        let mut results = pool.run((0..20u32).collect(), |x| Ok(x * 2)).unwrap();
        results.sort_unstable();
        assert_eq!(results, (0..20u32).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_batch() {
        let pool = WorkerPool::new(2).unwrap();
        let results: Vec<u32> = pool.run(Vec::<u32>::new(), Ok).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_zero_concurrency_still_runs() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.concurrency(), 1);
        assert_eq!(pool.run(vec![5u8], Ok).unwrap(), vec![5]);
    }

    #[test]
    fn test_concurrency_cap() {
        let pool = WorkerPool::new(2).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        pool.run((0..12).collect::<Vec<u32>>(), move |_| {
            let now = a.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            a.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_error_reported_after_batch_drains() {
        let pool = WorkerPool::new(2).unwrap();
        let finished = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&finished);

        let result = pool.run((0..10u32).collect(), move |x| {
            f.fetch_add(1, Ordering::SeqCst);
            if x == 3 {
                Err(anyhow!("bad item"))
            } else {
                Ok(x)
            }
        });

        assert!(result.is_err());
        assert_eq!(finished.load(Ordering::SeqCst), 10);
        assert!(format!("{:#}", result.unwrap_err()).contains("bad item"));
    }

    #[test]
    fn test_panic_is_an_error_and_pool_survives() {
        let pool = WorkerPool::new(1).unwrap();
        let result: Result<Vec<u32>> = pool.run(vec![1u32, 2], |x| {
            if x == 1 {
                panic!("boom");
            }
            Ok(x)
        });
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("boom"));

        // The same worker thread keeps serving jobs
        assert_eq!(pool.run(vec![7u32], Ok).unwrap(), vec![7]);
    }

    #[test]
    fn test_closure_released_before_return() {
        let pool = WorkerPool::new(2).unwrap();
        let shared = Arc::new(());
        let captured = Arc::clone(&shared);
        pool.run(vec![(); 4], move |_| {
            let _keep = &captured;
            Ok(())
        })
        .unwrap();
        assert_eq!(Arc::strong_count(&shared), 1);
    }
}
