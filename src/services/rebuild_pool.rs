// ============================================================================
// CACHE REBUILD POOL
// ============================================================================
// Small fixed set of workers draining a bounded queue of rebuild futures.
// Submission never blocks: a full queue refuses the task and the caller
// keeps serving stale data.
// ============================================================================

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub type RebuildTask = BoxFuture<'static, ()>;

pub struct RebuildPool {
    sender: Mutex<Option<mpsc::Sender<RebuildTask>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl RebuildPool {
    /// Spawn `num_workers` workers (at least one). Must run inside a Tokio runtime.
    pub fn new(num_workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<RebuildTask>(capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers = (0..num_workers.max(1))
            .map(|worker_id| {
                let rx = Arc::clone(&receiver);
                tokio::spawn(async move {
                    debug!("Cache rebuild worker {} started", worker_id);
                    loop {
                        let task = {
                            let mut guard = rx.lock().await;
                            guard.recv().await
                        };
                        match task {
                            Some(task) => task.await,
                            None => break,
                        }
                    }
                    debug!("Cache rebuild worker {} stopped", worker_id);
                })
            })
            .collect();

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    /// Queue a rebuild. Returns false when the queue is full or shut down.
    pub fn submit(&self, task: RebuildTask) -> bool {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            warn!("Rebuild submitted after shutdown");
            return false;
        };
        match sender.try_send(task) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Rebuild queue full, task refused");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Stop accepting work and wait until every queued rebuild has run.
    pub async fn shutdown(&self) {
        self.sender.lock().take();
        let workers: Vec<_> = std::mem::take(&mut *self.workers.lock());
        let count = workers.len();
        for handle in workers {
            if let Err(e) = handle.await {
                warn!("Rebuild worker ended abnormally: {}", e);
            }
        }
        info!("Cache rebuild pool drained ({} workers)", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_shutdown_drains_queued_tasks() {
        let pool = RebuildPool::new(2, 16);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let done = done.clone();
            assert!(pool.submit(
                async move {
                    done.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            ));
        }

        pool.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert!(!pool.submit(async {}.boxed()));
    }

    #[tokio::test]
    async fn test_full_queue_refuses_submission() {
        let pool = RebuildPool::new(1, 1);
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();

        // Occupy the only worker.
        assert!(pool.submit(
            async move {
                let _ = started_tx.send(());
                let _ = release_rx.await;
            }
            .boxed()
        ));
        started_rx.await.unwrap();

        assert!(pool.submit(async {}.boxed()));
        assert!(!pool.submit(async {}.boxed()));

        release_tx.send(()).unwrap();
        pool.shutdown().await;
    }
}
