// ============================================================================
// ORDER PROCESSOR
// ============================================================================
// Single consumer of the in-process order queue.
//
// Flow per intent:
// 1. Take the per-user lock `lock:order:{user_id}`
// 2. Re-check that the user has no order for the voucher
// 3. Conditional decrement + insert in one transaction
// 4. Release the lock
//
// Intents are never requeued. Anything other than a persisted order means the
// admission gate and the database disagree, so it is logged at error level.
// ============================================================================

use prometheus::IntGauge;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::models::{OrderIntent, PersistOutcome};
use super::repository::VoucherRepository;
use crate::cache_key;
use crate::observability::{record_seckill_order, SECKILL_QUEUE_DEPTH};
use crate::services::LockService;

/// Producer side of the bounded order queue.
#[derive(Clone)]
pub struct OrderQueue {
    sender: mpsc::Sender<OrderIntent>,
    depth: IntGauge,
}

/// Consumer side of the order queue. Keeps the depth gauge in step with
/// what has actually been taken off the channel.
pub struct OrderReceiver {
    receiver: mpsc::Receiver<OrderIntent>,
    depth: IntGauge,
}

pub fn order_channel(capacity: usize) -> (OrderQueue, OrderReceiver) {
    order_channel_with_gauge(capacity, SECKILL_QUEUE_DEPTH.clone())
}

fn order_channel_with_gauge(capacity: usize, depth: IntGauge) -> (OrderQueue, OrderReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        OrderQueue {
            sender,
            depth: depth.clone(),
        },
        OrderReceiver { receiver, depth },
    )
}

impl OrderQueue {
    /// Enqueue without waiting. Hands the intent back when the queue is full
    /// or the processor has stopped.
    pub fn try_enqueue(&self, intent: OrderIntent) -> Result<(), OrderIntent> {
        // Counted before the send so the consumer never decrements first.
        self.depth.inc();
        match self.sender.try_send(intent) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(intent))
            | Err(mpsc::error::TrySendError::Closed(intent)) => {
                self.depth.dec();
                Err(intent)
            }
        }
    }
}

impl OrderReceiver {
    pub async fn recv(&mut self) -> Option<OrderIntent> {
        let intent = self.receiver.recv().await;
        if intent.is_some() {
            self.depth.dec();
        }
        intent
    }

    pub fn close(&mut self) {
        self.receiver.close();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Persisted,
    Duplicate,
    OutOfStock,
    LockBusy,
    Failed,
}

impl ProcessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persisted => "persisted",
            Self::Duplicate => "duplicate",
            Self::OutOfStock => "out_of_stock",
            Self::LockBusy => "lock_busy",
            Self::Failed => "failed",
        }
    }
}

impl From<PersistOutcome> for ProcessOutcome {
    fn from(outcome: PersistOutcome) -> Self {
        match outcome {
            PersistOutcome::Persisted => Self::Persisted,
            PersistOutcome::Duplicate => Self::Duplicate,
            PersistOutcome::OutOfStock => Self::OutOfStock,
        }
    }
}

pub struct OrderProcessor {
    repo: Arc<dyn VoucherRepository>,
    locks: LockService,
    lock_lease: Duration,
}

impl OrderProcessor {
    pub fn new(repo: Arc<dyn VoucherRepository>, locks: LockService, lock_lease: Duration) -> Self {
        Self {
            repo,
            locks,
            lock_lease,
        }
    }

    /// Run until `shutdown` flips to true, then drain what is already queued.
    pub fn spawn(
        self,
        receiver: OrderReceiver,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver, shutdown))
    }

    async fn run(self, mut receiver: OrderReceiver, mut shutdown: watch::Receiver<bool>) {
        info!("Order processor started");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                intent = receiver.recv() => match intent {
                    Some(intent) => {
                        self.process(intent).await;
                    }
                    None => {
                        info!("Order queue closed, processor stopping");
                        return;
                    }
                },
            }
        }

        receiver.close();
        let mut drained = 0usize;
        while let Some(intent) = receiver.recv().await {
            self.process(intent).await;
            drained += 1;
        }
        info!("Order processor stopped after draining {} intents", drained);
    }

    /// Handle one intent end to end.
    pub async fn process(&self, intent: OrderIntent) -> ProcessOutcome {
        let lock = self.locks.lock(&cache_key::order_lock_name(intent.user_id));
        let outcome = match lock.try_acquire(self.lock_lease).await {
            Ok(true) => {
                let outcome = self.persist(&intent).await;
                if let Err(e) = lock.release().await {
                    warn!(user_id = intent.user_id, error = %e, "Failed to release order lock");
                }
                outcome
            }
            Ok(false) => ProcessOutcome::LockBusy,
            Err(e) => {
                error!(order_id = intent.order_id, error = %e, "Order lock unavailable");
                ProcessOutcome::Failed
            }
        };

        record_seckill_order(outcome.as_str());
        match outcome {
            ProcessOutcome::Persisted => info!(
                order_id = intent.order_id,
                voucher_id = intent.voucher_id,
                user_id = intent.user_id,
                "Voucher order persisted"
            ),
            other => error!(
                order_id = intent.order_id,
                voucher_id = intent.voucher_id,
                user_id = intent.user_id,
                reason = other.as_str(),
                "Admitted order intent dropped"
            ),
        }
        outcome
    }

    async fn persist(&self, intent: &OrderIntent) -> ProcessOutcome {
        match self.repo.count_orders(intent.user_id, intent.voucher_id).await {
            Ok(count) if count > 0 => return ProcessOutcome::Duplicate,
            Ok(_) => {}
            Err(e) => {
                error!(order_id = intent.order_id, error = %e, "Order re-check failed");
                return ProcessOutcome::Failed;
            }
        }

        match self.repo.persist_order(intent).await {
            Ok(outcome) => outcome.into(),
            Err(e) => {
                error!(order_id = intent.order_id, error = %e, "Order transaction failed");
                ProcessOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::voucher::{InMemoryVoucherRepository, PublishSeckillVoucher};
    use crate::store::InMemoryKvStore;
    use chrono::{Duration as ChronoDuration, Utc};

    async fn setup(stock: i32) -> (Arc<InMemoryVoucherRepository>, LockService, OrderProcessor) {
        let repo = Arc::new(InMemoryVoucherRepository::new());
        let now = Utc::now();
        let voucher = PublishSeckillVoucher {
            voucher_id: 1,
            stock,
            begin_time: now - ChronoDuration::hours(1),
            end_time: now + ChronoDuration::hours(1),
        }
        .into_voucher(now);
        repo.insert_seckill_voucher(&voucher).await.unwrap();

        let locks = LockService::new(Arc::new(InMemoryKvStore::new()));
        let processor = OrderProcessor::new(repo.clone(), locks.clone(), Duration::from_secs(30));
        (repo, locks, processor)
    }

    fn intent(order_id: i64, user_id: i64) -> OrderIntent {
        OrderIntent { order_id, voucher_id: 1, user_id }
    }

    #[tokio::test]
    async fn test_persists_then_drops_duplicate() {
        let (repo, _locks, processor) = setup(5).await;

        assert_eq!(processor.process(intent(10, 1)).await, ProcessOutcome::Persisted);
        assert_eq!(processor.process(intent(11, 1)).await, ProcessOutcome::Duplicate);
        assert_eq!(repo.orders().len(), 1);
        assert_eq!(repo.stock_of(1), Some(4));
    }

    #[tokio::test]
    async fn test_out_of_stock_is_dropped() {
        let (repo, _locks, processor) = setup(1).await;

        assert_eq!(processor.process(intent(20, 1)).await, ProcessOutcome::Persisted);
        assert_eq!(processor.process(intent(21, 2)).await, ProcessOutcome::OutOfStock);
        assert_eq!(repo.stock_of(1), Some(0));
    }

    #[tokio::test]
    async fn test_busy_user_lock_drops_intent() {
        let (repo, locks, processor) = setup(5).await;
        let held = locks.lock(&cache_key::order_lock_name(3));
        assert!(held.try_acquire(Duration::from_secs(30)).await.unwrap());

        assert_eq!(processor.process(intent(30, 3)).await, ProcessOutcome::LockBusy);
        assert!(repo.orders().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let (repo, _locks, processor) = setup(10).await;
        let (queue, receiver) = order_channel(16);
        for user in 0..5 {
            queue.try_enqueue(intent(100 + user, user)).unwrap();
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();
        processor.spawn(receiver, shutdown_rx).await.unwrap();

        assert_eq!(repo.orders().len(), 5);
        assert!(queue.try_enqueue(intent(200, 99)).is_err());
    }

    #[tokio::test]
    async fn test_full_queue_returns_intent() {
        let (queue, _receiver) = order_channel(1);
        queue.try_enqueue(intent(1, 1)).unwrap();
        assert_eq!(queue.try_enqueue(intent(2, 2)), Err(intent(2, 2)));
    }

    #[tokio::test]
    async fn test_queue_depth_tracks_accepted_intents() {
        let depth = IntGauge::new("test_order_queue_depth", "queue depth under test").unwrap();
        let (queue, mut receiver) = order_channel_with_gauge(1, depth.clone());

        queue.try_enqueue(intent(1, 1)).unwrap();
        assert_eq!(depth.get(), 1);

        assert!(queue.try_enqueue(intent(2, 2)).is_err());
        assert_eq!(depth.get(), 1);

        assert_eq!(receiver.recv().await, Some(intent(1, 1)));
        assert_eq!(depth.get(), 0);

        receiver.close();
        assert!(queue.try_enqueue(intent(3, 3)).is_err());
        assert_eq!(depth.get(), 0);
    }
}
