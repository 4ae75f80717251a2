//! Behavior event batching.
//!
//! Tracking writes must never sit on the request path, so events go through
//! a bounded queue drained by a background worker. The worker flushes a
//! batch when it reaches `batch_size` or when the flush interval elapses,
//! whichever comes first. A full queue drops the event and counts it; the
//! caller is never blocked.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::TrackingConfig;
use crate::repository::{BehaviorEvent, BehaviorRepository};

pub struct BehaviorTracker {
    sender: mpsc::Sender<BehaviorEvent>,
    dropped: Arc<AtomicU64>,
    worker: JoinHandle<()>,
}

impl BehaviorTracker {
    /// Starts the flush worker on the current runtime.
    pub fn spawn(behavior_repo: Arc<dyn BehaviorRepository>, config: TrackingConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let worker = tokio::spawn(run_flush_loop(behavior_repo, receiver, config));

        Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
            worker,
        }
    }

    /// Enqueues one event. Non-blocking; drops the event when the queue
    /// is full.
    pub fn record(&self, event: BehaviorEvent) {
        if self.sender.try_send(event).is_err() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(total_dropped = dropped, "Behavior queue full, event dropped");
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Closes the queue and waits for the worker to flush what remains.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.worker.await {
            warn!("Behavior flush worker panicked: {}", e);
        }
    }
}

async fn run_flush_loop(
    repo: Arc<dyn BehaviorRepository>,
    mut receiver: mpsc::Receiver<BehaviorEvent>,
    config: TrackingConfig,
) {
    let mut batch: Vec<BehaviorEvent> = Vec::with_capacity(config.batch_size);
    let mut ticker =
        tokio::time::interval(std::time::Duration::from_secs(config.flush_interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            received = receiver.recv() => match received {
                Some(event) => {
                    batch.push(event);
                    if batch.len() >= config.batch_size {
                        flush(&repo, &mut batch).await;
                    }
                }
                None => {
                    // Queue closed; flush the tail and stop
                    flush(&repo, &mut batch).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                flush(&repo, &mut batch).await;
            }
        }
    }
}

async fn flush(repo: &Arc<dyn BehaviorRepository>, batch: &mut Vec<BehaviorEvent>) {
    if batch.is_empty() {
        return;
    }

    match repo.record_batch(batch).await {
        Ok(()) => debug!(count = batch.len(), "Behavior batch flushed"),
        Err(e) => warn!(
            count = batch.len(),
            "Behavior batch flush failed, events lost: {}", e
        ),
    }
    batch.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::repository::{BehaviorType, EngagementSummary};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct CapturingRepo {
        batches: Mutex<Vec<Vec<BehaviorEvent>>>,
    }

    impl CapturingRepo {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(Vec::new()),
            })
        }

        fn batch_count(&self) -> usize {
            self.batches.lock().unwrap().len()
        }

        fn event_count(&self) -> usize {
            self.batches.lock().unwrap().iter().map(|b| b.len()).sum()
        }
    }

    #[async_trait]
    impl BehaviorRepository for CapturingRepo {
        async fn record_batch(&self, events: &[BehaviorEvent]) -> Result<()> {
            self.batches.lock().unwrap().push(events.to_vec());
            Ok(())
        }

        async fn aggregate_for_user(&self, _user_id: i64) -> Result<EngagementSummary> {
            Ok(EngagementSummary::default())
        }
    }

    /// Repository that never completes, keeping the worker stuck in a flush.
    struct StalledRepo;

    #[async_trait]
    impl BehaviorRepository for StalledRepo {
        async fn record_batch(&self, _events: &[BehaviorEvent]) -> Result<()> {
            futures::future::pending::<()>().await;
            Ok(())
        }

        async fn aggregate_for_user(&self, _user_id: i64) -> Result<EngagementSummary> {
            Ok(EngagementSummary::default())
        }
    }

    fn event(news_id: i64) -> BehaviorEvent {
        BehaviorEvent {
            user_id: 1,
            news_id,
            behavior_type: BehaviorType::Read,
            context: None,
            recommendation_id: Some("rec-1".to_string()),
            timestamp: Utc::now(),
        }
    }

    async fn wait_for(repo: &CapturingRepo, events: usize) {
        for _ in 0..100 {
            if repo.event_count() >= events {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!(
            "flush did not happen, captured {} events",
            repo.event_count()
        );
    }

    #[tokio::test]
    async fn test_size_triggered_flush() {
        let repo = CapturingRepo::new();
        let tracker = BehaviorTracker::spawn(
            repo.clone(),
            TrackingConfig {
                queue_capacity: 64,
                batch_size: 3,
                flush_interval_secs: 3600,
            },
        );

        for id in 0..3 {
            tracker.record(event(id));
        }

        wait_for(&repo, 3).await;
        assert_eq!(repo.batch_count(), 1);
        assert_eq!(tracker.dropped_events(), 0);
        tracker.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_triggered_flush() {
        let repo = CapturingRepo::new();
        let tracker = BehaviorTracker::spawn(
            repo.clone(),
            TrackingConfig {
                queue_capacity: 64,
                batch_size: 100,
                flush_interval_secs: 5,
            },
        );

        tracker.record(event(1));
        tracker.record(event(2));

        // Paused clock: sleeps auto-advance past the flush interval
        wait_for(&repo, 2).await;
        assert_eq!(repo.event_count(), 2);
        tracker.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_flushes_tail() {
        let repo = CapturingRepo::new();
        let tracker = BehaviorTracker::spawn(
            repo.clone(),
            TrackingConfig {
                queue_capacity: 64,
                batch_size: 100,
                flush_interval_secs: 3600,
            },
        );

        tracker.record(event(1));
        tracker.record(event(2));
        tracker.shutdown().await;

        assert_eq!(repo.event_count(), 2);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        // Current-thread runtime: the worker is not polled between try_sends,
        // so the queue fills at its capacity and the rest are dropped.
        let tracker = BehaviorTracker::spawn(
            Arc::new(StalledRepo),
            TrackingConfig {
                queue_capacity: 2,
                batch_size: 1,
                flush_interval_secs: 3600,
            },
        );

        for id in 0..10 {
            tracker.record(event(id));
        }

        assert_eq!(tracker.dropped_events(), 8);
        tracker.worker.abort();
    }
}
