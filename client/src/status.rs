//! Background status polling
//!
//! One poll runs immediately, then one per interval. Polls never overlap:
//! the next tick is only awaited once the previous request has finished,
//! and ticks missed meanwhile are skipped rather than bunched up.

use std::sync::Arc;
use std::time::Duration;

use teamboard_protocol::StatusReport;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::MetricsApi;

/// What the status widget shows
#[derive(Debug, Clone, PartialEq)]
pub enum StatusView {
    Loading,
    Ready(StatusReport),
    Error(String),
}

/// Periodic status poller
///
/// Dropping the poller stops it; `shutdown` also waits for the task.
pub struct StatusPoller {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    rx: watch::Receiver<StatusView>,
}

impl StatusPoller {
    pub fn spawn<A>(api: Arc<A>, interval: Duration) -> Self
    where
        A: MetricsApi + ?Sized + 'static,
    {
        let (tx, rx) = watch::channel(StatusView::Loading);
        let cancel = CancellationToken::new();
        let interval = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(run(api, interval, tx, cancel.clone()));

        Self {
            cancel,
            handle: Some(handle),
            rx,
        }
    }

    /// Receiver notified after every completed poll
    pub fn subscribe(&self) -> watch::Receiver<StatusView> {
        self.rx.clone()
    }

    pub fn current(&self) -> StatusView {
        self.rx.borrow().clone()
    }

    /// Stop polling and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Status poller task failed: {}", e);
            }
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<A>(
    api: Arc<A>,
    interval: Duration,
    tx: watch::Sender<StatusView>,
    cancel: CancellationToken,
) where
    A: MetricsApi + ?Sized,
{
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let view = tokio::select! {
            _ = cancel.cancelled() => break,
            result = api.status() => match result {
                Ok(report) => StatusView::Ready(report),
                Err(e) => {
                    debug!("Status poll failed: {}", e);
                    StatusView::Error(e.to_string())
                }
            },
        };

        tx.send_replace(view);
    }

    debug!("Status poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ClientError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use teamboard_protocol::{
        DeleteAck, Metric, MetricFilter, MetricId, MetricPayload, StatusReport,
    };

    struct SlowStatus {
        delay: Duration,
        fail: bool,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl SlowStatus {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                fail: false,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Duration::ZERO)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetricsApi for SlowStatus {
        async fn status(&self) -> Result<StatusReport, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(ClientError::Api {
                    status: 503,
                    code: "unknown".into(),
                    message: "Service Unavailable".into(),
                });
            }
            Ok(StatusReport::new(true, Utc::now()))
        }

        async fn list(&self, _filter: &MetricFilter) -> Result<Vec<Metric>, ClientError> {
            unimplemented!()
        }

        async fn get(&self, _id: MetricId) -> Result<Metric, ClientError> {
            unimplemented!()
        }

        async fn create(&self, _payload: &MetricPayload) -> Result<Metric, ClientError> {
            unimplemented!()
        }

        async fn update(&self, _id: MetricId, _payload: &MetricPayload) -> Result<Metric, ClientError> {
            unimplemented!()
        }

        async fn delete(&self, _id: MetricId) -> Result<DeleteAck, ClientError> {
            unimplemented!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_immediately_then_per_interval() {
        let api = Arc::new(SlowStatus::new(Duration::ZERO));
        let poller = StatusPoller::spawn(api.clone(), Duration::from_secs(30));
        let mut rx = poller.subscribe();
        assert_eq!(poller.current(), StatusView::Loading);

        rx.changed().await.unwrap();
        assert_eq!(api.calls(), 1);
        assert!(matches!(poller.current(), StatusView::Ready(ref r) if r.is_healthy()));

        time::sleep(Duration::from_secs(29)).await;
        assert_eq!(api.calls(), 1);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(api.calls(), 2);

        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_polls_never_overlap() {
        let api = Arc::new(SlowStatus::new(Duration::from_secs(45)));
        let poller = StatusPoller::spawn(api.clone(), Duration::from_secs(30));

        time::sleep(Duration::from_secs(200)).await;
        assert!(api.calls() >= 2);
        assert_eq!(api.max_in_flight.load(Ordering::SeqCst), 1);

        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_shows_error() {
        let api = Arc::new(SlowStatus::failing());
        let poller = StatusPoller::spawn(api, Duration::from_secs(30));
        let mut rx = poller.subscribe();

        rx.changed().await.unwrap();
        match poller.current() {
            StatusView::Error(msg) => assert!(msg.contains("Service Unavailable")),
            other => panic!("expected error view, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_polling() {
        let api = Arc::new(SlowStatus::new(Duration::ZERO));
        let poller = StatusPoller::spawn(api.clone(), Duration::from_secs(30));
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();

        poller.shutdown().await;
        let calls = api.calls();

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(api.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let api = Arc::new(SlowStatus::new(Duration::ZERO));
        let poller = StatusPoller::spawn(api.clone(), Duration::from_secs(30));
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();

        drop(poller);
        let calls = api.calls();

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(api.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_in_flight_poll() {
        let api = Arc::new(SlowStatus::new(Duration::from_secs(3600)));
        let poller = StatusPoller::spawn(api.clone(), Duration::from_secs(30));

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(api.calls(), 1);

        poller.shutdown().await;
    }
}
