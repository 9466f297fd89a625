//! Cancellable polling subscriptions
//!
//! Each dashboard view owns one [`Subscription`]: a spawned task that
//! re-fetches on a fixed interval and publishes [`ViewState`] snapshots
//! through a watch channel. Cancellation is structural, not conventional:
//! the subscription owns the task handle and a cancellation token, and
//! dropping it cancels the token and aborts the task, so a poll result can
//! never be applied after disposal.
//!
//! Within one subscription every fetch is awaited before the next tick, so
//! snapshots are always applied in fetch order.

use crate::error::{Result, SensorViewError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Lifecycle phase of a polled view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewPhase {
    /// First fetch in flight, nothing to show yet
    Loading,
    /// At least one fetch succeeded
    Ready,
    /// First fetch failed with nothing to fall back to
    Failed,
}

/// One published snapshot of a polled view
#[derive(Debug, Clone)]
pub struct ViewState<T> {
    pub phase: ViewPhase,
    /// Most recent successfully fetched snapshot; survives later poll
    /// failures
    pub data: Option<T>,
    /// Raised while a background refresh is in flight
    pub updating: bool,
    /// View-scoped message from the most recent failed poll
    pub error: Option<String>,
    /// When `data` was last replaced
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl<T> ViewState<T> {
    fn loading() -> Self {
        Self {
            phase: ViewPhase::Loading,
            data: None,
            updating: false,
            error: None,
            refreshed_at: None,
        }
    }

    fn apply_success(&mut self, snapshot: T) {
        self.phase = ViewPhase::Ready;
        self.data = Some(snapshot);
        self.updating = false;
        self.error = None;
        self.refreshed_at = Some(Utc::now());
    }

    /// Record a failed poll. Previously fetched data stays on display; only
    /// the very first fetch may park the view in `Failed`.
    fn apply_failure(&mut self, message: String) {
        if self.phase == ViewPhase::Loading {
            self.phase = ViewPhase::Failed;
        }
        self.updating = false;
        self.error = Some(message);
    }

    pub fn is_ready(&self) -> bool {
        self.phase == ViewPhase::Ready
    }
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self::loading()
    }
}

/// The fetch seam a subscription polls through
#[async_trait]
pub trait ViewSource: Send + Sync + 'static {
    type Snapshot: Clone + Send + Sync + 'static;

    async fn fetch(&self) -> Result<Self::Snapshot>;
}

/// Polling cadence and per-fetch timeout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollConfig {
    pub interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// A running polled view
///
/// Holds the task handle and the cancellation token; dropping the value
/// tears the poll loop down.
pub struct Subscription<T> {
    rx: watch::Receiver<ViewState<T>>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl<T> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start polling `source`. The first published state is `Loading`,
    /// followed by `Ready` or `Failed` once the initial fetch settles.
    pub fn spawn<S>(source: S, config: PollConfig) -> Self
    where
        S: ViewSource<Snapshot = T>,
    {
        let token = CancellationToken::new();
        let (tx, rx) = watch::channel(ViewState::loading());
        let loop_token = token.clone();

        let handle = tokio::spawn(async move {
            // biased selects: cancellation outranks a completed fetch
            let first = tokio::select! {
                biased;
                _ = loop_token.cancelled() => return,
                result = fetch_once(&source, config.fetch_timeout) => result,
            };
            match first {
                Ok(snapshot) => tx.send_modify(|state| state.apply_success(snapshot)),
                Err(e) => {
                    warn!(error = %e, "initial fetch failed");
                    tx.send_modify(|state| state.apply_failure(e.to_string()));
                }
            }

            let mut interval = tokio::time::interval(config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick of a fresh interval completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => {
                        debug!("subscription cancelled");
                        return;
                    }
                    _ = interval.tick() => {}
                }

                tx.send_modify(|state| state.updating = true);
                let result = tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => return,
                    result = fetch_once(&source, config.fetch_timeout) => result,
                };
                match result {
                    Ok(snapshot) => tx.send_modify(|state| state.apply_success(snapshot)),
                    Err(e) => {
                        if e.is_retryable() {
                            debug!(error = %e, "poll failed, retrying next tick");
                        } else {
                            warn!(error = %e, "poll failed");
                        }
                        tx.send_modify(|state| state.apply_failure(e.to_string()));
                    }
                }
            }
        });

        Self { rx, token, handle }
    }

    /// Clone of the current state
    pub fn state(&self) -> ViewState<T> {
        self.rx.borrow().clone()
    }

    /// Receiver for awaiting state changes
    pub fn watch(&self) -> watch::Receiver<ViewState<T>> {
        self.rx.clone()
    }

    /// Stop the poll loop. Idempotent; also invoked by `Drop`.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Swap in a new fetch parameterisation: the old loop is cancelled
    /// before the replacement starts, so timers never overlap.
    pub fn replace_with<S>(&mut self, source: S, config: PollConfig)
    where
        S: ViewSource<Snapshot = T>,
    {
        self.cancel();
        *self = Subscription::spawn(source, config);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}

async fn fetch_once<S: ViewSource>(source: &S, timeout: Duration) -> Result<S::Snapshot> {
    match tokio::time::timeout(timeout, source.fetch()).await {
        Ok(result) => result,
        Err(_) => Err(SensorViewError::timeout(format!(
            "fetch exceeded {}ms",
            timeout.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Returns one scripted outcome per call, in order; repeats the last
    struct ScriptedSource {
        calls: AtomicUsize,
        script: Vec<std::result::Result<u32, String>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<std::result::Result<u32, String>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                script,
            }
        }
    }

    #[async_trait]
    impl ViewSource for ScriptedSource {
        type Snapshot = u32;

        async fn fetch(&self) -> Result<u32> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.get(call).or_else(|| self.script.last());
            match step {
                Some(Ok(v)) => Ok(*v),
                Some(Err(msg)) => Err(SensorViewError::connection(msg.clone())),
                None => Err(SensorViewError::internal("empty script")),
            }
        }
    }

    /// First call resolves, second call hangs until notified
    struct StallingSource {
        calls: AtomicUsize,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl ViewSource for StallingSource {
        type Snapshot = u32;

        async fn fetch(&self) -> Result<u32> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(1);
            }
            self.gate.notified().await;
            Ok(99)
        }
    }

    fn fast_config() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(50),
            fetch_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_fetch_reaches_ready() {
        let sub = Subscription::spawn(ScriptedSource::new(vec![Ok(7)]), fast_config());
        let mut rx = sub.watch();

        let state = rx.wait_for(ViewState::is_ready).await.unwrap().clone();
        assert_eq!(state.data, Some(7));
        assert!(state.error.is_none());
        assert!(state.refreshed_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_load_failure_is_blocking() {
        let sub = Subscription::spawn(
            ScriptedSource::new(vec![Err("refused".into())]),
            fast_config(),
        );
        let mut rx = sub.watch();

        let state = rx
            .wait_for(|s| s.phase == ViewPhase::Failed)
            .await
            .unwrap()
            .clone();
        assert!(state.data.is_none());
        assert!(state.error.as_deref().unwrap_or("").contains("refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_keeps_previous_data() {
        let sub = Subscription::spawn(
            ScriptedSource::new(vec![Ok(1), Err("blip".into()), Ok(3)]),
            fast_config(),
        );
        let mut rx = sub.watch();

        rx.wait_for(|s| s.data == Some(1)).await.unwrap();

        // the failed tick keeps the stale snapshot and raises the message
        let state = rx
            .wait_for(|s| s.error.is_some())
            .await
            .unwrap()
            .clone();
        assert_eq!(state.phase, ViewPhase::Ready);
        assert_eq!(state.data, Some(1));

        // the next tick recovers and clears the message
        let state = rx
            .wait_for(|s| s.data == Some(3))
            .await
            .unwrap()
            .clone();
        assert!(state.error.is_none());
        assert_eq!(state.phase, ViewPhase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_updating_flag_during_background_fetch() {
        let gate = Arc::new(Notify::new());
        let sub = Subscription::spawn(
            StallingSource {
                calls: AtomicUsize::new(0),
                gate: gate.clone(),
            },
            fast_config(),
        );
        let mut rx = sub.watch();

        rx.wait_for(|s| s.data == Some(1)).await.unwrap();
        let state = rx.wait_for(|s| s.updating).await.unwrap().clone();
        // still showing old data while refreshing, not back in Loading
        assert_eq!(state.phase, ViewPhase::Ready);
        assert_eq!(state.data, Some(1));

        gate.notify_one();
        let state = rx.wait_for(|s| s.data == Some(99)).await.unwrap().clone();
        assert!(!state.updating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_in_flight_never_applies_result() {
        let gate = Arc::new(Notify::new());
        let sub = Subscription::spawn(
            StallingSource {
                calls: AtomicUsize::new(0),
                gate: gate.clone(),
            },
            fast_config(),
        );
        let mut rx = sub.watch();

        rx.wait_for(|s| s.data == Some(1)).await.unwrap();
        rx.wait_for(|s| s.updating).await.unwrap();

        sub.cancel();
        // even if the stalled fetch is released now, its result is dropped
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(rx.borrow().data, Some(1));
        assert!(sub.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_cancels_previous_loop() {
        let mut sub = Subscription::spawn(ScriptedSource::new(vec![Ok(1)]), fast_config());
        let mut first_rx = sub.watch();
        first_rx.wait_for(|s| s.data == Some(1)).await.unwrap();

        sub.replace_with(ScriptedSource::new(vec![Ok(2)]), fast_config());
        let mut rx = sub.watch();
        let state = rx.wait_for(ViewState::is_ready).await.unwrap().clone();
        assert_eq!(state.data, Some(2));
        // the original channel is closed once its loop is gone
        assert!(first_rx.wait_for(|_| false).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_reports_like_any_failure() {
        struct SlowSource;

        #[async_trait]
        impl ViewSource for SlowSource {
            type Snapshot = u32;

            async fn fetch(&self) -> Result<u32> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(0)
            }
        }

        let sub = Subscription::spawn(
            SlowSource,
            PollConfig {
                interval: Duration::from_millis(50),
                fetch_timeout: Duration::from_millis(100),
            },
        );
        let mut rx = sub.watch();
        let state = rx
            .wait_for(|s| s.phase == ViewPhase::Failed)
            .await
            .unwrap()
            .clone();
        assert!(state.error.as_deref().unwrap_or("").contains("exceeded"));
    }
}
