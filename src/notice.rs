//! Transient user-facing notices
//!
//! Poll failures and anomaly alerts surface as toasts with a bounded
//! lifetime. Every auto-dismiss timer is a spawned task gated on the
//! center's cancellation token, so closing the center drops all pending
//! dismissals without firing them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Active toasts kept per center; the oldest is evicted beyond this
const MAX_ACTIVE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// One toast
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub id: Uuid,
    pub kind: NoticeKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Notice lifecycle events for subscribers
#[derive(Debug, Clone)]
pub enum NoticeEvent {
    Posted(Notice),
    Dismissed(Uuid),
}

/// Owner of active toasts and their dismiss timers
#[derive(Clone)]
pub struct NoticeCenter {
    active: Arc<RwLock<Vec<Notice>>>,
    events: broadcast::Sender<NoticeEvent>,
    token: CancellationToken,
    ttl: Duration,
}

impl NoticeCenter {
    /// Create a center whose toasts auto-dismiss after `ttl`
    pub fn new(ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            active: Arc::new(RwLock::new(Vec::new())),
            events,
            token: CancellationToken::new(),
            ttl,
        }
    }

    /// Post a toast and arm its dismiss timer
    pub async fn push(&self, kind: NoticeKind, message: impl Into<String>) -> Uuid {
        let notice = Notice {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            created_at: Utc::now(),
        };
        let id = notice.id;

        {
            let mut active = self.active.write().await;
            if active.len() >= MAX_ACTIVE {
                active.remove(0);
            }
            active.push(notice.clone());
        }
        let _ = self.events.send(NoticeEvent::Posted(notice));

        let store = self.active.clone();
        let events = self.events.clone();
        let token = self.token.clone();
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(%id, "dismiss timer dropped");
                }
                _ = tokio::time::sleep(ttl) => {
                    let removed = {
                        let mut active = store.write().await;
                        let before = active.len();
                        active.retain(|n| n.id != id);
                        before != active.len()
                    };
                    if removed {
                        let _ = events.send(NoticeEvent::Dismissed(id));
                    }
                }
            }
        });

        id
    }

    /// Shorthand for an error toast
    pub async fn push_error(&self, message: impl Into<String>) -> Uuid {
        self.push(NoticeKind::Error, message).await
    }

    /// Dismiss a toast before its timer fires. Returns false for unknown ids.
    pub async fn dismiss(&self, id: Uuid) -> bool {
        let removed = {
            let mut active = self.active.write().await;
            let before = active.len();
            active.retain(|n| n.id != id);
            before != active.len()
        };
        if removed {
            let _ = self.events.send(NoticeEvent::Dismissed(id));
        }
        removed
    }

    /// Snapshot of active toasts, oldest first
    pub async fn active(&self) -> Vec<Notice> {
        self.active.read().await.clone()
    }

    /// Subscribe to post/dismiss events
    pub fn subscribe(&self) -> broadcast::Receiver<NoticeEvent> {
        self.events.subscribe()
    }

    /// Stop every pending dismiss timer. Posted toasts stay as they are;
    /// nothing fires after this call.
    pub fn close(&self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_auto_dismiss_after_ttl() {
        let center = NoticeCenter::new(Duration::from_secs(4));
        let id = center.push(NoticeKind::Info, "node-001 is back").await;
        assert_eq!(center.active().await.len(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(center.active().await.is_empty());

        // timer for an already-dismissed id stays quiet
        assert!(!center.dismiss(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_dismiss_before_ttl() {
        let center = NoticeCenter::new(Duration::from_secs(60));
        let id = center.push_error("poll failed: connection refused").await;

        assert!(center.dismiss(id).await);
        assert!(center.active().await.is_empty());
        assert!(!center.dismiss(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_drops_pending_dismissals() {
        let center = NoticeCenter::new(Duration::from_secs(4));
        center.push(NoticeKind::Warning, "pH out of band").await;

        center.close();
        tokio::time::sleep(Duration::from_secs(10)).await;

        // the timer was dropped without firing, the toast is still there
        assert_eq!(center.active().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_reach_subscribers() {
        let center = NoticeCenter::new(Duration::from_secs(60));
        let mut events = center.subscribe();

        let id = center.push(NoticeKind::Info, "hello").await;
        match events.recv().await.unwrap() {
            NoticeEvent::Posted(notice) => assert_eq!(notice.id, id),
            other => panic!("unexpected event: {other:?}"),
        }

        center.dismiss(id).await;
        match events.recv().await.unwrap() {
            NoticeEvent::Dismissed(dismissed) => assert_eq!(dismissed, id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_oldest_evicted_at_capacity() {
        let center = NoticeCenter::new(Duration::from_secs(600));
        let first = center.push(NoticeKind::Info, "first").await;
        for i in 0..MAX_ACTIVE {
            center.push(NoticeKind::Info, format!("notice {i}")).await;
        }
        let active = center.active().await;
        assert_eq!(active.len(), MAX_ACTIVE);
        assert!(active.iter().all(|n| n.id != first));
    }
}
