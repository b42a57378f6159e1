//! Fan-out of wall mutations to connected viewers.
//!
//! Built on a `tokio::sync::broadcast` channel. Publishing never waits on a
//! subscriber: a viewer that falls more than the channel capacity behind
//! skips the missed events and keeps receiving new ones. There is no
//! replay; a new viewer fetches the current list separately.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::types::PublicPhotoView;

/// Event delivered to viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WallEvent {
    /// A photo was accepted.
    PhotoCreated { photo: PublicPhotoView },
    /// A photo was explicitly deleted. Evictions are not announced.
    PhotoDeleted { id: String },
}

impl WallEvent {
    /// Event name used on the SSE stream.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PhotoCreated { .. } => "photo_created",
            Self::PhotoDeleted { .. } => "photo_deleted",
        }
    }
}

/// Broadcast channel for [`WallEvent`]s.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<WallEvent>,
}

impl Broadcaster {
    /// Create a broadcaster buffering `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Announces a new photo. Returns the number of receivers.
    pub fn publish_created(&self, photo: PublicPhotoView) -> usize {
        self.publish(WallEvent::PhotoCreated { photo })
    }

    /// Announces a deletion. Returns the number of receivers.
    pub fn publish_deleted(&self, id: impl Into<String>) -> usize {
        self.publish(WallEvent::PhotoDeleted { id: id.into() })
    }

    fn publish(&self, event: WallEvent) -> usize {
        // send() only fails when nobody is listening
        let count = self.tx.send(event).unwrap_or(0);
        debug!(receivers = count, "Broadcast wall event");
        count
    }

    /// New receiver seeing only events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WallEvent> {
        self.tx.subscribe()
    }

    /// Number of connected receivers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Runs `callback` for every future created photo.
    ///
    /// Spawns a task on the current tokio runtime; the task ends when the
    /// broadcaster is dropped.
    pub fn on_photo_created<F>(&self, callback: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&PublicPhotoView) + Send + Sync + 'static,
    {
        self.forward(move |event| {
            if let WallEvent::PhotoCreated { photo } = event {
                callback(photo);
            }
        })
    }

    /// Runs `callback` with the id of every future deleted photo.
    pub fn on_photo_deleted<F>(&self, callback: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.forward(move |event| {
            if let WallEvent::PhotoDeleted { id } = event {
                callback(id);
            }
        })
    }

    fn forward<F>(&self, handler: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&WallEvent) + Send + Sync + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => handler(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Wall event subscriber lagged");
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn view(id: &str) -> PublicPhotoView {
        PublicPhotoView {
            id: id.to_string(),
            caption: String::new(),
            timestamp: 0,
            rotation: 0.0,
            author: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let broadcaster = Broadcaster::new(16);
        let mut rx1 = broadcaster.subscribe();
        let mut rx2 = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        assert_eq!(broadcaster.publish_created(view("a")), 2);

        let e1 = timeout(Duration::from_millis(100), rx1.recv()).await.unwrap().unwrap();
        let e2 = timeout(Duration::from_millis(100), rx2.recv()).await.unwrap().unwrap();
        assert_eq!(e1, e2);
        assert_eq!(e1.name(), "photo_created");
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let broadcaster = Broadcaster::new(16);
        assert_eq!(broadcaster.publish_deleted("early"), 0);

        let mut rx = broadcaster.subscribe();
        broadcaster.publish_deleted("late");

        let event = rx.recv().await.unwrap();
        assert_eq!(event, WallEvent::PhotoDeleted { id: "late".to_string() });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_block_others() {
        let broadcaster = Broadcaster::new(2);
        let mut slow = broadcaster.subscribe();
        let mut fast = broadcaster.subscribe();

        for i in 0..5 {
            broadcaster.publish_deleted(format!("p{i}"));
            let event = fast.recv().await.unwrap();
            assert_eq!(event, WallEvent::PhotoDeleted { id: format!("p{i}") });
        }

        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        // Still usable after lagging
        assert!(slow.recv().await.is_ok());
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(WallEvent::PhotoDeleted { id: "x".to_string() }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "photo_deleted", "id": "x"}));

        let json = serde_json::to_value(WallEvent::PhotoCreated { photo: view("y") }).unwrap();
        assert_eq!(json["type"], "photo_created");
        assert_eq!(json["photo"]["id"], "y");
    }

    #[tokio::test]
    async fn test_callbacks() {
        let broadcaster = Broadcaster::new(16);
        let created = Arc::new(Mutex::new(Vec::new()));
        let deleted = Arc::new(Mutex::new(Vec::new()));

        let c = Arc::clone(&created);
        broadcaster.on_photo_created(move |photo| c.lock().push(photo.id.clone()));
        let d = Arc::clone(&deleted);
        broadcaster.on_photo_deleted(move |id| d.lock().push(id.to_string()));

        broadcaster.publish_created(view("a"));
        broadcaster.publish_deleted("a");

        for _ in 0..50 {
            if !created.lock().is_empty() && !deleted.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*created.lock(), vec!["a".to_string()]);
        assert_eq!(*deleted.lock(), vec!["a".to_string()]);
    }
}
