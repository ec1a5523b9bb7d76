//! Spoken-text moderation queue
//!
//! Items queue as pending. Approval plays the optional donation toast, then
//! the speech cue, then marks the item spoken. Rejected and spoken items stay
//! in the queue as history.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use overlay_common::models::{TtsItem, TtsStatus};
use overlay_common::time::now_unix;
use overlay_common::{Error, OverlayEvent, Result};
use tokio::sync::Mutex;
use tracing::info;

use crate::hub::Hub;

/// Consistent copy of the queue and its id counter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TtsSnapshot {
    pub queue: Vec<TtsItem>,
    pub seq: u64,
}

/// Queue of spoken-text items awaiting moderation
pub struct TtsStore {
    inner: Mutex<TtsSnapshot>,
    revision: AtomicU64,
    hub: Arc<Hub>,
}

impl TtsStore {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self {
            inner: Mutex::new(TtsSnapshot::default()),
            revision: AtomicU64::new(0),
            hub,
        }
    }

    /// Queue a new item; text must be non-empty after trimming
    pub async fn submit(
        &self,
        text: &str,
        voice: &str,
        donor: &str,
        amount_cents: i64,
        msg: &str,
    ) -> Result<TtsItem> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("text is required".to_string()));
        }

        let mut inner = self.inner.lock().await;
        inner.seq += 1;
        let item = TtsItem {
            id: inner.seq,
            text: text.to_string(),
            voice: voice.trim().to_string(),
            donor: donor.trim().to_string(),
            amount_cents,
            msg: msg.trim().to_string(),
            created_unix: now_unix(),
            status: TtsStatus::Pending,
        };
        inner.queue.push(item.clone());
        self.bump();
        drop(inner);

        info!("TTS item {} submitted", item.id);
        Ok(item)
    }

    /// Approve a pending item and play it on the overlay
    ///
    /// Display clients receive DONATION (only when the item carries donor
    /// information) strictly before TTS_PLAY. The item is marked spoken once
    /// both are out.
    pub async fn approve(&self, id: u64) -> Result<TtsItem> {
        let item = self.claim(id).await?;

        if item.has_donation() {
            self.hub.broadcast(&OverlayEvent::donation_for(&item)).await;
        }
        self.hub.broadcast(&OverlayEvent::tts_play_for(&item)).await;

        let spoken = self.mark_spoken(item).await;
        info!("TTS item {} spoken", id);
        Ok(spoken)
    }

    /// Move a pending item to approved so no one else can decide it
    async fn claim(&self, id: u64) -> Result<TtsItem> {
        let mut inner = self.inner.lock().await;
        let item = inner
            .queue
            .iter_mut()
            .find(|it| it.id == id && it.status == TtsStatus::Pending)
            .ok_or_else(|| Error::not_pending("tts", id))?;
        item.status = TtsStatus::Approved;
        let item = item.clone();
        self.bump();
        Ok(item)
    }

    async fn mark_spoken(&self, item: TtsItem) -> TtsItem {
        let mut inner = self.inner.lock().await;
        let spoken = match inner.queue.iter_mut().find(|it| it.id == item.id) {
            Some(stored) => {
                stored.status = TtsStatus::Spoken;
                stored.clone()
            }
            // Replaced by a concurrent snapshot load
            None => TtsItem {
                status: TtsStatus::Spoken,
                ..item
            },
        };
        self.bump();
        spoken
    }

    /// Reject a pending item
    pub async fn reject(&self, id: u64) -> Result<TtsItem> {
        let mut inner = self.inner.lock().await;
        let item = inner
            .queue
            .iter_mut()
            .find(|it| it.id == id && it.status == TtsStatus::Pending)
            .ok_or_else(|| Error::not_pending("tts", id))?;
        item.status = TtsStatus::Rejected;
        let item = item.clone();
        self.bump();
        drop(inner);

        info!("TTS item {} rejected", id);
        Ok(item)
    }

    /// Items still awaiting a decision, in submission order
    pub async fn list_pending(&self) -> Vec<TtsItem> {
        let inner = self.inner.lock().await;
        inner
            .queue
            .iter()
            .filter(|it| it.status == TtsStatus::Pending)
            .cloned()
            .collect()
    }

    pub async fn snapshot(&self) -> TtsSnapshot {
        self.inner.lock().await.clone()
    }

    /// Replace the whole queue (snapshot load only; no broadcast)
    ///
    /// An item saved mid-approval already had its cues sent, so it loads as
    /// spoken rather than being stuck approved forever.
    pub async fn set_state(&self, mut snapshot: TtsSnapshot) {
        for item in &mut snapshot.queue {
            if item.status == TtsStatus::Approved {
                item.status = TtsStatus::Spoken;
            }
        }
        *self.inner.lock().await = snapshot;
        self.bump();
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{Connection, Frame};
    use tokio::sync::mpsc;

    async fn store_with_client() -> (TtsStore, mpsc::Receiver<Frame>) {
        let hub = Arc::new(Hub::new());
        let (conn, rx) = Connection::channel(64);
        hub.register(conn).await;
        (TtsStore::new(hub), rx)
    }

    fn next_event(rx: &mut mpsc::Receiver<Frame>) -> OverlayEvent {
        let frame = rx.try_recv().expect("event broadcast");
        serde_json::from_str(&frame).expect("valid envelope")
    }

    #[tokio::test]
    async fn test_approve_with_donation_sends_toast_then_speech() {
        let (store, mut rx) = store_with_client().await;

        let item = store.submit("Hello!", "", "Bob", 500, "gg").await.unwrap();
        assert_eq!(item.id, 1);
        assert_eq!(item.status, TtsStatus::Pending);

        let spoken = store.approve(1).await.unwrap();
        assert_eq!(spoken.status, TtsStatus::Spoken);

        assert_eq!(
            next_event(&mut rx),
            OverlayEvent::Donation {
                donor: "Bob".to_string(),
                amount: 500,
                msg: "gg".to_string(),
            }
        );
        assert_eq!(
            next_event(&mut rx),
            OverlayEvent::TtsPlay {
                text: "Hello!".to_string(),
                voice: String::new(),
            }
        );
        assert!(rx.try_recv().is_err());

        assert!(store.list_pending().await.is_empty());
        assert_eq!(store.snapshot().await.queue[0].status, TtsStatus::Spoken);
    }

    #[tokio::test]
    async fn test_approve_without_donation_sends_speech_only() {
        let (store, mut rx) = store_with_client().await;
        store.submit("just talk", "en-US", "", 0, "").await.unwrap();

        store.approve(1).await.unwrap();
        assert!(matches!(next_event(&mut rx), OverlayEvent::TtsPlay { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_amount_alone_counts_as_donation() {
        let (store, mut rx) = store_with_client().await;
        store.submit("thanks", "", "", 100, "").await.unwrap();

        store.approve(1).await.unwrap();
        assert!(matches!(next_event(&mut rx), OverlayEvent::Donation { amount: 100, .. }));
        assert!(matches!(next_event(&mut rx), OverlayEvent::TtsPlay { .. }));
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_consuming_id() {
        let (store, _rx) = store_with_client().await;

        let err = store.submit("   ", "", "Bob", 500, "").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.snapshot().await.seq, 0);
        assert_eq!(store.revision(), 0);

        let item = store.submit("ok", "", "", 0, "").await.unwrap();
        assert_eq!(item.id, 1);
    }

    #[tokio::test]
    async fn test_reject_is_terminal_and_silent() {
        let (store, mut rx) = store_with_client().await;
        store.submit("nope", "", "", 0, "").await.unwrap();

        let rejected = store.reject(1).await.unwrap();
        assert_eq!(rejected.status, TtsStatus::Rejected);
        assert!(rx.try_recv().is_err());

        assert!(matches!(store.approve(1).await, Err(Error::NotFound(_))));
        assert!(matches!(store.reject(1).await, Err(Error::NotFound(_))));
        assert_eq!(store.snapshot().await.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_approve_unknown_id() {
        let (store, mut rx) = store_with_client().await;
        assert!(matches!(store.approve(7).await, Err(Error::NotFound(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_set_state_restores_queue() {
        let (store, mut rx) = store_with_client().await;
        store.submit("a", "", "", 0, "").await.unwrap();
        let snapshot = store.snapshot().await;

        let other = TtsStore::new(Arc::new(Hub::new()));
        other.set_state(snapshot.clone()).await;
        assert_eq!(other.snapshot().await, snapshot);
        assert_eq!(other.list_pending().await.len(), 1);
        assert!(rx.try_recv().is_err());

        let next = other.submit("b", "", "", 0, "").await.unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn test_claimed_item_leaves_pending_before_cues() {
        let (store, mut rx) = store_with_client().await;
        store.submit("hi", "", "Bob", 500, "").await.unwrap();

        let claimed = store.claim(1).await.unwrap();
        assert_eq!(claimed.status, TtsStatus::Approved);
        assert!(store.list_pending().await.is_empty());
        assert_eq!(store.snapshot().await.queue[0].status, TtsStatus::Approved);
        assert!(rx.try_recv().is_err());

        // A second decision cannot race in while the cues go out
        assert!(matches!(store.approve(1).await, Err(Error::NotFound(_))));
        assert!(matches!(store.reject(1).await, Err(Error::NotFound(_))));

        let spoken = store.mark_spoken(claimed).await;
        assert_eq!(spoken.status, TtsStatus::Spoken);
        assert_eq!(store.snapshot().await.queue[0].status, TtsStatus::Spoken);
    }

    #[tokio::test]
    async fn test_mark_spoken_after_queue_replaced() {
        let (store, _rx) = store_with_client().await;
        store.submit("hi", "", "", 0, "").await.unwrap();
        let claimed = store.claim(1).await.unwrap();

        store.set_state(TtsSnapshot::default()).await;
        let spoken = store.mark_spoken(claimed).await;
        assert_eq!(spoken.id, 1);
        assert_eq!(spoken.status, TtsStatus::Spoken);
        assert!(store.snapshot().await.queue.is_empty());
    }

    #[tokio::test]
    async fn test_set_state_finishes_interrupted_approval() {
        let (store, _rx) = store_with_client().await;
        store.submit("a", "", "", 0, "").await.unwrap();
        store.submit("b", "", "", 0, "").await.unwrap();
        store.claim(1).await.unwrap();
        let snapshot = store.snapshot().await;

        let other = TtsStore::new(Arc::new(Hub::new()));
        other.set_state(snapshot).await;
        let loaded = other.snapshot().await;
        assert_eq!(loaded.queue[0].status, TtsStatus::Spoken);
        assert_eq!(loaded.queue[1].status, TtsStatus::Pending);
        assert_eq!(other.list_pending().await.len(), 1);
    }
}
