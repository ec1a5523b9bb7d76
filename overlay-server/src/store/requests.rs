//! Call/board request moderation store
//!
//! Requests arrive pending and wait in the pending sequence (submission
//! order). Approval moves an item into the active set keyed by id and shows
//! it on the overlay; rejection leaves it in the pending sequence as history;
//! completion takes it off the active set and the overlay.
//!
//! Display clients only ever see `masked_phone`. The full digits stay with
//! the moderator listings and the snapshot.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use overlay_common::models::{RequestItem, RequestStatus};
use overlay_common::time::now_unix;
use overlay_common::{Error, OverlayEvent, Result};
use tokio::sync::Mutex;
use tracing::info;

use crate::hub::Hub;

/// Per-store consistent copy used by the persistence gateway
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSnapshot {
    /// Pending and rejected items, in submission order
    pub pending: Vec<RequestItem>,
    /// Approved items, ordered by id
    pub active: Vec<RequestItem>,
    /// Last assigned id
    pub seq: u64,
}

#[derive(Default)]
struct Inner {
    seq: u64,
    pending: Vec<RequestItem>,
    active: BTreeMap<u64, RequestItem>,
}

impl Inner {
    fn find(&self, id: u64) -> Option<&RequestItem> {
        self.pending
            .iter()
            .find(|it| it.id == id)
            .or_else(|| self.active.get(&id))
    }

    /// Index into `pending` of an item that is still awaiting a decision
    fn pending_index(&self, id: u64) -> Result<usize> {
        self.pending
            .iter()
            .position(|it| it.id == id && it.status == RequestStatus::Pending)
            .ok_or_else(|| Error::not_pending("request", id))
    }
}

/// Pending queue plus active set of call/board requests
pub struct RequestStore {
    inner: Mutex<Inner>,
    revision: AtomicU64,
    hub: Arc<Hub>,
}

impl RequestStore {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            revision: AtomicU64::new(0),
            hub,
        }
    }

    /// Queue a new request for moderation
    ///
    /// Board and note are trimmed and the phone reduced to its digits; at
    /// least one of board or phone must remain.
    pub async fn submit(&self, board: &str, raw_phone: &str, note: &str) -> Result<RequestItem> {
        let board = board.trim();
        let phone = digits_only(raw_phone);
        let note = note.trim();
        if board.is_empty() && phone.is_empty() {
            return Err(Error::Validation(
                "provide at least a board or a phone number".to_string(),
            ));
        }

        let mut inner = self.inner.lock().await;
        inner.seq += 1;
        let item = RequestItem {
            id: inner.seq,
            board: board.to_string(),
            masked_phone: mask_phone(&phone),
            phone,
            note: note.to_string(),
            status: RequestStatus::Pending,
            created_unix: now_unix(),
        };
        inner.pending.push(item.clone());
        self.bump();
        drop(inner);

        info!("Request {} submitted", item.id);
        Ok(item)
    }

    /// Approve a pending request and show it on the overlay
    pub async fn approve(&self, id: u64) -> Result<RequestItem> {
        let item = {
            let mut inner = self.inner.lock().await;
            let index = inner.pending_index(id)?;
            let mut item = inner.pending.remove(index);
            item.status = RequestStatus::Approved;
            inner.active.insert(id, item.clone());
            self.bump();
            item
        };
        info!("Request {} approved", id);

        self.hub.broadcast(&OverlayEvent::request_add(&item)).await;
        Ok(item)
    }

    /// Reject a pending request; it stays in the pending sequence as history
    pub async fn reject(&self, id: u64) -> Result<RequestItem> {
        let mut inner = self.inner.lock().await;
        let index = inner.pending_index(id)?;
        let item = &mut inner.pending[index];
        item.status = RequestStatus::Rejected;
        let item = item.clone();
        self.bump();
        drop(inner);

        info!("Request {} rejected", id);
        Ok(item)
    }

    /// Finish an active request and remove it from the overlay
    pub async fn complete(&self, id: u64) -> Result<RequestItem> {
        let item = {
            let mut inner = self.inner.lock().await;
            let mut item = inner
                .active
                .remove(&id)
                .ok_or_else(|| Error::NotFound(format!("unknown active request id {}", id)))?;
            item.status = RequestStatus::Completed;
            self.bump();
            item
        };
        info!("Request {} completed", id);

        self.hub.broadcast(&OverlayEvent::RequestRemove { id }).await;
        Ok(item)
    }

    /// Requests still awaiting a decision
    pub async fn list_pending(&self) -> Vec<RequestItem> {
        let inner = self.inner.lock().await;
        inner
            .pending
            .iter()
            .filter(|it| it.status == RequestStatus::Pending)
            .cloned()
            .collect()
    }

    /// Approved requests currently on the overlay
    pub async fn list_active(&self) -> Vec<RequestItem> {
        self.inner.lock().await.active.values().cloned().collect()
    }

    /// Look up a request by id (pending sequence first, then active set)
    pub async fn get(&self, id: u64) -> Option<RequestItem> {
        self.inner.lock().await.find(id).cloned()
    }

    /// Consistent copy of the whole store
    pub async fn snapshot(&self) -> RequestSnapshot {
        let inner = self.inner.lock().await;
        RequestSnapshot {
            pending: inner.pending.clone(),
            active: inner.active.values().cloned().collect(),
            seq: inner.seq,
        }
    }

    /// Replace the whole store (snapshot load only; no broadcast)
    pub async fn set_state(&self, snapshot: RequestSnapshot) {
        let mut inner = self.inner.lock().await;
        inner.pending = snapshot.pending;
        inner.active = snapshot
            .active
            .into_iter()
            .map(|it| (it.id, it))
            .collect();
        inner.seq = snapshot.seq;
        self.bump();
    }

    /// Mutation counter
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}

fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Redact a digit string for display
///
/// - 10 digits: `***-***-1234`
/// - 11 digits starting with 1: `1-***-***-1234`
/// - anything else: `***-` followed by up to the last four digits
/// - empty stays empty
pub fn mask_phone(digits: &str) -> String {
    if digits.is_empty() {
        return String::new();
    }

    let len = digits.len();
    let last4 = &digits[len.saturating_sub(4)..];
    match len {
        10 => format!("***-***-{}", last4),
        11 if digits.starts_with('1') => format!("1-***-***-{}", last4),
        _ => format!("***-{}", last4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{Connection, Frame};
    use tokio::sync::mpsc;

    async fn store_with_client() -> (RequestStore, mpsc::Receiver<Frame>) {
        let hub = Arc::new(Hub::new());
        let (conn, rx) = Connection::channel(64);
        hub.register(conn).await;
        (RequestStore::new(hub), rx)
    }

    #[test]
    fn test_mask_phone_rules() {
        assert_eq!(mask_phone("5551234567"), "***-***-4567");
        assert_eq!(mask_phone("15551234567"), "1-***-***-4567");
        assert_eq!(mask_phone("25551234567"), "***-4567");
        assert_eq!(mask_phone("123"), "***-123");
        assert_eq!(mask_phone("1234"), "***-1234");
        assert_eq!(mask_phone(""), "");
    }

    #[test]
    fn test_digits_only_strips_formatting() {
        assert_eq!(digits_only("+1 (555) 123-4567"), "15551234567");
        assert_eq!(digits_only("no digits"), "");
    }

    #[tokio::test]
    async fn test_submit_normalizes_and_assigns_ids() {
        let (store, mut rx) = store_with_client().await;

        let first = store.submit("  memes ", "", " note ").await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.board, "memes");
        assert_eq!(first.note, "note");
        assert_eq!(first.masked_phone, "");
        assert_eq!(first.status, RequestStatus::Pending);

        let second = store.submit("", "555-123-4567", "").await.unwrap();
        assert_eq!(second.id, 2);
        assert_eq!(second.phone, "5551234567");
        assert_eq!(second.masked_phone, "***-***-4567");

        // Submissions are not shown on displays
        assert!(rx.try_recv().is_err());
        assert_eq!(store.list_pending().await.len(), 2);
    }

    #[tokio::test]
    async fn test_submit_requires_board_or_phone() {
        let (store, _rx) = store_with_client().await;

        let err = store.submit("   ", "call me", "hello").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.snapshot().await, RequestSnapshot::default());
    }

    #[tokio::test]
    async fn test_approve_broadcasts_masked_phone_only() {
        let (store, mut rx) = store_with_client().await;
        let item = store.submit("", "555-123-4567", "").await.unwrap();

        let approved = store.approve(item.id).await.unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);

        let frame = rx.try_recv().unwrap();
        assert!(!frame.contains("5551234567"));
        let event: OverlayEvent = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            event,
            OverlayEvent::RequestAdd {
                id: item.id,
                board: String::new(),
                masked_phone: "***-***-4567".to_string(),
                note: String::new(),
            }
        );

        assert!(store.list_pending().await.is_empty());
        assert_eq!(store.list_active().await, vec![approved]);
    }

    #[tokio::test]
    async fn test_approve_twice_is_not_found() {
        let (store, _rx) = store_with_client().await;
        let item = store.submit("board", "", "").await.unwrap();

        store.approve(item.id).await.unwrap();
        assert!(matches!(store.approve(item.id).await, Err(Error::NotFound(_))));
        assert!(matches!(store.reject(item.id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reject_keeps_history_without_broadcast() {
        let (store, mut rx) = store_with_client().await;
        let item = store.submit("board", "", "").await.unwrap();

        let rejected = store.reject(item.id).await.unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert!(rx.try_recv().is_err());

        assert!(store.list_pending().await.is_empty());
        assert!(store.list_active().await.is_empty());
        assert_eq!(store.get(item.id).await, Some(rejected.clone()));
        assert_eq!(store.snapshot().await.pending, vec![rejected]);

        // Terminal
        assert!(matches!(store.approve(item.id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_complete_removes_and_second_complete_fails() {
        let (store, mut rx) = store_with_client().await;
        let item = store.submit("board", "", "").await.unwrap();
        store.approve(item.id).await.unwrap();
        rx.try_recv().unwrap();

        let done = store.complete(item.id).await.unwrap();
        assert_eq!(done.status, RequestStatus::Completed);
        assert!(store.list_active().await.is_empty());

        let event: OverlayEvent = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(event, OverlayEvent::RequestRemove { id: item.id });

        assert!(matches!(store.complete(item.id).await, Err(Error::NotFound(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_complete_requires_active() {
        let (store, _rx) = store_with_client().await;
        let item = store.submit("board", "", "").await.unwrap();
        assert!(matches!(store.complete(item.id).await, Err(Error::NotFound(_))));
        assert!(matches!(store.complete(999).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_state_restores_counter() {
        let (store, _rx) = store_with_client().await;
        let mut active = store.submit("a", "", "").await.unwrap();
        active.status = RequestStatus::Approved;

        let restored = RequestSnapshot {
            pending: vec![],
            active: vec![active.clone()],
            seq: 41,
        };
        store.set_state(restored.clone()).await;
        assert_eq!(store.snapshot().await, restored);

        let next = store.submit("b", "", "").await.unwrap();
        assert_eq!(next.id, 42);
    }
}
