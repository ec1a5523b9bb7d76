//! Snapshot persistence for the overlay stores
//!
//! The whole durable state is one pretty-printed JSON document. Saves write a
//! uniquely named temporary sibling file, sync it, then rename it over the
//! target, so a crash mid-save leaves the previous snapshot intact. Saves
//! through the gateway are serialized, so the file on disk always holds the
//! state collected by the last save to finish.
//!
//! Save policy: the explicit save endpoint, a periodic autosave that only
//! writes when some store's revision moved, and one final save on graceful
//! shutdown.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use overlay_common::models::{QuestState, RequestItem, TtsItem};
use overlay_common::time::now_unix;
use overlay_common::{Error, OverlayEvent, Result};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::hub::Hub;
use crate::store::{QuestStore, RequestSnapshot, RequestStore, TtsSnapshot, TtsStore};

/// On-disk snapshot document
///
/// Every field defaults so snapshots written by older builds still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub active_quests: Vec<QuestState>,
    pub requests_pending: Vec<RequestItem>,
    pub requests_active: Vec<RequestItem>,
    pub tts_queue: Vec<TtsItem>,
    pub req_seq: u64,
    pub tts_seq: u64,
    pub saved_at_unix: i64,
}

/// Coordinates snapshots across all stores
pub struct PersistenceGateway {
    path: PathBuf,
    quests: Arc<QuestStore>,
    requests: Arc<RequestStore>,
    tts: Arc<TtsStore>,
    hub: Arc<Hub>,
    /// Held across collect, write and rename
    save_lock: Mutex<()>,
    /// Summed store revision at the last successful save or load
    saved_revision: AtomicU64,
}

impl PersistenceGateway {
    pub fn new(
        path: impl Into<PathBuf>,
        quests: Arc<QuestStore>,
        requests: Arc<RequestStore>,
        tts: Arc<TtsStore>,
        hub: Arc<Hub>,
    ) -> Self {
        Self {
            path: path.into(),
            quests,
            requests,
            tts,
            hub,
            save_lock: Mutex::new(()),
            saved_revision: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Collect a snapshot, taking each store's lock in turn
    pub async fn collect(&self) -> Snapshot {
        let active_quests = self.quests.list().await;
        let RequestSnapshot {
            pending,
            active,
            seq: req_seq,
        } = self.requests.snapshot().await;
        let TtsSnapshot {
            queue,
            seq: tts_seq,
        } = self.tts.snapshot().await;

        Snapshot {
            active_quests,
            requests_pending: pending,
            requests_active: active,
            tts_queue: queue,
            req_seq,
            tts_seq,
            saved_at_unix: now_unix(),
        }
    }

    /// Write the current state to disk
    ///
    /// Failures are logged here and returned so the explicit save endpoint can
    /// report them; the periodic and shutdown saves ignore the result.
    pub async fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let revision = self.total_revision();
        let snapshot = self.collect().await;

        match write_snapshot(&self.path, &snapshot).await {
            Ok(()) => {
                self.saved_revision.store(revision, Ordering::Release);
                info!(
                    "State saved to {} ({} quests, {} pending requests, {} active requests, \
                     {} tts items)",
                    self.path.display(),
                    snapshot.active_quests.len(),
                    snapshot.requests_pending.len(),
                    snapshot.requests_active.len(),
                    snapshot.tts_queue.len()
                );
                Ok(())
            }
            Err(e) => {
                warn!("Failed to save state to {}: {}", self.path.display(), e);
                Err(e)
            }
        }
    }

    /// Save only when some store changed since the last save
    ///
    /// Returns true when a save was attempted.
    pub async fn save_if_changed(&self) -> bool {
        if self.total_revision() == self.saved_revision.load(Ordering::Acquire) {
            debug!("State unchanged, skipping autosave");
            return false;
        }
        let _ = self.save().await;
        true
    }

    /// Restore all stores from disk
    ///
    /// Ok(false) when there is no snapshot yet. A corrupt snapshot is a
    /// persistence error and leaves the stores untouched.
    pub async fn load(&self) -> Result<bool> {
        let Some(snapshot) = read_snapshot(&self.path).await? else {
            info!("No saved state at {}, starting empty", self.path.display());
            return Ok(false);
        };

        let quest_count = snapshot.active_quests.len();
        let request_count = snapshot.requests_pending.len() + snapshot.requests_active.len();
        let tts_count = snapshot.tts_queue.len();

        self.quests.set_state(snapshot.active_quests).await;
        self.requests
            .set_state(RequestSnapshot {
                pending: snapshot.requests_pending,
                active: snapshot.requests_active,
                seq: snapshot.req_seq,
            })
            .await;
        self.tts
            .set_state(TtsSnapshot {
                queue: snapshot.tts_queue,
                seq: snapshot.tts_seq,
            })
            .await;
        self.saved_revision
            .store(self.total_revision(), Ordering::Release);

        info!(
            "State loaded from {} ({} quests, {} requests, {} tts items)",
            self.path.display(),
            quest_count,
            request_count,
            tts_count
        );
        Ok(true)
    }

    /// Re-send current visible state to every display client
    ///
    /// Broadcasts QUEST_UPSERT for each active quest and REQUEST_ADD for each
    /// active request. Storage is not touched. Returns the number of events
    /// sent.
    pub async fn rehydrate(&self) -> usize {
        let quests = self.quests.list().await;
        let requests = self.requests.list_active().await;

        for quest in &quests {
            self.hub
                .broadcast(&OverlayEvent::QuestUpsert(quest.clone()))
                .await;
        }
        for item in &requests {
            self.hub.broadcast(&OverlayEvent::request_add(item)).await;
        }

        let sent = quests.len() + requests.len();
        info!("Rehydrated displays with {} events", sent);
        sent
    }

    /// Sum of all store revision counters
    pub fn total_revision(&self) -> u64 {
        self.quests.revision() + self.requests.revision() + self.tts.revision()
    }

    /// Start the periodic autosave task
    pub fn spawn_autosave(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        info!("Autosave every {:?}", period);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.save_if_changed().await;
            }
        })
    }
}

/// Serialize and durably replace the snapshot file
pub async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    write_json_atomic(path, snapshot).await
}

/// Write `value` as pretty JSON and rename it over `path`
///
/// Every call writes its own temporary sibling, so concurrent writers never
/// share a partially written file.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        Error::Persistence(format!("Failed to serialize {}: {}", path.display(), e))
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = tmp_path(path);
    let written = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await
    }
    .await;
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Error::Persistence(format!(
            "Failed to replace {}: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

/// Read a snapshot file; Ok(None) if it does not exist
pub async fn read_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&contents).map(Some).map_err(|e| {
        Error::Persistence(format!("Corrupt snapshot {}: {}", path.display(), e))
    })
}

static NEXT_TMP_ID: AtomicU64 = AtomicU64::new(0);

/// `<dir>/<name>.<pid>.<n>.tmp`, unique per call within the process
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state.json".into());
    let n = NEXT_TMP_ID.fetch_add(1, Ordering::Relaxed);
    name.push(format!(".{}.{}.tmp", std::process::id(), n));
    path.with_file_name(name)
}
