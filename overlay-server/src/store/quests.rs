//! Quest progress store
//!
//! Active quests are instances derived from catalog definitions, keyed by the
//! catalog quest id. Progress is bounded by the target at all times.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use overlay_common::models::{clamp_target, QuestDef, QuestState};
use overlay_common::{Error, OverlayEvent, Result};
use tokio::sync::Mutex;
use tracing::info;

use crate::hub::Hub;

/// Active quest instances
pub struct QuestStore {
    active: Mutex<BTreeMap<String, QuestState>>,
    revision: AtomicU64,
    hub: Arc<Hub>,
}

impl QuestStore {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self {
            active: Mutex::new(BTreeMap::new()),
            revision: AtomicU64::new(0),
            hub,
        }
    }

    /// Create or refresh the active instance for a catalog quest
    ///
    /// An existing instance keeps its progress; display fields are replaced,
    /// the target only when the new one is positive, and progress is clamped
    /// down if the target shrank below it.
    pub async fn upsert(&self, def: &QuestDef) -> QuestState {
        let state = {
            let mut active = self.active.lock().await;
            let state = match active.get_mut(&def.id) {
                Some(qs) => {
                    qs.name = def.name.clone();
                    qs.icon_url = def.icon_url.clone();
                    qs.price_cents = def.price_cents;
                    if let Some(target) = clamp_target(def.target) {
                        qs.target = target;
                    }
                    qs.progress = qs.progress.min(qs.target);
                    qs.clone()
                }
                None => {
                    let qs = QuestState::from_def(def);
                    info!("Quest {} activated (target {})", qs.id, qs.target);
                    active.insert(qs.id.clone(), qs.clone());
                    qs
                }
            };
            self.bump();
            state
        };

        self.hub.broadcast(&OverlayEvent::QuestUpsert(state.clone())).await;
        state
    }

    /// Advance progress by one, saturating at the target
    pub async fn increment(&self, id: &str) -> Result<QuestState> {
        let state = self
            .update(id, |qs| {
                if !qs.is_complete() {
                    qs.progress += 1;
                }
            })
            .await?;
        if state.is_complete() {
            info!("Quest {} complete ({}/{})", state.id, state.progress, state.target);
        }
        Ok(state)
    }

    /// Set progress back to zero
    pub async fn reset(&self, id: &str) -> Result<QuestState> {
        self.update(id, |qs| qs.progress = 0).await
    }

    /// Delete the active instance
    pub async fn remove(&self, id: &str) -> Result<()> {
        {
            let mut active = self.active.lock().await;
            if active.remove(id).is_none() {
                return Err(unknown_quest(id));
            }
            self.bump();
        }
        info!("Quest {} removed", id);

        self.hub
            .broadcast(&OverlayEvent::QuestRemove { id: id.to_string() })
            .await;
        Ok(())
    }

    /// Copy of all active instances
    pub async fn list(&self) -> Vec<QuestState> {
        self.active.lock().await.values().cloned().collect()
    }

    /// Replace the whole store (snapshot load only; no broadcast)
    pub async fn set_state(&self, quests: Vec<QuestState>) {
        let mut active = self.active.lock().await;
        *active = quests
            .into_iter()
            .map(|mut qs| {
                qs.target = qs.target.max(1);
                qs.progress = qs.progress.min(qs.target);
                (qs.id.clone(), qs)
            })
            .collect();
        self.bump();
    }

    /// Mutation counter
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    async fn update<F>(&self, id: &str, mutate: F) -> Result<QuestState>
    where
        F: FnOnce(&mut QuestState),
    {
        let state = {
            let mut active = self.active.lock().await;
            let qs = active.get_mut(id).ok_or_else(|| unknown_quest(id))?;
            mutate(qs);
            self.bump();
            qs.clone()
        };

        self.hub.broadcast(&OverlayEvent::QuestUpsert(state.clone())).await;
        Ok(state)
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}

fn unknown_quest(id: &str) -> Error {
    Error::NotFound(format!("unknown active quest id {:?}", id))
}
