//! Domain models shared between the stores, the persistence snapshot and the API
//!
//! Field names match the JSON wire/snapshot format (snake_case).

use serde::{Deserialize, Serialize};

// ============================================================================
// Catalog Definitions
// ============================================================================

/// Quest definition as loaded from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub icon_url: String,
    /// Number of completions required; values <= 0 are treated as 1
    #[serde(default)]
    pub target: i64,
}

/// Sound ability definition as loaded from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub sfx_url: String,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub cooldown_ms: u64,
    #[serde(default)]
    pub volume: f64,
}

// ============================================================================
// Quest Progress
// ============================================================================

/// Progress of one active quest
///
/// Invariant: `1 <= target` and `progress <= target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestState {
    pub id: String,
    pub name: String,
    pub target: u32,
    pub progress: u32,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub price_cents: i64,
}

impl QuestState {
    /// Fresh instance with zero progress
    pub fn from_def(def: &QuestDef) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone(),
            target: clamp_target(def.target).unwrap_or(1),
            progress: 0,
            icon_url: def.icon_url.clone(),
            price_cents: def.price_cents,
        }
    }

    /// True once progress has reached the target
    pub fn is_complete(&self) -> bool {
        self.progress >= self.target
    }
}

/// Positive catalog target narrowed to `u32`, or None when not positive
pub fn clamp_target(target: i64) -> Option<u32> {
    if target > 0 {
        Some(u32::try_from(target).unwrap_or(u32::MAX))
    } else {
        None
    }
}

// ============================================================================
// Call / Board Requests
// ============================================================================

/// Moderation status of a call/board request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

/// A viewer-submitted call/board request
///
/// `phone` holds the full digits for the moderator panel and the snapshot;
/// display clients only ever receive `masked_phone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestItem {
    pub id: u64,
    pub board: String,
    pub phone: String,
    pub masked_phone: String,
    pub note: String,
    pub status: RequestStatus,
    pub created_unix: i64,
}

// ============================================================================
// Spoken-Text (TTS) Items
// ============================================================================

/// Moderation status of a spoken-text item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsStatus {
    Pending,
    Approved,
    Rejected,
    Spoken,
}

/// A viewer-submitted spoken-text item, optionally attached to a donation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtsItem {
    pub id: u64,
    pub text: String,
    #[serde(default)]
    pub voice: String,
    #[serde(default)]
    pub donor: String,
    #[serde(default)]
    pub amount_cents: i64,
    #[serde(default)]
    pub msg: String,
    pub created_unix: i64,
    pub status: TtsStatus,
}

impl TtsItem {
    /// Whether approval should also raise a donation toast
    pub fn has_donation(&self) -> bool {
        !self.donor.is_empty() || self.amount_cents > 0 || !self.msg.is_empty()
    }
}
