//! Outbound display events
//!
//! Every message sent to display clients is one variant of [`OverlayEvent`].
//! The serde representation is the wire envelope itself:
//!
//! ```json
//! {"type": "QUEST_REMOVE", "data": {"id": "call-maam"}}
//! ```
//!
//! Events are immutable once constructed and are never persisted.

use serde::{Deserialize, Serialize};

use crate::models::{AbilityDef, QuestState, RequestItem, TtsItem};
use crate::Result;

/// Overlay event types
///
/// Closed set of message kinds understood by display clients. Adding a kind
/// means adding a variant here, so every `match` over events is checked at
/// build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlayEvent {
    /// Quest created or its progress/display fields changed
    QuestUpsert(QuestState),

    /// Quest removed from the overlay
    QuestRemove { id: String },

    /// Approved call/board request, masked for display
    ///
    /// Never carries the full phone digits.
    RequestAdd {
        id: u64,
        board: String,
        masked_phone: String,
        note: String,
    },

    /// Call/board request finished
    RequestRemove { id: u64 },

    /// Donation toast
    Donation {
        donor: String,
        /// Amount in cents
        amount: i64,
        msg: String,
    },

    /// Speak text on the overlay
    TtsPlay { text: String, voice: String },

    /// Play a sound ability
    AbilityFire {
        id: String,
        name: String,
        sfx_url: String,
        price_cents: i64,
        cooldown_ms: u64,
        volume: f64,
    },
}

impl OverlayEvent {
    /// REQUEST_ADD for an approved request (masked phone only)
    pub fn request_add(item: &RequestItem) -> Self {
        OverlayEvent::RequestAdd {
            id: item.id,
            board: item.board.clone(),
            masked_phone: item.masked_phone.clone(),
            note: item.note.clone(),
        }
    }

    /// DONATION toast attached to a spoken-text item
    pub fn donation_for(item: &TtsItem) -> Self {
        OverlayEvent::Donation {
            donor: item.donor.clone(),
            amount: item.amount_cents,
            msg: item.msg.clone(),
        }
    }

    /// TTS_PLAY for a spoken-text item
    pub fn tts_play_for(item: &TtsItem) -> Self {
        OverlayEvent::TtsPlay {
            text: item.text.clone(),
            voice: item.voice.clone(),
        }
    }

    /// ABILITY_FIRE cue for a catalog ability
    pub fn ability_fire(ability: &AbilityDef) -> Self {
        OverlayEvent::AbilityFire {
            id: ability.id.clone(),
            name: ability.name.clone(),
            sfx_url: ability.sfx_url.clone(),
            price_cents: ability.price_cents,
            cooldown_ms: ability.cooldown_ms,
            volume: ability.volume,
        }
    }

    /// Get the wire tag for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            OverlayEvent::QuestUpsert(_) => "QUEST_UPSERT",
            OverlayEvent::QuestRemove { .. } => "QUEST_REMOVE",
            OverlayEvent::RequestAdd { .. } => "REQUEST_ADD",
            OverlayEvent::RequestRemove { .. } => "REQUEST_REMOVE",
            OverlayEvent::Donation { .. } => "DONATION",
            OverlayEvent::TtsPlay { .. } => "TTS_PLAY",
            OverlayEvent::AbilityFire { .. } => "ABILITY_FIRE",
        }
    }

    /// Encode into the JSON wire envelope
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
