//! Donation history ledger
//!
//! Every recorded donation is appended to a JSON array on disk. The file is
//! rewritten whole on each append through the same atomic write the state
//! snapshot uses. Existing entries are kept as raw JSON, so records written
//! by other tools survive untouched.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use overlay_common::time::now;
use overlay_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::persistence::write_json_atomic;

/// One donation as posted by the alert integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationRecord {
    #[serde(default = "now")]
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub donor: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub message: String,
}

/// Append-only donation file
pub struct DonationLedger {
    path: PathBuf,
    /// Serializes read-append-write cycles
    lock: Mutex<()>,
}

impl DonationLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record; returns the ledger length afterwards
    pub async fn record(&self, donation: &DonationRecord) -> Result<usize> {
        let _guard = self.lock.lock().await;

        let mut entries = self.read_entries().await?;
        entries.push(serde_json::to_value(donation)?);

        if let Err(e) = write_json_atomic(&self.path, &entries).await {
            warn!("Failed to record donation in {}: {}", self.path.display(), e);
            return Err(e);
        }

        info!(
            "Donation recorded: {} gave {:.2} ({} total)",
            display_donor(&donation.donor),
            donation.amount,
            entries.len()
        );
        Ok(entries.len())
    }

    /// Current ledger contents; empty when the file does not exist yet
    pub async fn entries(&self) -> Result<Vec<Value>> {
        let _guard = self.lock.lock().await;
        self.read_entries().await
    }

    async fn read_entries(&self) -> Result<Vec<Value>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            Error::Persistence(format!(
                "Donation ledger {} is not a JSON array: {}",
                self.path.display(),
                e
            ))
        })
    }
}

fn display_donor(donor: &str) -> &str {
    if donor.trim().is_empty() {
        "anonymous"
    } else {
        donor
    }
}
