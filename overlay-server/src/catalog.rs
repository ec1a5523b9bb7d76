//! Ability and quest catalog
//!
//! Read-only definitions loaded from a JSON file of the form
//! `{"abilities": [...], "quests": [...]}`. Without a file the built-in
//! defaults apply. A file that fails to parse leaves the previously loaded
//! definitions in place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use overlay_common::models::{AbilityDef, QuestDef};
use overlay_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Lookup of catalog definitions by id
pub trait CatalogProvider: Send + Sync {
    fn quest(&self, id: &str) -> Option<QuestDef>;
    fn ability(&self, id: &str) -> Option<AbilityDef>;
    fn quests(&self) -> Vec<QuestDef>;
    fn abilities(&self) -> Vec<AbilityDef>;
}

/// Catalog file layout (also the `/api/catalog` response body)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub abilities: Vec<AbilityDef>,
    #[serde(default)]
    pub quests: Vec<QuestDef>,
}

#[derive(Debug, Default)]
struct Definitions {
    abilities: BTreeMap<String, AbilityDef>,
    quests: BTreeMap<String, QuestDef>,
}

impl Definitions {
    fn from_file(file: CatalogFile) -> Self {
        let abilities = file
            .abilities
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();
        let quests = file
            .quests
            .into_iter()
            .map(|mut q| {
                if q.target <= 0 {
                    q.target = 1;
                }
                (q.id.clone(), q)
            })
            .collect();
        Self { abilities, quests }
    }
}

/// File-backed catalog
pub struct Catalog {
    path: PathBuf,
    defs: RwLock<Definitions>,
}

impl Catalog {
    /// Catalog holding only the built-in defaults, bound to `path` for reloads
    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            defs: RwLock::new(Definitions::from_file(default_catalog())),
        }
    }

    /// Load the catalog file at `path`
    ///
    /// A parse failure is logged and the built-in defaults are kept.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let catalog = Self::with_defaults(path);
        if let Err(e) = catalog.reload() {
            warn!("{}", e);
        }
        catalog
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the catalog file
    ///
    /// Missing file: built-in defaults. Parse error: previous definitions are
    /// kept and the error returned.
    pub fn reload(&self) -> Result<()> {
        let file = match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str::<CatalogFile>(&contents).map_err(|e| {
                Error::Config(format!(
                    "Catalog {} parse error, keeping previous definitions: {}",
                    self.path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Catalog {} not found; using built-in defaults",
                    self.path.display()
                );
                default_catalog()
            }
            Err(e) => return Err(e.into()),
        };

        let defs = Definitions::from_file(file);
        info!(
            "Catalog loaded: {} abilities, {} quests",
            defs.abilities.len(),
            defs.quests.len()
        );
        *self.defs.write().unwrap_or_else(|e| e.into_inner()) = defs;
        Ok(())
    }

    /// Current definitions in file layout
    pub fn to_file(&self) -> CatalogFile {
        CatalogFile {
            abilities: self.abilities(),
            quests: self.quests(),
        }
    }
}

impl CatalogProvider for Catalog {
    fn quest(&self, id: &str) -> Option<QuestDef> {
        let defs = self.defs.read().unwrap_or_else(|e| e.into_inner());
        defs.quests.get(id).cloned()
    }

    fn ability(&self, id: &str) -> Option<AbilityDef> {
        let defs = self.defs.read().unwrap_or_else(|e| e.into_inner());
        defs.abilities.get(id).cloned()
    }

    fn quests(&self) -> Vec<QuestDef> {
        let defs = self.defs.read().unwrap_or_else(|e| e.into_inner());
        defs.quests.values().cloned().collect()
    }

    fn abilities(&self) -> Vec<AbilityDef> {
        let defs = self.defs.read().unwrap_or_else(|e| e.into_inner());
        defs.abilities.values().cloned().collect()
    }
}

const TREX_SFX_URL: &str =
    "https://interactive-examples.mdn.mozilla.net/media/cc0-audio/t-rex-roar.mp3";

/// Built-in definitions used when no catalog file exists
pub fn default_catalog() -> CatalogFile {
    CatalogFile {
        abilities: vec![
            AbilityDef {
                id: "trex".to_string(),
                name: "T-Rex Roar".to_string(),
                price_cents: 300,
                sfx_url: TREX_SFX_URL.to_string(),
                icon_url: String::new(),
                cooldown_ms: 3000,
                volume: 0.7,
            },
            AbilityDef {
                id: "goat".to_string(),
                name: "Goat Noises".to_string(),
                price_cents: 200,
                sfx_url: "https://www.soundjay.com/buttons/sounds/button-3.mp3".to_string(),
                icon_url: String::new(),
                cooldown_ms: 2500,
                volume: 0.8,
            },
        ],
        quests: vec![
            QuestDef {
                id: "call-maam".to_string(),
                name: "Call a man \"ma'am\"".to_string(),
                price_cents: 499,
                icon_url: String::new(),
                target: 1,
            },
            QuestDef {
                id: "soundboard-5x".to_string(),
                name: "Make 5 calls with X soundboard".to_string(),
                price_cents: 399,
                icon_url: String::new(),
                target: 5,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::load(dir.path().join("catalog.json"));

        let trex = catalog.ability("trex").unwrap();
        assert_eq!(trex.price_cents, 300);
        assert_eq!(trex.cooldown_ms, 3000);
        assert_eq!(catalog.quest("soundboard-5x").unwrap().target, 5);
        assert_eq!(catalog.quest("call-maam").unwrap().price_cents, 499);
        assert!(catalog.quest("nope").is_none());
    }

    #[test]
    fn test_file_replaces_defaults_and_normalizes_target() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{"abilities":[{"id":"horn","name":"Air Horn","price_cents":100}],
                "quests":[{"id":"dance","name":"Dance","target":0}]}"#,
        )
        .unwrap();

        let catalog = Catalog::load(&path);
        assert!(catalog.ability("trex").is_none());
        assert_eq!(catalog.ability("horn").unwrap().name, "Air Horn");
        assert_eq!(catalog.quest("dance").unwrap().target, 1);
        assert_eq!(catalog.to_file().quests.len(), 1);
    }

    #[test]
    fn test_parse_error_keeps_previous_definitions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, r#"{"quests":[{"id":"dance","name":"Dance","target":3}]}"#).unwrap();
        let catalog = Catalog::load(&path);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(catalog.reload(), Err(Error::Config(_))));
        assert_eq!(catalog.quest("dance").unwrap().target, 3);
    }

    #[test]
    fn test_corrupt_file_at_startup_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{\"abilities\": 5").unwrap();

        let catalog = Catalog::load(&path);
        assert!(catalog.ability("goat").is_some());
    }
}
