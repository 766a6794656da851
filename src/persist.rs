//! Versioned persistence: the transactional save document, the additive
//! migration ladder, one-time legacy import, and offline settlement.
//!
//! Storage failures never crash the tick loop: saves log and no-op, loads
//! log and fall back to a fresh document.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::constants::{OFFLINE_EXP_DENOM, OFFLINE_EXP_NUMER, OFFLINE_MIN_GAP_SECS};
use crate::events::EventHistory;
use crate::market::MarketListing;
use crate::state::{Inventory, PlayerState};

/// Current save schema. Bump when a migration is added to the ladder.
pub const SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("save data failed to parse: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Everything saved and loaded as one transactional unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveDocument {
    pub schema_version: u32,
    #[serde(default)]
    pub catalog_version: u64,
    #[serde(default)]
    pub player: PlayerState,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub market: Vec<MarketListing>,
    #[serde(default)]
    pub event_history: EventHistory,
}

impl Default for SaveDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            catalog_version: 0,
            player: PlayerState::default(),
            inventory: Inventory::new(),
            market: Vec::new(),
            event_history: EventHistory::new(),
        }
    }
}

/// Storage seam. Platform backends implement raw document access; all
/// schema knowledge stays in this module.
pub trait SaveStorage {
    /// Read the serialized save document, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be read.
    fn read(&self) -> Result<Option<String>, PersistError>;

    /// Replace the serialized save document atomically.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be written.
    fn write(&self, document: &str) -> Result<(), PersistError>;

    /// Read the legacy flat-file snapshot and archive it so it is never
    /// imported twice. `None` when no legacy file exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the legacy file cannot be read or archived.
    fn take_legacy(&self) -> Result<Option<String>, PersistError>;
}

/// File-backed storage with atomic replace (temp file + rename) and
/// rename-to-archive legacy handling.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    legacy_path: Option<PathBuf>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            legacy_path: None,
        }
    }

    #[must_use]
    pub fn with_legacy(mut self, legacy_path: PathBuf) -> Self {
        self.legacy_path = Some(legacy_path);
        self
    }
}

impl SaveStorage for FileStorage {
    fn read(&self) -> Result<Option<String>, PersistError> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.path)?))
    }

    fn write(&self, document: &str) -> Result<(), PersistError> {
        let mut tmp = self.path.clone();
        tmp.set_extension("tmp");
        fs::write(&tmp, document)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn take_legacy(&self) -> Result<Option<String>, PersistError> {
        let Some(legacy) = self.legacy_path.as_ref() else {
            return Ok(None);
        };
        if !legacy.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(legacy)?;
        let mut archived = legacy.clone();
        archived.set_extension("imported");
        fs::rename(legacy, &archived)?;
        info!("legacy save archived to {}", archived.display());
        Ok(Some(contents))
    }
}

/// In-memory storage double for tests and headless harnesses.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    document: RefCell<Option<String>>,
    legacy: RefCell<Option<String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_legacy(legacy: &str) -> Self {
        Self {
            document: RefCell::new(None),
            legacy: RefCell::new(Some(legacy.to_string())),
        }
    }

    #[must_use]
    pub fn with_document(document: &str) -> Self {
        Self {
            document: RefCell::new(Some(document.to_string())),
            legacy: RefCell::new(None),
        }
    }

    #[must_use]
    pub fn document(&self) -> Option<String> {
        self.document.borrow().clone()
    }

    #[must_use]
    pub fn legacy_pending(&self) -> bool {
        self.legacy.borrow().is_some()
    }
}

impl SaveStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, PersistError> {
        Ok(self.document.borrow().clone())
    }

    fn write(&self, document: &str) -> Result<(), PersistError> {
        *self.document.borrow_mut() = Some(document.to_string());
        Ok(())
    }

    fn take_legacy(&self) -> Result<Option<String>, PersistError> {
        Ok(self.legacy.borrow_mut().take())
    }
}

// Migration ladder ----------------------------------------------------------

struct Migration {
    version: u32,
    apply: fn(&mut serde_json::Map<String, Value>),
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 2,
        apply: migrate_to_v2,
    },
    Migration {
        version: 3,
        apply: migrate_to_v3,
    },
];

fn ensure_field(map: &mut serde_json::Map<String, Value>, key: &str, default: Value) {
    map.entry(key.to_string()).or_insert(default);
}

fn player_map(root: &mut serde_json::Map<String, Value>) -> &mut serde_json::Map<String, Value> {
    let player = root
        .entry("player".to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if !player.is_object() {
        *player = Value::Object(serde_json::Map::new());
    }
    player.as_object_mut().expect("player field is an object")
}

/// v2 introduced stats, talents and the rebirth counters.
fn migrate_to_v2(root: &mut serde_json::Map<String, Value>) {
    let player = player_map(root);
    ensure_field(player, "body", Value::from(10));
    ensure_field(player, "mind", Value::from(0));
    ensure_field(player, "luck", Value::from(0));
    ensure_field(
        player,
        "talents",
        serde_json::json!({ "points": 0, "levels": {} }),
    );
    ensure_field(player, "death_count", Value::from(0));
    ensure_field(player, "legacy_points", Value::from(0));
    ensure_field(player, "equipped_title", Value::Null);
    ensure_field(player, "daily_reward_claimed", Value::Null);
}

/// v3 introduced the market snapshot, event history and catalog stamp.
fn migrate_to_v3(root: &mut serde_json::Map<String, Value>) {
    ensure_field(root, "market", Value::Array(Vec::new()));
    ensure_field(root, "event_history", Value::Array(Vec::new()));
    ensure_field(root, "catalog_version", Value::from(0));
    let player = player_map(root);
    ensure_field(player, "last_market_refresh", Value::from(0));
}

/// Apply every migration newer than the stored version. Additive and
/// idempotent; existing fields are never overwritten or dropped.
pub fn apply_migrations(value: &mut Value) -> u32 {
    let Some(root) = value.as_object_mut() else {
        return 0;
    };
    let stored = root
        .get("schema_version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(1);
    let mut applied = 0;
    for migration in MIGRATIONS {
        if migration.version > stored {
            (migration.apply)(root);
            applied += 1;
        }
    }
    root.insert("schema_version".to_string(), Value::from(SCHEMA_VERSION));
    applied
}

// Legacy import -------------------------------------------------------------

/// The flat key/value snapshot written by the old single-file format.
#[derive(Debug, Clone, Default, Deserialize)]
struct LegacySnapshot {
    #[serde(default)]
    exp: i64,
    #[serde(default)]
    layer_index: usize,
    #[serde(default)]
    money: i64,
    #[serde(default)]
    inventory: BTreeMap<String, u32>,
    #[serde(default)]
    last_save_time: f64,
}

fn document_from_legacy(json: &str) -> Result<Value, PersistError> {
    let snapshot: LegacySnapshot = serde_json::from_str(json)?;
    #[allow(clippy::cast_possible_truncation)]
    let last_save_time = snapshot.last_save_time as i64;
    Ok(serde_json::json!({
        "schema_version": 1,
        "player": {
            "layer_index": snapshot.layer_index,
            "exp": snapshot.exp,
            "money": snapshot.money,
            "last_save_time": last_save_time,
        },
        "inventory": snapshot.inventory,
    }))
}

// Load / save ---------------------------------------------------------------

/// What `load` did on the way in, for UI reporting.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub document: SaveDocument,
    pub migrated: bool,
    pub imported_legacy: bool,
    /// Experience granted by offline settlement (already applied).
    pub offline_exp: i64,
    pub catalog_reseeded: bool,
}

/// Load the save document, running legacy import, the migration ladder,
/// the catalog reseed guard and offline settlement. Never fails: any
/// storage or parse error logs and falls back to a fresh document.
pub fn load<S: SaveStorage>(storage: &S, catalog: &Catalog, now: i64) -> LoadSummary {
    let mut imported_legacy = false;
    let raw = match storage.read() {
        Ok(raw) => raw,
        Err(err) => {
            error!("save read failed, starting fresh: {err}");
            None
        }
    };
    let raw_value: Option<Value> = match raw {
        Some(text) => match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                error!("save document corrupt, starting fresh: {err}");
                None
            }
        },
        None => match storage.take_legacy() {
            Ok(Some(text)) => match document_from_legacy(&text) {
                Ok(value) => {
                    info!("imported legacy flat-file save");
                    imported_legacy = true;
                    Some(value)
                }
                Err(err) => {
                    warn!("legacy save unreadable, ignoring: {err}");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!("legacy save probe failed: {err}");
                None
            }
        },
    };

    let (mut document, migrated) = match raw_value {
        Some(mut value) => {
            let applied = apply_migrations(&mut value);
            match serde_json::from_value::<SaveDocument>(value) {
                Ok(document) => (document, applied > 0),
                Err(err) => {
                    error!("migrated save failed to decode, starting fresh: {err}");
                    (SaveDocument::default(), false)
                }
            }
        }
        None => (SaveDocument::default(), false),
    };

    let mut catalog_reseeded = false;
    if document.catalog_version != catalog.version() {
        let before = document.inventory.iter().count();
        document.inventory.retain_known(|id| catalog.contains(id));
        let dropped = before - document.inventory.iter().count();
        if dropped > 0 {
            info!("catalog changed; pruned {dropped} unknown inventory entries");
        }
        document.catalog_version = catalog.version();
        catalog_reseeded = true;
    }

    let offline_exp = settle_offline(&mut document.player, now);
    if offline_exp > 0 {
        info!("offline settlement granted {offline_exp} exp");
    }

    LoadSummary {
        document,
        migrated,
        imported_legacy,
        offline_exp,
        catalog_reseeded,
    }
}

/// Grant idle-equivalent experience for time spent away. Gaps of a minute
/// or less are ignored.
fn settle_offline(player: &mut PlayerState, now: i64) -> i64 {
    if player.last_save_time <= 0 {
        return 0;
    }
    let gap = now - player.last_save_time;
    if gap <= OFFLINE_MIN_GAP_SECS {
        return 0;
    }
    let nominal = gap.saturating_mul(OFFLINE_EXP_NUMER) / OFFLINE_EXP_DENOM;
    player.gain_exp(nominal)
}

/// Persist the document as one unit. Zero-count inventory entries are
/// pruned and the save timestamp is stamped before writing. Returns false
/// (after logging) when storage fails; in-memory state is untouched.
pub fn save<S: SaveStorage>(storage: &S, document: &mut SaveDocument, now: i64) -> bool {
    document.inventory.prune_zeroes();
    document.player.last_save_time = now;
    document.schema_version = SCHEMA_VERSION;
    let serialized = match serde_json::to_string(document) {
        Ok(serialized) => serialized,
        Err(err) => {
            error!("save serialization failed: {err}");
            return false;
        }
    };
    match storage.write(&serialized) {
        Ok(()) => true,
        Err(err) => {
            error!("save write failed, keeping in-memory state: {err}");
            false
        }
    }
}

/// Wall-clock seconds since the unix epoch.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(0))
}
