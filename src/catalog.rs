//! Static item and recipe catalog: loaded once, read-only afterwards.
//!
//! The backing data ships embedded in the crate as tiered JSON. Besides the
//! flat id index, the catalog keeps per-tier material/pill pools used by
//! weighted random selection in drops, events and the market.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hasher;
use thiserror::Error;
use twox_hash::XxHash64;

use crate::constants::MAX_TIER;

const BUILTIN_ITEMS_JSON: &str = include_str!("../data/items.json");

/// Broad behavioral tag for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Material,
    Consumable,
    Buff,
    Breakthrough,
}

impl ItemKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Material => "material",
            Self::Consumable => "consumable",
            Self::Buff => "buff",
            Self::Breakthrough => "breakthrough",
        }
    }
}

/// Structured effect descriptor attached to usable items. All deltas
/// default to zero so catalog entries only spell out what they change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemEffect {
    #[serde(default)]
    pub exp: i64,
    /// Signed mind delta; negative values soothe the heart-demon.
    #[serde(default)]
    pub mind: i32,
    #[serde(default)]
    pub body: i32,
    #[serde(default)]
    pub luck: i32,
    /// Fixed breakthrough rate granted by breakthrough pills.
    #[serde(default)]
    pub break_rate: Option<f64>,
}

/// Crafting recipe: consumed on attempt, result granted on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub ingredients: BTreeMap<String, u32>,
    #[serde(default = "default_craft_secs")]
    pub craft_secs: u32,
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
}

const fn default_craft_secs() -> u32 {
    10
}

const fn default_success_rate() -> f64 {
    0.8
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub tier: usize,
    pub price: i64,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub effect: Option<ItemEffect>,
    #[serde(default)]
    pub recipe: Option<Recipe>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TierGroup {
    #[serde(default)]
    materials: Vec<ItemDefinition>,
    #[serde(default)]
    pills: Vec<ItemDefinition>,
}

/// Per-tier id pools used for random selection.
#[derive(Debug, Clone, Default)]
pub struct TierPool {
    pub materials: Vec<String>,
    pub pills: Vec<String>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog data failed to parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog is empty after initialization")]
    Empty,
}

/// In-memory item/recipe index. Constructed once at startup and passed by
/// reference to the progression core, event engine and market.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: HashMap<String, ItemDefinition>,
    tiers: Vec<TierPool>,
    version: u64,
}

impl Catalog {
    /// Parse the tiered `{"tier_N": {"materials": [...], "pills": [...]}}`
    /// document.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] on malformed JSON and
    /// [`CatalogError::Empty`] when no items survive the load; an empty
    /// catalog is a startup-blocking condition.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let raw: BTreeMap<String, TierGroup> = serde_json::from_str(json)?;
        let mut items = HashMap::new();
        let mut tiers: Vec<TierPool> = (0..=MAX_TIER).map(|_| TierPool::default()).collect();

        for group in raw.values() {
            for item in group.materials.iter().chain(group.pills.iter()) {
                items.insert(item.id.clone(), item.clone());
            }
            for item in &group.materials {
                if let Some(pool) = tiers.get_mut(item.tier) {
                    pool.materials.push(item.id.clone());
                }
            }
            for item in &group.pills {
                if let Some(pool) = tiers.get_mut(item.tier) {
                    pool.pills.push(item.id.clone());
                }
            }
        }

        if items.is_empty() {
            return Err(CatalogError::Empty);
        }

        Ok(Self {
            items,
            tiers,
            version: content_version(json.as_bytes()),
        })
    }

    /// Load the catalog embedded in the crate.
    ///
    /// # Errors
    ///
    /// Propagates the same conditions as [`Catalog::from_json`].
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_ITEMS_JSON)
    }

    /// Look up an item definition. Unknown ids are a sentinel, not an error.
    #[must_use]
    pub fn get(&self, item_id: &str) -> Option<&ItemDefinition> {
        self.items.get(item_id)
    }

    /// Display name for an id, falling back to the id itself.
    #[must_use]
    pub fn name_of<'a>(&'a self, item_id: &'a str) -> &'a str {
        self.get(item_id).map_or(item_id, |item| item.name.as_str())
    }

    #[must_use]
    pub fn contains(&self, item_id: &str) -> bool {
        self.items.contains_key(item_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Material ids available at a tier.
    #[must_use]
    pub fn materials(&self, tier: usize) -> &[String] {
        self.tiers
            .get(tier)
            .map_or(&[] as &[String], |pool| pool.materials.as_slice())
    }

    /// Pill ids available at a tier.
    #[must_use]
    pub fn pills(&self, tier: usize) -> &[String] {
        self.tiers
            .get(tier)
            .map_or(&[] as &[String], |pool| pool.pills.as_slice())
    }

    /// Uniform choice among the tier's material ids, or `None` when the
    /// tier pool is empty.
    #[must_use]
    pub fn random_material<R: Rng>(&self, tier: usize, rng: &mut R) -> Option<&str> {
        let pool = self.materials(tier);
        if pool.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..pool.len());
        pool.get(idx).map(String::as_str)
    }

    /// Recipe producing the given item, if any.
    #[must_use]
    pub fn recipe_for(&self, item_id: &str) -> Option<&Recipe> {
        self.get(item_id).and_then(|item| item.recipe.as_ref())
    }

    /// Content version of the loaded data. Stable across boots for
    /// unchanged data; used to gate catalog reseeding work on load.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }
}

fn content_version(bytes: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(bytes);
    hasher.finish()
}
