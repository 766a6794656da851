use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    APM_SPLIT, ASCENSION_LAYER, BODY_DEFAULT, EXP_TABLE, LAYER_NAMES, LUCK_MAX, MIND_MAX,
};

/// Discrete activity state derived from the two smoothed action rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivityState {
    #[default]
    Idle,
    Work,
    Read,
    Combat,
}

impl ActivityState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Work => "work",
            Self::Read => "read",
            Self::Combat => "combat",
        }
    }

    /// Classify a keyboard/mouse APM pair against the fixed split point.
    #[must_use]
    pub fn from_rates(kb_apm: f32, mouse_apm: f32) -> Self {
        let kb_high = kb_apm >= APM_SPLIT;
        let mouse_high = mouse_apm >= APM_SPLIT;
        match (kb_high, mouse_high) {
            (false, false) => Self::Idle,
            (true, false) => Self::Work,
            (false, true) => Self::Read,
            (true, true) => Self::Combat,
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "work" => Ok(Self::Work),
            "read" => Ok(Self::Read),
            "combat" => Ok(Self::Combat),
            _ => Err(()),
        }
    }
}

/// Item counts keyed by catalog id. Counts never go negative; zero-count
/// entries are pruned before persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    entries: BTreeMap<String, u32>,
}

impl Inventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn count(&self, item_id: &str) -> u32 {
        self.entries.get(item_id).copied().unwrap_or(0)
    }

    pub fn add(&mut self, item_id: &str, count: u32) {
        if count == 0 {
            return;
        }
        let entry = self.entries.entry(item_id.to_string()).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    /// Remove up to `count` of an item. Returns false (and removes nothing)
    /// when the held count is insufficient.
    pub fn remove(&mut self, item_id: &str, count: u32) -> bool {
        let Some(entry) = self.entries.get_mut(item_id) else {
            return false;
        };
        if *entry < count {
            return false;
        }
        *entry -= count;
        if *entry == 0 {
            self.entries.remove(item_id);
        }
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn prune_zeroes(&mut self) {
        self.entries.retain(|_, count| *count > 0);
    }

    /// Drop entries whose ids the catalog no longer defines.
    pub fn retain_known<F: Fn(&str) -> bool>(&mut self, is_known: F) {
        self.entries.retain(|id, _| is_known(id));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(id, count)| (id.as_str(), *count))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Talent point pool and invested levels. Reincarnation accounting treats
/// spent + unspent as the conserved total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalentState {
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub levels: BTreeMap<String, u32>,
}

impl TalentState {
    #[must_use]
    pub fn level(&self, key: &str) -> u32 {
        self.levels.get(key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn invested(&self) -> u32 {
        self.levels.values().sum()
    }

    /// Spent plus unspent points.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.points.saturating_add(self.invested())
    }

    pub fn clear_levels(&mut self) {
        self.levels.clear();
    }
}

/// The single persistent character row. Mutated only by the progression
/// core; reset wholesale by reincarnation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(default)]
    pub layer_index: usize,
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub money: i64,
    #[serde(default = "default_body")]
    pub body: i32,
    #[serde(default)]
    pub mind: i32,
    #[serde(default)]
    pub luck: i32,
    #[serde(default)]
    pub talents: TalentState,
    #[serde(default)]
    pub equipped_title: Option<String>,
    #[serde(default)]
    pub death_count: u32,
    #[serde(default)]
    pub legacy_points: u32,
    #[serde(default)]
    pub last_save_time: i64,
    #[serde(default)]
    pub last_market_refresh: i64,
    #[serde(default)]
    pub daily_reward_claimed: Option<String>,
}

const fn default_body() -> i32 {
    BODY_DEFAULT
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            layer_index: 0,
            exp: 0,
            money: 0,
            body: BODY_DEFAULT,
            mind: 0,
            luck: 0,
            talents: TalentState::default(),
            equipped_title: None,
            death_count: 0,
            legacy_points: 0,
            last_save_time: 0,
            last_market_refresh: 0,
            daily_reward_claimed: None,
        }
    }
}

impl PlayerState {
    /// Display name of the current layer.
    #[must_use]
    pub fn layer_name(&self) -> &'static str {
        LAYER_NAMES
            .get(self.layer_index)
            .copied()
            .unwrap_or(LAYER_NAMES[ASCENSION_LAYER])
    }

    /// Experience cap of the current layer, or `None` at the terminal layer.
    #[must_use]
    pub fn exp_cap(&self) -> Option<i64> {
        EXP_TABLE.get(self.layer_index).copied()
    }

    #[must_use]
    pub fn is_ascended(&self) -> bool {
        self.layer_index >= ASCENSION_LAYER
    }

    /// Accrue experience, clamped at the current layer cap. Never promotes.
    /// Returns the amount actually applied.
    pub fn gain_exp(&mut self, amount: i64) -> i64 {
        let Some(cap) = self.exp_cap() else {
            return 0;
        };
        if amount <= 0 {
            let floored = (self.exp + amount).max(0);
            let applied = floored - self.exp;
            self.exp = floored;
            return applied;
        }
        let headroom = cap - self.exp;
        let applied = amount.min(headroom).max(0);
        self.exp += applied;
        applied
    }

    /// True when the layer cap is filled and a breakthrough may be attempted.
    #[must_use]
    pub fn can_breakthrough(&self) -> bool {
        match self.exp_cap() {
            Some(cap) => self.exp >= cap,
            None => false,
        }
    }

    pub fn adjust_money(&mut self, delta: i64) {
        self.money = (self.money + delta).max(0);
    }

    pub fn adjust_mind(&mut self, delta: i32) {
        self.mind = (self.mind + delta).clamp(0, MIND_MAX);
    }

    pub fn adjust_body(&mut self, delta: i32) {
        // Body floors at 1 for ordinary adjustments; only a failed
        // breakthrough may drive it to 0 (the death outcome).
        self.body = (self.body + delta).max(1);
    }

    pub fn adjust_luck(&mut self, delta: i32) {
        self.luck = (self.luck + delta).clamp(0, LUCK_MAX);
    }
}
