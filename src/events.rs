//! Narrative random events: condition-matched, weight-selected, with
//! tagged-union effects and once-only history for unique events.

use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::hash::Hasher;
use twox_hash::XxHash64;

use crate::catalog::Catalog;
use crate::constants::EVENT_DEFAULT_WEIGHT;
use crate::progress::gain_item;
use crate::state::{ActivityState, Inventory, PlayerState};

const BUILTIN_EVENTS_JSON: &str = include_str!("../data/events.json");

/// Per-effect note lines handed back to the UI.
pub type EffectNotes = SmallVec<[String; 4]>;

/// A scalar or an inclusive `[min, max]` integer range resolved by a
/// uniform draw at application time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Fixed(i64),
    Range([i64; 2]),
}

impl Amount {
    pub fn resolve<R: Rng>(self, rng: &mut R) -> i64 {
        match self {
            Self::Fixed(value) => value,
            Self::Range([min, max]) => {
                if min >= max {
                    min
                } else {
                    rng.gen_range(min..=max)
                }
            }
        }
    }
}

/// One concrete mutation applied by an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Exp(Amount),
    Money(Amount),
    Mind(Amount),
    Body(Amount),
    Luck(Amount),
    Item { id: String, count: u32 },
    RandomMaterial { count: u32 },
}

/// Eligibility conditions checked against the live player state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(default)]
    pub min_layer: usize,
    #[serde(default)]
    pub max_layer: Option<usize>,
    #[serde(default)]
    pub state: Option<ActivityState>,
    #[serde(default)]
    pub mind_min: Option<i32>,
    #[serde(default)]
    pub mind_max: Option<i32>,
    #[serde(default)]
    pub luck_min: Option<i32>,
}

impl Trigger {
    #[must_use]
    pub fn matches(&self, player: &PlayerState, activity: ActivityState) -> bool {
        if player.layer_index < self.min_layer {
            return false;
        }
        if let Some(max) = self.max_layer {
            if player.layer_index > max {
                return false;
            }
        }
        if let Some(required) = self.state {
            if required != activity {
                return false;
            }
        }
        if let Some(min) = self.mind_min {
            if player.mind < min {
                return false;
            }
        }
        if let Some(max) = self.mind_max {
            if player.mind > max {
                return false;
            }
        }
        if let Some(min) = self.luck_min {
            if player.luck < min {
                return false;
            }
        }
        true
    }
}

/// A branching choice with its own success split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventChoice {
    pub prompt: String,
    pub success_rate: f64,
    #[serde(default)]
    pub success: Vec<Effect>,
    #[serde(default)]
    pub failure: Vec<Effect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub id: String,
    pub title: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub unique: bool,
    pub text: String,
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub choice: Option<EventChoice>,
}

const fn default_weight() -> u32 {
    EVENT_DEFAULT_WEIGHT
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EventFile {
    events: Vec<EventDefinition>,
}

/// Append-only record of fired unique events. A unique event's id appears
/// at most once for the lifetime of the character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventHistory {
    entries: Vec<EventHistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHistoryEntry {
    pub event_id: String,
    pub triggered_at: i64,
}

impl EventHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, event_id: &str) -> bool {
        self.entries.iter().any(|entry| entry.event_id == event_id)
    }

    pub fn record(&mut self, event_id: &str, triggered_at: i64) {
        if self.contains(event_id) {
            return;
        }
        self.entries.push(EventHistoryEntry {
            event_id: event_id.to_string(),
            triggered_at,
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The loaded, content-versioned event set.
#[derive(Debug, Clone)]
pub struct EventBook {
    events: Vec<EventDefinition>,
    version: u64,
}

impl EventBook {
    /// Parse an event set from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into valid event data.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: EventFile = serde_json::from_str(json)?;
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(json.as_bytes());
        Ok(Self {
            events: file.events,
            version: hasher.finish(),
        })
    }

    /// Event set embedded in the crate.
    ///
    /// # Errors
    ///
    /// Propagates parse failures from the embedded asset.
    pub fn builtin() -> Result<Self, serde_json::Error> {
        Self::from_json(BUILTIN_EVENTS_JSON)
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            events: Vec::new(),
            version: 0,
        }
    }

    #[must_use]
    pub fn events(&self) -> &[EventDefinition] {
        &self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Filter the event set against the player context, then perform a
    /// weighted draw over the survivors. Unique events already in the
    /// history are permanently excluded.
    #[must_use]
    pub fn check_triggers<R: Rng>(
        &self,
        player: &PlayerState,
        activity: ActivityState,
        history: &EventHistory,
        rng: &mut R,
    ) -> Option<&EventDefinition> {
        let candidates: Vec<&EventDefinition> = self
            .events
            .iter()
            .filter(|event| !(event.unique && history.contains(&event.id)))
            .filter(|event| event.trigger.matches(player, activity))
            .collect();
        choose_weighted(&candidates, rng)
    }
}

fn choose_weighted<'a, R: Rng>(
    candidates: &[&'a EventDefinition],
    rng: &mut R,
) -> Option<&'a EventDefinition> {
    let total_weight: u32 = candidates.iter().map(|event| event.weight.max(1)).sum();
    if total_weight == 0 {
        return None;
    }
    let roll = rng.gen_range(0..total_weight);
    let mut current = 0;
    for event in candidates {
        current += event.weight.max(1);
        if roll < current {
            return Some(event);
        }
    }
    candidates.first().copied()
}

/// Outcome of firing one event, ready for UI display.
#[derive(Debug, Clone)]
pub struct EventOutcome {
    pub event_id: String,
    pub title: String,
    pub text: String,
    pub notes: EffectNotes,
}

/// Apply an event's effects (and its optional choice branch), record the
/// history entry for unique events, and return the display outcome.
pub fn trigger_event<R: Rng>(
    event: &EventDefinition,
    player: &mut PlayerState,
    inventory: &mut Inventory,
    catalog: &Catalog,
    history: &mut EventHistory,
    now: i64,
    rng: &mut R,
) -> EventOutcome {
    let mut notes = EffectNotes::new();
    for effect in &event.effects {
        if let Some(note) = apply_effect(effect, player, inventory, catalog, rng) {
            notes.push(note);
        }
    }

    if let Some(choice) = event.choice.as_ref() {
        let success = rng.gen_bool(choice.success_rate.clamp(0.0, 1.0));
        let branch = if success {
            &choice.success
        } else {
            &choice.failure
        };
        for effect in branch {
            if let Some(note) = apply_effect(effect, player, inventory, catalog, rng) {
                notes.push(note);
            }
        }
    }

    if event.unique {
        history.record(&event.id, now);
    }

    EventOutcome {
        event_id: event.id.clone(),
        title: event.title.clone(),
        text: event.text.clone(),
        notes,
    }
}

fn apply_effect<R: Rng>(
    effect: &Effect,
    player: &mut PlayerState,
    inventory: &mut Inventory,
    catalog: &Catalog,
    rng: &mut R,
) -> Option<String> {
    match effect {
        Effect::Exp(amount) => {
            let value = amount.resolve(rng);
            let applied = player.gain_exp(value);
            Some(format!("exp {applied:+}"))
        }
        Effect::Money(amount) => {
            let value = amount.resolve(rng);
            player.adjust_money(value);
            Some(format!("spirit stones {value:+}"))
        }
        Effect::Mind(amount) => {
            let value = i32::try_from(amount.resolve(rng)).unwrap_or(0);
            player.adjust_mind(value);
            Some(format!("mind {value:+}"))
        }
        Effect::Body(amount) => {
            let value = i32::try_from(amount.resolve(rng)).unwrap_or(0);
            player.adjust_body(value);
            Some(format!("body {value:+}"))
        }
        Effect::Luck(amount) => {
            let value = i32::try_from(amount.resolve(rng)).unwrap_or(0);
            player.adjust_luck(value);
            Some(format!("luck {value:+}"))
        }
        Effect::Item { id, count } => {
            Some(gain_item(player, inventory, catalog, id, *count, rng))
        }
        Effect::RandomMaterial { count } => {
            let tier = player.layer_index.min(crate::constants::MAX_TIER);
            let id = catalog.random_material(tier, rng)?.to_string();
            Some(gain_item(player, inventory, catalog, &id, *count, rng))
        }
    }
}
