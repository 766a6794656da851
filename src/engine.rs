//! The engine facade: owns the character state, catalog, event book and
//! per-domain RNG streams, and exposes the public operations consumed by
//! the presentation layer.
//!
//! One engine instance per player; the caller serializes commands. Only
//! [`crate::activity::ActionCounters`] is shared across threads.

use hmac::{Hmac, Mac};
use log::warn;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use sha2::Sha256;

use crate::activity::ActivitySampler;
use crate::catalog::{Catalog, ItemDefinition};
use crate::constants::EVENT_INTERVAL_TICKS;
use crate::events::{EventBook, EventHistory, EventOutcome};
use crate::market::{self, MarketListing};
use crate::persist::{self, SaveDocument, SaveStorage, SCHEMA_VERSION};
use crate::progress::{self, BreakthroughReport, UseOutcome};
use crate::reincarnation::{self, ReincarnationReason, ReincarnationSummary};
use crate::state::{ActivityState, Inventory, PlayerState};

/// Deterministic bundle of RNG streams segregated by simulation domain,
/// derived from one user seed via HMAC domain separation.
#[derive(Debug)]
pub struct RngBundle {
    progress: SmallRng,
    event: SmallRng,
    market: SmallRng,
    fate: SmallRng,
}

impl RngBundle {
    /// Construct the bundle from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            progress: SmallRng::seed_from_u64(derive_stream_seed(seed, b"progress")),
            event: SmallRng::seed_from_u64(derive_stream_seed(seed, b"event")),
            market: SmallRng::seed_from_u64(derive_stream_seed(seed, b"market")),
            fate: SmallRng::seed_from_u64(derive_stream_seed(seed, b"fate")),
        }
    }

    /// Seed the bundle from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::from_user_seed(rand::random())
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes())
        .expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}

/// What booting the engine found in storage.
#[derive(Debug, Clone)]
pub struct BootReport {
    pub imported_legacy: bool,
    pub migrated: bool,
    pub offline_exp: i64,
    /// Ready-to-display note about the boot, if anything noteworthy
    /// happened.
    pub message: Option<String>,
}

/// Result of one simulation tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub message: String,
    pub activity: ActivityState,
    pub event: Option<EventOutcome>,
}

/// The cultivation engine. All game-state invariants live behind this
/// facade; the UI layer renders what it returns.
pub struct Engine<S: SaveStorage> {
    storage: S,
    catalog: Catalog,
    events: EventBook,
    player: PlayerState,
    inventory: Inventory,
    market: Vec<MarketListing>,
    history: EventHistory,
    sampler: ActivitySampler,
    tick_count: u64,
    rng: RngBundle,
}

impl<S: SaveStorage> Engine<S> {
    /// Boot the engine: load (or import, or default) the save document and
    /// settle offline progress. Storage failures degrade to a fresh
    /// character rather than failing the boot.
    pub fn new(catalog: Catalog, events: EventBook, storage: S, rng: RngBundle) -> (Self, BootReport) {
        let now = persist::unix_now();
        let summary = persist::load(&storage, &catalog, now);
        let message = if summary.imported_legacy {
            Some("An old journal is found; your past life is restored.".to_string())
        } else if summary.offline_exp > 0 {
            Some(format!(
                "Seclusion ends: +{} exp while you were away.",
                summary.offline_exp
            ))
        } else {
            None
        };
        let report = BootReport {
            imported_legacy: summary.imported_legacy,
            migrated: summary.migrated,
            offline_exp: summary.offline_exp,
            message,
        };
        let document = summary.document;
        let engine = Self {
            storage,
            catalog,
            events,
            player: document.player,
            inventory: document.inventory,
            market: document.market,
            history: document.event_history,
            sampler: ActivitySampler::default(),
            tick_count: 0,
            rng,
        };
        (engine, report)
    }

    /// One 1 Hz simulation step: feed the raw counters through the
    /// classifier, apply the progression yield, then (on the event
    /// interval) roll the event engine, and rotate the market when due.
    pub fn tick(&mut self, key_count: u32, mouse_count: u32) -> TickReport {
        self.sampler.push(key_count, mouse_count);
        let (kb_apm, mouse_apm) = self.sampler.rates();
        let activity = ActivityState::from_rates(kb_apm, mouse_apm);

        let update = progress::update(
            &mut self.player,
            &mut self.inventory,
            &self.catalog,
            activity,
            &mut self.rng.progress,
        );
        let mut message = update.message;
        self.tick_count += 1;

        let mut event = None;
        if self.tick_count % EVENT_INTERVAL_TICKS == 0 {
            let picked = self
                .events
                .check_triggers(&self.player, activity, &self.history, &mut self.rng.event)
                .cloned();
            if let Some(definition) = picked {
                let now = persist::unix_now();
                let outcome = crate::events::trigger_event(
                    &definition,
                    &mut self.player,
                    &mut self.inventory,
                    &self.catalog,
                    &mut self.history,
                    now,
                    &mut self.rng.event,
                );
                message = format!("{message}\n[{}] {}", outcome.title, outcome.text);
                event = Some(outcome);
            }
        }

        let now = persist::unix_now();
        if market::due_for_refresh(self.player.last_market_refresh, now) {
            self.rotate_market(now);
        }

        TickReport {
            message,
            activity,
            event,
        }
    }

    /// Attempt a breakthrough. `fixed_rate` comes from a breakthrough
    /// pill; `None` uses the natural formula. A `Death` outcome is the
    /// caller's cue to run the forced reincarnation flow.
    pub fn attempt_breakthrough(&mut self, fixed_rate: Option<f64>) -> BreakthroughReport {
        progress::attempt_breakthrough(&mut self.player, fixed_rate, &mut self.rng.progress)
    }

    /// Grant items directly (event rewards, UI debug commands). The tier
    /// safeguard applies.
    pub fn gain_item(&mut self, item_id: &str, count: u32) -> String {
        progress::gain_item(
            &self.player,
            &mut self.inventory,
            &self.catalog,
            item_id,
            count,
            &mut self.rng.progress,
        )
    }

    /// Use an item from the inventory. Breakthrough pills route into
    /// [`Engine::attempt_breakthrough`] with their fixed rate.
    pub fn use_item(&mut self, item_id: &str) -> String {
        match progress::use_item(&mut self.player, &mut self.inventory, &self.catalog, item_id) {
            UseOutcome::NotFound => format!("Unknown item: {item_id}"),
            UseOutcome::NotHeld => "You do not hold that item.".to_string(),
            UseOutcome::NotUsable => "That is a raw material, not something you swallow.".to_string(),
            UseOutcome::NotReady => {
                "Your cultivation has not yet reached the bottleneck.".to_string()
            }
            UseOutcome::Applied { message } => message,
            UseOutcome::BreakthroughPill { rate } => self.attempt_breakthrough(Some(rate)).message,
        }
    }

    /// Catalog lookup for the UI detail pane.
    #[must_use]
    pub fn get_item_details(&self, item_id: &str) -> Option<&ItemDefinition> {
        self.catalog.get(item_id)
    }

    /// Craft an item from its recipe.
    pub fn craft(&mut self, item_id: &str) -> (bool, String) {
        progress::craft(
            &self.player,
            &mut self.inventory,
            &self.catalog,
            item_id,
            &mut self.rng.progress,
        )
    }

    /// Manually rotate the market. The manual cooldown is UI-enforced;
    /// the engine always honors the request and checkpoints the result.
    pub fn refresh_market(&mut self) -> String {
        let now = persist::unix_now();
        self.rotate_market(now);
        "The market rotates its stock.".to_string()
    }

    fn rotate_market(&mut self, now: i64) {
        let tier = self.player.layer_index.min(crate::constants::MAX_TIER);
        self.market = market::refresh(&self.catalog, tier, &mut self.rng.market);
        self.player.last_market_refresh = now;
        if !self.save() {
            warn!("market checkpoint save failed");
        }
    }

    /// Buy the listing at `slot`. Success removes the listing.
    pub fn buy(&mut self, slot: usize) -> (bool, String) {
        market::buy(
            &mut self.player,
            &mut self.inventory,
            &self.catalog,
            &mut self.market,
            slot,
            &mut self.rng.market,
        )
    }

    /// Sell held items at half base price.
    pub fn sell(&mut self, item_id: &str, count: u32) -> (bool, String) {
        market::sell(
            &mut self.player,
            &mut self.inventory,
            &self.catalog,
            item_id,
            count,
        )
    }

    /// Spend a talent point.
    pub fn upgrade_talent(&mut self, key: &str) -> (bool, String) {
        progress::upgrade_talent(&mut self.player, key)
    }

    /// End this life. The reset state is persisted before the summary is
    /// returned so a crash cannot resurrect the old character.
    pub fn perform_reincarnation(&mut self, reason: ReincarnationReason) -> ReincarnationSummary {
        let summary = reincarnation::perform_reincarnation(
            &mut self.player,
            &mut self.inventory,
            &mut self.history,
            reason,
            &mut self.rng.fate,
        );
        // The next life shops at its own tier; rotating also checkpoints.
        self.rotate_market(persist::unix_now());
        summary
    }

    /// Persist the full state as one unit. Returns false (after logging)
    /// when storage fails; in-memory state is untouched either way.
    pub fn save(&mut self) -> bool {
        let now = persist::unix_now();
        self.inventory.prune_zeroes();
        self.player.last_save_time = now;
        let mut document = SaveDocument {
            schema_version: SCHEMA_VERSION,
            catalog_version: self.catalog.version(),
            player: self.player.clone(),
            inventory: self.inventory.clone(),
            market: self.market.clone(),
            event_history: self.history.clone(),
        };
        persist::save(&self.storage, &mut document, now)
    }

    // Read-only views for the presentation layer ---------------------------

    #[must_use]
    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    #[must_use]
    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    #[must_use]
    pub fn market(&self) -> &[MarketListing] {
        &self.market
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn event_history(&self) -> &EventHistory {
        &self.history
    }
}
