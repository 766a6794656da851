//! Wendao Game Engine
//!
//! Platform-agnostic core logic for the Wendao idle cultivation companion.
//! This crate turns a stream of ambient user-activity samples into a
//! persistent character progression: experience and layers, breakthroughs,
//! a tiered item catalog, weighted narrative events, a rotating market and
//! a versioned save file. It provides all game mechanics without UI or
//! platform-specific dependencies; the presentation layer consumes the
//! [`Engine`] operations and renders the results.

pub mod activity;
pub mod catalog;
pub mod constants;
pub mod engine;
pub mod events;
pub mod market;
pub mod numbers;
pub mod persist;
pub mod progress;
pub mod reincarnation;
pub mod state;

// Re-export commonly used types
pub use activity::{ActionCounters, ActivitySampler};
pub use catalog::{Catalog, CatalogError, ItemDefinition, ItemEffect, ItemKind, Recipe};
pub use engine::{BootReport, Engine, RngBundle, TickReport};
pub use events::{
    Amount, Effect, EventBook, EventChoice, EventDefinition, EventHistory, EventHistoryEntry,
    EventOutcome, Trigger, trigger_event,
};
pub use market::{MarketListing, due_for_refresh};
pub use persist::{
    FileStorage, LoadSummary, MemoryStorage, PersistError, SCHEMA_VERSION, SaveDocument,
    SaveStorage,
};
pub use progress::{
    BreakthroughOutcome, BreakthroughReport, UpdateOutcome, UseOutcome, breakthrough_rate,
    efficiency,
};
pub use reincarnation::{
    InheritanceQuote, ReincarnationReason, ReincarnationSummary, calculate_inheritance,
};
pub use state::{ActivityState, Inventory, PlayerState, TalentState};
