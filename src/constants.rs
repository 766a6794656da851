//! Centralized balance and tuning constants for Wendao game logic.
//!
//! These values define the deterministic math for the core simulation.
//! Keeping them together ensures that gameplay can only be adjusted via
//! code changes reviewed in version control, rather than through external
//! JSON assets.

// Layer progression ---------------------------------------------------------
pub(crate) const LAYER_NAMES: [&str; 10] = [
    "Qi Refining",
    "Foundation",
    "Golden Core",
    "Nascent Soul",
    "Spirit Severing",
    "Void Training",
    "Integration",
    "Mahayana",
    "Tribulation",
    "Ascension",
];

/// Experience required to fill each mortal layer. The terminal layer
/// (Ascension) has no cap and accrues nothing.
pub(crate) const EXP_TABLE: [i64; 9] = [
    30_000,
    120_000,
    800_000,
    2_500_000,
    8_000_000,
    20_000_000,
    50_000_000,
    100_000_000,
    200_000_000,
];

pub(crate) const MAX_TIER: usize = 8;
pub(crate) const ASCENSION_LAYER: usize = 9;

// Activity classification ---------------------------------------------------
pub(crate) const APM_WINDOW_SAMPLES: usize = 5;
pub(crate) const APM_SPLIT: f32 = 30.0;

// Per-state tick yield ------------------------------------------------------
pub(crate) const IDLE_BASE_EXP: i64 = 5;
pub(crate) const WORK_BASE_EXP: i64 = 4;
pub(crate) const READ_BASE_EXP: i64 = 3;
pub(crate) const COMBAT_BASE_EXP: i64 = 2;
pub(crate) const COMBAT_MONEY_GAIN: i64 = 1;

pub(crate) const WORK_DROP_BASE_CHANCE: f64 = 0.02;
pub(crate) const WORK_DROP_TALENT_BONUS: f64 = 0.005;
pub(crate) const READ_INSIGHT_CHANCE: f64 = 0.02;
pub(crate) const READ_INSIGHT_MIND_RELIEF: i32 = 1;
pub(crate) const COMBAT_RISK_CHANCE: f64 = 0.05;
pub(crate) const COMBAT_RISK_MIND_GAIN: i32 = 1;

// Efficiency model ----------------------------------------------------------
pub(crate) const TALENT_EXP_BONUS_PER_LEVEL: f64 = 0.05;
pub(crate) const MIND_PENALTY_THRESHOLD: i32 = 50;
pub(crate) const MIND_PENALTY_PER_POINT: f64 = 0.02;

// Breakthrough model --------------------------------------------------------
pub(crate) const BREAK_NATURAL_BASE: f64 = 0.5;
pub(crate) const BREAK_NATURAL_BODY_COEFF: f64 = 0.01;
pub(crate) const BREAK_FIXED_BODY_COEFF: f64 = 0.005;
pub(crate) const BREAK_MIND_COEFF: f64 = 0.005;
pub(crate) const BREAK_RATE_MIN: f64 = 0.01;
pub(crate) const BREAK_RATE_MAX: f64 = 0.99;
pub(crate) const BREAK_SUCCESS_BODY_GAIN: i32 = 2;
pub(crate) const BREAK_SUCCESS_MIND_RELIEF: i32 = 20;
pub(crate) const BREAK_FAIL_EXP_PENALTY: f64 = 0.30;
pub(crate) const BREAK_FAIL_MIND_GAIN: i32 = 10;

// Stat bounds ---------------------------------------------------------------
pub(crate) const MIND_MAX: i32 = 100;
pub(crate) const LUCK_MAX: i32 = 100;
pub(crate) const BODY_DEFAULT: i32 = 10;

// Talents -------------------------------------------------------------------
pub(crate) const TALENT_KEYS: [&str; 2] = ["exp", "drop"];

// Event engine --------------------------------------------------------------
pub(crate) const EVENT_INTERVAL_TICKS: u64 = 300;
pub(crate) const EVENT_DEFAULT_WEIGHT: u32 = 10;

// Market --------------------------------------------------------------------
pub(crate) const MARKET_SLOTS: usize = 6;
pub(crate) const MARKET_REFRESH_INTERVAL_SECS: i64 = 15 * 60;
pub(crate) const MARKET_SAME_TIER_CHANCE: f64 = 0.60;
pub(crate) const MARKET_LOW_TIER_CHANCE: f64 = 0.30;
pub(crate) const MARKET_PILL_CHANCE: f64 = 0.40;
pub(crate) const MARKET_DISCOUNT_MIN: f64 = 0.8;
pub(crate) const MARKET_DISCOUNT_MAX: f64 = 1.2;
pub(crate) const SELL_PRICE_RATIO: f64 = 0.5;

// Reincarnation -------------------------------------------------------------
pub(crate) const REBIRTH_RATE_BASE: f64 = 0.8;
pub(crate) const REBIRTH_RATE_PER_LAYER: f64 = 0.025;
pub(crate) const REBIRTH_RATE_CAP: f64 = 1.0;
pub(crate) const DEATH_RATE_BASE: f64 = 0.3;
pub(crate) const DEATH_RATE_PER_BODY: f64 = 0.001;
pub(crate) const DEATH_RATE_CAP: f64 = 0.5;
pub(crate) const INHERIT_MONEY_RATIO: f64 = 0.1;

// Offline settlement --------------------------------------------------------
pub(crate) const OFFLINE_MIN_GAP_SECS: i64 = 60;
/// Idle-equivalent offline rate: 2.5 exp per elapsed second.
pub(crate) const OFFLINE_EXP_NUMER: i64 = 5;
pub(crate) const OFFLINE_EXP_DENOM: i64 = 2;
