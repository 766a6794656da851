//! Reincarnation settlement: inheritance math for voluntary rebirth and
//! forced death, plus the full-state reset.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{
    BODY_DEFAULT, DEATH_RATE_BASE, DEATH_RATE_CAP, DEATH_RATE_PER_BODY, INHERIT_MONEY_RATIO,
    LUCK_MAX, REBIRTH_RATE_BASE, REBIRTH_RATE_CAP, REBIRTH_RATE_PER_LAYER,
};
use crate::events::EventHistory;
use crate::numbers::{i32_to_f64, i64_to_f64, round_f64_to_i64};
use crate::state::{Inventory, PlayerState};

/// Why the cycle is ending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReincarnationReason {
    /// Voluntary rebirth; the cultivator dissolves this life on purpose.
    Rebirth,
    /// Forced: the body failed during a breakthrough.
    Death,
}

/// What the next life starts with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InheritanceQuote {
    pub legacy_points: u32,
    pub starting_money: i64,
    pub rate: f64,
}

#[derive(Debug, Clone)]
pub struct ReincarnationSummary {
    pub reason: ReincarnationReason,
    pub quote: InheritanceQuote,
    pub death_count: u32,
    pub message: String,
}

/// Compute the inheritance without mutating anything.
#[must_use]
pub fn calculate_inheritance(player: &PlayerState, reason: ReincarnationReason) -> InheritanceQuote {
    let rate = match reason {
        ReincarnationReason::Rebirth => {
            let layer = i32_to_f64(i32::try_from(player.layer_index).unwrap_or(i32::MAX));
            (REBIRTH_RATE_BASE + REBIRTH_RATE_PER_LAYER * layer).min(REBIRTH_RATE_CAP)
        }
        ReincarnationReason::Death => {
            (DEATH_RATE_BASE + DEATH_RATE_PER_BODY * i32_to_f64(player.body)).min(DEATH_RATE_CAP)
        }
    };
    let total_points = f64::from(player.talents.total());
    let legacy_points = u32::try_from(round_f64_to_i64(total_points * rate).max(0)).unwrap_or(0);
    let starting_money =
        round_f64_to_i64(i64_to_f64(player.money) * INHERIT_MONEY_RATIO).max(0);
    InheritanceQuote {
        legacy_points,
        starting_money,
        rate,
    }
}

/// Commit the inheritance and reset the character. The caller persists the
/// reset state atomically before surfacing the summary.
pub fn perform_reincarnation<R: Rng>(
    player: &mut PlayerState,
    inventory: &mut Inventory,
    history: &mut EventHistory,
    reason: ReincarnationReason,
    rng: &mut R,
) -> ReincarnationSummary {
    let quote = calculate_inheritance(player, reason);

    player.layer_index = 0;
    player.exp = 0;
    player.money = quote.starting_money;
    player.body = BODY_DEFAULT;
    player.mind = 0;
    player.luck = rng.gen_range(0..=LUCK_MAX);
    player.talents.clear_levels();
    player.talents.points = quote.legacy_points;
    player.legacy_points = quote.legacy_points;
    player.death_count = player.death_count.saturating_add(1);
    player.equipped_title = None;
    inventory.clear();
    history.clear();

    let verb = match reason {
        ReincarnationReason::Rebirth => "You dissolve this life and begin anew",
        ReincarnationReason::Death => "Your body fails; the wheel turns",
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = (quote.rate * 100.0).round() as i64;
    let message = format!(
        "{verb}. Inherited {} talent points ({pct}% rate) and {} spirit stones.",
        quote.legacy_points, quote.starting_money
    );

    ReincarnationSummary {
        reason,
        quote,
        death_count: player.death_count,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn rebirth_rate_scales_with_layer_and_caps() {
        let mut player = PlayerState::default();
        player.talents.points = 10;
        let quote = calculate_inheritance(&player, ReincarnationReason::Rebirth);
        assert!((quote.rate - 0.8).abs() < 1e-9);
        assert_eq!(quote.legacy_points, 8);

        player.layer_index = 8;
        let quote = calculate_inheritance(&player, ReincarnationReason::Rebirth);
        assert!((quote.rate - 1.0).abs() < 1e-9);
        assert_eq!(quote.legacy_points, 10);
    }

    #[test]
    fn death_rate_caps_at_half() {
        let mut player = PlayerState::default();
        player.talents.points = 100;
        player.body = 0;
        let quote = calculate_inheritance(&player, ReincarnationReason::Death);
        assert!((quote.rate - 0.3).abs() < 1e-9);

        player.body = 1_000;
        let quote = calculate_inheritance(&player, ReincarnationReason::Death);
        assert!((quote.rate - 0.5).abs() < 1e-9);
        assert_eq!(quote.legacy_points, 50);
    }

    #[test]
    fn inheritance_counts_spent_and_unspent_points() {
        let mut player = PlayerState::default();
        player.talents.points = 4;
        player.talents.levels.insert("exp".to_string(), 6);
        player.layer_index = 8;
        let quote = calculate_inheritance(&player, ReincarnationReason::Rebirth);
        assert_eq!(quote.legacy_points, 10);
    }

    #[test]
    fn money_inheritance_is_ten_percent() {
        let mut player = PlayerState::default();
        player.money = 12_345;
        let quote = calculate_inheritance(&player, ReincarnationReason::Death);
        assert_eq!(quote.starting_money, 1_235);
    }

    #[test]
    fn perform_resets_state_and_rolls_new_luck() {
        let mut player = PlayerState::default();
        player.layer_index = 4;
        player.exp = 999;
        player.money = 1_000;
        player.body = 20;
        player.mind = 70;
        player.talents.points = 2;
        player.talents.levels.insert("drop".to_string(), 3);
        let mut inventory = Inventory::new();
        inventory.add("herb_spirit_0", 5);
        let mut history = EventHistory::new();
        history.record("evt_unique", 500);

        let mut rng = SmallRng::seed_from_u64(13);
        let summary = perform_reincarnation(
            &mut player,
            &mut inventory,
            &mut history,
            ReincarnationReason::Rebirth,
            &mut rng,
        );

        assert_eq!(player.layer_index, 0);
        assert_eq!(player.exp, 0);
        assert_eq!(player.body, BODY_DEFAULT);
        assert_eq!(player.mind, 0);
        assert!((0..=LUCK_MAX).contains(&player.luck));
        assert_eq!(player.money, 100);
        assert!(player.talents.levels.is_empty());
        assert_eq!(player.talents.points, summary.quote.legacy_points);
        assert_eq!(player.death_count, 1);
        assert!(inventory.is_empty());
        assert!(history.is_empty());
        assert_eq!(summary.death_count, 1);
    }
}
