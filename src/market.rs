//! Rotating market: wholesale listing regeneration keyed to the player
//! tier, plus buy/sell resolution.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::constants::{
    MARKET_DISCOUNT_MAX, MARKET_DISCOUNT_MIN, MARKET_LOW_TIER_CHANCE, MARKET_PILL_CHANCE,
    MARKET_REFRESH_INTERVAL_SECS, MARKET_SAME_TIER_CHANCE, MARKET_SLOTS, MAX_TIER,
    SELL_PRICE_RATIO,
};
use crate::numbers::{i64_to_f64, round_f64_to_i64};
use crate::progress::gain_item;
use crate::state::{Inventory, PlayerState};

/// One ephemeral market slot. The full listing set is regenerated
/// wholesale on refresh, never edited incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketListing {
    pub item_id: String,
    /// Final price after the discount factor.
    pub price: i64,
    pub discount: f64,
}

/// True when the rotation interval has elapsed since the last refresh.
#[must_use]
pub fn due_for_refresh(last_refresh: i64, now: i64) -> bool {
    now - last_refresh > MARKET_REFRESH_INTERVAL_SECS
}

/// Regenerate the full listing set: six slots, each rolling a tier within
/// the clamped `[tier-1, tier+1]` band (60% same / 30% low / 10% high),
/// a category (60% material / 40% pill), and a discount in `[0.8, 1.2]`.
#[must_use]
pub fn refresh<R: Rng>(catalog: &Catalog, player_tier: usize, rng: &mut R) -> Vec<MarketListing> {
    let tier = player_tier.min(MAX_TIER);
    let low = tier.saturating_sub(1);
    let high = (tier + 1).min(MAX_TIER);

    let mut listings = Vec::with_capacity(MARKET_SLOTS);
    while listings.len() < MARKET_SLOTS {
        let roll: f64 = rng.gen();
        let slot_tier = if roll < MARKET_SAME_TIER_CHANCE {
            tier
        } else if roll < MARKET_SAME_TIER_CHANCE + MARKET_LOW_TIER_CHANCE {
            low
        } else {
            high
        };

        let want_pill = rng.gen_bool(MARKET_PILL_CHANCE);
        let pool = pick_pool(catalog, slot_tier, want_pill);
        let Some(item_id) = pool
            .filter(|ids| !ids.is_empty())
            .map(|ids| ids[rng.gen_range(0..ids.len())].clone())
        else {
            // Both pools empty at this tier; the catalog guarantees this
            // cannot happen for valid tiers, but do not spin forever.
            break;
        };

        let base_price = catalog.get(&item_id).map_or(1, |item| item.price);
        let discount = rng.gen_range(MARKET_DISCOUNT_MIN..=MARKET_DISCOUNT_MAX);
        let price = round_f64_to_i64(i64_to_f64(base_price) * discount).max(1);
        listings.push(MarketListing {
            item_id,
            price,
            discount,
        });
    }
    listings
}

fn pick_pool<'a>(catalog: &'a Catalog, tier: usize, want_pill: bool) -> Option<&'a [String]> {
    let pills = catalog.pills(tier);
    let materials = catalog.materials(tier);
    let primary = if want_pill { pills } else { materials };
    let fallback = if want_pill { materials } else { pills };
    if !primary.is_empty() {
        Some(primary)
    } else if !fallback.is_empty() {
        Some(fallback)
    } else {
        None
    }
}

/// Purchase a listing by slot index. Listings are single-purchase; a
/// successful buy removes the slot. Insufficient funds is a normal
/// negative result.
pub fn buy<R: Rng>(
    player: &mut PlayerState,
    inventory: &mut Inventory,
    catalog: &Catalog,
    listings: &mut Vec<MarketListing>,
    slot: usize,
    rng: &mut R,
) -> (bool, String) {
    if slot >= listings.len() {
        return (false, "That stall is already empty.".to_string());
    }
    let price = listings[slot].price;
    if player.money < price {
        return (false, "Not enough spirit stones.".to_string());
    }
    let listing = listings.remove(slot);
    player.money -= price;
    let message = gain_item(player, inventory, catalog, &listing.item_id, 1, rng);
    (true, format!("{message} (-{price} spirit stones)"))
}

/// Sell held items back at half base price per unit.
pub fn sell(
    player: &mut PlayerState,
    inventory: &mut Inventory,
    catalog: &Catalog,
    item_id: &str,
    count: u32,
) -> (bool, String) {
    if count == 0 || inventory.count(item_id) < count {
        return (false, "You do not hold that many.".to_string());
    }
    let base_price = catalog.get(item_id).map_or(1, |item| item.price);
    let unit = round_f64_to_i64(i64_to_f64(base_price) * SELL_PRICE_RATIO).max(1);
    let total = unit * i64::from(count);
    inventory.remove(item_id, count);
    player.adjust_money(total);
    (
        true,
        format!(
            "Sold {} x{count} for {total} spirit stones",
            catalog.name_of(item_id)
        ),
    )
}
