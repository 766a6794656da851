//! Property-style sweeps over the testable invariants: cap clamping,
//! rate clamping, the tier safeguard, market bands and unique events.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use wendao_game::{
    ActivityState, Catalog, EventBook, EventHistory, Inventory, PlayerState, breakthrough_rate,
    market, progress, trigger_event,
};

#[test]
fn gain_exp_never_exceeds_any_tier_cap() {
    let mut rng = SmallRng::seed_from_u64(0xC0DE);
    for layer in 0..9 {
        let mut player = PlayerState {
            layer_index: layer,
            ..PlayerState::default()
        };
        let cap = player.exp_cap().unwrap();
        for _ in 0..200 {
            let amount = rng.gen_range(-cap..cap * 2);
            player.gain_exp(amount);
            assert!(player.exp >= 0);
            assert!(player.exp <= cap, "layer {layer} overflowed its cap");
            assert_eq!(player.layer_index, layer, "gain_exp must never promote");
        }
    }
}

#[test]
fn breakthrough_rate_clamps_for_any_stats() {
    let mut rng = SmallRng::seed_from_u64(0xFACE);
    for _ in 0..500 {
        let player = PlayerState {
            body: rng.gen_range(-1_000..100_000),
            mind: rng.gen_range(-1_000..100_000),
            ..PlayerState::default()
        };
        let natural = breakthrough_rate(&player, None);
        assert!((0.01..=0.99).contains(&natural));
        let fixed = breakthrough_rate(&player, Some(rng.gen_range(-10.0..10.0)));
        assert!((0.01..=0.99).contains(&fixed));
    }
}

#[test]
fn tier_safeguard_holds_across_the_whole_catalog() {
    let catalog = Catalog::builtin().unwrap();
    let mut rng = SmallRng::seed_from_u64(0xBEEF);
    let all_ids: Vec<String> = (0..=8)
        .flat_map(|tier| {
            catalog
                .materials(tier)
                .iter()
                .chain(catalog.pills(tier).iter())
                .cloned()
                .collect::<Vec<_>>()
        })
        .collect();

    for layer in 0..4 {
        let player = PlayerState {
            layer_index: layer,
            ..PlayerState::default()
        };
        let mut inventory = Inventory::new();
        for id in &all_ids {
            progress::gain_item(&player, &mut inventory, &catalog, id, 1, &mut rng);
        }
        for (held, _) in inventory.iter() {
            let tier = catalog.get(held).unwrap().tier;
            assert!(
                tier <= layer + 1,
                "layer {layer} holds tier {tier} item {held}"
            );
        }
    }
}

#[test]
fn market_always_six_listings_in_band_for_every_tier() {
    let catalog = Catalog::builtin().unwrap();
    for seed in 0..20_u64 {
        let mut rng = SmallRng::seed_from_u64(seed);
        for player_tier in 0..=8 {
            let listings = market::refresh(&catalog, player_tier, &mut rng);
            assert_eq!(listings.len(), 6);
            let low = player_tier.saturating_sub(1);
            let high = (player_tier + 1).min(8);
            for listing in &listings {
                let tier = catalog.get(&listing.item_id).unwrap().tier;
                assert!((low..=high).contains(&tier));
                assert!((0.8..=1.2).contains(&listing.discount));
                assert!(listing.price >= 1);
            }
        }
    }
}

#[test]
fn unique_events_are_excluded_forever_once_recorded() {
    let catalog = Catalog::builtin().unwrap();
    let book = EventBook::builtin().unwrap();
    let mut player = PlayerState::default();
    let mut inventory = Inventory::new();
    let mut history = EventHistory::new();
    let mut rng = SmallRng::seed_from_u64(0xD00D);

    // Fire every unique event eligible at some layer.
    for definition in book.events().iter().filter(|event| event.unique) {
        player.layer_index = definition.trigger.min_layer;
        player.mind = definition.trigger.mind_min.unwrap_or(0);
        player.luck = definition.trigger.luck_min.unwrap_or(0);
        trigger_event(
            definition,
            &mut player,
            &mut inventory,
            &catalog,
            &mut history,
            1_000,
            &mut rng,
        );
    }

    // No draw at any layer/state may ever return a recorded unique again.
    for layer in 0..9 {
        player.layer_index = layer;
        for activity in [
            ActivityState::Idle,
            ActivityState::Work,
            ActivityState::Read,
            ActivityState::Combat,
        ] {
            for _ in 0..50 {
                if let Some(picked) = book.check_triggers(&player, activity, &history, &mut rng) {
                    assert!(
                        !(picked.unique && history.contains(&picked.id)),
                        "unique event {} fired twice",
                        picked.id
                    );
                }
            }
        }
    }
}
