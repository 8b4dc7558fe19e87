//! Currency rewards and the session-wide ranking derived from them.

use crate::minigames::Placement;
use crate::registry::PlayerRegistry;
use log::debug;
use shared::{rank_with_ties, PlayerKey};
use std::collections::BTreeMap;

/// Currency paid out for a rank tier; 4th place and below earn nothing.
pub fn currency_for_tier(tier: u32) -> u32 {
    match tier {
        1 => 10,
        2 => 5,
        3 => 2,
        _ => 0,
    }
}

/// Credits every ranked player with the currency of their placement.
pub fn award(registry: &mut PlayerRegistry, placements: &BTreeMap<PlayerKey, Placement>) {
    for (key, placement) in placements {
        if let Some(player) = registry.get_mut(key) {
            let earned = currency_for_tier(placement.tier());
            player.currency += earned;
            debug!(
                "Player {} earned {} ({:?}), now at {}",
                key, earned, placement, player.currency
            );
        }
    }
}

/// Ranks every registered player by accumulated currency.
pub fn session_ranking(registry: &PlayerRegistry) -> BTreeMap<PlayerKey, u32> {
    rank_with_ties(registry.players().map(|p| (p.key, p.currency)))
}
