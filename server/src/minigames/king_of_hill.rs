//! King of the hill: a point for every tick spent alone in the central zone.

use super::arena::{ArenaRules, Contestant, Contestants, CONTESTANT_SIZE};
use super::MinigameId;
use rand::rngs::StdRng;
use shared::physics::{Rect, Vector2};
use shared::{FIELD_HEIGHT, FIELD_WIDTH};

pub const ZONE_SIZE: f32 = 200.0;
const CORNER_MARGIN: f32 = 100.0;

#[derive(Debug, Clone)]
pub struct KingOfHill {
    zone: Rect,
}

impl Default for KingOfHill {
    fn default() -> Self {
        Self {
            zone: Rect::new(
                (FIELD_WIDTH - ZONE_SIZE) / 2.0,
                (FIELD_HEIGHT - ZONE_SIZE) / 2.0,
                ZONE_SIZE,
                ZONE_SIZE,
            ),
        }
    }
}

impl KingOfHill {
    pub fn zone(&self) -> Rect {
        self.zone
    }
}

impl ArenaRules for KingOfHill {
    fn id(&self) -> MinigameId {
        MinigameId::KingOfHill
    }

    /// One corner per slot.
    fn spawn(&self, slot: u8) -> Vector2 {
        let right = FIELD_WIDTH - CORNER_MARGIN - CONTESTANT_SIZE;
        let bottom = FIELD_HEIGHT - CORNER_MARGIN - CONTESTANT_SIZE;
        match slot % 4 {
            0 => Vector2::new(CORNER_MARGIN, CORNER_MARGIN),
            1 => Vector2::new(right, CORNER_MARGIN),
            2 => Vector2::new(CORNER_MARGIN, bottom),
            _ => Vector2::new(right, bottom),
        }
    }

    fn step(&mut self, contestants: &mut Contestants, _rng: &mut StdRng) {
        let mut inside = contestants
            .values_mut()
            .filter(|c| !c.out && self.zone.contains(c.center()));

        if let (Some(king), None) = (inside.next(), inside.next()) {
            king.points += 1;
        }
    }

    fn ai_input(&self, contestant: &Contestant) -> Vector2 {
        contestant.walk_towards(self.zone.center())
    }

    fn objects(&self) -> Vec<Rect> {
        vec![self.zone]
    }
}
