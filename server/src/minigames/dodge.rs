//! Dodge: stay on the floor and sidestep the blocks falling from the top.
//!
//! Blocks spawn faster and fall quicker as the game goes on. A contestant
//! touched by a block is out. The game ends at the deadline or once at
//! most one contestant is left standing.

use super::arena::{ArenaRules, Contestant, Contestants, CONTESTANT_SIZE};
use super::MinigameId;
use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use shared::physics::{steer, Rect, Vector2};
use shared::{PlayerKey, FIELD_HEIGHT, FIELD_WIDTH, WALL_THICKNESS};
use std::collections::BTreeMap;

pub const BLOCK_SIZE: f32 = 48.0;
const FLOOR_Y: f32 = FIELD_HEIGHT - WALL_THICKNESS - CONTESTANT_SIZE;
const BASE_FALL_SPEED: f32 = 5.0;
const MAX_FALL_SPEED: f32 = 12.0;
const FIRST_SPAWN_INTERVAL: u32 = 50;
const MIN_SPAWN_INTERVAL: u32 = 12;
/// How far sideways the AI looks for blocks overhead.
const AI_MARGIN: f32 = 20.0;

#[derive(Debug, Clone, Default)]
pub struct Dodge {
    blocks: Vec<Rect>,
    ticks: u32,
    /// Tick each eliminated player went out on.
    eliminated: BTreeMap<PlayerKey, u32>,
}

impl Dodge {
    pub fn blocks(&self) -> &[Rect] {
        &self.blocks
    }

    fn spawn_interval(&self) -> u32 {
        FIRST_SPAWN_INTERVAL
            .saturating_sub(self.ticks / 30)
            .max(MIN_SPAWN_INTERVAL)
    }

    fn fall_speed(&self) -> f32 {
        (BASE_FALL_SPEED + self.ticks as f32 / 300.0).min(MAX_FALL_SPEED)
    }

    fn drop_block(&mut self, rng: &mut StdRng) {
        let x = rng.gen_range(WALL_THICKNESS..FIELD_WIDTH - WALL_THICKNESS - BLOCK_SIZE);
        self.blocks
            .push(Rect::new(x, WALL_THICKNESS, BLOCK_SIZE, BLOCK_SIZE));
    }
}

impl ArenaRules for Dodge {
    fn id(&self) -> MinigameId {
        MinigameId::Dodge
    }

    fn spawn(&self, slot: u8) -> Vector2 {
        Vector2::new(200.0 + f32::from(slot) * 260.0, FLOOR_Y)
    }

    fn on_start(&mut self, _rng: &mut StdRng) {
        self.blocks.clear();
        self.ticks = 0;
        self.eliminated.clear();
    }

    fn constrain(&self, input: Vector2) -> Vector2 {
        Vector2::new(input.x, 0.0)
    }

    fn step(&mut self, contestants: &mut Contestants, rng: &mut StdRng) {
        self.ticks += 1;
        if self.ticks % self.spawn_interval() == 0 {
            self.drop_block(rng);
        }

        let speed = self.fall_speed();
        for block in self.blocks.iter_mut() {
            block.y += speed;
        }
        self.blocks.retain(|block| block.y < FIELD_HEIGHT);

        for (key, contestant) in contestants.iter_mut().filter(|(_, c)| !c.out) {
            let bounds = contestant.body.bounds();
            if self.blocks.iter().any(|block| block.intersects(&bounds)) {
                contestant.out = true;
                self.eliminated.insert(*key, self.ticks);
                debug!("Player {} was crushed on tick {}", key, self.ticks);
            }
        }
    }

    fn is_over(&self, contestants: &Contestants) -> bool {
        let standing = contestants.values().filter(|c| !c.out).count();
        if contestants.len() > 1 {
            standing <= 1
        } else {
            standing == 0
        }
    }

    /// Runs away from the lowest block overhead, otherwise back to the centre.
    fn ai_input(&self, contestant: &Contestant) -> Vector2 {
        let bounds = contestant.body.bounds();
        let center = bounds.center();
        let threat = self
            .blocks
            .iter()
            .filter(|b| b.right() + AI_MARGIN > bounds.x && b.x - AI_MARGIN < bounds.right())
            .filter(|b| b.bottom() <= bounds.bottom())
            .max_by(|a, b| a.y.total_cmp(&b.y));

        match threat {
            Some(block) if block.center().x < center.x => Vector2::new(1.0, 0.0),
            Some(_) => Vector2::new(-1.0, 0.0),
            None => Vector2::new(steer(FIELD_WIDTH / 2.0 - center.x, CONTESTANT_SIZE), 0.0),
        }
    }

    /// Survivors share the best score; the eliminated rank by how long they lasted.
    fn standings(&self, contestants: &Contestants) -> BTreeMap<PlayerKey, u32> {
        contestants
            .keys()
            .map(|key| (*key, self.eliminated.get(key).copied().unwrap_or(u32::MAX)))
            .collect()
    }

    fn objects(&self) -> Vec<Rect> {
        self.blocks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use shared::rank_with_ties;

    fn lineup() -> Contestants {
        let rules = Dodge::default();
        (0..4)
            .map(|slot| (PlayerKey(slot as u32 + 1), Contestant::new(rules.spawn(slot))))
            .collect()
    }

    #[test]
    fn test_input_is_horizontal_only() {
        let rules = Dodge::default();
        assert_eq!(rules.constrain(Vector2::new(1.0, -1.0)), Vector2::new(1.0, 0.0));
    }

    #[test]
    fn test_blocks_fall_and_spawn_faster() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut rules = Dodge::default();
        let mut contestants = Contestants::new();
        rules.blocks.push(Rect::new(600.0, 100.0, BLOCK_SIZE, BLOCK_SIZE));

        rules.step(&mut contestants, &mut rng);
        assert_eq!(rules.blocks()[0].y, 100.0 + rules.fall_speed());

        let early = rules.spawn_interval();
        rules.ticks = 3000;
        assert!(rules.spawn_interval() < early);
        assert_eq!(rules.spawn_interval(), MIN_SPAWN_INTERVAL);
        assert_eq!(rules.fall_speed(), MAX_FALL_SPEED);
    }

    #[test]
    fn test_touched_contestant_is_out() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut rules = Dodge::default();
        let mut contestants = lineup();
        let target = contestants[&PlayerKey(2)].body.bounds();
        rules
            .blocks
            .push(Rect::new(target.x, target.y - BLOCK_SIZE, BLOCK_SIZE, BLOCK_SIZE));

        rules.step(&mut contestants, &mut rng);

        assert!(contestants[&PlayerKey(2)].out);
        assert!(!contestants[&PlayerKey(1)].out);
        assert!(!rules.is_over(&contestants));
    }

    #[test]
    fn test_last_one_standing_ends_game() {
        let rules = Dodge::default();
        let mut contestants = lineup();
        for key in [1, 2, 3] {
            contestants.get_mut(&PlayerKey(key)).unwrap().out = true;
        }
        assert!(rules.is_over(&contestants));
    }

    #[test]
    fn test_survivors_share_first_place() {
        let mut rules = Dodge::default();
        let contestants = lineup();
        rules.eliminated.insert(PlayerKey(1), 40);
        rules.eliminated.insert(PlayerKey(2), 90);

        let ranks = rank_with_ties(rules.standings(&contestants));

        assert_eq!(ranks[&PlayerKey(3)], 1);
        assert_eq!(ranks[&PlayerKey(4)], 1);
        assert_eq!(ranks[&PlayerKey(2)], 3);
        assert_eq!(ranks[&PlayerKey(1)], 4);
    }

    #[test]
    fn test_ai_sidesteps_block_overhead() {
        let mut rules = Dodge::default();
        let contestant = Contestant::new(Vector2::new(600.0, FLOOR_Y));
        rules
            .blocks
            .push(Rect::new(590.0, 300.0, BLOCK_SIZE, BLOCK_SIZE));
        assert_eq!(rules.ai_input(&contestant), Vector2::new(1.0, 0.0));

        rules.blocks.clear();
        assert_eq!(rules.ai_input(&contestant), Vector2::new(0.0, 0.0));

        let far_right = Contestant::new(Vector2::new(1100.0, FLOOR_Y));
        assert_eq!(rules.ai_input(&far_right), Vector2::new(-1.0, 0.0));
    }
}
