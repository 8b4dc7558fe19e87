//! Race: cross the field from left to right through the gaps of four
//! barriers. Finishers rank by arrival; the rest by how far they got.

use super::arena::{ArenaRules, Contestant, Contestants, CONTESTANT_SIZE};
use super::MinigameId;
use log::info;
use rand::rngs::StdRng;
use rand::Rng;
use shared::physics::{steer, Rect, Vector2};
use shared::{PlayerKey, FIELD_HEIGHT, WALL_THICKNESS};
use std::collections::BTreeMap;

pub const BARRIER_X: [f32; 4] = [300.0, 550.0, 800.0, 1050.0];
pub const BARRIER_WIDTH: f32 = 30.0;
pub const GAP_HEIGHT: f32 = 140.0;
pub const FINISH_X: f32 = 1180.0;
const START_X: f32 = 60.0;
/// Vertical misalignment the AI accepts before walking into a gap.
const ALIGN_TOLERANCE: f32 = 8.0;

#[derive(Debug, Clone)]
pub struct Race {
    /// Top of the gap in each barrier.
    gaps: [f32; 4],
    ticks: u32,
    finished: BTreeMap<PlayerKey, u32>,
}

impl Default for Race {
    fn default() -> Self {
        Self {
            gaps: [(FIELD_HEIGHT - GAP_HEIGHT) / 2.0; 4],
            ticks: 0,
            finished: BTreeMap::new(),
        }
    }
}

impl Race {
    fn barrier_parts(x: f32, gap: f32) -> [Rect; 2] {
        let bottom = gap + GAP_HEIGHT;
        [
            Rect::new(x, WALL_THICKNESS, BARRIER_WIDTH, gap - WALL_THICKNESS),
            Rect::new(
                x,
                bottom,
                BARRIER_WIDTH,
                FIELD_HEIGHT - WALL_THICKNESS - bottom,
            ),
        ]
    }

    pub fn gaps(&self) -> [f32; 4] {
        self.gaps
    }
}

impl ArenaRules for Race {
    fn id(&self) -> MinigameId {
        MinigameId::Race
    }

    fn spawn(&self, slot: u8) -> Vector2 {
        Vector2::new(START_X, 100.0 + f32::from(slot) * 150.0)
    }

    fn on_start(&mut self, rng: &mut StdRng) {
        let lowest = FIELD_HEIGHT - WALL_THICKNESS - 20.0 - GAP_HEIGHT;
        for gap in self.gaps.iter_mut() {
            *gap = rng.gen_range(WALL_THICKNESS + 20.0..lowest);
        }
        self.ticks = 0;
        self.finished.clear();
    }

    fn obstacles(&self) -> Vec<Rect> {
        BARRIER_X
            .iter()
            .zip(self.gaps)
            .flat_map(|(x, gap)| Self::barrier_parts(*x, gap))
            .collect()
    }

    fn step(&mut self, contestants: &mut Contestants, _rng: &mut StdRng) {
        self.ticks += 1;
        for (key, contestant) in contestants.iter_mut().filter(|(_, c)| !c.out) {
            if contestant.body.bounds().right() >= FINISH_X {
                contestant.out = true;
                self.finished.insert(*key, self.ticks);
                info!("Player {} crossed the finish line", key);
            }
        }
    }

    fn is_over(&self, contestants: &Contestants) -> bool {
        !contestants.is_empty() && contestants.values().all(|c| c.out)
    }

    fn ai_input(&self, contestant: &Contestant) -> Vector2 {
        let bounds = contestant.body.bounds();
        let next = BARRIER_X
            .iter()
            .zip(self.gaps)
            .find(|(x, _)| bounds.x < **x + BARRIER_WIDTH);

        let Some((x, gap)) = next else {
            return Vector2::new(1.0, 0.0);
        };

        let dy = gap + (GAP_HEIGHT - CONTESTANT_SIZE) / 2.0 - bounds.y;
        let aligned = dy.abs() <= ALIGN_TOLERANCE;
        let far = bounds.right() + CONTESTANT_SIZE < *x;
        Vector2::new(
            if aligned || far { 1.0 } else { 0.0 },
            steer(dy, ALIGN_TOLERANCE / 2.0),
        )
    }

    /// Finishers ahead of everyone, by arrival tick; the rest by distance.
    fn standings(&self, contestants: &Contestants) -> BTreeMap<PlayerKey, u32> {
        contestants
            .iter()
            .map(|(key, contestant)| {
                let score = match self.finished.get(key) {
                    Some(tick) => u32::MAX - tick,
                    None => contestant.body.position.x.max(0.0) as u32,
                };
                (*key, score)
            })
            .collect()
    }

    fn objects(&self) -> Vec<Rect> {
        let mut objects = self.obstacles();
        objects.push(Rect::new(
            FINISH_X,
            WALL_THICKNESS,
            4.0,
            FIELD_HEIGHT - 2.0 * WALL_THICKNESS,
        ));
        objects
    }
}
