//! Free-for-all arena engine
//!
//! The four free-for-all minigames share everything except their objects
//! and scoring rule: contestants walk around a walled field with
//! normalized 2D input, collide with walls, static obstacles and each
//! other, and are ranked by whatever the rules count. [`FreeForAll`] runs
//! the phase machine and the movement; an [`ArenaRules`] implementation
//! supplies the rest.

use super::{Entrant, Minigame, MinigameId, Placement, RequestContext, SessionCore, WalkCycle};
use crate::error::GameError;
use log::{debug, info};
use rand::rngs::StdRng;
use shared::physics::{steer, Body, Rect, Vector2};
use shared::protocol::{ArenaSnapshot, ContestantView, MinigameRequest, REPLY_OK};
use shared::{
    field_walls, rank_with_ties, MinigamePhase, PlayerKey, FIELD_HEIGHT, FIELD_WIDTH,
    WALL_THICKNESS,
};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub const CONTESTANT_SIZE: f32 = 40.0;
pub const CONTESTANT_SPEED: f32 = 6.0;

/// A player's avatar in a free-for-all minigame.
#[derive(Debug, Clone, PartialEq)]
pub struct Contestant {
    pub body: Body,
    /// Latest input of a human player, ignored for AI players.
    pub input: Vector2,
    pub points: u32,
    /// Eliminated or finished; the avatar no longer moves or collides.
    pub out: bool,
    pub walk: WalkCycle,
}

impl Contestant {
    pub fn new(position: Vector2) -> Self {
        Self {
            body: Body::new(position, CONTESTANT_SIZE, CONTESTANT_SIZE),
            input: Vector2::ZERO,
            points: 0,
            out: false,
            walk: WalkCycle::default(),
        }
    }

    pub fn center(&self) -> Vector2 {
        self.body.bounds().center()
    }

    /// Input walking this contestant's centre towards `target`.
    pub fn walk_towards(&self, target: Vector2) -> Vector2 {
        let center = self.center();
        Vector2::new(
            steer(target.x - center.x, CONTESTANT_SPEED / 2.0),
            steer(target.y - center.y, CONTESTANT_SPEED / 2.0),
        )
    }
}

pub type Contestants = BTreeMap<PlayerKey, Contestant>;

/// What makes one free-for-all minigame different from another.
pub trait ArenaRules: Send + Sync {
    fn id(&self) -> MinigameId;

    /// Top-left corner of the contestant seated at `slot`.
    fn spawn(&self, slot: u8) -> Vector2;

    /// Called once when `minigame_during` begins.
    fn on_start(&mut self, _rng: &mut StdRng) {}

    /// Restricts an input before it is normalized.
    fn constrain(&self, input: Vector2) -> Vector2 {
        input
    }

    /// Boxes contestants cannot walk through, besides the field walls.
    fn obstacles(&self) -> Vec<Rect> {
        Vec::new()
    }

    /// Applies the rules once every contestant has moved.
    fn step(&mut self, contestants: &mut Contestants, rng: &mut StdRng);

    /// Ends the game before the deadline.
    fn is_over(&self, _contestants: &Contestants) -> bool {
        false
    }

    fn ai_input(&self, contestant: &Contestant) -> Vector2;

    /// Score per player, higher is better. Defaults to collected points.
    fn standings(&self, contestants: &Contestants) -> BTreeMap<PlayerKey, u32> {
        contestants
            .iter()
            .map(|(key, contestant)| (*key, contestant.points))
            .collect()
    }

    /// Boxes shown to clients: coins, blocks, barriers, zones.
    fn objects(&self) -> Vec<Rect>;
}

/// A free-for-all minigame session driven by `R`.
pub struct FreeForAll<R: ArenaRules> {
    core: SessionCore,
    contestants: Contestants,
    rules: R,
    walls: Vec<Rect>,
    rng: StdRng,
}

impl<R: ArenaRules> FreeForAll<R> {
    pub fn new(entrants: &[Entrant], duration: Duration, mut rng: StdRng, rules: R) -> Self {
        let core = SessionCore::new(entrants, duration, &mut rng);
        let contestants = core
            .seats()
            .map(|seat| (seat.key, Contestant::new(rules.spawn(seat.slot))))
            .collect();

        Self {
            core,
            contestants,
            rules,
            walls: field_walls(),
            rng,
        }
    }

    pub fn contestants(&self) -> &Contestants {
        &self.contestants
    }

    pub fn contestants_mut(&mut self) -> &mut Contestants {
        &mut self.contestants
    }

    fn place_contestants(&mut self) {
        for seat in self.core.seats() {
            self.contestants
                .insert(seat.key, Contestant::new(self.rules.spawn(seat.slot)));
        }
    }

    fn move_contestants(&mut self) {
        let obstacles: Vec<Rect> = self
            .walls
            .iter()
            .copied()
            .chain(self.rules.obstacles())
            .collect();

        let inputs: Vec<(PlayerKey, Vector2)> = self
            .core
            .seats()
            .filter_map(|seat| {
                let contestant = self.contestants.get(&seat.key)?;
                if contestant.out {
                    return None;
                }
                let input = if seat.is_ai {
                    self.rules.ai_input(contestant)
                } else {
                    contestant.input
                };
                Some((seat.key, self.rules.constrain(input).normalize()))
            })
            .collect();

        for (key, input) in inputs {
            let colliders: Vec<Rect> = obstacles
                .iter()
                .copied()
                .chain(
                    self.contestants
                        .iter()
                        .filter(|(other, c)| **other != key && !c.out)
                        .map(|(_, c)| c.body.bounds()),
                )
                .collect();

            let Some(contestant) = self.contestants.get_mut(&key) else {
                continue;
            };
            contestant.body.velocity = input.scale(CONTESTANT_SPEED);
            contestant.body.resolve_axes(&colliders);
            let moved = !contestant.body.velocity.is_zero();
            contestant.body.integrate();

            let position = &mut contestant.body.position;
            position.x = position
                .x
                .clamp(WALL_THICKNESS, FIELD_WIDTH - WALL_THICKNESS - CONTESTANT_SIZE);
            position.y = position
                .y
                .clamp(WALL_THICKNESS, FIELD_HEIGHT - WALL_THICKNESS - CONTESTANT_SIZE);
            contestant.walk.update(moved);
        }
    }

    fn snapshot(&self, ctx: &RequestContext) -> ArenaSnapshot {
        let joueurs = self
            .core
            .seats()
            .filter_map(|seat| {
                let contestant = self.contestants.get(&seat.key)?;
                Some((
                    seat.key,
                    ContestantView {
                        perso: seat.character_name(),
                        position: [contestant.body.position.x, contestant.body.position.y],
                        frame: contestant.walk.frame(),
                        points: contestant.points,
                        actif: !contestant.out,
                    },
                ))
            })
            .collect();

        ArenaSnapshot {
            joueurs,
            objets: self
                .rules
                .objects()
                .iter()
                .map(|r| [r.x, r.y, r.width, r.height])
                .collect(),
            temps_restant: self.core.remaining_secs(ctx.now),
            classement: self.core.wire_ranking(),
            fps: ctx.fps,
        }
    }
}

impl<R: ArenaRules> Minigame for FreeForAll<R> {
    fn id(&self) -> MinigameId {
        self.rules.id()
    }

    fn core(&self) -> &SessionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SessionCore {
        &mut self.core
    }

    fn on_enter(&mut self, phase: MinigamePhase, now: Instant) {
        match phase {
            MinigamePhase::Load => self.place_contestants(),
            MinigamePhase::During => {
                self.rules.on_start(&mut self.rng);
                self.core.arm_countdown(now);
                info!("{} started", self.rules.id().as_str());
            }
            MinigamePhase::Score => {
                info!(
                    "{} finished: {:?}",
                    self.rules.id().as_str(),
                    self.core.ranking()
                );
            }
            _ => {}
        }
    }

    fn simulate(&mut self, now: Instant) {
        if self.core.deadline_passed(now) || self.rules.is_over(&self.contestants) {
            self.core.stop_countdown();
            self.enter_phase(MinigamePhase::End, now);
            return;
        }

        self.move_contestants();
        self.rules.step(&mut self.contestants, &mut self.rng);
    }

    fn compute_ranking(&self) -> BTreeMap<PlayerKey, Placement> {
        rank_with_ties(self.rules.standings(&self.contestants))
            .into_iter()
            .map(|(key, rank)| (key, Placement::Place(u8::try_from(rank).unwrap_or(u8::MAX))))
            .collect()
    }

    fn handle_command(
        &mut self,
        key: PlayerKey,
        request: &str,
        ctx: &RequestContext,
    ) -> Result<String, GameError> {
        let is_ai = self.core.seat(&key)?.is_ai;

        match MinigameRequest::parse(request)? {
            MinigameRequest::GetState => Ok(self.core.phase().as_str().to_string()),
            // Arenas play no positional sounds; acknowledgements are accepted as is.
            MinigameRequest::MuteHit | MinigameRequest::MuteGoal => Ok(REPLY_OK.to_string()),
            MinigameRequest::Input(input) => {
                let contestant = self
                    .contestants
                    .get_mut(&key)
                    .ok_or(GameError::UnknownPlayer(key))?;
                if !is_ai {
                    contestant.input = input.as_vector();
                }
                debug!("Input {:?} from player {}", input, key);
                Ok(serde_json::to_string(&self.snapshot(ctx))?)
            }
            MinigameRequest::Unknown(command) => Err(GameError::UnknownCommand(command)),
        }
    }

    fn hand_over_to_ai(&mut self, key: &PlayerKey) -> Result<(), GameError> {
        self.core.hand_over_to_ai(key)?;
        if let Some(contestant) = self.contestants.get_mut(key) {
            contestant.input = Vector2::ZERO;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{drive_to, entrants};
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;

    /// Open field, no objects, nobody scores.
    struct Empty;

    impl ArenaRules for Empty {
        fn id(&self) -> MinigameId {
            MinigameId::CoinRush
        }

        fn spawn(&self, slot: u8) -> Vector2 {
            Vector2::new(100.0 + f32::from(slot) * 200.0, 300.0)
        }

        fn step(&mut self, _contestants: &mut Contestants, _rng: &mut StdRng) {}

        fn ai_input(&self, _contestant: &Contestant) -> Vector2 {
            Vector2::ZERO
        }

        fn objects(&self) -> Vec<Rect> {
            Vec::new()
        }
    }

    fn new_arena() -> FreeForAll<Empty> {
        FreeForAll::new(
            &entrants(),
            Duration::from_secs(30),
            StdRng::seed_from_u64(2),
            Empty,
        )
    }

    fn context(now: Instant) -> RequestContext {
        RequestContext { now, fps: 59.5 }
    }

    #[test]
    fn test_diagonal_input_is_normalized() {
        let now = Instant::now();
        let mut arena = new_arena();
        drive_to(&mut arena, MinigamePhase::During, now);
        let before = arena.contestants()[&PlayerKey(1)].body.position;

        arena
            .handle_command(PlayerKey(1), "1|1", &context(now))
            .unwrap();
        arena.step(now);

        let after = arena.contestants()[&PlayerKey(1)].body.position;
        let step = CONTESTANT_SPEED * std::f32::consts::FRAC_1_SQRT_2;
        assert_approx_eq!(after.x - before.x, step, 1e-4);
        assert_approx_eq!(after.y - before.y, step, 1e-4);
    }

    #[test]
    fn test_contestants_stay_inside_field() {
        let now = Instant::now();
        let mut arena = new_arena();
        drive_to(&mut arena, MinigamePhase::During, now);
        arena
            .handle_command(PlayerKey(1), "-1|-1", &context(now))
            .unwrap();

        for _ in 0..300 {
            arena.step(now);
        }

        let position = arena.contestants()[&PlayerKey(1)].body.position;
        assert!(position.x >= WALL_THICKNESS);
        assert!(position.y >= WALL_THICKNESS);
    }

    #[test]
    fn test_contestants_block_each_other() {
        let now = Instant::now();
        let mut arena = new_arena();
        drive_to(&mut arena, MinigamePhase::During, now);
        let other = arena.contestants()[&PlayerKey(2)].body.position;
        arena.contestants_mut().get_mut(&PlayerKey(1)).unwrap().body.position =
            Vector2::new(other.x - CONTESTANT_SIZE - 1.0, other.y);

        arena
            .handle_command(PlayerKey(1), "1|0", &context(now))
            .unwrap();
        arena.step(now);

        let position = arena.contestants()[&PlayerKey(1)].body.position;
        assert_eq!(position.x, other.x - CONTESTANT_SIZE - 1.0);
    }

    #[test]
    fn test_deadline_leads_to_end_phase() {
        let now = Instant::now();
        let mut arena = new_arena();
        drive_to(&mut arena, MinigamePhase::During, now);

        arena.step(now + Duration::from_secs(31));

        assert_eq!(arena.phase(), MinigamePhase::End);
        arena.step(now + Duration::from_secs(32));
        assert_eq!(arena.phase(), MinigamePhase::End);

        arena.set_ready(&PlayerKey(1)).unwrap();
        arena.step(now + Duration::from_secs(32));
        assert_eq!(arena.phase(), MinigamePhase::Score);
        assert!(arena
            .ranking()
            .values()
            .all(|placement| *placement == Placement::Place(1)));
    }

    #[test]
    fn test_ranking_uses_points_with_ties() {
        let mut arena = new_arena();
        for (key, points) in [(1, 4), (2, 9), (3, 4), (4, 0)] {
            arena
                .contestants_mut()
                .get_mut(&PlayerKey(key))
                .unwrap()
                .points = points;
        }

        let ranking = arena.compute_ranking();

        assert_eq!(ranking[&PlayerKey(2)], Placement::Place(1));
        assert_eq!(ranking[&PlayerKey(1)], Placement::Place(2));
        assert_eq!(ranking[&PlayerKey(3)], Placement::Place(2));
        assert_eq!(ranking[&PlayerKey(4)], Placement::Place(4));
    }

    #[test]
    fn test_snapshot_reply() {
        let now = Instant::now();
        let mut arena = new_arena();
        drive_to(&mut arena, MinigamePhase::During, now);

        let reply = arena
            .handle_command(PlayerKey(1), "0|0", &context(now))
            .unwrap();
        let snapshot: ArenaSnapshot = serde_json::from_str(&reply).unwrap();

        assert_eq!(snapshot.joueurs.len(), 4);
        assert!(snapshot.joueurs.values().all(|c| c.actif));
        assert_eq!(snapshot.temps_restant, 30);
        assert_eq!(snapshot.fps, 59.5);
        assert!(snapshot.objets.is_empty());
    }

    #[test]
    fn test_requests_from_strangers_are_rejected() {
        let now = Instant::now();
        let mut arena = new_arena();
        assert_eq!(
            arena.handle_command(PlayerKey(7), "get_etat", &context(now)),
            Err(GameError::UnknownPlayer(PlayerKey(7)))
        );
        assert!(matches!(
            arena.handle_command(PlayerKey(1), "1|x", &context(now)),
            Err(GameError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_hand_over_clears_input() {
        let now = Instant::now();
        let mut arena = new_arena();
        arena
            .handle_command(PlayerKey(1), "1|0", &context(now))
            .unwrap();

        arena.hand_over_to_ai(&PlayerKey(1)).unwrap();

        assert_eq!(arena.contestants()[&PlayerKey(1)].input, Vector2::ZERO);
        assert!(arena.core().seat(&PlayerKey(1)).unwrap().is_ai);
    }

    #[test]
    fn test_walk_towards_respects_dead_zone() {
        let contestant = Contestant::new(Vector2::new(100.0, 100.0));
        let center = contestant.center();
        assert_eq!(
            contestant.walk_towards(Vector2::new(center.x + 50.0, center.y + 1.0)),
            Vector2::new(1.0, 0.0)
        );
    }
}
