//! Two-versus-two ball game.
//!
//! Four strikers guard a side-scrolling field, two per side: one in the
//! outer lane in front of their goal and one in the inner lane closer to
//! the middle. Strikers only move along their lane (the y axis). The ball
//! bounces off walls, goal posts and strikers, speeding up on every bounce.
//! A side wins by scoring three goals or by leading when the clock runs out.

use super::{Entrant, Minigame, MinigameId, Placement, RequestContext, SessionCore, WalkCycle};
use crate::error::GameError;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::Rng;
use shared::physics::{steer, AxisHits, Body, Rect, Vector2};
use shared::protocol::{BallGameSnapshot, BallPlayerView, MinigameRequest, REPLY_OK};
use shared::{MinigamePhase, PlayerKey, FIELD_HEIGHT, FIELD_WIDTH, WALL_THICKNESS};
use std::collections::BTreeMap;
use std::iter;
use std::time::{Duration, Instant};

pub const BALL_SIZE: f32 = 24.0;
pub const BALL_INITIAL_SPEED: f32 = 6.0;
pub const BALL_SPEED_INCREMENT: f32 = 0.3;

pub const PLAYER_WIDTH: f32 = 24.0;
pub const PLAYER_HEIGHT: f32 = 96.0;
pub const PLAYER_SPEED: f32 = 7.0;
pub const AI_DEAD_ZONE: f32 = 25.0;

pub const GOAL_DEPTH: f32 = 30.0;
pub const GOAL_MOUTH: f32 = 240.0;
pub const LEFT_GOAL_X: f32 = GOAL_DEPTH;
pub const RIGHT_GOAL_X: f32 = FIELD_WIDTH - GOAL_DEPTH - BALL_SIZE;
/// The game ends as soon as a side scores more than this.
pub const SCORE_LIMIT: u32 = 2;

pub const HIT_SOUND_COOLDOWN: Duration = Duration::from_millis(200);

/// Kick-off directions before normalization; x is mirrored half the time.
pub const DIRECTION_PRESETS: [(f32, f32); 3] = [(1.0, 1.0), (1.0, -1.0), (1.0, 0.5)];

const SPAWN_X: [f32; 4] = [
    80.0,
    400.0,
    FIELD_WIDTH - 400.0 - PLAYER_WIDTH,
    FIELD_WIDTH - 80.0 - PLAYER_WIDTH,
];
const LANE_MIN_Y: f32 = WALL_THICKNESS;
const LANE_MAX_Y: f32 = FIELD_HEIGHT - WALL_THICKNESS - PLAYER_HEIGHT;

/// Draws a kick-off direction from the presets.
pub fn random_direction<R: Rng>(rng: &mut R) -> Vector2 {
    let (x, y) = DIRECTION_PRESETS[rng.gen_range(0..DIRECTION_PRESETS.len())];
    let x = if rng.gen_bool(0.5) { -x } else { x };
    Vector2::new(x, y).normalize()
}

/// Top and bottom walls plus the four goal posts framing both goal mouths.
pub fn static_colliders() -> Vec<Rect> {
    let mouth_top = (FIELD_HEIGHT - GOAL_MOUTH) / 2.0;
    let mouth_bottom = mouth_top + GOAL_MOUTH;
    let post_top = mouth_top - WALL_THICKNESS;
    let post_bottom = FIELD_HEIGHT - WALL_THICKNESS - mouth_bottom;
    let right_x = FIELD_WIDTH - GOAL_DEPTH;

    vec![
        Rect::new(0.0, 0.0, FIELD_WIDTH, WALL_THICKNESS),
        Rect::new(0.0, FIELD_HEIGHT - WALL_THICKNESS, FIELD_WIDTH, WALL_THICKNESS),
        Rect::new(0.0, WALL_THICKNESS, GOAL_DEPTH, post_top),
        Rect::new(0.0, mouth_bottom, GOAL_DEPTH, post_bottom),
        Rect::new(right_x, WALL_THICKNESS, GOAL_DEPTH, post_top),
        Rect::new(right_x, mouth_bottom, GOAL_DEPTH, post_bottom),
    ]
}

/// The shared ball.
#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub body: Body,
    pub direction: Vector2,
    pub speed: f32,
}

impl Ball {
    pub fn spawn_position() -> Vector2 {
        Vector2::new(
            (FIELD_WIDTH - BALL_SIZE) / 2.0,
            (FIELD_HEIGHT - BALL_SIZE) / 2.0,
        )
    }

    pub fn new() -> Self {
        Self {
            body: Body::new(Self::spawn_position(), BALL_SIZE, BALL_SIZE),
            direction: Vector2::ZERO,
            speed: BALL_INITIAL_SPEED,
        }
    }

    /// Back to the centre spot with a fresh kick-off direction.
    pub fn reset<R: Rng>(&mut self, rng: &mut R) {
        self.body = Body::new(Self::spawn_position(), BALL_SIZE, BALL_SIZE);
        self.speed = BALL_INITIAL_SPEED;
        self.direction = random_direction(rng);
    }

    /// Moves the ball one tick, bouncing on every blocked axis.
    pub fn advance(&mut self, colliders: &[Rect]) -> AxisHits {
        self.body.velocity = self.direction.scale(self.speed);
        let hits = self.body.resolve_axes(colliders);
        if hits.x {
            self.direction.x = -self.direction.x;
            self.speed_up();
        }
        if hits.y {
            self.direction.y = -self.direction.y;
            self.speed_up();
        }
        self.body.integrate();
        hits
    }

    fn speed_up(&mut self) {
        self.speed += BALL_SPEED_INCREMENT;
    }
}

impl Default for Ball {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct Striker {
    body: Body,
    input: Vector2,
    side: u8,
    inner: bool,
    walk: WalkCycle,
    hit_sound: bool,
    goal_sound: bool,
}

impl Striker {
    fn at_slot(slot: u8) -> Self {
        let slot = usize::from(slot.min(3));
        Self {
            body: Body::new(
                Vector2::new(SPAWN_X[slot], (FIELD_HEIGHT - PLAYER_HEIGHT) / 2.0),
                PLAYER_WIDTH,
                PLAYER_HEIGHT,
            ),
            input: Vector2::ZERO,
            side: if slot < 2 { 0 } else { 1 },
            inner: slot == 1 || slot == 2,
            walk: WalkCycle::default(),
            hit_sound: false,
            goal_sound: false,
        }
    }
}

pub struct BallGame {
    core: SessionCore,
    strikers: BTreeMap<PlayerKey, Striker>,
    ball: Ball,
    score: [u32; 2],
    colliders: Vec<Rect>,
    last_hit_sound: Option<Instant>,
    rng: StdRng,
}

impl BallGame {
    pub fn new(entrants: &[Entrant], duration: Duration, mut rng: StdRng) -> Self {
        let core = SessionCore::new(entrants, duration, &mut rng);
        let strikers = core
            .seats()
            .map(|seat| (seat.key, Striker::at_slot(seat.slot)))
            .collect();

        Self {
            core,
            strikers,
            ball: Ball::new(),
            score: [0, 0],
            colliders: static_colliders(),
            last_hit_sound: None,
            rng,
        }
    }

    pub fn score(&self) -> [u32; 2] {
        self.score
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    fn place_strikers(&mut self) {
        for seat in self.core.seats() {
            self.strikers.insert(seat.key, Striker::at_slot(seat.slot));
        }
    }

    fn signal_hit(&mut self, now: Instant) {
        let cooled_down = self
            .last_hit_sound
            .map_or(true, |last| now.duration_since(last) >= HIT_SOUND_COOLDOWN);
        if cooled_down {
            self.last_hit_sound = Some(now);
            for striker in self.strikers.values_mut() {
                striker.hit_sound = true;
            }
        }
    }

    fn step_ball(&mut self, now: Instant) {
        let colliders: Vec<Rect> = self
            .colliders
            .iter()
            .copied()
            .chain(self.strikers.values().map(|s| s.body.bounds()))
            .collect();

        if self.ball.advance(&colliders).any() {
            self.signal_hit(now);
        }
    }

    /// Scores a goal if the ball went past either goal line.
    fn check_goal(&mut self) -> Option<usize> {
        let x = self.ball.body.position.x;
        let scorer = if x > RIGHT_GOAL_X {
            0
        } else if x < LEFT_GOAL_X {
            1
        } else {
            return None;
        };

        self.score[scorer] += 1;
        self.ball.reset(&mut self.rng);
        for striker in self.strikers.values_mut() {
            striker.goal_sound = true;
        }
        info!(
            "Goal for side {}, score {}-{}",
            scorer, self.score[0], self.score[1]
        );
        Some(scorer)
    }

    /// Inner strikers meet a ball coming at their side and clear the way
    /// otherwise; outer strikers always track it.
    fn ai_input(&self, striker: &Striker) -> Vector2 {
        let delta = self.ball.body.bounds().center().y - striker.body.bounds().center().y;
        let chase = steer(delta, AI_DEAD_ZONE);
        let approaching = if striker.side == 0 {
            self.ball.direction.x < 0.0
        } else {
            self.ball.direction.x > 0.0
        };

        if striker.inner && !approaching {
            Vector2::new(0.0, -chase)
        } else {
            Vector2::new(0.0, chase)
        }
    }

    fn move_strikers(&mut self) {
        let inputs: Vec<(PlayerKey, Vector2)> = self
            .core
            .seats()
            .filter_map(|seat| {
                let striker = self.strikers.get(&seat.key)?;
                let input = if seat.is_ai {
                    self.ai_input(striker)
                } else {
                    striker.input
                };
                Some((seat.key, input))
            })
            .collect();

        for (key, input) in inputs {
            let colliders: Vec<Rect> = self
                .colliders
                .iter()
                .copied()
                .chain(iter::once(self.ball.body.bounds()))
                .chain(
                    self.strikers
                        .iter()
                        .filter(|(other, _)| **other != key)
                        .map(|(_, s)| s.body.bounds()),
                )
                .collect();

            let Some(striker) = self.strikers.get_mut(&key) else {
                continue;
            };
            striker.body.velocity = Vector2::new(0.0, input.y * PLAYER_SPEED);
            striker.body.resolve_axes(&colliders);
            let moved = !striker.body.velocity.is_zero();
            striker.body.integrate();
            striker.body.position.y = striker.body.position.y.clamp(LANE_MIN_Y, LANE_MAX_Y);
            striker.walk.update(moved);
        }
    }

    fn snapshot(&self, ctx: &RequestContext) -> BallGameSnapshot {
        let joueurs = self
            .core
            .seats()
            .filter_map(|seat| {
                let striker = self.strikers.get(&seat.key)?;
                Some((
                    seat.key,
                    BallPlayerView {
                        perso: seat.character_name(),
                        equipe: striker.side,
                        position: [striker.body.position.x, striker.body.position.y],
                        frame: striker.walk.frame(),
                        son_hit: striker.hit_sound,
                        son_but: striker.goal_sound,
                    },
                ))
            })
            .collect();

        BallGameSnapshot {
            joueurs,
            balle: [self.ball.body.position.x, self.ball.body.position.y],
            score: self.score,
            temps_restant: self.core.remaining_secs(ctx.now),
            classement: self.core.wire_ranking(),
            fps: ctx.fps,
        }
    }

    fn striker_mut(&mut self, key: &PlayerKey) -> Result<&mut Striker, GameError> {
        self.strikers
            .get_mut(key)
            .ok_or(GameError::UnknownPlayer(*key))
    }
}

impl Minigame for BallGame {
    fn id(&self) -> MinigameId {
        MinigameId::BallGame
    }

    fn core(&self) -> &SessionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SessionCore {
        &mut self.core
    }

    fn on_enter(&mut self, phase: MinigamePhase, now: Instant) {
        match phase {
            MinigamePhase::Load => self.place_strikers(),
            MinigamePhase::During => {
                self.ball.reset(&mut self.rng);
                self.core.arm_countdown(now);
                info!("Ball game kick-off");
            }
            MinigamePhase::Score => {
                info!(
                    "Ball game finished {}-{}: {:?}",
                    self.score[0],
                    self.score[1],
                    self.core.ranking()
                );
            }
            _ => {}
        }
    }

    fn simulate(&mut self, now: Instant) {
        let over_limit = self.score.iter().any(|s| *s > SCORE_LIMIT);
        if self.core.deadline_passed(now) || over_limit {
            self.ball.direction = Vector2::ZERO;
            self.core.stop_countdown();
            // The result is final, so the reveal phase is skipped.
            self.enter_phase(MinigamePhase::Score, now);
            return;
        }

        self.step_ball(now);
        self.check_goal();
        self.move_strikers();
    }

    fn compute_ranking(&self) -> BTreeMap<PlayerKey, Placement> {
        let [left, right] = self.score;
        self.strikers
            .iter()
            .map(|(key, striker)| {
                let placement = if left == right {
                    Placement::Draw
                } else if (left > right) == (striker.side == 0) {
                    Placement::Won
                } else {
                    Placement::Lost
                };
                (*key, placement)
            })
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
            MinigameRequest::MuteHit => {
                self.striker_mut(&key)?.hit_sound = false;
                Ok(REPLY_OK.to_string())
            }
            MinigameRequest::MuteGoal => {
                self.striker_mut(&key)?.goal_sound = false;
                Ok(REPLY_OK.to_string())
            }
            MinigameRequest::Input(input) => {
                let striker = self.striker_mut(&key)?;
                if !is_ai {
                    striker.input = input.as_vector();
                }
                debug!("Input {:?} from player {}", input, key);
                Ok(serde_json::to_string(&self.snapshot(ctx))?)
            }
            MinigameRequest::Unknown(command) => Err(GameError::UnknownCommand(command)),
        }
    }

    fn hand_over_to_ai(&mut self, key: &PlayerKey) -> Result<(), GameError> {
        self.core.hand_over_to_ai(key)?;
        self.striker_mut(key)?.input = Vector2::ZERO;
        Ok(())
    }
}
