//! Minigame sessions
//!
//! Every minigame goes through the same seven phases
//! (`minigame_select` .. `minigame_winners`). The shared bookkeeping for
//! that walk lives in [`SessionCore`]: the seats, their ready flags, the
//! countdown and the final ranking. Each variant implements [`Minigame`]
//! on top of it and only supplies what differs: entities, simulation step,
//! request handling and scoring rule.
//!
//! Variants are looked up by [`MinigameId`], so the orchestrator never
//! names a concrete game type.

pub mod arena;
pub mod ball_game;
pub mod coin_rush;
pub mod dodge;
pub mod king_of_hill;
pub mod race;

use crate::error::GameError;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use shared::{Character, MinigamePhase, PlayerKey};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Upper bound used when a configured minigame duration overflows the clock.
pub const LONGEST_COUNTDOWN: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Outcome of one player in one minigame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Won,
    Lost,
    Draw,
    /// Position in a free-for-all, 1 being the best.
    Place(u8),
}

impl Placement {
    /// Value reported in the minigame's `classement`.
    pub fn wire_value(&self) -> u8 {
        match self {
            Placement::Won => 1,
            Placement::Lost | Placement::Draw => 0,
            Placement::Place(rank) => *rank,
        }
    }

    /// Rank tier used by the orchestrator's currency table.
    pub fn tier(&self) -> u32 {
        match self {
            Placement::Won => 1,
            Placement::Draw => 2,
            Placement::Lost => 3,
            Placement::Place(rank) => u32::from(*rank),
        }
    }
}

/// What a minigame is told about each participant when it is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entrant {
    pub key: PlayerKey,
    pub character: Option<Character>,
    pub is_ai: bool,
}

/// A participant as seen by a minigame.
#[derive(Debug, Clone, PartialEq)]
pub struct Seat {
    pub key: PlayerKey,
    pub character: Option<Character>,
    pub is_ai: bool,
    /// Position in the shuffled seating, stable for the whole minigame.
    pub slot: u8,
    pub ready: bool,
}

impl Seat {
    pub fn is_ready(&self) -> bool {
        self.is_ai || self.ready
    }

    pub fn character_name(&self) -> String {
        self.character
            .map(|c| c.as_str().to_string())
            .unwrap_or_default()
    }
}

/// Walk animation shared by every character sprite.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WalkCycle {
    moving_ticks: u32,
    frame: u8,
}

impl WalkCycle {
    const FRAMES: u32 = 4;
    const TICKS_PER_FRAME: u32 = 8;

    pub fn frame(&self) -> u8 {
        self.frame
    }

    /// Advances while moving, snaps back to the idle frame otherwise.
    pub fn update(&mut self, moving: bool) {
        if moving {
            self.moving_ticks += 1;
            self.frame = ((self.moving_ticks / Self::TICKS_PER_FRAME) % Self::FRAMES) as u8;
        } else {
            *self = WalkCycle::default();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Countdown {
    Idle(Duration),
    Running(Instant),
    Stopped,
}

/// Values a minigame needs from the outside to answer a request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    pub now: Instant,
    /// Tick rate measured by the scheduler.
    pub fps: f32,
}

/// Phase, seats, countdown and ranking of one minigame.
#[derive(Debug, Clone)]
pub struct SessionCore {
    phase: MinigamePhase,
    seats: BTreeMap<PlayerKey, Seat>,
    countdown: Countdown,
    ranking: BTreeMap<PlayerKey, Placement>,
}

impl SessionCore {
    /// Seats the entrants in a shuffled order; slot ids form a permutation
    /// of `0..entrants.len()`.
    pub fn new(entrants: &[Entrant], duration: Duration, rng: &mut StdRng) -> Self {
        let mut slots: Vec<u8> = (0..entrants.len() as u8).collect();
        slots.shuffle(rng);

        let seats = entrants
            .iter()
            .zip(slots)
            .map(|(entrant, slot)| {
                (
                    entrant.key,
                    Seat {
                        key: entrant.key,
                        character: entrant.character,
                        is_ai: entrant.is_ai,
                        slot,
                        ready: false,
                    },
                )
            })
            .collect();

        Self {
            phase: MinigamePhase::Select,
            seats,
            countdown: Countdown::Idle(duration),
            ranking: BTreeMap::new(),
        }
    }

    pub fn phase(&self) -> MinigamePhase {
        self.phase
    }

    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.seats.values()
    }

    pub fn seat(&self, key: &PlayerKey) -> Result<&Seat, GameError> {
        self.seats.get(key).ok_or(GameError::UnknownPlayer(*key))
    }

    pub fn set_ready(&mut self, key: &PlayerKey) -> Result<(), GameError> {
        let seat = self
            .seats
            .get_mut(key)
            .ok_or(GameError::UnknownPlayer(*key))?;
        seat.ready = true;
        Ok(())
    }

    pub fn hand_over_to_ai(&mut self, key: &PlayerKey) -> Result<(), GameError> {
        let seat = self
            .seats
            .get_mut(key)
            .ok_or(GameError::UnknownPlayer(*key))?;
        seat.is_ai = true;
        Ok(())
    }

    pub fn all_ready(&self) -> bool {
        self.seats.values().all(Seat::is_ready)
    }

    /// Switches phase and clears every ready flag.
    pub fn advance_to(&mut self, phase: MinigamePhase) {
        debug!("Minigame phase {} -> {}", self.phase.as_str(), phase.as_str());
        self.phase = phase;
        for seat in self.seats.values_mut() {
            seat.ready = false;
        }
    }

    /// Starts the countdown: the deadline is `now` plus the configured duration.
    /// Durations too large for the clock fall back to [`LONGEST_COUNTDOWN`].
    pub fn arm_countdown(&mut self, now: Instant) {
        if let Countdown::Idle(duration) = self.countdown {
            let deadline = now
                .checked_add(duration)
                .or_else(|| now.checked_add(LONGEST_COUNTDOWN))
                .unwrap_or(now);
            self.countdown = Countdown::Running(deadline);
        }
    }

    pub fn stop_countdown(&mut self) {
        self.countdown = Countdown::Stopped;
    }

    pub fn deadline_passed(&self, now: Instant) -> bool {
        matches!(self.countdown, Countdown::Running(deadline) if now >= deadline)
    }

    /// Whole seconds left on the clock, 0 once it stopped.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        match self.countdown {
            Countdown::Idle(duration) => duration.as_secs(),
            Countdown::Running(deadline) => deadline.saturating_duration_since(now).as_secs(),
            Countdown::Stopped => 0,
        }
    }

    pub fn ranking(&self) -> &BTreeMap<PlayerKey, Placement> {
        &self.ranking
    }

    pub fn set_ranking(&mut self, ranking: BTreeMap<PlayerKey, Placement>) {
        self.ranking = ranking;
    }

    /// Ranking as reported on the wire.
    pub fn wire_ranking(&self) -> BTreeMap<PlayerKey, u8> {
        self.ranking
            .iter()
            .map(|(key, placement)| (*key, placement.wire_value()))
            .collect()
    }
}

/// The lifecycle contract every minigame implements.
///
/// Implementors provide the variant-specific hooks; the provided methods
/// drive the phase machine identically for every variant.
pub trait Minigame: Send + Sync {
    fn id(&self) -> MinigameId;

    fn core(&self) -> &SessionCore;

    fn core_mut(&mut self) -> &mut SessionCore;

    /// Called right after the session switched to `phase`.
    fn on_enter(&mut self, phase: MinigamePhase, now: Instant);

    /// One tick of `minigame_during`. Ends the phase itself once its
    /// termination condition holds.
    fn simulate(&mut self, now: Instant);

    /// Final standings, computed when `minigame_score` is entered.
    fn compute_ranking(&self) -> BTreeMap<PlayerKey, Placement>;

    /// Handles a request the orchestrator did not recognise.
    fn handle_command(
        &mut self,
        key: PlayerKey,
        request: &str,
        ctx: &RequestContext,
    ) -> Result<String, GameError>;

    fn phase(&self) -> MinigamePhase {
        self.core().phase()
    }

    fn ranking(&self) -> &BTreeMap<PlayerKey, Placement> {
        self.core().ranking()
    }

    fn set_ready(&mut self, key: &PlayerKey) -> Result<(), GameError> {
        self.core_mut().set_ready(key)
    }

    /// Marks a seat as AI-controlled from now on.
    fn hand_over_to_ai(&mut self, key: &PlayerKey) -> Result<(), GameError> {
        self.core_mut().hand_over_to_ai(key)
    }

    /// Enters `phase`, computing the ranking first if it is the score phase.
    fn enter_phase(&mut self, phase: MinigamePhase, now: Instant) {
        self.core_mut().advance_to(phase);
        if phase == MinigamePhase::Score {
            let ranking = self.compute_ranking();
            self.core_mut().set_ranking(ranking);
        }
        self.on_enter(phase, now);
    }

    /// One scheduler tick: simulate while playing, otherwise advance once
    /// every seat is ready.
    fn step(&mut self, now: Instant) {
        let phase = self.phase();
        if phase == MinigamePhase::During {
            self.simulate(now);
            return;
        }
        if !self.core().all_ready() {
            return;
        }
        if let Some(next) = phase.next() {
            self.enter_phase(next, now);
        }
    }

    /// True once the winners were shown and everyone acknowledged them.
    fn is_finished(&self) -> bool {
        self.phase() == MinigamePhase::Winners && self.core().all_ready()
    }
}

/// Identifiers of the minigames in the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MinigameId {
    BallGame,
    CoinRush,
    Dodge,
    Race,
    KingOfHill,
}

impl MinigameId {
    pub const ALL: [MinigameId; 5] = [
        MinigameId::BallGame,
        MinigameId::CoinRush,
        MinigameId::Dodge,
        MinigameId::Race,
        MinigameId::KingOfHill,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MinigameId::BallGame => "ball_game",
            MinigameId::CoinRush => "coin_rush",
            MinigameId::Dodge => "dodge",
            MinigameId::Race => "race",
            MinigameId::KingOfHill => "king_of_hill",
        }
    }

    /// Builds a fresh session of this minigame for `entrants`.
    pub fn create(
        &self,
        entrants: &[Entrant],
        duration: Duration,
        rng: StdRng,
    ) -> Box<dyn Minigame> {
        info!(
            "Creating minigame {} for {} players",
            self.as_str(),
            entrants.len()
        );
        match self {
            MinigameId::BallGame => Box::new(ball_game::BallGame::new(entrants, duration, rng)),
            MinigameId::CoinRush => Box::new(arena::FreeForAll::new(
                entrants,
                duration,
                rng,
                coin_rush::CoinRush::default(),
            )),
            MinigameId::Dodge => Box::new(arena::FreeForAll::new(
                entrants,
                duration,
                rng,
                dodge::Dodge::default(),
            )),
            MinigameId::Race => Box::new(arena::FreeForAll::new(
                entrants,
                duration,
                rng,
                race::Race::default(),
            )),
            MinigameId::KingOfHill => Box::new(arena::FreeForAll::new(
                entrants,
                duration,
                rng,
                king_of_hill::KingOfHill::default(),
            )),
        }
    }
}
