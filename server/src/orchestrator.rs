//! Session orchestrator
//!
//! Owns everything that outlives a single minigame: the player registry,
//! the lobby phase, the rotation pool and the session ranking. Connection
//! tasks call into it for every request and the tick loop calls [`tick`]
//! once per frame; both do so while holding the shared write lock, so each
//! call observes and leaves a consistent state.
//!
//! [`tick`]: Orchestrator::tick

use crate::error::GameError;
use crate::minigames::{Entrant, Minigame, MinigameId, RequestContext};
use crate::ranking;
use crate::registry::PlayerRegistry;
use crate::ServerConfig;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::protocol::{PlayerInfo, ServerInfo, REPLY_CLOSING, REPLY_OK};
use shared::{Character, LobbyPhase, PlayerKey, Request, SEATS};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub struct Orchestrator {
    registry: PlayerRegistry,
    phase: LobbyPhase,
    /// Session ranking by accumulated currency, 1 being the best.
    ranking: BTreeMap<PlayerKey, u32>,
    pool: Vec<MinigameId>,
    played: Vec<MinigameId>,
    active: Option<Box<dyn Minigame>>,
    running: bool,
    /// When the last connected human left, or startup.
    empty_since: Option<Instant>,
    idle_timeout: Duration,
    minigame_duration: Duration,
    measured_fps: f32,
    rng: StdRng,
}

impl Orchestrator {
    pub fn new(config: &ServerConfig, now: Instant) -> Self {
        Self::with_rng(config, StdRng::from_entropy(), now)
    }

    pub fn with_rng(config: &ServerConfig, rng: StdRng, now: Instant) -> Self {
        Self {
            registry: PlayerRegistry::new(SEATS),
            phase: LobbyPhase::CharacterSelect,
            ranking: BTreeMap::new(),
            pool: MinigameId::ALL.to_vec(),
            played: Vec::new(),
            active: None,
            running: true,
            empty_since: Some(now),
            idle_timeout: config.idle_timeout,
            minigame_duration: config.minigame_duration,
            measured_fps: config.tick_rate as f32,
            rng,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn lobby_phase(&self) -> LobbyPhase {
        self.phase
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn ranking(&self) -> &BTreeMap<PlayerKey, u32> {
        &self.ranking
    }

    pub fn played(&self) -> &[MinigameId] {
        &self.played
    }

    pub fn active(&self) -> Option<&dyn Minigame> {
        self.active.as_deref()
    }

    pub fn set_measured_fps(&mut self, fps: f32) {
        self.measured_fps = fps;
    }

    /// Admits a new human player while the lobby is open.
    pub fn connect(&mut self) -> Result<PlayerKey, GameError> {
        if self.phase != LobbyPhase::CharacterSelect {
            return Err(GameError::AdmissionClosed);
        }
        self.registry.add_human().ok_or(GameError::LobbyFull(SEATS))
    }

    pub fn set_name(&mut self, key: &PlayerKey, name: &str) -> Result<(), GameError> {
        let player = self
            .registry
            .get_mut(key)
            .ok_or(GameError::UnknownPlayer(*key))?;
        player.name = name.trim().to_string();
        info!("Player {} is called '{}'", key, player.name);
        Ok(())
    }

    pub fn set_character(&mut self, key: &PlayerKey, character: Character) -> Result<(), GameError> {
        let player = self
            .registry
            .get_mut(key)
            .ok_or(GameError::UnknownPlayer(*key))?;
        player.character = Some(character);
        debug!("Player {} picked {}", key, character.as_str());
        Ok(())
    }

    /// Flags the player ready in the lobby and in the running minigame.
    pub fn set_ready(&mut self, key: &PlayerKey) -> Result<(), GameError> {
        if !self.registry.set_ready(key) {
            return Err(GameError::UnknownPlayer(*key));
        }
        if let Some(game) = self.active.as_mut() {
            game.set_ready(key)?;
        }
        Ok(())
    }

    /// Handles a dropped connection: the player leaves the lobby, or is
    /// taken over by the AI once the game started.
    pub fn disconnect(&mut self, key: &PlayerKey) {
        match self.phase {
            LobbyPhase::CharacterSelect => {
                self.registry.remove(key);
            }
            LobbyPhase::MinigameSelect => {
                self.registry.hand_over_to_ai(key);
                if let Some(game) = self.active.as_mut() {
                    if let Err(err) = game.hand_over_to_ai(key) {
                        warn!("Could not hand player {} to the AI: {}", key, err);
                    }
                }
            }
        }
    }

    /// Name of the phase clients should display.
    pub fn phase_name(&self) -> &'static str {
        match &self.active {
            Some(game) => game.phase().as_str(),
            None => self.phase.as_str(),
        }
    }

    pub fn info(&self) -> ServerInfo {
        let joueurs = self
            .registry
            .players()
            .map(|player| {
                (
                    player.key,
                    PlayerInfo {
                        perso: player
                            .character
                            .map(|c| c.as_str().to_string())
                            .unwrap_or_default(),
                        pseudo: player.name.clone(),
                        argent: player.currency,
                        ia: player.is_ai,
                    },
                )
            })
            .collect();

        ServerInfo {
            nb_joueurs: self.registry.connected_count(),
            nb_ready: self.registry.ready_count(),
            joueurs,
            mini_jeu: self
                .active
                .as_ref()
                .map(|game| game.id().as_str().to_string())
                .unwrap_or_default(),
            classement: self.ranking.clone(),
        }
    }

    /// Passes a request the orchestrator does not know to the running minigame.
    pub fn forward(&mut self, key: PlayerKey, raw: &str, now: Instant) -> Result<String, GameError> {
        let ctx = RequestContext {
            now,
            fps: self.measured_fps,
        };
        match self.active.as_mut() {
            Some(game) => game.handle_command(key, raw, &ctx),
            None => Err(GameError::NoActiveMinigame),
        }
    }

    /// Executes one decoded request for `key` and returns the reply.
    ///
    /// `close` is only acknowledged here; the connection closes itself.
    pub fn dispatch(
        &mut self,
        key: PlayerKey,
        request: Request,
        now: Instant,
    ) -> Result<String, GameError> {
        match request {
            Request::GetState => Ok(self.phase_name().to_string()),
            Request::ServerInfo => Ok(serde_json::to_string(&self.info())?),
            Request::SetCharacter(character) => {
                self.set_character(&key, character)?;
                Ok(REPLY_OK.to_string())
            }
            Request::Ready => {
                self.set_ready(&key)?;
                Ok(REPLY_OK.to_string())
            }
            Request::Close => Ok(REPLY_CLOSING.to_string()),
            Request::Forward(raw) => self.forward(key, &raw, now),
        }
    }

    /// One scheduler tick.
    pub fn tick(&mut self, now: Instant) {
        if !self.running {
            return;
        }

        self.check_idle(now);
        if !self.running {
            return;
        }

        match self.phase {
            LobbyPhase::CharacterSelect => {
                if self.registry.all_ready() {
                    self.start_game();
                }
            }
            LobbyPhase::MinigameSelect => self.step_rotation(now),
        }
    }

    fn check_idle(&mut self, now: Instant) {
        if self.registry.connected_count() > 0 {
            self.empty_since = None;
            return;
        }

        let since = *self.empty_since.get_or_insert(now);
        if now.duration_since(since) > self.idle_timeout {
            info!(
                "No players for {:?}, shutting down",
                now.duration_since(since)
            );
            self.running = false;
        }
    }

    fn start_game(&mut self) {
        let added = self.registry.fill_with_ai(SEATS, &mut self.rng);
        self.ranking = self.registry.players().map(|p| (p.key, 1)).collect();
        self.registry.reset_ready();
        self.phase = LobbyPhase::MinigameSelect;
        info!(
            "Lobby closed with {} players ({} AI added)",
            self.registry.len(),
            added.len()
        );
    }

    fn step_rotation(&mut self, now: Instant) {
        let finished = match self.active.as_mut() {
            Some(game) => {
                game.step(now);
                game.is_finished()
            }
            None => {
                self.launch_next();
                false
            }
        };

        if finished {
            self.finish_minigame();
        }
    }

    fn launch_next(&mut self) {
        if self.pool.is_empty() {
            self.running = false;
            return;
        }

        let id = self.pool[self.rng.gen_range(0..self.pool.len())];
        let entrants: Vec<Entrant> = self
            .registry
            .players()
            .map(|p| Entrant {
                key: p.key,
                character: p.character,
                is_ai: p.is_ai,
            })
            .collect();
        let rng = StdRng::seed_from_u64(self.rng.gen());

        self.active = Some(id.create(&entrants, self.minigame_duration, rng));
    }

    fn finish_minigame(&mut self) {
        let Some(game) = self.active.take() else {
            return;
        };
        let id = game.id();

        ranking::award(&mut self.registry, game.ranking());
        self.ranking = ranking::session_ranking(&self.registry);
        self.pool.retain(|candidate| *candidate != id);
        self.played.push(id);
        self.registry.reset_ready();

        info!(
            "Minigame {} done, {} left, ranking {:?}",
            id.as_str(),
            self.pool.len(),
            self.ranking
        );

        if self.pool.is_empty() {
            info!("Every minigame has been played");
            self.running = false;
        }
    }
}
