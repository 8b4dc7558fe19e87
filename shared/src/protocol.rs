//! Text protocol spoken between the party server and its clients.
//!
//! Every request is a short UTF-8 string. Most are bare command words; the
//! character choice travels as an embedded JSON object and minigame input
//! as a `<int>|<int>` pair. This module turns those strings into typed
//! envelopes and defines the JSON shapes of the replies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::physics::Vector2;

pub const REPLY_OK: &str = "ok";
pub const REPLY_CLOSING: &str = "closing";
pub const REPLY_NOT_FOUND: &str = "not_found";
pub const REPLY_INVALID_INPUT: &str = "invalid_input";
pub const REPLY_UNKNOWN_PLAYER: &str = "unknown_player";
pub const REPLY_LOBBY_CLOSED: &str = "lobby_closed";
pub const REPLY_LOBBY_FULL: &str = "lobby_full";
pub const REPLY_SERVER_ERROR: &str = "server_error";

/// Identifies a player for the whole run. Humans get the identifier of
/// their connection, AI players the next free one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerKey(pub u32);

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Character {
    Mayro,
    Luiji,
    Pitch,
    Yochi,
}

impl Character {
    pub const ALL: [Character; 4] = [
        Character::Mayro,
        Character::Luiji,
        Character::Pitch,
        Character::Yochi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Character::Mayro => "mayro",
            Character::Luiji => "luiji",
            Character::Pitch => "pitch",
            Character::Yochi => "yochi",
        }
    }
}

/// Top-level lobby phases owned by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyPhase {
    CharacterSelect,
    MinigameSelect,
}

impl LobbyPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LobbyPhase::CharacterSelect => "character_select",
            LobbyPhase::MinigameSelect => "minigame_select",
        }
    }
}

/// Phases of a single minigame, in the order they are played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MinigamePhase {
    Select,
    Load,
    Start,
    During,
    End,
    Score,
    Winners,
}

impl MinigamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MinigamePhase::Select => "minigame_select",
            MinigamePhase::Load => "minigame_load",
            MinigamePhase::Start => "minigame_start",
            MinigamePhase::During => "minigame_during",
            MinigamePhase::End => "minigame_end",
            MinigamePhase::Score => "minigame_score",
            MinigamePhase::Winners => "minigame_winners",
        }
    }

    /// The following phase, or `None` once the winners have been shown.
    pub fn next(&self) -> Option<MinigamePhase> {
        match self {
            MinigamePhase::Select => Some(MinigamePhase::Load),
            MinigamePhase::Load => Some(MinigamePhase::Start),
            MinigamePhase::Start => Some(MinigamePhase::During),
            MinigamePhase::During => Some(MinigamePhase::End),
            MinigamePhase::End => Some(MinigamePhase::Score),
            MinigamePhase::Score => Some(MinigamePhase::Winners),
            MinigamePhase::Winners => None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("unknown character '{0}'")]
    UnknownCharacter(String),
    #[error("malformed JSON payload: {0}")]
    MalformedPayload(String),
    #[error("malformed input vector '{0}'")]
    MalformedInput(String),
}

#[derive(Deserialize)]
struct SetCharacterEnvelope {
    set_perso: String,
}

/// Commands understood by the orchestrator in every phase.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    GetState,
    ServerInfo,
    SetCharacter(Character),
    Ready,
    Close,
    /// Anything else; forwarded verbatim to the active minigame.
    Forward(String),
}

impl Request {
    pub fn parse(raw: &str) -> Result<Request, ProtocolError> {
        let raw = raw.trim();
        match raw {
            "get_etat" => return Ok(Request::GetState),
            "infos_serveur" => return Ok(Request::ServerInfo),
            "ready_for_next_state" => return Ok(Request::Ready),
            "close" => return Ok(Request::Close),
            _ => {}
        }

        if raw.starts_with('{') && raw.contains("set_perso") {
            let envelope: SetCharacterEnvelope = serde_json::from_str(raw)
                .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;
            let character = Character::ALL
                .into_iter()
                .find(|c| c.as_str() == envelope.set_perso)
                .ok_or(ProtocolError::UnknownCharacter(envelope.set_perso))?;
            return Ok(Request::SetCharacter(character));
        }

        Ok(Request::Forward(raw.to_string()))
    }
}

/// Directional input sent by a client while a minigame runs.
///
/// Each component is clamped to `[-1, 1]`, so a client cannot move faster
/// than the configured player speed by sending large numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputVector {
    pub x: i32,
    pub y: i32,
}

impl InputVector {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x: x.clamp(-1, 1),
            y: y.clamp(-1, 1),
        }
    }

    pub fn parse(raw: &str) -> Result<InputVector, ProtocolError> {
        let malformed = || ProtocolError::MalformedInput(raw.to_string());
        let (x, y) = raw.trim().split_once('|').ok_or_else(malformed)?;
        let x = x.trim().parse::<i64>().map_err(|_| malformed())?;
        let y = y.trim().parse::<i64>().map_err(|_| malformed())?;
        Ok(InputVector::new(x.clamp(-1, 1) as i32, y.clamp(-1, 1) as i32))
    }

    pub fn as_vector(&self) -> Vector2 {
        Vector2::new(self.x as f32, self.y as f32)
    }
}

/// Commands handled by a minigame once the orchestrator forwarded them.
#[derive(Debug, Clone, PartialEq)]
pub enum MinigameRequest {
    GetState,
    MuteHit,
    MuteGoal,
    Input(InputVector),
    Unknown(String),
}

impl MinigameRequest {
    pub fn parse(raw: &str) -> Result<MinigameRequest, ProtocolError> {
        let raw = raw.trim();
        match raw {
            "get_etat" => Ok(MinigameRequest::GetState),
            "desactive_son_hit" => Ok(MinigameRequest::MuteHit),
            "desactive_son_but" => Ok(MinigameRequest::MuteGoal),
            _ if raw.contains('|') => Ok(MinigameRequest::Input(InputVector::parse(raw)?)),
            _ => Ok(MinigameRequest::Unknown(raw.to_string())),
        }
    }
}

/// Splits one received chunk into its newline-separated messages.
pub fn split_messages(chunk: &str) -> impl Iterator<Item = &str> {
    chunk.split('\n').map(str::trim).filter(|m| !m.is_empty())
}

/// Per-player entry of the `infos_serveur` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// Character name, empty while none is chosen.
    pub perso: String,
    pub pseudo: String,
    pub argent: u32,
    pub ia: bool,
}

/// Reply to `infos_serveur`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Connected human players.
    pub nb_joueurs: usize,
    pub nb_ready: usize,
    pub joueurs: BTreeMap<PlayerKey, PlayerInfo>,
    /// Identifier of the running minigame, empty if none.
    pub mini_jeu: String,
    pub classement: BTreeMap<PlayerKey, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallPlayerView {
    pub perso: String,
    pub equipe: u8,
    pub position: [f32; 2],
    pub frame: u8,
    pub son_hit: bool,
    pub son_but: bool,
}

/// Reply to an input request in the ball game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallGameSnapshot {
    pub joueurs: BTreeMap<PlayerKey, BallPlayerView>,
    pub balle: [f32; 2],
    pub score: [u32; 2],
    pub temps_restant: u64,
    pub classement: BTreeMap<PlayerKey, u8>,
    pub fps: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestantView {
    pub perso: String,
    pub position: [f32; 2],
    pub frame: u8,
    pub points: u32,
    pub actif: bool,
}

/// Reply to an input request in the free-for-all minigames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    pub joueurs: BTreeMap<PlayerKey, ContestantView>,
    /// Boxes of the minigame's objects as `[x, y, width, height]`.
    pub objets: Vec<[f32; 4]>,
    pub temps_restant: u64,
    pub classement: BTreeMap<PlayerKey, u8>,
    pub fps: f32,
}
