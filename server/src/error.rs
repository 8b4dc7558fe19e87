//! Error types for the server.

use shared::protocol::{
    ProtocolError, REPLY_INVALID_INPUT, REPLY_LOBBY_CLOSED, REPLY_LOBBY_FULL, REPLY_NOT_FOUND,
    REPLY_SERVER_ERROR, REPLY_UNKNOWN_PLAYER,
};
use shared::PlayerKey;
use thiserror::Error;

/// Errors raised while handling a request against the session state.
///
/// None of these end a connection; each one is answered with a short
/// reply token instead.
#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("no minigame is running")]
    NoActiveMinigame,

    #[error("invalid input: {0}")]
    InvalidInput(#[from] ProtocolError),

    #[error("player {0} is not part of this session")]
    UnknownPlayer(PlayerKey),

    #[error("the lobby no longer accepts players")]
    AdmissionClosed,

    #[error("all {0} seats are taken")]
    LobbyFull(usize),

    #[error("failed to encode reply: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for GameError {
    fn from(err: serde_json::Error) -> Self {
        GameError::Encoding(err.to_string())
    }
}

impl GameError {
    /// The token sent back to the client for this error.
    pub fn reply(&self) -> &'static str {
        match self {
            GameError::UnknownCommand(_) | GameError::NoActiveMinigame => REPLY_NOT_FOUND,
            GameError::InvalidInput(_) => REPLY_INVALID_INPUT,
            GameError::UnknownPlayer(_) => REPLY_UNKNOWN_PLAYER,
            GameError::AdmissionClosed => REPLY_LOBBY_CLOSED,
            GameError::LobbyFull(_) => REPLY_LOBBY_FULL,
            GameError::Encoding(_) => REPLY_SERVER_ERROR,
        }
    }
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}
