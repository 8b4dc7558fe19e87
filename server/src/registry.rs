//! Global player registry for the party server
//!
//! This module tracks every participant of the run, including:
//! - Human players, keyed by the identifier of their connection
//! - AI players synthesized to fill empty seats when the game starts
//! - Character choice, display name, ready flag and accumulated currency
//!
//! The registry is owned by the orchestrator; minigames only ever see a
//! read-only copy of each player's character and AI flag.

use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Character, PlayerKey};
use std::collections::BTreeMap;

/// A participant of the run, human or AI.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Identifier assigned by the server
    pub key: PlayerKey,
    /// Display name sent by the client after connecting
    pub name: String,
    /// Chosen character, `None` until the player picks one
    pub character: Option<Character>,
    /// AI players never wait on input and are always ready
    pub is_ai: bool,
    /// Ready flag for the current phase
    pub ready: bool,
    /// Currency accumulated over all minigames
    pub currency: u32,
    /// False for AI players and for humans whose connection dropped
    pub connected: bool,
}

impl Player {
    /// Creates a freshly connected human player with no character yet.
    pub fn human(key: PlayerKey) -> Self {
        Self {
            key,
            name: String::new(),
            character: None,
            is_ai: false,
            ready: false,
            currency: 0,
            connected: true,
        }
    }

    /// Creates an AI player holding the given character.
    pub fn ai(key: PlayerKey, character: Character, name: String) -> Self {
        Self {
            key,
            name,
            character: Some(character),
            is_ai: true,
            ready: false,
            currency: 0,
            connected: false,
        }
    }

    /// AI players count as ready at all times.
    pub fn is_ready(&self) -> bool {
        self.is_ai || self.ready
    }
}

/// Keeps every player of the run and hands out keys.
///
/// Keys start at 1 and are never reused, so a key seen on the wire always
/// designates the same player for the whole process lifetime.
pub struct PlayerRegistry {
    /// Players indexed by key
    players: BTreeMap<PlayerKey, Player>,
    /// Next key handed to a new player, human or AI
    next_key: u32,
    /// Maximum number of human players admitted at once
    max_players: usize,
}

impl PlayerRegistry {
    pub fn new(max_players: usize) -> Self {
        Self {
            players: BTreeMap::new(),
            next_key: 1,
            max_players,
        }
    }

    fn allocate_key(&mut self) -> PlayerKey {
        let key = PlayerKey(self.next_key);
        self.next_key += 1;
        key
    }

    /// Registers a new human player
    ///
    /// Returns `None` when every seat is already taken.
    pub fn add_human(&mut self) -> Option<PlayerKey> {
        if self.players.len() >= self.max_players {
            return None;
        }

        let key = self.allocate_key();
        info!("Player {} joined the lobby", key);
        self.players.insert(key, Player::human(key));
        Some(key)
    }

    /// Registers an AI player holding `character`.
    pub fn add_ai(&mut self, character: Character) -> PlayerKey {
        let key = self.allocate_key();
        let name = format!("CPU {}", key);
        info!("AI player {} takes {}", key, character.as_str());
        self.players.insert(key, Player::ai(key, character, name));
        key
    }

    /// Removes a player, returning whether it was present.
    pub fn remove(&mut self, key: &PlayerKey) -> bool {
        if self.players.remove(key).is_some() {
            info!("Player {} left the lobby", key);
            true
        } else {
            false
        }
    }

    pub fn get(&self, key: &PlayerKey) -> Option<&Player> {
        self.players.get(key)
    }

    pub fn get_mut(&mut self, key: &PlayerKey) -> Option<&mut Player> {
        self.players.get_mut(key)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Sets the player's ready flag. Returns false for an unknown key.
    pub fn set_ready(&mut self, key: &PlayerKey) -> bool {
        match self.players.get_mut(key) {
            Some(player) => {
                player.ready = true;
                true
            }
            None => false,
        }
    }

    pub fn reset_ready(&mut self) {
        for player in self.players.values_mut() {
            player.ready = false;
        }
    }

    /// True when at least one player exists and all of them are ready.
    pub fn all_ready(&self) -> bool {
        !self.is_empty() && self.players.values().all(Player::is_ready)
    }

    /// Humans whose connection is still open.
    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }

    /// Connected humans that flagged themselves ready.
    pub fn ready_count(&self) -> usize {
        self.players
            .values()
            .filter(|p| p.connected && p.ready)
            .count()
    }

    /// Characters nobody has picked yet, in declaration order.
    pub fn unused_characters(&self) -> Vec<Character> {
        Character::ALL
            .into_iter()
            .filter(|c| self.players.values().all(|p| p.character != Some(*c)))
            .collect()
    }

    /// Adds AI players until `seats` players are registered
    ///
    /// Each AI gets a character nobody holds yet, drawn at random. When
    /// every character is taken the AI falls back to a random one.
    pub fn fill_with_ai<R: Rng>(&mut self, seats: usize, rng: &mut R) -> Vec<PlayerKey> {
        let mut free = self.unused_characters();
        free.shuffle(rng);

        let mut added = Vec::new();
        while self.players.len() < seats {
            let character = free
                .pop()
                .or_else(|| Character::ALL.choose(rng).copied())
                .unwrap_or(Character::Mayro);
            added.push(self.add_ai(character));
        }
        added
    }

    /// Puts a human player under AI control after their connection dropped.
    pub fn hand_over_to_ai(&mut self, key: &PlayerKey) -> bool {
        match self.players.get_mut(key) {
            Some(player) => {
                player.is_ai = true;
                player.connected = false;
                info!("Player {} is now controlled by the AI", key);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
