//! # Party Game Server Library
//!
//! This library provides the authoritative server for a four-player party
//! game. Players gather in a lobby, pick a character, and are then rotated
//! through a series of minigames. Every minigame is simulated here; clients
//! only poll for state and send their input.
//!
//! ## Core Responsibilities
//!
//! ### Session Orchestration
//! The [`Orchestrator`] owns the lobby and the rotation:
//! - Admission of up to four human players while the lobby is open
//! - AI players filling the empty seats once everyone is ready
//! - Random selection of the next minigame from the remaining pool
//! - Currency rewards and the session ranking after each minigame
//! - Shutdown after the last minigame or when nobody is connected
//!
//! ### Minigame Simulation
//! Each minigame walks through the same seven phases and is stepped once
//! per tick. The canonical two-versus-two ball game lives in
//! [`minigames::ball_game`]; the free-for-all variants share the arena
//! engine in [`minigames::arena`].
//!
//! ### Connection Handling
//! The [`network`] module accepts TCP connections and runs one task per
//! player. Requests are short text commands; every request receives
//! exactly one reply and the server never pushes.
//!
//! ## Architecture Design
//!
//! ### Coarse Locking
//! All session state sits behind a single `tokio::sync::RwLock`. Each
//! request and each tick holds the write lock for its whole duration, so
//! a phase change is never observed half-applied.
//!
//! ### Fixed Tick Rate
//! The scheduler ticks at a fixed rate (60 Hz by default). Late ticks are
//! skipped rather than caught up; the measured rate is reported to clients
//! as `fps`.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 9000,
//!         ..ServerConfig::default()
//!     };
//!
//!     // Runs until every minigame was played or the lobby stayed empty
//!     // for longer than the idle timeout.
//!     Server::bind(&config).await?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod minigames;
pub mod network;
pub mod orchestrator;
pub mod ranking;
pub mod registry;

pub use error::{GameError, ServerError};
pub use network::Server;
pub use orchestrator::Orchestrator;

use shared::TICK_RATE;
use std::time::Duration;

/// Runtime settings of a server instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Simulation steps per second.
    pub tick_rate: u32,
    /// How long the server waits without any connected human before exiting.
    pub idle_timeout: Duration,
    /// Length of the playing phase of each minigame.
    pub minigame_duration: Duration,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            tick_rate: TICK_RATE,
            idle_timeout: Duration::from_secs(120),
            minigame_duration: Duration::from_secs(60),
        }
    }
}
