//! Types shared by the party server and its clients: the text protocol,
//! the physics primitives every minigame is built from, and the arena
//! constants both sides agree on.

pub mod physics;
pub mod protocol;

pub use physics::{steer, AxisHits, Body, Rect, Vector2};
pub use protocol::{
    Character, InputVector, LobbyPhase, MinigamePhase, MinigameRequest, PlayerKey,
    ProtocolError, Request, ServerInfo,
};

/// Simulation steps per second.
pub const TICK_RATE: u32 = 60;
/// Seats in a game; empty seats are filled with AI players.
pub const SEATS: usize = 4;
/// Size of the buffer used for every socket read.
pub const RECV_BUFFER_SIZE: usize = 2048;

pub const FIELD_WIDTH: f32 = 1280.0;
pub const FIELD_HEIGHT: f32 = 720.0;
pub const WALL_THICKNESS: f32 = 20.0;

/// The four walls enclosing a full field.
pub fn field_walls() -> Vec<Rect> {
    vec![
        Rect::new(0.0, 0.0, FIELD_WIDTH, WALL_THICKNESS),
        Rect::new(0.0, FIELD_HEIGHT - WALL_THICKNESS, FIELD_WIDTH, WALL_THICKNESS),
        Rect::new(0.0, 0.0, WALL_THICKNESS, FIELD_HEIGHT),
        Rect::new(FIELD_WIDTH - WALL_THICKNESS, 0.0, WALL_THICKNESS, FIELD_HEIGHT),
    ]
}

/// Standard competition ranking: equal scores share a rank and the next
/// rank skips accordingly, so `[10, 10, 5, 0]` ranks `[1, 1, 3, 4]`.
pub fn rank_with_ties<K: Ord + Copy>(
    scores: impl IntoIterator<Item = (K, u32)>,
) -> std::collections::BTreeMap<K, u32> {
    let mut sorted: Vec<(K, u32)> = scores.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut ranks = std::collections::BTreeMap::new();
    for (index, (key, score)) in sorted.iter().enumerate() {
        let rank = match index {
            0 => 1,
            _ if sorted[index - 1].1 == *score => ranks[&sorted[index - 1].0],
            _ => index as u32 + 1,
        };
        ranks.insert(*key, rank);
    }
    ranks
}
