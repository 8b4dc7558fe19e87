//! Coin rush: grab as many coins as possible before the clock runs out.

use super::arena::{ArenaRules, Contestant, Contestants};
use super::MinigameId;
use rand::rngs::StdRng;
use rand::Rng;
use shared::physics::{Rect, Vector2};
use shared::{FIELD_HEIGHT, FIELD_WIDTH, WALL_THICKNESS};

pub const COIN_COUNT: usize = 3;
pub const COIN_SIZE: f32 = 24.0;
const COIN_MARGIN: f32 = WALL_THICKNESS + 20.0;

#[derive(Debug, Clone, Default)]
pub struct CoinRush {
    coins: Vec<Rect>,
}

impl CoinRush {
    pub fn coins(&self) -> &[Rect] {
        &self.coins
    }

    fn random_coin(rng: &mut StdRng) -> Rect {
        Rect::new(
            rng.gen_range(COIN_MARGIN..FIELD_WIDTH - COIN_MARGIN - COIN_SIZE),
            rng.gen_range(COIN_MARGIN..FIELD_HEIGHT - COIN_MARGIN - COIN_SIZE),
            COIN_SIZE,
            COIN_SIZE,
        )
    }
}

impl ArenaRules for CoinRush {
    fn id(&self) -> MinigameId {
        MinigameId::CoinRush
    }

    fn spawn(&self, slot: u8) -> Vector2 {
        Vector2::new(
            FIELD_WIDTH / 2.0 - 220.0 + f32::from(slot) * 120.0,
            FIELD_HEIGHT / 2.0 - 20.0,
        )
    }

    fn on_start(&mut self, rng: &mut StdRng) {
        self.coins = (0..COIN_COUNT).map(|_| Self::random_coin(rng)).collect();
    }

    fn step(&mut self, contestants: &mut Contestants, rng: &mut StdRng) {
        for contestant in contestants.values_mut().filter(|c| !c.out) {
            let bounds = contestant.body.bounds();
            for coin in self.coins.iter_mut() {
                if bounds.intersects(coin) {
                    contestant.points += 1;
                    *coin = Self::random_coin(rng);
                }
            }
        }
    }

    fn ai_input(&self, contestant: &Contestant) -> Vector2 {
        let center = contestant.center();
        let distance = |coin: &Rect| {
            let delta = coin.center().add(&center.scale(-1.0));
            delta.magnitude()
        };

        self.coins
            .iter()
            .min_by(|a, b| distance(a).total_cmp(&distance(b)))
            .map(|coin| contestant.walk_towards(coin.center()))
            .unwrap_or(Vector2::ZERO)
    }

    fn objects(&self) -> Vec<Rect> {
        self.coins.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::PlayerKey;
    use rand::SeedableRng;

    #[test]
    fn test_coins_spawn_inside_field() {
        let mut rules = CoinRush::default();
        rules.on_start(&mut StdRng::seed_from_u64(4));

        assert_eq!(rules.coins().len(), COIN_COUNT);
        for coin in rules.coins() {
            assert!(coin.x >= COIN_MARGIN && coin.right() <= FIELD_WIDTH - COIN_MARGIN);
            assert!(coin.y >= COIN_MARGIN && coin.bottom() <= FIELD_HEIGHT - COIN_MARGIN);
        }
    }

    #[test]
    fn test_touching_a_coin_scores_and_respawns_it() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut rules = CoinRush::default();
        rules.coins = vec![Rect::new(110.0, 110.0, COIN_SIZE, COIN_SIZE)];

        let mut contestants = Contestants::new();
        contestants.insert(PlayerKey(1), Contestant::new(Vector2::new(100.0, 100.0)));
        contestants.insert(PlayerKey(2), Contestant::new(Vector2::new(600.0, 600.0)));

        rules.step(&mut contestants, &mut rng);

        assert_eq!(contestants[&PlayerKey(1)].points, 1);
        assert_eq!(contestants[&PlayerKey(2)].points, 0);
        assert_ne!(rules.coins()[0], Rect::new(110.0, 110.0, COIN_SIZE, COIN_SIZE));
    }

    #[test]
    fn test_ai_heads_for_nearest_coin() {
        let mut rules = CoinRush::default();
        rules.coins = vec![
            Rect::new(1000.0, 100.0, COIN_SIZE, COIN_SIZE),
            Rect::new(100.0, 500.0, COIN_SIZE, COIN_SIZE),
        ];
        let contestant = Contestant::new(Vector2::new(200.0, 500.0));

        assert_eq!(rules.ai_input(&contestant), Vector2::new(-1.0, -1.0));
    }
}
