//! Performance benchmarks for critical game systems

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::minigames::{Entrant, Minigame, MinigameId, RequestContext};
use server::{Orchestrator, ServerConfig};
use shared::{
    field_walls, rank_with_ties, Body, Character, MinigamePhase, PlayerKey, Rect, Request,
    Vector2,
};
use std::time::{Duration, Instant};

fn entrants() -> Vec<Entrant> {
    Character::ALL
        .into_iter()
        .enumerate()
        .map(|(i, character)| Entrant {
            key: PlayerKey(i as u32 + 1),
            character: Some(character),
            is_ai: true,
        })
        .collect()
}

/// Steps an all-AI minigame until it starts playing.
fn start(game: &mut dyn Minigame, now: Instant) {
    while game.phase() != MinigamePhase::During {
        game.step(now);
    }
}

/// Benchmarks per-axis collision resolution against a crowded field
#[test]
fn benchmark_collision_resolution() {
    let mut colliders = field_walls();
    colliders.extend((0..40).map(|i| Rect::new(40.0 + i as f32 * 30.0, 300.0, 20.0, 20.0)));

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let mut body = Body::new(Vector2::new(600.0, 280.0), 24.0, 24.0);
        body.velocity = Vector2::new((i % 7) as f32 - 3.0, 4.0);
        let _ = body.resolve_axes(&colliders);
        body.integrate();
    }

    let duration = start.elapsed();
    println!(
        "Collision resolution: {} iterations against {} boxes in {:?} ({:.2} ns/iter)",
        iterations,
        colliders.len(),
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks one minute of simulation for every minigame
#[test]
fn benchmark_minigame_simulation() {
    let ticks = 3600;

    for id in MinigameId::ALL {
        let clock = Instant::now();
        let mut game = id.create(&entrants(), Duration::from_secs(120), StdRng::seed_from_u64(1));
        start(game.as_mut(), clock);

        let started = Instant::now();
        for tick in 0..ticks {
            game.step(clock + Duration::from_millis(tick * 16));
        }
        let duration = started.elapsed();

        println!(
            "{}: {} ticks in {:?} ({:.2} μs/tick)",
            id.as_str(),
            ticks,
            duration,
            duration.as_micros() as f64 / ticks as f64
        );

        // A tick must fit comfortably inside a 60Hz frame
        assert!(duration.as_micros() / u128::from(ticks) < 16_000);
    }
}

/// Benchmarks snapshot generation for input replies
#[test]
fn benchmark_snapshot_replies() {
    let clock = Instant::now();
    let mut entrants = entrants();
    entrants[0].is_ai = false;
    let ctx = RequestContext {
        now: clock,
        fps: 60.0,
    };

    for id in [MinigameId::BallGame, MinigameId::CoinRush] {
        let mut game = id.create(&entrants, Duration::from_secs(60), StdRng::seed_from_u64(2));
        while game.phase() != MinigamePhase::During {
            let _ = game.set_ready(&PlayerKey(1));
            game.step(clock);
        }

        let iterations: i32 = 10_000;
        let started = Instant::now();
        for i in 0..iterations {
            let input = format!("{}|{}", i % 3 - 1, 1 - i % 3);
            let reply = game.handle_command(PlayerKey(1), &input, &ctx).unwrap();
            assert!(reply.starts_with('{'));
        }
        let duration = started.elapsed();

        println!(
            "{} replies: {} iterations in {:?} ({:.2} μs/iter)",
            id.as_str(),
            iterations,
            duration,
            duration.as_micros() as f64 / iterations as f64
        );

        // Should complete in under 3 seconds
        assert!(duration.as_millis() < 3000);
    }
}

/// Benchmarks request decoding
#[test]
fn benchmark_request_parsing() {
    let messages = [
        "get_etat",
        "infos_serveur",
        r#"{"set_perso": "pitch"}"#,
        "ready_for_next_state",
        "1|-1",
    ];

    let iterations = 50_000;
    let start = Instant::now();

    for i in 0..iterations {
        let _ = Request::parse(messages[i % messages.len()]).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Request parsing: {} iterations in {:?}",
        iterations, duration
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks ranking with ties
#[test]
fn benchmark_ranking() {
    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let ranks = rank_with_ties([(1, i % 10), (2, 10), (3, 5), (4, 0)]);
        assert_eq!(ranks.len(), 4);
    }

    let duration = start.elapsed();
    println!("Ranking: {} iterations in {:?}", iterations, duration);

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Stress tests a full session rotation with simulated time
#[test]
fn stress_test_full_rotation() {
    let config = ServerConfig {
        minigame_duration: Duration::from_secs(5),
        ..ServerConfig::default()
    };
    let mut now = Instant::now();
    let mut orchestrator = Orchestrator::with_rng(&config, StdRng::seed_from_u64(99), now);
    let key = orchestrator.connect().unwrap();

    let start = Instant::now();
    let mut ticks = 0;
    while orchestrator.is_running() && ticks < 100_000 {
        let _ = orchestrator.set_ready(&key);
        now += Duration::from_millis(16);
        orchestrator.tick(now);
        ticks += 1;
    }
    let duration = start.elapsed();

    println!(
        "Full rotation: {} ticks in {:?} ({:.2} μs/tick)",
        ticks,
        duration,
        duration.as_micros() as f64 / ticks as f64
    );

    assert!(!orchestrator.is_running());
    assert_eq!(orchestrator.played().len(), MinigameId::ALL.len());
    // Should complete in under 10 seconds
    assert!(duration.as_secs() < 10);
}
