//! Performance benchmarks for critical server systems

use server::game::{GameState, PlayerIdAllocator};
use server::tick::{Command, TickLoop};
use shared::framing::{decode_body, encode_frame};
use shared::{Action, Packet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};

fn populated_state(players: usize) -> GameState {
    let mut state = GameState::new(1, Arc::new(PlayerIdAllocator::new()));
    for _ in 0..players {
        state.register_player();
    }
    state
}

/// Benchmarks applying actions directly to the game state
#[test]
fn benchmark_apply_actions() {
    let mut state = populated_state(1_000);
    let ids = state.player_ids();

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let id = ids[i % ids.len()];
        let action = if i % 2 == 0 {
            Action::MoveDown
        } else {
            Action::MoveUp
        };
        state.apply_action(id, action).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Apply actions: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 500ms for 100k actions
    assert!(duration.as_millis() < 500);
}

/// Benchmarks bullet movement with a crowded arena
#[test]
fn benchmark_advance_bullets() {
    let mut state = populated_state(300);
    for id in state.player_ids() {
        state.apply_action(id, Action::Fire).unwrap();
    }
    assert_eq!(state.bullets().len(), 300);

    let iterations = 80;
    let start = Instant::now();

    for _ in 0..iterations {
        state.advance_bullets();
    }

    let duration = start.elapsed();
    println!(
        "Advance bullets: {} bullets x {} players x {} ticks in {:?}",
        state.bullets().len(),
        state.player_count(),
        iterations,
        duration
    );

    // The shortest flight is 90 steps (right side towards x = 0), so all are still in the air
    assert_eq!(state.bullets().len(), 300);
    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks full ticks draining a busy action queue
#[tokio::test]
async fn benchmark_tick_steps() {
    let players = 1_000;
    let state = Arc::new(RwLock::new(populated_state(players)));
    let ids = state.read().await.player_ids();

    let (tx, rx) = mpsc::channel(players);
    let mut tick_loop = TickLoop::new(Arc::clone(&state), rx, Duration::from_millis(16), players);

    let ticks = 200;
    let start = Instant::now();

    for _ in 0..ticks {
        for &player in &ids {
            tx.send(Command::Apply {
                player,
                action: Action::MoveDown,
            })
            .await
            .unwrap();
        }
        tick_loop.step().await;
    }

    let duration = start.elapsed();
    println!(
        "Tick steps: {} ticks x {} commands in {:?} ({:.2} μs/tick)",
        ticks,
        players,
        duration,
        duration.as_micros() as f64 / ticks as f64
    );

    assert_eq!(state.read().await.tick(), ticks as u64);
    assert_eq!(tick_loop.stats().ticks, ticks as u64);
    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks frame encoding and decoding of a large snapshot
#[test]
fn benchmark_snapshot_framing() {
    let mut state = populated_state(1_000);
    for id in state.player_ids().into_iter().step_by(2) {
        state.apply_action(id, Action::Fire).unwrap();
    }
    let packet = Packet::Snapshot(state.snapshot());

    let iterations = 200;
    let start = Instant::now();

    for _ in 0..iterations {
        let frame = encode_frame(&packet).unwrap();
        let decoded = decode_body(&frame[4..]).unwrap();
        assert!(matches!(decoded, Packet::Snapshot(_)));
    }

    let duration = start.elapsed();
    println!(
        "Snapshot framing: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks framing of the small packets clients send most
#[test]
fn benchmark_action_framing() {
    let packet = Packet::action(Action::Fire);

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let frame = encode_frame(&packet).unwrap();
        let _decoded = decode_body(&frame[4..]).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Action framing: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}
