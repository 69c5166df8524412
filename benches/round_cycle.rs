//! Round cycle benchmarks.
//!
//! Measures a full end-of-round transition (revert, select, apply) and the
//! late-join resync path over arenas of different sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chaos_arena::core::{ManualClock, TimerQueue};
use chaos_arena::game::{ArenaWorld, Authority, Character, EntityId, RoundConfig, RoundScheduler};

fn populated_world(players: u32) -> ArenaWorld {
    let mut world = ArenaWorld::new();
    for i in 0..players {
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&i.to_le_bytes());
        world.spawn(Character::player(EntityId::new(bytes)));
    }
    world
}

fn bench_round_transition(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_transition");

    for players in [4u32, 64, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(players), &players, |b, &players| {
            let mut world = populated_world(players);
            let mut scheduler = RoundScheduler::new(
                Authority::Server,
                RoundConfig::default(),
                ManualClock::default(),
                TimerQueue::new(),
                42,
            );
            scheduler.begin_play(&mut world);

            b.iter(|| {
                scheduler.end_current_round(black_box(&mut world));
                scheduler.take_events()
            });
        });
    }

    group.finish();
}

fn bench_late_join(c: &mut Criterion) {
    let mut world = populated_world(64);
    let mut scheduler = RoundScheduler::new(
        Authority::Server,
        RoundConfig::default(),
        ManualClock::default(),
        TimerQueue::new(),
        7,
    );
    scheduler.begin_play(&mut world);
    let late = world.spawn(Character::player(EntityId::new([0xff; 16])));

    c.bench_function("late_join_resync", |b| {
        b.iter(|| {
            scheduler.apply_current_effect_to_entity(&mut world, black_box(late));
            scheduler.take_events()
        })
    });
}

criterion_group!(benches, bench_round_transition, bench_late_join);
criterion_main!(benches);
