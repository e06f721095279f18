//! Level snapshot benchmark: capture from a live world, encode and compress,
//! then decompress and decode.
//!
//! Run with: `cargo bench -p multisave --bench snapshot_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use bevy::prelude::*;
use multisave::archive_io::{decode_archive, encode_archive};
use multisave::level_load::DecodedLevel;
use multisave::level_save::capture_level;
use multisave::save_types::LevelArchive;
use multisave::{LevelContext, Mobility, MultiSaveSettings, SaveActor, SaveFields, SaveObject};

#[derive(SaveFields, Default)]
struct Stockpile {
    #[save]
    owner: String,
    #[save]
    amounts: Vec<u32>,
    #[save]
    open: bool,
    #[save]
    heading: Vec3,
    scratch: f32,
}

impl SaveObject for Stockpile {}

fn build_world(actors: usize) -> World {
    let mut world = World::new();
    world.insert_resource(MultiSaveSettings::default());
    world.insert_resource(LevelContext::new("Bench"));
    for i in 0..actors {
        world.spawn((
            Name::new(format!("Stockpile_{i}")),
            Transform::from_xyz(i as f32, 0.0, (i % 64) as f32),
            Mobility::Movable,
            SaveActor::runtime(Stockpile {
                owner: format!("faction_{}", i % 8),
                amounts: (0..16).map(|n| (n * i) as u32).collect(),
                open: i % 3 == 0,
                heading: Vec3::new(1.0, 0.0, i as f32),
                scratch: 0.0,
            }),
        ));
    }
    world
}

fn bench_capture(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture_level");
    for actors in [100, 1_000, 5_000] {
        let mut world = build_world(actors);
        group.bench_with_input(BenchmarkId::from_parameter(actors), &actors, |b, _| {
            b.iter(|| black_box(capture_level(&mut world)));
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut world = build_world(1_000);
    let values = capture_level(&mut world);
    c.bench_function("encode_level_1000", |b| {
        b.iter(|| black_box(encode_archive(&values.encode())));
    });

    let bytes = encode_archive(&values.encode());
    println!("1000 actors: {} bytes on disk", bytes.len());
    c.bench_function("decode_level_1000", |b| {
        b.iter(|| {
            let archive: LevelArchive = decode_archive(black_box(&bytes)).unwrap();
            black_box(DecodedLevel::decode(archive))
        });
    });
}

criterion_group!(benches, bench_capture, bench_encode);
criterion_main!(benches);
