use std::time::Duration;

use cgmath::Point3;
use noise::NoiseFn;
use voxel_terrain::engine_state::{
    buffer_state::{ChunkUploader, HeadlessUploader},
    noise::{sample, GradientNoise},
    pipeline::GenerationPipeline,
    rendering::meshing::{build_mesh, VERTICES_PER_FACE},
    settings::{GenerationSettings, QueuePolicySetting, TerrainSettings},
    voxels::chunk::{Chunk, ChunkState},
};

fn small_world(worker_count: usize, queue_policy: QueuePolicySetting) -> GenerationSettings {
    GenerationSettings {
        seed: Some(2024),
        grid_width: 4,
        grid_depth: 4,
        chunk_size: 16,
        terrain: TerrainSettings::default(),
        worker_count,
        queue_capacity: 3,
        queue_policy,
        chunk_retry_limit: 2,
    }
}

#[test]
fn noise_stays_in_range() {
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    for _ in 0..10_000 {
        let x = rng.f32() * 2_000.0 - 1_000.0;
        let y = rng.f32() * 2_000.0 - 1_000.0;
        let value = sample(x, y, rng.i32(..));
        assert!((-1.05..=1.05).contains(&value), "sample({x}, {y}) = {value}");
    }
}

#[test]
fn noise_fn_adapter_matches_sample() {
    let field = GradientNoise::new(77);
    let value = field.get([12.5, -3.25]);
    assert_eq!(value as f32, sample(12.5, -3.25, 77));
}

#[test]
fn every_queue_policy_generates_the_same_world() {
    let policies = [
        QueuePolicySetting::FailFast,
        QueuePolicySetting::Block { timeout_ms: 5 },
        QueuePolicySetting::DropOldest,
    ];

    let mut outcomes = Vec::new();
    for policy in policies {
        let settings = GenerationSettings {
            grid_width: 8,
            grid_depth: 8,
            queue_capacity: 2,
            chunk_retry_limit: 1,
            ..small_world(2, policy)
        };
        let mut pipeline = GenerationPipeline::new(settings, HeadlessUploader::new()).unwrap();
        let report = pipeline.generate_blocking(2024).unwrap();
        assert_eq!(report.holes, 0, "{policy:?} left holes");
        assert_eq!(report.chunks, 64, "{policy:?}");
        outcomes.push((report.chunks, report.holes, report.vertices));
    }

    assert_eq!(outcomes[0], outcomes[1]);
    assert_eq!(outcomes[0], outcomes[2]);
}

#[test]
fn generated_chunks_match_a_direct_build() {
    let settings = small_world(3, QueuePolicySetting::FailFast);
    let terrain = settings.terrain;
    let mut pipeline = GenerationPipeline::new(settings, HeadlessUploader::new()).unwrap();
    let report = pipeline.generate_blocking(9).unwrap();
    assert_eq!(report.holes, 0);

    let mut direct = Chunk::at_grid_position(2, 3, 16).unwrap();
    direct.populate(9, &terrain);
    let mesh = build_mesh(&direct).unwrap();

    let placed = pipeline.world().get(2, 3).unwrap();
    assert_eq!(placed.chunk.origin, Point3::new(32, 0, 48));
    assert_eq!(placed.chunk.state(), ChunkState::Renderable);
    assert_eq!(placed.chunk.mesh(), Some(&mesh));
    assert_eq!(mesh.vertex_count() % VERTICES_PER_FACE, 0);
}

#[test]
fn render_only_lists_placed_chunks() {
    let mut pipeline = GenerationPipeline::new(
        small_world(2, QueuePolicySetting::FailFast),
        HeadlessUploader::new(),
    )
    .unwrap();
    assert_eq!(pipeline.render().count(), 0);

    pipeline.generate(4);
    let deadline = std::time::Instant::now() + Duration::from_secs(30);
    while !pipeline.is_complete() && std::time::Instant::now() < deadline {
        pipeline.process_queued();
        pipeline.process_completed().unwrap();
        assert!(pipeline.render().count() <= 16);
        std::thread::sleep(Duration::from_millis(1));
    }

    assert!(pipeline.is_complete());
    let total: u32 = pipeline.render().map(|request| request.vertex_count).sum();
    assert_eq!(total as usize, pipeline.world().vertex_count());
}

#[test]
fn repeated_regeneration_keeps_buffers_balanced() {
    let mut pipeline = GenerationPipeline::new(
        small_world(2, QueuePolicySetting::FailFast),
        HeadlessUploader::new(),
    )
    .unwrap();

    for seed in 0..4 {
        pipeline.generate(seed);
        pipeline.process_completed().unwrap();
    }
    let report = pipeline.generate_blocking(100).unwrap();
    assert_eq!(report.generation, 5);

    let analytics = pipeline.uploader().analytics();
    assert_eq!(analytics.live_buffers as usize, pipeline.world().len());
    assert_eq!(
        analytics.times_uploaded - analytics.times_released,
        analytics.live_buffers
    );

    pipeline.shutdown();
    assert_eq!(pipeline.uploader().analytics().live_buffers, 0);
}
