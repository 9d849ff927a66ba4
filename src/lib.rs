#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Terrain
//!
//! Procedural voxel terrain built from fixed-size cubic chunks.
//!
//! This crate generates a height field from seeded gradient noise, fills chunk
//! occupancy grids from it, converts each grid into a face-culled triangle mesh,
//! and hands the finished vertex buffers to the GPU. Generation runs on a pool
//! of worker threads fed through a bounded work queue while the main thread
//! keeps ownership of the world and of every GPU resource.
//!
//! ## Key Modules
//!
//! * `engine_state::noise` - Gradient noise and fractal noise
//! * `engine_state::voxels` - Chunks, faces and the world container
//! * `engine_state::rendering` - Vertex layout and mesher
//! * `engine_state::task_management` - Work queue and worker pool
//! * `engine_state::pipeline` - The generation pipeline
//!
//! ## Usage
//!
//! ```rust,no_run
//! fn main() {
//!     if let Err(error) = voxel_terrain::run() {
//!         log::error!("{error}");
//!     }
//! }
//! ```

use std::{env, path::PathBuf};

use log::info;

use engine_state::{
    buffer_state::{ChunkUploader, HeadlessUploader},
    error::GenerationError,
    pipeline::GenerationPipeline,
    settings::{GenerationSettings, SETTINGS_PATH_ENV},
};

pub mod engine_state;

/// Generates one world headlessly and logs the result.
///
/// Settings are read from the file named by the first command line argument,
/// or by the `VOXEL_TERRAIN_CONFIG` environment variable; without either the
/// defaults are used.
pub fn run() -> Result<(), GenerationError> {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let settings_path = env::args_os()
        .nth(1)
        .or_else(|| env::var_os(SETTINGS_PATH_ENV))
        .map(PathBuf::from);
    let settings = GenerationSettings::load_or_default(settings_path.as_deref())?;
    let seed = settings.resolve_seed();

    let mut pipeline = GenerationPipeline::new(settings, HeadlessUploader::new())?;
    let report = pipeline.generate_blocking(seed)?;

    let analytics = pipeline.uploader().analytics();
    info!(
        "World {} (seed {}): {} chunks, {} holes, {} vertices in {:?}; {} buffers holding {} bytes",
        report.generation,
        report.seed,
        report.chunks,
        report.holes,
        report.vertices,
        report.elapsed,
        analytics.live_buffers,
        analytics.allocated_memory
    );

    pipeline.shutdown();
    Ok(())
}
