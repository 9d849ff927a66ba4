//! # Voxel Terrain Entry Point
//!
//! Calls into the library's `run()` to generate a world and report on it.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run --release -- settings.json
//! ```

fn main() {
    if let Err(error) = voxel_terrain::run() {
        log::error!("{error}");
        std::process::exit(1);
    }
}
