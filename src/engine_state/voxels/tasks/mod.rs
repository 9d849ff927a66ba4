//! # Voxel Task System
//!
//! Tasks that populate and mesh chunks off the main thread.

pub mod chunk_generation_task;
