//! Rendering system for the terrain.
//!
//! This module turns chunk occupancy into GPU-ready vertex data. Meshing runs on
//! the generation workers; the resulting buffers are uploaded and drawn by the
//! main thread through [`buffer_state`](super::buffer_state).

pub mod meshing;
mod vertex;

// Re-export commonly used types
pub use vertex::Vertex;
