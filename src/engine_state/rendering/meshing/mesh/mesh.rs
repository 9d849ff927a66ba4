//! Mesh buffers for chunk rendering.
//!
//! Meshing is two-phase: a [`MeshBuilder`] reserves a scratch buffer large
//! enough for the worst case up front, faces are appended without further
//! allocation, and [`MeshBuilder::finish`] trims the buffer to the exact number
//! of vertices emitted.

use cgmath::Point3;

use super::face::{Face, VERTICES_PER_FACE};
use crate::engine_state::{error::GenerationError, rendering::Vertex};

/// Upper bound of vertices a single solid block can contribute (all six faces).
pub const MAX_VERTICES_PER_BLOCK: usize = 6 * VERTICES_PER_FACE;

/// The finished vertex buffer of one chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkMesh {
    vertices: Vec<Vertex>,
}

impl ChunkMesh {
    /// The emitted vertices, three per triangle.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Number of vertices in the buffer.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of quads in the buffer.
    pub fn face_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_FACE
    }

    /// Whether the mesh has nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Size of the buffer in bytes as uploaded to the GPU.
    pub fn byte_len(&self) -> usize {
        std::mem::size_of_val(self.vertices.as_slice())
    }
}

/// Accumulates faces into a pre-reserved scratch buffer.
#[derive(Debug)]
pub struct MeshBuilder {
    vertices: Vec<Vertex>,
}

impl MeshBuilder {
    /// Reserves room for `max_vertices` vertices.
    ///
    /// # Errors
    /// Returns [`GenerationError::Allocation`] if the scratch buffer cannot be
    /// allocated; `origin` identifies the chunk in the error.
    pub fn with_capacity(
        origin: Point3<i32>,
        max_vertices: usize,
    ) -> Result<Self, GenerationError> {
        let mut vertices = Vec::new();
        vertices
            .try_reserve_exact(max_vertices)
            .map_err(|source| GenerationError::Allocation {
                origin,
                requested_vertices: max_vertices,
                source,
            })?;
        Ok(MeshBuilder { vertices })
    }

    /// Appends the six vertices of `face`.
    pub fn add_face(&mut self, face: &Face) {
        self.vertices.extend_from_slice(&face.vertices());
    }

    /// Trims the scratch buffer to the emitted vertices.
    pub fn finish(mut self) -> ChunkMesh {
        self.vertices.shrink_to_fit();
        ChunkMesh {
            vertices: self.vertices,
        }
    }
}
