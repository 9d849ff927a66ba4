//! Mesh generation for voxel chunks.
//!
//! Converts a populated chunk's occupancy grid into a flat triangle list. Every
//! solid cell contributes one quad (two triangles) per exposed face; hidden faces
//! between two solid cells are culled.
//!
//! # Architecture
//! - [`build_mesh`]: the culling mesher run by generation workers
//! - `mesh/`: faces, the scratch-buffer builder and the finished [`ChunkMesh`]
//!
//! # Memory
//! The scratch buffer is reserved once at the worst case of
//! [`MAX_VERTICES_PER_BLOCK`] vertices per solid cell. A failed reservation is
//! reported as [`GenerationError::Allocation`] instead of aborting the process,
//! and the finished buffer is trimmed to the exact vertex count.

use log::trace;

/// Core mesh data structures.
mod mesh;

pub use mesh::*;

use crate::engine_state::{
    error::GenerationError,
    voxels::{block::block_side::BlockSide, chunk::Chunk},
};

/// Builds the vertex buffer of a populated chunk.
///
/// Cells are visited x-major, then y, then z, and each solid cell emits its
/// exposed faces in [`BlockSide::all`] order, so the output is fully determined
/// by the occupancy grid.
///
/// # Errors
/// Returns [`GenerationError::Allocation`] when the scratch buffer for the
/// chunk cannot be reserved.
pub fn build_mesh(chunk: &Chunk) -> Result<ChunkMesh, GenerationError> {
    let max_vertices = chunk
        .solid_count()
        .saturating_mul(MAX_VERTICES_PER_BLOCK);
    let mut builder = MeshBuilder::with_capacity(chunk.origin, max_vertices)?;

    let size = chunk.size();
    for x in 0..size {
        for y in 0..size {
            for z in 0..size {
                if !chunk.is_block_solid(x, y, z) {
                    continue;
                }
                for side in BlockSide::all() {
                    if chunk.is_face_exposed(x, y, z, side) {
                        builder.add_face(&Face::new(x, y, z, side));
                    }
                }
            }
        }
    }

    let mesh = builder.finish();
    trace!(
        target: "terrain-pipeline",
        "Meshed chunk {:?}: {} faces of at most {}",
        chunk.origin,
        mesh.face_count(),
        max_vertices / VERTICES_PER_FACE
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use cgmath::Point3;

    use super::*;
    use crate::engine_state::voxels::block::block_side::{
        QUAD_TEXTURE_COORDINATES, QUAD_TRIANGLE_INDICES,
    };

    fn origin() -> Point3<i32> {
        Point3::new(0, 0, 0)
    }

    #[test]
    fn solid_chunk_emits_only_its_shell() {
        let chunk = Chunk::filled(origin(), 4, true);
        let mesh = build_mesh(&chunk).unwrap();
        assert_eq!(mesh.face_count(), 6 * 4 * 4);
        assert_eq!(mesh.vertex_count(), 576);
    }

    #[test]
    fn empty_chunk_emits_nothing() {
        let chunk = Chunk::filled(origin(), 8, false);
        let mesh = build_mesh(&chunk).unwrap();
        assert!(mesh.is_empty());
        assert_eq!(mesh.byte_len(), 0);
    }

    #[test]
    fn isolated_block_emits_all_six_faces() {
        let mut chunk = Chunk::filled(origin(), 3, false);
        chunk.set_block_solid(1, 1, 1, true);
        let mesh = build_mesh(&chunk).unwrap();
        assert_eq!(mesh.vertex_count(), 36);

        let mut x = (f32::MAX, f32::MIN);
        for vertex in mesh.vertices() {
            x = (x.0.min(vertex.position[0]), x.1.max(vertex.position[0]));
        }
        assert_eq!(x, (1.0, 2.0));
    }

    #[test]
    fn checkerboard_exposes_every_face() {
        let chunk = Chunk::checkerboard(origin(), 4);
        let mesh = build_mesh(&chunk).unwrap();
        assert_eq!(chunk.solid_count(), 32);
        assert_eq!(mesh.vertex_count(), chunk.solid_count() * MAX_VERTICES_PER_BLOCK);
    }

    #[test]
    fn vertex_count_matches_exposed_faces() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut chunk = Chunk::filled(origin(), 6, false);
        for x in 0..6 {
            for y in 0..6 {
                for z in 0..6 {
                    chunk.set_block_solid(x, y, z, rng.bool());
                }
            }
        }

        let mut exposed = 0;
        for x in 0..6 {
            for y in 0..6 {
                for z in 0..6 {
                    if chunk.is_block_solid(x, y, z) {
                        exposed += BlockSide::all()
                            .into_iter()
                            .filter(|side| chunk.is_face_exposed(x, y, z, *side))
                            .count();
                    }
                }
            }
        }

        let mesh = build_mesh(&chunk).unwrap();
        assert_eq!(mesh.vertex_count(), exposed * VERTICES_PER_FACE);
    }

    #[test]
    fn faces_are_not_duplicated() {
        let chunk = Chunk::checkerboard(origin(), 4);
        let mesh = build_mesh(&chunk).unwrap();

        let mut seen = HashSet::new();
        for quad in mesh.vertices().chunks(VERTICES_PER_FACE) {
            let key: Vec<[u32; 3]> = quad
                .iter()
                .map(|v| v.position.map(f32::to_bits))
                .collect();
            assert!(seen.insert(key), "duplicate quad {quad:?}");
        }
    }

    #[test]
    fn normals_are_axis_aligned_and_shared_per_quad() {
        let mut chunk = Chunk::filled(origin(), 4, false);
        chunk.set_block_solid(0, 0, 0, true);
        chunk.set_block_solid(2, 3, 1, true);
        let mesh = build_mesh(&chunk).unwrap();

        for quad in mesh.vertices().chunks(VERTICES_PER_FACE) {
            let normal = quad[0].normal;
            assert_eq!(normal.iter().map(|c| c.abs()).sum::<f32>(), 1.0);
            assert!(quad.iter().all(|v| v.normal == normal));
        }
    }

    #[test]
    fn quads_follow_fan_and_texture_patterns() {
        let mut chunk = Chunk::filled(origin(), 2, false);
        chunk.set_block_solid(0, 0, 0, true);
        let mesh = build_mesh(&chunk).unwrap();

        for quad in mesh.vertices().chunks(VERTICES_PER_FACE) {
            for (vertex, uv) in quad.iter().zip(QUAD_TEXTURE_COORDINATES) {
                assert_eq!(vertex.tex_coords, uv);
            }
            // Indices 2/3 and 0/5 of the fan share a corner.
            assert_eq!(QUAD_TRIANGLE_INDICES[2], QUAD_TRIANGLE_INDICES[3]);
            assert_eq!(quad[2].position, quad[3].position);
            assert_eq!(quad[0].position, quad[5].position);
        }
    }

    #[test]
    fn oversized_reservation_reports_allocation_error() {
        let origin = Point3::new(32, 0, 64);
        let err = MeshBuilder::with_capacity(origin, usize::MAX).unwrap_err();
        match err {
            GenerationError::Allocation {
                origin: failed,
                requested_vertices,
                ..
            } => {
                assert_eq!(failed, origin);
                assert_eq!(requested_vertices, usize::MAX);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn finished_buffer_is_trimmed() {
        let chunk = Chunk::filled(origin(), 4, true);
        let mesh = build_mesh(&chunk).unwrap();
        assert!(mesh.vertex_count() < chunk.solid_count() * MAX_VERTICES_PER_BLOCK);
        assert_eq!(mesh.byte_len(), mesh.vertex_count() * 32);
    }
}
