use cgmath::Point3;

use crate::engine_state::{
    rendering::Vertex,
    voxels::block::block_side::{BlockSide, QUAD_TEXTURE_COORDINATES, QUAD_TRIANGLE_INDICES},
};

/// Number of vertices emitted per visible face (two triangles).
pub const VERTICES_PER_FACE: usize = QUAD_TRIANGLE_INDICES.len();

/// One visible block face, identified by its cell and the direction it faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Face {
    /// The solid cell the face belongs to, in chunk coordinates
    pub cell: Point3<usize>,
    /// Which side of the block this face represents
    pub block_side: BlockSide,
}

impl Face {
    /// Creates a new face for the voxel at `(i, j, k)`.
    pub fn new(i: usize, j: usize, k: usize, block_side: BlockSide) -> Self {
        Face {
            cell: Point3::new(i, j, k),
            block_side,
        }
    }

    /// The six vertices of the face's two triangles, in chunk-local space.
    pub fn vertices(&self) -> [Vertex; VERTICES_PER_FACE] {
        let corners = self.block_side.corners();
        let normal = self.block_side.normal();
        let base = [
            self.cell.x as f32,
            self.cell.y as f32,
            self.cell.z as f32,
        ];

        std::array::from_fn(|i| {
            let corner = corners[QUAD_TRIANGLE_INDICES[i]];
            Vertex::new(
                [
                    base[0] + corner[0],
                    base[1] + corner[1],
                    base[2] + corner[2],
                ],
                normal,
                QUAD_TEXTURE_COORDINATES[i],
            )
        })
    }
}
