//! # Block Side Module
//!
//! This module defines the six faces of a voxel block together with the constant
//! geometry the mesher emits for each of them: the quad corners, the face normal
//! and the neighbor offset used for face culling.

use cgmath::Vector3;

/// Corner order that splits a quad into two counter-clockwise triangles.
pub const QUAD_TRIANGLE_INDICES: [usize; 6] = [0, 1, 2, 2, 3, 0];

/// Texture coordinates of the six vertices of a quad, matched index-for-index
/// with [`QUAD_TRIANGLE_INDICES`].
pub const QUAD_TEXTURE_COORDINATES: [[f32; 2]; 6] = [
    [0.0, 0.0],
    [1.0, 0.0],
    [1.0, 1.0],
    [1.0, 1.0],
    [0.0, 1.0],
    [0.0, 0.0],
];

/// Corner offsets of each face relative to the block's minimum corner, in
/// [`BlockSide`] order. Seen from outside the block, corners run counter-clockwise.
const FACE_CORNERS: [[[f32; 3]; 4]; 6] = [
    [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
    [[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
    [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]],
    [[1.0, 0.0, 1.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0]],
    [[0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
    [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
];

/// Represents the six possible faces of a voxel block.
///
/// The discriminants index the constant face tables.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// The front face (facing positive Z)
    FRONT = 0,

    /// The back face (facing negative Z)
    BACK = 1,

    /// The left face (facing negative X)
    LEFT = 2,

    /// The right face (facing positive X)
    RIGHT = 3,

    /// The top face (facing positive Y)
    TOP = 4,

    /// The bottom face (facing negative Y)
    BOTTOM = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in a consistent order.
    ///
    /// The order is: [FRONT, BACK, LEFT, RIGHT, TOP, BOTTOM]
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::LEFT,
            BlockSide::RIGHT,
            BlockSide::TOP,
            BlockSide::BOTTOM,
        ]
    }

    /// Offset from a block to the neighbor this face looks at.
    pub fn neighbor_offset(self) -> Vector3<i32> {
        match self {
            BlockSide::FRONT => Vector3::new(0, 0, 1),
            BlockSide::BACK => Vector3::new(0, 0, -1),
            BlockSide::LEFT => Vector3::new(-1, 0, 0),
            BlockSide::RIGHT => Vector3::new(1, 0, 0),
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
        }
    }

    /// The outward unit normal of this face.
    pub fn normal(self) -> [f32; 3] {
        let offset = self.neighbor_offset();
        [offset.x as f32, offset.y as f32, offset.z as f32]
    }

    /// The four corners of this face's quad.
    pub fn corners(self) -> &'static [[f32; 3]; 4] {
        &FACE_CORNERS[self as usize]
    }
}

#[cfg(test)]
mod tests {
    use cgmath::InnerSpace;

    use super::*;

    fn to_vector(corner: [f32; 3]) -> Vector3<f32> {
        Vector3::new(corner[0], corner[1], corner[2])
    }

    #[test]
    fn quads_wind_counter_clockwise_around_their_normal() {
        for side in BlockSide::all() {
            let corners = side.corners();
            let normal = to_vector(side.normal());
            for triangle in QUAD_TRIANGLE_INDICES.chunks(3) {
                let a = to_vector(corners[triangle[0]]);
                let b = to_vector(corners[triangle[1]]);
                let c = to_vector(corners[triangle[2]]);
                let facing = (b - a).cross(c - a).normalize();
                assert_eq!(facing, normal, "{side:?} winds the wrong way");
            }
        }
    }

    #[test]
    fn quads_lie_on_their_face_plane() {
        for side in BlockSide::all() {
            let offset = side.neighbor_offset();
            let normal = side.normal();
            let plane = if offset.x + offset.y + offset.z > 0 { 1.0 } else { 0.0 };
            let axis = normal.iter().position(|n| *n != 0.0).unwrap();
            for corner in side.corners() {
                assert_eq!(corner[axis], plane, "{side:?} corner {corner:?} is off plane");
            }
        }
    }
}
