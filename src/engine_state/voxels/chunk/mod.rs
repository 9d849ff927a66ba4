//! # Chunk Module
//!
//! This module provides the `Chunk` struct: a cubic S×S×S grid of occupancy bits
//! placed at a world-space origin, plus the vertex buffer built from it.
//!
//! ## Storage
//!
//! Occupancy is one bit per cell in a `BitVec`, indexed x-major, then y, then z.
//! A set bit is solid terrain, a clear bit is air.
//!
//! ## Lifecycle
//!
//! A chunk moves through [`ChunkState`] in order. Workers own it while it is
//! `Empty`, `Populated` and `Meshed`; the main thread uploads it (`GpuReady`) and
//! places it in the world where it becomes `Renderable`.

use bitvec::prelude::BitVec;
use cgmath::Point3;

use super::block::block_side::BlockSide;
use crate::engine_state::{
    error::GenerationError, noise, rendering::meshing::ChunkMesh, settings::TerrainSettings,
};

/// Largest supported chunk side length.
pub const MAX_CHUNK_SIZE: usize = 1024;

/// Where a chunk is in its generate -> mesh -> upload -> render handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChunkState {
    /// Allocated, occupancy not yet generated.
    Empty,
    /// Every cell of the occupancy grid has been written.
    Populated,
    /// The vertex buffer has been built from the occupancy grid.
    Meshed,
    /// The vertex buffer has been handed to the GPU.
    GpuReady,
    /// Placed in the world and visible to the render pass.
    Renderable,
}

/// A fixed-size cube of voxels in the world.
#[derive(Debug)]
pub struct Chunk {
    /// World-space position of the chunk's minimum corner.
    pub origin: Point3<i32>,
    /// Side length of the grid.
    size: usize,
    /// One bit per cell, set when the cell is solid.
    solid_array: BitVec,
    state: ChunkState,
    mesh: Option<ChunkMesh>,
}

impl Chunk {
    /// Creates an unpopulated chunk. All cells read as air until [`Chunk::populate`] runs.
    ///
    /// # Panics
    /// If `size` exceeds [`MAX_CHUNK_SIZE`]. Use [`Chunk::try_new`] for sizes
    /// that come from settings.
    pub fn new(origin: Point3<i32>, size: usize) -> Self {
        assert!(
            size <= MAX_CHUNK_SIZE,
            "chunk size {size} exceeds {MAX_CHUNK_SIZE}"
        );
        Chunk {
            origin,
            size,
            solid_array: BitVec::repeat(false, size * size * size),
            state: ChunkState::Empty,
            mesh: None,
        }
    }

    /// Creates an unpopulated chunk, rejecting sizes whose grid cannot be allocated.
    ///
    /// # Errors
    /// [`GenerationError::ChunkTooLarge`] when `size` exceeds [`MAX_CHUNK_SIZE`].
    pub fn try_new(origin: Point3<i32>, size: usize) -> Result<Self, GenerationError> {
        let cells = size
            .checked_pow(3)
            .filter(|_| size <= MAX_CHUNK_SIZE)
            .ok_or(GenerationError::ChunkTooLarge {
                size,
                max: MAX_CHUNK_SIZE,
            })?;
        Ok(Chunk {
            origin,
            size,
            solid_array: BitVec::repeat(false, cells),
            state: ChunkState::Empty,
            mesh: None,
        })
    }

    /// Creates the chunk for grid cell `(grid_x, grid_z)`: origin `(grid_x * S, 0, grid_z * S)`.
    ///
    /// # Errors
    /// [`GenerationError::ChunkOutOfRange`] when the origin does not fit `i32`,
    /// and [`GenerationError::ChunkTooLarge`] for oversized chunks.
    pub fn at_grid_position(
        grid_x: usize,
        grid_z: usize,
        size: usize,
    ) -> Result<Self, GenerationError> {
        let axis = |grid: usize| {
            grid.checked_mul(size)
                .and_then(|extent| i32::try_from(extent).ok())
        };
        let (Some(x), Some(z)) = (axis(grid_x), axis(grid_z)) else {
            return Err(GenerationError::ChunkOutOfRange {
                grid_x,
                grid_z,
                size,
            });
        };
        Self::try_new(Point3::new(x, 0, z), size)
    }

    /// Creates a populated chunk whose cells are all solid or all air.
    pub fn filled(origin: Point3<i32>, size: usize, solid: bool) -> Self {
        let mut chunk = Self::new(origin, size);
        chunk.solid_array.fill(solid);
        chunk.state = ChunkState::Populated;
        chunk
    }

    /// Creates a populated chunk with a 3D checkerboard of solid and air cells.
    pub fn checkerboard(origin: Point3<i32>, size: usize) -> Self {
        let mut chunk = Self::new(origin, size);
        for x in 0..size {
            for y in 0..size {
                for z in 0..size {
                    chunk.set_block_solid(x, y, z, (x + y + z) % 2 == 0);
                }
            }
        }
        chunk.state = ChunkState::Populated;
        chunk
    }

    /// Fills every cell from the height field of `seed`.
    ///
    /// For each column the surface height is the noise remapped from [-1, 1] to
    /// [0, S]; cells below it are solid and the rest are air. Two chunks with the
    /// same origin, size, seed and terrain settings end up bit-identical.
    pub fn populate(&mut self, seed: i32, terrain: &TerrainSettings) {
        for x in 0..self.size {
            for z in 0..self.size {
                let world_x = self.origin.x as f32 + x as f32;
                let world_z = self.origin.z as f32 + z as f32;
                let height = surface_height(world_x, world_z, seed, terrain, self.size);
                for y in 0..self.size {
                    self.set_block_solid(x, y, z, (y as f32) < height);
                }
            }
        }
        self.state = ChunkState::Populated;
    }

    /// Side length of the grid.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Current handoff state.
    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Index of a cell in the occupancy bit vector.
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (x * self.size + y) * self.size + z
    }

    /// Checks if the block at the specified chunk-relative coordinates is solid.
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    pub fn is_block_solid(&self, x: usize, y: usize, z: usize) -> bool {
        self.solid_array[self.index(x, y, z)]
    }

    /// Marks a cell solid or air.
    pub fn set_block_solid(&mut self, x: usize, y: usize, z: usize, solid: bool) {
        let index = self.index(x, y, z);
        self.solid_array.set(index, solid);
    }

    /// Number of solid cells.
    pub fn solid_count(&self) -> usize {
        self.solid_array.count_ones()
    }

    /// Whether the `side` face of the cell at `(x, y, z)` can be seen.
    ///
    /// A face is exposed when the neighbor it looks at is air or lies outside the
    /// chunk. Neighboring chunks are not consulted, so both sides of a chunk seam
    /// keep their boundary faces.
    pub fn is_face_exposed(&self, x: usize, y: usize, z: usize, side: BlockSide) -> bool {
        let offset = side.neighbor_offset();
        let neighbor = (
            x.checked_add_signed(offset.x as isize),
            y.checked_add_signed(offset.y as isize),
            z.checked_add_signed(offset.z as isize),
        );
        match neighbor {
            (Some(nx), Some(ny), Some(nz))
                if nx < self.size && ny < self.size && nz < self.size =>
            {
                !self.is_block_solid(nx, ny, nz)
            }
            _ => true,
        }
    }

    /// The vertex buffer, once the chunk has been meshed.
    pub fn mesh(&self) -> Option<&ChunkMesh> {
        self.mesh.as_ref()
    }

    /// Number of vertices in the mesh, zero before meshing.
    pub fn vertex_count(&self) -> usize {
        self.mesh.as_ref().map_or(0, ChunkMesh::vertex_count)
    }

    /// Stores the finished vertex buffer and advances to [`ChunkState::Meshed`].
    pub fn set_mesh(&mut self, mesh: ChunkMesh) {
        self.mesh = Some(mesh);
        self.state = ChunkState::Meshed;
    }

    /// Records that the vertex buffer now lives on the GPU.
    pub fn mark_gpu_ready(&mut self) {
        debug_assert_eq!(self.state, ChunkState::Meshed);
        self.state = ChunkState::GpuReady;
    }

    /// Records that the chunk is in the world and may be drawn.
    pub fn mark_renderable(&mut self) {
        debug_assert_eq!(self.state, ChunkState::GpuReady);
        self.state = ChunkState::Renderable;
    }
}

/// Surface height of the world column `(world_x, world_z)`, in blocks above the chunk floor.
pub fn surface_height(
    world_x: f32,
    world_z: f32,
    seed: i32,
    terrain: &TerrainSettings,
    size: usize,
) -> f32 {
    let value = noise::fractal_noise(
        terrain.scale,
        terrain.octaves,
        terrain.persistence,
        terrain.lacunarity,
        world_x,
        world_z,
        seed,
    );
    (value + 1.0) * 0.5 * size as f32
}
