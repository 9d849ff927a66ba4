//! # World Module
//!
//! This module provides the `World` struct: the fixed-capacity array of chunks
//! that make up one generated terrain, indexed by grid position.
//!
//! ## Ownership
//!
//! The world is owned by the generation pipeline and only mutated on the main
//! thread. Workers never see it; they hand finished chunks back, and the main
//! thread uploads them and inserts them here. Every stored chunk is therefore
//! [`ChunkState::Renderable`] and comes paired with the GPU handle of its
//! vertex buffer.
//!
//! ## Teardown
//!
//! [`World::clear`] gives every GPU handle back to the uploader before the
//! chunks themselves are dropped, so regenerating never leaks device buffers.

use cgmath::Point3;

use crate::engine_state::{
    buffer_state::ChunkUploader,
    voxels::chunk::{Chunk, ChunkState},
};

/// A chunk placed in the world together with its GPU buffer handle.
#[derive(Debug)]
pub struct WorldChunk<H> {
    /// The chunk, always in the `Renderable` state
    pub chunk: Chunk,
    /// Handle returned by the uploader for the chunk's vertex buffer
    pub handle: H,
}

/// A `grid_width × grid_depth` array of chunk slots.
///
/// Slot `gx * grid_depth + gz` holds the chunk whose origin is
/// `(gx * S, 0, gz * S)`. Empty slots are chunks not generated yet, or holes
/// left by failed generation.
#[derive(Debug)]
pub struct World<H> {
    grid_width: usize,
    grid_depth: usize,
    chunk_size: usize,
    slots: Vec<Option<WorldChunk<H>>>,
}

impl<H> World<H> {
    /// Creates a world with every slot empty.
    pub fn new(grid_width: usize, grid_depth: usize, chunk_size: usize) -> Self {
        let mut slots = Vec::with_capacity(grid_width * grid_depth);
        slots.resize_with(grid_width * grid_depth, || None);
        World {
            grid_width,
            grid_depth,
            chunk_size,
            slots,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots holding a chunk.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether no slot holds a chunk.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Slot index of grid position `(grid_x, grid_z)`, if it is inside the grid.
    pub fn index_of(&self, grid_x: usize, grid_z: usize) -> Option<usize> {
        (grid_x < self.grid_width && grid_z < self.grid_depth)
            .then_some(grid_x * self.grid_depth + grid_z)
    }

    /// Grid position of slot `index`.
    pub fn grid_position(&self, index: usize) -> (usize, usize) {
        (index / self.grid_depth, index % self.grid_depth)
    }

    /// World-space origin of the chunk for slot `index`.
    ///
    /// Validated settings keep every origin within `i32`.
    pub fn origin_of(&self, index: usize) -> Point3<i32> {
        let (grid_x, grid_z) = self.grid_position(index);
        Point3::new(
            (grid_x * self.chunk_size) as i32,
            0,
            (grid_z * self.chunk_size) as i32,
        )
    }

    /// Places an uploaded chunk in slot `index` and makes it renderable.
    ///
    /// Returns whatever occupied the slot before, so its handle can be released.
    /// An out-of-range index hands the new chunk straight back.
    pub fn insert(&mut self, index: usize, mut chunk: Chunk, handle: H) -> Option<WorldChunk<H>> {
        let Some(slot) = self.slots.get_mut(index) else {
            return Some(WorldChunk { chunk, handle });
        };
        chunk.mark_renderable();
        slot.replace(WorldChunk { chunk, handle })
    }

    /// The chunk at grid position `(grid_x, grid_z)`.
    pub fn get(&self, grid_x: usize, grid_z: usize) -> Option<&WorldChunk<H>> {
        self.index_of(grid_x, grid_z)
            .and_then(|index| self.slots[index].as_ref())
    }

    /// Every chunk that may be drawn, in slot order.
    pub fn renderable(&self) -> impl Iterator<Item = &WorldChunk<H>> {
        self.slots
            .iter()
            .flatten()
            .filter(|entry| entry.chunk.state() == ChunkState::Renderable)
    }

    /// Total vertices across all placed chunks.
    pub fn vertex_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .map(|entry| entry.chunk.vertex_count())
            .sum()
    }

    /// Empties every slot, releasing each GPU handle through `uploader` first.
    pub fn clear<U>(&mut self, uploader: &mut U) -> usize
    where
        U: ChunkUploader<Handle = H>,
    {
        let mut released = 0;
        for slot in &mut self.slots {
            if let Some(WorldChunk { chunk, handle }) = slot.take() {
                uploader.release(handle);
                drop(chunk);
                released += 1;
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::{
        buffer_state::{HeadlessBuffer, HeadlessUploader},
        rendering::meshing::build_mesh,
    };

    fn uploaded_chunk(
        world: &World<HeadlessBuffer>,
        uploader: &mut HeadlessUploader,
        index: usize,
    ) -> (Chunk, HeadlessBuffer) {
        let mut chunk = Chunk::filled(world.origin_of(index), 2, true);
        chunk.set_mesh(build_mesh(&chunk).unwrap());
        let handle = uploader.upload(chunk.origin, chunk.mesh().unwrap().vertices());
        chunk.mark_gpu_ready();
        (chunk, handle)
    }

    #[test]
    fn slots_are_indexed_x_major() {
        let world: World<()> = World::new(3, 4, 32);
        assert_eq!(world.capacity(), 12);
        assert_eq!(world.index_of(2, 1), Some(9));
        assert_eq!(world.index_of(3, 0), None);
        assert_eq!(world.grid_position(9), (2, 1));
        assert_eq!(world.origin_of(9), Point3::new(64, 0, 32));
    }

    #[test]
    fn inserted_chunks_become_renderable() {
        let mut uploader = HeadlessUploader::new();
        let mut world = World::new(2, 2, 2);
        let (chunk, handle) = uploaded_chunk(&world, &mut uploader, 3);
        assert!(world.insert(3, chunk, handle).is_none());

        let placed = world.get(1, 1).unwrap();
        assert_eq!(placed.chunk.state(), ChunkState::Renderable);
        assert_eq!(world.renderable().count(), 1);
        assert_eq!(world.vertex_count(), 6 * 4 * 6);
    }

    #[test]
    fn clear_releases_every_handle() {
        let mut uploader = HeadlessUploader::new();
        let mut world = World::new(2, 2, 2);
        for index in 0..4 {
            let (chunk, handle) = uploaded_chunk(&world, &mut uploader, index);
            world.insert(index, chunk, handle);
        }
        assert_eq!(uploader.analytics().live_buffers, 4);

        assert_eq!(world.clear(&mut uploader), 4);
        assert!(world.is_empty());
        assert_eq!(uploader.analytics().live_buffers, 0);
        assert_eq!(uploader.analytics().allocated_memory, 0);
    }

    #[test]
    fn replacing_a_slot_returns_the_old_chunk() {
        let mut uploader = HeadlessUploader::new();
        let mut world = World::new(1, 1, 2);
        let (first, first_handle) = uploaded_chunk(&world, &mut uploader, 0);
        let (second, second_handle) = uploaded_chunk(&world, &mut uploader, 0);
        world.insert(0, first, first_handle);

        let previous = world.insert(0, second, second_handle).unwrap();
        assert_eq!(previous.handle.id, 0);
        uploader.release(previous.handle);
        assert_eq!(uploader.analytics().live_buffers, 1);
    }
}
