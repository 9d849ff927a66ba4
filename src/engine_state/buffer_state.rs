//! # Buffer State Module
//!
//! This module is the seam between the terrain pipeline and the GPU. The pipeline
//! hands finished chunk meshes to a [`ChunkUploader`] on the main thread and keeps
//! the returned opaque handle until the chunk is discarded, at which point the
//! handle is given back through [`ChunkUploader::release`].
//!
//! ## Implementations
//!
//! * [`WgpuChunkUploader`] creates one `wgpu` vertex buffer per chunk
//! * [`HeadlessUploader`] keeps only the bookkeeping, for tools and tests that
//!   run without a device
//!
//! Both track [`BufferAnalytics`] so leaks of device-side buffers across
//! regenerations show up as a non-zero live count.

use std::collections::HashMap;

use cgmath::Point3;
use log::trace;
use wgpu::{util::DeviceExt, Buffer, Device};

use crate::engine_state::rendering::Vertex;

/// Running totals of the vertex buffers an uploader has handed out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BufferAnalytics {
    /// Buffers uploaded and not yet released
    pub live_buffers: u64,
    /// Bytes held by the live buffers
    pub allocated_memory: u64,
    /// Buffers created over the uploader's lifetime
    pub times_uploaded: u64,
    /// Buffers released over the uploader's lifetime
    pub times_released: u64,
}

impl BufferAnalytics {
    fn record_upload(&mut self, bytes: u64) {
        self.live_buffers += 1;
        self.allocated_memory += bytes;
        self.times_uploaded += 1;
    }

    fn record_release(&mut self, bytes: u64) {
        self.live_buffers = self.live_buffers.saturating_sub(1);
        self.allocated_memory = self.allocated_memory.saturating_sub(bytes);
        self.times_released += 1;
    }
}

/// Accepts chunk vertex buffers and returns handles that can be drawn later.
///
/// Implementations are driven from the thread that owns the rendering context
/// only; they are never shared with generation workers.
pub trait ChunkUploader {
    /// Opaque GPU-side buffer handle.
    type Handle;

    /// Uploads the vertices of the chunk at `origin`.
    fn upload(&mut self, origin: Point3<i32>, vertices: &[Vertex]) -> Self::Handle;

    /// Frees the device-side resources behind `handle`.
    fn release(&mut self, handle: Self::Handle);

    /// Current buffer totals.
    fn analytics(&self) -> BufferAnalytics;
}

/// A chunk's vertex buffer living on the GPU.
#[derive(Debug)]
pub struct GpuChunkBuffer {
    /// Chunk origin, applied as the model translation when drawing
    pub origin: Point3<i32>,
    buffer: Buffer,
    vertex_count: u32,
}

impl GpuChunkBuffer {
    /// Number of vertices in the buffer.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Issues the draw call for this chunk on an active render pass.
    ///
    /// The caller binds the pipeline and sets the chunk's model translation
    /// before calling this.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        if self.vertex_count == 0 {
            return;
        }
        render_pass.set_vertex_buffer(0, self.buffer.slice(..));
        render_pass.draw(0..self.vertex_count, 0..1);
    }
}

/// Uploads chunk meshes as `wgpu` vertex buffers.
pub struct WgpuChunkUploader {
    device: Device,
    buffer_analytics: BufferAnalytics,
}

impl WgpuChunkUploader {
    /// Creates an uploader for `device`.
    pub fn new(device: Device) -> Self {
        Self {
            device,
            buffer_analytics: BufferAnalytics::default(),
        }
    }
}

impl ChunkUploader for WgpuChunkUploader {
    type Handle = GpuChunkBuffer;

    fn upload(&mut self, origin: Point3<i32>, vertices: &[Vertex]) -> GpuChunkBuffer {
        let contents: &[u8] = bytemuck::cast_slice(vertices);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Chunk Vertex Buffer"),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.buffer_analytics.record_upload(contents.len() as u64);
        trace!(
            target: "terrain-pipeline",
            "Uploaded {} bytes for chunk {:?}",
            contents.len(),
            origin
        );

        GpuChunkBuffer {
            origin,
            buffer,
            vertex_count: vertices.len() as u32,
        }
    }

    fn release(&mut self, handle: GpuChunkBuffer) {
        self.buffer_analytics.record_release(handle.buffer.size());
        handle.buffer.destroy();
    }

    fn analytics(&self) -> BufferAnalytics {
        self.buffer_analytics
    }
}

/// Handle returned by [`HeadlessUploader`].
#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessBuffer {
    /// Unique id of the upload
    pub id: u64,
    /// Chunk origin the buffer was uploaded for
    pub origin: Point3<i32>,
    /// Number of vertices uploaded
    pub vertex_count: u32,
}

/// An uploader that keeps no device resources, only their bookkeeping.
#[derive(Debug, Default)]
pub struct HeadlessUploader {
    next_id: u64,
    live: HashMap<u64, u64>,
    buffer_analytics: BufferAnalytics,
}

impl HeadlessUploader {
    /// Creates an uploader with no live buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the buffer with `id` has been uploaded and not yet released.
    pub fn is_live(&self, id: u64) -> bool {
        self.live.contains_key(&id)
    }
}

impl ChunkUploader for HeadlessUploader {
    type Handle = HeadlessBuffer;

    fn upload(&mut self, origin: Point3<i32>, vertices: &[Vertex]) -> HeadlessBuffer {
        let bytes = std::mem::size_of_val(vertices) as u64;
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id, bytes);
        self.buffer_analytics.record_upload(bytes);

        HeadlessBuffer {
            id,
            origin,
            vertex_count: vertices.len() as u32,
        }
    }

    fn release(&mut self, handle: HeadlessBuffer) {
        match self.live.remove(&handle.id) {
            Some(bytes) => self.buffer_analytics.record_release(bytes),
            None => log::warn!(
                target: "terrain-pipeline",
                "Released unknown buffer {} for chunk {:?}",
                handle.id,
                handle.origin
            ),
        }
    }

    fn analytics(&self) -> BufferAnalytics {
        self.buffer_analytics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Vec<Vertex> {
        vec![Vertex::new([0.0; 3], [0.0, 0.0, 1.0], [0.0; 2]); 6]
    }

    #[test]
    fn headless_upload_tracks_bytes() {
        let mut uploader = HeadlessUploader::new();
        let handle = uploader.upload(Point3::new(0, 0, 32), &quad());
        assert_eq!(handle.vertex_count, 6);
        assert!(uploader.is_live(handle.id));

        let analytics = uploader.analytics();
        assert_eq!(analytics.live_buffers, 1);
        assert_eq!(analytics.allocated_memory, 6 * 32);
    }

    #[test]
    fn release_returns_memory() {
        let mut uploader = HeadlessUploader::new();
        let a = uploader.upload(Point3::new(0, 0, 0), &quad());
        let b = uploader.upload(Point3::new(32, 0, 0), &[]);
        let a_id = a.id;
        uploader.release(a);
        uploader.release(b);

        assert!(!uploader.is_live(a_id));
        assert_eq!(
            uploader.analytics(),
            BufferAnalytics {
                live_buffers: 0,
                allocated_memory: 0,
                times_uploaded: 2,
                times_released: 2,
            }
        );
    }

    #[test]
    fn handles_are_unique() {
        let mut uploader = HeadlessUploader::new();
        let a = uploader.upload(Point3::new(0, 0, 0), &quad());
        let b = uploader.upload(Point3::new(0, 0, 0), &quad());
        assert_ne!(a.id, b.id);
    }
}
