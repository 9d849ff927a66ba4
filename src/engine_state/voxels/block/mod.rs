//! # Block Module
//!
//! Blocks are binary: a cell is solid or air, so the only per-block data the
//! engine needs is the geometry of each face.

pub mod block_side;
