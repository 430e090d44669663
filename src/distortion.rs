//! Lens distortion mesh
//!
//! A fixed grid per eye mapping screen positions to per-channel distorted
//! texture coordinates. Both eyes live in one vertex/index buffer; the
//! right eye's indices start after the left eye's vertices.

use std::ops::Range;

use log::warn;

use crate::runtime::{Eye, VrRuntime};

/// Grid samples along each axis.
pub const GRID_SIZE: u32 = 43;

/// Largest grid whose two eyes still fit 16-bit indices.
pub const MAX_GRID_SIZE: u32 = 181;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DistortionVertex {
    /// Position in [-1, 1]².
    pub position: [f32; 2],
    pub uv_red: [f32; 2],
    pub uv_green: [f32; 2],
    pub uv_blue: [f32; 2],
}

/// Vertices and indices for both eyes.
#[derive(Debug, Clone, Default)]
pub struct DistortionMesh {
    pub vertices: Vec<DistortionVertex>,
    pub indices: Vec<u16>,
    /// Index range of each eye, left then right.
    pub eye_indices: [Range<u32>; 2],
}

impl DistortionMesh {
    pub fn new(runtime: &dyn VrRuntime, grid: u32) -> Self {
        if grid > MAX_GRID_SIZE {
            warn!("Distortion grid {} too large, using {}", grid, MAX_GRID_SIZE);
        }
        let grid = grid.clamp(2, MAX_GRID_SIZE);

        let mut mesh = Self::default();
        for eye in [Eye::Left, Eye::Right] {
            let offset = mesh.vertices.len() as u16;
            let start = mesh.indices.len() as u32;
            if let Err(e) = build_eye(runtime, eye, grid, offset, &mut mesh.vertices, &mut mesh.indices) {
                warn!("{:?} eye distortion mesh skipped: {}", eye, e);
            }
            mesh.eye_indices[eye.index()] = start..mesh.indices.len() as u32;
        }
        mesh
    }

    pub fn indices_for(&self, eye: Eye) -> Range<u32> {
        self.eye_indices[eye.index()].clone()
    }
}

/// Appends one eye's grid. Samples the runtime at v-flipped coordinates and
/// flips the result back so that v = 0 stays at the bottom.
///
/// Fails without appending anything when the grid's vertices would not be
/// addressable by 16-bit indices starting at `index_offset`.
pub fn build_eye(
    runtime: &dyn VrRuntime,
    eye: Eye,
    grid: u32,
    index_offset: u16,
    vertices: &mut Vec<DistortionVertex>,
    indices: &mut Vec<u16>,
) -> Result<(), String> {
    let grid = grid.max(2);
    let last_index = index_offset as u64 + grid as u64 * grid as u64 - 1;
    if last_index > u16::MAX as u64 {
        return Err(format!(
            "{}x{} grid at offset {} exceeds 16-bit indices",
            grid, grid, index_offset
        ));
    }
    let step = 1.0 / (grid - 1) as f32;
    let mut failures = 0usize;

    for y in 0..grid {
        for x in 0..grid {
            let u = x as f32 * step;
            let v = y as f32 * step;
            let query = runtime.compute_distortion(eye, u, 1.0 - v);
            if !query.ok {
                failures += 1;
            }
            let c = query.coords;
            vertices.push(DistortionVertex {
                position: [-1.0 + 2.0 * u, -1.0 + 2.0 * v],
                uv_red: [c.red.x, 1.0 - c.red.y],
                uv_green: [c.green.x, 1.0 - c.green.y],
                uv_blue: [c.blue.x, 1.0 - c.blue.y],
            });
        }
    }
    if failures > 0 {
        warn!("{:?} eye: {} distortion samples failed", eye, failures);
    }

    let grid = grid as u16;
    for y in 0..grid - 1 {
        for x in 0..grid - 1 {
            let a = grid * y + x + index_offset;
            let b = grid * y + x + 1 + index_offset;
            let c = (y + 1) * grid + x + 1 + index_offset;
            let d = (y + 1) * grid + x + index_offset;
            indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }
    Ok(())
}
