//! Per-frame scene math shared by both eye passes

use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::device::Pose;
use crate::media::{eye_rects, StereoLayout, UvRect};
use crate::ray::RayHit;
use crate::runtime::ModelVertex;
use crate::screen::VirtualScreen;
use crate::settings::BackgroundSettings;

pub const SNAP_STEP_DEGREES: f32 = 22.5;
pub const SPHERE_RADIUS: f32 = 10.0;
pub const NEAR_CLIP: f32 = 0.05;
pub const FAR_CLIP: f32 = 100.0;
pub const AIM_LINE_LENGTH: f32 = 1.0;
pub const SPHERE_RINGS: u32 = 32;
pub const SPHERE_SEGMENTS: u32 = 64;

/// Vertex format of every eye-pass pipeline.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl From<&ModelVertex> for SceneVertex {
    fn from(v: &ModelVertex) -> Self {
        Self {
            position: v.position,
            uv: v.uv,
        }
    }
}

/// Per-draw uniform block, one slot of the dynamic-offset ring.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DrawUniforms {
    pub mvp: [[f32; 4]; 4],
    pub uv_rect: [f32; 4],
    pub tint: [f32; 4],
}

impl DrawUniforms {
    pub fn new(mvp: Mat4, rect: UvRect, tint: Vec4) -> Self {
        Self {
            mvp: mvp.to_cols_array_2d(),
            uv_rect: rect.to_vec4().to_array(),
            tint: tint.to_array(),
        }
    }
}

/// Quantizes a pan angle to multiples of `step` degrees.
pub fn snap_pan(degrees: f32, step: f32) -> f32 {
    if step <= 0.0 {
        return degrees;
    }
    (degrees / step).round() * step
}

/// World-to-head transform; identity while the headset is untracked.
pub fn head_transform(hmd: &Pose) -> Mat4 {
    hmd.matrix().map(|m| m.inverse()).unwrap_or(Mat4::IDENTITY)
}

pub fn eye_view_projection(projection: Mat4, eye_to_head: Mat4, head: Mat4) -> Mat4 {
    projection * eye_to_head.inverse() * head
}

/// Model matrix of the surround sphere for a pan in degrees.
pub fn sphere_model(pan_degrees: f32) -> Mat4 {
    Mat4::from_scale(Vec3::splat(SPHERE_RADIUS)) * Mat4::from_rotation_y(pan_degrees.to_radians())
}

/// Aim line endpoints: from the controller tip to the hit point, or one
/// unit along the aim direction when nothing is hit.
pub fn aim_line(aim: &Mat4, hit: &RayHit) -> (Vec3, Vec3) {
    let start = aim.w_axis.truncate();
    let end = if hit.is_valid {
        hit.hit_point
    } else {
        start + aim.transform_vector3(Vec3::NEG_Z).normalize_or_zero() * AIM_LINE_LENGTH
    };
    (start, end)
}

/// Screen strip with texture-space v (0 at the top rim).
pub fn screen_vertices(screen: &VirtualScreen) -> Vec<SceneVertex> {
    screen
        .vertices
        .iter()
        .zip(&screen.uvs)
        .map(|(p, uv)| SceneVertex {
            position: p.to_array(),
            uv: [uv.x, 1.0 - uv.y],
        })
        .collect()
}

pub struct SphereMesh {
    pub vertices: Vec<SceneVertex>,
    pub indices: Vec<u16>,
}

/// Unit UV sphere for equirectangular media viewed from inside. u = 0.5
/// faces -Z, v = 0 is straight up.
pub fn sphere_mesh(rings: u32, segments: u32) -> SphereMesh {
    let rings = rings.max(2);
    let segments = segments.max(3);
    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    for r in 0..=rings {
        let v = r as f32 / rings as f32;
        let theta = v * PI;
        for s in 0..=segments {
            let u = s as f32 / segments as f32;
            let phi = 2.0 * PI * (u - 0.5);
            vertices.push(SceneVertex {
                position: [theta.sin() * phi.sin(), theta.cos(), -theta.sin() * phi.cos()],
                uv: [u, v],
            });
        }
    }

    let stride = (segments + 1) as u16;
    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
    for r in 0..rings as u16 {
        for s in 0..segments as u16 {
            let a = r * stride + s;
            let b = a + stride;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    SphereMesh { vertices, indices }
}

/// What goes on the surround sphere this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereSource<T> {
    pub texture: T,
    pub rects: (UvRect, UvRect),
    /// Degrees added to the surround pan.
    pub pan: f32,
    pub tint: Vec4,
    /// Foreground media blends; the background is opaque.
    pub blend: bool,
}

impl<T> SphereSource<T> {
    pub fn rect(&self, eye_index: usize) -> UvRect {
        if eye_index == 0 {
            self.rects.0
        } else {
            self.rects.1
        }
    }
}

/// Open surround media wins over the configured background image.
pub fn choose_sphere_source<T>(
    surround: Option<(T, StereoLayout, bool)>,
    background: Option<T>,
    settings: &BackgroundSettings,
) -> Option<SphereSource<T>> {
    if let Some((texture, layout, swap)) = surround {
        return Some(SphereSource {
            texture,
            rects: eye_rects(layout, swap),
            pan: 0.0,
            tint: Vec4::ONE,
            blend: true,
        });
    }
    background.map(|texture| SphereSource {
        texture,
        rects: eye_rects(settings.layout, settings.swap),
        pan: settings.pan,
        tint: Vec4::new(settings.dim, settings.dim, settings.dim, 1.0),
        blend: false,
    })
}
