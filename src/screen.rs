//! Virtual screen geometry
//!
//! Builds the curved (or flat) screen the 2D UI is projected onto. The mesh
//! is a triangle strip alternating bottom/top rim vertices, so triangle `i`
//! is always vertices `i, i+1, i+2`.

use glam::{Vec2, Vec3};

/// Columns on each side of the centre column.
pub const HALF_STEPS: i32 = 50;

/// Placement parameters of the screen in tracking space (metres).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenParams {
    pub distance: f32,
    pub height: f32,
    /// Half of the screen width, measured along the arc when curved.
    pub size: f32,
    /// 0 = flat, 1 = cylinder centred on the origin.
    pub curvature: f32,
    /// Window width / height.
    pub aspect_ratio: f32,
}

impl Default for ScreenParams {
    fn default() -> Self {
        Self {
            distance: 1.6,
            height: 1.3,
            size: 1.2,
            curvature: 0.5,
            aspect_ratio: 16.0 / 9.0,
        }
    }
}

/// Screen mesh: strip-ordered vertices with a parallel UV list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VirtualScreen {
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
}

impl VirtualScreen {
    pub fn new(params: &ScreenParams) -> Self {
        let mut screen = Self::default();
        screen.regenerate(params);
        screen
    }

    /// Rebuilds the whole mesh from scratch.
    pub fn regenerate(&mut self, params: &ScreenParams) {
        let columns = (2 * HALF_STEPS + 1) as usize;
        self.vertices.clear();
        self.uvs.clear();
        self.vertices.reserve(2 * columns);
        self.uvs.reserve(2 * columns);

        let half_steps = HALF_STEPS as f32;
        let step = params.size / (params.distance * half_steps);
        let half_height = params.size / params.aspect_ratio;
        let curvature = params.curvature.clamp(0.0, 1.0);

        for i in -HALF_STEPS..=HALF_STEPS {
            let fi = i as f32;
            let angle = fi * step;
            let cylinder = Vec2::new(
                params.distance * angle.sin(),
                -params.distance * angle.cos(),
            );
            let flat = Vec2::new(fi * params.size / half_steps, -params.distance);
            let xz = flat.lerp(cylinder, curvature);
            let u = (fi + half_steps) / (2.0 * half_steps);

            self.vertices
                .push(Vec3::new(xz.x, params.height - half_height, xz.y));
            self.uvs.push(Vec2::new(u, 0.0));
            self.vertices
                .push(Vec3::new(xz.x, params.height + half_height, xz.y));
            self.uvs.push(Vec2::new(u, 1.0));
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len().saturating_sub(2)
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}
