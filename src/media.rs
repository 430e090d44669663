//! Host-side collaborators: media textures, the UI surface, pointer events.

use glam::{Vec2, Vec4};
use winit::event::{ElementState, MouseButton};

use crate::runtime::Eye;

/// How the two views of a stereo source are packed into one texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StereoLayout {
    #[default]
    SideBySide,
    SideBySideAnamorphic,
    TopBottom,
    TopBottomAnamorphic,
    Mono,
}

impl StereoLayout {
    pub fn as_str(self) -> &'static str {
        match self {
            StereoLayout::SideBySide => "sideBySide",
            StereoLayout::SideBySideAnamorphic => "sideBySideAnamorphic",
            StereoLayout::TopBottom => "topBottom",
            StereoLayout::TopBottomAnamorphic => "topBottomAnamorphic",
            StereoLayout::Mono => "mono",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            StereoLayout::SideBySide,
            StereoLayout::SideBySideAnamorphic,
            StereoLayout::TopBottom,
            StereoLayout::TopBottomAnamorphic,
            StereoLayout::Mono,
        ]
        .into_iter()
        .find(|layout| layout.as_str() == s)
    }
}

/// Sub-rectangle of a texture in UV space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    pub offset: Vec2,
    pub size: Vec2,
}

impl UvRect {
    pub const FULL: UvRect = UvRect {
        offset: Vec2::ZERO,
        size: Vec2::ONE,
    };

    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            offset: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    /// Packed as `(offset, size)` for the shader.
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.offset.x, self.offset.y, self.size.x, self.size.y)
    }
}

/// Left and right source rectangles for a layout. Anamorphic variants share
/// the rectangles of their full-resolution counterparts; only the display
/// aspect differs, which does not matter on a sphere.
pub fn eye_rects(layout: StereoLayout, swap: bool) -> (UvRect, UvRect) {
    let (left, right) = match layout {
        StereoLayout::SideBySide | StereoLayout::SideBySideAnamorphic => (
            UvRect::new(0.0, 0.0, 0.5, 1.0),
            UvRect::new(0.5, 0.0, 0.5, 1.0),
        ),
        StereoLayout::TopBottom | StereoLayout::TopBottomAnamorphic => (
            UvRect::new(0.0, 0.0, 1.0, 0.5),
            UvRect::new(0.0, 0.5, 1.0, 0.5),
        ),
        StereoLayout::Mono => (UvRect::FULL, UvRect::FULL),
    };
    if swap {
        (right, left)
    } else {
        (left, right)
    }
}

/// A texture the renderer may place on the surround sphere.
pub struct MediaTexture<'a> {
    pub view: &'a wgpu::TextureView,
    /// Surround media is always drawn on the sphere; other media only
    /// when nothing else is open.
    pub is_surround: bool,
    pub layout: StereoLayout,
    pub swap: bool,
}

/// Supplies the currently open media.
pub trait MediaProvider {
    fn current_texture(&self) -> Option<MediaTexture<'_>>;

    /// Decoded background image named by the settings, if loaded.
    fn background_texture(&self) -> Option<&wgpu::TextureView>;
}

/// Supplies the already-rendered 2D UI, one texture per eye.
pub trait UiSurface {
    fn eye_texture(&self, eye: Eye) -> &wgpu::TextureView;
}

/// Off-screen position used to park the synthesized cursor.
pub const OFFSCREEN_UV: Vec2 = Vec2::new(-1.0, -1.0);

/// Mouse-equivalent events in screen UV space; the host maps UV to pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Moved { uv: Vec2 },
    Button { button: MouseButton, state: ElementState, uv: Vec2 },
}

/// Receives synthesized pointer events.
pub trait PointerSink {
    fn post(&mut self, event: PointerEvent);
}

impl PointerSink for Vec<PointerEvent> {
    fn post(&mut self, event: PointerEvent) {
        self.push(event);
    }
}
