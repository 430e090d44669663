//! Platform VR runtime interface
//!
//! Everything the headset driver needs from the platform: poses, controller
//! state, the event queue, render models, lens distortion and compositor
//! submission. Backends implement [`VrRuntime`]; the rest of the crate only
//! talks to this trait.

use glam::{Mat4, Vec2};

use crate::device::{AxisKind, Button, ControllerState, DeviceClass, DeviceIndex, DeviceSlots, Pose};

/// Which eye a view or texture belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }
}

/// Events drained from the runtime queue once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VrEvent {
    DeviceActivated(DeviceIndex),
    DeviceDeactivated(DeviceIndex),
    ButtonPress { device: DeviceIndex, button: Button },
    ButtonUnpress { device: DeviceIndex, button: Button },
}

/// Outcome of one poll of an asynchronous runtime load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus<T> {
    Loading,
    Ready(T),
    Failed(String),
}

/// Identifier of a diffuse texture inside the runtime's model store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub i32);

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Raw render model geometry as delivered by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelData {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u16>,
    pub diffuse_texture: Option<TextureId>,
}

/// Raw RGBA8 diffuse texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Per-channel lens-distorted texture coordinates for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistortionCoords {
    pub red: Vec2,
    pub green: Vec2,
    pub blue: Vec2,
}

/// Result of a distortion query. `coords` is whatever the runtime wrote,
/// even when `ok` is false.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistortionQuery {
    pub coords: DistortionCoords,
    pub ok: bool,
}

/// Component placement for the current controller state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentState {
    pub transform: Mat4,
    pub visible: bool,
}

/// The platform VR runtime. All calls happen on the render thread.
pub trait VrRuntime {
    /// Per-eye render target size in pixels.
    fn recommended_render_target_size(&self) -> (u32, u32);

    fn projection(&self, eye: Eye, near: f32, far: f32) -> Mat4;

    fn eye_to_head(&self, eye: Eye) -> Mat4;

    fn compute_distortion(&self, eye: Eye, u: f32, v: f32) -> DistortionQuery;

    /// Blocks until the compositor hands out poses for the next frame.
    fn wait_get_poses(&mut self, poses: &mut DeviceSlots<Pose>);

    fn device_class(&self, device: DeviceIndex) -> DeviceClass;

    fn is_connected(&self, device: DeviceIndex) -> bool;

    fn controller_state(&self, device: DeviceIndex) -> Option<ControllerState>;

    fn axis_kind(&self, device: DeviceIndex, axis: usize) -> AxisKind;

    fn poll_event(&mut self) -> Option<VrEvent>;

    /// Tracked render model name of a device, empty when it has none.
    fn render_model_name(&self, device: DeviceIndex) -> String;

    fn component_names(&self, model: &str) -> Vec<String>;

    /// Render model used to draw a component; `None` when the component
    /// has no visual.
    fn component_render_model_name(&self, model: &str, component: &str) -> Option<String>;

    fn component_state(
        &self,
        model: &str,
        component: &str,
        controller: &ControllerState,
    ) -> Option<ComponentState>;

    fn load_render_model(&mut self, name: &str) -> LoadStatus<ModelData>;

    fn load_texture(&mut self, id: TextureId) -> LoadStatus<TextureData>;

    fn submit(&mut self, eye: Eye, texture: &wgpu::Texture) -> Result<(), String>;
}
