//! Scripted runtime and recording sinks for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};

use glam::{Mat4, Vec2};

use crate::actions::{Command, CommandSink};
use crate::device::{AxisKind, ControllerState, DeviceClass, DeviceIndex, DeviceSlots, Pose};
use crate::render_model::ComponentUploader;
use crate::runtime::{
    ComponentState, DistortionCoords, DistortionQuery, Eye, LoadStatus, ModelData, ModelVertex,
    TextureData, TextureId, VrEvent, VrRuntime,
};

#[derive(Default)]
pub struct MockRuntime {
    devices: HashMap<DeviceIndex, (DeviceClass, String)>,
    pub poses: DeviceSlots<Pose>,
    pub controllers: HashMap<DeviceIndex, ControllerState>,
    pub events: VecDeque<VrEvent>,
    models: HashMap<String, Vec<(String, Option<String>)>>,
    failing: HashSet<String>,
    /// Polls answered with `Loading` before each model load completes.
    pub load_latency: u32,
    pending: HashMap<String, u32>,
    pub model_load_calls: usize,
    /// Sample coordinates at which the distortion query reports failure.
    pub distortion_failures: HashSet<(u32, u32)>,
    /// Placement per `(model, component)`; unlisted components are visible
    /// at the identity transform.
    pub component_states: HashMap<(String, String), ComponentState>,
    /// Compositor errors returned for an eye on every submit.
    pub submit_failures: HashMap<Eye, String>,
    /// Eyes in submission order.
    pub submitted: Vec<Eye>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&mut self, device: DeviceIndex, class: DeviceClass, model: &str) {
        self.devices.insert(device, (class, model.to_string()));
    }

    pub fn remove_device(&mut self, device: DeviceIndex) {
        self.devices.remove(&device);
        self.poses.reset(device);
    }

    pub fn add_model(&mut self, model: &str, components: &[(&str, Option<&str>)]) {
        self.models.insert(
            model.to_string(),
            components
                .iter()
                .map(|(c, m)| (c.to_string(), m.map(str::to_string)))
                .collect(),
        );
    }

    pub fn fail_model(&mut self, name: &str) {
        self.failing.insert(name.to_string());
    }

    pub fn set_pose(&mut self, device: DeviceIndex, transform: Mat4) {
        self.poses[device] = Pose::new(transform);
    }

    pub fn set_joystick(&mut self, device: DeviceIndex, value: Vec2) {
        self.controllers.entry(device).or_default().axes[0] = value;
    }

    pub fn push(&mut self, event: VrEvent) {
        self.events.push_back(event);
    }

    pub fn place_component(&mut self, model: &str, component: &str, transform: Mat4, visible: bool) {
        self.component_states.insert(
            (model.to_string(), component.to_string()),
            ComponentState { transform, visible },
        );
    }

    /// What the compositor answers for `eye`. Shared by `submit` so that
    /// frame submission can be exercised without a GPU texture.
    pub fn record_submit(&mut self, eye: Eye) -> Result<(), String> {
        self.submitted.push(eye);
        match self.submit_failures.get(&eye) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl VrRuntime for MockRuntime {
    fn recommended_render_target_size(&self) -> (u32, u32) {
        (1024, 1024)
    }

    fn projection(&self, _eye: Eye, near: f32, far: f32) -> Mat4 {
        Mat4::perspective_rh(90f32.to_radians(), 1.0, near, far)
    }

    fn eye_to_head(&self, eye: Eye) -> Mat4 {
        let x = match eye {
            Eye::Left => -0.032,
            Eye::Right => 0.032,
        };
        Mat4::from_translation(glam::Vec3::new(x, 0.0, 0.0))
    }

    fn compute_distortion(&self, _eye: Eye, u: f32, v: f32) -> DistortionQuery {
        let uv = Vec2::new(u, v);
        let key = ((u * 1000.0).round() as u32, (v * 1000.0).round() as u32);
        DistortionQuery {
            coords: DistortionCoords {
                red: uv * 0.99,
                green: uv,
                blue: uv * 1.01,
            },
            ok: !self.distortion_failures.contains(&key),
        }
    }

    fn wait_get_poses(&mut self, poses: &mut DeviceSlots<Pose>) {
        *poses = self.poses.clone();
    }

    fn device_class(&self, device: DeviceIndex) -> DeviceClass {
        self.devices.get(&device).map(|d| d.0).unwrap_or_default()
    }

    fn is_connected(&self, device: DeviceIndex) -> bool {
        self.devices.contains_key(&device)
    }

    fn controller_state(&self, device: DeviceIndex) -> Option<ControllerState> {
        self.devices
            .contains_key(&device)
            .then(|| self.controllers.get(&device).copied().unwrap_or_default())
    }

    fn axis_kind(&self, _device: DeviceIndex, axis: usize) -> AxisKind {
        match axis {
            0 => AxisKind::Joystick,
            1 => AxisKind::Trigger,
            _ => AxisKind::None,
        }
    }

    fn poll_event(&mut self) -> Option<VrEvent> {
        self.events.pop_front()
    }

    fn render_model_name(&self, device: DeviceIndex) -> String {
        self.devices.get(&device).map(|d| d.1.clone()).unwrap_or_default()
    }

    fn component_names(&self, model: &str) -> Vec<String> {
        self.models
            .get(model)
            .map(|c| c.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    fn component_render_model_name(&self, model: &str, component: &str) -> Option<String> {
        self.models
            .get(model)?
            .iter()
            .find(|(name, _)| name == component)
            .and_then(|(_, m)| m.clone())
    }

    fn component_state(
        &self,
        model: &str,
        component: &str,
        _controller: &ControllerState,
    ) -> Option<ComponentState> {
        let placement = self
            .component_states
            .get(&(model.to_string(), component.to_string()))
            .copied()
            .unwrap_or(ComponentState {
                transform: Mat4::IDENTITY,
                visible: true,
            });
        Some(placement)
    }

    fn load_render_model(&mut self, name: &str) -> LoadStatus<ModelData> {
        self.model_load_calls += 1;
        if self.failing.contains(name) {
            return LoadStatus::Failed("not found".into());
        }
        let polls = self.pending.entry(name.to_string()).or_insert(0);
        if *polls < self.load_latency {
            *polls += 1;
            return LoadStatus::Loading;
        }
        LoadStatus::Ready(ModelData {
            vertices: vec![
                ModelVertex {
                    position: [0.0, 0.0, 0.0],
                    normal: [0.0, 0.0, 1.0],
                    uv: [0.0, 0.0],
                };
                3
            ],
            indices: vec![0, 1, 2],
            diffuse_texture: Some(TextureId(7)),
        })
    }

    fn load_texture(&mut self, _id: TextureId) -> LoadStatus<TextureData> {
        LoadStatus::Ready(TextureData {
            width: 2,
            height: 2,
            rgba: vec![255; 16],
        })
    }

    fn submit(&mut self, eye: Eye, _texture: &wgpu::Texture) -> Result<(), String> {
        self.record_submit(eye)
    }
}

/// Uploader that records the component model names it was asked for.
#[derive(Default)]
pub struct CountingUploader {
    pub uploads: Vec<String>,
}

impl ComponentUploader for CountingUploader {
    type Handle = String;

    fn upload(&mut self, name: &str, _model: &ModelData, _texture: &TextureData) -> Result<String, String> {
        self.uploads.push(name.to_string());
        Ok(name.to_string())
    }
}

#[derive(Default)]
pub struct RecordedCommands(pub Vec<Command>);

impl CommandSink for RecordedCommands {
    fn invoke(&mut self, command: Command) {
        self.0.push(command);
    }
}
