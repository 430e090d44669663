//! Controller input synthesis
//!
//! Turns tracked controller poses and buttons into mouse-equivalent pointer
//! events on the virtual screen and into bound [`Command`]s. Runs once per
//! frame on the render thread and owns all per-device state.
//!
//! [`Command`]: crate::actions::Command

use std::f32::consts::PI;

use glam::{Mat4, Vec3};
use log::{debug, info};
use winit::event::{ElementState, MouseButton};

use crate::actions::{ActionBindings, AxisDirection, CommandSink, Control, DeviceRole, InputMode, DEFAULT_BINDINGS};
use crate::device::{AxisKind, Button, DeviceIndex, DeviceSlots, Pose, TrackedDeviceState, MAX_AXES};
use crate::media::{PointerEvent, PointerSink, OFFSCREEN_UV};
use crate::ray::{trace, Ray, RayHit};
use crate::runtime::{VrEvent, VrRuntime};
use crate::screen::VirtualScreen;

/// Joystick deflection that counts as a directional press.
pub const AXIS_THRESHOLD: f32 = 0.6;

/// Render model component whose transform defines the aim ray.
pub const AIM_COMPONENT: &str = "tip";

/// Devices whose presence changed this frame, for the model loader.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InputFrame {
    pub activated: Vec<DeviceIndex>,
    pub deactivated: Vec<DeviceIndex>,
}

pub struct InputSynthesizer {
    bindings: ActionBindings,
    poses: DeviceSlots<Pose>,
    devices: DeviceSlots<TrackedDeviceState>,
    pointer_device: Option<DeviceIndex>,
    aim: Option<Mat4>,
    mouse_hit: RayHit,
    last_hit_valid: bool,
    buttons_down: Vec<MouseButton>,
    /// Aim direction at the previous frame while panning, zero when disarmed.
    pan_tracking: Vec3,
    /// Degrees, kept in (-180, 180].
    surround_pan: f32,
}

impl Default for InputSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_BINDINGS.clone())
    }
}

/// Angle of a direction in the horizontal plane, `atan2(z, x)`.
fn heading(direction: Vec3) -> f32 {
    direction.z.atan2(direction.x)
}

/// Wraps degrees into (-180, 180].
pub fn wrap_degrees(mut degrees: f32) -> f32 {
    degrees %= 360.0;
    if degrees > 180.0 {
        degrees -= 360.0;
    } else if degrees <= -180.0 {
        degrees += 360.0;
    }
    degrees
}

impl InputSynthesizer {
    pub fn new(bindings: ActionBindings) -> Self {
        Self {
            bindings,
            poses: DeviceSlots::new(),
            devices: DeviceSlots::new(),
            pointer_device: None,
            aim: None,
            mouse_hit: RayHit::default(),
            last_hit_valid: false,
            buttons_down: Vec::new(),
            pan_tracking: Vec3::ZERO,
            surround_pan: 0.0,
        }
    }

    pub fn pointer_device(&self) -> Option<DeviceIndex> {
        self.pointer_device
    }

    pub fn mouse_hit(&self) -> &RayHit {
        &self.mouse_hit
    }

    /// Aim transform of the pointer device this frame.
    pub fn aim(&self) -> Option<Mat4> {
        self.aim
    }

    pub fn aim_ray(&self) -> Option<Ray> {
        self.aim.as_ref().map(Ray::from_transform)
    }

    pub fn surround_pan(&self) -> f32 {
        self.surround_pan
    }

    pub fn set_surround_pan(&mut self, degrees: f32) {
        self.surround_pan = wrap_degrees(degrees);
    }

    pub fn is_panning(&self) -> bool {
        self.pan_tracking != Vec3::ZERO
    }

    pub fn hmd_pose(&self) -> &Pose {
        &self.poses[DeviceIndex::HMD]
    }

    pub fn devices(&self) -> &DeviceSlots<TrackedDeviceState> {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut DeviceSlots<TrackedDeviceState> {
        &mut self.devices
    }

    /// One frame of input. Blocks in `wait_get_poses`.
    pub fn update(
        &mut self,
        runtime: &mut dyn VrRuntime,
        screen: &VirtualScreen,
        mode: InputMode,
        commands: &mut dyn CommandSink,
        pointer: &mut dyn PointerSink,
    ) -> InputFrame {
        let mut frame = InputFrame::default();

        runtime.wait_get_poses(&mut self.poses);
        for (index, state) in self.devices.iter_mut() {
            state.pose = self.poses[index];
        }

        self.aim = self.compute_aim(&*runtime);
        let previous_uv = self.mouse_hit.uv;
        self.mouse_hit = match self.aim_ray() {
            Some(ray) => trace(ray, screen),
            None => RayHit::default(),
        };

        if self.mouse_hit.is_valid {
            pointer.post(PointerEvent::Moved {
                uv: self.mouse_hit.uv,
            });
        } else if self.last_hit_valid {
            self.leave_screen(previous_uv, pointer);
        }

        self.track_pan();
        self.poll_axes(&*runtime, mode, commands);

        while let Some(event) = runtime.poll_event() {
            self.handle_event(event, &*runtime, mode, commands, pointer, &mut frame);
        }

        self.last_hit_valid = self.mouse_hit.is_valid;
        frame
    }

    fn compute_aim(&self, runtime: &dyn VrRuntime) -> Option<Mat4> {
        let device = self.pointer_device?;
        let state = &self.devices[device];
        let pose = state.pose.matrix()?;
        let tip = (!state.render_model.is_empty())
            .then(|| runtime.component_state(&state.render_model, AIM_COMPONENT, &state.controller))
            .flatten()
            .map(|c| c.transform)
            .unwrap_or(Mat4::IDENTITY);
        Some(pose * tip)
    }

    /// Releases every synthesized button and parks the cursor off-screen.
    fn leave_screen(&mut self, uv: glam::Vec2, pointer: &mut dyn PointerSink) {
        for button in self.buttons_down.drain(..) {
            pointer.post(PointerEvent::Button {
                button,
                state: ElementState::Released,
                uv,
            });
        }
        pointer.post(PointerEvent::Moved { uv: OFFSCREEN_UV });
    }

    fn track_pan(&mut self) {
        if self.pan_tracking == Vec3::ZERO {
            return;
        }
        let Some(ray) = self.aim_ray() else {
            return;
        };
        let delta = wrap_degrees((heading(ray.direction) - heading(self.pan_tracking)) * 180.0 / PI);
        self.surround_pan = wrap_degrees(self.surround_pan + delta);
        self.pan_tracking = ray.direction;
    }

    fn poll_axes(&mut self, runtime: &dyn VrRuntime, mode: InputMode, commands: &mut dyn CommandSink) {
        for (index, state) in self.devices.iter_mut() {
            state.class = runtime.device_class(index);
            if !state.class.is_controller() {
                continue;
            }
            let Some(controller) = runtime.controller_state(index) else {
                continue;
            };
            state.previous_controller = state.controller;
            state.controller = controller;

            let role = DeviceRole::of(self.pointer_device == Some(index));
            for axis in 0..MAX_AXES {
                if runtime.axis_kind(index, axis) != AxisKind::Joystick {
                    continue;
                }
                let before = state.previous_controller.axes[axis];
                let now = state.controller.axes[axis];
                for direction in AxisDirection::ALL {
                    let was = direction.project(before) > AXIS_THRESHOLD;
                    let is = direction.project(now) > AXIS_THRESHOLD;
                    if is && !was {
                        self.bindings
                            .dispatch(mode, role, Control::Axis(direction), commands);
                    }
                }
            }
        }
    }

    fn claim_pointer(&mut self, device: DeviceIndex) {
        if self.pointer_device.is_none() && self.devices[device].class.is_controller() {
            info!("Device {} is now the pointer device", device);
            self.pointer_device = Some(device);
        }
    }

    fn handle_event(
        &mut self,
        event: VrEvent,
        runtime: &dyn VrRuntime,
        mode: InputMode,
        commands: &mut dyn CommandSink,
        pointer: &mut dyn PointerSink,
        frame: &mut InputFrame,
    ) {
        match event {
            VrEvent::DeviceActivated(device) => {
                info!("Device {} activated", device);
                self.devices[device].class = runtime.device_class(device);
                frame.activated.push(device);
                self.claim_pointer(device);
            }
            VrEvent::DeviceDeactivated(device) => {
                info!("Device {} deactivated", device);
                frame.deactivated.push(device);
                if self.pointer_device == Some(device) {
                    info!("Pointer device {} lost", device);
                    self.pointer_device = None;
                    self.aim = None;
                    self.pan_tracking = Vec3::ZERO;
                    if self.mouse_hit.is_valid {
                        let uv = self.mouse_hit.uv;
                        self.leave_screen(uv, pointer);
                        self.mouse_hit = RayHit::default();
                    }
                }
                self.devices.reset(device);
            }
            VrEvent::ButtonPress { device, button } => {
                if self.pointer_device.is_none() {
                    self.devices[device].class = runtime.device_class(device);
                    self.claim_pointer(device);
                }
                if self.pointer_device != Some(device) {
                    return;
                }
                match button {
                    Button::Trigger if self.mouse_hit.is_valid => {
                        self.press(MouseButton::Left, pointer);
                    }
                    Button::Grip if mode != InputMode::FileBrowser => {
                        if let Some(ray) = self.aim_ray() {
                            debug!("Pan tracking armed");
                            self.pan_tracking = ray.direction;
                        }
                    }
                    _ => {}
                }
            }
            VrEvent::ButtonUnpress { device, button } => {
                let is_pointer = self.pointer_device == Some(device);
                match button {
                    Button::Trigger if is_pointer => {
                        if self.mouse_hit.is_valid {
                            self.release(MouseButton::Left, pointer);
                        }
                    }
                    Button::Grip if is_pointer => {
                        self.pan_tracking = Vec3::ZERO;
                    }
                    _ => {
                        self.bindings.dispatch(
                            mode,
                            DeviceRole::of(is_pointer),
                            Control::Button(button),
                            commands,
                        );
                    }
                }
            }
        }
    }

    fn press(&mut self, button: MouseButton, pointer: &mut dyn PointerSink) {
        if self.buttons_down.contains(&button) {
            return;
        }
        self.buttons_down.push(button);
        pointer.post(PointerEvent::Button {
            button,
            state: ElementState::Pressed,
            uv: self.mouse_hit.uv,
        });
    }

    fn release(&mut self, button: MouseButton, pointer: &mut dyn PointerSink) {
        let Some(i) = self.buttons_down.iter().position(|b| *b == button) else {
            return;
        };
        self.buttons_down.remove(i);
        pointer.post(PointerEvent::Button {
            button,
            state: ElementState::Released,
            uv: self.mouse_hit.uv,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Command;
    use crate::device::DeviceClass;
    use crate::screen::ScreenParams;
    use crate::testing::{MockRuntime, RecordedCommands};
    use glam::Vec2;

    struct Rig {
        runtime: MockRuntime,
        input: InputSynthesizer,
        screen: VirtualScreen,
        commands: RecordedCommands,
        events: Vec<PointerEvent>,
        controller: DeviceIndex,
    }

    impl Rig {
        fn new() -> Self {
            let mut runtime = MockRuntime::new();
            let controller = DeviceIndex::new(1).unwrap();
            runtime.add_device(DeviceIndex::HMD, DeviceClass::Hmd, "");
            runtime.add_device(controller, DeviceClass::Controller, "wand");
            runtime.set_pose(DeviceIndex::HMD, Mat4::IDENTITY);
            runtime.push(VrEvent::DeviceActivated(controller));
            Self {
                runtime,
                input: InputSynthesizer::default(),
                screen: VirtualScreen::new(&ScreenParams {
                    distance: 2.0,
                    height: 1.0,
                    size: 1.0,
                    curvature: 0.0,
                    aspect_ratio: 1.0,
                }),
                commands: RecordedCommands::default(),
                events: Vec::new(),
                controller,
            }
        }

        fn frame(&mut self, mode: InputMode) -> InputFrame {
            self.input.update(
                &mut self.runtime,
                &self.screen,
                mode,
                &mut self.commands,
                &mut self.events,
            )
        }

        fn aim_at_screen(&mut self) {
            self.runtime
                .set_pose(self.controller, Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)));
        }

        fn aim_away(&mut self) {
            self.runtime.set_pose(
                self.controller,
                Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)) * Mat4::from_rotation_y(PI),
            );
        }
    }

    #[test]
    fn first_activated_controller_becomes_pointer() {
        let mut rig = Rig::new();
        let frame = rig.frame(InputMode::FileBrowser);
        assert_eq!(frame.activated, vec![rig.controller]);
        assert_eq!(rig.input.pointer_device(), Some(rig.controller));
    }

    #[test]
    fn hmd_never_claims_pointer() {
        let mut rig = Rig::new();
        rig.runtime.events.clear();
        rig.runtime.push(VrEvent::DeviceActivated(DeviceIndex::HMD));
        rig.frame(InputMode::FileBrowser);
        assert_eq!(rig.input.pointer_device(), None);
    }

    #[test]
    fn hit_moves_pointer_to_uv() {
        let mut rig = Rig::new();
        rig.aim_at_screen();
        rig.frame(InputMode::FileBrowser);
        rig.events.clear();
        rig.frame(InputMode::FileBrowser);

        assert!(rig.input.mouse_hit().is_valid);
        match rig.events.as_slice() {
            [PointerEvent::Moved { uv }] => assert!(uv.abs_diff_eq(Vec2::new(0.5, 0.5), 1e-4)),
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn trigger_press_needs_a_valid_hit() {
        let mut rig = Rig::new();
        rig.aim_away();
        rig.frame(InputMode::FileBrowser);
        rig.runtime.push(VrEvent::ButtonPress {
            device: rig.controller,
            button: Button::Trigger,
        });
        rig.frame(InputMode::FileBrowser);
        assert!(rig
            .events
            .iter()
            .all(|e| !matches!(e, PointerEvent::Button { .. })));
    }

    #[test]
    fn aim_follows_the_tip_component() {
        let mut rig = Rig::new();
        rig.aim_at_screen();
        rig.frame(InputMode::FileBrowser);
        rig.input.devices_mut()[rig.controller].render_model = "wand".to_string();
        let tip = Mat4::from_translation(Vec3::new(0.2, 0.1, 0.0));
        rig.runtime.place_component("wand", AIM_COMPONENT, tip, true);
        rig.frame(InputMode::FileBrowser);

        let aim = rig.input.aim().unwrap();
        assert!(aim
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(Vec3::new(0.2, 1.1, 0.0), 1e-6));
        let hit = rig.input.mouse_hit();
        assert!(hit.is_valid);
        assert!(hit.uv.x > 0.5);
        assert!(!hit.uv.abs_diff_eq(Vec2::new(0.5, 0.5), 1e-3));
    }

    #[test]
    fn trigger_release_on_screen_releases_left_button() {
        let mut rig = Rig::new();
        rig.aim_at_screen();
        rig.frame(InputMode::FileBrowser);
        rig.runtime.push(VrEvent::ButtonPress {
            device: rig.controller,
            button: Button::Trigger,
        });
        rig.frame(InputMode::FileBrowser);

        rig.events.clear();
        for _ in 0..2 {
            rig.runtime.push(VrEvent::ButtonUnpress {
                device: rig.controller,
                button: Button::Trigger,
            });
        }
        rig.frame(InputMode::FileBrowser);

        let buttons: Vec<_> = rig
            .events
            .iter()
            .filter(|e| matches!(e, PointerEvent::Button { .. }))
            .collect();
        assert_eq!(
            buttons,
            vec![&PointerEvent::Button {
                button: MouseButton::Left,
                state: ElementState::Released,
                uv: rig.input.mouse_hit().uv,
            }]
        );
        assert!(rig.commands.0.is_empty());
    }

    #[test]
    fn leaving_the_screen_releases_each_button_once() {
        let mut rig = Rig::new();
        rig.aim_at_screen();
        rig.frame(InputMode::FileBrowser);
        rig.runtime.push(VrEvent::ButtonPress {
            device: rig.controller,
            button: Button::Trigger,
        });
        rig.frame(InputMode::FileBrowser);
        assert!(rig.events.contains(&PointerEvent::Button {
            button: MouseButton::Left,
            state: ElementState::Pressed,
            uv: rig.input.mouse_hit().uv,
        }));

        rig.events.clear();
        rig.aim_away();
        rig.frame(InputMode::FileBrowser);

        assert_eq!(rig.events.len(), 2);
        assert!(matches!(
            rig.events[0],
            PointerEvent::Button {
                button: MouseButton::Left,
                state: ElementState::Released,
                ..
            }
        ));
        assert_eq!(rig.events[1], PointerEvent::Moved { uv: OFFSCREEN_UV });

        rig.events.clear();
        rig.frame(InputMode::FileBrowser);
        assert!(rig.events.is_empty());

        rig.runtime.push(VrEvent::ButtonUnpress {
            device: rig.controller,
            button: Button::Trigger,
        });
        rig.frame(InputMode::FileBrowser);
        assert!(rig.events.is_empty());
    }

    #[test]
    fn image_viewer_a_release_fires_zoom_fit_once() {
        let mut rig = Rig::new();
        rig.frame(InputMode::ImageViewer);
        rig.runtime.push(VrEvent::ButtonPress {
            device: rig.controller,
            button: Button::A,
        });
        rig.frame(InputMode::ImageViewer);
        assert!(rig.commands.0.is_empty());
        rig.runtime.push(VrEvent::ButtonUnpress {
            device: rig.controller,
            button: Button::A,
        });
        rig.frame(InputMode::ImageViewer);
        assert_eq!(rig.commands.0, vec![Command::ZoomFit]);
    }

    #[test]
    fn joystick_fires_once_per_threshold_crossing() {
        let mut rig = Rig::new();
        rig.frame(InputMode::VideoPlayer);
        rig.runtime.set_joystick(rig.controller, Vec2::new(0.9, 0.0));
        rig.frame(InputMode::VideoPlayer);
        rig.frame(InputMode::VideoPlayer);
        assert_eq!(rig.commands.0, vec![Command::SeekForward]);

        rig.runtime.set_joystick(rig.controller, Vec2::new(0.0, -0.9));
        rig.frame(InputMode::VideoPlayer);
        assert_eq!(rig.commands.0, vec![Command::SeekForward, Command::VolumeDown]);

        rig.runtime.set_joystick(rig.controller, Vec2::new(0.3, -0.3));
        rig.frame(InputMode::VideoPlayer);
        assert_eq!(rig.commands.0.len(), 2);
    }

    #[test]
    fn secondary_controller_uses_secondary_bindings() {
        let mut rig = Rig::new();
        let second = DeviceIndex::new(2).unwrap();
        rig.runtime.add_device(second, DeviceClass::Controller, "wand");
        rig.runtime.push(VrEvent::DeviceActivated(second));
        rig.frame(InputMode::ImageViewer);
        assert_eq!(rig.input.pointer_device(), Some(rig.controller));

        rig.runtime.push(VrEvent::ButtonUnpress {
            device: second,
            button: Button::A,
        });
        rig.frame(InputMode::ImageViewer);
        assert_eq!(rig.commands.0, vec![Command::FileInfo]);
    }

    #[test]
    fn grip_pan_follows_aim_heading() {
        let mut rig = Rig::new();
        rig.aim_at_screen();
        rig.frame(InputMode::ImageViewer);
        rig.runtime.push(VrEvent::ButtonPress {
            device: rig.controller,
            button: Button::Grip,
        });
        rig.frame(InputMode::ImageViewer);
        assert!(rig.input.is_panning());
        let before = rig.input.surround_pan();

        rig.runtime.set_pose(
            rig.controller,
            Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0))
                * Mat4::from_rotation_y((-10f32).to_radians()),
        );
        rig.frame(InputMode::ImageViewer);
        let delta = rig.input.surround_pan() - before;
        assert!((delta - 10.0).abs() < 1e-3, "delta = {delta}");

        rig.runtime.push(VrEvent::ButtonUnpress {
            device: rig.controller,
            button: Button::Grip,
        });
        rig.frame(InputMode::ImageViewer);
        assert!(!rig.input.is_panning());
    }

    #[test]
    fn grip_does_not_pan_in_file_browser() {
        let mut rig = Rig::new();
        rig.aim_at_screen();
        rig.frame(InputMode::FileBrowser);
        rig.runtime.push(VrEvent::ButtonPress {
            device: rig.controller,
            button: Button::Grip,
        });
        rig.frame(InputMode::FileBrowser);
        assert!(!rig.input.is_panning());
    }

    #[test]
    fn losing_the_pointer_device_frees_the_role() {
        let mut rig = Rig::new();
        rig.aim_at_screen();
        rig.frame(InputMode::FileBrowser);
        rig.runtime.push(VrEvent::ButtonPress {
            device: rig.controller,
            button: Button::Trigger,
        });
        rig.frame(InputMode::FileBrowser);
        rig.events.clear();

        rig.runtime.remove_device(rig.controller);
        rig.runtime.push(VrEvent::DeviceDeactivated(rig.controller));
        let frame = rig.frame(InputMode::FileBrowser);
        assert_eq!(frame.deactivated, vec![rig.controller]);
        assert_eq!(rig.input.pointer_device(), None);
        assert_eq!(
            rig.events.last(),
            Some(&PointerEvent::Moved { uv: OFFSCREEN_UV })
        );

        let second = DeviceIndex::new(2).unwrap();
        rig.runtime.add_device(second, DeviceClass::Controller, "wand");
        rig.runtime.push(VrEvent::ButtonPress {
            device: second,
            button: Button::A,
        });
        rig.frame(InputMode::FileBrowser);
        assert_eq!(rig.input.pointer_device(), Some(second));
    }

    #[test]
    fn degrees_wrap_into_half_open_range() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-180.0), 180.0);
        assert_eq!(wrap_degrees(540.0), 180.0);
        assert_eq!(wrap_degrees(45.0), 45.0);
    }
}
