//! VR driver lifecycle
//!
//! [`VrSubsystem`] owns the settings and a lazily created [`VrDriver`]. The
//! driver is created on the first render attempt; initialization failure
//! or a compositor submit failure leaves the subsystem in a terminal error
//! state until [`VrSubsystem::reinit`].

use std::rc::Rc;

use glam::Mat4;
use log::{error, info, warn};

use crate::actions::{CommandSink, InputMode};
use crate::device::{DeviceIndex, DeviceSlots, TrackedDeviceState};
use crate::distortion::{DistortionMesh, GRID_SIZE};
use crate::gpu::GpuContext;
use crate::input::{InputFrame, InputSynthesizer};
use crate::media::{MediaProvider, PointerSink, UiSurface};
use crate::render_model::{ComponentUploader, ModelLoader, RetryPolicy};
use crate::renderer::scene::{
    aim_line, choose_sphere_source, eye_view_projection, head_transform, snap_pan, FAR_CLIP, NEAR_CLIP,
    SNAP_STEP_DEGREES,
};
use crate::renderer::{eye_target_size, GpuComponent, ModelDraw, SceneFrame, StereoRenderer};
use crate::runtime::{Eye, VrRuntime};
use crate::screen::{ScreenParams, VirtualScreen};
use crate::settings::{BackgroundSettings, SettingsStore, VrSettings};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DriverState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Rendering,
    ShuttingDown,
    Error(String),
}

impl DriverState {
    pub fn is_active(&self) -> bool {
        matches!(self, DriverState::Ready | DriverState::Rendering)
    }
}

/// Host collaborators for one frame.
pub struct FrameContext<'a> {
    pub gpu: &'a GpuContext,
    pub mode: InputMode,
    pub media: &'a dyn MediaProvider,
    pub ui: &'a dyn UiSurface,
    pub commands: &'a mut dyn CommandSink,
    pub pointer: &'a mut dyn PointerSink,
}

/// A VR backend.
pub trait VrDriver {
    fn name(&self) -> &'static str;

    /// Connects to the platform runtime. Fails when no headset or
    /// compositor is available.
    fn start(&mut self) -> Result<(), String>;

    /// Creates per-eye targets, the distortion mesh and models of devices
    /// that are already connected.
    fn create_resources(&mut self, gpu: &GpuContext, settings: &VrSettings) -> Result<(), String>;

    fn set_screen_params(&mut self, params: &ScreenParams);

    /// Runs input and renders both eyes. An error is a compositor failure.
    fn render(&mut self, frame: &mut FrameContext<'_>, settings: &VrSettings) -> Result<(), String>;

    fn surround_pan(&self) -> f32 {
        0.0
    }

    fn set_surround_pan(&mut self, _degrees: f32) {}

    /// Releases every GPU resource and the runtime connection.
    fn shutdown(&mut self);
}

/// Backend used when the build has no headset support.
#[derive(Debug, Default)]
pub struct NullDriver;

impl VrDriver for NullDriver {
    fn name(&self) -> &'static str {
        "null"
    }

    fn start(&mut self) -> Result<(), String> {
        Err("No VR runtime available".to_string())
    }

    fn create_resources(&mut self, _gpu: &GpuContext, _settings: &VrSettings) -> Result<(), String> {
        Err("No VR runtime available".to_string())
    }

    fn set_screen_params(&mut self, _params: &ScreenParams) {}

    fn render(&mut self, _frame: &mut FrameContext<'_>, _settings: &VrSettings) -> Result<(), String> {
        Err("No VR runtime available".to_string())
    }

    fn shutdown(&mut self) {}
}

/// Opens the platform runtime.
pub type RuntimeConnector = Rc<dyn Fn() -> Result<Box<dyn VrRuntime>, String>>;

/// Backend driving a real headset through a [`VrRuntime`].
pub struct NativeHeadsetDriver {
    connect: RuntimeConnector,
    runtime: Option<Box<dyn VrRuntime>>,
    renderer: Option<StereoRenderer>,
    loader: ModelLoader<GpuComponent>,
    input: InputSynthesizer,
    screen: VirtualScreen,
}

impl NativeHeadsetDriver {
    pub fn new(connect: RuntimeConnector) -> Self {
        Self {
            connect,
            runtime: None,
            renderer: None,
            loader: ModelLoader::new(RetryPolicy::default()),
            input: InputSynthesizer::default(),
            screen: VirtualScreen::default(),
        }
    }
}

impl VrDriver for NativeHeadsetDriver {
    fn name(&self) -> &'static str {
        "native"
    }

    fn start(&mut self) -> Result<(), String> {
        let runtime = (self.connect)()?;
        let (w, h) = runtime.recommended_render_target_size();
        info!("VR runtime connected, recommended {}x{} per eye", w, h);
        self.runtime = Some(runtime);
        Ok(())
    }

    fn create_resources(&mut self, gpu: &GpuContext, settings: &VrSettings) -> Result<(), String> {
        let runtime = self.runtime.as_mut().ok_or("VR runtime not connected")?;
        let size = eye_target_size(runtime.recommended_render_target_size(), settings.render_size_factor);
        let mesh = DistortionMesh::new(&**runtime, GRID_SIZE);
        let mut renderer = StereoRenderer::new(gpu, size, &mesh)?;
        renderer.set_screen(&self.screen);

        load_connected(
            runtime.as_mut(),
            &mut renderer.uploader(),
            &mut self.loader,
            self.input.devices_mut(),
        );
        self.renderer = Some(renderer);
        Ok(())
    }

    fn set_screen_params(&mut self, params: &ScreenParams) {
        self.screen.regenerate(params);
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_screen(&self.screen);
        }
    }

    fn render(&mut self, frame: &mut FrameContext<'_>, settings: &VrSettings) -> Result<(), String> {
        let (Some(runtime), Some(renderer)) = (self.runtime.as_mut(), self.renderer.as_mut()) else {
            return Err("VR driver used before initialization".to_string());
        };

        let changes = self
            .input
            .update(runtime.as_mut(), &self.screen, frame.mode, frame.commands, frame.pointer);
        apply_device_changes(
            runtime.as_mut(),
            &mut renderer.uploader(),
            &mut self.loader,
            self.input.devices_mut(),
            changes,
        );

        renderer.set_eye_size(eye_target_size(
            runtime.recommended_render_target_size(),
            settings.render_size_factor,
        ));

        let current = frame.media.current_texture();
        let surround = current
            .filter(|media| media.is_surround)
            .map(|media| (media.view, media.layout, media.swap));
        let background = if settings.background.image_url.is_empty() {
            None
        } else {
            frame.media.background_texture()
        };
        let sphere = choose_sphere_source(surround, background, &settings.background);

        let mut pan = self.input.surround_pan();
        if settings.snap_surround_pan {
            pan = snap_pan(pan, SNAP_STEP_DEGREES);
        }

        let head = head_transform(self.input.hmd_pose());
        let view_projection = Eye::BOTH.map(|eye| {
            eye_view_projection(runtime.projection(eye, NEAR_CLIP, FAR_CLIP), runtime.eye_to_head(eye), head)
        });
        let aim = self.input.aim().map(|aim| aim_line(&aim, self.input.mouse_hit()));
        let models = model_draws(&**runtime, self.input.devices(), &self.loader)
            .into_iter()
            .map(|(transform, component)| ModelDraw { transform, component })
            .collect();

        renderer.render(&SceneFrame {
            view_projection,
            sphere,
            pan,
            ui: frame.ui,
            aim_line: aim,
            models,
        });

        submit_eyes(|eye| runtime.submit(eye, renderer.resolved_texture(eye)))
    }

    fn surround_pan(&self) -> f32 {
        self.input.surround_pan()
    }

    fn set_surround_pan(&mut self, degrees: f32) {
        self.input.set_surround_pan(degrees);
    }

    fn shutdown(&mut self) {
        self.loader.clear();
        self.renderer = None;
        if self.runtime.take().is_some() {
            info!("VR runtime disconnected");
        }
    }
}

/// Loads the models of devices that were connected before the driver
/// started, since no activation event arrives for them.
fn load_connected<U: ComponentUploader>(
    runtime: &mut dyn VrRuntime,
    uploader: &mut U,
    loader: &mut ModelLoader<U::Handle>,
    devices: &mut DeviceSlots<TrackedDeviceState>,
) {
    for device in DeviceIndex::all() {
        if runtime.is_connected(device) {
            loader.ensure_loaded(runtime, uploader, device, &mut devices[device]);
        }
    }
}

fn apply_device_changes<U: ComponentUploader>(
    runtime: &mut dyn VrRuntime,
    uploader: &mut U,
    loader: &mut ModelLoader<U::Handle>,
    devices: &mut DeviceSlots<TrackedDeviceState>,
    changes: InputFrame,
) {
    for device in changes.deactivated {
        loader.forget_device(device, &mut devices[device]);
    }
    for device in changes.activated {
        loader.ensure_loaded(runtime, uploader, device, &mut devices[device]);
    }
}

/// Visible components of every tracked controller in tracking space.
fn model_draws<H>(
    runtime: &dyn VrRuntime,
    devices: &DeviceSlots<TrackedDeviceState>,
    loader: &ModelLoader<H>,
) -> Vec<(Mat4, Rc<H>)> {
    let mut draws = Vec::new();
    for (device, state) in devices.iter() {
        if !state.class.is_controller() {
            continue;
        }
        let Some(pose) = state.pose.matrix() else {
            continue;
        };
        for slot in loader.components(device) {
            let Some(component) = &slot.handle else {
                continue;
            };
            let transform = match runtime.component_state(&state.render_model, &slot.component, &state.controller) {
                Some(placement) if !placement.visible => continue,
                Some(placement) => pose * placement.transform,
                None => pose,
            };
            draws.push((transform, Rc::clone(component)));
        }
    }
    draws
}

/// Submits both eyes even when the first is rejected, and reports the first
/// rejection.
fn submit_eyes(mut submit: impl FnMut(Eye) -> Result<(), String>) -> Result<(), String> {
    let mut result = Ok(());
    for eye in Eye::BOTH {
        if let Err(e) = submit(eye) {
            error!("Compositor rejected {:?} eye: {}", eye, e);
            if result.is_ok() {
                result = Err(format!("Compositor submit failed: {}", e));
            }
        }
    }
    result
}

/// Creates a fresh driver for each initialization attempt.
pub type DriverFactory = Box<dyn Fn() -> Box<dyn VrDriver>>;

/// Host-facing entry point of the VR path.
pub struct VrSubsystem {
    factory: DriverFactory,
    driver: Option<Box<dyn VrDriver>>,
    state: DriverState,
    last_error: Option<String>,
    store: Box<dyn SettingsStore>,
    settings: VrSettings,
    aspect_ratio: f32,
}

impl VrSubsystem {
    pub fn new(factory: DriverFactory, store: Box<dyn SettingsStore>) -> Self {
        let settings = VrSettings::load(store.as_ref());
        Self {
            factory,
            driver: None,
            state: DriverState::Uninitialized,
            last_error: None,
            store,
            settings,
            aspect_ratio: ScreenParams::default().aspect_ratio,
        }
    }

    /// Subsystem without headset support; every render attempt fails.
    pub fn null(store: Box<dyn SettingsStore>) -> Self {
        Self::new(Box::new(|| -> Box<dyn VrDriver> { Box::new(NullDriver) }), store)
    }

    pub fn native(connect: RuntimeConnector, store: Box<dyn SettingsStore>) -> Self {
        Self::new(
            Box::new(move || -> Box<dyn VrDriver> { Box::new(NativeHeadsetDriver::new(Rc::clone(&connect))) }),
            store,
        )
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn settings(&self) -> &VrSettings {
        &self.settings
    }

    /// Renders one stereo frame, initializing on the first call. On error
    /// the host should fall back to its 2D output.
    pub fn render(&mut self, frame: &mut FrameContext<'_>) -> Result<(), String> {
        let gpu = frame.gpu;
        self.run_frame(
            |driver, settings| driver.create_resources(gpu, settings),
            |driver, settings| driver.render(frame, settings),
        )
    }

    fn run_frame(
        &mut self,
        init: impl FnOnce(&mut dyn VrDriver, &VrSettings) -> Result<(), String>,
        frame: impl FnOnce(&mut dyn VrDriver, &VrSettings) -> Result<(), String>,
    ) -> Result<(), String> {
        if let DriverState::Error(message) = &self.state {
            return Err(message.clone());
        }
        if matches!(self.state, DriverState::ShuttingDown | DriverState::Initializing) {
            return Err("VR subsystem is busy".to_string());
        }
        if self.state == DriverState::Uninitialized {
            self.initialize(init)?;
        }

        let Some(driver) = self.driver.as_mut() else {
            return Err(self.fail("VR driver missing".to_string()));
        };
        match frame(driver.as_mut(), &self.settings) {
            Ok(()) => {
                self.state = DriverState::Rendering;
                Ok(())
            }
            Err(e) => {
                error!("VR frame failed: {}", e);
                Err(self.fail(e))
            }
        }
    }

    fn initialize(
        &mut self,
        init: impl FnOnce(&mut dyn VrDriver, &VrSettings) -> Result<(), String>,
    ) -> Result<(), String> {
        self.state = DriverState::Initializing;
        let mut driver = (self.factory)();
        let params = self.settings.screen_params(self.aspect_ratio);
        let result = driver.start().and_then(|()| {
            driver.set_screen_params(&params);
            init(driver.as_mut(), &self.settings)
        });
        match result {
            Ok(()) => {
                info!("VR driver '{}' initialized", driver.name());
                self.driver = Some(driver);
                self.state = DriverState::Ready;
                Ok(())
            }
            Err(e) => {
                warn!("VR driver '{}' unavailable: {}", driver.name(), e);
                driver.shutdown();
                Err(self.fail(e))
            }
        }
    }

    fn fail(&mut self, message: String) -> String {
        self.state = DriverState::Error(message.clone());
        self.last_error = Some(message.clone());
        message
    }

    /// Clears a terminal error so the next render attempt initializes
    /// again.
    pub fn reinit(&mut self) {
        self.deinit();
        self.state = DriverState::Uninitialized;
        self.last_error = None;
    }

    /// Destroys the driver and its GPU resources. Only call between frames.
    /// A terminal error survives; only [`VrSubsystem::reinit`] clears it.
    pub fn deinit(&mut self) {
        let next = match &self.state {
            DriverState::Error(message) => DriverState::Error(message.clone()),
            _ => DriverState::Uninitialized,
        };
        self.state = DriverState::ShuttingDown;
        if let Some(mut driver) = self.driver.take() {
            driver.shutdown();
            info!("VR driver '{}' shut down", driver.name());
        }
        self.state = next;
    }

    pub fn surround_pan(&self) -> f32 {
        self.driver.as_ref().map_or(0.0, |d| d.surround_pan())
    }

    pub fn set_surround_pan(&mut self, degrees: f32) {
        if let Some(driver) = self.driver.as_mut() {
            driver.set_surround_pan(degrees);
        }
    }

    /// Host window aspect ratio changed.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        if aspect_ratio == self.aspect_ratio {
            return;
        }
        self.aspect_ratio = aspect_ratio;
        self.regenerate_screen();
    }

    fn regenerate_screen(&mut self) {
        let params = self.settings.screen_params(self.aspect_ratio);
        if let Some(driver) = self.driver.as_mut() {
            driver.set_screen_params(&params);
        }
    }

    pub fn set_lock_mouse(&mut self, value: bool) {
        self.settings.set_lock_mouse(self.store.as_mut(), value);
    }

    pub fn set_mirror_ui(&mut self, value: bool) {
        self.settings.set_mirror_ui(self.store.as_mut(), value);
    }

    pub fn set_snap_surround_pan(&mut self, value: bool) {
        self.settings.set_snap_surround_pan(self.store.as_mut(), value);
    }

    pub fn set_render_size_factor(&mut self, value: f32) {
        self.settings.set_render_size_factor(self.store.as_mut(), value);
    }

    pub fn set_background(&mut self, background: BackgroundSettings) {
        self.settings.set_background(self.store.as_mut(), background);
    }

    pub fn set_screen_curvature(&mut self, value: f32) {
        self.settings.set_screen_curvature(self.store.as_mut(), value);
        self.regenerate_screen();
    }

    pub fn set_screen_size(&mut self, value: f32) {
        self.settings.set_screen_size(self.store.as_mut(), value);
        self.regenerate_screen();
    }

    pub fn set_screen_distance(&mut self, value: f32) {
        self.settings.set_screen_distance(self.store.as_mut(), value);
        self.regenerate_screen();
    }

    pub fn set_screen_height(&mut self, value: f32) {
        self.settings.set_screen_height(self.store.as_mut(), value);
        self.regenerate_screen();
    }
}

impl Drop for VrSubsystem {
    fn drop(&mut self) {
        self.deinit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceClass, Pose};
    use crate::settings::{keys, MemorySettings};
    use crate::testing::{CountingUploader, MockRuntime};
    use glam::Vec3;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Journal {
        created: usize,
        started: usize,
        shutdowns: usize,
        screens: Vec<ScreenParams>,
    }

    struct FakeDriver {
        journal: Rc<RefCell<Journal>>,
        available: bool,
    }

    impl VrDriver for FakeDriver {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn start(&mut self) -> Result<(), String> {
            self.journal.borrow_mut().started += 1;
            if self.available {
                Ok(())
            } else {
                Err("no headset".to_string())
            }
        }

        fn create_resources(&mut self, _gpu: &GpuContext, _settings: &VrSettings) -> Result<(), String> {
            Ok(())
        }

        fn set_screen_params(&mut self, params: &ScreenParams) {
            self.journal.borrow_mut().screens.push(*params);
        }

        fn render(&mut self, _frame: &mut FrameContext<'_>, _settings: &VrSettings) -> Result<(), String> {
            Ok(())
        }

        fn shutdown(&mut self) {
            self.journal.borrow_mut().shutdowns += 1;
        }
    }

    fn subsystem(available: bool) -> (VrSubsystem, Rc<RefCell<Journal>>) {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let shared = Rc::clone(&journal);
        let factory: DriverFactory = Box::new(move || -> Box<dyn VrDriver> {
            shared.borrow_mut().created += 1;
            Box::new(FakeDriver {
                journal: Rc::clone(&shared),
                available,
            })
        });
        (VrSubsystem::new(factory, Box::new(MemorySettings::default())), journal)
    }

    fn frame(vr: &mut VrSubsystem, result: Result<(), String>) -> Result<(), String> {
        vr.run_frame(|_, _| Ok(()), |_, _| result)
    }

    #[test]
    fn unavailable_headset_is_terminal() {
        let (mut vr, journal) = subsystem(false);
        assert_eq!(vr.state(), &DriverState::Uninitialized);

        assert_eq!(frame(&mut vr, Ok(())), Err("no headset".to_string()));
        assert_eq!(vr.state(), &DriverState::Error("no headset".to_string()));
        assert_eq!(vr.last_error(), Some("no headset"));
        assert!(!vr.is_active());

        assert!(frame(&mut vr, Ok(())).is_err());
        assert_eq!(journal.borrow().created, 1);
        assert_eq!(journal.borrow().shutdowns, 1);
    }

    #[test]
    fn null_driver_never_initializes() {
        let mut vr = VrSubsystem::null(Box::new(MemorySettings::default()));
        let err = frame(&mut vr, Ok(())).unwrap_err();
        assert_eq!(err, "No VR runtime available");
        assert_eq!(vr.last_error(), Some("No VR runtime available"));
    }

    #[test]
    fn first_frame_initializes_then_renders() {
        let (mut vr, journal) = subsystem(true);
        assert_eq!(frame(&mut vr, Ok(())), Ok(()));
        assert_eq!(vr.state(), &DriverState::Rendering);
        assert_eq!(frame(&mut vr, Ok(())), Ok(()));

        let journal = journal.borrow();
        assert_eq!(journal.created, 1);
        assert_eq!(journal.started, 1);
        assert_eq!(journal.screens.len(), 1);
        assert_eq!(vr.last_error(), None);
    }

    #[test]
    fn resource_failure_reports_error() {
        let (mut vr, _journal) = subsystem(true);
        let result = vr.run_frame(|_, _| Err("out of memory".to_string()), |_, _| Ok(()));
        assert_eq!(result, Err("out of memory".to_string()));
        assert_eq!(vr.state(), &DriverState::Error("out of memory".to_string()));
    }

    #[test]
    fn submit_failure_stops_rendering() {
        let (mut vr, _journal) = subsystem(true);
        frame(&mut vr, Ok(())).unwrap();
        let err = frame(&mut vr, Err("Compositor submit failed: lost".to_string())).unwrap_err();
        assert_eq!(err, "Compositor submit failed: lost");

        let mut called = false;
        let result = vr.run_frame(
            |_, _| Ok(()),
            |_, _| {
                called = true;
                Ok(())
            },
        );
        assert!(result.is_err());
        assert!(!called);
        assert_eq!(vr.last_error(), Some("Compositor submit failed: lost"));
    }

    #[test]
    fn reinit_recovers_from_error() {
        let (mut vr, journal) = subsystem(true);
        frame(&mut vr, Err("lost".to_string())).unwrap_err();
        vr.reinit();
        assert_eq!(vr.state(), &DriverState::Uninitialized);
        assert_eq!(vr.last_error(), None);

        assert_eq!(frame(&mut vr, Ok(())), Ok(()));
        assert_eq!(journal.borrow().created, 2);
        assert_eq!(journal.borrow().shutdowns, 1);
    }

    #[test]
    fn deinit_keeps_terminal_error() {
        let (mut vr, journal) = subsystem(false);
        frame(&mut vr, Ok(())).unwrap_err();
        vr.deinit();
        assert_eq!(vr.state(), &DriverState::Error("no headset".to_string()));
        assert_eq!(frame(&mut vr, Ok(())), Err("no headset".to_string()));
        assert_eq!(journal.borrow().created, 1);
        assert_eq!(vr.last_error(), Some("no headset"));

        vr.reinit();
        assert_eq!(vr.state(), &DriverState::Uninitialized);
        frame(&mut vr, Ok(())).unwrap_err();
        assert_eq!(journal.borrow().created, 2);
    }

    #[test]
    fn deinit_after_frame_failure_releases_driver() {
        let (mut vr, journal) = subsystem(true);
        frame(&mut vr, Err("lost".to_string())).unwrap_err();
        vr.deinit();
        assert_eq!(journal.borrow().shutdowns, 1);
        assert_eq!(vr.state(), &DriverState::Error("lost".to_string()));
        assert!(frame(&mut vr, Ok(())).is_err());
        assert_eq!(journal.borrow().created, 1);
    }

    #[test]
    fn deinit_shuts_driver_down() {
        let (mut vr, journal) = subsystem(true);
        frame(&mut vr, Ok(())).unwrap();
        vr.deinit();
        assert_eq!(vr.state(), &DriverState::Uninitialized);
        assert_eq!(journal.borrow().shutdowns, 1);
        drop(vr);
        assert_eq!(journal.borrow().shutdowns, 1);
    }

    #[test]
    fn screen_setters_regenerate_and_persist() {
        let (mut vr, journal) = subsystem(true);
        frame(&mut vr, Ok(())).unwrap();

        vr.set_screen_curvature(0.0);
        vr.set_aspect_ratio(4.0 / 3.0);
        vr.set_aspect_ratio(4.0 / 3.0);
        vr.set_screen_size(2.0);

        let journal = journal.borrow();
        assert_eq!(journal.screens.len(), 4);
        let last = journal.screens[3];
        assert_eq!(last.curvature, 0.0);
        assert_eq!(last.size, 2.0);
        assert_eq!(last.aspect_ratio, 4.0 / 3.0);
        assert_eq!(vr.settings().screen_curvature, 0.0);
    }

    #[test]
    fn settings_are_loaded_from_store() {
        let mut store = MemorySettings::default();
        store.set(keys::SNAP_SURROUND_PAN, "false".to_string());
        store.set(keys::RENDER_SIZE_FACTOR, "1.5".to_string());
        let vr = VrSubsystem::null(Box::new(store));
        assert!(!vr.settings().snap_surround_pan);
        assert_eq!(vr.settings().render_size_factor, 1.5);
    }

    #[test]
    fn both_eyes_are_submitted_and_first_rejection_wins() {
        let mut runtime = MockRuntime::new();
        runtime.submit_failures.insert(Eye::Left, "lost".to_string());
        runtime.submit_failures.insert(Eye::Right, "gone".to_string());
        let result = submit_eyes(|eye| runtime.record_submit(eye));
        assert_eq!(result, Err("Compositor submit failed: lost".to_string()));
        assert_eq!(runtime.submitted, vec![Eye::Left, Eye::Right]);
    }

    #[test]
    fn right_eye_rejection_fails_the_frame() {
        let mut runtime = MockRuntime::new();
        assert_eq!(submit_eyes(|eye| runtime.record_submit(eye)), Ok(()));

        runtime.submit_failures.insert(Eye::Right, "gone".to_string());
        let result = submit_eyes(|eye| runtime.record_submit(eye));
        assert_eq!(result, Err("Compositor submit failed: gone".to_string()));
        assert_eq!(runtime.submitted.len(), 4);
    }

    fn wand_runtime() -> (MockRuntime, DeviceIndex) {
        let mut runtime = MockRuntime::new();
        let wand = DeviceIndex::new(1).unwrap();
        runtime.add_device(wand, DeviceClass::Controller, "wand");
        runtime.add_model(
            "wand",
            &[("body", Some("wand_body")), ("led", Some("wand_led")), ("tip", None)],
        );
        (runtime, wand)
    }

    fn load_at_start(
        runtime: &mut MockRuntime,
    ) -> (ModelLoader<String>, DeviceSlots<TrackedDeviceState>, CountingUploader) {
        let mut loader = ModelLoader::new(RetryPolicy::default());
        let mut devices = DeviceSlots::new();
        let mut uploader = CountingUploader::default();
        load_connected(runtime, &mut uploader, &mut loader, &mut devices);
        (loader, devices, uploader)
    }

    #[test]
    fn devices_connected_at_start_get_models() {
        let (mut runtime, wand) = wand_runtime();
        let hmd = DeviceIndex::new(0).unwrap();
        runtime.add_device(hmd, DeviceClass::Hmd, "headset");

        let (loader, devices, uploader) = load_at_start(&mut runtime);
        assert_eq!(uploader.uploads, vec!["wand_body", "wand_led"]);
        assert_eq!(devices[wand].render_model, "wand");
        assert_eq!(loader.components(wand).len(), 3);
        assert_eq!(devices[hmd].class, DeviceClass::Hmd);
        assert!(loader.components(hmd).is_empty());
    }

    #[test]
    fn hidden_components_and_lost_poses_are_not_drawn() {
        let (mut runtime, wand) = wand_runtime();
        let body = Mat4::from_translation(Vec3::new(0.0, 0.0, 0.1));
        runtime.place_component("wand", "body", body, true);
        runtime.place_component("wand", "led", Mat4::IDENTITY, false);
        let (loader, mut devices, _) = load_at_start(&mut runtime);

        assert!(model_draws(&runtime, &devices, &loader).is_empty());

        devices[wand].pose = Pose::new(Mat4::from_translation(Vec3::X));
        let draws = model_draws(&runtime, &devices, &loader);
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].1.as_str(), "wand_body");
        let origin = draws[0].0.transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(1.0, 0.0, 0.1), 1e-6));

        devices[wand].class = DeviceClass::TrackingReference;
        assert!(model_draws(&runtime, &devices, &loader).is_empty());
    }

    #[test]
    fn deactivated_device_is_forgotten_and_reloads_from_cache() {
        let (mut runtime, wand) = wand_runtime();
        let (mut loader, mut devices, mut uploader) = load_at_start(&mut runtime);
        devices[wand].pose = Pose::new(Mat4::IDENTITY);
        assert_eq!(model_draws(&runtime, &devices, &loader).len(), 2);

        let gone = InputFrame {
            activated: Vec::new(),
            deactivated: vec![wand],
        };
        apply_device_changes(&mut runtime, &mut uploader, &mut loader, &mut devices, gone);
        assert!(loader.components(wand).is_empty());
        assert!(devices[wand].render_model.is_empty());
        assert!(model_draws(&runtime, &devices, &loader).is_empty());
        assert_eq!(loader.cache_len(), 2);

        let back = InputFrame {
            activated: vec![wand],
            deactivated: Vec::new(),
        };
        apply_device_changes(&mut runtime, &mut uploader, &mut loader, &mut devices, back);
        assert_eq!(loader.components(wand).len(), 3);
        assert_eq!(uploader.uploads.len(), 2);
        assert_eq!(model_draws(&runtime, &devices, &loader).len(), 2);
    }
}
