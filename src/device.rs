//! Tracked device slots
//!
//! Fixed-size arena of per-device state addressed by a bounds-checked
//! [`DeviceIndex`]. Index 0 is always the headset.

use glam::{Mat4, Vec2};

/// Number of device slots the runtime can report.
pub const MAX_TRACKED_DEVICES: usize = 64;

/// Index of a tracked device slot. Only constructible for in-range values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceIndex(u8);

impl DeviceIndex {
    pub const HMD: DeviceIndex = DeviceIndex(0);

    /// Returns `None` for indices outside the slot range.
    pub fn new(raw: u32) -> Option<Self> {
        if (raw as usize) < MAX_TRACKED_DEVICES {
            Some(Self(raw as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = DeviceIndex> {
        (0..MAX_TRACKED_DEVICES as u8).map(DeviceIndex)
    }
}

impl std::fmt::Display for DeviceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of physical device occupying a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceClass {
    #[default]
    Invalid,
    Hmd,
    Controller,
    GenericTracker,
    TrackingReference,
}

impl DeviceClass {
    /// Controllers and trackers carry buttons and render models.
    pub fn is_controller(self) -> bool {
        matches!(self, DeviceClass::Controller | DeviceClass::GenericTracker)
    }
}

/// Device-to-tracking-space transform. `valid` is false when the device
/// is out of tracking range; the matrix must not be used then.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub device_to_tracking: Mat4,
    pub valid: bool,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            device_to_tracking: Mat4::IDENTITY,
            valid: false,
        }
    }
}

impl Pose {
    pub fn new(device_to_tracking: Mat4) -> Self {
        Self {
            device_to_tracking,
            valid: true,
        }
    }

    pub fn matrix(&self) -> Option<Mat4> {
        self.valid.then_some(self.device_to_tracking)
    }
}

/// Physical buttons reported by controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    System,
    ApplicationMenu,
    Grip,
    A,
    B,
    Joystick,
    Trigger,
}

/// What an analog axis physically is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisKind {
    #[default]
    None,
    Trigger,
    TrackPad,
    Joystick,
}

pub const MAX_AXES: usize = 5;

/// Axis snapshot for one controller. Buttons arrive as runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState {
    pub axes: [Vec2; MAX_AXES],
}

/// Per-slot state, rewritten every frame by the input synthesizer.
#[derive(Debug, Clone, Default)]
pub struct TrackedDeviceState {
    pub class: DeviceClass,
    pub pose: Pose,
    pub controller: ControllerState,
    pub previous_controller: ControllerState,
    /// Resolved render model name, empty until the loader has run.
    pub render_model: String,
}

/// Arena of per-device values indexed by [`DeviceIndex`].
#[derive(Debug, Clone)]
pub struct DeviceSlots<T> {
    slots: Vec<T>,
}

impl<T: Default> Default for DeviceSlots<T> {
    fn default() -> Self {
        Self {
            slots: (0..MAX_TRACKED_DEVICES).map(|_| T::default()).collect(),
        }
    }
}

impl<T: Default> DeviceSlots<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, index: DeviceIndex) {
        self.slots[index.get()] = T::default();
    }
}

impl<T> DeviceSlots<T> {
    /// Lookup by raw runtime index; out-of-range indices yield `None`.
    pub fn get_raw(&self, raw: u32) -> Option<&T> {
        DeviceIndex::new(raw).map(|i| &self[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceIndex, &T)> {
        DeviceIndex::all().zip(self.slots.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (DeviceIndex, &mut T)> {
        DeviceIndex::all().zip(self.slots.iter_mut())
    }
}

impl<T> std::ops::Index<DeviceIndex> for DeviceSlots<T> {
    type Output = T;

    fn index(&self, index: DeviceIndex) -> &T {
        &self.slots[index.get()]
    }
}

impl<T> std::ops::IndexMut<DeviceIndex> for DeviceSlots<T> {
    fn index_mut(&mut self, index: DeviceIndex) -> &mut T {
        &mut self.slots[index.get()]
    }
}
