//! VR settings
//!
//! Typed view over the host's key/value settings store. Values are read
//! once at construction; setters write through.

use std::collections::HashMap;

use log::warn;

use crate::media::StereoLayout;
use crate::screen::ScreenParams;

pub mod keys {
    pub const LOCK_MOUSE: &str = "vr/lockMouse";
    pub const MIRROR_UI: &str = "vr/mirrorUi";
    pub const SNAP_SURROUND_PAN: &str = "vr/snapSurroundPan";
    pub const SCREEN_CURVATURE: &str = "vr/screenCurvature";
    pub const SCREEN_SIZE: &str = "vr/screenSize";
    pub const SCREEN_DISTANCE: &str = "vr/screenDistance";
    pub const SCREEN_HEIGHT: &str = "vr/screenHeight";
    pub const RENDER_SIZE_FACTOR: &str = "vr/renderSizeFactor";
    pub const BACKGROUND_IMAGE: &str = "vr/backgroundImage";
    pub const BACKGROUND_MODE: &str = "vr/backgroundMode";
    pub const BACKGROUND_SWAP: &str = "vr/backgroundSwap";
    pub const BACKGROUND_PAN: &str = "vr/backgroundPan";
    pub const BACKGROUND_DIM: &str = "vr/backgroundDim";
}

/// Persistence boundary. The storage format belongs to the host.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
}

/// In-memory store, used when the host has nothing better.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: HashMap<String, String>,
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }
}

/// Background image shown on the sphere when no surround media is open.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundSettings {
    pub image_url: String,
    pub layout: StereoLayout,
    pub swap: bool,
    /// Degrees added to the surround pan.
    pub pan: f32,
    /// Colour multiplier in [0, 1].
    pub dim: f32,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            image_url: String::new(),
            layout: StereoLayout::Mono,
            swap: false,
            pan: 0.0,
            dim: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VrSettings {
    pub lock_mouse: bool,
    pub mirror_ui: bool,
    pub snap_surround_pan: bool,
    pub screen_curvature: f32,
    pub screen_size: f32,
    pub screen_distance: f32,
    pub screen_height: f32,
    pub render_size_factor: f32,
    pub background: BackgroundSettings,
}

impl Default for VrSettings {
    fn default() -> Self {
        let screen = ScreenParams::default();
        Self {
            lock_mouse: false,
            mirror_ui: true,
            snap_surround_pan: true,
            screen_curvature: screen.curvature,
            screen_size: screen.size,
            screen_distance: screen.distance,
            screen_height: screen.height,
            render_size_factor: 1.0,
            background: BackgroundSettings::default(),
        }
    }
}

fn read<T: std::str::FromStr>(store: &dyn SettingsStore, key: &str, default: T) -> T {
    match store.get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable setting {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

fn positive(value: f32, default: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        default
    }
}

impl VrSettings {
    pub fn load(store: &dyn SettingsStore) -> Self {
        let d = Self::default();
        let layout = match store.get(keys::BACKGROUND_MODE) {
            Some(raw) => StereoLayout::parse(raw.trim()).unwrap_or_else(|| {
                warn!("Unknown background mode {:?}", raw);
                d.background.layout
            }),
            None => d.background.layout,
        };
        Self {
            lock_mouse: read(store, keys::LOCK_MOUSE, d.lock_mouse),
            mirror_ui: read(store, keys::MIRROR_UI, d.mirror_ui),
            snap_surround_pan: read(store, keys::SNAP_SURROUND_PAN, d.snap_surround_pan),
            screen_curvature: read(store, keys::SCREEN_CURVATURE, d.screen_curvature).clamp(0.0, 1.0),
            screen_size: positive(read(store, keys::SCREEN_SIZE, d.screen_size), d.screen_size),
            screen_distance: positive(
                read(store, keys::SCREEN_DISTANCE, d.screen_distance),
                d.screen_distance,
            ),
            screen_height: read(store, keys::SCREEN_HEIGHT, d.screen_height),
            render_size_factor: positive(
                read(store, keys::RENDER_SIZE_FACTOR, d.render_size_factor),
                d.render_size_factor,
            )
            .clamp(0.25, 4.0),
            background: BackgroundSettings {
                image_url: store.get(keys::BACKGROUND_IMAGE).unwrap_or_default(),
                layout,
                swap: read(store, keys::BACKGROUND_SWAP, d.background.swap),
                pan: read(store, keys::BACKGROUND_PAN, d.background.pan),
                dim: read(store, keys::BACKGROUND_DIM, d.background.dim).clamp(0.0, 1.0),
            },
        }
    }

    /// Screen placement for a window of the given aspect ratio.
    pub fn screen_params(&self, aspect_ratio: f32) -> ScreenParams {
        ScreenParams {
            distance: self.screen_distance,
            height: self.screen_height,
            size: self.screen_size,
            curvature: self.screen_curvature,
            aspect_ratio: positive(aspect_ratio, ScreenParams::default().aspect_ratio),
        }
    }

    pub fn set_lock_mouse(&mut self, store: &mut dyn SettingsStore, value: bool) {
        self.lock_mouse = value;
        store.set(keys::LOCK_MOUSE, value.to_string());
    }

    pub fn set_mirror_ui(&mut self, store: &mut dyn SettingsStore, value: bool) {
        self.mirror_ui = value;
        store.set(keys::MIRROR_UI, value.to_string());
    }

    pub fn set_snap_surround_pan(&mut self, store: &mut dyn SettingsStore, value: bool) {
        self.snap_surround_pan = value;
        store.set(keys::SNAP_SURROUND_PAN, value.to_string());
    }

    pub fn set_screen_curvature(&mut self, store: &mut dyn SettingsStore, value: f32) {
        self.screen_curvature = value.clamp(0.0, 1.0);
        store.set(keys::SCREEN_CURVATURE, self.screen_curvature.to_string());
    }

    pub fn set_screen_size(&mut self, store: &mut dyn SettingsStore, value: f32) {
        self.screen_size = positive(value, self.screen_size);
        store.set(keys::SCREEN_SIZE, self.screen_size.to_string());
    }

    pub fn set_screen_distance(&mut self, store: &mut dyn SettingsStore, value: f32) {
        self.screen_distance = positive(value, self.screen_distance);
        store.set(keys::SCREEN_DISTANCE, self.screen_distance.to_string());
    }

    pub fn set_screen_height(&mut self, store: &mut dyn SettingsStore, value: f32) {
        self.screen_height = value;
        store.set(keys::SCREEN_HEIGHT, value.to_string());
    }

    pub fn set_render_size_factor(&mut self, store: &mut dyn SettingsStore, value: f32) {
        self.render_size_factor = positive(value, self.render_size_factor).clamp(0.25, 4.0);
        store.set(keys::RENDER_SIZE_FACTOR, self.render_size_factor.to_string());
    }

    pub fn set_background(&mut self, store: &mut dyn SettingsStore, background: BackgroundSettings) {
        let dim = background.dim.clamp(0.0, 1.0);
        store.set(keys::BACKGROUND_IMAGE, background.image_url.clone());
        store.set(keys::BACKGROUND_MODE, background.layout.as_str().to_string());
        store.set(keys::BACKGROUND_SWAP, background.swap.to_string());
        store.set(keys::BACKGROUND_PAN, background.pan.to_string());
        store.set(keys::BACKGROUND_DIM, dim.to_string());
        self.background = BackgroundSettings { dim, ..background };
    }
}
