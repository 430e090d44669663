//! Stereo VR - virtual screen and headset pipeline for a stereoscopic viewer
//!
//! Places the viewer's 2D UI on a curved virtual screen in front of the
//! headset, turns controller aim into pointer events on that screen, draws
//! surround media on a sphere and submits lens-corrected eye textures to the
//! compositor. Without a headset the subsystem reports an error and the host
//! keeps its normal 2D output.

pub mod actions;
pub mod device;
pub mod distortion;
pub mod driver;
pub mod gpu;
pub mod input;
pub mod media;
pub mod ray;
pub mod render_model;
pub mod renderer;
pub mod runtime;
pub mod screen;
pub mod settings;

#[cfg(test)]
mod testing;

pub use actions::{ActionBindings, Command, CommandSink, InputMode, DEFAULT_BINDINGS};
pub use driver::{DriverState, FrameContext, NativeHeadsetDriver, NullDriver, VrDriver, VrSubsystem};
pub use gpu::GpuContext;
pub use media::{MediaProvider, MediaTexture, PointerEvent, PointerSink, StereoLayout, UiSurface};
pub use runtime::{Eye, VrRuntime};
pub use settings::{MemorySettings, SettingsStore, VrSettings};

/// Installs the platform log backend. On Android this routes `log` output
/// to logcat; elsewhere the host installs its own logger.
#[cfg(target_os = "android")]
pub fn init_logging() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag("StereoVR"),
    );
    log::info!("Stereo VR logging ready");
}

#[cfg(not(target_os = "android"))]
pub fn init_logging() {}
