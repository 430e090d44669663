//! Render model loading
//!
//! Resolves the render model components of each tracked controller and
//! uploads them once per component model name. Devices sharing a model
//! share the uploaded resources through [`Rc`] handles.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use log::{info, warn};

use crate::device::{DeviceIndex, DeviceSlots, TrackedDeviceState};
use crate::runtime::{LoadStatus, ModelData, TextureData, VrRuntime};

/// Bounded polling of the runtime's asynchronous loads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1),
            max_attempts: 5000,
        }
    }
}

impl RetryPolicy {
    /// Polls `load` until it finishes or the attempts run out.
    pub fn poll<T>(&self, what: &str, mut load: impl FnMut() -> LoadStatus<T>) -> Result<T, String> {
        for attempt in 0..self.max_attempts.max(1) {
            match load() {
                LoadStatus::Ready(value) => return Ok(value),
                LoadStatus::Failed(reason) => return Err(format!("{}: {}", what, reason)),
                LoadStatus::Loading => {
                    if attempt + 1 < self.max_attempts && !self.interval.is_zero() {
                        std::thread::sleep(self.interval);
                    }
                }
            }
        }
        Err(format!(
            "{}: still loading after {} attempts",
            what, self.max_attempts
        ))
    }
}

/// Turns raw model data into GPU resources.
pub trait ComponentUploader {
    type Handle;

    fn upload(&mut self, name: &str, model: &ModelData, texture: &TextureData) -> Result<Self::Handle, String>;
}

/// One visual part of a device's model. `handle` is `None` when the
/// component has no visual or failed to load.
#[derive(Debug)]
pub struct ComponentSlot<H> {
    pub component: String,
    pub handle: Option<Rc<H>>,
}

impl<H> Clone for ComponentSlot<H> {
    fn clone(&self) -> Self {
        Self {
            component: self.component.clone(),
            handle: self.handle.clone(),
        }
    }
}

/// Loaded components for every device plus the shared component cache.
pub struct ModelLoader<H> {
    cache: HashMap<String, Rc<H>>,
    components: DeviceSlots<Vec<ComponentSlot<H>>>,
    retry: RetryPolicy,
}

impl<H> ModelLoader<H> {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            cache: HashMap::new(),
            components: DeviceSlots::default(),
            retry,
        }
    }

    pub fn components(&self, device: DeviceIndex) -> &[ComponentSlot<H>] {
        &self.components[device]
    }

    pub fn cached(&self, component_model: &str) -> Option<&Rc<H>> {
        self.cache.get(component_model)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Forgets a device's components. Cached resources stay alive.
    pub fn forget_device(&mut self, device: DeviceIndex, state: &mut TrackedDeviceState) {
        self.components[device].clear();
        state.render_model.clear();
    }

    /// Drops everything. Called at shutdown only.
    pub fn clear(&mut self) {
        for (_, slots) in self.components.iter_mut() {
            slots.clear();
        }
        self.cache.clear();
    }

    /// Loads the model of `device` if it is a controller whose model name
    /// changed since the last call. Component failures are logged and leave
    /// that component empty.
    pub fn ensure_loaded<U>(
        &mut self,
        runtime: &mut dyn VrRuntime,
        uploader: &mut U,
        device: DeviceIndex,
        state: &mut TrackedDeviceState,
    ) where
        U: ComponentUploader<Handle = H>,
    {
        let class = runtime.device_class(device);
        state.class = class;
        if !class.is_controller() {
            return;
        }
        let model = runtime.render_model_name(device);
        if model.is_empty() || model == state.render_model {
            return;
        }

        let mut names = runtime.component_names(&model);
        let whole_model = names.is_empty();
        if whole_model {
            names.push(model.clone());
        }

        let mut slots = Vec::with_capacity(names.len());
        for component in names {
            let component_model = if whole_model {
                Some(model.clone())
            } else {
                runtime.component_render_model_name(&model, &component)
            };
            let handle = match component_model {
                Some(name) if !name.is_empty() => self.load_component(runtime, uploader, &name),
                _ => None,
            };
            slots.push(ComponentSlot { component, handle });
        }

        info!(
            "Device {}: model {} with {} components ({} visible)",
            device,
            model,
            slots.len(),
            slots.iter().filter(|s| s.handle.is_some()).count()
        );
        self.components[device] = slots;
        state.render_model = model;
    }

    fn load_component<U>(&mut self, runtime: &mut dyn VrRuntime, uploader: &mut U, name: &str) -> Option<Rc<H>>
    where
        U: ComponentUploader<Handle = H>,
    {
        if let Some(handle) = self.cache.get(name) {
            return Some(Rc::clone(handle));
        }

        let loaded = self
            .retry
            .poll(&format!("render model {}", name), || runtime.load_render_model(name))
            .and_then(|model| {
                let id = model
                    .diffuse_texture
                    .ok_or_else(|| format!("render model {} has no diffuse texture", name))?;
                let texture = self
                    .retry
                    .poll(&format!("texture {:?} of {}", id, name), || runtime.load_texture(id))?;
                uploader.upload(name, &model, &texture)
            });

        match loaded {
            Ok(handle) => {
                let handle = Rc::new(handle);
                self.cache.insert(name.to_string(), Rc::clone(&handle));
                Some(handle)
            }
            Err(e) => {
                warn!("Skipping component: {}", e);
                None
            }
        }
    }
}

/// One level of a mip chain.
#[derive(Debug, Clone, PartialEq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Box-filtered RGBA8 mip chain down to 1x1, level 0 included.
pub fn build_mip_chain(texture: &TextureData) -> Vec<MipLevel> {
    let mut levels = vec![MipLevel {
        width: texture.width.max(1),
        height: texture.height.max(1),
        rgba: texture.rgba.clone(),
    }];

    while let Some(prev) = levels.last() {
        if prev.width == 1 && prev.height == 1 {
            break;
        }
        let width = (prev.width / 2).max(1);
        let height = (prev.height / 2).max(1);
        let mut rgba = vec![0u8; (width * height * 4) as usize];
        for y in 0..height {
            for x in 0..width {
                for c in 0..4 {
                    let mut sum = 0u32;
                    for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                        let sx = (x * 2 + dx).min(prev.width - 1);
                        let sy = (y * 2 + dy).min(prev.height - 1);
                        let i = ((sy * prev.width + sx) * 4 + c) as usize;
                        sum += prev.rgba.get(i).copied().unwrap_or(0) as u32;
                    }
                    rgba[((y * width + x) * 4 + c) as usize] = ((sum + 2) / 4) as u8;
                }
            }
        }
        levels.push(MipLevel { width, height, rgba });
    }
    levels
}
