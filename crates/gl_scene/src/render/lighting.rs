//! Point lights
//!
//! Every light owns a small uniform buffer attached to its own binding point.
//! Binding 1 belongs to the camera, so lights take 2, 3, 4, ... in the order
//! they are registered. The registry is append-only, which keeps those
//! binding points stable for the life of the scene.
//!
//! Setters only update the CPU copy and mark the light dirty; the scene
//! context re-uploads dirty lights at the start of each frame.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::foundation::collections::{LightId, SlotMap};
use crate::foundation::math::Vec3;
use crate::render::backend::{BackendError, BufferHandle, BufferKind, GraphicsBackend};

/// Binding point of the first registered light
pub const FIRST_LIGHT_BINDING: u32 = 2;

/// Light registry errors
#[derive(Error, Debug)]
pub enum LightError {
    /// A light with this name already exists
    #[error("a light named '{0}' already exists")]
    DuplicateName(String),

    /// The id does not belong to this registry
    #[error("unknown light {0:?}")]
    UnknownLight(LightId),

    /// Buffer creation or upload failed
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// GPU layout of a light block (std140: each vec3 padded to 16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    /// Location [x, y, z, 1]
    pub position: [f32; 4],
    /// Color [r, g, b, 1]
    pub color: [f32; 4],
}

impl LightUniform {
    /// Size of the block in bytes
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// A named point light
#[derive(Debug)]
pub struct Light {
    name: String,
    location: Vec3,
    color: Vec3,
    binding: u32,
    buffer: BufferHandle,
    dirty: bool,
}

impl Light {
    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// World-space location
    pub fn location(&self) -> Vec3 {
        self.location
    }

    /// RGB color
    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Uniform block binding point
    pub fn binding(&self) -> u32 {
        self.binding
    }

    /// True when the GPU copy is stale
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Block contents for upload
    pub fn uniform(&self) -> LightUniform {
        LightUniform {
            position: [self.location.x, self.location.y, self.location.z, 1.0],
            color: [self.color.x, self.color.y, self.color.z, 1.0],
        }
    }
}

/// Append-only registry of named lights
#[derive(Debug, Default)]
pub struct LightRegistry {
    lights: SlotMap<LightId, Light>,
    by_name: HashMap<String, LightId>,
}

impl LightRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a light, upload its block and attach it to the next binding point
    pub fn add(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        name: &str,
        location: Vec3,
        color: Vec3,
    ) -> Result<LightId, LightError> {
        if self.by_name.contains_key(name) {
            return Err(LightError::DuplicateName(name.to_string()));
        }

        let binding = FIRST_LIGHT_BINDING + self.lights.len() as u32;
        let mut light = Light {
            name: name.to_string(),
            location,
            color,
            binding,
            buffer: BufferHandle(0),
            dirty: false,
        };

        let buffer = backend.create_buffer(BufferKind::Uniform, bytemuck::bytes_of(&light.uniform()))?;
        if let Err(e) = backend.bind_uniform_buffer(binding, buffer, LightUniform::SIZE) {
            backend.delete_buffer(buffer);
            return Err(e.into());
        }
        light.buffer = buffer;

        log::info!("Light '{}' bound at {}", name, binding);
        let id = self.lights.insert(light);
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Light by id
    pub fn get(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id)
    }

    /// Id of the light registered as `name`
    pub fn find(&self, name: &str) -> Option<LightId> {
        self.by_name.get(name).copied()
    }

    /// Replace a light's location
    pub fn set_location(&mut self, id: LightId, location: Vec3) -> Result<(), LightError> {
        let light = self.light_mut(id)?;
        light.location = location;
        light.dirty = true;
        Ok(())
    }

    /// Replace a light's color
    pub fn set_color(&mut self, id: LightId, color: Vec3) -> Result<(), LightError> {
        let light = self.light_mut(id)?;
        light.color = color;
        light.dirty = true;
        Ok(())
    }

    /// Offset a light's location
    pub fn move_by(&mut self, id: LightId, amount: Vec3) -> Result<(), LightError> {
        let light = self.light_mut(id)?;
        light.location += amount;
        light.dirty = true;
        Ok(())
    }

    /// Re-upload every dirty light; returns how many were uploaded
    pub fn flush(&mut self, backend: &mut dyn GraphicsBackend) -> Result<usize, LightError> {
        let mut uploaded = 0;
        for light in self.lights.values_mut().filter(|light| light.dirty) {
            backend.update_buffer(light.buffer, BufferKind::Uniform, bytemuck::bytes_of(&light.uniform()))?;
            light.dirty = false;
            uploaded += 1;
        }
        if uploaded > 0 {
            log::debug!("Uploaded {} light block(s)", uploaded);
        }
        Ok(uploaded)
    }

    /// Number of lights
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// True when no light has been added
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// All lights in registration order
    pub fn iter(&self) -> impl Iterator<Item = (LightId, &Light)> {
        let mut lights: Vec<_> = self.lights.iter().collect();
        lights.sort_by_key(|(_, light)| light.binding);
        lights.into_iter()
    }

    /// Release every light buffer
    pub fn destroy_all(&mut self, backend: &mut dyn GraphicsBackend) {
        for (_, light) in self.lights.drain() {
            backend.delete_buffer(light.buffer);
        }
        self.by_name.clear();
    }

    fn light_mut(&mut self, id: LightId) -> Result<&mut Light, LightError> {
        self.lights.get_mut(id).ok_or(LightError::UnknownLight(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::{FailPoint, HeadlessBackend};

    fn uploaded(backend: &HeadlessBackend, registry: &LightRegistry, id: LightId) -> LightUniform {
        let light = registry.get(id).unwrap();
        let bytes = backend.buffer_data(backend.uniform_slot(light.binding()).unwrap()).unwrap();
        bytemuck::pod_read_unaligned::<LightUniform>(bytes)
    }

    #[test]
    fn test_bindings_start_at_two() {
        let mut backend = HeadlessBackend::new();
        let mut registry = LightRegistry::new();

        let bindings: Vec<u32> = ["Main", "Fill", "Rim"]
            .iter()
            .map(|name| {
                let id = registry.add(&mut backend, name, Vec3::zeros(), Vec3::repeat(1.0)).unwrap();
                registry.get(id).unwrap().binding()
            })
            .collect();

        assert_eq!(bindings, vec![2, 3, 4]);
        assert!(backend.uniform_slot(1).is_none());
        assert!(backend.uniform_slot(4).is_some());
        let names: Vec<&str> = registry.iter().map(|(_, l)| l.name()).collect();
        assert_eq!(names, vec!["Main", "Fill", "Rim"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut backend = HeadlessBackend::new();
        let mut registry = LightRegistry::new();
        registry.add(&mut backend, "Main", Vec3::zeros(), Vec3::zeros()).unwrap();

        let err = registry.add(&mut backend, "Main", Vec3::zeros(), Vec3::zeros()).unwrap_err();
        assert!(matches!(err, LightError::DuplicateName(name) if name == "Main"));
        assert_eq!(registry.len(), 1);
        assert_eq!(backend.live_buffers(), 1);
    }

    #[test]
    fn test_block_layout_is_padded() {
        let mut backend = HeadlessBackend::new();
        let mut registry = LightRegistry::new();
        let id = registry
            .add(&mut backend, "Main", Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.3, 1.0))
            .unwrap();

        assert_eq!(LightUniform::SIZE, 32);
        let block = uploaded(&backend, &registry, id);
        assert_eq!(block.position, [0.0, 0.0, 5.0, 1.0]);
        assert_eq!(block.color, [0.0, 0.3, 1.0, 1.0]);
    }

    #[test]
    fn test_changes_upload_on_flush() {
        let mut backend = HeadlessBackend::new();
        let mut registry = LightRegistry::new();
        let id = registry.add(&mut backend, "Main", Vec3::zeros(), Vec3::zeros()).unwrap();

        registry.move_by(id, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        registry.move_by(id, Vec3::new(0.0, 2.0, 0.0)).unwrap();
        registry.set_color(id, Vec3::new(1.0, 0.0, 0.0)).unwrap();

        // Nothing reaches the GPU until flush
        assert_eq!(uploaded(&backend, &registry, id).position, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(registry.flush(&mut backend).unwrap(), 1);

        let block = uploaded(&backend, &registry, id);
        assert_eq!(block.position, [1.0, 2.0, 0.0, 1.0]);
        assert_eq!(block.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(registry.flush(&mut backend).unwrap(), 0);
    }

    #[test]
    fn test_failed_buffer_leaves_registry_unchanged() {
        let mut backend = HeadlessBackend::new();
        backend.fail_on(FailPoint::Buffer);
        let mut registry = LightRegistry::new();

        assert!(registry.add(&mut backend, "Main", Vec3::zeros(), Vec3::zeros()).is_err());
        assert!(registry.is_empty());

        backend.clear_failures();
        let id = registry.add(&mut backend, "Main", Vec3::zeros(), Vec3::zeros()).unwrap();
        assert_eq!(registry.get(id).unwrap().binding(), FIRST_LIGHT_BINDING);
    }
}
