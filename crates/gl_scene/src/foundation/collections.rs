//! Typed keys for the name-indexed registries
//!
//! Registries store their entries in a [`SlotMap`] so that every handle is a
//! generational index: a stale key can never alias a newer entry.

pub use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a linked shader program in the [`ShaderRegistry`](crate::render::shader::ShaderRegistry)
    pub struct ProgramId;

    /// Handle to a light in the [`LightRegistry`](crate::render::lighting::LightRegistry)
    pub struct LightId;
}
