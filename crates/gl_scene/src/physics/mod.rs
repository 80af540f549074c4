//! Ray picking against static meshes
//!
//! The scene has no physics simulation; this module only answers "does this
//! ray hit this object", which callers use to drive selection feedback.

pub mod collision;

pub use collision::{CollisionModel, HitTest, IntersectionFormula, Ray, Triangle};
