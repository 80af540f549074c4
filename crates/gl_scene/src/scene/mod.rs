//! Scene context and per-frame drawing token

pub mod context;


pub use context::{Frame, SceneContext};
