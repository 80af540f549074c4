//! Graphics backend implementations

pub mod headless;
#[cfg(feature = "opengl")]
pub mod opengl;

pub use headless::{FailPoint, GpuCommand, HeadlessBackend};
#[cfg(feature = "opengl")]
pub use opengl::OpenGlBackend;
