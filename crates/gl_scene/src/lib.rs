//! # gl_scene
//!
//! A small OpenGL scene library: meshes loaded from Wavefront OBJ text, bitmap-font
//! text objects, named point lights, a look-at camera and ray picking against
//! object geometry.
//!
//! ## Features
//!
//! - **Geometry**: OBJ parsing with vertex deduplication and 16-bit index limits
//! - **Text**: CBFG glyph metrics laid out into textured quads
//! - **Picking**: screen-space rays tested against transformed triangles
//! - **Backends**: `glow` OpenGL behind the `opengl` feature, plus a headless
//!   recording backend for tests and tools
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gl_scene::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SceneConfig::default();
//!     logging::init_from_config(&config);
//!
//!     let mut backend = HeadlessBackend::new();
//!     let mut scene = SceneContext::initialize(&mut backend, config)?;
//!
//!     let program = scene.shaders_mut().get_or_create(
//!         &mut backend,
//!         "mesh",
//!         &ShaderSource::vertex("mesh.vert", builtin::MESH_VERTEX),
//!         &ShaderSource::fragment("mesh.frag", builtin::MESH_FRAGMENT),
//!     )?;
//!     let light = scene.add_light(&mut backend, "Main", Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.3, 1.0))?;
//!     let mut cube = RenderableObject::new(&mut backend, &scene, Mesh::cube(), TextureSource::None, program, true)?;
//!
//!     if let Some(ray) = scene.pick_ray(800.0, 450.0) {
//!         if cube.check_for_collision(&ray) {
//!             scene.lights_mut().set_color(light, Vec3::new(1.0, 0.0, 0.0))?;
//!         }
//!     }
//!     cube.rotate_y(1.0);
//!
//!     let frame = scene.begin_frame(&mut backend)?;
//!     cube.render(&mut backend, &frame)?;
//!
//!     cube.destroy(&mut backend);
//!     scene.destroy(&mut backend);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod assets;
pub mod config;
pub mod foundation;
pub mod physics;
pub mod render;
pub mod scene;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        assets::{ImageData, ObjLoader},
        config::{Config, SceneConfig},
        foundation::{
            collections::{LightId, ProgramId},
            logging,
            math::{Mat4, Vec2, Vec3, Vec4},
        },
        physics::{IntersectionFormula, Ray},
        render::{
            backends::HeadlessBackend,
            shader::builtin,
            GraphicsBackend, Mesh, RenderError, RenderableObject, ShaderSource, TextObject, TextureSource,
        },
        scene::{Frame, SceneContext},
    };

    #[cfg(feature = "opengl")]
    pub use crate::render::backends::OpenGlBackend;
}
