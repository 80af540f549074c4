//! Shader program registry
//!
//! Programs are linked once per name and referenced by [`ProgramId`]. Shader
//! stages are checked for the right kind before anything reaches the backend.
//! Sources are plain strings; loading them from disk is up to the caller.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::foundation::collections::{ProgramId, SlotMap};
use crate::render::backend::{BackendError, GraphicsBackend, ProgramHandle, UniformLocation};

/// Name of the per-object model matrix uniform
pub const MODEL_UNIFORM: &str = "model";

/// Name of the text color uniform
pub const TEXT_COLOR_UNIFORM: &str = "textColor";

/// Name of the text offset uniform
pub const TEXT_OFFSET_UNIFORM: &str = "textOffset";

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderKind {
    /// Vertex stage
    Vertex,
    /// Fragment stage
    Fragment,
}

/// Shader registry errors
#[derive(Error, Debug)]
pub enum ShaderError {
    /// A stage was passed where the other kind was expected
    #[error("shader '{label}' is a {found:?} shader, expected {expected:?}")]
    ShaderTypeMismatch {
        /// Label of the offending source
        label: String,
        /// Kind required at that position
        expected: ShaderKind,
        /// Kind that was supplied
        found: ShaderKind,
    },

    /// Compilation or linking failed in the backend
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// GLSL source for one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// Stage this source compiles to
    pub kind: ShaderKind,
    /// Name used in log and error messages
    pub label: String,
    /// GLSL text
    pub source: String,
}

impl ShaderSource {
    /// Vertex stage source
    pub fn vertex(label: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind: ShaderKind::Vertex,
            label: label.into(),
            source: source.into(),
        }
    }

    /// Fragment stage source
    pub fn fragment(label: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind: ShaderKind::Fragment,
            label: label.into(),
            source: source.into(),
        }
    }

    fn expect_kind(&self, expected: ShaderKind) -> Result<(), ShaderError> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(ShaderError::ShaderTypeMismatch {
                label: self.label.clone(),
                expected,
                found: self.kind,
            })
        }
    }
}

/// A linked program and the locations of the uniforms the scene writes
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    name: String,
    handle: ProgramHandle,
    model: Option<UniformLocation>,
    text_color: Option<UniformLocation>,
    text_offset: Option<UniformLocation>,
}

impl ShaderProgram {
    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend program handle
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Location of `model`, if the program uses it
    pub fn model_location(&self) -> Option<UniformLocation> {
        self.model
    }

    /// Location of `textColor`, if the program uses it
    pub fn text_color_location(&self) -> Option<UniformLocation> {
        self.text_color
    }

    /// Location of `textOffset`, if the program uses it
    pub fn text_offset_location(&self) -> Option<UniformLocation> {
        self.text_offset
    }
}

/// Name-keyed collection of linked programs
#[derive(Debug, Default)]
pub struct ShaderRegistry {
    programs: SlotMap<ProgramId, ShaderProgram>,
    by_name: HashMap<String, ProgramId>,
}

impl ShaderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the program registered as `name`, linking it from the given
    /// sources if it does not exist yet
    pub fn get_or_create(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        name: &str,
        vertex: &ShaderSource,
        fragment: &ShaderSource,
    ) -> Result<ProgramId, ShaderError> {
        if let Some(&id) = self.by_name.get(name) {
            return Ok(id);
        }

        vertex.expect_kind(ShaderKind::Vertex)?;
        fragment.expect_kind(ShaderKind::Fragment)?;

        let vs = backend.create_shader(ShaderKind::Vertex, &vertex.source)?;
        let fs = match backend.create_shader(ShaderKind::Fragment, &fragment.source) {
            Ok(fs) => fs,
            Err(e) => {
                backend.delete_shader(vs);
                return Err(e.into());
            }
        };

        // Stages are no longer needed once linked, whether or not linking worked
        let linked = backend.link_program(vs, fs);
        backend.delete_shader(vs);
        backend.delete_shader(fs);
        let handle = linked?;

        let program = ShaderProgram {
            name: name.to_string(),
            handle,
            model: backend.uniform_location(handle, MODEL_UNIFORM),
            text_color: backend.uniform_location(handle, TEXT_COLOR_UNIFORM),
            text_offset: backend.uniform_location(handle, TEXT_OFFSET_UNIFORM),
        };
        log::debug!(
            "Linked program '{}' ({} + {}), model uniform: {}",
            name,
            vertex.label,
            fragment.label,
            program.model.is_some()
        );

        let id = self.programs.insert(program);
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Program by id
    pub fn get(&self, id: ProgramId) -> Option<&ShaderProgram> {
        self.programs.get(id)
    }

    /// Id of the program registered as `name`
    pub fn find(&self, name: &str) -> Option<ProgramId> {
        self.by_name.get(name).copied()
    }

    /// Number of linked programs
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// True when no program has been linked
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Delete every program
    pub fn destroy_all(&mut self, backend: &mut dyn GraphicsBackend) {
        for (_, program) in self.programs.drain() {
            backend.delete_program(program.handle);
        }
        self.by_name.clear();
    }
}

/// Ready-made GLSL 4.20 programs matching the scene's uniform layout
///
/// Camera block at binding 1, the first light at binding 2.
pub mod builtin {
    /// Lit, textured mesh vertex stage
    pub const MESH_VERTEX: &str = r"#version 420 core
layout(location = 0) in vec3 position;
layout(location = 1) in vec2 texCoord;
layout(location = 2) in vec3 normal;

layout(std140, binding = 1) uniform Camera {
    mat4 view;
    mat4 projection;
};

uniform mat4 model;

out vec3 fragPosition;
out vec2 fragTexCoord;
out vec3 fragNormal;

void main() {
    vec4 world = model * vec4(position, 1.0);
    fragPosition = world.xyz;
    fragTexCoord = texCoord;
    fragNormal = mat3(transpose(inverse(model))) * normal;
    gl_Position = projection * view * world;
}
";

    /// Lit, textured mesh fragment stage, single point light
    pub const MESH_FRAGMENT: &str = r"#version 420 core
in vec3 fragPosition;
in vec2 fragTexCoord;
in vec3 fragNormal;

layout(std140, binding = 2) uniform Light {
    vec4 lightPosition;
    vec4 lightColor;
};

layout(binding = 0) uniform sampler2D diffuse;

out vec4 outColor;

void main() {
    vec3 toLight = normalize(lightPosition.xyz - fragPosition);
    float lambert = max(dot(normalize(fragNormal), toLight), 0.0);
    vec3 base = texture(diffuse, fragTexCoord).rgb;
    outColor = vec4(base * (0.15 + lambert * lightColor.rgb), 1.0);
}
";

    /// Text quad vertex stage
    pub const TEXT_VERTEX: &str = r"#version 420 core
layout(location = 0) in vec3 position;
layout(location = 1) in vec2 texCoord;

layout(std140, binding = 1) uniform Camera {
    mat4 view;
    mat4 projection;
};

uniform mat4 model;
uniform vec2 textOffset;

out vec2 fragTexCoord;

void main() {
    fragTexCoord = texCoord;
    vec4 world = model * vec4(position.xy + textOffset, position.z, 1.0);
    gl_Position = projection * view * world;
}
";

    /// Text quad fragment stage, tints the atlas
    pub const TEXT_FRAGMENT: &str = r"#version 420 core
in vec2 fragTexCoord;

layout(binding = 0) uniform sampler2D atlas;
uniform vec4 textColor;

out vec4 outColor;

void main() {
    vec4 glyph = texture(atlas, fragTexCoord);
    outColor = vec4(textColor.rgb, textColor.a * glyph.r);
}
";
}
