// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the hierarchy of error types shared by every layer of the renderer.

use crate::pool::PoolHandle;
use std::fmt;

/// The kind of GPU object an operation was acting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A uniform buffer.
    Ubo,
    /// A shader storage buffer.
    Ssbo,
    /// A vertex buffer.
    Vbo,
    /// An index buffer.
    Ibo,
    /// A sampled texture.
    Texture,
    /// A framebuffer.
    FrameBuffer,
    /// A compiled shader program.
    ShaderProgram,
    /// A descriptor set.
    DescriptorSet,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Ubo => "UBO",
            ResourceKind::Ssbo => "SSBO",
            ResourceKind::Vbo => "VBO",
            ResourceKind::Ibo => "IBO",
            ResourceKind::Texture => "texture",
            ResourceKind::FrameBuffer => "framebuffer",
            ResourceKind::ShaderProgram => "shader program",
            ResourceKind::DescriptorSet => "descriptor set",
        };
        f.write_str(name)
    }
}

/// An error raised while creating or using a GPU object.
///
/// None of these are fatal for the engine: the owner of the failing object
/// marks itself as having errors and is skipped until it is reloaded.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// The pipeline refused to create the object.
    AllocationFailed {
        /// What was being allocated.
        kind: ResourceKind,
        /// Backend-provided reason.
        reason: String,
    },
    /// A per-context object was requested while no shader program is current.
    NoCurrentShader {
        /// What was being allocated.
        kind: ResourceKind,
    },
    /// The handle does not (or no longer) resolve to a live object.
    InvalidHandle {
        /// What the handle was supposed to address.
        kind: ResourceKind,
    },
    /// A shader with the given name is not present in the library.
    ShaderNotFound(String),
    /// The shader create info was rejected.
    InvalidShader {
        /// Name of the offending shader.
        name: String,
        /// Human readable details.
        details: String,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::AllocationFailed { kind, reason } => {
                write!(f, "Failed to allocate {kind}: {reason}")
            }
            ResourceError::NoCurrentShader { kind } => {
                write!(f, "Cannot allocate a per-shader {kind}: no shader is in use")
            }
            ResourceError::InvalidHandle { kind } => {
                write!(f, "Invalid or stale {kind} handle")
            }
            ResourceError::ShaderNotFound(name) => write!(f, "Shader '{name}' not found"),
            ResourceError::InvalidShader { name, details } => {
                write!(f, "Invalid shader '{name}': {details}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// A violated invariant of the mesh registration subsystem.
///
/// These indicate programming errors in the caller and are always logged at
/// `error` level by the component that detects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    /// The mesh already has a registration.
    AlreadyRegistered(PoolHandle),
    /// The mesh was never registered (or already unregistered).
    NotRegistered(PoolHandle),
    /// The mesh handle does not resolve in the mesh pool.
    MeshNotFound(PoolHandle),
    /// A structural change was attempted while the queues are being iterated.
    MutationDuringIteration,
    /// The queue handle is not owned by the strategy.
    QueueNotFound(PoolHandle),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::AlreadyRegistered(mesh) => {
                write!(f, "Mesh {mesh:?} is already registered")
            }
            RegistrationError::NotRegistered(mesh) => {
                write!(f, "Mesh {mesh:?} is not registered")
            }
            RegistrationError::MeshNotFound(mesh) => write!(f, "Mesh {mesh:?} does not exist"),
            RegistrationError::MutationDuringIteration => {
                write!(f, "Render queues cannot be modified while they are iterated")
            }
            RegistrationError::QueueNotFound(queue) => write!(f, "Queue {queue:?} not found"),
        }
    }
}

impl std::error::Error for RegistrationError {}

/// An error raised by the frame lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A GPU object could not be created or used.
    Resource(ResourceError),
    /// The registration subsystem rejected an operation.
    Registration(RegistrationError),
    /// GPU objects were still alive after the shutdown drain.
    ResourceLeak {
        /// Number of objects that could not be released.
        remaining: usize,
    },
    /// The render context has already been closed.
    ContextClosed,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Resource(e) => write!(f, "Resource error: {e}"),
            RenderError::Registration(e) => write!(f, "Registration error: {e}"),
            RenderError::ResourceLeak { remaining } => {
                write!(f, "{remaining} GPU resources leaked at shutdown")
            }
            RenderError::ContextClosed => write!(f, "The render context is closed"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Resource(e) => Some(e),
            RenderError::Registration(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(error: ResourceError) -> Self {
        RenderError::Resource(error)
    }
}

impl From<RegistrationError> for RenderError {
    fn from(error: RegistrationError) -> Self {
        RenderError::Registration(error)
    }
}

/// An error raised while loading render settings.
#[derive(Debug)]
pub enum ConfigError {
    /// The settings file could not be read.
    Io(std::io::Error),
    /// The settings text is not valid RON for the expected structure.
    Parse(ron::error::SpannedError),
    /// The settings could not be written as RON.
    Serialize(ron::Error),
    /// The settings were parsed but are inconsistent.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read settings: {e}"),
            ConfigError::Parse(e) => write!(f, "Failed to parse settings: {e}"),
            ConfigError::Serialize(e) => write!(f, "Failed to serialize settings: {e}"),
            ConfigError::Invalid(reason) => write!(f, "Invalid settings: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Serialize(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(error: std::io::Error) -> Self {
        ConfigError::Io(error)
    }
}

impl From<ron::error::SpannedError> for ConfigError {
    fn from(error: ron::error::SpannedError) -> Self {
        ConfigError::Parse(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_error_display() {
        let error = ResourceError::AllocationFailed {
            kind: ResourceKind::Ubo,
            reason: "out of memory".to_string(),
        };
        assert_eq!(error.to_string(), "Failed to allocate UBO: out of memory");
    }

    #[test]
    fn test_render_error_wraps_sources() {
        let error: RenderError = RegistrationError::MutationDuringIteration.into();
        assert!(matches!(error, RenderError::Registration(_)));
        assert!(std::error::Error::source(&error).is_some());

        let leak = RenderError::ResourceLeak { remaining: 3 };
        assert_eq!(leak.to_string(), "3 GPU resources leaked at shutdown");
    }
}
