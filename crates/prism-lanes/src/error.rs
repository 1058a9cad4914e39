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

//! Errors reported while replaying draw queues.

use prism_data::{MeshHandle, ShaderHandle};
use thiserror::Error;

/// A per-mesh or per-run draw failure.
///
/// These never abort a pass: the offending run is skipped and the error is
/// recorded in the strategy's [`QueueDiagnostics`](crate::QueueDiagnostics).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawError {
    /// The queue refers to a shader that was removed from the library.
    #[error("shader {0:?} no longer exists")]
    MissingShader(ShaderHandle),

    /// The shader could not be compiled or bound.
    #[error("shader '{name}' cannot be used")]
    ShaderUnavailable {
        /// Name of the shader.
        name: String,
    },

    /// The queue refers to a mesh that was removed from its pool.
    #[error("mesh {0:?} no longer exists")]
    MissingMesh(MeshHandle),

    /// The mesh's geometry could not be uploaded or bound.
    #[error("mesh '{mesh}' cannot bind its geometry")]
    GeometryUnavailable {
        /// Name of the mesh.
        mesh: String,
    },

    /// The mesh failed to allocate or bind its own resources.
    #[error("mesh '{mesh}' failed to draw with shader '{shader}'")]
    DrawFailed {
        /// Name of the mesh.
        mesh: String,
        /// Name of the shader.
        shader: String,
    },
}
