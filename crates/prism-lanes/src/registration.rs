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

//! What the strategy records about a registered mesh.

use prism_core::PoolHandle;
use prism_data::{GeometryId, Mesh, MeshHandle, ShaderHandle};

/// Snapshot of the properties that decide where a mesh goes in the queues.
///
/// Taken when the mesh is registered and kept unchanged until it is
/// unregistered or re-registered, so a mesh is always removed from the
/// queues with the same key it was inserted with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshRegistrationInfo {
    /// The registered mesh.
    pub mesh: MeshHandle,
    /// Shader of the mesh material, before pass overrides.
    pub shader: ShaderHandle,
    /// Render layer.
    pub layer: String,
    /// Shared geometry, `None` for procedural meshes drawn without a VBO.
    pub geometry: Option<GeometryId>,
    /// Sort priority.
    pub priority: i32,
    /// Slot of this info in the strategy's pool.
    pub slot: PoolHandle,
}

impl MeshRegistrationInfo {
    /// Captures the registration key of `mesh`.
    pub fn from_mesh(handle: MeshHandle, mesh: &Mesh) -> Self {
        Self {
            mesh: handle,
            shader: mesh.shader(),
            layer: mesh.layer().to_string(),
            geometry: mesh.is_support_vbo().then(|| mesh.geometry_id()),
            priority: mesh.sort_priority(),
            slot: PoolHandle::INVALID,
        }
    }
}

/// A shader as resolved by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderUseInfo {
    /// The shader the mesh is drawn with in this pass.
    pub shader: ShaderHandle,
    /// `true` if the pass replaced the material's shader.
    pub replaced: bool,
}

impl ShaderUseInfo {
    /// Uses the material's shader as is.
    pub fn original(shader: ShaderHandle) -> Self {
        Self {
            shader,
            replaced: false,
        }
    }

    /// Uses a pass-provided shader instead of the material's.
    pub fn replaced(shader: ShaderHandle) -> Self {
        Self {
            shader,
            replaced: true,
        }
    }
}
