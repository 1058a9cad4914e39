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

use super::Mesh;
use prism_core::define_handle;
use prism_core::Pool;

define_handle!(
    /// A mesh stored in a [`MeshPool`].
    MeshHandle
);

/// Arena owning the meshes of a scene.
///
/// The render subsystem refers to meshes only through [`MeshHandle`]s, which
/// stop resolving as soon as the mesh is removed.
#[derive(Debug, Default)]
pub struct MeshPool {
    meshes: Pool<Mesh>,
}

impl MeshPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a mesh.
    pub fn insert(&mut self, mesh: Mesh) -> MeshHandle {
        MeshHandle(self.meshes.insert(mesh))
    }

    /// Removes a mesh. Its GPU state must have been freed by the caller.
    pub fn remove(&mut self, handle: MeshHandle) -> Option<Mesh> {
        self.meshes.remove(handle.0)
    }

    /// The mesh behind `handle`.
    pub fn get(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle.0)
    }

    /// The mesh behind `handle`, mutably.
    pub fn get_mut(&mut self, handle: MeshHandle) -> Option<&mut Mesh> {
        self.meshes.get_mut(handle.0)
    }

    /// Returns `true` if `handle` resolves.
    pub fn contains(&self, handle: MeshHandle) -> bool {
        self.meshes.contains(handle.0)
    }

    /// Iterates over every mesh.
    pub fn iter(&self) -> impl Iterator<Item = (MeshHandle, &Mesh)> {
        self.meshes.iter().map(|(handle, mesh)| (MeshHandle(handle), mesh))
    }

    /// Iterates mutably over every mesh.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (MeshHandle, &mut Mesh)> {
        self.meshes
            .iter_mut()
            .map(|(handle, mesh)| (MeshHandle(handle), mesh))
    }

    /// Handles of every mesh.
    pub fn handles(&self) -> Vec<MeshHandle> {
        self.meshes.handles().into_iter().map(MeshHandle).collect()
    }

    /// Number of meshes.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Returns `true` if the pool holds no mesh.
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
