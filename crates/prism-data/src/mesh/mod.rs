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

//! Geometry, materials and meshes.

mod geometry;
mod material;
#[allow(clippy::module_inception)]
mod mesh;
mod pool;

pub use geometry::{Geometry, GeometryId, SkinnedVertex, StaticVertex};
pub use material::Material;
pub use mesh::{Mesh, MeshKind};
pub use pool::{MeshHandle, MeshPool};
