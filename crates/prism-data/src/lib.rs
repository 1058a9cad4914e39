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

//! # Prism Data
//!
//! Data layouts and allocators built on the pipeline contract: virtual GPU
//! resources and their managers, shaders, geometry, materials and meshes.

#![warn(missing_docs)]

pub mod gpu;
pub mod mesh;
pub mod resources;
pub mod shader;

pub use gpu::GpuContext;
pub use mesh::{Geometry, GeometryId, Material, Mesh, MeshHandle, MeshKind, MeshPool};
pub use resources::ResourceManagers;
pub use shader::{Shader, ShaderHandle, ShaderLibrary};
