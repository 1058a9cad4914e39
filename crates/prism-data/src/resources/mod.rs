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

//! Virtual GPU resources.
//!
//! Owners (meshes, shaders) hold stable virtual handles. The managers map
//! each handle to zero or more physical objects, one per context in which the
//! handle was used, allocate missing ones on demand and collect the ones whose
//! context died.

mod descriptor;
mod geometry_cache;
mod managers;
mod program;
mod ssbo;
mod ubo;
pub mod virtual_pool;

pub use descriptor::{DescriptorManager, VirtualDescriptorSet};
pub use geometry_cache::{GeometryBuffers, GeometryCache};
pub use managers::ResourceManagers;
pub use program::{ProgramBacking, ProgramBindResult, ShaderProgramManager, VirtualProgram};
pub use ssbo::{SsboDesc, SsboManager, VirtualSsbo};
pub use ubo::{UboDesc, UboManager, VirtualUbo};
