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

//! Borrowed view of the render state handed down the render path.

use crate::resources::ResourceManagers;
use crate::shader::ShaderLibrary;
use prism_core::renderer::{Pipeline, TextureId};

/// Everything the render path needs to talk to the GPU, borrowed from the
/// render context for the duration of a frame phase.
///
/// Fields are public so callers can borrow them independently, e.g. a shader
/// from `shaders` while `pipeline` and `resources` are in use.
pub struct GpuContext<'a> {
    /// The backend.
    pub pipeline: &'a mut dyn Pipeline,
    /// Virtual resource managers.
    pub resources: &'a mut ResourceManagers,
    /// Every shader of the context.
    pub shaders: &'a mut ShaderLibrary,
    /// Texture bound to samplers a material leaves empty.
    pub default_texture: TextureId,
}

impl<'a> GpuContext<'a> {
    /// Bundles borrowed render state.
    pub fn new(
        pipeline: &'a mut dyn Pipeline,
        resources: &'a mut ResourceManagers,
        shaders: &'a mut ShaderLibrary,
        default_texture: TextureId,
    ) -> Self {
        Self {
            pipeline,
            resources,
            shaders,
            default_texture,
        }
    }
}
