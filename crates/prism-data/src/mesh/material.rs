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

use crate::shader::ShaderHandle;
use ahash::AHashMap;
use prism_core::renderer::{TextureId, UniformId, UniformValue};

/// A shader and the values a mesh feeds it.
#[derive(Debug, Clone, Default)]
pub struct Material {
    shader: ShaderHandle,
    properties: AHashMap<UniformId, UniformValue>,
    textures: AHashMap<UniformId, TextureId>,
}

impl Material {
    /// Creates a material without properties.
    pub fn new(shader: ShaderHandle) -> Self {
        Self {
            shader,
            ..Default::default()
        }
    }

    /// Builder variant of [`set_property`](Self::set_property).
    pub fn with_property(mut self, id: UniformId, value: UniformValue) -> Self {
        self.set_property(id, value);
        self
    }

    /// Builder variant of [`set_texture`](Self::set_texture).
    pub fn with_texture(mut self, id: UniformId, texture: TextureId) -> Self {
        self.set_texture(id, texture);
        self
    }

    /// The shader the material is drawn with.
    pub fn shader(&self) -> ShaderHandle {
        self.shader
    }

    /// Replaces the shader.
    pub fn set_shader(&mut self, shader: ShaderHandle) {
        self.shader = shader;
    }

    /// Sets a per-mesh uniform.
    pub fn set_property(&mut self, id: UniformId, value: UniformValue) {
        self.properties.insert(id, value);
    }

    /// A per-mesh uniform.
    pub fn property(&self, id: UniformId) -> Option<&UniformValue> {
        self.properties.get(&id)
    }

    /// Every per-mesh uniform.
    pub fn properties(&self) -> impl Iterator<Item = (UniformId, &UniformValue)> {
        self.properties.iter().map(|(id, value)| (*id, value))
    }

    /// Assigns a texture to a sampler.
    pub fn set_texture(&mut self, id: UniformId, texture: TextureId) {
        self.textures.insert(id, texture);
    }

    /// The texture assigned to a sampler.
    pub fn texture(&self, id: UniformId) -> Option<TextureId> {
        self.textures.get(&id).copied()
    }

    /// Forgets every reference to `texture`. Returns `true` if one was found.
    pub fn remove_texture(&mut self, texture: TextureId) -> bool {
        let before = self.textures.len();
        self.textures.retain(|_, t| *t != texture);
        before != self.textures.len()
    }
}
