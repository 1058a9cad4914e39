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

//! The pass contract render queues draw through.

use crate::registration::ShaderUseInfo;
use ahash::AHashMap;
use glam::{Mat4, Vec3};
use prism_core::renderer::uniform::{PROJECTION_MATRIX, TIME, VIEW_MATRIX, VIEW_POSITION};
use prism_core::renderer::{TextureId, UniformId, UniformValue};
use prism_core::PassConfig;
use prism_data::{Mesh, Shader, ShaderHandle, ShaderLibrary};

/// Values shared by every shader of a pass for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    /// View matrix of the camera.
    pub view: Mat4,
    /// Projection matrix of the camera.
    pub projection: Mat4,
    /// World position of the camera.
    pub position: Vec3,
    /// Seconds since the scene started.
    pub time: f32,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
            time: 0.0,
        }
    }
}

/// A pass that draws meshes through a [`RenderQueue`](crate::RenderQueue).
///
/// The queue asks the drawer which meshes it accepts and which shader they are
/// drawn with, then calls back into it to fill uniforms while replaying.
pub trait MeshDrawer {
    /// Pass name, used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Returns `true` if meshes on `layer` are drawn by this pass.
    fn is_layer_allowed(&self, layer: &str) -> bool;

    /// Returns `true` if meshes with `priority` are drawn by this pass.
    fn is_priority_allowed(&self, priority: i32) -> bool;

    /// Resolves the shader a mesh is drawn with in this pass.
    ///
    /// An invalid shader in the result excludes the mesh from the pass.
    fn replace_shader(&self, shader: ShaderHandle) -> ShaderUseInfo;

    /// Stores the camera and time of the frame about to be drawn.
    fn set_frame_uniforms(&mut self, frame: FrameUniforms);

    /// Writes pass constants, once per shader run.
    fn use_constants(&self, shader: &mut Shader);

    /// Assigns pass-level textures, once per shader run.
    fn use_samplers(&self, shader: &mut Shader);

    /// Writes the shared block, once per shader and frame.
    fn use_shared_uniforms(&self, shader: &mut Shader);

    /// Writes the per-mesh block of `mesh`.
    fn use_uniforms(&self, shader: &mut Shader, mesh: &Mesh);
}

/// The configurable [`MeshDrawer`] built from a [`PassConfig`].
#[derive(Debug, Clone)]
pub struct MeshDrawerPass {
    config: PassConfig,
    override_shader: Option<ShaderHandle>,
    shader_overrides: AHashMap<ShaderHandle, ShaderHandle>,
    frame: FrameUniforms,
    constants: Vec<(UniformId, UniformValue)>,
    samplers: Vec<(UniformId, TextureId)>,
}

impl MeshDrawerPass {
    /// Creates a pass without resolving its shader overrides.
    pub fn new(config: PassConfig) -> Self {
        Self {
            config,
            override_shader: None,
            shader_overrides: AHashMap::new(),
            frame: FrameUniforms::default(),
            constants: Vec::new(),
            samplers: Vec::new(),
        }
    }

    /// Creates a pass and resolves its shader overrides against `shaders`.
    pub fn from_config(config: PassConfig, shaders: &ShaderLibrary) -> Self {
        let mut pass = Self::new(config);
        pass.resolve_shaders(shaders);
        pass
    }

    /// Maps the shader names of the configuration to handles.
    ///
    /// A missing override shader excludes every mesh from the pass rather
    /// than silently drawing them with their own shader. Returns the number
    /// of names that could not be resolved.
    pub fn resolve_shaders(&mut self, shaders: &ShaderLibrary) -> usize {
        let mut missing = 0;
        self.override_shader = self.config.override_shader.as_deref().map(|name| {
            shaders.find(name).unwrap_or_else(|| {
                log::warn!("MeshDrawerPass: '{}' overrides with unknown shader '{name}'", self.config.name);
                missing += 1;
                ShaderHandle::INVALID
            })
        });

        self.shader_overrides.clear();
        for (from, to) in &self.config.shader_overrides {
            match (shaders.find(from), shaders.find(to)) {
                (Some(from), Some(to)) => {
                    self.shader_overrides.insert(from, to);
                }
                _ => {
                    log::warn!(
                        "MeshDrawerPass: '{}' cannot resolve override '{from}' -> '{to}'",
                        self.config.name
                    );
                    missing += 1;
                }
            }
        }
        missing
    }

    /// The configuration the pass was built from.
    pub fn config(&self) -> &PassConfig {
        &self.config
    }

    /// The frame values last set.
    pub fn frame(&self) -> &FrameUniforms {
        &self.frame
    }

    /// Sets a uniform written at the start of every shader run.
    pub fn set_constant(&mut self, id: UniformId, value: UniformValue) {
        match self.constants.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, slot)) => *slot = value,
            None => self.constants.push((id, value)),
        }
    }

    /// Pins a texture on a sampler for every shader of the pass.
    pub fn set_sampler(&mut self, id: UniformId, texture: TextureId) {
        match self.samplers.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, slot)) => *slot = texture,
            None => self.samplers.push((id, texture)),
        }
    }
}

impl MeshDrawer for MeshDrawerPass {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_layer_allowed(&self, layer: &str) -> bool {
        self.config.layers.is_empty() || self.config.layers.iter().any(|l| l == layer)
    }

    fn is_priority_allowed(&self, priority: i32) -> bool {
        self.config.min_priority.map_or(true, |min| priority >= min)
            && self.config.max_priority.map_or(true, |max| priority <= max)
    }

    fn replace_shader(&self, shader: ShaderHandle) -> ShaderUseInfo {
        if let Some(replacement) = self.override_shader {
            return ShaderUseInfo::replaced(replacement);
        }
        match self.shader_overrides.get(&shader) {
            Some(replacement) => ShaderUseInfo::replaced(*replacement),
            None => ShaderUseInfo::original(shader),
        }
    }

    fn set_frame_uniforms(&mut self, frame: FrameUniforms) {
        self.frame = frame;
    }

    fn use_constants(&self, shader: &mut Shader) {
        for (id, value) in &self.constants {
            shader.set_value(*id, value);
        }
    }

    fn use_samplers(&self, shader: &mut Shader) {
        for (id, texture) in &self.samplers {
            shader.set_pass_sampler(*id, *texture);
        }
    }

    fn use_shared_uniforms(&self, shader: &mut Shader) {
        shader.set_value(VIEW_MATRIX, &UniformValue::Mat4(self.frame.view));
        shader.set_value(PROJECTION_MATRIX, &UniformValue::Mat4(self.frame.projection));
        shader.set_value(VIEW_POSITION, &UniformValue::Vec3(self.frame.position));
        shader.set_value(TIME, &UniformValue::Float(self.frame.time));
    }

    fn use_uniforms(&self, shader: &mut Shader, mesh: &Mesh) {
        mesh.use_model_matrix(shader);
        mesh.use_material(shader);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::ShaderCreateInfo;

    fn library() -> (ShaderLibrary, ShaderHandle, ShaderHandle) {
        let mut shaders = ShaderLibrary::new();
        let lit = shaders
            .insert(Shader::new(ShaderCreateInfo::new("lit")).unwrap())
            .unwrap();
        let depth = shaders
            .insert(Shader::new(ShaderCreateInfo::new("depth")).unwrap())
            .unwrap();
        (shaders, lit, depth)
    }

    #[test]
    fn test_layer_and_priority_filters() {
        let mut config = PassConfig::new("Transparent");
        config.layers = vec!["Transparent".to_string()];
        config.min_priority = Some(10);
        let pass = MeshDrawerPass::new(config);

        assert!(pass.is_layer_allowed("Transparent"));
        assert!(!pass.is_layer_allowed("Default"));
        assert!(pass.is_priority_allowed(10));
        assert!(!pass.is_priority_allowed(9));
        assert!(MeshDrawerPass::new(PassConfig::default()).is_layer_allowed("Anything"));
    }

    #[test]
    fn test_override_shader_replaces_everything() {
        let (shaders, lit, depth) = library();
        let mut config = PassConfig::new("Depth");
        config.override_shader = Some("depth".to_string());
        let pass = MeshDrawerPass::from_config(config, &shaders);

        assert_eq!(pass.replace_shader(lit), ShaderUseInfo::replaced(depth));
    }

    #[test]
    fn test_missing_override_excludes_meshes() {
        let (shaders, lit, _) = library();
        let mut config = PassConfig::new("Depth");
        config.override_shader = Some("missing".to_string());
        let mut pass = MeshDrawerPass::new(config);

        assert_eq!(pass.resolve_shaders(&shaders), 1);
        assert!(!pass.replace_shader(lit).shader.is_valid());
    }

    #[test]
    fn test_per_shader_overrides() {
        let (shaders, lit, depth) = library();
        let mut config = PassConfig::new("Main");
        config
            .shader_overrides
            .insert("lit".to_string(), "depth".to_string());
        let pass = MeshDrawerPass::from_config(config, &shaders);

        assert_eq!(pass.replace_shader(lit), ShaderUseInfo::replaced(depth));
        assert_eq!(pass.replace_shader(depth), ShaderUseInfo::original(depth));
    }
}
