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

//! A shader: a virtual program plus its uniform and sampler state.

use super::layout::UniformBlockLayout;
use crate::resources::{ProgramBindResult, ResourceManagers, VirtualProgram, VirtualUbo};
use prism_core::error::ResourceError;
use prism_core::renderer::{
    BindResult, DescriptorKind, Pipeline, SamplerDecl, ShaderBindResult, ShaderCreateInfo,
    TextureId, UniformId, UniformValue,
};

/// A sampler declared by a shader and the texture currently assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerSlot {
    /// The declaration.
    pub decl: SamplerDecl,
    /// Assigned texture, [`TextureId::INVALID`] until set.
    pub texture: TextureId,
    /// Set by the pass for the current use; meshes only override it with
    /// their own material textures.
    pub pinned: bool,
}

/// A shader ready to be used by render queues.
///
/// The shader owns two staging blocks: the shared block (camera, time), which
/// lives in one shared UBO written once per frame and shader, and the
/// per-mesh block, which meshes fill through [`Shader::set_value`] before
/// flushing it into their own UBO.
#[derive(Debug)]
pub struct Shader {
    info: ShaderCreateInfo,
    program: VirtualProgram,
    shared_layout: UniformBlockLayout,
    layout: UniformBlockLayout,
    shared_ubo: VirtualUbo,
    shared_data: Vec<u8>,
    data: Vec<u8>,
    in_shared_scope: bool,
    samplers: Vec<SamplerSlot>,
    has_errors: bool,
    needs_reload: bool,
}

impl Shader {
    /// Creates a shader from a validated create info. No GPU object is created
    /// until the shader is first used.
    pub fn new(info: ShaderCreateInfo) -> Result<Self, ResourceError> {
        info.validate()?;
        let shared_layout = UniformBlockLayout::from_decls(&info.shared_uniforms);
        let layout = UniformBlockLayout::from_decls(&info.uniforms);
        let samplers = info
            .samplers
            .iter()
            .map(|decl| SamplerSlot {
                decl: decl.clone(),
                texture: TextureId::INVALID,
                pinned: false,
            })
            .collect();
        Ok(Self {
            shared_data: vec![0; shared_layout.size()],
            data: vec![0; layout.size()],
            info,
            program: VirtualProgram::INVALID,
            shared_layout,
            layout,
            shared_ubo: VirtualUbo::INVALID,
            in_shared_scope: false,
            samplers,
            has_errors: false,
            needs_reload: false,
        })
    }

    /// The shader's name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// The create info the shader was built from.
    pub fn info(&self) -> &ShaderCreateInfo {
        &self.info
    }

    /// The virtual program, [`VirtualProgram::INVALID`] before first use.
    pub fn program(&self) -> VirtualProgram {
        self.program
    }

    /// Size of the per-mesh uniform block; zero if the shader has none.
    pub fn uniform_block_size(&self) -> usize {
        self.layout.size()
    }

    /// Layout of the descriptor sets of meshes drawn with this shader.
    pub fn descriptor_layout(&self) -> Vec<DescriptorKind> {
        self.info.descriptor_layout()
    }

    /// Returns `true` if the shader failed to compile and waits for a reload.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Binds the shader's program for the current framebuffer.
    ///
    /// Compiles the program on first use. A shader whose compilation failed
    /// keeps failing until [`mark_reload`](Self::mark_reload) is called.
    pub fn use_shader(
        &mut self,
        pipeline: &mut dyn Pipeline,
        resources: &mut ResourceManagers,
    ) -> ShaderBindResult {
        if self.needs_reload {
            self.free_video_memory(pipeline, resources);
            self.needs_reload = false;
        }
        if self.has_errors {
            return ShaderBindResult::Failed;
        }
        for slot in &mut self.samplers {
            slot.pinned = false;
        }

        if !self.program.is_valid() {
            match resources
                .programs
                .allocate_program(pipeline, VirtualProgram::INVALID, &self.info)
            {
                Ok(program) => self.program = program,
                Err(e) => {
                    log::error!("Shader: '{}' cannot be compiled: {e}", self.info.name);
                    self.has_errors = true;
                    return ShaderBindResult::Failed;
                }
            }
        }

        let result = match resources.programs.bind_program(pipeline, self.program) {
            ProgramBindResult::Success => ShaderBindResult::Success,
            ProgramBindResult::Duplicated => ShaderBindResult::Duplicated,
            ProgramBindResult::ReAllocated => ShaderBindResult::ReAllocated,
            ProgramBindResult::Failed => return ShaderBindResult::Failed,
        };

        if !self.shared_layout.is_empty() && !self.shared_ubo.is_valid() {
            match resources
                .ubo
                .allocate_ubo(pipeline, VirtualUbo::INVALID, self.shared_layout.size(), true)
            {
                Ok(ubo) => self.shared_ubo = ubo,
                Err(e) => {
                    log::error!("Shader: '{}' cannot allocate its shared UBO: {e}", self.info.name);
                    return ShaderBindResult::Failed;
                }
            }
        }
        result
    }

    /// Makes the shader's program current without binding it, so per-shader
    /// resources can be allocated outside of a draw. Returns `false` if the
    /// program was never compiled for the current framebuffer.
    pub fn set_current(&self, pipeline: &mut dyn Pipeline, resources: &ResourceManagers) -> bool {
        match resources.programs.program_id(pipeline, self.program) {
            Some(id) => {
                pipeline.set_current_shader(id);
                true
            }
            None => false,
        }
    }

    /// Unbinds the current program.
    pub fn unuse(&self, pipeline: &mut dyn Pipeline) {
        pipeline.unuse_shader();
    }

    /// Routes subsequent [`set_value`](Self::set_value) calls to the shared block.
    pub fn begin_shared_ubo(&mut self) {
        self.in_shared_scope = true;
    }

    /// Leaves the shared scope and uploads the shared block.
    pub fn end_shared_ubo(
        &mut self,
        pipeline: &mut dyn Pipeline,
        resources: &mut ResourceManagers,
    ) -> bool {
        self.in_shared_scope = false;
        if !self.shared_ubo.is_valid() {
            return self.shared_layout.is_empty();
        }
        match resources
            .ubo
            .bind_ubo(pipeline, self.shared_ubo, self.shared_data.len())
        {
            BindResult::Failed => false,
            _ => {
                pipeline.update_ubo(&self.shared_data);
                true
            }
        }
    }

    /// Writes a uniform into the current block (shared or per-mesh).
    ///
    /// Unknown uniforms are ignored and reported as `false`; not every shader
    /// declares every well-known uniform.
    pub fn set_value(&mut self, id: UniformId, value: &UniformValue) -> bool {
        if self.in_shared_scope {
            self.shared_layout.write(&mut self.shared_data, id, value)
        } else {
            self.layout.write(&mut self.data, id, value)
        }
    }

    /// Assigns a texture to a declared sampler.
    pub fn set_sampler(&mut self, id: UniformId, texture: TextureId) -> bool {
        match self.samplers.iter_mut().find(|slot| slot.decl.id == id) {
            Some(slot) => {
                slot.texture = texture;
                true
            }
            None => false,
        }
    }

    /// Assigns a pass-level texture that stays in place until the next use.
    pub fn set_pass_sampler(&mut self, id: UniformId, texture: TextureId) -> bool {
        match self.samplers.iter_mut().find(|slot| slot.decl.id == id) {
            Some(slot) => {
                slot.texture = texture;
                slot.pinned = true;
                true
            }
            None => false,
        }
    }

    /// Declared samplers with their assigned textures.
    pub fn samplers(&self) -> &[SamplerSlot] {
        &self.samplers
    }

    /// Returns `true` if every declared sampler has a texture.
    pub fn is_samplers_valid(&self) -> bool {
        self.samplers.iter().all(|slot| slot.texture.is_valid())
    }

    /// Uploads the per-mesh block into the currently bound UBO.
    pub fn flush(&self, pipeline: &mut dyn Pipeline) {
        if !self.layout.is_empty() {
            pipeline.update_ubo(&self.data);
        }
    }

    /// Stages every sampler's texture for the next descriptor set update.
    pub fn flush_samplers(&self, pipeline: &mut dyn Pipeline) {
        for slot in &self.samplers {
            pipeline.bind_texture(slot.decl.binding, slot.texture);
        }
    }

    /// Requests a recompilation at next use and clears the error state.
    pub fn mark_reload(&mut self) {
        log::info!("Shader: '{}' scheduled for reload", self.info.name);
        self.needs_reload = true;
        self.has_errors = false;
    }

    /// Replaces the create info (hot reload with new source) and schedules a reload.
    pub fn reload_with(&mut self, info: ShaderCreateInfo) -> Result<(), ResourceError> {
        let mut reloaded = Shader::new(info)?;
        std::mem::swap(&mut self.info, &mut reloaded.info);
        self.shared_layout = reloaded.shared_layout;
        self.layout = reloaded.layout;
        self.shared_data = reloaded.shared_data;
        self.data = reloaded.data;
        self.samplers = reloaded.samplers;
        self.mark_reload();
        Ok(())
    }

    /// Frees the program and the shared UBO.
    pub fn free_video_memory(&mut self, pipeline: &mut dyn Pipeline, resources: &mut ResourceManagers) {
        if self.program.is_valid() {
            resources.programs.free_program(pipeline, &mut self.program);
        }
        if self.shared_ubo.is_valid() {
            resources.ubo.free_ubo(pipeline, &mut self.shared_ubo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;
    use prism_core::renderer::{uniform, UniformKind};
    use prism_infra::HeadlessPipeline;

    fn lit_info() -> ShaderCreateInfo {
        ShaderCreateInfo::new("lit")
            .with_shared_uniform("VIEW_MATRIX", UniformKind::Mat4)
            .with_uniform("MODEL_MATRIX", UniformKind::Mat4)
            .with_sampler("albedo", 2)
    }

    #[test]
    fn test_first_use_compiles_and_allocates_shared_ubo() {
        let mut pipeline = HeadlessPipeline::new();
        let mut resources = ResourceManagers::new();
        let mut shader = Shader::new(lit_info()).unwrap();

        assert_eq!(
            shader.use_shader(&mut pipeline, &mut resources),
            ShaderBindResult::Success
        );
        assert!(shader.program().is_valid());
        assert_eq!(resources.ubo.len(), 1);
        assert_eq!(
            shader.use_shader(&mut pipeline, &mut resources),
            ShaderBindResult::Success
        );
        assert_eq!(resources.ubo.len(), 1);
    }

    #[test]
    fn test_scopes_route_values() {
        let mut shader = Shader::new(lit_info()).unwrap();

        assert!(!shader.set_value(uniform::VIEW_MATRIX, &UniformValue::Mat4(Mat4::IDENTITY)));
        assert!(shader.set_value(uniform::MODEL_MATRIX, &UniformValue::Mat4(Mat4::IDENTITY)));

        shader.begin_shared_ubo();
        assert!(shader.set_value(uniform::VIEW_MATRIX, &UniformValue::Mat4(Mat4::IDENTITY)));
        assert!(!shader.set_value(uniform::MODEL_MATRIX, &UniformValue::Mat4(Mat4::IDENTITY)));
    }

    #[test]
    fn test_samplers_validity() {
        let mut shader = Shader::new(lit_info()).unwrap();
        assert!(!shader.is_samplers_valid());
        assert!(shader.set_sampler(UniformId::new("albedo"), TextureId(3)));
        assert!(shader.is_samplers_valid());
        assert!(!shader.set_sampler(UniformId::new("normal"), TextureId(3)));
    }

    #[test]
    fn test_compile_failure_sticks_until_reload() {
        let mut pipeline = HeadlessPipeline::new();
        let mut resources = ResourceManagers::new();
        let mut shader = Shader::new(lit_info()).unwrap();

        pipeline.set_allocation_failure(prism_core::error::ResourceKind::ShaderProgram, true);
        assert_eq!(
            shader.use_shader(&mut pipeline, &mut resources),
            ShaderBindResult::Failed
        );
        assert!(shader.has_errors());

        pipeline.set_allocation_failure(prism_core::error::ResourceKind::ShaderProgram, false);
        assert_eq!(
            shader.use_shader(&mut pipeline, &mut resources),
            ShaderBindResult::Failed
        );

        shader.mark_reload();
        assert!(shader.use_shader(&mut pipeline, &mut resources).is_ok());
    }

    #[test]
    fn test_free_video_memory_releases_everything() {
        let mut pipeline = HeadlessPipeline::new();
        let mut resources = ResourceManagers::new();
        let mut shader = Shader::new(lit_info()).unwrap();
        shader.use_shader(&mut pipeline, &mut resources);

        shader.free_video_memory(&mut pipeline, &mut resources);
        assert!(resources.is_empty());
        assert_eq!(pipeline.live_objects(), 0);
    }
}
