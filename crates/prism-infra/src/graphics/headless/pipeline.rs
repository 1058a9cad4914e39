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

use super::command::HeadlessCommand;
use ahash::{AHashMap, AHashSet};
use prism_core::error::{ResourceError, ResourceKind};
use prism_core::renderer::{
    BufferId, ContextId, DescriptorKind, DescriptorSetId, FrameBufferId, FramebufferDesc,
    FramebufferSpec, Pipeline, PipelineStats, ProgramId, ShaderCreateInfo, SsboUsage, TextureDesc,
    TextureId,
};
use std::any::Any;

#[derive(Debug)]
struct BufferEntry {
    kind: ResourceKind,
    data: Vec<u8>,
}

#[derive(Debug)]
struct ProgramEntry {
    name: String,
    spec: FramebufferSpec,
}

#[derive(Debug)]
struct DescriptorSetEntry {
    program: ProgramId,
    writes: u32,
}

/// A [`Pipeline`] that records commands instead of executing them.
///
/// Besides the contract itself it exposes inspection helpers (live objects,
/// buffer contents, recorded commands) and failure injection switches, so
/// tests can drive the renderer into its error paths.
#[derive(Debug)]
pub struct HeadlessPipeline {
    next_id: i32,

    buffers: AHashMap<BufferId, BufferEntry>,
    textures: AHashMap<TextureId, TextureDesc>,
    framebuffers: AHashMap<FrameBufferId, FramebufferDesc>,
    programs: AHashMap<ProgramId, ProgramEntry>,
    descriptor_sets: AHashMap<DescriptorSetId, DescriptorSetEntry>,

    swapchain_spec: FramebufferSpec,
    current_framebuffer: FrameBufferId,
    current_shader: ProgramId,
    shader_changed: bool,
    framebuffers_changed: bool,
    dirty: bool,

    bound_ubo: BufferId,
    bound_descriptor_set: DescriptorSetId,
    staged_textures: Vec<(u32, TextureId)>,

    failing_allocations: AHashSet<ResourceKind>,
    failing_shaders: AHashSet<String>,

    commands: Vec<HeadlessCommand>,
    stats: PipelineStats,
    rejected_ubo_updates: usize,
}

impl HeadlessPipeline {
    /// Creates a pipeline whose swapchain uses the default framebuffer spec.
    pub fn new() -> Self {
        Self::with_swapchain_spec(FramebufferSpec::default())
    }

    /// Creates a pipeline whose swapchain uses `spec`.
    pub fn with_swapchain_spec(spec: FramebufferSpec) -> Self {
        log::info!("HeadlessPipeline: created with swapchain spec {spec:?}");
        Self {
            next_id: 0,
            buffers: AHashMap::new(),
            textures: AHashMap::new(),
            framebuffers: AHashMap::new(),
            programs: AHashMap::new(),
            descriptor_sets: AHashMap::new(),
            swapchain_spec: spec,
            current_framebuffer: FrameBufferId::INVALID,
            current_shader: ProgramId::INVALID,
            shader_changed: false,
            framebuffers_changed: false,
            dirty: true,
            bound_ubo: BufferId::INVALID,
            bound_descriptor_set: DescriptorSetId::INVALID,
            staged_textures: Vec::new(),
            failing_allocations: AHashSet::new(),
            failing_shaders: AHashSet::new(),
            commands: Vec::new(),
            stats: PipelineStats::default(),
            rejected_ubo_updates: 0,
        }
    }

    // --- Failure injection ---

    /// Makes every subsequent allocation of `kind` fail (or succeed again).
    pub fn set_allocation_failure(&mut self, kind: ResourceKind, fail: bool) {
        if fail {
            self.failing_allocations.insert(kind);
        } else {
            self.failing_allocations.remove(&kind);
        }
    }

    /// Makes [`Pipeline::use_shader`] fail for every program created from the
    /// shader named `name`.
    pub fn set_shader_failure(&mut self, name: &str, fail: bool) {
        if fail {
            self.failing_shaders.insert(name.to_string());
        } else {
            self.failing_shaders.remove(name);
        }
    }

    /// Changes the swapchain spec, as a resize to an MSAA target would.
    pub fn set_swapchain_spec(&mut self, spec: FramebufferSpec) {
        self.swapchain_spec = spec;
        self.framebuffers_changed = true;
    }

    // --- Inspection ---

    /// Every command recorded since the last [`clear_commands`](Self::clear_commands).
    pub fn commands(&self) -> &[HeadlessCommand] {
        &self.commands
    }

    /// Forgets recorded commands.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of recorded draw commands of both kinds.
    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    /// Number of recorded clears.
    pub fn clear_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, HeadlessCommand::Clear(_)))
            .count()
    }

    /// Number of recorded submits.
    pub fn submit_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, HeadlessCommand::Submit))
            .count()
    }

    /// Number of live buffers of `kind`.
    pub fn live_buffers(&self, kind: ResourceKind) -> usize {
        self.buffers.values().filter(|b| b.kind == kind).count()
    }

    /// Number of live programs.
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Number of live descriptor sets.
    pub fn live_descriptor_sets(&self) -> usize {
        self.descriptor_sets.len()
    }

    /// Number of live textures.
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Number of live off-screen framebuffers.
    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    /// Total number of live GPU objects of every kind.
    pub fn live_objects(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.framebuffers.len()
            + self.programs.len()
            + self.descriptor_sets.len()
    }

    /// Last contents uploaded into a buffer.
    pub fn buffer_data(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(|b| b.data.as_slice())
    }

    /// Number of UBO uploads refused because they did not fit the bound buffer.
    pub fn rejected_ubo_updates(&self) -> usize {
        self.rejected_ubo_updates
    }

    /// Name of the shader a program was created from.
    pub fn program_name(&self, id: ProgramId) -> Option<&str> {
        self.programs.get(&id).map(|p| p.name.as_str())
    }

    /// Framebuffer spec a program was compiled for.
    pub fn program_spec(&self, id: ProgramId) -> Option<FramebufferSpec> {
        self.programs.get(&id).map(|p| p.spec)
    }

    /// Number of times a descriptor set was rewritten.
    pub fn descriptor_set_writes(&self, id: DescriptorSetId) -> Option<u32> {
        self.descriptor_sets.get(&id).map(|d| d.writes)
    }

    // --- Internals ---

    fn next_raw_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_allocation(&self, kind: ResourceKind) -> Result<(), ResourceError> {
        if self.failing_allocations.contains(&kind) {
            log::error!("HeadlessPipeline: injected {kind} allocation failure");
            return Err(ResourceError::AllocationFailed {
                kind,
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn create_buffer(&mut self, kind: ResourceKind, data: Vec<u8>) -> Result<BufferId, ResourceError> {
        self.check_allocation(kind)?;
        let id = BufferId(self.next_raw_id());
        log::trace!("HeadlessPipeline: created {kind} {id:?} ({} bytes)", data.len());
        self.buffers.insert(id, BufferEntry { kind, data });
        Ok(id)
    }

    fn destroy_buffer(&mut self, kind: ResourceKind, id: &mut BufferId) -> bool {
        match self.buffers.get(id) {
            Some(entry) if entry.kind == kind => {
                self.buffers.remove(id);
                log::trace!("HeadlessPipeline: destroyed {kind} {id:?}");
                if self.bound_ubo == *id {
                    self.bound_ubo = BufferId::INVALID;
                }
                *id = BufferId::INVALID;
                true
            }
            _ => {
                log::warn!("HeadlessPipeline: refusing to free unknown {kind} {id:?}");
                false
            }
        }
    }
}

impl Default for HeadlessPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline for HeadlessPipeline {
    fn name(&self) -> &str {
        "headless"
    }

    fn allocate_ubo(&mut self, size: usize) -> Result<BufferId, ResourceError> {
        self.create_buffer(ResourceKind::Ubo, vec![0; size])
    }

    fn free_ubo(&mut self, id: &mut BufferId) -> bool {
        self.destroy_buffer(ResourceKind::Ubo, id)
    }

    fn bind_ubo(&mut self, id: BufferId) {
        self.bound_ubo = id;
        self.commands.push(HeadlessCommand::BindUbo(id));
    }

    fn update_ubo(&mut self, data: &[u8]) {
        let buffer = self.bound_ubo;
        match self.buffers.get_mut(&buffer) {
            Some(entry) if entry.data.len() < data.len() => {
                log::error!(
                    "HeadlessPipeline: {} byte upload overflows {buffer:?} ({} bytes)",
                    data.len(),
                    entry.data.len()
                );
                self.rejected_ubo_updates += 1;
            }
            Some(entry) => {
                entry.data[..data.len()].copy_from_slice(data);
                self.stats.ubo_updates += 1;
                self.commands.push(HeadlessCommand::UpdateUbo {
                    buffer,
                    len: data.len(),
                });
            }
            None => log::warn!("HeadlessPipeline: update_ubo without a bound UBO"),
        }
    }

    fn allocate_ssbo(&mut self, size: usize, _usage: SsboUsage) -> Result<BufferId, ResourceError> {
        self.create_buffer(ResourceKind::Ssbo, vec![0; size])
    }

    fn free_ssbo(&mut self, id: &mut BufferId) -> bool {
        self.destroy_buffer(ResourceKind::Ssbo, id)
    }

    fn bind_ssbo(&mut self, _id: BufferId) {}

    fn allocate_vbo(&mut self, data: &[u8]) -> Result<BufferId, ResourceError> {
        self.create_buffer(ResourceKind::Vbo, data.to_vec())
    }

    fn free_vbo(&mut self, id: &mut BufferId) -> bool {
        self.destroy_buffer(ResourceKind::Vbo, id)
    }

    fn bind_vbo(&mut self, id: BufferId) {
        self.stats.vbo_binds += 1;
        self.commands.push(HeadlessCommand::BindVbo(id));
    }

    fn allocate_ibo(&mut self, indices: &[u32]) -> Result<BufferId, ResourceError> {
        let bytes = indices.iter().flat_map(|i| i.to_ne_bytes()).collect();
        self.create_buffer(ResourceKind::Ibo, bytes)
    }

    fn free_ibo(&mut self, id: &mut BufferId) -> bool {
        self.destroy_buffer(ResourceKind::Ibo, id)
    }

    fn bind_ibo(&mut self, id: BufferId) {
        self.commands.push(HeadlessCommand::BindIbo(id));
    }

    fn allocate_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: &[u8],
    ) -> Result<TextureId, ResourceError> {
        self.check_allocation(ResourceKind::Texture)?;
        if !pixels.is_empty() && pixels.len() != desc.byte_size() {
            return Err(ResourceError::AllocationFailed {
                kind: ResourceKind::Texture,
                reason: format!(
                    "expected {} bytes of pixel data, got {}",
                    desc.byte_size(),
                    pixels.len()
                ),
            });
        }
        let id = TextureId(self.next_raw_id());
        self.textures.insert(id, desc.clone());
        log::debug!("HeadlessPipeline: created texture {id:?} {}x{}", desc.width, desc.height);
        Ok(id)
    }

    fn free_texture(&mut self, id: &mut TextureId) -> bool {
        if self.textures.remove(id).is_none() {
            log::warn!("HeadlessPipeline: refusing to free unknown texture {id:?}");
            return false;
        }
        log::debug!("HeadlessPipeline: destroyed texture {id:?}");
        *id = TextureId::INVALID;
        true
    }

    fn bind_texture(&mut self, binding: u32, texture: TextureId) {
        self.staged_textures.retain(|(b, _)| *b != binding);
        self.staged_textures.push((binding, texture));
    }

    fn allocate_framebuffer(
        &mut self,
        desc: &FramebufferDesc,
    ) -> Result<FrameBufferId, ResourceError> {
        self.check_allocation(ResourceKind::FrameBuffer)?;
        let id = FrameBufferId(self.next_raw_id());
        self.framebuffers.insert(id, desc.clone());
        self.framebuffers_changed = true;
        log::debug!("HeadlessPipeline: created framebuffer {id:?} {desc:?}");
        Ok(id)
    }

    fn free_framebuffer(&mut self, id: &mut FrameBufferId) -> bool {
        if self.framebuffers.remove(id).is_none() {
            log::warn!("HeadlessPipeline: refusing to free unknown framebuffer {id:?}");
            return false;
        }
        if self.current_framebuffer == *id {
            self.current_framebuffer = FrameBufferId::INVALID;
        }
        self.framebuffers_changed = true;
        log::debug!("HeadlessPipeline: destroyed framebuffer {id:?}");
        *id = FrameBufferId::INVALID;
        true
    }

    fn set_current_framebuffer(&mut self, id: FrameBufferId) {
        if id.is_valid() && !self.framebuffers.contains_key(&id) {
            log::warn!("HeadlessPipeline: unknown framebuffer {id:?}, using the swapchain");
            self.current_framebuffer = FrameBufferId::INVALID;
            return;
        }
        self.current_framebuffer = id;
    }

    fn current_framebuffer(&self) -> FrameBufferId {
        self.current_framebuffer
    }

    fn current_framebuffer_spec(&self) -> FramebufferSpec {
        self.framebuffers
            .get(&self.current_framebuffer)
            .map(|desc| desc.spec)
            .unwrap_or(self.swapchain_spec)
    }

    fn framebuffer_contexts(&self) -> AHashSet<ContextId> {
        self.framebuffers
            .keys()
            .copied()
            .chain(std::iter::once(FrameBufferId::INVALID))
            .map(ContextId::of_framebuffer)
            .collect()
    }

    fn is_framebuffers_changed(&self) -> bool {
        self.framebuffers_changed
    }

    fn allocate_shader_program(
        &mut self,
        info: &ShaderCreateInfo,
    ) -> Result<ProgramId, ResourceError> {
        self.check_allocation(ResourceKind::ShaderProgram)?;
        info.validate()?;
        let id = ProgramId(self.next_raw_id());
        let spec = self.current_framebuffer_spec();
        self.programs.insert(
            id,
            ProgramEntry {
                name: info.name.clone(),
                spec,
            },
        );
        log::debug!(
            "HeadlessPipeline: compiled program {id:?} for shader '{}' ({spec:?})",
            info.name
        );
        Ok(id)
    }

    fn free_shader_program(&mut self, id: &mut ProgramId) -> bool {
        if self.programs.remove(id).is_none() {
            log::warn!("HeadlessPipeline: refusing to free unknown program {id:?}");
            return false;
        }
        if self.current_shader == *id {
            self.current_shader = ProgramId::INVALID;
        }
        log::debug!("HeadlessPipeline: destroyed program {id:?}");
        *id = ProgramId::INVALID;
        true
    }

    fn use_shader(&mut self, id: ProgramId) -> bool {
        let Some(program) = self.programs.get(&id) else {
            log::error!("HeadlessPipeline: use_shader on unknown program {id:?}");
            return false;
        };
        if self.failing_shaders.contains(&program.name) {
            log::error!("HeadlessPipeline: injected failure for shader '{}'", program.name);
            return false;
        }
        self.shader_changed = self.current_shader != id;
        self.current_shader = id;
        self.staged_textures.clear();
        self.stats.shader_binds += 1;
        self.commands.push(HeadlessCommand::UseShader(id));
        true
    }

    fn unuse_shader(&mut self) {
        self.current_shader = ProgramId::INVALID;
    }

    fn set_current_shader(&mut self, id: ProgramId) {
        self.current_shader = id;
    }

    fn current_shader(&self) -> ProgramId {
        self.current_shader
    }

    fn is_shader_changed(&self) -> bool {
        self.shader_changed
    }

    fn shader_contexts(&self) -> AHashSet<ContextId> {
        self.programs.keys().copied().map(ContextId::of_program).collect()
    }

    fn allocate_descriptor_set(
        &mut self,
        layout: &[DescriptorKind],
    ) -> Result<DescriptorSetId, ResourceError> {
        self.check_allocation(ResourceKind::DescriptorSet)?;
        let program = self.current_shader;
        if !self.programs.contains_key(&program) {
            return Err(ResourceError::NoCurrentShader {
                kind: ResourceKind::DescriptorSet,
            });
        }
        let id = DescriptorSetId(self.next_raw_id());
        self.descriptor_sets
            .insert(id, DescriptorSetEntry { program, writes: 0 });
        log::trace!(
            "HeadlessPipeline: created descriptor set {id:?} ({} bindings) for {program:?}",
            layout.len()
        );
        Ok(id)
    }

    fn free_descriptor_set(&mut self, id: &mut DescriptorSetId) -> bool {
        if self.descriptor_sets.remove(id).is_none() {
            log::warn!("HeadlessPipeline: refusing to free unknown descriptor set {id:?}");
            return false;
        }
        if self.bound_descriptor_set == *id {
            self.bound_descriptor_set = DescriptorSetId::INVALID;
        }
        *id = DescriptorSetId::INVALID;
        true
    }

    fn bind_descriptor_set(&mut self, id: DescriptorSetId) {
        self.bound_descriptor_set = id;
        self.commands.push(HeadlessCommand::BindDescriptorSet(id));
    }

    fn update_descriptor_sets(&mut self) {
        let id = self.bound_descriptor_set;
        match self.descriptor_sets.get_mut(&id) {
            Some(entry) => {
                entry.writes += 1;
                self.stats.descriptor_updates += 1;
                self.commands.push(HeadlessCommand::UpdateDescriptorSet(id));
                log::trace!(
                    "HeadlessPipeline: wrote descriptor set {id:?} of {:?}",
                    entry.program
                );
            }
            None => log::warn!("HeadlessPipeline: update_descriptor_sets without a bound set"),
        }
    }

    fn draw(&mut self, vertex_count: u32) {
        self.stats.draw_calls += 1;
        self.commands.push(HeadlessCommand::Draw {
            program: self.current_shader,
            vertices: vertex_count,
        });
    }

    fn draw_indices(&mut self, index_count: u32) {
        self.stats.indexed_draw_calls += 1;
        self.commands.push(HeadlessCommand::DrawIndices {
            program: self.current_shader,
            indices: index_count,
        });
    }

    fn clear_buffers(&mut self, color: [f32; 4]) {
        self.commands.push(HeadlessCommand::Clear(color));
    }

    fn prepare_frame(&mut self) {
        self.framebuffers_changed = false;
        self.shader_changed = false;
    }

    fn begin_build(&mut self) {}

    fn end_build(&mut self) {}

    fn begin_render(&mut self) {
        self.commands
            .push(HeadlessCommand::BeginRender(self.current_framebuffer));
    }

    fn end_render(&mut self) {
        self.commands.push(HeadlessCommand::EndRender);
    }

    fn submit(&mut self) {
        self.stats.submits += 1;
        self.commands.push(HeadlessCommand::Submit);
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    fn stats(&self) -> PipelineStats {
        self.stats
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_invalidates_and_refuses_double_free() {
        let mut pipeline = HeadlessPipeline::new();
        let mut ubo = pipeline.allocate_ubo(64).unwrap();
        let copy = ubo;

        assert!(pipeline.free_ubo(&mut ubo));
        assert_eq!(ubo, BufferId::INVALID);
        assert!(!pipeline.free_ubo(&mut ubo));

        let mut stale = copy;
        assert!(!pipeline.free_ubo(&mut stale), "Freed ids are never reused");
        assert_eq!(pipeline.live_objects(), 0);
    }

    #[test]
    fn test_free_checks_buffer_kind() {
        let mut pipeline = HeadlessPipeline::new();
        let mut vbo = pipeline.allocate_vbo(&[0; 12]).unwrap();
        assert!(!pipeline.free_ubo(&mut vbo));
        assert!(pipeline.free_vbo(&mut vbo));
    }

    #[test]
    fn test_allocation_failure_injection() {
        let mut pipeline = HeadlessPipeline::new();
        pipeline.set_allocation_failure(ResourceKind::Ubo, true);
        assert!(matches!(
            pipeline.allocate_ubo(16),
            Err(ResourceError::AllocationFailed { kind: ResourceKind::Ubo, .. })
        ));
        assert!(pipeline.allocate_ssbo(16, SsboUsage::ReadOnly).is_ok());

        pipeline.set_allocation_failure(ResourceKind::Ubo, false);
        assert!(pipeline.allocate_ubo(16).is_ok());
    }

    #[test]
    fn test_shader_failure_and_contexts() {
        let mut pipeline = HeadlessPipeline::new();
        let good = pipeline
            .allocate_shader_program(&ShaderCreateInfo::new("good"))
            .unwrap();
        let bad = pipeline
            .allocate_shader_program(&ShaderCreateInfo::new("bad"))
            .unwrap();
        pipeline.set_shader_failure("bad", true);

        assert!(pipeline.use_shader(good));
        assert!(pipeline.is_shader_changed());
        assert!(!pipeline.use_shader(bad));
        assert_eq!(pipeline.current_shader(), good);
        assert!(pipeline.use_shader(good));
        assert!(!pipeline.is_shader_changed());

        let contexts = pipeline.shader_contexts();
        assert!(contexts.contains(&ContextId::of_program(good)));
        assert!(contexts.contains(&ContextId::of_program(bad)));
    }

    #[test]
    fn test_program_records_framebuffer_spec() {
        let mut pipeline = HeadlessPipeline::new();
        let msaa = FramebufferSpec {
            sample_count: 4,
            depth_enabled: true,
        };
        let mut desc = FramebufferDesc::new(64, 64);
        desc.spec = msaa;
        let fb = pipeline.allocate_framebuffer(&desc).unwrap();
        assert!(pipeline.is_framebuffers_changed());

        pipeline.set_current_framebuffer(fb);
        let program = pipeline
            .allocate_shader_program(&ShaderCreateInfo::new("lit"))
            .unwrap();
        assert_eq!(pipeline.program_spec(program), Some(msaa));
        assert_eq!(pipeline.framebuffer_contexts().len(), 2);

        pipeline.prepare_frame();
        assert!(!pipeline.is_framebuffers_changed());
    }

    #[test]
    fn test_ubo_update_writes_bound_buffer() {
        let mut pipeline = HeadlessPipeline::new();
        let ubo = pipeline.allocate_ubo(4).unwrap();
        pipeline.bind_ubo(ubo);
        pipeline.update_ubo(&[1, 2, 3, 4]);

        assert_eq!(pipeline.buffer_data(ubo), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(pipeline.stats().ubo_updates, 1);
    }

    #[test]
    fn test_oversized_ubo_update_is_rejected() {
        let mut pipeline = HeadlessPipeline::new();
        let ubo = pipeline.allocate_ubo(4).unwrap();
        pipeline.bind_ubo(ubo);
        pipeline.update_ubo(&[7; 8]);

        assert_eq!(pipeline.buffer_data(ubo), Some(&[0u8; 4][..]));
        assert_eq!(pipeline.rejected_ubo_updates(), 1);
        assert_eq!(pipeline.stats().ubo_updates, 0);
        assert!(!pipeline
            .commands()
            .iter()
            .any(|c| matches!(c, HeadlessCommand::UpdateUbo { .. })));
    }

    #[test]
    fn test_descriptor_set_requires_current_shader() {
        let mut pipeline = HeadlessPipeline::new();
        assert!(matches!(
            pipeline.allocate_descriptor_set(&[DescriptorKind::UniformBuffer]),
            Err(ResourceError::NoCurrentShader { .. })
        ));

        let program = pipeline
            .allocate_shader_program(&ShaderCreateInfo::new("s"))
            .unwrap();
        pipeline.set_current_shader(program);
        let set = pipeline
            .allocate_descriptor_set(&[DescriptorKind::UniformBuffer])
            .unwrap();
        pipeline.bind_descriptor_set(set);
        pipeline.update_descriptor_sets();
        assert_eq!(pipeline.descriptor_set_writes(set), Some(1));
    }
}
