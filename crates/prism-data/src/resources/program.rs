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

//! Virtual shader programs, one compiled program per framebuffer.
//!
//! A compiled program is tied to the render-pass configuration it was built
//! for (sample count, depth attachment). The [`ShaderProgramManager`] keys
//! programs by the current framebuffer and recompiles them transparently when
//! a framebuffer's spec changes under them.

use super::virtual_pool::{Backing, VirtualPool};
use prism_core::define_handle;
use prism_core::error::{ResourceError, ResourceKind};
use prism_core::renderer::{ContextId, FramebufferSpec, Pipeline, ProgramId, ShaderCreateInfo};

define_handle!(
    /// A virtual shader program.
    VirtualProgram
);

/// Outcome of [`ShaderProgramManager::bind_program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramBindResult {
    /// The cached program for the current framebuffer was bound.
    Success,
    /// A program was compiled for a framebuffer it had never been used with.
    Duplicated,
    /// The cached program no longer matched the framebuffer spec and was
    /// recompiled. State tied to the old program (descriptor sets) is stale.
    ReAllocated,
    /// Nothing could be bound.
    Failed,
}

/// A compiled program and the spec it was compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramBacking {
    /// The physical program.
    pub id: ProgramId,
    /// Framebuffer spec at compile time.
    pub spec: FramebufferSpec,
}

impl Backing for ProgramBacking {
    type Desc = ShaderCreateInfo;
    type Id = ProgramBacking;
    const KIND: ResourceKind = ResourceKind::ShaderProgram;

    fn release(pipeline: &mut dyn Pipeline, backing: ProgramBacking) -> bool {
        let mut id = backing.id;
        pipeline.free_shader_program(&mut id)
    }
}

/// Compiles, binds and garbage-collects virtual shader programs.
#[derive(Debug, Default)]
pub struct ShaderProgramManager {
    pool: VirtualPool<ProgramBacking>,
}

impl ShaderProgramManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `info` for the current framebuffer.
    ///
    /// A live `existing` handle is recompiled in place (every cached program
    /// is freed first). On failure `existing` is released.
    pub fn allocate_program(
        &mut self,
        pipeline: &mut dyn Pipeline,
        existing: VirtualProgram,
        info: &ShaderCreateInfo,
    ) -> Result<VirtualProgram, ResourceError> {
        let backing = match Self::compile(pipeline, info) {
            Ok(backing) => backing,
            Err(e) => {
                log::error!("ShaderProgramManager: failed to compile '{}': {e}", info.name);
                if existing.is_valid() {
                    self.pool.release(pipeline, existing.0);
                }
                return Err(e);
            }
        };

        let handle = if existing.is_valid()
            && self.pool.redescribe(pipeline, existing.0, info.clone())
        {
            existing.0
        } else {
            self.pool.create(info.clone())
        };
        self.pool
            .insert_backing(handle, pipeline.current_framebuffer_context(), backing);
        Ok(VirtualProgram(handle))
    }

    /// Binds the program compiled for the current framebuffer.
    ///
    /// Compiles it on first use with this framebuffer and recompiles it when
    /// the framebuffer spec no longer matches.
    pub fn bind_program(
        &mut self,
        pipeline: &mut dyn Pipeline,
        handle: VirtualProgram,
    ) -> ProgramBindResult {
        if !self.pool.contains(handle.0) {
            log::error!("ShaderProgramManager: bind of invalid or freed handle {handle:?}");
            return ProgramBindResult::Failed;
        }

        let context = pipeline.current_framebuffer_context();
        let spec = pipeline.current_framebuffer_spec();

        let result = match self.pool.find_backing(handle.0, context) {
            Some(backing) if backing.spec == spec => ProgramBindResult::Success,
            Some(_) => {
                if let Some(stale) = self.pool.take_backing(handle.0, context) {
                    log::info!(
                        "ShaderProgramManager: framebuffer spec changed, recompiling {handle:?}"
                    );
                    ProgramBacking::release(pipeline, stale);
                }
                if !self.compile_for(pipeline, handle, context) {
                    return ProgramBindResult::Failed;
                }
                ProgramBindResult::ReAllocated
            }
            None => {
                if !self.compile_for(pipeline, handle, context) {
                    return ProgramBindResult::Failed;
                }
                ProgramBindResult::Duplicated
            }
        };

        let Some(backing) = self.pool.find_backing(handle.0, context) else {
            return ProgramBindResult::Failed;
        };
        if !pipeline.use_shader(backing.id) {
            return ProgramBindResult::Failed;
        }
        result
    }

    /// The program compiled for the current framebuffer, if any.
    pub fn program_id(&self, pipeline: &dyn Pipeline, handle: VirtualProgram) -> Option<ProgramId> {
        self.pool
            .find_backing(handle.0, pipeline.current_framebuffer_context())
            .map(|backing| backing.id)
    }

    /// Returns `true` if a program exists for the current framebuffer.
    pub fn has_backing(&self, pipeline: &dyn Pipeline, handle: VirtualProgram) -> bool {
        self.program_id(pipeline, handle).is_some()
    }

    /// Frees every compiled program and the slot, then invalidates `handle`.
    pub fn free_program(&mut self, pipeline: &mut dyn Pipeline, handle: &mut VirtualProgram) -> bool {
        if !handle.is_valid() || self.pool.release(pipeline, handle.0).is_none() {
            log::error!("ShaderProgramManager: attempt to free invalid or freed handle {handle:?}");
            return false;
        }
        *handle = VirtualProgram::INVALID;
        true
    }

    /// Frees the programs whose framebuffer no longer exists.
    pub fn collect_unused(&mut self, pipeline: &mut dyn Pipeline) -> usize {
        let live = pipeline.framebuffer_contexts();
        self.pool.collect_unused(pipeline, &live, |_| false)
    }

    /// Number of compiled programs of `handle`.
    pub fn backings_of(&self, handle: VirtualProgram) -> usize {
        self.pool.backings_of(handle.0)
    }

    /// Total number of compiled programs.
    pub fn backing_count(&self) -> usize {
        self.pool.backing_count()
    }

    /// Number of live virtual programs.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Returns `true` if every virtual program was freed.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    fn compile(
        pipeline: &mut dyn Pipeline,
        info: &ShaderCreateInfo,
    ) -> Result<ProgramBacking, ResourceError> {
        let spec = pipeline.current_framebuffer_spec();
        let id = pipeline.allocate_shader_program(info)?;
        Ok(ProgramBacking { id, spec })
    }

    fn compile_for(
        &mut self,
        pipeline: &mut dyn Pipeline,
        handle: VirtualProgram,
        context: ContextId,
    ) -> bool {
        let Some(info) = self.pool.describe(handle.0) else {
            return false;
        };
        match Self::compile(pipeline, info) {
            Ok(backing) => self.pool.insert_backing(handle.0, context, backing),
            Err(e) => {
                log::error!(
                    "ShaderProgramManager: failed to compile '{}' for {context:?}: {e}",
                    info.name
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::FramebufferDesc;
    use prism_infra::HeadlessPipeline;

    #[test]
    fn test_program_per_framebuffer() {
        let mut pipeline = HeadlessPipeline::new();
        let mut manager = ShaderProgramManager::new();
        let program = manager
            .allocate_program(&mut pipeline, VirtualProgram::INVALID, &ShaderCreateInfo::new("lit"))
            .unwrap();
        assert_eq!(
            manager.bind_program(&mut pipeline, program),
            ProgramBindResult::Success
        );

        let fb = pipeline
            .allocate_framebuffer(&FramebufferDesc::new(32, 32))
            .unwrap();
        pipeline.set_current_framebuffer(fb);
        assert_eq!(
            manager.bind_program(&mut pipeline, program),
            ProgramBindResult::Duplicated
        );
        assert_eq!(
            manager.bind_program(&mut pipeline, program),
            ProgramBindResult::Success
        );
        assert_eq!(manager.backings_of(program), 2);
    }

    #[test]
    fn test_spec_mismatch_reallocates() {
        let mut pipeline = HeadlessPipeline::new();
        let mut manager = ShaderProgramManager::new();
        let program = manager
            .allocate_program(&mut pipeline, VirtualProgram::INVALID, &ShaderCreateInfo::new("lit"))
            .unwrap();
        let before = manager.program_id(&pipeline, program).unwrap();

        pipeline.set_swapchain_spec(FramebufferSpec {
            sample_count: 4,
            depth_enabled: true,
        });
        assert_eq!(
            manager.bind_program(&mut pipeline, program),
            ProgramBindResult::ReAllocated
        );
        let after = manager.program_id(&pipeline, program).unwrap();
        assert_ne!(before, after);
        assert_eq!(pipeline.live_programs(), 1);
        assert_eq!(pipeline.current_shader(), after);
    }

    #[test]
    fn test_collect_programs_of_destroyed_framebuffer() {
        let mut pipeline = HeadlessPipeline::new();
        let mut manager = ShaderProgramManager::new();
        let program = manager
            .allocate_program(&mut pipeline, VirtualProgram::INVALID, &ShaderCreateInfo::new("lit"))
            .unwrap();
        let mut fb = pipeline
            .allocate_framebuffer(&FramebufferDesc::new(32, 32))
            .unwrap();
        pipeline.set_current_framebuffer(fb);
        manager.bind_program(&mut pipeline, program);
        pipeline.set_current_framebuffer(prism_core::renderer::FrameBufferId::INVALID);

        pipeline.free_framebuffer(&mut fb);
        assert_eq!(manager.collect_unused(&mut pipeline), 1);
        assert_eq!(manager.backings_of(program), 1, "Swapchain program must survive");
        assert!(manager.has_backing(&pipeline, program));
    }

    #[test]
    fn test_failing_use_reports_failed() {
        let mut pipeline = HeadlessPipeline::new();
        let mut manager = ShaderProgramManager::new();
        let program = manager
            .allocate_program(&mut pipeline, VirtualProgram::INVALID, &ShaderCreateInfo::new("bad"))
            .unwrap();
        pipeline.set_shader_failure("bad", true);
        assert_eq!(
            manager.bind_program(&mut pipeline, program),
            ProgramBindResult::Failed
        );
    }
}
