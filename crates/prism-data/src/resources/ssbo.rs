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

//! Virtual shader storage buffers, one backing per shader program.

use super::virtual_pool::{Backing, VirtualPool};
use prism_core::define_handle;
use prism_core::error::{ResourceError, ResourceKind};
use prism_core::renderer::{BindResult, BufferId, Pipeline, SsboUsage};

define_handle!(
    /// A virtual storage buffer.
    VirtualSsbo
);

/// What a virtual SSBO was allocated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsboDesc {
    /// Size in bytes.
    pub size: usize,
    /// Shader access pattern.
    pub usage: SsboUsage,
}

struct SsboBacking;

impl Backing for SsboBacking {
    type Desc = SsboDesc;
    type Id = BufferId;
    const KIND: ResourceKind = ResourceKind::Ssbo;

    fn release(pipeline: &mut dyn Pipeline, mut id: BufferId) -> bool {
        pipeline.free_ssbo(&mut id)
    }
}

/// Allocates, binds and garbage-collects virtual storage buffers.
///
/// Semantics mirror [`UboManager`](super::UboManager) for non-shared buffers.
#[derive(Debug, Default)]
pub struct SsboManager {
    pool: VirtualPool<SsboBacking>,
}

impl SsboManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a virtual SSBO with a backing for the current shader.
    ///
    /// A live `existing` handle is reallocated in place; on failure it is released.
    pub fn allocate_ssbo(
        &mut self,
        pipeline: &mut dyn Pipeline,
        existing: VirtualSsbo,
        size: usize,
        usage: SsboUsage,
    ) -> Result<VirtualSsbo, ResourceError> {
        let desc = SsboDesc { size, usage };
        let result = pipeline
            .current_shader_context()
            .ok_or(ResourceError::NoCurrentShader {
                kind: ResourceKind::Ssbo,
            })
            .and_then(|context| pipeline.allocate_ssbo(size, usage).map(|id| (context, id)));

        let (context, id) = match result {
            Ok(allocation) => allocation,
            Err(e) => {
                log::error!("SsboManager: failed to allocate SSBO of {size} bytes: {e}");
                if existing.is_valid() {
                    self.pool.release(pipeline, existing.0);
                }
                return Err(e);
            }
        };

        let handle = if existing.is_valid() && self.pool.redescribe(pipeline, existing.0, desc) {
            existing.0
        } else {
            self.pool.create(desc)
        };
        self.pool.insert_backing(handle, context, id);
        Ok(VirtualSsbo(handle))
    }

    /// Binds the backing for the current shader, creating it if needed.
    pub fn bind_ssbo(&mut self, pipeline: &mut dyn Pipeline, handle: VirtualSsbo) -> BindResult {
        self.bind(pipeline, handle, true)
    }

    /// Binds the backing for the current shader only if it already exists.
    pub fn bind_no_duplicate_ssbo(
        &mut self,
        pipeline: &mut dyn Pipeline,
        handle: VirtualSsbo,
    ) -> BindResult {
        self.bind(pipeline, handle, false)
    }

    /// Frees every backing and the slot, then invalidates `handle`.
    pub fn free_ssbo(&mut self, pipeline: &mut dyn Pipeline, handle: &mut VirtualSsbo) -> bool {
        if !handle.is_valid() || self.pool.release(pipeline, handle.0).is_none() {
            log::error!("SsboManager: attempt to free invalid or freed handle {handle:?}");
            return false;
        }
        *handle = VirtualSsbo::INVALID;
        true
    }

    /// Frees the backings whose shader program no longer exists.
    pub fn collect_unused(&mut self, pipeline: &mut dyn Pipeline) -> usize {
        let live = pipeline.shader_contexts();
        self.pool.collect_unused(pipeline, &live, |_| false)
    }

    /// Number of backings of `handle`.
    pub fn backings_of(&self, handle: VirtualSsbo) -> usize {
        self.pool.backings_of(handle.0)
    }

    /// Total number of backings.
    pub fn backing_count(&self) -> usize {
        self.pool.backing_count()
    }

    /// Number of live virtual SSBOs.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Returns `true` if every virtual SSBO was freed.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    fn bind(&mut self, pipeline: &mut dyn Pipeline, handle: VirtualSsbo, duplicate: bool) -> BindResult {
        let Some(desc) = self.pool.describe(handle.0).copied() else {
            log::error!("SsboManager: bind of invalid or freed handle {handle:?}");
            return BindResult::Failed;
        };
        let Some(context) = pipeline.current_shader_context() else {
            log::error!("SsboManager: cannot bind {handle:?} without a current shader");
            return BindResult::Failed;
        };

        if let Some(id) = self.pool.find_backing(handle.0, context) {
            pipeline.bind_ssbo(id);
            return BindResult::Success;
        }
        if !duplicate {
            return BindResult::Failed;
        }

        match pipeline.allocate_ssbo(desc.size, desc.usage) {
            Ok(id) => {
                self.pool.insert_backing(handle.0, context, id);
                pipeline.bind_ssbo(id);
                BindResult::Duplicated
            }
            Err(e) => {
                log::error!("SsboManager: failed to duplicate {handle:?}: {e}");
                BindResult::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::ShaderCreateInfo;
    use prism_infra::HeadlessPipeline;

    #[test]
    fn test_duplicate_per_shader_and_collect() {
        let mut pipeline = HeadlessPipeline::new();
        let a = pipeline
            .allocate_shader_program(&ShaderCreateInfo::new("a"))
            .unwrap();
        let mut b = pipeline
            .allocate_shader_program(&ShaderCreateInfo::new("b"))
            .unwrap();
        let mut manager = SsboManager::new();

        pipeline.set_current_shader(a);
        let ssbo = manager
            .allocate_ssbo(&mut pipeline, VirtualSsbo::INVALID, 256, SsboUsage::ReadWrite)
            .unwrap();
        pipeline.set_current_shader(b);
        assert_eq!(manager.bind_ssbo(&mut pipeline, ssbo), BindResult::Duplicated);
        assert_eq!(manager.bind_ssbo(&mut pipeline, ssbo), BindResult::Success);
        assert_eq!(manager.backings_of(ssbo), 2);

        pipeline.free_shader_program(&mut b);
        assert_eq!(manager.collect_unused(&mut pipeline), 1);
        assert_eq!(manager.backings_of(ssbo), 1);
        assert_eq!(pipeline.live_buffers(ResourceKind::Ssbo), 1);
    }

    #[test]
    fn test_freed_handle_fails_to_bind() {
        let mut pipeline = HeadlessPipeline::new();
        let program = pipeline
            .allocate_shader_program(&ShaderCreateInfo::new("a"))
            .unwrap();
        pipeline.set_current_shader(program);
        let mut manager = SsboManager::new();
        let mut ssbo = manager
            .allocate_ssbo(&mut pipeline, VirtualSsbo::INVALID, 16, SsboUsage::ReadOnly)
            .unwrap();
        let stale = ssbo;

        assert!(manager.free_ssbo(&mut pipeline, &mut ssbo));
        assert!(!ssbo.is_valid());
        assert_eq!(manager.bind_ssbo(&mut pipeline, stale), BindResult::Failed);
        assert!(!manager.free_ssbo(&mut pipeline, &mut ssbo));
    }
}
