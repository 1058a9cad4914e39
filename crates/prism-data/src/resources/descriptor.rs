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

//! Virtual descriptor sets.
//!
//! Descriptor sets are allocated against a program's layout, so a mesh drawn
//! with several programs needs one set per program. Like UBOs, sets are
//! duplicated lazily the first time they are bound under a new program.

use super::virtual_pool::{Backing, VirtualPool};
use prism_core::define_handle;
use prism_core::error::{ResourceError, ResourceKind};
use prism_core::renderer::{BindResult, DescriptorKind, DescriptorSetId, Pipeline};

define_handle!(
    /// A virtual descriptor set.
    VirtualDescriptorSet
);

struct DescriptorBacking;

impl Backing for DescriptorBacking {
    type Desc = Vec<DescriptorKind>;
    type Id = DescriptorSetId;
    const KIND: ResourceKind = ResourceKind::DescriptorSet;

    fn release(pipeline: &mut dyn Pipeline, mut id: DescriptorSetId) -> bool {
        pipeline.free_descriptor_set(&mut id)
    }
}

/// Allocates, binds and garbage-collects virtual descriptor sets.
#[derive(Debug, Default)]
pub struct DescriptorManager {
    pool: VirtualPool<DescriptorBacking>,
}

impl DescriptorManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a descriptor set with `layout` for the current shader.
    ///
    /// Passing a live `existing` handle reallocates it in place: its old sets
    /// (possibly laid out for another shader or material) are freed and the
    /// handle is kept. On failure `existing` is released.
    pub fn allocate_descriptor_set(
        &mut self,
        pipeline: &mut dyn Pipeline,
        existing: VirtualDescriptorSet,
        layout: &[DescriptorKind],
    ) -> Result<VirtualDescriptorSet, ResourceError> {
        let result = pipeline
            .current_shader_context()
            .ok_or(ResourceError::NoCurrentShader {
                kind: ResourceKind::DescriptorSet,
            })
            .and_then(|context| {
                pipeline
                    .allocate_descriptor_set(layout)
                    .map(|id| (context, id))
            });

        let (context, id) = match result {
            Ok(allocation) => allocation,
            Err(e) => {
                log::error!("DescriptorManager: failed to allocate descriptor set: {e}");
                if existing.is_valid() {
                    self.pool.release(pipeline, existing.0);
                }
                return Err(e);
            }
        };

        let handle = if existing.is_valid()
            && self
                .pool
                .redescribe(pipeline, existing.0, layout.to_vec())
        {
            existing.0
        } else {
            self.pool.create(layout.to_vec())
        };
        self.pool.insert_backing(handle, context, id);
        Ok(VirtualDescriptorSet(handle))
    }

    /// Binds the set of the current shader, creating it if needed.
    ///
    /// [`BindResult::Duplicated`] means the set is empty and must be written
    /// (uniform buffer and samplers) before drawing.
    pub fn bind_descriptor_set(
        &mut self,
        pipeline: &mut dyn Pipeline,
        handle: VirtualDescriptorSet,
    ) -> BindResult {
        self.bind(pipeline, handle, true)
    }

    /// Binds the set of the current shader only if it already exists.
    pub fn bind_no_duplicate_descriptor_set(
        &mut self,
        pipeline: &mut dyn Pipeline,
        handle: VirtualDescriptorSet,
    ) -> BindResult {
        self.bind(pipeline, handle, false)
    }

    /// Frees every set and the slot, then invalidates `handle`.
    pub fn free_descriptor_set(
        &mut self,
        pipeline: &mut dyn Pipeline,
        handle: &mut VirtualDescriptorSet,
    ) -> bool {
        if !handle.is_valid() || self.pool.release(pipeline, handle.0).is_none() {
            log::error!("DescriptorManager: attempt to free invalid or freed handle {handle:?}");
            return false;
        }
        *handle = VirtualDescriptorSet::INVALID;
        true
    }

    /// Frees the sets whose shader program no longer exists.
    pub fn collect_unused(&mut self, pipeline: &mut dyn Pipeline) -> usize {
        let live = pipeline.shader_contexts();
        self.pool.collect_unused(pipeline, &live, |_| false)
    }

    /// Number of backings of `handle`.
    pub fn backings_of(&self, handle: VirtualDescriptorSet) -> usize {
        self.pool.backings_of(handle.0)
    }

    /// Total number of backings.
    pub fn backing_count(&self) -> usize {
        self.pool.backing_count()
    }

    /// Number of live virtual descriptor sets.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Returns `true` if every virtual descriptor set was freed.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    fn bind(
        &mut self,
        pipeline: &mut dyn Pipeline,
        handle: VirtualDescriptorSet,
        duplicate: bool,
    ) -> BindResult {
        if !handle.is_valid() {
            return BindResult::Success;
        }
        let Some(layout) = self.pool.describe(handle.0).cloned() else {
            log::error!("DescriptorManager: bind of freed handle {handle:?}");
            return BindResult::Failed;
        };
        let Some(context) = pipeline.current_shader_context() else {
            log::error!("DescriptorManager: cannot bind {handle:?} without a current shader");
            return BindResult::Failed;
        };

        if let Some(id) = self.pool.find_backing(handle.0, context) {
            pipeline.bind_descriptor_set(id);
            return BindResult::Success;
        }
        if !duplicate {
            return BindResult::Failed;
        }

        match pipeline.allocate_descriptor_set(&layout) {
            Ok(id) => {
                self.pool.insert_backing(handle.0, context, id);
                pipeline.bind_descriptor_set(id);
                BindResult::Duplicated
            }
            Err(e) => {
                log::error!("DescriptorManager: failed to duplicate {handle:?}: {e}");
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

    const LAYOUT: [DescriptorKind; 2] = [
        DescriptorKind::UniformBuffer,
        DescriptorKind::CombinedImageSampler,
    ];

    #[test]
    fn test_reallocation_overwrites_in_place() {
        let mut pipeline = HeadlessPipeline::new();
        let a = pipeline
            .allocate_shader_program(&ShaderCreateInfo::new("a"))
            .unwrap();
        let b = pipeline
            .allocate_shader_program(&ShaderCreateInfo::new("b"))
            .unwrap();
        let mut manager = DescriptorManager::new();

        pipeline.set_current_shader(a);
        let set = manager
            .allocate_descriptor_set(&mut pipeline, VirtualDescriptorSet::INVALID, &LAYOUT)
            .unwrap();
        pipeline.set_current_shader(b);
        assert_eq!(
            manager.bind_descriptor_set(&mut pipeline, set),
            BindResult::Duplicated
        );
        assert_eq!(pipeline.live_descriptor_sets(), 2);

        let again = manager
            .allocate_descriptor_set(&mut pipeline, set, &[DescriptorKind::UniformBuffer])
            .unwrap();
        assert_eq!(again, set);
        assert_eq!(manager.backings_of(set), 1);
        assert_eq!(pipeline.live_descriptor_sets(), 1);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_no_duplicate_bind() {
        let mut pipeline = HeadlessPipeline::new();
        let a = pipeline
            .allocate_shader_program(&ShaderCreateInfo::new("a"))
            .unwrap();
        let b = pipeline
            .allocate_shader_program(&ShaderCreateInfo::new("b"))
            .unwrap();
        let mut manager = DescriptorManager::new();

        pipeline.set_current_shader(a);
        let set = manager
            .allocate_descriptor_set(&mut pipeline, VirtualDescriptorSet::INVALID, &LAYOUT)
            .unwrap();
        assert_eq!(
            manager.bind_no_duplicate_descriptor_set(&mut pipeline, set),
            BindResult::Success
        );
        pipeline.set_current_shader(b);
        assert_eq!(
            manager.bind_no_duplicate_descriptor_set(&mut pipeline, set),
            BindResult::Failed
        );
    }
}
