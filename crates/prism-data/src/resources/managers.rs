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

use super::{DescriptorManager, GeometryCache, ShaderProgramManager, SsboManager, UboManager};
use prism_core::renderer::Pipeline;

/// Every resource manager of one render context.
///
/// Built once by the context and handed by reference to whatever needs to
/// allocate or bind GPU resources.
#[derive(Debug, Default)]
pub struct ResourceManagers {
    /// Virtual uniform buffers.
    pub ubo: UboManager,
    /// Virtual storage buffers.
    pub ssbo: SsboManager,
    /// Virtual descriptor sets.
    pub descriptors: DescriptorManager,
    /// Virtual shader programs.
    pub programs: ShaderProgramManager,
    /// Shared geometry buffers.
    pub geometry: GeometryCache,
    collect_requested: bool,
}

impl ResourceManagers {
    /// Creates empty managers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks for a garbage collection pass at the next frame preparation.
    pub fn request_collect(&mut self) {
        self.collect_requested = true;
    }

    /// Returns and clears the pending collection request.
    pub fn take_collect_request(&mut self) -> bool {
        std::mem::take(&mut self.collect_requested)
    }

    /// Frees every backing whose shader or framebuffer no longer exists.
    ///
    /// Programs are collected first, so the per-shader resources of programs
    /// that died with their framebuffer are collected in the same pass.
    pub fn collect_unused(&mut self, pipeline: &mut dyn Pipeline) -> usize {
        let programs = self.programs.collect_unused(pipeline);
        let ubo = self.ubo.collect_unused(pipeline);
        let ssbo = self.ssbo.collect_unused(pipeline);
        let descriptors = self.descriptors.collect_unused(pipeline);
        let total = programs + ubo + ssbo + descriptors;
        if total > 0 {
            log::info!(
                "ResourceManagers: collected {total} backings ({programs} programs, {ubo} UBOs, {ssbo} SSBOs, {descriptors} descriptor sets)"
            );
        }
        total
    }

    /// Number of virtual resources and geometries still alive.
    pub fn live_count(&self) -> usize {
        self.ubo.len()
            + self.ssbo.len()
            + self.descriptors.len()
            + self.programs.len()
            + self.geometry.len()
    }

    /// Returns `true` if every resource has been freed.
    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }
}
