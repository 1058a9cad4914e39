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

//! Virtual uniform buffers.
//!
//! A mesh drawn with several shader programs (one per pass, or one per
//! framebuffer configuration) needs a separate uniform buffer for each of
//! them. The [`UboManager`] hides this: owners keep one [`VirtualUbo`] and the
//! manager binds (and lazily creates) the backing of the current shader.
//! Shared UBOs are the exception: they have exactly one backing, valid for
//! every shader, and are used for per-frame globals.

use super::virtual_pool::{Backing, VirtualPool};
use prism_core::define_handle;
use prism_core::error::{ResourceError, ResourceKind};
use prism_core::renderer::{BindResult, BufferId, ContextId, Pipeline};

define_handle!(
    /// A virtual uniform buffer.
    VirtualUbo
);

/// What a virtual UBO was allocated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UboDesc {
    /// Size in bytes.
    pub size: usize,
    /// One backing for every context.
    pub shared: bool,
}

/// A physical uniform buffer and the size it was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UboBuffer {
    id: BufferId,
    size: usize,
}

struct UboBacking;

impl Backing for UboBacking {
    type Desc = UboDesc;
    type Id = UboBuffer;
    const KIND: ResourceKind = ResourceKind::Ubo;

    fn release(pipeline: &mut dyn Pipeline, buffer: UboBuffer) -> bool {
        let mut id = buffer.id;
        pipeline.free_ubo(&mut id)
    }
}

/// Allocates, binds and garbage-collects virtual uniform buffers.
#[derive(Debug, Default)]
pub struct UboManager {
    pool: VirtualPool<UboBacking>,
}

impl UboManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a virtual UBO and its first backing.
    ///
    /// The backing is tagged with the current shader context, or with
    /// [`ContextId::SHARED`] for shared UBOs. Non-shared allocation therefore
    /// requires a current shader.
    ///
    /// If `existing` is a live handle it is reallocated in place: all of its
    /// backings are freed first and the same handle is returned. If the
    /// allocation fails, `existing` is released as well and must not be used
    /// again.
    ///
    /// # Arguments
    ///
    /// * `pipeline` - The backend.
    /// * `existing` - A handle to reuse, or [`VirtualUbo::INVALID`].
    /// * `size` - Block size in bytes.
    /// * `shared` - Whether one backing serves every shader.
    pub fn allocate_ubo(
        &mut self,
        pipeline: &mut dyn Pipeline,
        existing: VirtualUbo,
        size: usize,
        shared: bool,
    ) -> Result<VirtualUbo, ResourceError> {
        let desc = UboDesc { size, shared };
        let result = Self::context_for(pipeline, shared)
            .and_then(|context| pipeline.allocate_ubo(size).map(|id| (context, id)));

        let (context, id) = match result {
            Ok(allocation) => allocation,
            Err(e) => {
                log::error!("UboManager: failed to allocate UBO of {size} bytes: {e}");
                if existing.is_valid() {
                    self.pool.release(pipeline, existing.0);
                }
                return Err(e);
            }
        };

        let handle = if existing.is_valid() && self.pool.redescribe(pipeline, existing.0, desc) {
            existing.0
        } else {
            if existing.is_valid() {
                log::warn!("UboManager: reallocating dead handle {existing:?}, issuing a new one");
            }
            self.pool.create(desc)
        };
        self.pool.insert_backing(handle, context, UboBuffer { id, size });
        Ok(VirtualUbo(handle))
    }

    /// Binds the backing of `handle` for the current shader.
    ///
    /// `size` is the block size of the current shader. Non-shared handles
    /// without a backing for the current shader get one of that size on the
    /// spot, and a backing too small for `size` is replaced. Both cases return
    /// [`BindResult::Duplicated`]: the new buffer holds garbage until the
    /// caller flushes its uniforms. A `size` of zero unbinds and succeeds, as
    /// does binding [`VirtualUbo::INVALID`] for an empty block.
    pub fn bind_ubo(
        &mut self,
        pipeline: &mut dyn Pipeline,
        handle: VirtualUbo,
        size: usize,
    ) -> BindResult {
        self.bind(pipeline, handle, size, true)
    }

    /// Binds the backing of `handle` for the current shader, never allocating.
    ///
    /// Returns [`BindResult::Failed`] if no backing of at least `size` bytes
    /// exists yet.
    pub fn bind_no_duplicate_ubo(
        &mut self,
        pipeline: &mut dyn Pipeline,
        handle: VirtualUbo,
        size: usize,
    ) -> BindResult {
        self.bind(pipeline, handle, size, false)
    }

    /// Frees every backing of `handle` and its slot, then invalidates it.
    pub fn free_ubo(&mut self, pipeline: &mut dyn Pipeline, handle: &mut VirtualUbo) -> bool {
        if !handle.is_valid() {
            log::error!("UboManager: attempt to free an invalid UBO handle");
            return false;
        }
        if self.pool.release(pipeline, handle.0).is_none() {
            log::error!("UboManager: double free of {handle:?}");
            return false;
        }
        *handle = VirtualUbo::INVALID;
        true
    }

    /// Frees the backings whose shader program no longer exists.
    ///
    /// Shared UBOs are never collected.
    pub fn collect_unused(&mut self, pipeline: &mut dyn Pipeline) -> usize {
        let live = pipeline.shader_contexts();
        let freed = self.pool.collect_unused(pipeline, &live, |desc| desc.shared);
        if freed > 0 {
            log::debug!("UboManager: collected {freed} unused backings");
        }
        freed
    }

    /// The descriptor of a live handle.
    pub fn describe(&self, handle: VirtualUbo) -> Option<UboDesc> {
        self.pool.describe(handle.0).copied()
    }

    /// The physical buffer bound for `context`, if any.
    pub fn backing(&self, handle: VirtualUbo, context: ContextId) -> Option<BufferId> {
        self.find(handle, context).map(|buffer| buffer.id)
    }

    /// Size in bytes of the buffer bound for `context`, if any.
    pub fn backing_size(&self, handle: VirtualUbo, context: ContextId) -> Option<usize> {
        self.find(handle, context).map(|buffer| buffer.size)
    }

    /// Number of backings of `handle`.
    pub fn backings_of(&self, handle: VirtualUbo) -> usize {
        self.pool.backings_of(handle.0)
    }

    /// Total number of backings.
    pub fn backing_count(&self) -> usize {
        self.pool.backing_count()
    }

    /// Number of live virtual UBOs.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Returns `true` if every virtual UBO was freed.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    fn context_for(pipeline: &dyn Pipeline, shared: bool) -> Result<ContextId, ResourceError> {
        if shared {
            return Ok(ContextId::SHARED);
        }
        pipeline
            .current_shader_context()
            .ok_or(ResourceError::NoCurrentShader {
                kind: ResourceKind::Ubo,
            })
    }

    fn find(&self, handle: VirtualUbo, context: ContextId) -> Option<UboBuffer> {
        let desc = self.pool.describe(handle.0)?;
        let context = if desc.shared { ContextId::SHARED } else { context };
        self.pool.find_backing(handle.0, context)
    }

    fn bind(
        &mut self,
        pipeline: &mut dyn Pipeline,
        handle: VirtualUbo,
        size: usize,
        duplicate: bool,
    ) -> BindResult {
        if size == 0 {
            pipeline.bind_ubo(BufferId::INVALID);
            return BindResult::Success;
        }
        if !handle.is_valid() {
            log::error!("UboManager: no UBO to hold a {size} byte block");
            pipeline.bind_ubo(BufferId::INVALID);
            return BindResult::Failed;
        }

        let Some(desc) = self.pool.describe(handle.0).copied() else {
            log::error!("UboManager: bind of dead handle {handle:?}");
            return BindResult::Failed;
        };

        let context = match Self::context_for(pipeline, desc.shared) {
            Ok(context) => context,
            Err(e) => {
                log::error!("UboManager: cannot bind {handle:?}: {e}");
                return BindResult::Failed;
            }
        };

        match self.pool.find_backing(handle.0, context) {
            Some(buffer) if buffer.size >= size => {
                pipeline.bind_ubo(buffer.id);
                return BindResult::Success;
            }
            Some(buffer) => {
                if !duplicate || desc.shared {
                    log::error!(
                        "UboManager: {handle:?} holds {} bytes for {context:?}, {size} needed",
                        buffer.size
                    );
                    return BindResult::Failed;
                }
                if let Some(stale) = self.pool.take_backing(handle.0, context) {
                    UboBacking::release(pipeline, stale);
                }
                log::debug!("UboManager: growing {handle:?} to {size} bytes for {context:?}");
            }
            None if !duplicate || desc.shared => return BindResult::Failed,
            None => {}
        }

        match pipeline.allocate_ubo(size) {
            Ok(id) => {
                self.pool.insert_backing(handle.0, context, UboBuffer { id, size });
                pipeline.bind_ubo(id);
                log::trace!("UboManager: duplicated {handle:?} for {context:?}");
                BindResult::Duplicated
            }
            Err(e) => {
                log::error!("UboManager: failed to duplicate {handle:?} for {context:?}: {e}");
                BindResult::Failed
            }
        }
    }
}
