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

//! The storage engine shared by every virtual resource manager.
//!
//! A virtual resource is a pool slot holding a descriptor (what to allocate)
//! and a map of backings (what was allocated, per context). The slot index is
//! what owners keep; backings come and go as the resource is used from new
//! shader programs or framebuffers and as those contexts disappear.

use ahash::{AHashMap, AHashSet};
use prism_core::error::ResourceKind;
use prism_core::pool::{Pool, PoolHandle};
use prism_core::renderer::{ContextId, Pipeline};
use std::fmt;

/// Describes how a kind of physical object is released.
pub trait Backing {
    /// What the owner asked for (size, layout, create info).
    type Desc: fmt::Debug;
    /// The physical object.
    type Id: Copy + fmt::Debug;

    /// Kind reported in logs and errors.
    const KIND: ResourceKind;

    /// Frees one physical object. Returns `false` if the pipeline refused.
    fn release(pipeline: &mut dyn Pipeline, id: Self::Id) -> bool;
}

struct VirtualSlot<B: Backing> {
    desc: B::Desc,
    backings: AHashMap<ContextId, B::Id>,
}

/// A pool of virtual resources, each with at most one backing per context.
pub struct VirtualPool<B: Backing> {
    slots: Pool<VirtualSlot<B>>,
    backing_count: usize,
}

impl<B: Backing> VirtualPool<B> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            slots: Pool::new(),
            backing_count: 0,
        }
    }

    /// Creates a virtual resource without any backing.
    pub fn create(&mut self, desc: B::Desc) -> PoolHandle {
        self.slots.insert(VirtualSlot {
            desc,
            backings: AHashMap::new(),
        })
    }

    /// Returns `true` if `handle` addresses a live virtual resource.
    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.slots.contains(handle)
    }

    /// The descriptor of a live virtual resource.
    pub fn describe(&self, handle: PoolHandle) -> Option<&B::Desc> {
        self.slots.get(handle).map(|slot| &slot.desc)
    }

    /// Replaces the descriptor of a live virtual resource, freeing every backing first.
    pub fn redescribe(
        &mut self,
        pipeline: &mut dyn Pipeline,
        handle: PoolHandle,
        desc: B::Desc,
    ) -> bool {
        if self.free_backings(pipeline, handle).is_none() {
            return false;
        }
        match self.slots.get_mut(handle) {
            Some(slot) => {
                slot.desc = desc;
                true
            }
            None => false,
        }
    }

    /// The backing of `handle` for `context`, if one exists.
    pub fn find_backing(&self, handle: PoolHandle, context: ContextId) -> Option<B::Id> {
        self.slots
            .get(handle)
            .and_then(|slot| slot.backings.get(&context).copied())
    }

    /// Records a new backing.
    ///
    /// Refuses (and returns `false`) if `context` already has a backing, so a
    /// handle never holds two physical objects for the same context.
    pub fn insert_backing(&mut self, handle: PoolHandle, context: ContextId, id: B::Id) -> bool {
        let Some(slot) = self.slots.get_mut(handle) else {
            return false;
        };
        if slot.backings.contains_key(&context) {
            log::error!(
                "VirtualPool: {} {handle:?} already has a backing for {context:?}",
                B::KIND
            );
            return false;
        }
        slot.backings.insert(context, id);
        self.backing_count += 1;
        true
    }

    /// Removes the backing of `handle` for `context` without freeing it.
    pub fn take_backing(&mut self, handle: PoolHandle, context: ContextId) -> Option<B::Id> {
        let id = self.slots.get_mut(handle)?.backings.remove(&context)?;
        self.backing_count -= 1;
        Some(id)
    }

    /// Number of backings of one virtual resource.
    pub fn backings_of(&self, handle: PoolHandle) -> usize {
        self.slots
            .get(handle)
            .map_or(0, |slot| slot.backings.len())
    }

    /// Frees every backing of `handle` and keeps the slot.
    ///
    /// Returns the number of freed backings, or `None` for a dead handle.
    pub fn free_backings(&mut self, pipeline: &mut dyn Pipeline, handle: PoolHandle) -> Option<usize> {
        let slot = self.slots.get_mut(handle)?;
        let freed = slot.backings.len();
        for (_, id) in slot.backings.drain() {
            if !B::release(pipeline, id) {
                log::error!("VirtualPool: pipeline refused to free {} {id:?}", B::KIND);
            }
        }
        self.backing_count -= freed;
        Some(freed)
    }

    /// Frees every backing of `handle` and its slot.
    pub fn release(&mut self, pipeline: &mut dyn Pipeline, handle: PoolHandle) -> Option<B::Desc> {
        self.free_backings(pipeline, handle)?;
        self.slots.remove(handle).map(|slot| slot.desc)
    }

    /// Frees every backing whose context is not in `live`.
    ///
    /// Resources for which `exempt` returns `true` are left untouched. Returns
    /// the number of freed backings.
    pub fn collect_unused(
        &mut self,
        pipeline: &mut dyn Pipeline,
        live: &AHashSet<ContextId>,
        exempt: impl Fn(&B::Desc) -> bool,
    ) -> usize {
        let mut freed = 0;
        for (handle, slot) in self.slots.iter_mut() {
            if exempt(&slot.desc) {
                continue;
            }
            slot.backings.retain(|context, id| {
                if live.contains(context) {
                    return true;
                }
                log::debug!(
                    "VirtualPool: collecting {} {id:?} of {handle:?} (dead context {context:?})",
                    B::KIND
                );
                if !B::release(pipeline, *id) {
                    log::error!("VirtualPool: pipeline refused to free {} {id:?}", B::KIND);
                }
                freed += 1;
                false
            });
        }
        self.backing_count -= freed;
        freed
    }

    /// Total number of backings across all virtual resources.
    pub fn backing_count(&self) -> usize {
        self.backing_count
    }

    /// Number of live virtual resources.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no virtual resource is alive.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<B: Backing> Default for VirtualPool<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backing> fmt::Debug for VirtualPool<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualPool")
            .field("kind", &B::KIND)
            .field("len", &self.slots.len())
            .field("backings", &self.backing_count)
            .finish()
    }
}
