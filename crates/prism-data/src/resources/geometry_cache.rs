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

//! Reference-counted GPU copies of shared geometry.

use crate::mesh::{Geometry, GeometryId};
use ahash::AHashMap;
use prism_core::error::ResourceError;
use prism_core::renderer::{BufferId, Pipeline};

/// The GPU side of an uploaded [`Geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryBuffers {
    /// Vertex buffer.
    pub vbo: BufferId,
    /// Index buffer, [`BufferId::INVALID`] for non-indexed geometry.
    pub ibo: BufferId,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Number of indices.
    pub index_count: u32,
}

#[derive(Debug)]
struct CacheEntry {
    buffers: GeometryBuffers,
    refs: u32,
}

/// Uploads each geometry once and shares its buffers between every mesh using it.
#[derive(Debug, Default)]
pub struct GeometryCache {
    entries: AHashMap<GeometryId, CacheEntry>,
}

impl GeometryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the buffers of `geometry`, uploading them on first use.
    ///
    /// Every successful call must be paired with a [`release`](Self::release).
    pub fn acquire(
        &mut self,
        pipeline: &mut dyn Pipeline,
        geometry: &Geometry,
    ) -> Result<GeometryBuffers, ResourceError> {
        if let Some(entry) = self.entries.get_mut(&geometry.id()) {
            entry.refs += 1;
            return Ok(entry.buffers);
        }

        let mut vbo = pipeline.allocate_vbo(geometry.vertex_bytes())?;
        let ibo = if geometry.is_indexed() {
            match pipeline.allocate_ibo(geometry.indices()) {
                Ok(ibo) => ibo,
                Err(e) => {
                    pipeline.free_vbo(&mut vbo);
                    return Err(e);
                }
            }
        } else {
            BufferId::INVALID
        };

        let buffers = GeometryBuffers {
            vbo,
            ibo,
            vertex_count: geometry.vertex_count(),
            index_count: geometry.indices().len() as u32,
        };
        log::debug!(
            "GeometryCache: uploaded {:?} ({} vertices, {} indices)",
            geometry.id(),
            buffers.vertex_count,
            buffers.index_count
        );
        self.entries
            .insert(geometry.id(), CacheEntry { buffers, refs: 1 });
        Ok(buffers)
    }

    /// Drops one reference and frees the buffers with the last one.
    pub fn release(&mut self, pipeline: &mut dyn Pipeline, id: GeometryId) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            log::error!("GeometryCache: release of unknown geometry {id:?}");
            return false;
        };
        entry.refs -= 1;
        if entry.refs > 0 {
            return true;
        }

        if let Some(entry) = self.entries.remove(&id) {
            let GeometryBuffers { mut vbo, mut ibo, .. } = entry.buffers;
            pipeline.free_vbo(&mut vbo);
            if ibo.is_valid() {
                pipeline.free_ibo(&mut ibo);
            }
            log::debug!("GeometryCache: freed {id:?}");
        }
        true
    }

    /// The buffers of an uploaded geometry.
    pub fn get(&self, id: GeometryId) -> Option<GeometryBuffers> {
        self.entries.get(&id).map(|entry| entry.buffers)
    }

    /// Number of references held on `id`.
    pub fn ref_count(&self, id: GeometryId) -> u32 {
        self.entries.get(&id).map_or(0, |entry| entry.refs)
    }

    /// Number of uploaded geometries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is uploaded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
