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

//! One layer bucket of a render queue.

use crate::diagnostics::QueueDiagnostics;
use crate::drawer::MeshDrawer;
use crate::error::DrawError;
use crate::registration::ShaderUseInfo;
use ahash::AHashSet;
use prism_core::renderer::BindResult;
use prism_core::telemetry::QueueStats;
use prism_core::{PoolHandle, QueueOrdering};
use prism_data::{GeometryId, GpuContext, MeshHandle, MeshPool, ShaderHandle};
use std::ops::Range;

/// Outcome of the last render of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueState {
    /// Not drawn yet, or inactive.
    #[default]
    Pending,
    /// Drawn.
    Ok,
    /// Skipped with its whole shader run.
    ShaderError,
    /// Skipped with its whole VBO run.
    VboError,
    /// The mesh itself failed.
    MeshError,
}

/// A mesh as seen by one queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshInfo {
    /// The mesh.
    pub mesh: MeshHandle,
    /// Shader resolved by the pass.
    pub shader: ShaderUseInfo,
    /// Shared geometry, the VBO grouping key.
    pub geometry: Option<GeometryId>,
    /// Sort priority.
    pub priority: i32,
    /// Registration slot in the strategy.
    pub slot: PoolHandle,
    /// Result of the last render.
    pub state: QueueState,
}

impl MeshInfo {
    fn key(&self) -> (ShaderHandle, Option<GeometryId>) {
        (self.shader.shader, self.geometry)
    }
}

/// The replayable draw list of one layer.
///
/// Entries sharing a shader form contiguous runs, and inside a shader run
/// entries sharing geometry form contiguous VBO runs. Replay binds each
/// shader and VBO once per run. A run whose shader or VBO cannot be bound is
/// skipped as a whole: every entry of the run would fail the same way.
#[derive(Debug)]
pub struct MeshRenderQueue {
    entries: Vec<MeshInfo>,
    ordering: QueueOrdering,
    rendered: bool,
}

impl MeshRenderQueue {
    /// Creates an empty bucket.
    pub fn new(ordering: QueueOrdering) -> Self {
        Self {
            entries: Vec::new(),
            ordering,
            rendered: false,
        }
    }

    /// Adds an entry and returns its position.
    ///
    /// In [`QueueOrdering::Sorted`] mode the entry goes after the last entry
    /// with the same shader and geometry, so runs stay contiguous and equal
    /// keys keep their registration order.
    pub fn register(&mut self, info: MeshInfo) -> usize {
        let at = match self.ordering {
            QueueOrdering::Sorted => {
                let key = info.key();
                self.entries.partition_point(|entry| entry.key() <= key)
            }
            QueueOrdering::Insertion => self.entries.len(),
        };
        self.entries.insert(at, info);
        at
    }

    /// Removes the entry registered under `slot`.
    pub fn unregister(&mut self, slot: PoolHandle) -> Option<MeshInfo> {
        let position = self.entries.iter().position(|entry| entry.slot == slot)?;
        Some(self.entries.remove(position))
    }

    /// Returns `true` if an entry is registered under `slot`.
    pub fn contains(&self, slot: PoolHandle) -> bool {
        self.entries.iter().any(|entry| entry.slot == slot)
    }

    /// Entries in replay order.
    pub fn entries(&self) -> &[MeshInfo] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the bucket has no entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the last render drew at least one mesh.
    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    /// Index of the first entry after `from` using another shader.
    pub fn find_next_shader(&self, from: usize) -> usize {
        let Some(current) = self.entries.get(from) else {
            return self.entries.len();
        };
        let shader = current.shader.shader;
        (from + 1..self.entries.len())
            .find(|&i| self.entries[i].shader.shader != shader)
            .unwrap_or(self.entries.len())
    }

    /// Index of the first entry after `from`, before `end`, using other geometry.
    pub fn find_next_vbo(&self, from: usize, end: usize) -> usize {
        let end = end.min(self.entries.len());
        let Some(current) = self.entries.get(from) else {
            return end;
        };
        let geometry = current.geometry;
        (from + 1..end)
            .find(|&i| self.entries[i].geometry != geometry)
            .unwrap_or(end)
    }

    /// Draws every entry.
    pub fn render(
        &mut self,
        gpu: &mut GpuContext<'_>,
        drawer: &dyn MeshDrawer,
        meshes: &mut MeshPool,
        diagnostics: &mut QueueDiagnostics,
    ) -> QueueStats {
        let mut stats = QueueStats::default();
        self.rendered = false;

        let mut i = 0;
        while i < self.entries.len() {
            let shader_end = self.find_next_shader(i);
            let handle = self.entries[i].shader.shader;

            let Some(shader) = gpu.shaders.get_mut(handle) else {
                diagnostics.report(&DrawError::MissingShader(handle), None);
                self.skip_run(i..shader_end, QueueState::ShaderError, diagnostics);
                stats.skipped_shader_runs += 1;
                i = shader_end;
                continue;
            };

            if !shader.use_shader(&mut *gpu.pipeline, gpu.resources).is_ok() {
                let error = DrawError::ShaderUnavailable {
                    name: shader.name().to_string(),
                };
                diagnostics.report(&error, None);
                self.skip_run(i..shader_end, QueueState::ShaderError, diagnostics);
                stats.skipped_shader_runs += 1;
                i = shader_end;
                continue;
            }
            stats.shader_binds += 1;
            drawer.use_constants(shader);
            drawer.use_samplers(shader);

            let mut j = i;
            while j < shader_end {
                let vbo_end = self.find_next_vbo(j, shader_end);
                let mut bound = false;

                for k in j..vbo_end {
                    let mesh_handle = self.entries[k].mesh;
                    let Some(mesh) = meshes.get_mut(mesh_handle) else {
                        diagnostics.report(&DrawError::MissingMesh(mesh_handle), None);
                        self.entries[k].state = QueueState::MeshError;
                        stats.failed_meshes += 1;
                        continue;
                    };
                    if !mesh.is_mesh_active() {
                        self.entries[k].state = QueueState::Pending;
                        continue;
                    }

                    if !bound {
                        if !mesh.bind_mesh(&mut *gpu.pipeline, gpu.resources) {
                            let error = DrawError::GeometryUnavailable {
                                mesh: mesh.name().to_string(),
                            };
                            diagnostics.report(&error, Some(mesh_handle));
                            self.skip_run(k..vbo_end, QueueState::VboError, diagnostics);
                            stats.skipped_vbo_runs += 1;
                            break;
                        }
                        bound = true;
                        stats.vbo_binds += 1;
                    } else if !mesh.upload(&mut *gpu.pipeline, gpu.resources) {
                        let error = DrawError::GeometryUnavailable {
                            mesh: mesh.name().to_string(),
                        };
                        diagnostics.report(&error, Some(mesh_handle));
                        self.entries[k].state = QueueState::MeshError;
                        stats.failed_meshes += 1;
                        continue;
                    }

                    if mesh.draw(&mut *gpu.pipeline, gpu.resources, shader, gpu.default_texture) {
                        self.entries[k].state = QueueState::Ok;
                        stats.drawn += 1;
                        self.rendered = true;
                    } else {
                        let error = DrawError::DrawFailed {
                            mesh: mesh.name().to_string(),
                            shader: shader.name().to_string(),
                        };
                        diagnostics.report(&error, Some(mesh_handle));
                        self.entries[k].state = QueueState::MeshError;
                        stats.failed_meshes += 1;
                    }
                }
                j = vbo_end;
            }
            i = shader_end;
        }

        gpu.pipeline.unuse_shader();
        stats
    }

    /// Uploads the uniforms of every entry drawn by the last render.
    ///
    /// The shared block of a shader is written unless `shared_done` already
    /// holds it, then each mesh's own block is filled and flushed into the
    /// mesh's existing UBO. Meshes whose UBO cannot hold the shader's block
    /// are skipped.
    pub fn update(
        &mut self,
        gpu: &mut GpuContext<'_>,
        drawer: &dyn MeshDrawer,
        meshes: &MeshPool,
        shared_done: &mut AHashSet<ShaderHandle>,
    ) {
        if !self.rendered {
            return;
        }

        let mut i = 0;
        while i < self.entries.len() {
            let shader_end = self.find_next_shader(i);
            let run = &self.entries[i..shader_end];
            if !run.iter().any(|entry| entry.state == QueueState::Ok) {
                i = shader_end;
                continue;
            }

            let handle = self.entries[i].shader.shader;
            let Some(shader) = gpu.shaders.get_mut(handle) else {
                i = shader_end;
                continue;
            };
            if !shader.set_current(&mut *gpu.pipeline, gpu.resources) {
                i = shader_end;
                continue;
            }

            if shared_done.insert(handle) {
                shader.begin_shared_ubo();
                drawer.use_shared_uniforms(shader);
                if !shader.end_shared_ubo(&mut *gpu.pipeline, gpu.resources) {
                    log::warn!("MeshRenderQueue: shared uniforms of '{}' were not uploaded", shader.name());
                }
            }

            for entry in &self.entries[i..shader_end] {
                if entry.state != QueueState::Ok {
                    continue;
                }
                let Some(mesh) = meshes.get(entry.mesh) else {
                    continue;
                };
                drawer.use_uniforms(shader, mesh);
                match mesh.bind_uniforms(&mut *gpu.pipeline, gpu.resources, shader) {
                    BindResult::Success => shader.flush(&mut *gpu.pipeline),
                    _ => log::warn!(
                        "MeshRenderQueue: '{}' has no UBO for shader '{}'",
                        mesh.name(),
                        shader.name()
                    ),
                }
            }
            i = shader_end;
        }

        gpu.pipeline.unuse_shader();
    }

    fn skip_run(&mut self, run: Range<usize>, state: QueueState, diagnostics: &mut QueueDiagnostics) {
        for entry in &mut self.entries[run] {
            entry.state = state;
            diagnostics.tag(entry.mesh);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(shader: u32, geometry: u64, slot: u32) -> MeshInfo {
        MeshInfo {
            mesh: MeshHandle(PoolHandle {
                index: slot,
                generation: 0,
            }),
            shader: ShaderUseInfo::original(ShaderHandle(PoolHandle {
                index: shader,
                generation: 0,
            })),
            geometry: Some(GeometryId(geometry)),
            priority: 0,
            slot: PoolHandle {
                index: slot,
                generation: 0,
            },
            state: QueueState::Pending,
        }
    }

    fn slots(queue: &MeshRenderQueue) -> Vec<u32> {
        queue.entries().iter().map(|entry| entry.slot.index).collect()
    }

    #[test]
    fn test_sorted_insert_groups_runs() {
        let mut queue = MeshRenderQueue::new(QueueOrdering::Sorted);
        queue.register(info(1, 7, 0));
        queue.register(info(2, 7, 1));
        queue.register(info(1, 8, 2));
        queue.register(info(1, 7, 3));
        queue.register(info(2, 7, 4));

        assert_eq!(slots(&queue), vec![0, 3, 2, 1, 4]);
        assert_eq!(queue.find_next_shader(0), 3);
        assert_eq!(queue.find_next_vbo(0, 3), 2);
        assert_eq!(queue.find_next_vbo(2, 3), 3);
        assert_eq!(queue.find_next_shader(3), 5);
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut queue = MeshRenderQueue::new(QueueOrdering::Insertion);
        queue.register(info(1, 7, 0));
        queue.register(info(2, 7, 1));
        queue.register(info(1, 7, 2));

        assert_eq!(slots(&queue), vec![0, 1, 2]);
        assert_eq!(queue.find_next_shader(0), 1);
        assert_eq!(queue.find_next_shader(2), 3);
    }

    #[test]
    fn test_unregister_by_slot() {
        let mut queue = MeshRenderQueue::new(QueueOrdering::Sorted);
        queue.register(info(1, 7, 0));
        queue.register(info(1, 7, 1));

        let removed = queue.unregister(PoolHandle {
            index: 0,
            generation: 0,
        });
        assert_eq!(removed.map(|entry| entry.slot.index), Some(0));
        assert!(queue
            .unregister(PoolHandle {
                index: 0,
                generation: 0,
            })
            .is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_find_next_on_empty_queue() {
        let queue = MeshRenderQueue::new(QueueOrdering::Sorted);
        assert_eq!(queue.find_next_shader(0), 0);
        assert_eq!(queue.find_next_vbo(0, 10), 0);
    }
}
