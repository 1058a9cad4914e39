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

//! The layered draw queue of one pass.

use super::{MeshInfo, MeshRenderQueue, QueueState};
use crate::diagnostics::QueueDiagnostics;
use crate::drawer::MeshDrawer;
use crate::registration::MeshRegistrationInfo;
use ahash::{AHashMap, AHashSet};
use prism_core::telemetry::QueueStats;
use prism_core::{LayerRegistry, QueueOrdering};
use prism_data::{GpuContext, MeshPool};
use std::fmt;

/// Every mesh a pass draws, bucketed by layer.
///
/// Buckets exist for every layer the pass accepts, but only the layers of the
/// global [`LayerRegistry`] are replayed, in registry order. The replay order
/// is recomputed by [`prepare_layers`](Self::prepare_layers) only when the
/// registry version changes.
pub struct RenderQueue {
    drawer: Box<dyn MeshDrawer>,
    buckets: AHashMap<String, MeshRenderQueue>,
    order: Vec<String>,
    layer_epoch: Option<u64>,
    ordering: QueueOrdering,
    rendered: bool,
}

impl RenderQueue {
    /// Creates an empty queue drawing through `drawer`.
    pub fn new(drawer: Box<dyn MeshDrawer>, ordering: QueueOrdering) -> Self {
        Self {
            drawer,
            buckets: AHashMap::new(),
            order: Vec::new(),
            layer_epoch: None,
            ordering,
            rendered: false,
        }
    }

    /// Name of the pass.
    pub fn name(&self) -> &str {
        self.drawer.name()
    }

    /// The pass.
    pub fn drawer(&self) -> &dyn MeshDrawer {
        self.drawer.as_ref()
    }

    /// The pass, mutably (to set frame uniforms).
    pub fn drawer_mut(&mut self) -> &mut dyn MeshDrawer {
        self.drawer.as_mut()
    }

    /// Adds a mesh if the pass accepts its layer, priority and shader.
    pub fn register(&mut self, info: &MeshRegistrationInfo) -> bool {
        if !self.drawer.is_layer_allowed(&info.layer) || !self.drawer.is_priority_allowed(info.priority) {
            return false;
        }
        let shader = self.drawer.replace_shader(info.shader);
        if !shader.shader.is_valid() {
            return false;
        }

        let ordering = self.ordering;
        self.buckets
            .entry(info.layer.clone())
            .or_insert_with(|| MeshRenderQueue::new(ordering))
            .register(MeshInfo {
                mesh: info.mesh,
                shader,
                geometry: info.geometry,
                priority: info.priority,
                slot: info.slot,
                state: QueueState::Pending,
            });
        true
    }

    /// Removes a mesh registered with `info`.
    pub fn unregister(&mut self, info: &MeshRegistrationInfo) -> bool {
        self.buckets
            .get_mut(&info.layer)
            .and_then(|bucket| bucket.unregister(info.slot))
            .is_some()
    }

    /// Returns `true` if the mesh registered with `info` is in the queue.
    pub fn contains(&self, info: &MeshRegistrationInfo) -> bool {
        self.buckets
            .get(&info.layer)
            .is_some_and(|bucket| bucket.contains(info.slot))
    }

    /// Recomputes the replay order if the layer registry changed.
    ///
    /// Returns `true` if the order was rebuilt.
    pub fn prepare_layers(&mut self, layers: &LayerRegistry) -> bool {
        if self.layer_epoch == Some(layers.version()) {
            return false;
        }
        self.order = layers
            .iter()
            .filter(|layer| self.drawer.is_layer_allowed(layer))
            .map(str::to_string)
            .collect();
        self.layer_epoch = Some(layers.version());
        log::debug!("RenderQueue: '{}' now draws layers {:?}", self.drawer.name(), self.order);
        true
    }

    /// Layers replayed, in order.
    pub fn layers(&self) -> &[String] {
        &self.order
    }

    /// The bucket of `layer`.
    pub fn bucket(&self, layer: &str) -> Option<&MeshRenderQueue> {
        self.buckets.get(layer)
    }

    /// Every entry of every bucket, replayed or not.
    pub fn entries(&self) -> impl Iterator<Item = &MeshInfo> + '_ {
        self.buckets.values().flat_map(|bucket| bucket.entries())
    }

    /// Draws every replayed layer.
    pub fn render(
        &mut self,
        gpu: &mut GpuContext<'_>,
        meshes: &mut MeshPool,
        diagnostics: &mut QueueDiagnostics,
    ) -> QueueStats {
        let mut stats = QueueStats::default();
        self.rendered = false;
        for layer in &self.order {
            if let Some(bucket) = self.buckets.get_mut(layer) {
                stats += bucket.render(gpu, self.drawer.as_ref(), meshes, diagnostics);
                self.rendered |= bucket.is_rendered();
            }
        }
        stats
    }

    /// Uploads uniforms of what the last render drew. Does nothing if it drew nothing.
    ///
    /// Each shader's shared block is written once, whatever the number of
    /// layers it draws in.
    pub fn update(&mut self, gpu: &mut GpuContext<'_>, meshes: &MeshPool) {
        if !self.rendered {
            return;
        }
        let mut shared_done = AHashSet::new();
        for layer in &self.order {
            if let Some(bucket) = self.buckets.get_mut(layer) {
                bucket.update(gpu, self.drawer.as_ref(), meshes, &mut shared_done);
            }
        }
    }

    /// Returns `true` if the last render drew at least one mesh.
    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    /// Number of registered meshes, replayed or not.
    pub fn len(&self) -> usize {
        self.buckets.values().map(MeshRenderQueue::len).sum()
    }

    /// Returns `true` if no mesh is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RenderQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderQueue")
            .field("drawer", &self.drawer.name())
            .field("order", &self.order)
            .field("len", &self.len())
            .field("rendered", &self.rendered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawer::MeshDrawerPass;
    use prism_core::{PassConfig, PoolHandle};
    use prism_data::{MeshHandle, ShaderHandle};

    fn registration(layer: &str, priority: i32, index: u32) -> MeshRegistrationInfo {
        let handle = PoolHandle {
            index,
            generation: 0,
        };
        MeshRegistrationInfo {
            mesh: MeshHandle(handle),
            shader: ShaderHandle(PoolHandle {
                index: 0,
                generation: 0,
            }),
            layer: layer.to_string(),
            geometry: None,
            priority,
            slot: handle,
        }
    }

    #[test]
    fn test_filters_apply_on_register() {
        let mut config = PassConfig::new("Opaque");
        config.layers = vec!["Default".to_string()];
        config.max_priority = Some(5);
        let mut queue = RenderQueue::new(Box::new(MeshDrawerPass::new(config)), QueueOrdering::Sorted);

        assert!(queue.register(&registration("Default", 0, 0)));
        assert!(!queue.register(&registration("UI", 0, 1)));
        assert!(!queue.register(&registration("Default", 6, 2)));
        assert_eq!(queue.len(), 1);

        assert!(queue.unregister(&registration("Default", 0, 0)));
        assert!(!queue.unregister(&registration("Default", 0, 0)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_layer_order_follows_registry_epoch() {
        let mut queue = RenderQueue::new(
            Box::new(MeshDrawerPass::new(PassConfig::default())),
            QueueOrdering::Sorted,
        );
        let mut layers = LayerRegistry::from_layers(["Default", "UI"]);

        assert!(queue.prepare_layers(&layers));
        assert!(!queue.prepare_layers(&layers));
        assert_eq!(queue.layers(), ["Default".to_string(), "UI".to_string()]);

        layers.remove("UI");
        assert!(queue.prepare_layers(&layers));
        assert_eq!(queue.layers(), ["Default".to_string()]);
    }

    #[test]
    fn test_meshes_on_unlisted_layers_stay_registered() {
        let mut queue = RenderQueue::new(
            Box::new(MeshDrawerPass::new(PassConfig::default())),
            QueueOrdering::Sorted,
        );
        queue.prepare_layers(&LayerRegistry::from_layers(["Default"]));

        assert!(queue.register(&registration("Hidden", 0, 0)));
        assert!(queue.contains(&registration("Hidden", 0, 0)));
        assert!(!queue.layers().contains(&"Hidden".to_string()));
    }
}
