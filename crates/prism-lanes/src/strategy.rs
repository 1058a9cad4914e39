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

//! The registry of meshes and the queues observing it.

use crate::diagnostics::QueueDiagnostics;
use crate::drawer::MeshDrawer;
use crate::queue::RenderQueue;
use crate::registration::MeshRegistrationInfo;
use ahash::AHashSet;
use prism_core::define_handle;
use prism_core::event::EventBus;
use prism_core::telemetry::QueueStats;
use prism_core::{LayerRegistry, Pool, QueueOrdering, RegistrationError};
use prism_data::{GpuContext, MeshHandle, MeshPool, ShaderHandle};

define_handle!(
    /// A render queue owned by a [`RenderStrategy`].
    QueueHandle
);

/// Structural requests that may be sent from any thread.
///
/// They are applied by the next [`RenderStrategy::prepare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyCommand {
    /// Re-registers a mesh whose shader, layer, geometry or priority changed.
    ReRegister(MeshHandle),
}

/// Single source of truth for which meshes are drawn and by which queues.
///
/// Every registered mesh is in every live queue that accepts it. Structural
/// changes are refused while the queues are iterated; re-registrations are
/// deferred to [`prepare`](Self::prepare) instead.
#[derive(Debug)]
pub struct RenderStrategy {
    infos: Pool<MeshRegistrationInfo>,
    queues: Pool<RenderQueue>,
    queue_order: Vec<QueueHandle>,
    pending: Vec<MeshHandle>,
    commands: EventBus<StrategyCommand>,
    iterating: bool,
    diagnostics: QueueDiagnostics,
    ordering: QueueOrdering,
    dirty: bool,
}

impl RenderStrategy {
    /// Creates a strategy without queues.
    pub fn new(ordering: QueueOrdering, debug_mode: bool) -> Self {
        Self {
            infos: Pool::new(),
            queues: Pool::new(),
            queue_order: Vec::new(),
            pending: Vec::new(),
            commands: EventBus::new(),
            iterating: false,
            diagnostics: QueueDiagnostics::new(debug_mode),
            ordering,
            dirty: false,
        }
    }

    fn check_not_iterating(&self, operation: &str) -> Result<(), RegistrationError> {
        if self.iterating {
            log::error!("RenderStrategy: {operation} called while the queues are iterated");
            return Err(RegistrationError::MutationDuringIteration);
        }
        Ok(())
    }

    /// Stores `info` and hands it to every live queue. Returns its slot.
    fn insert_info(&mut self, info: MeshRegistrationInfo) -> prism_core::PoolHandle {
        let slot = self.infos.insert(info);
        if let Some(stored) = self.infos.get_mut(slot) {
            stored.slot = slot;
            for handle in &self.queue_order {
                if let Some(queue) = self.queues.get_mut(handle.0) {
                    queue.register(stored);
                }
            }
        }
        slot
    }

    /// Removes the info at `slot` from every live queue and frees the slot.
    fn remove_info(&mut self, slot: prism_core::PoolHandle) -> Option<MeshRegistrationInfo> {
        let info = self.infos.remove(slot)?;
        for handle in &self.queue_order {
            if let Some(queue) = self.queues.get_mut(handle.0) {
                queue.unregister(&info);
            }
        }
        Some(info)
    }

    /// Registers a mesh in every live queue that accepts it.
    pub fn register_mesh(&mut self, meshes: &mut MeshPool, handle: MeshHandle) -> Result<(), RegistrationError> {
        self.check_not_iterating("register_mesh")?;
        let mesh = meshes
            .get_mut(handle)
            .ok_or(RegistrationError::MeshNotFound(handle.0))?;
        if mesh.registration_info().is_some() {
            log::error!("RenderStrategy: mesh '{}' is already registered", mesh.name());
            return Err(RegistrationError::AlreadyRegistered(handle.0));
        }

        let slot = self.insert_info(MeshRegistrationInfo::from_mesh(handle, mesh));
        mesh.set_registration_info(Some(slot));
        self.dirty = true;
        log::trace!("RenderStrategy: registered mesh '{}'", mesh.name());
        Ok(())
    }

    /// Removes a mesh from every live queue.
    ///
    /// A pending re-registration of the mesh is cancelled.
    pub fn unregister_mesh(&mut self, meshes: &mut MeshPool, handle: MeshHandle) -> Result<(), RegistrationError> {
        self.check_not_iterating("unregister_mesh")?;
        let mesh = meshes
            .get_mut(handle)
            .ok_or(RegistrationError::MeshNotFound(handle.0))?;
        let Some(slot) = mesh.registration_info() else {
            log::error!("RenderStrategy: mesh '{}' is not registered", mesh.name());
            return Err(RegistrationError::NotRegistered(handle.0));
        };

        self.pending.retain(|pending| *pending != handle);
        self.remove_info(slot)
            .ok_or(RegistrationError::NotRegistered(handle.0))?;
        mesh.set_registration_info(None);
        self.dirty = true;
        log::trace!("RenderStrategy: unregistered mesh '{}'", mesh.name());
        Ok(())
    }

    /// Schedules a mesh for re-registration at the next [`prepare`](Self::prepare).
    ///
    /// Safe to call while the queues are iterated.
    pub fn re_register_mesh(&mut self, handle: MeshHandle) {
        if !self.pending.contains(&handle) {
            self.pending.push(handle);
        }
    }

    /// A sender other threads can use to request structural changes.
    pub fn command_sender(&self) -> flume::Sender<StrategyCommand> {
        self.commands.sender()
    }

    /// Meshes waiting for re-registration, including requests not yet received.
    pub fn pending_count(&self) -> usize {
        self.pending.len() + self.commands.len()
    }

    /// Applies deferred re-registrations and refreshes the layer order of every queue.
    ///
    /// Returns the number of meshes re-registered. Requests for meshes that
    /// were destroyed or unregistered in the meantime are dropped.
    pub fn prepare(&mut self, meshes: &mut MeshPool, layers: &LayerRegistry) -> Result<usize, RegistrationError> {
        self.check_not_iterating("prepare")?;
        for command in self.commands.drain() {
            match command {
                StrategyCommand::ReRegister(handle) => self.re_register_mesh(handle),
            }
        }

        let mut count = 0;
        for handle in std::mem::take(&mut self.pending) {
            let Some(mesh) = meshes.get_mut(handle) else {
                log::debug!("RenderStrategy: dropping re-registration of a destroyed mesh");
                continue;
            };
            let Some(old_slot) = mesh.registration_info() else {
                log::debug!(
                    "RenderStrategy: dropping re-registration of unregistered mesh '{}'",
                    mesh.name()
                );
                continue;
            };

            self.remove_info(old_slot);
            let slot = self.insert_info(MeshRegistrationInfo::from_mesh(handle, mesh));
            mesh.set_registration_info(Some(slot));
            count += 1;
        }
        if count > 0 {
            log::debug!("RenderStrategy: re-registered {count} meshes");
            self.dirty = true;
        }

        for handle in &self.queue_order {
            if let Some(queue) = self.queues.get_mut(handle.0) {
                self.dirty |= queue.prepare_layers(layers);
            }
        }
        Ok(count)
    }

    /// Creates a queue for `drawer` and fills it with every registered mesh.
    pub fn build_queue(
        &mut self,
        drawer: Box<dyn MeshDrawer>,
        layers: &LayerRegistry,
    ) -> Result<QueueHandle, RegistrationError> {
        self.check_not_iterating("build_queue")?;
        let mut queue = RenderQueue::new(drawer, self.ordering);
        let mut accepted = 0;
        for (_, info) in self.infos.iter() {
            if queue.register(info) {
                accepted += 1;
            }
        }
        queue.prepare_layers(layers);
        log::debug!(
            "RenderStrategy: built queue '{}' with {accepted} of {} meshes",
            queue.name(),
            self.infos.len()
        );

        let handle = QueueHandle(self.queues.insert(queue));
        self.queue_order.push(handle);
        self.dirty = true;
        Ok(handle)
    }

    /// Removes a queue and returns it.
    pub fn remove_queue(&mut self, handle: QueueHandle) -> Result<RenderQueue, RegistrationError> {
        self.check_not_iterating("remove_queue")?;
        let Some(queue) = self.queues.remove(handle.0) else {
            log::error!("RenderStrategy: queue {:?} not found", handle.0);
            return Err(RegistrationError::QueueNotFound(handle.0));
        };
        self.queue_order.retain(|h| *h != handle);
        self.dirty = true;
        Ok(queue)
    }

    /// Marks the start of render/update: structural changes are refused until
    /// [`end_iteration`](Self::end_iteration).
    pub fn begin_iteration(&mut self) {
        self.iterating = true;
    }

    /// Marks the end of render/update.
    pub fn end_iteration(&mut self) {
        self.iterating = false;
    }

    /// Returns `true` between [`begin_iteration`](Self::begin_iteration) and
    /// [`end_iteration`](Self::end_iteration).
    pub fn is_iterating(&self) -> bool {
        self.iterating
    }

    /// Replays one queue.
    pub fn render_queue(
        &mut self,
        handle: QueueHandle,
        gpu: &mut GpuContext<'_>,
        meshes: &mut MeshPool,
    ) -> Result<QueueStats, RegistrationError> {
        let queue = self
            .queues
            .get_mut(handle.0)
            .ok_or(RegistrationError::QueueNotFound(handle.0))?;
        Ok(queue.render(gpu, meshes, &mut self.diagnostics))
    }

    /// Flushes the uniforms of one queue.
    pub fn update_queue(
        &mut self,
        handle: QueueHandle,
        gpu: &mut GpuContext<'_>,
        meshes: &MeshPool,
    ) -> Result<(), RegistrationError> {
        let queue = self
            .queues
            .get_mut(handle.0)
            .ok_or(RegistrationError::QueueNotFound(handle.0))?;
        queue.update(gpu, meshes);
        Ok(())
    }

    /// A queue.
    pub fn queue(&self, handle: QueueHandle) -> Option<&RenderQueue> {
        self.queues.get(handle.0)
    }

    /// A queue, mutably.
    pub fn queue_mut(&mut self, handle: QueueHandle) -> Option<&mut RenderQueue> {
        self.queues.get_mut(handle.0)
    }

    /// Live queues in creation order.
    pub fn queue_handles(&self) -> &[QueueHandle] {
        &self.queue_order
    }

    /// The registration of the mesh stored at `slot`.
    pub fn registration(&self, slot: prism_core::PoolHandle) -> Option<&MeshRegistrationInfo> {
        self.infos.get(slot)
    }

    /// Meshes drawn with one of `shaders` by at least one queue.
    ///
    /// Pass overrides are taken into account: a mesh whose own shader is not
    /// in `shaders` is returned if a queue replaces it with one that is.
    pub fn meshes_using(&self, shaders: &[ShaderHandle]) -> Vec<MeshHandle> {
        let mut seen = AHashSet::new();
        self.queue_order
            .iter()
            .filter_map(|handle| self.queues.get(handle.0))
            .flat_map(RenderQueue::entries)
            .filter(|entry| shaders.contains(&entry.shader.shader))
            .filter_map(|entry| seen.insert(entry.mesh).then_some(entry.mesh))
            .collect()
    }

    /// Deduplicated draw errors since the last [`clear_errors`](Self::clear_errors).
    pub fn errors(&self) -> &[String] {
        self.diagnostics.errors()
    }

    /// Meshes tagged as faulty (debug mode only).
    pub fn problem_meshes(&self) -> &AHashSet<MeshHandle> {
        self.diagnostics.problem_meshes()
    }

    /// Forgets every reported error.
    pub fn clear_errors(&mut self) {
        self.diagnostics.clear();
    }

    /// The error collector.
    pub fn diagnostics(&self) -> &QueueDiagnostics {
        &self.diagnostics
    }

    /// Enables or disables problem-mesh tagging.
    pub fn set_debug_mode(&mut self, enabled: bool) {
        self.diagnostics.set_debug_mode(enabled);
    }

    /// Number of registered meshes.
    pub fn mesh_count(&self) -> usize {
        self.infos.len()
    }

    /// Number of live queues.
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Returns `true` if the draw order changed since the last [`take_dirty`](Self::take_dirty).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns and resets the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawer::MeshDrawerPass;
    use prism_core::renderer::ShaderCreateInfo;
    use prism_core::PassConfig;
    use prism_data::{Geometry, Material, Mesh, MeshKind, Shader, ShaderLibrary};
    use std::sync::Arc;

    fn scene() -> (MeshPool, MeshHandle, ShaderLibrary) {
        let mut shaders = ShaderLibrary::new();
        let lit = shaders
            .insert(Shader::new(ShaderCreateInfo::new("lit")).unwrap())
            .unwrap();
        let mut meshes = MeshPool::new();
        let handle = meshes.insert(Mesh::new(
            "quad",
            MeshKind::Static,
            Arc::new(Geometry::quad()),
            Material::new(lit),
        ));
        (meshes, handle, shaders)
    }

    #[test]
    fn test_double_registration_is_refused() {
        let (mut meshes, handle, _) = scene();
        let mut strategy = RenderStrategy::new(QueueOrdering::Sorted, false);

        strategy.register_mesh(&mut meshes, handle).unwrap();
        assert_eq!(
            strategy.register_mesh(&mut meshes, handle),
            Err(RegistrationError::AlreadyRegistered(handle.0))
        );
        assert_eq!(strategy.mesh_count(), 1);

        strategy.unregister_mesh(&mut meshes, handle).unwrap();
        assert_eq!(
            strategy.unregister_mesh(&mut meshes, handle),
            Err(RegistrationError::NotRegistered(handle.0))
        );
        assert_eq!(strategy.mesh_count(), 0);
    }

    #[test]
    fn test_mutation_refused_while_iterating() {
        let (mut meshes, handle, _) = scene();
        let mut strategy = RenderStrategy::new(QueueOrdering::Sorted, false);

        strategy.begin_iteration();
        assert_eq!(
            strategy.register_mesh(&mut meshes, handle),
            Err(RegistrationError::MutationDuringIteration)
        );
        strategy.end_iteration();
        assert!(strategy.register_mesh(&mut meshes, handle).is_ok());
    }

    #[test]
    fn test_unregister_cancels_pending_re_registration() {
        let (mut meshes, handle, _) = scene();
        let mut strategy = RenderStrategy::new(QueueOrdering::Sorted, false);
        strategy.register_mesh(&mut meshes, handle).unwrap();

        strategy.re_register_mesh(handle);
        strategy.re_register_mesh(handle);
        assert_eq!(strategy.pending_count(), 1);

        strategy.unregister_mesh(&mut meshes, handle).unwrap();
        assert_eq!(strategy.pending_count(), 0);
        let layers = LayerRegistry::new();
        assert_eq!(strategy.prepare(&mut meshes, &layers), Ok(0));
        assert_eq!(strategy.mesh_count(), 0);
    }

    #[test]
    fn test_commands_from_other_threads_apply_on_prepare() {
        let (mut meshes, handle, shaders) = scene();
        let layers = LayerRegistry::new();
        let mut strategy = RenderStrategy::new(QueueOrdering::Sorted, false);
        let queue = strategy
            .build_queue(
                Box::new(MeshDrawerPass::from_config(PassConfig::default(), &shaders)),
                &layers,
            )
            .unwrap();
        strategy.register_mesh(&mut meshes, handle).unwrap();

        let sender = strategy.command_sender();
        std::thread::spawn(move || sender.send(StrategyCommand::ReRegister(handle)).unwrap())
            .join()
            .unwrap();
        assert_eq!(strategy.pending_count(), 1);

        assert_eq!(strategy.prepare(&mut meshes, &layers), Ok(1));
        assert_eq!(strategy.queue(queue).unwrap().len(), 1);
        assert_eq!(strategy.mesh_count(), 1);
    }

    #[test]
    fn test_meshes_using_follows_pass_overrides() {
        let (mut meshes, handle, mut shaders) = scene();
        let lit = meshes.get(handle).unwrap().shader();
        let depth = shaders
            .insert(Shader::new(ShaderCreateInfo::new("depth")).unwrap())
            .unwrap();
        let layers = LayerRegistry::new();
        let mut strategy = RenderStrategy::new(QueueOrdering::Sorted, false);
        strategy.register_mesh(&mut meshes, handle).unwrap();
        assert!(strategy.meshes_using(&[depth]).is_empty());

        let mut config = PassConfig::new("shadow");
        config.override_shader = Some("depth".to_string());
        for config in [PassConfig::default(), config] {
            strategy
                .build_queue(Box::new(MeshDrawerPass::from_config(config, &shaders)), &layers)
                .unwrap();
        }

        assert_eq!(strategy.meshes_using(&[depth]), vec![handle]);
        assert_eq!(strategy.meshes_using(&[lit, depth]), vec![handle]);
    }

    #[test]
    fn test_remove_unknown_queue() {
        let mut strategy = RenderStrategy::new(QueueOrdering::Sorted, false);
        let layers = LayerRegistry::new();
        let handle = strategy
            .build_queue(Box::new(MeshDrawerPass::new(PassConfig::default())), &layers)
            .unwrap();

        assert!(strategy.remove_queue(handle).is_ok());
        assert_eq!(
            strategy.remove_queue(handle).unwrap_err(),
            RegistrationError::QueueNotFound(handle.0)
        );
        assert_eq!(strategy.queue_count(), 0);
    }
}
