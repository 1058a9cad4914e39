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

//! Defines the RenderAgent, the entry point of a frame.

use crate::context::RenderContext;
use crate::error::SceneError;
use crate::scene::RenderScene;
use prism_core::define_handle;
use prism_core::renderer::Pipeline;
use prism_core::service_registry::ServiceRegistry;
use prism_core::telemetry::FrameStats;
use prism_core::{Pool, RenderError, RenderSettings};
use std::time::Instant;

define_handle!(
    /// Handle to a scene of a [`RenderAgent`].
    SceneHandle
);

/// Owns the render context and the scenes drawn every frame.
pub struct RenderAgent {
    // Backend, shaders and GPU resource lifecycle.
    context: RenderContext,
    // Scenes, drawn in creation order.
    scenes: Pool<RenderScene>,
    order: Vec<SceneHandle>,
    // Start of the agent, the time base handed to the passes.
    started: Instant,
    // Totals of the last frame, over every scene.
    last_stats: FrameStats,
    frame_count: u64,
}

impl RenderAgent {
    /// Creates an agent on `pipeline`.
    ///
    /// Settings are taken from `services` when a valid [`RenderSettings`] is
    /// registered there, otherwise defaults are used.
    pub fn new(pipeline: Box<dyn Pipeline>, services: &ServiceRegistry) -> Result<Self, RenderError> {
        let settings = match services.get::<RenderSettings>() {
            Some(settings) => match settings.validate() {
                Ok(()) => settings.clone(),
                Err(e) => {
                    log::warn!("RenderAgent: {e}, using default settings");
                    RenderSettings::default()
                }
            },
            None => {
                log::debug!("RenderAgent: no RenderSettings service, using defaults");
                RenderSettings::default()
            }
        };
        Ok(Self {
            context: RenderContext::new(pipeline, settings)?,
            scenes: Pool::new(),
            order: Vec::new(),
            started: Instant::now(),
            last_stats: FrameStats::default(),
            frame_count: 0,
        })
    }

    /// Creates an empty scene configured from the context settings.
    pub fn create_scene(&mut self, name: &str) -> SceneHandle {
        let scene = RenderScene::new(name, self.context.settings());
        let handle = SceneHandle(self.scenes.insert(scene));
        self.order.push(handle);
        log::info!("RenderAgent: created scene '{name}'");
        handle
    }

    /// A scene.
    pub fn scene(&self, handle: SceneHandle) -> Option<&RenderScene> {
        self.scenes.get(handle.0)
    }

    /// A scene, mutably.
    pub fn scene_mut(&mut self, handle: SceneHandle) -> Option<&mut RenderScene> {
        self.scenes.get_mut(handle.0)
    }

    /// A scene together with the context, for operations that need both
    /// such as [`RenderScene::remove_mesh`].
    pub fn scene_and_context(&mut self, handle: SceneHandle) -> Option<(&mut RenderScene, &mut RenderContext)> {
        let scene = self.scenes.get_mut(handle.0)?;
        Some((scene, &mut self.context))
    }

    /// Closes and removes a scene.
    pub fn remove_scene(&mut self, handle: SceneHandle) -> Result<RenderScene, SceneError> {
        let mut scene = self
            .scenes
            .remove(handle.0)
            .ok_or(SceneError::SceneNotFound(handle.0))?;
        self.order.retain(|h| *h != handle);
        if !scene.is_closed() {
            scene.close(&mut self.context)?;
        }
        Ok(scene)
    }

    /// Handles of the scenes, in draw order.
    pub fn scenes(&self) -> &[SceneHandle] {
        &self.order
    }

    /// The render context.
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// The render context, mutably.
    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    /// Totals of the last frame.
    pub fn last_stats(&self) -> &FrameStats {
        &self.last_stats
    }

    /// Prepares the context and draws every open scene.
    ///
    /// Each scene submits its own frame. The returned statistics are the
    /// sum over the scenes.
    pub fn render_frame(&mut self) -> Result<FrameStats, SceneError> {
        if self.context.is_closed() {
            return Err(RenderError::ContextClosed.into());
        }
        let started = Instant::now();
        let collected = self.context.prepare_frame();
        let changed = self.context.take_changed_shaders();
        if !changed.is_empty() {
            log::info!("RenderAgent: {} shaders changed", changed.len());
        }

        let time = self.started.elapsed().as_secs_f32();
        self.frame_count += 1;
        let mut totals = FrameStats {
            frame_number: self.frame_count,
            collected_backings: collected,
            ..Default::default()
        };
        for &handle in &self.order {
            let Some(scene) = self.scenes.get_mut(handle.0) else {
                continue;
            };
            if scene.is_closed() {
                continue;
            }
            scene.on_shaders_changed(&changed);
            let stats = scene.render(&mut self.context, time)?;
            totals.queues += stats.queues;
            totals.rebuilt |= stats.rebuilt;
            totals.black_screen |= stats.black_screen;
        }
        totals.cpu_frame_time_ms = started.elapsed().as_secs_f32() * 1000.0;
        self.last_stats = totals.clone();
        Ok(totals)
    }

    /// Closes every scene, then the context.
    ///
    /// A scene failing to close is logged and its resources are reported by
    /// the context as leaked.
    pub fn shutdown(&mut self) -> Result<(), RenderError> {
        for handle in std::mem::take(&mut self.order) {
            if let Some(mut scene) = self.scenes.remove(handle.0) {
                if scene.is_closed() {
                    continue;
                }
                if let Err(e) = scene.close(&mut self.context) {
                    log::error!("RenderAgent: cannot close scene '{}': {e}", scene.name());
                }
            }
        }
        self.context.close()
    }
}

impl std::fmt::Debug for RenderAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderAgent")
            .field("context", &self.context)
            .field("scenes", &self.order.len())
            .field("frame_count", &self.frame_count)
            .finish()
    }
}
