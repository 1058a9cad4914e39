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

//! A scene and its per-frame state machine.

use crate::camera::{self, Camera, SharedCamera};
use crate::context::RenderContext;
use crate::error::SceneError;
use crate::technique::RenderTechnique;
use prism_core::renderer::{FrameBufferId, Pipeline};
use prism_core::telemetry::{FrameStats, QueueStats};
use prism_core::RenderSettings;
use prism_data::{GpuContext, Mesh, MeshHandle, MeshPool, ShaderHandle};
use prism_lanes::{FrameUniforms, QueueHandle, RenderStrategy};
use std::sync::{Arc, RwLock, Weak};
use std::time::Instant;

/// Something drawn once per frame on top of the scene, whatever the scene contains.
pub trait Overlay {
    /// Draws the overlay. The swapchain is the current framebuffer.
    fn draw(&mut self, pipeline: &mut dyn Pipeline);
}

/// A set of meshes and cameras drawn with one technique.
///
/// A frame goes through these phases:
/// 1. prepare: camera selection, deferred re-registrations, queue creation;
/// 2. overlay;
/// 3. build, only when the scene or the pipeline is dirty;
/// 4. render then update of every queue, per camera;
/// 5. black screen if nothing was drawn;
/// 6. submit.
pub struct RenderScene {
    name: String,
    meshes: MeshPool,
    strategy: RenderStrategy,
    technique: RenderTechnique,
    cameras: Vec<Weak<RwLock<Camera>>>,
    main_camera: Option<SharedCamera>,
    offscreen_cameras: Vec<SharedCamera>,
    cameras_dirty: bool,
    editor_mode: bool,
    dirty: u32,
    submission: Vec<QueueHandle>,
    build_count: u64,
    clear_color: [f32; 4],
    overlay: Option<Box<dyn Overlay>>,
    stats: FrameStats,
    closed: bool,
}

impl RenderScene {
    /// Creates an empty scene using the technique and options of `settings`.
    pub fn new(name: &str, settings: &RenderSettings) -> Self {
        Self {
            name: name.to_string(),
            meshes: MeshPool::new(),
            strategy: RenderStrategy::new(settings.queue_ordering, settings.debug_mode),
            technique: RenderTechnique::new(settings.technique.iter().cloned()),
            cameras: Vec::new(),
            main_camera: None,
            offscreen_cameras: Vec::new(),
            cameras_dirty: false,
            editor_mode: settings.editor_mode,
            dirty: 1,
            submission: Vec::new(),
            build_count: 0,
            clear_color: settings.clear_color,
            overlay: None,
            stats: FrameStats::default(),
            closed: false,
        }
    }

    /// Name of the scene.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn check_open(&self) -> Result<(), SceneError> {
        if self.closed {
            return Err(SceneError::Closed(self.name.clone()));
        }
        Ok(())
    }

    /// Adds a mesh and registers it.
    pub fn add_mesh(&mut self, mesh: Mesh) -> Result<MeshHandle, SceneError> {
        self.check_open()?;
        let handle = self.meshes.insert(mesh);
        if let Err(e) = self.strategy.register_mesh(&mut self.meshes, handle) {
            self.meshes.remove(handle);
            return Err(e.into());
        }
        Ok(handle)
    }

    /// Unregisters a mesh, frees its GPU state and returns it.
    pub fn remove_mesh(&mut self, ctx: &mut RenderContext, handle: MeshHandle) -> Result<Mesh, SceneError> {
        let registered = self
            .meshes
            .get(handle)
            .ok_or(SceneError::MeshNotFound(handle))?
            .registration_info()
            .is_some();
        if registered {
            self.strategy.unregister_mesh(&mut self.meshes, handle)?;
        }
        let mut mesh = self
            .meshes
            .remove(handle)
            .ok_or(SceneError::MeshNotFound(handle))?;
        ctx.free_mesh_memory(&mut mesh);
        Ok(mesh)
    }

    /// A mesh of the scene.
    pub fn mesh(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle)
    }

    /// A mesh of the scene, mutably.
    ///
    /// Changes to the shader, layer, geometry or priority take effect after
    /// [`re_register_mesh`](Self::re_register_mesh).
    pub fn mesh_mut(&mut self, handle: MeshHandle) -> Option<&mut Mesh> {
        self.meshes.get_mut(handle)
    }

    /// Every mesh of the scene.
    pub fn meshes(&self) -> &MeshPool {
        &self.meshes
    }

    /// Registers a mesh previously unregistered.
    pub fn register_mesh(&mut self, handle: MeshHandle) -> Result<(), SceneError> {
        self.check_open()?;
        Ok(self.strategy.register_mesh(&mut self.meshes, handle)?)
    }

    /// Unregisters a mesh without removing it. It is no longer drawn.
    pub fn unregister_mesh(&mut self, handle: MeshHandle) -> Result<(), SceneError> {
        Ok(self.strategy.unregister_mesh(&mut self.meshes, handle)?)
    }

    /// Re-registers a mesh at the start of the next frame.
    pub fn re_register_mesh(&mut self, handle: MeshHandle) {
        self.strategy.re_register_mesh(handle);
    }

    /// The registration and queues of the scene.
    pub fn strategy(&self) -> &RenderStrategy {
        &self.strategy
    }

    /// The registration and queues of the scene, mutably.
    pub fn strategy_mut(&mut self) -> &mut RenderStrategy {
        &mut self.strategy
    }

    /// The technique the scene is drawn with.
    pub fn technique(&self) -> &RenderTechnique {
        &self.technique
    }

    /// Starts observing a camera. The scene keeps only a weak reference.
    pub fn add_camera(&mut self, camera: &SharedCamera) {
        self.cameras.push(Arc::downgrade(camera));
        self.cameras_dirty = true;
    }

    /// Requests a new camera selection at the next frame.
    pub fn mark_cameras_dirty(&mut self) {
        self.cameras_dirty = true;
    }

    /// Drops expired cameras and selects the main camera.
    pub fn sort_cameras(&mut self) {
        let selection = camera::sort_cameras(&mut self.cameras, self.editor_mode);
        if selection.expired > 0 {
            self.set_dirty();
        }
        self.main_camera = selection.main;
        self.offscreen_cameras = selection.offscreen;
        self.cameras_dirty = false;
        if let Some(main) = &self.main_camera {
            log::debug!("RenderScene: '{}' main camera is '{}'", self.name, camera::read(main).name);
        }
    }

    /// The camera the swapchain is drawn from.
    pub fn main_camera(&self) -> Option<&SharedCamera> {
        self.main_camera.as_ref()
    }

    /// Requests a rebuild. Requests raised before the next build are coalesced.
    pub fn set_dirty(&mut self) {
        self.dirty = self.dirty.saturating_add(1);
    }

    /// Returns `true` if a rebuild is pending.
    pub fn is_dirty(&self) -> bool {
        self.dirty > 0
    }

    /// Number of builds performed.
    pub fn build_count(&self) -> u64 {
        self.build_count
    }

    /// Installs the overlay drawn every frame.
    pub fn set_overlay(&mut self, overlay: Box<dyn Overlay>) {
        self.overlay = Some(overlay);
    }

    /// Statistics of the last frame.
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Marks the materials of meshes drawn with a changed shader dirty and
    /// defers their re-registration.
    ///
    /// A mesh is affected if its own shader changed or if a pass draws it
    /// with a changed override shader.
    pub fn on_shaders_changed(&mut self, changed: &[ShaderHandle]) {
        if changed.is_empty() {
            return;
        }
        let mut affected = self.strategy.meshes_using(changed);
        for (handle, mesh) in self.meshes.iter() {
            if changed.contains(&mesh.shader()) && !affected.contains(&handle) {
                affected.push(handle);
            }
        }
        for handle in affected {
            if let Some(mesh) = self.meshes.get_mut(handle) {
                mesh.mark_material_dirty();
            }
            self.strategy.re_register_mesh(handle);
        }
        // Pass overrides may point at a changed shader too.
        self.set_dirty();
    }

    /// Draws one frame and submits it.
    pub fn render(&mut self, ctx: &mut RenderContext, time: f32) -> Result<FrameStats, SceneError> {
        self.check_open()?;
        let started = Instant::now();
        let mut stats = FrameStats {
            frame_number: self.stats.frame_number + 1,
            ..Default::default()
        };

        self.prepare_render(ctx)?;

        if let Some(overlay) = self.overlay.as_mut() {
            ctx.pipeline_mut().set_current_framebuffer(FrameBufferId::INVALID);
            overlay.draw(ctx.pipeline_mut());
        }

        if self.is_dirty() || ctx.pipeline().is_dirty() {
            self.build(ctx);
            stats.rebuilt = true;
        }

        stats.queues = self.draw_cameras(ctx, time)?;

        if stats.queues.drawn == 0 {
            self.render_black_screen(ctx);
            stats.black_screen = true;
        }

        ctx.pipeline_mut().submit();
        stats.cpu_frame_time_ms = started.elapsed().as_secs_f32() * 1000.0;
        log::trace!(
            "RenderScene: '{}' frame {} drew {} meshes",
            self.name,
            stats.frame_number,
            stats.draw_calls()
        );
        self.stats = stats.clone();
        Ok(stats)
    }

    fn prepare_render(&mut self, ctx: &mut RenderContext) -> Result<(), SceneError> {
        if self.cameras_dirty || self.cameras.iter().any(|c| c.strong_count() == 0) {
            self.sort_cameras();
        }
        self.strategy.prepare(&mut self.meshes, ctx.layers())?;
        if !self.technique.is_built() {
            self.technique
                .build(&mut self.strategy, ctx.shaders(), ctx.layers())?;
        }
        if self.strategy.take_dirty() {
            self.set_dirty();
        }
        Ok(())
    }

    /// Recomputes the submission order of the queues.
    pub fn build(&mut self, ctx: &mut RenderContext) {
        let requests = std::mem::take(&mut self.dirty);
        let pipeline = ctx.pipeline_mut();
        pipeline.begin_build();
        self.submission = self.technique.queues();
        self.build_count += 1;
        pipeline.set_dirty(false);
        pipeline.end_build();
        log::debug!(
            "RenderScene: '{}' rebuilt {} queues ({requests} requests)",
            self.name,
            self.submission.len()
        );
    }

    fn draw_cameras(&mut self, ctx: &mut RenderContext, time: f32) -> Result<QueueStats, SceneError> {
        let mut totals = QueueStats::default();
        let cameras: Vec<SharedCamera> = self
            .offscreen_cameras
            .iter()
            .chain(self.main_camera.iter())
            .cloned()
            .collect();

        self.strategy.begin_iteration();
        for camera in &cameras {
            let (frame, target) = {
                let camera = camera::read(camera);
                (camera.frame_uniforms(time), camera.target)
            };
            match self.draw_camera(ctx, frame, target) {
                Ok(stats) => totals += stats,
                Err(e) => {
                    self.strategy.end_iteration();
                    return Err(e);
                }
            }
        }
        self.strategy.end_iteration();
        Ok(totals)
    }

    fn draw_camera(
        &mut self,
        ctx: &mut RenderContext,
        frame: FrameUniforms,
        target: FrameBufferId,
    ) -> Result<QueueStats, SceneError> {
        self.technique.set_frame_uniforms(&mut self.strategy, frame);
        let clear_color = self.clear_color;
        let mut gpu = ctx.gpu();
        gpu.pipeline.set_current_framebuffer(target);
        gpu.pipeline.begin_render();
        gpu.pipeline.clear_buffers(clear_color);

        let mut stats = QueueStats::default();
        for &queue in &self.submission {
            stats += self.strategy.render_queue(queue, &mut gpu, &mut self.meshes)?;
        }
        self.update_queues(&mut gpu)?;

        gpu.pipeline.end_render();
        Ok(stats)
    }

    fn update_queues(&mut self, gpu: &mut GpuContext<'_>) -> Result<(), SceneError> {
        for &queue in &self.submission {
            self.strategy.update_queue(queue, gpu, &self.meshes)?;
        }
        Ok(())
    }

    /// Flushes the uniforms of every queue of the submission order.
    ///
    /// [`render`](Self::render) does this after each camera; calling it
    /// directly pushes property changes without drawing.
    pub fn update(&mut self, ctx: &mut RenderContext) -> Result<(), SceneError> {
        self.check_open()?;
        let mut gpu = ctx.gpu();
        self.update_queues(&mut gpu)
    }

    /// Clears the swapchain so a frame without draws still presents a defined image.
    pub fn render_black_screen(&mut self, ctx: &mut RenderContext) {
        let pipeline = ctx.pipeline_mut();
        pipeline.set_current_framebuffer(FrameBufferId::INVALID);
        pipeline.begin_render();
        pipeline.clear_buffers([0.0, 0.0, 0.0, 1.0]);
        pipeline.end_render();
    }

    /// Removes the queues and frees the GPU state of every mesh.
    ///
    /// Meshes stay in the scene, unregistered.
    pub fn close(&mut self, ctx: &mut RenderContext) -> Result<(), SceneError> {
        self.check_open()?;
        self.technique.clear(&mut self.strategy)?;
        for handle in self.meshes.handles() {
            let registered = self
                .meshes
                .get(handle)
                .is_some_and(|mesh| mesh.registration_info().is_some());
            if registered {
                self.strategy.unregister_mesh(&mut self.meshes, handle)?;
            }
        }
        for (_, mesh) in self.meshes.iter_mut() {
            ctx.free_mesh_memory(mesh);
        }
        self.submission.clear();
        self.closed = true;
        log::info!("RenderScene: '{}' closed", self.name);
        Ok(())
    }

    /// Returns `true` once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl std::fmt::Debug for RenderScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderScene")
            .field("name", &self.name)
            .field("meshes", &self.meshes.len())
            .field("queues", &self.strategy.queue_count())
            .field("dirty", &self.dirty)
            .field("closed", &self.closed)
            .finish()
    }
}
