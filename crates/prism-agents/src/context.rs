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

//! The render context: backend, GPU resources and their lifecycle.

use crate::deferred::DeferredDestroyQueue;
use ahash::AHashSet;
use prism_core::event::EventBus;
use prism_core::renderer::{
    FrameBufferId, FramebufferDesc, Pipeline, ShaderCreateInfo, TextureDesc, TextureId,
};
use prism_core::{LayerRegistry, RenderError, RenderSettings};
use prism_data::{GpuContext, Mesh, ResourceManagers, Shader, ShaderHandle, ShaderLibrary};
use std::time::Duration;

/// Signals about GPU resources, published from any thread and applied by
/// [`RenderContext::prepare_frame`] on the render thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    /// A shader source changed on disk.
    ShaderChanged {
        /// Name of the shader.
        name: String,
        /// New create info, or `None` to recompile the current one.
        info: Option<ShaderCreateInfo>,
    },
    /// Requests a garbage collection pass of the virtual resources.
    CollectGarbage,
}

/// Owns the backend and everything allocated through it.
///
/// Released shaders, textures and framebuffers are kept alive for
/// `frames_in_flight` frames before being freed.
pub struct RenderContext {
    pipeline: Box<dyn Pipeline>,
    resources: ResourceManagers,
    shaders: ShaderLibrary,
    default_texture: TextureId,
    textures: AHashSet<TextureId>,
    framebuffers: AHashSet<FrameBufferId>,
    layers: LayerRegistry,
    settings: RenderSettings,
    events: EventBus<ResourceEvent>,
    changed_shaders: Vec<ShaderHandle>,
    destroyed_shaders: DeferredDestroyQueue<Shader>,
    destroyed_textures: DeferredDestroyQueue<TextureId>,
    destroyed_framebuffers: DeferredDestroyQueue<FrameBufferId>,
    frame: u64,
    closed: bool,
}

impl RenderContext {
    /// Creates a context on `pipeline` and uploads the default texture.
    pub fn new(mut pipeline: Box<dyn Pipeline>, settings: RenderSettings) -> Result<Self, RenderError> {
        let default_texture = pipeline.allocate_texture(&TextureDesc::rgba8(1, 1), &[255; 4])?;
        log::info!(
            "RenderContext: initialized on '{}' with {} frames in flight",
            pipeline.name(),
            settings.frames_in_flight
        );
        Ok(Self {
            pipeline,
            resources: ResourceManagers::new(),
            shaders: ShaderLibrary::new(),
            default_texture,
            textures: AHashSet::new(),
            framebuffers: AHashSet::new(),
            layers: LayerRegistry::from_layers(settings.layers.iter().cloned()),
            events: EventBus::new(),
            changed_shaders: Vec::new(),
            destroyed_shaders: DeferredDestroyQueue::new(settings.frames_in_flight),
            destroyed_textures: DeferredDestroyQueue::new(settings.frames_in_flight),
            destroyed_framebuffers: DeferredDestroyQueue::new(settings.frames_in_flight),
            frame: 0,
            closed: false,
            settings,
        })
    }

    /// Housekeeping before any scene renders.
    ///
    /// Applies resource events, frees objects whose frames in flight are
    /// over, and collects virtual resources when framebuffers changed or a
    /// collection was requested. Returns the number of backings collected.
    pub fn prepare_frame(&mut self) -> usize {
        self.frame += 1;
        let framebuffers_changed = self.pipeline.is_framebuffers_changed();
        self.pipeline.prepare_frame();

        self.apply_events();
        self.release_ready();

        if framebuffers_changed || self.resources.take_collect_request() {
            self.resources.collect_unused(self.pipeline.as_mut())
        } else {
            0
        }
    }

    fn apply_events(&mut self) {
        for event in self.events.drain() {
            match event {
                ResourceEvent::ShaderChanged { name, info } => {
                    let Some(handle) = self.shaders.find(&name) else {
                        log::debug!("RenderContext: ignoring change of unknown shader '{name}'");
                        continue;
                    };
                    let Some(shader) = self.shaders.get_mut(handle) else {
                        continue;
                    };
                    match info {
                        Some(info) => {
                            if let Err(e) = shader.reload_with(info) {
                                log::error!("RenderContext: cannot reload shader '{name}': {e}");
                                continue;
                            }
                        }
                        None => shader.mark_reload(),
                    }
                    if !self.changed_shaders.contains(&handle) {
                        self.changed_shaders.push(handle);
                    }
                }
                ResourceEvent::CollectGarbage => self.resources.request_collect(),
            }
        }
    }

    fn release_ready(&mut self) {
        let frame = self.frame;
        for mut shader in self.destroyed_shaders.drain_ready(frame) {
            shader.free_video_memory(self.pipeline.as_mut(), &mut self.resources);
        }
        for mut texture in self.destroyed_textures.drain_ready(frame) {
            self.pipeline.free_texture(&mut texture);
        }
        for mut framebuffer in self.destroyed_framebuffers.drain_ready(frame) {
            self.pipeline.free_framebuffer(&mut framebuffer);
        }
    }

    /// Takes the shaders changed by resource events since the last call.
    pub fn take_changed_shaders(&mut self) -> Vec<ShaderHandle> {
        std::mem::take(&mut self.changed_shaders)
    }

    /// Adds a shader to the library. Compilation happens on first use.
    pub fn create_shader(&mut self, info: ShaderCreateInfo) -> Result<ShaderHandle, RenderError> {
        let shader = Shader::new(info)?;
        Ok(self.shaders.insert(shader)?)
    }

    /// Removes a shader. Its GPU objects are freed once the frames in flight are over.
    pub fn destroy_shader(&mut self, handle: ShaderHandle) -> bool {
        match self.shaders.remove(handle) {
            Some(shader) => {
                self.destroyed_shaders.push(self.frame, shader);
                true
            }
            None => false,
        }
    }

    /// Creates an off-screen render target.
    pub fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FrameBufferId, RenderError> {
        let framebuffer = self.pipeline.allocate_framebuffer(desc)?;
        self.framebuffers.insert(framebuffer);
        Ok(framebuffer)
    }

    /// Schedules a render target for destruction.
    pub fn destroy_framebuffer(&mut self, framebuffer: FrameBufferId) -> bool {
        if !self.framebuffers.remove(&framebuffer) {
            return false;
        }
        self.destroyed_framebuffers.push(self.frame, framebuffer);
        true
    }

    /// Uploads a texture.
    pub fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> Result<TextureId, RenderError> {
        let texture = self.pipeline.allocate_texture(desc, pixels)?;
        self.textures.insert(texture);
        Ok(texture)
    }

    /// Schedules a texture for destruction.
    pub fn destroy_texture(&mut self, texture: TextureId) -> bool {
        if !self.textures.remove(&texture) {
            return false;
        }
        self.destroyed_textures.push(self.frame, texture);
        true
    }

    /// Frees the GPU state of a mesh leaving its scene.
    pub fn free_mesh_memory(&mut self, mesh: &mut Mesh) {
        mesh.free_video_memory(self.pipeline.as_mut(), &mut self.resources);
    }

    /// Borrows the render state for a frame phase.
    pub fn gpu(&mut self) -> GpuContext<'_> {
        GpuContext::new(
            self.pipeline.as_mut(),
            &mut self.resources,
            &mut self.shaders,
            self.default_texture,
        )
    }

    /// The backend.
    pub fn pipeline(&self) -> &dyn Pipeline {
        self.pipeline.as_ref()
    }

    /// The backend, mutably.
    pub fn pipeline_mut(&mut self) -> &mut dyn Pipeline {
        self.pipeline.as_mut()
    }

    /// The backend as its concrete type.
    pub fn pipeline_as<P: Pipeline + 'static>(&mut self) -> Option<&mut P> {
        self.pipeline.as_any_mut().downcast_mut::<P>()
    }

    /// Virtual resource managers.
    pub fn resources(&self) -> &ResourceManagers {
        &self.resources
    }

    /// Virtual resource managers, mutably.
    pub fn resources_mut(&mut self) -> &mut ResourceManagers {
        &mut self.resources
    }

    /// The shader library.
    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    /// The shader library, mutably.
    pub fn shaders_mut(&mut self) -> &mut ShaderLibrary {
        &mut self.shaders
    }

    /// Texture used for samplers nothing else fills.
    pub fn default_texture(&self) -> TextureId {
        self.default_texture
    }

    /// The global render layers.
    pub fn layers(&self) -> &LayerRegistry {
        &self.layers
    }

    /// The global render layers, mutably.
    pub fn layers_mut(&mut self) -> &mut LayerRegistry {
        &mut self.layers
    }

    /// The settings the context was created with.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// A sender for resource events, usable from any thread.
    pub fn event_sender(&self) -> flume::Sender<ResourceEvent> {
        self.events.sender()
    }

    /// Number of frames prepared so far.
    pub fn frame_number(&self) -> u64 {
        self.frame
    }

    /// Returns `true` once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Objects still waiting for destruction or still allocated.
    pub fn pending_resources(&self) -> usize {
        self.resources.live_count()
            + self.destroyed_shaders.len()
            + self.destroyed_textures.len()
            + self.destroyed_framebuffers.len()
    }

    /// Releases every owned object and waits until all resources are freed.
    ///
    /// Scenes must be closed first: their meshes hold virtual resources.
    /// Draining is retried `close_retry_limit` times, `close_retry_interval_ms`
    /// apart. Whatever is still alive afterwards is reported as a leak.
    pub fn close(&mut self) -> Result<(), RenderError> {
        if self.closed {
            return Err(RenderError::ContextClosed);
        }
        self.closed = true;

        for handle in self.shaders.handles() {
            if let Some(shader) = self.shaders.remove(handle) {
                self.destroyed_shaders.push(self.frame, shader);
            }
        }
        for texture in self.textures.drain() {
            self.destroyed_textures.push(self.frame, texture);
        }
        for framebuffer in self.framebuffers.drain() {
            self.destroyed_framebuffers.push(self.frame, framebuffer);
        }
        let default_texture = std::mem::replace(&mut self.default_texture, TextureId::INVALID);
        self.destroyed_textures.push(self.frame, default_texture);

        let limit = self.settings.close_retry_limit.max(1);
        let interval = Duration::from_millis(self.settings.close_retry_interval_ms);
        for attempt in 1..=limit {
            // The library is empty: pending reloads have nothing left to apply to.
            let _ = self.events.drain();
            self.release_all();
            self.resources.collect_unused(self.pipeline.as_mut());

            let remaining = self.pending_resources();
            if remaining == 0 {
                log::info!("RenderContext: closed after {attempt} drain attempts");
                return Ok(());
            }
            log::warn!("RenderContext: {remaining} resources still alive (attempt {attempt}/{limit})");
            if attempt < limit {
                std::thread::sleep(interval);
            }
        }

        let remaining = self.pending_resources();
        log::error!("RenderContext: {remaining} resources leaked at shutdown");
        Err(RenderError::ResourceLeak { remaining })
    }

    fn release_all(&mut self) {
        for mut shader in self.destroyed_shaders.drain_all() {
            shader.free_video_memory(self.pipeline.as_mut(), &mut self.resources);
        }
        for mut texture in self.destroyed_textures.drain_all() {
            self.pipeline.free_texture(&mut texture);
        }
        for mut framebuffer in self.destroyed_framebuffers.drain_all() {
            self.pipeline.free_framebuffer(&mut framebuffer);
        }
    }

    /// Closes the context and aborts the process on a leak.
    ///
    /// Leaked GPU objects cannot be recovered; continuing would run the next
    /// session on a corrupted device.
    pub fn close_or_abort(&mut self) {
        if let Err(e) = self.close() {
            log::error!("RenderContext: fatal error while closing: {e}");
            std::process::abort();
        }
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!("RenderContext: dropped without close, GPU objects are leaked");
        }
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("pipeline", &self.pipeline.name())
            .field("shaders", &self.shaders.len())
            .field("frame", &self.frame)
            .field("closed", &self.closed)
            .finish()
    }
}

