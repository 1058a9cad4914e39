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

//! Defines the `Pipeline` trait, the contract every GPU backend implements.

use super::ids::{BufferId, ContextId, DescriptorSetId, FrameBufferId, ProgramId, TextureId};
use super::types::{
    DescriptorKind, FramebufferDesc, FramebufferSpec, PipelineStats, ShaderCreateInfo, SsboUsage,
    TextureDesc,
};
use crate::error::ResourceError;
use ahash::AHashSet;
use std::any::Any;

/// A stateful, low-level GPU command interface.
///
/// This is the only seam between the renderer and the graphics API. Everything
/// above it (resource managers, shaders, queues) talks to the GPU exclusively
/// through this trait, which lets the whole render core run against an
/// in-memory backend in tests.
///
/// A pipeline is bound to the render thread: every method takes `&mut self`
/// (or `&self` for queries) and there is no `Send` bound. Allocation methods
/// return a fresh id or an error; `free_*` methods take the id by mutable
/// reference and reset it to `INVALID` when the object was released. Freeing
/// an already invalid id returns `false` and does nothing.
///
/// Binding state (current shader, current framebuffer, bound buffers) is
/// implicit, as in the underlying APIs. Two opaque identifiers are derived from
/// it: the current shader context and the current framebuffer context, which
/// resource managers use to key per-context backings.
pub trait Pipeline {
    /// A short human readable backend name, used in logs.
    fn name(&self) -> &str;

    // --- Uniform buffers ---

    /// Allocates a uniform buffer of `size` bytes.
    fn allocate_ubo(&mut self, size: usize) -> Result<BufferId, ResourceError>;
    /// Frees a uniform buffer and invalidates `id`.
    fn free_ubo(&mut self, id: &mut BufferId) -> bool;
    /// Binds a uniform buffer. Binding [`BufferId::INVALID`] unbinds.
    fn bind_ubo(&mut self, id: BufferId);
    /// Uploads `data` into the currently bound uniform buffer.
    fn update_ubo(&mut self, data: &[u8]);

    // --- Storage buffers ---

    /// Allocates a shader storage buffer of `size` bytes.
    fn allocate_ssbo(&mut self, size: usize, usage: SsboUsage) -> Result<BufferId, ResourceError>;
    /// Frees a storage buffer and invalidates `id`.
    fn free_ssbo(&mut self, id: &mut BufferId) -> bool;
    /// Binds a storage buffer.
    fn bind_ssbo(&mut self, id: BufferId);

    // --- Geometry ---

    /// Uploads vertex data into a new vertex buffer.
    fn allocate_vbo(&mut self, data: &[u8]) -> Result<BufferId, ResourceError>;
    /// Frees a vertex buffer and invalidates `id`.
    fn free_vbo(&mut self, id: &mut BufferId) -> bool;
    /// Binds a vertex buffer.
    fn bind_vbo(&mut self, id: BufferId);
    /// Uploads indices into a new index buffer.
    fn allocate_ibo(&mut self, indices: &[u32]) -> Result<BufferId, ResourceError>;
    /// Frees an index buffer and invalidates `id`.
    fn free_ibo(&mut self, id: &mut BufferId) -> bool;
    /// Binds an index buffer.
    fn bind_ibo(&mut self, id: BufferId);

    // --- Textures ---

    /// Creates a texture and uploads its base level.
    fn allocate_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: &[u8],
    ) -> Result<TextureId, ResourceError>;
    /// Frees a texture and invalidates `id`.
    fn free_texture(&mut self, id: &mut TextureId) -> bool;
    /// Stages `texture` for `binding` of the next descriptor set update.
    fn bind_texture(&mut self, binding: u32, texture: TextureId);

    // --- Framebuffers ---

    /// Creates an off-screen framebuffer.
    fn allocate_framebuffer(
        &mut self,
        desc: &FramebufferDesc,
    ) -> Result<FrameBufferId, ResourceError>;
    /// Frees a framebuffer and invalidates `id`.
    fn free_framebuffer(&mut self, id: &mut FrameBufferId) -> bool;
    /// Makes `id` the render target. [`FrameBufferId::INVALID`] selects the swapchain.
    fn set_current_framebuffer(&mut self, id: FrameBufferId);
    /// The current render target.
    fn current_framebuffer(&self) -> FrameBufferId;
    /// Spec of the current render target.
    fn current_framebuffer_spec(&self) -> FramebufferSpec;
    /// Snapshot of the contexts of every live framebuffer, swapchain included.
    fn framebuffer_contexts(&self) -> AHashSet<ContextId>;
    /// Returns `true` if a framebuffer was created or destroyed since the last
    /// [`prepare_frame`](Pipeline::prepare_frame).
    fn is_framebuffers_changed(&self) -> bool;

    /// The context identifier of the current render target.
    fn current_framebuffer_context(&self) -> ContextId {
        ContextId::of_framebuffer(self.current_framebuffer())
    }

    // --- Shader programs ---

    /// Compiles a program for the current framebuffer spec.
    fn allocate_shader_program(
        &mut self,
        info: &ShaderCreateInfo,
    ) -> Result<ProgramId, ResourceError>;
    /// Frees a program and invalidates `id`.
    fn free_shader_program(&mut self, id: &mut ProgramId) -> bool;
    /// Binds a program for drawing. Returns `false` if it cannot be bound.
    fn use_shader(&mut self, id: ProgramId) -> bool;
    /// Unbinds the current program.
    fn unuse_shader(&mut self);
    /// Records `id` as the current program without binding it, so per-shader
    /// resources can be prepared outside of a draw.
    fn set_current_shader(&mut self, id: ProgramId);
    /// The current program, or [`ProgramId::INVALID`].
    fn current_shader(&self) -> ProgramId;
    /// Returns `true` if the last [`use_shader`](Pipeline::use_shader) bound a
    /// different program than the one before it.
    fn is_shader_changed(&self) -> bool;
    /// Snapshot of the contexts of every live program.
    fn shader_contexts(&self) -> AHashSet<ContextId>;

    /// The context identifier of the current program, if one is current.
    fn current_shader_context(&self) -> Option<ContextId> {
        let current = self.current_shader();
        current.is_valid().then(|| ContextId::of_program(current))
    }

    // --- Descriptor sets ---

    /// Allocates a descriptor set with `layout` against the current program.
    fn allocate_descriptor_set(
        &mut self,
        layout: &[DescriptorKind],
    ) -> Result<DescriptorSetId, ResourceError>;
    /// Frees a descriptor set and invalidates `id`.
    fn free_descriptor_set(&mut self, id: &mut DescriptorSetId) -> bool;
    /// Binds a descriptor set.
    fn bind_descriptor_set(&mut self, id: DescriptorSetId);
    /// Writes the bound uniform buffer and the staged textures into the bound descriptor set.
    fn update_descriptor_sets(&mut self);

    // --- Drawing ---

    /// Draws `vertex_count` vertices from the bound vertex buffer.
    fn draw(&mut self, vertex_count: u32);
    /// Draws `index_count` indices from the bound index buffer.
    fn draw_indices(&mut self, index_count: u32);
    /// Clears the current render target.
    fn clear_buffers(&mut self, color: [f32; 4]);

    // --- Frame lifecycle ---

    /// Per-frame housekeeping. Clears the framebuffer and shader change flags.
    fn prepare_frame(&mut self);
    /// Starts recording draw commands.
    fn begin_build(&mut self);
    /// Ends recording draw commands.
    fn end_build(&mut self);
    /// Starts a render pass on the current framebuffer.
    fn begin_render(&mut self);
    /// Ends the current render pass.
    fn end_render(&mut self);
    /// Submits the recorded frame.
    fn submit(&mut self);

    /// Returns `true` if recorded commands must be rebuilt.
    fn is_dirty(&self) -> bool;
    /// Marks recorded commands as stale (or fresh).
    fn set_dirty(&mut self, dirty: bool);

    /// Cumulative counters.
    fn stats(&self) -> PipelineStats;

    /// Allows downcasting to the concrete backend.
    fn as_any(&self) -> &dyn Any;
    /// Allows mutable downcasting to the concrete backend.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
