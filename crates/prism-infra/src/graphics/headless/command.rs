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

//! Commands recorded by the headless backend.

use prism_core::renderer::{BufferId, DescriptorSetId, FrameBufferId, ProgramId};

/// One GPU command, as recorded by [`HeadlessPipeline`](super::HeadlessPipeline).
#[derive(Debug, Clone, PartialEq)]
pub enum HeadlessCommand {
    /// The current render target was cleared.
    Clear([f32; 4]),
    /// A program was bound.
    UseShader(ProgramId),
    /// A vertex buffer was bound.
    BindVbo(BufferId),
    /// An index buffer was bound.
    BindIbo(BufferId),
    /// A uniform buffer was bound.
    BindUbo(BufferId),
    /// A descriptor set was bound.
    BindDescriptorSet(DescriptorSetId),
    /// The bound uniform buffer received `len` bytes.
    UpdateUbo {
        /// Target buffer.
        buffer: BufferId,
        /// Uploaded length.
        len: usize,
    },
    /// The bound descriptor set was rewritten.
    UpdateDescriptorSet(DescriptorSetId),
    /// A non-indexed draw.
    Draw {
        /// Program in use.
        program: ProgramId,
        /// Vertex count.
        vertices: u32,
    },
    /// An indexed draw.
    DrawIndices {
        /// Program in use.
        program: ProgramId,
        /// Index count.
        indices: u32,
    },
    /// A render pass started on a framebuffer.
    BeginRender(FrameBufferId),
    /// The render pass ended.
    EndRender,
    /// The frame was submitted.
    Submit,
}

impl HeadlessCommand {
    /// Returns `true` for both draw kinds.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            HeadlessCommand::Draw { .. } | HeadlessCommand::DrawIndices { .. }
        )
    }
}
