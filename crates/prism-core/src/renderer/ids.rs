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

//! Opaque identifiers for physical GPU objects and render contexts.

macro_rules! gpu_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub i32);

        impl $name {
            /// The id of an object that does not exist.
            pub const INVALID: $name = $name(-1);

            /// Returns `true` unless this is [`Self::INVALID`] (or any negative id).
            pub fn is_valid(&self) -> bool {
                self.0 >= 0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

gpu_id!(
    /// A physical buffer (uniform, storage, vertex or index) owned by the pipeline.
    BufferId
);
gpu_id!(
    /// A physical texture owned by the pipeline.
    TextureId
);
gpu_id!(
    /// A physical framebuffer. [`FrameBufferId::INVALID`] designates the swapchain.
    FrameBufferId
);
gpu_id!(
    /// A compiled shader program (pipeline state object) tied to one framebuffer configuration.
    ProgramId
);
gpu_id!(
    /// A physical descriptor set allocated against a shader program layout.
    DescriptorSetId
);

/// An opaque identifier for "where" a resource is used: the current shader
/// program or the current framebuffer.
///
/// Virtual resources keep one backing per context identifier. Program and
/// framebuffer identifiers live in disjoint namespaces so they can never
/// collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

impl ContextId {
    /// The identifier under which shared (context-independent) backings are stored.
    pub const SHARED: ContextId = ContextId(0);

    const PROGRAM_TAG: u64 = 1 << 62;
    const FRAMEBUFFER_TAG: u64 = 1 << 63;

    /// The context identifier of a bound shader program.
    pub fn of_program(program: ProgramId) -> Self {
        ContextId(Self::PROGRAM_TAG | program.0 as u32 as u64)
    }

    /// The context identifier of a framebuffer; the swapchain has its own identifier.
    pub fn of_framebuffer(framebuffer: FrameBufferId) -> Self {
        ContextId(Self::FRAMEBUFFER_TAG | framebuffer.0 as u32 as u64)
    }

    /// Returns `true` for identifiers created by [`ContextId::of_program`].
    pub fn is_program(&self) -> bool {
        self.0 & Self::PROGRAM_TAG != 0 && self.0 & Self::FRAMEBUFFER_TAG == 0
    }

    /// Returns `true` for identifiers created by [`ContextId::of_framebuffer`].
    pub fn is_framebuffer(&self) -> bool {
        self.0 & Self::FRAMEBUFFER_TAG != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_ids() {
        assert!(!BufferId::INVALID.is_valid());
        assert!(BufferId(0).is_valid());
        assert_eq!(ProgramId::default(), ProgramId::INVALID);
    }

    #[test]
    fn test_context_namespaces_are_disjoint() {
        let program = ContextId::of_program(ProgramId(3));
        let framebuffer = ContextId::of_framebuffer(FrameBufferId(3));
        let swapchain = ContextId::of_framebuffer(FrameBufferId::INVALID);

        assert_ne!(program, framebuffer);
        assert_ne!(swapchain, framebuffer);
        assert_ne!(program, ContextId::SHARED);
        assert!(program.is_program());
        assert!(!program.is_framebuffer());
        assert!(swapchain.is_framebuffer());
        assert!(!ContextId::SHARED.is_program());
    }
}
