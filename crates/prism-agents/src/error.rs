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

//! Errors raised while driving scenes.

use prism_core::{RegistrationError, RenderError, ResourceError};
use prism_data::MeshHandle;
use thiserror::Error;

/// An error from a [`RenderScene`](crate::RenderScene) or the [`RenderAgent`](crate::RenderAgent).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    /// Mesh registration rejected the operation.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A GPU object could not be created.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// The render context failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The handle does not resolve to a mesh of the scene.
    #[error("mesh {0:?} does not exist in this scene")]
    MeshNotFound(MeshHandle),

    /// The handle does not resolve to a scene of the agent.
    #[error("scene {0:?} does not exist")]
    SceneNotFound(prism_core::PoolHandle),

    /// The scene was closed.
    #[error("scene '{0}' is closed")]
    Closed(String),
}
