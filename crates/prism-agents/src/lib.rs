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

//! # Prism Agents
//!
//! Frame orchestration. The [`RenderAgent`] owns a [`RenderContext`] (backend,
//! shaders, GPU resource lifecycle) and drives every [`RenderScene`] through
//! its per-frame state machine.

#![warn(missing_docs)]

pub mod agent;
pub mod camera;
pub mod context;
pub mod deferred;
pub mod error;
pub mod scene;
pub mod technique;

pub use agent::{RenderAgent, SceneHandle};
pub use camera::{sort_cameras, Camera, CameraSelection, SharedCamera};
pub use context::{RenderContext, ResourceEvent};
pub use deferred::DeferredDestroyQueue;
pub use error::SceneError;
pub use scene::{Overlay, RenderScene};
pub use technique::{RenderTechnique, TechniquePass};
