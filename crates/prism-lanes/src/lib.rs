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

//! Hot path of the renderer: mesh registration, per-pass draw queues and their replay.
//!
//! A [`RenderStrategy`] owns the registration of every mesh of a scene and
//! the [`RenderQueue`]s that observe it. Each queue draws through a
//! [`MeshDrawer`] and groups its meshes per layer, then per shader and
//! geometry, so replay binds each shader and vertex buffer once per run.

#![warn(missing_docs)]

pub mod diagnostics;
pub mod drawer;
pub mod error;
pub mod queue;
pub mod registration;
pub mod strategy;

pub use diagnostics::QueueDiagnostics;
pub use drawer::{FrameUniforms, MeshDrawer, MeshDrawerPass};
pub use error::DrawError;
pub use queue::{MeshInfo, MeshRenderQueue, QueueState, RenderQueue};
pub use registration::{MeshRegistrationInfo, ShaderUseInfo};
pub use strategy::{QueueHandle, RenderStrategy, StrategyCommand};
