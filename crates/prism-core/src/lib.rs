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

//! # Prism Core
//!
//! Foundational crate containing the GPU pipeline contract, core types, and
//! the primitives every other layer of the renderer is built on.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod layers;
pub mod pool;
pub mod renderer;
pub mod service_registry;
pub mod telemetry;

pub use config::{PassConfig, QueueOrdering, RenderSettings};
pub use error::{ConfigError, RegistrationError, RenderError, ResourceError, ResourceKind};
pub use layers::{LayerRegistry, DEFAULT_LAYER};
pub use pool::{Pool, PoolHandle};
