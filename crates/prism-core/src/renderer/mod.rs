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

//! The GPU-facing contract of the renderer and the plain data it exchanges.

pub mod ids;
pub mod pipeline;
pub mod types;
pub mod uniform;

pub use self::ids::*;
pub use self::pipeline::Pipeline;
pub use self::types::*;
pub use self::uniform::{UniformId, UniformKind, UniformValue};
