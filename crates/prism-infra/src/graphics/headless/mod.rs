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

//! An in-memory backend that executes nothing and records everything.
//!
//! The headless pipeline keeps a table of every live GPU object, enforces the
//! same id rules a real backend would (double frees are refused, freed ids are
//! never reused) and records the command stream, which makes it the backend of
//! choice for tests, benchmarks and machines without a GPU.

mod command;
mod pipeline;

pub use command::HeadlessCommand;
pub use pipeline::HeadlessPipeline;
