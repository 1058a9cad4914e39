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

//! Errors collected while replaying queues.

use crate::error::DrawError;
use ahash::AHashSet;
use prism_data::MeshHandle;

/// Deduplicated draw errors and, in debug mode, the meshes that caused them.
///
/// Nothing is cleared automatically: errors stay until [`clear`](Self::clear)
/// is called, so a problem that happens every frame is reported once and a
/// problem that stopped happening is still visible.
#[derive(Debug, Default)]
pub struct QueueDiagnostics {
    errors: Vec<String>,
    seen: AHashSet<String>,
    problem_meshes: AHashSet<MeshHandle>,
    debug_mode: bool,
}

impl QueueDiagnostics {
    /// Creates empty diagnostics.
    pub fn new(debug_mode: bool) -> Self {
        Self {
            debug_mode,
            ..Default::default()
        }
    }

    /// Enables or disables problem-mesh tagging.
    pub fn set_debug_mode(&mut self, enabled: bool) {
        self.debug_mode = enabled;
        if !enabled {
            self.problem_meshes.clear();
        }
    }

    /// Returns `true` if problem meshes are tagged.
    pub fn is_debug_mode(&self) -> bool {
        self.debug_mode
    }

    /// Records an error, optionally caused by a specific mesh.
    pub fn report(&mut self, error: &DrawError, mesh: Option<MeshHandle>) {
        let message = error.to_string();
        if self.seen.insert(message.clone()) {
            log::error!("RenderQueue: {message}");
            self.errors.push(message);
        }
        if let Some(mesh) = mesh {
            self.tag(mesh);
        }
    }

    /// Tags `mesh` as faulty. Ignored outside debug mode.
    pub fn tag(&mut self, mesh: MeshHandle) {
        if self.debug_mode {
            self.problem_meshes.insert(mesh);
        }
    }

    /// Every distinct error, in the order first seen.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Meshes tagged as faulty.
    pub fn problem_meshes(&self) -> &AHashSet<MeshHandle> {
        &self.problem_meshes
    }

    /// Returns `true` if `mesh` is tagged as faulty.
    pub fn is_problem_mesh(&self, mesh: MeshHandle) -> bool {
        self.problem_meshes.contains(&mesh)
    }

    /// Forgets every error and tag.
    pub fn clear(&mut self) {
        self.errors.clear();
        self.seen.clear();
        self.problem_meshes.clear();
    }

    /// Returns `true` if nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.problem_meshes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_are_deduplicated() {
        let mut diagnostics = QueueDiagnostics::new(false);
        let error = DrawError::ShaderUnavailable {
            name: "lit".to_string(),
        };

        diagnostics.report(&error, None);
        diagnostics.report(&error, None);
        assert_eq!(diagnostics.errors().len(), 1);

        diagnostics.clear();
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_meshes_tagged_only_in_debug() {
        let error = DrawError::GeometryUnavailable {
            mesh: "quad".to_string(),
        };
        let mesh = MeshHandle(prism_core::PoolHandle {
            index: 0,
            generation: 0,
        });

        let mut release = QueueDiagnostics::new(false);
        release.report(&error, Some(mesh));
        assert!(!release.is_problem_mesh(mesh));

        let mut debug = QueueDiagnostics::new(true);
        debug.report(&error, Some(mesh));
        assert!(debug.is_problem_mesh(mesh));
    }
}
