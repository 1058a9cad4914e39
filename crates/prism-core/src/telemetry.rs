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

//! Per-frame statistics for the rendering system.

use std::ops::AddAssign;

/// Counters produced by replaying one render queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Meshes that issued a draw call.
    pub drawn: u32,
    /// Shader switches performed.
    pub shader_binds: u32,
    /// Vertex buffer switches performed.
    pub vbo_binds: u32,
    /// Runs of entries skipped because their shader could not be used.
    pub skipped_shader_runs: u32,
    /// Runs of entries skipped because their vertex buffer could not be bound.
    pub skipped_vbo_runs: u32,
    /// Meshes that failed individually (uniforms, descriptor sets, draw).
    pub failed_meshes: u32,
}

impl AddAssign for QueueStats {
    fn add_assign(&mut self, other: Self) {
        self.drawn += other.drawn;
        self.shader_binds += other.shader_binds;
        self.vbo_binds += other.vbo_binds;
        self.skipped_shader_runs += other.skipped_shader_runs;
        self.skipped_vbo_runs += other.skipped_vbo_runs;
        self.failed_meshes += other.failed_meshes;
    }
}

/// A collection of statistics for a single rendered frame of a scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// A sequential counter for rendered frames.
    pub frame_number: u64,
    /// Totals over every queue drawn this frame.
    pub queues: QueueStats,
    /// Whether the queues were rebuilt this frame.
    pub rebuilt: bool,
    /// Whether the black screen fallback was used.
    pub black_screen: bool,
    /// Virtual resource backings released by garbage collection this frame.
    pub collected_backings: usize,
    /// Wall-clock CPU time of the frame.
    pub cpu_frame_time_ms: f32,
}

impl FrameStats {
    /// Draw calls issued this frame.
    pub fn draw_calls(&self) -> u32 {
        self.queues.drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_stats_accumulate() {
        let mut total = QueueStats::default();
        total += QueueStats {
            drawn: 2,
            shader_binds: 1,
            ..Default::default()
        };
        total += QueueStats {
            drawn: 3,
            skipped_shader_runs: 1,
            ..Default::default()
        };

        assert_eq!(total.drawn, 5);
        assert_eq!(total.shader_binds, 1);
        assert_eq!(total.skipped_shader_runs, 1);
    }
}
