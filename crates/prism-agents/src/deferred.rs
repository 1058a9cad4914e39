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

//! Release of GPU objects the GPU may still be using.

use std::collections::VecDeque;

/// Holds released objects until every frame that could use them has completed.
///
/// An object pushed during frame `n` is ready at frame `n + frames_in_flight`.
#[derive(Debug)]
pub struct DeferredDestroyQueue<T> {
    frames_in_flight: u64,
    entries: VecDeque<(u64, T)>,
}

impl<T> DeferredDestroyQueue<T> {
    /// Creates an empty queue. A latency of zero releases objects at the next drain.
    pub fn new(frames_in_flight: u32) -> Self {
        Self {
            frames_in_flight: u64::from(frames_in_flight),
            entries: VecDeque::new(),
        }
    }

    /// Schedules `item`, released during `frame`.
    pub fn push(&mut self, frame: u64, item: T) {
        self.entries.push_back((frame, item));
    }

    /// Takes every object that is safe to destroy at `frame`, oldest first.
    pub fn drain_ready(&mut self, frame: u64) -> Vec<T> {
        let mut ready = Vec::new();
        while let Some((released, _)) = self.entries.front() {
            if released + self.frames_in_flight > frame {
                break;
            }
            if let Some((_, item)) = self.entries.pop_front() {
                ready.push(item);
            }
        }
        ready
    }

    /// Takes every object regardless of age. Used on shutdown, once the GPU is idle.
    pub fn drain_all(&mut self) -> Vec<T> {
        self.entries.drain(..).map(|(_, item)| item).collect()
    }

    /// Number of scheduled objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objects_wait_for_frames_in_flight() {
        let mut queue = DeferredDestroyQueue::new(2);
        queue.push(10, "a");
        queue.push(11, "b");

        assert!(queue.drain_ready(11).is_empty());
        assert_eq!(queue.drain_ready(12), vec!["a"]);
        assert_eq!(queue.drain_ready(20), vec!["b"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_all_ignores_age() {
        let mut queue = DeferredDestroyQueue::new(3);
        queue.push(5, 1);
        queue.push(6, 2);

        assert_eq!(queue.drain_all(), vec![1, 2]);
        assert_eq!(queue.len(), 0);
    }
}
