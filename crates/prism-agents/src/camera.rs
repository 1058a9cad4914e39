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

//! Cameras and main camera selection.

use glam::{Mat4, Vec3};
use prism_core::renderer::FrameBufferId;
use prism_lanes::FrameUniforms;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, Weak};

/// A camera shared between the scene graph and the renderer.
pub type SharedCamera = Arc<RwLock<Camera>>;

/// A point of view the scene is drawn from.
///
/// Cameras with a negative priority are off-screen: they render into their
/// target framebuffer for side effects (render to texture) and never become
/// the main camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Name used in logs.
    pub name: String,
    /// Selection priority. Negative means off-screen.
    pub priority: i32,
    /// Editor cameras only take part in selection in editor mode.
    pub editor: bool,
    /// View matrix.
    pub view: Mat4,
    /// Projection matrix.
    pub projection: Mat4,
    /// World position.
    pub position: Vec3,
    /// Render target. [`FrameBufferId::INVALID`] is the swapchain.
    pub target: FrameBufferId,
}

impl Camera {
    /// A swapchain camera at the origin with identity matrices.
    pub fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            editor: false,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
            target: FrameBufferId::INVALID,
        }
    }

    /// Wraps the camera for sharing.
    pub fn shared(self) -> SharedCamera {
        Arc::new(RwLock::new(self))
    }

    /// Returns `true` for cameras rendered only for their side effects.
    pub fn is_offscreen(&self) -> bool {
        self.priority < 0
    }

    /// Frame values for the passes, at `time`.
    pub fn frame_uniforms(&self, time: f32) -> FrameUniforms {
        FrameUniforms {
            view: self.view,
            projection: self.projection,
            position: self.position,
            time,
        }
    }
}

/// Reads a camera even if a writer panicked while holding it.
pub(crate) fn read(camera: &SharedCamera) -> RwLockReadGuard<'_, Camera> {
    camera.read().unwrap_or_else(PoisonError::into_inner)
}

/// Result of [`sort_cameras`].
#[derive(Debug, Default, Clone)]
pub struct CameraSelection {
    /// The on-screen camera with the highest priority.
    pub main: Option<SharedCamera>,
    /// Off-screen cameras, in registration order.
    pub offscreen: Vec<SharedCamera>,
    /// Number of expired cameras dropped.
    pub expired: usize,
}

/// Drops expired cameras and selects the main camera.
///
/// The first camera found wins a priority tie. Editor cameras are ignored
/// unless `editor_mode` is set.
pub fn sort_cameras(cameras: &mut Vec<Weak<RwLock<Camera>>>, editor_mode: bool) -> CameraSelection {
    let before = cameras.len();
    cameras.retain(|camera| camera.strong_count() > 0);
    let mut selection = CameraSelection {
        expired: before - cameras.len(),
        ..Default::default()
    };
    if selection.expired > 0 {
        log::warn!("RenderScene: dropped {} expired cameras", selection.expired);
    }

    let mut best: Option<i32> = None;
    for camera in cameras.iter().filter_map(Weak::upgrade) {
        let (priority, offscreen, editor) = {
            let guard = read(&camera);
            (guard.priority, guard.is_offscreen(), guard.editor)
        };
        if offscreen {
            selection.offscreen.push(camera);
            continue;
        }
        if editor && !editor_mode {
            continue;
        }
        if best.map_or(true, |best| priority > best) {
            best = Some(priority);
            selection.main = Some(camera);
        }
    }
    selection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_priority_wins_and_ties_keep_first() {
        let first = Camera::new("first", 5).shared();
        let second = Camera::new("second", 5).shared();
        let low = Camera::new("low", 1).shared();
        let mut cameras = vec![
            Arc::downgrade(&low),
            Arc::downgrade(&first),
            Arc::downgrade(&second),
        ];

        let selection = sort_cameras(&mut cameras, false);

        let main = selection.main.unwrap();
        assert!(Arc::ptr_eq(&main, &first));
    }

    #[test]
    fn test_expired_and_offscreen_cameras() {
        let shadow = Camera::new("shadow", -1).shared();
        let main = Camera::new("main", 0).shared();
        let mut cameras = vec![Arc::downgrade(&shadow), Arc::downgrade(&main)];
        {
            let gone = Camera::new("gone", 10).shared();
            cameras.push(Arc::downgrade(&gone));
        }

        let selection = sort_cameras(&mut cameras, false);

        assert_eq!(selection.expired, 1);
        assert_eq!(cameras.len(), 2);
        assert_eq!(selection.offscreen.len(), 1);
        assert!(Arc::ptr_eq(selection.main.as_ref().unwrap(), &main));
    }

    #[test]
    fn test_editor_cameras_need_editor_mode() {
        let mut editor = Camera::new("editor", 100);
        editor.editor = true;
        let editor = editor.shared();
        let game = Camera::new("game", 0).shared();
        let mut cameras = vec![Arc::downgrade(&editor), Arc::downgrade(&game)];

        let game_mode = sort_cameras(&mut cameras, false);
        assert!(Arc::ptr_eq(game_mode.main.as_ref().unwrap(), &game));

        let editor_mode = sort_cameras(&mut cameras, true);
        assert!(Arc::ptr_eq(editor_mode.main.as_ref().unwrap(), &editor));
    }
}
