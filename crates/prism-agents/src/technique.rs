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

//! The ordered passes a scene is drawn with.

use prism_core::{LayerRegistry, PassConfig, RegistrationError};
use prism_data::ShaderLibrary;
use prism_lanes::{FrameUniforms, MeshDrawerPass, QueueHandle, RenderStrategy};

/// One pass of a technique and the queue drawing it, once built.
#[derive(Debug, Clone)]
pub struct TechniquePass {
    /// Pass configuration.
    pub config: PassConfig,
    /// Queue of the pass, `None` until the technique is built.
    pub queue: Option<QueueHandle>,
}

/// An ordered list of passes, each backed by a queue of the scene's strategy.
///
/// Queues are created lazily, after meshes may already be registered; the
/// strategy fills each new queue with every registered mesh.
#[derive(Debug, Clone, Default)]
pub struct RenderTechnique {
    passes: Vec<TechniquePass>,
}

impl RenderTechnique {
    /// Creates an unbuilt technique from pass configurations, in draw order.
    pub fn new(passes: impl IntoIterator<Item = PassConfig>) -> Self {
        Self {
            passes: passes
                .into_iter()
                .map(|config| TechniquePass { config, queue: None })
                .collect(),
        }
    }

    /// The passes, in draw order.
    pub fn passes(&self) -> &[TechniquePass] {
        &self.passes
    }

    /// Returns `true` if every pass has a queue.
    pub fn is_built(&self) -> bool {
        self.passes.iter().all(|pass| pass.queue.is_some())
    }

    /// Creates the queues of the passes that have none.
    ///
    /// Returns the number of queues created.
    pub fn build(
        &mut self,
        strategy: &mut RenderStrategy,
        shaders: &ShaderLibrary,
        layers: &LayerRegistry,
    ) -> Result<usize, RegistrationError> {
        let mut created = 0;
        for pass in self.passes.iter_mut().filter(|pass| pass.queue.is_none()) {
            let drawer = MeshDrawerPass::from_config(pass.config.clone(), shaders);
            pass.queue = Some(strategy.build_queue(Box::new(drawer), layers)?);
            created += 1;
        }
        if created > 0 {
            log::debug!("RenderTechnique: built {created} pass queues");
        }
        Ok(created)
    }

    /// Removes every queue from `strategy`. The technique can be built again.
    pub fn clear(&mut self, strategy: &mut RenderStrategy) -> Result<(), RegistrationError> {
        for pass in &mut self.passes {
            if let Some(queue) = pass.queue.take() {
                strategy.remove_queue(queue)?;
            }
        }
        Ok(())
    }

    /// Queues of the built passes, in draw order.
    pub fn queues(&self) -> Vec<QueueHandle> {
        self.passes.iter().filter_map(|pass| pass.queue).collect()
    }

    /// Hands the camera and time of the frame to every pass.
    pub fn set_frame_uniforms(&self, strategy: &mut RenderStrategy, frame: FrameUniforms) {
        for queue in self.passes.iter().filter_map(|pass| pass.queue) {
            if let Some(queue) = strategy.queue_mut(queue) {
                queue.drawer_mut().set_frame_uniforms(frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::QueueOrdering;

    #[test]
    fn test_build_creates_one_queue_per_pass() {
        let mut technique = RenderTechnique::new([PassConfig::new("Opaque"), PassConfig::new("Overlay")]);
        let mut strategy = RenderStrategy::new(QueueOrdering::Sorted, false);
        let shaders = ShaderLibrary::new();
        let layers = LayerRegistry::new();

        assert!(!technique.is_built());
        assert_eq!(technique.build(&mut strategy, &shaders, &layers), Ok(2));
        assert_eq!(technique.build(&mut strategy, &shaders, &layers), Ok(0));
        assert!(technique.is_built());
        assert_eq!(strategy.queue_handles(), technique.queues().as_slice());

        technique.clear(&mut strategy).unwrap();
        assert_eq!(strategy.queue_count(), 0);
        assert!(!technique.is_built());
    }
}
