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

// Prism Sandbox
// Drives a small scene on the headless backend and logs frame statistics.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use prism_agents::{Camera, RenderAgent, ResourceEvent};
use prism_core::renderer::{ShaderCreateInfo, UniformKind};
use prism_core::service_registry::ServiceRegistry;
use prism_core::RenderSettings;
use prism_data::{Geometry, Material, Mesh, MeshKind};
use prism_infra::HeadlessPipeline;

const FRAME_COUNT: u64 = 120;
const RELOAD_FRAME: u64 = 60;

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/render.ron");
    let settings = RenderSettings::load_or_default(&settings_path)
        .with_context(|| format!("loading {}", settings_path.display()))?;

    let mut services = ServiceRegistry::new();
    services.insert(settings);
    let mut agent = RenderAgent::new(Box::new(HeadlessPipeline::new()), &services)?;

    let lit = agent.context_mut().create_shader(
        ShaderCreateInfo::new("lit")
            .with_shared_uniform("VIEW_MATRIX", UniformKind::Mat4)
            .with_shared_uniform("PROJECTION_MATRIX", UniformKind::Mat4)
            .with_uniform("MODEL_MATRIX", UniformKind::Mat4)
            .with_uniform("BASE_COLOR", UniformKind::Vec4),
    )?;
    let glass = agent.context_mut().create_shader(
        ShaderCreateInfo::new("glass")
            .with_shared_uniform("VIEW_MATRIX", UniformKind::Mat4)
            .with_uniform("MODEL_MATRIX", UniformKind::Mat4),
    )?;

    let mut camera = Camera::new("main", 0);
    camera.position = Vec3::new(0.0, 2.0, 6.0);
    camera.view = Mat4::look_at_rh(camera.position, Vec3::ZERO, Vec3::Y);
    camera.projection = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
    let camera = camera.shared();

    let world = agent.create_scene("world");
    {
        let scene = agent
            .scene_mut(world)
            .context("scene vanished right after creation")?;
        scene.add_camera(&camera);

        let quad = Arc::new(Geometry::quad());
        for i in 0..16 {
            let transform = Mat4::from_translation(Vec3::new(i as f32 - 8.0, 0.0, 0.0));
            let mesh = Mesh::new("tile", MeshKind::Static, quad.clone(), Material::new(lit))
                .with_transform(transform);
            scene.add_mesh(mesh)?;
        }
        for i in 0..4 {
            let mesh = Mesh::new("pane", MeshKind::Static, quad.clone(), Material::new(glass))
                .with_layer("Transparent")
                .with_priority(i)
                .with_transform(Mat4::from_translation(Vec3::new(0.0, 1.0, i as f32)));
            scene.add_mesh(mesh)?;
        }
    }

    let events = agent.context().event_sender();
    for frame in 1..=FRAME_COUNT {
        if frame == RELOAD_FRAME {
            // Stands in for a file watcher thread.
            let events = events.clone();
            std::thread::spawn(move || {
                let _ = events.send(ResourceEvent::ShaderChanged {
                    name: "lit".to_string(),
                    info: None,
                });
            })
            .join()
            .map_err(|_| anyhow::anyhow!("shader watcher panicked"))?;
        }

        let stats = agent.render_frame()?;
        if stats.rebuilt || frame % 30 == 0 {
            log::info!(
                "Frame {}: {} draws, {} shader binds, rebuilt={}, {:.3} ms",
                stats.frame_number,
                stats.draw_calls(),
                stats.queues.shader_binds,
                stats.rebuilt,
                stats.cpu_frame_time_ms
            );
        }
    }

    if let Some(headless) = agent.context_mut().pipeline_as::<HeadlessPipeline>() {
        log::info!("Sandbox: {} live GPU objects before shutdown", headless.live_objects());
    }
    agent.shutdown()?;
    log::info!("Sandbox: shut down cleanly");
    Ok(())
}
