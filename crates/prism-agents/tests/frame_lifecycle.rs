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

use prism_agents::{Camera, Overlay, RenderAgent, RenderContext, RenderScene, ResourceEvent, SceneError};
use prism_core::renderer::{Pipeline, ShaderCreateInfo, UniformKind};
use prism_core::service_registry::ServiceRegistry;
use prism_core::{PassConfig, RenderError, RenderSettings};
use prism_data::{Geometry, Material, Mesh, MeshKind, ShaderHandle};
use prism_infra::{HeadlessCommand, HeadlessPipeline};
use std::sync::Arc;

fn settings() -> RenderSettings {
    RenderSettings {
        close_retry_limit: 2,
        close_retry_interval_ms: 0,
        ..Default::default()
    }
}

fn context() -> RenderContext {
    RenderContext::new(Box::new(HeadlessPipeline::new()), settings()).unwrap()
}

fn headless(ctx: &mut RenderContext) -> &mut HeadlessPipeline {
    ctx.pipeline_as::<HeadlessPipeline>().unwrap()
}

fn lit_shader(ctx: &mut RenderContext, name: &str) -> ShaderHandle {
    ctx.create_shader(
        ShaderCreateInfo::new(name)
            .with_shared_uniform("VIEW_MATRIX", UniformKind::Mat4)
            .with_uniform("MODEL_MATRIX", UniformKind::Mat4),
    )
    .unwrap()
}

fn quad_mesh(shader: ShaderHandle) -> Mesh {
    Mesh::new(
        "quad",
        MeshKind::Static,
        Arc::new(Geometry::quad()),
        Material::new(shader),
    )
}

/// Renders until a frame needs no rebuild.
fn settle(scene: &mut RenderScene, ctx: &mut RenderContext) {
    for _ in 0..4 {
        ctx.prepare_frame();
        if !scene.render(ctx, 0.0).unwrap().rebuilt {
            return;
        }
    }
    panic!("scene never settled");
}

#[test]
fn test_empty_scene_presents_black_screen() {
    let mut ctx = context();
    let mut scene = RenderScene::new("empty", ctx.settings());

    ctx.prepare_frame();
    let stats = scene.render(&mut ctx, 0.0).unwrap();

    assert!(stats.black_screen);
    assert_eq!(stats.draw_calls(), 0);
    let pipeline = headless(&mut ctx);
    assert_eq!(pipeline.clear_count(), 1);
    assert_eq!(pipeline.submit_count(), 1);
    assert_eq!(pipeline.draw_count(), 0);

    scene.close(&mut ctx).unwrap();
    ctx.close().unwrap();
}

#[test]
fn test_scene_without_camera_is_black() {
    let mut ctx = context();
    let shader = lit_shader(&mut ctx, "lit");
    let mut scene = RenderScene::new("headless", ctx.settings());
    scene.add_mesh(quad_mesh(shader)).unwrap();

    ctx.prepare_frame();
    let stats = scene.render(&mut ctx, 0.0).unwrap();

    assert!(stats.black_screen);
    assert_eq!(headless(&mut ctx).draw_count(), 0);

    scene.close(&mut ctx).unwrap();
    ctx.close().unwrap();
}

#[test]
fn test_main_camera_draws_registered_meshes() {
    let mut ctx = context();
    let shader = lit_shader(&mut ctx, "lit");
    let mut scene = RenderScene::new("main", ctx.settings());
    let camera = Camera::new("main", 0).shared();
    scene.add_camera(&camera);
    scene.add_mesh(quad_mesh(shader)).unwrap();
    scene.add_mesh(quad_mesh(shader)).unwrap();

    ctx.prepare_frame();
    let stats = scene.render(&mut ctx, 0.5).unwrap();

    assert!(!stats.black_screen);
    assert!(stats.rebuilt);
    assert_eq!(stats.draw_calls(), 2);
    assert!(scene.main_camera().is_some());
    let pipeline = headless(&mut ctx);
    assert_eq!(pipeline.draw_count(), 2);
    assert_eq!(pipeline.submit_count(), 1);

    scene.close(&mut ctx).unwrap();
    ctx.close().unwrap();
}

#[test]
fn test_offscreen_camera_renders_before_main() {
    let mut ctx = context();
    let shader = lit_shader(&mut ctx, "lit");
    let target = ctx
        .create_framebuffer(&prism_core::renderer::FramebufferDesc::new(64, 64))
        .unwrap();
    let mut scene = RenderScene::new("mirror", ctx.settings());
    let main = Camera::new("main", 0).shared();
    let mut mirror = Camera::new("mirror", -1);
    mirror.target = target;
    let mirror = mirror.shared();
    scene.add_camera(&main);
    scene.add_camera(&mirror);
    scene.add_mesh(quad_mesh(shader)).unwrap();

    ctx.prepare_frame();
    let stats = scene.render(&mut ctx, 0.0).unwrap();

    assert_eq!(stats.draw_calls(), 2);
    let targets: Vec<_> = headless(&mut ctx)
        .commands()
        .iter()
        .filter_map(|c| match c {
            HeadlessCommand::BeginRender(fb) => Some(*fb),
            _ => None,
        })
        .collect();
    assert_eq!(
        targets,
        vec![target, prism_core::renderer::FrameBufferId::INVALID]
    );

    scene.close(&mut ctx).unwrap();
    ctx.close().unwrap();
}

#[test]
fn test_dirty_requests_coalesce_into_one_build() {
    let mut ctx = context();
    let shader = lit_shader(&mut ctx, "lit");
    let mut scene = RenderScene::new("dirty", ctx.settings());
    let camera = Camera::new("main", 0).shared();
    scene.add_camera(&camera);
    scene.add_mesh(quad_mesh(shader)).unwrap();
    settle(&mut scene, &mut ctx);
    let builds = scene.build_count();

    for _ in 0..10 {
        scene.set_dirty();
    }
    assert!(scene.is_dirty());
    ctx.prepare_frame();
    assert!(scene.render(&mut ctx, 0.0).unwrap().rebuilt);
    assert_eq!(scene.build_count(), builds + 1);
    assert!(!scene.is_dirty());

    ctx.prepare_frame();
    assert!(!scene.render(&mut ctx, 0.0).unwrap().rebuilt);
    assert_eq!(scene.build_count(), builds + 1);

    scene.close(&mut ctx).unwrap();
    ctx.close().unwrap();
}

#[test]
fn test_dropped_camera_falls_back_to_black_screen() {
    let mut ctx = context();
    let shader = lit_shader(&mut ctx, "lit");
    let mut scene = RenderScene::new("dropped", ctx.settings());
    let camera = Camera::new("main", 0).shared();
    scene.add_camera(&camera);
    scene.add_mesh(quad_mesh(shader)).unwrap();
    settle(&mut scene, &mut ctx);

    drop(camera);
    ctx.prepare_frame();
    let stats = scene.render(&mut ctx, 0.0).unwrap();

    assert!(stats.black_screen);
    assert!(scene.main_camera().is_none());

    scene.close(&mut ctx).unwrap();
    ctx.close().unwrap();
}

struct CountingOverlay(Arc<std::sync::atomic::AtomicUsize>);

impl Overlay for CountingOverlay {
    fn draw(&mut self, pipeline: &mut dyn Pipeline) {
        self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        pipeline.clear_buffers([1.0, 0.0, 1.0, 1.0]);
    }
}

#[test]
fn test_overlay_runs_every_frame() {
    let mut ctx = context();
    let mut scene = RenderScene::new("overlay", ctx.settings());
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    scene.set_overlay(Box::new(CountingOverlay(calls.clone())));

    for _ in 0..3 {
        ctx.prepare_frame();
        scene.render(&mut ctx, 0.0).unwrap();
    }

    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);

    scene.close(&mut ctx).unwrap();
    ctx.close().unwrap();
}

#[test]
fn test_removed_mesh_is_no_longer_drawn() {
    let mut ctx = context();
    let shader = lit_shader(&mut ctx, "lit");
    let mut scene = RenderScene::new("remove", ctx.settings());
    let camera = Camera::new("main", 0).shared();
    scene.add_camera(&camera);
    let kept = scene.add_mesh(quad_mesh(shader)).unwrap();
    let removed = scene.add_mesh(quad_mesh(shader)).unwrap();
    settle(&mut scene, &mut ctx);

    scene.remove_mesh(&mut ctx, removed).unwrap();
    assert_eq!(
        scene.remove_mesh(&mut ctx, removed).unwrap_err(),
        SceneError::MeshNotFound(removed)
    );
    ctx.prepare_frame();
    let stats = scene.render(&mut ctx, 0.0).unwrap();

    assert_eq!(stats.draw_calls(), 1);
    assert!(scene.mesh(kept).is_some());

    scene.close(&mut ctx).unwrap();
    ctx.close().unwrap();
}

#[test]
fn test_closed_scene_rejects_frames() {
    let mut ctx = context();
    let mut scene = RenderScene::new("closed", ctx.settings());

    scene.close(&mut ctx).unwrap();

    assert_eq!(
        scene.render(&mut ctx, 0.0).unwrap_err(),
        SceneError::Closed("closed".to_string())
    );
    ctx.close().unwrap();
}

#[test]
fn test_unclosed_scene_is_reported_as_leak() {
    let mut ctx = context();
    let shader = lit_shader(&mut ctx, "lit");
    let mut scene = RenderScene::new("leaky", ctx.settings());
    let camera = Camera::new("main", 0).shared();
    scene.add_camera(&camera);
    scene.add_mesh(quad_mesh(shader)).unwrap();
    ctx.prepare_frame();
    scene.render(&mut ctx, 0.0).unwrap();

    let result = ctx.close();

    assert!(matches!(result, Err(RenderError::ResourceLeak { remaining }) if remaining > 0));
    assert_eq!(ctx.close(), Err(RenderError::ContextClosed));
}

#[test]
fn test_closed_scenes_release_everything() {
    let mut ctx = context();
    let shader = lit_shader(&mut ctx, "lit");
    let mut scene = RenderScene::new("clean", ctx.settings());
    let camera = Camera::new("main", 0).shared();
    scene.add_camera(&camera);
    scene.add_mesh(quad_mesh(shader)).unwrap();
    settle(&mut scene, &mut ctx);

    scene.close(&mut ctx).unwrap();

    assert_eq!(ctx.close(), Ok(()));
    assert_eq!(ctx.pending_resources(), 0);
}

#[test]
fn test_shader_change_from_another_thread_triggers_rebuild() {
    let mut ctx = context();
    let shader = lit_shader(&mut ctx, "lit");
    let mut scene = RenderScene::new("reload", ctx.settings());
    let camera = Camera::new("main", 0).shared();
    scene.add_camera(&camera);
    scene.add_mesh(quad_mesh(shader)).unwrap();
    settle(&mut scene, &mut ctx);

    let sender = ctx.event_sender();
    std::thread::spawn(move || {
        sender
            .send(ResourceEvent::ShaderChanged {
                name: "lit".to_string(),
                info: None,
            })
            .unwrap();
        sender
            .send(ResourceEvent::ShaderChanged {
                name: "missing".to_string(),
                info: None,
            })
            .unwrap();
    })
    .join()
    .unwrap();

    ctx.prepare_frame();
    let changed = ctx.take_changed_shaders();
    assert_eq!(changed, vec![shader]);
    scene.on_shaders_changed(&changed);
    let stats = scene.render(&mut ctx, 0.0).unwrap();

    assert!(stats.rebuilt);
    assert_eq!(stats.draw_calls(), 1);

    scene.close(&mut ctx).unwrap();
    ctx.close().unwrap();
}

#[test]
fn test_override_shader_change_dirties_the_meshes_it_draws() {
    let mut overridden = PassConfig::new("depth-only");
    overridden.override_shader = Some("depth".to_string());
    let mut ctx = RenderContext::new(
        Box::new(HeadlessPipeline::new()),
        RenderSettings {
            technique: vec![overridden],
            ..settings()
        },
    )
    .unwrap();
    let lit = lit_shader(&mut ctx, "lit");
    let depth = ctx
        .create_shader(
            ShaderCreateInfo::new("depth")
                .with_uniform("MODEL_MATRIX", UniformKind::Mat4)
                .with_uniform("VIEW_MATRIX", UniformKind::Mat4),
        )
        .unwrap();
    let mut scene = RenderScene::new("override", ctx.settings());
    let camera = Camera::new("main", 0).shared();
    scene.add_camera(&camera);
    let mesh = scene.add_mesh(quad_mesh(lit)).unwrap();
    settle(&mut scene, &mut ctx);
    assert!(!scene.mesh(mesh).unwrap().is_material_dirty());

    scene.on_shaders_changed(&[depth]);

    assert!(scene.mesh(mesh).unwrap().is_material_dirty());
    assert_eq!(scene.strategy().pending_count(), 1);

    ctx.prepare_frame();
    let stats = scene.render(&mut ctx, 0.0).unwrap();
    assert!(stats.rebuilt);
    assert_eq!(stats.draw_calls(), 1);
    assert!(!scene.mesh(mesh).unwrap().is_material_dirty());
    assert_eq!(headless(&mut ctx).rejected_ubo_updates(), 0);

    scene.close(&mut ctx).unwrap();
    ctx.close().unwrap();
}

#[test]
fn test_agent_renders_every_scene() {
    let mut services = ServiceRegistry::new();
    services.insert(settings());
    let mut agent = RenderAgent::new(Box::new(HeadlessPipeline::new()), &services).unwrap();
    let shader = lit_shader(agent.context_mut(), "lit");
    let camera = Camera::new("main", 0).shared();

    let world = agent.create_scene("world");
    let ui = agent.create_scene("ui");
    {
        let scene = agent.scene_mut(world).unwrap();
        scene.add_camera(&camera);
        scene.add_mesh(quad_mesh(shader)).unwrap();
    }

    let stats = agent.render_frame().unwrap();

    assert_eq!(stats.frame_number, 1);
    assert_eq!(stats.draw_calls(), 1);
    // The camera-less scene falls back to the black screen.
    assert!(stats.black_screen);
    assert_eq!(agent.scenes(), &[world, ui]);
    assert_eq!(agent.last_stats(), &stats);

    agent.remove_scene(ui).unwrap();
    assert!(agent.scene(ui).is_none());
    agent.render_frame().unwrap();

    assert_eq!(agent.shutdown(), Ok(()));
    assert!(agent.render_frame().is_err());
}
