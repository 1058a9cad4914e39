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

use criterion::{criterion_group, criterion_main, Criterion};
use prism_core::renderer::{ShaderCreateInfo, TextureId};
use prism_core::{LayerRegistry, PassConfig, QueueOrdering};
use prism_data::{
    Geometry, GpuContext, Material, Mesh, MeshKind, MeshPool, ResourceManagers, Shader, ShaderLibrary,
};
use prism_infra::HeadlessPipeline;
use prism_lanes::{MeshDrawerPass, RenderStrategy};
use std::hint::black_box;
use std::sync::Arc;

const MESHES: usize = 5_000;
const SHADERS: usize = 8;
const GEOMETRIES: usize = 32;

fn populate(ordering: QueueOrdering) -> (RenderStrategy, MeshPool, ShaderLibrary, LayerRegistry) {
    let mut shaders = ShaderLibrary::new();
    let handles: Vec<_> = (0..SHADERS)
        .filter_map(|i| Shader::new(ShaderCreateInfo::new(&format!("shader_{i}"))).ok())
        .filter_map(|shader| shaders.insert(shader).ok())
        .collect();
    let geometries: Vec<_> = (0..GEOMETRIES).map(|_| Arc::new(Geometry::quad())).collect();

    let layers = LayerRegistry::new();
    let mut strategy = RenderStrategy::new(ordering, false);
    let drawer = MeshDrawerPass::from_config(PassConfig::default(), &shaders);
    let _ = strategy.build_queue(Box::new(drawer), &layers);

    let mut meshes = MeshPool::new();
    for i in 0..MESHES {
        // Interleave shaders so insertion order does not cluster runs.
        let mesh = Mesh::new(
            "bench",
            MeshKind::Static,
            geometries[i % GEOMETRIES].clone(),
            Material::new(handles[i % handles.len()]),
        );
        let handle = meshes.insert(mesh);
        let _ = strategy.register_mesh(&mut meshes, handle);
    }
    (strategy, meshes, shaders, layers)
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("Registration");
    group.sample_size(20);

    for (name, ordering) in [("Sorted", QueueOrdering::Sorted), ("Insertion", QueueOrdering::Insertion)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let (strategy, ..) = populate(ordering);
                black_box(strategy.mesh_count());
            });
        });
    }

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("Replay");

    for (name, ordering) in [("Sorted", QueueOrdering::Sorted), ("Insertion", QueueOrdering::Insertion)] {
        let (mut strategy, mut meshes, mut shaders, _layers) = populate(ordering);
        let mut pipeline = HeadlessPipeline::new();
        let mut resources = ResourceManagers::new();
        let queue = strategy.queue_handles()[0];

        group.bench_function(name, |b| {
            b.iter(|| {
                let mut gpu = GpuContext::new(&mut pipeline, &mut resources, &mut shaders, TextureId::INVALID);
                let stats = strategy.render_queue(queue, &mut gpu, &mut meshes);
                let _ = strategy.update_queue(queue, &mut gpu, &meshes);
                black_box(stats.map(|s| s.drawn).unwrap_or_default());
                pipeline.clear_commands();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_registration, bench_replay);
criterion_main!(benches);
