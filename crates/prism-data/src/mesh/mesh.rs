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

//! Drawable meshes.

use super::{Geometry, GeometryId, Material};
use crate::resources::{GeometryBuffers, ResourceManagers, VirtualDescriptorSet, VirtualUbo};
use crate::shader::{Shader, ShaderHandle};
use glam::{Mat4, Vec4};
use prism_core::renderer::uniform::{BONE_MATRICES, COLOR, MODEL_MATRIX, TEXTURE_RECT};
use prism_core::renderer::{BindResult, BufferId, Pipeline, TextureId, UniformId, UniformValue};
use prism_core::{PoolHandle, DEFAULT_LAYER};
use std::sync::Arc;

/// What a mesh is, and the uniforms that come with it.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshKind {
    /// A plain 3D mesh.
    Static,
    /// A mesh deformed by a bone palette.
    Skinned {
        /// Current bone matrices, supplied by the animation system.
        bones: Vec<Mat4>,
    },
    /// A textured quad showing a sub-rectangle of its texture.
    Sprite {
        /// Texture rectangle as `(u, v, width, height)`.
        rect: Vec4,
        /// Tint.
        color: Vec4,
    },
    /// A debug mesh drawn as lines in a single color.
    Wireframe {
        /// Line color.
        color: Vec4,
    },
}

impl MeshKind {
    /// Writes the uniforms specific to this kind.
    fn use_uniforms(&self, shader: &mut Shader) {
        match self {
            MeshKind::Static => {}
            MeshKind::Skinned { bones } => {
                shader.set_value(BONE_MATRICES, &UniformValue::Mat4Array(bones.clone()));
            }
            MeshKind::Sprite { rect, color } => {
                shader.set_value(TEXTURE_RECT, &UniformValue::Vec4(*rect));
                shader.set_value(COLOR, &UniformValue::Vec4(*color));
            }
            MeshKind::Wireframe { color } => {
                shader.set_value(COLOR, &UniformValue::Vec4(*color));
            }
        }
    }
}

/// A drawable: shared geometry, a material and the GPU state of one instance.
///
/// The mesh owns a virtual UBO and a virtual descriptor set. Both are created
/// on first draw and grow backings lazily for every shader program the mesh
/// ends up drawn with, so the same mesh can take part in several passes.
#[derive(Debug)]
pub struct Mesh {
    name: String,
    kind: MeshKind,
    geometry: Arc<Geometry>,
    gpu: Option<GeometryBuffers>,
    material: Material,
    layer: String,
    sort_priority: i32,
    transform: Mat4,
    active: bool,
    ubo: VirtualUbo,
    descriptor_set: VirtualDescriptorSet,
    registration: Option<PoolHandle>,
    has_errors: bool,
    uniforms_dirty: bool,
    material_dirty: bool,
}

impl Mesh {
    /// Creates an active mesh on the default layer.
    pub fn new(name: &str, kind: MeshKind, geometry: Arc<Geometry>, material: Material) -> Self {
        Self {
            name: name.to_string(),
            kind,
            geometry,
            gpu: None,
            material,
            layer: DEFAULT_LAYER.to_string(),
            sort_priority: 0,
            transform: Mat4::IDENTITY,
            active: true,
            ubo: VirtualUbo::INVALID,
            descriptor_set: VirtualDescriptorSet::INVALID,
            registration: None,
            has_errors: false,
            uniforms_dirty: true,
            material_dirty: true,
        }
    }

    /// Builder: puts the mesh on `layer`.
    pub fn with_layer(mut self, layer: &str) -> Self {
        self.layer = layer.to_string();
        self
    }

    /// Builder: sets the sort priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.sort_priority = priority;
        self
    }

    /// Builder: sets the model matrix.
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The mesh kind.
    pub fn kind(&self) -> &MeshKind {
        &self.kind
    }

    /// Replaces the kind-specific data (bones, sprite rect) and marks uniforms dirty.
    pub fn set_kind(&mut self, kind: MeshKind) {
        self.kind = kind;
        self.uniforms_dirty = true;
    }

    /// The shared geometry.
    pub fn geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }

    /// Identity of the geometry, the grouping key inside a shader run.
    pub fn geometry_id(&self) -> GeometryId {
        self.geometry.id()
    }

    /// The vertex buffer, [`BufferId::INVALID`] until first bound.
    pub fn vbo(&self) -> BufferId {
        self.gpu.map_or(BufferId::INVALID, |gpu| gpu.vbo)
    }

    /// The index buffer, [`BufferId::INVALID`] when not indexed or not uploaded.
    pub fn ibo(&self) -> BufferId {
        self.gpu.map_or(BufferId::INVALID, |gpu| gpu.ibo)
    }

    /// Returns `true` if the mesh takes part in rendering.
    pub fn is_mesh_active(&self) -> bool {
        self.active
    }

    /// Enables or disables the mesh without unregistering it.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Returns `true` if the mesh has vertex data living in a VBO.
    pub fn is_support_vbo(&self) -> bool {
        self.geometry.has_vertex_data()
    }

    /// The material.
    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Replaces the material. The mesh must be re-registered if the shader changed.
    pub fn set_material(&mut self, material: Material) {
        self.material = material;
        self.mark_material_dirty();
    }

    /// Sets a per-mesh uniform of the material.
    pub fn set_property(&mut self, id: UniformId, value: UniformValue) {
        self.material.set_property(id, value);
        self.uniforms_dirty = true;
    }

    /// Assigns a texture of the material. Descriptor sets are rewritten on next draw.
    pub fn set_texture(&mut self, id: UniformId, texture: TextureId) {
        self.material.set_texture(id, texture);
        self.mark_material_dirty();
    }

    /// The shader of the material.
    pub fn shader(&self) -> ShaderHandle {
        self.material.shader()
    }

    /// Render layer.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Moves the mesh to another layer. The mesh must be re-registered.
    pub fn set_layer(&mut self, layer: &str) {
        self.layer = layer.to_string();
    }

    /// Sort priority, filtered by passes.
    pub fn sort_priority(&self) -> i32 {
        self.sort_priority
    }

    /// Changes the sort priority. The mesh must be re-registered.
    pub fn set_sort_priority(&mut self, priority: i32) {
        self.sort_priority = priority;
    }

    /// Model matrix.
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// Moves the mesh.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
        self.uniforms_dirty = true;
    }

    /// The per-mesh uniform buffer.
    pub fn virtual_ubo(&self) -> VirtualUbo {
        self.ubo
    }

    /// The per-mesh descriptor set.
    pub fn virtual_descriptor_set(&self) -> VirtualDescriptorSet {
        self.descriptor_set
    }

    /// Stores the slot the mesh occupies in a render strategy.
    pub fn set_registration_info(&mut self, registration: Option<PoolHandle>) {
        self.registration = registration;
    }

    /// The slot the mesh occupies in a render strategy, if registered.
    pub fn registration_info(&self) -> Option<PoolHandle> {
        self.registration
    }

    /// Forces a uniform upload on next draw.
    pub fn mark_uniforms_dirty(&mut self) {
        self.uniforms_dirty = true;
    }

    /// Returns `true` if uniforms changed since the last upload.
    pub fn is_uniforms_dirty(&self) -> bool {
        self.uniforms_dirty
    }

    /// Forces the UBO and descriptor set to be reallocated on next draw and
    /// gives a mesh that failed another chance.
    pub fn mark_material_dirty(&mut self) {
        self.material_dirty = true;
        self.uniforms_dirty = true;
        self.has_errors = false;
    }

    /// Returns `true` if GPU state must be rebuilt before the next draw.
    pub fn is_material_dirty(&self) -> bool {
        self.material_dirty
    }

    /// Returns `true` if the mesh failed to allocate or bind its resources.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Uploads the geometry if needed and binds its buffers.
    ///
    /// Meshes without vertex data bind nothing and always succeed.
    pub fn bind_mesh(&mut self, pipeline: &mut dyn Pipeline, resources: &mut ResourceManagers) -> bool {
        if !self.upload(pipeline, resources) {
            return false;
        }
        if let Some(buffers) = self.gpu {
            pipeline.bind_vbo(buffers.vbo);
            if buffers.ibo.is_valid() {
                pipeline.bind_ibo(buffers.ibo);
            }
        }
        true
    }

    /// Takes a reference on the shared geometry buffers without binding them.
    ///
    /// Meshes after the first of a VBO run only need their own reference.
    pub fn upload(&mut self, pipeline: &mut dyn Pipeline, resources: &mut ResourceManagers) -> bool {
        if !self.is_support_vbo() || self.gpu.is_some() {
            return true;
        }
        match resources.geometry.acquire(pipeline, &self.geometry) {
            Ok(buffers) => {
                self.gpu = Some(buffers);
                true
            }
            Err(e) => {
                log::error!("Mesh: '{}' failed to upload its geometry: {e}", self.name);
                self.has_errors = true;
                false
            }
        }
    }

    /// Binds the per-mesh UBO of the current shader without allocating.
    ///
    /// Fails if the mesh has no buffer large enough for the block of `shader`.
    pub fn bind_uniforms(
        &self,
        pipeline: &mut dyn Pipeline,
        resources: &mut ResourceManagers,
        shader: &Shader,
    ) -> BindResult {
        resources
            .ubo
            .bind_no_duplicate_ubo(pipeline, self.ubo, shader.uniform_block_size())
    }

    /// Writes the material properties and kind-specific uniforms into `shader`.
    pub fn use_material(&self, shader: &mut Shader) {
        for (id, value) in self.material.properties() {
            shader.set_value(id, value);
        }
        self.kind.use_uniforms(shader);
    }

    /// Writes the model matrix into `shader`.
    pub fn use_model_matrix(&self, shader: &mut Shader) {
        shader.set_value(MODEL_MATRIX, &UniformValue::Mat4(self.transform));
    }

    /// Assigns the material textures to the shader samplers.
    ///
    /// Samplers the material leaves empty keep the texture pinned by the pass,
    /// or fall back to `default_texture`.
    pub fn use_samplers(&self, shader: &mut Shader, default_texture: TextureId) {
        let slots: Vec<_> = shader
            .samplers()
            .iter()
            .map(|slot| (slot.decl.id, slot.pinned))
            .collect();
        for (id, pinned) in slots {
            match self.material.texture(id) {
                Some(texture) => {
                    shader.set_sampler(id, texture);
                }
                None if !pinned => {
                    shader.set_sampler(id, default_texture);
                }
                None => {}
            }
        }
    }

    /// Draws the mesh with `shader`, which must be in use.
    ///
    /// Allocates the UBO and descriptor set on first draw (or after a material
    /// change), fills the backings created for a new shader program, then
    /// issues the draw call. A shader with a larger block than the one the UBO
    /// was first sized for gets a buffer of its own size. Returns `false` and flags the mesh on failure.
    pub fn draw(
        &mut self,
        pipeline: &mut dyn Pipeline,
        resources: &mut ResourceManagers,
        shader: &mut Shader,
        default_texture: TextureId,
    ) -> bool {
        if !self.active || self.has_errors {
            return false;
        }
        if self.material_dirty && !self.allocate_gpu_state(pipeline, resources, shader) {
            self.has_errors = true;
            return false;
        }

        let size = shader.uniform_block_size();
        let mut fresh = false;
        if size > 0 && !self.ubo.is_valid() {
            match resources.ubo.allocate_ubo(pipeline, VirtualUbo::INVALID, size, false) {
                Ok(ubo) => {
                    self.ubo = ubo;
                    fresh = true;
                }
                Err(e) => {
                    log::error!("Mesh: '{}' failed to allocate its UBO: {e}", self.name);
                    self.has_errors = true;
                    return false;
                }
            }
        }

        let fill = match resources.ubo.bind_ubo(pipeline, self.ubo, size) {
            BindResult::Failed => {
                log::error!("Mesh: '{}' failed to bind its UBO", self.name);
                self.has_errors = true;
                return false;
            }
            BindResult::Duplicated => true,
            BindResult::Success => fresh || self.uniforms_dirty,
        };
        if fill && size > 0 {
            self.use_material(shader);
            self.use_model_matrix(shader);
            shader.flush(pipeline);
        }
        self.uniforms_dirty = false;

        if self.descriptor_set.is_valid() {
            match resources.descriptors.bind_descriptor_set(pipeline, self.descriptor_set) {
                BindResult::Failed => {
                    log::error!("Mesh: '{}' failed to bind its descriptor set", self.name);
                    self.has_errors = true;
                    return false;
                }
                BindResult::Duplicated => {
                    self.use_samplers(shader, default_texture);
                    if !shader.is_samplers_valid() {
                        log::error!(
                            "Mesh: '{}' has unset samplers for shader '{}'",
                            self.name,
                            shader.name()
                        );
                        self.has_errors = true;
                        return false;
                    }
                    shader.flush_samplers(pipeline);
                    pipeline.update_descriptor_sets();
                }
                BindResult::Success => {}
            }
        }

        match self.gpu {
            Some(buffers) if buffers.index_count > 0 => pipeline.draw_indices(buffers.index_count),
            Some(buffers) => pipeline.draw(buffers.vertex_count),
            None => pipeline.draw(self.geometry.vertex_count()),
        }
        true
    }

    /// Releases the geometry reference, the UBO and the descriptor set.
    pub fn free_video_memory(&mut self, pipeline: &mut dyn Pipeline, resources: &mut ResourceManagers) {
        if self.gpu.take().is_some() {
            resources.geometry.release(pipeline, self.geometry.id());
        }
        if self.ubo.is_valid() {
            resources.ubo.free_ubo(pipeline, &mut self.ubo);
        }
        if self.descriptor_set.is_valid() {
            resources
                .descriptors
                .free_descriptor_set(pipeline, &mut self.descriptor_set);
        }
        self.material_dirty = true;
    }

    fn allocate_gpu_state(
        &mut self,
        pipeline: &mut dyn Pipeline,
        resources: &mut ResourceManagers,
        shader: &Shader,
    ) -> bool {
        let size = shader.uniform_block_size();
        if size > 0 {
            match resources.ubo.allocate_ubo(pipeline, self.ubo, size, false) {
                Ok(ubo) => self.ubo = ubo,
                Err(e) => {
                    log::error!("Mesh: '{}' failed to allocate its UBO: {e}", self.name);
                    self.ubo = VirtualUbo::INVALID;
                    return false;
                }
            }
        } else if self.ubo.is_valid() {
            resources.ubo.free_ubo(pipeline, &mut self.ubo);
        }

        let layout = shader.descriptor_layout();
        if !layout.is_empty() {
            match resources
                .descriptors
                .allocate_descriptor_set(pipeline, self.descriptor_set, &layout)
            {
                Ok(set) => self.descriptor_set = set,
                Err(e) => {
                    log::error!("Mesh: '{}' failed to allocate its descriptor set: {e}", self.name);
                    self.descriptor_set = VirtualDescriptorSet::INVALID;
                    return false;
                }
            }
        } else if self.descriptor_set.is_valid() {
            resources
                .descriptors
                .free_descriptor_set(pipeline, &mut self.descriptor_set);
        }

        self.material_dirty = false;
        self.uniforms_dirty = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::error::ResourceKind;
    use prism_core::renderer::{ShaderCreateInfo, UniformKind};
    use prism_infra::{HeadlessCommand, HeadlessPipeline};

    fn setup(info: ShaderCreateInfo) -> (HeadlessPipeline, ResourceManagers, Shader) {
        let mut pipeline = HeadlessPipeline::new();
        let mut resources = ResourceManagers::new();
        let mut shader = Shader::new(info).unwrap();
        assert!(shader.use_shader(&mut pipeline, &mut resources).is_ok());
        (pipeline, resources, shader)
    }

    fn lit() -> ShaderCreateInfo {
        ShaderCreateInfo::new("lit")
            .with_uniform("MODEL_MATRIX", UniformKind::Mat4)
            .with_uniform("COLOR", UniformKind::Vec4)
            .with_sampler("albedo", 2)
    }

    fn quad_mesh(kind: MeshKind) -> Mesh {
        Mesh::new("quad", kind, Arc::new(Geometry::quad()), Material::default())
    }

    #[test]
    fn test_first_draw_allocates_and_fills() {
        let (mut pipeline, mut resources, mut shader) = setup(lit());
        let mut mesh = quad_mesh(MeshKind::Static);

        assert!(mesh.bind_mesh(&mut pipeline, &mut resources));
        assert!(mesh.draw(&mut pipeline, &mut resources, &mut shader, TextureId(99)));

        assert!(mesh.virtual_ubo().is_valid());
        assert!(mesh.virtual_descriptor_set().is_valid());
        assert!(!mesh.is_material_dirty());
        assert_eq!(pipeline.draw_count(), 1);
        assert!(pipeline
            .commands()
            .iter()
            .any(|c| matches!(c, HeadlessCommand::UpdateDescriptorSet(_))));
        assert!(pipeline
            .commands()
            .iter()
            .any(|c| matches!(c, HeadlessCommand::DrawIndices { indices: 6, .. })));
    }

    #[test]
    fn test_second_draw_reuses_backings() {
        let (mut pipeline, mut resources, mut shader) = setup(lit());
        let mut mesh = quad_mesh(MeshKind::Static);
        mesh.bind_mesh(&mut pipeline, &mut resources);
        mesh.draw(&mut pipeline, &mut resources, &mut shader, TextureId(99));
        pipeline.clear_commands();

        assert!(mesh.draw(&mut pipeline, &mut resources, &mut shader, TextureId(99)));
        assert!(!pipeline
            .commands()
            .iter()
            .any(|c| matches!(c, HeadlessCommand::UpdateUbo { .. } | HeadlessCommand::UpdateDescriptorSet(_))));
        assert_eq!(resources.ubo.backing_count(), 1);
    }

    #[test]
    fn test_sprite_color_reaches_the_uniform_buffer() {
        let (mut pipeline, mut resources, mut shader) = setup(lit());
        let color = Vec4::new(0.25, 0.5, 0.75, 1.0);
        let mut mesh = quad_mesh(MeshKind::Sprite {
            rect: Vec4::new(0.0, 0.0, 1.0, 1.0),
            color,
        });
        mesh.bind_mesh(&mut pipeline, &mut resources);
        mesh.draw(&mut pipeline, &mut resources, &mut shader, TextureId(99));

        let context = pipeline.current_shader_context().unwrap();
        let buffer = resources.ubo.backing(mesh.virtual_ubo(), context).unwrap();
        let data = pipeline.buffer_data(buffer).unwrap();
        assert_eq!(&data[64..80], bytemuck::bytes_of(&color));
    }

    #[test]
    fn test_allocation_failure_flags_mesh() {
        let (mut pipeline, mut resources, mut shader) = setup(lit());
        pipeline.set_allocation_failure(ResourceKind::Ubo, true);
        let mut mesh = quad_mesh(MeshKind::Static);
        mesh.bind_mesh(&mut pipeline, &mut resources);

        assert!(!mesh.draw(&mut pipeline, &mut resources, &mut shader, TextureId(99)));
        assert!(mesh.has_errors());
        assert!(!mesh.draw(&mut pipeline, &mut resources, &mut shader, TextureId(99)));

        pipeline.set_allocation_failure(ResourceKind::Ubo, false);
        mesh.mark_material_dirty();
        assert!(mesh.draw(&mut pipeline, &mut resources, &mut shader, TextureId(99)));
    }

    #[test]
    fn test_missing_samplers_fail_without_default() {
        let (mut pipeline, mut resources, mut shader) = setup(lit());
        let mut mesh = quad_mesh(MeshKind::Static);
        mesh.bind_mesh(&mut pipeline, &mut resources);

        assert!(!mesh.draw(&mut pipeline, &mut resources, &mut shader, TextureId::INVALID));
        assert!(mesh.has_errors());
    }

    #[test]
    fn test_procedural_mesh_draws_without_buffers() {
        let (mut pipeline, mut resources, mut shader) = setup(ShaderCreateInfo::new("sky"));
        let mut mesh = Mesh::new(
            "sky",
            MeshKind::Static,
            Arc::new(Geometry::procedural(36)),
            Material::default(),
        );

        assert!(mesh.bind_mesh(&mut pipeline, &mut resources));
        assert!(mesh.draw(&mut pipeline, &mut resources, &mut shader, TextureId::INVALID));
        assert_eq!(mesh.vbo(), BufferId::INVALID);
        assert!(!mesh.virtual_ubo().is_valid());
        assert!(pipeline
            .commands()
            .iter()
            .any(|c| matches!(c, HeadlessCommand::Draw { vertices: 36, .. })));
    }

    #[test]
    fn test_larger_shader_gets_a_larger_buffer() {
        let small = ShaderCreateInfo::new("small").with_uniform("MODEL_MATRIX", UniformKind::Mat4);
        let (mut pipeline, mut resources, mut small) = setup(small);
        let mut mesh = quad_mesh(MeshKind::Static);
        mesh.bind_mesh(&mut pipeline, &mut resources);
        assert!(mesh.draw(&mut pipeline, &mut resources, &mut small, TextureId(99)));

        let mut big = Shader::new(lit()).unwrap();
        assert!(big.use_shader(&mut pipeline, &mut resources).is_ok());
        assert!(mesh.draw(&mut pipeline, &mut resources, &mut big, TextureId(99)));

        let context = pipeline.current_shader_context().unwrap();
        let buffer = resources.ubo.backing(mesh.virtual_ubo(), context).unwrap();
        assert_eq!(
            pipeline.buffer_data(buffer).map(<[u8]>::len),
            Some(big.uniform_block_size())
        );
        assert_eq!(pipeline.rejected_ubo_updates(), 0);
        assert_eq!(
            mesh.bind_uniforms(&mut pipeline, &mut resources, &big),
            BindResult::Success
        );
    }

    #[test]
    fn test_mesh_without_block_gets_one_on_demand() {
        let (mut pipeline, mut resources, mut sky) = setup(ShaderCreateInfo::new("sky"));
        let mut mesh = quad_mesh(MeshKind::Static);
        mesh.bind_mesh(&mut pipeline, &mut resources);
        assert!(mesh.draw(&mut pipeline, &mut resources, &mut sky, TextureId(99)));
        assert!(!mesh.virtual_ubo().is_valid());

        let mut textured = Shader::new(lit()).unwrap();
        assert!(textured.use_shader(&mut pipeline, &mut resources).is_ok());
        pipeline.clear_commands();
        assert!(mesh.draw(&mut pipeline, &mut resources, &mut textured, TextureId(99)));

        assert!(mesh.virtual_ubo().is_valid());
        assert!(pipeline
            .commands()
            .iter()
            .any(|c| matches!(c, HeadlessCommand::UpdateUbo { len, .. } if *len == textured.uniform_block_size())));
        assert_eq!(pipeline.rejected_ubo_updates(), 0);
    }

    #[test]
    fn test_free_video_memory_returns_everything() {
        let (mut pipeline, mut resources, mut shader) = setup(lit());
        let mut mesh = quad_mesh(MeshKind::Static);
        mesh.bind_mesh(&mut pipeline, &mut resources);
        mesh.draw(&mut pipeline, &mut resources, &mut shader, TextureId(99));

        mesh.free_video_memory(&mut pipeline, &mut resources);
        shader.free_video_memory(&mut pipeline, &mut resources);
        assert!(resources.is_empty());
        assert_eq!(pipeline.live_objects(), 0);
    }
}
