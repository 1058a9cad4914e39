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

//! Plain descriptor and result types exchanged with a [`Pipeline`](super::Pipeline).

use super::uniform::{UniformId, UniformKind};
use crate::error::ResourceError;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// The render-pass parameters a compiled shader program depends on.
///
/// Two framebuffers with the same spec can share program objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FramebufferSpec {
    /// MSAA sample count.
    pub sample_count: u8,
    /// Whether the framebuffer has a depth attachment.
    pub depth_enabled: bool,
}

impl Default for FramebufferSpec {
    fn default() -> Self {
        Self {
            sample_count: 1,
            depth_enabled: true,
        }
    }
}

/// Describes an off-screen framebuffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FramebufferDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Number of color attachments.
    pub color_attachments: u32,
    /// Sample count and depth configuration.
    pub spec: FramebufferSpec,
}

impl FramebufferDesc {
    /// A single-sampled framebuffer with one color attachment and depth.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color_attachments: 1,
            spec: FramebufferSpec::default(),
        }
    }
}

/// Pixel format of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, normalized.
    Rgba8,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Number of bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            TextureFormat::Rgba8 | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float => 8,
        }
    }
}

/// Describes a sampled texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: TextureFormat,
    /// Number of mip levels, at least 1.
    pub mip_levels: u32,
}

impl TextureDesc {
    /// An RGBA8 texture without mips.
    pub fn rgba8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Rgba8,
            mip_levels: 1,
        }
    }

    /// Size in bytes of the base level.
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// A programmable stage of a shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStageKind {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
    /// Compute stage.
    Compute,
}

/// The already-compiled source of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStage {
    /// Which stage this is.
    pub kind: ShaderStageKind,
    /// Backend-specific source or path.
    pub source: String,
}

/// The format of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Two floats.
    Float32x2,
    /// Three floats.
    Float32x3,
    /// Four floats.
    Float32x4,
    /// Four unsigned integers (bone indices).
    Uint32x4,
}

impl VertexFormat {
    /// Size in bytes.
    pub fn size(&self) -> u32 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 | VertexFormat::Uint32x4 => 16,
        }
    }
}

/// One attribute of the vertex layout a shader expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader location.
    pub location: u32,
    /// Attribute format.
    pub format: VertexFormat,
    /// Offset inside the vertex.
    pub offset: u32,
}

/// A declared uniform field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    /// Field name as written in the shader.
    pub name: String,
    /// Hash of `name`.
    pub id: UniformId,
    /// Field type.
    pub kind: UniformKind,
}

impl UniformDecl {
    /// Declares a field, hashing its name.
    pub fn new(name: &str, kind: UniformKind) -> Self {
        Self {
            name: name.to_string(),
            id: UniformId::new(name),
            kind,
        }
    }
}

/// A declared combined image sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerDecl {
    /// Sampler name as written in the shader.
    pub name: String,
    /// Hash of `name`.
    pub id: UniformId,
    /// Descriptor binding slot.
    pub binding: u32,
}

impl SamplerDecl {
    /// Declares a sampler, hashing its name.
    pub fn new(name: &str, binding: u32) -> Self {
        Self {
            name: name.to_string(),
            id: UniformId::new(name),
            binding,
        }
    }
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// No culling.
    None,
    /// Cull back faces.
    #[default]
    Back,
    /// Cull front faces.
    Front,
}

/// Everything needed to create a shader program, as produced by the shader front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCreateInfo {
    /// Unique shader name.
    pub name: String,
    /// Compiled stages.
    pub stages: Vec<ShaderStage>,
    /// Vertex attributes consumed by the vertex stage.
    pub vertex_layout: Vec<VertexAttribute>,
    /// Per-shader uniforms (camera, time), stored in one shared block.
    pub shared_uniforms: Vec<UniformDecl>,
    /// Per-mesh uniforms, stored in each mesh's own block.
    pub uniforms: Vec<UniformDecl>,
    /// Sampled textures.
    pub samplers: Vec<SamplerDecl>,
    /// Alpha blending.
    pub blend_enabled: bool,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Depth testing.
    pub depth_test: bool,
}

impl ShaderCreateInfo {
    /// An opaque, depth-tested shader with no uniforms or samplers.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stages: vec![
                ShaderStage {
                    kind: ShaderStageKind::Vertex,
                    source: format!("{name}.vert"),
                },
                ShaderStage {
                    kind: ShaderStageKind::Fragment,
                    source: format!("{name}.frag"),
                },
            ],
            vertex_layout: Vec::new(),
            shared_uniforms: Vec::new(),
            uniforms: Vec::new(),
            samplers: Vec::new(),
            blend_enabled: false,
            cull_mode: CullMode::Back,
            depth_test: true,
        }
    }

    /// Adds a per-mesh uniform.
    pub fn with_uniform(mut self, name: &str, kind: UniformKind) -> Self {
        self.uniforms.push(UniformDecl::new(name, kind));
        self
    }

    /// Adds a shared uniform.
    pub fn with_shared_uniform(mut self, name: &str, kind: UniformKind) -> Self {
        self.shared_uniforms.push(UniformDecl::new(name, kind));
        self
    }

    /// Adds a sampler at `binding`.
    pub fn with_sampler(mut self, name: &str, binding: u32) -> Self {
        self.samplers.push(SamplerDecl::new(name, binding));
        self
    }

    /// Binding slot of the per-mesh uniform block in the descriptor set.
    pub const UBO_BINDING: u32 = 0;
    /// Binding slot of the shared uniform block.
    pub const SHARED_UBO_BINDING: u32 = 1;

    /// The descriptor layout a mesh using this shader needs.
    ///
    /// Returns an empty layout when the shader has neither per-mesh uniforms
    /// nor samplers, in which case meshes skip descriptor set allocation.
    pub fn descriptor_layout(&self) -> Vec<DescriptorKind> {
        let mut layout = Vec::with_capacity(1 + self.samplers.len());
        if !self.uniforms.is_empty() {
            layout.push(DescriptorKind::UniformBuffer);
        }
        layout.extend(self.samplers.iter().map(|_| DescriptorKind::CombinedImageSampler));
        layout
    }

    /// Checks the create info for mistakes the backend would reject.
    pub fn validate(&self) -> Result<(), ResourceError> {
        let invalid = |details: String| ResourceError::InvalidShader {
            name: self.name.clone(),
            details,
        };

        if self.name.is_empty() {
            return Err(invalid("empty name".to_string()));
        }
        if self.stages.is_empty() {
            return Err(invalid("no stages".to_string()));
        }

        let mut ids = AHashSet::new();
        for decl in self.shared_uniforms.iter().chain(self.uniforms.iter()) {
            if !ids.insert(decl.id) {
                return Err(invalid(format!("duplicate uniform '{}'", decl.name)));
            }
        }

        let mut bindings = AHashSet::new();
        for sampler in &self.samplers {
            if sampler.binding <= Self::SHARED_UBO_BINDING {
                return Err(invalid(format!(
                    "sampler '{}' uses reserved binding {}",
                    sampler.name, sampler.binding
                )));
            }
            if !bindings.insert(sampler.binding) || !ids.insert(sampler.id) {
                return Err(invalid(format!("duplicate sampler '{}'", sampler.name)));
            }
        }
        Ok(())
    }
}

/// The type of one descriptor set binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// A uniform buffer.
    UniformBuffer,
    /// A texture plus sampler.
    CombinedImageSampler,
    /// A storage buffer.
    StorageBuffer,
}

/// Access pattern of a storage buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SsboUsage {
    /// Read by shaders only.
    ReadOnly,
    /// Written by shaders only.
    WriteOnly,
    /// Read and written by shaders.
    ReadWrite,
}

/// Outcome of binding a virtual resource in the current context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindResult {
    /// An existing backing was bound.
    Success,
    /// A new backing was created for the current context and bound; its
    /// contents are undefined until the caller uploads them.
    Duplicated,
    /// Nothing could be bound.
    Failed,
}

/// Outcome of using a shader for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderBindResult {
    /// The shader's program is bound.
    Success,
    /// A program was compiled for the current framebuffer and bound.
    Duplicated,
    /// The program was recompiled because the framebuffer spec changed.
    ReAllocated,
    /// The shader cannot be used.
    Failed,
}

impl ShaderBindResult {
    /// Returns `true` for every result but [`ShaderBindResult::Failed`].
    pub fn is_ok(&self) -> bool {
        !matches!(self, ShaderBindResult::Failed)
    }
}

/// Cumulative counters reported by a pipeline since its creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Non-indexed draw calls.
    pub draw_calls: u64,
    /// Indexed draw calls.
    pub indexed_draw_calls: u64,
    /// Successful shader program binds.
    pub shader_binds: u64,
    /// Vertex buffer binds.
    pub vbo_binds: u64,
    /// Uniform buffer uploads.
    pub ubo_updates: u64,
    /// Descriptor set updates.
    pub descriptor_updates: u64,
    /// Submitted frames.
    pub submits: u64,
}

impl PipelineStats {
    /// Total draw calls of both kinds.
    pub fn total_draws(&self) -> u64 {
        self.draw_calls + self.indexed_draw_calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_layout_follows_declarations() {
        let info = ShaderCreateInfo::new("lit")
            .with_uniform("MODEL_MATRIX", UniformKind::Mat4)
            .with_sampler("albedo", 2)
            .with_sampler("normal", 3);
        assert_eq!(
            info.descriptor_layout(),
            vec![
                DescriptorKind::UniformBuffer,
                DescriptorKind::CombinedImageSampler,
                DescriptorKind::CombinedImageSampler,
            ]
        );
        assert!(ShaderCreateInfo::new("plain").descriptor_layout().is_empty());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let info = ShaderCreateInfo::new("dup")
            .with_uniform("COLOR", UniformKind::Vec4)
            .with_shared_uniform("COLOR", UniformKind::Vec4);
        assert!(info.validate().is_err());

        let info = ShaderCreateInfo::new("samplers")
            .with_sampler("a", 2)
            .with_sampler("b", 2);
        assert!(info.validate().is_err());

        let info = ShaderCreateInfo::new("reserved").with_sampler("a", 0);
        assert!(info.validate().is_err());

        assert!(ShaderCreateInfo::new("ok").validate().is_ok());
    }

    #[test]
    fn test_texture_byte_size() {
        assert_eq!(TextureDesc::rgba8(4, 2).byte_size(), 32);
    }
}
