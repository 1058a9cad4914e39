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

//! CPU-side vertex and index data.

use bytemuck::{Pod, Zeroable};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a [`Geometry`], stable for its whole lifetime.
///
/// Meshes built from the same geometry share one vertex buffer, so the
/// geometry id is the key render queues group by inside a shader run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u64);

/// Vertex of static meshes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct StaticVertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
}

/// Vertex of skinned meshes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SkinnedVertex {
    /// Bind-pose position.
    pub position: [f32; 3],
    /// Bind-pose normal.
    pub normal: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
    /// Indices into the bone palette.
    pub bones: [u32; 4],
    /// Weight of each bone.
    pub weights: [f32; 4],
}

/// Immutable vertex and index data, shared between meshes through an `Arc`.
#[derive(Debug)]
pub struct Geometry {
    id: GeometryId,
    vertices: Vec<u8>,
    vertex_count: u32,
    indices: Vec<u32>,
}

impl Geometry {
    /// Builds a geometry from typed vertices. `indices` may be empty for non-indexed draws.
    pub fn new<V: Pod>(vertices: &[V], indices: Vec<u32>) -> Self {
        Self {
            id: GeometryId(NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed)),
            vertices: bytemuck::cast_slice(vertices).to_vec(),
            vertex_count: vertices.len() as u32,
            indices,
        }
    }

    /// A geometry without vertex data, drawn procedurally by its shader
    /// (fullscreen triangles, skyboxes).
    pub fn procedural(vertex_count: u32) -> Self {
        Self {
            id: GeometryId(NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed)),
            vertices: Vec::new(),
            vertex_count,
            indices: Vec::new(),
        }
    }

    /// A unit quad in the XY plane, facing +Z.
    pub fn quad() -> Self {
        let vertex = |x: f32, y: f32, u: f32, v: f32| StaticVertex {
            position: [x, y, 0.0],
            normal: [0.0, 0.0, 1.0],
            uv: [u, v],
        };
        let vertices = [
            vertex(-0.5, -0.5, 0.0, 1.0),
            vertex(0.5, -0.5, 1.0, 1.0),
            vertex(0.5, 0.5, 1.0, 0.0),
            vertex(-0.5, 0.5, 0.0, 0.0),
        ];
        Self::new(&vertices, vec![0, 1, 2, 2, 3, 0])
    }

    /// Stable identity.
    pub fn id(&self) -> GeometryId {
        self.id
    }

    /// Raw vertex bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertices
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Index data.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Returns `true` if the geometry is drawn with indices.
    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Returns `true` if the geometry has vertex data to upload.
    pub fn has_vertex_data(&self) -> bool {
        !self.vertices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Geometry::quad();
        let b = Geometry::quad();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_quad_layout() {
        let quad = Geometry::quad();
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(
            quad.vertex_bytes().len(),
            4 * std::mem::size_of::<StaticVertex>()
        );
        assert!(quad.is_indexed());
        assert!(!Geometry::procedural(3).has_vertex_data());
    }
}
