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

//! Uniform identifiers, kinds and values.
//!
//! Uniforms are addressed by a precomputed hash of their name instead of the
//! name itself, so setters in the hot path never touch strings. The hash is a
//! `const fn`, which lets well-known uniforms be declared as constants.

use glam::{Mat4, Vec2, Vec3, Vec4};
use xxhash_rust::const_xxh3::xxh3_64;

/// A hashed uniform (or sampler) name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformId(pub u64);

impl UniformId {
    /// Hashes `name` into a uniform id. Usable in constant context.
    pub const fn new(name: &str) -> Self {
        UniformId(xxh3_64(name.as_bytes()))
    }
}

/// Model (object-to-world) matrix of the mesh being drawn.
pub const MODEL_MATRIX: UniformId = UniformId::new("MODEL_MATRIX");
/// View matrix of the active camera.
pub const VIEW_MATRIX: UniformId = UniformId::new("VIEW_MATRIX");
/// Projection matrix of the active camera.
pub const PROJECTION_MATRIX: UniformId = UniformId::new("PROJECTION_MATRIX");
/// World-space position of the active camera.
pub const VIEW_POSITION: UniformId = UniformId::new("VIEW_POSITION");
/// Seconds since the render context was created.
pub const TIME: UniformId = UniformId::new("TIME");
/// Flat color, used by wireframe and sprite meshes.
pub const COLOR: UniformId = UniformId::new("COLOR");
/// Skinning palette of a skinned mesh.
pub const BONE_MATRICES: UniformId = UniformId::new("BONE_MATRICES");
/// Sub-rectangle of a sprite's texture (`x`, `y`, `width`, `height`).
pub const TEXTURE_RECT: UniformId = UniformId::new("TEXTURE_RECT");

/// The shape of a uniform field, used to compute std140 block layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// A 32-bit signed integer.
    Int,
    /// A 32-bit float.
    Float,
    /// Two floats.
    Vec2,
    /// Three floats, padded to 16 bytes.
    Vec3,
    /// Four floats.
    Vec4,
    /// A column-major 4x4 matrix.
    Mat4,
    /// A fixed-size array of 4x4 matrices.
    Mat4Array(u32),
}

impl UniformKind {
    /// Size in bytes of the field inside a std140 block.
    pub fn size(&self) -> usize {
        match self {
            UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
            UniformKind::Mat4Array(count) => 64 * *count as usize,
        }
    }

    /// Base alignment of the field inside a std140 block.
    pub fn alignment(&self) -> usize {
        match self {
            UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Vec2 => 8,
            _ => 16,
        }
    }
}

/// A CPU-side uniform value ready to be written into a uniform block.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// See [`UniformKind::Int`].
    Int(i32),
    /// See [`UniformKind::Float`].
    Float(f32),
    /// See [`UniformKind::Vec2`].
    Vec2(Vec2),
    /// See [`UniformKind::Vec3`].
    Vec3(Vec3),
    /// See [`UniformKind::Vec4`].
    Vec4(Vec4),
    /// See [`UniformKind::Mat4`].
    Mat4(Mat4),
    /// See [`UniformKind::Mat4Array`].
    Mat4Array(Vec<Mat4>),
}

impl UniformValue {
    /// The kind this value was built for.
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
            UniformValue::Mat4Array(m) => UniformKind::Mat4Array(m.len() as u32),
        }
    }

    /// Returns `true` if this value can be written into a field of kind `kind`.
    ///
    /// Matrix arrays may be shorter than the declared field.
    pub fn fits(&self, kind: UniformKind) -> bool {
        match (self, kind) {
            (UniformValue::Mat4Array(m), UniformKind::Mat4Array(count)) => {
                m.len() <= count as usize
            }
            (value, kind) => value.kind() == kind,
        }
    }

    /// Writes the raw bytes of the value at the start of `dst`.
    ///
    /// `dst` must be at least as large as the value; extra bytes are left untouched.
    pub fn write_to(&self, dst: &mut [u8]) {
        let bytes: &[u8] = match self {
            UniformValue::Int(v) => bytemuck::bytes_of(v),
            UniformValue::Float(v) => bytemuck::bytes_of(v),
            UniformValue::Vec2(v) => bytemuck::bytes_of(v),
            UniformValue::Vec3(v) => bytemuck::bytes_of(v),
            UniformValue::Vec4(v) => bytemuck::bytes_of(v),
            UniformValue::Mat4(v) => bytemuck::bytes_of(v),
            UniformValue::Mat4Array(v) => bytemuck::cast_slice(v),
        };
        dst[..bytes.len()].copy_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_id_is_stable_and_const() {
        const LOCAL: UniformId = UniformId::new("MODEL_MATRIX");
        assert_eq!(LOCAL, MODEL_MATRIX);
        assert_ne!(MODEL_MATRIX, VIEW_MATRIX);
    }

    #[test]
    fn test_std140_sizes() {
        assert_eq!(UniformKind::Vec3.size(), 12);
        assert_eq!(UniformKind::Vec3.alignment(), 16);
        assert_eq!(UniformKind::Mat4Array(4).size(), 256);
    }

    #[test]
    fn test_value_write() {
        let mut buffer = [0u8; 8];
        UniformValue::Float(1.0).write_to(&mut buffer);
        assert_eq!(&buffer[..4], &1.0f32.to_ne_bytes());
        assert_eq!(&buffer[4..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_matrix_array_fits_shorter_palette() {
        let palette = UniformValue::Mat4Array(vec![Mat4::IDENTITY; 2]);
        assert!(palette.fits(UniformKind::Mat4Array(4)));
        assert!(!palette.fits(UniformKind::Mat4Array(1)));
        assert!(!UniformValue::Float(0.0).fits(UniformKind::Int));
    }
}
