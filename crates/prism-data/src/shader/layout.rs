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

//! std140 layout of a uniform block.

use prism_core::renderer::{UniformDecl, UniformId, UniformKind, UniformValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UniformField {
    id: UniformId,
    kind: UniformKind,
    offset: usize,
}

/// Offsets of the fields of one uniform block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformBlockLayout {
    fields: Vec<UniformField>,
    size: usize,
}

impl UniformBlockLayout {
    /// Lays out `decls` in declaration order following std140 rules.
    pub fn from_decls(decls: &[UniformDecl]) -> Self {
        let mut fields = Vec::with_capacity(decls.len());
        let mut offset = 0;
        for decl in decls {
            offset = align_up(offset, decl.kind.alignment());
            fields.push(UniformField {
                id: decl.id,
                kind: decl.kind,
                offset,
            });
            offset += decl.kind.size();
        }
        Self {
            fields,
            size: align_up(offset, 16),
        }
    }

    /// Block size in bytes, padded to 16.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns `true` if the block has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Offset and kind of a field.
    pub fn field(&self, id: UniformId) -> Option<(usize, UniformKind)> {
        self.fields
            .iter()
            .find(|field| field.id == id)
            .map(|field| (field.offset, field.kind))
    }

    /// Returns `true` if the block declares `id`.
    pub fn contains(&self, id: UniformId) -> bool {
        self.field(id).is_some()
    }

    /// Writes `value` into `data` at the offset of `id`.
    ///
    /// Returns `false` if the field does not exist or the value does not fit.
    pub fn write(&self, data: &mut [u8], id: UniformId, value: &UniformValue) -> bool {
        let Some((offset, kind)) = self.field(id) else {
            return false;
        };
        if !value.fits(kind) || data.len() < offset + kind.size() {
            log::warn!("UniformBlockLayout: value {:?} does not fit field of kind {kind:?}", value.kind());
            return false;
        }
        value.write_to(&mut data[offset..offset + kind.size()]);
        true
    }
}

fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}
