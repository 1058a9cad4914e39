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

use super::Shader;
use ahash::AHashMap;
use prism_core::define_handle;
use prism_core::error::ResourceError;
use prism_core::Pool;

define_handle!(
    /// A shader stored in a [`ShaderLibrary`].
    ShaderHandle
);

/// Every shader of a render context, addressable by handle or by name.
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    shaders: Pool<Shader>,
    by_name: AHashMap<String, ShaderHandle>,
}

impl ShaderLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a shader. Names are unique within a library.
    pub fn insert(&mut self, shader: Shader) -> Result<ShaderHandle, ResourceError> {
        if self.by_name.contains_key(shader.name()) {
            return Err(ResourceError::InvalidShader {
                name: shader.name().to_string(),
                details: "a shader with this name already exists".to_string(),
            });
        }
        let name = shader.name().to_string();
        let handle = ShaderHandle(self.shaders.insert(shader));
        log::debug!("ShaderLibrary: added '{name}' as {handle:?}");
        self.by_name.insert(name, handle);
        Ok(handle)
    }

    /// Removes a shader. Its GPU objects must have been freed by the caller.
    pub fn remove(&mut self, handle: ShaderHandle) -> Option<Shader> {
        let shader = self.shaders.remove(handle.0)?;
        self.by_name.remove(shader.name());
        Some(shader)
    }

    /// The shader behind `handle`.
    pub fn get(&self, handle: ShaderHandle) -> Option<&Shader> {
        self.shaders.get(handle.0)
    }

    /// The shader behind `handle`, mutably.
    pub fn get_mut(&mut self, handle: ShaderHandle) -> Option<&mut Shader> {
        self.shaders.get_mut(handle.0)
    }

    /// Looks a shader up by name.
    pub fn find(&self, name: &str) -> Option<ShaderHandle> {
        self.by_name.get(name).copied()
    }

    /// Returns `true` if `handle` resolves.
    pub fn contains(&self, handle: ShaderHandle) -> bool {
        self.shaders.contains(handle.0)
    }

    /// Iterates over every shader.
    pub fn iter(&self) -> impl Iterator<Item = (ShaderHandle, &Shader)> {
        self.shaders
            .iter()
            .map(|(handle, shader)| (ShaderHandle(handle), shader))
    }

    /// Handles of every shader.
    pub fn handles(&self) -> Vec<ShaderHandle> {
        self.shaders.handles().into_iter().map(ShaderHandle).collect()
    }

    /// Number of shaders.
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    /// Returns `true` if the library holds no shader.
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::ShaderCreateInfo;

    #[test]
    fn test_names_are_unique() {
        let mut library = ShaderLibrary::new();
        let handle = library
            .insert(Shader::new(ShaderCreateInfo::new("unlit")).unwrap())
            .unwrap();

        assert!(library
            .insert(Shader::new(ShaderCreateInfo::new("unlit")).unwrap())
            .is_err());
        assert_eq!(library.find("unlit"), Some(handle));
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_removed_handle_goes_stale() {
        let mut library = ShaderLibrary::new();
        let handle = library
            .insert(Shader::new(ShaderCreateInfo::new("unlit")).unwrap())
            .unwrap();

        assert!(library.remove(handle).is_some());
        assert!(library.get(handle).is_none());
        assert!(library.find("unlit").is_none());

        let again = library
            .insert(Shader::new(ShaderCreateInfo::new("unlit")).unwrap())
            .unwrap();
        assert_ne!(again, handle);
        assert!(!library.contains(handle));
    }
}
