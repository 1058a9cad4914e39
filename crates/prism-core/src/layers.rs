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

//! The global, ordered list of render layers.
//!
//! Render queues bucket their meshes per layer and cache the layer-to-bucket
//! mapping. Every change to the registry bumps its [`version`](LayerRegistry::version),
//! which queues compare against the version they were built for to know when
//! to rebuild the mapping.

/// Name of the layer meshes use when they do not ask for one.
pub const DEFAULT_LAYER: &str = "Default";

/// An ordered set of layer names with a change counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRegistry {
    layers: Vec<String>,
    version: u64,
}

impl LayerRegistry {
    /// Creates a registry holding only [`DEFAULT_LAYER`].
    pub fn new() -> Self {
        Self::from_layers([DEFAULT_LAYER])
    }

    /// Creates a registry with the given layers, in draw order. Duplicates are ignored.
    pub fn from_layers<I, S>(layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self {
            layers: Vec::new(),
            version: 0,
        };
        for layer in layers {
            registry.push_unique(layer.into());
        }
        registry
    }

    /// Appends a layer. Returns `false` if it already exists.
    pub fn add(&mut self, layer: &str) -> bool {
        if self.push_unique(layer.to_string()) {
            self.version += 1;
            true
        } else {
            false
        }
    }

    /// Removes a layer. Returns `false` if it did not exist.
    pub fn remove(&mut self, layer: &str) -> bool {
        let Some(index) = self.index_of(layer) else {
            return false;
        };
        self.layers.remove(index);
        self.version += 1;
        true
    }

    /// Replaces the whole list.
    pub fn set_layers<I, S>(&mut self, layers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layers.clear();
        for layer in layers {
            self.push_unique(layer.into());
        }
        self.version += 1;
    }

    /// Draw-order index of `layer`.
    pub fn index_of(&self, layer: &str) -> Option<usize> {
        self.layers.iter().position(|l| l == layer)
    }

    /// Returns `true` if `layer` exists.
    pub fn contains(&self, layer: &str) -> bool {
        self.index_of(layer).is_some()
    }

    /// Change counter, bumped on every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if there are no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers in draw order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(String::as_str)
    }

    fn push_unique(&mut self, layer: String) -> bool {
        if self.layers.contains(&layer) {
            return false;
        }
        self.layers.push(layer);
        true
    }
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_bumps_on_change_only() {
        let mut registry = LayerRegistry::new();
        let v0 = registry.version();

        assert!(registry.add("Transparent"));
        assert_eq!(registry.version(), v0 + 1);

        assert!(!registry.add("Transparent"));
        assert_eq!(registry.version(), v0 + 1, "No-op add must not bump the version");

        assert!(registry.remove("Transparent"));
        assert!(!registry.remove("Transparent"));
        assert_eq!(registry.version(), v0 + 2);
    }

    #[test]
    fn test_order_and_lookup() {
        let mut registry = LayerRegistry::from_layers(["Opaque", "Transparent", "Opaque"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.index_of("Transparent"), Some(1));

        registry.set_layers(["UI", "Opaque"]);
        assert_eq!(registry.iter().collect::<Vec<_>>(), vec!["UI", "Opaque"]);
        assert!(!registry.contains("Transparent"));
    }
}
