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

//! A type-keyed registry of shared renderer services.
//!
//! The render agent and its scenes need a handful of process-wide objects
//! (settings, the layer registry). Instead of global singletons they are put
//! in a [`ServiceRegistry`] by the application and fetched by type when an
//! agent is constructed.

use ahash::AHashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// A service registry keyed by [`TypeId`].
///
/// Services are stored behind an `Arc` so agents can keep their own handle
/// after construction.
///
/// # Example
///
/// ```rust
/// use prism_core::service_registry::ServiceRegistry;
///
/// struct Settings { frames: u32 }
///
/// let mut registry = ServiceRegistry::new();
/// registry.insert(Settings { frames: 2 });
///
/// assert_eq!(registry.get::<Settings>().unwrap().frames, 2);
/// ```
#[derive(Default)]
pub struct ServiceRegistry {
    services: AHashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a service, replacing any previous service of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, service: T) {
        self.insert_arc(Arc::new(service));
    }

    /// Inserts an already shared service.
    pub fn insert_arc<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services.insert(TypeId::of::<T>(), service);
    }

    /// Borrows a service.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|service| service.downcast_ref::<T>())
    }

    /// Returns a shared handle to a service.
    #[must_use]
    pub fn get_arc<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|service| service.downcast::<T>().ok())
    }

    /// Returns `true` if a service of type `T` is registered.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::RwLock;

    struct FakeSettings {
        frames: u32,
    }

    #[test]
    fn test_insert_and_get() {
        let mut registry = ServiceRegistry::new();
        registry.insert(FakeSettings { frames: 3 });

        assert_eq!(registry.get::<FakeSettings>().unwrap().frames, 3);
        assert!(registry.get::<u32>().is_none());
    }

    #[test]
    fn test_shared_service_is_the_same_object() {
        let mut registry = ServiceRegistry::new();
        let shared = Arc::new(RwLock::new(FakeSettings { frames: 1 }));
        registry.insert_arc(shared.clone());

        let fetched = registry.get_arc::<RwLock<FakeSettings>>().unwrap();
        fetched.write().unwrap().frames = 5;
        assert_eq!(shared.read().unwrap().frames, 5);
    }

    #[test]
    fn test_replace_service() {
        let mut registry = ServiceRegistry::new();
        registry.insert(FakeSettings { frames: 1 });
        registry.insert(FakeSettings { frames: 2 });

        assert_eq!(registry.len(), 1);
        assert!(registry.contains::<FakeSettings>());
        assert_eq!(registry.get::<FakeSettings>().unwrap().frames, 2);
    }
}
