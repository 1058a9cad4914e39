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

//! A generation-checked slot arena.
//!
//! [`Pool`] hands out [`PoolHandle`]s that combine a slot index with a
//! generation counter. Freed slots go onto a free list and are recycled, but
//! their generation is bumped first, so a handle to a freed slot can never
//! resolve to the object that later reuses the slot. Slots are never
//! compacted while the pool is alive: indices stay stable for as long as the
//! object they point to exists.

use std::fmt;

/// A stable reference into a [`Pool`].
///
/// Solves the "ABA problem" the same way entity ids do: the index can be
/// recycled, the generation cannot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolHandle {
    /// Slot index inside the pool.
    pub index: u32,
    /// Generation of the slot at the time the handle was issued.
    pub generation: u32,
}

impl PoolHandle {
    /// A handle that never resolves.
    pub const INVALID: PoolHandle = PoolHandle {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Returns `false` for [`PoolHandle::INVALID`].
    ///
    /// A valid-looking handle may still be stale; only the pool can tell.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl Default for PoolHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}v{}", self.index, self.generation)
        } else {
            write!(f, "#invalid")
        }
    }
}

/// Declares a strongly typed handle wrapping a [`PoolHandle`].
///
/// The generated type is `Copy`, ordered, hashable, defaults to `INVALID` and
/// converts to and from the raw handle.
#[macro_export]
macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub $crate::pool::PoolHandle);

        impl $name {
            /// A handle that never resolves.
            pub const INVALID: $name = $name($crate::pool::PoolHandle::INVALID);

            /// Returns `false` for [`Self::INVALID`].
            pub fn is_valid(&self) -> bool {
                self.0.is_valid()
            }
        }

        impl From<$crate::pool::PoolHandle> for $name {
            fn from(handle: $crate::pool::PoolHandle) -> Self {
                $name(handle)
            }
        }

        impl From<$name> for $crate::pool::PoolHandle {
            fn from(handle: $name) -> Self {
                handle.0
            }
        }
    };
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// An arena of `T` addressed through generation-checked handles.
#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Pool<T> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns the handle that addresses it.
    ///
    /// Recycles a freed slot when one is available.
    pub fn insert(&mut self, value: T) -> PoolHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.value = Some(value);
            return PoolHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        PoolHandle {
            index,
            generation: 0,
        }
    }

    /// Removes and returns the value behind `handle`.
    ///
    /// Returns `None` for invalid or stale handles, which makes double frees
    /// detectable by the caller.
    pub fn remove(&mut self, handle: PoolHandle) -> Option<T> {
        let slot = self.slot_mut(handle)?;
        let value = slot.value.take()?;
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Returns a reference to the value behind `handle`, if it is still alive.
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Returns a mutable reference to the value behind `handle`, if it is still alive.
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slot_mut(handle).and_then(|slot| slot.value.as_mut())
    }

    /// Returns `true` if `handle` resolves to a live value.
    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no value is alive.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over live values together with their handles, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    PoolHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    /// Mutable variant of [`iter`](Pool::iter).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PoolHandle, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| {
                let generation = slot.generation;
                slot.value.as_mut().map(|value| {
                    (
                        PoolHandle {
                            index: index as u32,
                            generation,
                        },
                        value,
                    )
                })
            })
    }

    /// Collects the handles of all live values.
    pub fn handles(&self) -> Vec<PoolHandle> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    fn slot_mut(&mut self, handle: PoolHandle) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut pool = Pool::new();
        let a = pool.insert("a");
        let b = pool.insert("b");

        assert_eq!(pool.get(a), Some(&"a"));
        assert_eq!(pool.get(b), Some(&"b"));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_removed_handle_never_resolves() {
        let mut pool = Pool::new();
        let a = pool.insert(1u32);
        assert_eq!(pool.remove(a), Some(1));

        assert!(pool.get(a).is_none());
        assert!(pool.remove(a).is_none(), "Double remove must be detected");
        assert!(pool.is_empty());
    }

    #[test]
    fn test_slot_is_recycled_with_new_generation() {
        let mut pool = Pool::new();
        let old = pool.insert(1u32);
        pool.remove(old);
        let new = pool.insert(2u32);

        assert_eq!(old.index, new.index, "Freed slot should be reused");
        assert_ne!(old.generation, new.generation);
        assert!(pool.get(old).is_none(), "Stale handle must not alias the new value");
        assert_eq!(pool.get(new), Some(&2));
    }

    #[test]
    fn test_invalid_handle() {
        let mut pool = Pool::new();
        pool.insert(0u8);
        assert!(!PoolHandle::INVALID.is_valid());
        assert!(pool.get(PoolHandle::INVALID).is_none());
        assert!(pool.remove(PoolHandle::INVALID).is_none());
    }

    define_handle!(
        /// Test handle.
        TestHandle
    );

    #[test]
    fn test_typed_handle() {
        let mut pool = Pool::new();
        let handle = TestHandle::from(pool.insert(7u8));
        assert!(handle.is_valid());
        assert_eq!(pool.get(handle.into()), Some(&7));
        assert!(!TestHandle::default().is_valid());
    }

    #[test]
    fn test_iteration_skips_free_slots() {
        let mut pool = Pool::new();
        let a = pool.insert(10);
        let b = pool.insert(20);
        let c = pool.insert(30);
        pool.remove(b);

        let live: Vec<_> = pool.iter().map(|(h, v)| (h, *v)).collect();
        assert_eq!(live, vec![(a, 10), (c, 30)]);

        for (_, v) in pool.iter_mut() {
            *v += 1;
        }
        assert_eq!(pool.get(c), Some(&31));
        assert_eq!(pool.handles(), vec![a, c]);
    }
}
