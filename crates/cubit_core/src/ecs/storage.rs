//! # Component Storage
//!
//! Containers mapping entity indices to component values, one container per
//! component type. Which container a type uses is chosen by
//! [`Component::Storage`](super::Component::Storage):
//!
//! - [`VecStorage`]: dense array indexed by entity index. O(1) access, cache
//!   friendly, pays one `Option<T>` per entity slot up to the highest index used.
//! - [`MapStorage`]: ordered map keyed by entity index. O(log n) access, no
//!   memory for entities without the component.
//!
//! Storages only hold data. They never look at entity masks; keeping mask and
//! storage in agreement is the world's job.

use std::collections::{btree_map, BTreeMap};

/// A container of components of type `T`, keyed by entity index.
///
/// Both iterators must yield entries in ascending index order: queries walk
/// entities in index order and advance storage iterators alongside.
pub trait Storage<T: 'static>: Default + Send + Sync + 'static {
    /// Iterator over `(index, &component)` pairs.
    type Iter<'a>: Iterator<Item = (u32, &'a T)>
    where
        Self: 'a;

    /// Iterator over `(index, &mut component)` pairs.
    type IterMut<'a>: Iterator<Item = (u32, &'a mut T)>
    where
        Self: 'a;

    /// Inserts a component, returning the one it overwrote.
    fn insert(&mut self, index: u32, value: T) -> Option<T>;

    /// Gets the component at `index`.
    fn get(&self, index: u32) -> Option<&T>;

    /// Gets the component at `index` mutably.
    fn get_mut(&mut self, index: u32) -> Option<&mut T>;

    /// Removes and returns the component at `index`.
    fn remove(&mut self, index: u32) -> Option<T>;

    /// Checks whether a component is stored at `index`.
    fn contains(&self, index: u32) -> bool {
        self.get(index).is_some()
    }

    /// Number of stored components.
    fn len(&self) -> usize;

    /// Whether the storage holds no component.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over stored components in ascending index order.
    fn iter(&self) -> Self::Iter<'_>;

    /// Iterates mutably over stored components in ascending index order.
    fn iter_mut(&mut self) -> Self::IterMut<'_>;
}

/// Dense storage backed by a growable array of optional slots.
///
/// # Example
///
/// ```rust,ignore
/// let mut storage: VecStorage<Position> = VecStorage::default();
/// storage.insert(50, Position::new(1.0, 2.0, 3.0));
/// ```
#[derive(Debug)]
pub struct VecStorage<T> {
    /// One slot per entity index up to the highest inserted.
    slots: Vec<Option<T>>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Default for VecStorage<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            len: 0,
        }
    }
}

impl<T> VecStorage<T> {
    /// Creates storage with room for `capacity` entity indices before growing.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        Self {
            slots: Vec::with_capacity(capacity),
            len: 0,
        }
    }

    /// Number of entity indices the storage can address without growing.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Removes every component, keeping the allocation.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.len = 0;
    }
}

impl<T: Send + Sync + 'static> Storage<T> for VecStorage<T> {
    type Iter<'a> = VecIter<'a, T>;
    type IterMut<'a> = VecIterMut<'a, T>;

    fn insert(&mut self, index: u32, value: T) -> Option<T> {
        let idx = index as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        let previous = self.slots[idx].replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    #[inline]
    fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize).and_then(Option::as_ref)
    }

    #[inline]
    fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize).and_then(Option::as_mut)
    }

    fn remove(&mut self, index: u32) -> Option<T> {
        let removed = self.slots.get_mut(index as usize).and_then(Option::take);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    fn iter(&self) -> Self::Iter<'_> {
        VecIter {
            slots: self.slots.iter().enumerate(),
        }
    }

    fn iter_mut(&mut self) -> Self::IterMut<'_> {
        VecIterMut {
            slots: self.slots.iter_mut().enumerate(),
        }
    }
}

/// Iterator over the occupied slots of a [`VecStorage`].
pub struct VecIter<'a, T> {
    slots: std::iter::Enumerate<std::slice::Iter<'a, Option<T>>>,
}

impl<'a, T> Iterator for VecIter<'a, T> {
    type Item = (u32, &'a T);

    // Indices were inserted as u32.
    #[allow(clippy::cast_possible_truncation)]
    fn next(&mut self) -> Option<Self::Item> {
        for (index, slot) in self.slots.by_ref() {
            if let Some(value) = slot {
                return Some((index as u32, value));
            }
        }
        None
    }
}

/// Mutable iterator over the occupied slots of a [`VecStorage`].
pub struct VecIterMut<'a, T> {
    slots: std::iter::Enumerate<std::slice::IterMut<'a, Option<T>>>,
}

impl<'a, T> Iterator for VecIterMut<'a, T> {
    type Item = (u32, &'a mut T);

    #[allow(clippy::cast_possible_truncation)]
    fn next(&mut self) -> Option<Self::Item> {
        for (index, slot) in self.slots.by_ref() {
            if let Some(value) = slot {
                return Some((index as u32, value));
            }
        }
        None
    }
}

/// Sparse storage backed by an ordered map.
#[derive(Debug)]
pub struct MapStorage<T> {
    map: BTreeMap<u32, T>,
}

impl<T> Default for MapStorage<T> {
    fn default() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }
}

impl<T: Send + Sync + 'static> Storage<T> for MapStorage<T> {
    type Iter<'a> = MapIter<'a, T>;
    type IterMut<'a> = MapIterMut<'a, T>;

    fn insert(&mut self, index: u32, value: T) -> Option<T> {
        self.map.insert(index, value)
    }

    fn get(&self, index: u32) -> Option<&T> {
        self.map.get(&index)
    }

    fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.map.get_mut(&index)
    }

    fn remove(&mut self, index: u32) -> Option<T> {
        self.map.remove(&index)
    }

    fn contains(&self, index: u32) -> bool {
        self.map.contains_key(&index)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn iter(&self) -> Self::Iter<'_> {
        MapIter {
            inner: self.map.iter(),
        }
    }

    fn iter_mut(&mut self) -> Self::IterMut<'_> {
        MapIterMut {
            inner: self.map.iter_mut(),
        }
    }
}

/// Iterator over the entries of a [`MapStorage`].
pub struct MapIter<'a, T> {
    inner: btree_map::Iter<'a, u32, T>,
}

impl<'a, T> Iterator for MapIter<'a, T> {
    type Item = (u32, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(index, value)| (*index, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Mutable iterator over the entries of a [`MapStorage`].
pub struct MapIterMut<'a, T> {
    inner: btree_map::IterMut<'a, u32, T>,
}

impl<'a, T> Iterator for MapIterMut<'a, T> {
    type Item = (u32, &'a mut T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(index, value)| (*index, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
