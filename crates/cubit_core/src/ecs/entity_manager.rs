//! # Entity Manager
//!
//! Allocates and recycles entity indices, and keeps the component mask of
//! every entity slot.
//!
//! Slots are never freed: a destroyed entity's index goes on a free list and
//! its generation is bumped, so every handle to the old occupant goes stale.

use super::entity::{Entity, Mask};
use crate::error::{EcsError, EcsResult};

/// Per-index bookkeeping.
#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    /// Current generation of the index.
    generation: u32,
    /// Component mask; [`Mask::ALIVE`] is set while the slot is occupied.
    mask: Mask,
}

/// Owner of entity identities and masks.
#[derive(Debug, Default)]
pub struct EntityManager {
    /// One slot per index ever allocated.
    slots: Vec<Slot>,
    /// Indices available for reuse.
    free_indices: Vec<u32>,
    /// Number of currently alive entities.
    alive_count: usize,
}

impl EntityManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty manager with room for `capacity` entities before growing.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_indices: Vec::new(),
            alive_count: 0,
        }
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Returns the number of slots ever allocated (alive or not).
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Creates an entity with the given component mask.
    ///
    /// Reuses a freed index when one is available, otherwise grows the slots.
    /// The alive bit is always set on the stored mask.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` entity slots are requested.
    pub fn create(&mut self, mask: Mask) -> Entity {
        let mask = mask.union(Mask::ALIVE);
        self.alive_count += 1;

        if let Some(index) = self.free_indices.pop() {
            let slot = &mut self.slots[index as usize];
            slot.mask = mask;
            return Entity::new(index, slot.generation);
        }

        let index = u32::try_from(self.slots.len()).expect("entity index space exhausted");
        self.slots.push(Slot {
            generation: 0,
            mask,
        });
        Entity::new(index, 0)
    }

    /// Destroys an entity, freeing its index for reuse.
    ///
    /// # Returns
    ///
    /// `true` if the entity was destroyed, `false` if it was already dead or
    /// the handle was stale.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.is_valid(entity) {
            return false;
        }

        let slot = &mut self.slots[entity.index() as usize];
        slot.mask = Mask::EMPTY;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_indices.push(entity.index());
        self.alive_count -= 1;
        true
    }

    /// Checks whether a handle still refers to a live entity.
    ///
    /// False for the null handle, an out-of-range index or a stale generation.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        if entity.is_null() {
            return false;
        }
        self.slots
            .get(entity.index() as usize)
            .is_some_and(|slot| slot.generation == entity.generation() && slot.mask.is_alive())
    }

    /// Returns the component mask of a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DeadEntity`] if the handle is not alive.
    pub fn mask(&self, entity: Entity) -> EcsResult<Mask> {
        if !self.is_valid(entity) {
            return Err(dead(entity));
        }
        Ok(self.slots[entity.index() as usize].mask)
    }

    /// Replaces the component mask of a live entity. The alive bit is kept.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DeadEntity`] if the handle is not alive.
    pub fn set_mask(&mut self, entity: Entity, mask: Mask) -> EcsResult<()> {
        if !self.is_valid(entity) {
            return Err(dead(entity));
        }
        self.slots[entity.index() as usize].mask = mask.union(Mask::ALIVE);
        Ok(())
    }

    /// Iterates over all alive entities in index order.
    pub fn iter(&self) -> Entities<'_> {
        Entities {
            slots: self.slots.iter().enumerate(),
        }
    }
}

impl<'a> IntoIterator for &'a EntityManager {
    type Item = Entity;
    type IntoIter = std::iter::Map<Entities<'a>, fn((Entity, Mask)) -> Entity>;

    fn into_iter(self) -> Self::IntoIter {
        let handle: fn((Entity, Mask)) -> Entity = |(entity, _)| entity;
        self.iter().map(handle)
    }
}

/// Builds the error for a stale handle.
pub(crate) fn dead(entity: Entity) -> EcsError {
    EcsError::DeadEntity {
        index: entity.index(),
        generation: entity.generation(),
    }
}

/// Iterator over alive entities and their masks, in index order.
///
/// Reads the slots lazily, so it reflects the manager as it is when each step runs.
pub struct Entities<'a> {
    slots: std::iter::Enumerate<std::slice::Iter<'a, Slot>>,
}

impl Iterator for Entities<'_> {
    type Item = (Entity, Mask);

    fn next(&mut self) -> Option<Self::Item> {
        for (index, slot) in self.slots.by_ref() {
            if slot.mask.is_alive() {
                // Slot count never exceeds u32::MAX, see `create`.
                #[allow(clippy::cast_possible_truncation)]
                let entity = Entity::new(index as u32, slot.generation);
                return Some((entity, slot.mask));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.slots.size_hint().1)
    }
}
