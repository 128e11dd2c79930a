//! # Component Storage Registry
//!
//! Owns one storage per registered component type, type-erased behind
//! [`AnyStorage`] and indexed by [`ComponentId`].
//!
//! Each storage sits behind its own reader/writer lock. Code holding
//! `&mut ComponentRegistry` bypasses the locks entirely; shared access (queries,
//! systems running in parallel) takes the lock once per borrow and fails fast
//! with [`EcsError::StorageBorrowed`] instead of blocking on a conflict.
//!
//! The registry never touches entity masks. Keeping masks and storages in
//! agreement is the world's job.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::ops::Deref;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use serde_json::Value;

use super::component::Component;
use super::entity::{ComponentId, Mask};
use super::storage::Storage;
use crate::error::{EcsError, EcsResult};

/// Shared borrow of a whole component storage.
pub type ReadStorage<'a, T> = MappedRwLockReadGuard<'a, <T as Component>::Storage>;

/// Exclusive borrow of a whole component storage.
///
/// Values can be read and changed in place. Entries can't be inserted or
/// removed through it: that goes through the world, which keeps entity masks
/// in step with the storage.
pub struct WriteStorage<'a, T: Component> {
    guard: MappedRwLockWriteGuard<'a, T::Storage>,
}

impl<T: Component> WriteStorage<'_, T> {
    /// Gets the component at `index` mutably.
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        <T::Storage as Storage<T>>::get_mut(&mut *self.guard, index)
    }

    /// Iterates mutably over stored components in ascending index order.
    pub fn iter_mut(&mut self) -> <T::Storage as Storage<T>>::IterMut<'_> {
        <T::Storage as Storage<T>>::iter_mut(&mut *self.guard)
    }
}

impl<T: Component> Deref for WriteStorage<'_, T> {
    type Target = T::Storage;

    fn deref(&self) -> &T::Storage {
        &self.guard
    }
}

/// Shared borrow of a single component.
pub type ComponentRef<'a, T> = MappedRwLockReadGuard<'a, T>;

/// Operations available on a storage without knowing its component type.
pub(crate) trait AnyStorage: Send + Sync {
    /// Number of stored components.
    fn len(&self) -> usize;
    fn contains(&self, index: u32) -> bool;
    /// Removes the component at `index`, returning whether one was there.
    fn remove(&mut self, index: u32) -> bool;
    /// Converts the component at `index` into a structured value.
    fn pack(&self, index: u32) -> EcsResult<Option<Value>>;
    /// Builds a component from a structured value and stores it at `index`.
    fn unpack(&mut self, index: u32, value: Value) -> EcsResult<()>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Typed storage of one component type.
struct Column<T: Component> {
    storage: T::Storage,
}

impl<T: Component> Default for Column<T> {
    fn default() -> Self {
        Self {
            storage: T::Storage::default(),
        }
    }
}

impl<T: Component> AnyStorage for Column<T> {
    fn len(&self) -> usize {
        self.storage.len()
    }

    fn contains(&self, index: u32) -> bool {
        self.storage.contains(index)
    }

    fn remove(&mut self, index: u32) -> bool {
        self.storage.remove(index).is_some()
    }

    fn pack(&self, index: u32) -> EcsResult<Option<Value>> {
        self.storage
            .get(index)
            .map(|component| {
                serde_json::to_value(component)
                    .map_err(|e| EcsError::Package(format!("failed to pack '{}': {e}", T::NAME)))
            })
            .transpose()
    }

    fn unpack(&mut self, index: u32, value: Value) -> EcsResult<()> {
        let component: T = serde_json::from_value(value)
            .map_err(|e| EcsError::Package(format!("failed to unpack '{}': {e}", T::NAME)))?;
        self.storage.insert(index, component);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A registered component type.
struct Slot {
    /// Component name, readable without taking the lock.
    name: &'static str,
    /// Size in bytes of one value.
    size: usize,
    storage: RwLock<Box<dyn AnyStorage>>,
}

/// Registry of component types and their storages.
#[derive(Default)]
pub struct ComponentRegistry {
    /// Rust type to component id.
    ids: HashMap<TypeId, ComponentId>,
    /// Component name to component id.
    names: HashMap<&'static str, ComponentId>,
    /// Slot of component id `i` lives at `i - 1`.
    slots: Vec<Slot>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`, allocating its id and an empty storage.
    ///
    /// Idempotent: registering a type again returns the id it already has.
    /// Ids are handed out in registration order starting at 1 and are never
    /// reused.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DuplicateComponentName`] if another type already uses `T::NAME`
    /// - [`EcsError::ComponentLimitReached`] if every mask bit is taken
    pub fn register<T: Component>(&mut self) -> EcsResult<ComponentId> {
        if let Some(&id) = self.ids.get(&TypeId::of::<T>()) {
            return Ok(id);
        }
        if self.names.contains_key(T::NAME) {
            return Err(EcsError::DuplicateComponentName(T::NAME));
        }
        if self.slots.len() >= Mask::MAX_COMPONENTS {
            return Err(EcsError::ComponentLimitReached(Mask::MAX_COMPONENTS));
        }

        // At most MAX_COMPONENTS (63) storages, so the id fits.
        #[allow(clippy::cast_possible_truncation)]
        let id = (self.slots.len() + 1) as ComponentId;
        let storage: Box<dyn AnyStorage> = Box::new(Column::<T>::default());
        self.slots.push(Slot {
            name: T::NAME,
            size: std::mem::size_of::<T>(),
            storage: RwLock::new(storage),
        });
        self.ids.insert(TypeId::of::<T>(), id);
        self.names.insert(T::NAME, id);
        Ok(id)
    }

    /// Whether `T` has been registered.
    #[must_use]
    pub fn is_registered<T: Component>(&self) -> bool {
        self.ids.contains_key(&TypeId::of::<T>())
    }

    /// Returns the id of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` was never registered.
    pub fn id<T: Component>(&self) -> EcsResult<ComponentId> {
        self.ids
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or(EcsError::UnregisteredComponent(T::NAME))
    }

    /// Returns the id registered under a component name.
    #[must_use]
    pub fn id_by_name(&self, name: &str) -> Option<ComponentId> {
        self.names.get(name).copied()
    }

    /// Returns the name of the component with the given id.
    #[must_use]
    pub fn name(&self, id: ComponentId) -> Option<&'static str> {
        self.slot(id).map(|slot| slot.name)
    }

    /// Returns the size in bytes of one value of the component with the given id.
    #[must_use]
    pub fn type_size(&self, id: ComponentId) -> Option<usize> {
        self.slot(id).map(|slot| slot.size)
    }

    /// Number of registered component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no component type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Inserts or overwrites the `T` stored at `index`, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` was never registered.
    pub fn insert<T: Component>(&mut self, index: u32, value: T) -> EcsResult<Option<T>> {
        Ok(self.column_mut::<T>()?.storage.insert(index, value))
    }

    /// Removes and returns the `T` stored at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` was never registered.
    pub fn remove<T: Component>(&mut self, index: u32) -> EcsResult<Option<T>> {
        Ok(self.column_mut::<T>()?.storage.remove(index))
    }

    /// Gets the `T` stored at `index` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` was never registered.
    pub fn get_mut<T: Component>(&mut self, index: u32) -> EcsResult<Option<&mut T>> {
        Ok(self.column_mut::<T>()?.storage.get_mut(index))
    }

    /// Borrows the `T` stored at `index`. `Ok(None)` means "not present".
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredComponent`] if `T` was never registered
    /// - [`EcsError::StorageBorrowed`] if the storage is exclusively borrowed
    pub fn get<T: Component>(&self, index: u32) -> EcsResult<Option<ComponentRef<'_, T>>> {
        let storage = self.read::<T>()?;
        Ok(MappedRwLockReadGuard::try_map(storage, |storage| storage.get(index)).ok())
    }

    /// Whether a `T` is stored at `index`. False for unregistered types.
    #[must_use]
    pub fn contains<T: Component>(&self, index: u32) -> bool {
        self.id::<T>()
            .is_ok_and(|id| self.contains_id(id, index))
    }

    /// Whether the storage with the given id holds a component at `index`.
    ///
    /// False if the storage is exclusively borrowed elsewhere; this never waits.
    #[must_use]
    pub fn contains_id(&self, id: ComponentId, index: u32) -> bool {
        self.slot(id).is_some_and(|slot| match slot.storage.try_read() {
            Some(storage) => storage.contains(index),
            None => {
                tracing::warn!("Storage of component '{}' is exclusively borrowed", slot.name);
                false
            }
        })
    }

    /// Number of components held by the storage with the given id.
    ///
    /// `None` if the id is unknown or the storage is exclusively borrowed.
    #[must_use]
    pub fn count(&self, id: ComponentId) -> Option<usize> {
        let slot = self.slot(id)?;
        let Some(storage) = slot.storage.try_read() else {
            tracing::warn!("Storage of component '{}' is exclusively borrowed", slot.name);
            return None;
        };
        Some(storage.len())
    }

    /// Removes whatever the storage with the given id holds at `index`.
    pub fn remove_id(&mut self, id: ComponentId, index: u32) -> bool {
        self.slot_mut(id)
            .is_some_and(|slot| slot.storage.get_mut().remove(index))
    }

    /// Converts the component with the given id at `index` into a structured value.
    pub(crate) fn pack_id(&self, id: ComponentId, index: u32) -> EcsResult<Option<Value>> {
        let Some(slot) = self.slot(id) else {
            return Ok(None);
        };
        let Some(storage) = slot.storage.try_read() else {
            tracing::warn!("Storage of component '{}' is exclusively borrowed", slot.name);
            return Err(EcsError::StorageBorrowed(slot.name));
        };
        storage.pack(index)
    }

    /// Builds the component with the given id from a structured value at `index`.
    pub(crate) fn unpack_id(&mut self, id: ComponentId, index: u32, value: Value) -> EcsResult<()> {
        match self.slot_mut(id) {
            Some(slot) => slot.storage.get_mut().unpack(index, value),
            None => Err(EcsError::UnknownComponent(format!("#{id}"))),
        }
    }

    /// Borrows the whole storage of `T` for reading.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredComponent`] if `T` was never registered
    /// - [`EcsError::StorageBorrowed`] if the storage is exclusively borrowed
    pub fn read<T: Component>(&self) -> EcsResult<ReadStorage<'_, T>> {
        let id = self.id::<T>()?;
        let slot = self
            .slot(id)
            .ok_or(EcsError::UnregisteredComponent(T::NAME))?;
        let Some(guard) = slot.storage.try_read() else {
            tracing::warn!("Storage of component '{}' is exclusively borrowed", T::NAME);
            return Err(EcsError::StorageBorrowed(T::NAME));
        };
        RwLockReadGuard::try_map(guard, |storage| {
            storage
                .as_any()
                .downcast_ref::<Column<T>>()
                .map(|column| &column.storage)
        })
        .map_err(|_| EcsError::UnregisteredComponent(T::NAME))
    }

    /// Borrows the whole storage of `T` for writing.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredComponent`] if `T` was never registered
    /// - [`EcsError::StorageBorrowed`] if the storage is borrowed elsewhere
    pub fn write<T: Component>(&self) -> EcsResult<WriteStorage<'_, T>> {
        let id = self.id::<T>()?;
        let slot = self
            .slot(id)
            .ok_or(EcsError::UnregisteredComponent(T::NAME))?;
        let Some(guard) = slot.storage.try_write() else {
            tracing::warn!("Storage of component '{}' is already borrowed", T::NAME);
            return Err(EcsError::StorageBorrowed(T::NAME));
        };
        RwLockWriteGuard::try_map(guard, |storage| {
            storage
                .as_any_mut()
                .downcast_mut::<Column<T>>()
                .map(|column| &mut column.storage)
        })
        .map(|guard| WriteStorage { guard })
        .map_err(|_| EcsError::UnregisteredComponent(T::NAME))
    }

    fn slot(&self, id: ComponentId) -> Option<&Slot> {
        self.slots.get((id as usize).checked_sub(1)?)
    }

    fn slot_mut(&mut self, id: ComponentId) -> Option<&mut Slot> {
        self.slots.get_mut((id as usize).checked_sub(1)?)
    }

    fn column_mut<T: Component>(&mut self) -> EcsResult<&mut Column<T>> {
        let id = self.id::<T>()?;
        self.slot_mut(id)
            .and_then(|slot| slot.storage.get_mut().as_any_mut().downcast_mut::<Column<T>>())
            .ok_or(EcsError::UnregisteredComponent(T::NAME))
    }
}
