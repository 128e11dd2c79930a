//! # Resources
//!
//! Process-lifetime singletons, one instance per type, independent of entities.
//!
//! Every resource is bound 1:1 to its own reader/writer lock:
//! - Any number of [`ReadResource`] guards of the same type may coexist
//! - A [`WriteResource`] guard excludes every other guard of that type
//! - Locks of different types are independent; there is no global lock
//!
//! Guards release their lock when dropped, on every exit path.
//!
//! Don't acquire resource locks of different types in inconsistent orders from
//! different threads; nothing here detects lock-ordering deadlocks.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{EcsError, EcsResult};

/// Marker trait for types that can be stored as resources.
pub trait Resource: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Resource for T {}

/// Shared access to a resource. Released on drop.
pub struct ReadResource<'a, T: Resource> {
    guard: RwLockReadGuard<'a, T>,
}

impl<T: Resource> Deref for ReadResource<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Exclusive access to a resource. Released on drop.
pub struct WriteResource<'a, T: Resource> {
    guard: RwLockWriteGuard<'a, T>,
}

impl<T: Resource> Deref for WriteResource<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T: Resource> DerefMut for WriteResource<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// Owner of every registered resource.
#[derive(Default)]
pub struct ResourceManager {
    /// Each value is a `RwLock<T>` for the `T` its key names.
    resources: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ResourceManager {
    /// Creates an empty resource manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the single instance of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ResourceAlreadyRegistered`] if `T` already has an
    /// instance; the existing instance is left untouched.
    pub fn add<T: Resource>(&mut self, value: T) -> EcsResult<()> {
        let type_id = TypeId::of::<T>();
        if self.resources.contains_key(&type_id) {
            return Err(EcsError::ResourceAlreadyRegistered(type_name::<T>()));
        }
        self.resources.insert(type_id, Box::new(RwLock::new(value)));
        Ok(())
    }

    /// Whether `T` is registered.
    #[must_use]
    pub fn contains<T: Resource>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resource is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Locks `T` for reading, waiting for any writer to finish.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredResource`] if `T` was never registered.
    pub fn read<T: Resource>(&self) -> EcsResult<ReadResource<'_, T>> {
        Ok(ReadResource {
            guard: self.lock::<T>()?.read(),
        })
    }

    /// Locks `T` for writing, waiting for every other guard to be released.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredResource`] if `T` was never registered.
    pub fn write<T: Resource>(&self) -> EcsResult<WriteResource<'_, T>> {
        Ok(WriteResource {
            guard: self.lock::<T>()?.write(),
        })
    }

    /// Locks `T` for reading if no writer holds it. `Ok(None)` when contended.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredResource`] if `T` was never registered.
    pub fn try_read<T: Resource>(&self) -> EcsResult<Option<ReadResource<'_, T>>> {
        Ok(self
            .lock::<T>()?
            .try_read()
            .map(|guard| ReadResource { guard }))
    }

    /// Locks `T` for writing if nobody holds it. `Ok(None)` when contended.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredResource`] if `T` was never registered.
    pub fn try_write<T: Resource>(&self) -> EcsResult<Option<WriteResource<'_, T>>> {
        Ok(self
            .lock::<T>()?
            .try_write()
            .map(|guard| WriteResource { guard }))
    }

    /// Direct access to `T` through exclusive ownership of the manager.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredResource`] if `T` was never registered.
    pub fn get_mut<T: Resource>(&mut self) -> EcsResult<&mut T> {
        self.resources
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<RwLock<T>>())
            .map(|lock| lock.get_mut())
            .ok_or(EcsError::UnregisteredResource(type_name::<T>()))
    }

    fn lock<T: Resource>(&self) -> EcsResult<&RwLock<T>> {
        self.resources
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<RwLock<T>>())
            .ok_or(EcsError::UnregisteredResource(type_name::<T>()))
    }
}
