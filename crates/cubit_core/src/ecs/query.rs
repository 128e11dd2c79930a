//! # Query Engine
//!
//! A query names the component data it wants (`&T`, `&mut T`, `Option<&T>`,
//! `Option<&mut T>` or tuples of those) plus filters (`With<T>`, `Without<T>`),
//! and yields `(Entity, data)` for every live entity whose mask satisfies
//!
//! ```text
//! (mask & required) == required && (mask & excluded) == 0
//! ```
//!
//! Entities are visited in index order. Every storage a query touches is
//! locked once, when the query is built, and stays locked until the query is
//! dropped. Iteration walks the entity slots and advances one ordered cursor
//! per storage alongside, so each step is a short forward seek instead of a
//! lookup.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut query = world.query_filtered::<(&mut Position, &Velocity), Without<Frozen>>()?;
//! for (_entity, (position, velocity)) in &mut query {
//!     position.x += velocity.x;
//! }
//! ```

use std::iter::Peekable;
use std::marker::PhantomData;

use super::component::Component;
use super::entity::{ComponentId, Entity, Mask};
use super::entity_manager::{Entities, EntityManager};
use super::registry::{ComponentRegistry, ReadStorage, WriteStorage};
use super::storage::Storage;
use crate::error::{EcsError, EcsResult};

/// Masks and component set declared by a query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Access {
    required: Mask,
    excluded: Mask,
    /// Components whose data the query fetches.
    touched: Mask,
}

impl Access {
    /// Requires matching entities to have component `id`.
    pub fn require(&mut self, id: ComponentId) {
        self.required.set(id);
    }

    /// Rejects entities having component `id`.
    pub fn exclude(&mut self, id: ComponentId) {
        self.excluded.set(id);
    }

    /// Records that the query fetches component `id`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ConflictingAccess`] if the component is already
    /// fetched by the same query.
    pub fn fetch(&mut self, id: ComponentId, name: &'static str) -> EcsResult<()> {
        if self.touched.test(id) {
            return Err(EcsError::ConflictingAccess(name));
        }
        self.touched.set(id);
        Ok(())
    }

    /// Mask every matching entity must contain.
    #[must_use]
    pub const fn required(&self) -> Mask {
        self.required
    }

    /// Mask no matching entity may intersect.
    #[must_use]
    pub const fn excluded(&self) -> Mask {
        self.excluded
    }
}

/// Component data a query can yield per entity.
///
/// - `Fetch<'w>` holds the storage locks for the lifetime of the query
/// - `Cursor<'q>` walks the locked storages in index order during one iteration
/// - `Item<'q>` is what each matching entity yields
pub trait QueryData {
    /// Locked storages.
    type Fetch<'w>;
    /// Per-iteration position in the locked storages.
    type Cursor<'q>;
    /// Data yielded per entity.
    type Item<'q>;

    /// Declares the components fetched and required.
    ///
    /// # Errors
    ///
    /// Fails for unregistered types or a component fetched twice.
    fn access(registry: &ComponentRegistry, access: &mut Access) -> EcsResult<()>;

    /// Locks the storages.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StorageBorrowed`] if a storage is held in an
    /// incompatible mode elsewhere.
    fn acquire(registry: &ComponentRegistry) -> EcsResult<Self::Fetch<'_>>;

    /// Starts a walk over the locked storages.
    fn cursor<'q, 'w>(fetch: &'q mut Self::Fetch<'w>) -> Self::Cursor<'q>;

    /// Fetches the data of entity `index`.
    ///
    /// Must be called with strictly increasing indices on the same cursor.
    /// `None` means a required component is missing.
    fn fetch<'q>(cursor: &mut Self::Cursor<'q>, index: u32) -> Option<Self::Item<'q>>;
}

/// Mask-only condition on matching entities.
pub trait QueryFilter {
    /// Adds the filter's bits to `access`.
    ///
    /// # Errors
    ///
    /// Fails for unregistered types.
    fn filter(registry: &ComponentRegistry, access: &mut Access) -> EcsResult<()>;
}

/// Filter matching entities that have a `T`, without fetching it.
pub struct With<T>(PhantomData<T>);

/// Filter matching entities that don't have a `T`.
pub struct Without<T>(PhantomData<T>);

/// Advances `cursor` to `index`, returning the value stored there.
fn seek<I, V>(cursor: &mut Peekable<I>, index: u32) -> Option<V>
where
    I: Iterator<Item = (u32, V)>,
{
    while cursor.next_if(|(at, _)| *at < index).is_some() {}
    cursor.next_if(|(at, _)| *at == index).map(|(_, value)| value)
}

impl<T: Component> QueryData for &T {
    type Fetch<'w> = ReadStorage<'w, T>;
    type Cursor<'q> = Peekable<<T::Storage as Storage<T>>::Iter<'q>>;
    type Item<'q> = &'q T;

    fn access(registry: &ComponentRegistry, access: &mut Access) -> EcsResult<()> {
        let id = registry.id::<T>()?;
        access.fetch(id, T::NAME)?;
        access.require(id);
        Ok(())
    }

    fn acquire(registry: &ComponentRegistry) -> EcsResult<Self::Fetch<'_>> {
        registry.read::<T>()
    }

    fn cursor<'q, 'w>(fetch: &'q mut Self::Fetch<'w>) -> Self::Cursor<'q> {
        <T::Storage as Storage<T>>::iter(fetch).peekable()
    }

    fn fetch<'q>(cursor: &mut Self::Cursor<'q>, index: u32) -> Option<Self::Item<'q>> {
        seek(cursor, index)
    }
}

impl<T: Component> QueryData for &mut T {
    type Fetch<'w> = WriteStorage<'w, T>;
    type Cursor<'q> = Peekable<<T::Storage as Storage<T>>::IterMut<'q>>;
    type Item<'q> = &'q mut T;

    fn access(registry: &ComponentRegistry, access: &mut Access) -> EcsResult<()> {
        let id = registry.id::<T>()?;
        access.fetch(id, T::NAME)?;
        access.require(id);
        Ok(())
    }

    fn acquire(registry: &ComponentRegistry) -> EcsResult<Self::Fetch<'_>> {
        registry.write::<T>()
    }

    fn cursor<'q, 'w>(fetch: &'q mut Self::Fetch<'w>) -> Self::Cursor<'q> {
        fetch.iter_mut().peekable()
    }

    fn fetch<'q>(cursor: &mut Self::Cursor<'q>, index: u32) -> Option<Self::Item<'q>> {
        seek(cursor, index)
    }
}

impl<T: Component> QueryData for Option<&T> {
    type Fetch<'w> = ReadStorage<'w, T>;
    type Cursor<'q> = Peekable<<T::Storage as Storage<T>>::Iter<'q>>;
    type Item<'q> = Option<&'q T>;

    fn access(registry: &ComponentRegistry, access: &mut Access) -> EcsResult<()> {
        access.fetch(registry.id::<T>()?, T::NAME)
    }

    fn acquire(registry: &ComponentRegistry) -> EcsResult<Self::Fetch<'_>> {
        registry.read::<T>()
    }

    fn cursor<'q, 'w>(fetch: &'q mut Self::Fetch<'w>) -> Self::Cursor<'q> {
        <T::Storage as Storage<T>>::iter(fetch).peekable()
    }

    fn fetch<'q>(cursor: &mut Self::Cursor<'q>, index: u32) -> Option<Self::Item<'q>> {
        Some(seek(cursor, index))
    }
}

impl<T: Component> QueryData for Option<&mut T> {
    type Fetch<'w> = WriteStorage<'w, T>;
    type Cursor<'q> = Peekable<<T::Storage as Storage<T>>::IterMut<'q>>;
    type Item<'q> = Option<&'q mut T>;

    fn access(registry: &ComponentRegistry, access: &mut Access) -> EcsResult<()> {
        access.fetch(registry.id::<T>()?, T::NAME)
    }

    fn acquire(registry: &ComponentRegistry) -> EcsResult<Self::Fetch<'_>> {
        registry.write::<T>()
    }

    fn cursor<'q, 'w>(fetch: &'q mut Self::Fetch<'w>) -> Self::Cursor<'q> {
        fetch.iter_mut().peekable()
    }

    fn fetch<'q>(cursor: &mut Self::Cursor<'q>, index: u32) -> Option<Self::Item<'q>> {
        Some(seek(cursor, index))
    }
}

impl QueryFilter for () {
    fn filter(_registry: &ComponentRegistry, _access: &mut Access) -> EcsResult<()> {
        Ok(())
    }
}

impl<T: Component> QueryFilter for With<T> {
    fn filter(registry: &ComponentRegistry, access: &mut Access) -> EcsResult<()> {
        access.require(registry.id::<T>()?);
        Ok(())
    }
}

impl<T: Component> QueryFilter for Without<T> {
    fn filter(registry: &ComponentRegistry, access: &mut Access) -> EcsResult<()> {
        access.exclude(registry.id::<T>()?);
        Ok(())
    }
}

macro_rules! impl_query_tuple {
    ($($Q:ident),+) => {
        impl<$($Q: QueryData),+> QueryData for ($($Q,)+) {
            type Fetch<'w> = ($($Q::Fetch<'w>,)+);
            type Cursor<'q> = ($($Q::Cursor<'q>,)+);
            type Item<'q> = ($($Q::Item<'q>,)+);

            fn access(registry: &ComponentRegistry, access: &mut Access) -> EcsResult<()> {
                $($Q::access(registry, access)?;)+
                Ok(())
            }

            fn acquire(registry: &ComponentRegistry) -> EcsResult<Self::Fetch<'_>> {
                Ok(($($Q::acquire(registry)?,)+))
            }

            #[allow(non_snake_case)]
            fn cursor<'q, 'w>(fetch: &'q mut Self::Fetch<'w>) -> Self::Cursor<'q> {
                let ($($Q,)+) = fetch;
                ($($Q::cursor($Q),)+)
            }

            #[allow(non_snake_case)]
            fn fetch<'q>(cursor: &mut Self::Cursor<'q>, index: u32) -> Option<Self::Item<'q>> {
                let ($($Q,)+) = cursor;
                Some(($($Q::fetch($Q, index)?,)+))
            }
        }

        impl<$($Q: QueryFilter),+> QueryFilter for ($($Q,)+) {
            fn filter(registry: &ComponentRegistry, access: &mut Access) -> EcsResult<()> {
                $($Q::filter(registry, access)?;)+
                Ok(())
            }
        }
    };
}

impl_query_tuple!(Q1);
impl_query_tuple!(Q1, Q2);
impl_query_tuple!(Q1, Q2, Q3);
impl_query_tuple!(Q1, Q2, Q3, Q4);
impl_query_tuple!(Q1, Q2, Q3, Q4, Q5);
impl_query_tuple!(Q1, Q2, Q3, Q4, Q5, Q6);
impl_query_tuple!(Q1, Q2, Q3, Q4, Q5, Q6, Q7);
impl_query_tuple!(Q1, Q2, Q3, Q4, Q5, Q6, Q7, Q8);

/// A query over the world, holding the locks of every storage it reads or writes.
///
/// Built by [`World::query`](super::World::query) and
/// [`World::query_filtered`](super::World::query_filtered). Each call to [`Query::iter`]
/// starts a fresh walk over the current live entities.
pub struct Query<'w, Q: QueryData, F: QueryFilter = ()> {
    entities: &'w EntityManager,
    fetch: Q::Fetch<'w>,
    access: Access,
    filter: PhantomData<F>,
}

impl<'w, Q: QueryData, F: QueryFilter> Query<'w, Q, F> {
    pub(crate) fn new(entities: &'w EntityManager, registry: &'w ComponentRegistry) -> EcsResult<Self> {
        let mut access = Access::default();
        Q::access(registry, &mut access)?;
        F::filter(registry, &mut access)?;
        let fetch = Q::acquire(registry)?;
        Ok(Self {
            entities,
            fetch,
            access,
            filter: PhantomData,
        })
    }

    /// Iterates over matching entities in index order.
    pub fn iter(&mut self) -> QueryIter<'_, Q> {
        QueryIter {
            entities: self.entities.iter(),
            cursor: Q::cursor(&mut self.fetch),
            required: self.access.required,
            excluded: self.access.excluded,
        }
    }

    /// Whether `entity` is alive and satisfies the query's masks.
    #[must_use]
    pub fn matches(&self, entity: Entity) -> bool {
        self.entities
            .mask(entity)
            .is_ok_and(|mask| self.accepts(mask))
    }

    /// Mask every matching entity contains.
    #[must_use]
    pub const fn required(&self) -> Mask {
        self.access.required
    }

    /// Mask no matching entity intersects.
    #[must_use]
    pub const fn excluded(&self) -> Mask {
        self.access.excluded
    }

    fn accepts(&self, mask: Mask) -> bool {
        mask.contains_all(self.access.required) && !mask.intersects(self.access.excluded)
    }
}

impl<'q, 'w, Q: QueryData, F: QueryFilter> IntoIterator for &'q mut Query<'w, Q, F> {
    type Item = (Entity, Q::Item<'q>);
    type IntoIter = QueryIter<'q, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the matches of a [`Query`].
pub struct QueryIter<'q, Q: QueryData> {
    entities: Entities<'q>,
    cursor: Q::Cursor<'q>,
    required: Mask,
    excluded: Mask,
}

impl<'q, Q: QueryData> Iterator for QueryIter<'q, Q> {
    type Item = (Entity, Q::Item<'q>);

    fn next(&mut self) -> Option<Self::Item> {
        for (entity, mask) in self.entities.by_ref() {
            if !mask.contains_all(self.required) || mask.intersects(self.excluded) {
                continue;
            }
            if let Some(item) = Q::fetch(&mut self.cursor, entity.index()) {
                return Some((entity, item));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::storage::{MapStorage, VecStorage};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct A(u32);

    impl Component for A {
        const NAME: &'static str = "A";
        type Storage = VecStorage<Self>;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct B(u32);

    impl Component for B {
        const NAME: &'static str = "B";
        type Storage = MapStorage<Self>;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct C;

    impl Component for C {
        const NAME: &'static str = "C";
        type Storage = VecStorage<Self>;
    }

    /// Builds entities with masks {AB, A, B, AC}, keeping storages in sync.
    fn setup() -> (EntityManager, ComponentRegistry, Vec<Entity>) {
        let mut entities = EntityManager::new();
        let mut registry = ComponentRegistry::new();
        let a = registry.register::<A>().unwrap();
        let b = registry.register::<B>().unwrap();
        let c = registry.register::<C>().unwrap();

        let ab = entities.create(Mask::EMPTY.with(a).with(b));
        registry.insert(ab.index(), A(0)).unwrap();
        registry.insert(ab.index(), B(0)).unwrap();

        let only_a = entities.create(Mask::EMPTY.with(a));
        registry.insert(only_a.index(), A(1)).unwrap();

        let only_b = entities.create(Mask::EMPTY.with(b));
        registry.insert(only_b.index(), B(2)).unwrap();

        let ac = entities.create(Mask::EMPTY.with(a).with(c));
        registry.insert(ac.index(), A(3)).unwrap();
        registry.insert(ac.index(), C).unwrap();

        (entities, registry, vec![ab, only_a, only_b, ac])
    }

    #[test]
    fn test_required_and_excluded_masks() {
        let (entities, registry, handles) = setup();
        let mut query = Query::<&A, Without<C>>::new(&entities, &registry).unwrap();

        let matched: Vec<(Entity, u32)> = query.iter().map(|(e, a)| (e, a.0)).collect();
        assert_eq!(matched, vec![(handles[0], 0), (handles[1], 1)]);
        assert!(query.matches(handles[1]));
        assert!(!query.matches(handles[3]));
        assert_eq!(query.required(), Mask::EMPTY.with(1));
        assert_eq!(query.excluded(), Mask::EMPTY.with(3));
    }

    #[test]
    fn test_write_through_query() {
        let (entities, registry, handles) = setup();
        {
            let mut query = Query::<(&mut A, &B)>::new(&entities, &registry).unwrap();
            for (_, (a, b)) in &mut query {
                a.0 += b.0 + 10;
            }
        }
        assert_eq!(*registry.get::<A>(handles[0].index()).unwrap().unwrap(), A(10));
        assert_eq!(*registry.get::<A>(handles[1].index()).unwrap().unwrap(), A(1));
    }

    #[test]
    fn test_optional_yields_presence() {
        let (entities, registry, _) = setup();
        let mut query = Query::<(&A, Option<&B>)>::new(&entities, &registry).unwrap();
        let seen: Vec<(u32, Option<u32>)> = query
            .iter()
            .map(|(_, (a, b))| (a.0, b.map(|b| b.0)))
            .collect();
        assert_eq!(seen, vec![(0, Some(0)), (1, None), (3, None)]);
    }

    #[test]
    fn test_optional_write_touches_only_present() {
        let (entities, registry, handles) = setup();
        {
            let mut query = Query::<(&A, Option<&mut B>)>::new(&entities, &registry).unwrap();
            assert_eq!(query.required(), Mask::EMPTY.with(1));
            let mut seen = Vec::new();
            for (_, (a, b)) in &mut query {
                if let Some(b) = b {
                    b.0 += 10;
                }
                seen.push(a.0);
            }
            assert_eq!(seen, vec![0, 1, 3]);
        }
        let b = |index| registry.get::<B>(index).unwrap().map(|b| b.0);
        assert_eq!(b(handles[0].index()), Some(10));
        assert_eq!(b(handles[1].index()), None);
        // Lacks A, so the query never visits it.
        assert_eq!(b(handles[2].index()), Some(2));
        assert_eq!(b(handles[3].index()), None);
    }

    #[test]
    fn test_fresh_iteration_each_call() {
        let (entities, registry, _) = setup();
        let mut query = Query::<&mut A, With<B>>::new(&entities, &registry).unwrap();
        for (_, a) in query.iter() {
            a.0 = 42;
        }
        assert_eq!(query.iter().map(|(_, a)| a.0).collect::<Vec<_>>(), vec![42]);
    }

    #[test]
    fn test_same_component_twice_is_rejected() {
        let (entities, registry, _) = setup();
        assert_eq!(
            Query::<(&A, &mut A)>::new(&entities, &registry).err(),
            Some(EcsError::ConflictingAccess("A"))
        );
        assert_eq!(
            Query::<(&B, Option<&B>)>::new(&entities, &registry).err(),
            Some(EcsError::ConflictingAccess("B"))
        );
    }

    #[test]
    fn test_storage_locks_held_by_query() {
        let (entities, registry, _) = setup();
        let reader = Query::<&A>::new(&entities, &registry).unwrap();
        assert!(Query::<&A>::new(&entities, &registry).is_ok());
        assert_eq!(
            Query::<&mut A>::new(&entities, &registry).err(),
            Some(EcsError::StorageBorrowed("A"))
        );
        drop(reader);
        assert!(Query::<&mut A>::new(&entities, &registry).is_ok());
    }
}
