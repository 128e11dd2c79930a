//! # ECS World
//!
//! The central container for all entities, components and resources.
//!
//! The world keeps entity masks and component storages in agreement: bit `i`
//! of an entity's mask is set iff the storage of component `i` holds a value at
//! the entity's index. Every structural operation updates both together.
//!
//! # Concurrency
//!
//! Structural operations (`register_*`, `create`, `destroy`, `add`, `remove`,
//! `unpack`) take `&mut self`, so they can't overlap with queries, guards or
//! each other. Everything else takes `&self` and goes through per-storage or
//! per-resource locks, so a `&World` can be shared across system threads.
//!
//! # Errors
//!
//! Usage errors (a dead entity, an unregistered type, a duplicate resource) are
//! logged where they are detected and returned; the operation is skipped and
//! the world is left as it was.

use std::fmt;

use super::bundle::Bundle;
use super::component::Component;
use super::entity::{ComponentId, Entity, Mask};
use super::entity_manager::EntityManager;
use super::package::Package;
use super::query::{Query, QueryData, QueryFilter};
use super::registry::{ComponentRef, ComponentRegistry, ReadStorage, WriteStorage};
use super::resource::{ReadResource, Resource, ResourceManager, WriteResource};
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};

/// The ECS World - container for all game state.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
/// world.register_component::<Position>()?;
/// world.register_component::<Velocity>()?;
///
/// let entity = world.create((Position::default(), Velocity::new(1.0, 0.0, 0.0)))?;
///
/// let mut query = world.query::<(&mut Position, &Velocity)>()?;
/// for (_, (position, velocity)) in &mut query {
///     position.x += velocity.x;
/// }
/// ```
pub struct World {
    entities: EntityManager,
    components: ComponentRegistry,
    resources: ResourceManager,
    config: WorldConfig,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.alive_count())
            .field("components", &self.components.len())
            .field("resources", &self.resources.len())
            .field("config", &self.config)
            .finish()
    }
}

impl World {
    /// Creates an empty world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(WorldConfig::default())
    }

    /// Creates an empty world with room for `capacity` entities before growing.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if `capacity` exceeds the entity
    /// index space.
    pub fn with_capacity(capacity: usize) -> EcsResult<Self> {
        Self::with_config(WorldConfig {
            initial_capacity: capacity,
            ..WorldConfig::default()
        })
    }

    /// Creates an empty world from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the configuration fails validation.
    pub fn with_config(config: WorldConfig) -> EcsResult<Self> {
        report("configure world", config.validate())?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        Self {
            entities: EntityManager::with_capacity(config.initial_capacity),
            components: ComponentRegistry::new(),
            resources: ResourceManager::new(),
            config,
        }
    }

    /// Returns the configuration the world was built with.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a component type, returning its id.
    ///
    /// Idempotent. Must happen before any other thread touches the world.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DuplicateComponentName`] if another type uses `T::NAME`
    /// - [`EcsError::ComponentLimitReached`] if every mask bit is taken
    pub fn register_component<T: Component>(&mut self) -> EcsResult<ComponentId> {
        if let Ok(id) = self.components.id::<T>() {
            return Ok(id);
        }
        let id = report("register component", self.components.register::<T>())?;
        tracing::trace!("Registered component '{}' with id {}", T::NAME, id);
        Ok(id)
    }

    /// Returns the id of a registered component type.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` was never registered.
    pub fn component_id<T: Component>(&self) -> EcsResult<ComponentId> {
        self.components.id::<T>()
    }

    /// Registers the single instance of a resource type.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ResourceAlreadyRegistered`] if `T` already has an
    /// instance; the existing one is kept.
    pub fn register_resource<T: Resource>(&mut self, value: T) -> EcsResult<()> {
        report("register resource", self.resources.add(value))?;
        tracing::trace!("Registered resource '{}'", std::any::type_name::<T>());
        Ok(())
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Whether a resource of type `T` is registered.
    #[must_use]
    pub fn has_resource<T: Resource>(&self) -> bool {
        self.resources.contains::<T>()
    }

    /// Locks a resource for reading, waiting for any writer.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredResource`] if `T` was never registered.
    pub fn read<T: Resource>(&self) -> EcsResult<ReadResource<'_, T>> {
        report("read resource", self.resources.read::<T>())
    }

    /// Locks a resource for writing, waiting for every other guard.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredResource`] if `T` was never registered.
    pub fn write<T: Resource>(&self) -> EcsResult<WriteResource<'_, T>> {
        report("write resource", self.resources.write::<T>())
    }

    /// Locks a resource for reading without waiting. `Ok(None)` when contended.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredResource`] if `T` was never registered.
    pub fn try_read<T: Resource>(&self) -> EcsResult<Option<ReadResource<'_, T>>> {
        report("read resource", self.resources.try_read::<T>())
    }

    /// Locks a resource for writing without waiting. `Ok(None)` when contended.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredResource`] if `T` was never registered.
    pub fn try_write<T: Resource>(&self) -> EcsResult<Option<WriteResource<'_, T>>> {
        report("write resource", self.resources.try_write::<T>())
    }

    /// Accesses a resource through exclusive ownership of the world, without locking.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredResource`] if `T` was never registered.
    pub fn resource_mut<T: Resource>(&mut self) -> EcsResult<&mut T> {
        report("access resource", self.resources.get_mut::<T>())
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity holding the components of `bundle`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if a bundled type isn't
    /// registered and auto-registration is off. No entity is created then.
    pub fn create<B: Bundle>(&mut self, bundle: B) -> EcsResult<Entity> {
        let mask = self.bundle_mask::<B>()?;
        let entity = self.entities.create(mask);
        report("create entity", bundle.insert(&mut self.components, entity.index()))?;
        tracing::debug!(
            "Created entity {} with components [{}]",
            entity,
            B::names().join(", ")
        );
        Ok(entity)
    }

    /// Destroys an entity and drops all its components.
    ///
    /// # Returns
    ///
    /// `true` if the entity was destroyed, `false` if it was already dead.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        let Ok(mask) = self.entities.mask(entity) else {
            tracing::debug!("Entity {} is already destroyed", entity);
            return false;
        };
        for id in mask.components() {
            self.components.remove_id(id, entity.index());
        }
        self.entities.destroy(entity);
        tracing::debug!("Destroyed entity {}", entity);
        true
    }

    /// Checks whether a handle refers to a live entity.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_valid(entity)
    }

    /// Adds the components of `bundle` to an entity, overwriting the ones it
    /// already has.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DeadEntity`] if the entity isn't alive
    /// - [`EcsError::UnregisteredComponent`] if a bundled type isn't registered
    ///   and auto-registration is off
    pub fn add<B: Bundle>(&mut self, entity: Entity, bundle: B) -> EcsResult<()> {
        let mask = report("add components", self.entities.mask(entity))?;
        let added = self.bundle_mask::<B>()?;
        report("add components", bundle.insert(&mut self.components, entity.index()))?;
        self.entities.set_mask(entity, mask.union(added))?;
        tracing::debug!(
            "Added components [{}] to entity {}",
            B::names().join(", "),
            entity
        );
        Ok(())
    }

    /// Removes the component types of `B` from an entity. Types the entity
    /// doesn't have are skipped.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DeadEntity`] if the entity isn't alive
    /// - [`EcsError::UnregisteredComponent`] if a type of `B` isn't registered
    pub fn remove<B: Bundle>(&mut self, entity: Entity) -> EcsResult<()> {
        let mask = report("remove components", self.entities.mask(entity))?;
        let removed = report("remove components", B::mask(&self.components))?;
        report("remove components", B::remove(&mut self.components, entity.index()))?;
        self.entities.set_mask(entity, mask.difference(removed))?;
        tracing::debug!(
            "Removed components [{}] from entity {}",
            B::names().join(", "),
            entity
        );
        Ok(())
    }

    /// Whether an entity has a `T`.
    ///
    /// False when the component is absent. Also false, and logged, when the
    /// entity is dead or `T` is unregistered.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        let Ok(mask) = self.entities.mask(entity) else {
            tracing::error!("Entity {} doesn't exist!", entity);
            return false;
        };
        match self.components.id::<T>() {
            Ok(id) => mask.test(id),
            Err(error) => {
                tracing::error!("Failed to look up component of entity {}: {}", entity, error);
                false
            }
        }
    }

    /// Borrows the `T` of an entity. `Ok(None)` if the entity is dead, has no
    /// `T`, or `T` is unregistered.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StorageBorrowed`] if the storage of `T` is
    /// exclusively borrowed, e.g. by a query writing `T`.
    pub fn get<T: Component>(&self, entity: Entity) -> EcsResult<Option<ComponentRef<'_, T>>> {
        if !self.has::<T>(entity) {
            return Ok(None);
        }
        self.components.get::<T>(entity.index())
    }

    /// Accesses the `T` of an entity mutably through exclusive ownership of the
    /// world, without locking. `None` if the entity is dead or has no `T`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.has::<T>(entity) {
            return None;
        }
        self.components.get_mut::<T>(entity.index()).ok().flatten()
    }

    /// Borrows the whole storage of `T` for reading.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredComponent`] if `T` was never registered
    /// - [`EcsError::StorageBorrowed`] if the storage is exclusively borrowed
    pub fn read_storage<T: Component>(&self) -> EcsResult<ReadStorage<'_, T>> {
        report("read storage", self.components.read::<T>())
    }

    /// Borrows the whole storage of `T` for writing.
    ///
    /// The guard changes values in place only. Components are added and
    /// removed with [`World::add`] and [`World::remove`].
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredComponent`] if `T` was never registered
    /// - [`EcsError::StorageBorrowed`] if the storage is borrowed elsewhere
    pub fn write_storage<T: Component>(&self) -> EcsResult<WriteStorage<'_, T>> {
        report("write storage", self.components.write::<T>())
    }

    /// Number of live entities.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entities.alive_count()
    }

    /// Whether no entity is alive.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entities.alive_count() == 0
    }

    /// Iterates over live entities in index order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().map(|(entity, _)| entity)
    }

    // =========================================================================
    // Packing
    // =========================================================================

    /// Packs every component of an entity into a [`Package`], keyed by
    /// component name.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DeadEntity`] if the entity isn't alive
    /// - [`EcsError::StorageBorrowed`] if one of its storages is exclusively borrowed
    /// - [`EcsError::Package`] if a component fails to serialize
    pub fn pack(&self, entity: Entity) -> EcsResult<Package> {
        let mask = report("pack entity", self.entities.mask(entity))?;
        let mut package = Package::new();
        for id in mask.components() {
            let Some(name) = self.components.name(id) else {
                continue;
            };
            if let Some(value) = report("pack entity", self.components.pack_id(id, entity.index()))? {
                package.insert(name, value);
            }
        }
        Ok(package)
    }

    /// Replaces every component of an entity with the contents of a [`Package`].
    ///
    /// Every name in the package is resolved before the entity is touched.
    /// Then all current components are dropped and each packaged one is built.
    /// A component that fails to deserialize is left out; the others still
    /// land and the first failure is returned.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DeadEntity`] if the entity isn't alive
    /// - [`EcsError::UnknownComponent`] if a package name matches no registered
    ///   component; the entity is left untouched
    /// - [`EcsError::Package`] if a component fails to deserialize
    pub fn unpack(&mut self, entity: Entity, package: &Package) -> EcsResult<()> {
        let mask = report("unpack entity", self.entities.mask(entity))?;

        let mut resolved = Vec::with_capacity(package.len());
        for (name, value) in package.iter() {
            let Some(id) = self.components.id_by_name(name) else {
                return report("unpack entity", Err(EcsError::UnknownComponent(name.to_owned())));
            };
            resolved.push((id, value));
        }

        for id in mask.components() {
            self.components.remove_id(id, entity.index());
        }

        let mut unpacked = Mask::EMPTY;
        let mut failure = None;
        for (id, value) in resolved {
            match self.components.unpack_id(id, entity.index(), value.clone()) {
                Ok(()) => unpacked.set(id),
                Err(error) => {
                    tracing::error!("Failed to unpack entity {}: {}", entity, error);
                    if failure.is_none() {
                        failure = Some(error);
                    }
                }
            }
        }
        self.entities.set_mask(entity, unpacked)?;
        tracing::debug!(
            "Unpacked {} components into entity {}",
            unpacked.component_count(),
            entity
        );

        failure.map_or(Ok(()), Err)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Builds a query over the world.
    ///
    /// The storages the query reads or writes stay locked until it is dropped.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredComponent`] if a queried type isn't registered
    /// - [`EcsError::ConflictingAccess`] if a type is fetched twice
    /// - [`EcsError::StorageBorrowed`] if a storage is held in an incompatible
    ///   mode elsewhere
    pub fn query<Q: QueryData>(&self) -> EcsResult<Query<'_, Q>> {
        self.query_filtered::<Q, ()>()
    }

    /// Builds a query over the world, narrowed by the filters of `F`.
    ///
    /// # Errors
    ///
    /// Same as [`World::query`], plus unregistered filter types.
    pub fn query_filtered<Q: QueryData, F: QueryFilter>(&self) -> EcsResult<Query<'_, Q, F>> {
        report("build query", Query::new(&self.entities, &self.components))
    }

    /// Mask of the component types of `B`, registering them first when
    /// auto-registration is on.
    fn bundle_mask<B: Bundle>(&mut self) -> EcsResult<Mask> {
        if self.config.auto_register_components {
            let before = self.components.len();
            report("register components", B::register(&mut self.components))?;
            if self.components.len() > before {
                tracing::trace!(
                    "Registered components on first use: [{}]",
                    B::names().join(", ")
                );
            }
        }
        report("resolve components", B::mask(&self.components))
    }
}

impl<'a> IntoIterator for &'a World {
    type Item = Entity;
    type IntoIter = <&'a EntityManager as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        (&self.entities).into_iter()
    }
}

/// Logs a usage error before handing it back.
fn report<T>(action: &str, result: EcsResult<T>) -> EcsResult<T> {
    if let Err(error) = &result {
        tracing::error!("Failed to {}: {}", action, error);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::storage::{MapStorage, Storage, VecStorage};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: f32,
        y: f32,
        z: f32,
    }

    impl Component for Position {
        const NAME: &'static str = "Position";
        type Storage = VecStorage<Self>;
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
    struct Velocity {
        x: f32,
        y: f32,
        z: f32,
    }

    impl Component for Velocity {
        const NAME: &'static str = "Velocity";
        type Storage = VecStorage<Self>;
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Name(String);

    impl Component for Name {
        const NAME: &'static str = "Name";
        type Storage = MapStorage<Self>;
    }

    #[derive(Debug, Default, PartialEq)]
    struct DeltaTime(f32);

    fn world() -> World {
        let mut world = World::new();
        world.register_component::<Position>().unwrap();
        world.register_component::<Velocity>().unwrap();
        world.register_component::<Name>().unwrap();
        world
    }

    #[test]
    fn test_create_and_get() {
        let mut world = world();
        let entity = world
            .create((Position::default(), Name("crate".into())))
            .unwrap();

        assert!(world.is_alive(entity));
        assert!(world.has::<Position>(entity));
        assert!(world.has::<Name>(entity));
        assert!(!world.has::<Velocity>(entity));
        assert_eq!(world.get::<Name>(entity).unwrap().unwrap().0, "crate");
        assert!(world.get::<Velocity>(entity).unwrap().is_none());
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_create_unregistered_is_rejected() {
        let mut world = World::new();
        assert_eq!(
            world.create(Position::default()),
            Err(EcsError::UnregisteredComponent("Position"))
        );
        assert!(world.is_empty());
    }

    #[test]
    fn test_auto_register() {
        let config = WorldConfig {
            auto_register_components: true,
            ..WorldConfig::default()
        };
        let mut world = World::with_config(config).unwrap();
        let entity = world.create(Velocity::default()).unwrap();
        assert!(world.has::<Velocity>(entity));
        assert_eq!(world.component_id::<Velocity>().unwrap(), 1);
    }

    #[test]
    fn test_invalid_config() {
        let config = WorldConfig {
            initial_capacity: usize::MAX,
            ..WorldConfig::default()
        };
        assert!(matches!(
            World::with_config(config),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(matches!(
            World::with_capacity(usize::MAX),
            Err(EcsError::InvalidConfig(_))
        ));

        let mut world = World::with_capacity(16).unwrap();
        world.register_component::<Position>().unwrap();
        assert!(world.create(Position::default()).is_ok());
    }

    #[test]
    fn test_add_overwrites_and_remove() {
        let mut world = world();
        let entity = world.create(Position::default()).unwrap();

        world
            .add(entity, (Position { x: 2.0, ..Position::default() }, Velocity::default()))
            .unwrap();
        assert_eq!(world.get::<Position>(entity).unwrap().unwrap().x, 2.0);
        assert!(world.has::<Velocity>(entity));

        world.remove::<(Velocity, Name)>(entity).unwrap();
        assert!(!world.has::<Velocity>(entity));
        assert!(world.has::<Position>(entity));
        assert!(world.read_storage::<Velocity>().unwrap().is_empty());
    }

    #[test]
    fn test_structural_ops_on_dead_entity() {
        let mut world = world();
        let entity = world.create(Position::default()).unwrap();
        assert!(world.destroy(entity));

        assert!(matches!(
            world.add(entity, Velocity::default()),
            Err(EcsError::DeadEntity { .. })
        ));
        assert!(matches!(
            world.remove::<Position>(entity),
            Err(EcsError::DeadEntity { .. })
        ));
        assert!(!world.has::<Position>(entity));
        assert!(world.get_mut::<Position>(entity).is_none());
        assert!(world.read_storage::<Velocity>().unwrap().is_empty());
    }

    #[test]
    fn test_destroy_drops_components() {
        let mut world = world();
        let entity = world.create((Position::default(), Name("gone".into()))).unwrap();
        assert!(world.destroy(entity));
        assert!(!world.destroy(entity));

        assert!(world.read_storage::<Position>().unwrap().is_empty());
        assert!(world.read_storage::<Name>().unwrap().is_empty());

        let reused = world.create(()).unwrap();
        assert_eq!(reused.index(), entity.index());
        assert!(!world.has::<Position>(reused));
        assert!(world.is_alive(reused));
    }

    #[test]
    fn test_write_storage_changes_values_only() {
        let mut world = world();
        let first = world.create(Position::default()).unwrap();
        let second = world
            .create((Position { x: 1.0, ..Position::default() }, Velocity::default()))
            .unwrap();

        {
            let mut positions = world.write_storage::<Position>().unwrap();
            for (_, position) in positions.iter_mut() {
                position.x += 10.0;
            }
            positions.get_mut(second.index()).unwrap().y = 3.0;
            assert_eq!(positions.len(), 2);
            assert!(positions.get_mut(99).is_none());
        }
        assert_eq!(world.get::<Position>(first).unwrap().unwrap().x, 10.0);
        assert_eq!(world.get::<Position>(second).unwrap().unwrap().y, 3.0);

        assert!(world.destroy(first));
        let recycled = world.create(Velocity::default()).unwrap();
        assert_eq!(recycled.index(), first.index());

        let mut query = world.query::<(&Velocity, Option<&Position>)>().unwrap();
        let seen: Vec<(Entity, bool)> = query
            .iter()
            .map(|(entity, (_, position))| (entity, position.is_some()))
            .collect();
        assert_eq!(seen, vec![(recycled, false), (second, true)]);
        drop(query);

        let positions = world.read_storage::<Position>().unwrap();
        for entity in &world {
            assert_eq!(world.has::<Position>(entity), positions.contains(entity.index()));
        }
    }

    #[test]
    fn test_unregistered_lookup_is_logged() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tracing::span;

        struct ErrorCounter(Arc<AtomicUsize>);

        impl tracing::Subscriber for ErrorCounter {
            fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
                true
            }
            fn new_span(&self, _: &span::Attributes<'_>) -> span::Id {
                span::Id::from_u64(1)
            }
            fn record(&self, _: &span::Id, _: &span::Record<'_>) {}
            fn record_follows_from(&self, _: &span::Id, _: &span::Id) {}
            fn event(&self, event: &tracing::Event<'_>) {
                if *event.metadata().level() == tracing::Level::ERROR {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
            }
            fn enter(&self, _: &span::Id) {}
            fn exit(&self, _: &span::Id) {}
        }

        let mut world = World::new();
        world.register_component::<Position>().unwrap();
        let entity = world.create(Position::default()).unwrap();

        let errors = Arc::new(AtomicUsize::new(0));
        tracing::subscriber::with_default(ErrorCounter(Arc::clone(&errors)), || {
            assert!(world.has::<Position>(entity));
            assert_eq!(errors.load(Ordering::SeqCst), 0);

            assert!(!world.has::<Velocity>(entity));
            assert_eq!(errors.load(Ordering::SeqCst), 1);
            assert!(world.get::<Velocity>(entity).unwrap().is_none());
            assert_eq!(errors.load(Ordering::SeqCst), 2);
        });
    }

    #[test]
    fn test_get_mut() {
        let mut world = world();
        let entity = world.create(Position::default()).unwrap();
        world.get_mut::<Position>(entity).unwrap().y = 5.0;
        assert_eq!(world.get::<Position>(entity).unwrap().unwrap().y, 5.0);
        assert!(world.get_mut::<Velocity>(entity).is_none());
    }

    #[test]
    fn test_resources() {
        let mut world = world();
        world.register_resource(DeltaTime(0.5)).unwrap();
        assert!(matches!(
            world.register_resource(DeltaTime(1.0)),
            Err(EcsError::ResourceAlreadyRegistered(_))
        ));
        assert!(world.has_resource::<DeltaTime>());

        world.write::<DeltaTime>().unwrap().0 *= 2.0;
        assert_eq!(*world.read::<DeltaTime>().unwrap(), DeltaTime(1.0));

        world.resource_mut::<DeltaTime>().unwrap().0 = 3.0;
        assert_eq!(world.try_read::<DeltaTime>().unwrap().unwrap().0, 3.0);
        assert!(world.read::<u64>().is_err());
    }

    #[test]
    fn test_pack_enumerates_mask() {
        let mut world = world();
        let entity = world
            .create((Position { x: 1.0, y: 2.0, z: 3.0 }, Name("packed".into())))
            .unwrap();

        let package = world.pack(entity).unwrap();
        assert_eq!(package.len(), 2);
        assert_eq!(
            package.get("Position"),
            Some(&json!({ "x": 1.0, "y": 2.0, "z": 3.0 }))
        );
        assert_eq!(package.get("Name"), Some(&json!("packed")));
    }

    #[test]
    fn test_unpack_replaces_components() {
        let mut world = world();
        let source = world
            .create((Position { x: 4.0, ..Position::default() }, Velocity::default()))
            .unwrap();
        let mut package = world.pack(source).unwrap();
        package.remove("Velocity");

        let target = world.create((Velocity::default(), Name("old".into()))).unwrap();
        world.unpack(target, &package).unwrap();

        assert!(world.has::<Position>(target));
        assert!(!world.has::<Velocity>(target));
        assert!(!world.has::<Name>(target));
        assert_eq!(world.get::<Position>(target).unwrap().unwrap().x, 4.0);
    }

    #[test]
    fn test_unpack_unknown_name_leaves_entity_untouched() {
        let mut world = world();
        let entity = world.create(Velocity::default()).unwrap();

        let mut package = Package::new();
        package.insert("Position", json!({ "x": 0.0, "y": 0.0, "z": 0.0 }));
        package.insert("Mystery", json!(1));

        assert_eq!(
            world.unpack(entity, &package),
            Err(EcsError::UnknownComponent("Mystery".into()))
        );
        assert!(world.has::<Velocity>(entity));
        assert!(!world.has::<Position>(entity));
    }

    #[test]
    fn test_unpack_bad_value_keeps_mask_consistent() {
        let mut world = world();
        let entity = world.create(Velocity::default()).unwrap();

        let mut package = Package::new();
        package.insert("Name", json!("fine"));
        package.insert("Position", json!("not a position"));

        assert!(matches!(
            world.unpack(entity, &package),
            Err(EcsError::Package(_))
        ));
        assert!(world.has::<Name>(entity));
        assert!(!world.has::<Position>(entity));
        assert!(!world.has::<Velocity>(entity));
        assert!(world.read_storage::<Position>().unwrap().is_empty());
    }

    #[test]
    fn test_query_moves_positions() {
        let mut world = world();
        let moving = world
            .create((
                Position::default(),
                Velocity { x: 1.0, ..Velocity::default() },
            ))
            .unwrap();
        let still = world.create(Position::default()).unwrap();

        {
            let mut query = world.query::<(&mut Position, &Velocity)>().unwrap();
            for (_, (position, velocity)) in &mut query {
                position.x += velocity.x;
                position.y += velocity.y;
                position.z += velocity.z;
            }
        }

        assert_eq!(
            *world.get::<Position>(moving).unwrap().unwrap(),
            Position { x: 1.0, y: 0.0, z: 0.0 }
        );
        assert_eq!(*world.get::<Position>(still).unwrap().unwrap(), Position::default());
    }

    #[test]
    fn test_get_while_query_writes() {
        let mut world = world();
        let entity = world.create(Position::default()).unwrap();

        let query = world.query::<&mut Position>().unwrap();
        assert_eq!(
            world.get::<Position>(entity).err(),
            Some(EcsError::StorageBorrowed("Position"))
        );
        drop(query);
        assert!(world.get::<Position>(entity).unwrap().is_some());
    }

    #[test]
    fn test_iteration_skips_destroyed() {
        let mut world = world();
        let a = world.create(()).unwrap();
        let b = world.create(()).unwrap();
        let c = world.create(()).unwrap();
        world.destroy(b);

        assert_eq!(world.iter().collect::<Vec<_>>(), vec![a, c]);
        assert_eq!((&world).into_iter().count(), 2);
    }
}
