//! # Entity Component System
//!
//! A mask-indexed ECS runtime: entities are generational handles, components
//! live in one storage per type, resources are singletons behind their own
//! reader/writer lock.
//!
//! ## Design Philosophy
//!
//! - Each entity carries a bitmask of the component types it has
//! - Queries filter entities by mask before touching any storage
//! - Storage strategy is chosen per component type
//! - Structural changes need `&mut World`; shared access goes through guards

mod bundle;
mod component;
mod entity;
mod entity_manager;
mod package;
mod query;
mod registry;
mod resource;
mod storage;
mod world;

pub use bundle::Bundle;
pub use component::Component;
pub use entity::{ComponentId, Entity, Mask};
pub use entity_manager::{Entities, EntityManager};
pub use package::Package;
pub use query::{Access, Query, QueryData, QueryFilter, QueryIter, With, Without};
pub use registry::{ComponentRef, ComponentRegistry, ReadStorage, WriteStorage};
pub use resource::{ReadResource, Resource, ResourceManager, WriteResource};
pub use storage::{MapIter, MapIterMut, MapStorage, Storage, VecIter, VecIterMut, VecStorage};
pub use world::World;
