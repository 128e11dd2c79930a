//! # CUBIT Core Engine
//!
//! Entity Component System (ECS) runtime: the typed, mask-indexed store that
//! holds all game-object state, and the contracts schedulers, asset loaders
//! and scene spawners call into.
//!
//! ## Architecture Rules
//!
//! 1. **Masks and storages never diverge** - every structural operation updates both
//! 2. **Locks are scoped** - resources and storages are only reachable through guards
//! 3. **No scheduling** - the core decides nothing about when systems run
//!
//! ## Example
//!
//! ```rust,ignore
//! use cubit_core::{World, Component, VecStorage};
//!
//! let mut world = World::new();
//! world.register_component::<Position>()?;
//! let entity = world.create(Position::default())?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::WorldConfig;
pub use ecs::{
    Bundle, Component, ComponentId, Entity, MapStorage, Mask, Package, Query, QueryData,
    QueryFilter, ReadResource, ReadStorage, Resource, Storage, VecStorage, With, Without,
    World, WriteResource, WriteStorage,
};
pub use error::{EcsError, EcsResult};
