//! # Component Bundles
//!
//! A bundle is a set of components handled as one unit by `create`, `add` and
//! `remove`: a single component, a tuple of bundles, or `()` for none.

use super::component::Component;
use super::entity::Mask;
use super::registry::ComponentRegistry;
use crate::error::EcsResult;

/// A group of components that can be inserted into or removed from an entity
/// together.
///
/// Implemented for every [`Component`], for `()`, and for tuples of up to
/// eight bundles, e.g. `(Position, Velocity)`.
pub trait Bundle: Send + 'static {
    /// Names of the bundled component types, in declaration order.
    fn names() -> Vec<&'static str>;

    /// Registers every bundled component type.
    ///
    /// # Errors
    ///
    /// Propagates registration errors from [`ComponentRegistry::register`].
    fn register(registry: &mut ComponentRegistry) -> EcsResult<()>;

    /// Mask with the bit of every bundled component type set.
    ///
    /// # Errors
    ///
    /// Fails if a bundled type is not registered.
    fn mask(registry: &ComponentRegistry) -> EcsResult<Mask>;

    /// Moves the components into their storages at `index`, overwriting
    /// existing values.
    ///
    /// # Errors
    ///
    /// Fails if a bundled type is not registered.
    fn insert(self, registry: &mut ComponentRegistry, index: u32) -> EcsResult<()>;

    /// Removes every bundled component type stored at `index`.
    ///
    /// # Errors
    ///
    /// Fails if a bundled type is not registered.
    fn remove(registry: &mut ComponentRegistry, index: u32) -> EcsResult<()>;
}

impl<T: Component> Bundle for T {
    fn names() -> Vec<&'static str> {
        vec![T::NAME]
    }

    fn register(registry: &mut ComponentRegistry) -> EcsResult<()> {
        registry.register::<T>().map(|_| ())
    }

    fn mask(registry: &ComponentRegistry) -> EcsResult<Mask> {
        Ok(Mask::EMPTY.with(registry.id::<T>()?))
    }

    fn insert(self, registry: &mut ComponentRegistry, index: u32) -> EcsResult<()> {
        registry.insert(index, self).map(|_| ())
    }

    fn remove(registry: &mut ComponentRegistry, index: u32) -> EcsResult<()> {
        registry.remove::<T>(index).map(|_| ())
    }
}

impl Bundle for () {
    fn names() -> Vec<&'static str> {
        Vec::new()
    }

    fn register(_registry: &mut ComponentRegistry) -> EcsResult<()> {
        Ok(())
    }

    fn mask(_registry: &ComponentRegistry) -> EcsResult<Mask> {
        Ok(Mask::EMPTY)
    }

    fn insert(self, _registry: &mut ComponentRegistry, _index: u32) -> EcsResult<()> {
        Ok(())
    }

    fn remove(_registry: &mut ComponentRegistry, _index: u32) -> EcsResult<()> {
        Ok(())
    }
}

macro_rules! impl_bundle_tuple {
    ($($B:ident),+) => {
        impl<$($B: Bundle),+> Bundle for ($($B,)+) {
            fn names() -> Vec<&'static str> {
                let mut names = Vec::new();
                $(names.extend($B::names());)+
                names
            }

            fn register(registry: &mut ComponentRegistry) -> EcsResult<()> {
                $($B::register(registry)?;)+
                Ok(())
            }

            fn mask(registry: &ComponentRegistry) -> EcsResult<Mask> {
                Ok(Mask::EMPTY $(.union($B::mask(registry)?))+)
            }

            #[allow(non_snake_case)]
            fn insert(self, registry: &mut ComponentRegistry, index: u32) -> EcsResult<()> {
                let ($($B,)+) = self;
                $($B.insert(registry, index)?;)+
                Ok(())
            }

            fn remove(registry: &mut ComponentRegistry, index: u32) -> EcsResult<()> {
                $($B::remove(registry, index)?;)+
                Ok(())
            }
        }
    };
}

impl_bundle_tuple!(B1);
impl_bundle_tuple!(B1, B2);
impl_bundle_tuple!(B1, B2, B3);
impl_bundle_tuple!(B1, B2, B3, B4);
impl_bundle_tuple!(B1, B2, B3, B4, B5);
impl_bundle_tuple!(B1, B2, B3, B4, B5, B6);
impl_bundle_tuple!(B1, B2, B3, B4, B5, B6, B7);
impl_bundle_tuple!(B1, B2, B3, B4, B5, B6, B7, B8);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::storage::VecStorage;
    use crate::error::EcsError;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct A(i32);

    impl Component for A {
        const NAME: &'static str = "A";
        type Storage = VecStorage<Self>;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct B(i32);

    impl Component for B {
        const NAME: &'static str = "B";
        type Storage = VecStorage<Self>;
    }

    #[test]
    fn test_tuple_bundle() {
        let mut registry = ComponentRegistry::new();
        <(A, B)>::register(&mut registry).unwrap();

        assert_eq!(<(A, B)>::names(), vec!["A", "B"]);
        assert_eq!(<(A, B)>::mask(&registry).unwrap(), Mask::EMPTY.with(1).with(2));

        (A(1), B(2)).insert(&mut registry, 4).unwrap();
        assert!(registry.contains::<A>(4));
        assert!(registry.contains::<B>(4));

        <(A, B)>::remove(&mut registry, 4).unwrap();
        assert!(!registry.contains::<A>(4));
        assert!(!registry.contains::<B>(4));
    }

    #[test]
    fn test_unregistered_member_fails_mask() {
        let mut registry = ComponentRegistry::new();
        A::register(&mut registry).unwrap();
        assert_eq!(
            <(A, B)>::mask(&registry),
            Err(EcsError::UnregisteredComponent("B"))
        );
        assert_eq!(<()>::mask(&registry).unwrap(), Mask::EMPTY);
    }
}
