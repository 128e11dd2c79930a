//! # Component System
//!
//! Components are plain data values attached to entities, grouped by type into
//! a dedicated storage.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::storage::Storage;

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Send + Sync + 'static`: storages are shared across system threads
/// - `Serialize + DeserializeOwned`: entities can be packed into a
///   [`Package`](super::Package) and back
///
/// The numeric id used in entity masks is not part of the type; it is handed
/// out by the world at registration time.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
/// struct Position {
///     x: f32,
///     y: f32,
///     z: f32,
/// }
///
/// impl Component for Position {
///     const NAME: &'static str = "Position";
///     type Storage = VecStorage<Self>;
/// }
/// ```
pub trait Component: Serialize + DeserializeOwned + Send + Sync + Sized + 'static {
    /// Stable name of the component type.
    ///
    /// Used in diagnostics and as the key of this component in packages, so it
    /// must be unique among registered components.
    const NAME: &'static str;

    /// Container used to store this component.
    type Storage: Storage<Self>;
}
