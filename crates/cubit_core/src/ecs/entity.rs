//! # Entities and Masks
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into the entity manager's slots and every component storage
//! - A generation counter for safe reuse
//!
//! Each live entity also owns a [`Mask`] recording which component types it has.

use std::fmt;

/// Identifier assigned to a registered component type.
///
/// Ids start at 1; bit 0 of every [`Mask`] is the alive flag.
pub type ComponentId = u8;

/// Handle to an entity.
///
/// The handle is split into two parts:
/// - Lower 32 bits: index into the entity slots and component storages
/// - Upper 32 bits: generation counter for detecting stale handles
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    /// Null/invalid entity handle.
    pub const NULL: Self = Self(u64::MAX);

    /// Creates an entity handle from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the handle.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }

    /// Returns the raw 64-bit representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from [`to_bits`](Self::to_bits).
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("Entity(null)")
        } else {
            write!(f, "Entity({}v{})", self.index(), self.generation())
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

/// Fixed-width set of component ids.
///
/// Bit `i` is set iff the component with id `i` is present. Bit 0 is reserved
/// and marks the owning entity slot as alive, so at most
/// [`MAX_COMPONENTS`](Self::MAX_COMPONENTS) component types fit.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Mask(u64);

impl Mask {
    /// Number of bits in a mask.
    pub const BITS: usize = 64;

    /// Highest number of component types a mask can describe.
    pub const MAX_COMPONENTS: usize = Self::BITS - 1;

    /// Mask with no bits set.
    pub const EMPTY: Self = Self(0);

    /// Mask with only the alive bit set.
    pub const ALIVE: Self = Self(1);

    /// Creates a mask from its raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns a copy of this mask with bit `id` set.
    ///
    /// # Panics
    ///
    /// Panics if `id` doesn't fit in the mask.
    #[inline]
    #[must_use]
    pub fn with(mut self, id: ComponentId) -> Self {
        self.set(id);
        self
    }

    /// Sets bit `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` doesn't fit in the mask.
    #[inline]
    pub fn set(&mut self, id: ComponentId) {
        assert!((id as usize) < Self::BITS, "component id {id} out of mask range");
        self.0 |= 1 << id;
    }

    /// Clears bit `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` doesn't fit in the mask.
    #[inline]
    pub fn clear(&mut self, id: ComponentId) {
        assert!((id as usize) < Self::BITS, "component id {id} out of mask range");
        self.0 &= !(1 << id);
    }

    /// Checks bit `id`.
    #[inline]
    #[must_use]
    pub const fn test(self, id: ComponentId) -> bool {
        (id as usize) < Self::BITS && (self.0 & (1 << id)) != 0
    }

    /// Whether the alive bit is set.
    #[inline]
    #[must_use]
    pub const fn is_alive(self) -> bool {
        self.0 & Self::ALIVE.0 != 0
    }

    /// Whether every bit of `other` is also set here.
    #[inline]
    #[must_use]
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether this mask shares at least one bit with `other`.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Union of both masks.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Bits set here but not in `other`.
    #[inline]
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Number of component bits set, ignoring the alive bit.
    #[inline]
    #[must_use]
    pub const fn component_count(self) -> u32 {
        (self.0 & !Self::ALIVE.0).count_ones()
    }

    /// Iterates over the component ids set in this mask, in ascending order.
    pub fn components(self) -> impl Iterator<Item = ComponentId> {
        let mut bits = self.0 & !Self::ALIVE.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let id = bits.trailing_zeros();
            bits &= bits - 1;
            // trailing_zeros of a u64 is at most 63
            Some(id as ComponentId)
        })
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mask({:#066b})", self.0)
    }
}
