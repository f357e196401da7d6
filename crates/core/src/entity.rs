//! Identity for records whose attributes change over time.

use core::fmt;
use core::hash::Hash;

/// A record identified by a stable key rather than by its current values.
///
/// An inventory item keeps its identity while its stock level moves; two
/// snapshots of the same item compare as the same entity.
pub trait Entity {
    type Id: Clone + Eq + Hash + fmt::Debug + fmt::Display;

    fn id(&self) -> &Self::Id;

    fn same_entity(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
