//! # Kind Registry
//!
//! This module assigns stable kind indices to Rust component and tag types
//! and exposes type-erased storage factories for column allocation.
//!
//! ## Purpose
//! The registry decouples type information (`TypeId`, name) from runtime
//! storage, enabling the manager to store heterogeneous component columns
//! behind [`AnyColumn`] and to resolve any registered type to its bit
//! position in a signature.
//!
//! ## Design
//! - Types are registered into a [`Layout`] builder before the manager
//!   exists. Building the manager freezes the layout into a
//!   [`KindRegistry`]; no registration is possible afterwards.
//! - Components receive kind indices `0..n-1` in registration order, tags
//!   `n..n+m-1`. The combined set is therefore components-then-tags, and
//!   index `n+m` is the always-false sentinel slot.
//! - A per-component factory function is stored for constructing column
//!   storage of a given capacity.
//!
//! ## Invariants
//! - Kind indices are unique and stable for the lifetime of the registry.
//! - Every component kind has a column slot equal to its kind index; tags
//!   have none.
//! - `components + tags <= KIND_CAP`.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use crate::engine::error::RegistryError;
use crate::engine::storage::{AnyColumn, Column};
use crate::engine::types::KIND_CAP;

/// A per-entity payload type.
///
/// One instance of each component type exists per entity slot, whether the
/// entity semantically owns the component or not; the slot is filled with
/// `Default::default()` until first written. Components therefore must be
/// default-constructible and movable; no other capability is required.
pub trait Component: Default + Send + Sync + 'static {}

/// A marker type with no payload, represented only as one bit per entity.
pub trait Tag: Send + Sync + 'static {}

/// Factory constructing an empty, default-filled column of a given capacity.
type ColumnFactory = fn(usize) -> Box<dyn AnyColumn>;

fn new_column<C: Component>(capacity: usize) -> Box<dyn AnyColumn> {
    Box::new(Column::<C>::with_capacity_filled(capacity))
}

/// Describes a registered kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KindDesc {
    /// Kind index, equal to the bit position in signature bitsets.
    pub index: usize,

    /// Rust type name, for diagnostics.
    pub name: &'static str,

    /// Runtime `TypeId` of the kind.
    pub type_id: TypeId,

    /// `true` for tags, `false` for components.
    pub is_tag: bool,
}

#[derive(Clone, Copy)]
struct KindRecord {
    index: usize,
    column: Option<usize>,
}

/// Builder collecting the component and tag set of a manager.
///
/// Registration is idempotent per type; re-registering a type under the same
/// role is a no-op. Registering the same type as both a component and a tag
/// is rejected.
#[derive(Default)]
pub struct Layout {
    components: Vec<(TypeId, &'static str, ColumnFactory)>,
    tags: Vec<(TypeId, &'static str)>,
    roles: HashMap<TypeId, bool>,
}

impl Layout {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers component type `C`.
    ///
    /// ## Errors
    /// - `CapacityExceeded` when the combined kind count would pass
    ///   [`KIND_CAP`].
    /// - `ConflictingKind` when `C` was already registered as a tag.
    pub fn register_component<C: Component>(&mut self) -> Result<(), RegistryError> {
        let type_id = TypeId::of::<C>();
        match self.roles.get(&type_id).copied() {
            Some(false) => return Ok(()),
            Some(true) => {
                return Err(RegistryError::ConflictingKind {
                    name: type_name::<C>(),
                })
            }
            None => {}
        }
        if self.components.len() + self.tags.len() >= KIND_CAP {
            return Err(RegistryError::capacity());
        }
        self.roles.insert(type_id, false);
        self.components
            .push((type_id, type_name::<C>(), new_column::<C>));
        Ok(())
    }

    /// Registers tag type `T`.
    ///
    /// ## Errors
    /// Mirrors [`Layout::register_component`].
    pub fn register_tag<T: Tag>(&mut self) -> Result<(), RegistryError> {
        let type_id = TypeId::of::<T>();
        match self.roles.get(&type_id).copied() {
            Some(true) => return Ok(()),
            Some(false) => {
                return Err(RegistryError::ConflictingKind {
                    name: type_name::<T>(),
                })
            }
            None => {}
        }
        if self.components.len() + self.tags.len() >= KIND_CAP {
            return Err(RegistryError::capacity());
        }
        self.roles.insert(type_id, true);
        self.tags.push((type_id, type_name::<T>()));
        Ok(())
    }

    /// Number of component types registered so far.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Number of tag types registered so far.
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Freezes the layout into an immutable registry, assigning final kind
    /// indices: components first, then tags.
    pub(crate) fn build(self) -> KindRegistry {
        let mut records = HashMap::with_capacity(self.components.len() + self.tags.len());
        let mut descs = Vec::with_capacity(self.components.len() + self.tags.len());
        let mut factories = Vec::with_capacity(self.components.len());

        for (slot, (type_id, name, factory)) in self.components.into_iter().enumerate() {
            records.insert(
                type_id,
                KindRecord {
                    index: slot,
                    column: Some(slot),
                },
            );
            descs.push(KindDesc {
                index: slot,
                name,
                type_id,
                is_tag: false,
            });
            factories.push(factory);
        }

        let component_count = factories.len();
        for (offset, (type_id, name)) in self.tags.into_iter().enumerate() {
            let index = component_count + offset;
            records.insert(
                type_id,
                KindRecord {
                    index,
                    column: None,
                },
            );
            descs.push(KindDesc {
                index,
                name,
                type_id,
                is_tag: true,
            });
        }

        KindRegistry {
            records,
            descs,
            factories,
            component_count,
        }
    }
}

/// Frozen mapping between Rust types and kind indices.
///
/// ## Purpose
/// Resolves any registered component or tag type to its bit position, and
/// component types additionally to their column slot. Unregistered types
/// resolve to `None`, which the manager degrades to a silent no-op.
pub struct KindRegistry {
    records: HashMap<TypeId, KindRecord>,
    descs: Vec<KindDesc>,
    factories: Vec<ColumnFactory>,
    component_count: usize,
}

impl KindRegistry {
    /// Returns the kind index of `K`, if registered.
    #[inline]
    pub fn kind_index_of<K: Any>(&self) -> Option<usize> {
        self.kind_index_of_type_id(TypeId::of::<K>())
    }

    /// Returns the kind index for a runtime `TypeId`, if registered.
    #[inline]
    pub fn kind_index_of_type_id(&self, type_id: TypeId) -> Option<usize> {
        self.records.get(&type_id).map(|r| r.index)
    }

    /// Returns the column slot of component `C`, if `C` is a registered
    /// component (tags have no column).
    #[inline]
    pub(crate) fn column_slot_of<C: Component>(&self) -> Option<usize> {
        self.records.get(&TypeId::of::<C>()).and_then(|r| r.column)
    }

    /// Returns the descriptor of the kind at `index`.
    pub fn desc(&self, index: usize) -> Option<&KindDesc> {
        self.descs.get(index)
    }

    /// Total number of registered kinds (components plus tags).
    #[inline]
    pub fn kind_count(&self) -> usize {
        self.descs.len()
    }

    /// Number of registered component types.
    #[inline]
    pub fn component_count(&self) -> usize {
        self.component_count
    }

    /// Number of registered tag types.
    #[inline]
    pub fn tag_count(&self) -> usize {
        self.descs.len() - self.component_count
    }

    /// Bit position of the always-false sentinel slot.
    #[inline]
    pub fn sentinel_index(&self) -> usize {
        self.descs.len()
    }

    /// Allocates one default-filled column per registered component, each of
    /// the given capacity.
    pub(crate) fn make_columns(&self, capacity: usize) -> Vec<Box<dyn AnyColumn>> {
        self.factories
            .iter()
            .map(|factory| factory(capacity))
            .collect()
    }
}
