//! Typed query signatures.
//!
//! A *signature* is a type-level set of components and tags used as a query
//! filter. In this crate a signature is a tuple whose elements implement
//! [`Select`]:
//!
//! - `&C` — requires component `C`, yields a shared reference,
//! - `&mut C` — requires component `C`, yields a mutable reference,
//! - [`With<T>`] — requires tag `T`, yields nothing (filter only).
//!
//! A single bare element (e.g. `&mut Position`) is not a signature; use a
//! one-element tuple: `(&mut Position,)`. The unit type `()` is the empty
//! signature and matches every living entity.
//!
//! Mask derivation silently ignores types that are not registered with the
//! manager, mirroring the bitset generation rule: a signature may be a
//! superset of the registered kind set without error. Unregistered
//! *component* elements additionally make the whole signature unresolvable,
//! so such queries match nothing rather than faulting.
//!
//! A component type must appear at most once per signature; repeating one
//! would alias its cell.

use std::marker::PhantomData;

use crate::engine::bitset::SignatureBits;
use crate::engine::registry::{Component, KindRegistry, Tag};
use crate::engine::storage::{AnyColumn, Column};
use crate::engine::types::EntityID;

/// Tag filter element of a signature tuple.
///
/// `With<T>` requires tag `T` on matched entities and contributes a
/// zero-sized placeholder to the callback argument tuple.
pub struct With<T: Tag>(PhantomData<T>);

impl<T: Tag> Clone for With<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Tag> Copy for With<T> {}

/// Resolved raw handle to a component column, valid for one dispatch.
pub struct ColumnPtr<C: Component>(*const Column<C>);

impl<C: Component> Clone for ColumnPtr<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Component> Copy for ColumnPtr<C> {}

// SAFETY: the pointer targets a column owned by the manager, which outlives
// every dispatch that shares the handle; cell access goes through the
// UnsafeCell contract documented on `Column`.
unsafe impl<C: Component> Send for ColumnPtr<C> {}
unsafe impl<C: Component> Sync for ColumnPtr<C> {}

/// One element of a signature tuple.
pub trait Select: Sized + 'static {
    /// Per-dispatch resolved state (a column handle, or nothing for tags).
    type Ptr: Copy + Send + Sync;

    /// What the callback receives for this element.
    type Ref<'a>;

    /// Sets this element's requirement bit in `bits`, if the type is
    /// registered; unknown types are silently ignored.
    fn add_to_mask(registry: &KindRegistry, bits: &mut SignatureBits);

    /// Resolves this element against the manager's columns. Returns `None`
    /// when the element is an unregistered component, making the owning
    /// signature match nothing.
    fn resolve(registry: &KindRegistry, columns: &[Box<dyn AnyColumn>]) -> Option<Self::Ptr>;

    /// Produces the callback argument for `entity`.
    ///
    /// # Safety
    /// `entity` must be within column bounds, and the caller must hold
    /// exclusive access to this entity's cells for mutable elements.
    unsafe fn select<'a>(ptr: Self::Ptr, entity: EntityID) -> Self::Ref<'a>;
}

fn resolve_column<C: Component>(
    registry: &KindRegistry,
    columns: &[Box<dyn AnyColumn>],
) -> Option<ColumnPtr<C>> {
    let slot = registry.column_slot_of::<C>()?;
    let column = columns.get(slot)?.as_any().downcast_ref::<Column<C>>()?;
    Some(ColumnPtr(column as *const Column<C>))
}

impl<C: Component> Select for &'static C {
    type Ptr = ColumnPtr<C>;
    type Ref<'a> = &'a C;

    fn add_to_mask(registry: &KindRegistry, bits: &mut SignatureBits) {
        if let Some(index) = registry.kind_index_of::<C>() {
            bits.set(index);
        }
    }

    fn resolve(registry: &KindRegistry, columns: &[Box<dyn AnyColumn>]) -> Option<Self::Ptr> {
        resolve_column::<C>(registry, columns)
    }

    unsafe fn select<'a>(ptr: Self::Ptr, entity: EntityID) -> Self::Ref<'a> {
        // SAFETY: bounds and aliasing forwarded from the caller.
        unsafe { (*ptr.0).cell_ref(entity) }
    }
}

impl<C: Component> Select for &'static mut C {
    type Ptr = ColumnPtr<C>;
    type Ref<'a> = &'a mut C;

    fn add_to_mask(registry: &KindRegistry, bits: &mut SignatureBits) {
        if let Some(index) = registry.kind_index_of::<C>() {
            bits.set(index);
        }
    }

    fn resolve(registry: &KindRegistry, columns: &[Box<dyn AnyColumn>]) -> Option<Self::Ptr> {
        resolve_column::<C>(registry, columns)
    }

    unsafe fn select<'a>(ptr: Self::Ptr, entity: EntityID) -> Self::Ref<'a> {
        // SAFETY: bounds and exclusivity forwarded from the caller.
        unsafe { (*ptr.0).cell_mut(entity) }
    }
}

impl<T: Tag> Select for With<T> {
    type Ptr = ();
    type Ref<'a> = With<T>;

    fn add_to_mask(registry: &KindRegistry, bits: &mut SignatureBits) {
        if let Some(index) = registry.kind_index_of::<T>() {
            bits.set(index);
        }
    }

    fn resolve(_registry: &KindRegistry, _columns: &[Box<dyn AnyColumn>]) -> Option<Self::Ptr> {
        Some(())
    }

    unsafe fn select<'a>(_ptr: Self::Ptr, _entity: EntityID) -> Self::Ref<'a> {
        With(PhantomData)
    }
}

/// A type-level set of components and tags usable as a query filter.
///
/// Implemented for tuples of [`Select`] elements up to arity 8, and for the
/// unit type as the empty signature.
pub trait Signature: 'static {
    /// Resolved column handles for the whole signature.
    type Ptrs: Copy + Send + Sync;

    /// Callback argument tuple.
    type Refs<'a>;

    /// Derives the bitset mask of this signature: exactly the bits of the
    /// member types present in the registered kind set.
    fn mask(registry: &KindRegistry) -> SignatureBits;

    /// Resolves all component columns, or `None` when any member component
    /// is unregistered.
    fn resolve(registry: &KindRegistry, columns: &[Box<dyn AnyColumn>]) -> Option<Self::Ptrs>;

    /// Produces the callback arguments for `entity`.
    ///
    /// # Safety
    /// Same contract as [`Select::select`], for every element.
    unsafe fn select<'a>(ptrs: Self::Ptrs, entity: EntityID) -> Self::Refs<'a>;
}

macro_rules! impl_signature {
    ($($element:ident),*) => {
        impl<$($element: Select),*> Signature for ($($element,)*) {
            type Ptrs = ($($element::Ptr,)*);
            type Refs<'a> = ($($element::Ref<'a>,)*);

            fn mask(registry: &KindRegistry) -> SignatureBits {
                #[allow(unused_mut)]
                let mut bits = SignatureBits::new();
                $($element::add_to_mask(registry, &mut bits);)*
                let _ = registry;
                bits
            }

            fn resolve(
                registry: &KindRegistry,
                columns: &[Box<dyn AnyColumn>],
            ) -> Option<Self::Ptrs> {
                let _ = (registry, columns);
                Some(($($element::resolve(registry, columns)?,)*))
            }

            unsafe fn select<'a>(ptrs: Self::Ptrs, entity: EntityID) -> Self::Refs<'a> {
                #[allow(non_snake_case)]
                let ($($element,)*) = ptrs;
                let _ = entity;
                // SAFETY: contract forwarded element-wise from the caller.
                ($(unsafe { $element::select($element, entity) },)*)
            }
        }
    };
}

impl_signature!();
impl_signature!(A);
impl_signature!(A, B);
impl_signature!(A, B, C);
impl_signature!(A, B, C, D);
impl_signature!(A, B, C, D, E);
impl_signature!(A, B, C, D, E, F);
impl_signature!(A, B, C, D, E, F, G);
impl_signature!(A, B, C, D, E, F, G, H);
