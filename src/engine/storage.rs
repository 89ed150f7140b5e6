//! Columnar component storage.
//!
//! One [`Column`] exists per registered component type, holding one cell per
//! entity slot regardless of semantic ownership; only the entity's signature
//! bitset records whether the value is owned. Cells are never dropped on
//! component removal — the slot is simply overwritten when the component is
//! re-added or the entity id is recycled.
//!
//! Cells live behind `UnsafeCell` so that parallel query dispatch can hand
//! out mutable references to *distinct* entities' cells from a shared
//! column. The dispatchers uphold the disjointness contract: shards
//! partition the entity id range, and the signature check plus callback for
//! one entity run on exactly one worker.

use std::any::Any;
use std::cell::UnsafeCell;

use crate::engine::registry::Component;

/// Type-erased view of a component column, used by the manager to resize and
/// reset all columns uniformly.
pub trait AnyColumn: Send + Sync {
    /// The column as `Any`, for downcasting to its concrete [`Column`].
    fn as_any(&self) -> &dyn Any;

    /// The column as mutable `Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Number of cells in the column.
    fn len(&self) -> usize;

    /// Returns `true` if the column has no cells.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extends the column with default-constructed cells up to `capacity`.
    fn grow_to(&mut self, capacity: usize);

    /// Drops all cells and refills with `capacity` default-constructed ones.
    fn reset(&mut self, capacity: usize);
}

/// Dense storage for one component type, indexed directly by entity id.
pub struct Column<C: Component> {
    cells: Vec<UnsafeCell<C>>,
}

// SAFETY: interior access to cells from shared references only happens inside
// the manager's dispatchers, which guarantee that no two threads touch the
// same entity's cell and that no resize overlaps a dispatch.
unsafe impl<C: Component> Sync for Column<C> {}

impl<C: Component> Column<C> {
    /// Creates a column of `capacity` default-constructed cells.
    pub fn with_capacity_filled(capacity: usize) -> Self {
        let mut cells = Vec::with_capacity(capacity);
        cells.resize_with(capacity, || UnsafeCell::new(C::default()));
        Self { cells }
    }

    /// Shared reference to the cell at `index`, or `None` when out of range.
    ///
    /// Callers must not hold this across a parallel dispatch that writes the
    /// same cell.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&C> {
        // SAFETY: &self access outside a dispatch; see the Sync rationale.
        self.cells.get(index).map(|cell| unsafe { &*cell.get() })
    }

    /// Mutable reference to the cell at `index`, or `None` when out of range.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut C> {
        self.cells.get_mut(index).map(|cell| cell.get_mut())
    }

    /// Overwrites the cell at `index`. Out-of-range writes are ignored.
    #[inline]
    pub fn write(&mut self, index: usize, value: C) {
        if let Some(cell) = self.cells.get_mut(index) {
            *cell.get_mut() = value;
        }
    }

    /// Shared reference to the cell at `index` through a shared column.
    ///
    /// # Safety
    /// `index` must be within bounds, and no mutable reference to the same
    /// cell may exist for the duration of the borrow.
    #[inline]
    pub unsafe fn cell_ref(&self, index: usize) -> &C {
        debug_assert!(index < self.cells.len());
        // SAFETY: bounds and aliasing guaranteed by the caller.
        unsafe { &*self.cells[index].get() }
    }

    /// Mutable reference to the cell at `index` through a shared column.
    ///
    /// # Safety
    /// `index` must be within bounds, and the caller must have exclusive
    /// access to this entity's cells (the dispatch disjointness contract).
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn cell_mut(&self, index: usize) -> &mut C {
        debug_assert!(index < self.cells.len());
        // SAFETY: bounds and exclusivity guaranteed by the caller.
        unsafe { &mut *self.cells[index].get() }
    }
}

impl<C: Component> AnyColumn for Column<C> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn len(&self) -> usize {
        self.cells.len()
    }

    fn grow_to(&mut self, capacity: usize) {
        if capacity > self.cells.len() {
            self.cells
                .resize_with(capacity, || UnsafeCell::new(C::default()));
        }
    }

    fn reset(&mut self, capacity: usize) {
        self.cells.clear();
        self.cells
            .resize_with(capacity, || UnsafeCell::new(C::default()));
    }
}
