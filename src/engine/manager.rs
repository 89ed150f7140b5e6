//! # Entity Manager
//!
//! The manager owns the entity slot vector, the free set, one storage column
//! per registered component, the stored-function registry, and (when built
//! with two or more workers) the embedded worker pool. It is the single
//! entry point for entity lifecycle, component and tag mutation, and
//! signature-matched iteration.
//!
//! ## Failure semantics
//! The runtime surface never panics on bad input: out-of-range entity ids
//! probe as `false`, mutations on dead or invalid entities are no-ops,
//! unknown component types are silently ignored by mutators and return
//! `None` from getters, and unknown indices in iterable queries route
//! through the sentinel bit and never match.
//!
//! ## Concurrency contract
//! Structural mutations (entity add/delete, component/tag add/remove,
//! stored-function registration, `reset`) are single-threaded: they must not
//! run concurrently with each other or with any running query. Parallel
//! query dispatch runs user callbacks across worker threads; callbacks on
//! distinct entities must access only their own entity's components.
//! Callbacks that mutate manager state or read other entities must either
//! serialise themselves or request `parallel = false`.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::engine::bitset::SignatureBits;
use crate::engine::matching::StoredFunction;
use crate::engine::pool::{PoolTask, WorkerPool};
use crate::engine::registry::{Component, KindRegistry, Layout, Tag};
use crate::engine::signature::Signature;
use crate::engine::storage::{AnyColumn, Column};
use crate::engine::types::{
    EntityID, FnID, DEFAULT_WORKER_COUNT, GROWTH_INCREMENT, INITIAL_CAPACITY, SHARD_FACTOR,
};
use crate::profiling::profiler;

const POLL_INTERVAL: Duration = Duration::from_micros(30);

/// One entity slot: liveness flag plus signature bitset.
#[derive(Clone, Default)]
pub(crate) struct EntitySlot {
    pub(crate) alive: bool,
    pub(crate) bits: SignatureBits,
}

/// The entity/component/tag store and query engine.
///
/// Component and tag sets are fixed at construction via a [`Layout`];
/// entity ids are stable for the manager's lifetime and recycled through a
/// free set after deletion.
pub struct EcmManager {
    pub(crate) registry: KindRegistry,
    pub(crate) entities: Vec<EntitySlot>,
    pub(crate) columns: Vec<Box<dyn AnyColumn>>,
    pub(crate) size: usize,
    pub(crate) free: HashSet<EntityID>,
    pub(crate) functions: BTreeMap<FnID, StoredFunction>,
    pub(crate) next_function_id: FnID,
    pub(crate) pool: Option<WorkerPool>,
    worker_count: usize,
}

impl EcmManager {
    /// Creates a manager with the default worker count.
    pub fn new(layout: Layout) -> Self {
        Self::with_workers(layout, DEFAULT_WORKER_COUNT)
    }

    /// Creates a manager with an explicit worker count. Below 2 workers no
    /// pool is created and every query runs on the calling thread.
    pub fn with_workers(layout: Layout, worker_count: usize) -> Self {
        let registry = layout.build();
        let columns = registry.make_columns(INITIAL_CAPACITY);
        Self {
            registry,
            entities: vec![EntitySlot::default(); INITIAL_CAPACITY],
            columns,
            size: 0,
            free: HashSet::new(),
            functions: BTreeMap::new(),
            next_function_id: 0,
            pool: (worker_count >= 2).then(|| WorkerPool::new(worker_count)),
            worker_count,
        }
    }

    /// The frozen kind registry of this manager.
    #[inline]
    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// The worker count this manager was built with.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// The embedded worker pool, present when built with two or more
    /// workers.
    #[inline]
    pub fn worker_pool(&self) -> Option<&WorkerPool> {
        self.pool.as_ref()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Entity lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Creates an entity and returns its id.
    ///
    /// Recycles an id from the free set when one is available; otherwise
    /// appends a fresh slot, growing capacity by [`GROWTH_INCREMENT`] when
    /// full. The returned id is stable until [`EcmManager::delete_entity`].
    pub fn add_entity(&mut self) -> EntityID {
        if let Some(&id) = self.free.iter().next() {
            self.free.remove(&id);
            let slot = &mut self.entities[id];
            slot.alive = true;
            slot.bits.clear_all();
            return id;
        }

        if self.size == self.entities.len() {
            let capacity = self.entities.len() + GROWTH_INCREMENT;
            self.grow_to(capacity);
        }

        let id = self.size;
        self.size += 1;
        let slot = &mut self.entities[id];
        slot.alive = true;
        slot.bits.clear_all();
        id
    }

    /// Deletes an entity: marks it dead, clears its bitset, and returns its
    /// id to the free set. Unknown ids and double deletes are no-ops.
    pub fn delete_entity(&mut self, entity: EntityID) {
        if !self.has_entity(entity) {
            return;
        }
        let slot = &mut self.entities[entity];
        slot.alive = false;
        slot.bits.clear_all();
        self.free.insert(entity);
    }

    /// Returns `true` iff `entity` addresses a slot that has ever been born
    /// (`entity < size`), alive or not.
    #[inline]
    pub fn has_entity(&self, entity: EntityID) -> bool {
        entity < self.size
    }

    /// Returns `true` iff `entity` is in range and currently alive.
    #[inline]
    pub fn is_alive(&self, entity: EntityID) -> bool {
        self.entities
            .get(entity)
            .map_or(false, |slot| entity < self.size && slot.alive)
    }

    /// Number of living entities.
    #[inline]
    pub fn current_size(&self) -> usize {
        self.size - self.free.len()
    }

    /// Number of allocated entity slots.
    #[inline]
    pub fn current_capacity(&self) -> usize {
        self.entities.len()
    }

    /// Drops all stored functions, empties all entities, and returns
    /// capacity to [`INITIAL_CAPACITY`].
    pub fn reset(&mut self) {
        self.entities.clear();
        self.entities
            .resize_with(INITIAL_CAPACITY, EntitySlot::default);
        self.size = 0;
        self.free.clear();
        for column in &mut self.columns {
            column.reset(INITIAL_CAPACITY);
        }
        self.functions.clear();
        self.next_function_id = 0;
    }

    fn grow_to(&mut self, capacity: usize) {
        self.entities.resize_with(capacity, EntitySlot::default);
        for column in &mut self.columns {
            column.grow_to(capacity);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Component and tag operations
    // ─────────────────────────────────────────────────────────────────────

    /// Moves `value` into the entity's component slot and sets the
    /// signature bit. Overwrites any previous value. No-op when the entity
    /// is dead or `C` is not registered.
    pub fn add_component<C: Component>(&mut self, entity: EntityID, value: C) {
        if !self.is_alive(entity) {
            return;
        }
        let Some(index) = self.registry.kind_index_of::<C>() else {
            return;
        };
        let Some(slot) = self.registry.column_slot_of::<C>() else {
            return;
        };
        if let Some(column) = self.columns[slot].as_any_mut().downcast_mut::<Column<C>>() {
            column.write(entity, value);
            self.entities[entity].bits.set(index);
        }
    }

    /// Clears the component's signature bit; the stored value is left in
    /// place. No-op when the entity is dead or `C` is not registered.
    pub fn remove_component<C: Component>(&mut self, entity: EntityID) {
        if !self.is_alive(entity) {
            return;
        }
        if self.registry.column_slot_of::<C>().is_none() {
            return;
        }
        if let Some(index) = self.registry.kind_index_of::<C>() {
            self.entities[entity].bits.clear(index);
        }
    }

    /// Sets the tag's signature bit. No-op when the entity is dead or `T`
    /// is not registered as a tag.
    pub fn add_tag<T: Tag>(&mut self, entity: EntityID) {
        if !self.is_alive(entity) {
            return;
        }
        let Some(index) = self.registry.kind_index_of::<T>() else {
            return;
        };
        if self.registry.desc(index).map_or(false, |d| d.is_tag) {
            self.entities[entity].bits.set(index);
        }
    }

    /// Clears the tag's signature bit. No-op when the entity is dead or `T`
    /// is not registered as a tag.
    pub fn remove_tag<T: Tag>(&mut self, entity: EntityID) {
        if !self.is_alive(entity) {
            return;
        }
        let Some(index) = self.registry.kind_index_of::<T>() else {
            return;
        };
        if self.registry.desc(index).map_or(false, |d| d.is_tag) {
            self.entities[entity].bits.clear(index);
        }
    }

    /// Returns `true` iff the entity is alive and owns component `C`.
    pub fn has_component<C: Component>(&self, entity: EntityID) -> bool {
        self.is_alive(entity)
            && self
                .registry
                .kind_index_of::<C>()
                .map_or(false, |index| self.entities[entity].bits.get(index))
    }

    /// Returns `true` iff the entity is alive and carries tag `T`.
    pub fn has_tag<T: Tag>(&self, entity: EntityID) -> bool {
        self.is_alive(entity)
            && self
                .registry
                .kind_index_of::<T>()
                .map_or(false, |index| self.entities[entity].bits.get(index))
    }

    /// Shared reference to the entity's component slot.
    ///
    /// Returns the slot for any in-range entity when `C` is registered —
    /// whether or not the entity semantically owns the component. Callers
    /// must check [`EcmManager::has_component`] to know whether the value is
    /// owned; an unowned slot holds an unspecified previous or default
    /// value. Returns `None` for out-of-range ids and unregistered types.
    pub fn get_component<C: Component>(&self, entity: EntityID) -> Option<&C> {
        if !self.has_entity(entity) {
            return None;
        }
        let slot = self.registry.column_slot_of::<C>()?;
        self.columns[slot]
            .as_any()
            .downcast_ref::<Column<C>>()?
            .get(entity)
    }

    /// Mutable variant of [`EcmManager::get_component`].
    pub fn get_component_mut<C: Component>(&mut self, entity: EntityID) -> Option<&mut C> {
        if !self.has_entity(entity) {
            return None;
        }
        let slot = self.registry.column_slot_of::<C>()?;
        self.columns[slot]
            .as_any_mut()
            .downcast_mut::<Column<C>>()?
            .get_mut(entity)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Signature queries
    // ─────────────────────────────────────────────────────────────────────

    /// Invokes `f` for every living entity matching signature `Q`, passing
    /// the entity id and mutable access to the signature's components.
    ///
    /// Sequential dispatch visits entities in ascending id order. With
    /// `parallel = true` the entity range is partitioned into
    /// `worker_count * SHARD_FACTOR` shards executed on the worker pool;
    /// ordering between entities is then unspecified, but the signature
    /// check and callback for one entity always execute on one worker.
    pub fn for_matching_signature<Q, F>(&mut self, parallel: bool, f: F)
    where
        Q: Signature,
        F: Fn(EntityID, Q::Refs<'_>) + Send + Sync,
    {
        let span = profiler::span("EcmManager::for_matching_signature");
        let mask = Q::mask(&self.registry);
        let Some(ptrs) = Q::resolve(&self.registry, &self.columns) else {
            return;
        };
        let size = self.size;
        let _span = span.entities(size as u64);

        if parallel && self.pool.is_some() && size > 0 {
            let this: &EcmManager = self;
            let f = &f;
            let tasks: Vec<Box<dyn FnOnce() + Send + '_>> =
                shard_ranges(size, self.shard_count())
                    .into_iter()
                    .map(|(start, end)| {
                        Box::new(move || {
                            for entity in start..end {
                                let slot = &this.entities[entity];
                                if slot.alive && slot.bits.contains_all(&mask) {
                                    // SAFETY: shards partition the id range,
                                    // so only this task selects this
                                    // entity's cells.
                                    f(entity, unsafe { Q::select(ptrs, entity) });
                                }
                            }
                        }) as Box<dyn FnOnce() + Send + '_>
                    })
                    .collect();
            this.run_tasks(tasks);
        } else {
            for entity in 0..size {
                let slot = &self.entities[entity];
                if slot.alive && slot.bits.contains_all(&mask) {
                    // SAFETY: `&mut self` grants exclusive access to every
                    // cell, and `f` cannot re-enter the manager.
                    let refs = unsafe { Q::select(ptrs, entity) };
                    f(entity, refs);
                }
            }
        }
    }

    /// [`EcmManager::for_matching_signature`] with a function pointer and
    /// an explicit shared context instead of a capturing closure.
    pub fn for_matching_signature_ptr<Q, X>(
        &mut self,
        function: fn(EntityID, &X, Q::Refs<'_>),
        context: &X,
        parallel: bool,
    ) where
        Q: Signature,
        X: Sync,
    {
        self.for_matching_signature::<Q, _>(parallel, move |entity, refs| {
            function(entity, context, refs)
        });
    }

    /// Invokes `f` for every living entity matching signature `Q`, passing
    /// the manager itself instead of component references.
    ///
    /// Sequential callbacks may freely re-enter the manager — delete
    /// entities, add components, run nested queries. Parallel callbacks run
    /// on worker threads and receive an aliased manager reference: they must
    /// restrict themselves to their own entity's components and must not
    /// mutate manager structure (see the module-level contract).
    pub fn for_matching_simple<Q, F>(&mut self, parallel: bool, f: F)
    where
        Q: Signature,
        F: Fn(EntityID, &mut EcmManager) + Send + Sync,
    {
        let mask = Q::mask(&self.registry);
        self.for_matching_mask(mask, parallel, f);
    }

    /// Filters with a runtime-supplied list of kind indices instead of a
    /// typed signature.
    ///
    /// Each listed index becomes a required bit; indices outside the
    /// registered kind range route through the always-false sentinel bit,
    /// which makes the query match nothing. Callback semantics are those of
    /// [`EcmManager::for_matching_simple`].
    pub fn for_matching_iterable<I, F>(&mut self, indices: I, parallel: bool, f: F)
    where
        I: IntoIterator<Item = usize>,
        F: Fn(EntityID, &mut EcmManager) + Send + Sync,
    {
        let sentinel = self.registry.sentinel_index();
        let mut mask = SignatureBits::new();
        for index in indices {
            mask.set(if index < sentinel { index } else { sentinel });
        }
        self.for_matching_mask(mask, parallel, f);
    }

    fn for_matching_mask<F>(&mut self, mask: SignatureBits, parallel: bool, f: F)
    where
        F: Fn(EntityID, &mut EcmManager) + Send + Sync,
    {
        let _span = profiler::span("EcmManager::for_matching_mask").entities(self.size as u64);
        let size = self.size;

        if parallel && self.pool.is_some() && size > 0 {
            let this = ManagerPtr(self as *mut EcmManager);
            let f = &f;
            let tasks: Vec<Box<dyn FnOnce() + Send + '_>> =
                shard_ranges(size, self.shard_count())
                    .into_iter()
                    .map(|(start, end)| {
                        Box::new(move || {
                            let this = this;
                            for entity in start..end {
                                let matches = {
                                    // SAFETY: shards only read slot state
                                    // here; structural mutation is excluded
                                    // by the parallel contract.
                                    let manager = unsafe { &*this.0 };
                                    manager.entities.get(entity).map_or(false, |slot| {
                                        slot.alive && slot.bits.contains_all(&mask)
                                    })
                                };
                                if matches {
                                    // SAFETY: the callback owns this entity
                                    // per the parallel contract.
                                    f(entity, unsafe { &mut *this.0 });
                                }
                            }
                        }) as Box<dyn FnOnce() + Send + '_>
                    })
                    .collect();
            self.run_tasks(tasks);
        } else {
            for entity in 0..size {
                let matches = self
                    .entities
                    .get(entity)
                    .map_or(false, |slot| slot.alive && slot.bits.contains_all(&mask));
                if matches {
                    f(entity, self);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Parallel dispatch plumbing
    // ─────────────────────────────────────────────────────────────────────

    #[inline]
    pub(crate) fn shard_count(&self) -> usize {
        self.worker_count.max(1) * SHARD_FACTOR
    }

    /// Queues `tasks` on the pool, starts a cohort, and blocks until every
    /// task has finished. Runs the tasks inline when no pool exists.
    pub(crate) fn run_tasks<'a>(&self, tasks: Vec<Box<dyn FnOnce() + Send + 'a>>) {
        let Some(pool) = &self.pool else {
            for task in tasks {
                task();
            }
            return;
        };

        let pending = AtomicUsize::new(tasks.len());
        for task in tasks {
            let pending = &pending;
            let wrapped = move || {
                let _guard = PendingGuard(pending);
                task();
            };
            // SAFETY: this function does not return until `pending` reaches
            // zero, so no queued task outlives the borrows it captures.
            pool.queue_boxed(unsafe { erase_task(Box::new(wrapped)) });
        }
        pool.start();
        while pending.load(Ordering::Acquire) != 0 {
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Unregisters one pending task on scope exit, panics included.
struct PendingGuard<'a>(&'a AtomicUsize);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Release);
    }
}

/// Aliased manager handle handed to parallel `for_matching_simple` and
/// `for_matching_iterable` callbacks.
#[derive(Clone, Copy)]
struct ManagerPtr(*mut EcmManager);

// SAFETY: shared across shard tasks under the parallel dispatch contract
// documented on the manager.
unsafe impl Send for ManagerPtr {}
unsafe impl Sync for ManagerPtr {}

/// Extends a task's lifetime to `'static` for the pool queue.
///
/// # Safety
/// The caller must not return control to code that could invalidate the
/// task's borrows until the task has run to completion.
unsafe fn erase_task<'a>(task: Box<dyn FnOnce() + Send + 'a>) -> PoolTask {
    // SAFETY: lifetime-only transmute between identical fat-pointer layouts;
    // the caller guarantees the task is joined before 'a ends.
    unsafe {
        std::mem::transmute::<Box<dyn FnOnce() + Send + 'a>, Box<dyn FnOnce() + Send + 'static>>(
            task,
        )
    }
}

/// Splits `0..len` into at most `shards` contiguous ranges.
pub(crate) fn shard_ranges(len: usize, shards: usize) -> Vec<(usize, usize)> {
    let shards = shards.max(1);
    let chunk = ((len + shards - 1) / shards).max(1);
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + chunk).min(len);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Splits a bucket into at most `shards` contiguous slices.
pub(crate) fn shard_slices(bucket: &[EntityID], shards: usize) -> Vec<&[EntityID]> {
    let shards = shards.max(1);
    let chunk = ((bucket.len() + shards - 1) / shards).max(1);
    bucket.chunks(chunk).collect()
}
