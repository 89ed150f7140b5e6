//! Multi-signature dispatch and stored query functions.
//!
//! Both facilities amortise one pass over the entity list across many
//! queries: a single pre-pass classifies every living entity into one bucket
//! per signature (an entity lands in zero, one, or many buckets), then each
//! signature's callback runs over its bucket — all callbacks of signature
//! *i* complete before any callback of signature *i+1* begins.
//!
//! [`MatchingSet`] is the inline form: build a batch of (signature,
//! callback) pairs and run it once via
//! [`EcmManager::run_matching_set`]. Stored functions are the deferred
//! form: registered once with
//! [`EcmManager::add_for_matching_function`], retained under a stable
//! [`FnID`], and invoked later by id.

use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::bitset::SignatureBits;
use crate::engine::manager::{shard_ranges, shard_slices, EcmManager};
use crate::engine::registry::KindRegistry;
use crate::engine::signature::Signature;
use crate::engine::types::{EntityID, FnID};
use crate::profiling::profiler;

/// Runs one signature's callback over a bucket of entity ids, re-checking
/// liveness per entity.
type BucketRunner<'a> = Box<dyn Fn(&EcmManager, &[EntityID]) + Send + Sync + 'a>;

/// As [`BucketRunner`], with the stored function's current context.
type ContextRunner = Box<dyn Fn(&EcmManager, &(dyn Any + Send + Sync), &[EntityID]) + Send + Sync>;

fn erase_runner<'a, Q, F>(f: F) -> BucketRunner<'a>
where
    Q: Signature,
    F: Fn(EntityID, Q::Refs<'_>) + Send + Sync + 'a,
{
    Box::new(move |manager, bucket| {
        let Some(ptrs) = Q::resolve(&manager.registry, &manager.columns) else {
            return;
        };
        for &entity in bucket {
            if manager.is_alive(entity) {
                // SAFETY: bucket slices partition the matched set, so only
                // this invocation selects this entity's cells.
                f(entity, unsafe { Q::select(ptrs, entity) });
            }
        }
    })
}

struct MatchEntry<'a> {
    mask_for: fn(&KindRegistry) -> SignatureBits,
    runner: BucketRunner<'a>,
}

/// A batch of (signature, callback) pairs dispatched in one entity pass.
///
/// The set borrows nothing from the manager and may be rebuilt or re-run
/// freely; callbacks may borrow surrounding state for the set's lifetime.
/// Callbacks run in the order they were added.
#[derive(Default)]
pub struct MatchingSet<'a> {
    entries: Vec<MatchEntry<'a>>,
}

impl<'a> MatchingSet<'a> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (signature, callback) pairs in the set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the set holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends signature `Q` with callback `f`.
    pub fn add<Q, F>(&mut self, f: F) -> &mut Self
    where
        Q: Signature,
        F: Fn(EntityID, Q::Refs<'_>) + Send + Sync + 'a,
    {
        self.entries.push(MatchEntry {
            mask_for: Q::mask,
            runner: erase_runner::<Q, F>(f),
        });
        self
    }

    /// Appends signature `Q` with a function pointer and shared context
    /// instead of a capturing closure.
    pub fn add_ptr<Q, X>(
        &mut self,
        function: fn(EntityID, &X, Q::Refs<'_>),
        context: Arc<X>,
    ) -> &mut Self
    where
        Q: Signature,
        X: Send + Sync + 'static,
    {
        self.add::<Q, _>(move |entity, refs| function(entity, &context, refs))
    }
}

/// A registered deferred query: precomputed mask, type-erased context, and
/// the erased per-bucket callback.
pub(crate) struct StoredFunction {
    pub(crate) mask: SignatureBits,
    pub(crate) context: Arc<dyn Any + Send + Sync>,
    pub(crate) context_type: TypeId,
    pub(crate) runner: ContextRunner,
}

impl EcmManager {
    // ─────────────────────────────────────────────────────────────────────
    // Multi-signature dispatch
    // ─────────────────────────────────────────────────────────────────────

    /// Classifies every living entity against every signature of `set` in a
    /// single pre-pass, then invokes each callback on its bucket in the
    /// order the pairs were added.
    ///
    /// Sequential dispatch fills and visits buckets in ascending id order.
    /// With `parallel = true`, both the pre-pass and each bucket run are
    /// sharded onto the worker pool; bucket pushes are mutex-guarded.
    pub fn run_matching_set(&mut self, set: &MatchingSet<'_>, parallel: bool) {
        let _span = profiler::span("EcmManager::run_matching_set").entities(self.size as u64);
        if set.entries.is_empty() {
            return;
        }
        let masks: Vec<SignatureBits> = set
            .entries
            .iter()
            .map(|entry| (entry.mask_for)(&self.registry))
            .collect();
        let buckets = self.collect_buckets(&masks, parallel);
        for (entry, bucket) in set.entries.iter().zip(buckets.iter()) {
            self.run_bucket(&entry.runner, bucket, parallel);
        }
    }

    /// One scan over all entities, producing one id bucket per mask.
    pub(crate) fn collect_buckets(
        &self,
        masks: &[SignatureBits],
        parallel: bool,
    ) -> Vec<Vec<EntityID>> {
        let size = self.size;
        if parallel && self.pool.is_some() && size > 0 {
            let buckets: Vec<Mutex<Vec<EntityID>>> =
                masks.iter().map(|_| Mutex::new(Vec::new())).collect();
            {
                let this = self;
                let buckets = &buckets;
                let tasks: Vec<Box<dyn FnOnce() + Send + '_>> =
                    shard_ranges(size, self.shard_count())
                        .into_iter()
                        .map(|(start, end)| {
                            Box::new(move || {
                                for entity in start..end {
                                    let slot = &this.entities[entity];
                                    if !slot.alive {
                                        continue;
                                    }
                                    for (bucket, mask) in buckets.iter().zip(masks.iter()) {
                                        if slot.bits.contains_all(mask) {
                                            bucket.lock().push(entity);
                                        }
                                    }
                                }
                            }) as Box<dyn FnOnce() + Send + '_>
                        })
                        .collect();
                self.run_tasks(tasks);
            }
            buckets.into_iter().map(|bucket| bucket.into_inner()).collect()
        } else {
            let mut buckets = vec![Vec::new(); masks.len()];
            for entity in 0..size {
                let slot = &self.entities[entity];
                if !slot.alive {
                    continue;
                }
                for (bucket, mask) in buckets.iter_mut().zip(masks.iter()) {
                    if slot.bits.contains_all(mask) {
                        bucket.push(entity);
                    }
                }
            }
            buckets
        }
    }

    fn run_bucket(&self, runner: &BucketRunner<'_>, bucket: &[EntityID], parallel: bool) {
        if bucket.is_empty() {
            return;
        }
        if parallel && self.pool.is_some() {
            let this = self;
            let tasks: Vec<Box<dyn FnOnce() + Send + '_>> =
                shard_slices(bucket, self.shard_count())
                    .into_iter()
                    .map(|slice| {
                        Box::new(move || runner(this, slice)) as Box<dyn FnOnce() + Send + '_>
                    })
                    .collect();
            self.run_tasks(tasks);
        } else {
            runner(self, bucket);
        }
    }

    fn run_stored(&self, function: &StoredFunction, bucket: &[EntityID], parallel: bool) {
        if bucket.is_empty() {
            return;
        }
        if parallel && self.pool.is_some() {
            let this = self;
            let tasks: Vec<Box<dyn FnOnce() + Send + '_>> =
                shard_slices(bucket, self.shard_count())
                    .into_iter()
                    .map(|slice| {
                        Box::new(move || (function.runner)(this, &*function.context, slice))
                            as Box<dyn FnOnce() + Send + '_>
                    })
                    .collect();
            self.run_tasks(tasks);
        } else {
            (function.runner)(self, &*function.context, bucket);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Stored query functions
    // ─────────────────────────────────────────────────────────────────────

    /// Registers a deferred query over signature `Q` and returns its stable
    /// id. The signature mask is precomputed at registration.
    pub fn add_for_matching_function<Q, F>(&mut self, f: F) -> FnID
    where
        Q: Signature,
        F: Fn(EntityID, Q::Refs<'_>) + Send + Sync + 'static,
    {
        self.add_for_matching_function_with::<Q, (), _>(Arc::new(()), move |entity, _, refs| {
            f(entity, refs)
        })
    }

    /// As [`EcmManager::add_for_matching_function`], with a shared context
    /// passed to every invocation. The context can later be swapped with
    /// [`EcmManager::change_for_matching_function_context`].
    pub fn add_for_matching_function_with<Q, X, F>(&mut self, context: Arc<X>, f: F) -> FnID
    where
        Q: Signature,
        X: Any + Send + Sync,
        F: Fn(EntityID, &X, Q::Refs<'_>) + Send + Sync + 'static,
    {
        let mask = Q::mask(&self.registry);
        let runner: ContextRunner = Box::new(move |manager, context, bucket| {
            let Some(context) = context.downcast_ref::<X>() else {
                return;
            };
            let Some(ptrs) = Q::resolve(&manager.registry, &manager.columns) else {
                return;
            };
            for &entity in bucket {
                if manager.is_alive(entity) {
                    // SAFETY: bucket slices partition the matched set, so
                    // only this invocation selects this entity's cells.
                    f(entity, context, unsafe { Q::select(ptrs, entity) });
                }
            }
        });
        let id = self.allocate_function_id();
        self.functions.insert(
            id,
            StoredFunction {
                mask,
                context,
                context_type: TypeId::of::<X>(),
                runner,
            },
        );
        id
    }

    /// Monotone id allocation that skips ids still in use, so ids stay
    /// stable across removals.
    fn allocate_function_id(&mut self) -> FnID {
        loop {
            let id = self.next_function_id;
            self.next_function_id = self.next_function_id.wrapping_add(1);
            if !self.functions.contains_key(&id) {
                return id;
            }
        }
    }

    /// Removes one stored function. Returns `false` for unknown ids.
    pub fn remove_for_matching_function(&mut self, id: FnID) -> bool {
        self.functions.remove(&id).is_some()
    }

    /// Retains only the given ids. Returns the number of functions removed.
    pub fn keep_some_matching_functions<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = FnID>,
    {
        let keep: HashSet<FnID> = ids.into_iter().collect();
        let before = self.functions.len();
        self.functions.retain(|id, _| keep.contains(id));
        before - self.functions.len()
    }

    /// Removes the given ids. Returns the number of functions removed.
    pub fn remove_some_matching_functions<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = FnID>,
    {
        let mut removed = 0;
        for id in ids {
            if self.functions.remove(&id).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Drops all stored functions and resets the id counter to 0.
    pub fn clear_for_matching_functions(&mut self) {
        self.functions.clear();
        self.next_function_id = 0;
    }

    /// Swaps the context of a stored function. Returns `false` when the id
    /// is unknown or the new context's type does not match the registered
    /// one.
    pub fn change_for_matching_function_context(
        &mut self,
        id: FnID,
        context: Arc<dyn Any + Send + Sync>,
    ) -> bool {
        match self.functions.get_mut(&id) {
            Some(function) if (*context).type_id() == function.context_type => {
                function.context = context;
                true
            }
            _ => false,
        }
    }

    /// Invokes one stored function over its current matches. Returns
    /// `false` for unknown ids.
    pub fn call_for_matching_function(&mut self, id: FnID, parallel: bool) -> bool {
        let _span = profiler::span("EcmManager::call_for_matching_function");
        let this = &*self;
        let Some(function) = this.functions.get(&id) else {
            return false;
        };
        let buckets = this.collect_buckets(std::slice::from_ref(&function.mask), parallel);
        this.run_stored(function, &buckets[0], parallel);
        true
    }

    /// Invokes every stored function: one bucket pre-pass over all
    /// entities, then each function on its bucket in ascending id order.
    pub fn call_for_matching_functions(&mut self, parallel: bool) {
        let _span = profiler::span("EcmManager::call_for_matching_functions")
            .entities(self.size as u64);
        let this = &*self;
        if this.functions.is_empty() {
            return;
        }
        let masks: Vec<SignatureBits> = this.functions.values().map(|f| f.mask).collect();
        let buckets = this.collect_buckets(&masks, parallel);
        for (function, bucket) in this.functions.values().zip(buckets.iter()) {
            this.run_stored(function, bucket, parallel);
        }
    }
}
