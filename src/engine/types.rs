//! Core ECM Types, Identifiers, and Layout Constants
//!
//! This module defines the **fundamental identifiers, capacities, and tuning
//! constants** shared across all engine subsystems: the kind registry, the
//! signature bitset, columnar storage, the manager, and the worker pool.
//!
//! ## Design Philosophy
//!
//! The engine is designed around:
//!
//! - **Dense, index-addressed storage** — every component column is indexed
//!   directly by entity id,
//! - **Bitset-based signatures** — one bit per registered kind plus a
//!   sentinel,
//! - **Stable numeric identifiers** — entity ids never move; deleted ids are
//!   recycled through a free set,
//! - **Fixed growth steps** — capacity grows by a constant increment, never
//!   by reallocation-time doubling heuristics.
//!
//! ## Kinds
//!
//! A *kind* is either a component type or a tag type. Kinds are assigned
//! compact indices at manager construction: components first, then tags. The
//! index one past the last kind is the **sentinel slot**, which always reads
//! false so that queries against unknown identifiers fail without branching.

/// Stable identifier of an entity slot. Ids are recycled after deletion but
/// never renumbered.
pub type EntityID = usize;

/// Identifier of a stored matching function.
pub type FnID = usize;

/// Maximum number of registered kinds (components plus tags).
pub const KIND_CAP: usize = 255;

/// Number of `u64` words in a signature bitset, sized for `KIND_CAP` kinds
/// plus the sentinel bit.
pub const MASK_WORDS: usize = (KIND_CAP + 1 + 63) / 64;

/// Entity slots pre-allocated on construction and after `reset`.
pub const INITIAL_CAPACITY: usize = 256;

/// Added to capacity each time an entity push hits the cap.
pub const GROWTH_INCREMENT: usize = 256;

/// Worker threads spawned per pool `start` unless overridden. Below 2 the
/// pool degrades to a synchronous executor.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Parallel queries partition the entity range into
/// `worker_count * SHARD_FACTOR` shards.
pub const SHARD_FACTOR: usize = 2;

const _: [(); 1] = [(); ((KIND_CAP + 1) <= MASK_WORDS * 64) as usize];
const _: [(); 1] = [(); (INITIAL_CAPACITY > 0) as usize];
const _: [(); 1] = [(); (GROWTH_INCREMENT > 0) as usize];
