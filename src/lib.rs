//! # ECM Framework
//!
//! Entity-Component-Meta System (ECM): a data-oriented container that stores
//! heterogeneous per-entity data in parallel typed columns, filters entities
//! by type signatures using bitset masks, and drives per-entity callbacks —
//! optionally in parallel through an embedded worker pool.
//!
//! ## Design Goals
//! - Columnar, non-archetypal storage with stable entity ids
//! - O(1) signature filtering via fixed-width bitsets
//! - Infallible runtime API (bad input degrades to no-op / `false`)
//! - Parallel query dispatch with nested re-entry support
//!
//! ## Quick start
//! ```
//! use ecm_framework::prelude::*;
//!
//! #[derive(Default)]
//! struct Position { x: f32, y: f32 }
//! impl Component for Position {}
//!
//! #[derive(Default)]
//! struct Velocity { dx: f32, dy: f32 }
//! impl Component for Velocity {}
//!
//! struct Frozen;
//! impl Tag for Frozen {}
//!
//! let mut layout = Layout::new();
//! layout.register_component::<Position>().unwrap();
//! layout.register_component::<Velocity>().unwrap();
//! layout.register_tag::<Frozen>().unwrap();
//!
//! let mut manager = EcmManager::new(layout);
//! let e = manager.add_entity();
//! manager.add_component(e, Position { x: 0.0, y: 0.0 });
//! manager.add_component(e, Velocity { dx: 1.0, dy: 1.0 });
//!
//! manager.for_matching_signature::<(&mut Position, &Velocity), _>(false, |_id, (pos, vel)| {
//!     pos.x += vel.dx;
//!     pos.y += vel.dy;
//! });
//! ```

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod engine;
pub mod profiling;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::manager::EcmManager;

pub use engine::registry::{
    Component,
    Tag,
    Layout,
    KindRegistry,
    KindDesc,
};

pub use engine::bitset::SignatureBits;

pub use engine::signature::{
    Select,
    Signature,
    With,
};

pub use engine::matching::MatchingSet;

pub use engine::pool::WorkerPool;

pub use engine::error::{
    EcmResult,
    EcmError,
    RegistryError,
};

pub use engine::types::{
    EntityID,
    FnID,
    KIND_CAP,
    INITIAL_CAPACITY,
    GROWTH_INCREMENT,
    DEFAULT_WORKER_COUNT,
    SHARD_FACTOR,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used ECM types.
///
/// Import with:
/// ```rust
/// use ecm_framework::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        EcmManager,
        Layout,
        Component,
        Tag,
        With,
        MatchingSet,
        WorkerPool,
        EntityID,
        FnID,
    };
}
