//! Error types for the kind-registration phase.
//!
//! The runtime surface of the manager is deliberately infallible: bad entity
//! ids, dead entities, unknown component types and unknown stored-function
//! ids all degrade to no-op, `false`, or `None`. The only fallible phase is
//! **layout construction**, where component and tag types are registered and
//! assigned kind indices. Those failures are modeled here.
//!
//! ## Goals
//! * **Specificity:** Each variant models a single failure mode (capacity
//!   exhaustion, conflicting registration).
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and convert into the crate-level [`EcmError`] via
//!   `From` so callers can use `?` uniformly.
//! * **Actionability:** Structured fields (the offending type name, the
//!   exceeded cap) make failures diagnosable without reproduction.
//!
//! ## Display vs. Debug
//! * [`fmt::Display`] is optimized for operator logs (short, imperative
//!   phrasing).
//! * [`fmt::Debug`] (derived) retains full structure for diagnostics.

use std::fmt;

use crate::engine::types::KIND_CAP;

/// Result alias for fallible ECM operations.
pub type EcmResult<T> = Result<T, EcmError>;

/// Errors raised while registering components and tags into a [`Layout`].
///
/// ## Context
/// Registration happens once, before the manager is constructed; after
/// construction the kind set is frozen and these errors can no longer occur.
///
/// [`Layout`]: crate::engine::registry::Layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The combined number of components and tags would exceed [`KIND_CAP`].
    CapacityExceeded {
        /// The fixed kind capacity that was hit.
        cap: usize,
    },

    /// A type was registered both as a component and as a tag.
    ConflictingKind {
        /// Rust type name of the offending kind.
        name: &'static str,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::CapacityExceeded { cap } => {
                write!(f, "kind capacity exceeded (cap {})", cap)
            }
            RegistryError::ConflictingKind { name } => {
                write!(f, "type {} registered as both component and tag", name)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

impl RegistryError {
    /// Constructs a capacity error for the fixed kind cap.
    #[inline]
    pub(crate) fn capacity() -> Self {
        RegistryError::CapacityExceeded { cap: KIND_CAP }
    }
}

/// Aggregate error for ECM operations.
///
/// Currently registration is the only fallible phase; the aggregate exists so
/// that the public result alias stays stable if further fallible surfaces
/// appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcmError {
    /// A kind-registration failure.
    Registry(RegistryError),
}

impl fmt::Display for EcmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcmError::Registry(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EcmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EcmError::Registry(e) => Some(e),
        }
    }
}

impl From<RegistryError> for EcmError {
    fn from(e: RegistryError) -> Self {
        EcmError::Registry(e)
    }
}
