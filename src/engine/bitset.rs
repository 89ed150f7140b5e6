//! Signature bitsets.
//!
//! A [`SignatureBits`] value records kind membership for one entity, or acts
//! as the mask derived from a query signature. Bit `i` corresponds to the
//! kind with index `i` in the manager's combined component-then-tag set. The
//! bit at index `kind_count` is the **sentinel**: it is never set on an
//! entity, so any query that routes an unknown identifier to the sentinel
//! can never match.
//!
//! ## Invariants
//! - Entity bitsets never have the sentinel bit set.
//! - Masks may set the sentinel bit deliberately to make themselves
//!   unsatisfiable (see
//!   [`EcmManager::for_matching_iterable`](crate::EcmManager::for_matching_iterable)).
//!
//! Out-of-range bit indices are ignored by `set`/`clear` and read as `false`
//! from `get`, keeping the runtime surface panic-free.

use std::fmt;

use crate::engine::types::MASK_WORDS;

/// Fixed-width bit vector over the registered kind set plus one sentinel bit.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SignatureBits {
    words: [u64; MASK_WORDS],
}

impl Default for SignatureBits {
    fn default() -> Self {
        Self {
            words: [0u64; MASK_WORDS],
        }
    }
}

impl SignatureBits {
    /// Creates an empty bitset.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets bit `index`. Out-of-range indices are ignored.
    #[inline]
    pub fn set(&mut self, index: usize) {
        if index < MASK_WORDS * 64 {
            self.words[index / 64] |= 1u64 << (index % 64);
        }
    }

    /// Clears bit `index`. Out-of-range indices are ignored.
    #[inline]
    pub fn clear(&mut self, index: usize) {
        if index < MASK_WORDS * 64 {
            self.words[index / 64] &= !(1u64 << (index % 64));
        }
    }

    /// Returns bit `index`, or `false` when out of range.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        if index < MASK_WORDS * 64 {
            (self.words[index / 64] >> (index % 64)) & 1 == 1
        } else {
            false
        }
    }

    /// Clears every bit.
    #[inline]
    pub fn clear_all(&mut self) {
        self.words = [0u64; MASK_WORDS];
    }

    /// Returns `true` if no bit is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Returns `true` if every bit set in `mask` is also set in `self`.
    ///
    /// This is the signature-match predicate: an entity matches a query mask
    /// iff `entity_bits.contains_all(&mask)`.
    #[inline]
    pub fn contains_all(&self, mask: &SignatureBits) -> bool {
        for (have, want) in self.words.iter().zip(mask.words.iter()) {
            if (have & want) != *want {
                return false;
            }
        }
        true
    }

    /// Run-time accessor over the combined kind range.
    ///
    /// Returns bit `index` when `index < kind_count`, and the sentinel bit
    /// (always `false` on entity bitsets) otherwise. This provides the safe
    /// fall-through for unknown identifiers in iterable queries.
    #[inline]
    pub fn combined_bit(&self, index: usize, kind_count: usize) -> bool {
        if index < kind_count {
            self.get(index)
        } else {
            self.get(kind_count)
        }
    }
}

impl fmt::Debug for SignatureBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBits[")?;
        let mut first = true;
        for index in 0..MASK_WORDS * 64 {
            if self.get(index) {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{index}")?;
                first = false;
            }
        }
        write!(f, "]")
    }
}
