//! Generation policy: how random the synthesized values are and how many
//! alternatives of a disjunction are materialized.
//!
//! The policy lives on the [`Emitter`]. Temporary overrides are taken with
//! [`Emitter::fuzziness`], [`Emitter::completeness`] or
//! [`Emitter::with_policy`], which return a [`PolicyGuard`]. The guard
//! dereferences to the emitter and puts the previous policy back when it is
//! dropped, whichever way the scope is left.

use std::ops::{Deref, DerefMut};

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::emitter::Emitter;

/// Which alternatives of a disjunction are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    /// One alternative per disjunction.
    Sampled,
    /// Every alternative.
    Exhaustive,
}

/// Fuzziness and completeness in effect for a generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// `0` is deterministic; any higher level randomizes choices and values.
    pub fuzziness: u32,
    pub completeness: Completeness,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            fuzziness: 1,
            completeness: Completeness::Sampled,
        }
    }
}

impl Policy {
    /// Fuzziness 0, every alternative kept.
    pub fn deterministic() -> Self {
        Policy {
            fuzziness: 0,
            completeness: Completeness::Exhaustive,
        }
    }

    pub fn is_fuzzy(&self) -> bool {
        self.fuzziness > 0
    }

    pub fn is_exhaustive(&self) -> bool {
        self.completeness == Completeness::Exhaustive
    }
}

/// First element when deterministic, a uniform pick otherwise.
pub fn fuzzy_choice<'a, T, R: Rng + ?Sized>(
    items: &'a [T],
    policy: Policy,
    rng: &mut R,
) -> Option<&'a T> {
    if policy.is_fuzzy() {
        items.get(rng.random_range(0..items.len().max(1)))
    } else {
        items.first()
    }
}

/// Leaves `items` in order when deterministic, shuffles them otherwise.
pub fn fuzzy_shuffle<T, R: Rng + ?Sized>(items: &mut [T], policy: Policy, rng: &mut R) {
    if policy.is_fuzzy() {
        items.shuffle(rng);
    }
}

// =============================================================================
// Scoped overrides
// =============================================================================

/// Restores the emitter's previous policy on drop.
pub struct PolicyGuard<'a> {
    emitter: &'a mut Emitter,
    saved: Policy,
}

impl<'a> PolicyGuard<'a> {
    pub(crate) fn new(emitter: &'a mut Emitter, policy: Policy) -> Self {
        let saved = emitter.policy();
        log::trace!("policy override {saved:?} -> {policy:?}");
        emitter.set_policy(policy);
        PolicyGuard { emitter, saved }
    }
}

impl Deref for PolicyGuard<'_> {
    type Target = Emitter;

    fn deref(&self) -> &Emitter {
        self.emitter
    }
}

impl DerefMut for PolicyGuard<'_> {
    fn deref_mut(&mut self) -> &mut Emitter {
        self.emitter
    }
}

impl Drop for PolicyGuard<'_> {
    fn drop(&mut self) {
        log::trace!("policy restored to {:?}", self.saved);
        self.emitter.set_policy(self.saved);
    }
}
