//! Linear-time construction of polynomials.
//!
//! Inserting terms one by one into a sorted term vector costs `O(n)` per insertion. A
//! [TermAccumulator] instead uses the dense id of a monomial as a direct index into a
//! sparse map from global ids to local slots, so that every insertion is `O(1)` and a
//! polynomial with `n` terms is collected in `O(n)`.
//!
//! Accumulators are reused: they are checked out of a [TermAccumulatorPool], filled
//! with [TermAccumulatorPool::add_term] and then either finalized with
//! [TermAccumulatorPool::read_terms] or discarded with [TermAccumulatorPool::drop_terms].
//! A pool is owned by a single thread.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::domains::Ring;

use super::store::{MonomialStore, MonomialStoreReader};
use super::term::Term;
use super::MonomialOrder;

/// A handle to a checked-out accumulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AccumulatorId(usize);

/// A reusable term-merging buffer.
pub struct TermAccumulator<R: Ring> {
    /// Maps a global monomial id to a local slot. 0 means unused.
    local_ids: Vec<u32>,
    /// Slot 0 is reserved. Cancelled slots are `None`.
    slots: Vec<Option<Term<R>>>,
    constant: Term<R>,
    in_use: bool,
}

impl<R: Ring> TermAccumulator<R> {
    #[inline]
    fn checked_out(&mut self, id: AccumulatorId) -> &mut Self {
        assert!(self.in_use, "Term accumulator {} is not checked out", id.0);
        self
    }

    fn new(ring: &R) -> TermAccumulator<R> {
        TermAccumulator {
            local_ids: vec![],
            slots: vec![None],
            constant: Term::constant(ring.zero()),
            in_use: false,
        }
    }

    fn reset(&mut self, ring: &R) {
        self.slots.truncate(1);
        self.constant = Term::constant(ring.zero());
        self.in_use = false;
    }
}

/// A ring of reusable [TermAccumulator]s for a given coefficient ring and monomial store.
pub struct TermAccumulatorPool<R: Ring> {
    ring: R,
    store: Arc<MonomialStore>,
    accumulators: Vec<TermAccumulator<R>>,
    next: usize,
}

impl<R: Ring> TermAccumulatorPool<R> {
    /// Create a pool with a single accumulator.
    pub fn new(ring: R, store: Arc<MonomialStore>) -> TermAccumulatorPool<R> {
        TermAccumulatorPool::with_size(ring, store, 1)
    }

    /// Create a pool with `size` accumulators. The pool grows when all of them are
    /// checked out.
    pub fn with_size(ring: R, store: Arc<MonomialStore>, size: usize) -> TermAccumulatorPool<R> {
        let accumulators = (0..size.max(1)).map(|_| TermAccumulator::new(&ring)).collect();
        TermAccumulatorPool {
            ring,
            store,
            accumulators,
            next: 0,
        }
    }

    pub fn ring(&self) -> &R {
        &self.ring
    }

    pub fn store(&self) -> &Arc<MonomialStore> {
        &self.store
    }

    /// The number of accumulators in the pool.
    pub fn len(&self) -> usize {
        self.accumulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulators.is_empty()
    }

    /// The number of accumulators that are checked out.
    pub fn num_checked_out(&self) -> usize {
        self.accumulators.iter().filter(|a| a.in_use).count()
    }

    /// Check out an accumulator for constructing a polynomial with about
    /// `expected_size` terms.
    pub fn checkout(&mut self, expected_size: usize) -> AccumulatorId {
        let n = self.accumulators.len();
        let index = match (0..n)
            .map(|i| (self.next + i) % n)
            .find(|i| !self.accumulators[*i].in_use)
        {
            Some(i) => i,
            None => {
                debug!("Growing term accumulator pool to {} accumulators", n + 1);
                self.accumulators.push(TermAccumulator::new(&self.ring));
                n
            }
        };
        self.next = (index + 1) % self.accumulators.len();

        let bound = self.store.largest_id();
        let acc = &mut self.accumulators[index];
        debug_assert!(acc.local_ids.iter().all(|x| *x == 0));

        if acc.local_ids.len() < bound {
            acc.local_ids.resize(bound, 0);
        }
        acc.slots.reserve(expected_size);
        acc.in_use = true;

        AccumulatorId(index)
    }

    /// Add a term. A term whose monomial is already present is merged with it, and the
    /// slot is freed when the coefficients cancel. The accumulator takes over the
    /// reference that `term` holds.
    pub fn add_term(&mut self, id: AccumulatorId, term: Term<R>) {
        assert!(
            !R::is_zero(&term.coefficient),
            "Cannot add a term with a zero coefficient"
        );

        let TermAccumulatorPool {
            ring,
            store,
            accumulators,
            ..
        } = self;
        let acc = accumulators[id.0].checked_out(id);

        let Some(m) = term.monomial else {
            ring.add_assign(&mut acc.constant.coefficient, &term.coefficient);
            return;
        };

        if m.index() >= acc.local_ids.len() {
            // the monomial was created after the checkout
            acc.local_ids.resize(store.largest_id().max(m.index() + 1), 0);
        }

        match acc.local_ids[m.index()] {
            0 => {
                if acc.slots.len() > u32::MAX as usize {
                    panic!("Too many terms in accumulator");
                }
                acc.local_ids[m.index()] = acc.slots.len() as u32;
                acc.slots.push(Some(term));
            }
            local => {
                let reader = store.read();
                reader.release(m);

                let slot = &mut acc.slots[local as usize];
                let cancelled = match slot {
                    Some(t) => {
                        ring.add_assign(&mut t.coefficient, &term.coefficient);
                        R::is_zero(&t.coefficient)
                    }
                    None => unreachable!("Local slot {} of monomial {} is empty", local, m),
                };

                if cancelled {
                    *slot = None;
                    reader.release(m);
                    acc.local_ids[m.index()] = 0;
                }
            }
        }
    }

    /// Get the greatest accumulated term under the order `O`, without finalizing.
    pub fn max_term<O: MonomialOrder>(&self, id: AccumulatorId) -> Option<&Term<R>> {
        let acc = &self.accumulators[id.0];
        assert!(acc.in_use, "Term accumulator {} is not checked out", id.0);

        let reader = self.store.read();
        let max = acc
            .slots
            .iter()
            .flatten()
            .max_by(|a, b| reader.compare::<O>(a.monomial, b.monomial));

        match max {
            Some(t) => Some(t),
            None if !R::is_zero(&acc.constant.coefficient) => Some(&acc.constant),
            None => None,
        }
    }

    /// The number of nonzero terms in the accumulator.
    pub fn nterms(&self, id: AccumulatorId) -> usize {
        let acc = &self.accumulators[id.0];
        assert!(acc.in_use, "Term accumulator {} is not checked out", id.0);

        acc.slots.iter().flatten().count() + !R::is_zero(&acc.constant.coefficient) as usize
    }

    /// Finalize the accumulator and return the nonzero terms. The constant term comes
    /// first, followed by the other terms in insertion order. The accumulator is
    /// returned to the pool.
    pub fn read_terms(&mut self, id: AccumulatorId) -> Vec<Term<R>> {
        let ring = &self.ring;
        let acc = self.accumulators[id.0].checked_out(id);

        let mut terms = Vec::with_capacity(acc.slots.len());
        if !R::is_zero(&acc.constant.coefficient) {
            terms.push(std::mem::replace(
                &mut acc.constant,
                Term::constant(ring.zero()),
            ));
        }

        for t in acc.slots.drain(1..).flatten() {
            if let Some(m) = t.monomial {
                acc.local_ids[m.index()] = 0;
            }
            terms.push(t);
        }

        acc.reset(ring);
        terms
    }

    /// Discard all accumulated terms and return the accumulator to the pool.
    pub fn drop_terms(&mut self, id: AccumulatorId) {
        let reader = self.store.read();
        let acc = self.accumulators[id.0].checked_out(id);

        for t in acc.slots.drain(1..).flatten() {
            if let Some(m) = t.monomial {
                acc.local_ids[m.index()] = 0;
                reader.release(m);
            }
        }

        acc.reset(&self.ring);
    }

    /// Finalize the accumulator and sort the terms descending under the order `O`.
    pub fn read_sorted_terms<O: MonomialOrder>(&mut self, id: AccumulatorId) -> Vec<Term<R>> {
        let mut terms = self.read_terms(id);
        let reader = self.store.read();
        sort_terms::<R, O>(&reader, &mut terms);
        terms
    }
}

impl<R: Ring> Drop for TermAccumulatorPool<R> {
    fn drop(&mut self) {
        for i in 0..self.accumulators.len() {
            if self.accumulators[i].in_use {
                self.drop_terms(AccumulatorId(i));
            }
        }
    }
}

/// Sort terms with distinct monomials descending under the order `O`.
pub(crate) fn sort_terms<R: Ring, O: MonomialOrder>(
    reader: &MonomialStoreReader<'_>,
    terms: &mut [Term<R>],
) {
    terms.sort_unstable_by(|a, b| match reader.compare::<O>(b.monomial, a.monomial) {
        Ordering::Equal => {
            debug_assert!(a.monomial == b.monomial);
            Ordering::Equal
        }
        o => o,
    });
}
