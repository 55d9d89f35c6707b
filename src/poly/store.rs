//! Hash-consing of monomials.
//!
//! A [MonomialStore] keeps every canonical [Monomial] exactly once, in an arena indexed
//! by a dense [MonomialId]. Since interning is the only way to obtain an id, two ids
//! from the same store are equal iff their monomials are structurally equal. The
//! multiplicative identity is never interned and is represented by `None`.
//!
//! Every id that the store hands out carries one reference. Holders call
//! [MonomialStore::retain] and [MonomialStore::release] to manage the count, and
//! [MonomialStore::purge] reclaims all monomials that are no longer referenced so
//! that their ids can be reused.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use ahash::HashMap;
use once_cell::sync::Lazy;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::monomial::Monomial;
use super::{Exponent, MonomialOrder, Variable};

static MONOMIALS: Lazy<Arc<MonomialStore>> = Lazy::new(|| Arc::new(MonomialStore::new()));

/// The default initial capacity of the hash index.
pub const DEFAULT_STORE_CAPACITY: usize = 1000;

/// A dense handle to an interned monomial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonomialId(u32);

impl MonomialId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for MonomialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

struct Slot {
    monomial: Monomial,
    ref_count: AtomicU32,
}

struct StoreData {
    slots: Vec<Option<Slot>>,
    index: HashMap<u64, SmallVec<[MonomialId; 1]>>,
    free_ids: Vec<u32>,
    live: usize,
}

impl StoreData {
    fn with_capacity(capacity: usize) -> StoreData {
        StoreData {
            slots: Vec::with_capacity(capacity),
            index: HashMap::with_capacity_and_hasher(capacity, Default::default()),
            free_ids: vec![],
            live: 0,
        }
    }

    #[inline]
    fn slot(&self, id: MonomialId) -> &Slot {
        match self.slots.get(id.index()) {
            Some(Some(s)) => s,
            _ => panic!("Monomial id {} is not live in this store", id.0),
        }
    }

    fn find(&self, m: &Monomial) -> Option<MonomialId> {
        self.index.get(&m.hash_value()).and_then(|ids| {
            ids.iter()
                .find(|id| self.slot(**id).monomial == *m)
                .cloned()
        })
    }

    fn insert(&mut self, monomial: Monomial) -> MonomialId {
        let id = match self.free_ids.pop() {
            Some(id) => id,
            None => {
                if self.slots.len() > u32::MAX as usize {
                    panic!("Too many monomials defined");
                }
                self.slots.push(None);
                (self.slots.len() - 1) as u32
            }
        };

        trace!("interned {:?} as m{}", monomial.exponents(), id);

        let id = MonomialId(id);
        self.index
            .entry(monomial.hash_value())
            .or_default()
            .push(id);
        self.slots[id.index()] = Some(Slot {
            monomial,
            ref_count: AtomicU32::new(1),
        });
        self.live += 1;
        id
    }
}

/// A read guard on a [MonomialStore], used to access or compare many monomials
/// without reacquiring the lock. The store must not be modified by the same thread
/// while a reader is alive.
pub struct MonomialStoreReader<'a> {
    data: RwLockReadGuard<'a, StoreData>,
}

impl<'a> MonomialStoreReader<'a> {
    #[inline]
    pub fn get(&self, id: MonomialId) -> &Monomial {
        &self.data.slot(id).monomial
    }

    /// Add a reference to `id`.
    #[inline]
    pub fn retain(&self, id: MonomialId) {
        self.data.slot(id).ref_count.fetch_add(1, AtomicOrdering::AcqRel);
    }

    /// Remove a reference from `id`.
    #[inline]
    pub fn release(&self, id: MonomialId) {
        if self
            .data
            .slot(id)
            .ref_count
            .fetch_update(AtomicOrdering::AcqRel, AtomicOrdering::Acquire, |c| {
                c.checked_sub(1)
            })
            .is_err()
        {
            panic!("Released monomial {} that has no references", id);
        }
    }

    /// Compare two interned monomials under the order `O`, where `None` is the identity.
    #[inline]
    pub fn compare<O: MonomialOrder>(
        &self,
        a: Option<MonomialId>,
        b: Option<MonomialId>,
    ) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => {
                if a == b {
                    Ordering::Equal
                } else {
                    O::cmp(self.get(a), self.get(b))
                }
            }
        }
    }

    /// Compare an interned monomial with `v^1` under the order `O`.
    #[inline]
    pub fn compare_variable<O: MonomialOrder>(
        &self,
        a: Option<MonomialId>,
        v: Variable,
    ) -> Ordering {
        match a {
            None => Ordering::Less,
            Some(a) => O::cmp_variable(self.get(a), v),
        }
    }
}

/// An interning store for monomials.
pub struct MonomialStore {
    data: RwLock<StoreData>,
    capacity: usize,
}

impl Default for MonomialStore {
    fn default() -> Self {
        MonomialStore::new()
    }
}

impl MonomialStore {
    pub fn new() -> MonomialStore {
        MonomialStore::with_capacity(DEFAULT_STORE_CAPACITY)
    }

    /// Create a store with room for `capacity` monomials before the index reallocates.
    pub fn with_capacity(capacity: usize) -> MonomialStore {
        MonomialStore {
            data: RwLock::new(StoreData::with_capacity(capacity)),
            capacity,
        }
    }

    /// Get the process-wide store.
    pub fn global() -> Arc<MonomialStore> {
        MONOMIALS.clone()
    }

    /// Acquire a read guard for bulk access.
    pub fn read(&self) -> MonomialStoreReader<'_> {
        MonomialStoreReader {
            data: self.data.read().unwrap(),
        }
    }

    /// Intern a canonical monomial. The identity yields `None`. The returned id carries
    /// one reference.
    pub fn intern(&self, monomial: Monomial) -> Option<MonomialId> {
        if monomial.is_constant() {
            return None;
        }

        {
            let data = self.data.read().unwrap();
            if let Some(id) = data.find(&monomial) {
                data.slot(id).ref_count.fetch_add(1, AtomicOrdering::AcqRel);
                return Some(id);
            }
        }

        let mut data = self.data.write().unwrap();

        // another thread may have inserted it in the meantime
        if let Some(id) = data.find(&monomial) {
            data.slot(id).ref_count.fetch_add(1, AtomicOrdering::AcqRel);
            return Some(id);
        }

        Some(data.insert(monomial))
    }

    /// Canonicalize and intern a list of variable-exponent pairs in any order.
    pub fn intern_pairs(&self, pairs: &[(Variable, Exponent)]) -> Option<MonomialId> {
        self.intern(Monomial::from_unsorted(pairs.iter().cloned()))
    }

    /// Intern `v^e`.
    pub fn intern_variable(&self, v: Variable, e: Exponent) -> Option<MonomialId> {
        self.intern(Monomial::new(v, e))
    }

    /// Add a reference to `id`.
    pub fn retain(&self, id: MonomialId) {
        self.read().retain(id);
    }

    /// Remove a reference from `id`. A monomial without references is reclaimed by the
    /// next [MonomialStore::purge].
    pub fn release(&self, id: MonomialId) {
        self.read().release(id);
    }

    /// The number of references to `id`.
    pub fn ref_count(&self, id: MonomialId) -> u32 {
        let data = self.data.read().unwrap();
        data.slot(id).ref_count.load(AtomicOrdering::Acquire)
    }

    /// Free all monomials without references and recycle their ids.
    /// Returns the number of monomials that were freed.
    pub fn purge(&self) -> usize {
        let mut data = self.data.write().unwrap();
        let data = &mut *data;

        let mut freed = 0;
        for (i, s) in data.slots.iter_mut().enumerate() {
            let unused = match s {
                Some(slot) => slot.ref_count.load(AtomicOrdering::Acquire) == 0,
                None => false,
            };

            if unused {
                if let Some(slot) = s.take() {
                    let hash = slot.monomial.hash_value();
                    if let Some(ids) = data.index.get_mut(&hash) {
                        ids.retain(|x| x.index() != i);
                        if ids.is_empty() {
                            data.index.remove(&hash);
                        }
                    }
                }

                data.free_ids.push(i as u32);
                freed += 1;
            }
        }

        // hand out low ids first
        data.free_ids.sort_unstable_by(|a, b| b.cmp(a));
        data.live -= freed;

        debug!("Purged {} unused monomials, {} remain", freed, data.live);
        freed
    }

    /// Remove all monomials. All ids that were handed out become invalid.
    pub fn clear(&self) {
        let mut data = self.data.write().unwrap();
        debug!("Clearing monomial store with {} monomials", data.live);
        *data = StoreData::with_capacity(self.capacity);
    }

    /// The number of live monomials.
    pub fn len(&self) -> usize {
        self.data.read().unwrap().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The dense-id high-water mark: every id handed out since the last clear is
    /// smaller than this value.
    pub fn largest_id(&self) -> usize {
        self.data.read().unwrap().slots.len()
    }

    /// Get a copy of the monomial with id `id`.
    pub fn get(&self, id: MonomialId) -> Monomial {
        self.read().get(id).clone()
    }

    /// Call `f` on the monomial with id `id`. The store is locked during the call.
    pub fn with_monomial<T, F: FnOnce(&Monomial) -> T>(&self, id: MonomialId, f: F) -> T {
        f(self.read().get(id))
    }

    pub fn tdeg(&self, id: MonomialId) -> Exponent {
        self.with_monomial(id, |m| m.tdeg())
    }

    pub fn num_variables(&self, id: MonomialId) -> usize {
        self.with_monomial(id, |m| m.num_variables())
    }

    pub fn exponent_of(&self, id: MonomialId, v: Variable) -> Exponent {
        self.with_monomial(id, |m| m.exponent_of(v))
    }

    pub fn has(&self, id: MonomialId, v: Variable) -> bool {
        self.with_monomial(id, |m| m.has(v))
    }

    pub fn is_linear(&self, id: MonomialId) -> bool {
        self.with_monomial(id, |m| m.is_linear())
    }

    /// Returns `a` with an extra reference.
    #[inline]
    fn share(&self, a: Option<MonomialId>) -> Option<MonomialId> {
        if let Some(id) = a {
            self.retain(id);
        }
        a
    }

    fn map<F: FnOnce(&Monomial) -> Monomial>(&self, a: MonomialId, f: F) -> Option<MonomialId> {
        let m = self.with_monomial(a, f);
        self.intern(m)
    }

    fn try_map<F: FnOnce(&Monomial) -> Option<Monomial>>(
        &self,
        a: MonomialId,
        f: F,
    ) -> Option<Option<MonomialId>> {
        let m = self.with_monomial(a, f)?;
        Some(self.intern(m))
    }

    fn combine<F: FnOnce(&Monomial, &Monomial) -> T, T>(
        &self,
        a: MonomialId,
        b: MonomialId,
        f: F,
    ) -> T {
        let data = self.read();
        f(data.get(a), data.get(b))
    }

    /// Multiply two monomials.
    pub fn mul(&self, a: Option<MonomialId>, b: Option<MonomialId>) -> Option<MonomialId> {
        match (a, b) {
            (None, x) | (x, None) => self.share(x),
            (Some(a), Some(b)) => {
                let m = self.combine(a, b, |a, b| a.mul(b));
                self.intern(m)
            }
        }
    }

    /// Multiply a monomial by `v^e`.
    pub fn mul_variable(
        &self,
        a: Option<MonomialId>,
        v: Variable,
        e: Exponent,
    ) -> Option<MonomialId> {
        if e == 0 {
            return self.share(a);
        }

        match a {
            None => self.intern_variable(v, e),
            Some(a) => self.map(a, |m| m.mul_variable(v, e)),
        }
    }

    /// Divide `a` by `b`. Returns `None` if `b` does not divide `a`.
    pub fn divide(
        &self,
        a: Option<MonomialId>,
        b: Option<MonomialId>,
    ) -> Option<Option<MonomialId>> {
        match (a, b) {
            (_, None) => Some(self.share(a)),
            (None, Some(_)) => None,
            (Some(a), Some(b)) => {
                if a == b {
                    return Some(None);
                }

                let m = self.combine(a, b, |a, b| a.divide(b))?;
                Some(self.intern(m))
            }
        }
    }

    /// Divide `a` by `v`. Returns `None` if `v` does not occur in `a`.
    pub fn divide_variable(
        &self,
        a: Option<MonomialId>,
        v: Variable,
    ) -> Option<Option<MonomialId>> {
        self.try_map(a?, |m| m.divide_variable(v))
    }

    /// Compute the least common multiple of `a` and `b`.
    pub fn lcm(&self, a: Option<MonomialId>, b: Option<MonomialId>) -> Option<MonomialId> {
        match (a, b) {
            (None, x) | (x, None) => self.share(x),
            (Some(a), Some(b)) => {
                let m = self.combine(a, b, |a, b| a.lcm(b));
                self.intern(m)
            }
        }
    }

    /// Compute the greatest common divisor of `a` and `b`.
    pub fn gcd(&self, a: Option<MonomialId>, b: Option<MonomialId>) -> Option<MonomialId> {
        match (a, b) {
            (None, _) | (_, None) => None,
            (Some(a), Some(b)) => {
                if a == b {
                    return self.share(Some(a));
                }

                let m = self.combine(a, b, |a, b| a.gcd(b));
                self.intern(m)
            }
        }
    }

    /// Raise `a` to the power `e`.
    pub fn pow(&self, a: Option<MonomialId>, e: Exponent) -> Option<MonomialId> {
        match (a, e) {
            (None, _) | (_, 0) => None,
            (Some(_), 1) => self.share(a),
            (Some(a), _) => self.map(a, |m| m.pow(e)),
        }
    }

    /// Compute the square root of `a`, if every exponent is even.
    pub fn sqrt(&self, a: Option<MonomialId>) -> Option<Option<MonomialId>> {
        match a {
            None => Some(None),
            Some(a) => self.try_map(a, |m| m.sqrt()),
        }
    }

    /// Set every exponent of `a` to one.
    pub fn separable_part(&self, a: Option<MonomialId>) -> Option<MonomialId> {
        self.map(a?, |m| m.separable_part())
    }

    /// Remove `v` from `a`.
    pub fn drop_variable(&self, a: Option<MonomialId>, v: Variable) -> Option<MonomialId> {
        self.map(a?, |m| m.drop_variable(v))
    }

    /// Differentiate `a` with respect to `v`. Returns the factor that the derivative
    /// picks up and the remaining monomial. The factor is zero if `v` does not occur.
    pub fn derivative(&self, a: Option<MonomialId>, v: Variable) -> (Exponent, Option<MonomialId>) {
        let Some(a) = a else {
            return (0, None);
        };

        match self.with_monomial(a, |m| m.derivative(v)) {
            Some((e, m)) => (e, self.intern(m)),
            None => (0, None),
        }
    }

    /// Compare two monomials under the order `O`. The identity is the least monomial.
    pub fn compare<O: MonomialOrder>(
        &self,
        a: Option<MonomialId>,
        b: Option<MonomialId>,
    ) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        self.read().compare::<O>(a, b)
    }

    pub fn compare_lexical(&self, a: Option<MonomialId>, b: Option<MonomialId>) -> Ordering {
        self.compare::<super::LexOrder>(a, b)
    }

    pub fn compare_graded_lexical(
        &self,
        a: Option<MonomialId>,
        b: Option<MonomialId>,
    ) -> Ordering {
        self.compare::<super::GradedLexOrder>(a, b)
    }

    pub fn compare_lexical_variable(&self, a: Option<MonomialId>, v: Variable) -> Ordering {
        self.read().compare_variable::<super::LexOrder>(a, v)
    }

    pub fn compare_graded_lexical_variable(&self, a: Option<MonomialId>, v: Variable) -> Ordering {
        self.read()
            .compare_variable::<super::GradedLexOrder>(a, v)
    }
}
