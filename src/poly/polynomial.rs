use std::cmp::Ordering;
use std::fmt::Display;
use std::marker::PhantomData;
use std::ops::{Add, Mul, Neg, Sub};
use std::sync::Arc;

use crate::domains::Ring;

use super::accumulator::{sort_terms, TermAccumulatorPool};
use super::store::{MonomialId, MonomialStore};
use super::term::Term;
use super::{Exponent, GradedLexOrder, MonomialOrder, Variable};

/// A sparse multivariate polynomial whose monomials are interned in a [MonomialStore].
///
/// The terms are kept strictly descending under the monomial order `O`, have pairwise
/// distinct monomials and never have a zero coefficient. The zero polynomial has no terms.
/// A polynomial owns one reference to each of its monomials.
pub struct Polynomial<R: Ring, O: MonomialOrder = GradedLexOrder> {
    terms: Vec<Term<R>>,
    pub ring: R,
    store: Arc<MonomialStore>,
    _phantom: PhantomData<O>,
}

impl<R: Ring, O: MonomialOrder> Polynomial<R, O> {
    /// Construct a polynomial from terms that are already in canonical order and whose
    /// references are handed over.
    fn from_canonical(ring: R, store: Arc<MonomialStore>, terms: Vec<Term<R>>) -> Self {
        Polynomial {
            terms,
            ring,
            store,
            _phantom: PhantomData,
        }
    }

    /// Construct a polynomial from an unordered list of terms. Terms with the same monomial
    /// are merged, zero terms are removed and the remainder is sorted under `O`. The
    /// polynomial takes over the references of the terms.
    pub fn from_terms(ring: R, store: Arc<MonomialStore>, mut terms: Vec<Term<R>>) -> Self {
        terms.sort_unstable_by_key(|t| t.monomial);

        let reader = store.read();
        let mut merged: Vec<Term<R>> = Vec::with_capacity(terms.len());
        for t in terms {
            if let Some(last) = merged.last_mut() {
                if last.monomial == t.monomial {
                    ring.add_assign(&mut last.coefficient, &t.coefficient);
                    if let Some(m) = t.monomial {
                        reader.release(m);
                    }
                    continue;
                }
            }
            merged.push(t);
        }

        merged.retain(|t| {
            if R::is_zero(&t.coefficient) {
                if let Some(m) = t.monomial {
                    reader.release(m);
                }
                false
            } else {
                true
            }
        });

        sort_terms::<R, O>(&reader, &mut merged);
        drop(reader);

        Self::from_canonical(ring, store, merged)
    }

    /// Construct the zero polynomial.
    pub fn zero(ring: R, store: Arc<MonomialStore>) -> Self {
        Self::from_canonical(ring, store, vec![])
    }

    /// Construct the constant polynomial `1`.
    pub fn one(ring: R, store: Arc<MonomialStore>) -> Self {
        let one = ring.one();
        Self::constant(ring, store, one)
    }

    /// Construct a constant polynomial.
    pub fn constant(ring: R, store: Arc<MonomialStore>, coefficient: R::Element) -> Self {
        if R::is_zero(&coefficient) {
            return Self::zero(ring, store);
        }

        Self::from_canonical(ring, store, vec![Term::constant(coefficient)])
    }

    /// Construct the polynomial `v`.
    pub fn variable(ring: R, store: Arc<MonomialStore>, v: Variable) -> Self {
        let m = store.intern_variable(v, 1);
        let one = ring.one();
        Self::from_canonical(ring, store, vec![Term::new(one, m)])
    }

    /// Construct a zero polynomial with the same ring and store.
    #[inline]
    pub fn zero_like(&self) -> Self {
        Self::zero(self.ring.clone(), self.store.clone())
    }

    #[inline]
    pub fn terms(&self) -> &[Term<R>] {
        &self.terms
    }

    #[inline]
    pub fn store(&self) -> &Arc<MonomialStore> {
        &self.store
    }

    /// The number of terms.
    #[inline]
    pub fn nterms(&self) -> usize {
        self.terms.len()
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        match self.terms.as_slice() {
            [] => true,
            [t] => t.is_constant(),
            _ => false,
        }
    }

    /// Returns `true` iff every term has a total degree of at most one.
    pub fn is_linear(&self) -> bool {
        let reader = self.store.read();
        self.terms.iter().all(|t| match t.monomial {
            Some(m) => reader.get(m).is_linear(),
            None => true,
        })
    }

    /// The total degree of the polynomial. The zero polynomial has degree 0.
    pub fn tdeg(&self) -> Exponent {
        let reader = self.store.read();
        self.terms
            .iter()
            .filter_map(|t| t.monomial.map(|m| reader.get(m).tdeg()))
            .max()
            .unwrap_or(0)
    }

    /// The highest power of `v` in the polynomial.
    pub fn degree(&self, v: Variable) -> Exponent {
        let reader = self.store.read();
        self.terms
            .iter()
            .filter_map(|t| t.monomial.map(|m| reader.get(m).exponent_of(v)))
            .max()
            .unwrap_or(0)
    }

    /// Get the leading term under `O`.
    #[inline]
    pub fn lterm(&self) -> Option<&Term<R>> {
        self.terms.first()
    }

    /// Get the leading coefficient. The zero polynomial has leading coefficient zero.
    pub fn lcoeff(&self) -> R::Element {
        match self.terms.first() {
            Some(t) => t.coefficient.clone(),
            None => self.ring.zero(),
        }
    }

    /// Get the leading monomial. `None` means the identity or the zero polynomial.
    #[inline]
    pub fn lmon(&self) -> Option<MonomialId> {
        self.terms.first().and_then(|t| t.monomial)
    }

    /// Get the constant coefficient.
    pub fn constant_part(&self) -> R::Element {
        // the identity is the least monomial
        match self.terms.last() {
            Some(t) if t.is_constant() => t.coefficient.clone(),
            _ => self.ring.zero(),
        }
    }

    /// Get all variables that occur, in ascending order.
    pub fn variables(&self) -> Vec<Variable> {
        let reader = self.store.read();
        let mut vars: Vec<Variable> = self
            .terms
            .iter()
            .filter_map(|t| t.monomial)
            .flat_map(|m| reader.get(m).exponents().iter().map(|(v, _)| *v))
            .collect();
        vars.sort_unstable();
        vars.dedup();
        vars
    }

    #[inline]
    fn check_store(&self, other: &Self) {
        assert!(
            Arc::ptr_eq(&self.store, &other.store),
            "Polynomials belong to different monomial stores"
        );
    }

    /// Merge two canonical term lists, subtracting `other` when `negate` is set.
    fn merge(&self, other: &Self, negate: bool) -> Self {
        let ring = &self.ring;
        let reader = self.store.read();
        let (a, b) = (&self.terms, &other.terms);

        let other_term = |t: &Term<R>| {
            if negate {
                Term::new(ring.neg(&t.coefficient), t.monomial)
            } else {
                t.clone()
            }
        };

        let mut terms = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match reader.compare::<O>(a[i].monomial, b[j].monomial) {
                Ordering::Greater => {
                    terms.push(a[i].clone());
                    i += 1;
                }
                Ordering::Less => {
                    terms.push(other_term(&b[j]));
                    j += 1;
                }
                Ordering::Equal => {
                    let c = if negate {
                        ring.sub(&a[i].coefficient, &b[j].coefficient)
                    } else {
                        ring.add(&a[i].coefficient, &b[j].coefficient)
                    };

                    if !R::is_zero(&c) {
                        terms.push(Term::new(c, a[i].monomial));
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        terms.extend(a[i..].iter().cloned());
        terms.extend(b[j..].iter().map(other_term));

        for m in terms.iter().filter_map(|t| t.monomial) {
            reader.retain(m);
        }
        drop(reader);

        Self::from_canonical(self.ring.clone(), self.store.clone(), terms)
    }

    /// Multiply every coefficient by `c`.
    pub fn mul_coefficient(&self, c: &R::Element) -> Self {
        if R::is_zero(c) {
            return self.zero_like();
        }

        let reader = self.store.read();
        let terms: Vec<_> = self
            .terms
            .iter()
            .filter_map(|t| {
                let c = self.ring.mul(&t.coefficient, c);
                if R::is_zero(&c) {
                    None
                } else {
                    if let Some(m) = t.monomial {
                        reader.retain(m);
                    }
                    Some(Term::new(c, t.monomial))
                }
            })
            .collect();
        drop(reader);

        Self::from_canonical(self.ring.clone(), self.store.clone(), terms)
    }

    /// Multiply by a single term. As monomial orders are compatible with multiplication,
    /// the result is still sorted.
    pub fn mul_term(&self, term: &Term<R>) -> Self {
        if R::is_zero(&term.coefficient) {
            return self.zero_like();
        }

        let mut terms = Vec::with_capacity(self.terms.len());
        for t in &self.terms {
            let c = self.ring.mul(&t.coefficient, &term.coefficient);
            if R::is_zero(&c) {
                continue;
            }
            terms.push(Term::new(c, self.store.mul(t.monomial, term.monomial)));
        }

        Self::from_canonical(self.ring.clone(), self.store.clone(), terms)
    }

    /// Multiply two polynomials, collecting the product terms in an accumulator from `pool`.
    pub fn mul_with_pool(&self, other: &Self, pool: &mut TermAccumulatorPool<R>) -> Self {
        self.check_store(other);
        assert!(
            Arc::ptr_eq(&self.store, pool.store()),
            "The accumulator pool belongs to a different monomial store"
        );

        if self.is_zero() || other.is_zero() {
            return self.zero_like();
        }
        if self.nterms() == 1 {
            return other.mul_term(&self.terms[0]);
        }
        if other.nterms() == 1 {
            return self.mul_term(&other.terms[0]);
        }

        let id = pool.checkout(self.nterms() * other.nterms());
        for a in &self.terms {
            for b in &other.terms {
                let c = self.ring.mul(&a.coefficient, &b.coefficient);
                if R::is_zero(&c) {
                    continue;
                }
                let m = self.store.mul(a.monomial, b.monomial);
                pool.add_term(id, Term::new(c, m));
            }
        }

        let terms = pool.read_sorted_terms::<O>(id);
        Self::from_canonical(self.ring.clone(), self.store.clone(), terms)
    }

    /// Raise to the power `e` using repeated squaring.
    pub fn pow_with_pool(&self, mut e: u32, pool: &mut TermAccumulatorPool<R>) -> Self {
        let mut result = Self::one(self.ring.clone(), self.store.clone());
        if e == 0 {
            return result;
        }

        let mut base = self.clone();
        loop {
            if e & 1 == 1 {
                result = result.mul_with_pool(&base, pool);
            }
            e >>= 1;
            if e == 0 {
                break;
            }
            base = base.mul_with_pool(&base, pool);
        }
        result
    }

    /// Compute the derivative with respect to `v`.
    pub fn derivative(&self, v: Variable) -> Self {
        let mut terms = vec![];
        for t in &self.terms {
            let (f, m) = self.store.derivative(t.monomial, v);
            if f == 0 {
                continue;
            }

            let c = self.ring.mul(&t.coefficient, &self.ring.nth(f as u64));
            if R::is_zero(&c) {
                if let Some(m) = m {
                    self.store.release(m);
                }
                continue;
            }
            terms.push(Term::new(c, m));
        }

        // division by v is order-preserving
        Self::from_canonical(self.ring.clone(), self.store.clone(), terms)
    }
}

impl<R: Ring, O: MonomialOrder> Clone for Polynomial<R, O> {
    fn clone(&self) -> Self {
        let reader = self.store.read();
        for m in self.terms.iter().filter_map(|t| t.monomial) {
            reader.retain(m);
        }
        drop(reader);

        Self::from_canonical(self.ring.clone(), self.store.clone(), self.terms.clone())
    }
}

impl<R: Ring, O: MonomialOrder> Drop for Polynomial<R, O> {
    fn drop(&mut self) {
        if self.terms.is_empty() {
            return;
        }

        let reader = self.store.read();
        for m in self.terms.iter().filter_map(|t| t.monomial) {
            reader.release(m);
        }
    }
}

impl<R: Ring, O: MonomialOrder> PartialEq for Polynomial<R, O> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
            && self.ring == other.ring
            && self.terms == other.terms
    }
}

impl<R: Ring, O: MonomialOrder> Eq for Polynomial<R, O> {}

impl<R: Ring, O: MonomialOrder> std::hash::Hash for Polynomial<R, O> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.terms.hash(state);
    }
}

impl<R: Ring, O: MonomialOrder> std::fmt::Debug for Polynomial<R, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_zero() {
            return write!(f, "[]");
        }
        let mut first = true;
        write!(f, "[ ")?;
        for t in &self.terms {
            if first {
                first = false;
            } else {
                write!(f, ", ")?;
            }
            match t.monomial {
                Some(m) => write!(f, "{{ {:?}, {} }}", t.coefficient, m)?,
                None => write!(f, "{{ {:?}, 1 }}", t.coefficient)?,
            }
        }
        write!(f, " ]")
    }
}

impl<R: Ring, O: MonomialOrder> Display for Polynomial<R, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }

        let reader = self.store.read();
        for (i, t) in self.terms.iter().enumerate() {
            let c = self.ring.printer(&t.coefficient).to_string();
            let (negative, abs) = match c.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, c.as_str()),
            };

            if negative {
                f.write_str("-")?;
            } else if i > 0 {
                f.write_str("+")?;
            }

            match t.monomial {
                None => f.write_str(abs)?,
                Some(m) => {
                    if abs != "1" {
                        write!(f, "{}*", abs)?;
                    }
                    write!(f, "{}", reader.get(m))?;
                }
            }
        }
        Ok(())
    }
}

impl<'a, 'b, R: Ring, O: MonomialOrder> Add<&'a Polynomial<R, O>> for &'b Polynomial<R, O> {
    type Output = Polynomial<R, O>;

    fn add(self, other: &'a Polynomial<R, O>) -> Self::Output {
        self.check_store(other);
        if self.is_zero() {
            return other.clone();
        }
        if other.is_zero() {
            return self.clone();
        }

        self.merge(other, false)
    }
}

impl<R: Ring, O: MonomialOrder> Add for Polynomial<R, O> {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        &self + &other
    }
}

impl<'a, 'b, R: Ring, O: MonomialOrder> Sub<&'a Polynomial<R, O>> for &'b Polynomial<R, O> {
    type Output = Polynomial<R, O>;

    fn sub(self, other: &'a Polynomial<R, O>) -> Self::Output {
        self.check_store(other);
        if other.is_zero() {
            return self.clone();
        }

        self.merge(other, true)
    }
}

impl<R: Ring, O: MonomialOrder> Sub for Polynomial<R, O> {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        &self - &other
    }
}

impl<'a, R: Ring, O: MonomialOrder> Neg for &'a Polynomial<R, O> {
    type Output = Polynomial<R, O>;

    fn neg(self) -> Self::Output {
        let mut res = self.clone();
        for t in &mut res.terms {
            t.coefficient = res.ring.neg(&t.coefficient);
        }
        res
    }
}

impl<R: Ring, O: MonomialOrder> Neg for Polynomial<R, O> {
    type Output = Self;

    fn neg(mut self) -> Self::Output {
        for t in &mut self.terms {
            t.coefficient = self.ring.neg(&t.coefficient);
        }
        self
    }
}

impl<'a, 'b, R: Ring, O: MonomialOrder> Mul<&'a Polynomial<R, O>> for &'b Polynomial<R, O> {
    type Output = Polynomial<R, O>;

    fn mul(self, other: &'a Polynomial<R, O>) -> Self::Output {
        let mut pool = TermAccumulatorPool::new(self.ring.clone(), self.store.clone());
        self.mul_with_pool(other, &mut pool)
    }
}

impl<R: Ring, O: MonomialOrder> Mul for Polynomial<R, O> {
    type Output = Self;

    fn mul(self, other: Self) -> Self::Output {
        &self * &other
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::domains::integer::{Integer, Z};
    use crate::domains::rational::{Rational, Q};
    use crate::poly::accumulator::TermAccumulatorPool;
    use crate::poly::store::MonomialStore;
    use crate::poly::term::Term;
    use crate::poly::{LexOrder, Variable, VariableType};
    use crate::state::VariableRegistry;

    use super::Polynomial;

    fn xy() -> (Variable, Variable) {
        (
            Variable::raw(1, VariableType::Real, 0),
            Variable::raw(2, VariableType::Real, 0),
        )
    }

    #[test]
    fn from_terms_merges_and_sorts() {
        let store = Arc::new(MonomialStore::new());
        let (x, y) = xy();

        let terms = vec![
            Term::constant(Integer::new(4)),
            Term::new(Integer::new(1), store.intern_variable(y, 2)),
            Term::new(Integer::new(2), store.intern_variable(x, 1)),
            Term::new(Integer::new(-1), store.intern_variable(y, 2)),
            Term::new(Integer::new(3), store.intern_pairs(&[(x, 1), (y, 1)])),
            Term::new(Integer::new(0), store.intern_variable(x, 5)),
        ];

        let p: Polynomial<_> = Polynomial::from_terms(Z, store.clone(), terms);
        assert_eq!(p.nterms(), 3);
        assert_eq!(p.lmon(), store.intern_pairs(&[(x, 1), (y, 1)]));
        assert_eq!(p.lcoeff(), Integer::new(3));
        assert_eq!(p.constant_part(), Integer::new(4));
        assert_eq!(p.tdeg(), 2);
        assert_eq!(p.variables(), vec![x, y]);
        assert!(!p.is_linear());
        assert!(!p.is_constant());

        let q: Polynomial<_, LexOrder> = Polynomial::from_terms(
            Z,
            store.clone(),
            vec![
                Term::new(Integer::new(1), store.intern_variable(y, 3)),
                Term::new(Integer::new(1), store.intern_variable(x, 1)),
            ],
        );
        assert_eq!(q.lmon(), store.intern_variable(x, 1));
        assert_eq!(q.degree(y), 3);
    }

    #[test]
    fn add_sub_cancel() {
        let store = Arc::new(MonomialStore::new());
        let (x, y) = xy();

        let px = Polynomial::<_>::variable(Z, store.clone(), x);
        let py = Polynomial::<_>::variable(Z, store.clone(), y);
        let one = Polynomial::<_>::one(Z, store.clone());

        let a = &(&px + &py) + &one;
        assert_eq!(a.nterms(), 3);
        assert!(a.is_linear());

        let b = &a - &py;
        assert_eq!(b, &px + &one);
        assert!((&a - &a).is_zero());
        assert_eq!(-(-a.clone()), a);
        assert_eq!(&a + &a.zero_like(), a);
    }

    #[test]
    fn mul_with_cancellation() {
        let store = Arc::new(MonomialStore::new());
        let (x, y) = xy();
        let mut pool = TermAccumulatorPool::new(Z, store.clone());

        let px = Polynomial::<_>::variable(Z, store.clone(), x);
        let py = Polynomial::<_>::variable(Z, store.clone(), y);

        let p = (&px + &py).mul_with_pool(&(&px - &py), &mut pool);
        let expected = &(&px * &px) - &(&py * &py);
        assert_eq!(p, expected);
        assert_eq!(p.nterms(), 2);

        let sq = (&px + &py).pow_with_pool(2, &mut pool);
        assert_eq!(sq.nterms(), 3);
        assert_eq!(sq.lcoeff(), Integer::new(1));
        assert_eq!(
            sq.terms()[1],
            Term::new(Integer::new(2), store.intern_pairs(&[(x, 1), (y, 1)]))
        );
    }

    #[test]
    fn pow_and_derivative() {
        let store = Arc::new(MonomialStore::new());
        let (x, _) = xy();
        let mut pool = TermAccumulatorPool::new(Q, store.clone());

        let p = &Polynomial::<_>::variable(Q, store.clone(), x)
            + &Polynomial::constant(Q, store.clone(), Rational::new(1, 2));

        let cube = p.pow_with_pool(3, &mut pool);
        let coeffs: Vec<_> = cube.terms().iter().map(|t| t.coefficient.clone()).collect();
        assert_eq!(
            coeffs,
            vec![
                Rational::new(1, 1),
                Rational::new(3, 2),
                Rational::new(3, 4),
                Rational::new(1, 8)
            ]
        );

        let d = cube.derivative(x);
        assert_eq!(d.tdeg(), 2);
        assert_eq!(d.lcoeff(), Rational::new(3, 1));
        assert_eq!(d.constant_part(), Rational::new(3, 4));
        assert!(p.pow_with_pool(0, &mut pool).is_constant());
    }

    #[test]
    fn references_are_released() {
        let store = Arc::new(MonomialStore::new());
        let (x, y) = xy();

        {
            let px = Polynomial::<_>::variable(Z, store.clone(), x);
            let py = Polynomial::<_>::variable(Z, store.clone(), y);
            let s = &px * &(&px + &py);
            let _c = s.clone();
            assert!(store.len() >= 3);
        }

        assert_eq!(store.purge(), store.largest_id());
        assert!(store.is_empty());
    }

    #[test]
    fn equality_respects_the_store() {
        let (x, y) = xy();
        let s1 = Arc::new(MonomialStore::new());
        let s2 = Arc::new(MonomialStore::new());

        // both monomials get the first id of their store
        let px = Polynomial::<_>::variable(Z, s1.clone(), x);
        let py = Polynomial::<_>::variable(Z, s2.clone(), y);
        assert_eq!(px.terms(), py.terms());
        assert_ne!(px, py);
        assert_eq!(px, Polynomial::variable(Z, s1, x));
    }

    #[test]
    #[should_panic(expected = "different monomial stores")]
    fn add_zero_from_other_store() {
        let (x, _) = xy();
        let px = Polynomial::<_>::variable(Z, Arc::new(MonomialStore::new()), x);
        let zero = Polynomial::zero(Z, Arc::new(MonomialStore::new()));
        let _ = &px + &zero;
    }

    #[test]
    #[should_panic(expected = "different monomial stores")]
    fn sub_zero_from_other_store() {
        let (x, _) = xy();
        let px = Polynomial::<_>::variable(Z, Arc::new(MonomialStore::new()), x);
        let zero = Polynomial::zero(Z, Arc::new(MonomialStore::new()));
        let _ = &px - &zero;
    }

    #[test]
    fn display() {
        let registry = VariableRegistry::global();
        let x = registry.fresh_named_variable("poly_display_x", VariableType::Real);
        let y = registry.fresh_named_variable("poly_display_y", VariableType::Real);

        let store = Arc::new(MonomialStore::new());
        let p = Polynomial::<_>::from_terms(
            Z,
            store.clone(),
            vec![
                Term::new(Integer::new(-2), store.intern_pairs(&[(x, 2), (y, 1)])),
                Term::new(Integer::new(1), store.intern_variable(y, 1)),
                Term::constant(Integer::new(-7)),
            ],
        );

        assert_eq!(
            p.to_string(),
            "-2*poly_display_x^2*poly_display_y+poly_display_y-7"
        );
        assert_eq!(p.zero_like().to_string(), "0");
    }
}
