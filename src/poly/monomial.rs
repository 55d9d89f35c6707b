use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::{Hash, Hasher};

use ahash::AHasher;
use smallvec::SmallVec;

use super::{Exponent, Variable, INLINED_EXPONENTS};

/// The canonical variable-exponent list of a monomial.
pub type MonomialContent = SmallVec<[(Variable, Exponent); INLINED_EXPONENTS]>;

#[inline(always)]
fn add_exponents(a: Exponent, b: Exponent) -> Exponent {
    match a.checked_add(b) {
        Some(e) => e,
        None => panic!("Exponent overflow: {} + {}", a, b),
    }
}

/// A monomial in canonical form: a list of variable-exponent pairs that is strictly
/// ascending in the variable, with only positive exponents. The total degree and a
/// structural hash are cached.
///
/// Most algorithms in this module walk the variable lists linearly, as monomials are
/// expected to be small. For small lists a linear scan is faster than a binary search,
/// even though its worst-case complexity is worse.
#[derive(Clone, Debug)]
pub struct Monomial {
    exponents: MonomialContent,
    tdeg: Exponent,
    hash: u64,
}

impl PartialEq for Monomial {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.tdeg == other.tdeg && self.exponents == other.exponents
    }
}

impl Eq for Monomial {}

impl Hash for Monomial {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl Display for Monomial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.exponents.is_empty() {
            return f.write_str("1");
        }

        for (i, (v, e)) in self.exponents.iter().enumerate() {
            if i > 0 {
                f.write_str("*")?;
            }
            if *e == 1 {
                write!(f, "{}", v)?;
            } else {
                write!(f, "{}^{}", v, e)?;
            }
        }
        Ok(())
    }
}

impl Default for Monomial {
    fn default() -> Self {
        Monomial::one()
    }
}

impl Monomial {
    /// The multiplicative identity.
    pub fn one() -> Monomial {
        Monomial::from_sorted(SmallVec::new())
    }

    /// Create the monomial `v^e`.
    pub fn new(v: Variable, e: Exponent) -> Monomial {
        if e == 0 {
            return Monomial::one();
        }
        assert!(v.is_valid(), "Cannot use NO_VARIABLE in a monomial");

        let mut exponents = SmallVec::new();
        exponents.push((v, e));
        Monomial::from_sorted(exponents)
    }

    /// Create a monomial from an unordered list of variable-exponent pairs.
    /// Duplicate variables are merged additively and zero exponents are dropped.
    pub fn from_unsorted<I: IntoIterator<Item = (Variable, Exponent)>>(pairs: I) -> Monomial {
        let mut exponents: MonomialContent = SmallVec::new();

        'next: for (v, e) in pairs {
            if e == 0 {
                continue;
            }
            assert!(v.is_valid(), "Cannot use NO_VARIABLE in a monomial");

            for (i, (vv, ee)) in exponents.iter_mut().enumerate() {
                match (*vv).cmp(&v) {
                    Ordering::Equal => {
                        *ee = add_exponents(*ee, e);
                        continue 'next;
                    }
                    Ordering::Greater => {
                        exponents.insert(i, (v, e));
                        continue 'next;
                    }
                    Ordering::Less => {}
                }
            }

            exponents.push((v, e));
        }

        Monomial::from_sorted(exponents)
    }

    /// Create a monomial from a list that is already in canonical form.
    pub fn from_sorted(exponents: MonomialContent) -> Monomial {
        let mut tdeg: Exponent = 0;
        for (_, e) in &exponents {
            tdeg = add_exponents(tdeg, *e);
        }

        let mut hasher = AHasher::default();
        exponents.len().hash(&mut hasher);
        for (v, e) in &exponents {
            v.hash(&mut hasher);
            e.hash(&mut hasher);
        }
        tdeg.hash(&mut hasher);

        let m = Monomial {
            exponents,
            tdeg,
            hash: hasher.finish(),
        };

        debug_assert!(m.is_consistent(), "Monomial is not canonical: {:?}", m.exponents);
        m
    }

    /// Check the canonical-form invariants.
    pub fn is_consistent(&self) -> bool {
        let mut tdeg: u64 = 0;
        for (i, (v, e)) in self.exponents.iter().enumerate() {
            if *e == 0 || !v.is_valid() {
                return false;
            }
            if i > 0 && self.exponents[i - 1].0 >= *v {
                return false;
            }
            tdeg += *e as u64;
        }
        tdeg == self.tdeg as u64
    }

    #[inline]
    pub fn exponents(&self) -> &[(Variable, Exponent)] {
        &self.exponents
    }

    /// The total degree, i.e. the sum of all exponents.
    #[inline]
    pub fn tdeg(&self) -> Exponent {
        self.tdeg
    }

    /// The structural hash.
    #[inline]
    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.tdeg == 0
    }

    #[inline]
    pub fn is_linear(&self) -> bool {
        self.tdeg == 1
    }

    #[inline]
    pub fn is_at_most_linear(&self) -> bool {
        self.tdeg <= 1
    }

    #[inline]
    pub fn num_variables(&self) -> usize {
        self.exponents.len()
    }

    /// Returns `true` iff every exponent is even.
    pub fn is_square(&self) -> bool {
        self.exponents.iter().all(|(_, e)| e % 2 == 0)
    }

    /// Get the variable if this monomial contains exactly one variable.
    pub fn single_variable(&self) -> Option<Variable> {
        if self.exponents.len() == 1 {
            Some(self.exponents[0].0)
        } else {
            None
        }
    }

    pub fn exponent_of(&self, v: Variable) -> Exponent {
        for (vv, e) in &self.exponents {
            if *vv == v {
                return *e;
            }
            if *vv > v {
                break;
            }
        }
        0
    }

    #[inline]
    pub fn has(&self, v: Variable) -> bool {
        self.exponent_of(v) > 0
    }

    /// Returns `true` iff no variable other than `v` occurs.
    pub fn has_no_other_variable(&self, v: Variable) -> bool {
        match self.exponents.len() {
            0 => true,
            1 => self.exponents[0].0 == v,
            _ => false,
        }
    }

    /// Multiply two monomials by merging their ascending variable lists.
    pub fn mul(&self, other: &Monomial) -> Monomial {
        if other.is_constant() {
            return self.clone();
        }
        if self.is_constant() {
            return other.clone();
        }

        let mut res: MonomialContent = SmallVec::with_capacity(self.len_hint(other));
        let (mut i, mut j) = (0, 0);
        let (a, b) = (&self.exponents, &other.exponents);
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                Ordering::Equal => {
                    res.push((a[i].0, add_exponents(a[i].1, b[j].1)));
                    i += 1;
                    j += 1;
                }
                Ordering::Less => {
                    res.push(a[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    res.push(b[j]);
                    j += 1;
                }
            }
        }
        res.extend_from_slice(&a[i..]);
        res.extend_from_slice(&b[j..]);

        Monomial::from_sorted(res)
    }

    /// Multiply by `v^e`.
    pub fn mul_variable(&self, v: Variable, e: Exponent) -> Monomial {
        if e == 0 {
            return self.clone();
        }
        assert!(v.is_valid(), "Cannot use NO_VARIABLE in a monomial");

        let mut res: MonomialContent = SmallVec::with_capacity(self.exponents.len() + 1);
        let mut inserted = false;
        for &(vv, ee) in &self.exponents {
            if !inserted {
                match vv.cmp(&v) {
                    Ordering::Equal => {
                        res.push((vv, add_exponents(ee, e)));
                        inserted = true;
                        continue;
                    }
                    Ordering::Greater => {
                        res.push((v, e));
                        inserted = true;
                    }
                    Ordering::Less => {}
                }
            }
            res.push((vv, ee));
        }
        if !inserted {
            res.push((v, e));
        }

        Monomial::from_sorted(res)
    }

    fn len_hint(&self, other: &Monomial) -> usize {
        self.exponents.len() + other.exponents.len()
    }

    /// Divide by `other`, if `other` divides this monomial.
    pub fn divide(&self, other: &Monomial) -> Option<Monomial> {
        if other.tdeg > self.tdeg || other.exponents.len() > self.exponents.len() {
            return None;
        }

        let mut res: MonomialContent = SmallVec::with_capacity(self.exponents.len());
        let mut j = 0;
        let b = &other.exponents;
        for &(v, e) in &self.exponents {
            if j < b.len() && b[j].0 == v {
                if e < b[j].1 {
                    return None;
                }
                if e > b[j].1 {
                    res.push((v, e - b[j].1));
                }
                j += 1;
            } else if j < b.len() && b[j].0 < v {
                // the divisor has a variable that does not occur here
                return None;
            } else {
                res.push((v, e));
            }
        }

        if j < b.len() {
            return None;
        }

        Some(Monomial::from_sorted(res))
    }

    /// Divide by the variable `v`, if it occurs.
    pub fn divide_variable(&self, v: Variable) -> Option<Monomial> {
        let pos = self.exponents.iter().position(|(vv, _)| *vv == v)?;

        let mut res = self.exponents.clone();
        if res[pos].1 == 1 {
            res.remove(pos);
        } else {
            res[pos].1 -= 1;
        }
        Some(Monomial::from_sorted(res))
    }

    /// Compute the least common multiple.
    pub fn lcm(&self, other: &Monomial) -> Monomial {
        if other.is_constant() {
            return self.clone();
        }
        if self.is_constant() {
            return other.clone();
        }

        let mut res: MonomialContent = SmallVec::with_capacity(self.len_hint(other));
        let (mut i, mut j) = (0, 0);
        let (a, b) = (&self.exponents, &other.exponents);
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                Ordering::Equal => {
                    res.push((a[i].0, a[i].1.max(b[j].1)));
                    i += 1;
                    j += 1;
                }
                Ordering::Less => {
                    res.push(a[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    res.push(b[j]);
                    j += 1;
                }
            }
        }
        res.extend_from_slice(&a[i..]);
        res.extend_from_slice(&b[j..]);

        Monomial::from_sorted(res)
    }

    /// Compute the greatest common divisor.
    pub fn gcd(&self, other: &Monomial) -> Monomial {
        let mut res: MonomialContent = SmallVec::new();
        let (mut i, mut j) = (0, 0);
        let (a, b) = (&self.exponents, &other.exponents);
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                Ordering::Equal => {
                    res.push((a[i].0, a[i].1.min(b[j].1)));
                    i += 1;
                    j += 1;
                }
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
            }
        }

        Monomial::from_sorted(res)
    }

    /// Raise to the power `e`. The zeroth power is the identity.
    pub fn pow(&self, e: Exponent) -> Monomial {
        if e == 0 {
            return Monomial::one();
        }

        let res = self
            .exponents
            .iter()
            .map(|&(v, ee)| match ee.checked_mul(e) {
                Some(x) => (v, x),
                None => panic!("Exponent overflow: {} * {}", ee, e),
            })
            .collect();
        Monomial::from_sorted(res)
    }

    /// Compute the square root, if all exponents are even.
    pub fn sqrt(&self) -> Option<Monomial> {
        if !self.is_square() {
            return None;
        }

        Some(Monomial::from_sorted(
            self.exponents.iter().map(|&(v, e)| (v, e / 2)).collect(),
        ))
    }

    /// Set all exponents to one.
    pub fn separable_part(&self) -> Monomial {
        Monomial::from_sorted(self.exponents.iter().map(|&(v, _)| (v, 1)).collect())
    }

    /// Remove the variable `v`.
    pub fn drop_variable(&self, v: Variable) -> Monomial {
        if !self.has(v) {
            return self.clone();
        }

        Monomial::from_sorted(
            self.exponents
                .iter()
                .filter(|(vv, _)| *vv != v)
                .cloned()
                .collect(),
        )
    }

    /// Compute the derivative with respect to `v`, as a factor and a monomial.
    /// Returns `None` if `v` does not occur.
    pub fn derivative(&self, v: Variable) -> Option<(Exponent, Monomial)> {
        let e = self.exponent_of(v);
        if e == 0 {
            return None;
        }

        Some((e, self.divide_variable(v)?))
    }

    /// Compare two monomials lexicographically. The first position where the variable
    /// lists differ decides: for the same variable the larger exponent is greater, for
    /// different variables the list with the smaller variable is greater. If one list is
    /// a prefix of the other, the shorter one is smaller.
    pub fn compare_lexical(a: &Monomial, b: &Monomial) -> Ordering {
        for (x, y) in a.exponents.iter().zip(&b.exponents) {
            if x.0 != y.0 {
                return y.0.cmp(&x.0);
            }
            match x.1.cmp(&y.1) {
                Ordering::Equal => {}
                o => return o,
            }
        }

        a.exponents.len().cmp(&b.exponents.len())
    }

    /// Compare the total degree first, and break ties lexicographically.
    pub fn compare_graded_lexical(a: &Monomial, b: &Monomial) -> Ordering {
        match a.tdeg.cmp(&b.tdeg) {
            Ordering::Equal => Monomial::compare_lexical(a, b),
            o => o,
        }
    }

    /// Compare lexicographically with the monomial `v^1`, without constructing it.
    pub fn compare_lexical_variable(a: &Monomial, v: Variable) -> Ordering {
        let Some(&(first, e)) = a.exponents.first() else {
            return Ordering::Less;
        };

        if first != v {
            return v.cmp(&first);
        }

        if e > 1 || a.exponents.len() > 1 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    /// Compare with the monomial `v^1` in graded lexicographic order, without constructing it.
    pub fn compare_graded_lexical_variable(a: &Monomial, v: Variable) -> Ordering {
        match a.tdeg.cmp(&1) {
            Ordering::Equal => v.cmp(&a.exponents[0].0),
            o => o,
        }
    }
}
