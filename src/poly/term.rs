use crate::domains::Ring;

use super::store::{MonomialId, MonomialStore};
use super::{Exponent, Variable};

/// A coefficient times an interned monomial. A term without a monomial is a constant.
///
/// A term is a plain value: copying it does not add a reference to its monomial.
/// Operations that consume a term pass its reference on to the result.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Term<R: Ring> {
    pub coefficient: R::Element,
    pub monomial: Option<MonomialId>,
}

impl<R: Ring> Term<R> {
    pub fn new(coefficient: R::Element, monomial: Option<MonomialId>) -> Term<R> {
        Term {
            coefficient,
            monomial,
        }
    }

    pub fn constant(coefficient: R::Element) -> Term<R> {
        Term {
            coefficient,
            monomial: None,
        }
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.monomial.is_none()
    }

    pub fn tdeg(&self, store: &MonomialStore) -> Exponent {
        self.monomial.map(|m| store.tdeg(m)).unwrap_or(0)
    }

    pub fn is_linear(&self, store: &MonomialStore) -> bool {
        self.monomial.map(|m| store.is_linear(m)).unwrap_or(false)
    }

    pub fn num_variables(&self, store: &MonomialStore) -> usize {
        self.monomial.map(|m| store.num_variables(m)).unwrap_or(0)
    }

    pub fn has(&self, store: &MonomialStore, v: Variable) -> bool {
        self.monomial.map(|m| store.has(m, v)).unwrap_or(false)
    }

    /// Negate the coefficient.
    pub fn neg(self, ring: &R) -> Term<R> {
        Term {
            coefficient: ring.neg(&self.coefficient),
            monomial: self.monomial,
        }
    }

    /// Multiply the coefficient by `c`.
    pub fn mul_coefficient(self, ring: &R, c: &R::Element) -> Term<R> {
        Term {
            coefficient: ring.mul(&self.coefficient, c),
            monomial: self.monomial,
        }
    }

    /// Multiply two terms. The product monomial is interned and carries a fresh reference.
    pub fn mul_term(&self, other: &Term<R>, ring: &R, store: &MonomialStore) -> Term<R> {
        Term {
            coefficient: ring.mul(&self.coefficient, &other.coefficient),
            monomial: store.mul(self.monomial, other.monomial),
        }
    }
}
