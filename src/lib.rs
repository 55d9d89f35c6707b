//! Canonica is the canonicalization and interning core of a computer algebra system.
//!
//! It turns variables, monomials and terms into structurally unique handles that can be
//! compared in constant time:
//!
//! - a [VariableRegistry](state::VariableRegistry) allocates [Variable](poly::Variable)s
//!   with globally unique ids and keeps track of their names;
//! - a [MonomialStore](poly::store::MonomialStore) hash-conses monomials over these
//!   variables and hands out dense [MonomialId](poly::store::MonomialId)s;
//! - [Polynomial](poly::polynomial::Polynomial)s are sorted collections of
//!   [Term](poly::term::Term)s, constructed in linear time with a
//!   [TermAccumulatorPool](poly::accumulator::TermAccumulatorPool);
//! - a [Cache](cache::Cache) deduplicates arbitrary derived objects and evicts the
//!   least active ones that are no longer in use.
//!
//! For example:
//!
//! ```
//! use std::sync::Arc;
//!
//! use canonica::domains::integer::{Integer, Z};
//! use canonica::poly::{polynomial::Polynomial, store::MonomialStore, VariableType};
//! use canonica::state::VariableRegistry;
//!
//! let registry = VariableRegistry::new();
//! let x = registry.fresh_variable(VariableType::Real);
//! let y = registry.fresh_variable(VariableType::Real);
//!
//! let store = Arc::new(MonomialStore::new());
//! let a = store.intern_pairs(&[(y, 1), (x, 2)]);
//! let b = store.intern_pairs(&[(x, 1), (y, 1), (x, 1)]);
//! assert_eq!(a, b);
//!
//! let px = Polynomial::<_>::variable(Z, store.clone(), x);
//! let py = Polynomial::<_>::variable(Z, store.clone(), y);
//! let p = &(&px + &py) * &(&px - &py);
//! assert_eq!(p.nterms(), 2);
//! assert_eq!(p.lcoeff(), Integer::new(1));
//! ```

pub mod cache;
pub mod domains;
pub mod poly;
pub mod state;
pub mod utils;
