//! Variables, canonical monomials, terms and polynomials.
//!
//! A [Variable] is a small, bit-packed handle allocated by the
//! [VariableRegistry](crate::state::VariableRegistry). Monomials over these variables
//! are canonicalized and hash-consed by a [MonomialStore](store::MonomialStore), which hands
//! out dense [MonomialId](store::MonomialId)s. Two interned monomials are structurally equal
//! if and only if their ids are equal, so that all code above this layer can compare
//! monomials in constant time.
pub mod accumulator;
pub mod monomial;
pub mod polynomial;
pub mod store;
pub mod term;

use std::cmp::Ordering;
use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::state::VariableRegistry;

use self::monomial::Monomial;

/// The exponent type of a variable in a monomial.
pub type Exponent = u32;

/// The number of variable-exponent pairs a monomial stores inline.
pub const INLINED_EXPONENTS: usize = 6;

/// The type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum VariableType {
    Bool = 0,
    Real = 1,
    Int = 2,
    Uninterpreted = 3,
    Bitvector = 4,
}

impl VariableType {
    pub const COUNT: usize = 5;
    pub const ALL: [VariableType; VariableType::COUNT] = [
        VariableType::Bool,
        VariableType::Real,
        VariableType::Int,
        VariableType::Uninterpreted,
        VariableType::Bitvector,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    const fn from_bits(bits: u64) -> VariableType {
        match bits {
            0 => VariableType::Bool,
            1 => VariableType::Real,
            2 => VariableType::Int,
            3 => VariableType::Uninterpreted,
            4 => VariableType::Bitvector,
            _ => panic!("Invalid variable type bits"),
        }
    }
}

impl Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableType::Bool => write!(f, "Bool"),
            VariableType::Real => write!(f, "Real"),
            VariableType::Int => write!(f, "Int"),
            VariableType::Uninterpreted => write!(f, "Uninterpreted"),
            VariableType::Bitvector => write!(f, "Bitvector"),
        }
    }
}

impl FromStr for VariableType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Bool" => Ok(VariableType::Bool),
            "Real" => Ok(VariableType::Real),
            "Int" => Ok(VariableType::Int),
            "Uninterpreted" => Ok(VariableType::Uninterpreted),
            "Bitvector" => Ok(VariableType::Bitvector),
            _ => Err(format!("Unknown variable type '{}'", s)),
        }
    }
}

/// An algebraic variable.
///
/// A variable is a single `u64` that packs `[rank | id | type]`. The id is unique
/// among all variables of a registry, so two variables are equal iff their ids are.
/// The rank is zero by default and can be set to impose a custom variable order, as
/// variables are ordered by `(rank, id)`. A variable should never occur with two
/// different ranks in the same context.
///
/// The variable with id zero is [Variable::NO_VARIABLE], which can be used as a
/// placeholder.
#[derive(Clone, Copy)]
pub struct Variable {
    content: u64,
}

impl Variable {
    /// The number of bits reserved for the type.
    pub const TYPE_BITS: u32 = 3;
    /// The number of bits reserved for the rank.
    pub const RANK_BITS: u32 = 4;
    /// The number of bits available for the id.
    pub const ID_BITS: u32 = u64::BITS - Self::TYPE_BITS - Self::RANK_BITS;
    /// The largest id a variable can have.
    pub const MAX_ID: u64 = (1 << Self::ID_BITS) - 1;
    /// The largest rank a variable can have.
    pub const MAX_RANK: u64 = (1 << Self::RANK_BITS) - 1;

    pub const NO_VARIABLE: Variable = Variable { content: 0 };

    /// Expert use: create a variable from its raw parts. This constructor should be used
    /// with care, as it bypasses the registry. Use
    /// [VariableRegistry::fresh_variable](crate::state::VariableRegistry::fresh_variable) instead.
    pub const fn raw(id: u64, var_type: VariableType, rank: u64) -> Variable {
        if id == 0 || id > Self::MAX_ID {
            panic!("Variable id out of range");
        }
        if rank > Self::MAX_RANK {
            panic!("Variable rank out of range");
        }

        Variable {
            content: (rank << (Self::ID_BITS + Self::TYPE_BITS))
                | (id << Self::TYPE_BITS)
                | var_type as u64,
        }
    }

    #[inline]
    pub const fn id(&self) -> u64 {
        (self.content >> Self::TYPE_BITS) & Self::MAX_ID
    }

    #[inline]
    pub const fn var_type(&self) -> VariableType {
        VariableType::from_bits(self.content & ((1 << Self::TYPE_BITS) - 1))
    }

    #[inline]
    pub const fn rank(&self) -> u64 {
        self.content >> (Self::ID_BITS + Self::TYPE_BITS)
    }

    /// Returns `true` iff this is not [Variable::NO_VARIABLE].
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.content != 0
    }

    /// Get a copy of this variable with a different rank.
    pub fn with_rank(&self, rank: u64) -> Variable {
        assert!(self.is_valid(), "Cannot rank an invalid variable");
        Variable::raw(self.id(), self.var_type(), rank)
    }

    /// Get the name of this variable from the global registry.
    pub fn name(&self) -> smartstring::alias::String {
        VariableRegistry::global().name(*self)
    }
}

impl PartialEq for Variable {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl PartialOrd for Variable {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variable {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        if self.id() == other.id() {
            Ordering::Equal
        } else {
            // the type bits are below the id bits, so this compares (rank, id)
            self.content.cmp(&other.content)
        }
    }
}

impl Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.is_valid() {
            return f.write_str("NO_VARIABLE");
        }

        f.write_fmt(format_args!("x_{}:{}", self.id(), self.var_type()))?;
        if self.rank() > 0 {
            f.write_fmt(format_args!("@{}", self.rank()))?;
        }
        Ok(())
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

/// A well-order of monomials, used to keep the terms of a polynomial sorted.
pub trait MonomialOrder: Clone + Debug + Default {
    fn cmp(a: &Monomial, b: &Monomial) -> Ordering;

    /// Compare a monomial with the monomial `v^1` without constructing the latter.
    fn cmp_variable(a: &Monomial, v: Variable) -> Ordering;
}

/// Lexicographic ordering of monomials. Variables that are defined earlier are larger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LexOrder;

impl MonomialOrder for LexOrder {
    #[inline]
    fn cmp(a: &Monomial, b: &Monomial) -> Ordering {
        Monomial::compare_lexical(a, b)
    }

    #[inline]
    fn cmp_variable(a: &Monomial, v: Variable) -> Ordering {
        Monomial::compare_lexical_variable(a, v)
    }
}

/// Graded lexicographic ordering of monomials: the total degree decides first,
/// ties are broken lexicographically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GradedLexOrder;

impl MonomialOrder for GradedLexOrder {
    #[inline]
    fn cmp(a: &Monomial, b: &Monomial) -> Ordering {
        Monomial::compare_graded_lexical(a, b)
    }

    #[inline]
    fn cmp_variable(a: &Monomial, v: Variable) -> Ordering {
        Monomial::compare_graded_lexical_variable(a, v)
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::{Variable, VariableType};

    #[test]
    fn packing() {
        let v = Variable::raw(12345, VariableType::Int, 3);
        assert_eq!(v.id(), 12345);
        assert_eq!(v.var_type(), VariableType::Int);
        assert_eq!(v.rank(), 3);

        let w = v.with_rank(0);
        assert_eq!(v, w);
        assert_eq!(w.rank(), 0);

        let max = Variable::raw(Variable::MAX_ID, VariableType::Bitvector, Variable::MAX_RANK);
        assert_eq!(max.id(), Variable::MAX_ID);
        assert_eq!(max.var_type(), VariableType::Bitvector);
        assert_eq!(max.rank(), Variable::MAX_RANK);
    }

    #[test]
    fn order_by_rank_then_id() {
        let a = Variable::raw(1, VariableType::Real, 0);
        let b = Variable::raw(2, VariableType::Bool, 0);
        let c = Variable::raw(3, VariableType::Real, 0).with_rank(1);

        assert!(a < b);
        assert!(b < c);
        assert!(Variable::raw(5, VariableType::Real, 0) < c);
    }

    #[test]
    #[should_panic]
    fn id_overflow() {
        Variable::raw(Variable::MAX_ID + 1, VariableType::Real, 0);
    }

    #[test]
    fn type_names() {
        for t in VariableType::ALL {
            assert_eq!(VariableType::from_str(&t.to_string()), Ok(t));
        }
        assert!(VariableType::from_str("Complex").is_err());
    }
}
