use std::fmt::{Display, Error, Formatter};

use rug::{ops::Pow, Integer as ArbitraryPrecisionInteger};

use super::Ring;

/// The integer ring.
pub type Z = IntegerRing;
/// The integer ring.
pub const Z: IntegerRing = IntegerRing::new();

/// The integer ring.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct IntegerRing;

impl IntegerRing {
    pub const fn new() -> IntegerRing {
        IntegerRing
    }
}

impl Display for IntegerRing {
    fn fmt(&self, _: &mut Formatter<'_>) -> std::fmt::Result {
        Ok(())
    }
}

/// An integer that uses a machine word as long as possible and spills over
/// into an arbitrary-precision integer otherwise.
///
/// A `Large` integer never holds a value that fits in an `i64`, so that
/// equality and hashing are structural.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Integer {
    Natural(i64),
    Large(ArbitraryPrecisionInteger),
}

impl From<i64> for Integer {
    #[inline]
    fn from(value: i64) -> Self {
        Integer::Natural(value)
    }
}

impl From<i32> for Integer {
    #[inline]
    fn from(value: i32) -> Self {
        Integer::Natural(value as i64)
    }
}

impl From<u32> for Integer {
    #[inline]
    fn from(value: u32) -> Self {
        Integer::Natural(value as i64)
    }
}

impl From<ArbitraryPrecisionInteger> for Integer {
    #[inline]
    fn from(value: ArbitraryPrecisionInteger) -> Self {
        Integer::from_large(value)
    }
}

impl Display for Integer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Integer::Natural(n) => n.fmt(f),
            Integer::Large(r) => r.fmt(f),
        }
    }
}

impl Integer {
    pub fn new(num: i64) -> Integer {
        Integer::Natural(num)
    }

    /// Downcast an arbitrary-precision integer when it fits in a machine word.
    pub fn from_large(n: ArbitraryPrecisionInteger) -> Integer {
        match n.to_i64() {
            Some(x) => Integer::Natural(x),
            None => Integer::Large(n),
        }
    }

    pub fn to_large(&self) -> ArbitraryPrecisionInteger {
        match self {
            Integer::Natural(n) => ArbitraryPrecisionInteger::from(*n),
            Integer::Large(r) => r.clone(),
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Integer::Natural(0))
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Integer::Natural(1))
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Integer::Natural(n) => *n < 0,
            Integer::Large(r) => *r < 0,
        }
    }

    pub fn add(&self, other: &Integer) -> Integer {
        match (self, other) {
            (Integer::Natural(n1), Integer::Natural(n2)) => match n1.checked_add(*n2) {
                Some(n) => Integer::Natural(n),
                None => Integer::Large(ArbitraryPrecisionInteger::from(*n1) + *n2),
            },
            (Integer::Natural(n1), Integer::Large(r2))
            | (Integer::Large(r2), Integer::Natural(n1)) => {
                Integer::from_large(ArbitraryPrecisionInteger::from(r2 + *n1))
            }
            (Integer::Large(r1), Integer::Large(r2)) => {
                Integer::from_large(ArbitraryPrecisionInteger::from(r1 + r2))
            }
        }
    }

    pub fn sub(&self, other: &Integer) -> Integer {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Integer) -> Integer {
        match (self, other) {
            (Integer::Natural(n1), Integer::Natural(n2)) => match n1.checked_mul(*n2) {
                Some(n) => Integer::Natural(n),
                None => Integer::Large(ArbitraryPrecisionInteger::from(*n1) * *n2),
            },
            (Integer::Natural(n1), Integer::Large(r2))
            | (Integer::Large(r2), Integer::Natural(n1)) => {
                Integer::from_large(ArbitraryPrecisionInteger::from(r2 * *n1))
            }
            (Integer::Large(r1), Integer::Large(r2)) => {
                Integer::from_large(ArbitraryPrecisionInteger::from(r1 * r2))
            }
        }
    }

    pub fn neg(&self) -> Integer {
        match self {
            Integer::Natural(n) => match n.checked_neg() {
                Some(neg) => Integer::Natural(neg),
                None => Integer::Large(-ArbitraryPrecisionInteger::from(*n)),
            },
            Integer::Large(r) => Integer::from_large(ArbitraryPrecisionInteger::from(-r)),
        }
    }

    pub fn pow(&self, e: u64) -> Integer {
        if e > u32::MAX as u64 {
            panic!("Power of exponentiation is larger than 2^32: {}", e);
        }

        if let Integer::Natural(n) = self {
            if let Some(p) = n.checked_pow(e as u32) {
                return Integer::Natural(p);
            }
        }

        Integer::from_large(self.to_large().pow(e as u32))
    }
}

impl Ring for IntegerRing {
    type Element = Integer;

    #[inline]
    fn add(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        a.add(b)
    }

    #[inline]
    fn sub(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        a.sub(b)
    }

    #[inline]
    fn mul(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        a.mul(b)
    }

    #[inline]
    fn add_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a = a.add(b);
    }

    #[inline]
    fn sub_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a = a.sub(b);
    }

    #[inline]
    fn mul_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a = a.mul(b);
    }

    #[inline]
    fn neg(&self, a: &Self::Element) -> Self::Element {
        a.neg()
    }

    #[inline]
    fn zero(&self) -> Self::Element {
        Integer::Natural(0)
    }

    #[inline]
    fn one(&self) -> Self::Element {
        Integer::Natural(1)
    }

    fn nth(&self, n: u64) -> Self::Element {
        if n <= i64::MAX as u64 {
            Integer::Natural(n as i64)
        } else {
            Integer::Large(ArbitraryPrecisionInteger::from(n))
        }
    }

    #[inline]
    fn pow(&self, b: &Self::Element, e: u64) -> Self::Element {
        b.pow(e)
    }

    #[inline]
    fn is_zero(a: &Self::Element) -> bool {
        a.is_zero()
    }

    #[inline]
    fn is_one(&self, a: &Self::Element) -> bool {
        a.is_one()
    }

    fn fmt_display(&self, element: &Self::Element, f: &mut Formatter<'_>) -> Result<(), Error> {
        element.fmt(f)
    }
}
