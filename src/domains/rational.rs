use std::fmt::{Display, Error, Formatter};

use rug::{Integer as ArbitraryPrecisionInteger, Rational as ArbitraryPrecisionRational};

use crate::utils;

use super::{integer::Integer, Ring};

/// The field of rational numbers.
pub type Q = RationalField;
/// The field of rational numbers.
pub const Q: RationalField = RationalField::new();

/// The field of rational numbers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct RationalField;

impl RationalField {
    pub const fn new() -> RationalField {
        RationalField
    }
}

impl Display for RationalField {
    fn fmt(&self, _: &mut Formatter<'_>) -> std::fmt::Result {
        Ok(())
    }
}

/// A rational number. A `Natural` rational is always reduced and has a positive
/// denominator. A `Large` rational never holds a value whose numerator and denominator
/// both fit in an `i64`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Rational {
    Natural(i64, i64),
    Large(ArbitraryPrecisionRational),
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Rational::Natural(value, 1)
    }
}

impl From<i32> for Rational {
    fn from(value: i32) -> Self {
        Rational::Natural(value as i64, 1)
    }
}

impl From<(i64, i64)> for Rational {
    fn from((num, den): (i64, i64)) -> Self {
        Rational::new(num, den)
    }
}

impl From<&Integer> for Rational {
    fn from(value: &Integer) -> Self {
        match value {
            Integer::Natural(n) => Rational::Natural(*n, 1),
            Integer::Large(r) => Rational::from_large(ArbitraryPrecisionRational::from(r)),
        }
    }
}

impl Display for Rational {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rational::Natural(n, d) => {
                if *d == 1 {
                    f.write_fmt(format_args!("{}", n))
                } else {
                    f.write_fmt(format_args!("{}/{}", n, d))
                }
            }
            Rational::Large(r) => r.fmt(f),
        }
    }
}

impl Rational {
    /// Create a new reduced rational number.
    pub fn new(num: i64, den: i64) -> Rational {
        if den == 0 {
            panic!("Division by zero in rational {}/{}", num, den);
        }

        Rational::from_i128(num as i128, den as i128)
    }

    fn from_i128(mut num: i128, mut den: i128) -> Rational {
        if den < 0 {
            num = -num;
            den = -den;
        }

        let g = utils::gcd_signed_i128(num, den) as i128;
        if g > 1 {
            num /= g;
            den /= g;
        }

        match (i64::try_from(num), i64::try_from(den)) {
            (Ok(n), Ok(d)) => Rational::Natural(n, d),
            _ => Rational::Large(ArbitraryPrecisionRational::from((
                ArbitraryPrecisionInteger::from(num),
                ArbitraryPrecisionInteger::from(den),
            ))),
        }
    }

    /// Downcast an arbitrary-precision rational when it fits in machine words.
    pub fn from_large(r: ArbitraryPrecisionRational) -> Rational {
        match (r.numer().to_i64(), r.denom().to_i64()) {
            (Some(n), Some(d)) => Rational::Natural(n, d),
            _ => Rational::Large(r),
        }
    }

    pub fn to_large(&self) -> ArbitraryPrecisionRational {
        match self {
            Rational::Natural(n, d) => ArbitraryPrecisionRational::from((*n, *d)),
            Rational::Large(r) => r.clone(),
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Rational::Natural(0, _))
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Rational::Natural(1, 1))
    }

    pub fn is_integer(&self) -> bool {
        match self {
            Rational::Natural(_, d) => *d == 1,
            Rational::Large(r) => *r.denom() == 1,
        }
    }

    pub fn add(&self, other: &Rational) -> Rational {
        match (self, other) {
            (Rational::Natural(n1, d1), Rational::Natural(n2, d2)) => {
                // |n_i|, |d_i| < 2^63, so the cross products fit in an i128
                let num = *n1 as i128 * *d2 as i128 + *n2 as i128 * *d1 as i128;
                let den = *d1 as i128 * *d2 as i128;
                Rational::from_i128(num, den)
            }
            _ => Rational::from_large(ArbitraryPrecisionRational::from(
                &self.to_large() + &other.to_large(),
            )),
        }
    }

    pub fn sub(&self, other: &Rational) -> Rational {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Rational) -> Rational {
        match (self, other) {
            (Rational::Natural(n1, d1), Rational::Natural(n2, d2)) => {
                Rational::from_i128(*n1 as i128 * *n2 as i128, *d1 as i128 * *d2 as i128)
            }
            _ => Rational::from_large(ArbitraryPrecisionRational::from(
                &self.to_large() * &other.to_large(),
            )),
        }
    }

    pub fn neg(&self) -> Rational {
        match self {
            Rational::Natural(n, d) => match n.checked_neg() {
                Some(neg) => Rational::Natural(neg, *d),
                None => Rational::Large(-ArbitraryPrecisionRational::from((*n, *d))),
            },
            Rational::Large(r) => Rational::from_large(ArbitraryPrecisionRational::from(-r)),
        }
    }

    pub fn pow(&self, mut e: u64) -> Rational {
        let mut base = self.clone();
        let mut result = Rational::Natural(1, 1);
        while e > 0 {
            if e & 1 == 1 {
                result = result.mul(&base);
            }
            e >>= 1;
            if e > 0 {
                base = base.mul(&base);
            }
        }
        result
    }
}

impl Ring for RationalField {
    type Element = Rational;

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
        Rational::Natural(0, 1)
    }

    #[inline]
    fn one(&self) -> Self::Element {
        Rational::Natural(1, 1)
    }

    fn nth(&self, n: u64) -> Self::Element {
        if n <= i64::MAX as u64 {
            Rational::Natural(n as i64, 1)
        } else {
            Rational::Large(ArbitraryPrecisionRational::from(n))
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

#[cfg(test)]
mod test {
    use crate::domains::Ring;

    use super::{Rational, Q};

    #[test]
    fn normalized() {
        assert_eq!(Rational::new(2, -4), Rational::Natural(-1, 2));
        assert_eq!(Rational::new(0, 7), Rational::Natural(0, 1));
        assert_eq!(format!("{}", Rational::new(6, 3)), "2");
    }

    #[test]
    fn arithmetic() {
        let a = Rational::new(1, 3);
        let b = Rational::new(1, 6);
        assert_eq!(Q.add(&a, &b), Rational::new(1, 2));
        assert_eq!(Q.sub(&a, &b), Rational::new(1, 6));
        assert_eq!(Q.mul(&a, &b), Rational::new(1, 18));
        assert_eq!(Q.pow(&Rational::new(-2, 3), 3), Rational::new(-8, 27));
        assert!(Q::is_zero(&Q.add(&a, &Q.neg(&a))));
    }

    #[test]
    fn large_round_trip() {
        let a = Rational::new(i64::MAX, 1);
        let b = Q.add(&a, &a);
        assert!(matches!(b, Rational::Large(_)));
        assert_eq!(Q.sub(&b, &a), a);
    }
}
