//! Exact rational arithmetic (C1) for the note expression core.
//!
//! [`Rational`] wraps [`num_rational::BigRational`], which keeps every value
//! reduced by gcd and backed by arbitrary-precision integers, so overflow is
//! not reachable in practice — the [`RationalError::Overflow`] variant is
//! kept only for implementations that choose a fixed-width backing.
//!
//! [`Pool`] is a thread-confined LIFO free list scoped to a single
//! evaluation. Pooling is a reuse optimization only: every [`Rational`]
//! produced by the API is a logically fresh, independent value.

mod pool;

use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use thiserror::Error;

pub use pool::Pool;

/// Errors raised by rational arithmetic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RationalError {
    #[error("division by zero")]
    DivisionByZero,
    /// Unreachable with the bignum backing used here; kept for parity with
    /// implementations that back `Rational` with fixed-width integers.
    #[error("rational arithmetic overflow")]
    Overflow,
}

/// An exact rational number, always held in reduced (lowest-terms) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rational(BigRational);

impl Rational {
    pub fn zero() -> Self {
        Rational(BigRational::zero())
    }

    pub fn from_int(n: i64) -> Self {
        Rational(BigRational::from_integer(BigInt::from(n)))
    }

    /// Builds `n/d`, reducing to lowest terms. Fails if `d == 0`.
    pub fn from_pair(n: i64, d: i64) -> Result<Self, RationalError> {
        if d == 0 {
            return Err(RationalError::DivisionByZero);
        }
        Ok(Rational(BigRational::new(BigInt::from(n), BigInt::from(d))))
    }

    /// Builds `n/d` from arbitrary-width integers, reducing to lowest terms.
    pub fn from_bigint_pair(n: BigInt, d: BigInt) -> Result<Self, RationalError> {
        if d.is_zero() {
            return Err(RationalError::DivisionByZero);
        }
        Ok(Rational(BigRational::new(n, d)))
    }

    pub fn numer(&self) -> &BigInt {
        self.0.numer()
    }

    pub fn denom(&self) -> &BigInt {
        self.0.denom()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    /// The integer value, if this rational reduces to one exactly.
    pub fn to_integer(&self) -> Option<BigInt> {
        self.0.is_integer().then(|| self.0.to_integer())
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.to_integer().and_then(|n| n.to_i64())
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn add(&self, other: &Rational) -> Rational {
        Rational(&self.0 + &other.0)
    }

    pub fn sub(&self, other: &Rational) -> Rational {
        Rational(&self.0 - &other.0)
    }

    pub fn mul(&self, other: &Rational) -> Rational {
        Rational(&self.0 * &other.0)
    }

    pub fn div(&self, other: &Rational) -> Result<Rational, RationalError> {
        if other.is_zero() {
            return Err(RationalError::DivisionByZero);
        }
        Ok(Rational(&self.0 / &other.0))
    }

    pub fn neg(&self) -> Rational {
        Rational(-&self.0)
    }

    /// Raises `self` to an integer power. Exact; `0^0 == 1` by convention.
    pub fn pow_int(&self, exp: i64) -> Result<Rational, RationalError> {
        if exp == 0 {
            return Ok(Rational::from_int(1));
        }
        if self.is_zero() {
            return if exp > 0 {
                Ok(Rational::zero())
            } else {
                Err(RationalError::DivisionByZero)
            };
        }
        let abs_exp = exp.unsigned_abs();
        let mut acc = BigRational::from_integer(BigInt::from(1));
        let mut base = self.0.clone();
        let mut n = abs_exp;
        // Exponentiation by squaring keeps this exact and cheap for large exponents.
        while n > 0 {
            if n & 1 == 1 {
                acc = &acc * &base;
            }
            base = &base * &base;
            n >>= 1;
        }
        if exp < 0 {
            Ok(Rational(acc.recip()))
        } else {
            Ok(Rational(acc))
        }
    }

    pub fn cmp(&self, other: &Rational) -> Ordering {
        self.0.cmp(&other.0)
    }

    pub fn equals(&self, other: &Rational) -> bool {
        self.0 == other.0
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_integer() {
            write!(f, "{}", self.0.numer())
        } else {
            write!(f, "{}/{}", self.0.numer(), self.0.denom())
        }
    }
}

impl From<BigRational> for Rational {
    fn from(r: BigRational) -> Self {
        Rational(r)
    }
}

impl From<Rational> for BigRational {
    fn from(r: Rational) -> Self {
        r.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_pair_reduces() {
        let r = Rational::from_pair(4, 8).unwrap();
        assert_eq!(r.numer(), &BigInt::from(1));
        assert_eq!(r.denom(), &BigInt::from(2));
    }

    #[test]
    fn from_pair_rejects_zero_denominator() {
        assert_eq!(
            Rational::from_pair(1, 0).unwrap_err(),
            RationalError::DivisionByZero
        );
    }

    #[test]
    fn arithmetic_is_exact() {
        let a = Rational::from_pair(1, 3).unwrap();
        let b = Rational::from_pair(1, 6).unwrap();
        assert_eq!(a.add(&b), Rational::from_pair(1, 2).unwrap());
        assert_eq!(a.sub(&b), Rational::from_pair(1, 6).unwrap());
        assert_eq!(a.mul(&b), Rational::from_pair(1, 18).unwrap());
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let a = Rational::from_int(5);
        assert_eq!(
            a.div(&Rational::zero()).unwrap_err(),
            RationalError::DivisionByZero
        );
    }

    #[test]
    fn pow_int_handles_negative_exponents() {
        let two = Rational::from_int(2);
        assert_eq!(two.pow_int(-1).unwrap(), Rational::from_pair(1, 2).unwrap());
        assert_eq!(two.pow_int(0).unwrap(), Rational::from_int(1));
        assert_eq!(two.pow_int(10).unwrap(), Rational::from_int(1024));
    }

    #[test]
    fn associativity_and_distributivity() {
        let a = Rational::from_pair(1, 3).unwrap();
        let b = Rational::from_pair(2, 5).unwrap();
        let c = Rational::from_pair(-7, 11).unwrap();
        assert_eq!(a.add(&b).add(&c), a.add(&b.add(&c)));
        assert_eq!(a.mul(&b.add(&c)), a.mul(&b).add(&a.mul(&c)));
    }

    #[test]
    fn display_formats_integers_without_denominator() {
        assert_eq!(Rational::from_int(7).to_string(), "7");
        assert_eq!(Rational::from_pair(7, 2).unwrap().to_string(), "7/2");
    }
}
