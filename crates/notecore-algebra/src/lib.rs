//! Symbolic-power value algebra (C2).
//!
//! A [`SymbolicPower`] is `c * prod(base_i ^ exp_i)`: a rational coefficient
//! times a set of terms pairing a positive-integer base with a non-zero
//! rational exponent. It is how the core preserves algebraic identities
//! across irrational exponents — `2^(1/12)` stays exact instead of decaying
//! to a float, and `2^(1/12) * 2^(1/12)` simplifies back to `2^(1/6)`.
//!
//! Every [`notecore_rational::Rational`] is a symbolic power with an empty
//! term set ("pure rational"). Addition and subtraction are defined only
//! when both operands have identical term sets; otherwise the algebra
//! cannot combine the radicals and the result is flagged corrupted (see
//! [`AlgebraError::RadicalMismatch`]), carrying a numeric approximation for
//! display purposes. This is the core's sole corruption boundary — no other
//! operation in this crate fails silently.

use std::cmp::Ordering;

use notecore_rational::Rational;
use thiserror::Error;

/// Errors raised by the symbolic-power algebra.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlgebraError {
    /// `pow(b, e)` was asked for a non-integer `e` with a base that is not
    /// a positive integer (including an already-symbolic base).
    #[error("cannot raise a non-positive-integer base to a non-integer power")]
    NonRationalBase,
    /// `add`/`sub` between symbolic powers with different term sets. The
    /// approximation is the best numeric estimate of the true sum/difference,
    /// for callers that must keep evaluating rather than abort.
    #[error("cannot combine radicals with different bases/exponents")]
    RadicalMismatch { approx: Rational },
    #[error("division by zero")]
    DivisionByZero,
}

/// `base^exponent`, where `base` is a positive integer and `exponent` is a
/// non-zero rational. Never stored with a zero exponent or duplicate base.
pub type Term = (u64, Rational);

/// `c * prod(base_i ^ exp_i)`. Terms are kept sorted ascending by base with
/// unique bases and non-zero exponents as a maintained invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicPower {
    coeff: Rational,
    terms: Vec<Term>,
}

impl SymbolicPower {
    /// A pure rational: the coefficient with an empty term set.
    pub fn from_rational(coeff: Rational) -> Self {
        SymbolicPower {
            coeff,
            terms: Vec::new(),
        }
    }

    pub fn coeff(&self) -> &Rational {
        &self.coeff
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// True when this value has no irrational terms — the VM's fast path
    /// dispatches straight to [`notecore_rational`] for pure rationals.
    pub fn is_pure_rational(&self) -> bool {
        self.terms.is_empty()
    }

    /// Converts to a plain rational, if this value is a pure rational.
    pub fn as_rational(&self) -> Option<&Rational> {
        self.is_pure_rational().then_some(&self.coeff)
    }

    /// A floating-point approximation, used only to build the approximate
    /// coefficient of a corrupted result — never for comparisons.
    pub fn approx(&self) -> f64 {
        let mut v = self.coeff.to_f64();
        for (base, exp) in &self.terms {
            v *= (*base as f64).powf(exp.to_f64());
        }
        v
    }

    /// Builds from a raw term list, normalizing (sorting, merging duplicate
    /// bases, dropping zero exponents). Used internally by `mul`/`pow_value`.
    fn normalized(coeff: Rational, mut raw_terms: Vec<Term>) -> SymbolicPower {
        raw_terms.sort_by_key(|(b, _)| *b);
        let mut terms: Vec<Term> = Vec::with_capacity(raw_terms.len());
        for (base, exp) in raw_terms {
            if let Some(last) = terms.last_mut() {
                if last.0 == base {
                    last.1 = last.1.add(&exp);
                    if last.1.is_zero() {
                        terms.pop();
                    }
                    continue;
                }
            }
            if !exp.is_zero() {
                terms.push((base, exp));
            }
        }
        SymbolicPower { coeff, terms }
    }
}

/// `pow(base, exp)`: folds into the coefficient when `exp` is an integer;
/// otherwise requires `base` to be a positive integer and records a term.
pub fn pow(base: &Rational, exp: &Rational) -> Result<SymbolicPower, AlgebraError> {
    if let Some(exp_int) = integer_exponent(exp) {
        let coeff = base
            .pow_int(exp_int)
            .map_err(|_| AlgebraError::DivisionByZero)?;
        return Ok(SymbolicPower::from_rational(coeff));
    }
    match positive_integer_base(base) {
        Some(b) if !exp.is_zero() => Ok(SymbolicPower::normalized(
            Rational::from_int(1),
            vec![(b, exp.clone())],
        )),
        Some(_) => Ok(SymbolicPower::from_rational(Rational::from_int(1))),
        None => Err(AlgebraError::NonRationalBase),
    }
}

/// General `base^exp` where `base` may already be symbolic. The exponent is
/// always a plain rational in this algebra; a symbolic exponent is rejected
/// the same way a non-positive-integer base is.
pub fn pow_value(base: &SymbolicPower, exp: &SymbolicPower) -> Result<SymbolicPower, AlgebraError> {
    let exp = exp.as_rational().ok_or(AlgebraError::NonRationalBase)?;
    if exp.is_zero() {
        return Ok(SymbolicPower::from_rational(Rational::from_int(1)));
    }
    if let Some(base_rational) = base.as_rational() {
        return pow(base_rational, exp);
    }
    let exp_int = integer_exponent(exp).ok_or(AlgebraError::NonRationalBase)?;
    let coeff = base
        .coeff
        .pow_int(exp_int)
        .map_err(|_| AlgebraError::DivisionByZero)?;
    let terms = base
        .terms
        .iter()
        .map(|(b, e)| (*b, e.mul(exp)))
        .collect();
    Ok(SymbolicPower::normalized(coeff, terms))
}

/// Like-base multiplication adds exponents; integer exponents already live
/// in the coefficient, so this always succeeds.
pub fn mul(a: &SymbolicPower, b: &SymbolicPower) -> SymbolicPower {
    let coeff = a.coeff.mul(&b.coeff);
    let mut terms = a.terms.clone();
    terms.extend(b.terms.iter().cloned());
    SymbolicPower::normalized(coeff, terms)
}

/// `a / b`, implemented as `a * b^-1`.
pub fn div(a: &SymbolicPower, b: &SymbolicPower) -> Result<SymbolicPower, AlgebraError> {
    if b.coeff.is_zero() {
        return Err(AlgebraError::DivisionByZero);
    }
    let inv_coeff = Rational::from_int(1)
        .div(&b.coeff)
        .map_err(|_| AlgebraError::DivisionByZero)?;
    let inv_terms = b.terms.iter().map(|(base, exp)| (*base, exp.neg())).collect();
    let inv = SymbolicPower {
        coeff: inv_coeff,
        terms: inv_terms,
    };
    Ok(mul(a, &inv))
}

/// Defined only when both operands carry the same term set (so the
/// coefficients combine directly); otherwise the radicals cannot be
/// combined symbolically and the caller receives an approximation.
pub fn add(a: &SymbolicPower, b: &SymbolicPower) -> Result<SymbolicPower, AlgebraError> {
    if a.terms == b.terms {
        Ok(SymbolicPower {
            coeff: a.coeff.add(&b.coeff),
            terms: a.terms.clone(),
        })
    } else {
        Err(AlgebraError::RadicalMismatch {
            approx: approx_rational(a.approx() + b.approx()),
        })
    }
}

pub fn sub(a: &SymbolicPower, b: &SymbolicPower) -> Result<SymbolicPower, AlgebraError> {
    if a.terms == b.terms {
        Ok(SymbolicPower {
            coeff: a.coeff.sub(&b.coeff),
            terms: a.terms.clone(),
        })
    } else {
        Err(AlgebraError::RadicalMismatch {
            approx: approx_rational(a.approx() - b.approx()),
        })
    }
}

pub fn neg(a: &SymbolicPower) -> SymbolicPower {
    SymbolicPower {
        coeff: a.coeff.neg(),
        terms: a.terms.clone(),
    }
}

/// Orders by numeric approximation; used only for display/debugging, never
/// for exact-equality tests (see the module docs on corruption).
pub fn approx_cmp(a: &SymbolicPower, b: &SymbolicPower) -> Ordering {
    a.approx().partial_cmp(&b.approx()).unwrap_or(Ordering::Equal)
}

fn integer_exponent(exp: &Rational) -> Option<i64> {
    exp.is_integer().then(|| exp.to_i64()).flatten()
}

fn positive_integer_base(base: &Rational) -> Option<u64> {
    if !base.is_integer() || base.is_negative() || base.is_zero() {
        return None;
    }
    base.to_i64().and_then(|v| u64::try_from(v).ok())
}

/// A coarse f64->rational conversion for corrupted-value display. Not exact
/// by construction — exactness is exactly what the corruption flag signals
/// the caller has lost.
fn approx_rational(v: f64) -> Rational {
    // A denominator of 10^9 gives ample display precision without pulling in
    // a continued-fraction reduction the corrupted path doesn't need.
    const SCALE: i64 = 1_000_000_000;
    let scaled = (v * SCALE as f64).round();
    if scaled.is_finite() && scaled.abs() < i64::MAX as f64 {
        Rational::from_pair(scaled as i64, SCALE).unwrap_or_else(|_| Rational::zero())
    } else {
        Rational::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn r(n: i64, d: i64) -> Rational {
        Rational::from_pair(n, d).unwrap()
    }

    #[test]
    fn integer_power_folds_into_coefficient() {
        let v = pow(&Rational::from_int(2), &Rational::from_int(3)).unwrap();
        assert!(v.is_pure_rational());
        assert_eq!(v.coeff(), &Rational::from_int(8));
    }

    #[test]
    fn fractional_power_of_positive_integer_is_a_term() {
        let v = pow(&Rational::from_int(2), &r(1, 12)).unwrap();
        assert!(!v.is_pure_rational());
        assert_eq!(v.terms(), &[(2, r(1, 12))]);
    }

    #[test]
    fn fractional_power_of_non_integer_base_fails() {
        let err = pow(&r(3, 2), &r(1, 2)).unwrap_err();
        assert_eq!(err, AlgebraError::NonRationalBase);
    }

    #[test]
    fn equal_temperament_round_trips_to_rational() {
        let half = pow(&Rational::from_int(2), &r(1, 12)).unwrap();
        let twelfth_root_twice = mul(&half, &half);
        // 2^(1/12) * 2^(1/12) == 2^(1/6), still symbolic.
        assert_eq!(twelfth_root_twice.terms(), &[(2, r(1, 6))]);

        let twelve_halves = (0..12).fold(SymbolicPower::from_rational(Rational::from_int(1)), |acc, _| {
            mul(&acc, &half)
        });
        // 2^(1/12) raised to the 12th power collapses back to the rational 2.
        assert!(twelve_halves.is_pure_rational());
        assert_eq!(twelve_halves.coeff(), &Rational::from_int(2));
    }

    #[test]
    fn mul_drops_zero_exponents() {
        let a = pow(&Rational::from_int(2), &r(1, 2)).unwrap();
        let b = pow(&Rational::from_int(2), &r(-1, 2)).unwrap();
        let product = mul(&a, &b);
        assert!(product.is_pure_rational());
        assert_eq!(product.coeff(), &Rational::from_int(1));
    }

    #[test]
    fn add_requires_matching_term_sets() {
        let a = pow(&Rational::from_int(2), &r(1, 2)).unwrap();
        let b = pow(&Rational::from_int(3), &r(1, 2)).unwrap();
        match add(&a, &b) {
            Err(AlgebraError::RadicalMismatch { .. }) => {}
            other => panic!("expected RadicalMismatch, got {other:?}"),
        }
    }

    #[test]
    fn add_on_matching_term_sets_combines_coefficients() {
        let a = SymbolicPower::normalized(Rational::from_int(2), vec![(2, r(1, 2))]);
        let b = SymbolicPower::normalized(Rational::from_int(3), vec![(2, r(1, 2))]);
        let sum = add(&a, &b).unwrap();
        assert_eq!(sum.coeff(), &Rational::from_int(5));
        assert_eq!(sum.terms(), &[(2, r(1, 2))]);
    }

    #[test]
    fn div_by_zero_coefficient_fails() {
        let a = SymbolicPower::from_rational(Rational::from_int(1));
        let zero = SymbolicPower::from_rational(Rational::zero());
        assert_eq!(div(&a, &zero).unwrap_err(), AlgebraError::DivisionByZero);
    }

    #[test]
    fn pure_rational_arithmetic_matches_rational_directly() {
        let a = SymbolicPower::from_rational(r(1, 3));
        let b = SymbolicPower::from_rational(r(1, 6));
        let sum = add(&a, &b).unwrap();
        assert_eq!(sum.coeff(), &r(1, 2));
    }
}
