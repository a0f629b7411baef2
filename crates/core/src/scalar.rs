use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// A numeric type the callbacks of an [`OptimalControl`] problem compute with.
///
/// Callbacks are written once, generically over `Scalar`, and evaluated by the
/// solver with whatever representation it needs: plain `f64` for values, or a
/// forward-mode dual number when it propagates derivatives. The orchestrator
/// never inspects the representation; it only relies on arithmetic composing
/// correctly through user code.
///
/// Mixed arithmetic with `f64` is available on the right-hand side, so
/// `theta.cos() * 9.8` works for any `S: Scalar`. Use [`Scalar::constant`]
/// when a literal has to come first.
///
/// [`OptimalControl`]: crate::OptimalControl
pub trait Scalar:
    Copy
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    /// Lifts a constant into the scalar type.
    fn constant(value: f64) -> Self;

    /// Returns the primal value, discarding any derivative information.
    fn value(&self) -> f64;

    #[must_use]
    fn zero() -> Self {
        Self::constant(0.0)
    }

    #[must_use]
    fn one() -> Self {
        Self::constant(1.0)
    }

    #[must_use]
    fn sin(self) -> Self;
    #[must_use]
    fn cos(self) -> Self;
    #[must_use]
    fn tan(self) -> Self;
    #[must_use]
    fn asin(self) -> Self;
    #[must_use]
    fn acos(self) -> Self;
    #[must_use]
    fn atan(self) -> Self;
    #[must_use]
    fn atan2(self, other: Self) -> Self;
    #[must_use]
    fn sinh(self) -> Self;
    #[must_use]
    fn cosh(self) -> Self;
    #[must_use]
    fn tanh(self) -> Self;
    #[must_use]
    fn exp(self) -> Self;
    #[must_use]
    fn ln(self) -> Self;
    #[must_use]
    fn sqrt(self) -> Self;
    #[must_use]
    fn powi(self, n: i32) -> Self;
    #[must_use]
    fn powf(self, n: f64) -> Self;
    #[must_use]
    fn abs(self) -> Self;
}

impl Scalar for f64 {
    #[inline]
    fn constant(value: f64) -> Self {
        value
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }

    #[inline]
    fn sin(self) -> Self {
        f64::sin(self)
    }

    #[inline]
    fn cos(self) -> Self {
        f64::cos(self)
    }

    #[inline]
    fn tan(self) -> Self {
        f64::tan(self)
    }

    #[inline]
    fn asin(self) -> Self {
        f64::asin(self)
    }

    #[inline]
    fn acos(self) -> Self {
        f64::acos(self)
    }

    #[inline]
    fn atan(self) -> Self {
        f64::atan(self)
    }

    #[inline]
    fn atan2(self, other: Self) -> Self {
        f64::atan2(self, other)
    }

    #[inline]
    fn sinh(self) -> Self {
        f64::sinh(self)
    }

    #[inline]
    fn cosh(self) -> Self {
        f64::cosh(self)
    }

    #[inline]
    fn tanh(self) -> Self {
        f64::tanh(self)
    }

    #[inline]
    fn exp(self) -> Self {
        f64::exp(self)
    }

    #[inline]
    fn ln(self) -> Self {
        f64::ln(self)
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    #[inline]
    fn powi(self, n: i32) -> Self {
        f64::powi(self, n)
    }

    #[inline]
    fn powf(self, n: f64) -> Self {
        f64::powf(self, n)
    }

    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn generic_pendulum<S: Scalar>(theta: S, omega: S) -> S {
        omega * omega * 0.5 - theta.cos() * 9.81
    }

    #[test]
    fn f64_evaluates_generic_code() {
        let energy = generic_pendulum(0.0_f64, 2.0_f64);
        assert_relative_eq!(energy, 2.0 - 9.81);
    }

    #[test]
    fn constants_round_trip() {
        assert_relative_eq!(<f64 as Scalar>::constant(3.5).value(), 3.5);
        assert_relative_eq!(<f64 as Scalar>::zero(), 0.0);
        assert_relative_eq!(<f64 as Scalar>::one(), 1.0);
    }
}
