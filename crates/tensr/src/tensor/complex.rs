use std::ops::{Add, Mul, Neg, Sub};

/// Cartesian complex scalar stored as adjacent real and imaginary parts.
///
/// The `repr(C)` layout matches the wire format used by tensor literals, so a
/// `&[Complex<f32>]` reinterprets cleanly as interleaved `f32` pairs.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub const fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

macro_rules! impl_complex_float {
    ($t:ty) => {
        impl Complex<$t> {
            pub const ZERO: Self = Self::new(0.0, 0.0);
            pub const ONE: Self = Self::new(1.0, 0.0);
            pub const I: Self = Self::new(0.0, 1.0);

            pub fn from_real(re: $t) -> Self {
                Self::new(re, 0.0)
            }

            pub fn conj(self) -> Self {
                Self::new(self.re, -self.im)
            }

            pub fn norm_sqr(self) -> $t {
                self.re * self.re + self.im * self.im
            }

            /// Modulus, computed with `hypot` to avoid intermediate overflow.
            pub fn abs(self) -> $t {
                self.re.hypot(self.im)
            }

            pub fn recip(self) -> Self {
                let denom = self.norm_sqr();
                Self::new(self.re / denom, -self.im / denom)
            }

            pub fn is_finite(self) -> bool {
                self.re.is_finite() && self.im.is_finite()
            }
        }

        impl Neg for Complex<$t> {
            type Output = Self;

            fn neg(self) -> Self {
                Self::new(-self.re, -self.im)
            }
        }

        impl Add for Complex<$t> {
            type Output = Self;

            fn add(self, rhs: Self) -> Self {
                Self::new(self.re + rhs.re, self.im + rhs.im)
            }
        }

        impl Sub for Complex<$t> {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self {
                Self::new(self.re - rhs.re, self.im - rhs.im)
            }
        }

        impl Mul for Complex<$t> {
            type Output = Self;

            fn mul(self, rhs: Self) -> Self {
                Self::new(
                    self.re * rhs.re - self.im * rhs.im,
                    self.re * rhs.im + self.im * rhs.re,
                )
            }
        }

        impl From<$t> for Complex<$t> {
            fn from(re: $t) -> Self {
                Self::from_real(re)
            }
        }
    };
}

impl_complex_float!(f32);
impl_complex_float!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reciprocal_of_unit_imaginary() {
        let z = Complex::<f64>::I;
        let r = z.recip();
        assert_eq!(r, Complex::new(0.0, -1.0));
    }

    #[test]
    fn abs_handles_large_components() {
        let z = Complex::new(3.0e200_f64, 4.0e200);
        let abs = z.abs();
        assert!(abs.is_finite());
        assert!(((abs - 5.0e200) / 5.0e200).abs() < 1e-12, "abs = {abs}");
    }

    #[test]
    fn multiplication_follows_i_squared() {
        let product = Complex::<f32>::I * Complex::<f32>::I;
        assert_eq!(product, Complex::new(-1.0, 0.0));
    }
}
