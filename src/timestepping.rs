//! Coefficients of one-step time integration schemes.
//!
//! A scheme with `s` stages computes intermediate solutions `u_1, ..., u_s` from `u_0` by solving,
//! for each stage `r = 1, ..., s`,
//!
//! ```text
//! sum_{i=0}^{r} a(r, i) M(u_i) + b(r, i) dt R(u_i, t + d(i) dt) = 0,
//! ```
//!
//! where `M` is the temporal (mass) operator and `R` the spatial operator. The stage is implicit
//! whenever `b(r, r)` is nonzero.
use crate::Real;
use eyre::{bail, eyre};
use nalgebra::{DMatrix, DVector};
use num::Zero;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// Coefficient lookup for a one-step scheme.
///
/// Stages are numbered `1 ..= stages()`, and solution indices `0 ..= stages()`.
pub trait TimeSteppingParameters<T> {
    fn name(&self) -> &str;

    /// Whether any stage of the scheme is implicit.
    fn implicit(&self) -> bool;

    fn stages(&self) -> usize;

    fn a(&self, r: usize, i: usize) -> T;

    fn b(&self, r: usize, i: usize) -> T;

    fn d(&self, i: usize) -> T;
}

/// A scheme given by dense coefficient tables.
///
/// `a` and `b` have `s` rows and `s + 1` columns, where row `r - 1` holds the coefficients of
/// stage `r`. `d` has `s + 1` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Tableau<T: Real> {
    name: String,
    a: DMatrix<T>,
    b: DMatrix<T>,
    d: DVector<T>,
}

impl<T: Real> Tableau<T> {
    pub fn try_new(name: impl Into<String>, a: DMatrix<T>, b: DMatrix<T>, d: DVector<T>) -> eyre::Result<Self> {
        let s = a.nrows();
        if s == 0 {
            bail!("a scheme needs at least one stage");
        }
        if a.ncols() != s + 1 {
            bail!("a must have {} columns for {} stages, but has {}", s + 1, s, a.ncols());
        }
        if b.shape() != a.shape() {
            bail!("b has shape {:?}, but a has shape {:?}", b.shape(), a.shape());
        }
        if d.len() != s + 1 {
            bail!("d must have {} entries for {} stages, but has {}", s + 1, s, d.len());
        }
        Ok(Self {
            name: name.into(),
            a,
            b,
            d,
        })
    }

    fn from_rows(name: &str, stages: usize, a: &[T], b: &[T], d: &[T]) -> Self {
        let a = DMatrix::from_row_slice(stages, stages + 1, a);
        let b = DMatrix::from_row_slice(stages, stages + 1, b);
        let d = DVector::from_column_slice(d);
        Self::try_new(name, a, b, d).expect("Built-in tableaux must be consistent")
    }

    /// The one-step-θ scheme, with the spatial operator weighted by `1 - θ` at the old and by `θ`
    /// at the new time.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn one_step_theta(theta: T) -> Self {
        Self::from_rows(
            "one step theta",
            1,
            &[-1.0, 1.0],
            &[1.0 - theta, theta],
            &[0.0, 1.0],
        )
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn implicit_euler() -> Self {
        Self {
            name: "implicit Euler".to_string(),
            ..Self::one_step_theta(1.0)
        }
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn explicit_euler() -> Self {
        Self {
            name: "explicit Euler".to_string(),
            ..Self::one_step_theta(0.0)
        }
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn crank_nicolson() -> Self {
        Self {
            name: "Crank-Nicolson".to_string(),
            ..Self::one_step_theta(0.5)
        }
    }

    /// Alexander's two-stage, strongly S-stable diagonally implicit scheme of second order.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn alexander2() -> Self {
        let alpha = 1.0 - T::sqrt(2.0) / 2.0;
        Self::from_rows(
            "Alexander (order 2)",
            2,
            &[-1.0, 1.0, 0.0, -1.0, 0.0, 1.0],
            &[0.0, alpha, 0.0, 0.0, 1.0 - alpha, alpha],
            &[0.0, alpha, 1.0],
        )
    }

    /// The fractional-step-θ scheme with three implicit substeps.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn fractional_step() -> Self {
        let theta = 1.0 - T::sqrt(2.0) / 2.0;
        let theta_prime = 1.0 - 2.0 * theta;
        let alpha = 2.0 - T::sqrt(2.0);
        let beta = 1.0 - alpha;
        #[rustfmt::skip]
        let a = [
            -1.0, 1.0, 0.0, 0.0,
            0.0, -1.0, 1.0, 0.0,
            0.0, 0.0, -1.0, 1.0,
        ];
        #[rustfmt::skip]
        let b = [
            beta * theta, alpha * theta, 0.0, 0.0,
            0.0, alpha * theta_prime, beta * theta_prime, 0.0,
            0.0, 0.0, beta * theta, alpha * theta,
        ];
        Self::from_rows("fractional step theta", 3, &a, &b, &[0.0, theta, 1.0 - theta, 1.0])
    }

    /// Heun's explicit second order scheme.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn heun() -> Self {
        Self::from_rows(
            "Heun",
            2,
            &[-1.0, 1.0, 0.0, -0.5, -0.5, 1.0],
            &[1.0, 0.0, 0.0, 0.0, 0.5, 0.0],
            &[0.0, 1.0, 1.0],
        )
    }

    /// Shu's strong stability preserving explicit scheme of third order.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn shu3() -> Self {
        #[rustfmt::skip]
        let a = [
            -1.0, 1.0, 0.0, 0.0,
            -0.75, -0.25, 1.0, 0.0,
            -1.0 / 3.0, 0.0, -2.0 / 3.0, 1.0,
        ];
        #[rustfmt::skip]
        let b = [
            1.0, 0.0, 0.0, 0.0,
            0.0, 0.25, 0.0, 0.0,
            0.0, 0.0, 2.0 / 3.0, 0.0,
        ];
        Self::from_rows("Shu (order 3)", 3, &a, &b, &[0.0, 1.0, 0.5, 1.0])
    }
}

impl<T: Real> TimeSteppingParameters<T> for Tableau<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn implicit(&self) -> bool {
        (1..=self.stages()).any(|r| !self.b(r, r).is_zero())
    }

    fn stages(&self) -> usize {
        self.a.nrows()
    }

    fn a(&self, r: usize, i: usize) -> T {
        self.a[(r - 1, i)]
    }

    fn b(&self, r: usize, i: usize) -> T {
        self.b[(r - 1, i)]
    }

    fn d(&self, i: usize) -> T {
        self.d[i]
    }
}

/// Serializable choice of a time stepping scheme.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum TimeSteppingScheme {
    ImplicitEuler,
    ExplicitEuler,
    CrankNicolson,
    OneStepTheta { theta: f64 },
    Alexander2,
    FractionalStep,
    Heun,
    Shu3,
}

impl Default for TimeSteppingScheme {
    fn default() -> Self {
        Self::ImplicitEuler
    }
}

impl TimeSteppingScheme {
    /// Returns an error for a θ outside `[0, 1]`.
    pub fn tableau<T: Real>(&self) -> eyre::Result<Tableau<T>> {
        Ok(match *self {
            Self::ImplicitEuler => Tableau::implicit_euler(),
            Self::ExplicitEuler => Tableau::explicit_euler(),
            Self::CrankNicolson => Tableau::crank_nicolson(),
            Self::OneStepTheta { theta } => {
                if !(0.0..=1.0).contains(&theta) {
                    bail!("theta must lie in [0, 1], got {}", theta);
                }
                let theta = T::from_f64(theta).ok_or_else(|| eyre!("theta {} does not fit in scalar type", theta))?;
                Tableau::one_step_theta(theta)
            }
            Self::Alexander2 => Tableau::alexander2(),
            Self::FractionalStep => Tableau::fractional_step(),
            Self::Heun => Tableau::heun(),
            Self::Shu3 => Tableau::shu3(),
        })
    }
}
