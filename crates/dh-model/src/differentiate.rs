//! Finite difference gradients for closure-defined constraint bodies.

use crate::error::{ModelError, ModelResult};
use dh_core::Real;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifferenceScheme {
    Forward,
    Central,
}

/// Finite difference settings: scheme plus relative step.
///
/// The actual step for coordinate j is `step * max(|x_j|, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct FiniteDifference {
    pub scheme: DifferenceScheme,
    pub step: Real,
}

impl Default for FiniteDifference {
    fn default() -> Self {
        Self {
            scheme: DifferenceScheme::Central,
            step: 1e-6,
        }
    }
}

impl FiniteDifference {
    pub fn gradient<F>(&self, x: &[Real], f: F) -> ModelResult<Vec<Real>>
    where
        F: Fn(&[Real]) -> Real,
    {
        match self.scheme {
            DifferenceScheme::Forward => forward_difference_gradient(x, f, self.step),
            DifferenceScheme::Central => central_difference_gradient(x, f, self.step),
        }
    }
}

fn evaluate<F>(f: &F, x: &[Real]) -> ModelResult<Real>
where
    F: Fn(&[Real]) -> Real,
{
    let v = f(x);
    if v.is_finite() {
        Ok(v)
    } else {
        Err(ModelError::NonFinite {
            what: "constraint body during differencing".to_string(),
            value: v,
        })
    }
}

/// Gradient using forward finite differences.
///
/// For each coordinate j, perturbs x[j] by dx and computes (f(x+dx) - f(x))/dx.
pub fn forward_difference_gradient<F>(x: &[Real], f: F, epsilon: Real) -> ModelResult<Vec<Real>>
where
    F: Fn(&[Real]) -> Real,
{
    let f_x = evaluate(&f, x)?;
    let mut grad = Vec::with_capacity(x.len());
    let mut x_perturbed = x.to_vec();

    for j in 0..x.len() {
        let dx = epsilon * x[j].abs().max(1.0);
        x_perturbed[j] = x[j] + dx;
        let f_perturbed = evaluate(&f, &x_perturbed)?;
        x_perturbed[j] = x[j];
        grad.push((f_perturbed - f_x) / dx);
    }

    Ok(grad)
}

/// Gradient using central finite differences (more accurate but 2x cost).
pub fn central_difference_gradient<F>(x: &[Real], f: F, epsilon: Real) -> ModelResult<Vec<Real>>
where
    F: Fn(&[Real]) -> Real,
{
    let mut grad = Vec::with_capacity(x.len());
    let mut x_perturbed = x.to_vec();

    for j in 0..x.len() {
        let dx = epsilon * x[j].abs().max(1.0);

        x_perturbed[j] = x[j] + dx;
        let f_plus = evaluate(&f, &x_perturbed)?;

        x_perturbed[j] = x[j] - dx;
        let f_minus = evaluate(&f, &x_perturbed)?;

        x_perturbed[j] = x[j];
        grad.push((f_plus - f_minus) / (2.0 * dx));
    }

    Ok(grad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_linear() {
        // f(x) = 2*x0 - x1, grad = (2, -1)
        let f = |x: &[Real]| 2.0 * x[0] - x[1];
        let grad = forward_difference_gradient(&[3.0, 1.0], f, 1e-7).unwrap();

        assert!((grad[0] - 2.0).abs() < 1e-5);
        assert!((grad[1] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn gradient_bilinear() {
        // f(x) = x0*x1, grad = (x1, x0)
        let f = |x: &[Real]| x[0] * x[1];
        let grad = central_difference_gradient(&[3.0, 2.0], f, 1e-6).unwrap();

        assert!((grad[0] - 2.0).abs() < 1e-7);
        assert!((grad[1] - 3.0).abs() < 1e-7);
    }

    #[test]
    fn gradient_reports_non_finite_body() {
        let f = |x: &[Real]| 1.0 / x[0];
        let fd = FiniteDifference {
            scheme: DifferenceScheme::Forward,
            step: 1e-7,
        };
        assert!(fd.gradient(&[0.0], f).is_err());
    }
}
