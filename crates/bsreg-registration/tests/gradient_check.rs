//! Analytic gradients against central finite differences.
//!
//! The images are multilinear in the index coordinates, so linear
//! interpolation and the central-difference image gradient are exact and the
//! only discrepancy left is f32 pixel storage.

use bsreg_core::spatial::{Direction, Point, Spacing};
use bsreg_core::{Image, Region, SplineSurface, SplineVolume};
use bsreg_registration::{CostFunction, RegistrationObjective};
use burn_ndarray::NdArray;

type Backend = NdArray<f32>;

fn image<const D: usize, F>(size: [usize; D], f: F) -> Image<Backend, D>
where
    F: Fn([f64; D]) -> f64,
{
    let values = Region::from_size(size)
        .iter()
        .map(|index| f(index.map(|i| i as f64)) as f32)
        .collect();
    Image::from_values(
        values,
        size,
        Point::origin(),
        Spacing::repeat(1.0),
        Direction::identity(),
        &Default::default(),
    )
    .unwrap()
}

/// Deterministic offsets in `[-amplitude, amplitude]`.
fn perturb(parameters: &mut [f64], amplitude: f64) {
    for (k, x) in parameters.iter_mut().enumerate() {
        *x += amplitude * (k as f64 * 1.7 + 0.3).sin();
    }
}

fn assert_matches_finite_differences<const D: usize>(objective: &mut RegistrationObjective<Backend, D>, h: f64) {
    let x = objective.parameters();
    objective.forward(&x).unwrap();
    let gradient = objective.gradient(&x).unwrap();
    assert_eq!(gradient.len(), x.len());

    let mut nonzero = 0;
    for k in 0..x.len() {
        let mut plus = x.clone();
        plus[k] += h;
        let mut minus = x.clone();
        minus[k] -= h;
        let fd = (objective.forward(&plus).unwrap() - objective.forward(&minus).unwrap()) / (2.0 * h);

        // The gradient is a descent direction.
        let tolerance = 1e-4 * fd.abs().max(0.1);
        assert!(
            (gradient[k] + fd).abs() <= tolerance,
            "parameter {}: analytic {:.9} vs finite difference {:.9}",
            k,
            gradient[k],
            -fd
        );
        if fd.abs() > 1e-3 {
            nonzero += 1;
        }
    }
    assert!(nonzero > 0, "every derivative vanished");
}

#[test]
fn test_surface_gradient_matches_finite_differences() {
    let fixed = image([16, 16], |[x, y]| 0.5 * x + 0.2 * y + 0.05 * x * y);
    let moving = image([16, 16], |[x, y]| 0.3 * x - 0.1 * y + 0.02 * x * y + 1.0);
    let mut spline = SplineSurface::create_identity([0.0, 0.0], [15.0, 15.0], [4, 4], [2, 2]).unwrap();
    let mut parameters = spline.parameters();
    perturb(&mut parameters, 0.3);
    spline.set_parameters(&parameters).unwrap();

    let mut objective = RegistrationObjective::new(fixed, moving, spline, 0.0)
        .unwrap()
        .with_region(Region::new([2, 2], [12, 12]));
    assert_matches_finite_differences(&mut objective, 0.25);
}

#[test]
fn test_volume_gradient_matches_finite_differences() {
    let fixed = image([10, 10, 10], |[x, y, z]| 0.4 * x + 0.1 * y - 0.2 * z + 0.03 * x * z);
    let moving = image([10, 10, 10], |[x, y, z]| 0.2 * x - 0.3 * y + 0.1 * z + 0.02 * x * y * z + 0.5);
    let mut spline =
        SplineVolume::create_identity([0.0, 0.0, 0.0], [9.0, 9.0, 9.0], [4, 4, 4], [2, 2, 2]).unwrap();
    let mut parameters = spline.parameters();
    perturb(&mut parameters, 0.2);
    spline.set_parameters(&parameters).unwrap();

    let mut objective = RegistrationObjective::new(fixed, moving, spline, 0.0)
        .unwrap()
        .with_region(Region::new([2, 2, 2], [6, 6, 6]));
    assert_matches_finite_differences(&mut objective, 0.25);
}

#[test]
fn test_gradient_matches_finite_differences_past_the_border() {
    // Over the whole image, shifted so the right columns sample past the
    // moving image and stay there for every finite-difference step.
    let fixed = image([16, 16], |[x, y]| 0.5 * x + 0.2 * y + 0.05 * x * y);
    let moving = image([16, 16], |[x, y]| 0.3 * x - 0.1 * y + 0.02 * x * y + 1.0);
    let mut spline = SplineSurface::create_identity([0.0, 0.0], [15.0, 15.0], [4, 4], [2, 2]).unwrap();
    let mut parameters = spline.parameters();
    for point in parameters.chunks_mut(2) {
        point[0] += 2.5;
        point[1] += 0.5;
    }
    perturb(&mut parameters, 0.15);
    spline.set_parameters(&parameters).unwrap();

    let mut objective = RegistrationObjective::new(fixed, moving, spline, 0.0).unwrap();
    assert_matches_finite_differences(&mut objective, 0.2);
}
