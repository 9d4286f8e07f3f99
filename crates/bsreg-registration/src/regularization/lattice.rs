//! Uniform-lattice regularization of control grids.
//!
//! Each control point is compared with its neighbours at offsets
//! `o ∈ {-1, 0, 1}^D \ {0}`. A neighbour is expected at
//! `current + Σ_b o_b · step_b`, where `step_b` is the lattice step along
//! grid axis `b` measured when the regularizer is built.

use bsreg_core::ControlGrid;

use super::trait_::Regularizer;

/// Pulls control points toward the evenly spaced lattice they started on.
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeRegularizer<const D: usize> {
    weight: f64,
    steps: [[f64; D]; D],
}

impl<const D: usize> LatticeRegularizer<D> {
    /// Measure the lattice steps from the first two points along each axis.
    ///
    /// Axes with a single control point get a zero step.
    pub fn from_grid(grid: &ControlGrid<D>, weight: f64) -> Self {
        let dims = grid.dims();
        let origin = grid.neighbor(&[0; D]).map(|p| p.coords).unwrap_or([0.0; D]);
        let steps = std::array::from_fn(|b| {
            let mut index = [0isize; D];
            index[b] = 1;
            match grid.neighbor(&index) {
                Some(next) if dims[b] > 1 => std::array::from_fn(|a| next.coords[a] - origin[a]),
                _ => [0.0; D],
            }
        });
        Self { weight, steps }
    }

    /// Lattice step along grid axis `axis`.
    pub fn step(&self, axis: usize) -> &[f64; D] {
        &self.steps[axis]
    }

    /// Visit every existing neighbour of `index` with its expected
    /// displacement and the observed deviation from it.
    fn for_each_deviation<F>(&self, grid: &ControlGrid<D>, index: &[usize; D], mut f: F)
    where
        F: FnMut([f64; D]),
    {
        let signed: [isize; D] = index.map(|i| i as isize);
        let Some(current) = grid.neighbor(&signed) else {
            return;
        };

        for code in 0..3usize.pow(D as u32) {
            let mut offset = [0isize; D];
            let mut rest = code;
            for o in offset.iter_mut() {
                *o = (rest % 3) as isize - 1;
                rest /= 3;
            }
            if offset.iter().all(|&o| o == 0) {
                continue;
            }

            let neighbor_index: [isize; D] = std::array::from_fn(|a| signed[a] + offset[a]);
            let Some(neighbor) = grid.neighbor(&neighbor_index) else {
                continue;
            };

            let deviation = std::array::from_fn(|a| {
                let expected: f64 = (0..D).map(|b| offset[b] as f64 * self.steps[b][a]).sum();
                neighbor.coords[a] - current.coords[a] - expected
            });
            f(deviation);
        }
    }
}

impl<const D: usize> Regularizer<D> for LatticeRegularizer<D> {
    fn gradient_at(&self, grid: &ControlGrid<D>, index: &[usize; D]) -> [f64; D] {
        let mut sum = [0.0; D];
        let mut count = 0usize;
        self.for_each_deviation(grid, index, |deviation| {
            for a in 0..D {
                sum[a] += 2.0 * deviation[a];
            }
            count += 1;
        });
        if count == 0 {
            return [0.0; D];
        }
        sum.map(|s| s / count as f64)
    }

    fn energy(&self, grid: &ControlGrid<D>) -> f64 {
        let mut energy = 0.0;
        for offset in 0..grid.len() {
            let Ok(index) = grid.index_of(offset) else {
                continue;
            };
            self.for_each_deviation(grid, &index, |deviation| {
                energy += deviation.iter().map(|d| d * d).sum::<f64>();
            });
        }
        energy
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsreg_core::ControlPoint;

    fn lattice() -> ControlGrid<2> {
        ControlGrid::from_fn([3, 4], |[i, j]| ControlPoint::new([i as f64 * 2.0, j as f64 * 0.5 - 1.0])).unwrap()
    }

    #[test]
    fn test_steps_measured_from_grid() {
        let regularizer = LatticeRegularizer::from_grid(&lattice(), 0.5);
        assert_eq!(regularizer.step(0), &[2.0, 0.0]);
        assert_eq!(regularizer.step(1), &[0.0, 0.5]);
        assert_eq!(regularizer.weight(), 0.5);
    }

    #[test]
    fn test_uniform_lattice_has_no_penalty() {
        let grid = lattice();
        let regularizer = LatticeRegularizer::from_grid(&grid, 1.0);
        assert!(regularizer.energy(&grid).abs() < 1e-12);
        for index in [[0, 0], [1, 2], [2, 3]] {
            let g = regularizer.gradient_at(&grid, &index);
            assert!(g.iter().all(|v| v.abs() < 1e-12));
        }
    }

    #[test]
    fn test_displaced_point_is_pulled_back() {
        let mut grid = lattice();
        let regularizer = LatticeRegularizer::from_grid(&grid, 1.0);
        grid.get_mut(&[1, 1]).unwrap().coords[0] += 0.6;

        let g = regularizer.gradient_at(&grid, &[1, 1]);
        // All eight neighbours see the point 0.6 too far along x.
        assert!((g[0] + 1.2).abs() < 1e-12);
        assert!(g[1].abs() < 1e-12);

        // A neighbour is pulled toward the displaced point, averaged over
        // its three neighbours.
        let corner = regularizer.gradient_at(&grid, &[0, 0]);
        assert!((corner[0] - 2.0 * 0.6 / 3.0).abs() < 1e-12);

        // Sixteen ordered pairs involve the displaced point.
        assert!((regularizer.energy(&grid) - 16.0 * 0.36).abs() < 1e-9);
    }

    #[test]
    fn test_single_point_axis() {
        let grid = ControlGrid::from_fn([1, 3], |[_, j]| ControlPoint::new([0.0, j as f64])).unwrap();
        let regularizer = LatticeRegularizer::from_grid(&grid, 1.0);
        assert_eq!(regularizer.step(0), &[0.0, 0.0]);
        assert!(regularizer.energy(&grid).abs() < 1e-12);
    }
}
