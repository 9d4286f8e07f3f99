//! Dense 2D/3D arrays of control points.

use super::control_point::ControlPoint;
use crate::error::{Result, SplineError};

/// Dense grid of control points indexed by `[i, j]` or `[i, j, k]`.
///
/// Storage is row-major with the last axis fastest. Extents are fixed at
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlGrid<const D: usize> {
    dims: [usize; D],
    points: Vec<ControlPoint<D>>,
}

impl<const D: usize> ControlGrid<D> {
    /// Grid of default control points (origin, unit weight).
    pub fn new(dims: [usize; D]) -> Result<Self> {
        Self::check_dims(&dims)?;
        Ok(Self {
            dims,
            points: vec![ControlPoint::default(); dims.iter().product()],
        })
    }

    /// Grid from control points laid out row-major, last axis fastest.
    pub fn from_points(dims: [usize; D], points: Vec<ControlPoint<D>>) -> Result<Self> {
        Self::check_dims(&dims)?;
        let expected: usize = dims.iter().product();
        if points.len() != expected {
            return Err(SplineError::dimension_mismatch(format!(
                "grid {:?} needs {} control points, got {}",
                dims,
                expected,
                points.len()
            )));
        }
        Ok(Self { dims, points })
    }

    /// Grid whose control point at `index` is `f(index)`.
    pub fn from_fn<F>(dims: [usize; D], mut f: F) -> Result<Self>
    where
        F: FnMut([usize; D]) -> ControlPoint<D>,
    {
        Self::check_dims(&dims)?;
        let len: usize = dims.iter().product();
        let points = (0..len).map(|o| f(unravel(&dims, o))).collect();
        Ok(Self { dims, points })
    }

    fn check_dims(dims: &[usize; D]) -> Result<()> {
        if dims.iter().any(|&d| d == 0) {
            return Err(SplineError::dimension_mismatch(format!(
                "control grid extents must be positive, got {:?}",
                dims
            )));
        }
        Ok(())
    }

    pub fn dims(&self) -> [usize; D] {
        self.dims
    }

    /// Total number of control points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ControlPoint<D>] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [ControlPoint<D>] {
        &mut self.points
    }

    /// Storage offset of `index`.
    pub fn offset(&self, index: &[usize; D]) -> Result<usize> {
        if index.iter().zip(&self.dims).any(|(&i, &d)| i >= d) {
            return Err(SplineError::out_of_range(format!(
                "{:?} outside control grid {:?}",
                index, self.dims
            )));
        }
        Ok(offset_unchecked(&self.dims, index))
    }

    /// Grid index of the control point stored at `offset`.
    pub fn index_of(&self, offset: usize) -> Result<[usize; D]> {
        if offset >= self.points.len() {
            return Err(SplineError::out_of_range(format!(
                "offset {} outside control grid of {} points",
                offset,
                self.points.len()
            )));
        }
        Ok(unravel(&self.dims, offset))
    }

    pub fn get(&self, index: &[usize; D]) -> Result<&ControlPoint<D>> {
        let offset = self.offset(index)?;
        Ok(&self.points[offset])
    }

    pub fn get_mut(&mut self, index: &[usize; D]) -> Result<&mut ControlPoint<D>> {
        let offset = self.offset(index)?;
        Ok(&mut self.points[offset])
    }

    pub fn set(&mut self, index: &[usize; D], point: ControlPoint<D>) -> Result<()> {
        *self.get_mut(index)? = point;
        Ok(())
    }

    /// Whether a signed index lies inside the grid. Used by neighbour walks.
    pub fn contains(&self, index: &[isize; D]) -> bool {
        index
            .iter()
            .zip(&self.dims)
            .all(|(&i, &d)| i >= 0 && (i as usize) < d)
    }

    /// Control point at a signed index, `None` outside the grid.
    pub fn neighbor(&self, index: &[isize; D]) -> Option<&ControlPoint<D>> {
        if !self.contains(index) {
            return None;
        }
        let index: [usize; D] = index.map(|i| i as usize);
        Some(&self.points[offset_unchecked(&self.dims, &index)])
    }

    pub(crate) fn point_unchecked(&self, index: &[usize; D]) -> &ControlPoint<D> {
        &self.points[offset_unchecked(&self.dims, index)]
    }

    /// Number of scalar parameters (`len * D`, weights excluded).
    pub fn parameter_count(&self) -> usize {
        self.points.len() * D
    }

    /// Coordinates flattened control-point-major, axis-minor.
    pub fn parameters(&self) -> Vec<f64> {
        self.points.iter().flat_map(|p| p.coords).collect()
    }

    /// Overwrite coordinates from a control-point-major, axis-minor vector.
    pub fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        if parameters.len() != self.parameter_count() {
            return Err(SplineError::dimension_mismatch(format!(
                "expected {} parameters, got {}",
                self.parameter_count(),
                parameters.len()
            )));
        }
        for (point, chunk) in self.points.iter_mut().zip(parameters.chunks_exact(D)) {
            point.coords.copy_from_slice(chunk);
        }
        Ok(())
    }
}

fn offset_unchecked<const D: usize>(dims: &[usize; D], index: &[usize; D]) -> usize {
    index
        .iter()
        .zip(dims)
        .fold(0, |acc, (&i, &d)| acc * d + i)
}

fn unravel<const D: usize>(dims: &[usize; D], mut offset: usize) -> [usize; D] {
    let mut index = [0usize; D];
    for axis in (0..D).rev() {
        index[axis] = offset % dims[axis];
        offset /= dims[axis];
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexing_last_axis_fastest() {
        let grid = ControlGrid::from_fn([2, 3], |[i, j]| ControlPoint::new([i as f64, j as f64])).unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.offset(&[0, 1]).unwrap(), 1);
        assert_eq!(grid.offset(&[1, 0]).unwrap(), 3);
        assert_eq!(grid.get(&[1, 2]).unwrap().coords, [1.0, 2.0]);
        assert_eq!(grid.index_of(5).unwrap(), [1, 2]);
    }

    #[test]
    fn test_out_of_range() {
        let mut grid = ControlGrid::<3>::new([2, 2, 2]).unwrap();
        assert!(matches!(grid.get(&[2, 0, 0]), Err(SplineError::OutOfRangeIndex(_))));
        assert!(grid.set(&[0, 0, 5], ControlPoint::default()).is_err());
        assert!(grid.index_of(8).is_err());
        assert!(!grid.contains(&[-1, 0, 0]));
        assert!(grid.contains(&[1, 1, 1]));
        assert!(grid.neighbor(&[0, 2, 0]).is_none());
    }

    #[test]
    fn test_zero_extent_rejected() {
        assert!(ControlGrid::<2>::new([0, 3]).is_err());
        assert!(ControlGrid::from_points([2, 2], vec![ControlPoint::default(); 3]).is_err());
    }

    #[test]
    fn test_parameters_round_trip() {
        let mut grid = ControlGrid::<2>::new([2, 2]).unwrap();
        let params: Vec<f64> = (0..8).map(|v| v as f64).collect();
        grid.set_parameters(&params).unwrap();
        assert_eq!(grid.get(&[0, 1]).unwrap().coords, [2.0, 3.0]);
        assert_eq!(grid.parameters(), params);
        assert!(grid.set_parameters(&params[..7]).is_err());
    }

    #[test]
    fn test_clone_is_deep() {
        let grid = ControlGrid::<2>::new([2, 2]).unwrap();
        let mut copy = grid.clone();
        copy.set(&[0, 0], ControlPoint::new([5.0, 5.0])).unwrap();
        assert_eq!(grid.get(&[0, 0]).unwrap().coords, [0.0, 0.0]);
    }
}
