//! Image type with physical metadata and coordinate transformations.
//!
//! Pixel data lives in a burn tensor laid out `[Y, X]` (2D) or `[Z, Y, X]`
//! (3D). Indices and points are always given in axis order `(x, y[, z])`.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use super::region::Region;
use crate::error::{Result, SplineError};
use crate::spatial::{Direction, Point, Spacing, Vector};

/// Image with physical metadata.
///
/// # Coordinate Systems
/// * **Index Space**: continuous voxel indices, `(0, 0[, 0])` is the first voxel
/// * **Physical Space**: `point = origin + Direction * (index * spacing)`
///
/// # Examples
/// ```rust
/// use bsreg_core::Image;
/// use bsreg_core::spatial::{Direction2, Point2, Spacing2};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 2>::zeros([8, 16], &device);
/// let image = Image::new(
///     data,
///     Point2::new(0.0, 0.0),
///     Spacing2::new(1.0, 1.0),
///     Direction2::identity(),
/// )
/// .unwrap();
/// assert_eq!(image.size(), [16, 8]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
    inverse_direction: Direction<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create a new image with the given data and metadata.
    ///
    /// # Errors
    /// Returns [`SplineError::InvalidGeometry`] if a spacing is not strictly
    /// positive or the direction matrix is singular.
    pub fn new(
        data: Tensor<B, D>,
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Result<Self> {
        if spacing.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
            return Err(SplineError::invalid_geometry(format!(
                "spacing must be positive, got {:?}",
                spacing.as_slice()
            )));
        }
        let inverse_direction = direction
            .try_inverse()
            .ok_or_else(|| SplineError::invalid_geometry("direction matrix is singular"))?;

        Ok(Self {
            data,
            origin,
            spacing,
            direction,
            inverse_direction,
        })
    }

    /// Create an image from host values ordered x fastest.
    ///
    /// # Errors
    /// Returns [`SplineError::DimensionMismatch`] if `values.len()` differs
    /// from the product of `size`.
    pub fn from_values(
        values: Vec<f32>,
        size: [usize; D],
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
        device: &B::Device,
    ) -> Result<Self> {
        let expected: usize = size.iter().product();
        if values.len() != expected {
            return Err(SplineError::dimension_mismatch(format!(
                "image of size {:?} needs {} values, got {}",
                size,
                expected,
                values.len()
            )));
        }
        let mut shape = size;
        shape.reverse();
        let data = Tensor::<B, D>::from_data(TensorData::new(values, Shape::new(shape)), device);
        Self::new(data, origin, spacing, direction)
    }

    /// Image with the same geometry and new pixel data.
    pub fn with_data(&self, data: Tensor<B, D>) -> Result<Self> {
        if data.dims() != self.shape() {
            return Err(SplineError::dimension_mismatch(format!(
                "data shape {:?} does not match image shape {:?}",
                data.dims(),
                self.shape()
            )));
        }
        Ok(Self {
            data,
            ..self.clone()
        })
    }

    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    pub fn inverse_direction(&self) -> &Direction<D> {
        &self.inverse_direction
    }

    /// Tensor shape, slowest axis first (`[Y, X]` or `[Z, Y, X]`).
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    /// Number of voxels along each axis in `(x, y[, z])` order.
    pub fn size(&self) -> [usize; D] {
        let mut size = self.shape();
        size.reverse();
        size
    }

    pub fn num_voxels(&self) -> usize {
        self.shape().iter().product()
    }

    /// Region covering the whole image.
    pub fn largest_region(&self) -> Region<D> {
        Region::from_size(self.size())
    }

    /// Pixel values copied to the host, x fastest.
    pub fn values(&self) -> Vec<f64> {
        self.data.to_data().iter::<f64>().collect()
    }

    /// Whether both images share size, origin, spacing and direction.
    pub fn same_geometry(&self, other: &Image<B, D>) -> bool {
        const TOLERANCE: f64 = 1e-9;
        self.size() == other.size()
            && (self.origin - other.origin).amax() < TOLERANCE
            && (self.spacing - other.spacing).amax() < TOLERANCE
            && (self.direction - other.direction).amax() < TOLERANCE
    }

    /// Convert a physical point to a continuous index.
    ///
    /// `index = (Direction^-1 * (point - origin)) / spacing`
    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        let rotated = self.inverse_direction * (*point - self.origin);
        Point::from(rotated.component_div(&self.spacing))
    }

    /// Convert a continuous index to a physical point.
    ///
    /// `point = origin + Direction * (index * spacing)`
    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        let scaled: Vector<D> = index.coords.component_mul(&self.spacing);
        self.origin + self.direction * scaled
    }

    /// Physical position of an integer voxel index.
    pub fn index_to_physical_point(&self, index: &[usize; D]) -> Point<D> {
        let index = Point::from(index.map(|i| i as f64));
        self.transform_continuous_index_to_physical_point(&index)
    }

    /// Axis-aligned physical bounding box of the voxel centres.
    ///
    /// Returns the minimum corner and the extent along each axis.
    pub fn physical_bounding_box(&self) -> ([f64; D], [f64; D]) {
        let size = self.size();
        let mut min = [f64::INFINITY; D];
        let mut max = [f64::NEG_INFINITY; D];

        for corner in 0..(1usize << D) {
            let index = Point::from(std::array::from_fn(|a| {
                if corner & (1 << a) != 0 {
                    (size[a] - 1) as f64
                } else {
                    0.0
                }
            }));
            let point = self.transform_continuous_index_to_physical_point(&index);
            for a in 0..D {
                min[a] = min[a].min(point[a]);
                max[a] = max[a].max(point[a]);
            }
        }

        (min, std::array::from_fn(|a| max[a] - min[a]))
    }

    /// Clamp a continuous index into `[0, size - 1]` on every axis.
    pub fn clamp_continuous_index(&self, index: &Point<D>) -> Point<D> {
        let size = self.size();
        Point::from(std::array::from_fn(|a| {
            index[a].clamp(0.0, (size[a] - 1) as f64)
        }))
    }

    /// Batch transform physical points to continuous indices.
    ///
    /// # Arguments
    /// * `points` - Tensor of shape `[Batch, D]` containing physical points
    ///
    /// # Returns
    /// Tensor of shape `[Batch, D]` containing continuous indices
    pub fn world_to_index_tensor(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let origin = self.origin_tensor(&device);

        // I = (P - O) @ T with T[r, c] = (D^-1)[c, r] / S[c]
        let mut t_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                t_data.push((self.inverse_direction[(c, r)] / self.spacing[c]) as f32);
            }
        }
        let t = Tensor::<B, 2>::from_data(TensorData::new(t_data, Shape::new([D, D])), &device);

        (points - origin).matmul(t)
    }

    /// Batch transform continuous indices to physical points.
    ///
    /// # Arguments
    /// * `indices` - Tensor of shape `[Batch, D]` containing continuous indices
    ///
    /// # Returns
    /// Tensor of shape `[Batch, D]` containing physical points
    pub fn index_to_world_tensor(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = indices.device();
        let origin = self.origin_tensor(&device);

        // P = O + I @ M with M[r, c] = S[r] * D[c, r]
        let mut m_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                m_data.push((self.spacing[r] * self.direction[(c, r)]) as f32);
            }
        }
        let m = Tensor::<B, 2>::from_data(TensorData::new(m_data, Shape::new([D, D])), &device);

        indices.matmul(m) + origin
    }

    fn origin_tensor(&self, device: &B::Device) -> Tensor<B, 2> {
        let origin: Vec<f32> = (0..D).map(|i| self.origin[i] as f32).collect();
        Tensor::<B, 1>::from_data(TensorData::new(origin, Shape::new([D])), device).reshape([1, D])
    }
}
