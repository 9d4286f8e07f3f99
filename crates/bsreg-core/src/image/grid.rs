use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use super::region::Region;

/// Generate the continuous indices of every voxel in `region`.
///
/// Returns a tensor of shape `[N, D]` in the region's iteration order
/// (x fastest), each row holding `(x, y[, z])`.
///
/// # Arguments
/// * `region` - The voxel region to enumerate
/// * `device` - The device to create the tensor on
pub fn generate_grid<B, const D: usize>(region: &Region<D>, device: &B::Device) -> Tensor<B, 2>
where
    B: Backend,
{
    let total = region.num_voxels();
    let mut grid = Vec::with_capacity(total * D);
    for index in region {
        grid.extend(index.iter().map(|&i| i as f32));
    }

    Tensor::<B, 1>::from_data(TensorData::new(grid, Shape::new([total * D])), device)
        .reshape([total, D])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn test_grid_order() {
        let device = Default::default();
        let grid = generate_grid::<Backend, 3>(&Region::new([1, 0, 2], [2, 2, 1]), &device);
        assert_eq!(grid.dims(), [4, 3]);
        let values: Vec<f64> = grid.to_data().iter::<f64>().collect();
        assert_eq!(
            values,
            vec![1.0, 0.0, 2.0, 2.0, 0.0, 2.0, 1.0, 1.0, 2.0, 2.0, 1.0, 2.0]
        );
    }
}
