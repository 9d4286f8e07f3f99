//! Batched tensor evaluation of tensor-product B-spline deformations.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use super::trait_::Transform;
use crate::spline::{BSpline, BasisEvaluation};

/// Points are evaluated on the host in `f64` and uploaded again.
impl<B: Backend, const D: usize> Transform<B, D> for BSpline<D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let [batch, _] = points.dims();
        let coords: Vec<f64> = points.into_data().iter::<f64>().collect();

        let mut evaluation = BasisEvaluation::default();
        let mut out = Vec::with_capacity(batch * D);
        for chunk in coords.chunks_exact(D) {
            let params: [f64; D] = std::array::from_fn(|a| chunk[a]);
            let deformed = self.point_at_with_basis(&params, &mut evaluation);
            out.extend(deformed.coords.iter().map(|&c| c as f32));
        }

        Tensor::<B, 1>::from_data(TensorData::new(out, Shape::new([batch * D])), &device)
            .reshape([batch, D])
    }
}
