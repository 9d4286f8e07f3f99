use bsreg_core::image::Image;
use bsreg_core::spatial::{Direction, Point, Spacing};
use burn::tensor::Tensor;
use burn_ndarray::NdArray;
use nalgebra::{Rotation3, Vector3};
use proptest::prelude::*;

type Backend = NdArray<f32>;
const D: usize = 3;

fn make_rotation(angle_x: f64, angle_y: f64, angle_z: f64) -> Direction<D> {
    Rotation3::from_euler_angles(angle_x, angle_y, angle_z).into_inner()
}

fn image(origin: [f64; 3], spacing: [f64; 3], direction: Direction<D>) -> Image<Backend, D> {
    let device = Default::default();
    let data = Tensor::<Backend, D>::zeros([2, 3, 4], &device);
    Image::new(data, Point::from(origin), Spacing::from(spacing), direction).unwrap()
}

#[test]
fn test_rotated_image_transform() {
    // 90 degrees about z: index x runs along physical y.
    let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
    let image = image([0.0; 3], [1.0; 3], rotation.into_inner());

    let index = image.transform_physical_point_to_continuous_index(&Point::from([1.0, 0.0, 0.0]));
    assert!((index[0] - 0.0).abs() < 1e-9);
    assert!((index[1] + 1.0).abs() < 1e-9);
    assert!((index[2] - 0.0).abs() < 1e-9);

    let device = Default::default();
    let points = Tensor::<Backend, 2>::from_floats([[1.0, 0.0, 0.0]], &device);
    let indices: Vec<f64> = image.world_to_index_tensor(points).into_data().iter::<f64>().collect();
    assert!((indices[0] - 0.0).abs() < 1e-5);
    assert!((indices[1] + 1.0).abs() < 1e-5);
    assert!((indices[2] - 0.0).abs() < 1e-5);
}

#[test]
fn test_rotated_bounding_box_covers_corners() {
    let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
    let image = image([5.0, 5.0, 0.0], [1.0, 2.0, 1.0], rotation.into_inner());
    let (start, extent) = image.physical_bounding_box();
    // Size (4, 3, 2): x extent 3 runs along +y, y extent 4 runs along -x.
    assert!((start[0] - 1.0).abs() < 1e-9);
    assert!((start[1] - 5.0).abs() < 1e-9);
    assert!((extent[0] - 4.0).abs() < 1e-9);
    assert!((extent[1] - 3.0).abs() < 1e-9);
    assert!((extent[2] - 1.0).abs() < 1e-9);
}

proptest! {
    #[test]
    fn test_coordinate_roundtrip(
        ox in -100.0f64..100.0, oy in -100.0f64..100.0, oz in -100.0f64..100.0,
        sx in 0.1f64..5.0, sy in 0.1f64..5.0, sz in 0.1f64..5.0,
        ax in -3.14f64..3.14, ay in -3.14f64..3.14, az in -3.14f64..3.14,
        px in -50.0f64..50.0, py in -50.0f64..50.0, pz in -50.0f64..50.0
    ) {
        let image = image([ox, oy, oz], [sx, sy, sz], make_rotation(ax, ay, az));
        let point = Point::<D>::from([px, py, pz]);

        let index = image.transform_physical_point_to_continuous_index(&point);
        let recovered = image.transform_continuous_index_to_physical_point(&index);

        for a in 0..D {
            prop_assert!((point[a] - recovered[a]).abs() < 1e-6, "axis {}: {} vs {}", a, point[a], recovered[a]);
        }
    }

    #[test]
    fn test_tensor_batch_consistency(
        ox in -10.0f64..10.0,
        sx in 0.5f64..2.0,
        angle in -3.14f64..3.14,
        px in -10.0f64..10.0, py in -10.0f64..10.0
    ) {
        let device = Default::default();
        let image = image([ox, -ox, 0.5 * ox], [sx, 2.0 * sx, 1.0], make_rotation(0.0, 0.0, angle));

        let index = image.transform_physical_point_to_continuous_index(&Point::from([px, py, 1.0]));
        let points = Tensor::<Backend, 2>::from_floats([[px as f32, py as f32, 1.0]], &device);
        let indices: Vec<f64> = image.world_to_index_tensor(points).into_data().iter::<f64>().collect();

        for a in 0..D {
            prop_assert!((indices[a] - index[a]).abs() < 1e-3);
        }
    }
}
