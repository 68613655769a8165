use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use rayon::prelude::*;
use warpfield_core::geometry::{Point3, Spacing3, SparseJacobian};
use warpfield_core::grid::{GridRegion, Lattice};
use warpfield_core::transform::{
    spatial_hessians, spatial_jacobians, transform_points, AdvancedTransform,
    BSplineDeformableTransform, Transform,
};
use warpfield_core::SplineOrder;

type B = NdArray<f32>;

const N: usize = 8;

fn parameters() -> Vec<f64> {
    (0..3 * N * N * N).map(|i| 0.5 * ((i * 7919) % 101) as f64 / 101.0 - 0.25).collect()
}

fn transform(params: &[f64]) -> BSplineDeformableTransform<'_, 3> {
    let lattice = Lattice::with_geometry(
        GridRegion::from_size([N, N, N]),
        Point3::new(-5.0, -5.0, -5.0),
        Spacing3::new(1.5, 1.5, 1.5),
        nalgebra::Rotation3::from_euler_angles(0.1, 0.2, 0.3).into_inner(),
    )
    .unwrap();
    let mut transform = BSplineDeformableTransform::with_lattice(SplineOrder::CUBIC, lattice).unwrap();
    transform.set_parameters(params).unwrap();
    transform
}

/// Deterministic scatter of points over and around the lattice.
fn sample_points(count: usize) -> Vec<Point3> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            Point3::new(
                -6.0 + (t * 0.618).fract() * 12.0,
                -6.0 + (t * 0.414).fract() * 12.0,
                -6.0 + (t * 0.732).fract() * 12.0,
            )
        })
        .collect()
}

#[test]
fn test_parallel_matches_serial_bitwise() {
    let params = parameters();
    let transform = transform(&params);
    let points = sample_points(4000);

    let mut ctx = transform.new_context();
    let serial_points: Vec<_> = points.iter().map(|p| transform.transform_point(p)).collect();
    let serial_jacobians: Vec<_> = points.iter().map(|p| transform.spatial_jacobian(p, &mut ctx)).collect();
    let serial_hessians: Vec<_> = points.iter().map(|p| transform.spatial_hessian(p, &mut ctx)).collect();

    assert_eq!(transform_points(&transform, &points), serial_points);
    assert_eq!(spatial_jacobians(&transform, &points), serial_jacobians);
    assert_eq!(spatial_hessians(&transform, &points), serial_hessians);
    assert!(serial_points.iter().any(|p| p.inside));
    assert!(serial_points.iter().any(|p| !p.inside));
}

#[test]
fn test_parallel_sparse_jacobians_with_own_contexts() {
    let params = parameters();
    let transform = transform(&params);
    let points = sample_points(1000);

    let parallel: Vec<(bool, SparseJacobian<3>, Vec<usize>)> = points
        .par_iter()
        .map_init(
            || transform.new_context(),
            |ctx, p| {
                let mut jacobian = SparseJacobian::<3>::zeros(0);
                let mut nonzero = Vec::new();
                let inside = transform.jacobian_sparse(p, ctx, &mut jacobian, &mut nonzero);
                (inside, jacobian, nonzero)
            },
        )
        .collect();

    let mut ctx = transform.new_context();
    let mut jacobian = SparseJacobian::<3>::zeros(0);
    let mut nonzero = Vec::new();
    for (p, (inside, expected_jacobian, expected_nonzero)) in points.iter().zip(&parallel) {
        let serial_inside = transform.jacobian_sparse(p, &mut ctx, &mut jacobian, &mut nonzero);
        assert_eq!(serial_inside, *inside);
        assert_eq!(&jacobian, expected_jacobian);
        assert_eq!(&nonzero, expected_nonzero);
    }
}

#[test]
fn test_scoped_threads_share_one_transform() {
    let params = parameters();
    let transform = transform(&params);
    let points = sample_points(600);
    let expected: Vec<_> = points.iter().map(|p| transform.transform_point(p)).collect();

    let results: Vec<Vec<_>> = std::thread::scope(|scope| {
        let handles: Vec<_> = points
            .chunks(150)
            .map(|chunk| {
                let transform = &transform;
                scope.spawn(move || {
                    let mut ctx = transform.new_context();
                    chunk
                        .iter()
                        .map(|p| transform.transform_point_with_weights(p, &mut ctx))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.concat(), expected);
}

#[test]
fn test_tensor_batch_adapter() {
    let params = parameters();
    let transform = transform(&params);
    let points = sample_points(64);
    let device = Default::default();

    let flat: Vec<f32> = points.iter().flat_map(|p| p.coords.iter().map(|v| *v as f32)).collect();
    let input = Tensor::<B, 2>::from_data(TensorData::new(flat.clone(), [points.len(), 3]), &device);
    let output = Transform::<B, 3>::transform_points(&transform, input);
    assert_eq!(output.dims(), [points.len(), 3]);

    let data = output.into_data();
    let actual = data.as_slice::<f32>().unwrap();
    for (row, chunk) in flat.chunks(3).enumerate() {
        let p = Point3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64);
        let expected = transform.transform_point(&p).point;
        for j in 0..3 {
            let got = actual[row * 3 + j] as f64;
            assert!((got - expected[j]).abs() < 1e-4, "row {} axis {}: {} vs {}", row, j, got, expected[j]);
        }
    }
}
