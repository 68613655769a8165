use nalgebra::{Rotation3, SMatrix, Vector3};
use proptest::prelude::*;
use warpfield_core::geometry::{Point2, Point3, Spacing2, Spacing3};
use warpfield_core::grid::{GridRegion, Lattice};
use warpfield_core::transform::{AdvancedTransform, BSplineDeformableTransform};
use warpfield_core::SplineOrder;

const N: usize = 6;

fn lattice_3d(ax: f64, ay: f64, az: f64) -> Lattice<3> {
    let direction = Rotation3::from_euler_angles(ax, ay, az).into_inner();
    Lattice::with_geometry(
        GridRegion::new([-1, 0, 0], [N, N, N]),
        Point3::new(4.0, -2.0, 0.5),
        Spacing3::new(1.2, 0.7, 2.0),
        direction,
    )
    .unwrap()
}

fn wavy_parameters(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.4 * (i as f64 * 1.3).cos()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn test_plain_and_diagnostic_transform_agree(
        ci in -2.5f64..5.5, cj in -1.5f64..6.5, ck in -1.5f64..6.5,
        order in 0usize..=3,
    ) {
        let params = wavy_parameters(3 * N * N * N);
        let lattice = lattice_3d(0.3, -0.2, 1.1);
        let point = lattice.transform_continuous_index_to_point(&Point3::new(ci, cj, ck));
        let mut transform =
            BSplineDeformableTransform::with_lattice(SplineOrder::new(order).unwrap(), lattice).unwrap();
        transform.set_parameters(&params).unwrap();
        let mut ctx = transform.new_context();

        let plain = transform.transform_point(&point);
        let diagnostic = transform.transform_point_with_weights(&point, &mut ctx);
        prop_assert_eq!(plain.inside, diagnostic.inside);
        prop_assert!((plain.point - diagnostic.point).amax() < 1e-12);
    }
}

proptest! {
    #[test]
    fn test_support_size_and_partition_of_unity(
        ci in -0.5f64..4.5, cj in 0.5f64..5.5, ck in 0.5f64..5.5,
        order in 0usize..=3,
    ) {
        let params = wavy_parameters(3 * N * N * N);
        let lattice = lattice_3d(-0.7, 0.4, 0.2);
        let point = lattice.transform_continuous_index_to_point(&Point3::new(ci, cj, ck));
        let mut transform =
            BSplineDeformableTransform::with_lattice(SplineOrder::new(order).unwrap(), lattice).unwrap();
        transform.set_parameters(&params).unwrap();
        let mut ctx = transform.new_context();

        if transform.transform_point_with_weights(&point, &mut ctx).inside {
            prop_assert_eq!(ctx.parameter_indices().len(), (order + 1).pow(3));
            prop_assert_eq!(ctx.weights().len(), transform.number_of_weights());
            let sum: f64 = ctx.weights().iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-12);

            let mut jsj = Vec::new();
            let mut nonzero = Vec::new();
            transform.jacobian_of_spatial_jacobian(&point, &mut ctx, &mut jsj, &mut nonzero);
            prop_assert_eq!(nonzero.len(), transform.number_of_nonzero_jacobian_indices());
            prop_assert!(nonzero.iter().all(|&i| i < transform.number_of_parameters()));
        }
    }

    #[test]
    fn test_spatial_hessian_symmetric(
        ci in 1.0f64..3.0, cj in 1.0f64..4.0, ck in 1.0f64..4.0,
        order in 2usize..=3,
    ) {
        let params = wavy_parameters(3 * N * N * N);
        let lattice = lattice_3d(0.9, 0.1, -0.4);
        let point = lattice.transform_continuous_index_to_point(&Point3::new(ci, cj, ck));
        let mut transform =
            BSplineDeformableTransform::with_lattice(SplineOrder::new(order).unwrap(), lattice).unwrap();
        transform.set_parameters(&params).unwrap();
        let mut ctx = transform.new_context();

        let hessian = transform.spatial_hessian(&point, &mut ctx);
        for matrix in &hessian {
            prop_assert_eq!(*matrix, matrix.transpose());
        }
        let mut jsh = Vec::new();
        let mut nonzero = Vec::new();
        transform.jacobian_of_spatial_hessian(&point, &mut ctx, &mut jsh, &mut nonzero);
        for entry in &jsh {
            for matrix in entry {
                prop_assert_eq!(*matrix, matrix.transpose());
            }
        }
    }

    #[test]
    fn test_zero_coefficients_identity_spatial_jacobian(
        ci in 0.0f64..4.0, cj in 0.0f64..4.0,
        sx in 0.2f64..3.0, sy in 0.2f64..3.0,
        angle in -3.1f64..3.1,
        order in 0usize..=3,
    ) {
        let params = vec![0.0; 2 * N * N];
        let direction = nalgebra::Rotation2::new(angle).into_inner();
        let lattice = Lattice::with_geometry(
            GridRegion::from_size([N, N]),
            Point2::new(1.0, 1.0),
            Spacing2::new(sx, sy),
            direction,
        )
        .unwrap();
        let point = lattice.transform_continuous_index_to_point(&Point2::new(ci, cj));
        let mut transform =
            BSplineDeformableTransform::with_lattice(SplineOrder::new(order).unwrap(), lattice).unwrap();
        transform.set_parameters(&params).unwrap();
        let mut ctx = transform.new_context();

        prop_assert_eq!(
            transform.spatial_jacobian(&point, &mut ctx),
            SMatrix::<f64, 2, 2>::identity()
        );
    }

    #[test]
    fn test_repeated_queries_identical(
        ci in 0.0f64..5.0, cj in 0.0f64..5.0, ck in 0.0f64..5.0,
    ) {
        let params = wavy_parameters(3 * N * N * N);
        let lattice = lattice_3d(0.2, 0.2, 0.2);
        let point = lattice.transform_continuous_index_to_point(&Point3::new(ci, cj, ck));
        let mut transform = BSplineDeformableTransform::with_lattice(SplineOrder::CUBIC, lattice).unwrap();
        transform.set_parameters(&params).unwrap();
        let mut ctx = transform.new_context();

        let first = transform.transform_point(&point);
        // Scratch from an unrelated query must not leak into the next one.
        let elsewhere = point + Vector3::new(0.9, -0.4, 1.3);
        transform.spatial_hessian(&elsewhere, &mut ctx);
        prop_assert_eq!(transform.transform_point(&point), first);
        prop_assert_eq!(transform.transform_point_with_weights(&point, &mut ctx), first);

        let sj = transform.spatial_jacobian(&point, &mut ctx);
        transform.spatial_jacobian(&elsewhere, &mut ctx);
        prop_assert_eq!(transform.spatial_jacobian(&point, &mut ctx), sj);
    }
}
