use femlayout::mesh::procedural::create_unit_square_uniform_tri_mesh_2d;
use femlayout::space::{AffineMap, FunctionSpace, LinearLagrange};
use femlayout::Error;
use matrixcompare::assert_scalar_eq;
use nalgebra::{Matrix2, Point2, Point3, Vector2, Vector3, U2, U3};
use proptest::prelude::*;
use util::assert_approx_matrix_eq;

#[test]
fn triangle_basis_is_nodal() {
    let space = LinearLagrange::<f64, U2>::new();
    assert_eq!(space.dim(), 3);
    for i in 0..3 {
        let node = space.reference_node(i).unwrap();
        for j in 0..3 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_scalar_eq!(space.evaluate_basis(j, &node).unwrap(), expected, comp = abs, tol = 1e-14);
        }
    }
    assert!(matches!(space.reference_node(3), Err(Error::OutOfRange { .. })));
}

#[test]
fn tetrahedron_reference_gradients() {
    let space = LinearLagrange::<f64, U3>::new();
    let xi = Point3::origin();
    assert_eq!(space.dim(), 4);
    assert_eq!(space.evaluate_basis_gradient(0, &xi), Ok(Vector3::repeat(-0.5)));
    assert_eq!(space.evaluate_basis_gradient(2, &xi), Ok(Vector3::new(0.0, 0.5, 0.0)));
}

#[test]
fn evaluating_nonexistent_basis_function_is_out_of_range() {
    let mut space = LinearLagrange::<f64, U2>::new();
    let xi = Point2::origin();
    assert!(matches!(
        space.evaluate_basis(5, &xi),
        Err(Error::OutOfRange { index: 5, bound: 3, .. })
    ));
    assert!(matches!(space.evaluate_basis(3, &xi), Err(Error::OutOfRange { .. })));
    assert!(matches!(space.evaluate_basis_gradient(7, &xi), Err(Error::OutOfRange { .. })));

    space.update(&AffineMap::identity()).unwrap();
    assert!(matches!(space.evaluate_basis_gradient(3, &xi), Err(Error::OutOfRange { .. })));
}

#[test]
fn identity_map_leaves_reference_gradients_unchanged() {
    let map = AffineMap::<f64, U2>::identity();
    assert_eq!(map.jacobian(), &Matrix2::identity());
    assert_eq!(map.translation(), &Vector2::zeros());
    assert_eq!(map.map_reference_coords(&Point2::new(0.25, -0.5)), Point2::new(0.25, -0.5));

    let mut space = LinearLagrange::<f64, U2>::new();
    space.update(&map).unwrap();
    let xi = Point2::origin();
    assert_eq!(space.evaluate_basis_gradient(1, &xi), Ok(Vector2::new(0.5, 0.0)));
}

#[test]
fn gradients_are_pulled_back_after_update() {
    let vertices = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)];
    let map = AffineMap::from_simplex_vertices(&vertices).unwrap();
    assert_approx_matrix_eq!(map.jacobian(), &Matrix2::new(0.5, 0.0, 0.0, 0.5), abstol = 1e-14);

    let mut space = LinearLagrange::<f64, U2>::new();
    space.update(&map).unwrap();
    let xi = Point2::new(-0.3, 0.1);
    assert_approx_matrix_eq!(
        space.evaluate_basis_gradient(0, &xi).unwrap(),
        Vector2::new(-1.0, -1.0),
        abstol = 1e-14
    );
    assert_approx_matrix_eq!(space.evaluate_basis_gradient(1, &xi).unwrap(), Vector2::new(1.0, 0.0), abstol = 1e-14);
    assert_approx_matrix_eq!(space.evaluate_basis_gradient(2, &xi).unwrap(), Vector2::new(0.0, 1.0), abstol = 1e-14);
}

#[test]
fn affine_map_sends_reference_corners_to_cell_vertices() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2);
    let space = LinearLagrange::<f64, U2>::new();
    for cell in mesh.cells() {
        let map = AffineMap::from_cell(&cell).unwrap();
        for i in 0..3 {
            let mapped = map.map_reference_coords(&space.reference_node(i).unwrap());
            let vertex = cell.vertex(i).unwrap();
            assert_approx_matrix_eq!(mapped.coords, vertex.coords, abstol = 1e-14);
        }
    }
}

#[test]
fn degenerate_cells_are_rejected() {
    let collinear = [Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), Point2::new(2.0, 2.0)];
    let map = AffineMap::from_simplex_vertices(&collinear).unwrap();
    let mut space = LinearLagrange::<f64, U2>::new();
    assert!(matches!(space.update(&map), Err(Error::InvalidArgument(_))));

    let too_few = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
    assert!(matches!(AffineMap::from_simplex_vertices(&too_few), Err(Error::InvalidArgument(_))));
}

#[test]
fn dofs_are_vertex_evaluations() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1);
    let cell = mesh.cell(0).unwrap();
    let space = LinearLagrange::<f64, U2>::new();
    let f = |x: &Point2<f64>, t: f64| x.x + 10.0 * x.y + t;

    assert_eq!(space.global_dof(&cell, 2), Ok(3));
    assert_eq!(space.evaluate_dof(&cell, 2, &f, 0.5), Ok(11.5));
    assert!(matches!(space.global_dof(&cell, 3), Err(Error::OutOfRange { .. })));
    assert!(matches!(space.evaluate_dof(&cell, 3, &f, 0.0), Err(Error::OutOfRange { .. })));
}

proptest! {
    #[test]
    fn triangle_basis_is_partition_of_unity(x in -1.0..1.0, y in -1.0..1.0) {
        let space = LinearLagrange::<f64, U2>::new();
        let xi = Point2::new(x, y);
        let sum: f64 = (0..space.dim()).map(|i| space.evaluate_basis(i, &xi).unwrap()).sum();
        prop_assert!((sum - 1.0).abs() <= 1e-14);

        let gradient_sum: Vector2<f64> = (0..space.dim())
            .map(|i| space.evaluate_basis_gradient(i, &xi).unwrap())
            .sum();
        prop_assert!(gradient_sum.norm() <= 1e-14);
    }
}
