use femlayout::assembly::{assemble_pattern, ElementMatrixAssembler, ElementVectorAssembler, LayoutAssembler};
use femlayout::backend::LayoutBackend;
use femlayout::dofmap::DofMap;
use femlayout::element::{FiniteElement, ScalarElement};
use femlayout::eyre;
use femlayout::layout::{OwnershipRange, TensorLayout};
use femlayout::mesh::procedural::create_unit_square_uniform_tri_mesh_2d;
use femlayout::mesh::TriangleMesh2d;
use femlayout::partition::Partition;
use femlayout::space::{AffineMap, FunctionSpace, LinearLagrange};
use femlayout::Error;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut, Point2, U2};
use nalgebra_sparse::{CscMatrix, CsrMatrix};

type P1 = LinearLagrange<f64, U2>;

/// Stiffness matrix of the Laplace operator with P1 elements.
struct P1Stiffness<'a> {
    mesh: &'a TriangleMesh2d<f64>,
}

impl<'a> P1Stiffness<'a> {
    fn cell_space_and_area(&self, cell_index: usize) -> eyre::Result<(P1, f64)> {
        let cell = self.mesh.cell(cell_index)?;
        let map = AffineMap::from_cell(&cell)?;
        let mut space = P1::new();
        space.update(&map)?;
        // The reference triangle has area 2
        let area = 2.0 * map.jacobian().determinant().abs();
        Ok((space, area))
    }
}

impl<'a> ElementMatrixAssembler<f64> for P1Stiffness<'a> {
    fn assemble_element_matrix_into(&self, cell_index: usize, mut output: DMatrixViewMut<f64>) -> eyre::Result<()> {
        let (space, area) = self.cell_space_and_area(cell_index)?;
        let xi = Point2::origin();
        for i in 0..space.dim() {
            for j in 0..space.dim() {
                let grad_i = space.evaluate_basis_gradient(i, &xi)?;
                let grad_j = space.evaluate_basis_gradient(j, &xi)?;
                output[(i, j)] = area * grad_i.dot(&grad_j);
            }
        }
        Ok(())
    }
}

impl<'a> ElementVectorAssembler<f64> for P1Stiffness<'a> {
    fn assemble_element_vector_into(&self, cell_index: usize, mut output: DVectorViewMut<f64>) -> eyre::Result<()> {
        let (_, area) = self.cell_space_and_area(cell_index)?;
        output.fill(area / 3.0);
        Ok(())
    }
}

fn p1_element() -> ScalarElement<f64, P1> {
    FiniteElement::new(P1::new(), P1::new())
}

fn assembled_csr(dofmap: &DofMap, partition: &Partition, assembler: &P1Stiffness) -> (TensorLayout, CsrMatrix<f64>) {
    let layout = dofmap.tensor_layout(partition, 0, true).unwrap();
    assemble_pattern(dofmap, &layout).unwrap();
    let mut csr = CsrMatrix::init_from_layout(&layout).unwrap();
    LayoutAssembler::default()
        .assemble_into_csr(&mut csr, &layout, dofmap, assembler)
        .unwrap();
    (layout, csr)
}

#[test]
fn csr_and_dense_assembly_agree() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(3);
    let dofmap = DofMap::build(&p1_element(), &mesh).unwrap();
    let assembler = P1Stiffness { mesh: &mesh };

    let (_, csr) = assembled_csr(&dofmap, &Partition::serial(), &assembler);

    let dense_layout = dofmap
        .tensor_layout(&Partition::serial(), 0, false)
        .unwrap();
    let mut dense = DMatrix::init_from_layout(&dense_layout).unwrap();
    LayoutAssembler::default()
        .assemble_into_dense(&mut dense, &dense_layout, &dofmap, &assembler)
        .unwrap();

    assert_matrix_eq!(DMatrix::from(&csr), dense, comp = abs, tol = 1e-12);
}

#[test]
fn stiffness_matrix_is_symmetric_with_zero_row_sums() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(4);
    let dofmap = DofMap::build(&p1_element(), &mesh).unwrap();
    let (_, csr) = assembled_csr(&dofmap, &Partition::serial(), &P1Stiffness { mesh: &mesh });

    let dense = DMatrix::from(&csr);
    assert_matrix_eq!(dense, dense.transpose(), comp = abs, tol = 1e-12);
    let row_sums = dense.column_sum();
    assert_matrix_eq!(row_sums, DVector::zeros(dense.nrows()), comp = abs, tol = 1e-12);
}

#[test]
fn partitioned_csr_holds_owned_rows_of_serial_matrix() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(3);
    let dofmap = DofMap::build(&p1_element(), &mesh).unwrap();
    let assembler = P1Stiffness { mesh: &mesh };
    let (_, serial) = assembled_csr(&dofmap, &Partition::serial(), &assembler);
    let serial = DMatrix::from(&serial);

    for part in 0..3 {
        let partition = Partition::new(3, part).unwrap();
        let (layout, local) = assembled_csr(&dofmap, &partition, &assembler);
        let rows = layout.local_range(0).unwrap();
        assert_eq!(local.nrows(), rows.len());
        assert_eq!(local.ncols(), 16);

        let expected = serial.rows(rows.begin, rows.len()).into_owned();
        assert_matrix_eq!(DMatrix::from(&local), expected, comp = abs, tol = 1e-12);
    }
}

#[test]
fn entries_outside_pattern_are_rejected() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2);
    let element = p1_element();
    let dofmap = DofMap::build(&element, &mesh).unwrap();
    let first_cell_only = DofMap::from_cells(&element, mesh.cells().take(1)).unwrap();

    let layout = dofmap
        .tensor_layout(&Partition::serial(), 0, true)
        .unwrap();
    assemble_pattern(&first_cell_only, &layout).unwrap();
    let mut csr = CsrMatrix::init_from_layout(&layout).unwrap();

    let result = LayoutAssembler::default().assemble_into_csr(&mut csr, &layout, &dofmap, &P1Stiffness { mesh: &mesh });
    let err = result.unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidState(_))));
}

#[test]
fn load_vector_sums_to_domain_area() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(4);
    let dofmap = DofMap::build(&p1_element(), &mesh).unwrap();
    let assembler = P1Stiffness { mesh: &mesh };

    let mut total = 0.0;
    for part in 0..2 {
        let layout = dofmap
            .vector_layout(&Partition::new(2, part).unwrap())
            .unwrap();
        let mut vector = DVector::init_from_layout(&layout).unwrap();
        assert_eq!(vector.len(), layout.local_size(0).unwrap());
        LayoutAssembler::default()
            .assemble_into_vector(&mut vector, &layout, &dofmap, &assembler)
            .unwrap();
        total += vector.sum();
    }
    assert!((total - 1.0).abs() < 1e-12);
}

#[test]
fn backends_allocate_from_layout() {
    let ownership = vec![OwnershipRange::new(0, 3), OwnershipRange::full(6)];
    let dense = TensorLayout::new(vec![6, 6], 0, ownership.clone(), false).unwrap();
    let matrix = DMatrix::<f64>::init_from_layout(&dense).unwrap();
    assert_eq!(matrix.shape(), (3, 6));
    assert!(matches!(DVector::<f64>::init_from_layout(&dense), Err(Error::InvalidArgument(_))));
    assert!(matches!(CsrMatrix::<f64>::init_from_layout(&dense), Err(Error::InvalidArgument(_))));

    let sparse = TensorLayout::new(vec![6, 6], 0, ownership, true).unwrap();
    assert!(matches!(CsrMatrix::<f64>::init_from_layout(&sparse), Err(Error::InvalidState(_))));
    assert!(matches!(CscMatrix::<f64>::init_from_layout(&sparse), Err(Error::InvalidArgument(_))));

    let column_major = TensorLayout::new(vec![4, 5], 1, vec![OwnershipRange::full(4), OwnershipRange::new(1, 3)], true).unwrap();
    {
        let pattern = column_major.sparsity_pattern().unwrap();
        let mut pattern = pattern.write();
        pattern.insert([&[0, 3], &[1, 2, 4]]).unwrap();
        pattern.apply().unwrap();
    }
    let csc = CscMatrix::<f64>::init_from_layout(&column_major).unwrap();
    assert_eq!((csc.nrows(), csc.ncols()), (4, 2));
    assert_eq!(csc.nnz(), 4);
    assert!(csc.values().iter().all(|&v| v == 0.0));
}
