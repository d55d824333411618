use std::rc::Rc;

use dxil_module::dxil::{constants::MatrixOrientation, TypeSystem};
use dxil_module::hlsl::{
    layout::{align_base_offset, array_size, matrix_size},
    FieldDecl, HlslType, LayoutBuilder, ScalarKind, StructDecl,
};
use dxil_module::ir::Module;

const COL: MatrixOrientation = MatrixOrientation::ColumnMajor;
const ROW: MatrixOrientation = MatrixOrientation::RowMajor;

fn matrix(rows: u32, cols: u32, orientation: Option<MatrixOrientation>) -> HlslType {
    HlslType::Matrix {
        element: ScalarKind::Float,
        rows,
        cols,
        orientation,
    }
}

#[test]
fn test_struct_with_double() {
    let decl = Rc::new(StructDecl::new(
        "S",
        vec![
            FieldDecl::new("a", HlslType::Scalar(ScalarKind::Float)),
            FieldDecl::new("b", HlslType::Scalar(ScalarKind::Double)),
            FieldDecl::new("c", HlslType::Scalar(ScalarKind::Float)),
        ],
    ));
    let mut module = Module::new("layout");
    let mut type_system = TypeSystem::new();
    let mut layout = LayoutBuilder::new(&mut module, &mut type_system, COL);
    let (ty, size) = layout.annotate_struct(&decl);
    assert_eq!(size, 20);

    let annotation = type_system.struct_annotation(ty).expect("struct annotated");
    let offsets: Vec<u32> = annotation.fields.iter().map(|f| f.cbuffer_offset).collect();
    assert_eq!(offsets, vec![0, 8, 16]);
    assert_eq!(annotation.cbuffer_size, 20);
    assert!(!annotation.is_empty_struct);
}

#[test]
fn test_struct_layout_is_memoized() {
    let decl = Rc::new(StructDecl::new(
        "Light",
        vec![
            FieldDecl::new("color", HlslType::Vector(ScalarKind::Float, 3)),
            FieldDecl::new("transform", matrix(4, 4, Some(ROW))),
        ],
    ));
    let mut module = Module::new("layout");
    let mut type_system = TypeSystem::new();
    let mut layout = LayoutBuilder::new(&mut module, &mut type_system, COL);
    let first = layout.annotate_struct(&decl);
    let second = layout.annotate_struct(&decl);
    assert_eq!(first, second);
    assert_eq!(first.1, 16 + 64);
    assert_eq!(type_system.struct_annotations().count(), 1);
}

#[test]
fn test_empty_base_is_skipped() {
    let empty = Rc::new(StructDecl::new("Empty", vec![]));
    let mut derived = StructDecl::new("Derived", vec![FieldDecl::new("x", HlslType::Scalar(ScalarKind::Uint))]);
    derived.bases.push(empty);
    let derived = Rc::new(derived);

    let mut module = Module::new("layout");
    let mut type_system = TypeSystem::new();
    let mut layout = LayoutBuilder::new(&mut module, &mut type_system, COL);
    let (ty, size) = layout.annotate_struct(&derived);
    assert_eq!(size, 4);
    let annotation = type_system.struct_annotation(ty).expect("struct annotated");
    assert_eq!(annotation.fields.len(), 1);
    assert_eq!(annotation.fields[0].field_name, "x");
}

#[test]
fn test_array_sizes() {
    assert_eq!(array_size(4, 3), 36);
    assert_eq!(array_size(16, 2), 32);
    assert_eq!(array_size(20, 2), 52);
    assert_eq!(array_size(4, 0), 0);
}

#[test]
fn test_matrix_sizes() {
    assert_eq!(matrix_size(ScalarKind::Float, 4, 4, COL), 64);
    assert_eq!(matrix_size(ScalarKind::Float, 2, 3, ROW), 16 + 12);
    assert_eq!(matrix_size(ScalarKind::Float, 2, 3, COL), 16 * 2 + 8);
    assert_eq!(matrix_size(ScalarKind::Double, 2, 4, ROW), 32 + 32);
}

/// Offset of a value placed right after a float at the start of a buffer.
fn after_float(ty: HlslType, default_orientation: MatrixOrientation) -> u32 {
    let mut module = Module::new("layout");
    let mut type_system = TypeSystem::new();
    let mut layout = LayoutBuilder::new(&mut module, &mut type_system, default_orientation);
    let size = layout.annotate_type(&ty);
    align_base_offset(4, size, &ty, default_orientation)
}

#[test]
fn test_packing_grid() {
    let float = |n| HlslType::Vector(ScalarKind::Float, n);

    // Vectors share the row while they fit.
    assert_eq!(after_float(HlslType::Scalar(ScalarKind::Float), COL), 4);
    assert_eq!(after_float(float(3), COL), 4);
    assert_eq!(after_float(float(4), COL), 16);

    // Arrays never share a row, even when they would fit.
    assert_eq!(after_float(HlslType::array(HlslType::Scalar(ScalarKind::Float), 2), COL), 16);
    assert_eq!(after_float(HlslType::array(float(2), 1), COL), 16);

    // Matrices with a leading dimension above one never share a row.
    assert_eq!(after_float(matrix(1, 3, Some(ROW)), COL), 16);
    assert_eq!(after_float(matrix(3, 1, Some(COL)), COL), 16);
    assert_eq!(after_float(matrix(1, 3, None), ROW), 16);
    assert_eq!(after_float(matrix(2, 2, None), COL), 16);
    assert_eq!(after_float(matrix(1, 1, Some(ROW)), COL), 4);
    assert_eq!(after_float(matrix(1, 1, None), COL), 4);

    // A float1x3 stored column-major spans three registers, so it moves for its size.
    assert_eq!(after_float(matrix(1, 3, Some(COL)), COL), 16);
    assert_eq!(after_float(matrix(3, 1, Some(ROW)), COL), 16);

    // Matrices that don't fit move regardless of orientation.
    assert_eq!(after_float(matrix(1, 4, Some(ROW)), COL), 16);

    // Arrays of matrices are arrays.
    assert_eq!(after_float(HlslType::array(matrix(1, 2, Some(ROW)), 2), COL), 16);
}

#[test]
fn test_matrix_leading_dimension() {
    // Sizes chosen to fit the row, so only the orientation decides.
    assert_eq!(align_base_offset(4, 12, &matrix(1, 3, Some(ROW)), COL), 16);
    assert_eq!(align_base_offset(4, 12, &matrix(3, 1, Some(COL)), COL), 16);
    assert_eq!(align_base_offset(4, 12, &matrix(1, 3, Some(COL)), COL), 4);
    assert_eq!(align_base_offset(4, 12, &matrix(3, 1, Some(ROW)), COL), 4);
    assert_eq!(align_base_offset(4, 12, &matrix(1, 3, None), ROW), 16);
    assert_eq!(align_base_offset(4, 12, &matrix(1, 3, None), COL), 4);
}

#[test]
fn test_64_bit_alignment() {
    let double = HlslType::Scalar(ScalarKind::Double);
    assert_eq!(align_base_offset(4, 8, &double, COL), 8);
    assert_eq!(align_base_offset(12, 8, &double, COL), 16);
    assert_eq!(align_base_offset(8, 8, &double, COL), 8);
    let double2 = HlslType::Vector(ScalarKind::Double, 2);
    assert_eq!(align_base_offset(4, 16, &double2, COL), 16);
    // The bump follows the component type of vectors and matrices as well.
    let dmat = HlslType::Matrix {
        element: ScalarKind::Double,
        rows: 1,
        cols: 1,
        orientation: None,
    };
    assert_eq!(align_base_offset(4, 8, &dmat, COL), 8);
    assert_eq!(align_base_offset(4, 8, &HlslType::Vector(ScalarKind::Double, 1), COL), 8);
}

#[test]
fn test_resources_take_no_space() {
    let texture = HlslType::resource("Texture2D", Some(HlslType::Vector(ScalarKind::Float, 4)));
    assert_eq!(after_float(texture.clone(), COL), 4);
    assert_eq!(align_base_offset(4, 0, &texture, COL), 4);
}

#[test]
fn test_struct_shares_row_when_it_fits() {
    let tiny = Rc::new(StructDecl::new("Tiny", vec![FieldDecl::new("x", HlslType::Scalar(ScalarKind::Float))]));
    assert_eq!(after_float(HlslType::Struct(tiny), COL), 4);

    let wide = Rc::new(StructDecl::new(
        "Wide",
        vec![FieldDecl::new("v", HlslType::Vector(ScalarKind::Float, 4))],
    ));
    assert_eq!(after_float(HlslType::Struct(wide), COL), 16);
}
