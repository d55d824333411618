use dxil_module::dxil::constants::MatrixOrientation;
use dxil_module::hlsl::{
    cbuffer::{allocate_constant_buffer, ConstantDecl},
    HlslType, ScalarKind,
};
use dxil_module::ir::Module;
use proptest::prelude::*;

fn constant(module: &mut Module, name: &str, ty: HlslType, size: u32, offset: Option<u32>) -> ConstantDecl {
    let i32_ty = module.int_type(32);
    let global = module.add_global(name, i32_ty, true);
    ConstantDecl {
        name: name.to_owned(),
        ty,
        global,
        offset,
        size,
    }
}

#[test]
fn test_allocation_starts_after_explicit_offsets() {
    let mut module = Module::new("cb");
    let float = HlslType::Scalar(ScalarKind::Float);
    let mut constants = vec![
        constant(&mut module, "a", float.clone(), 4, None),
        constant(&mut module, "x", HlslType::Vector(ScalarKind::Float, 4), 16, Some(16)),
        constant(&mut module, "b", float.clone(), 4, None),
        constant(&mut module, "y", HlslType::Vector(ScalarKind::Float, 2), 8, Some(32)),
        constant(&mut module, "c", float, 4, None),
    ];
    let size = allocate_constant_buffer(&mut constants, MatrixOrientation::ColumnMajor);

    let offsets: Vec<(&str, u32)> = constants
        .iter()
        .map(|c| (c.name.as_str(), c.offset.expect("allocated")))
        .collect();
    assert_eq!(offsets, vec![("a", 40), ("x", 16), ("b", 44), ("y", 32), ("c", 48)]);
    assert_eq!(size, 52);
}

#[test]
fn test_allocation_floor() {
    let mut module = Module::new("cb");
    let float = HlslType::Scalar(ScalarKind::Float);
    let mut constants = vec![
        constant(&mut module, "pinned", HlslType::Vector(ScalarKind::Float, 2), 8, Some(32)),
        constant(&mut module, "first", float.clone(), 4, None),
        constant(&mut module, "second", float, 4, None),
    ];
    let size = allocate_constant_buffer(&mut constants, MatrixOrientation::ColumnMajor);

    let offsets: Vec<_> = constants.iter().map(|c| c.offset).collect();
    assert_eq!(offsets, vec![Some(32), Some(40), Some(44)]);
    assert_eq!(size, 48);
}

#[test]
fn test_allocation_is_idempotent() {
    let mut module = Module::new("cb");
    let mut constants = vec![
        constant(&mut module, "f", HlslType::Scalar(ScalarKind::Float), 4, None),
        constant(&mut module, "v", HlslType::Vector(ScalarKind::Float, 4), 16, None),
        constant(&mut module, "d", HlslType::Scalar(ScalarKind::Double), 8, None),
    ];
    let size = allocate_constant_buffer(&mut constants, MatrixOrientation::ColumnMajor);
    let first: Vec<_> = constants.iter().map(|c| c.offset).collect();
    assert_eq!(first, vec![Some(0), Some(16), Some(32)]);
    assert_eq!(size, 40);

    let again = allocate_constant_buffer(&mut constants, MatrixOrientation::ColumnMajor);
    let second: Vec<_> = constants.iter().map(|c| c.offset).collect();
    assert_eq!(first, second);
    assert_eq!(size, again);
}

#[test]
fn test_empty_buffer() {
    let mut constants: Vec<ConstantDecl> = vec![];
    assert_eq!(allocate_constant_buffer(&mut constants, MatrixOrientation::RowMajor), 0);
}

proptest! {
    #[test]
    fn test_allocation_never_overlaps(widths in proptest::collection::vec(1u32..=4, 1..12)) {
        let mut module = Module::new("cb");
        let mut constants: Vec<ConstantDecl> = widths
            .iter()
            .enumerate()
            .map(|(i, n)| constant(&mut module, &format!("v{}", i), HlslType::Vector(ScalarKind::Float, *n), n * 4, None))
            .collect();
        let size = allocate_constant_buffer(&mut constants, MatrixOrientation::ColumnMajor);

        let mut end = 0;
        for c in &constants {
            let offset = c.offset.expect("allocated");
            prop_assert!(offset >= end);
            // Vectors never straddle a row.
            prop_assert!(offset / 16 == (offset + c.size - 1) / 16);
            end = offset + c.size;
        }
        prop_assert_eq!(size, end);
        prop_assert_eq!(allocate_constant_buffer(&mut constants, MatrixOrientation::ColumnMajor), size);
    }
}
