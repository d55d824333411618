//! Legacy constant buffer layout of HLSL types.
//!
//! Constant buffers are made of 16-byte rows. A value may share a row with the previous one
//! if it fits in what is left of it, except arrays and matrices whose leading dimension
//! (rows if column-major, columns if row-major) is more than one, which always start a new row. Every array element but the last takes a
//! whole number of rows.
//!
//! Layouts are recorded as [StructAnnotation]s in a [TypeSystem], keyed by the IR type the
//! HLSL type lowers to.

use std::rc::Rc;

use crate::dxil::{
    constants::{InterpolationMode, MatrixOrientation},
    type_system::{FieldAnnotation, MatrixAnnotation, StructAnnotation, TypeSystem},
};
use crate::ir::{Handle, Module, Type};

use super::ast::{HlslType, ScalarKind, StructDecl};

pub const ROW_SIZE: u32 = 16;

fn round_up_to_row(size: u32) -> u32 {
    (size + ROW_SIZE - 1) & !(ROW_SIZE - 1)
}

pub fn resolve_orientation(orientation: Option<MatrixOrientation>, default: MatrixOrientation) -> MatrixOrientation {
    match orientation {
        Some(MatrixOrientation::RowMajor) => MatrixOrientation::RowMajor,
        Some(MatrixOrientation::ColumnMajor) => MatrixOrientation::ColumnMajor,
        _ => default,
    }
}

/// Bumps `offset` to 8-byte alignment for 64-bit scalars.
pub fn align_to_8_bytes(offset: u32, scalar_size: u32) -> u32 {
    if scalar_size == 8 {
        (offset + 7) & !7
    } else {
        offset
    }
}

/// Whether a value of this type can't continue a partially used row.
fn starts_new_row(ty: &HlslType, default_orientation: MatrixOrientation) -> bool {
    match ty {
        HlslType::Array { .. } => true,
        HlslType::Matrix {
            rows,
            cols,
            orientation,
            ..
        } => match resolve_orientation(*orientation, default_orientation) {
            MatrixOrientation::RowMajor => *cols > 1,
            _ => *rows > 1,
        },
        _ => false,
    }
}

/// Where a value of `size` bytes and type `ty` goes when the buffer is filled up to `base`.
///
/// Zero-sized values (resources) stay at `base`.
pub fn align_base_offset(base: u32, size: u32, ty: &HlslType, default_orientation: MatrixOrientation) -> u32 {
    if size == 0 {
        return base;
    }
    let remainder = base % ROW_SIZE;
    if remainder == 0 {
        return base;
    }
    let needs_new_row = remainder + size > ROW_SIZE || starts_new_row(ty, default_orientation);
    let offset = if needs_new_row {
        base - remainder + ROW_SIZE
    } else {
        base
    };
    // Vectors and matrices of 64-bit components get the 8-byte bump too.
    let scalar_size = ty.scalar_kind().map_or(4, |s| s.size_in_bytes());
    align_to_8_bytes(offset, scalar_size)
}

/// Bytes a matrix takes in a constant buffer. Each major-dimension vector but the last
/// takes one row, or two if its components don't fit in 16 bytes.
pub fn matrix_size(element: ScalarKind, rows: u32, cols: u32, orientation: MatrixOrientation) -> u32 {
    let element_size = element.size_in_bytes();
    let (major, minor) = match orientation {
        MatrixOrientation::RowMajor => (rows, cols),
        _ => (cols, rows),
    };
    let pitch = if minor * element_size > ROW_SIZE {
        2 * ROW_SIZE
    } else {
        ROW_SIZE
    };
    pitch * major.saturating_sub(1) + minor * element_size
}

pub fn array_size(element_size: u32, len: u32) -> u32 {
    if len == 0 {
        return 0;
    }
    round_up_to_row(element_size) * (len - 1) + element_size
}

/// Tightly packed byte size, as used for structured buffer strides.
pub fn natural_size(ty: &HlslType) -> u32 {
    match ty {
        HlslType::Scalar(s) => s.size_in_bytes(),
        HlslType::Vector(s, n) => s.size_in_bytes() * n,
        HlslType::Matrix {
            element,
            rows,
            cols,
            ..
        } => element.size_in_bytes() * rows * cols,
        HlslType::Array { element, len } => natural_size(element) * len.unwrap_or(0),
        HlslType::Struct(decl) => {
            let mut size = 0;
            let fields = decl
                .bases
                .iter()
                .map(|b| HlslType::Struct(b.clone()))
                .chain(decl.fields.iter().map(|f| f.ty.clone()));
            for field in fields {
                let align = field.element_scalar_kind().map_or(4, |s| s.size_in_bytes());
                size = (size + align - 1) / align * align + natural_size(&field);
            }
            size
        }
        HlslType::Patch { element, count, .. } => natural_size(element) * count,
        HlslType::Resource { .. } | HlslType::Stream { .. } => 0,
    }
}

fn has_fields(decl: &StructDecl) -> bool {
    !decl.fields.is_empty() || decl.bases.iter().any(|b| has_fields(b))
}

/// Lowers HLSL types to IR types and records their constant buffer layouts.
pub struct LayoutBuilder<'a> {
    pub module: &'a mut Module,
    pub type_system: &'a mut TypeSystem,
    pub default_orientation: MatrixOrientation,
}

impl<'a> LayoutBuilder<'a> {
    pub fn new(module: &'a mut Module, type_system: &'a mut TypeSystem, default_orientation: MatrixOrientation) -> Self {
        Self {
            module,
            type_system,
            default_orientation,
        }
    }

    fn scalar_type(&mut self, scalar: ScalarKind) -> Handle<Type> {
        match scalar {
            ScalarKind::Bool | ScalarKind::Int | ScalarKind::Uint => self.module.int_type(32),
            ScalarKind::Int64 | ScalarKind::Uint64 => self.module.int_type(64),
            ScalarKind::Min16Int | ScalarKind::Min16Uint => self.module.int_type(16),
            ScalarKind::Half | ScalarKind::Float => self.module.float_type(32),
            ScalarKind::Double => self.module.float_type(64),
            ScalarKind::Min16Float => self.module.float_type(16),
        }
    }

    /// The IR type values of `ty` are stored as.
    pub fn lower_type(&mut self, ty: &HlslType) -> Handle<Type> {
        match ty {
            HlslType::Scalar(s) => self.scalar_type(*s),
            HlslType::Vector(s, n) => {
                let element = self.scalar_type(*s);
                self.module.vector_type(element, *n)
            }
            HlslType::Matrix {
                element,
                rows,
                cols,
                ..
            } => {
                let scalar = self.scalar_type(*element);
                let row = self.module.vector_type(scalar, *cols);
                let storage = self.module.array_type(row, *rows);
                let name = format!("class.matrix.{}", ty);
                self.module.struct_type(&name, vec![storage])
            }
            HlslType::Array { element, len } => {
                let element = self.lower_type(element);
                self.module.array_type(element, len.unwrap_or(0))
            }
            HlslType::Struct(decl) => {
                let mut fields = Vec::new();
                for base in decl.bases.iter().filter(|b| has_fields(b)) {
                    fields.push(self.lower_type(&HlslType::Struct(base.clone())));
                }
                for field in &decl.fields {
                    fields.push(self.lower_type(&field.ty));
                }
                self.module.struct_type(&format!("struct.{}", decl.name), fields)
            }
            HlslType::Resource { element, .. } => {
                let field = match element {
                    Some(e) => self.lower_type(e),
                    None => self.module.int_type(32),
                };
                self.module.struct_type(&format!("class.{}", ty), vec![field])
            }
            HlslType::Patch { element, count, .. } => {
                let element = self.lower_type(element);
                let storage = self.module.array_type(element, *count);
                self.module.struct_type(&format!("class.{}", ty), vec![storage])
            }
            HlslType::Stream { element, .. } => {
                let element = self.lower_type(element);
                self.module.struct_type(&format!("class.{}", ty), vec![element])
            }
        }
    }

    /// Records the layout of `ty` and everything it contains, returning its size in a
    /// constant buffer. Resources take no space.
    pub fn annotate_type(&mut self, ty: &HlslType) -> u32 {
        match ty {
            HlslType::Scalar(s) => s.size_in_bytes(),
            HlslType::Vector(s, n) => s.size_in_bytes() * n,
            HlslType::Matrix {
                element,
                rows,
                cols,
                orientation,
            } => matrix_size(
                *element,
                *rows,
                *cols,
                resolve_orientation(*orientation, self.default_orientation),
            ),
            HlslType::Array { element, len } => {
                let element_size = self.annotate_type(element);
                array_size(element_size, len.unwrap_or(0))
            }
            HlslType::Struct(decl) => self.annotate_struct(decl).1,
            HlslType::Resource { element, .. } => {
                if let Some(element) = element {
                    self.annotate_type(element);
                }
                0
            }
            HlslType::Patch { element, count, .. } => {
                let element_size = self.annotate_type(element);
                array_size(element_size, *count)
            }
            HlslType::Stream { element, .. } => {
                self.annotate_type(element);
                0
            }
        }
    }

    /// The IR type of a struct and its constant buffer size, computing its layout the first
    /// time the struct is seen.
    pub fn annotate_struct(&mut self, decl: &Rc<StructDecl>) -> (Handle<Type>, u32) {
        let ty = self.lower_type(&HlslType::Struct(decl.clone()));
        if let Some(existing) = self.type_system.struct_annotation(ty) {
            return (ty, existing.cbuffer_size);
        }

        let mut fields = Vec::new();
        let mut size = 0;
        for base in decl.bases.iter().filter(|b| has_fields(b)) {
            let base_ty = HlslType::Struct(base.clone());
            let base_size = self.annotate_type(&base_ty);
            let mut field = FieldAnnotation::named(&base.name);
            field.cbuffer_offset = align_base_offset(size, base_size, &base_ty, self.default_orientation);
            size = field.cbuffer_offset + base_size;
            fields.push(field);
        }
        for decl_field in &decl.fields {
            let field_size = self.annotate_type(&decl_field.ty);
            let mut field = self.field_annotation(&decl_field.name, &decl_field.ty);
            field.semantic = decl_field.semantic.clone();
            field.interpolation_mode = Some(decl_field.interpolation.mode())
                .filter(|m| *m != InterpolationMode::Undefined);
            field.precise = decl_field.precise;
            field.cbuffer_offset = align_base_offset(size, field_size, &decl_field.ty, self.default_orientation);
            size = field.cbuffer_offset + field_size;
            fields.push(field);
        }

        log::trace!("struct {} laid out in {} bytes", decl.name, size);
        self.type_system.insert_struct_annotation(
            ty,
            StructAnnotation {
                cbuffer_size: size,
                is_empty_struct: fields.is_empty(),
                fields,
            },
        );
        (ty, size)
    }

    /// Component type and matrix shape of a field, without its offset.
    pub fn field_annotation(&self, name: &str, ty: &HlslType) -> FieldAnnotation {
        let mut field = FieldAnnotation::named(name);
        field.comp_type = ty.element_scalar_kind().map(|s| s.comp_type());
        let mut inner = ty;
        while let HlslType::Array { element, .. } = inner {
            inner = element;
        }
        if let HlslType::Matrix {
            rows,
            cols,
            orientation,
            ..
        } = inner
        {
            field.matrix = Some(MatrixAnnotation {
                rows: *rows,
                cols: *cols,
                orientation: resolve_orientation(*orientation, self.default_orientation),
            });
        }
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hlsl::ast::FieldDecl;

    #[test]
    fn sixty_four_bit_matrix_rows_take_two_registers() {
        // double3x3 row major: rows of 24 bytes need a 32-byte pitch.
        assert_eq!(matrix_size(ScalarKind::Double, 3, 3, MatrixOrientation::RowMajor), 32 * 2 + 24);
        assert_eq!(matrix_size(ScalarKind::Float, 4, 4, MatrixOrientation::ColumnMajor), 16 * 3 + 16);
        assert_eq!(matrix_size(ScalarKind::Float, 1, 3, MatrixOrientation::RowMajor), 12);
    }

    #[test]
    fn natural_size_aligns_64_bit_fields() {
        let decl = StructDecl::new(
            "S",
            vec![
                FieldDecl::new("a", HlslType::Scalar(ScalarKind::Float)),
                FieldDecl::new("b", HlslType::Scalar(ScalarKind::Double)),
            ],
        );
        assert_eq!(natural_size(&HlslType::Struct(Rc::new(decl))), 16);
    }
}
