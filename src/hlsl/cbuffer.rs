//! Constant buffers under construction, their offset allocation, and turning them into
//! [CBuffer]s with a backing IR global.

use std::collections::BTreeSet;

use crate::dxil::{
    constants::{MatrixOrientation, ResourceClass, ResourceKind},
    module::DxilModule,
    resource::{CBuffer, ResourceBase},
    type_system::StructAnnotation,
};
use crate::ir::{GlobalVariable, Handle, Instruction, Module, Type};

use super::{
    ast::HlslType,
    layout::{align_base_offset, LayoutBuilder},
    resources::{create_handle_call, handle_type},
};

/// Name of the implicit buffer holding constants declared at global scope.
pub const GLOBALS_CBUFFER_NAME: &str = "$Globals";
pub const SUBSCRIPT_CB_NAME: &str = "dx.hl.subscript.cb";

/// A constant declared in a cbuffer block.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDecl {
    pub name: String,
    pub ty: HlslType,
    /// Placeholder global the constant is accessed through until the buffer is built.
    pub global: Handle<GlobalVariable>,
    /// Explicit `packoffset`, or the allocated offset once laid out.
    pub offset: Option<u32>,
    pub size: u32,
}

/// Assigns an offset to every constant without one and returns the buffer size.
///
/// Explicitly placed constants are never moved, but nothing is automatically placed below
/// the end of the last of them. Running it again changes nothing.
pub fn allocate_constant_buffer(constants: &mut [ConstantDecl], default_orientation: MatrixOrientation) -> u32 {
    let mut floor = constants
        .iter()
        .filter_map(|c| c.offset.map(|offset| offset + c.size))
        .max()
        .unwrap_or(0);
    for constant in constants.iter_mut().filter(|c| c.offset.is_none()) {
        let offset = align_base_offset(floor, constant.size, &constant.ty, default_orientation);
        log::trace!("constant {} placed at {}", constant.name, offset);
        constant.offset = Some(offset);
        floor = offset + constant.size;
    }
    floor
}

/// A cbuffer whose constants are still being collected.
#[derive(Debug, Clone)]
pub struct CBufferBuilder {
    pub base: ResourceBase,
    constants: Vec<ConstantDecl>,
}

impl CBufferBuilder {
    pub fn new(name: &str) -> Self {
        let mut base = ResourceBase::new(ResourceClass::CBuffer, ResourceKind::CBuffer);
        base.global_name = name.to_owned();
        Self {
            base,
            constants: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.base.global_name
    }

    /// Adds a constant and returns its field index.
    pub fn add_constant(&mut self, constant: ConstantDecl) -> u32 {
        self.constants.push(constant);
        self.constants.len() as u32 - 1
    }

    pub fn constants(&self) -> &[ConstantDecl] {
        &self.constants
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    pub fn allocate(&mut self, default_orientation: MatrixOrientation) -> u32 {
        allocate_constant_buffer(&mut self.constants, default_orientation)
    }

    /// Lays the buffer out and adds it to `dxil`, returning its id.
    ///
    /// The constants become fields of one struct-typed global. Every use of a constant's
    /// placeholder global is rewritten to a field pointer obtained from the buffer handle,
    /// and the placeholder is erased.
    pub fn build(mut self, module: &mut Module, dxil: &mut DxilModule, default_orientation: MatrixOrientation) -> u32 {
        let size = self.allocate(default_orientation);
        let name = self.base.global_name.clone();

        let mut layout = LayoutBuilder::new(module, dxil.type_system_mut(), default_orientation);
        let mut field_types = Vec::new();
        let mut fields = Vec::new();
        for constant in &self.constants {
            layout.annotate_type(&constant.ty);
            field_types.push(layout.lower_type(&constant.ty));
            let mut field = layout.field_annotation(&constant.name, &constant.ty);
            field.cbuffer_offset = constant.offset.unwrap_or_default();
            fields.push(field);
        }
        let ty = layout.module.struct_type(&name, field_types.clone());
        layout.type_system.insert_struct_annotation(
            ty,
            StructAnnotation {
                cbuffer_size: size,
                is_empty_struct: fields.is_empty(),
                fields,
            },
        );

        let global = module.add_global(&name, ty, true);
        let mut cbuffer = CBuffer::new(size);
        cbuffer.base = self.base;
        cbuffer.base.global_symbol = Some(global);
        let id = dxil.add_cbuffer(cbuffer);
        log::debug!("cbuffer {} is {} bytes with {} constants", name, size, self.constants.len());

        for (index, constant) in self.constants.iter().enumerate() {
            let field_ty = field_types[index];
            rewrite_constant_uses(module, constant.global, field_ty, id, index as u32);
            module.erase_global(constant.global);
        }
        id
    }
}

/// Replaces the placeholder of constant `index` in every function using it by
/// `dx.hl.subscript.cb(createHandle(cbuffer id), index)`.
fn rewrite_constant_uses(
    module: &mut Module,
    placeholder: Handle<GlobalVariable>,
    field_ty: Handle<Type>,
    cbuffer_id: u32,
    index: u32,
) {
    let value = module.global_value(placeholder);
    let users = module.users(value);
    let functions: BTreeSet<_> = users.iter().filter_map(|u| module.parent_function(*u)).collect();

    for function in functions {
        let position = users
            .iter()
            .filter(|u| module.parent_function(**u) == Some(function))
            .filter_map(|u| module.position_in_body(function, *u))
            .min()
            .unwrap_or(0);

        let zero = module.const_i32(0);
        let call = create_handle_call(module, ResourceClass::CBuffer, cbuffer_id, zero);
        let handle_ty = handle_type(module);
        let handle = module.insert(function, position, handle_ty, call);

        let i32_ty = module.int_type(32);
        let ptr_ty = module.pointer_type(field_ty);
        let subscript_name = format!("{}.{}", SUBSCRIPT_CB_NAME, ptr_ty.index());
        let subscript = module.declare_function(&subscript_name, ptr_ty, &[handle_ty, i32_ty]);
        let field_index = module.const_i32(index);
        let field_ptr = module.insert(
            function,
            position + 1,
            ptr_ty,
            Instruction::Call {
                callee: subscript,
                args: vec![handle, field_index],
            },
        );
        module.replace_uses_in(function, value, field_ptr);
    }
}
