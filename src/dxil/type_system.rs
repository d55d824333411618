//! Side table attaching HLSL layout information to IR aggregate types and functions.

use std::collections::BTreeMap;

use crate::ir::{Function, Handle, Type};

use super::constants::{ComponentType, InputQualifier, InterpolationMode, MatrixOrientation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatrixAnnotation {
    pub rows: u32,
    pub cols: u32,
    pub orientation: MatrixOrientation,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldAnnotation {
    pub cbuffer_offset: u32,
    pub comp_type: Option<ComponentType>,
    pub field_name: String,
    pub matrix: Option<MatrixAnnotation>,
    pub interpolation_mode: Option<InterpolationMode>,
    pub precise: bool,
    pub semantic: Option<String>,
}

impl FieldAnnotation {
    pub fn named(name: &str) -> Self {
        Self {
            field_name: name.to_owned(),
            ..Default::default()
        }
    }
}

/// Layout of one aggregate type inside a legacy constant buffer.
///
/// Base classes appear as leading fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructAnnotation {
    pub cbuffer_size: u32,
    pub is_empty_struct: bool,
    pub fields: Vec<FieldAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterAnnotation {
    pub input_qualifier: InputQualifier,
    pub field: FieldAnnotation,
    pub semantic_indices: Vec<u32>,
}

impl ParameterAnnotation {
    pub fn new(input_qualifier: InputQualifier) -> Self {
        Self {
            input_qualifier,
            field: FieldAnnotation::default(),
            semantic_indices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionAnnotation {
    pub ret: ParameterAnnotation,
    pub params: Vec<ParameterAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeSystem {
    structs: BTreeMap<Handle<Type>, StructAnnotation>,
    functions: BTreeMap<Handle<Function>, FunctionAnnotation>,
}

impl TypeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an empty annotation for `ty`. Panics if one exists already.
    pub fn add_struct_annotation(&mut self, ty: Handle<Type>) -> &mut StructAnnotation {
        assert!(
            !self.structs.contains_key(&ty),
            "struct annotation for {:?} added twice",
            ty
        );
        self.structs.entry(ty).or_default()
    }

    pub fn insert_struct_annotation(&mut self, ty: Handle<Type>, annotation: StructAnnotation) {
        self.structs.insert(ty, annotation);
    }

    pub fn struct_annotation(&self, ty: Handle<Type>) -> Option<&StructAnnotation> {
        self.structs.get(&ty)
    }

    pub fn struct_annotation_mut(&mut self, ty: Handle<Type>) -> Option<&mut StructAnnotation> {
        self.structs.get_mut(&ty)
    }

    pub fn struct_annotations(&self) -> impl Iterator<Item = (&Handle<Type>, &StructAnnotation)> {
        self.structs.iter()
    }

    pub fn insert_function_annotation(&mut self, function: Handle<Function>, annotation: FunctionAnnotation) {
        self.functions.insert(function, annotation);
    }

    pub fn function_annotation(&self, function: Handle<Function>) -> Option<&FunctionAnnotation> {
        self.functions.get(&function)
    }

    pub fn function_annotations(&self) -> impl Iterator<Item = (&Handle<Function>, &FunctionAnnotation)> {
        self.functions.iter()
    }

    pub fn remove_function_annotation(&mut self, function: Handle<Function>) -> Option<FunctionAnnotation> {
        self.functions.remove(&function)
    }
}
