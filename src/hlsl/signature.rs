//! Building the stage signatures from the entry function's parameters and return value.

use std::collections::HashMap;

use crate::diag::{Diagnostics, SourceLocation};
use crate::dxil::{
    constants::{ComponentType, InputQualifier, InterpolationMode, SemanticKind, ShaderKind, SignatureKind},
    module::DxilModule,
    signature::{semantic_kind_from_name, split_semantic, Signature, SignatureElement, UNALLOCATED_COL, UNALLOCATED_ROW},
};

use super::{
    ast::{FunctionDecl, HlslType, InterpolationModifiers},
    props::FunctionProps,
};

pub const MAX_SIGNATURE_ROWS: u32 = 32;

/// Whether a semantic of this kind gets an element in a signature of this stage.
/// The rest are read from or written to special registers.
pub fn is_in_signature(shader_kind: ShaderKind, sig_kind: SignatureKind, semantic: SemanticKind) -> bool {
    match semantic {
        k if k.is_compute_only() => false,
        SemanticKind::DomainLocation
        | SemanticKind::OutputControlPointID
        | SemanticKind::GSInstanceID
        | SemanticKind::ViewID
        | SemanticKind::InnerCoverage => false,
        SemanticKind::PrimitiveID => shader_kind == ShaderKind::Pixel && sig_kind == SignatureKind::Input,
        SemanticKind::Coverage => sig_kind == SignatureKind::Output,
        _ => true,
    }
}

/// System values that live outside the packed register space.
fn is_unpacked(semantic: SemanticKind) -> bool {
    matches!(
        semantic,
        SemanticKind::Depth
            | SemanticKind::DepthLessEqual
            | SemanticKind::DepthGreaterEqual
            | SemanticKind::Coverage
            | SemanticKind::StencilRef
    )
}

/// Rows and columns a value of `ty` takes. `None` for types that can't be a signature element.
fn shape(ty: &HlslType) -> Option<(u32, u8)> {
    match ty {
        HlslType::Scalar(_) => Some((1, 1)),
        HlslType::Vector(_, n) => Some((1, *n as u8)),
        HlslType::Matrix { rows, cols, .. } => Some((*rows, *cols as u8)),
        HlslType::Array {
            element,
            len: Some(len),
        } => shape(element).map(|(rows, cols)| (rows * len, cols)),
        _ => None,
    }
}

fn signature_mut(dxil: &mut DxilModule, kind: SignatureKind) -> &mut Signature {
    match kind {
        SignatureKind::Input => dxil.input_signature_mut(),
        SignatureKind::Output => dxil.output_signature_mut(),
        SignatureKind::PatchConstant => dxil.patch_constant_signature_mut(),
    }
}

/// Where a value goes: which signature, and which GS output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Target {
    signature: SignatureKind,
    stream: u8,
}

struct SignatureBuilder<'a> {
    dxil: &'a mut DxilModule,
    diags: &'a mut Diagnostics,
    shader_kind: ShaderKind,
    next_row: HashMap<Target, u32>,
}

impl<'a> SignatureBuilder<'a> {
    /// Signatures an entry parameter with this qualifier feeds.
    fn targets(&self, qualifier: InputQualifier, is_patch_constant_fn: bool) -> Vec<Target> {
        let to = |signature| Target { signature, stream: 0 };
        if is_patch_constant_fn {
            return match qualifier {
                InputQualifier::Out | InputQualifier::Inout => vec![to(SignatureKind::PatchConstant)],
                _ => vec![],
            };
        }
        match (self.shader_kind, qualifier) {
            (ShaderKind::Compute, _) => vec![],
            (ShaderKind::Domain, InputQualifier::OutputPatch) => vec![to(SignatureKind::Input)],
            (ShaderKind::Domain, InputQualifier::In) => vec![to(SignatureKind::PatchConstant)],
            (_, InputQualifier::In | InputQualifier::InputPatch | InputQualifier::InputPrimitive) => {
                vec![to(SignatureKind::Input)]
            }
            (_, InputQualifier::Out) => vec![to(SignatureKind::Output)],
            (_, InputQualifier::Inout) => vec![to(SignatureKind::Input), to(SignatureKind::Output)],
            (_, InputQualifier::OutputPatch) => vec![],
            (_, stream) => {
                let index = stream as u8 - InputQualifier::OutStream0 as u8;
                vec![Target {
                    signature: SignatureKind::Output,
                    stream: index,
                }]
            }
        }
    }

    /// Adds elements for a value of `ty`, flattening structs.
    fn add_value(
        &mut self,
        target: Target,
        name: &str,
        ty: &HlslType,
        semantic: Option<&str>,
        modifiers: &InterpolationModifiers,
        location: SourceLocation,
    ) {
        match ty {
            HlslType::Patch { element, .. } | HlslType::Stream { element, .. } => {
                return self.add_value(target, name, element, semantic, modifiers, location)
            }
            HlslType::Struct(decl) => {
                for base in &decl.bases {
                    self.add_value(target, &base.name, &HlslType::Struct(base.clone()), None, modifiers, location);
                }
                for field in &decl.fields {
                    self.add_value(
                        target,
                        &field.name,
                        &field.ty,
                        field.semantic.as_deref(),
                        &field.interpolation,
                        location,
                    );
                }
                return;
            }
            _ => {}
        }

        let semantic = match semantic {
            Some(s) => s,
            None => {
                self.diags.error(location, format!("'{}' is missing a semantic", name));
                return;
            }
        };
        let (semantic_name, start_index) = split_semantic(semantic);
        let semantic_kind = semantic_kind_from_name(semantic_name);
        if semantic_kind == SemanticKind::Invalid {
            self.diags.error(location, format!("unknown system value semantic '{}'", semantic));
            return;
        }
        if !is_in_signature(self.shader_kind, target.signature, semantic_kind) {
            return;
        }
        let (rows, cols) = match shape(ty) {
            Some(shape) => shape,
            None => {
                self.diags.error(location, format!("'{}' of type {} can't be a stage input or output", name, ty));
                return;
            }
        };
        let comp_type = ty
            .element_scalar_kind()
            .map_or(ComponentType::Invalid, |s| s.comp_type());

        let mut interpolation_mode = modifiers.mode();
        if interpolation_mode == InterpolationMode::Invalid {
            self.diags.error(location, format!("invalid interpolation modifiers on '{}'", name));
            return;
        }
        if interpolation_mode == InterpolationMode::Undefined
            && self.shader_kind == ShaderKind::Pixel
            && target.signature == SignatureKind::Input
        {
            interpolation_mode = if comp_type.is_float() {
                InterpolationMode::Linear
            } else {
                InterpolationMode::Constant
            };
        }

        let signature = signature_mut(self.dxil, target.signature);
        let indices: Vec<u32> = (start_index..start_index + rows).collect();
        let duplicate = signature.elements().iter().any(|e| {
            e.output_stream == target.stream
                && e.semantic_name.eq_ignore_ascii_case(semantic_name)
                && e.semantic_indices.iter().any(|i| indices.contains(i))
        });
        if duplicate {
            self.diags.error(location, format!("duplicate semantic '{}'", semantic));
            return;
        }

        let mut element = SignatureElement::new(semantic_name, semantic_kind, comp_type, rows, cols);
        element.semantic_indices = indices;
        element.interpolation_mode = interpolation_mode;
        element.output_stream = target.stream;
        if is_unpacked(semantic_kind) {
            element.start_row = UNALLOCATED_ROW;
            element.start_col = UNALLOCATED_COL;
        } else {
            let start = if semantic_kind == SemanticKind::Target {
                start_index
            } else {
                let next = self.next_row.entry(target).or_insert(0);
                let start = *next;
                *next += rows;
                start
            };
            if start + rows > MAX_SIGNATURE_ROWS {
                self.diags.error(
                    location,
                    format!("'{}' does not fit in the {} signature rows", semantic, MAX_SIGNATURE_ROWS),
                );
                return;
            }
            element.start_row = start as i32;
            element.start_col = 0;
        }
        log::trace!("{:?} signature element {} rows {}", target.signature, semantic, rows);
        signature.append_element(element);
    }

    fn add_function(&mut self, decl: &FunctionDecl, props: &FunctionProps, is_patch_constant_fn: bool) {
        for (param, qualifier) in decl.params.iter().zip(&props.input_qualifiers) {
            let ty = match (&param.ty, qualifier) {
                (HlslType::Array { element, .. }, InputQualifier::InputPrimitive) => element.as_ref(),
                (ty, _) => ty,
            };
            for target in self.targets(*qualifier, is_patch_constant_fn) {
                self.add_value(
                    target,
                    &param.name,
                    ty,
                    param.semantic(),
                    &param.interpolation,
                    param.location,
                );
            }
        }
        if let Some(ret) = &decl.return_type {
            for target in self.targets(InputQualifier::Out, is_patch_constant_fn) {
                self.add_value(
                    target,
                    &decl.name,
                    ret,
                    decl.return_semantic(),
                    &decl.return_interpolation,
                    decl.location,
                );
            }
        }
    }
}

/// Fills the input, output and patch constant signatures of `dxil` from the entry function
/// and, for hull shaders, its patch constant function.
pub fn build_signatures(
    dxil: &mut DxilModule,
    entry: (&FunctionDecl, &FunctionProps),
    patch_constant: Option<(&FunctionDecl, &FunctionProps)>,
    diags: &mut Diagnostics,
) {
    let shader_kind = dxil.shader_kind();
    let mut builder = SignatureBuilder {
        dxil,
        diags,
        shader_kind,
        next_row: HashMap::new(),
    };
    builder.add_function(entry.0, entry.1, false);
    if let Some((decl, props)) = patch_constant {
        builder.add_function(decl, props, true);
    }
}
