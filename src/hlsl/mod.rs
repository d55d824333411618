//! Lowering of HLSL declarations onto the DXIL module model.
//!
//! Front-ends hand over already-parsed declarations ([ast]) together with an IR [crate::ir::Module]
//! holding the function bodies. [runtime::HlslRuntime] then does the work a code generator
//! needs before emitting DXIL: deriving stage properties from attributes, building the
//! signatures, laying out and binding constant buffers and resources, and rewriting resource
//! accesses to `dx.op.createHandle` calls.

pub mod ast;
pub mod cbuffer;
pub mod layout;
pub mod props;
pub mod resources;
pub mod runtime;
pub mod signature;

pub use ast::{
    Attribute, AttributeKind, CBufferDecl, FieldDecl, FunctionDecl, HlslType, InterpolationModifiers, ParamDecl,
    ParamDirection, PatchKind, PrimitiveModifier, ScalarKind, StreamKind, StructDecl, UnusualAnnotation, VarDecl,
};
pub use layout::LayoutBuilder;
pub use props::FunctionProps;
pub use runtime::{HlslOptions, HlslRuntime, LoweringFailed};
