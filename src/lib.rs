//! The crate models a DXIL module: the shader-model-level description a DirectX shader
//! compiler attaches to its IR, and the lowering of HLSL declarations onto it.
//!
//! - [ir] is a small arena-based IR ([ir::Module]) standing in for the compiler's LLVM module:
//!   types, globals, functions with flat instruction bodies, and named metadata.
//! - [dxil] holds [dxil::DxilModule] with its signatures, resources, type annotations,
//!   shader flags and per-stage state, and the codec to and from module metadata.
//! - [hlsl] turns HLSL declarations into a populated [dxil::DxilModule], see
//!   [hlsl::HlslRuntime].
//! - [diag] collects the diagnostics lowering reports.

#[macro_use]
extern crate num_derive;

pub mod diag;
pub mod dxil;
pub mod hlsl;
pub mod ir;

pub use dxil::{DxilModule, ShaderModel};
pub use ir::Module;
