//! The slice of a generic compiler IR that the DXIL model and the HLSL lowering consume:
//! interned types, values and instructions, functions, globals and the metadata tree.
//!
//! This is deliberately small: no basic blocks, no data layout beyond what cbuffer
//! lowering needs. Instructions of a function are kept in program order.

pub mod arena;
pub mod metadata;
pub mod module;
pub mod types;
pub mod value;

pub use arena::{Arena, Handle, UniqueArena};
pub use metadata::{MdConst, MdNode, MdRef, Metadata, NamedMetadata};
pub use module::{Function, GlobalVariable, Module};
pub use types::Type;
pub use value::{BinaryOp, CastOp, Instruction, Value, ValueKind};
