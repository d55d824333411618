//! The DXIL module model: stage, signatures, resources, layout annotations and shader
//! flags, plus their encoding into module metadata.

pub mod constants;
pub mod error;
pub mod flags;
pub mod metadata;
pub mod module;
pub mod opcode;
pub mod prune;
pub mod resource;
pub mod root_signature;
pub mod shader_flags;
pub mod shader_model;
pub mod signature;
pub mod type_system;
pub mod view_id;

pub use error::{MetadataError, MetadataResult};
pub use module::{DsState, DxilModule, GsState, HsState};
pub use resource::{CBuffer, LowerBound, RangeSize, Resource, ResourceBase, ResourceLike, Sampler};
pub use shader_flags::{GlobalFlags, ShaderFeatureInfo, ShaderFlag, ShaderFlags};
pub use shader_model::ShaderModel;
pub use signature::{Signature, SignatureElement};
pub use type_system::{FieldAnnotation, FunctionAnnotation, MatrixAnnotation, ParameterAnnotation, StructAnnotation, TypeSystem};
