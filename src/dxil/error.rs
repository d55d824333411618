use num_traits::FromPrimitive;
use thiserror::Error;

use super::shader_model::ShaderModelParseError;

pub type MetadataResult<T> = Result<T, MetadataError>;

/// A load-time failure. Any of these makes the whole load fail.
#[derive(Debug, Error, PartialEq)]
pub enum MetadataError {
    #[error("Malformed DXIL metadata: {0}")]
    Malformed(String),
    #[error("Unknown extended shader properties tag {0}")]
    UnknownShaderPropertyTag(u32),
    #[error("Bad value {1} for enum {0}")]
    BadEnumValue(&'static str, u64),
    #[error("Named metadata '{0}' is missing")]
    MissingNamedMetadata(&'static str),
    #[error("Unknown shader model: {0}")]
    UnknownShaderModel(#[from] ShaderModelParseError),
    #[error("Expected exactly one entry point, found {0}")]
    EntryPointCount(usize),
}

impl MetadataError {
    pub(crate) fn malformed(what: impl Into<String>) -> Self {
        MetadataError::Malformed(what.into())
    }
}

pub fn decode_enum<T: FromPrimitive>(value: u64) -> MetadataResult<T> {
    T::from_u64(value).ok_or_else(|| MetadataError::BadEnumValue(std::any::type_name::<T>(), value))
}
