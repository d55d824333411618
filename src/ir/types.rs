use super::arena::Handle;

/// An IR type. Types are interned in the module, so equal types share a [Handle].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Int { bits: u32 },
    Float { bits: u32 },
    Vector { element: Handle<Type>, len: u32 },
    Array { element: Handle<Type>, len: u32 },
    /// A named aggregate. Two structs with the same name and fields are the same type.
    Struct {
        name: String,
        fields: Vec<Handle<Type>>,
    },
    Pointer { pointee: Handle<Type> },
}

impl Type {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Struct { .. } | Type::Array { .. })
    }

    pub fn struct_name(&self) -> Option<&str> {
        match self {
            Type::Struct { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }
}
