//! The generic metadata tree: leaf constants, strings, value references and operand tuples,
//! plus ordered, named top-level lists.

use super::{
    arena::{Arena, Handle},
    value::Value,
};

pub type MdRef = Handle<MdNode>;

/// A leaf constant. The width is part of the encoding and is never inferred.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MdConst {
    Bool(bool),
    U8(u8),
    I8(i8),
    U32(u32),
    I32(i32),
    U64(u64),
    F32(f32),
}
impl MdConst {
    /// Zero-extended view of any integer constant.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            MdConst::Bool(b) => Some(b as u64),
            MdConst::U8(v) => Some(v as u64),
            MdConst::I8(v) => Some(v as u8 as u64),
            MdConst::U32(v) => Some(v as u64),
            MdConst::I32(v) => Some(v as u32 as u64),
            MdConst::U64(v) => Some(v),
            MdConst::F32(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MdNode {
    Const(MdConst),
    String(String),
    /// Reference to an IR value (a function, a global or a typed undef).
    Value(Handle<Value>),
    /// Raw bytes, e.g. a serialized root signature.
    Blob(Vec<u8>),
    /// An ordered operand list. `None` operands are explicit nulls.
    Tuple(Vec<Option<MdRef>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedMetadata {
    pub name: String,
    pub operands: Vec<MdRef>,
}

#[derive(Debug, Clone, Default)]
pub struct Metadata {
    nodes: Arena<MdNode>,
    named: Vec<NamedMetadata>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: MdNode) -> MdRef {
        self.nodes.append(node)
    }

    pub fn get(&self, md: MdRef) -> &MdNode {
        &self.nodes[md]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Sets the operands of a named list, keeping its position if it already exists.
    pub fn set_named(&mut self, name: &str, operands: Vec<MdRef>) {
        match self.named.iter_mut().find(|n| n.name == name) {
            Some(existing) => existing.operands = operands,
            None => self.named.push(NamedMetadata {
                name: name.to_owned(),
                operands,
            }),
        }
    }

    pub fn named(&self, name: &str) -> Option<&NamedMetadata> {
        self.named.iter().find(|n| n.name == name)
    }

    /// Returns true if the list existed.
    pub fn remove_named(&mut self, name: &str) -> bool {
        let before = self.named.len();
        self.named.retain(|n| n.name != name);
        before != self.named.len()
    }

    /// Named lists in insertion order.
    pub fn named_lists(&self) -> &[NamedMetadata] {
        &self.named
    }

    pub fn nodes(&self) -> impl Iterator<Item = (MdRef, &MdNode)> {
        self.nodes.iter()
    }
}
