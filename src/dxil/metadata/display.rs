use std::fmt::{Display, Formatter, Result};

use crate::ir::{MdConst, MdNode, Module, ValueKind};

/// Dumps the metadata of a module in an LLVM-like textual form.
///
/// ```text
/// !dx.version = !{!2}
/// !0 = i32 1
/// !2 = !{!0, !1}
/// ```
pub struct ModuleMetadataDisplay<'a>(pub &'a Module);

struct ConstDisplay(MdConst);

impl Display for ConstDisplay {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self.0 {
            MdConst::Bool(v) => write!(f, "i1 {}", v as u8),
            MdConst::U8(v) => write!(f, "i8 {}", v),
            MdConst::I8(v) => write!(f, "i8 {}", v),
            MdConst::U32(v) => write!(f, "i32 {}", v),
            MdConst::I32(v) => write!(f, "i32 {}", v),
            MdConst::U64(v) => write!(f, "i64 {}", v),
            MdConst::F32(v) => write!(f, "float {:?}", v),
        }
    }
}

impl<'a> ModuleMetadataDisplay<'a> {
    fn fmt_node(&self, f: &mut Formatter, node: &MdNode) -> Result {
        match node {
            MdNode::Const(c) => write!(f, "{}", ConstDisplay(*c)),
            MdNode::String(s) => write!(f, "!\"{}\"", s.escape_default()),
            MdNode::Blob(data) => {
                write!(f, "blob[{}] ", data.len())?;
                for byte in data {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            MdNode::Value(v) => match &self.0.value(*v).kind {
                ValueKind::Function(func) => write!(f, "@{}", self.0.function(*func).name),
                ValueKind::Global(g) => write!(f, "@{}", self.0.global(*g).name),
                ValueKind::Undef => write!(f, "undef {:?}", self.0.ty(self.0.value_type(*v))),
                other => write!(f, "{:?}", other),
            },
            MdNode::Tuple(ops) => {
                write!(f, "!{{")?;
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match op {
                        Some(md) => write!(f, "!{}", md.index())?,
                        None => write!(f, "null")?,
                    }
                }
                write!(f, "}}")
            }
        }
    }
}

impl<'a> Display for ModuleMetadataDisplay<'a> {
    fn fmt(&self, f: &mut Formatter) -> Result {
        let metadata = &self.0.metadata;
        for named in metadata.named_lists() {
            write!(f, "!{} = !{{", named.name)?;
            for (i, md) in named.operands.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "!{}", md.index())?;
            }
            writeln!(f, "}}")?;
        }
        for (md, node) in metadata.nodes() {
            write!(f, "!{} = ", md.index())?;
            self.fmt_node(f, node)?;
            writeln!(f)?;
        }
        Ok(())
    }
}
