use super::{arena::Handle, module::{Function, GlobalVariable}, types::Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    ICmp,
    FCmp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FPTrunc,
    FPExt,
    FPToUI,
    FPToSI,
    UIToFP,
    SIToFP,
    BitCast,
}
impl CastOp {
    /// True for conversions between the float and integer domains.
    pub fn is_float_int_conversion(&self) -> bool {
        matches!(
            self,
            CastOp::FPToUI | CastOp::FPToSI | CastOp::UIToFP | CastOp::SIToFP
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Binary {
        op: BinaryOp,
        lhs: Handle<Value>,
        rhs: Handle<Value>,
    },
    Cast {
        op: CastOp,
        value: Handle<Value>,
    },
    Call {
        callee: Handle<Function>,
        args: Vec<Handle<Value>>,
    },
    Phi {
        incoming: Vec<Handle<Value>>,
    },
    Select {
        condition: Handle<Value>,
        if_true: Handle<Value>,
        if_false: Handle<Value>,
    },
    ExtractElement {
        vector: Handle<Value>,
        index: Handle<Value>,
    },
    InsertElement {
        vector: Handle<Value>,
        element: Handle<Value>,
        index: Handle<Value>,
    },
    GetElementPtr {
        base: Handle<Value>,
        indices: Vec<Handle<Value>>,
    },
    Load {
        pointer: Handle<Value>,
    },
    Store {
        pointer: Handle<Value>,
        value: Handle<Value>,
    },
    Return {
        value: Option<Handle<Value>>,
    },
}

impl Instruction {
    /// Value operands, in order. The callee of a call is not an operand.
    pub fn operands(&self) -> Vec<Handle<Value>> {
        match self {
            Instruction::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Instruction::Cast { value, .. } => vec![*value],
            Instruction::Call { args, .. } => args.clone(),
            Instruction::Phi { incoming } => incoming.clone(),
            Instruction::Select {
                condition,
                if_true,
                if_false,
            } => vec![*condition, *if_true, *if_false],
            Instruction::ExtractElement { vector, index } => vec![*vector, *index],
            Instruction::InsertElement {
                vector,
                element,
                index,
            } => vec![*vector, *element, *index],
            Instruction::GetElementPtr { base, indices } => {
                let mut ops = vec![*base];
                ops.extend(indices.iter().copied());
                ops
            }
            Instruction::Load { pointer } => vec![*pointer],
            Instruction::Store { pointer, value } => vec![*pointer, *value],
            Instruction::Return { value } => value.iter().copied().collect(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Handle<Value>> {
        match self {
            Instruction::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Instruction::Cast { value, .. } => vec![value],
            Instruction::Call { args, .. } => args.iter_mut().collect(),
            Instruction::Phi { incoming } => incoming.iter_mut().collect(),
            Instruction::Select {
                condition,
                if_true,
                if_false,
            } => vec![condition, if_true, if_false],
            Instruction::ExtractElement { vector, index } => vec![vector, index],
            Instruction::InsertElement {
                vector,
                element,
                index,
            } => vec![vector, element, index],
            Instruction::GetElementPtr { base, indices } => {
                let mut ops = vec![base];
                ops.extend(indices.iter_mut());
                ops
            }
            Instruction::Load { pointer } => vec![pointer],
            Instruction::Store { pointer, value } => vec![pointer, value],
            Instruction::Return { value } => value.iter_mut().collect(),
        }
    }

    pub fn is_vector_element_access(&self) -> bool {
        matches!(
            self,
            Instruction::ExtractElement { .. } | Instruction::InsertElement { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// Integer constant, stored zero-extended.
    ConstInt(u64),
    ConstFloat(f64),
    Undef,
    Argument {
        function: Handle<Function>,
        index: u32,
    },
    Global(Handle<GlobalVariable>),
    Function(Handle<Function>),
    Instruction {
        function: Handle<Function>,
        inst: Instruction,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub ty: Handle<Type>,
    pub kind: ValueKind,
}

impl Value {
    pub fn as_const_int(&self) -> Option<u64> {
        match self.kind {
            ValueKind::ConstInt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_instruction(&self) -> Option<&Instruction> {
        match &self.kind {
            ValueKind::Instruction { inst, .. } => Some(inst),
            _ => None,
        }
    }
}
