use super::{
    arena::{Arena, Handle, UniqueArena},
    metadata::Metadata,
    types::Type,
    value::{Instruction, Value, ValueKind},
};

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariable {
    pub name: String,
    /// The type of the stored value. The global itself is a pointer to this.
    pub ty: Handle<Type>,
    pub is_constant: bool,
    erased: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub return_type: Handle<Type>,
    pub params: Vec<Handle<Value>>,
    /// Instructions in program order.
    pub body: Vec<Handle<Value>>,
    pub is_declaration: bool,
    erased: bool,
}

/// A single translation unit.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    types: UniqueArena<Type>,
    values: Arena<Value>,
    functions: Arena<Function>,
    globals: Arena<GlobalVariable>,
    function_values: Vec<Handle<Value>>,
    global_values: Vec<Handle<Value>>,
    pub metadata: Metadata,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    // Types

    pub fn add_type(&mut self, ty: Type) -> Handle<Type> {
        self.types.insert(ty)
    }

    pub fn ty(&self, ty: Handle<Type>) -> &Type {
        &self.types[ty]
    }

    pub fn types(&self) -> impl Iterator<Item = (Handle<Type>, &Type)> {
        self.types.iter()
    }

    pub fn void_type(&mut self) -> Handle<Type> {
        self.add_type(Type::Void)
    }

    pub fn int_type(&mut self, bits: u32) -> Handle<Type> {
        self.add_type(Type::Int { bits })
    }

    pub fn float_type(&mut self, bits: u32) -> Handle<Type> {
        self.add_type(Type::Float { bits })
    }

    pub fn vector_type(&mut self, element: Handle<Type>, len: u32) -> Handle<Type> {
        self.add_type(Type::Vector { element, len })
    }

    pub fn array_type(&mut self, element: Handle<Type>, len: u32) -> Handle<Type> {
        self.add_type(Type::Array { element, len })
    }

    pub fn pointer_type(&mut self, pointee: Handle<Type>) -> Handle<Type> {
        self.add_type(Type::Pointer { pointee })
    }

    pub fn struct_type(&mut self, name: &str, fields: Vec<Handle<Type>>) -> Handle<Type> {
        self.add_type(Type::Struct {
            name: name.to_owned(),
            fields,
        })
    }

    /// The element type of a vector, or the type itself.
    pub fn scalar_type_of(&self, ty: Handle<Type>) -> Handle<Type> {
        match self.ty(ty) {
            Type::Vector { element, .. } => *element,
            _ => ty,
        }
    }

    pub fn is_float_of_width(&self, ty: Handle<Type>, bits: u32) -> bool {
        matches!(self.ty(self.scalar_type_of(ty)), Type::Float { bits: b } if *b == bits)
    }

    pub fn is_int_of_width(&self, ty: Handle<Type>, bits: u32) -> bool {
        matches!(self.ty(self.scalar_type_of(ty)), Type::Int { bits: b } if *b == bits)
    }

    // Constants

    fn add_value(&mut self, ty: Handle<Type>, kind: ValueKind) -> Handle<Value> {
        self.values.append(Value { ty, kind })
    }

    pub fn const_int(&mut self, ty: Handle<Type>, value: u64) -> Handle<Value> {
        self.add_value(ty, ValueKind::ConstInt(value))
    }

    pub fn const_i1(&mut self, value: bool) -> Handle<Value> {
        let ty = self.int_type(1);
        self.const_int(ty, value as u64)
    }

    pub fn const_i8(&mut self, value: u8) -> Handle<Value> {
        let ty = self.int_type(8);
        self.const_int(ty, value as u64)
    }

    pub fn const_i32(&mut self, value: u32) -> Handle<Value> {
        let ty = self.int_type(32);
        self.const_int(ty, value as u64)
    }

    pub fn const_float(&mut self, ty: Handle<Type>, value: f64) -> Handle<Value> {
        self.add_value(ty, ValueKind::ConstFloat(value))
    }

    pub fn undef(&mut self, ty: Handle<Type>) -> Handle<Value> {
        self.add_value(ty, ValueKind::Undef)
    }

    // Values

    pub fn value(&self, value: Handle<Value>) -> &Value {
        &self.values[value]
    }

    pub fn value_type(&self, value: Handle<Value>) -> Handle<Type> {
        self.values[value].ty
    }

    pub fn const_int_value(&self, value: Handle<Value>) -> Option<u64> {
        self.values[value].as_const_int()
    }

    pub fn instruction(&self, value: Handle<Value>) -> Option<&Instruction> {
        self.values[value].as_instruction()
    }

    // Globals

    pub fn add_global(&mut self, name: &str, ty: Handle<Type>, is_constant: bool) -> Handle<GlobalVariable> {
        let global = self.globals.append(GlobalVariable {
            name: name.to_owned(),
            ty,
            is_constant,
            erased: false,
        });
        let ptr_ty = self.pointer_type(ty);
        let value = self.add_value(ptr_ty, ValueKind::Global(global));
        self.global_values.push(value);
        global
    }

    pub fn global(&self, global: Handle<GlobalVariable>) -> &GlobalVariable {
        &self.globals[global]
    }

    pub fn global_value(&self, global: Handle<GlobalVariable>) -> Handle<Value> {
        self.global_values[global.index()]
    }

    pub fn find_global(&self, name: &str) -> Option<Handle<GlobalVariable>> {
        self.globals()
            .find(|(_, g)| g.name == name)
            .map(|(h, _)| h)
    }

    pub fn globals(&self) -> impl Iterator<Item = (Handle<GlobalVariable>, &GlobalVariable)> {
        self.globals.iter().filter(|(_, g)| !g.erased)
    }

    pub fn erase_global(&mut self, global: Handle<GlobalVariable>) {
        self.globals[global].erased = true;
    }

    // Functions

    fn new_function(
        &mut self,
        name: &str,
        return_type: Handle<Type>,
        param_types: &[Handle<Type>],
        is_declaration: bool,
    ) -> Handle<Function> {
        let function = self.functions.append(Function {
            name: name.to_owned(),
            return_type,
            params: Vec::new(),
            body: Vec::new(),
            is_declaration,
            erased: false,
        });
        let params = param_types
            .iter()
            .enumerate()
            .map(|(index, ty)| {
                self.add_value(
                    *ty,
                    ValueKind::Argument {
                        function,
                        index: index as u32,
                    },
                )
            })
            .collect();
        self.functions[function].params = params;
        let fn_ty = self.void_type();
        let value = self.add_value(fn_ty, ValueKind::Function(function));
        self.function_values.push(value);
        function
    }

    /// Adds a function definition with an empty body.
    pub fn add_function(
        &mut self,
        name: &str,
        return_type: Handle<Type>,
        param_types: &[Handle<Type>],
    ) -> Handle<Function> {
        self.new_function(name, return_type, param_types, false)
    }

    /// Returns the existing function with this name, or adds a body-less declaration.
    pub fn declare_function(
        &mut self,
        name: &str,
        return_type: Handle<Type>,
        param_types: &[Handle<Type>],
    ) -> Handle<Function> {
        match self.get_function(name) {
            Some(existing) => existing,
            None => self.new_function(name, return_type, param_types, true),
        }
    }

    pub fn function(&self, function: Handle<Function>) -> &Function {
        &self.functions[function]
    }

    pub fn function_value(&self, function: Handle<Function>) -> Handle<Value> {
        self.function_values[function.index()]
    }

    pub fn get_function(&self, name: &str) -> Option<Handle<Function>> {
        self.functions()
            .find(|(_, f)| f.name == name)
            .map(|(h, _)| h)
    }

    pub fn functions(&self) -> impl Iterator<Item = (Handle<Function>, &Function)> {
        self.functions.iter().filter(|(_, f)| !f.erased)
    }

    pub fn is_erased(&self, function: Handle<Function>) -> bool {
        self.functions[function].erased
    }

    pub fn erase_function(&mut self, function: Handle<Function>) {
        let f = &mut self.functions[function];
        f.erased = true;
        f.body.clear();
    }

    // Instructions

    /// Appends an instruction to the end of a function body.
    pub fn append(&mut self, function: Handle<Function>, ty: Handle<Type>, inst: Instruction) -> Handle<Value> {
        let value = self.add_value(ty, ValueKind::Instruction { function, inst });
        let f = &mut self.functions[function];
        f.is_declaration = false;
        f.body.push(value);
        value
    }

    /// Inserts an instruction at `position` in a function body.
    pub fn insert(
        &mut self,
        function: Handle<Function>,
        position: usize,
        ty: Handle<Type>,
        inst: Instruction,
    ) -> Handle<Value> {
        let value = self.add_value(ty, ValueKind::Instruction { function, inst });
        let f = &mut self.functions[function];
        f.is_declaration = false;
        f.body.insert(position, value);
        value
    }

    /// Rewrites the instruction computing `value`, keeping its position and its uses.
    pub fn replace_instruction(&mut self, value: Handle<Value>, ty: Handle<Type>, inst: Instruction) {
        let v = &mut self.values[value];
        match &mut v.kind {
            ValueKind::Instruction { inst: old, .. } => *old = inst,
            other => panic!("{:?} is not an instruction: {:?}", value, other),
        }
        v.ty = ty;
    }

    pub fn position_in_body(&self, function: Handle<Function>, value: Handle<Value>) -> Option<usize> {
        self.functions[function].body.iter().position(|v| *v == value)
    }

    /// Every instruction in a live function that uses `value` as an operand.
    pub fn users(&self, value: Handle<Value>) -> Vec<Handle<Value>> {
        self.functions()
            .flat_map(|(_, f)| f.body.iter().copied())
            .filter(|inst| {
                self.instruction(*inst)
                    .map_or(false, |i| i.operands().contains(&value))
            })
            .collect()
    }

    /// Every live call instruction whose callee is `function`.
    pub fn calls_to(&self, function: Handle<Function>) -> Vec<Handle<Value>> {
        self.functions()
            .flat_map(|(_, f)| f.body.iter().copied())
            .filter(|inst| {
                matches!(self.instruction(*inst), Some(Instruction::Call { callee, .. }) if *callee == function)
            })
            .collect()
    }

    /// Rewrites every operand equal to `old` into `new` inside one function.
    pub fn replace_uses_in(&mut self, function: Handle<Function>, old: Handle<Value>, new: Handle<Value>) {
        let body = self.functions[function].body.clone();
        for inst in body {
            if inst == new {
                continue;
            }
            if let ValueKind::Instruction { inst, .. } = &mut self.values[inst].kind {
                for op in inst.operands_mut() {
                    if *op == old {
                        *op = new;
                    }
                }
            }
        }
    }

    /// The function whose body holds this instruction, or whose argument this is.
    pub fn parent_function(&self, value: Handle<Value>) -> Option<Handle<Function>> {
        match self.values[value].kind {
            ValueKind::Instruction { function, .. } | ValueKind::Argument { function, .. } => Some(function),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::value::BinaryOp;

    #[test]
    fn users_and_replace() {
        let mut m = Module::new("t");
        let f32_ty = m.float_type(32);
        let f = m.add_function("main", f32_ty, &[f32_ty, f32_ty]);
        let a = m.function(f).params[0];
        let b = m.function(f).params[1];
        let add = m.append(f, f32_ty, Instruction::Binary { op: BinaryOp::FAdd, lhs: a, rhs: a });
        assert_eq!(m.users(a), vec![add]);
        m.replace_uses_in(f, a, b);
        assert!(m.users(a).is_empty());
        assert_eq!(m.users(b), vec![add]);
    }
}
