//! Deriving [ShaderFlags] from the instructions, signatures and resources of a module.

use std::collections::HashSet;

use crate::ir::{BinaryOp, Handle, Instruction, Module, Type, Value};

use super::{
    constants::{ResourceClass, ResourceKind, SemanticKind, ShaderKind},
    module::DxilModule,
    opcode::{is_op_function, OpCode, CREATE_HANDLE_NAME, CREATE_HANDLE_RANGE_ID_IDX, LOAD_HANDLE_IDX},
    prune::{collect_resource_ids, create_handle_class},
    shader_flags::ShaderFlags,
    signature::Signature,
};

/// Per-instruction findings, OR-ed over the whole module.
#[derive(Debug, Default)]
struct InstructionScan {
    has_double: bool,
    has_int64: bool,
    has_16bit: bool,
    has_double_extension: bool,
    has_wave_ops: bool,
    has_tiled_resources: bool,
    has_msad: bool,
    has_multicomponent_uav_loads: bool,
    has_inner_coverage: bool,
    has_view_id: bool,
    has_barycentrics: bool,
}

/// True for a scalar, or an aggregate that wraps exactly one scalar.
fn is_single_component(module: &Module, ty: Handle<Type>) -> bool {
    match module.ty(ty) {
        Type::Int { .. } | Type::Float { .. } => true,
        Type::Vector { len, .. } => *len == 1,
        Type::Array { element, len } => *len == 1 && is_single_component(module, *element),
        Type::Struct { fields, .. } => fields.len() == 1 && is_single_component(module, fields[0]),
        _ => false,
    }
}

/// Every `dx.op.createHandle` call a handle value may come from, looking through `phi` and `select`.
fn handle_sources(module: &Module, handle: Handle<Value>) -> Vec<&[Handle<Value>]> {
    let mut sources = Vec::new();
    let mut visited = HashSet::new();
    let mut worklist = vec![handle];
    while let Some(value) = worklist.pop() {
        if !visited.insert(value) {
            continue;
        }
        match module.instruction(value) {
            Some(Instruction::Call { callee, args }) if module.function(*callee).name == CREATE_HANDLE_NAME => {
                sources.push(args.as_slice())
            }
            Some(Instruction::Select { if_true, if_false, .. }) => {
                worklist.push(*if_true);
                worklist.push(*if_false);
            }
            Some(Instruction::Phi { incoming }) => worklist.extend(incoming.iter().copied()),
            _ => log::warn!("cannot trace resource handle {:?} to its creation", value),
        }
    }
    sources
}

impl DxilModule {
    /// The element type a typed resource was declared with, taken from its global.
    fn resource_element_type(&self, module: &Module, class: ResourceClass, id: u32) -> Option<(ResourceKind, Handle<Type>)> {
        let res = match class {
            ResourceClass::UAV => self.uav(id)?,
            ResourceClass::SRV => self.srv(id)?,
            _ => return None,
        };
        let global = module.global(res.base.global_symbol?);
        let element = match module.ty(global.ty) {
            Type::Struct { fields, .. } if !fields.is_empty() => fields[0],
            _ => global.ty,
        };
        Some((res.kind(), element))
    }

    /// Whether a buffer or texture load through `handle` reads a multi-component typed UAV.
    fn loads_multicomponent_uav(&self, module: &Module, op: OpCode, handle: Handle<Value>) -> bool {
        for args in handle_sources(module, handle) {
            if create_handle_class(module, args) != ResourceClass::UAV {
                continue;
            }
            for id in collect_resource_ids(module, args[CREATE_HANDLE_RANGE_ID_IDX]) {
                let (kind, element) = match self.resource_element_type(module, ResourceClass::UAV, id) {
                    Some(found) => found,
                    None => continue,
                };
                let kind_qualifies = op == OpCode::TextureLoad || kind == ResourceKind::TypedBuffer;
                if kind_qualifies && !is_single_component(module, element) {
                    log::trace!("UAV {} is loaded with more than one component", id);
                    return true;
                }
            }
        }
        false
    }

    fn scan_instruction(&self, module: &Module, value: Handle<Value>, scan: &mut InstructionScan) {
        let inst = match module.instruction(value) {
            Some(inst) => inst,
            None => return,
        };
        let result_ty = module.value_type(value);

        let mut is_double = false;
        if !inst.is_vector_element_access() {
            let operand_types = inst.operands().into_iter().map(|op| module.value_type(op));
            for ty in std::iter::once(result_ty).chain(operand_types) {
                is_double |= module.is_float_of_width(ty, 64);
                scan.has_int64 |= module.is_int_of_width(ty, 64);
                scan.has_16bit |= module.is_float_of_width(ty, 16) || module.is_int_of_width(ty, 16);
            }
            scan.has_double |= is_double;
        }

        match inst {
            Instruction::Binary { op: BinaryOp::FDiv, .. } if is_double => scan.has_double_extension = true,
            Instruction::Cast { op, .. } if op.is_float_int_conversion() && is_double => {
                scan.has_double_extension = true
            }
            Instruction::Call { callee, args } if is_op_function(&module.function(*callee).name) => {
                let raw = args
                    .first()
                    .and_then(|op| module.const_int_value(*op))
                    .unwrap_or_else(|| panic!("DXIL intrinsic {} called without an immediate opcode", module.function(*callee).name));
                let opcode = match OpCode::from_immediate(raw) {
                    Some(op) => op,
                    None => return,
                };
                match opcode {
                    op if op.is_wave() => scan.has_wave_ops = true,
                    OpCode::CheckAccessFullyMapped => scan.has_tiled_resources = true,
                    OpCode::Msad => scan.has_msad = true,
                    OpCode::BufferLoad | OpCode::TextureLoad => {
                        if !scan.has_multicomponent_uav_loads {
                            scan.has_multicomponent_uav_loads =
                                self.loads_multicomponent_uav(module, opcode, args[LOAD_HANDLE_IDX]);
                        }
                    }
                    OpCode::Fma => {
                        scan.has_double_extension |= args[1..]
                            .iter()
                            .any(|a| module.is_float_of_width(module.value_type(*a), 64))
                    }
                    OpCode::InnerCoverage => scan.has_inner_coverage = true,
                    OpCode::ViewID => scan.has_view_id = true,
                    OpCode::AttributeAtVertex => scan.has_barycentrics = true,
                    _ => {}
                }
            }
            _ => {}
        }
    }

    /// Computes the shader flags of this module without storing them.
    ///
    /// Flags that come from compile options are carried over from the current flags.
    pub fn compute_shader_flags(&self, module: &Module) -> ShaderFlags {
        let mut scan = InstructionScan::default();
        for (_, function) in module.functions() {
            for inst in &function.body {
                self.scan_instruction(module, *inst, &mut scan);
            }
        }

        let kind = self.shader_kind();
        let input = self.input_signature();
        let output = self.output_signature();

        let mut stencil_ref = false;
        let mut inner_coverage = scan.has_inner_coverage;
        if kind == ShaderKind::Pixel {
            stencil_ref = output.has_semantic(SemanticKind::StencilRef);
            inner_coverage |= output.has_semantic(SemanticKind::InnerCoverage);
        }

        let array_index = |sig: &Signature| {
            sig.has_semantic(SemanticKind::ViewportArrayIndex) || sig.has_semantic(SemanticKind::RenderTargetArrayIndex)
        };
        let mut viewport_and_rt_array_index = false;
        if matches!(kind, ShaderKind::Geometry | ShaderKind::Domain | ShaderKind::Hull | ShaderKind::Pixel) {
            viewport_and_rt_array_index |= array_index(input);
        }
        if matches!(kind, ShaderKind::Vertex | ShaderKind::Domain | ShaderKind::Hull | ShaderKind::Pixel) {
            viewport_and_rt_array_index |= array_index(output);
        }

        let num_uavs = self.uavs().len();
        let raw_or_structured = self
            .uavs()
            .iter()
            .chain(self.srvs())
            .any(|r| r.kind().is_raw_or_structured());
        let rovs = self.uavs().iter().any(|u| u.rov);
        let sm4_compute = self
            .shader_model()
            .map_or(false, |sm| sm.major() == 4 && sm.is_cs());

        let mut flags = self.shader_flags().option_flags();
        flags.enable_double_precision = scan.has_double;
        flags.int64_ops = scan.has_int64;
        flags.enable_min_precision = scan.has_16bit && !flags.use_native_low_precision;
        flags.enable_double_extensions = scan.has_double_extension;
        flags.wave_ops = scan.has_wave_ops;
        flags.tiled_resources = scan.has_tiled_resources;
        flags.enable_msad = scan.has_msad;
        flags.uav_load_additional_formats = scan.has_multicomponent_uav_loads;
        flags.inner_coverage = inner_coverage;
        flags.view_id = scan.has_view_id;
        flags.barycentrics = scan.has_barycentrics || input.has_semantic(SemanticKind::Barycentrics);
        flags.stencil_ref = stencil_ref;
        flags.viewport_and_rt_array_index = viewport_and_rt_array_index;
        flags.uavs_64 = num_uavs > 8;
        flags.uavs_at_every_stage = num_uavs > 0 && !matches!(kind, ShaderKind::Compute | ShaderKind::Pixel);
        flags.enable_raw_and_structured_buffers = raw_or_structured;
        flags.rovs = rovs;
        flags.cs_raw_and_structured_via_shader_4x = raw_or_structured && sm4_compute;

        log::trace!("collected shader flags {:#x}", flags.raw());
        flags
    }

    /// Rescans the module and replaces the derived shader flags.
    ///
    /// Must be rerun after anything that changes instructions, resources or signatures.
    pub fn collect_shader_flags(&mut self, module: &Module) {
        let flags = self.compute_shader_flags(module);
        self.set_shader_flags(flags);
    }
}
