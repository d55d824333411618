//! Dropping resources whose handles are never used.

use std::collections::{BTreeSet, HashSet};

use num_traits::FromPrimitive;

use crate::ir::{CastOp, Handle, Instruction, Module, Value};

use super::{
    constants::ResourceClass,
    module::DxilModule,
    opcode::{CREATE_HANDLE_CLASS_IDX, CREATE_HANDLE_NAME, CREATE_HANDLE_RANGE_ID_IDX},
};

/// Every resource id a createHandle id operand may evaluate to.
///
/// Constants are taken as they are, `select` and `phi` contribute all their incoming values,
/// and a `zext` of an `i1` may be either 0 or 1.
pub(crate) fn collect_resource_ids(module: &Module, id: Handle<Value>) -> BTreeSet<u32> {
    let mut ids = BTreeSet::new();
    let mut visited = HashSet::new();
    let mut worklist = vec![id];

    while let Some(value) = worklist.pop() {
        if !visited.insert(value) {
            continue;
        }
        if let Some(c) = module.const_int_value(value) {
            ids.insert(c as u32);
            continue;
        }
        match module.instruction(value) {
            Some(Instruction::Cast {
                op: CastOp::ZExt,
                value: src,
            }) => {
                if module.is_int_of_width(module.value_type(*src), 1) {
                    ids.insert(0);
                    ids.insert(1);
                } else {
                    log::warn!("resource id {:?} is a zext of a non-boolean, ignoring it", value);
                }
            }
            Some(Instruction::Select { if_true, if_false, .. }) => {
                worklist.push(*if_true);
                worklist.push(*if_false);
            }
            Some(Instruction::Phi { incoming }) => worklist.extend(incoming.iter().copied()),
            _ => log::warn!("cannot resolve resource id {:?}, ignoring it", value),
        }
    }
    ids
}

/// The constant resource class operand of a createHandle call. Panics if it isn't one.
pub(crate) fn create_handle_class(module: &Module, args: &[Handle<Value>]) -> ResourceClass {
    let raw = module
        .const_int_value(args[CREATE_HANDLE_CLASS_IDX])
        .unwrap_or_else(|| panic!("createHandle resource class must be an immediate constant"));
    ResourceClass::from_u64(raw).unwrap_or_else(|| panic!("createHandle resource class {} is invalid", raw))
}

impl DxilModule {
    /// Drops every resource no live handle can refer to.
    ///
    /// Must run once, after lowering and before metadata is emitted. If nothing calls
    /// `dx.op.createHandle` at all, every resource is dropped and the declaration erased.
    pub fn remove_unused_resources(&mut self, module: &mut Module) {
        let create_handle = module.get_function(CREATE_HANDLE_NAME);
        let calls = create_handle.map(|f| module.calls_to(f)).unwrap_or_default();
        if calls.is_empty() {
            log::debug!("no resource handles created, dropping all resources");
            self.clear_resources();
            if let Some(f) = create_handle {
                module.erase_function(f);
            }
            return;
        }

        let mut srvs = BTreeSet::new();
        let mut uavs = BTreeSet::new();
        let mut cbuffers = BTreeSet::new();
        let mut samplers = BTreeSet::new();
        for call in calls {
            if module.users(call).is_empty() {
                continue;
            }
            let args = match module.instruction(call) {
                Some(Instruction::Call { args, .. }) => args,
                _ => unreachable!("calls_to returned a non-call"),
            };
            let used = match create_handle_class(module, args) {
                ResourceClass::SRV => &mut srvs,
                ResourceClass::UAV => &mut uavs,
                ResourceClass::CBuffer => &mut cbuffers,
                ResourceClass::Sampler => &mut samplers,
                ResourceClass::Invalid => panic!("createHandle with invalid resource class"),
            };
            used.extend(collect_resource_ids(module, args[CREATE_HANDLE_RANGE_ID_IDX]));
        }

        log::trace!(
            "used resources: srv {:?} uav {:?} cbuffer {:?} sampler {:?}",
            srvs,
            uavs,
            cbuffers,
            samplers
        );
        self.retain_resources(&srvs, &uavs, &cbuffers, &samplers);
    }
}
