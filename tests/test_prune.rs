use dxil_module::dxil::{
    constants::{ResourceClass, ResourceKind},
    opcode::CREATE_HANDLE_RANGE_ID_IDX,
    DxilModule, Resource, ShaderModel,
};
use dxil_module::hlsl::resources::{create_handle_call, handle_type};
use dxil_module::ir::{Instruction, Module};

fn three_uavs() -> DxilModule {
    let mut dxil = DxilModule::new();
    dxil.set_shader_model(ShaderModel::get_by_name("cs_6_0").expect("cs_6_0"));
    for _ in 0..3 {
        dxil.add_uav(Resource::new_uav(ResourceKind::RawBuffer));
    }
    dxil
}

#[test]
fn test_phi_keeps_both_incoming() {
    let mut module = Module::new("prune");
    let void = module.void_type();
    let main = module.add_function("main", void, &[]);
    let i32_ty = module.int_type(32);
    let zero = module.const_i32(0);
    let one = module.const_i32(1);
    let phi = module.append(
        main,
        i32_ty,
        Instruction::Phi {
            incoming: vec![zero, one],
        },
    );
    let call = match create_handle_call(&mut module, ResourceClass::UAV, 0, zero) {
        Instruction::Call { callee, mut args } => {
            args[CREATE_HANDLE_RANGE_ID_IDX] = phi;
            Instruction::Call { callee, args }
        }
        other => panic!("not a call: {:?}", other),
    };
    let handle_ty = handle_type(&mut module);
    let handle = module.append(main, handle_ty, call);
    module.append(main, void, Instruction::Return { value: Some(handle) });

    let mut dxil = three_uavs();
    dxil.remove_unused_resources(&mut module);
    let ids: Vec<u32> = dxil.uavs().iter().map(|u| u.base.id()).collect();
    assert_eq!(ids, vec![0, 1]);
}

#[test]
fn test_unused_handle_drops_resource() {
    let mut module = Module::new("prune");
    let void = module.void_type();
    let main = module.add_function("main", void, &[]);
    let zero = module.const_i32(0);
    let handle_ty = handle_type(&mut module);

    let used = create_handle_call(&mut module, ResourceClass::UAV, 2, zero);
    let used = module.append(main, handle_ty, used);
    let unused = create_handle_call(&mut module, ResourceClass::UAV, 1, zero);
    module.append(main, handle_ty, unused);
    module.append(main, void, Instruction::Return { value: Some(used) });

    let mut dxil = three_uavs();
    dxil.remove_unused_resources(&mut module);
    let ids: Vec<u32> = dxil.uavs().iter().map(|u| u.base.id()).collect();
    assert_eq!(ids, vec![2]);
}

#[test]
fn test_no_handles_drops_everything() {
    let mut module = Module::new("prune");
    let void = module.void_type();
    let main = module.add_function("main", void, &[]);
    module.append(main, void, Instruction::Return { value: None });

    let mut dxil = three_uavs();
    dxil.remove_unused_resources(&mut module);
    assert!(dxil.uavs().is_empty());
    assert_eq!(dxil.add_uav(Resource::new_uav(ResourceKind::RawBuffer)), 3);
}
