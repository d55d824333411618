use dxil_module::dxil::{
    constants::{ResourceKind, ShaderKind},
    opcode::OpCode,
    DxilModule, Resource, ShaderModel,
};
use dxil_module::ir::{BinaryOp, Instruction, Module};

fn module_for(profile: &str) -> DxilModule {
    let mut dxil = DxilModule::new();
    dxil.set_shader_model(ShaderModel::get_by_name(profile).expect("known profile"));
    dxil
}

#[test]
fn test_double_division() {
    let mut module = Module::new("flags");
    let f64_ty = module.float_type(64);
    let main = module.add_function("main", f64_ty, &[]);
    let a = module.const_float(f64_ty, 1.0);
    let b = module.const_float(f64_ty, 3.0);
    let q = module.append(
        main,
        f64_ty,
        Instruction::Binary {
            op: BinaryOp::FDiv,
            lhs: a,
            rhs: b,
        },
    );
    let void = module.void_type();
    module.append(main, void, Instruction::Return { value: Some(q) });

    let mut dxil = module_for("ps_6_0");
    dxil.collect_shader_flags(&module);
    let flags = *dxil.shader_flags();
    assert!(flags.enable_double_precision);
    assert!(flags.enable_double_extensions);
    assert!(!flags.wave_ops);
    assert!(!flags.int64_ops);

    // Collecting again from the same module changes nothing.
    dxil.collect_shader_flags(&module);
    assert_eq!(*dxil.shader_flags(), flags);
}

#[test]
fn test_double_add_is_not_an_extension() {
    let mut module = Module::new("flags");
    let f64_ty = module.float_type(64);
    let main = module.add_function("main", f64_ty, &[]);
    let a = module.const_float(f64_ty, 1.0);
    module.append(
        main,
        f64_ty,
        Instruction::Binary {
            op: BinaryOp::FAdd,
            lhs: a,
            rhs: a,
        },
    );

    let mut dxil = module_for("vs_6_0");
    dxil.collect_shader_flags(&module);
    assert!(dxil.shader_flags().enable_double_precision);
    assert!(!dxil.shader_flags().enable_double_extensions);
}

#[test]
fn test_wave_intrinsic() {
    let mut module = Module::new("flags");
    let void = module.void_type();
    let i1_ty = module.int_type(1);
    let i32_ty = module.int_type(32);
    let main = module.add_function("main", void, &[]);
    let wave = module.declare_function("dx.op.waveIsFirstLane", i1_ty, &[i32_ty]);
    let opcode = module.const_i32(OpCode::WaveIsFirstLane as u32);
    module.append(
        main,
        i1_ty,
        Instruction::Call {
            callee: wave,
            args: vec![opcode],
        },
    );

    let mut dxil = module_for("cs_6_0");
    dxil.collect_shader_flags(&module);
    assert!(dxil.shader_flags().wave_ops);
    assert!(!dxil.shader_flags().enable_double_precision);
}

#[test]
fn test_options_survive_collection() {
    let module = Module::new("flags");
    let mut dxil = module_for("ps_6_0");
    dxil.shader_flags_mut().disable_optimizations = true;
    dxil.shader_flags_mut().all_resources_bound = true;
    dxil.shader_flags_mut().wave_ops = true;
    dxil.collect_shader_flags(&module);
    assert!(dxil.shader_flags().disable_optimizations);
    assert!(dxil.shader_flags().all_resources_bound);
    assert!(!dxil.shader_flags().wave_ops);
}

#[test]
fn test_uav_stage_flags() {
    let module = Module::new("flags");
    let mut dxil = module_for("vs_6_0");
    assert_eq!(dxil.shader_kind(), ShaderKind::Vertex);
    dxil.add_uav(Resource::new_uav(ResourceKind::StructuredBuffer));
    dxil.collect_shader_flags(&module);
    assert!(dxil.shader_flags().uavs_at_every_stage);
    assert!(dxil.shader_flags().enable_raw_and_structured_buffers);
    assert!(!dxil.shader_flags().uavs_64);

    let mut compute = module_for("cs_6_0");
    compute.add_uav(Resource::new_uav(ResourceKind::Texture2D));
    compute.collect_shader_flags(&module);
    assert!(!compute.shader_flags().uavs_at_every_stage);
    assert!(!compute.shader_flags().enable_raw_and_structured_buffers);
}
