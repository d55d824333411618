use dxil_module::dxil::{
    constants::{ComponentType, InterpolationMode, ResourceKind, SamplerKind, SemanticKind},
    metadata::{ENTRY_POINTS_MD_NAME, VIEW_ID_STATE_MD_NAME},
    DxilModule, LowerBound, MetadataError, Resource, Sampler, ShaderModel, SignatureElement,
};
use dxil_module::ir::{MdConst, MdNode, Module};

fn compute_module(module: &mut Module) -> DxilModule {
    let void = module.void_type();
    let main = module.add_function("main", void, &[]);

    let mut dxil = DxilModule::new();
    dxil.set_shader_model(ShaderModel::get_by_name("cs_6_0").expect("cs_6_0"));
    dxil.set_entry_function(main);
    dxil.set_entry_name("main");
    dxil.set_num_threads(8, 8, 1);

    let mut srv = Resource::new_srv(ResourceKind::StructuredBuffer);
    srv.element_stride = 16;
    srv.base.global_name = "Input".to_owned();
    srv.base.lower_bound = LowerBound::Bound(0);
    dxil.add_srv(srv);

    let mut uav = Resource::new_uav(ResourceKind::TypedBuffer);
    uav.comp_type = ComponentType::F32;
    uav.base.global_name = "Output".to_owned();
    uav.base.lower_bound = LowerBound::Bound(1);
    uav.base.space_id = 2;
    dxil.add_uav(uav);

    let mut sampler = Sampler::new(SamplerKind::Comparison);
    sampler.base.lower_bound = LowerBound::Bound(3);
    dxil.add_sampler(sampler);

    let flags = dxil.shader_flags_mut();
    flags.enable_raw_and_structured_buffers = true;
    flags.disable_math_refactoring = true;
    dxil
}

#[test]
fn test_compute_round_trip() {
    let mut module = Module::new("cs");
    let dxil = compute_module(&mut module);
    dxil.emit_metadata(&mut module);

    let loaded = DxilModule::load_metadata(&module).expect("load failed");
    assert_eq!(loaded.shader_model().map(|sm| sm.name()), Some("cs_6_0"));
    assert_eq!(loaded.entry_name(), "main");
    assert_eq!(loaded.entry_function(), dxil.entry_function());
    assert_eq!(loaded.num_threads(), [8, 8, 1]);
    assert_eq!(loaded.srvs(), dxil.srvs());
    assert_eq!(loaded.uavs(), dxil.uavs());
    assert_eq!(loaded.samplers(), dxil.samplers());
    assert_eq!(loaded.shader_flags(), dxil.shader_flags());
    assert_eq!(loaded.validator_version(), (1, 0));
}

fn pixel_module(module: &mut Module) -> DxilModule {
    let void = module.void_type();
    let main = module.add_function("main", void, &[]);

    let mut dxil = DxilModule::new();
    dxil.set_shader_model(ShaderModel::get_by_name("ps_6_0").expect("ps_6_0"));
    dxil.set_entry_function(main);
    dxil.set_entry_name("main");

    let mut texcoord = SignatureElement::new("TEXCOORD", SemanticKind::Arbitrary, ComponentType::F32, 1, 2);
    texcoord.semantic_indices = vec![3];
    texcoord.interpolation_mode = InterpolationMode::Linear;
    texcoord.start_row = 0;
    texcoord.start_col = 0;
    dxil.input_signature_mut().append_element(texcoord);

    let mut target = SignatureElement::new("SV_Target", SemanticKind::Target, ComponentType::F32, 1, 4);
    target.semantic_indices = vec![0];
    target.start_row = 0;
    target.start_col = 0;
    dxil.output_signature_mut().append_element(target);
    dxil
}

#[test]
fn test_pixel_signature_round_trip() {
    let mut module = Module::new("ps");
    let dxil = pixel_module(&mut module);
    dxil.emit_metadata(&mut module);

    let loaded = DxilModule::load_metadata(&module).expect("load failed");
    assert_eq!(loaded.input_signature(), dxil.input_signature());
    assert_eq!(loaded.output_signature(), dxil.output_signature());
    assert!(loaded.patch_constant_signature().elements().is_empty());
}

/// Replaces the shader properties of the single entry point.
fn set_entry_properties(module: &mut Module, properties: Vec<MdConst>) {
    let entry = module.metadata.named(ENTRY_POINTS_MD_NAME).expect("entry points").operands[0];
    let mut ops = match module.metadata.get(entry) {
        MdNode::Tuple(ops) => ops.clone(),
        other => panic!("entry point is {:?}", other),
    };
    let props = properties
        .into_iter()
        .map(|c| Some(module.metadata.add(MdNode::Const(c))))
        .collect();
    ops[4] = Some(module.metadata.add(MdNode::Tuple(props)));
    let replaced = module.metadata.add(MdNode::Tuple(ops));
    module.metadata.set_named(ENTRY_POINTS_MD_NAME, vec![replaced]);
}

#[test]
fn test_unknown_property_tag() {
    let mut module = Module::new("cs");
    compute_module(&mut module).emit_metadata(&mut module);
    set_entry_properties(&mut module, vec![MdConst::U32(7), MdConst::U32(0)]);

    let err = DxilModule::load_metadata(&module).unwrap_err();
    assert_eq!(err, MetadataError::UnknownShaderPropertyTag(7));
}

#[test]
fn test_odd_property_list() {
    let mut module = Module::new("cs");
    compute_module(&mut module).emit_metadata(&mut module);
    set_entry_properties(&mut module, vec![MdConst::U32(0)]);

    assert!(matches!(
        DxilModule::load_metadata(&module),
        Err(MetadataError::Malformed(_))
    ));
}

#[test]
fn test_two_entry_points() {
    let mut module = Module::new("cs");
    compute_module(&mut module).emit_metadata(&mut module);
    let entry = module.metadata.named(ENTRY_POINTS_MD_NAME).expect("entry points").operands[0];
    module.metadata.set_named(ENTRY_POINTS_MD_NAME, vec![entry, entry]);

    assert_eq!(
        DxilModule::load_metadata(&module).unwrap_err(),
        MetadataError::EntryPointCount(2)
    );
}

#[test]
fn test_validator_version_only_goes_up() {
    let mut dxil = DxilModule::new();
    dxil.set_validator_version(1, 2);
    assert!(!dxil.upgrade_validator_version(1, 1));
    assert_eq!(dxil.validator_version(), (1, 2));
    assert!(dxil.upgrade_validator_version(1, 4));
    assert_eq!(dxil.validator_version(), (1, 4));
}

#[test]
fn test_view_id_state_round_trip() {
    let mut module = Module::new("ps");
    let mut dxil = pixel_module(&mut module);
    dxil.set_validator_version(1, 1);
    dxil.compute_view_id_state();
    dxil.view_id_state_mut().set_output_depends_on_view_id(0, 2);
    dxil.emit_metadata(&mut module);
    assert!(module.metadata.named(VIEW_ID_STATE_MD_NAME).is_some());

    let loaded = DxilModule::load_metadata(&module).expect("load failed");
    let state = loaded.view_id_state();
    assert_eq!(state, dxil.view_id_state());
    assert_eq!(state.num_input_scalars, 2);
    assert_eq!(state.num_output_scalars[0], 4);
    assert!(state.output_depends_on_view_id(0, 2));
    assert!(!state.output_depends_on_view_id(0, 1));
}

#[test]
fn test_view_id_state_required_from_1_1() {
    let mut module = Module::new("ps");
    let mut dxil = pixel_module(&mut module);
    dxil.set_validator_version(1, 1);
    dxil.compute_view_id_state();
    dxil.emit_metadata(&mut module);
    assert!(module.metadata.remove_named(VIEW_ID_STATE_MD_NAME));

    assert_eq!(
        DxilModule::load_metadata(&module).unwrap_err(),
        MetadataError::MissingNamedMetadata(VIEW_ID_STATE_MD_NAME)
    );
}

#[test]
fn test_view_id_state_not_needed() {
    // Compute shaders never carry one.
    let mut module = Module::new("cs");
    let mut dxil = compute_module(&mut module);
    dxil.set_validator_version(1, 1);
    dxil.emit_metadata(&mut module);
    assert!(module.metadata.named(VIEW_ID_STATE_MD_NAME).is_none());
    let loaded = DxilModule::load_metadata(&module).expect("load failed");
    assert_eq!(loaded.validator_version(), (1, 1));

    // Neither does anything validated before 1.1.
    let mut module = Module::new("ps");
    pixel_module(&mut module).emit_metadata(&mut module);
    assert!(module.metadata.named(VIEW_ID_STATE_MD_NAME).is_none());
    assert!(DxilModule::load_metadata(&module).is_ok());
}
