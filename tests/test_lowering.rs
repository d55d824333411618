use dxil_module::diag::SourceLocation;
use dxil_module::dxil::{
    constants::{InterpolationMode, ResourceKind, TessellatorDomain},
    opcode::{CREATE_HANDLE_INDEX_IDX, CREATE_HANDLE_NAME},
    DxilModule, LowerBound,
};
use dxil_module::hlsl::{
    cbuffer::{GLOBALS_CBUFFER_NAME, SUBSCRIPT_CB_NAME},
    AttributeKind, CBufferDecl, FunctionDecl, HlslOptions, HlslRuntime, HlslType, ParamDecl, ParamDirection,
    PatchKind, ScalarKind, UnusualAnnotation, VarDecl,
};
use dxil_module::ir::{Function, GlobalVariable, Handle, Instruction, Module, Type, Value};

fn loc(line: u32) -> SourceLocation {
    SourceLocation::new(line, 1)
}

fn float(n: u32) -> HlslType {
    HlslType::Vector(ScalarKind::Float, n)
}

fn register(class: char, register: u32, space: u32) -> UnusualAnnotation {
    UnusualAnnotation::RegisterAssignment {
        class,
        register,
        space,
        location: loc(1),
    }
}

/// Appends a load of `global` to `function`.
fn load(module: &mut Module, function: Handle<Function>, global: Handle<GlobalVariable>) -> Handle<Value> {
    let ty = module.global(global).ty;
    let pointer = module.global_value(global);
    module.append(function, ty, Instruction::Load { pointer })
}

fn callee_name(module: &Module, value: Handle<Value>) -> Option<String> {
    match module.instruction(value) {
        Some(Instruction::Call { callee, .. }) => Some(module.function(*callee).name.clone()),
        _ => None,
    }
}

#[test]
fn test_pixel_shader() {
    let mut module = Module::new("ps");
    let mut rt = HlslRuntime::new(&mut module, HlslOptions::new("ps_6_0", "main"));
    let color = rt.add_global(VarDecl::new("color", float(4), loc(1)));
    let tex = rt.add_global(
        VarDecl::new("tex", HlslType::resource("Texture2D", Some(float(4))), loc(2)).with_annotation(register('t', 3, 0)),
    );
    rt.add_global(VarDecl::new("samp", HlslType::resource("SamplerState", None), loc(3)));
    let main = rt.declare_function(
        FunctionDecl::new("main", loc(4))
            .returning(float(4), Some("SV_Target"))
            .with_param(ParamDecl::new("uv", float(2), ParamDirection::In, loc(4)).with_semantic("TEXCOORD0")),
    );

    let m = rt.module();
    let tex_handle = load(m, main, tex);
    let color_value = load(m, main, color);
    let void = m.void_type();
    m.append(main, void, Instruction::Return { value: Some(color_value) });

    let dxil = rt.finish().expect("lowering failed");
    assert_eq!(dxil.entry_function(), Some(main));
    assert_eq!(dxil.entry_name(), "main");

    assert_eq!(dxil.srvs().len(), 1);
    assert_eq!(dxil.srvs()[0].base.lower_bound, LowerBound::Bound(3));
    assert_eq!(dxil.srvs()[0].kind(), ResourceKind::Texture2D);
    assert_eq!(dxil.samplers()[0].base.lower_bound, LowerBound::Bound(0));
    let globals = &dxil.cbuffers()[0];
    assert_eq!(globals.base.global_name, GLOBALS_CBUFFER_NAME);
    assert_eq!(globals.size, 16);
    assert_eq!(globals.base.lower_bound, LowerBound::Bound(0));

    // The texture load became a handle, and the constant is read through the buffer.
    assert_eq!(callee_name(&module, tex_handle).as_deref(), Some(CREATE_HANDLE_NAME));
    let pointer = match module.instruction(color_value) {
        Some(Instruction::Load { pointer }) => *pointer,
        other => panic!("constant read is {:?}", other),
    };
    assert!(callee_name(&module, pointer).map_or(false, |n| n.starts_with(SUBSCRIPT_CB_NAME)));
    assert!(module.find_global("color").is_none());

    let input = dxil.input_signature().elements();
    assert_eq!(input.len(), 1);
    assert_eq!(input[0].semantic_name, "TEXCOORD");
    assert_eq!(input[0].interpolation_mode, InterpolationMode::Linear);
    let output = dxil.output_signature().elements();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].start_row, 0);

    // What was lowered survives a trip through metadata.
    dxil.emit_metadata(&mut module);
    let loaded = DxilModule::load_metadata(&module).expect("load failed");
    assert_eq!(loaded.srvs(), dxil.srvs());
    assert_eq!(loaded.cbuffers(), dxil.cbuffers());
    assert_eq!(loaded.input_signature(), dxil.input_signature());
}

#[test]
fn test_cbuffer_block() {
    let mut module = Module::new("vs");
    let mut rt = HlslRuntime::new(&mut module, HlslOptions::new("vs_6_0", "main"));
    let view = HlslType::Matrix {
        element: ScalarKind::Float,
        rows: 4,
        cols: 4,
        orientation: None,
    };
    let members = rt.add_cbuffer(CBufferDecl {
        name: "Camera".to_owned(),
        constants: vec![
            VarDecl::new("view", view, loc(2)),
            VarDecl::new("eye", float(3), loc(3)).with_annotation(UnusualAnnotation::ConstantPacking {
                register: 5,
                component: 0,
                location: loc(3),
            }),
            VarDecl::new("exposure", HlslType::Scalar(ScalarKind::Float), loc(4)),
        ],
        annotations: vec![register('b', 2, 0)],
        location: loc(1),
    });
    assert_eq!(members.len(), 3);
    let main = rt.declare_function(FunctionDecl::new("main", loc(6)).returning(float(4), Some("SV_Position")));
    let m = rt.module();
    let eye = load(m, main, members[1]);
    let void = m.void_type();
    m.append(main, void, Instruction::Return { value: None });

    let dxil = rt.finish().expect("lowering failed");
    assert_eq!(dxil.cbuffers().len(), 1);
    let camera = &dxil.cbuffers()[0];
    assert_eq!(camera.base.global_name, "Camera");
    assert_eq!(camera.base.lower_bound, LowerBound::Bound(2));
    // eye is pinned at c5; the others are placed after it.
    assert_eq!(camera.size, 164);

    let ty = module.global(camera.base.global_symbol.expect("cbuffer global")).ty;
    let annotation = dxil.type_system().struct_annotation(ty).expect("cbuffer layout");
    let offsets: Vec<u32> = annotation.fields.iter().map(|f| f.cbuffer_offset).collect();
    assert_eq!(offsets, vec![96, 80, 160]);
    assert!(annotation.fields[0].matrix.is_some());

    let pointer = match module.instruction(eye) {
        Some(Instruction::Load { pointer }) => *pointer,
        other => panic!("constant read is {:?}", other),
    };
    let args = match module.instruction(pointer) {
        Some(Instruction::Call { args, .. }) => args.clone(),
        other => panic!("field pointer is {:?}", other),
    };
    assert_eq!(module.const_int_value(args[1]), Some(1));
}

#[test]
fn test_compute_shader_resource_array() {
    let mut module = Module::new("cs");
    let mut rt = HlslRuntime::new(&mut module, HlslOptions::new("cs_6_0", "main"));
    let buffers = rt.add_global(
        VarDecl::new(
            "buffers",
            HlslType::array(HlslType::resource("RWStructuredBuffer", Some(float(4))), 4),
            loc(1),
        )
        .with_annotation(register('u', 0, 1)),
    );
    let single = rt.add_global(VarDecl::new("single", HlslType::resource("RWByteAddressBuffer", None), loc(2)));
    let main = rt.declare_function(
        FunctionDecl::new("main", loc(3)).with_attribute(AttributeKind::NumThreads(64, 1, 1), loc(3)),
    );

    let m = rt.module();
    let zero = m.const_i32(0);
    let two = m.const_i32(2);
    let handle_ty = match m.ty(m.global(buffers).ty) {
        Type::Array { element, .. } => *element,
        other => panic!("resource array lowered to {:?}", other),
    };
    let element_ptr = m.pointer_type(handle_ty);
    let base = m.global_value(buffers);
    let gep = m.append(
        main,
        element_ptr,
        Instruction::GetElementPtr {
            base,
            indices: vec![zero, two],
        },
    );
    let indexed = m.append(main, handle_ty, Instruction::Load { pointer: gep });
    load(m, main, single);

    let dxil = rt.finish().expect("lowering failed");
    assert_eq!(dxil.num_threads(), [64, 1, 1]);
    assert_eq!(dxil.uavs().len(), 2);
    assert_eq!(dxil.uavs()[0].base.lower_bound, LowerBound::Bound(0));
    assert_eq!(dxil.uavs()[0].base.space_id, 1);
    assert_eq!(dxil.uavs()[0].element_stride, 16);
    // Space 0 is empty, so the unbound buffer starts at 0 there.
    assert_eq!(dxil.uavs()[1].base.lower_bound, LowerBound::Bound(0));
    assert_eq!(dxil.uavs()[1].base.space_id, 0);
    assert!(dxil.shader_flags().enable_raw_and_structured_buffers);

    match module.instruction(indexed) {
        Some(Instruction::Call { args, .. }) => assert_eq!(args[CREATE_HANDLE_INDEX_IDX], two),
        other => panic!("indexed load is {:?}", other),
    }
}

#[test]
fn test_hull_shader() {
    let mut module = Module::new("hs");
    let mut rt = HlslRuntime::new(&mut module, HlslOptions::new("hs_6_0", "main"));
    let control_point = HlslType::Patch {
        kind: PatchKind::Input,
        element: Box::new(float(4)),
        count: 3,
    };
    let pc = rt.declare_function(
        FunctionDecl::new("pc", loc(1))
            .with_param(ParamDecl::new("ip", control_point.clone(), ParamDirection::In, loc(1)).with_semantic("POSITION"))
            .with_param(
                ParamDecl::new(
                    "edges",
                    HlslType::array(HlslType::Scalar(ScalarKind::Float), 3),
                    ParamDirection::Out,
                    loc(2),
                )
                .with_semantic("SV_TessFactor"),
            )
            .with_param(
                ParamDecl::new("inside", HlslType::Scalar(ScalarKind::Float), ParamDirection::Out, loc(3))
                    .with_semantic("SV_InsideTessFactor"),
            ),
    );
    let main = rt.declare_function(
        FunctionDecl::new("main", loc(5))
            .returning(float(4), Some("POSITION"))
            .with_param(ParamDecl::new("ip", control_point, ParamDirection::In, loc(6)).with_semantic("POSITION"))
            .with_param(
                ParamDecl::new("id", HlslType::Scalar(ScalarKind::Uint), ParamDirection::In, loc(7))
                    .with_semantic("SV_OutputControlPointID"),
            )
            .with_attribute(AttributeKind::Domain("tri".to_owned()), loc(4))
            .with_attribute(AttributeKind::Partitioning("integer".to_owned()), loc(4))
            .with_attribute(AttributeKind::OutputTopology("triangle_cw".to_owned()), loc(4))
            .with_attribute(AttributeKind::OutputControlPoints(3), loc(4))
            .with_attribute(AttributeKind::PatchConstantFunc("pc".to_owned()), loc(4)),
    );

    let dxil = rt.finish().expect("lowering failed");
    assert_eq!(dxil.entry_function(), Some(main));
    assert_eq!(dxil.patch_constant_function(), Some(pc));
    let hs = dxil.hs_state();
    assert_eq!(hs.domain, TessellatorDomain::Tri);
    assert_eq!(hs.input_control_points, 3);
    assert_eq!(hs.output_control_points, 3);

    let names = |elements: &[dxil_module::dxil::SignatureElement]| {
        elements.iter().map(|e| e.semantic_name.clone()).collect::<Vec<_>>()
    };
    assert_eq!(names(dxil.input_signature().elements()), vec!["POSITION"]);
    assert_eq!(names(dxil.output_signature().elements()), vec!["POSITION"]);
    assert_eq!(
        names(dxil.patch_constant_signature().elements()),
        vec!["SV_TessFactor", "SV_InsideTessFactor"]
    );
    assert!(dxil.type_system().function_annotation(pc).is_some());
}

#[test]
fn test_unbounded_array_declared_before_single_resource() {
    let mut module = Module::new("cs");
    let mut rt = HlslRuntime::new(&mut module, HlslOptions::new("cs_6_0", "main"));
    let texture = HlslType::resource("Texture2D", Some(float(4)));
    rt.add_global(VarDecl::new(
        "textures",
        HlslType::Array {
            element: Box::new(texture.clone()),
            len: None,
        },
        loc(1),
    ));
    rt.add_global(VarDecl::new("single", texture, loc(2)));
    rt.declare_function(FunctionDecl::new("main", loc(3)).with_attribute(AttributeKind::NumThreads(1, 1, 1), loc(3)));

    let dxil = rt.finish().expect("lowering failed");
    let srvs = dxil.srvs();
    assert_eq!(srvs.len(), 2);
    assert_eq!(srvs[0].base.global_name, "textures");
    assert_eq!(srvs[0].base.lower_bound, LowerBound::Bound(1));
    assert_eq!(srvs[1].base.lower_bound, LowerBound::Bound(0));
}

#[test]
fn test_missing_entry_point() {
    let mut module = Module::new("ps");
    let mut rt = HlslRuntime::new(&mut module, HlslOptions::new("ps_6_0", "main"));
    rt.declare_function(FunctionDecl::new("helper", loc(1)));
    let err = rt.finish().unwrap_err();
    assert!(err.0.mentions("missing entry point 'main'"));
}

#[test]
fn test_unknown_profile() {
    let mut module = Module::new("xs");
    let mut rt = HlslRuntime::new(&mut module, HlslOptions::new("xs_6_0", "main"));
    rt.declare_function(FunctionDecl::new("main", loc(1)));
    assert!(rt.finish().is_err());
}

#[test]
fn test_every_error_is_reported() {
    let mut module = Module::new("ps");
    let mut rt = HlslRuntime::new(&mut module, HlslOptions::new("ps_6_0", "main"));
    rt.add_global(VarDecl::new("t", HlslType::resource("Texture9D", None), loc(1)));
    rt.add_global(
        VarDecl::new("s", HlslType::resource("SamplerState", None), loc(2)).with_annotation(register('t', 0, 0)),
    );
    rt.add_global(VarDecl::new("f", HlslType::Scalar(ScalarKind::Float), loc(3)).with_annotation(
        UnusualAnnotation::ConstantPacking {
            register: 0,
            component: 0,
            location: loc(3),
        },
    ));
    rt.declare_function(FunctionDecl::new("main", loc(4)).returning(float(4), Some("SV_Target")));

    let err = rt.finish().unwrap_err();
    assert_eq!(err.0.error_count(), 3);
    assert!(err.0.mentions("unknown resource type 'Texture9D'"));
    assert!(err.0.mentions("register type 't'"));
    assert!(err.0.mentions("packoffset is only allowed within a constant buffer"));
    assert_eq!(err.to_string(), "lowering failed with 3 error(s)");
}

#[test]
fn test_patch_constant_function_naming_itself() {
    let mut module = Module::new("hs");
    let mut rt = HlslRuntime::new(&mut module, HlslOptions::new("hs_6_0", "main"));
    rt.declare_function(
        FunctionDecl::new("main", loc(1))
            .with_attribute(AttributeKind::Domain("quad".to_owned()), loc(1))
            .with_attribute(AttributeKind::PatchConstantFunc("main".to_owned()), loc(1)),
    );
    let err = rt.finish().unwrap_err();
    assert!(err.0.mentions("depends on itself"));
}
