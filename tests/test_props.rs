use dxil_module::diag::{Diagnostics, SourceLocation};
use dxil_module::dxil::constants::{
    InputPrimitive, InputQualifier, PrimitiveTopology, ShaderKind, TessellatorDomain,
};
use dxil_module::hlsl::{
    props::{derive_function_props, PatchConstantInfo, PropsContext},
    AttributeKind, FunctionDecl, HlslType, ParamDecl, ParamDirection, PatchKind, PrimitiveModifier, ScalarKind,
    StreamKind,
};
use dxil_module::ir::Module;

fn loc(line: u32) -> SourceLocation {
    SourceLocation::new(line, 1)
}

fn entry(shader_kind: ShaderKind) -> PropsContext<'static> {
    PropsContext {
        is_entry: true,
        shader_kind,
        patch_constant: None,
    }
}

fn float4() -> HlslType {
    HlslType::Vector(ScalarKind::Float, 4)
}

fn stream(kind: StreamKind) -> HlslType {
    HlslType::Stream {
        kind,
        element: Box::new(float4()),
    }
}

fn patch(kind: PatchKind, count: u32) -> HlslType {
    HlslType::Patch {
        kind,
        element: Box::new(float4()),
        count,
    }
}

fn gs_input(name: &str, len: u32, primitive: PrimitiveModifier) -> ParamDecl {
    let mut param = ParamDecl::new(name, HlslType::array(float4(), len), ParamDirection::In, loc(2)).with_semantic("POSITION");
    param.primitive = Some(primitive);
    param
}

#[test]
fn test_compute_entry() {
    let decl = FunctionDecl::new("main", loc(1)).with_attribute(AttributeKind::NumThreads(8, 4, 1), loc(1));
    let mut diags = Diagnostics::new();
    let props = derive_function_props(&decl, &entry(ShaderKind::Compute), &mut diags).expect("props");
    assert!(diags.is_empty());
    assert_eq!(props.shader_kind, ShaderKind::Compute);
    assert_eq!(props.num_threads, [8, 4, 1]);
}

#[test]
fn test_missing_numthreads() {
    let decl = FunctionDecl::new("main", loc(1));
    let mut diags = Diagnostics::new();
    assert!(derive_function_props(&decl, &entry(ShaderKind::Compute), &mut diags).is_none());
    assert!(diags.mentions("numthreads"));
}

#[test]
fn test_attribute_on_wrong_stage() {
    let decl = FunctionDecl::new("main", loc(1)).with_attribute(AttributeKind::NumThreads(1, 1, 1), loc(3));
    let mut diags = Diagnostics::new();
    assert!(derive_function_props(&decl, &entry(ShaderKind::Pixel), &mut diags).is_none());
    assert!(diags.mentions("attribute numthreads only valid for CS"));
    assert_eq!(diags.iter().next().map(|d| d.location), Some(loc(3)));
}

#[test]
fn test_geometry_streams() {
    let decl = FunctionDecl::new("main", loc(1))
        .with_attribute(AttributeKind::MaxVertexCount(3), loc(1))
        .with_param(gs_input("verts", 3, PrimitiveModifier::Triangle))
        .with_param(ParamDecl::new("s0", stream(StreamKind::Triangle), ParamDirection::Inout, loc(3)))
        .with_param(ParamDecl::new("s1", stream(StreamKind::Point), ParamDirection::Inout, loc(4)));
    let mut diags = Diagnostics::new();
    let props = derive_function_props(&decl, &entry(ShaderKind::Geometry), &mut diags).expect("props");
    assert!(diags.is_empty());
    assert_eq!(props.gs.input_primitive, InputPrimitive::Triangle);
    assert_eq!(props.gs.max_vertex_count, 3);
    assert_eq!(props.gs.instance_count, 1);
    assert_eq!(props.gs.active_stream_mask, 0b11);
    assert_eq!(props.gs.stream_primitive_topology, PrimitiveTopology::TriangleStrip);
    assert_eq!(
        props.input_qualifiers,
        vec![InputQualifier::InputPrimitive, InputQualifier::OutStream0, InputQualifier::OutStream1]
    );
}

#[test]
fn test_second_stream_must_be_points() {
    let decl = FunctionDecl::new("main", loc(1))
        .with_attribute(AttributeKind::MaxVertexCount(3), loc(1))
        .with_param(ParamDecl::new("s0", stream(StreamKind::Point), ParamDirection::Inout, loc(2)))
        .with_param(ParamDecl::new("s1", stream(StreamKind::Line), ParamDirection::Inout, loc(3)));
    let mut diags = Diagnostics::new();
    assert!(derive_function_props(&decl, &entry(ShaderKind::Geometry), &mut diags).is_none());
    assert!(diags.mentions("when multiple GS output streams are used they must be pointlists"));
}

#[test]
fn test_input_primitive_array_length() {
    let decl = FunctionDecl::new("main", loc(1))
        .with_attribute(AttributeKind::MaxVertexCount(3), loc(1))
        .with_param(gs_input("verts", 2, PrimitiveModifier::Triangle));
    let mut diags = Diagnostics::new();
    assert!(derive_function_props(&decl, &entry(ShaderKind::Geometry), &mut diags).is_none());
    assert!(diags.mentions("requires a constant-size array of 3 elements"));
}

#[test]
fn test_duplicate_input_patch_is_reported() {
    let decl = FunctionDecl::new("pc", loc(1))
        .with_param(ParamDecl::new("a", patch(PatchKind::Input, 3), ParamDirection::In, loc(2)))
        .with_param(ParamDecl::new("b", patch(PatchKind::Input, 3), ParamDirection::In, loc(3)));
    let ctx = PropsContext {
        is_entry: false,
        shader_kind: ShaderKind::Hull,
        patch_constant: None,
    };
    let mut diags = Diagnostics::new();
    let props = derive_function_props(&decl, &ctx, &mut diags).expect("derivation continues");
    assert_eq!(diags.error_count(), 1);
    assert!(diags.mentions("only one InputPatch"));
    assert_eq!(props.input_patch_count, Some(3));
}

#[test]
fn test_hull_shader_with_patch_constant_function() {
    let mut module = Module::new("hs");
    let void = module.void_type();
    let pc_fn = module.add_function("pc", void, &[]);

    let pc = FunctionDecl::new("pc", loc(1))
        .with_param(ParamDecl::new("ip", patch(PatchKind::Input, 3), ParamDirection::In, loc(1)));
    let mut diags = Diagnostics::new();
    let non_entry = PropsContext {
        is_entry: false,
        shader_kind: ShaderKind::Hull,
        patch_constant: None,
    };
    let pc_props = derive_function_props(&pc, &non_entry, &mut diags).expect("pc props");

    let hs = FunctionDecl::new("main", loc(5))
        .with_attribute(AttributeKind::Domain("tri".to_owned()), loc(5))
        .with_attribute(AttributeKind::PatchConstantFunc("pc".to_owned()), loc(5))
        .with_attribute(AttributeKind::OutputControlPoints(3), loc(5))
        .with_param(ParamDecl::new("ip", patch(PatchKind::Input, 3), ParamDirection::In, loc(6)));
    let ctx = PropsContext {
        is_entry: true,
        shader_kind: ShaderKind::Hull,
        patch_constant: Some(PatchConstantInfo {
            function: pc_fn,
            props: Some(&pc_props),
        }),
    };
    let props = derive_function_props(&hs, &ctx, &mut diags).expect("hs props");
    assert!(diags.is_empty());
    assert_eq!(props.shader_kind, ShaderKind::Hull);
    assert_eq!(props.hs.domain, TessellatorDomain::Tri);
    assert_eq!(props.hs.patch_constant_function, Some(pc_fn));
    assert_eq!(props.hs.input_control_points, 3);
    assert_eq!(props.hs.output_control_points, 3);
}

#[test]
fn test_patch_constant_control_point_mismatch() {
    let mut module = Module::new("hs");
    let void = module.void_type();
    let pc_fn = module.add_function("pc", void, &[]);
    let pc = FunctionDecl::new("pc", loc(1))
        .with_param(ParamDecl::new("ip", patch(PatchKind::Input, 4), ParamDirection::In, loc(1)));
    let mut diags = Diagnostics::new();
    let non_entry = PropsContext {
        is_entry: false,
        shader_kind: ShaderKind::Hull,
        patch_constant: None,
    };
    let pc_props = derive_function_props(&pc, &non_entry, &mut diags).expect("pc props");

    let hs = FunctionDecl::new("main", loc(5))
        .with_attribute(AttributeKind::Domain("quad".to_owned()), loc(5))
        .with_attribute(AttributeKind::PatchConstantFunc("pc".to_owned()), loc(5))
        .with_param(ParamDecl::new("ip", patch(PatchKind::Input, 3), ParamDirection::In, loc(6)));
    let ctx = PropsContext {
        is_entry: true,
        shader_kind: ShaderKind::Hull,
        patch_constant: Some(PatchConstantInfo {
            function: pc_fn,
            props: Some(&pc_props),
        }),
    };
    assert!(derive_function_props(&hs, &ctx, &mut diags).is_none());
    assert!(diags.mentions("4 control points but the hull shader has 3"));
}

#[test]
fn test_invalid_attribute_values() {
    let cases = [
        (AttributeKind::Domain("hexagon".to_owned()), "invalid tessellator domain"),
        (AttributeKind::OutputControlPoints(33), "outputcontrolpoints 33"),
        (AttributeKind::MaxTessFactor(0.5), "maxtessfactor"),
        (AttributeKind::Partitioning("odd".to_owned()), "invalid tessellator partitioning"),
    ];
    for (attr, message) in cases {
        let decl = FunctionDecl::new("pc", loc(1)).with_attribute(attr, loc(1));
        let ctx = PropsContext {
            is_entry: false,
            shader_kind: ShaderKind::Hull,
            patch_constant: None,
        };
        let mut diags = Diagnostics::new();
        assert!(derive_function_props(&decl, &ctx, &mut diags).is_none(), "{}", message);
        assert!(diags.mentions(message), "{}", message);
    }
}

#[test]
fn test_too_many_clip_planes() {
    let planes = (0..7).map(|i| format!("p{}", i)).collect();
    let decl = FunctionDecl::new("main", loc(1)).with_attribute(AttributeKind::ClipPlanes(planes), loc(1));
    let mut diags = Diagnostics::new();
    assert!(derive_function_props(&decl, &entry(ShaderKind::Vertex), &mut diags).is_none());
    assert!(diags.mentions("at most 6 clip planes"));
}

#[test]
fn test_pixel_semantics() {
    let decl = FunctionDecl::new("main", loc(1))
        .returning(float4(), Some("SV_Target"))
        .with_param(ParamDecl::new("cov", HlslType::Scalar(ScalarKind::Uint), ParamDirection::In, loc(2)).with_semantic("SV_Coverage"))
        .with_param(ParamDecl::new("sr", HlslType::Scalar(ScalarKind::Uint), ParamDirection::Out, loc(3)).with_semantic("SV_StencilRef"))
        .with_attribute(AttributeKind::EarlyDepthStencil, loc(1));
    let mut diags = Diagnostics::new();
    let props = derive_function_props(&decl, &entry(ShaderKind::Pixel), &mut diags).expect("props");
    assert!(props.uses_input_coverage);
    assert!(props.writes_stencil_ref);
    assert!(!props.uses_inner_coverage);
    assert!(props.early_depth_stencil);
}
