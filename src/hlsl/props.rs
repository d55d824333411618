//! Deriving a function's shader stage and stage properties from its attributes and parameters.

use arrayvec::ArrayVec;
use phf::phf_map;

use crate::diag::Diagnostics;
use crate::dxil::{
    constants::{
        InputPrimitive, InputQualifier, InterpolationMode, PrimitiveTopology, SemanticKind, ShaderKind,
        TessellatorDomain, TessellatorOutputPrimitive, TessellatorPartitioning, HS_MAX_TESS_FACTOR_UPPER_BOUND,
        MAX_CONTROL_POINTS, MAX_GS_OUTPUT_STREAMS,
    },
    module::{DsState, GsState, HsState},
    signature::{semantic_kind_from_name, split_semantic},
    type_system::{FieldAnnotation, FunctionAnnotation, ParameterAnnotation},
};
use crate::ir::{Function, Handle};

use super::{
    ast::{
        semantic_of, AttributeKind, FunctionDecl, HlslType, InterpolationModifiers, ParamDirection, PatchKind,
        PrimitiveModifier, UnusualAnnotation,
    },
    layout::LayoutBuilder,
};

pub const MAX_CLIP_PLANES: usize = 6;
pub const HS_MIN_TESS_FACTOR: f32 = 1.0;

static DOMAINS: phf::Map<&'static str, TessellatorDomain> = phf_map! {
    "isoline" => TessellatorDomain::IsoLine,
    "tri" => TessellatorDomain::Tri,
    "quad" => TessellatorDomain::Quad,
};

static PARTITIONINGS: phf::Map<&'static str, TessellatorPartitioning> = phf_map! {
    "integer" => TessellatorPartitioning::Integer,
    "pow2" => TessellatorPartitioning::Pow2,
    "fractional_odd" => TessellatorPartitioning::FractionalOdd,
    "fractional_even" => TessellatorPartitioning::FractionalEven,
};

static OUTPUT_TOPOLOGIES: phf::Map<&'static str, TessellatorOutputPrimitive> = phf_map! {
    "point" => TessellatorOutputPrimitive::Point,
    "line" => TessellatorOutputPrimitive::Line,
    "triangle_cw" => TessellatorOutputPrimitive::TriangleCW,
    "triangle_ccw" => TessellatorOutputPrimitive::TriangleCCW,
};

/// Stage and stage-specific properties of one function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionProps {
    pub shader_kind: ShaderKind,
    pub num_threads: [u32; 3],
    pub gs: GsState,
    pub hs: HsState,
    pub ds: DsState,
    pub clip_planes: ArrayVec<String, MAX_CLIP_PLANES>,
    pub early_depth_stencil: bool,
    pub uses_input_coverage: bool,
    pub uses_inner_coverage: bool,
    pub writes_stencil_ref: bool,
    /// One per parameter.
    pub input_qualifiers: Vec<InputQualifier>,
    pub input_patch_count: Option<u32>,
    pub output_patch_count: Option<u32>,
    /// Topology of each GS output stream parameter, in stream order.
    pub stream_topologies: ArrayVec<PrimitiveTopology, MAX_GS_OUTPUT_STREAMS>,
    pub has_inout_param: bool,
}

impl FunctionProps {
    fn new(shader_kind: ShaderKind) -> Self {
        let mut gs = GsState::default();
        if shader_kind == ShaderKind::Geometry {
            gs.instance_count = 1;
        }
        Self {
            shader_kind,
            num_threads: [0; 3],
            gs,
            hs: HsState::default(),
            ds: DsState::default(),
            clip_planes: ArrayVec::new(),
            early_depth_stencil: false,
            uses_input_coverage: false,
            uses_inner_coverage: false,
            writes_stencil_ref: false,
            input_qualifiers: Vec::new(),
            input_patch_count: None,
            output_patch_count: None,
            stream_topologies: ArrayVec::new(),
            has_inout_param: false,
        }
    }
}

/// The function a hull shader names in `patchconstantfunc`, with its own properties if
/// deriving them succeeded.
#[derive(Debug, Clone, Copy)]
pub struct PatchConstantInfo<'a> {
    pub function: Handle<Function>,
    pub props: Option<&'a FunctionProps>,
}

#[derive(Debug, Clone, Copy)]
pub struct PropsContext<'a> {
    pub is_entry: bool,
    /// Stage of the module's shader model.
    pub shader_kind: ShaderKind,
    /// `None` if the function names no patch constant function or the name isn't found.
    pub patch_constant: Option<PatchConstantInfo<'a>>,
}

/// The stage an attribute makes a function, if it defines one.
fn stage_of(kind: &AttributeKind, has_patch_constant_func: bool) -> Option<ShaderKind> {
    match kind {
        AttributeKind::NumThreads(..) => Some(ShaderKind::Compute),
        AttributeKind::MaxVertexCount(_) => Some(ShaderKind::Geometry),
        AttributeKind::PatchConstantFunc(_) => Some(ShaderKind::Hull),
        AttributeKind::Domain(_) if !has_patch_constant_func => Some(ShaderKind::Domain),
        AttributeKind::ClipPlanes(_) => Some(ShaderKind::Vertex),
        AttributeKind::EarlyDepthStencil => Some(ShaderKind::Pixel),
        _ => None,
    }
}

fn attribute_allowed(kind: &AttributeKind, shader_kind: ShaderKind) -> bool {
    match kind {
        AttributeKind::NumThreads(..) => shader_kind == ShaderKind::Compute,
        AttributeKind::MaxVertexCount(_) | AttributeKind::Instance(_) => shader_kind == ShaderKind::Geometry,
        AttributeKind::PatchConstantFunc(_)
        | AttributeKind::Partitioning(_)
        | AttributeKind::OutputTopology(_)
        | AttributeKind::OutputControlPoints(_)
        | AttributeKind::MaxTessFactor(_) => shader_kind == ShaderKind::Hull,
        AttributeKind::Domain(_) => matches!(shader_kind, ShaderKind::Hull | ShaderKind::Domain),
        AttributeKind::ClipPlanes(_) => shader_kind == ShaderKind::Vertex,
        AttributeKind::EarlyDepthStencil => shader_kind == ShaderKind::Pixel,
    }
}

fn allowed_stages(kind: &AttributeKind) -> &'static str {
    match kind {
        AttributeKind::NumThreads(..) => "CS",
        AttributeKind::MaxVertexCount(_) | AttributeKind::Instance(_) => "GS",
        AttributeKind::Domain(_) => "HS or DS",
        AttributeKind::ClipPlanes(_) => "VS",
        AttributeKind::EarlyDepthStencil => "PS",
        _ => "HS",
    }
}

fn input_primitive(modifier: PrimitiveModifier) -> InputPrimitive {
    match modifier {
        PrimitiveModifier::Point => InputPrimitive::Point,
        PrimitiveModifier::Line => InputPrimitive::Line,
        PrimitiveModifier::LineAdj => InputPrimitive::LineWithAdjacency,
        PrimitiveModifier::Triangle => InputPrimitive::Triangle,
        PrimitiveModifier::TriangleAdj => InputPrimitive::TriangleWithAdjacency,
    }
}

/// Derives the stage properties of `decl`.
///
/// Problems are reported to `diags`. Returns `None` if one of them makes the properties
/// meaningless; duplicate patch parameters are reported but don't stop derivation.
pub fn derive_function_props(decl: &FunctionDecl, ctx: &PropsContext, diags: &mut Diagnostics) -> Option<FunctionProps> {
    let has_patch_constant_func = decl
        .attributes
        .iter()
        .any(|a| matches!(a.kind, AttributeKind::PatchConstantFunc(_)));
    let stages: Vec<ShaderKind> = decl
        .attributes
        .iter()
        .filter_map(|a| stage_of(&a.kind, has_patch_constant_func))
        .collect();
    assert!(
        stages.len() <= 1,
        "function {} has attributes of more than one stage: {:?}",
        decl.name,
        stages
    );

    let kind = match stages.first() {
        Some(kind) => *kind,
        None if ctx.is_entry => ctx.shader_kind,
        None => ShaderKind::Invalid,
    };

    if ctx.is_entry {
        for attr in &decl.attributes {
            if !attribute_allowed(&attr.kind, ctx.shader_kind) {
                diags.error(
                    attr.location,
                    format!(
                        "attribute {} only valid for {}",
                        attr.kind.name(),
                        allowed_stages(&attr.kind)
                    ),
                );
                return None;
            }
        }
    }

    let mut props = FunctionProps::new(kind);
    for attr in &decl.attributes {
        match &attr.kind {
            AttributeKind::NumThreads(x, y, z) => props.num_threads = [*x, *y, *z],
            AttributeKind::MaxVertexCount(n) => props.gs.max_vertex_count = *n,
            AttributeKind::Instance(n) => props.gs.instance_count = *n,
            AttributeKind::Domain(name) => match DOMAINS.get(name.as_str()) {
                Some(domain) => {
                    props.hs.domain = *domain;
                    props.ds.domain = *domain;
                }
                None => {
                    diags.error(attr.location, format!("invalid tessellator domain '{}'", name));
                    return None;
                }
            },
            AttributeKind::Partitioning(name) => match PARTITIONINGS.get(name.as_str()) {
                Some(partitioning) => props.hs.partitioning = *partitioning,
                None => {
                    diags.error(attr.location, format!("invalid tessellator partitioning '{}'", name));
                    return None;
                }
            },
            AttributeKind::OutputTopology(name) => match OUTPUT_TOPOLOGIES.get(name.as_str()) {
                Some(topology) => props.hs.output_primitive = *topology,
                None => {
                    diags.error(attr.location, format!("invalid tessellator output topology '{}'", name));
                    return None;
                }
            },
            AttributeKind::OutputControlPoints(n) => {
                if *n > MAX_CONTROL_POINTS {
                    diags.error(
                        attr.location,
                        format!("outputcontrolpoints {} exceeds the maximum of {}", n, MAX_CONTROL_POINTS),
                    );
                    return None;
                }
                props.hs.output_control_points = *n;
            }
            AttributeKind::MaxTessFactor(f) => {
                if !(HS_MIN_TESS_FACTOR..=HS_MAX_TESS_FACTOR_UPPER_BOUND).contains(f) {
                    diags.error(
                        attr.location,
                        format!(
                            "maxtessfactor must be in [{}, {}]",
                            HS_MIN_TESS_FACTOR, HS_MAX_TESS_FACTOR_UPPER_BOUND
                        ),
                    );
                    return None;
                }
                props.hs.max_tess_factor = *f;
            }
            AttributeKind::ClipPlanes(planes) => {
                for plane in planes {
                    if props.clip_planes.try_push(plane.clone()).is_err() {
                        diags.error(
                            attr.location,
                            format!("at most {} clip planes are allowed", MAX_CLIP_PLANES),
                        );
                        return None;
                    }
                }
            }
            AttributeKind::EarlyDepthStencil => props.early_depth_stencil = true,
            AttributeKind::PatchConstantFunc(name) => {
                let info = match ctx.patch_constant {
                    Some(info) => info,
                    None => {
                        diags.error(attr.location, format!("patch constant function '{}' not found", name));
                        return None;
                    }
                };
                props.hs.patch_constant_function = Some(info.function);
                match info.props {
                    Some(pc) if pc.has_inout_param => {
                        diags.error(
                            attr.location,
                            format!("patch constant function '{}' should not have inout parameters", name),
                        );
                        return None;
                    }
                    Some(_) => {}
                    // Its own derivation already reported why.
                    None => return None,
                }
            }
        }
    }

    for param in &decl.params {
        let qualifier = match &param.ty {
            HlslType::Patch {
                kind: PatchKind::Input,
                count,
                ..
            } => {
                if props.input_patch_count.is_some() {
                    diags.error(param.location, "only one InputPatch parameter is allowed");
                } else {
                    props.input_patch_count = Some(*count);
                }
                InputQualifier::InputPatch
            }
            HlslType::Patch {
                kind: PatchKind::Output,
                count,
                ..
            } => {
                if props.output_patch_count.is_some() {
                    diags.error(param.location, "only one OutputPatch parameter is allowed");
                } else {
                    props.output_patch_count = Some(*count);
                }
                InputQualifier::OutputPatch
            }
            HlslType::Stream { kind: stream, .. } => {
                let index = props.stream_topologies.len();
                if props.stream_topologies.try_push(stream.topology()).is_err() {
                    diags.error(
                        param.location,
                        format!("at most {} GS output streams are allowed", MAX_GS_OUTPUT_STREAMS),
                    );
                    return None;
                }
                if index > 0 && stream.topology() != PrimitiveTopology::PointList {
                    diags.error(
                        param.location,
                        "when multiple GS output streams are used they must be pointlists",
                    );
                    return None;
                }
                InputQualifier::out_stream(index)
            }
            _ if param.primitive.is_some() => {
                let primitive = param.primitive.map(input_primitive).unwrap_or(InputPrimitive::Undefined);
                if props.gs.input_primitive != InputPrimitive::Undefined && props.gs.input_primitive != primitive {
                    diags.error(
                        param.location,
                        format!(
                            "input primitive {:?} conflicts with {:?}",
                            primitive, props.gs.input_primitive
                        ),
                    );
                    return None;
                }
                props.gs.input_primitive = primitive;
                let expected = primitive.vertex_count().unwrap_or(0);
                match &param.ty {
                    HlslType::Array { len: Some(len), .. } if *len == expected => {}
                    _ => {
                        diags.error(
                            param.location,
                            format!(
                                "input primitive {:?} requires a constant-size array of {} elements",
                                primitive, expected
                            ),
                        );
                        return None;
                    }
                }
                InputQualifier::InputPrimitive
            }
            _ => match param.direction {
                ParamDirection::In => InputQualifier::In,
                ParamDirection::Out => InputQualifier::Out,
                ParamDirection::Inout => {
                    props.has_inout_param = true;
                    InputQualifier::Inout
                }
            },
        };
        if kind == ShaderKind::Pixel {
            note_pixel_semantics(&mut props, qualifier, &param.ty, semantic_of(&param.annotations));
        }
        props.input_qualifiers.push(qualifier);
    }
    if kind == ShaderKind::Pixel {
        if let Some(ty) = &decl.return_type {
            note_pixel_semantics(&mut props, InputQualifier::Out, ty, decl.return_semantic());
        }
    }

    if !props.stream_topologies.is_empty() {
        props.gs.active_stream_mask = (1 << props.stream_topologies.len()) - 1;
        props.gs.stream_primitive_topology = props.stream_topologies[0];
    }

    match kind {
        ShaderKind::Hull => {
            props.hs.input_control_points = props.input_patch_count.unwrap_or(0);
            if let Some(pc) = ctx.patch_constant.and_then(|info| info.props) {
                let checks = [
                    ("input", pc.input_patch_count, props.hs.input_control_points),
                    ("output", pc.output_patch_count, props.hs.output_control_points),
                ];
                for (which, pc_count, hs_count) in checks {
                    let pc_count = pc_count.unwrap_or(0);
                    if pc_count != 0 && hs_count != 0 && pc_count != hs_count {
                        diags.error(
                            decl.location,
                            format!(
                                "patch constant function {} patch has {} control points but the hull shader has {}",
                                which, pc_count, hs_count
                            ),
                        );
                        return None;
                    }
                }
            }
        }
        ShaderKind::Domain => props.ds.input_control_points = props.output_patch_count.unwrap_or(0),
        _ => {}
    }

    if ctx.is_entry && !check_required_attributes(decl, &props, diags) {
        return None;
    }

    log::trace!("function {} is a {:?} function", decl.name, kind);
    Some(props)
}

/// Every semantic attached to a value of `ty`, including those of struct fields.
fn collect_semantics<'t>(ty: &'t HlslType, semantic: Option<&'t str>, out: &mut Vec<&'t str>) {
    if let Some(semantic) = semantic {
        out.push(semantic);
    }
    if let HlslType::Struct(decl) = ty {
        for field in &decl.fields {
            collect_semantics(&field.ty, field.semantic.as_deref(), out);
        }
    }
}

fn note_pixel_semantics(props: &mut FunctionProps, qualifier: InputQualifier, ty: &HlslType, semantic: Option<&str>) {
    let mut semantics = Vec::new();
    collect_semantics(ty, semantic, &mut semantics);
    for semantic in semantics {
        let (name, _) = split_semantic(semantic);
        match (semantic_kind_from_name(name), qualifier) {
            (SemanticKind::Coverage, InputQualifier::In) => props.uses_input_coverage = true,
            (SemanticKind::InnerCoverage, InputQualifier::In) => props.uses_inner_coverage = true,
            (SemanticKind::StencilRef, InputQualifier::Out | InputQualifier::Inout) => props.writes_stencil_ref = true,
            _ => {}
        }
    }
}

/// Entry points of some stages can't do without their stage attribute.
fn check_required_attributes(decl: &FunctionDecl, props: &FunctionProps, diags: &mut Diagnostics) -> bool {
    let missing = match props.shader_kind {
        ShaderKind::Compute if props.num_threads == [0; 3] => Some("numthreads"),
        ShaderKind::Geometry if props.gs.max_vertex_count == 0 => Some("maxvertexcount"),
        ShaderKind::Hull if props.hs.patch_constant_function.is_none() => Some("patchconstantfunc"),
        ShaderKind::Hull if props.hs.domain == TessellatorDomain::Undefined => Some("domain"),
        ShaderKind::Domain if props.ds.domain == TessellatorDomain::Undefined => Some("domain"),
        _ => None,
    };
    match missing {
        Some(attr) => {
            diags.error(
                decl.location,
                format!("{:?} entry point '{}' requires the {} attribute", props.shader_kind, decl.name, attr),
            );
            false
        }
        None => true,
    }
}

fn interpolation(modifiers: &InterpolationModifiers) -> Option<InterpolationMode> {
    Some(modifiers.mode()).filter(|m| *m != InterpolationMode::Undefined)
}

fn parameter_annotation(
    layout: &mut LayoutBuilder,
    qualifier: InputQualifier,
    name: &str,
    ty: &HlslType,
    annotations: &[UnusualAnnotation],
    modifiers: &InterpolationModifiers,
    precise: bool,
) -> ParameterAnnotation {
    layout.annotate_type(ty);
    let field = FieldAnnotation {
        interpolation_mode: interpolation(modifiers),
        precise,
        semantic: semantic_of(annotations).map(str::to_owned),
        ..layout.field_annotation(name, ty)
    };
    ParameterAnnotation {
        input_qualifier: qualifier,
        field,
        semantic_indices: Vec::new(),
    }
}

/// Per-parameter and return-value layout records of a function.
///
/// Every parameter and return type gets its layout recorded as well, so structs crossing
/// the function boundary are described even if no constant buffer holds them.
pub fn function_annotation(layout: &mut LayoutBuilder, decl: &FunctionDecl, props: &FunctionProps) -> FunctionAnnotation {
    let ret = match &decl.return_type {
        Some(ty) => parameter_annotation(
            layout,
            InputQualifier::Out,
            "",
            ty,
            &decl.return_annotations,
            &decl.return_interpolation,
            decl.return_precise,
        ),
        None => ParameterAnnotation::new(InputQualifier::Out),
    };
    let params = decl
        .params
        .iter()
        .zip(&props.input_qualifiers)
        .map(|(param, qualifier)| {
            parameter_annotation(
                layout,
                *qualifier,
                &param.name,
                &param.ty,
                &param.annotations,
                &param.interpolation,
                param.precise,
            )
        })
        .collect();
    FunctionAnnotation { ret, params }
}
