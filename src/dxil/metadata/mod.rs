//! Typed encoders and decoders between the DXIL model and the generic metadata tree.
//!
//! Every entity has a hand-written `emit_*`/`load_*` pair. Tag values and field order
//! below are the binary contract with previously compiled modules: never renumber them,
//! and keep each pair in sync field for field.

pub mod display;

use num_traits::FromPrimitive;

use crate::ir::{Function, GlobalVariable, Handle, MdConst, MdNode, MdRef, Module, Type, ValueKind};

use super::{
    constants::{ComponentType, InputQualifier, MatrixOrientation, ResourceClass, ResourceKind, SemanticKind, ShaderKind, SignatureKind},
    error::{decode_enum, MetadataError, MetadataResult},
    module::{DsState, GsState, HsState},
    resource::{CBuffer, LowerBound, RangeSize, Resource, ResourceBase, Sampler},
    root_signature::RootSignature,
    shader_model::ShaderModel,
    signature::{Signature, SignatureElement},
    type_system::{
        FieldAnnotation, FunctionAnnotation, MatrixAnnotation, ParameterAnnotation, StructAnnotation, TypeSystem,
    },
    view_id::ViewIdState,
};

// Named metadata
pub const DXIL_VERSION_MD_NAME: &str = "dx.version";
pub const VALIDATOR_VERSION_MD_NAME: &str = "dx.valver";
pub const SHADER_MODEL_MD_NAME: &str = "dx.shaderModel";
pub const RESOURCES_MD_NAME: &str = "dx.resources";
pub const TYPE_ANNOTATIONS_MD_NAME: &str = "dx.typeAnnotations";
pub const VIEW_ID_STATE_MD_NAME: &str = "dx.viewIdState";
pub const ENTRY_POINTS_MD_NAME: &str = "dx.entryPoints";
pub const ROOT_SIGNATURE_MD_NAME: &str = "dx.rootSignature";

// Entry point tuple
pub const ENTRY_POINT_FUNCTION_IDX: usize = 0;
pub const ENTRY_POINT_NAME_IDX: usize = 1;
pub const ENTRY_POINT_SIGNATURES_IDX: usize = 2;
pub const ENTRY_POINT_RESOURCES_IDX: usize = 3;
pub const ENTRY_POINT_PROPERTIES_IDX: usize = 4;
const ENTRY_POINT_NUM_FIELDS: usize = 5;

// Resources tuple
pub const RESOURCES_SRV_IDX: usize = 0;
pub const RESOURCES_UAV_IDX: usize = 1;
pub const RESOURCES_CBUFFER_IDX: usize = 2;
pub const RESOURCES_SAMPLER_IDX: usize = 3;
const RESOURCES_NUM_FIELDS: usize = 4;

// Fields common to every resource record
const RESOURCE_ID_IDX: usize = 0;
const RESOURCE_GLOBAL_IDX: usize = 1;
const RESOURCE_NAME_IDX: usize = 2;
const RESOURCE_SPACE_IDX: usize = 3;
const RESOURCE_LOWER_BOUND_IDX: usize = 4;
const RESOURCE_RANGE_SIZE_IDX: usize = 5;

const SRV_SHAPE_IDX: usize = 6;
const SRV_SAMPLE_COUNT_IDX: usize = 7;
const SRV_EXTENDED_IDX: usize = 8;
const SRV_NUM_FIELDS: usize = 9;

const UAV_SHAPE_IDX: usize = 6;
const UAV_GLOBALLY_COHERENT_IDX: usize = 7;
const UAV_HAS_COUNTER_IDX: usize = 8;
const UAV_ROV_IDX: usize = 9;
const UAV_EXTENDED_IDX: usize = 10;
const UAV_NUM_FIELDS: usize = 11;

const CBUFFER_SIZE_IDX: usize = 6;
const CBUFFER_NUM_FIELDS: usize = 8;

const SAMPLER_KIND_IDX: usize = 6;
const SAMPLER_NUM_FIELDS: usize = 8;

// Extended resource properties
pub const TYPED_BUFFER_ELEMENT_TYPE_TAG: u32 = 0;
pub const STRUCTURED_BUFFER_ELEMENT_STRIDE_TAG: u32 = 1;

// Signatures tuple
const SIGNATURES_NUM_FIELDS: usize = 3;

// Signature element record
const SIG_ELEMENT_ID_IDX: usize = 0;
const SIG_ELEMENT_NAME_IDX: usize = 1;
const SIG_ELEMENT_COMP_TYPE_IDX: usize = 2;
const SIG_ELEMENT_SEMANTIC_KIND_IDX: usize = 3;
const SIG_ELEMENT_INDICES_IDX: usize = 4;
const SIG_ELEMENT_INTERP_MODE_IDX: usize = 5;
const SIG_ELEMENT_ROWS_IDX: usize = 6;
const SIG_ELEMENT_COLS_IDX: usize = 7;
const SIG_ELEMENT_START_ROW_IDX: usize = 8;
const SIG_ELEMENT_START_COL_IDX: usize = 9;
const SIG_ELEMENT_EXTENDED_IDX: usize = 10;
const SIG_ELEMENT_NUM_FIELDS: usize = 11;

pub const SIG_ELEMENT_OUTPUT_STREAM_TAG: u32 = 0;
pub const SIG_ELEMENT_GLOBAL_SYMBOL_TAG: u32 = 1;
pub const SIG_ELEMENT_DYN_INDEX_COMP_MASK_TAG: u32 = 2;
pub const SIG_ELEMENT_USAGE_COMP_MASK_TAG: u32 = 3;

// Shader properties
pub const SHADER_FLAGS_TAG: u32 = 0;
pub const GS_STATE_TAG: u32 = 1;
pub const DS_STATE_TAG: u32 = 2;
pub const HS_STATE_TAG: u32 = 3;
pub const NUM_THREADS_TAG: u32 = 4;

const GS_STATE_NUM_FIELDS: usize = 5;
const DS_STATE_NUM_FIELDS: usize = 2;
const HS_STATE_NUM_FIELDS: usize = 7;

// Type annotations
pub const STRUCT_ANNOTATIONS_TAG: u32 = 0;
pub const FUNCTION_ANNOTATIONS_TAG: u32 = 1;

pub const FIELD_SNORM_TAG: u32 = 0;
pub const FIELD_UNORM_TAG: u32 = 1;
pub const FIELD_MATRIX_TAG: u32 = 2;
pub const FIELD_CBUFFER_OFFSET_TAG: u32 = 3;
pub const FIELD_SEMANTIC_STRING_TAG: u32 = 4;
pub const FIELD_INTERPOLATION_MODE_TAG: u32 = 5;
pub const FIELD_NAME_TAG: u32 = 6;
pub const FIELD_COMP_TYPE_TAG: u32 = 7;
pub const FIELD_PRECISE_TAG: u32 = 8;

const PARAM_NUM_FIELDS: usize = 3;

/// Builds metadata nodes into a module.
pub struct MetadataWriter<'m> {
    module: &'m mut Module,
}

impl<'m> MetadataWriter<'m> {
    pub fn new(module: &'m mut Module) -> Self {
        Self { module }
    }

    fn add(&mut self, node: MdNode) -> MdRef {
        self.module.metadata.add(node)
    }

    pub fn bool(&mut self, v: bool) -> MdRef {
        self.add(MdNode::Const(MdConst::Bool(v)))
    }
    pub fn u8(&mut self, v: u8) -> MdRef {
        self.add(MdNode::Const(MdConst::U8(v)))
    }
    pub fn i8(&mut self, v: i8) -> MdRef {
        self.add(MdNode::Const(MdConst::I8(v)))
    }
    pub fn u32(&mut self, v: u32) -> MdRef {
        self.add(MdNode::Const(MdConst::U32(v)))
    }
    pub fn i32(&mut self, v: i32) -> MdRef {
        self.add(MdNode::Const(MdConst::I32(v)))
    }
    pub fn u64(&mut self, v: u64) -> MdRef {
        self.add(MdNode::Const(MdConst::U64(v)))
    }
    pub fn f32(&mut self, v: f32) -> MdRef {
        self.add(MdNode::Const(MdConst::F32(v)))
    }
    pub fn string(&mut self, s: &str) -> MdRef {
        self.add(MdNode::String(s.to_owned()))
    }

    pub fn tuple(&mut self, operands: Vec<Option<MdRef>>) -> MdRef {
        self.add(MdNode::Tuple(operands))
    }

    fn full_tuple(&mut self, operands: Vec<MdRef>) -> MdRef {
        self.tuple(operands.into_iter().map(Some).collect())
    }

    fn function_ref(&mut self, function: Handle<Function>) -> MdRef {
        let value = self.module.function_value(function);
        self.add(MdNode::Value(value))
    }

    /// Reference to a global, or an undef pointer when there isn't one.
    fn global_ref(&mut self, global: Option<Handle<GlobalVariable>>) -> MdRef {
        let value = match global {
            Some(g) => self.module.global_value(g),
            None => {
                let i8_ty = self.module.int_type(8);
                let ptr = self.module.pointer_type(i8_ty);
                self.module.undef(ptr)
            }
        };
        self.add(MdNode::Value(value))
    }

    fn type_ref(&mut self, ty: Handle<Type>) -> MdRef {
        let value = self.module.undef(ty);
        self.add(MdNode::Value(value))
    }

    fn tag_tuple(&mut self, tags: Vec<(u32, MdRef)>) -> MdRef {
        let mut operands = Vec::with_capacity(tags.len() * 2);
        for (tag, value) in tags {
            operands.push(Some(self.u32(tag)));
            operands.push(Some(value));
        }
        self.tuple(operands)
    }

    /// A tag/value tuple, or null when there are no tags.
    fn tag_list(&mut self, tags: Vec<(u32, MdRef)>) -> Option<MdRef> {
        if tags.is_empty() {
            None
        } else {
            Some(self.tag_tuple(tags))
        }
    }

    // Versions and shader model

    pub fn emit_version(&mut self, (major, minor): (u32, u32)) -> MdRef {
        let major = self.u32(major);
        let minor = self.u32(minor);
        self.full_tuple(vec![major, minor])
    }

    pub fn emit_shader_model(&mut self, sm: &ShaderModel) -> MdRef {
        let kind = self.string(sm.kind_name());
        let major = self.u32(sm.major());
        let minor = self.u32(sm.minor());
        self.full_tuple(vec![kind, major, minor])
    }

    // Resources

    fn emit_resource_base(&mut self, base: &ResourceBase) -> Vec<Option<MdRef>> {
        vec![
            Some(self.u32(base.id())),
            Some(self.global_ref(base.global_symbol)),
            Some(self.string(&base.global_name)),
            Some(self.u32(base.space_id)),
            Some(self.u32(base.lower_bound.to_raw())),
            Some(self.u32(base.range_size.to_raw())),
        ]
    }

    fn emit_resource_extended(&mut self, res: &Resource) -> Option<MdRef> {
        let mut tags = Vec::new();
        if res.comp_type != ComponentType::Invalid {
            tags.push((TYPED_BUFFER_ELEMENT_TYPE_TAG, self.u32(res.comp_type as u32)));
        }
        if res.element_stride != 0 {
            tags.push((STRUCTURED_BUFFER_ELEMENT_STRIDE_TAG, self.u32(res.element_stride)));
        }
        self.tag_list(tags)
    }

    pub fn emit_srv(&mut self, srv: &Resource) -> MdRef {
        let mut fields = self.emit_resource_base(&srv.base);
        fields.push(Some(self.u32(srv.kind() as u32)));
        fields.push(Some(self.u32(srv.sample_count)));
        fields.push(self.emit_resource_extended(srv));
        debug_assert_eq!(fields.len(), SRV_NUM_FIELDS);
        self.tuple(fields)
    }

    pub fn emit_uav(&mut self, uav: &Resource) -> MdRef {
        let mut fields = self.emit_resource_base(&uav.base);
        fields.push(Some(self.u32(uav.kind() as u32)));
        fields.push(Some(self.bool(uav.globally_coherent)));
        fields.push(Some(self.bool(uav.has_counter)));
        fields.push(Some(self.bool(uav.rov)));
        fields.push(self.emit_resource_extended(uav));
        debug_assert_eq!(fields.len(), UAV_NUM_FIELDS);
        self.tuple(fields)
    }

    pub fn emit_cbuffer(&mut self, cb: &CBuffer) -> MdRef {
        let mut fields = self.emit_resource_base(&cb.base);
        fields.push(Some(self.u32(cb.size)));
        fields.push(None);
        debug_assert_eq!(fields.len(), CBUFFER_NUM_FIELDS);
        self.tuple(fields)
    }

    pub fn emit_sampler(&mut self, sampler: &Sampler) -> MdRef {
        let mut fields = self.emit_resource_base(&sampler.base);
        fields.push(Some(self.u32(sampler.sampler_kind as u32)));
        fields.push(None);
        debug_assert_eq!(fields.len(), SAMPLER_NUM_FIELDS);
        self.tuple(fields)
    }

    fn emit_list<T>(&mut self, items: &[T], emit: impl Fn(&mut Self, &T) -> MdRef) -> Option<MdRef> {
        if items.is_empty() {
            return None;
        }
        let nodes = items.iter().map(|item| emit(self, item)).collect();
        Some(self.full_tuple(nodes))
    }

    /// `{srvs, uavs, cbuffers, samplers}`. Empty classes become nulls, and no resources at all
    /// yields no tuple.
    pub fn emit_resources(
        &mut self,
        srvs: &[Resource],
        uavs: &[Resource],
        cbuffers: &[CBuffer],
        samplers: &[Sampler],
    ) -> Option<MdRef> {
        let lists = vec![
            self.emit_list(srvs, Self::emit_srv),
            self.emit_list(uavs, Self::emit_uav),
            self.emit_list(cbuffers, Self::emit_cbuffer),
            self.emit_list(samplers, Self::emit_sampler),
        ];
        if lists.iter().all(Option::is_none) {
            return None;
        }
        Some(self.tuple(lists))
    }

    // Signatures

    pub fn emit_signature_element(&mut self, element: &SignatureElement) -> MdRef {
        let indices = if element.semantic_indices.is_empty() {
            None
        } else {
            let nodes = element.semantic_indices.iter().map(|i| self.u32(*i)).collect();
            Some(self.full_tuple(nodes))
        };
        let mut tags = Vec::new();
        if element.output_stream != 0 {
            tags.push((SIG_ELEMENT_OUTPUT_STREAM_TAG, self.u32(element.output_stream as u32)));
        }
        if element.dyn_index_mask != 0 {
            tags.push((SIG_ELEMENT_DYN_INDEX_COMP_MASK_TAG, self.u32(element.dyn_index_mask as u32)));
        }
        let fields = vec![
            Some(self.u32(element.id())),
            Some(self.string(&element.semantic_name)),
            Some(self.u8(element.comp_type as u8)),
            Some(self.u8(element.semantic_kind as u8)),
            indices,
            Some(self.u8(element.interpolation_mode as u8)),
            Some(self.u32(element.rows)),
            Some(self.u8(element.cols)),
            Some(self.i32(element.start_row)),
            Some(self.i8(element.start_col)),
            self.tag_list(tags),
        ];
        debug_assert_eq!(fields.len(), SIG_ELEMENT_NUM_FIELDS);
        self.tuple(fields)
    }

    pub fn emit_signature(&mut self, signature: &Signature) -> Option<MdRef> {
        self.emit_list(signature.elements(), Self::emit_signature_element)
    }

    /// `{input, output, patchConstant}`, or nothing when all three are empty.
    pub fn emit_signatures(&mut self, input: &Signature, output: &Signature, patch_constant: &Signature) -> Option<MdRef> {
        let sigs = vec![
            self.emit_signature(input),
            self.emit_signature(output),
            self.emit_signature(patch_constant),
        ];
        if sigs.iter().all(Option::is_none) {
            return None;
        }
        Some(self.tuple(sigs))
    }

    // Shader properties

    pub fn emit_num_threads(&mut self, num_threads: [u32; 3]) -> MdRef {
        let nodes = num_threads.iter().map(|n| self.u32(*n)).collect();
        self.full_tuple(nodes)
    }

    pub fn emit_gs_state(&mut self, gs: &GsState) -> MdRef {
        let fields = vec![
            self.u32(gs.input_primitive as u32),
            self.u32(gs.max_vertex_count),
            self.u32(gs.active_stream_mask),
            self.u32(gs.stream_primitive_topology as u32),
            self.u32(gs.instance_count),
        ];
        self.full_tuple(fields)
    }

    pub fn emit_ds_state(&mut self, ds: &DsState) -> MdRef {
        let fields = vec![self.u32(ds.domain as u32), self.u32(ds.input_control_points)];
        self.full_tuple(fields)
    }

    pub fn emit_hs_state(&mut self, hs: &HsState) -> MdRef {
        let pc = hs.patch_constant_function.map(|f| self.function_ref(f));
        let fields = vec![
            pc,
            Some(self.u32(hs.input_control_points)),
            Some(self.u32(hs.output_control_points)),
            Some(self.u32(hs.domain as u32)),
            Some(self.u32(hs.partitioning as u32)),
            Some(self.u32(hs.output_primitive as u32)),
            Some(self.f32(hs.max_tess_factor)),
        ];
        self.tuple(fields)
    }

    pub fn emit_shader_properties(&mut self, tags: Vec<(u32, MdRef)>) -> Option<MdRef> {
        self.tag_list(tags)
    }

    pub fn emit_entry_point(
        &mut self,
        function: Option<Handle<Function>>,
        name: &str,
        signatures: Option<MdRef>,
        resources: Option<MdRef>,
        properties: Option<MdRef>,
    ) -> MdRef {
        let function = function.map(|f| self.function_ref(f));
        let fields = vec![function, Some(self.string(name)), signatures, resources, properties];
        self.tuple(fields)
    }

    // Type annotations

    fn emit_field_annotation(&mut self, field: &FieldAnnotation) -> MdRef {
        let mut tags = vec![
            (FIELD_NAME_TAG, self.string(&field.field_name)),
            (FIELD_CBUFFER_OFFSET_TAG, self.u32(field.cbuffer_offset)),
        ];
        if let Some(matrix) = field.matrix {
            let m = vec![
                self.u32(matrix.rows),
                self.u32(matrix.cols),
                self.u32(matrix.orientation as u32),
            ];
            tags.push((FIELD_MATRIX_TAG, self.full_tuple(m)));
        }
        if let Some(comp_type) = field.comp_type {
            tags.push((FIELD_COMP_TYPE_TAG, self.u32(comp_type as u32)));
        }
        if let Some(interp) = field.interpolation_mode {
            tags.push((FIELD_INTERPOLATION_MODE_TAG, self.u32(interp as u32)));
        }
        if field.precise {
            tags.push((FIELD_PRECISE_TAG, self.bool(true)));
        }
        if let Some(semantic) = &field.semantic {
            tags.push((FIELD_SEMANTIC_STRING_TAG, self.string(semantic)));
        }
        self.tag_tuple(tags)
    }

    fn emit_struct_annotation(&mut self, annotation: &StructAnnotation) -> MdRef {
        let mut nodes = vec![self.u32(annotation.cbuffer_size)];
        for field in &annotation.fields {
            nodes.push(self.emit_field_annotation(field));
        }
        self.full_tuple(nodes)
    }

    fn emit_parameter_annotation(&mut self, param: &ParameterAnnotation) -> MdRef {
        let indices = if param.semantic_indices.is_empty() {
            None
        } else {
            let nodes = param.semantic_indices.iter().map(|i| self.u32(*i)).collect();
            Some(self.full_tuple(nodes))
        };
        let fields = vec![
            Some(self.u32(param.input_qualifier as u32)),
            Some(self.emit_field_annotation(&param.field)),
            indices,
        ];
        self.tuple(fields)
    }

    fn emit_function_annotation(&mut self, annotation: &FunctionAnnotation) -> MdRef {
        let mut nodes = vec![self.emit_parameter_annotation(&annotation.ret)];
        for param in &annotation.params {
            nodes.push(self.emit_parameter_annotation(param));
        }
        self.full_tuple(nodes)
    }

    /// One tuple for struct annotations and one for function annotations, each omitted when empty.
    pub fn emit_type_system(&mut self, type_system: &TypeSystem) -> Vec<MdRef> {
        let mut lists = Vec::new();

        let structs: Vec<_> = type_system
            .struct_annotations()
            .map(|(ty, a)| (*ty, a.clone()))
            .collect();
        if !structs.is_empty() {
            let mut nodes = vec![self.u32(STRUCT_ANNOTATIONS_TAG)];
            for (ty, annotation) in &structs {
                nodes.push(self.type_ref(*ty));
                nodes.push(self.emit_struct_annotation(annotation));
            }
            lists.push(self.full_tuple(nodes));
        }

        let functions: Vec<_> = type_system
            .function_annotations()
            .map(|(f, a)| (*f, a.clone()))
            .collect();
        if !functions.is_empty() {
            let mut nodes = vec![self.u32(FUNCTION_ANNOTATIONS_TAG)];
            for (function, annotation) in &functions {
                nodes.push(self.function_ref(*function));
                nodes.push(self.emit_function_annotation(annotation));
            }
            lists.push(self.full_tuple(nodes));
        }
        lists
    }

    pub fn emit_view_id_state(&mut self, state: &ViewIdState) -> MdRef {
        let nodes = state.serialize().into_iter().map(|w| self.u32(w)).collect();
        self.full_tuple(nodes)
    }

    pub fn emit_root_signature(&mut self, root_signature: &RootSignature) -> MdRef {
        self.add(MdNode::Blob(root_signature.as_bytes().to_vec()))
    }
}

/// Decodes metadata nodes of a module.
pub struct MetadataReader<'m> {
    module: &'m Module,
}

fn operand(ops: &[Option<MdRef>], index: usize, what: &str) -> MetadataResult<MdRef> {
    ops.get(index)
        .copied()
        .flatten()
        .ok_or_else(|| MetadataError::malformed(format!("{} operand {} is missing", what, index)))
}

impl<'m> MetadataReader<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self { module }
    }

    pub fn node(&self, md: MdRef) -> &'m MdNode {
        self.module.metadata.get(md)
    }

    pub fn tuple(&self, md: MdRef) -> MetadataResult<&'m [Option<MdRef>]> {
        match self.node(md) {
            MdNode::Tuple(ops) => Ok(ops.as_slice()),
            other => Err(MetadataError::malformed(format!("expected a tuple, found {:?}", other))),
        }
    }

    fn tuple_of_len(&self, md: MdRef, len: usize, what: &str) -> MetadataResult<&'m [Option<MdRef>]> {
        let ops = self.tuple(md)?;
        if ops.len() != len {
            return Err(MetadataError::malformed(format!(
                "{} has {} operands, expected {}",
                what,
                ops.len(),
                len
            )));
        }
        Ok(ops)
    }

    /// Flattened `tag, value, tag, value ...` list.
    pub fn tag_list(&self, md: MdRef) -> MetadataResult<Vec<(u32, MdRef)>> {
        let ops = self.tuple(md)?;
        if ops.len() % 2 != 0 {
            return Err(MetadataError::malformed(format!(
                "tag/value list has odd length {}",
                ops.len()
            )));
        }
        ops.chunks(2)
            .map(|pair| {
                let tag = self.u32(operand(pair, 0, "tag")?)?;
                Ok((tag, operand(pair, 1, "tag value")?))
            })
            .collect()
    }

    pub fn constant(&self, md: MdRef) -> MetadataResult<MdConst> {
        match self.node(md) {
            MdNode::Const(c) => Ok(*c),
            other => Err(MetadataError::malformed(format!("expected a constant, found {:?}", other))),
        }
    }

    pub fn uint(&self, md: MdRef) -> MetadataResult<u64> {
        self.constant(md)?
            .as_u64()
            .ok_or_else(|| MetadataError::malformed("expected an integer constant"))
    }

    pub fn u32(&self, md: MdRef) -> MetadataResult<u32> {
        let v = self.uint(md)?;
        u32::try_from(v).map_err(|_| MetadataError::malformed(format!("{} does not fit in 32 bits", v)))
    }

    pub fn u8(&self, md: MdRef) -> MetadataResult<u8> {
        let v = self.uint(md)?;
        u8::try_from(v).map_err(|_| MetadataError::malformed(format!("{} does not fit in 8 bits", v)))
    }

    pub fn i32(&self, md: MdRef) -> MetadataResult<i32> {
        match self.constant(md)? {
            MdConst::I32(v) => Ok(v),
            _ => Ok(self.u32(md)? as i32),
        }
    }

    pub fn i8(&self, md: MdRef) -> MetadataResult<i8> {
        match self.constant(md)? {
            MdConst::I8(v) => Ok(v),
            _ => Ok(self.u8(md)? as i8),
        }
    }

    pub fn bool(&self, md: MdRef) -> MetadataResult<bool> {
        Ok(self.uint(md)? != 0)
    }

    pub fn f32(&self, md: MdRef) -> MetadataResult<f32> {
        match self.constant(md)? {
            MdConst::F32(v) => Ok(v),
            other => Err(MetadataError::malformed(format!("expected a float, found {:?}", other))),
        }
    }

    pub fn string(&self, md: MdRef) -> MetadataResult<&'m str> {
        match self.node(md) {
            MdNode::String(s) => Ok(s.as_str()),
            other => Err(MetadataError::malformed(format!("expected a string, found {:?}", other))),
        }
    }

    fn enum_value<T: FromPrimitive>(&self, md: MdRef) -> MetadataResult<T> {
        decode_enum(self.uint(md)?)
    }

    fn value_kind(&self, md: MdRef) -> MetadataResult<&'m ValueKind> {
        match self.node(md) {
            MdNode::Value(v) => Ok(&self.module.value(*v).kind),
            other => Err(MetadataError::malformed(format!("expected a value, found {:?}", other))),
        }
    }

    pub fn function_ref(&self, md: MdRef) -> MetadataResult<Handle<Function>> {
        match self.value_kind(md)? {
            ValueKind::Function(f) => Ok(*f),
            other => Err(MetadataError::malformed(format!("expected a function, found {:?}", other))),
        }
    }

    fn global_ref(&self, md: MdRef) -> MetadataResult<Option<Handle<GlobalVariable>>> {
        match self.value_kind(md)? {
            ValueKind::Global(g) => Ok(Some(*g)),
            ValueKind::Undef => Ok(None),
            other => Err(MetadataError::malformed(format!("expected a global, found {:?}", other))),
        }
    }

    fn type_ref(&self, md: MdRef) -> MetadataResult<Handle<Type>> {
        match self.node(md) {
            MdNode::Value(v) => Ok(self.module.value_type(*v)),
            other => Err(MetadataError::malformed(format!("expected a typed value, found {:?}", other))),
        }
    }

    fn u32_list(&self, md: Option<MdRef>) -> MetadataResult<Vec<u32>> {
        match md {
            None => Ok(Vec::new()),
            Some(md) => self
                .tuple(md)?
                .iter()
                .map(|op| self.u32(operand(std::slice::from_ref(op), 0, "index list")?))
                .collect(),
        }
    }

    // Versions and shader model

    pub fn load_version(&self, md: MdRef) -> MetadataResult<(u32, u32)> {
        let ops = self.tuple_of_len(md, 2, "version")?;
        Ok((self.u32(operand(ops, 0, "version")?)?, self.u32(operand(ops, 1, "version")?)?))
    }

    pub fn load_shader_model(&self, md: MdRef) -> MetadataResult<&'static ShaderModel> {
        let ops = self.tuple_of_len(md, 3, "shader model")?;
        let kind = self.string(operand(ops, 0, "shader model")?)?;
        let major = self.u32(operand(ops, 1, "shader model")?)?;
        let minor = self.u32(operand(ops, 2, "shader model")?)?;
        Ok(ShaderModel::get_by_name(&format!("{}_{}_{}", kind, major, minor))?)
    }

    // Resources

    fn load_resource_base(&self, ops: &[Option<MdRef>], class: ResourceClass, kind: ResourceKind) -> MetadataResult<ResourceBase> {
        let what = "resource";
        let mut base = ResourceBase::new(class, kind);
        base.set_id(self.u32(operand(ops, RESOURCE_ID_IDX, what)?)?);
        base.global_symbol = self.global_ref(operand(ops, RESOURCE_GLOBAL_IDX, what)?)?;
        base.global_name = self.string(operand(ops, RESOURCE_NAME_IDX, what)?)?.to_owned();
        base.space_id = self.u32(operand(ops, RESOURCE_SPACE_IDX, what)?)?;
        base.lower_bound = LowerBound::from_raw(self.u32(operand(ops, RESOURCE_LOWER_BOUND_IDX, what)?)?);
        base.range_size = RangeSize::from_raw(self.u32(operand(ops, RESOURCE_RANGE_SIZE_IDX, what)?)?);
        Ok(base)
    }

    fn load_resource_extended(&self, md: Option<MdRef>, res: &mut Resource) -> MetadataResult<()> {
        let md = match md {
            Some(md) => md,
            None => return Ok(()),
        };
        for (tag, value) in self.tag_list(md)? {
            match tag {
                TYPED_BUFFER_ELEMENT_TYPE_TAG => res.comp_type = self.enum_value(value)?,
                STRUCTURED_BUFFER_ELEMENT_STRIDE_TAG => res.element_stride = self.u32(value)?,
                other => {
                    return Err(MetadataError::malformed(format!(
                        "unknown extended resource property tag {}",
                        other
                    )))
                }
            }
        }
        Ok(())
    }

    pub fn load_srv(&self, md: MdRef) -> MetadataResult<Resource> {
        let ops = self.tuple_of_len(md, SRV_NUM_FIELDS, "SRV")?;
        let kind = self.enum_value(operand(ops, SRV_SHAPE_IDX, "SRV")?)?;
        let mut srv = Resource::new_srv(kind);
        srv.base = self.load_resource_base(ops, ResourceClass::SRV, kind)?;
        srv.sample_count = self.u32(operand(ops, SRV_SAMPLE_COUNT_IDX, "SRV")?)?;
        self.load_resource_extended(ops[SRV_EXTENDED_IDX], &mut srv)?;
        Ok(srv)
    }

    pub fn load_uav(&self, md: MdRef) -> MetadataResult<Resource> {
        let ops = self.tuple_of_len(md, UAV_NUM_FIELDS, "UAV")?;
        let kind = self.enum_value(operand(ops, UAV_SHAPE_IDX, "UAV")?)?;
        let mut uav = Resource::new_uav(kind);
        uav.base = self.load_resource_base(ops, ResourceClass::UAV, kind)?;
        uav.globally_coherent = self.bool(operand(ops, UAV_GLOBALLY_COHERENT_IDX, "UAV")?)?;
        uav.has_counter = self.bool(operand(ops, UAV_HAS_COUNTER_IDX, "UAV")?)?;
        uav.rov = self.bool(operand(ops, UAV_ROV_IDX, "UAV")?)?;
        self.load_resource_extended(ops[UAV_EXTENDED_IDX], &mut uav)?;
        Ok(uav)
    }

    pub fn load_cbuffer(&self, md: MdRef) -> MetadataResult<CBuffer> {
        let ops = self.tuple_of_len(md, CBUFFER_NUM_FIELDS, "CBuffer")?;
        let mut cb = CBuffer::new(self.u32(operand(ops, CBUFFER_SIZE_IDX, "CBuffer")?)?);
        cb.base = self.load_resource_base(ops, ResourceClass::CBuffer, ResourceKind::CBuffer)?;
        Ok(cb)
    }

    pub fn load_sampler(&self, md: MdRef) -> MetadataResult<Sampler> {
        let ops = self.tuple_of_len(md, SAMPLER_NUM_FIELDS, "Sampler")?;
        let mut sampler = Sampler::new(self.enum_value(operand(ops, SAMPLER_KIND_IDX, "Sampler")?)?);
        sampler.base = self.load_resource_base(ops, ResourceClass::Sampler, ResourceKind::Sampler)?;
        Ok(sampler)
    }

    fn load_list<T>(&self, md: Option<MdRef>, load: impl Fn(&Self, MdRef) -> MetadataResult<T>) -> MetadataResult<Vec<T>> {
        match md {
            None => Ok(Vec::new()),
            Some(md) => self
                .tuple(md)?
                .iter()
                .map(|op| load(self, op.ok_or_else(|| MetadataError::malformed("null list entry"))?))
                .collect(),
        }
    }

    #[allow(clippy::type_complexity)]
    pub fn load_resources(
        &self,
        md: Option<MdRef>,
    ) -> MetadataResult<(Vec<Resource>, Vec<Resource>, Vec<CBuffer>, Vec<Sampler>)> {
        let md = match md {
            Some(md) => md,
            None => return Ok(Default::default()),
        };
        let ops = self.tuple_of_len(md, RESOURCES_NUM_FIELDS, "resources")?;
        Ok((
            self.load_list(ops[RESOURCES_SRV_IDX], Self::load_srv)?,
            self.load_list(ops[RESOURCES_UAV_IDX], Self::load_uav)?,
            self.load_list(ops[RESOURCES_CBUFFER_IDX], Self::load_cbuffer)?,
            self.load_list(ops[RESOURCES_SAMPLER_IDX], Self::load_sampler)?,
        ))
    }

    // Signatures

    pub fn load_signature_element(&self, md: MdRef) -> MetadataResult<(u32, SignatureElement)> {
        let what = "signature element";
        let ops = self.tuple_of_len(md, SIG_ELEMENT_NUM_FIELDS, what)?;
        let id = self.u32(operand(ops, SIG_ELEMENT_ID_IDX, what)?)?;
        let name = self.string(operand(ops, SIG_ELEMENT_NAME_IDX, what)?)?;
        let comp_type: ComponentType = self.enum_value(operand(ops, SIG_ELEMENT_COMP_TYPE_IDX, what)?)?;
        let kind: SemanticKind = self.enum_value(operand(ops, SIG_ELEMENT_SEMANTIC_KIND_IDX, what)?)?;
        let rows = self.u32(operand(ops, SIG_ELEMENT_ROWS_IDX, what)?)?;
        let cols = self.u8(operand(ops, SIG_ELEMENT_COLS_IDX, what)?)?;

        let mut element = SignatureElement::new(name, kind, comp_type, rows, cols);
        element.semantic_indices = self.u32_list(ops[SIG_ELEMENT_INDICES_IDX])?;
        element.interpolation_mode = self.enum_value(operand(ops, SIG_ELEMENT_INTERP_MODE_IDX, what)?)?;
        element.start_row = self.i32(operand(ops, SIG_ELEMENT_START_ROW_IDX, what)?)?;
        element.start_col = self.i8(operand(ops, SIG_ELEMENT_START_COL_IDX, what)?)?;

        if let Some(ext) = ops[SIG_ELEMENT_EXTENDED_IDX] {
            for (tag, value) in self.tag_list(ext)? {
                match tag {
                    SIG_ELEMENT_OUTPUT_STREAM_TAG => element.output_stream = self.u8(value)?,
                    SIG_ELEMENT_DYN_INDEX_COMP_MASK_TAG => element.dyn_index_mask = self.u8(value)?,
                    SIG_ELEMENT_GLOBAL_SYMBOL_TAG | SIG_ELEMENT_USAGE_COMP_MASK_TAG => {}
                    other => {
                        return Err(MetadataError::malformed(format!(
                            "unknown signature element property tag {}",
                            other
                        )))
                    }
                }
            }
        }
        Ok((id, element))
    }

    pub fn load_signature(&self, md: Option<MdRef>, signature: &mut Signature) -> MetadataResult<()> {
        for (expected_id, (id, element)) in self
            .load_list(md, Self::load_signature_element)?
            .into_iter()
            .enumerate()
        {
            if id as usize != expected_id {
                return Err(MetadataError::malformed(format!(
                    "signature element id {} out of order, expected {}",
                    id, expected_id
                )));
            }
            signature.append_element(element);
        }
        Ok(())
    }

    pub fn load_signatures(
        &self,
        md: Option<MdRef>,
        input: &mut Signature,
        output: &mut Signature,
        patch_constant: &mut Signature,
    ) -> MetadataResult<()> {
        let md = match md {
            Some(md) => md,
            None => return Ok(()),
        };
        let ops = self.tuple_of_len(md, SIGNATURES_NUM_FIELDS, "signatures")?;
        debug_assert_eq!(input.kind(), SignatureKind::Input);
        self.load_signature(ops[0], input)?;
        self.load_signature(ops[1], output)?;
        self.load_signature(ops[2], patch_constant)
    }

    // Shader properties

    pub fn load_num_threads(&self, md: MdRef) -> MetadataResult<[u32; 3]> {
        let ops = self.tuple_of_len(md, 3, "numthreads")?;
        Ok([
            self.u32(operand(ops, 0, "numthreads")?)?,
            self.u32(operand(ops, 1, "numthreads")?)?,
            self.u32(operand(ops, 2, "numthreads")?)?,
        ])
    }

    pub fn load_gs_state(&self, md: MdRef) -> MetadataResult<GsState> {
        let what = "GS state";
        let ops = self.tuple_of_len(md, GS_STATE_NUM_FIELDS, what)?;
        Ok(GsState {
            input_primitive: self.enum_value(operand(ops, 0, what)?)?,
            max_vertex_count: self.u32(operand(ops, 1, what)?)?,
            active_stream_mask: self.u32(operand(ops, 2, what)?)?,
            stream_primitive_topology: self.enum_value(operand(ops, 3, what)?)?,
            instance_count: self.u32(operand(ops, 4, what)?)?,
        })
    }

    pub fn load_ds_state(&self, md: MdRef) -> MetadataResult<DsState> {
        let what = "DS state";
        let ops = self.tuple_of_len(md, DS_STATE_NUM_FIELDS, what)?;
        Ok(DsState {
            domain: self.enum_value(operand(ops, 0, what)?)?,
            input_control_points: self.u32(operand(ops, 1, what)?)?,
        })
    }

    pub fn load_hs_state(&self, md: MdRef) -> MetadataResult<HsState> {
        let what = "HS state";
        let ops = self.tuple_of_len(md, HS_STATE_NUM_FIELDS, what)?;
        let patch_constant_function = match ops[0] {
            Some(f) => Some(self.function_ref(f)?),
            None => None,
        };
        Ok(HsState {
            patch_constant_function,
            input_control_points: self.u32(operand(ops, 1, what)?)?,
            output_control_points: self.u32(operand(ops, 2, what)?)?,
            domain: self.enum_value(operand(ops, 3, what)?)?,
            partitioning: self.enum_value(operand(ops, 4, what)?)?,
            output_primitive: self.enum_value(operand(ops, 5, what)?)?,
            max_tess_factor: self.f32(operand(ops, 6, what)?)?,
        })
    }

    /// Returns the entry point's fields: function, name, signatures, resources and properties.
    #[allow(clippy::type_complexity)]
    pub fn load_entry_point(
        &self,
        md: MdRef,
    ) -> MetadataResult<(Option<Handle<Function>>, &'m str, Option<MdRef>, Option<MdRef>, Option<MdRef>)> {
        let ops = self.tuple_of_len(md, ENTRY_POINT_NUM_FIELDS, "entry point")?;
        let function = match ops[ENTRY_POINT_FUNCTION_IDX] {
            Some(f) => Some(self.function_ref(f)?),
            None => None,
        };
        let name = self.string(operand(ops, ENTRY_POINT_NAME_IDX, "entry point")?)?;
        Ok((
            function,
            name,
            ops[ENTRY_POINT_SIGNATURES_IDX],
            ops[ENTRY_POINT_RESOURCES_IDX],
            ops[ENTRY_POINT_PROPERTIES_IDX],
        ))
    }

    // Type annotations

    fn load_field_annotation(&self, md: MdRef) -> MetadataResult<FieldAnnotation> {
        let mut field = FieldAnnotation::default();
        let mut snorm = false;
        let mut unorm = false;
        for (tag, value) in self.tag_list(md)? {
            match tag {
                FIELD_SNORM_TAG => snorm = self.bool(value)?,
                FIELD_UNORM_TAG => unorm = self.bool(value)?,
                FIELD_MATRIX_TAG => {
                    let ops = self.tuple_of_len(value, 3, "matrix annotation")?;
                    let orientation: MatrixOrientation = self.enum_value(operand(ops, 2, "matrix annotation")?)?;
                    field.matrix = Some(MatrixAnnotation {
                        rows: self.u32(operand(ops, 0, "matrix annotation")?)?,
                        cols: self.u32(operand(ops, 1, "matrix annotation")?)?,
                        orientation,
                    });
                }
                FIELD_CBUFFER_OFFSET_TAG => field.cbuffer_offset = self.u32(value)?,
                FIELD_SEMANTIC_STRING_TAG => field.semantic = Some(self.string(value)?.to_owned()),
                FIELD_INTERPOLATION_MODE_TAG => field.interpolation_mode = Some(self.enum_value(value)?),
                FIELD_NAME_TAG => field.field_name = self.string(value)?.to_owned(),
                FIELD_COMP_TYPE_TAG => field.comp_type = Some(self.enum_value(value)?),
                FIELD_PRECISE_TAG => field.precise = self.bool(value)?,
                other => {
                    return Err(MetadataError::malformed(format!(
                        "unknown field annotation tag {}",
                        other
                    )))
                }
            }
        }
        // Older producers mark normalized floats with separate flags
        if snorm {
            field.comp_type = field.comp_type.map(ComponentType::to_snorm);
        } else if unorm {
            field.comp_type = field.comp_type.map(ComponentType::to_unorm);
        }
        Ok(field)
    }

    fn load_struct_annotation(&self, ty: Handle<Type>, md: MdRef) -> MetadataResult<StructAnnotation> {
        let ops = self.tuple(md)?;
        let size = self.u32(operand(ops, 0, "struct annotation")?)?;
        let fields = ops[1..]
            .iter()
            .map(|op| self.load_field_annotation(op.ok_or_else(|| MetadataError::malformed("null field annotation"))?))
            .collect::<MetadataResult<Vec<_>>>()?;
        let is_empty_struct = match self.module.ty(ty) {
            Type::Struct { fields, .. } => fields.is_empty(),
            other => {
                return Err(MetadataError::malformed(format!(
                    "struct annotation attached to non-struct type {:?}",
                    other
                )))
            }
        };
        Ok(StructAnnotation {
            cbuffer_size: size,
            is_empty_struct,
            fields,
        })
    }

    fn load_parameter_annotation(&self, md: MdRef) -> MetadataResult<ParameterAnnotation> {
        let what = "parameter annotation";
        let ops = self.tuple_of_len(md, PARAM_NUM_FIELDS, what)?;
        let qualifier: InputQualifier = self.enum_value(operand(ops, 0, what)?)?;
        let mut param = ParameterAnnotation::new(qualifier);
        param.field = self.load_field_annotation(operand(ops, 1, what)?)?;
        param.semantic_indices = self.u32_list(ops[2])?;
        Ok(param)
    }

    fn load_function_annotation(&self, md: MdRef) -> MetadataResult<FunctionAnnotation> {
        let ops = self.tuple(md)?;
        let ret = self.load_parameter_annotation(operand(ops, 0, "function annotation")?)?;
        let params = ops[1..]
            .iter()
            .map(|op| self.load_parameter_annotation(op.ok_or_else(|| MetadataError::malformed("null parameter annotation"))?))
            .collect::<MetadataResult<Vec<_>>>()?;
        Ok(FunctionAnnotation { ret, params })
    }

    pub fn load_type_system(&self, lists: &[MdRef], type_system: &mut TypeSystem) -> MetadataResult<()> {
        for list in lists {
            let ops = self.tuple(*list)?;
            let tag = self.u32(operand(ops, 0, "type annotations")?)?;
            let entries = &ops[1..];
            if entries.len() % 2 != 0 {
                return Err(MetadataError::malformed("type annotation list has a dangling entry"));
            }
            for pair in entries.chunks(2) {
                let key = operand(pair, 0, "type annotation")?;
                let annotation = operand(pair, 1, "type annotation")?;
                match tag {
                    STRUCT_ANNOTATIONS_TAG => {
                        let ty = self.type_ref(key)?;
                        let a = self.load_struct_annotation(ty, annotation)?;
                        type_system.insert_struct_annotation(ty, a);
                    }
                    FUNCTION_ANNOTATIONS_TAG => {
                        let f = self.function_ref(key)?;
                        let a = self.load_function_annotation(annotation)?;
                        type_system.insert_function_annotation(f, a);
                    }
                    other => {
                        return Err(MetadataError::malformed(format!(
                            "unknown type annotation tag {}",
                            other
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    pub fn load_view_id_state(&self, md: MdRef) -> MetadataResult<ViewIdState> {
        let words = self
            .tuple(md)?
            .iter()
            .map(|op| self.u32(operand(std::slice::from_ref(op), 0, "view id state")?))
            .collect::<MetadataResult<Vec<_>>>()?;
        ViewIdState::deserialize(&words)
    }

    pub fn load_root_signature(&self, md: MdRef) -> MetadataResult<RootSignature> {
        match self.node(md) {
            MdNode::Blob(data) => Ok(RootSignature::from_bytes(data.clone())),
            other => Err(MetadataError::malformed(format!(
                "expected a root signature blob, found {:?}",
                other
            ))),
        }
    }
}

/// Whether a shader property tag is meaningful for this kind of shader.
pub(crate) fn kind_allows_tag(kind: ShaderKind, tag: u32) -> bool {
    match tag {
        SHADER_FLAGS_TAG => true,
        GS_STATE_TAG => kind == ShaderKind::Geometry,
        DS_STATE_TAG => kind == ShaderKind::Domain,
        HS_STATE_TAG => kind == ShaderKind::Hull,
        NUM_THREADS_TAG => kind == ShaderKind::Compute,
        _ => false,
    }
}
