//! The DXIL module aggregate.
//!
//! A [DxilModule] describes one compiled shader: its stage, signatures, resources,
//! per-stage properties and layout annotations. It never owns IR objects; every
//! [Handle] it stores points into the [Module] it was built for or loaded from, and it
//! must not be used with any other module.

use std::collections::BTreeSet;

use crate::ir::{Function, Handle, MdRef, Module};

use super::{
    constants::{
        InputPrimitive, PrimitiveTopology, ShaderKind, SignatureKind, TessellatorDomain, TessellatorOutputPrimitive,
        TessellatorPartitioning, DXIL_MAJOR, DXIL_MINOR, HS_MAX_TESS_FACTOR_UPPER_BOUND,
    },
    error::{MetadataError, MetadataResult},
    metadata::{
        kind_allows_tag, MetadataReader, MetadataWriter, DS_STATE_TAG, DXIL_VERSION_MD_NAME, ENTRY_POINTS_MD_NAME,
        GS_STATE_TAG, HS_STATE_TAG, NUM_THREADS_TAG, RESOURCES_MD_NAME, ROOT_SIGNATURE_MD_NAME, SHADER_FLAGS_TAG,
        SHADER_MODEL_MD_NAME, TYPE_ANNOTATIONS_MD_NAME, VALIDATOR_VERSION_MD_NAME, VIEW_ID_STATE_MD_NAME,
    },
    resource::{CBuffer, Resource, ResourceLike, Sampler},
    root_signature::RootSignature,
    shader_flags::ShaderFlags,
    shader_model::ShaderModel,
    signature::Signature,
    type_system::TypeSystem,
    view_id::ViewIdState,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsState {
    pub input_primitive: InputPrimitive,
    pub max_vertex_count: u32,
    /// One bit per output stream, 0..=3.
    pub active_stream_mask: u32,
    pub stream_primitive_topology: PrimitiveTopology,
    pub instance_count: u32,
}

impl Default for GsState {
    fn default() -> Self {
        Self {
            input_primitive: InputPrimitive::Undefined,
            max_vertex_count: 0,
            active_stream_mask: 0,
            stream_primitive_topology: PrimitiveTopology::Undefined,
            instance_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HsState {
    pub patch_constant_function: Option<Handle<Function>>,
    pub input_control_points: u32,
    pub output_control_points: u32,
    pub domain: TessellatorDomain,
    pub partitioning: TessellatorPartitioning,
    pub output_primitive: TessellatorOutputPrimitive,
    pub max_tess_factor: f32,
}

impl Default for HsState {
    fn default() -> Self {
        Self {
            patch_constant_function: None,
            input_control_points: 0,
            output_control_points: 0,
            domain: TessellatorDomain::Undefined,
            partitioning: TessellatorPartitioning::Undefined,
            output_primitive: TessellatorOutputPrimitive::Undefined,
            max_tess_factor: HS_MAX_TESS_FACTOR_UPPER_BOUND,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsState {
    pub domain: TessellatorDomain,
    pub input_control_points: u32,
}

impl Default for DsState {
    fn default() -> Self {
        Self {
            domain: TessellatorDomain::Undefined,
            input_control_points: 0,
        }
    }
}

/// An index-addressed resource collection. Ids are handed out in insertion order and
/// never reused, even after entries are pruned.
#[derive(Debug, Clone)]
struct ResourceList<T> {
    items: Vec<T>,
    next_id: u32,
}

impl<T> Default for ResourceList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T: ResourceLike> ResourceList<T> {
    fn add(&mut self, mut resource: T) -> u32 {
        let id = self.next_id;
        resource.base_mut().set_id(id);
        self.next_id += 1;
        self.items.push(resource);
        id
    }

    /// Appends a resource keeping the id it was serialized with.
    fn insert_loaded(&mut self, resource: T) {
        self.next_id = self.next_id.max(resource.id() + 1);
        self.items.push(resource);
    }

    fn get(&self, id: u32) -> Option<&T> {
        self.items.iter().find(|r| r.id() == id)
    }

    fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.items.iter_mut().find(|r| r.id() == id)
    }

    fn retain_ids(&mut self, used: &BTreeSet<u32>) {
        self.items.retain(|r| used.contains(&r.id()));
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

#[derive(Debug, Clone)]
pub struct DxilModule {
    shader_model: Option<&'static ShaderModel>,
    dxil_version: (u32, u32),
    validator_version: (u32, u32),

    input_signature: Signature,
    output_signature: Signature,
    patch_constant_signature: Signature,

    type_system: TypeSystem,
    view_id_state: ViewIdState,
    shader_flags: ShaderFlags,
    root_signature: Option<RootSignature>,

    srvs: ResourceList<Resource>,
    uavs: ResourceList<Resource>,
    cbuffers: ResourceList<CBuffer>,
    samplers: ResourceList<Sampler>,

    entry_function: Option<Handle<Function>>,
    entry_name: String,

    num_threads: [u32; 3],
    gs: GsState,
    hs: HsState,
    ds: DsState,
}

impl Default for DxilModule {
    fn default() -> Self {
        Self::new()
    }
}

impl DxilModule {
    pub fn new() -> Self {
        Self {
            shader_model: None,
            dxil_version: (DXIL_MAJOR, DXIL_MINOR),
            validator_version: (1, 0),
            input_signature: Signature::new(ShaderKind::Invalid, SignatureKind::Input),
            output_signature: Signature::new(ShaderKind::Invalid, SignatureKind::Output),
            patch_constant_signature: Signature::new(ShaderKind::Invalid, SignatureKind::PatchConstant),
            type_system: TypeSystem::new(),
            view_id_state: ViewIdState::new(),
            shader_flags: ShaderFlags::new(),
            root_signature: None,
            srvs: ResourceList::default(),
            uavs: ResourceList::default(),
            cbuffers: ResourceList::default(),
            samplers: ResourceList::default(),
            entry_function: None,
            entry_name: String::new(),
            num_threads: [0; 3],
            gs: GsState::default(),
            hs: HsState::default(),
            ds: DsState::default(),
        }
    }

    // Shader model and versions

    /// Sets the shader model and creates empty signatures for its stage.
    ///
    /// Setting the same model again does nothing. Panics if a different model was set already.
    pub fn set_shader_model(&mut self, sm: &'static ShaderModel) {
        if let Some(existing) = self.shader_model {
            assert!(
                existing == sm,
                "shader model already set to {}, cannot change it to {}",
                existing.name(),
                sm.name()
            );
            return;
        }
        self.shader_model = Some(sm);
        let kind = sm.kind();
        self.input_signature = Signature::new(kind, SignatureKind::Input);
        self.output_signature = Signature::new(kind, SignatureKind::Output);
        self.patch_constant_signature = Signature::new(kind, SignatureKind::PatchConstant);
        self.dxil_version = sm.dxil_version();
    }

    pub fn shader_model(&self) -> Option<&'static ShaderModel> {
        self.shader_model
    }

    /// The stage of this module, [ShaderKind::Invalid] before a shader model is set.
    pub fn shader_kind(&self) -> ShaderKind {
        self.shader_model.map_or(ShaderKind::Invalid, |sm| sm.kind())
    }

    pub fn dxil_version(&self) -> (u32, u32) {
        self.dxil_version
    }

    pub fn set_dxil_version(&mut self, major: u32, minor: u32) {
        self.dxil_version = (major, minor);
    }

    pub fn validator_version(&self) -> (u32, u32) {
        self.validator_version
    }

    pub fn set_validator_version(&mut self, major: u32, minor: u32) {
        self.validator_version = (major, minor);
    }

    /// Raises the required validator version. Returns false, leaving the version
    /// untouched, unless `(major, minor)` is newer than the current one.
    pub fn upgrade_validator_version(&mut self, major: u32, minor: u32) -> bool {
        if (major, minor) > self.validator_version {
            log::debug!(
                "upgrading validator version {:?} -> {:?}",
                self.validator_version,
                (major, minor)
            );
            self.validator_version = (major, minor);
            true
        } else {
            false
        }
    }

    // Signatures

    pub fn input_signature(&self) -> &Signature {
        &self.input_signature
    }
    pub fn input_signature_mut(&mut self) -> &mut Signature {
        &mut self.input_signature
    }
    pub fn output_signature(&self) -> &Signature {
        &self.output_signature
    }
    pub fn output_signature_mut(&mut self) -> &mut Signature {
        &mut self.output_signature
    }
    pub fn patch_constant_signature(&self) -> &Signature {
        &self.patch_constant_signature
    }
    pub fn patch_constant_signature_mut(&mut self) -> &mut Signature {
        &mut self.patch_constant_signature
    }

    // Side tables

    pub fn type_system(&self) -> &TypeSystem {
        &self.type_system
    }
    pub fn type_system_mut(&mut self) -> &mut TypeSystem {
        &mut self.type_system
    }

    pub fn view_id_state(&self) -> &ViewIdState {
        &self.view_id_state
    }
    pub fn view_id_state_mut(&mut self) -> &mut ViewIdState {
        &mut self.view_id_state
    }

    /// Resizes the view-ID state to match the current signatures.
    pub fn compute_view_id_state(&mut self) {
        self.view_id_state = ViewIdState::from_signatures(
            self.shader_kind(),
            &self.input_signature,
            &self.output_signature,
            &self.patch_constant_signature,
        );
    }

    pub fn shader_flags(&self) -> &ShaderFlags {
        &self.shader_flags
    }
    pub fn shader_flags_mut(&mut self) -> &mut ShaderFlags {
        &mut self.shader_flags
    }
    pub fn set_shader_flags(&mut self, flags: ShaderFlags) {
        self.shader_flags = flags;
    }

    pub fn root_signature(&self) -> Option<&RootSignature> {
        self.root_signature.as_ref()
    }
    pub fn set_root_signature(&mut self, root_signature: RootSignature) {
        self.root_signature = Some(root_signature);
    }

    /// Drops the root signature, both here and from the module's emitted metadata.
    pub fn strip_root_signature(&mut self, module: &mut Module) {
        self.root_signature = None;
        if module.metadata.remove_named(ROOT_SIGNATURE_MD_NAME) {
            log::debug!("stripped root signature metadata");
        }
    }

    // Resources

    pub fn add_srv(&mut self, srv: Resource) -> u32 {
        debug_assert!(!srv.is_uav());
        self.srvs.add(srv)
    }
    pub fn srv(&self, id: u32) -> Option<&Resource> {
        self.srvs.get(id)
    }
    pub fn srv_mut(&mut self, id: u32) -> Option<&mut Resource> {
        self.srvs.get_mut(id)
    }
    pub fn srvs(&self) -> &[Resource] {
        &self.srvs.items
    }
    pub fn srvs_mut(&mut self) -> &mut [Resource] {
        &mut self.srvs.items
    }

    pub fn add_uav(&mut self, uav: Resource) -> u32 {
        debug_assert!(uav.is_uav());
        self.uavs.add(uav)
    }
    pub fn uav(&self, id: u32) -> Option<&Resource> {
        self.uavs.get(id)
    }
    pub fn uav_mut(&mut self, id: u32) -> Option<&mut Resource> {
        self.uavs.get_mut(id)
    }
    pub fn uavs(&self) -> &[Resource] {
        &self.uavs.items
    }
    pub fn uavs_mut(&mut self) -> &mut [Resource] {
        &mut self.uavs.items
    }

    pub fn add_cbuffer(&mut self, cbuffer: CBuffer) -> u32 {
        self.cbuffers.add(cbuffer)
    }
    pub fn cbuffer(&self, id: u32) -> Option<&CBuffer> {
        self.cbuffers.get(id)
    }
    pub fn cbuffer_mut(&mut self, id: u32) -> Option<&mut CBuffer> {
        self.cbuffers.get_mut(id)
    }
    pub fn cbuffers(&self) -> &[CBuffer] {
        &self.cbuffers.items
    }
    pub fn cbuffers_mut(&mut self) -> &mut [CBuffer] {
        &mut self.cbuffers.items
    }

    pub fn add_sampler(&mut self, sampler: Sampler) -> u32 {
        self.samplers.add(sampler)
    }
    pub fn sampler(&self, id: u32) -> Option<&Sampler> {
        self.samplers.get(id)
    }
    pub fn sampler_mut(&mut self, id: u32) -> Option<&mut Sampler> {
        self.samplers.get_mut(id)
    }
    pub fn samplers(&self) -> &[Sampler] {
        &self.samplers.items
    }
    pub fn samplers_mut(&mut self) -> &mut [Sampler] {
        &mut self.samplers.items
    }

    pub(crate) fn clear_resources(&mut self) {
        self.srvs.clear();
        self.uavs.clear();
        self.cbuffers.clear();
        self.samplers.clear();
    }

    pub(crate) fn retain_resources(
        &mut self,
        srvs: &BTreeSet<u32>,
        uavs: &BTreeSet<u32>,
        cbuffers: &BTreeSet<u32>,
        samplers: &BTreeSet<u32>,
    ) {
        self.srvs.retain_ids(srvs);
        self.uavs.retain_ids(uavs);
        self.cbuffers.retain_ids(cbuffers);
        self.samplers.retain_ids(samplers);
    }

    // Entry point

    pub fn entry_function(&self) -> Option<Handle<Function>> {
        self.entry_function
    }
    pub fn set_entry_function(&mut self, function: Handle<Function>) {
        self.entry_function = Some(function);
    }
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }
    pub fn set_entry_name(&mut self, name: &str) {
        self.entry_name = name.to_owned();
    }

    pub fn patch_constant_function(&self) -> Option<Handle<Function>> {
        self.hs.patch_constant_function
    }
    pub fn set_patch_constant_function(&mut self, function: Handle<Function>) {
        self.hs.patch_constant_function = Some(function);
    }

    // Per-stage state

    pub fn num_threads(&self) -> [u32; 3] {
        self.num_threads
    }
    pub fn set_num_threads(&mut self, x: u32, y: u32, z: u32) {
        self.num_threads = [x, y, z];
    }

    pub fn gs_state(&self) -> &GsState {
        &self.gs
    }
    pub fn gs_state_mut(&mut self) -> &mut GsState {
        &mut self.gs
    }

    pub fn hs_state(&self) -> &HsState {
        &self.hs
    }
    pub fn hs_state_mut(&mut self) -> &mut HsState {
        &mut self.hs
    }

    pub fn ds_state(&self) -> &DsState {
        &self.ds
    }
    pub fn ds_state_mut(&mut self) -> &mut DsState {
        &mut self.ds
    }

    pub fn has_multiple_output_streams(&self) -> bool {
        (self.gs.active_stream_mask & 0xf).count_ones() > 1
    }

    /// The single active GS output stream. Panics unless exactly one stream is active.
    pub fn output_stream(&self) -> u32 {
        let mask = self.gs.active_stream_mask & 0xf;
        assert_eq!(
            mask.count_ones(),
            1,
            "output_stream needs exactly one active stream, mask is {:#06b}",
            mask
        );
        mask.trailing_zeros()
    }

    // Metadata

    fn view_id_state_expected(&self) -> bool {
        self.validator_version >= (1, 1) && self.shader_kind() != ShaderKind::Compute
    }

    fn emit_shader_properties(&self, w: &mut MetadataWriter) -> Option<MdRef> {
        let mut tags = Vec::new();
        let raw_flags = self.shader_flags.raw();
        if raw_flags != 0 {
            tags.push((SHADER_FLAGS_TAG, w.u64(raw_flags)));
        }
        match self.shader_kind() {
            ShaderKind::Geometry => tags.push((GS_STATE_TAG, w.emit_gs_state(&self.gs))),
            ShaderKind::Domain => tags.push((DS_STATE_TAG, w.emit_ds_state(&self.ds))),
            ShaderKind::Hull => tags.push((HS_STATE_TAG, w.emit_hs_state(&self.hs))),
            ShaderKind::Compute => tags.push((NUM_THREADS_TAG, w.emit_num_threads(self.num_threads))),
            _ => {}
        }
        w.emit_shader_properties(tags)
    }

    /// Writes the whole module description into `module`'s named metadata.
    ///
    /// Panics if no shader model has been set.
    pub fn emit_metadata(&self, module: &mut Module) {
        let sm = self
            .shader_model
            .unwrap_or_else(|| panic!("cannot emit DXIL metadata without a shader model"));
        log::debug!("emitting DXIL metadata for {} entry '{}'", sm.name(), self.entry_name);

        let mut w = MetadataWriter::new(module);
        let version = w.emit_version(self.dxil_version);
        let valver = w.emit_version(self.validator_version);
        let shader_model = w.emit_shader_model(sm);
        let properties = self.emit_shader_properties(&mut w);
        let signatures = w.emit_signatures(
            &self.input_signature,
            &self.output_signature,
            &self.patch_constant_signature,
        );
        let resources = w.emit_resources(
            self.srvs(),
            self.uavs(),
            self.cbuffers(),
            self.samplers(),
        );
        let type_annotations = w.emit_type_system(&self.type_system);
        let view_id = if self.view_id_state_expected() {
            Some(w.emit_view_id_state(&self.view_id_state))
        } else {
            None
        };
        let entry = w.emit_entry_point(
            self.entry_function,
            &self.entry_name,
            signatures,
            resources,
            properties,
        );
        let root_signature = self.root_signature.as_ref().map(|rs| w.emit_root_signature(rs));

        let md = &mut module.metadata;
        md.set_named(DXIL_VERSION_MD_NAME, vec![version]);
        md.set_named(VALIDATOR_VERSION_MD_NAME, vec![valver]);
        md.set_named(SHADER_MODEL_MD_NAME, vec![shader_model]);
        match resources {
            Some(r) => md.set_named(RESOURCES_MD_NAME, vec![r]),
            None => {
                md.remove_named(RESOURCES_MD_NAME);
            }
        }
        if type_annotations.is_empty() {
            md.remove_named(TYPE_ANNOTATIONS_MD_NAME);
        } else {
            md.set_named(TYPE_ANNOTATIONS_MD_NAME, type_annotations);
        }
        match view_id {
            Some(v) => md.set_named(VIEW_ID_STATE_MD_NAME, vec![v]),
            None => {
                md.remove_named(VIEW_ID_STATE_MD_NAME);
            }
        }
        md.set_named(ENTRY_POINTS_MD_NAME, vec![entry]);
        match root_signature {
            Some(rs) => md.set_named(ROOT_SIGNATURE_MD_NAME, vec![rs]),
            None => {
                md.remove_named(ROOT_SIGNATURE_MD_NAME);
            }
        }
    }

    fn load_shader_properties(&mut self, r: &MetadataReader, md: Option<MdRef>) -> MetadataResult<()> {
        let md = match md {
            Some(md) => md,
            None => return Ok(()),
        };
        let kind = self.shader_kind();
        for (tag, value) in r.tag_list(md)? {
            if tag > NUM_THREADS_TAG {
                return Err(MetadataError::UnknownShaderPropertyTag(tag));
            }
            if !kind_allows_tag(kind, tag) {
                return Err(MetadataError::malformed(format!(
                    "shader property tag {} is not valid for {:?} shaders",
                    tag, kind
                )));
            }
            match tag {
                SHADER_FLAGS_TAG => self.shader_flags = ShaderFlags::from_raw(r.uint(value)?),
                GS_STATE_TAG => self.gs = r.load_gs_state(value)?,
                DS_STATE_TAG => self.ds = r.load_ds_state(value)?,
                HS_STATE_TAG => self.hs = r.load_hs_state(value)?,
                NUM_THREADS_TAG => self.num_threads = r.load_num_threads(value)?,
                _ => unreachable!(),
            }
        }
        Ok(())
    }

    /// Reads a module description previously written by [DxilModule::emit_metadata].
    pub fn load_metadata(module: &Module) -> MetadataResult<DxilModule> {
        let r = MetadataReader::new(module);
        let single = |name: &'static str| -> MetadataResult<Option<MdRef>> {
            match module.metadata.named(name) {
                None => Ok(None),
                Some(list) => match list.operands.as_slice() {
                    [md] => Ok(Some(*md)),
                    ops => Err(MetadataError::malformed(format!(
                        "'{}' has {} operands, expected 1",
                        name,
                        ops.len()
                    ))),
                },
            }
        };
        let required = |name: &'static str| -> MetadataResult<MdRef> {
            single(name)?.ok_or(MetadataError::MissingNamedMetadata(name))
        };

        let mut dxil = DxilModule::new();

        let dxil_version = r.load_version(required(DXIL_VERSION_MD_NAME)?)?;
        if let Some(valver) = single(VALIDATOR_VERSION_MD_NAME)? {
            let (major, minor) = r.load_version(valver)?;
            dxil.set_validator_version(major, minor);
        }
        let sm = r.load_shader_model(required(SHADER_MODEL_MD_NAME)?)?;
        dxil.set_shader_model(sm);
        dxil.set_dxil_version(dxil_version.0, dxil_version.1);
        log::debug!("loading DXIL metadata for {}", sm.name());

        let entries = module
            .metadata
            .named(ENTRY_POINTS_MD_NAME)
            .ok_or(MetadataError::MissingNamedMetadata(ENTRY_POINTS_MD_NAME))?;
        let entry = match entries.operands.as_slice() {
            [entry] => *entry,
            ops => return Err(MetadataError::EntryPointCount(ops.len())),
        };
        let (function, name, signatures, resources, properties) = r.load_entry_point(entry)?;
        dxil.entry_function = function;
        dxil.entry_name = name.to_owned();

        r.load_signatures(
            signatures,
            &mut dxil.input_signature,
            &mut dxil.output_signature,
            &mut dxil.patch_constant_signature,
        )?;

        let (srvs, uavs, cbuffers, samplers) = r.load_resources(resources)?;
        srvs.into_iter().for_each(|res| dxil.srvs.insert_loaded(res));
        uavs.into_iter().for_each(|res| dxil.uavs.insert_loaded(res));
        cbuffers.into_iter().for_each(|res| dxil.cbuffers.insert_loaded(res));
        samplers.into_iter().for_each(|res| dxil.samplers.insert_loaded(res));

        dxil.load_shader_properties(&r, properties)?;

        if let Some(list) = module.metadata.named(TYPE_ANNOTATIONS_MD_NAME) {
            r.load_type_system(&list.operands, &mut dxil.type_system)?;
        }

        if dxil.view_id_state_expected() {
            dxil.view_id_state = r.load_view_id_state(required(VIEW_ID_STATE_MD_NAME)?)?;
        }

        if let Some(rs) = single(ROOT_SIGNATURE_MD_NAME)? {
            dxil.root_signature = Some(r.load_root_signature(rs)?);
        }

        log::debug!(
            "loaded {} SRVs, {} UAVs, {} cbuffers, {} samplers",
            dxil.srvs.items.len(),
            dxil.uavs.items.len(),
            dxil.cbuffers.items.len(),
            dxil.samplers.items.len()
        );
        Ok(dxil)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_not_reused_after_pruning() {
        let mut dxil = DxilModule::new();
        let a = dxil.add_sampler(Sampler::new(super::super::constants::SamplerKind::Default));
        let b = dxil.add_sampler(Sampler::new(super::super::constants::SamplerKind::Comparison));
        dxil.retain_resources(
            &BTreeSet::new(),
            &BTreeSet::new(),
            &BTreeSet::new(),
            &[a].into_iter().collect(),
        );
        assert!(dxil.sampler(b).is_none());
        let c = dxil.add_sampler(Sampler::new(super::super::constants::SamplerKind::Default));
        assert_eq!(c, 2);
    }
}
