//! Lowering one translation unit's declarations into a [DxilModule].
//!
//! Declarations are fed in one by one; [HlslRuntime::finish] then derives stage properties,
//! lays out constant buffers, binds resources, builds the signatures and computes the
//! shader flags. Problems are collected as diagnostics and only checked at the end, so
//! every independent error is reported.

use std::collections::HashMap;

use thiserror::Error;

use crate::diag::{Diagnostics, SourceLocation};
use crate::dxil::{
    constants::{MatrixOrientation, ResourceClass, ShaderKind},
    module::DxilModule,
    shader_model::ShaderModel,
};
use crate::ir::{Function, GlobalVariable, Handle, Module};

use super::{
    ast::{AttributeKind, CBufferDecl, FunctionDecl, HlslType, ParamDirection, UnusualAnnotation, VarDecl},
    cbuffer::{CBufferBuilder, ConstantDecl, GLOBALS_CBUFFER_NAME},
    layout::LayoutBuilder,
    props::{derive_function_props, function_annotation, FunctionProps, PatchConstantInfo, PropsContext},
    resources::{allocate_bindings, apply_register_annotations, declare_resource, replace_resource_loads, DeclaredResource},
    signature::build_signatures,
};

#[derive(Debug, Clone, PartialEq)]
pub struct HlslOptions {
    /// Target profile, e.g. `ps_6_0`.
    pub shader_model: String,
    pub entry_name: String,
    /// Orientation of matrices declared without `row_major`/`column_major`.
    pub default_row_major: bool,
    pub validator_version: (u32, u32),
    pub all_resources_bound: bool,
    pub disable_optimizations: bool,
    pub disable_math_refactoring: bool,
    pub use_native_low_precision: bool,
}

impl Default for HlslOptions {
    fn default() -> Self {
        Self {
            shader_model: "ps_6_0".to_owned(),
            entry_name: "main".to_owned(),
            default_row_major: false,
            validator_version: (1, 0),
            all_resources_bound: false,
            disable_optimizations: false,
            disable_math_refactoring: false,
            use_native_low_precision: false,
        }
    }
}

impl HlslOptions {
    pub fn new(shader_model: &str, entry_name: &str) -> Self {
        Self {
            shader_model: shader_model.to_owned(),
            entry_name: entry_name.to_owned(),
            ..Default::default()
        }
    }

    pub fn default_orientation(&self) -> MatrixOrientation {
        if self.default_row_major {
            MatrixOrientation::RowMajor
        } else {
            MatrixOrientation::ColumnMajor
        }
    }
}

#[derive(Debug, Error)]
#[error("lowering failed with {} error(s)", .0.error_count())]
pub struct LoweringFailed(pub Diagnostics);

#[derive(Debug, Clone)]
enum PropsState {
    InProgress,
    Done(Option<FunctionProps>),
}

#[derive(Debug)]
struct DeclaredFunction {
    decl: FunctionDecl,
    function: Handle<Function>,
}

#[derive(Debug)]
struct GlobalResource {
    global: Handle<GlobalVariable>,
    class: ResourceClass,
    id: u32,
}

pub struct HlslRuntime<'m> {
    module: &'m mut Module,
    dxil: DxilModule,
    options: HlslOptions,
    diags: Diagnostics,
    functions: Vec<DeclaredFunction>,
    function_index: HashMap<String, usize>,
    props: HashMap<usize, PropsState>,
    resources: Vec<GlobalResource>,
    globals_cbuffer: CBufferBuilder,
    cbuffers: Vec<CBufferBuilder>,
}

impl<'m> HlslRuntime<'m> {
    pub fn new(module: &'m mut Module, options: HlslOptions) -> Self {
        let mut dxil = DxilModule::new();
        let mut diags = Diagnostics::new();
        match ShaderModel::get_by_name(&options.shader_model) {
            Ok(sm) => dxil.set_shader_model(sm),
            Err(e) => diags.error(SourceLocation::default(), e.to_string()),
        }
        let (major, minor) = options.validator_version;
        dxil.set_validator_version(major, minor);
        Self {
            module,
            dxil,
            options,
            diags,
            functions: Vec::new(),
            function_index: HashMap::new(),
            props: HashMap::new(),
            resources: Vec::new(),
            globals_cbuffer: CBufferBuilder::new(GLOBALS_CBUFFER_NAME),
            cbuffers: Vec::new(),
        }
    }

    pub fn module(&mut self) -> &mut Module {
        &mut *self.module
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diags
    }

    fn layout(&mut self) -> LayoutBuilder<'_> {
        LayoutBuilder::new(
            self.module,
            self.dxil.type_system_mut(),
            self.options.default_orientation(),
        )
    }

    /// Creates the IR function for a declaration. Its body is filled in by the caller.
    pub fn declare_function(&mut self, decl: FunctionDecl) -> Handle<Function> {
        if let Some(existing) = self.function_index.get(&decl.name) {
            self.diags
                .error(decl.location, format!("redefinition of function '{}'", decl.name));
            return self.functions[*existing].function;
        }

        let mut layout = self.layout();
        let return_type = match &decl.return_type {
            Some(ty) => layout.lower_type(ty),
            None => layout.module.void_type(),
        };
        let param_types: Vec<_> = decl
            .params
            .iter()
            .map(|p| {
                let ty = layout.lower_type(&p.ty);
                match p.direction {
                    ParamDirection::In => ty,
                    ParamDirection::Out | ParamDirection::Inout => layout.module.pointer_type(ty),
                }
            })
            .collect();
        let function = self.module.add_function(&decl.name, return_type, &param_types);

        self.function_index.insert(decl.name.clone(), self.functions.len());
        self.functions.push(DeclaredFunction { decl, function });
        function
    }

    pub fn function(&self, name: &str) -> Option<Handle<Function>> {
        self.function_index.get(name).map(|i| self.functions[*i].function)
    }

    /// Declares a global variable: a resource, or a constant of the implicit `$Globals` buffer.
    pub fn add_global(&mut self, var: VarDecl) -> Handle<GlobalVariable> {
        if var.ty.resource_type().is_some() {
            return self.add_resource(&var);
        }

        let mut offset = None;
        for annotation in &var.annotations {
            match annotation {
                UnusualAnnotation::RegisterAssignment {
                    class: 'c' | 'C',
                    register,
                    ..
                } => offset = Some(register * 16),
                UnusualAnnotation::RegisterAssignment { class, location, .. } => self.diags.error(
                    *location,
                    format!("register type '{}' is not valid for constant '{}'", class, var.name),
                ),
                UnusualAnnotation::ConstantPacking { location, .. } => self
                    .diags
                    .error(*location, "packoffset is only allowed within a constant buffer"),
                UnusualAnnotation::SemanticDecl { .. } => {}
            }
        }
        let constant = self.constant(&var, offset);
        let global = constant.global;
        self.globals_cbuffer.add_constant(constant);
        global
    }

    /// Declares a `cbuffer` block and returns the placeholder globals of its members, in order.
    pub fn add_cbuffer(&mut self, decl: CBufferDecl) -> Vec<Handle<GlobalVariable>> {
        let mut builder = CBufferBuilder::new(&decl.name);
        apply_register_annotations(&mut builder.base, &decl.annotations, &mut self.diags);

        let mut globals = Vec::new();
        for var in &decl.constants {
            if var.ty.resource_type().is_some() {
                globals.push(self.add_resource(var));
                continue;
            }
            let mut offset = None;
            for annotation in &var.annotations {
                match annotation {
                    UnusualAnnotation::ConstantPacking {
                        register, component, ..
                    } => offset = Some(register * 16 + component * 4),
                    UnusualAnnotation::RegisterAssignment { location, .. } => self.diags.error(
                        *location,
                        format!("'{}' is in a cbuffer; use packoffset to place it", var.name),
                    ),
                    UnusualAnnotation::SemanticDecl { .. } => {}
                }
            }
            let constant = self.constant(var, offset);
            globals.push(constant.global);
            builder.add_constant(constant);
        }
        self.cbuffers.push(builder);
        globals
    }

    fn constant(&mut self, var: &VarDecl, offset: Option<u32>) -> ConstantDecl {
        let mut layout = self.layout();
        let size = layout.annotate_type(&var.ty);
        let ty = layout.lower_type(&var.ty);
        let global = self.module.add_global(&var.name, ty, true);
        ConstantDecl {
            name: var.name.clone(),
            ty: var.ty.clone(),
            global,
            offset,
            size,
        }
    }

    fn add_resource(&mut self, var: &VarDecl) -> Handle<GlobalVariable> {
        let mut layout = self.layout();
        let ty = layout.lower_type(&var.ty);
        let global = self.module.add_global(&var.name, ty, false);

        let mut declared = match declare_resource(var, &mut self.diags) {
            Some(declared) => declared,
            None => return global,
        };
        declared.base_mut().global_symbol = Some(global);
        let (class, id) = match declared {
            DeclaredResource::Srv(res) => (ResourceClass::SRV, self.dxil.add_srv(res)),
            DeclaredResource::Uav(res) => (ResourceClass::UAV, self.dxil.add_uav(res)),
            DeclaredResource::Sampler(sampler) => (ResourceClass::Sampler, self.dxil.add_sampler(sampler)),
            DeclaredResource::CBuffer(mut cbuffer) => {
                if let Some(HlslType::Resource {
                    element: Some(element),
                    ..
                }) = var.ty.resource_type()
                {
                    cbuffer.size = self.layout().annotate_type(element);
                }
                (ResourceClass::CBuffer, self.dxil.add_cbuffer(cbuffer))
            }
        };
        self.resources.push(GlobalResource { global, class, id });
        global
    }

    /// Properties of function `index`, deriving them first if needed. A hull shader's patch
    /// constant function is derived before the hull shader itself.
    fn props_for(&mut self, index: usize) -> Option<FunctionProps> {
        match self.props.get(&index) {
            Some(PropsState::Done(props)) => return props.clone(),
            Some(PropsState::InProgress) => {
                let decl = &self.functions[index].decl;
                self.diags.error(
                    decl.location,
                    format!("patch constant function '{}' depends on itself", decl.name),
                );
                return None;
            }
            None => {}
        }
        self.props.insert(index, PropsState::InProgress);

        let decl = self.functions[index].decl.clone();
        let pc_name = decl.attributes.iter().find_map(|a| match &a.kind {
            AttributeKind::PatchConstantFunc(name) => Some(name.clone()),
            _ => None,
        });
        let patch_constant = match pc_name.and_then(|name| self.function_index.get(&name).copied()) {
            Some(pc_index) => Some((self.functions[pc_index].function, self.props_for(pc_index))),
            None => None,
        };

        let ctx = PropsContext {
            is_entry: decl.name == self.options.entry_name,
            shader_kind: self.dxil.shader_kind(),
            patch_constant: patch_constant.as_ref().map(|(function, props)| PatchConstantInfo {
                function: *function,
                props: props.as_ref(),
            }),
        };
        let props = derive_function_props(&decl, &ctx, &mut self.diags);
        self.props.insert(index, PropsState::Done(props.clone()));
        props
    }

    fn apply_entry_props(&mut self, index: usize, props: &FunctionProps) {
        let entry = &self.functions[index];
        self.dxil.set_entry_function(entry.function);
        self.dxil.set_entry_name(&entry.decl.name);

        match props.shader_kind {
            ShaderKind::Compute => {
                let [x, y, z] = props.num_threads;
                self.dxil.set_num_threads(x, y, z);
            }
            ShaderKind::Geometry => *self.dxil.gs_state_mut() = props.gs.clone(),
            ShaderKind::Hull => {
                *self.dxil.hs_state_mut() = props.hs.clone();
                if let Some(pc) = props.hs.patch_constant_function {
                    self.dxil.set_patch_constant_function(pc);
                }
            }
            ShaderKind::Domain => *self.dxil.ds_state_mut() = props.ds.clone(),
            ShaderKind::Pixel => self.dxil.shader_flags_mut().force_early_depth_stencil = props.early_depth_stencil,
            _ => {}
        }

        let patch_constant = props.hs.patch_constant_function.and_then(|pc| {
            let pc_index = self.functions.iter().position(|f| f.function == pc)?;
            let pc_props = self.props_for(pc_index)?;
            Some((pc_index, pc_props))
        });
        let entry_decl = &self.functions[index].decl;
        build_signatures(
            &mut self.dxil,
            (entry_decl, props),
            patch_constant
                .as_ref()
                .map(|(pc_index, pc_props)| (&self.functions[*pc_index].decl, pc_props)),
            &mut self.diags,
        );
    }

    fn build_cbuffers(&mut self) {
        let orientation = self.options.default_orientation();
        let globals = std::mem::replace(&mut self.globals_cbuffer, CBufferBuilder::new(GLOBALS_CBUFFER_NAME));
        let builders = std::iter::once(globals)
            .filter(|b| !b.is_empty())
            .chain(std::mem::take(&mut self.cbuffers));
        for builder in builders {
            builder.build(self.module, &mut self.dxil, orientation);
        }
    }

    fn allocate_registers(&mut self) {
        let mut unplaced = Vec::new();
        unplaced.extend(allocate_bindings(self.dxil.srvs_mut()).into_iter().map(|id| (ResourceClass::SRV, id)));
        unplaced.extend(allocate_bindings(self.dxil.uavs_mut()).into_iter().map(|id| (ResourceClass::UAV, id)));
        unplaced.extend(
            allocate_bindings(self.dxil.cbuffers_mut())
                .into_iter()
                .map(|id| (ResourceClass::CBuffer, id)),
        );
        unplaced.extend(
            allocate_bindings(self.dxil.samplers_mut())
                .into_iter()
                .map(|id| (ResourceClass::Sampler, id)),
        );
        for (class, id) in unplaced {
            self.diags.error(
                SourceLocation::default(),
                format!("no free register range for {:?} resource {}", class, id),
            );
        }
    }

    /// Runs the remaining lowering steps and returns the finished module description.
    pub fn finish(mut self) -> Result<DxilModule, LoweringFailed> {
        for index in 0..self.functions.len() {
            if let Some(props) = self.props_for(index) {
                let function = self.functions[index].function;
                let decl = self.functions[index].decl.clone();
                let annotation = function_annotation(&mut self.layout(), &decl, &props);
                self.dxil
                    .type_system_mut()
                    .insert_function_annotation(function, annotation);
            }
        }

        let entry = self.function_index.get(&self.options.entry_name).copied();
        match entry {
            Some(index) => {
                if let Some(props) = self.props_for(index) {
                    self.apply_entry_props(index, &props);
                }
            }
            None => self.diags.error(
                SourceLocation::default(),
                format!("missing entry point '{}'", self.options.entry_name),
            ),
        }

        self.build_cbuffers();
        self.allocate_registers();
        for res in &self.resources {
            replace_resource_loads(self.module, res.global, res.class, res.id);
        }
        let flags = self.dxil.shader_flags_mut();
        flags.all_resources_bound = self.options.all_resources_bound;
        flags.disable_optimizations = self.options.disable_optimizations;
        flags.disable_math_refactoring = self.options.disable_math_refactoring;
        flags.use_native_low_precision = self.options.use_native_low_precision;
        self.dxil.collect_shader_flags(self.module);
        self.dxil.compute_view_id_state();

        if self.diags.has_errors() || self.dxil.entry_function().is_none() {
            return Err(LoweringFailed(self.diags));
        }
        log::debug!(
            "lowered {} with {} srvs, {} uavs, {} cbuffers, {} samplers",
            self.dxil.entry_name(),
            self.dxil.srvs().len(),
            self.dxil.uavs().len(),
            self.dxil.cbuffers().len(),
            self.dxil.samplers().len()
        );
        Ok(self.dxil)
    }
}
