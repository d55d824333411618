//! Resource declarations: keyword tables, register bindings, binding allocation and
//! materialising resource handles in the IR.

use std::collections::BTreeMap;

use phf::phf_map;

use crate::diag::Diagnostics;
use crate::dxil::{
    constants::{ResourceClass, ResourceKind, SamplerKind},
    opcode::{OpCode, CREATE_HANDLE_NAME},
    resource::{CBuffer, LowerBound, RangeSize, Resource, ResourceBase, ResourceLike, Sampler},
};
use crate::ir::{GlobalVariable, Handle, Instruction, Module, Type, Value};

use super::{
    ast::{HlslType, UnusualAnnotation, VarDecl},
    layout::natural_size,
};

static KEYWORD_TO_CLASS: phf::Map<&'static str, ResourceClass> = phf_map! {
    "Texture1D" => ResourceClass::SRV,
    "Texture1DArray" => ResourceClass::SRV,
    "Texture2D" => ResourceClass::SRV,
    "Texture2DArray" => ResourceClass::SRV,
    "Texture2DMS" => ResourceClass::SRV,
    "Texture2DMSArray" => ResourceClass::SRV,
    "Texture3D" => ResourceClass::SRV,
    "TextureCube" => ResourceClass::SRV,
    "TextureCubeArray" => ResourceClass::SRV,
    "Buffer" => ResourceClass::SRV,
    "ByteAddressBuffer" => ResourceClass::SRV,
    "StructuredBuffer" => ResourceClass::SRV,
    "TextureBuffer" => ResourceClass::SRV,
    "RWTexture1D" => ResourceClass::UAV,
    "RWTexture1DArray" => ResourceClass::UAV,
    "RWTexture2D" => ResourceClass::UAV,
    "RWTexture2DArray" => ResourceClass::UAV,
    "RWTexture3D" => ResourceClass::UAV,
    "RWBuffer" => ResourceClass::UAV,
    "RWByteAddressBuffer" => ResourceClass::UAV,
    "RWStructuredBuffer" => ResourceClass::UAV,
    "AppendStructuredBuffer" => ResourceClass::UAV,
    "ConsumeStructuredBuffer" => ResourceClass::UAV,
    "RasterizerOrderedBuffer" => ResourceClass::UAV,
    "RasterizerOrderedByteAddressBuffer" => ResourceClass::UAV,
    "RasterizerOrderedStructuredBuffer" => ResourceClass::UAV,
    "RasterizerOrderedTexture1D" => ResourceClass::UAV,
    "RasterizerOrderedTexture1DArray" => ResourceClass::UAV,
    "RasterizerOrderedTexture2D" => ResourceClass::UAV,
    "RasterizerOrderedTexture2DArray" => ResourceClass::UAV,
    "RasterizerOrderedTexture3D" => ResourceClass::UAV,
    "ConstantBuffer" => ResourceClass::CBuffer,
    "SamplerState" => ResourceClass::Sampler,
    "SamplerComparisonState" => ResourceClass::Sampler,
};

static KEYWORD_TO_KIND: phf::Map<&'static str, ResourceKind> = phf_map! {
    "Texture1D" => ResourceKind::Texture1D,
    "RWTexture1D" => ResourceKind::Texture1D,
    "RasterizerOrderedTexture1D" => ResourceKind::Texture1D,
    "Texture1DArray" => ResourceKind::Texture1DArray,
    "RWTexture1DArray" => ResourceKind::Texture1DArray,
    "RasterizerOrderedTexture1DArray" => ResourceKind::Texture1DArray,
    "Texture2D" => ResourceKind::Texture2D,
    "RWTexture2D" => ResourceKind::Texture2D,
    "RasterizerOrderedTexture2D" => ResourceKind::Texture2D,
    "Texture2DArray" => ResourceKind::Texture2DArray,
    "RWTexture2DArray" => ResourceKind::Texture2DArray,
    "RasterizerOrderedTexture2DArray" => ResourceKind::Texture2DArray,
    "Texture2DMS" => ResourceKind::Texture2DMS,
    "Texture2DMSArray" => ResourceKind::Texture2DMSArray,
    "Texture3D" => ResourceKind::Texture3D,
    "RWTexture3D" => ResourceKind::Texture3D,
    "RasterizerOrderedTexture3D" => ResourceKind::Texture3D,
    "TextureCube" => ResourceKind::TextureCube,
    "TextureCubeArray" => ResourceKind::TextureCubeArray,
    "Buffer" => ResourceKind::TypedBuffer,
    "RWBuffer" => ResourceKind::TypedBuffer,
    "RasterizerOrderedBuffer" => ResourceKind::TypedBuffer,
    "ByteAddressBuffer" => ResourceKind::RawBuffer,
    "RWByteAddressBuffer" => ResourceKind::RawBuffer,
    "RasterizerOrderedByteAddressBuffer" => ResourceKind::RawBuffer,
    "StructuredBuffer" => ResourceKind::StructuredBuffer,
    "RWStructuredBuffer" => ResourceKind::StructuredBuffer,
    "AppendStructuredBuffer" => ResourceKind::StructuredBuffer,
    "ConsumeStructuredBuffer" => ResourceKind::StructuredBuffer,
    "RasterizerOrderedStructuredBuffer" => ResourceKind::StructuredBuffer,
    "TextureBuffer" => ResourceKind::TBuffer,
    "ConstantBuffer" => ResourceKind::CBuffer,
    "SamplerState" => ResourceKind::Sampler,
    "SamplerComparisonState" => ResourceKind::Sampler,
};

static KEYWORD_TO_SAMPLER_KIND: phf::Map<&'static str, SamplerKind> = phf_map! {
    "SamplerState" => SamplerKind::Default,
    "SamplerComparisonState" => SamplerKind::Comparison,
};

pub fn keyword_to_class(keyword: &str) -> ResourceClass {
    KEYWORD_TO_CLASS
        .get(keyword)
        .copied()
        .unwrap_or(ResourceClass::Invalid)
}

pub fn keyword_to_kind(keyword: &str) -> ResourceKind {
    KEYWORD_TO_KIND
        .get(keyword)
        .copied()
        .unwrap_or(ResourceKind::Invalid)
}

pub fn keyword_to_sampler_kind(keyword: &str) -> SamplerKind {
    KEYWORD_TO_SAMPLER_KIND
        .get(keyword)
        .copied()
        .unwrap_or(SamplerKind::Invalid)
}

/// The letter `register(...)` uses for a class.
pub fn register_letter(class: ResourceClass) -> Option<char> {
    match class {
        ResourceClass::SRV => Some('t'),
        ResourceClass::UAV => Some('u'),
        ResourceClass::CBuffer => Some('b'),
        ResourceClass::Sampler => Some('s'),
        ResourceClass::Invalid => None,
    }
}

/// A resource declaration turned into the descriptor for its class.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredResource {
    Srv(Resource),
    Uav(Resource),
    CBuffer(CBuffer),
    Sampler(Sampler),
}

impl DeclaredResource {
    pub fn base_mut(&mut self) -> &mut ResourceBase {
        match self {
            DeclaredResource::Srv(r) | DeclaredResource::Uav(r) => &mut r.base,
            DeclaredResource::CBuffer(c) => &mut c.base,
            DeclaredResource::Sampler(s) => &mut s.base,
        }
    }
}

/// How many registers a (possibly multi-dimensional) array of resources spans.
fn range_size(ty: &HlslType) -> RangeSize {
    match ty {
        HlslType::Array { len: None, .. } => RangeSize::Unbounded,
        HlslType::Array {
            element,
            len: Some(len),
        } => match range_size(element) {
            RangeSize::Fixed(inner) => RangeSize::Fixed(len * inner),
            RangeSize::Unbounded => RangeSize::Unbounded,
        },
        _ => RangeSize::Fixed(1),
    }
}

/// Applies `register(...)` annotations to a resource binding. `packoffset` is rejected.
pub fn apply_register_annotations(base: &mut ResourceBase, annotations: &[UnusualAnnotation], diags: &mut Diagnostics) {
    for annotation in annotations {
        match annotation {
            UnusualAnnotation::RegisterAssignment {
                class,
                register,
                space,
                location,
            } => {
                let expected = register_letter(base.class());
                if expected != Some(class.to_ascii_lowercase()) {
                    diags.error(
                        *location,
                        format!(
                            "register type '{}' does not match {:?} resource '{}'",
                            class,
                            base.class(),
                            base.global_name
                        ),
                    );
                    continue;
                }
                base.lower_bound = LowerBound::Bound(*register);
                base.space_id = *space;
            }
            UnusualAnnotation::ConstantPacking { location, .. } => {
                diags.error(*location, "packoffset is only allowed within a constant buffer")
            }
            UnusualAnnotation::SemanticDecl { .. } => {}
        }
    }
}

/// Builds the descriptor for a global resource variable.
///
/// Constant buffer sizes are left at zero; they depend on the layout of the element type.
pub fn declare_resource(var: &VarDecl, diags: &mut Diagnostics) -> Option<DeclaredResource> {
    let (keyword, element) = match var.ty.resource_type() {
        Some(HlslType::Resource { keyword, element }) => (keyword.as_str(), element.as_deref()),
        _ => {
            diags.error(var.location, format!("'{}' is not a resource", var.name));
            return None;
        }
    };

    let class = keyword_to_class(keyword);
    let kind = keyword_to_kind(keyword);
    if var.globally_coherent && class != ResourceClass::UAV {
        diags.error(var.location, "globallycoherent can only be used with UAVs");
    }

    let mut declared = match class {
        ResourceClass::SRV | ResourceClass::UAV => {
            let mut res = if class == ResourceClass::SRV {
                Resource::new_srv(kind)
            } else {
                Resource::new_uav(kind)
            };
            match (kind, element) {
                (ResourceKind::StructuredBuffer, Some(element)) => res.element_stride = natural_size(element),
                (ResourceKind::RawBuffer, _) => {}
                (_, Some(element)) => {
                    res.comp_type = element
                        .element_scalar_kind()
                        .map_or(res.comp_type, |s| s.comp_type())
                }
                (_, None) => {}
            }
            if class == ResourceClass::UAV {
                res.globally_coherent = var.globally_coherent;
                res.has_counter = keyword.starts_with("Append") || keyword.starts_with("Consume");
                res.rov = keyword.starts_with("RasterizerOrdered");
                DeclaredResource::Uav(res)
            } else {
                DeclaredResource::Srv(res)
            }
        }
        ResourceClass::CBuffer => DeclaredResource::CBuffer(CBuffer::new(0)),
        ResourceClass::Sampler => DeclaredResource::Sampler(Sampler::new(keyword_to_sampler_kind(keyword))),
        ResourceClass::Invalid => {
            diags.error(var.location, format!("unknown resource type '{}'", keyword));
            return None;
        }
    };

    let base = declared.base_mut();
    base.global_name = var.name.clone();
    base.range_size = range_size(&var.ty);
    apply_register_annotations(base, &var.annotations, diags);
    log::trace!("declared {:?} resource {} ({:?})", class, var.name, kind);
    Some(declared)
}

/// Gives every unallocated resource the first register range in its space that no other
/// resource of the list occupies. Unbounded ranges go after everything else in their space.
///
/// Returns the ids of resources no range could be found for.
pub fn allocate_bindings<T: ResourceLike>(resources: &mut [T]) -> Vec<u32> {
    let mut occupied: BTreeMap<u32, Vec<(u64, u64)>> = BTreeMap::new();
    for res in resources.iter() {
        let base = res.base();
        if let LowerBound::Bound(lb) = base.lower_bound {
            let end = match base.range_size {
                RangeSize::Fixed(size) => lb as u64 + size.max(1) as u64,
                RangeSize::Unbounded => u64::MAX,
            };
            occupied.entry(base.space_id).or_default().push((lb as u64, end));
        }
    }

    // Fixed ranges are placed before any unbounded one.
    let mut failed = Vec::new();
    for unbounded_pass in [false, true] {
        for res in resources.iter_mut() {
            let base = res.base();
            if base.lower_bound.is_allocated() || (base.range_size == RangeSize::Unbounded) != unbounded_pass {
                continue;
            }
            let space = base.space_id;
            let ranges = occupied.entry(space).or_default();
            ranges.sort_unstable();
            let (start, end) = match base.range_size {
                RangeSize::Unbounded => {
                    let start = ranges.iter().map(|(_, end)| *end).max().unwrap_or(0);
                    (start, u64::MAX)
                }
                RangeSize::Fixed(size) => {
                    let size = size.max(1) as u64;
                    let mut start = 0u64;
                    for (lo, hi) in ranges.iter() {
                        if start + size <= *lo {
                            break;
                        }
                        start = start.max(*hi);
                    }
                    (start, start.saturating_add(size))
                }
            };
            if start >= u32::MAX as u64 {
                failed.push(res.id());
                continue;
            }
            log::trace!("allocated register {} in space {} for resource {}", start, space, res.id());
            res.base_mut().lower_bound = LowerBound::Bound(start as u32);
            ranges.push((start, end));
        }
    }
    failed
}

pub const HANDLE_TYPE_NAME: &str = "dx.types.Handle";

pub fn handle_type(module: &mut Module) -> Handle<Type> {
    let i8_ty = module.int_type(8);
    let ptr = module.pointer_type(i8_ty);
    module.struct_type(HANDLE_TYPE_NAME, vec![ptr])
}

/// A `dx.op.createHandle(CreateHandle, class, id, index, non_uniform = false)` call,
/// declaring the intrinsic if needed.
pub fn create_handle_call(module: &mut Module, class: ResourceClass, id: u32, index: Handle<Value>) -> Instruction {
    let handle_ty = handle_type(module);
    let i32_ty = module.int_type(32);
    let i8_ty = module.int_type(8);
    let i1_ty = module.int_type(1);
    let callee = module.declare_function(CREATE_HANDLE_NAME, handle_ty, &[i32_ty, i8_ty, i32_ty, i32_ty, i1_ty]);
    let args = vec![
        module.const_i32(OpCode::CreateHandle as u32),
        module.const_i8(class as u8),
        module.const_i32(id),
        index,
        module.const_i1(false),
    ];
    Instruction::Call { callee, args }
}

/// Turns every load of a resource global into a handle creation for resource `id`.
///
/// Loads through an element pointer of a resource array use the element index.
pub fn replace_resource_loads(module: &mut Module, global: Handle<GlobalVariable>, class: ResourceClass, id: u32) {
    let value = module.global_value(global);
    let handle_ty = handle_type(module);
    for user in module.users(value) {
        match module.instruction(user).cloned() {
            Some(Instruction::Load { pointer }) if pointer == value => {
                let index = module.const_i32(0);
                let call = create_handle_call(module, class, id, index);
                module.replace_instruction(user, handle_ty, call);
            }
            Some(Instruction::GetElementPtr { base, indices }) if base == value => {
                let index = match indices.last() {
                    Some(index) => *index,
                    None => module.const_i32(0),
                };
                for load in module.users(user) {
                    if matches!(module.instruction(load), Some(Instruction::Load { pointer }) if *pointer == user) {
                        let call = create_handle_call(module, class, id, index);
                        module.replace_instruction(load, handle_ty, call);
                    }
                }
            }
            _ => log::warn!(
                "resource {} is used by something other than a load, leaving it",
                module.global(global).name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_tables() {
        assert_eq!(keyword_to_class("RasterizerOrderedTexture2D"), ResourceClass::UAV);
        assert_eq!(keyword_to_kind("RasterizerOrderedTexture2D"), ResourceKind::Texture2D);
        assert_eq!(keyword_to_kind("AppendStructuredBuffer"), ResourceKind::StructuredBuffer);
        assert_eq!(keyword_to_class("texture2d"), ResourceClass::Invalid);
        assert_eq!(keyword_to_sampler_kind("SamplerComparisonState"), SamplerKind::Comparison);
        assert_eq!(keyword_to_sampler_kind("Texture2D"), SamplerKind::Invalid);
    }

    #[test]
    fn unbounded_ranges_go_last() {
        let mut explicit = Resource::new_srv(ResourceKind::Texture2D);
        explicit.base.lower_bound = LowerBound::Bound(2);
        explicit.base.range_size = RangeSize::Fixed(2);
        let mut unbounded = Resource::new_srv(ResourceKind::Texture2D);
        unbounded.base.range_size = RangeSize::Unbounded;
        let single = Resource::new_srv(ResourceKind::Texture2D);
        let mut list = vec![explicit, unbounded, single];
        assert!(allocate_bindings(&mut list).is_empty());
        assert_eq!(list[1].base.lower_bound, LowerBound::Bound(4));
        // The single register fits below the explicit range.
        assert_eq!(list[2].base.lower_bound, LowerBound::Bound(0));
    }

    #[test]
    fn unbounded_range_declared_first() {
        let mut unbounded = Resource::new_srv(ResourceKind::Texture2D);
        unbounded.base.range_size = RangeSize::Unbounded;
        let mut array = Resource::new_srv(ResourceKind::Texture2D);
        array.base.range_size = RangeSize::Fixed(3);
        let single = Resource::new_srv(ResourceKind::Texture2D);
        let mut list = vec![unbounded, array, single];
        assert!(allocate_bindings(&mut list).is_empty());
        assert_eq!(list[1].base.lower_bound, LowerBound::Bound(0));
        assert_eq!(list[2].base.lower_bound, LowerBound::Bound(3));
        assert_eq!(list[0].base.lower_bound, LowerBound::Bound(4));
    }
}
