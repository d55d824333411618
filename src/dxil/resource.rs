//! Descriptors for shader resources: SRVs, UAVs, constant buffers and samplers.

use crate::ir::{GlobalVariable, Handle};

use super::constants::{ComponentType, ResourceClass, ResourceKind, SamplerKind};

/// Register a resource range starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LowerBound {
    Bound(u32),
    /// Not yet assigned; binding allocation picks a register.
    Unallocated,
}
impl LowerBound {
    /// Decodes the metadata form, where `u32::MAX` marks an unallocated binding.
    pub fn from_raw(raw: u32) -> Self {
        if raw == u32::MAX {
            LowerBound::Unallocated
        } else {
            LowerBound::Bound(raw)
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            LowerBound::Bound(v) => v,
            LowerBound::Unallocated => u32::MAX,
        }
    }

    pub fn get(self) -> Option<u32> {
        match self {
            LowerBound::Bound(v) => Some(v),
            LowerBound::Unallocated => None,
        }
    }

    pub fn is_allocated(self) -> bool {
        matches!(self, LowerBound::Bound(_))
    }
}

/// Number of registers a resource range spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeSize {
    Fixed(u32),
    /// An unsized array of resources.
    Unbounded,
}
impl RangeSize {
    pub fn from_raw(raw: u32) -> Self {
        if raw == u32::MAX {
            RangeSize::Unbounded
        } else {
            RangeSize::Fixed(raw)
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            RangeSize::Fixed(v) => v,
            RangeSize::Unbounded => u32::MAX,
        }
    }
}

/// Identity shared by every resource class.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBase {
    id: u32,
    class: ResourceClass,
    kind: ResourceKind,
    pub lower_bound: LowerBound,
    pub space_id: u32,
    pub range_size: RangeSize,
    /// Backing storage; owned by the IR module.
    pub global_symbol: Option<Handle<GlobalVariable>>,
    pub global_name: String,
}

impl ResourceBase {
    pub fn new(class: ResourceClass, kind: ResourceKind) -> Self {
        Self {
            id: 0,
            class,
            kind,
            lower_bound: LowerBound::Unallocated,
            space_id: 0,
            range_size: RangeSize::Fixed(1),
            global_symbol: None,
            global_name: String::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Set by [super::DxilModule] when the resource is added to a collection.
    pub(crate) fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn class(&self) -> ResourceClass {
        self.class
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: ResourceKind) {
        self.kind = kind;
    }

    /// Last register covered by the range, if it is bounded and allocated.
    pub fn upper_bound(&self) -> Option<u32> {
        match (self.lower_bound, self.range_size) {
            (LowerBound::Bound(lb), RangeSize::Fixed(size)) => Some(lb + size.max(1) - 1),
            _ => None,
        }
    }
}

/// Access to the common identity of a concrete resource type.
pub trait ResourceLike {
    fn base(&self) -> &ResourceBase;
    fn base_mut(&mut self) -> &mut ResourceBase;

    fn id(&self) -> u32 {
        self.base().id()
    }
}

/// A shader resource view or unordered access view.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub base: ResourceBase,
    pub comp_type: ComponentType,
    pub sample_count: u32,
    pub element_stride: u32,
    pub globally_coherent: bool,
    pub has_counter: bool,
    pub rov: bool,
}

impl Resource {
    pub fn new_srv(kind: ResourceKind) -> Self {
        Self::new(ResourceClass::SRV, kind)
    }

    pub fn new_uav(kind: ResourceKind) -> Self {
        Self::new(ResourceClass::UAV, kind)
    }

    fn new(class: ResourceClass, kind: ResourceKind) -> Self {
        Self {
            base: ResourceBase::new(class, kind),
            comp_type: ComponentType::Invalid,
            sample_count: 0,
            element_stride: 0,
            globally_coherent: false,
            has_counter: false,
            rov: false,
        }
    }

    pub fn is_uav(&self) -> bool {
        self.base.class() == ResourceClass::UAV
    }

    pub fn kind(&self) -> ResourceKind {
        self.base.kind()
    }
}

impl ResourceLike for Resource {
    fn base(&self) -> &ResourceBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sampler {
    pub base: ResourceBase,
    pub sampler_kind: SamplerKind,
}

impl Sampler {
    pub fn new(sampler_kind: SamplerKind) -> Self {
        Self {
            base: ResourceBase::new(ResourceClass::Sampler, ResourceKind::Sampler),
            sampler_kind,
        }
    }
}

impl ResourceLike for Sampler {
    fn base(&self) -> &ResourceBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }
}

/// A constant buffer after its layout has been finalized.
///
/// The constants it was built from live in [crate::hlsl::cbuffer::CBufferBuilder];
/// by the time a `CBuffer` exists only its total byte size remains.
#[derive(Debug, Clone, PartialEq)]
pub struct CBuffer {
    pub base: ResourceBase,
    pub size: u32,
}

impl CBuffer {
    pub fn new(size: u32) -> Self {
        Self {
            base: ResourceBase::new(ResourceClass::CBuffer, ResourceKind::CBuffer),
            size,
        }
    }
}

impl ResourceLike for CBuffer {
    fn base(&self) -> &ResourceBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }
}
