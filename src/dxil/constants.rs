//! Numeric enums shared by the DXIL model and its metadata encoding.
//!
//! Discriminants are part of the metadata contract: they are written as integers and read
//! back through [num_traits::FromPrimitive], so they must never be renumbered.

pub const DXIL_MAJOR: u32 = 1;
pub const DXIL_MINOR: u32 = 0;

/// Upper bound for `maxtessfactor`, used when a hull shader doesn't specify one.
pub const HS_MAX_TESS_FACTOR_UPPER_BOUND: f32 = 64.0;
pub const MAX_GS_OUTPUT_STREAMS: usize = 4;
pub const MAX_CONTROL_POINTS: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ShaderKind {
    Pixel = 0,
    Vertex = 1,
    Geometry = 2,
    Hull = 3,
    Domain = 4,
    Compute = 5,
    Invalid = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ComponentType {
    Invalid = 0,
    I1 = 1,
    I16 = 2,
    U16 = 3,
    I32 = 4,
    U32 = 5,
    I64 = 6,
    U64 = 7,
    F16 = 8,
    F32 = 9,
    F64 = 10,
    SNormF16 = 11,
    UNormF16 = 12,
    SNormF32 = 13,
    UNormF32 = 14,
    SNormF64 = 15,
    UNormF64 = 16,
}
impl ComponentType {
    pub fn is_64_bit(&self) -> bool {
        matches!(
            self,
            ComponentType::I64
                | ComponentType::U64
                | ComponentType::F64
                | ComponentType::SNormF64
                | ComponentType::UNormF64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(
            self,
            ComponentType::F16
                | ComponentType::F32
                | ComponentType::F64
                | ComponentType::SNormF16
                | ComponentType::UNormF16
                | ComponentType::SNormF32
                | ComponentType::UNormF32
                | ComponentType::SNormF64
                | ComponentType::UNormF64
        )
    }

    /// The snorm flavour of a float type, or the type unchanged.
    pub fn to_snorm(self) -> Self {
        match self {
            ComponentType::F16 => ComponentType::SNormF16,
            ComponentType::F32 => ComponentType::SNormF32,
            ComponentType::F64 => ComponentType::SNormF64,
            other => other,
        }
    }

    pub fn to_unorm(self) -> Self {
        match self {
            ComponentType::F16 => ComponentType::UNormF16,
            ComponentType::F32 => ComponentType::UNormF32,
            ComponentType::F64 => ComponentType::UNormF64,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum InterpolationMode {
    Undefined = 0,
    Constant = 1,
    Linear = 2,
    LinearCentroid = 3,
    LinearNoperspective = 4,
    LinearNoperspectiveCentroid = 5,
    LinearSample = 6,
    LinearNoperspectiveSample = 7,
    Invalid = 8,
}
impl InterpolationMode {
    /// Combines the individual HLSL interpolation modifiers into one mode.
    pub fn from_modifiers(no_interpolation: bool, linear: bool, no_perspective: bool, centroid: bool, sample: bool) -> Self {
        if no_interpolation {
            if linear || no_perspective || centroid || sample {
                return InterpolationMode::Invalid;
            }
            return InterpolationMode::Constant;
        }
        if !(linear || no_perspective || centroid || sample) {
            return InterpolationMode::Undefined;
        }
        if centroid && sample {
            return InterpolationMode::Invalid;
        }
        match (no_perspective, centroid, sample) {
            (false, false, false) => InterpolationMode::Linear,
            (false, true, false) => InterpolationMode::LinearCentroid,
            (false, false, true) => InterpolationMode::LinearSample,
            (true, false, false) => InterpolationMode::LinearNoperspective,
            (true, true, false) => InterpolationMode::LinearNoperspectiveCentroid,
            (true, false, true) => InterpolationMode::LinearNoperspectiveSample,
            _ => InterpolationMode::Invalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum SemanticKind {
    Arbitrary = 0,
    VertexID = 1,
    InstanceID = 2,
    Position = 3,
    RenderTargetArrayIndex = 4,
    ViewportArrayIndex = 5,
    ClipDistance = 6,
    CullDistance = 7,
    OutputControlPointID = 8,
    DomainLocation = 9,
    PrimitiveID = 10,
    GSInstanceID = 11,
    SampleIndex = 12,
    IsFrontFace = 13,
    Coverage = 14,
    InnerCoverage = 15,
    Target = 16,
    Depth = 17,
    DepthLessEqual = 18,
    DepthGreaterEqual = 19,
    StencilRef = 20,
    DispatchThreadID = 21,
    GroupID = 22,
    GroupIndex = 23,
    GroupThreadID = 24,
    TessFactor = 25,
    InsideTessFactor = 26,
    ViewID = 27,
    Barycentrics = 28,
    Invalid = 29,
}
impl SemanticKind {
    /// Compute-only system values never appear in a signature.
    pub fn is_compute_only(&self) -> bool {
        matches!(
            self,
            SemanticKind::DispatchThreadID
                | SemanticKind::GroupID
                | SemanticKind::GroupIndex
                | SemanticKind::GroupThreadID
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    Input,
    Output,
    PatchConstant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ResourceClass {
    SRV = 0,
    UAV = 1,
    CBuffer = 2,
    Sampler = 3,
    Invalid = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ResourceKind {
    Invalid = 0,
    Texture1D = 1,
    Texture2D = 2,
    Texture2DMS = 3,
    Texture3D = 4,
    TextureCube = 5,
    Texture1DArray = 6,
    Texture2DArray = 7,
    Texture2DMSArray = 8,
    TextureCubeArray = 9,
    TypedBuffer = 10,
    RawBuffer = 11,
    StructuredBuffer = 12,
    CBuffer = 13,
    Sampler = 14,
    TBuffer = 15,
}
impl ResourceKind {
    pub fn is_texture(&self) -> bool {
        matches!(
            self,
            ResourceKind::Texture1D
                | ResourceKind::Texture2D
                | ResourceKind::Texture2DMS
                | ResourceKind::Texture3D
                | ResourceKind::TextureCube
                | ResourceKind::Texture1DArray
                | ResourceKind::Texture2DArray
                | ResourceKind::Texture2DMSArray
                | ResourceKind::TextureCubeArray
        )
    }

    pub fn is_multisampled(&self) -> bool {
        matches!(self, ResourceKind::Texture2DMS | ResourceKind::Texture2DMSArray)
    }

    pub fn is_raw_or_structured(&self) -> bool {
        matches!(self, ResourceKind::RawBuffer | ResourceKind::StructuredBuffer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum SamplerKind {
    Default = 0,
    Comparison = 1,
    Invalid = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum InputPrimitive {
    Undefined = 0,
    Point = 1,
    Line = 2,
    Triangle = 3,
    LineWithAdjacency = 6,
    TriangleWithAdjacency = 7,
}
impl InputPrimitive {
    /// Number of vertices the GS input array must hold for this primitive.
    pub fn vertex_count(&self) -> Option<u32> {
        match self {
            InputPrimitive::Point => Some(1),
            InputPrimitive::Line => Some(2),
            InputPrimitive::Triangle => Some(3),
            InputPrimitive::LineWithAdjacency => Some(4),
            InputPrimitive::TriangleWithAdjacency => Some(6),
            InputPrimitive::Undefined => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum PrimitiveTopology {
    Undefined = 0,
    PointList = 1,
    LineList = 2,
    LineStrip = 3,
    TriangleList = 4,
    TriangleStrip = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum TessellatorDomain {
    Undefined = 0,
    IsoLine = 1,
    Tri = 2,
    Quad = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum TessellatorPartitioning {
    Undefined = 0,
    Integer = 1,
    Pow2 = 2,
    FractionalOdd = 3,
    FractionalEven = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum TessellatorOutputPrimitive {
    Undefined = 0,
    Point = 1,
    Line = 2,
    TriangleCW = 3,
    TriangleCCW = 4,
}

/// How an entry function parameter participates in the stage interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum InputQualifier {
    In = 0,
    Out = 1,
    Inout = 2,
    InputPatch = 3,
    OutputPatch = 4,
    OutStream0 = 5,
    OutStream1 = 6,
    OutStream2 = 7,
    OutStream3 = 8,
    InputPrimitive = 9,
}
impl InputQualifier {
    pub fn out_stream(index: usize) -> Self {
        match index {
            0 => InputQualifier::OutStream0,
            1 => InputQualifier::OutStream1,
            2 => InputQualifier::OutStream2,
            3 => InputQualifier::OutStream3,
            _ => panic!("GS output stream index {} out of range", index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum MatrixOrientation {
    Undefined = 0,
    RowMajor = 1,
    ColumnMajor = 2,
}
