//! The front-end declarations the lowering consumes.
//!
//! These are the already-parsed and type-checked forms of HLSL globals, cbuffer blocks and
//! functions. Grammar-level legality (e.g. an attribute appearing twice) is assumed to have
//! been enforced upstream.

use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::diag::SourceLocation;
use crate::dxil::constants::{ComponentType, InterpolationMode, MatrixOrientation, PrimitiveTopology};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    Uint,
    /// Without native low precision `half` is a 32-bit float.
    Half,
    Float,
    Double,
    Int64,
    Uint64,
    Min16Float,
    Min16Int,
    Min16Uint,
}
impl ScalarKind {
    pub fn is_64_bit(&self) -> bool {
        matches!(self, ScalarKind::Double | ScalarKind::Int64 | ScalarKind::Uint64)
    }

    /// Bytes one component occupies in a constant buffer.
    pub fn size_in_bytes(&self) -> u32 {
        if self.is_64_bit() {
            8
        } else {
            4
        }
    }

    pub fn comp_type(&self) -> ComponentType {
        match self {
            ScalarKind::Bool => ComponentType::I1,
            ScalarKind::Int => ComponentType::I32,
            ScalarKind::Uint => ComponentType::U32,
            ScalarKind::Half | ScalarKind::Float => ComponentType::F32,
            ScalarKind::Double => ComponentType::F64,
            ScalarKind::Int64 => ComponentType::I64,
            ScalarKind::Uint64 => ComponentType::U64,
            ScalarKind::Min16Float => ComponentType::F16,
            ScalarKind::Min16Int => ComponentType::I16,
            ScalarKind::Min16Uint => ComponentType::U16,
        }
    }

    pub fn is_float(&self) -> bool {
        self.comp_type().is_float()
    }

    fn name(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Uint => "uint",
            ScalarKind::Half => "half",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::Int64 => "int64_t",
            ScalarKind::Uint64 => "uint64_t",
            ScalarKind::Min16Float => "min16float",
            ScalarKind::Min16Int => "min16int",
            ScalarKind::Min16Uint => "min16uint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchKind {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Point,
    Line,
    Triangle,
}
impl StreamKind {
    pub fn topology(&self) -> PrimitiveTopology {
        match self {
            StreamKind::Point => PrimitiveTopology::PointList,
            StreamKind::Line => PrimitiveTopology::LineStrip,
            StreamKind::Triangle => PrimitiveTopology::TriangleStrip,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HlslType {
    Scalar(ScalarKind),
    Vector(ScalarKind, u32),
    Matrix {
        element: ScalarKind,
        rows: u32,
        cols: u32,
        /// `None` when the declaration carries no `row_major`/`column_major`.
        orientation: Option<MatrixOrientation>,
    },
    Array {
        element: Box<HlslType>,
        /// `None` for an unsized array.
        len: Option<u32>,
    },
    Struct(Rc<StructDecl>),
    /// A texture, buffer or sampler object, named by its keyword (`RWTexture2D`, `SamplerState`...).
    Resource {
        keyword: String,
        element: Option<Box<HlslType>>,
    },
    Patch {
        kind: PatchKind,
        element: Box<HlslType>,
        count: u32,
    },
    Stream {
        kind: StreamKind,
        element: Box<HlslType>,
    },
}

impl HlslType {
    pub fn array(element: HlslType, len: u32) -> Self {
        HlslType::Array {
            element: Box::new(element),
            len: Some(len),
        }
    }

    pub fn resource(keyword: &str, element: Option<HlslType>) -> Self {
        HlslType::Resource {
            keyword: keyword.to_owned(),
            element: element.map(Box::new),
        }
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, HlslType::Resource { .. })
    }

    /// The resource type of a resource or an array of them.
    pub fn resource_type(&self) -> Option<&HlslType> {
        match self {
            HlslType::Resource { .. } => Some(self),
            HlslType::Array { element, .. } => element.resource_type(),
            _ => None,
        }
    }

    /// Component kind of a scalar, vector or matrix.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            HlslType::Scalar(s) | HlslType::Vector(s, _) => Some(*s),
            HlslType::Matrix { element, .. } => Some(*element),
            _ => None,
        }
    }

    /// Component kind of this type, looking through arrays.
    pub fn element_scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            HlslType::Array { element, .. } => element.element_scalar_kind(),
            other => other.scalar_kind(),
        }
    }
}

impl Display for HlslType {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            HlslType::Scalar(s) => write!(f, "{}", s.name()),
            HlslType::Vector(s, n) => write!(f, "{}{}", s.name(), n),
            HlslType::Matrix { element, rows, cols, .. } => write!(f, "{}{}x{}", element.name(), rows, cols),
            HlslType::Array { element, len: Some(len) } => write!(f, "{}[{}]", element, len),
            HlslType::Array { element, len: None } => write!(f, "{}[]", element),
            HlslType::Struct(decl) => write!(f, "{}", decl.name),
            HlslType::Resource { keyword, element: Some(e) } => write!(f, "{}<{}>", keyword, e),
            HlslType::Resource { keyword, element: None } => write!(f, "{}", keyword),
            HlslType::Patch { kind, element, count } => {
                let keyword = match kind {
                    PatchKind::Input => "InputPatch",
                    PatchKind::Output => "OutputPatch",
                };
                write!(f, "{}<{}, {}>", keyword, element, count)
            }
            HlslType::Stream { kind, element } => {
                let keyword = match kind {
                    StreamKind::Point => "PointStream",
                    StreamKind::Line => "LineStream",
                    StreamKind::Triangle => "TriangleStream",
                };
                write!(f, "{}<{}>", keyword, element)
            }
        }
    }
}

/// `nointerpolation`, `linear`, `noperspective`, `centroid` and `sample`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InterpolationModifiers {
    pub nointerpolation: bool,
    pub linear: bool,
    pub noperspective: bool,
    pub centroid: bool,
    pub sample: bool,
}
impl InterpolationModifiers {
    pub fn mode(&self) -> InterpolationMode {
        InterpolationMode::from_modifiers(
            self.nointerpolation,
            self.linear,
            self.noperspective,
            self.centroid,
            self.sample,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub bases: Vec<Rc<StructDecl>>,
    pub fields: Vec<FieldDecl>,
}

impl StructDecl {
    pub fn new(name: &str, fields: Vec<FieldDecl>) -> Self {
        Self {
            name: name.to_owned(),
            bases: Vec::new(),
            fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: HlslType,
    pub semantic: Option<String>,
    pub interpolation: InterpolationModifiers,
    pub precise: bool,
}

impl FieldDecl {
    pub fn new(name: &str, ty: HlslType) -> Self {
        Self {
            name: name.to_owned(),
            ty,
            semantic: None,
            interpolation: InterpolationModifiers::default(),
            precise: false,
        }
    }

    pub fn with_semantic(mut self, semantic: &str) -> Self {
        self.semantic = Some(semantic.to_owned());
        self
    }
}

/// Bindings and semantics written after a declarator, e.g. `: register(t3, space1)`.
#[derive(Debug, Clone, PartialEq)]
pub enum UnusualAnnotation {
    RegisterAssignment {
        /// `t`, `u`, `b`, `s` or `c`.
        class: char,
        register: u32,
        space: u32,
        location: SourceLocation,
    },
    /// `packoffset(c<register>.<component>)`.
    ConstantPacking {
        register: u32,
        component: u32,
        location: SourceLocation,
    },
    SemanticDecl {
        name: String,
        location: SourceLocation,
    },
}

impl UnusualAnnotation {
    pub fn location(&self) -> SourceLocation {
        match self {
            UnusualAnnotation::RegisterAssignment { location, .. }
            | UnusualAnnotation::ConstantPacking { location, .. }
            | UnusualAnnotation::SemanticDecl { location, .. } => *location,
        }
    }
}

/// The first semantic in an annotation list.
pub fn semantic_of(annotations: &[UnusualAnnotation]) -> Option<&str> {
    annotations.iter().find_map(|a| match a {
        UnusualAnnotation::SemanticDecl { name, .. } => Some(name.as_str()),
        _ => None,
    })
}

/// A global variable or a constant inside a cbuffer block.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: HlslType,
    pub annotations: Vec<UnusualAnnotation>,
    pub globally_coherent: bool,
    pub location: SourceLocation,
}

impl VarDecl {
    pub fn new(name: &str, ty: HlslType, location: SourceLocation) -> Self {
        Self {
            name: name.to_owned(),
            ty,
            annotations: Vec::new(),
            globally_coherent: false,
            location,
        }
    }

    pub fn with_annotation(mut self, annotation: UnusualAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CBufferDecl {
    pub name: String,
    pub constants: Vec<VarDecl>,
    pub annotations: Vec<UnusualAnnotation>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamDirection {
    In,
    Out,
    Inout,
}

/// Geometry shader input primitive modifiers on a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveModifier {
    Point,
    Line,
    LineAdj,
    Triangle,
    TriangleAdj,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub ty: HlslType,
    pub direction: ParamDirection,
    pub primitive: Option<PrimitiveModifier>,
    pub annotations: Vec<UnusualAnnotation>,
    pub interpolation: InterpolationModifiers,
    pub precise: bool,
    pub location: SourceLocation,
}

impl ParamDecl {
    pub fn new(name: &str, ty: HlslType, direction: ParamDirection, location: SourceLocation) -> Self {
        Self {
            name: name.to_owned(),
            ty,
            direction,
            primitive: None,
            annotations: Vec::new(),
            interpolation: InterpolationModifiers::default(),
            precise: false,
            location,
        }
    }

    pub fn with_semantic(mut self, semantic: &str) -> Self {
        self.annotations.push(UnusualAnnotation::SemanticDecl {
            name: semantic.to_owned(),
            location: self.location,
        });
        self
    }

    pub fn semantic(&self) -> Option<&str> {
        semantic_of(&self.annotations)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    NumThreads(u32, u32, u32),
    MaxVertexCount(u32),
    Instance(u32),
    PatchConstantFunc(String),
    Domain(String),
    Partitioning(String),
    OutputTopology(String),
    OutputControlPoints(u32),
    MaxTessFactor(f32),
    ClipPlanes(Vec<String>),
    EarlyDepthStencil,
}

impl AttributeKind {
    /// The attribute's spelling in source.
    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::NumThreads(..) => "numthreads",
            AttributeKind::MaxVertexCount(_) => "maxvertexcount",
            AttributeKind::Instance(_) => "instance",
            AttributeKind::PatchConstantFunc(_) => "patchconstantfunc",
            AttributeKind::Domain(_) => "domain",
            AttributeKind::Partitioning(_) => "partitioning",
            AttributeKind::OutputTopology(_) => "outputtopology",
            AttributeKind::OutputControlPoints(_) => "outputcontrolpoints",
            AttributeKind::MaxTessFactor(_) => "maxtessfactor",
            AttributeKind::ClipPlanes(_) => "clipplanes",
            AttributeKind::EarlyDepthStencil => "earlydepthstencil",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub kind: AttributeKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    /// `None` for `void`.
    pub return_type: Option<HlslType>,
    pub return_annotations: Vec<UnusualAnnotation>,
    pub return_interpolation: InterpolationModifiers,
    pub return_precise: bool,
    pub params: Vec<ParamDecl>,
    pub attributes: Vec<Attribute>,
    pub location: SourceLocation,
}

impl FunctionDecl {
    pub fn new(name: &str, location: SourceLocation) -> Self {
        Self {
            name: name.to_owned(),
            return_type: None,
            return_annotations: Vec::new(),
            return_interpolation: InterpolationModifiers::default(),
            return_precise: false,
            params: Vec::new(),
            attributes: Vec::new(),
            location,
        }
    }

    pub fn returning(mut self, ty: HlslType, semantic: Option<&str>) -> Self {
        self.return_type = Some(ty);
        if let Some(semantic) = semantic {
            self.return_annotations.push(UnusualAnnotation::SemanticDecl {
                name: semantic.to_owned(),
                location: self.location,
            });
        }
        self
    }

    pub fn with_param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_attribute(mut self, kind: AttributeKind, location: SourceLocation) -> Self {
        self.attributes.push(Attribute { kind, location });
        self
    }

    pub fn return_semantic(&self) -> Option<&str> {
        semantic_of(&self.return_annotations)
    }
}
