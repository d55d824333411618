//! Per-stage input, output and patch-constant signatures.

use nom::{
    character::complete::digit1,
    combinator::{all_consuming, map_res},
    IResult,
};
use phf::phf_map;

use super::constants::{ComponentType, InterpolationMode, SemanticKind, ShaderKind, SignatureKind};

/// Row or column that hasn't been packed yet.
pub const UNALLOCATED_ROW: i32 = -1;
pub const UNALLOCATED_COL: i8 = -1;

/// System-value semantic names, lower-cased.
static SYSTEM_VALUES: phf::Map<&'static str, SemanticKind> = phf_map! {
    "sv_vertexid" => SemanticKind::VertexID,
    "sv_instanceid" => SemanticKind::InstanceID,
    "sv_position" => SemanticKind::Position,
    "sv_rendertargetarrayindex" => SemanticKind::RenderTargetArrayIndex,
    "sv_viewportarrayindex" => SemanticKind::ViewportArrayIndex,
    "sv_clipdistance" => SemanticKind::ClipDistance,
    "sv_culldistance" => SemanticKind::CullDistance,
    "sv_outputcontrolpointid" => SemanticKind::OutputControlPointID,
    "sv_domainlocation" => SemanticKind::DomainLocation,
    "sv_primitiveid" => SemanticKind::PrimitiveID,
    "sv_gsinstanceid" => SemanticKind::GSInstanceID,
    "sv_sampleindex" => SemanticKind::SampleIndex,
    "sv_isfrontface" => SemanticKind::IsFrontFace,
    "sv_coverage" => SemanticKind::Coverage,
    "sv_innercoverage" => SemanticKind::InnerCoverage,
    "sv_target" => SemanticKind::Target,
    "sv_depth" => SemanticKind::Depth,
    "sv_depthlessequal" => SemanticKind::DepthLessEqual,
    "sv_depthgreaterequal" => SemanticKind::DepthGreaterEqual,
    "sv_stencilref" => SemanticKind::StencilRef,
    "sv_dispatchthreadid" => SemanticKind::DispatchThreadID,
    "sv_groupid" => SemanticKind::GroupID,
    "sv_groupindex" => SemanticKind::GroupIndex,
    "sv_groupthreadid" => SemanticKind::GroupThreadID,
    "sv_tessfactor" => SemanticKind::TessFactor,
    "sv_insidetessfactor" => SemanticKind::InsideTessFactor,
    "sv_viewid" => SemanticKind::ViewID,
    "sv_barycentrics" => SemanticKind::Barycentrics,
};

fn parse_index(input: &str) -> IResult<&str, u32> {
    all_consuming(map_res(digit1, str::parse::<u32>))(input)
}

/// Splits `TEXCOORD3` into `("TEXCOORD", 3)`. A missing index is 0.
pub fn split_semantic(semantic: &str) -> (&str, u32) {
    let name_len = semantic.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let (name, digits) = semantic.split_at(name_len);
    if name.is_empty() {
        return (semantic, 0);
    }
    match parse_index(digits) {
        Ok((_, index)) => (name, index),
        Err(_) => (name, 0),
    }
}

/// Maps a semantic name (without index) to its kind. Anything not `SV_` is [SemanticKind::Arbitrary].
pub fn semantic_kind_from_name(name: &str) -> SemanticKind {
    let lower = name.to_ascii_lowercase();
    match SYSTEM_VALUES.get(lower.as_str()) {
        Some(kind) => *kind,
        None if lower.starts_with("sv_") => SemanticKind::Invalid,
        None => SemanticKind::Arbitrary,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureElement {
    id: u32,
    pub semantic_kind: SemanticKind,
    pub semantic_name: String,
    /// One semantic index per row.
    pub semantic_indices: Vec<u32>,
    pub interpolation_mode: InterpolationMode,
    pub comp_type: ComponentType,
    pub rows: u32,
    pub cols: u8,
    pub start_row: i32,
    pub start_col: i8,
    /// GS output stream, 0..=3.
    pub output_stream: u8,
    /// Components accessed with a dynamic index.
    pub dyn_index_mask: u8,
}

impl SignatureElement {
    pub fn new(semantic_name: &str, semantic_kind: SemanticKind, comp_type: ComponentType, rows: u32, cols: u8) -> Self {
        Self {
            id: 0,
            semantic_kind,
            semantic_name: semantic_name.to_owned(),
            semantic_indices: (0..rows).collect(),
            interpolation_mode: InterpolationMode::Undefined,
            comp_type,
            rows,
            cols,
            start_row: UNALLOCATED_ROW,
            start_col: UNALLOCATED_COL,
            output_stream: 0,
            dyn_index_mask: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn semantic_index(&self) -> u32 {
        self.semantic_indices.first().copied().unwrap_or(0)
    }

    pub fn is_allocated(&self) -> bool {
        self.start_row != UNALLOCATED_ROW && self.start_col != UNALLOCATED_COL
    }

    fn overlaps(&self, other: &SignatureElement) -> bool {
        if !self.is_allocated() || !other.is_allocated() {
            return false;
        }
        let rows_overlap = self.start_row < other.start_row + other.rows as i32
            && other.start_row < self.start_row + self.rows as i32;
        let cols_overlap = self.start_col < other.start_col + other.cols as i8
            && other.start_col < self.start_col + self.cols as i8;
        rows_overlap && cols_overlap
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    kind: SignatureKind,
    shader_kind: ShaderKind,
    elements: Vec<SignatureElement>,
}

impl Signature {
    pub fn new(shader_kind: ShaderKind, kind: SignatureKind) -> Self {
        Self {
            kind,
            shader_kind,
            elements: Vec::new(),
        }
    }

    pub fn kind(&self) -> SignatureKind {
        self.kind
    }

    pub fn shader_kind(&self) -> ShaderKind {
        self.shader_kind
    }

    /// Appends an element, giving it the next id. Returns that id.
    pub fn append_element(&mut self, mut element: SignatureElement) -> u32 {
        let id = self.elements.len() as u32;
        element.id = id;
        self.elements.push(element);
        id
    }

    pub fn elements(&self) -> &[SignatureElement] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [SignatureElement] {
        &mut self.elements
    }

    pub fn element(&self, id: u32) -> Option<&SignatureElement> {
        self.elements.get(id as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn has_semantic(&self, kind: SemanticKind) -> bool {
        self.elements.iter().any(|e| e.semantic_kind == kind)
    }

    /// Ids of the first two packed elements that share a component, if any.
    pub fn find_overlap(&self) -> Option<(u32, u32)> {
        for (i, a) in self.elements.iter().enumerate() {
            for b in &self.elements[i + 1..] {
                if a.overlaps(b) {
                    return Some((a.id, b.id));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_names() {
        assert_eq!(split_semantic("TEXCOORD3"), ("TEXCOORD", 3));
        assert_eq!(split_semantic("SV_Target"), ("SV_Target", 0));
        assert_eq!(split_semantic("SV_Target7"), ("SV_Target", 7));
        assert_eq!(semantic_kind_from_name("SV_POSITION"), SemanticKind::Position);
        assert_eq!(semantic_kind_from_name("COLOR"), SemanticKind::Arbitrary);
        assert_eq!(semantic_kind_from_name("SV_Bogus"), SemanticKind::Invalid);
    }

    #[test]
    fn overlap_detection() {
        let mut sig = Signature::new(ShaderKind::Vertex, SignatureKind::Output);
        let mut a = SignatureElement::new("A", SemanticKind::Arbitrary, ComponentType::F32, 1, 2);
        a.start_row = 0;
        a.start_col = 0;
        let mut b = SignatureElement::new("B", SemanticKind::Arbitrary, ComponentType::F32, 1, 2);
        b.start_row = 0;
        b.start_col = 2;
        sig.append_element(a);
        sig.append_element(b);
        assert_eq!(sig.find_overlap(), None);
        let mut c = SignatureElement::new("C", SemanticKind::Arbitrary, ComponentType::F32, 2, 1);
        c.start_row = 0;
        c.start_col = 3;
        sig.append_element(c);
        assert_eq!(sig.find_overlap(), Some((1, 2)));
    }
}
