//! The fixed table of shader models (`ps_6_0`, `cs_5_1` ...).

use lazy_static::lazy_static;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res},
    sequence::tuple,
    IResult,
};
use thiserror::Error;

use super::constants::ShaderKind;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderModel {
    kind: ShaderKind,
    major: u32,
    minor: u32,
    name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShaderModelParseError {
    #[error("'{0}' is not a shader model name")]
    BadName(String),
    #[error("shader model {0} does not exist")]
    Unknown(String),
}

const VERSIONS: [(u32, u32); 6] = [(4, 0), (4, 1), (5, 0), (5, 1), (6, 0), (6, 1)];

lazy_static! {
    static ref SHADER_MODELS: Vec<ShaderModel> = {
        let kinds = [
            ShaderKind::Pixel,
            ShaderKind::Vertex,
            ShaderKind::Geometry,
            ShaderKind::Hull,
            ShaderKind::Domain,
            ShaderKind::Compute,
        ];
        let mut models = Vec::new();
        for kind in kinds {
            for (major, minor) in VERSIONS {
                // Tessellation stages arrived with SM 5.0
                if matches!(kind, ShaderKind::Hull | ShaderKind::Domain) && major < 5 {
                    continue;
                }
                models.push(ShaderModel {
                    kind,
                    major,
                    minor,
                    name: format!("{}_{}_{}", kind_prefix(kind), major, minor),
                });
            }
        }
        models
    };
}

pub fn kind_prefix(kind: ShaderKind) -> &'static str {
    match kind {
        ShaderKind::Pixel => "ps",
        ShaderKind::Vertex => "vs",
        ShaderKind::Geometry => "gs",
        ShaderKind::Hull => "hs",
        ShaderKind::Domain => "ds",
        ShaderKind::Compute => "cs",
        ShaderKind::Invalid => "invalid",
    }
}

pub fn kind_from_prefix(prefix: &str) -> Option<ShaderKind> {
    match prefix {
        "ps" => Some(ShaderKind::Pixel),
        "vs" => Some(ShaderKind::Vertex),
        "gs" => Some(ShaderKind::Geometry),
        "hs" => Some(ShaderKind::Hull),
        "ds" => Some(ShaderKind::Domain),
        "cs" => Some(ShaderKind::Compute),
        _ => None,
    }
}

fn parse_version_number(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse::<u32>)(input)
}

fn parse_name(input: &str) -> IResult<&str, (&str, u32, u32)> {
    let (rest, (prefix, _, major, _, minor)) = all_consuming(tuple((
        alt((tag("ps"), tag("vs"), tag("gs"), tag("hs"), tag("ds"), tag("cs"))),
        char('_'),
        parse_version_number,
        char('_'),
        parse_version_number,
    )))(input)?;
    Ok((rest, (prefix, major, minor)))
}

impl ShaderModel {
    pub fn get(kind: ShaderKind, major: u32, minor: u32) -> Option<&'static ShaderModel> {
        SHADER_MODELS
            .iter()
            .find(|sm| sm.kind == kind && sm.major == major && sm.minor == minor)
    }

    /// Looks up a model from its profile name, e.g. `"cs_6_0"`.
    pub fn get_by_name(name: &str) -> Result<&'static ShaderModel, ShaderModelParseError> {
        let (_, (prefix, major, minor)) =
            parse_name(name).map_err(|_| ShaderModelParseError::BadName(name.to_owned()))?;
        // parse_name only accepts known prefixes
        let kind = kind_from_prefix(prefix).ok_or_else(|| ShaderModelParseError::BadName(name.to_owned()))?;
        Self::get(kind, major, minor).ok_or_else(|| ShaderModelParseError::Unknown(name.to_owned()))
    }

    pub fn all() -> &'static [ShaderModel] {
        SHADER_MODELS.as_slice()
    }

    pub fn kind(&self) -> ShaderKind {
        self.kind
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind_name(&self) -> &'static str {
        kind_prefix(self.kind)
    }

    pub fn is_valid_for_dxil(&self) -> bool {
        self.major >= 6
    }

    /// The DXIL version a module targeting this model carries.
    pub fn dxil_version(&self) -> (u32, u32) {
        if self.major >= 6 {
            (1, self.minor)
        } else {
            (1, 0)
        }
    }

    pub fn is_ps(&self) -> bool {
        self.kind == ShaderKind::Pixel
    }
    pub fn is_vs(&self) -> bool {
        self.kind == ShaderKind::Vertex
    }
    pub fn is_gs(&self) -> bool {
        self.kind == ShaderKind::Geometry
    }
    pub fn is_hs(&self) -> bool {
        self.kind == ShaderKind::Hull
    }
    pub fn is_ds(&self) -> bool {
        self.kind == ShaderKind::Domain
    }
    pub fn is_cs(&self) -> bool {
        self.kind == ShaderKind::Compute
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names() {
        let sm = ShaderModel::get_by_name("ps_6_0").unwrap();
        assert_eq!(sm.kind(), ShaderKind::Pixel);
        assert_eq!((sm.major(), sm.minor()), (6, 0));
        assert_eq!(sm.dxil_version(), (1, 0));
        assert_eq!(ShaderModel::get_by_name("cs_6_1").unwrap().dxil_version(), (1, 1));
        assert!(matches!(ShaderModel::get_by_name("hs_4_0"), Err(ShaderModelParseError::Unknown(_))));
        assert!(matches!(ShaderModel::get_by_name("xs_6_0"), Err(ShaderModelParseError::BadName(_))));
        assert!(matches!(ShaderModel::get_by_name("ps_6_0x"), Err(ShaderModelParseError::BadName(_))));
    }
}
