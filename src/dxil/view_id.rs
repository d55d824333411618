//! View-ID state: which outputs of a stage depend on `SV_ViewID`.
//!
//! Serialized as a flat list of `u32` words:
//!
//! ```text
//! [num_input_scalars,
//!  num_output_scalars[0..4],
//!  num_pc_scalars,
//!  output mask words for stream 0, 1, 2, 3,
//!  patch-constant mask words]
//! ```
//!
//! Each mask holds one bit per scalar, packed into `ceil(n / 32)` words.

use crate::dxil::constants::MAX_GS_OUTPUT_STREAMS;

use super::{
    constants::ShaderKind,
    error::{MetadataError, MetadataResult},
    signature::Signature,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewIdState {
    pub num_input_scalars: u32,
    pub num_output_scalars: [u32; MAX_GS_OUTPUT_STREAMS],
    pub num_pc_scalars: u32,
    outputs_dependent_on_view_id: [Vec<u32>; MAX_GS_OUTPUT_STREAMS],
    pc_outputs_dependent_on_view_id: Vec<u32>,
}

fn mask_words(scalars: u32) -> usize {
    ((scalars + 31) / 32) as usize
}

fn signature_scalars(sig: &Signature, stream: Option<u8>) -> u32 {
    sig.elements()
        .iter()
        .filter(|e| stream.map_or(true, |s| e.output_stream == s))
        .map(|e| e.rows * e.cols as u32)
        .sum()
}

impl ViewIdState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes the state from the stage's signatures. All dependency masks start clear.
    pub fn from_signatures(kind: ShaderKind, input: &Signature, output: &Signature, patch_constant: &Signature) -> Self {
        let mut state = ViewIdState {
            num_input_scalars: signature_scalars(input, None),
            ..Default::default()
        };
        if kind == ShaderKind::Geometry {
            for stream in 0..MAX_GS_OUTPUT_STREAMS {
                state.num_output_scalars[stream] = signature_scalars(output, Some(stream as u8));
            }
        } else {
            state.num_output_scalars[0] = signature_scalars(output, None);
        }
        if matches!(kind, ShaderKind::Hull | ShaderKind::Domain) {
            state.num_pc_scalars = signature_scalars(patch_constant, None);
        }
        state.resize_masks();
        state
    }

    fn resize_masks(&mut self) {
        for (mask, scalars) in self.outputs_dependent_on_view_id.iter_mut().zip(self.num_output_scalars) {
            mask.resize(mask_words(scalars), 0);
        }
        self.pc_outputs_dependent_on_view_id
            .resize(mask_words(self.num_pc_scalars), 0);
    }

    pub fn is_empty(&self) -> bool {
        self.num_input_scalars == 0
            && self.num_output_scalars.iter().all(|n| *n == 0)
            && self.num_pc_scalars == 0
    }

    pub fn set_output_depends_on_view_id(&mut self, stream: usize, scalar: u32) {
        assert!(scalar < self.num_output_scalars[stream], "scalar {} out of range", scalar);
        self.outputs_dependent_on_view_id[stream][(scalar / 32) as usize] |= 1 << (scalar % 32);
    }

    pub fn output_depends_on_view_id(&self, stream: usize, scalar: u32) -> bool {
        self.outputs_dependent_on_view_id[stream]
            .get((scalar / 32) as usize)
            .map_or(false, |w| w & (1 << (scalar % 32)) != 0)
    }

    pub fn set_pc_output_depends_on_view_id(&mut self, scalar: u32) {
        assert!(scalar < self.num_pc_scalars, "scalar {} out of range", scalar);
        self.pc_outputs_dependent_on_view_id[(scalar / 32) as usize] |= 1 << (scalar % 32);
    }

    pub fn pc_output_depends_on_view_id(&self, scalar: u32) -> bool {
        self.pc_outputs_dependent_on_view_id
            .get((scalar / 32) as usize)
            .map_or(false, |w| w & (1 << (scalar % 32)) != 0)
    }

    pub fn serialize(&self) -> Vec<u32> {
        let mut words = vec![self.num_input_scalars];
        words.extend_from_slice(&self.num_output_scalars);
        words.push(self.num_pc_scalars);
        for mask in &self.outputs_dependent_on_view_id {
            words.extend_from_slice(mask);
        }
        words.extend_from_slice(&self.pc_outputs_dependent_on_view_id);
        words
    }

    pub fn deserialize(words: &[u32]) -> MetadataResult<Self> {
        const HEADER: usize = 2 + MAX_GS_OUTPUT_STREAMS;
        if words.len() < HEADER {
            return Err(MetadataError::malformed(format!(
                "view id state has {} words, header needs {}",
                words.len(),
                HEADER
            )));
        }
        let mut state = ViewIdState {
            num_input_scalars: words[0],
            num_pc_scalars: words[HEADER - 1],
            ..Default::default()
        };
        state
            .num_output_scalars
            .copy_from_slice(&words[1..1 + MAX_GS_OUTPUT_STREAMS]);

        let expected = HEADER
            + state.num_output_scalars.iter().map(|n| mask_words(*n)).sum::<usize>()
            + mask_words(state.num_pc_scalars);
        if words.len() != expected {
            return Err(MetadataError::malformed(format!(
                "view id state has {} words, expected {}",
                words.len(),
                expected
            )));
        }

        let mut rest = &words[HEADER..];
        for stream in 0..MAX_GS_OUTPUT_STREAMS {
            let n = mask_words(state.num_output_scalars[stream]);
            state.outputs_dependent_on_view_id[stream] = rest[..n].to_vec();
            rest = &rest[n..];
        }
        state.pc_outputs_dependent_on_view_id = rest.to_vec();
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_round_trip() {
        let mut state = ViewIdState {
            num_input_scalars: 8,
            num_output_scalars: [40, 0, 0, 0],
            num_pc_scalars: 3,
            ..Default::default()
        };
        state.resize_masks();
        state.set_output_depends_on_view_id(0, 35);
        state.set_pc_output_depends_on_view_id(2);

        let words = state.serialize();
        assert_eq!(words.len(), 6 + 2 + 1);
        let back = ViewIdState::deserialize(&words).unwrap();
        assert_eq!(back, state);
        assert!(back.output_depends_on_view_id(0, 35));
        assert!(!back.output_depends_on_view_id(0, 34));
        assert!(back.pc_output_depends_on_view_id(2));
    }

    #[test]
    fn truncated_words_are_malformed() {
        assert!(matches!(
            ViewIdState::deserialize(&[1, 40, 0, 0, 0, 0]),
            Err(MetadataError::Malformed(_))
        ));
    }
}
