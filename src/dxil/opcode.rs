//! DXIL intrinsic opcodes.
//!
//! Intrinsics are calls to functions named `dx.op.*`. The first argument is always the
//! opcode as an immediate `i32`.

use num_traits::FromPrimitive;

pub const OP_FUNCTION_PREFIX: &str = "dx.op.";
pub const CREATE_HANDLE_NAME: &str = "dx.op.createHandle";

/// Argument positions within `dx.op.createHandle(opcode, class, rangeId, index, nonUniform)`.
pub const CREATE_HANDLE_CLASS_IDX: usize = 1;
pub const CREATE_HANDLE_RANGE_ID_IDX: usize = 2;
pub const CREATE_HANDLE_INDEX_IDX: usize = 3;
pub const CREATE_HANDLE_NON_UNIFORM_IDX: usize = 4;

/// The handle argument of buffer and texture loads.
pub const LOAD_HANDLE_IDX: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum OpCode {
    TempRegLoad = 0,
    TempRegStore = 1,
    MinPrecXRegLoad = 2,
    MinPrecXRegStore = 3,
    LoadInput = 4,
    StoreOutput = 5,
    FAbs = 6,
    Saturate = 7,
    IsNaN = 8,
    IsInf = 9,
    IsFinite = 10,
    IsNormal = 11,
    Cos = 12,
    Sin = 13,
    Tan = 14,
    Acos = 15,
    Asin = 16,
    Atan = 17,
    Hcos = 18,
    Hsin = 19,
    Htan = 20,
    Exp = 21,
    Frc = 22,
    Log = 23,
    Sqrt = 24,
    Rsqrt = 25,
    RoundNe = 26,
    RoundNi = 27,
    RoundPi = 28,
    RoundZ = 29,
    Bfrev = 30,
    Countbits = 31,
    FirstbitLo = 32,
    FirstbitHi = 33,
    FirstbitSHi = 34,
    FMax = 35,
    FMin = 36,
    IMax = 37,
    IMin = 38,
    UMax = 39,
    UMin = 40,
    IMul = 41,
    UMul = 42,
    UDiv = 43,
    UAddc = 44,
    USubb = 45,
    FMad = 46,
    Fma = 47,
    IMad = 48,
    UMad = 49,
    Msad = 50,
    Ibfe = 51,
    Ubfe = 52,
    Bfi = 53,
    Dot2 = 54,
    Dot3 = 55,
    Dot4 = 56,
    CreateHandle = 57,
    CBufferLoad = 58,
    CBufferLoadLegacy = 59,
    Sample = 60,
    SampleBias = 61,
    SampleLevel = 62,
    SampleGrad = 63,
    SampleCmp = 64,
    SampleCmpLevelZero = 65,
    TextureLoad = 66,
    TextureStore = 67,
    BufferLoad = 68,
    BufferStore = 69,
    BufferUpdateCounter = 70,
    CheckAccessFullyMapped = 71,
    GetDimensions = 72,
    TextureGather = 73,
    TextureGatherCmp = 74,
    Texture2DMSGetSamplePosition = 75,
    RenderTargetGetSamplePosition = 76,
    RenderTargetGetSampleCount = 77,
    AtomicBinOp = 78,
    AtomicCompareExchange = 79,
    Barrier = 80,
    CalculateLOD = 81,
    Discard = 82,
    DerivCoarseX = 83,
    DerivCoarseY = 84,
    DerivFineX = 85,
    DerivFineY = 86,
    EvalSnapped = 87,
    EvalSampleIndex = 88,
    EvalCentroid = 89,
    SampleIndex = 90,
    Coverage = 91,
    InnerCoverage = 92,
    ThreadId = 93,
    GroupId = 94,
    ThreadIdInGroup = 95,
    FlattenedThreadIdInGroup = 96,
    EmitStream = 97,
    CutStream = 98,
    EmitThenCutStream = 99,
    GSInstanceID = 100,
    MakeDouble = 101,
    SplitDouble = 102,
    LoadOutputControlPoint = 103,
    LoadPatchConstant = 104,
    DomainLocation = 105,
    StorePatchConstant = 106,
    OutputControlPointID = 107,
    PrimitiveID = 108,
    CycleCounterLegacy = 109,
    WaveIsFirstLane = 110,
    WaveGetLaneIndex = 111,
    WaveGetLaneCount = 112,
    WaveAnyTrue = 113,
    WaveAllTrue = 114,
    WaveActiveAllEqual = 115,
    WaveActiveBallot = 116,
    WaveReadLaneAt = 117,
    WaveReadLaneFirst = 118,
    WaveActiveOp = 119,
    WaveActiveBit = 120,
    WavePrefixOp = 121,
    QuadReadLaneAt = 122,
    QuadOp = 123,
    BitcastI16toF16 = 124,
    BitcastF16toI16 = 125,
    BitcastI32toF32 = 126,
    BitcastF32toI32 = 127,
    BitcastI64toF64 = 128,
    BitcastF64toI64 = 129,
    LegacyF32ToF16 = 130,
    LegacyF16ToF32 = 131,
    LegacyDoubleToFloat = 132,
    LegacyDoubleToSInt32 = 133,
    LegacyDoubleToUInt32 = 134,
    WaveAllBitCount = 135,
    WavePrefixBitCount = 136,
    AttributeAtVertex = 137,
    ViewID = 138,
}

impl OpCode {
    pub fn from_immediate(value: u64) -> Option<OpCode> {
        OpCode::from_u64(value)
    }

    /// Wave and quad intrinsics.
    pub fn is_wave(&self) -> bool {
        let op = *self as u32;
        (OpCode::WaveIsFirstLane as u32..=OpCode::QuadOp as u32).contains(&op)
            || matches!(self, OpCode::WaveAllBitCount | OpCode::WavePrefixBitCount)
    }
}

pub fn is_op_function(name: &str) -> bool {
    name.starts_with(OP_FUNCTION_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wave_family() {
        assert!(OpCode::WaveActiveOp.is_wave());
        assert!(OpCode::QuadOp.is_wave());
        assert!(OpCode::WavePrefixBitCount.is_wave());
        assert!(!OpCode::CycleCounterLegacy.is_wave());
        assert!(!OpCode::BitcastI16toF16.is_wave());
        assert_eq!(OpCode::from_immediate(57), Some(OpCode::CreateHandle));
        assert_eq!(OpCode::from_immediate(1000), None);
    }
}
