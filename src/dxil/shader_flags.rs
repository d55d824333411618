//! The shader feature bitset and its fixed 64-bit encoding.
//!
//! Bit positions are part of the metadata contract. Bits 27..=31 and 32..=63 are reserved
//! alignment padding and are always written as zero.

use bitflags::bitflags;
use bitutils::bits;

/// Every individual flag, in bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ShaderFlag {
    DisableOptimizations = 0,
    DisableMathRefactoring = 1,
    EnableDoublePrecision = 2,
    ForceEarlyDepthStencil = 3,
    EnableRawAndStructuredBuffers = 4,
    EnableMinPrecision = 5,
    EnableDoubleExtensions = 6,
    EnableMSAD = 7,
    AllResourcesBound = 8,
    ViewportAndRTArrayIndex = 9,
    InnerCoverage = 10,
    StencilRef = 11,
    TiledResources = 12,
    UAVLoadAdditionalFormats = 13,
    Level9ComparisonFiltering = 14,
    UAVs64 = 15,
    UAVsAtEveryStage = 16,
    CSRawAndStructuredViaShader4X = 17,
    ROVs = 18,
    WaveOps = 19,
    Int64Ops = 20,
    ViewID = 21,
    Barycentrics = 22,
    UseNativeLowPrecision = 23,
    ShadingRate = 24,
    RaytracingTier1_1 = 25,
    SamplerFeedback = 26,
}

impl ShaderFlag {
    pub const COUNT: usize = 27;

    pub const ALL: [ShaderFlag; ShaderFlag::COUNT] = [
        ShaderFlag::DisableOptimizations,
        ShaderFlag::DisableMathRefactoring,
        ShaderFlag::EnableDoublePrecision,
        ShaderFlag::ForceEarlyDepthStencil,
        ShaderFlag::EnableRawAndStructuredBuffers,
        ShaderFlag::EnableMinPrecision,
        ShaderFlag::EnableDoubleExtensions,
        ShaderFlag::EnableMSAD,
        ShaderFlag::AllResourcesBound,
        ShaderFlag::ViewportAndRTArrayIndex,
        ShaderFlag::InnerCoverage,
        ShaderFlag::StencilRef,
        ShaderFlag::TiledResources,
        ShaderFlag::UAVLoadAdditionalFormats,
        ShaderFlag::Level9ComparisonFiltering,
        ShaderFlag::UAVs64,
        ShaderFlag::UAVsAtEveryStage,
        ShaderFlag::CSRawAndStructuredViaShader4X,
        ShaderFlag::ROVs,
        ShaderFlag::WaveOps,
        ShaderFlag::Int64Ops,
        ShaderFlag::ViewID,
        ShaderFlag::Barycentrics,
        ShaderFlag::UseNativeLowPrecision,
        ShaderFlag::ShadingRate,
        ShaderFlag::RaytracingTier1_1,
        ShaderFlag::SamplerFeedback,
    ];

    pub fn bit(self) -> u32 {
        self as u32
    }
}

bitflags! {
    /// D3D global-flags word derived from [ShaderFlags].
    pub struct GlobalFlags: u64 {
        const REFACTORING_ALLOWED = 1 << 11;
        const ENABLE_DOUBLE_PRECISION_FLOAT_OPS = 1 << 12;
        const FORCE_EARLY_DEPTH_STENCIL = 1 << 13;
        const ENABLE_RAW_AND_STRUCTURED_BUFFERS = 1 << 14;
        const SKIP_OPTIMIZATION = 1 << 15;
        const ENABLE_MINIMUM_PRECISION = 1 << 16;
        const ENABLE_DOUBLE_EXTENSIONS = 1 << 17;
        const ENABLE_SHADER_EXTENSIONS = 1 << 18;
        const ALL_RESOURCES_BOUND = 1 << 19;
    }
}

bitflags! {
    /// Optional hardware features a shader requires.
    pub struct ShaderFeatureInfo: u64 {
        const DOUBLES = 0x0001;
        const COMPUTE_SHADERS_PLUS_RAW_AND_STRUCTURED_BUFFERS_VIA_SHADER_4_X = 0x0002;
        const UAVS_AT_EVERY_STAGE = 0x0004;
        const UAVS_64 = 0x0008;
        const MINIMUM_PRECISION = 0x0010;
        const DOUBLE_EXTENSIONS_11_1 = 0x0020;
        const SHADER_EXTENSIONS_11_1 = 0x0040;
        const LEVEL_9_COMPARISON_FILTERING = 0x0080;
        const TILED_RESOURCES = 0x0100;
        const STENCIL_REF = 0x0200;
        const INNER_COVERAGE = 0x0400;
        const TYPED_UAV_LOAD_ADDITIONAL_FORMATS = 0x0800;
        const ROVS = 0x1000;
        const VIEWPORT_AND_RT_ARRAY_INDEX_FROM_ANY_SHADER_FEEDING_RASTERIZER = 0x2000;
        const WAVE_OPS = 0x4000;
        const INT64_OPS = 0x8000;
        const VIEW_ID = 0x10000;
        const BARYCENTRICS = 0x20000;
        const NATIVE_LOW_PRECISION = 0x40000;
        const SHADING_RATE = 0x80000;
        const RAYTRACING_TIER_1_1 = 0x100000;
        const SAMPLER_FEEDBACK = 0x200000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShaderFlags {
    pub disable_optimizations: bool,
    pub disable_math_refactoring: bool,
    pub enable_double_precision: bool,
    pub force_early_depth_stencil: bool,
    pub enable_raw_and_structured_buffers: bool,
    pub enable_min_precision: bool,
    pub enable_double_extensions: bool,
    pub enable_msad: bool,
    pub all_resources_bound: bool,
    pub viewport_and_rt_array_index: bool,
    pub inner_coverage: bool,
    pub stencil_ref: bool,
    pub tiled_resources: bool,
    pub uav_load_additional_formats: bool,
    pub level9_comparison_filtering: bool,
    pub uavs_64: bool,
    pub uavs_at_every_stage: bool,
    pub cs_raw_and_structured_via_shader_4x: bool,
    pub rovs: bool,
    pub wave_ops: bool,
    pub int64_ops: bool,
    pub view_id: bool,
    pub barycentrics: bool,
    pub use_native_low_precision: bool,
    pub shading_rate: bool,
    pub raytracing_tier_1_1: bool,
    pub sampler_feedback: bool,
}

impl ShaderFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, flag: ShaderFlag) -> bool {
        match flag {
            ShaderFlag::DisableOptimizations => self.disable_optimizations,
            ShaderFlag::DisableMathRefactoring => self.disable_math_refactoring,
            ShaderFlag::EnableDoublePrecision => self.enable_double_precision,
            ShaderFlag::ForceEarlyDepthStencil => self.force_early_depth_stencil,
            ShaderFlag::EnableRawAndStructuredBuffers => self.enable_raw_and_structured_buffers,
            ShaderFlag::EnableMinPrecision => self.enable_min_precision,
            ShaderFlag::EnableDoubleExtensions => self.enable_double_extensions,
            ShaderFlag::EnableMSAD => self.enable_msad,
            ShaderFlag::AllResourcesBound => self.all_resources_bound,
            ShaderFlag::ViewportAndRTArrayIndex => self.viewport_and_rt_array_index,
            ShaderFlag::InnerCoverage => self.inner_coverage,
            ShaderFlag::StencilRef => self.stencil_ref,
            ShaderFlag::TiledResources => self.tiled_resources,
            ShaderFlag::UAVLoadAdditionalFormats => self.uav_load_additional_formats,
            ShaderFlag::Level9ComparisonFiltering => self.level9_comparison_filtering,
            ShaderFlag::UAVs64 => self.uavs_64,
            ShaderFlag::UAVsAtEveryStage => self.uavs_at_every_stage,
            ShaderFlag::CSRawAndStructuredViaShader4X => self.cs_raw_and_structured_via_shader_4x,
            ShaderFlag::ROVs => self.rovs,
            ShaderFlag::WaveOps => self.wave_ops,
            ShaderFlag::Int64Ops => self.int64_ops,
            ShaderFlag::ViewID => self.view_id,
            ShaderFlag::Barycentrics => self.barycentrics,
            ShaderFlag::UseNativeLowPrecision => self.use_native_low_precision,
            ShaderFlag::ShadingRate => self.shading_rate,
            ShaderFlag::RaytracingTier1_1 => self.raytracing_tier_1_1,
            ShaderFlag::SamplerFeedback => self.sampler_feedback,
        }
    }

    fn field_mut(&mut self, flag: ShaderFlag) -> &mut bool {
        match flag {
            ShaderFlag::DisableOptimizations => &mut self.disable_optimizations,
            ShaderFlag::DisableMathRefactoring => &mut self.disable_math_refactoring,
            ShaderFlag::EnableDoublePrecision => &mut self.enable_double_precision,
            ShaderFlag::ForceEarlyDepthStencil => &mut self.force_early_depth_stencil,
            ShaderFlag::EnableRawAndStructuredBuffers => &mut self.enable_raw_and_structured_buffers,
            ShaderFlag::EnableMinPrecision => &mut self.enable_min_precision,
            ShaderFlag::EnableDoubleExtensions => &mut self.enable_double_extensions,
            ShaderFlag::EnableMSAD => &mut self.enable_msad,
            ShaderFlag::AllResourcesBound => &mut self.all_resources_bound,
            ShaderFlag::ViewportAndRTArrayIndex => &mut self.viewport_and_rt_array_index,
            ShaderFlag::InnerCoverage => &mut self.inner_coverage,
            ShaderFlag::StencilRef => &mut self.stencil_ref,
            ShaderFlag::TiledResources => &mut self.tiled_resources,
            ShaderFlag::UAVLoadAdditionalFormats => &mut self.uav_load_additional_formats,
            ShaderFlag::Level9ComparisonFiltering => &mut self.level9_comparison_filtering,
            ShaderFlag::UAVs64 => &mut self.uavs_64,
            ShaderFlag::UAVsAtEveryStage => &mut self.uavs_at_every_stage,
            ShaderFlag::CSRawAndStructuredViaShader4X => &mut self.cs_raw_and_structured_via_shader_4x,
            ShaderFlag::ROVs => &mut self.rovs,
            ShaderFlag::WaveOps => &mut self.wave_ops,
            ShaderFlag::Int64Ops => &mut self.int64_ops,
            ShaderFlag::ViewID => &mut self.view_id,
            ShaderFlag::Barycentrics => &mut self.barycentrics,
            ShaderFlag::UseNativeLowPrecision => &mut self.use_native_low_precision,
            ShaderFlag::ShadingRate => &mut self.shading_rate,
            ShaderFlag::RaytracingTier1_1 => &mut self.raytracing_tier_1_1,
            ShaderFlag::SamplerFeedback => &mut self.sampler_feedback,
        }
    }

    pub fn set(&mut self, flag: ShaderFlag, value: bool) {
        *self.field_mut(flag) = value;
    }

    /// Packs every flag into its fixed bit.
    pub fn raw(&self) -> u64 {
        ShaderFlag::ALL
            .iter()
            .fold(0u64, |raw, flag| raw | ((self.get(*flag) as u64) << flag.bit()))
    }

    /// Unpacks a raw value. Reserved bits are ignored.
    pub fn from_raw(raw: u64) -> Self {
        let lo = (raw & 0xffff_ffff) as u32;
        Self {
            disable_optimizations: bits!(lo, 0:0) == 1,
            disable_math_refactoring: bits!(lo, 1:1) == 1,
            enable_double_precision: bits!(lo, 2:2) == 1,
            force_early_depth_stencil: bits!(lo, 3:3) == 1,
            enable_raw_and_structured_buffers: bits!(lo, 4:4) == 1,
            enable_min_precision: bits!(lo, 5:5) == 1,
            enable_double_extensions: bits!(lo, 6:6) == 1,
            enable_msad: bits!(lo, 7:7) == 1,
            all_resources_bound: bits!(lo, 8:8) == 1,
            viewport_and_rt_array_index: bits!(lo, 9:9) == 1,
            inner_coverage: bits!(lo, 10:10) == 1,
            stencil_ref: bits!(lo, 11:11) == 1,
            tiled_resources: bits!(lo, 12:12) == 1,
            uav_load_additional_formats: bits!(lo, 13:13) == 1,
            level9_comparison_filtering: bits!(lo, 14:14) == 1,
            uavs_64: bits!(lo, 15:15) == 1,
            uavs_at_every_stage: bits!(lo, 16:16) == 1,
            cs_raw_and_structured_via_shader_4x: bits!(lo, 17:17) == 1,
            rovs: bits!(lo, 18:18) == 1,
            wave_ops: bits!(lo, 19:19) == 1,
            int64_ops: bits!(lo, 20:20) == 1,
            view_id: bits!(lo, 21:21) == 1,
            barycentrics: bits!(lo, 22:22) == 1,
            use_native_low_precision: bits!(lo, 23:23) == 1,
            shading_rate: bits!(lo, 24:24) == 1,
            raytracing_tier_1_1: bits!(lo, 25:25) == 1,
            sampler_feedback: bits!(lo, 26:26) == 1,
        }
    }

    /// Mask of the flags that [crate::dxil::DxilModule::collect_shader_flags] derives.
    pub fn raw_for_collection() -> u64 {
        let mut flags = ShaderFlags::new();
        flags.enable_double_precision = true;
        flags.enable_raw_and_structured_buffers = true;
        flags.enable_min_precision = true;
        flags.enable_double_extensions = true;
        flags.enable_msad = true;
        flags.viewport_and_rt_array_index = true;
        flags.inner_coverage = true;
        flags.stencil_ref = true;
        flags.tiled_resources = true;
        flags.uav_load_additional_formats = true;
        flags.uavs_64 = true;
        flags.uavs_at_every_stage = true;
        flags.cs_raw_and_structured_via_shader_4x = true;
        flags.rovs = true;
        flags.wave_ops = true;
        flags.int64_ops = true;
        flags.view_id = true;
        flags.barycentrics = true;
        flags.raw()
    }

    pub fn global_flags(&self) -> GlobalFlags {
        let mut flags = GlobalFlags::empty();
        flags.set(GlobalFlags::REFACTORING_ALLOWED, !self.disable_math_refactoring);
        flags.set(GlobalFlags::ENABLE_DOUBLE_PRECISION_FLOAT_OPS, self.enable_double_precision);
        flags.set(GlobalFlags::FORCE_EARLY_DEPTH_STENCIL, self.force_early_depth_stencil);
        flags.set(GlobalFlags::ENABLE_RAW_AND_STRUCTURED_BUFFERS, self.enable_raw_and_structured_buffers);
        flags.set(GlobalFlags::SKIP_OPTIMIZATION, self.disable_optimizations);
        flags.set(GlobalFlags::ENABLE_MINIMUM_PRECISION, self.enable_min_precision);
        flags.set(GlobalFlags::ENABLE_DOUBLE_EXTENSIONS, self.enable_double_extensions);
        flags.set(GlobalFlags::ENABLE_SHADER_EXTENSIONS, self.enable_msad);
        flags.set(GlobalFlags::ALL_RESOURCES_BOUND, self.all_resources_bound);
        flags
    }

    pub fn feature_info(&self) -> ShaderFeatureInfo {
        use ShaderFeatureInfo as F;
        let mut info = F::empty();
        info.set(F::DOUBLES, self.enable_double_precision);
        info.set(
            F::COMPUTE_SHADERS_PLUS_RAW_AND_STRUCTURED_BUFFERS_VIA_SHADER_4_X,
            self.cs_raw_and_structured_via_shader_4x,
        );
        info.set(F::UAVS_AT_EVERY_STAGE, self.uavs_at_every_stage);
        info.set(F::UAVS_64, self.uavs_64);
        info.set(F::MINIMUM_PRECISION, self.enable_min_precision);
        info.set(F::DOUBLE_EXTENSIONS_11_1, self.enable_double_extensions);
        info.set(F::SHADER_EXTENSIONS_11_1, self.enable_msad);
        info.set(F::LEVEL_9_COMPARISON_FILTERING, self.level9_comparison_filtering);
        info.set(F::TILED_RESOURCES, self.tiled_resources);
        info.set(F::STENCIL_REF, self.stencil_ref);
        info.set(F::INNER_COVERAGE, self.inner_coverage);
        info.set(F::TYPED_UAV_LOAD_ADDITIONAL_FORMATS, self.uav_load_additional_formats);
        info.set(F::ROVS, self.rovs);
        info.set(
            F::VIEWPORT_AND_RT_ARRAY_INDEX_FROM_ANY_SHADER_FEEDING_RASTERIZER,
            self.viewport_and_rt_array_index,
        );
        info.set(F::WAVE_OPS, self.wave_ops);
        info.set(F::INT64_OPS, self.int64_ops);
        info.set(F::VIEW_ID, self.view_id);
        info.set(F::BARYCENTRICS, self.barycentrics);
        info.set(F::NATIVE_LOW_PRECISION, self.use_native_low_precision);
        info.set(F::SHADING_RATE, self.shading_rate);
        info.set(F::RAYTRACING_TIER_1_1, self.raytracing_tier_1_1);
        info.set(F::SAMPLER_FEEDBACK, self.sampler_feedback);
        info
    }

    /// Keeps the flags that come from compile options rather than from the program.
    pub(crate) fn option_flags(&self) -> ShaderFlags {
        ShaderFlags {
            disable_optimizations: self.disable_optimizations,
            disable_math_refactoring: self.disable_math_refactoring,
            force_early_depth_stencil: self.force_early_depth_stencil,
            all_resources_bound: self.all_resources_bound,
            use_native_low_precision: self.use_native_low_precision,
            level9_comparison_filtering: self.level9_comparison_filtering,
            shading_rate: self.shading_rate,
            raytracing_tier_1_1: self.raytracing_tier_1_1,
            sampler_feedback: self.sampler_feedback,
            ..ShaderFlags::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_refactoring_clears_allowed_bit() {
        let mut flags = ShaderFlags::new();
        assert!(flags.global_flags().contains(GlobalFlags::REFACTORING_ALLOWED));
        flags.disable_math_refactoring = true;
        assert!(!flags.global_flags().contains(GlobalFlags::REFACTORING_ALLOWED));
    }
}
