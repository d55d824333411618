use dxil_module::dxil::{GlobalFlags, ShaderFeatureInfo, ShaderFlag, ShaderFlags};
use proptest::prelude::*;

fn flag_strategy() -> impl Strategy<Value = ShaderFlag> {
    (0..ShaderFlag::COUNT).prop_map(|i| ShaderFlag::ALL[i])
}

proptest! {
    #[test]
    fn test_flags_survive_raw(raw in 0u64..(1 << ShaderFlag::COUNT)) {
        prop_assert_eq!(ShaderFlags::from_raw(raw).raw(), raw);
    }

    #[test]
    fn test_reserved_bits_ignored(raw in any::<u64>()) {
        let flags = ShaderFlags::from_raw(raw);
        prop_assert_eq!(flags.raw(), raw & ((1 << ShaderFlag::COUNT) - 1));
    }

    #[test]
    fn test_setting_one_flag_touches_one_bit(flag in flag_strategy(), raw in 0u64..(1 << ShaderFlag::COUNT)) {
        let mut flags = ShaderFlags::from_raw(raw);
        flags.set(flag, true);
        prop_assert_eq!(flags.raw(), raw | (1 << flag.bit()));
        flags.set(flag, false);
        prop_assert_eq!(flags.raw(), raw & !(1 << flag.bit()));
    }
}

#[test]
fn test_get_reads_only_the_flag_set() {
    for flag in ShaderFlag::ALL.iter() {
        let mut flags = ShaderFlags::new();
        flags.set(*flag, true);
        let read_back = ShaderFlags::from_raw(flags.raw());
        for other in ShaderFlag::ALL.iter() {
            assert_eq!(read_back.get(*other), other == flag, "{:?} set, reading {:?}", flag, other);
        }
    }
    let flags = ShaderFlags {
        wave_ops: true,
        ..ShaderFlags::new()
    };
    assert!(flags.get(ShaderFlag::WaveOps));
    assert!(!flags.get(ShaderFlag::Int64Ops));
}

#[test]
fn test_collection_mask() {
    assert_eq!(ShaderFlags::raw_for_collection(), 0x7FBEF4);
}

#[test]
fn test_default_allows_refactoring() {
    let flags = ShaderFlags::new();
    assert_eq!(flags.raw(), 0);
    assert_eq!(flags.global_flags(), GlobalFlags::REFACTORING_ALLOWED);
    assert_eq!(flags.feature_info(), ShaderFeatureInfo::empty());
}

#[test]
fn test_double_extensions_feature() {
    let mut flags = ShaderFlags::new();
    flags.enable_double_precision = true;
    flags.enable_double_extensions = true;
    assert_eq!(
        flags.feature_info(),
        ShaderFeatureInfo::DOUBLES | ShaderFeatureInfo::DOUBLE_EXTENSIONS_11_1
    );
    assert!(flags
        .global_flags()
        .contains(GlobalFlags::ENABLE_DOUBLE_PRECISION_FLOAT_OPS | GlobalFlags::ENABLE_DOUBLE_EXTENSIONS));
}

#[test]
fn test_wave_ops_feature_bit() {
    let mut flags = ShaderFlags::new();
    flags.wave_ops = true;
    assert_eq!(flags.raw(), 1 << 19);
    assert_eq!(flags.feature_info(), ShaderFeatureInfo::WAVE_OPS);
}
