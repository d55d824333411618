use dxil_module::dxil::{DxilModule, ShaderModel};

fn geometry() -> DxilModule {
    let mut dxil = DxilModule::new();
    dxil.set_shader_model(ShaderModel::get_by_name("gs_6_0").expect("gs_6_0"));
    dxil
}

#[test]
fn test_single_stream() {
    let mut dxil = geometry();
    dxil.gs_state_mut().active_stream_mask = 0b0010;
    assert!(!dxil.has_multiple_output_streams());
    assert_eq!(dxil.output_stream(), 1);
}

#[test]
fn test_multiple_streams() {
    let mut dxil = geometry();
    dxil.gs_state_mut().active_stream_mask = 0b0101;
    assert!(dxil.has_multiple_output_streams());
}

#[test]
#[should_panic]
fn test_output_stream_needs_one_stream() {
    let mut dxil = geometry();
    dxil.gs_state_mut().active_stream_mask = 0b0101;
    dxil.output_stream();
}

#[test]
#[should_panic]
fn test_output_stream_without_streams() {
    let dxil = geometry();
    dxil.output_stream();
}
