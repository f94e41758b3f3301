//! End-to-end binding protocol: reflect a shader, build its layout, derive
//! the vertex layout, and drive a frame of global and per-object uniforms
//! through a host ring.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use vermilion_graphics::materials::{BindingSet, UNSET_OFFSET};
use vermilion_graphics::mesh::{VertexLayout, PER_INSTANCE_BINDING, PER_VERTEX_BINDING};
use vermilion_graphics::shader::{ShaderLayoutBuilder, ShaderReflector, ShaderStage};
use vermilion_graphics::types::{ResourceBinding, TextureBinding, TextureId};
use vermilion_graphics::uniforms::HostUniformRing;

const SHADER: &str = r#"
struct CameraDynamic {
    view_proj: mat4x4<f32>,
}

struct ModelDynamic {
    world: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> camera: CameraDynamic;
@group(0) @binding(1) var<uniform> model: ModelDynamic;
@group(1) @binding(0) var albedo: texture_2d<f32>;
@group(1) @binding(1) var albedo_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(
    @location(0) inPosition: vec3<f32>,
    @location(1) inUV0: vec2<f32>,
    @location(2) tint: vec4<f32>,
) -> VertexOutput {
    var out: VertexOutput;
    out.position = camera.view_proj * model.world * vec4<f32>(inPosition, 1.0);
    out.uv = inUV0;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(albedo, albedo_sampler, in.uv);
}
"#;

fn reflect_and_build() -> (
    Arc<vermilion_graphics::ShaderLayout>,
    vermilion_graphics::shader::StageReflection,
) {
    let module = naga::front::wgsl::parse_str(SHADER).expect("test WGSL must parse");
    let reflector = ShaderReflector::default();

    let vs = reflector
        .reflect_module(&module, ShaderStage::Vertex)
        .unwrap();
    let fs = reflector
        .reflect_module(&module, ShaderStage::Fragment)
        .unwrap();

    let layout = ShaderLayoutBuilder::new()
        .with_stage(&vs)
        .unwrap()
        .with_stage(&fs)
        .unwrap()
        .build()
        .unwrap();

    (Arc::new(layout), vs)
}

#[test]
fn test_reflected_layout_shape() {
    let (layout, _) = reflect_and_build();

    // "Dynamic" struct names force the dynamic uniform kind.
    let camera = layout.buffer("camera").unwrap();
    let model = layout.buffer("model").unwrap();
    assert_eq!(camera.size, 64);
    assert_eq!(model.size, 64);
    assert_eq!(camera.dynamic_index, Some(0));
    assert_eq!(model.dynamic_index, Some(1));
    assert_eq!(layout.dynamic_count(), 2);

    assert!(layout.image("albedo").is_some());
    assert!(layout.image("albedo_sampler").is_some());
    assert_eq!(layout.sets().len(), 2);
}

#[test]
fn test_vertex_layout_derivation() {
    let (_, vs) = reflect_and_build();
    let vertex_layout = VertexLayout::from_inputs(&vs.inputs);

    // Position + UV0 are semantic-matched per-vertex; tint falls back to the
    // per-instance stream.
    assert_eq!(vertex_layout.vertex_stride(), 20);
    assert_eq!(vertex_layout.instance_stride(), 16);

    let attributes = vertex_layout.attributes();
    assert_eq!(attributes.len(), 3);
    assert_eq!(attributes[0].location, 0);
    assert_eq!(attributes[0].binding, PER_VERTEX_BINDING);
    assert_eq!(attributes[1].location, 1);
    assert_eq!(attributes[1].binding, PER_VERTEX_BINDING);
    assert_eq!(attributes[2].location, 2);
    assert_eq!(attributes[2].binding, PER_INSTANCE_BINDING);
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CameraData {
    view_proj: [[f32; 4]; 4],
}

#[test]
fn test_two_object_frame() {
    let _ = env_logger::builder().is_test(true).try_init();

    let (layout, _) = reflect_and_build();
    let ring = Arc::new(HostUniformRing::new(64 * 1024, 256).unwrap());
    let mut bindings = BindingSet::new(layout, ring.clone());

    let camera = bindings.uniform_handle("camera").unwrap();
    let model = bindings.uniform_handle("model").unwrap();

    let camera_data = CameraData {
        view_proj: [[1.0, 0.0, 0.0, 0.0]; 4],
    };
    let view_proj = bytemuck::bytes_of(&camera_data);
    bindings.set_global_uniform(camera, view_proj).unwrap();
    bindings.begin_frame();

    let world_a = [0xA0u8; 64];
    let first = bindings.begin_object().unwrap();
    bindings.set_local_uniform(model, &world_a).unwrap();
    assert!(bindings.end_object().is_empty());

    let world_b = [0xB0u8; 64];
    let second = bindings.begin_object().unwrap();
    bindings.set_local_uniform(model, &world_b).unwrap();
    assert!(bindings.end_object().is_empty());

    bindings.end_frame();

    let offsets_a = bindings.dynamic_offsets(first);
    let offsets_b = bindings.dynamic_offsets(second);
    assert_eq!(offsets_a.len(), 2);
    assert_eq!(offsets_b.len(), 2);

    // Both objects share the frame's camera allocation.
    assert_eq!(offsets_a[0], offsets_b[0]);
    assert_ne!(offsets_a[0], UNSET_OFFSET);
    assert_eq!(ring.read(offsets_a[0] as u64, 64), view_proj);

    // Each object got its own model allocation.
    assert_ne!(offsets_a[1], offsets_b[1]);
    assert_eq!(ring.read(offsets_a[1] as u64, 64), world_a);
    assert_eq!(ring.read(offsets_b[1] as u64, 64), world_b);
}

#[test]
fn test_unset_local_uniform_reported() {
    let (layout, _) = reflect_and_build();
    let ring = Arc::new(HostUniformRing::new(4096, 256).unwrap());
    let mut bindings = BindingSet::new(layout, ring);

    let camera = bindings.uniform_handle("camera").unwrap();
    bindings.set_global_uniform(camera, &[0u8; 64]).unwrap();
    bindings.begin_frame();

    bindings.begin_object().unwrap();
    let unset = bindings.end_object();

    // Camera is inherited from the global snapshot; only model is missing.
    assert_eq!(unset, vec!["model"]);
}

#[test]
fn test_texture_write_dedup() {
    let (layout, _) = reflect_and_build();
    let ring = Arc::new(HostUniformRing::new(4096, 256).unwrap());
    let mut bindings = BindingSet::new(layout, ring);

    let texture = TextureBinding::new(TextureId::from_raw(0xBEEF));

    let write = bindings.set_texture("albedo", Some(texture)).unwrap();
    let write = write.expect("first set must produce a descriptor write");
    assert_eq!(write.set, 1);
    assert_eq!(write.binding, 0);
    assert_eq!(write.resource, ResourceBinding::Image(texture));

    // Re-binding the same texture across frames produces no write.
    assert!(bindings.set_texture("albedo", Some(texture)).unwrap().is_none());
}
