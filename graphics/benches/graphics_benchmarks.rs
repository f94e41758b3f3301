use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vermilion_graphics::materials::BindingSet;
use vermilion_graphics::shader::{
    DescriptorKind, ImageParameter, ShaderLayout, ShaderLayoutBuilder, ShaderParameter,
    ShaderStageFlags,
};
use vermilion_graphics::uniforms::{HostUniformRing, RingAllocator};

// ---------------------------------------------------------------------------
// Ring allocation
// ---------------------------------------------------------------------------

fn bench_ring_allocate(c: &mut Criterion) {
    c.bench_function("ring_allocate_256b", |b| {
        let mut ring = RingAllocator::new(32 * 1024 * 1024, 256).unwrap();
        b.iter(|| {
            black_box(ring.allocate(256));
        });
    });
}

fn bench_ring_write(c: &mut Criterion) {
    c.bench_function("host_ring_write_64b", |b| {
        let ring = HostUniformRing::new(32 * 1024 * 1024, 256).unwrap();
        let payload = [0u8; 64];
        b.iter(|| {
            black_box(ring.write(&payload));
        });
    });
}

// ---------------------------------------------------------------------------
// Layout construction
// ---------------------------------------------------------------------------

fn material_layout() -> ShaderLayout {
    ShaderLayoutBuilder::new()
        .with_buffer(ShaderParameter::new(
            "camera",
            0,
            0,
            64,
            DescriptorKind::UniformBufferDynamic,
            ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
        ))
        .unwrap()
        .with_buffer(ShaderParameter::new(
            "model",
            0,
            1,
            64,
            DescriptorKind::UniformBufferDynamic,
            ShaderStageFlags::VERTEX,
        ))
        .unwrap()
        .with_buffer(ShaderParameter::new(
            "material_params",
            0,
            2,
            32,
            DescriptorKind::UniformBufferDynamic,
            ShaderStageFlags::FRAGMENT,
        ))
        .unwrap()
        .with_image(ImageParameter::new(
            "albedo",
            1,
            0,
            DescriptorKind::SampledImage,
            ShaderStageFlags::FRAGMENT,
        ))
        .unwrap()
        .with_image(ImageParameter::new(
            "albedo_sampler",
            1,
            1,
            DescriptorKind::Sampler,
            ShaderStageFlags::FRAGMENT,
        ))
        .unwrap()
        .build()
        .unwrap()
}

fn bench_layout_build(c: &mut Criterion) {
    c.bench_function("shader_layout_build_5_params", |b| {
        b.iter(|| {
            black_box(material_layout());
        });
    });
}

// ---------------------------------------------------------------------------
// Per-object binding loop
// ---------------------------------------------------------------------------

fn bench_object_binding_loop(c: &mut Criterion) {
    c.bench_function("binding_set_100_objects", |b| {
        let layout = Arc::new(material_layout());
        let ring = Arc::new(HostUniformRing::new(32 * 1024 * 1024, 256).unwrap());
        let mut bindings = BindingSet::new(layout, ring);

        let camera = bindings.uniform_handle("camera").unwrap();
        let model = bindings.uniform_handle("model").unwrap();
        let params = bindings.uniform_handle("material_params").unwrap();
        let view_proj = [0u8; 64];
        let world = [0u8; 64];
        let tint = [0u8; 32];

        b.iter(|| {
            bindings.set_global_uniform(camera, &view_proj).unwrap();
            bindings.begin_frame();
            for _ in 0..100 {
                let index = bindings.begin_object().unwrap();
                bindings.set_local_uniform(model, &world).unwrap();
                bindings.set_local_uniform(params, &tint).unwrap();
                bindings.end_object();
                black_box(bindings.dynamic_offsets(index));
            }
            bindings.end_frame();
        });
    });
}

criterion_group!(
    benches,
    bench_ring_allocate,
    bench_ring_write,
    bench_layout_build,
    bench_object_binding_loop
);
criterion_main!(benches);
