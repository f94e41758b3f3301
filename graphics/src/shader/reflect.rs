//! Shader stage reflection.
//!
//! Extracts the resource surface of one compiled shader stage: uniform and
//! storage buffers, images, samplers, and (for the vertex stage) the input
//! attribute list. The reflection frontend is naga; a stage is reflected
//! either from raw SPIR-V bytecode or from an already-parsed [`naga::Module`].
//!
//! Uniform buffers can opt into per-draw dynamic offsets by naming convention
//! alone: a block whose *type* name contains the substring `"Dynamic"` is
//! reflected as [`DescriptorKind::UniformBufferDynamic`]. The same can be
//! forced for every uniform buffer via [`ReflectOptions::dynamic_uniform_buffers`].

use crate::error::GraphicsError;

use super::layout::{DescriptorKind, ImageParameter, ShaderParameter};
use super::ShaderStage;

/// A vertex-stage input attribute as declared by the shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInput {
    /// Input variable name.
    pub name: String,
    /// Declared location.
    pub location: u32,
    /// Number of 32-bit float components (1-4).
    pub components: u32,
}

/// The reflected resource surface of one shader stage.
///
/// Fields are public so declarations the reflection frontend does not model
/// (input attachments, geometry/tessellation resources) can be supplied
/// manually before layout building.
#[derive(Debug, Clone, Default)]
pub struct StageReflection {
    /// Uniform and storage buffer parameters, stage mask set to this stage.
    pub buffers: Vec<ShaderParameter>,
    /// Image and sampler parameters.
    pub images: Vec<ImageParameter>,
    /// Vertex input attributes (vertex stage only, empty otherwise).
    pub inputs: Vec<VertexInput>,
}

/// Options controlling reflection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReflectOptions {
    /// Force every uniform buffer to the dynamic descriptor kind, regardless
    /// of the type-name convention.
    pub dynamic_uniform_buffers: bool,
}

/// Reflects compiled shader stages into [`StageReflection`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShaderReflector {
    options: ReflectOptions,
}

impl ShaderReflector {
    /// Create a reflector with the given options.
    pub fn new(options: ReflectOptions) -> Self {
        Self { options }
    }

    /// Reflect a compiled SPIR-V module.
    ///
    /// Unparseable bytecode is fatal for the shader: the error propagates as
    /// a creation failure, there is no partial result.
    pub fn reflect_spirv(
        &self,
        bytecode: &[u8],
        stage: ShaderStage,
    ) -> Result<StageReflection, GraphicsError> {
        let module =
            naga::front::spv::parse_u8_slice(bytecode, &naga::front::spv::Options::default())
                .map_err(|e| GraphicsError::ReflectionFailed(format!("SPIR-V parse error: {e}")))?;
        self.reflect_module(&module, stage)
    }

    /// Reflect an already-parsed naga module as the given stage.
    pub fn reflect_module(
        &self,
        module: &naga::Module,
        stage: ShaderStage,
    ) -> Result<StageReflection, GraphicsError> {
        let stage_mask = stage.flag();
        let mut reflection = StageReflection::default();

        for (_, var) in module.global_variables.iter() {
            let name = match &var.name {
                Some(name) => name.clone(),
                None => {
                    log::debug!("skipping unnamed global variable in {stage:?} stage");
                    continue;
                }
            };

            match var.space {
                naga::AddressSpace::Uniform => {
                    let binding = resource_binding(&name, var)?;
                    let type_name = module.types[var.ty].name.as_deref().unwrap_or("");
                    let dynamic =
                        self.options.dynamic_uniform_buffers || type_name.contains("Dynamic");
                    let kind = if dynamic {
                        DescriptorKind::UniformBufferDynamic
                    } else {
                        DescriptorKind::UniformBuffer
                    };
                    reflection.buffers.push(ShaderParameter::new(
                        name,
                        binding.group,
                        binding.binding,
                        block_byte_size(module, var.ty),
                        kind,
                        stage_mask,
                    ));
                }
                naga::AddressSpace::Storage { .. } => {
                    let binding = resource_binding(&name, var)?;
                    reflection.buffers.push(ShaderParameter::new(
                        name,
                        binding.group,
                        binding.binding,
                        block_byte_size(module, var.ty),
                        DescriptorKind::StorageBuffer,
                        stage_mask,
                    ));
                }
                naga::AddressSpace::Handle => {
                    let kind = match &module.types[var.ty].inner {
                        naga::TypeInner::Image { class, .. } => match class {
                            naga::ImageClass::Storage { .. } => DescriptorKind::StorageImage,
                            _ => DescriptorKind::SampledImage,
                        },
                        naga::TypeInner::Sampler { .. } => DescriptorKind::Sampler,
                        other => {
                            log::warn!(
                                "handle variable '{name}' has unsupported type {other:?}, skipping"
                            );
                            continue;
                        }
                    };
                    let binding = resource_binding(&name, var)?;
                    reflection.images.push(ImageParameter::new(
                        name,
                        binding.group,
                        binding.binding,
                        kind,
                        stage_mask,
                    ));
                }
                _ => {}
            }
        }

        if stage == ShaderStage::Vertex {
            reflection.inputs = reflect_vertex_inputs(module);
        }

        Ok(reflection)
    }
}

/// Get the (set, binding) pair of a resource variable, or fail reflection.
fn resource_binding(
    name: &str,
    var: &naga::GlobalVariable,
) -> Result<naga::ResourceBinding, GraphicsError> {
    var.binding.clone().ok_or_else(|| {
        GraphicsError::ReflectionFailed(format!("resource '{name}' has no set/binding decoration"))
    })
}

/// Declared byte size of a buffer block. Unsized storage blocks (ending in a
/// runtime-sized array) report 0.
fn block_byte_size(module: &naga::Module, ty: naga::Handle<naga::Type>) -> u32 {
    let inner = &module.types[ty].inner;
    match inner {
        naga::TypeInner::Struct { members, span } => {
            if let Some(last) = members.last() {
                if matches!(
                    module.types[last.ty].inner,
                    naga::TypeInner::Array {
                        size: naga::ArraySize::Dynamic,
                        ..
                    }
                ) {
                    return 0;
                }
            }
            *span
        }
        naga::TypeInner::Array {
            size: naga::ArraySize::Dynamic,
            ..
        } => 0,
        _ => inner.size(module.to_ctx()),
    }
}

/// Extract the vertex entry point's input attributes.
fn reflect_vertex_inputs(module: &naga::Module) -> Vec<VertexInput> {
    let Some(entry) = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Vertex)
    else {
        log::debug!("vertex stage reflection requested but module has no vertex entry point");
        return Vec::new();
    };

    let mut inputs = Vec::new();
    for arg in &entry.function.arguments {
        let Some(naga::Binding::Location { location, .. }) = arg.binding else {
            continue;
        };
        let Some(name) = arg.name.clone() else {
            log::warn!("vertex input at location {location} has no name, skipping");
            continue;
        };
        let Some(components) = component_count(&module.types[arg.ty].inner) else {
            log::warn!("vertex input '{name}' is not a scalar or vector, skipping");
            continue;
        };
        inputs.push(VertexInput {
            name,
            location,
            components,
        });
    }
    inputs
}

fn component_count(inner: &naga::TypeInner) -> Option<u32> {
    match inner {
        naga::TypeInner::Scalar(_) => Some(1),
        naga::TypeInner::Vector { size, .. } => Some(*size as u32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ShaderStageFlags;

    fn parse_wgsl(source: &str) -> naga::Module {
        naga::front::wgsl::parse_str(source).expect("test WGSL must parse")
    }

    const SHADER: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
}

struct ModelDynamic {
    world: mat4x4<f32>,
}

struct Lights {
    count: u32,
    data: array<vec4<f32>>,
}

@group(0) @binding(0) var<uniform> camera: Camera;
@group(0) @binding(1) var<uniform> model: ModelDynamic;
@group(1) @binding(0) var<storage, read> lights: Lights;
@group(1) @binding(1) var albedo: texture_2d<f32>;
@group(1) @binding(2) var albedo_sampler: sampler;
@group(1) @binding(3) var output_image: texture_storage_2d<rgba8unorm, write>;

@vertex
fn vs_main(
    @location(0) inPosition: vec3<f32>,
    @location(1) inUV0: vec2<f32>,
    @location(2) tint: vec4<f32>,
) -> @builtin(position) vec4<f32> {
    return camera.view_proj * model.world * vec4<f32>(inPosition, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;

    #[test]
    fn test_buffer_reflection() {
        let module = parse_wgsl(SHADER);
        let reflection = ShaderReflector::default()
            .reflect_module(&module, ShaderStage::Vertex)
            .unwrap();

        let camera = reflection
            .buffers
            .iter()
            .find(|p| p.name == "camera")
            .unwrap();
        assert_eq!(camera.set, 0);
        assert_eq!(camera.binding, 0);
        assert_eq!(camera.size, 64);
        assert_eq!(camera.kind, DescriptorKind::UniformBuffer);
        assert_eq!(camera.stages, ShaderStageFlags::VERTEX);
    }

    #[test]
    fn test_dynamic_naming_convention() {
        let module = parse_wgsl(SHADER);
        let reflection = ShaderReflector::default()
            .reflect_module(&module, ShaderStage::Vertex)
            .unwrap();

        // The type name "ModelDynamic" opts the buffer into dynamic offsets.
        let model = reflection
            .buffers
            .iter()
            .find(|p| p.name == "model")
            .unwrap();
        assert_eq!(model.kind, DescriptorKind::UniformBufferDynamic);
        assert_eq!(model.size, 64);
    }

    #[test]
    fn test_dynamic_ubo_mode() {
        let module = parse_wgsl(SHADER);
        let reflector = ShaderReflector::new(ReflectOptions {
            dynamic_uniform_buffers: true,
        });
        let reflection = reflector
            .reflect_module(&module, ShaderStage::Vertex)
            .unwrap();

        for name in ["camera", "model"] {
            let param = reflection.buffers.iter().find(|p| p.name == name).unwrap();
            assert_eq!(param.kind, DescriptorKind::UniformBufferDynamic);
        }
    }

    #[test]
    fn test_unsized_storage_buffer_size_zero() {
        let module = parse_wgsl(SHADER);
        let reflection = ShaderReflector::default()
            .reflect_module(&module, ShaderStage::Fragment)
            .unwrap();

        let lights = reflection
            .buffers
            .iter()
            .find(|p| p.name == "lights")
            .unwrap();
        assert_eq!(lights.kind, DescriptorKind::StorageBuffer);
        assert_eq!(lights.size, 0);
    }

    #[test]
    fn test_image_kinds() {
        let module = parse_wgsl(SHADER);
        let reflection = ShaderReflector::default()
            .reflect_module(&module, ShaderStage::Fragment)
            .unwrap();

        let albedo = reflection
            .images
            .iter()
            .find(|p| p.name == "albedo")
            .unwrap();
        assert_eq!(albedo.kind, DescriptorKind::SampledImage);
        assert_eq!((albedo.set, albedo.binding), (1, 1));

        let sampler = reflection
            .images
            .iter()
            .find(|p| p.name == "albedo_sampler")
            .unwrap();
        assert_eq!(sampler.kind, DescriptorKind::Sampler);

        let storage = reflection
            .images
            .iter()
            .find(|p| p.name == "output_image")
            .unwrap();
        assert_eq!(storage.kind, DescriptorKind::StorageImage);
    }

    #[test]
    fn test_vertex_inputs() {
        let module = parse_wgsl(SHADER);
        let reflection = ShaderReflector::default()
            .reflect_module(&module, ShaderStage::Vertex)
            .unwrap();

        assert_eq!(reflection.inputs.len(), 3);
        assert_eq!(reflection.inputs[0].name, "inPosition");
        assert_eq!(reflection.inputs[0].location, 0);
        assert_eq!(reflection.inputs[0].components, 3);
        assert_eq!(reflection.inputs[1].name, "inUV0");
        assert_eq!(reflection.inputs[1].components, 2);
        assert_eq!(reflection.inputs[2].name, "tint");
        assert_eq!(reflection.inputs[2].components, 4);
    }

    #[test]
    fn test_non_vertex_stage_has_no_inputs() {
        let module = parse_wgsl(SHADER);
        let reflection = ShaderReflector::default()
            .reflect_module(&module, ShaderStage::Fragment)
            .unwrap();
        assert!(reflection.inputs.is_empty());
    }

    #[test]
    fn test_invalid_bytecode_is_fatal() {
        let result =
            ShaderReflector::default().reflect_spirv(&[0x01, 0x02, 0x03], ShaderStage::Vertex);
        assert!(matches!(result, Err(GraphicsError::ReflectionFailed(_))));
    }
}
