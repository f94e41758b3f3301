//! Shader module creation and stage conversions.

use ash::vk;

use crate::error::GraphicsError;
use crate::shader::{DescriptorKind, ShaderStage, ShaderStageFlags};

/// Create a Vulkan shader module from SPIR-V words.
pub fn create_shader_module(
    device: &ash::Device,
    spirv: &[u32],
) -> Result<vk::ShaderModule, GraphicsError> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(spirv);

    unsafe { device.create_shader_module(&create_info, None) }.map_err(|e| {
        GraphicsError::ResourceCreationFailed(format!("Failed to create shader module: {:?}", e))
    })
}

/// Convert a descriptor kind to the Vulkan descriptor type.
pub(crate) fn convert_descriptor_kind(kind: DescriptorKind) -> vk::DescriptorType {
    match kind {
        DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorKind::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorKind::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        DescriptorKind::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorKind::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorKind::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
        DescriptorKind::Sampler => vk::DescriptorType::SAMPLER,
    }
}

/// Convert a stage mask to Vulkan stage flags.
pub(crate) fn convert_stage_flags(flags: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut result = vk::ShaderStageFlags::empty();
    if flags.contains(ShaderStageFlags::VERTEX) {
        result |= vk::ShaderStageFlags::VERTEX;
    }
    if flags.contains(ShaderStageFlags::FRAGMENT) {
        result |= vk::ShaderStageFlags::FRAGMENT;
    }
    if flags.contains(ShaderStageFlags::COMPUTE) {
        result |= vk::ShaderStageFlags::COMPUTE;
    }
    if flags.contains(ShaderStageFlags::GEOMETRY) {
        result |= vk::ShaderStageFlags::GEOMETRY;
    }
    if flags.contains(ShaderStageFlags::TESS_CONTROL) {
        result |= vk::ShaderStageFlags::TESSELLATION_CONTROL;
    }
    if flags.contains(ShaderStageFlags::TESS_EVAL) {
        result |= vk::ShaderStageFlags::TESSELLATION_EVALUATION;
    }
    result
}

/// Convert a single stage to Vulkan stage flags (pipeline stage create info).
pub(crate) fn convert_stage(stage: ShaderStage) -> vk::ShaderStageFlags {
    convert_stage_flags(stage.flag())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_kind_conversion() {
        assert_eq!(
            convert_descriptor_kind(DescriptorKind::UniformBufferDynamic),
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
        );
        assert_eq!(
            convert_descriptor_kind(DescriptorKind::SampledImage),
            vk::DescriptorType::SAMPLED_IMAGE
        );
    }

    #[test]
    fn test_stage_flag_conversion() {
        let mask = ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT;
        assert_eq!(
            convert_stage_flags(mask),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(
            convert_stage(ShaderStage::Compute),
            vk::ShaderStageFlags::COMPUTE
        );
    }
}
