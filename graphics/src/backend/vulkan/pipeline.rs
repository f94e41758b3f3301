//! Graphics and compute pipeline creation.

use std::ffi::CString;

use ash::vk;

use crate::error::GraphicsError;
use crate::mesh::{VertexAttributeFormat, VertexInputRate, VertexLayout};
use crate::shader::ShaderStage;

use super::shader::convert_stage;

/// Maximum number of color attachments a graphics pipeline targets.
pub const MAX_COLOR_ATTACHMENTS: u32 = 8;

/// Builds pipeline objects with the engine's fixed-function defaults.
///
/// Every graphics pipeline uses triangle-list topology, back-face culling
/// with clockwise front face, depth test and write with `LESS_OR_EQUAL`,
/// single-sample rasterization, blend-disabled RGBA writes per attachment,
/// and dynamic viewport/scissor. Materials that need anything else do not
/// exist in this engine.
pub struct PipelineFactory {
    device: ash::Device,
}

impl PipelineFactory {
    /// Create a factory for the given device.
    pub fn new(device: ash::Device) -> Self {
        Self { device }
    }

    /// Create a graphics pipeline.
    #[allow(clippy::too_many_arguments)]
    pub fn create_graphics(
        &self,
        vertex_module: vk::ShaderModule,
        vertex_entry: &str,
        fragment_module: Option<vk::ShaderModule>,
        fragment_entry: &str,
        vertex_layout: &VertexLayout,
        pipeline_layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
        color_attachment_count: u32,
    ) -> Result<vk::Pipeline, GraphicsError> {
        if color_attachment_count > MAX_COLOR_ATTACHMENTS {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} color attachments requested, at most {} supported",
                color_attachment_count, MAX_COLOR_ATTACHMENTS
            )));
        }

        let vertex_entry_c = CString::new(vertex_entry).map_err(|e| {
            GraphicsError::InvalidParameter(format!("Invalid vertex entry point name: {}", e))
        })?;
        let fragment_entry_c = CString::new(fragment_entry).map_err(|e| {
            GraphicsError::InvalidParameter(format!("Invalid fragment entry point name: {}", e))
        })?;

        let mut shader_stages = vec![vk::PipelineShaderStageCreateInfo::default()
            .stage(convert_stage(ShaderStage::Vertex))
            .module(vertex_module)
            .name(&vertex_entry_c)];

        if let Some(fragment_module) = fragment_module {
            shader_stages.push(
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(convert_stage(ShaderStage::Fragment))
                    .module(fragment_module)
                    .name(&fragment_entry_c),
            );
        }

        let binding_descriptions: Vec<vk::VertexInputBindingDescription> = vertex_layout
            .bindings()
            .iter()
            .map(|binding| {
                vk::VertexInputBindingDescription::default()
                    .binding(binding.binding)
                    .stride(binding.stride)
                    .input_rate(match binding.input_rate {
                        VertexInputRate::Vertex => vk::VertexInputRate::VERTEX,
                        VertexInputRate::Instance => vk::VertexInputRate::INSTANCE,
                    })
            })
            .collect();

        let attribute_descriptions: Vec<vk::VertexInputAttributeDescription> = vertex_layout
            .attributes()
            .iter()
            .map(|attr| {
                vk::VertexInputAttributeDescription::default()
                    .location(attr.location)
                    .binding(attr.binding)
                    .format(convert_vertex_format(attr.format))
                    .offset(attr.offset)
            })
            .collect();

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        // Clockwise front face matches the negative-viewport-height Y flip.
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = (0
            ..color_attachment_count)
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::default()
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
                    .blend_enable(false)
            })
            .collect();

        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_, e)| {
            GraphicsError::ResourceCreationFailed(format!(
                "Failed to create graphics pipeline: {:?}",
                e
            ))
        })?;

        Ok(pipelines[0])
    }

    /// Create a compute pipeline.
    pub fn create_compute(
        &self,
        module: vk::ShaderModule,
        entry_point: &str,
        pipeline_layout: vk::PipelineLayout,
    ) -> Result<vk::Pipeline, GraphicsError> {
        let entry_c = CString::new(entry_point).map_err(|e| {
            GraphicsError::InvalidParameter(format!("Invalid compute entry point name: {}", e))
        })?;

        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(convert_stage(ShaderStage::Compute))
            .module(module)
            .name(&entry_c);

        let pipeline_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(pipeline_layout);

        let pipelines = unsafe {
            self.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_, e)| {
            GraphicsError::ResourceCreationFailed(format!(
                "Failed to create compute pipeline: {:?}",
                e
            ))
        })?;

        Ok(pipelines[0])
    }
}

/// Convert a vertex attribute format to the Vulkan format.
fn convert_vertex_format(format: VertexAttributeFormat) -> vk::Format {
    match format {
        VertexAttributeFormat::Float => vk::Format::R32_SFLOAT,
        VertexAttributeFormat::Float2 => vk::Format::R32G32_SFLOAT,
        VertexAttributeFormat::Float3 => vk::Format::R32G32B32_SFLOAT,
        VertexAttributeFormat::Float4 => vk::Format::R32G32B32A32_SFLOAT,
    }
}
