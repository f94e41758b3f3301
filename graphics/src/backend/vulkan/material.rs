//! Material and compute-kernel GPU objects.
//!
//! These types tie the backend-free [`BindingSet`] to the native objects it
//! drives: descriptor set layouts, allocated descriptor sets, the pipeline,
//! and the shared uniform ring. Resource setters drain the binding set's
//! [`DescriptorWrite`](crate::types::DescriptorWrite)s straight into
//! `vkUpdateDescriptorSets`; draw recording binds the descriptor sets with
//! the per-object dynamic-offset slice.

use std::sync::Arc;

use ash::vk;

use crate::error::GraphicsError;
use crate::materials::{BindingError, BindingSet};
use crate::mesh::VertexLayout;
use crate::shader::ShaderLayout;
use crate::types::{BufferBinding, TextureBinding};

use super::descriptors::DescriptorArena;
use super::pipeline::PipelineFactory;
use super::ring::VulkanUniformRing;

struct LayoutObjects {
    set_layouts: Vec<vk::DescriptorSetLayout>,
    pipeline_layout: vk::PipelineLayout,
    descriptor_sets: Vec<vk::DescriptorSet>,
}

/// Create set layouts, the pipeline layout, and the descriptor sets for one
/// shader, and point every dynamic uniform binding at the ring buffer.
fn create_layout_objects(
    arena: &DescriptorArena,
    layout: &ShaderLayout,
    binding_set: &BindingSet,
    ring: &VulkanUniformRing,
) -> Result<LayoutObjects, GraphicsError> {
    let set_layouts = arena.create_set_layouts(layout)?;
    let pipeline_layout = arena.create_pipeline_layout(&set_layouts)?;
    let descriptor_sets = arena.allocate_sets(&set_layouts)?;

    arena.apply_writes(
        &descriptor_sets,
        &binding_set.initial_ring_writes(ring.buffer_id()),
    );

    Ok(LayoutObjects {
        set_layouts,
        pipeline_layout,
        descriptor_sets,
    })
}

unsafe fn destroy_layout_objects(
    device: &ash::Device,
    arena: &DescriptorArena,
    objects: &mut LayoutObjects,
) {
    arena.free_sets(&objects.descriptor_sets);
    objects.descriptor_sets.clear();
    unsafe { device.destroy_pipeline_layout(objects.pipeline_layout, None) };
    for set_layout in objects.set_layouts.drain(..) {
        unsafe { device.destroy_descriptor_set_layout(set_layout, None) };
    }
}

/// A drawable material: graphics pipeline plus binding state.
pub struct VulkanMaterial {
    device: ash::Device,
    objects: LayoutObjects,
    pipeline: vk::Pipeline,
    binding_set: BindingSet,
    ring: Arc<VulkanUniformRing>,
    destroyed: bool,
}

impl VulkanMaterial {
    /// Create the material's native objects against a shader layout.
    ///
    /// Any native creation failure is fatal for the material; nothing
    /// half-built is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: ash::Device,
        arena: &DescriptorArena,
        factory: &PipelineFactory,
        layout: Arc<ShaderLayout>,
        ring: Arc<VulkanUniformRing>,
        vertex_module: vk::ShaderModule,
        vertex_entry: &str,
        fragment_module: Option<vk::ShaderModule>,
        fragment_entry: &str,
        vertex_layout: &VertexLayout,
        render_pass: vk::RenderPass,
        color_attachment_count: u32,
    ) -> Result<Self, GraphicsError> {
        let binding_set = BindingSet::new(layout.clone(), ring.clone());
        let objects = create_layout_objects(arena, &layout, &binding_set, &ring)?;

        let pipeline = factory.create_graphics(
            vertex_module,
            vertex_entry,
            fragment_module,
            fragment_entry,
            vertex_layout,
            objects.pipeline_layout,
            render_pass,
            color_attachment_count,
        );

        let pipeline = match pipeline {
            Ok(pipeline) => pipeline,
            Err(e) => {
                let mut objects = objects;
                unsafe { destroy_layout_objects(&device, arena, &mut objects) };
                return Err(e);
            }
        };

        Ok(Self {
            device,
            objects,
            pipeline,
            binding_set,
            ring,
            destroyed: false,
        })
    }

    /// The binding set driving this material's uniforms.
    pub fn binding_set(&self) -> &BindingSet {
        &self.binding_set
    }

    /// Mutable access for the frame/object protocol.
    pub fn binding_set_mut(&mut self) -> &mut BindingSet {
        &mut self.binding_set
    }

    /// The shared uniform ring backing this material.
    pub fn ring(&self) -> &Arc<VulkanUniformRing> {
        &self.ring
    }

    /// The graphics pipeline.
    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// The pipeline layout.
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.objects.pipeline_layout
    }

    /// Bind a texture parameter, updating the descriptor set if it changed.
    pub fn set_texture(
        &mut self,
        arena: &DescriptorArena,
        name: &str,
        texture: Option<TextureBinding>,
    ) -> Result<(), BindingError> {
        if let Some(write) = self.binding_set.set_texture(name, texture)? {
            arena.apply_writes(&self.objects.descriptor_sets, &[write]);
        }
        Ok(())
    }

    /// Bind a storage-buffer parameter.
    pub fn set_storage_buffer(
        &mut self,
        arena: &DescriptorArena,
        name: &str,
        buffer: Option<BufferBinding>,
    ) -> Result<(), BindingError> {
        if let Some(write) = self.binding_set.set_storage_buffer(name, buffer)? {
            arena.apply_writes(&self.objects.descriptor_sets, &[write]);
        }
        Ok(())
    }

    /// Record pipeline and descriptor-set binds for one draw.
    ///
    /// # Safety
    ///
    /// `command_buffer` must be in the recording state inside a render pass
    /// compatible with this material's pipeline.
    pub unsafe fn bind(&self, command_buffer: vk::CommandBuffer, object_index: u32) {
        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.objects.pipeline_layout,
                0,
                &self.objects.descriptor_sets,
                self.binding_set.dynamic_offsets(object_index),
            );
        }
    }

    /// Destroy the material's native objects.
    ///
    /// # Safety
    ///
    /// The caller must ensure the GPU is idle and the device is still alive.
    pub unsafe fn destroy(&mut self, arena: &DescriptorArena) {
        if self.destroyed {
            return;
        }
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            destroy_layout_objects(&self.device, arena, &mut self.objects);
        }
        self.destroyed = true;
    }
}

impl Drop for VulkanMaterial {
    fn drop(&mut self) {
        if !self.destroyed {
            log::warn!(
                "VulkanMaterial::drop() called without explicit destroy(). \
                 Pipeline and layout objects have leaked."
            );
        }
    }
}

/// A dispatchable compute kernel: compute pipeline plus binding state.
pub struct VulkanComputeKernel {
    device: ash::Device,
    objects: LayoutObjects,
    pipeline: vk::Pipeline,
    binding_set: BindingSet,
    ring: Arc<VulkanUniformRing>,
    destroyed: bool,
}

impl VulkanComputeKernel {
    /// Create the kernel's native objects against a shader layout.
    pub fn new(
        device: ash::Device,
        arena: &DescriptorArena,
        factory: &PipelineFactory,
        layout: Arc<ShaderLayout>,
        ring: Arc<VulkanUniformRing>,
        module: vk::ShaderModule,
        entry_point: &str,
    ) -> Result<Self, GraphicsError> {
        let binding_set = BindingSet::new(layout.clone(), ring.clone());
        let objects = create_layout_objects(arena, &layout, &binding_set, &ring)?;

        let pipeline = match factory.create_compute(module, entry_point, objects.pipeline_layout) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                let mut objects = objects;
                unsafe { destroy_layout_objects(&device, arena, &mut objects) };
                return Err(e);
            }
        };

        Ok(Self {
            device,
            objects,
            pipeline,
            binding_set,
            ring,
            destroyed: false,
        })
    }

    /// The binding set driving this kernel's uniforms.
    pub fn binding_set(&self) -> &BindingSet {
        &self.binding_set
    }

    /// Mutable access for the frame/object protocol.
    pub fn binding_set_mut(&mut self) -> &mut BindingSet {
        &mut self.binding_set
    }

    /// The shared uniform ring backing this kernel.
    pub fn ring(&self) -> &Arc<VulkanUniformRing> {
        &self.ring
    }

    /// Bind a storage-image parameter.
    pub fn set_storage_texture(
        &mut self,
        arena: &DescriptorArena,
        name: &str,
        texture: Option<TextureBinding>,
    ) -> Result<(), BindingError> {
        if let Some(write) = self.binding_set.set_storage_texture(name, texture)? {
            arena.apply_writes(&self.objects.descriptor_sets, &[write]);
        }
        Ok(())
    }

    /// Bind a storage-buffer parameter.
    pub fn set_storage_buffer(
        &mut self,
        arena: &DescriptorArena,
        name: &str,
        buffer: Option<BufferBinding>,
    ) -> Result<(), BindingError> {
        if let Some(write) = self.binding_set.set_storage_buffer(name, buffer)? {
            arena.apply_writes(&self.objects.descriptor_sets, &[write]);
        }
        Ok(())
    }

    /// Record a dispatch with the given object's dynamic offsets.
    ///
    /// # Safety
    ///
    /// `command_buffer` must be in the recording state, outside a render pass.
    pub unsafe fn dispatch(
        &self,
        command_buffer: vk::CommandBuffer,
        object_index: u32,
        group_counts: [u32; 3],
    ) {
        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.pipeline,
            );
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.objects.pipeline_layout,
                0,
                &self.objects.descriptor_sets,
                self.binding_set.dynamic_offsets(object_index),
            );
            self.device.cmd_dispatch(
                command_buffer,
                group_counts[0],
                group_counts[1],
                group_counts[2],
            );
        }
    }

    /// Destroy the kernel's native objects.
    ///
    /// # Safety
    ///
    /// The caller must ensure the GPU is idle and the device is still alive.
    pub unsafe fn destroy(&mut self, arena: &DescriptorArena) {
        if self.destroyed {
            return;
        }
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            destroy_layout_objects(&self.device, arena, &mut self.objects);
        }
        self.destroyed = true;
    }
}

impl Drop for VulkanComputeKernel {
    fn drop(&mut self) {
        if !self.destroyed {
            log::warn!(
                "VulkanComputeKernel::drop() called without explicit destroy(). \
                 Pipeline and layout objects have leaked."
            );
        }
    }
}
