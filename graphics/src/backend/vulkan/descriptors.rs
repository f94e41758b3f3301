//! Descriptor pool, set layouts, and descriptor updates.

use ash::vk;
use ash::vk::Handle;

use crate::error::GraphicsError;
use crate::shader::{DescriptorKind, ShaderLayout};
use crate::types::{DescriptorWrite, ResourceBinding};

use super::shader::{convert_descriptor_kind, convert_stage_flags};

/// Owns the descriptor pool and builds layout objects from shader layouts.
pub struct DescriptorArena {
    device: ash::Device,
    pool: vk::DescriptorPool,
    destroyed: bool,
}

impl DescriptorArena {
    /// Create an arena with a pool sized for typical material counts.
    pub fn new(device: ash::Device) -> Result<Self, GraphicsError> {
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1000,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                descriptor_count: 1000,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLED_IMAGE,
                descriptor_count: 1000,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLER,
                descriptor_count: 1000,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: 100,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
                descriptor_count: 100,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_IMAGE,
                descriptor_count: 100,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::INPUT_ATTACHMENT,
                descriptor_count: 100,
            },
        ];

        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(1000)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!(
                "Failed to create descriptor pool: {:?}",
                e
            ))
        })?;

        Ok(Self {
            device,
            pool,
            destroyed: false,
        })
    }

    /// Create one descriptor set layout per set index in `0..=max_set`.
    ///
    /// Set indices the shader does not use get an empty layout so the
    /// pipeline layout's set array stays index-addressable.
    pub fn create_set_layouts(
        &self,
        layout: &ShaderLayout,
    ) -> Result<Vec<vk::DescriptorSetLayout>, GraphicsError> {
        let Some(max_set) = layout.max_set() else {
            return Ok(Vec::new());
        };

        let mut set_layouts = Vec::with_capacity(max_set as usize + 1);
        let mut buckets = layout.sets().iter().peekable();

        for set in 0..=max_set {
            let bindings: Vec<vk::DescriptorSetLayoutBinding> =
                match buckets.next_if(|info| info.set == set) {
                    Some(info) => info
                        .bindings
                        .iter()
                        .map(|b| {
                            vk::DescriptorSetLayoutBinding::default()
                                .binding(b.binding)
                                .descriptor_type(convert_descriptor_kind(b.kind))
                                .descriptor_count(b.count)
                                .stage_flags(convert_stage_flags(b.stages))
                        })
                        .collect(),
                    None => Vec::new(),
                };

            let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
            let set_layout =
                unsafe { self.device.create_descriptor_set_layout(&create_info, None) }.map_err(
                    |e| {
                        GraphicsError::ResourceCreationFailed(format!(
                            "Failed to create descriptor set layout for set {}: {:?}",
                            set, e
                        ))
                    },
                )?;
            set_layouts.push(set_layout);
        }

        Ok(set_layouts)
    }

    /// Create a pipeline layout referencing the set layouts in index order.
    pub fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> Result<vk::PipelineLayout, GraphicsError> {
        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts);

        unsafe { self.device.create_pipeline_layout(&create_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!(
                "Failed to create pipeline layout: {:?}",
                e
            ))
        })
    }

    /// Allocate one descriptor set per layout.
    pub fn allocate_sets(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> Result<Vec<vk::DescriptorSet>, GraphicsError> {
        if set_layouts.is_empty() {
            return Ok(Vec::new());
        }
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(set_layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!(
                "Failed to allocate descriptor sets: {:?}",
                e
            ))
        })
    }

    /// Return descriptor sets to the pool.
    pub fn free_sets(&self, sets: &[vk::DescriptorSet]) {
        if sets.is_empty() {
            return;
        }
        if let Err(e) = unsafe { self.device.free_descriptor_sets(self.pool, sets) } {
            log::error!("Failed to free descriptor sets: {:?}", e);
        }
    }

    /// Apply binding-set writes via `vkUpdateDescriptorSets`.
    ///
    /// `sets` is indexed by set number, matching [`Self::allocate_sets`].
    pub fn apply_writes(&self, sets: &[vk::DescriptorSet], writes: &[DescriptorWrite]) {
        if writes.is_empty() {
            return;
        }

        enum Info {
            Buffer(usize),
            Image(usize),
        }

        // First pass fills the info arrays; the write structs are built in a
        // second pass so the slices they point at never reallocate.
        let mut buffer_infos = Vec::with_capacity(writes.len());
        let mut image_infos = Vec::with_capacity(writes.len());
        let mut prepared = Vec::with_capacity(writes.len());

        for write in writes {
            let Some(&set) = sets.get(write.set as usize) else {
                log::error!("descriptor write targets unallocated set {}", write.set);
                continue;
            };

            let info = match write.resource {
                ResourceBinding::Buffer(binding) => {
                    buffer_infos.push(
                        vk::DescriptorBufferInfo::default()
                            .buffer(vk::Buffer::from_raw(binding.buffer.raw()))
                            .offset(binding.offset)
                            .range(binding.range),
                    );
                    Info::Buffer(buffer_infos.len() - 1)
                }
                ResourceBinding::Image(binding) => {
                    image_infos.push(match write.kind {
                        DescriptorKind::Sampler => vk::DescriptorImageInfo::default()
                            .sampler(vk::Sampler::from_raw(binding.texture.raw())),
                        DescriptorKind::StorageImage => vk::DescriptorImageInfo::default()
                            .image_view(vk::ImageView::from_raw(binding.texture.raw()))
                            .image_layout(vk::ImageLayout::GENERAL),
                        _ => vk::DescriptorImageInfo::default()
                            .image_view(vk::ImageView::from_raw(binding.texture.raw()))
                            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                    });
                    Info::Image(image_infos.len() - 1)
                }
            };
            prepared.push((set, write.binding, convert_descriptor_kind(write.kind), info));
        }

        let vk_writes: Vec<vk::WriteDescriptorSet> = prepared
            .iter()
            .map(|(set, binding, ty, info)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(*set)
                    .dst_binding(*binding)
                    .descriptor_type(*ty);
                match info {
                    Info::Buffer(i) => write.buffer_info(std::slice::from_ref(&buffer_infos[*i])),
                    Info::Image(i) => write.image_info(std::slice::from_ref(&image_infos[*i])),
                }
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&vk_writes, &[]) };
    }

    /// Destroy the pool.
    ///
    /// # Safety
    ///
    /// The caller must ensure the GPU is idle and the device is still alive.
    /// No descriptor set allocated from this arena may be used afterwards.
    pub unsafe fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        unsafe { self.device.destroy_descriptor_pool(self.pool, None) };
        self.destroyed = true;
    }
}

impl Drop for DescriptorArena {
    fn drop(&mut self) {
        if !self.destroyed {
            log::warn!(
                "DescriptorArena::drop() called without explicit destroy(). \
                 The descriptor pool has leaked."
            );
        }
    }
}
