//! GPU-backed uniform rings.
//!
//! A [`VulkanUniformRing`] is one persistently-mapped `CpuToGpu` buffer
//! fronted by a [`RingAllocator`]. The [`RingPool`] hands out one shared ring
//! per [`RingCategory`]: the first binder of a category creates the ring,
//! later binders upgrade the cached weak reference, and the ring's memory is
//! released with the last `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::types::BufferId;
use crate::uniforms::{RingAllocator, RingCategory, UniformStream};

struct RingState {
    allocator: RingAllocator,
    allocation: Option<Allocation>,
}

/// A persistently-mapped GPU uniform ring.
pub struct VulkanUniformRing {
    device: ash::Device,
    buffer: vk::Buffer,
    category: RingCategory,
    state: Mutex<RingState>,
}

impl VulkanUniformRing {
    /// Create the ring buffer for a category.
    ///
    /// `alignment` is the device's `min_uniform_buffer_offset_alignment`
    /// limit. The backing memory is `CpuToGpu` and stays mapped for the
    /// ring's whole lifetime.
    pub fn new(
        device: ash::Device,
        allocator: &mut Allocator,
        category: RingCategory,
        alignment: u64,
    ) -> Result<Self, GraphicsError> {
        let ring_allocator = RingAllocator::new(category.capacity(), alignment)?;

        let buffer_info = vk::BufferCreateInfo::default()
            .size(ring_allocator.capacity())
            .usage(vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::STORAGE_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!(
                "Failed to create {} buffer: {:?}",
                category.label(),
                e
            ))
        })?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let allocation = allocator
            .allocate(&AllocationCreateDesc {
                name: category.label(),
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                log::error!("Failed to allocate {} memory: {}", category.label(), e);
                GraphicsError::OutOfMemory
            })?;

        unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) }
            .map_err(|e| {
                GraphicsError::ResourceCreationFailed(format!(
                    "Failed to bind {} memory: {:?}",
                    category.label(),
                    e
                ))
            })?;

        if allocation.mapped_ptr().is_none() {
            return Err(GraphicsError::Internal(format!(
                "{} memory is not host-mapped",
                category.label()
            )));
        }

        Ok(Self {
            device,
            buffer,
            category,
            state: Mutex::new(RingState {
                allocator: ring_allocator,
                allocation: Some(allocation),
            }),
        })
    }

    /// The ring's category.
    pub fn category(&self) -> RingCategory {
        self.category
    }

    /// The raw backing buffer.
    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    /// The backing buffer's identity, for descriptor writes.
    pub fn buffer_id(&self) -> BufferId {
        BufferId::from_raw(self.buffer.as_raw())
    }

    /// Release the buffer and its memory.
    ///
    /// # Safety
    ///
    /// The caller must ensure the GPU no longer reads the ring and that the
    /// device is still alive.
    pub unsafe fn destroy(&self, allocator: &mut Allocator) {
        let allocation = self.state.lock().allocation.take();
        if let Some(allocation) = allocation {
            if let Err(e) = allocator.free(allocation) {
                log::error!("Failed to free {} memory: {}", self.category.label(), e);
            }
            unsafe { self.device.destroy_buffer(self.buffer, None) };
        }
    }
}

impl UniformStream for VulkanUniformRing {
    fn alignment(&self) -> u64 {
        self.state.lock().allocator.alignment()
    }

    fn capacity(&self) -> u64 {
        self.state.lock().allocator.capacity()
    }

    fn write(&self, data: &[u8]) -> u32 {
        let mut state = self.state.lock();
        let state = &mut *state;
        let offset = state.allocator.allocate(data.len() as u64) as usize;

        match state.allocation.as_mut().and_then(|a| a.mapped_slice_mut()) {
            Some(mapped) => mapped[offset..offset + data.len()].copy_from_slice(data),
            // Mapping was validated at creation; reachable only after destroy().
            None => log::error!("write to destroyed {}", self.category.label()),
        }
        offset as u32
    }
}

impl Drop for VulkanUniformRing {
    fn drop(&mut self) {
        if self.state.lock().allocation.is_some() {
            log::warn!(
                "VulkanUniformRing::drop() called without explicit destroy(). \
                 The {} buffer has leaked.",
                self.category.label()
            );
        }
    }
}

impl std::fmt::Debug for VulkanUniformRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanUniformRing")
            .field("category", &self.category)
            .field("capacity", &self.state.lock().allocator.capacity())
            .finish()
    }
}

/// Lazily creates and shares one uniform ring per category.
#[derive(Debug, Default)]
pub struct RingPool {
    rings: Mutex<HashMap<RingCategory, Weak<VulkanUniformRing>>>,
}

impl RingPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the shared ring for a category, creating it on first use.
    pub fn get_or_create(
        &self,
        device: &ash::Device,
        allocator: &mut Allocator,
        category: RingCategory,
        alignment: u64,
    ) -> Result<Arc<VulkanUniformRing>, GraphicsError> {
        let mut rings = self.rings.lock();

        if let Some(ring) = rings.get(&category).and_then(Weak::upgrade) {
            return Ok(ring);
        }

        let ring = Arc::new(VulkanUniformRing::new(
            device.clone(),
            allocator,
            category,
            alignment,
        )?);
        rings.insert(category, Arc::downgrade(&ring));
        Ok(ring)
    }
}
