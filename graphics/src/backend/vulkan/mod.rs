//! Native Vulkan backend using ash.
//!
//! Owns every `vk::*` object in the crate: shader modules, descriptor set
//! layouts and pools, pipelines, and the GPU-backed uniform ring. All types
//! here follow the same teardown discipline: an explicit `unsafe destroy()`
//! that must run while the device is alive, and a `Drop` that only warns if
//! teardown was skipped.

pub mod descriptors;
pub mod material;
pub mod pipeline;
pub mod ring;
pub mod shader;

pub use descriptors::DescriptorArena;
pub use material::{VulkanComputeKernel, VulkanMaterial};
pub use pipeline::{PipelineFactory, MAX_COLOR_ATTACHMENTS};
pub use ring::{RingPool, VulkanUniformRing};
pub use shader::create_shader_module;
