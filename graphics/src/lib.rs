//! # Vermilion Graphics
//!
//! Shader-reflection-driven resource binding for the Vermilion renderer.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`shader`] - SPIR-V reflection and descriptor layout synthesis
//! - [`mesh`] - Vertex input layouts derived from reflected shader inputs
//! - [`uniforms`] - Ring-buffered transient uniform storage
//! - [`materials`] - The per-material/per-kernel binding state machine
//! - [`backend`] - The Vulkan backend (feature `vulkan-backend`, on by default)
//!
//! The non-backend modules never touch a GPU API, so the full binding
//! protocol is unit-testable on any machine.
//!
//! ## Example
//!
//! ```ignore
//! use vermilion_graphics::materials::BindingSet;
//! use vermilion_graphics::shader::{ShaderLayoutBuilder, ShaderReflector, ShaderStage};
//!
//! let reflector = ShaderReflector::default();
//! let layout = ShaderLayoutBuilder::new()
//!     .with_stage(&reflector.reflect_spirv(&vs_bytes, ShaderStage::Vertex)?)?
//!     .with_stage(&reflector.reflect_spirv(&fs_bytes, ShaderStage::Fragment)?)?
//!     .build()?;
//!
//! let mut bindings = BindingSet::new(layout.into(), ring);
//! let camera = bindings.uniform_handle("camera")?;
//! bindings.set_global_uniform(camera, bytemuck::bytes_of(&view_proj))?;
//! bindings.begin_frame();
//! ```

pub mod backend;
pub mod error;
pub mod materials;
pub mod mesh;
pub mod shader;
pub mod types;
pub mod uniforms;

// Re-export main types for convenience
pub use error::GraphicsError;
pub use materials::{BindingError, BindingSet, UniformHandle};
pub use shader::{
    DescriptorKind, ShaderLayout, ShaderLayoutBuilder, ShaderReflector, ShaderStage,
    ShaderStageFlags,
};
pub use types::{
    BufferBinding, BufferId, DescriptorWrite, ResourceBinding, TextureBinding, TextureId,
};
pub use uniforms::{RingAllocator, RingCategory, UniformStream};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    log::info!("Vermilion Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_ring_allocator_creation() {
        let ring = RingAllocator::new(RingCategory::Material.capacity(), 256).unwrap();
        assert_eq!(ring.capacity(), 32 * 1024 * 1024);
    }
}
