//! Shader reflection and descriptor layout synthesis.
//!
//! This module turns compiled shader modules into the data the rest of the
//! engine needs to bind resources:
//!
//! - [`ShaderReflector`] - extracts the resource surface (uniform/storage
//!   buffers, images, vertex inputs) of one shader stage
//! - [`ShaderLayoutBuilder`] - merges per-stage reflections into a single
//!   deduplicated [`ShaderLayout`] with sorted set buckets and deterministic
//!   dynamic-offset indices
//!
//! # Example
//!
//! ```ignore
//! use vermilion_graphics::shader::{ShaderLayoutBuilder, ShaderReflector, ShaderStage};
//!
//! let reflector = ShaderReflector::default();
//! let vs = reflector.reflect_spirv(&vs_bytes, ShaderStage::Vertex)?;
//! let fs = reflector.reflect_spirv(&fs_bytes, ShaderStage::Fragment)?;
//!
//! let layout = ShaderLayoutBuilder::new()
//!     .with_stage(&vs)?
//!     .with_stage(&fs)?
//!     .build()?;
//! ```

pub mod layout;
pub mod reflect;

pub use layout::{
    DescriptorKind, ImageParameter, LayoutBinding, SetLayoutInfo, ShaderLayout,
    ShaderLayoutBuilder, ShaderParameter,
};
pub use reflect::{ReflectOptions, ShaderReflector, StageReflection, VertexInput};

/// Shader stage in the graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Fragment shader.
    Fragment,
    /// Compute shader.
    Compute,
    /// Geometry shader.
    Geometry,
    /// Tessellation control shader.
    TessControl,
    /// Tessellation evaluation shader.
    TessEval,
}

impl ShaderStage {
    /// Get the stage-mask bit for this stage.
    pub fn flag(self) -> ShaderStageFlags {
        match self {
            Self::Vertex => ShaderStageFlags::VERTEX,
            Self::Fragment => ShaderStageFlags::FRAGMENT,
            Self::Compute => ShaderStageFlags::COMPUTE,
            Self::Geometry => ShaderStageFlags::GEOMETRY,
            Self::TessControl => ShaderStageFlags::TESS_CONTROL,
            Self::TessEval => ShaderStageFlags::TESS_EVAL,
        }
    }
}

bitflags::bitflags! {
    /// Shader stages that can access a binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        /// Vertex shader stage.
        const VERTEX = 1 << 0;
        /// Fragment shader stage.
        const FRAGMENT = 1 << 1;
        /// Compute shader stage.
        const COMPUTE = 1 << 2;
        /// Geometry shader stage.
        const GEOMETRY = 1 << 3;
        /// Tessellation control shader stage.
        const TESS_CONTROL = 1 << 4;
        /// Tessellation evaluation shader stage.
        const TESS_EVAL = 1 << 5;
    }
}
