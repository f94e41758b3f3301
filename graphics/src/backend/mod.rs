//! GPU backend layer.
//!
//! The reflection, layout, and binding modules are backend-free; this module
//! holds the code that talks to a real GPU API. Only a Vulkan backend exists,
//! behind the `vulkan-backend` feature (on by default), so the core can be
//! built and tested without a Vulkan SDK.

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;
