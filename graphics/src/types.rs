//! Opaque resource identities consumed by the binding layer.
//!
//! The binding set never talks to the GPU directly; it tracks which buffer or
//! image is bound to each shader parameter by identity and hands the backend
//! [`DescriptorWrite`] records describing what actually changed. Identity
//! comparison is what lets repeated `set_texture` calls with the same resource
//! skip the native descriptor update.

use crate::shader::DescriptorKind;

/// Unique identifier for a GPU buffer.
///
/// Wraps the raw native handle value (e.g. a `vk::Buffer` via `Handle::as_raw`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(u64);

impl BufferId {
    /// Create a buffer ID from a raw native handle.
    pub fn from_raw(handle: u64) -> Self {
        Self(handle)
    }

    /// Get the raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Unique identifier for a GPU texture view (or sampler, for sampler bindings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(u64);

impl TextureId {
    /// Create a texture ID from a raw native handle.
    pub fn from_raw(handle: u64) -> Self {
        Self(handle)
    }

    /// Get the raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A buffer bound to a shader parameter: identity plus the visible byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferBinding {
    /// The buffer identity.
    pub buffer: BufferId,
    /// Byte offset of the visible range.
    pub offset: u64,
    /// Size of the visible range in bytes.
    pub range: u64,
}

impl BufferBinding {
    /// Bind the whole buffer starting at offset 0.
    pub fn whole(buffer: BufferId, size: u64) -> Self {
        Self {
            buffer,
            offset: 0,
            range: size,
        }
    }
}

/// A texture (image view) bound to a shader parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureBinding {
    /// The texture view identity.
    pub texture: TextureId,
}

impl TextureBinding {
    /// Create a texture binding.
    pub fn new(texture: TextureId) -> Self {
        Self { texture }
    }
}

/// The resource side of a descriptor write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceBinding {
    /// A buffer range.
    Buffer(BufferBinding),
    /// A texture view or sampler.
    Image(TextureBinding),
}

/// A pending native descriptor update.
///
/// Produced by the binding set whenever a bound resource actually changes;
/// the backend turns these into `vkUpdateDescriptorSets` (or equivalent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorWrite {
    /// Descriptor set index.
    pub set: u32,
    /// Binding index within the set.
    pub binding: u32,
    /// Descriptor kind of the target parameter.
    pub kind: DescriptorKind,
    /// The resource to write.
    pub resource: ResourceBinding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_binding_whole() {
        let binding = BufferBinding::whole(BufferId::from_raw(7), 256);
        assert_eq!(binding.offset, 0);
        assert_eq!(binding.range, 256);
        assert_eq!(binding.buffer.raw(), 7);
    }

    #[test]
    fn test_identity_comparison() {
        let a = TextureBinding::new(TextureId::from_raw(1));
        let b = TextureBinding::new(TextureId::from_raw(1));
        let c = TextureBinding::new(TextureId::from_raw(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
