//! The per-shader-instance binding state machine.
//!
//! A [`BindingSet`] tracks, for one material or compute kernel, which resource
//! is bound to each named shader parameter and where each dynamic uniform's
//! current payload lives in the shared uniform ring.
//!
//! Uniforms come in two flavors. A *global* uniform holds one value for the
//! whole frame (view-projection matrix and the like): its bytes are staged by
//! [`BindingSet::set_global_uniform`] and flushed to the ring once at
//! [`BindingSet::begin_frame`]. A *local* uniform varies per draw: each
//! [`BindingSet::set_local_uniform`] call between `begin_object`/`end_object`
//! takes a fresh ring allocation so draws in flight never alias each other's
//! data. Both are addressed through the same dynamic-offset array, so the
//! descriptor set is bound once and re-offset per draw.
//!
//! Frame protocol:
//!
//! ```text
//! begin_frame()                      // flush staged globals to the ring
//!   begin_object()                   // per draw
//!     set_local_uniform(handle, ..)
//!   end_object()                     // audits unset slots
//!   ... more objects ...
//! end_frame()
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::shader::{DescriptorKind, ShaderLayout};
use crate::types::{BufferBinding, BufferId, DescriptorWrite, ResourceBinding, TextureBinding};
use crate::uniforms::UniformStream;

/// Sentinel for a dynamic-offset slot no uniform write has filled yet.
pub const UNSET_OFFSET: u32 = u32::MAX;

/// A binding-protocol error.
///
/// Every variant is also logged at the call site, so release builds that
/// ignore the returned value still leave a trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// No parameter with this name exists in the shader layout.
    UnknownParameter(String),
    /// The payload length does not match the shader-declared block size.
    SizeMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },
    /// A resource setter was handed no resource.
    NullResource(String),
    /// A local-uniform write arrived outside `begin_object`/`end_object`.
    NoActiveObject,
    /// An object was begun outside `begin_frame`/`end_frame`.
    NoActiveFrame,
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownParameter(name) => write!(f, "unknown shader parameter '{name}'"),
            Self::SizeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "uniform '{name}' expects {expected} bytes, got {actual}"
            ),
            Self::NullResource(name) => write!(f, "null resource for parameter '{name}'"),
            Self::NoActiveObject => write!(f, "local uniform write outside an active object"),
            Self::NoActiveFrame => write!(f, "object begun outside an active frame"),
        }
    }
}

impl std::error::Error for BindingError {}

/// Pre-resolved identity of a dynamic uniform parameter.
///
/// Resolve once with [`BindingSet::uniform_handle`] at material setup, then
/// use the handle for all per-frame and per-object writes. The handle is the
/// parameter's dynamic index, so per-draw writes never hash a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformHandle(u32);

struct UniformSlot {
    name: String,
    set: u32,
    binding: u32,
    kind: DescriptorKind,
    size: u32,
    /// Staged bytes for global flavor, flushed at `begin_frame`.
    content: Box<[u8]>,
    global: bool,
}

struct BufferSlot {
    name: String,
    set: u32,
    binding: u32,
    kind: DescriptorKind,
    bound: Option<BufferBinding>,
}

struct ImageSlot {
    name: String,
    set: u32,
    binding: u32,
    kind: DescriptorKind,
    bound: Option<TextureBinding>,
}

/// Binding state for one material or compute kernel instance.
pub struct BindingSet {
    layout: Arc<ShaderLayout>,
    ring: Arc<dyn UniformStream>,

    /// Dynamic uniform slots, indexed by dynamic index.
    uniforms: Vec<UniformSlot>,
    uniform_names: HashMap<String, u32>,

    /// Non-dynamic buffer parameters (storage buffers).
    buffers: Vec<BufferSlot>,
    buffer_names: HashMap<String, usize>,

    images: Vec<ImageSlot>,
    image_names: HashMap<String, usize>,

    /// One offset per dynamic parameter, refreshed each `begin_frame`.
    global_offsets: Vec<u32>,
    /// Flat per-object offsets, `object_count * dynamic_count` entries.
    object_offsets: Vec<u32>,
    object_count: u32,

    frame_active: bool,
    object_active: bool,
}

impl BindingSet {
    /// Create a binding set over a shader layout and a shared uniform ring.
    pub fn new(layout: Arc<ShaderLayout>, ring: Arc<dyn UniformStream>) -> Self {
        let dynamic_count = layout.dynamic_count() as usize;
        let mut uniforms: Vec<Option<UniformSlot>> = Vec::new();
        uniforms.resize_with(dynamic_count, || None);
        let mut uniform_names = HashMap::new();
        let mut buffers = Vec::new();
        let mut buffer_names = HashMap::new();

        for param in layout.buffers() {
            match param.dynamic_index {
                Some(index) => {
                    uniform_names.insert(param.name.clone(), index);
                    uniforms[index as usize] = Some(UniformSlot {
                        name: param.name.clone(),
                        set: param.set,
                        binding: param.binding,
                        kind: param.kind,
                        size: param.size,
                        content: vec![0u8; param.size as usize].into_boxed_slice(),
                        global: false,
                    });
                }
                None => {
                    buffer_names.insert(param.name.clone(), buffers.len());
                    buffers.push(BufferSlot {
                        name: param.name.clone(),
                        set: param.set,
                        binding: param.binding,
                        kind: param.kind,
                        bound: None,
                    });
                }
            }
        }

        // Every dynamic index in 0..dynamic_count is assigned by the layout
        // builder, so the flatten preserves indexing.
        let uniforms: Vec<UniformSlot> = uniforms.into_iter().flatten().collect();
        debug_assert_eq!(uniforms.len(), dynamic_count);

        let mut images = Vec::new();
        let mut image_names = HashMap::new();
        for param in layout.images() {
            image_names.insert(param.name.clone(), images.len());
            images.push(ImageSlot {
                name: param.name.clone(),
                set: param.set,
                binding: param.binding,
                kind: param.kind,
                bound: None,
            });
        }

        Self {
            layout,
            ring,
            uniforms,
            uniform_names,
            buffers,
            buffer_names,
            images,
            image_names,
            global_offsets: vec![UNSET_OFFSET; dynamic_count],
            object_offsets: Vec::new(),
            object_count: 0,
            frame_active: false,
            object_active: false,
        }
    }

    /// The shader layout this set binds against.
    pub fn layout(&self) -> &Arc<ShaderLayout> {
        &self.layout
    }

    /// Number of dynamic parameters (length of every offset array).
    pub fn dynamic_count(&self) -> u32 {
        self.layout.dynamic_count()
    }

    /// Number of objects begun since the last `begin_frame`.
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// Resolve a dynamic uniform parameter name to a handle.
    pub fn uniform_handle(&self, name: &str) -> Result<UniformHandle, BindingError> {
        match self.uniform_names.get(name) {
            Some(&index) => Ok(UniformHandle(index)),
            None => {
                log::error!("unknown uniform parameter '{name}'");
                Err(BindingError::UnknownParameter(name.to_string()))
            }
        }
    }

    /// Stage a frame-scoped uniform value.
    ///
    /// The bytes are cached and flushed to the ring at the next
    /// [`begin_frame`](Self::begin_frame); repeated calls before then simply
    /// overwrite the cache.
    pub fn set_global_uniform(
        &mut self,
        handle: UniformHandle,
        data: &[u8],
    ) -> Result<(), BindingError> {
        // A handle resolved against another shader's binding set may be out
        // of range here; that is a caller error, not a panic.
        let Some(slot) = self.uniforms.get_mut(handle.0 as usize) else {
            log::error!("uniform handle {} does not belong to this binding set", handle.0);
            return Err(BindingError::UnknownParameter(format!("handle {}", handle.0)));
        };
        if data.len() != slot.size as usize {
            log::error!(
                "uniform '{}' expects {} bytes, got {}",
                slot.name,
                slot.size,
                data.len()
            );
            return Err(BindingError::SizeMismatch {
                name: slot.name.clone(),
                expected: slot.size,
                actual: data.len() as u32,
            });
        }
        slot.content.copy_from_slice(data);
        slot.global = true;
        Ok(())
    }

    /// Write an object-scoped uniform value.
    ///
    /// Takes a fresh ring allocation immediately and records its offset in
    /// the current object's slot. Must be called between
    /// [`begin_object`](Self::begin_object) and [`end_object`](Self::end_object).
    pub fn set_local_uniform(
        &mut self,
        handle: UniformHandle,
        data: &[u8],
    ) -> Result<(), BindingError> {
        if !self.object_active {
            log::error!("set_local_uniform called outside an active object");
            return Err(BindingError::NoActiveObject);
        }
        let Some(slot) = self.uniforms.get(handle.0 as usize) else {
            log::error!("uniform handle {} does not belong to this binding set", handle.0);
            return Err(BindingError::UnknownParameter(format!("handle {}", handle.0)));
        };
        if data.len() != slot.size as usize {
            log::error!(
                "uniform '{}' expects {} bytes, got {}",
                slot.name,
                slot.size,
                data.len()
            );
            return Err(BindingError::SizeMismatch {
                name: slot.name.clone(),
                expected: slot.size,
                actual: data.len() as u32,
            });
        }

        let offset = self.ring.write(data);
        let base = (self.object_count - 1) as usize * self.uniforms.len();
        self.object_offsets[base + handle.0 as usize] = offset;
        Ok(())
    }

    /// Name-based convenience for [`set_global_uniform`](Self::set_global_uniform).
    ///
    /// Resolves the name and delegates. Per-draw code should resolve a
    /// [`UniformHandle`] once instead.
    pub fn set_global_uniform_by_name(
        &mut self,
        name: &str,
        data: &[u8],
    ) -> Result<(), BindingError> {
        let handle = self.uniform_handle(name)?;
        self.set_global_uniform(handle, data)
    }

    /// Name-based convenience for [`set_local_uniform`](Self::set_local_uniform).
    pub fn set_local_uniform_by_name(
        &mut self,
        name: &str,
        data: &[u8],
    ) -> Result<(), BindingError> {
        let handle = self.uniform_handle(name)?;
        self.set_local_uniform(handle, data)
    }

    /// Open a frame: flush staged global uniforms to the ring.
    ///
    /// Idempotent within a frame; a second call before `end_frame` is a no-op
    /// so re-entrant render-graph passes do not double-allocate.
    pub fn begin_frame(&mut self) {
        if self.frame_active {
            return;
        }
        self.frame_active = true;
        self.object_active = false;
        self.object_count = 0;
        self.object_offsets.clear();

        for (index, slot) in self.uniforms.iter().enumerate() {
            self.global_offsets[index] = if slot.global {
                self.ring.write(&slot.content)
            } else {
                UNSET_OFFSET
            };
        }
    }

    /// Open an object: reserve its dynamic-offset block, seeded from the
    /// current global snapshot so unwritten slots inherit the frame value.
    ///
    /// Returns the object index to pass to [`dynamic_offsets`](Self::dynamic_offsets).
    pub fn begin_object(&mut self) -> Result<u32, BindingError> {
        if !self.frame_active {
            log::error!("begin_object called outside an active frame");
            return Err(BindingError::NoActiveFrame);
        }
        let index = self.object_count;
        self.object_count += 1;
        self.object_active = true;
        self.object_offsets.extend_from_slice(&self.global_offsets);
        Ok(index)
    }

    /// Close the current object and audit its dynamic slots.
    ///
    /// Slots still holding the unset sentinel are a caller error; they are
    /// logged and returned but the draw is not blocked.
    pub fn end_object(&mut self) -> Vec<&str> {
        self.object_active = false;
        if self.object_count == 0 {
            return Vec::new();
        }

        let base = (self.object_count - 1) as usize * self.uniforms.len();
        let mut unset = Vec::new();
        for (index, slot) in self.uniforms.iter().enumerate() {
            if self.object_offsets[base + index] == UNSET_OFFSET {
                log::warn!(
                    "uniform '{}' not set for object {}",
                    slot.name,
                    self.object_count - 1
                );
                unset.push(slot.name.as_str());
            }
        }
        unset
    }

    /// Close the frame. No allocation side effects.
    pub fn end_frame(&mut self) {
        if self.object_active {
            log::warn!("end_frame called with an object still active");
            self.object_active = false;
        }
        self.frame_active = false;
    }

    /// The dynamic-offset array to bind for a draw.
    ///
    /// Objects registered via `begin_object` get their own block; any other
    /// index falls back to the global offsets (draws with no per-object
    /// uniforms). The returned slice length always equals
    /// [`dynamic_count`](Self::dynamic_count).
    pub fn dynamic_offsets(&self, object_index: u32) -> &[u32] {
        let stride = self.uniforms.len();
        if object_index < self.object_count && stride > 0 {
            let base = object_index as usize * stride;
            &self.object_offsets[base..base + stride]
        } else {
            &self.global_offsets
        }
    }

    /// Bind a texture to a sampled-image parameter.
    ///
    /// Returns the descriptor write to apply, or `None` when the same texture
    /// is already bound (repeated sets across frames stay free).
    pub fn set_texture(
        &mut self,
        name: &str,
        texture: Option<TextureBinding>,
    ) -> Result<Option<DescriptorWrite>, BindingError> {
        self.set_image(name, texture, DescriptorKind::SampledImage)
    }

    /// Bind a texture to a storage-image parameter.
    pub fn set_storage_texture(
        &mut self,
        name: &str,
        texture: Option<TextureBinding>,
    ) -> Result<Option<DescriptorWrite>, BindingError> {
        self.set_image(name, texture, DescriptorKind::StorageImage)
    }

    fn set_image(
        &mut self,
        name: &str,
        texture: Option<TextureBinding>,
        expected_kind: DescriptorKind,
    ) -> Result<Option<DescriptorWrite>, BindingError> {
        let Some(&index) = self.image_names.get(name) else {
            log::error!("unknown image parameter '{name}'");
            return Err(BindingError::UnknownParameter(name.to_string()));
        };
        let slot = &mut self.images[index];
        if slot.kind != expected_kind {
            log::error!(
                "image parameter '{}' is {:?}, not {:?}",
                slot.name,
                slot.kind,
                expected_kind
            );
            return Err(BindingError::UnknownParameter(slot.name.clone()));
        }
        let Some(texture) = texture else {
            log::error!("null texture for parameter '{}'", slot.name);
            return Err(BindingError::NullResource(slot.name.clone()));
        };

        if slot.bound == Some(texture) {
            return Ok(None);
        }
        slot.bound = Some(texture);
        Ok(Some(DescriptorWrite {
            set: slot.set,
            binding: slot.binding,
            kind: slot.kind,
            resource: ResourceBinding::Image(texture),
        }))
    }

    /// Bind a buffer range to a storage-buffer parameter.
    pub fn set_storage_buffer(
        &mut self,
        name: &str,
        buffer: Option<BufferBinding>,
    ) -> Result<Option<DescriptorWrite>, BindingError> {
        let Some(&index) = self.buffer_names.get(name) else {
            log::error!("unknown buffer parameter '{name}'");
            return Err(BindingError::UnknownParameter(name.to_string()));
        };
        let slot = &mut self.buffers[index];
        let Some(buffer) = buffer else {
            log::error!("null buffer for parameter '{}'", slot.name);
            return Err(BindingError::NullResource(slot.name.clone()));
        };

        if slot.bound == Some(buffer) {
            return Ok(None);
        }
        slot.bound = Some(buffer);
        Ok(Some(DescriptorWrite {
            set: slot.set,
            binding: slot.binding,
            kind: slot.kind,
            resource: ResourceBinding::Buffer(buffer),
        }))
    }

    /// Descriptor writes pointing every dynamic uniform parameter at the
    /// shared ring buffer.
    ///
    /// Applied once right after descriptor-set allocation: each dynamic
    /// binding references the ring at base offset 0 with the parameter's
    /// declared size as range; per-draw dynamic offsets then select the
    /// actual payload.
    pub fn initial_ring_writes(&self, ring_buffer: BufferId) -> Vec<DescriptorWrite> {
        self.uniforms
            .iter()
            .map(|slot| DescriptorWrite {
                set: slot.set,
                binding: slot.binding,
                kind: slot.kind,
                resource: ResourceBinding::Buffer(BufferBinding {
                    buffer: ring_buffer,
                    offset: 0,
                    range: slot.size as u64,
                }),
            })
            .collect()
    }
}

impl fmt::Debug for BindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingSet")
            .field("dynamic_count", &self.uniforms.len())
            .field("object_count", &self.object_count)
            .field("frame_active", &self.frame_active)
            .finish()
    }
}
