//! Descriptor set layout synthesis from per-stage reflection results.
//!
//! The builder merges resource declarations across shader stages (a name
//! redeclared in another stage only extends its stage mask), partitions them
//! into per-set buckets sorted by (set, binding), and assigns dynamic-offset
//! indices in that traversal order.
//!
//! The (set, binding) traversal order is the public contract for dynamic
//! indices: the position of a dynamic parameter's offset inside the flat
//! dynamic-offsets array at bind time is exactly its index in the sorted
//! walk. It never depends on discovery or hash-map iteration order.

use std::collections::{BTreeMap, HashMap};

use crate::error::GraphicsError;

use super::reflect::StageReflection;
use super::ShaderStageFlags;

/// Kind of descriptor a shader parameter binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// Uniform buffer with a fixed offset.
    UniformBuffer,
    /// Uniform buffer addressed through a per-draw dynamic offset.
    UniformBufferDynamic,
    /// Storage buffer with a fixed offset.
    StorageBuffer,
    /// Storage buffer addressed through a per-draw dynamic offset.
    StorageBufferDynamic,
    /// Sampled image.
    SampledImage,
    /// Storage image.
    StorageImage,
    /// Subpass input attachment.
    InputAttachment,
    /// Texture sampler.
    Sampler,
}

impl DescriptorKind {
    /// Whether this kind consumes a slot in the dynamic-offsets array.
    pub fn is_dynamic(self) -> bool {
        matches!(self, Self::UniformBufferDynamic | Self::StorageBufferDynamic)
    }

    /// Whether this kind binds a buffer (as opposed to an image or sampler).
    pub fn is_buffer(self) -> bool {
        matches!(
            self,
            Self::UniformBuffer
                | Self::UniformBufferDynamic
                | Self::StorageBuffer
                | Self::StorageBufferDynamic
        )
    }
}

/// A uniform or storage buffer parameter of a shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderParameter {
    /// Parameter name (the shader variable name, unique per shader).
    pub name: String,
    /// Descriptor set index.
    pub set: u32,
    /// Binding index within the set.
    pub binding: u32,
    /// Declared byte size of the block (0 for unsized storage buffers).
    pub size: u32,
    /// Descriptor kind.
    pub kind: DescriptorKind,
    /// Stages that declare this parameter (OR across stages).
    pub stages: ShaderStageFlags,
    /// Position in the dynamic-offsets array, assigned at layout build.
    pub dynamic_index: Option<u32>,
}

impl ShaderParameter {
    /// Create a buffer parameter (dynamic index is assigned at layout build).
    pub fn new(
        name: impl Into<String>,
        set: u32,
        binding: u32,
        size: u32,
        kind: DescriptorKind,
        stages: ShaderStageFlags,
    ) -> Self {
        Self {
            name: name.into(),
            set,
            binding,
            size,
            kind,
            stages,
            dynamic_index: None,
        }
    }
}

/// An image, sampler, or input-attachment parameter of a shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageParameter {
    /// Parameter name.
    pub name: String,
    /// Descriptor set index.
    pub set: u32,
    /// Binding index within the set.
    pub binding: u32,
    /// Descriptor kind.
    pub kind: DescriptorKind,
    /// Stages that declare this parameter.
    pub stages: ShaderStageFlags,
}

impl ImageParameter {
    /// Create an image parameter.
    pub fn new(
        name: impl Into<String>,
        set: u32,
        binding: u32,
        kind: DescriptorKind,
        stages: ShaderStageFlags,
    ) -> Self {
        Self {
            name: name.into(),
            set,
            binding,
            kind,
            stages,
        }
    }
}

/// One raw binding slot of a descriptor set layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBinding {
    /// Binding index within the set.
    pub binding: u32,
    /// Descriptor kind at this slot.
    pub kind: DescriptorKind,
    /// Stages that access this slot.
    pub stages: ShaderStageFlags,
    /// Descriptor array length (always 1 in this engine).
    pub count: u32,
}

/// The binding-sorted layout of one descriptor set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetLayoutInfo {
    /// Descriptor set index.
    pub set: u32,
    /// Bindings sorted by ascending binding index.
    pub bindings: Vec<LayoutBinding>,
}

/// The finalized, immutable resource layout of a shader.
///
/// Built once at shader-compile time via [`ShaderLayoutBuilder`]; the set
/// buckets feed native descriptor-set-layout creation and the dynamic indices
/// define the draw-time dynamic-offsets array.
#[derive(Debug, Clone)]
pub struct ShaderLayout {
    buffers: Vec<ShaderParameter>,
    images: Vec<ImageParameter>,
    sets: Vec<SetLayoutInfo>,
    dynamic_count: u32,
    buffer_names: HashMap<String, usize>,
    image_names: HashMap<String, usize>,
}

impl ShaderLayout {
    /// All buffer parameters, with dynamic indices assigned.
    pub fn buffers(&self) -> &[ShaderParameter] {
        &self.buffers
    }

    /// All image/sampler parameters.
    pub fn images(&self) -> &[ImageParameter] {
        &self.images
    }

    /// Per-set binding lists, ordered by ascending set index.
    pub fn sets(&self) -> &[SetLayoutInfo] {
        &self.sets
    }

    /// Number of dynamic buffer parameters (length of the offsets array).
    pub fn dynamic_count(&self) -> u32 {
        self.dynamic_count
    }

    /// Look up a buffer parameter by name.
    pub fn buffer(&self, name: &str) -> Option<&ShaderParameter> {
        self.buffer_names.get(name).map(|&i| &self.buffers[i])
    }

    /// Look up an image parameter by name.
    pub fn image(&self, name: &str) -> Option<&ImageParameter> {
        self.image_names.get(name).map(|&i| &self.images[i])
    }

    /// Highest set index used, if any set is used at all.
    pub fn max_set(&self) -> Option<u32> {
        self.sets.last().map(|s| s.set)
    }
}

/// Where a bucket entry came from, so dynamic indices can be written back.
#[derive(Debug, Clone, Copy)]
enum Origin {
    Buffer(usize),
    Image,
}

/// Builder merging per-stage reflections into a [`ShaderLayout`].
#[derive(Debug, Default)]
pub struct ShaderLayoutBuilder {
    buffers: Vec<ShaderParameter>,
    images: Vec<ImageParameter>,
    buffer_names: HashMap<String, usize>,
    image_names: HashMap<String, usize>,
}

impl ShaderLayoutBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one stage's reflection results.
    pub fn with_stage(mut self, reflection: &StageReflection) -> Result<Self, GraphicsError> {
        for param in &reflection.buffers {
            self.merge_buffer(param.clone())?;
        }
        for param in &reflection.images {
            self.merge_image(param.clone())?;
        }
        Ok(self)
    }

    /// Add a single buffer parameter (also used for manual declarations).
    pub fn with_buffer(mut self, param: ShaderParameter) -> Result<Self, GraphicsError> {
        self.merge_buffer(param)?;
        Ok(self)
    }

    /// Add a single image parameter (also used for manual declarations,
    /// e.g. input attachments the reflection frontend does not model).
    pub fn with_image(mut self, param: ImageParameter) -> Result<Self, GraphicsError> {
        self.merge_image(param)?;
        Ok(self)
    }

    fn merge_buffer(&mut self, param: ShaderParameter) -> Result<(), GraphicsError> {
        if let Some(&i) = self.buffer_names.get(&param.name) {
            let existing = &mut self.buffers[i];
            if existing.set != param.set
                || existing.binding != param.binding
                || existing.kind != param.kind
                || existing.size != param.size
            {
                return Err(GraphicsError::LayoutConflict(format!(
                    "buffer '{}' redeclared with different metadata: \
                     (set {}, binding {}, {:?}, {} bytes) vs (set {}, binding {}, {:?}, {} bytes)",
                    param.name,
                    existing.set,
                    existing.binding,
                    existing.kind,
                    existing.size,
                    param.set,
                    param.binding,
                    param.kind,
                    param.size,
                )));
            }
            existing.stages |= param.stages;
        } else {
            self.buffer_names
                .insert(param.name.clone(), self.buffers.len());
            self.buffers.push(param);
        }
        Ok(())
    }

    fn merge_image(&mut self, param: ImageParameter) -> Result<(), GraphicsError> {
        if let Some(&i) = self.image_names.get(&param.name) {
            let existing = &mut self.images[i];
            if existing.set != param.set
                || existing.binding != param.binding
                || existing.kind != param.kind
            {
                return Err(GraphicsError::LayoutConflict(format!(
                    "image '{}' redeclared with different metadata: \
                     (set {}, binding {}, {:?}) vs (set {}, binding {}, {:?})",
                    param.name,
                    existing.set,
                    existing.binding,
                    existing.kind,
                    param.set,
                    param.binding,
                    param.kind,
                )));
            }
            existing.stages |= param.stages;
        } else {
            self.image_names
                .insert(param.name.clone(), self.images.len());
            self.images.push(param);
        }
        Ok(())
    }

    /// Finalize the layout: bucket by set, sort by binding, assign dynamic
    /// indices in traversal order.
    pub fn build(mut self) -> Result<ShaderLayout, GraphicsError> {
        // BTreeMap keeps the set buckets in ascending order regardless of
        // the order parameters were discovered in.
        let mut buckets: BTreeMap<u32, Vec<(LayoutBinding, Origin, &str)>> = BTreeMap::new();

        for (i, param) in self.buffers.iter().enumerate() {
            buckets.entry(param.set).or_default().push((
                LayoutBinding {
                    binding: param.binding,
                    kind: param.kind,
                    stages: param.stages,
                    count: 1,
                },
                Origin::Buffer(i),
                param.name.as_str(),
            ));
        }
        for param in &self.images {
            buckets.entry(param.set).or_default().push((
                LayoutBinding {
                    binding: param.binding,
                    kind: param.kind,
                    stages: param.stages,
                    count: 1,
                },
                Origin::Image,
                param.name.as_str(),
            ));
        }

        let mut sets = Vec::with_capacity(buckets.len());
        let mut dynamic_assignment: Vec<(usize, u32)> = Vec::new();
        let mut dynamic_count: u32 = 0;

        for (set, mut entries) in buckets {
            entries.sort_by_key(|(b, _, _)| b.binding);

            for pair in entries.windows(2) {
                if pair[0].0.binding == pair[1].0.binding {
                    return Err(GraphicsError::LayoutConflict(format!(
                        "parameters '{}' and '{}' both declared at (set {}, binding {})",
                        pair[0].2, pair[1].2, set, pair[0].0.binding,
                    )));
                }
            }

            let mut bindings = Vec::with_capacity(entries.len());
            for (binding, origin, _) in entries {
                if binding.kind.is_dynamic() {
                    if let Origin::Buffer(i) = origin {
                        dynamic_assignment.push((i, dynamic_count));
                        dynamic_count += 1;
                    }
                }
                bindings.push(binding);
            }

            sets.push(SetLayoutInfo { set, bindings });
        }

        for (i, index) in dynamic_assignment {
            self.buffers[i].dynamic_index = Some(index);
        }

        Ok(ShaderLayout {
            buffers: self.buffers,
            images: self.images,
            sets,
            dynamic_count,
            buffer_names: self.buffer_names,
            image_names: self.image_names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_dynamic(name: &str, set: u32, binding: u32, stages: ShaderStageFlags) -> ShaderParameter {
        ShaderParameter::new(name, set, binding, 64, DescriptorKind::UniformBufferDynamic, stages)
    }

    #[test]
    fn test_stage_mask_merge() {
        let layout = ShaderLayoutBuilder::new()
            .with_buffer(uniform_dynamic("camera", 0, 0, ShaderStageFlags::VERTEX))
            .unwrap()
            .with_buffer(uniform_dynamic("camera", 0, 0, ShaderStageFlags::FRAGMENT))
            .unwrap()
            .build()
            .unwrap();

        let param = layout.buffer("camera").unwrap();
        assert_eq!(
            param.stages,
            ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT
        );
        assert_eq!(layout.buffers().len(), 1);
    }

    #[test]
    fn test_metadata_conflict_rejected() {
        let result = ShaderLayoutBuilder::new()
            .with_buffer(uniform_dynamic("camera", 0, 0, ShaderStageFlags::VERTEX))
            .unwrap()
            .with_buffer(uniform_dynamic("camera", 0, 1, ShaderStageFlags::FRAGMENT));

        assert!(matches!(result, Err(GraphicsError::LayoutConflict(_))));
    }

    #[test]
    fn test_binding_collision_rejected() {
        let result = ShaderLayoutBuilder::new()
            .with_buffer(uniform_dynamic("camera", 0, 0, ShaderStageFlags::VERTEX))
            .unwrap()
            .with_buffer(uniform_dynamic("model", 0, 0, ShaderStageFlags::VERTEX))
            .unwrap()
            .build();

        assert!(matches!(result, Err(GraphicsError::LayoutConflict(_))));
    }

    #[test]
    fn test_dynamic_index_order() {
        let layout = ShaderLayoutBuilder::new()
            .with_buffer(uniform_dynamic("c", 1, 0, ShaderStageFlags::VERTEX))
            .unwrap()
            .with_buffer(uniform_dynamic("a", 0, 2, ShaderStageFlags::VERTEX))
            .unwrap()
            .with_buffer(uniform_dynamic("b", 0, 5, ShaderStageFlags::VERTEX))
            .unwrap()
            .build()
            .unwrap();

        // Traversal order is (set, binding) ascending: a (0,2), b (0,5), c (1,0).
        assert_eq!(layout.buffer("a").unwrap().dynamic_index, Some(0));
        assert_eq!(layout.buffer("b").unwrap().dynamic_index, Some(1));
        assert_eq!(layout.buffer("c").unwrap().dynamic_index, Some(2));
        assert_eq!(layout.dynamic_count(), 3);
    }

    #[test]
    fn test_dynamic_index_insertion_order_independent() {
        let forward = ShaderLayoutBuilder::new()
            .with_buffer(uniform_dynamic("a", 0, 0, ShaderStageFlags::VERTEX))
            .unwrap()
            .with_buffer(uniform_dynamic("b", 0, 1, ShaderStageFlags::VERTEX))
            .unwrap()
            .with_buffer(uniform_dynamic("c", 2, 0, ShaderStageFlags::VERTEX))
            .unwrap()
            .build()
            .unwrap();

        let reversed = ShaderLayoutBuilder::new()
            .with_buffer(uniform_dynamic("c", 2, 0, ShaderStageFlags::VERTEX))
            .unwrap()
            .with_buffer(uniform_dynamic("b", 0, 1, ShaderStageFlags::VERTEX))
            .unwrap()
            .with_buffer(uniform_dynamic("a", 0, 0, ShaderStageFlags::VERTEX))
            .unwrap()
            .build()
            .unwrap();

        for name in ["a", "b", "c"] {
            assert_eq!(
                forward.buffer(name).unwrap().dynamic_index,
                reversed.buffer(name).unwrap().dynamic_index,
                "dynamic index for '{name}' must not depend on insertion order"
            );
        }
    }

    #[test]
    fn test_non_dynamic_buffers_skip_dynamic_indices() {
        let layout = ShaderLayoutBuilder::new()
            .with_buffer(ShaderParameter::new(
                "lights",
                0,
                0,
                0,
                DescriptorKind::StorageBuffer,
                ShaderStageFlags::FRAGMENT,
            ))
            .unwrap()
            .with_buffer(uniform_dynamic("model", 0, 1, ShaderStageFlags::VERTEX))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(layout.buffer("lights").unwrap().dynamic_index, None);
        assert_eq!(layout.buffer("model").unwrap().dynamic_index, Some(0));
        assert_eq!(layout.dynamic_count(), 1);
    }

    #[test]
    fn test_set_buckets_sorted() {
        let layout = ShaderLayoutBuilder::new()
            .with_image(ImageParameter::new(
                "albedo",
                1,
                3,
                DescriptorKind::SampledImage,
                ShaderStageFlags::FRAGMENT,
            ))
            .unwrap()
            .with_image(ImageParameter::new(
                "normal_map",
                1,
                1,
                DescriptorKind::SampledImage,
                ShaderStageFlags::FRAGMENT,
            ))
            .unwrap()
            .with_buffer(uniform_dynamic("camera", 0, 0, ShaderStageFlags::VERTEX))
            .unwrap()
            .build()
            .unwrap();

        let sets = layout.sets();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].set, 0);
        assert_eq!(sets[1].set, 1);
        assert_eq!(sets[1].bindings[0].binding, 1);
        assert_eq!(sets[1].bindings[1].binding, 3);
        assert_eq!(layout.max_set(), Some(1));
    }
}
