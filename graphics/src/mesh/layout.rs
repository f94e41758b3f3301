//! Vertex layout derivation.
//!
//! The vertex input layout of a pipeline is derived from the shader's
//! reflected vertex-stage inputs, not declared by hand:
//!
//! - Inputs whose names match the semantic table (`inPosition`, `inUV0`, ...)
//!   form the **per-vertex** group, bound at binding 0 with vertex step rate.
//! - Unrecognized inputs are classified as generic **per-instance** float
//!   attributes sized by their component count, bound at binding 1 with
//!   instance step rate. This is a logged fallback, not an error.
//!
//! Each group's stride is the sum of its attribute sizes. Final attribute
//! locations are assigned sequentially starting at 0, per-vertex group first,
//! in ascending declared-location order within each group. The sort happens
//! once, at shader-compile time.

use crate::shader::VertexInput;

/// Semantic meaning of a per-vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexSemantic {
    /// Vertex position (float3).
    Position,
    /// Texture coordinates set 0 (float2).
    UV0,
    /// Texture coordinates set 1 (float2).
    UV1,
    /// Vertex normal (float3).
    Normal,
    /// Vertex tangent (float4, w = handedness).
    Tangent,
    /// Vertex color (float3).
    Color,
    /// Bone weights for skinning (float4).
    SkinWeight,
    /// Bone indices for skinning (float4).
    SkinIndex,
    /// Packed skinning extras (float3).
    SkinPack,
    /// Custom attribute 0 (float4).
    Custom0,
    /// Custom attribute 1 (float4).
    Custom1,
    /// Custom attribute 2 (float4).
    Custom2,
    /// Custom attribute 3 (float4).
    Custom3,
}

impl VertexSemantic {
    /// Resolve a shader input variable name to a semantic.
    ///
    /// Matching is case- and underscore-insensitive, so `inPosition` and
    /// `in_position` both resolve to [`VertexSemantic::Position`].
    pub fn from_input_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "inposition" => Some(Self::Position),
            "inuv0" => Some(Self::UV0),
            "inuv1" => Some(Self::UV1),
            "innormal" => Some(Self::Normal),
            "intangent" => Some(Self::Tangent),
            "incolor" => Some(Self::Color),
            "inskinweight" => Some(Self::SkinWeight),
            "inskinindex" => Some(Self::SkinIndex),
            "inskinpack" => Some(Self::SkinPack),
            "incustom0" => Some(Self::Custom0),
            "incustom1" => Some(Self::Custom1),
            "incustom2" => Some(Self::Custom2),
            "incustom3" => Some(Self::Custom3),
            _ => None,
        }
    }

    /// The fixed format of this semantic.
    pub fn format(self) -> VertexAttributeFormat {
        match self {
            Self::Position | Self::Normal | Self::Color | Self::SkinPack => {
                VertexAttributeFormat::Float3
            }
            Self::UV0 | Self::UV1 => VertexAttributeFormat::Float2,
            Self::Tangent
            | Self::SkinWeight
            | Self::SkinIndex
            | Self::Custom0
            | Self::Custom1
            | Self::Custom2
            | Self::Custom3 => VertexAttributeFormat::Float4,
        }
    }
}

/// Format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeFormat {
    /// Single 32-bit float.
    Float,
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
}

impl VertexAttributeFormat {
    /// Size of the attribute in bytes.
    pub fn size(self) -> u32 {
        self.components() * 4
    }

    /// Number of float components.
    pub fn components(self) -> u32 {
        match self {
            Self::Float => 1,
            Self::Float2 => 2,
            Self::Float3 => 3,
            Self::Float4 => 4,
        }
    }

    /// Build a format from a component count (1-4).
    pub fn from_components(components: u32) -> Option<Self> {
        match components {
            1 => Some(Self::Float),
            2 => Some(Self::Float2),
            3 => Some(Self::Float3),
            4 => Some(Self::Float4),
            _ => None,
        }
    }
}

/// Step rate of a vertex buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexInputRate {
    /// Advance per vertex.
    Vertex,
    /// Advance per instance.
    Instance,
}

/// A finalized vertex attribute within the derived layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input variable name.
    pub name: String,
    /// Matched semantic, or `None` for generic per-instance attributes.
    pub semantic: Option<VertexSemantic>,
    /// Attribute format.
    pub format: VertexAttributeFormat,
    /// Final location (sequential, per-vertex group first).
    pub location: u32,
    /// Byte offset within the owning buffer binding.
    pub offset: u32,
    /// Buffer binding index (0 = per-vertex, 1 = per-instance).
    pub binding: u32,
}

/// One vertex buffer binding of the derived layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferBinding {
    /// Binding index.
    pub binding: u32,
    /// Stride in bytes (sum of the group's attribute sizes).
    pub stride: u32,
    /// Step rate.
    pub input_rate: VertexInputRate,
}

/// The vertex input layout derived from a shader's reflected inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    vertex_stride: u32,
    instance_stride: u32,
}

/// Per-vertex attributes live at binding 0, per-instance at binding 1.
pub const PER_VERTEX_BINDING: u32 = 0;
/// See [`PER_VERTEX_BINDING`].
pub const PER_INSTANCE_BINDING: u32 = 1;

impl VertexLayout {
    /// Derive a layout from reflected vertex inputs.
    pub fn from_inputs(inputs: &[VertexInput]) -> Self {
        let mut per_vertex: Vec<(&VertexInput, VertexSemantic)> = Vec::new();
        let mut per_instance: Vec<(&VertexInput, VertexAttributeFormat)> = Vec::new();

        for input in inputs {
            if let Some(semantic) = VertexSemantic::from_input_name(&input.name) {
                per_vertex.push((input, semantic));
            } else {
                let Some(format) = VertexAttributeFormat::from_components(input.components) else {
                    log::error!(
                        "vertex input '{}' has {} components, expected 1-4; skipping",
                        input.name,
                        input.components
                    );
                    continue;
                };
                log::warn!(
                    "vertex input '{}' has no semantic mapping, \
                     classifying as per-instance float{}",
                    input.name,
                    input.components
                );
                per_instance.push((input, format));
            }
        }

        per_vertex.sort_by_key(|(input, _)| input.location);
        per_instance.sort_by_key(|(input, _)| input.location);

        let mut attributes = Vec::with_capacity(per_vertex.len() + per_instance.len());
        let mut location = 0;

        let mut vertex_stride = 0;
        for (input, semantic) in per_vertex {
            let format = semantic.format();
            attributes.push(VertexAttribute {
                name: input.name.clone(),
                semantic: Some(semantic),
                format,
                location,
                offset: vertex_stride,
                binding: PER_VERTEX_BINDING,
            });
            vertex_stride += format.size();
            location += 1;
        }

        let mut instance_stride = 0;
        for (input, format) in per_instance {
            attributes.push(VertexAttribute {
                name: input.name.clone(),
                semantic: None,
                format,
                location,
                offset: instance_stride,
                binding: PER_INSTANCE_BINDING,
            });
            instance_stride += format.size();
            location += 1;
        }

        Self {
            attributes,
            vertex_stride,
            instance_stride,
        }
    }

    /// All attributes, per-vertex group first.
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Stride of the per-vertex buffer.
    pub fn vertex_stride(&self) -> u32 {
        self.vertex_stride
    }

    /// Stride of the per-instance buffer.
    pub fn instance_stride(&self) -> u32 {
        self.instance_stride
    }

    /// The buffer bindings this layout needs (empty groups are omitted).
    pub fn bindings(&self) -> Vec<VertexBufferBinding> {
        let mut bindings = Vec::with_capacity(2);
        if self.vertex_stride > 0 {
            bindings.push(VertexBufferBinding {
                binding: PER_VERTEX_BINDING,
                stride: self.vertex_stride,
                input_rate: VertexInputRate::Vertex,
            });
        }
        if self.instance_stride > 0 {
            bindings.push(VertexBufferBinding {
                binding: PER_INSTANCE_BINDING,
                stride: self.instance_stride,
                input_rate: VertexInputRate::Instance,
            });
        }
        bindings
    }
}
