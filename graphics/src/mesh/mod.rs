//! Vertex input layouts derived from shader reflection.
//!
//! Reflected vertex inputs are classified against a fixed name-to-semantic
//! table; recognized attributes form the per-vertex stream and unrecognized
//! ones fall back to a generic per-instance float stream. See [`layout`].

pub mod layout;

pub use layout::{
    VertexAttribute, VertexAttributeFormat, VertexBufferBinding, VertexInputRate, VertexLayout,
    VertexSemantic, PER_INSTANCE_BINDING, PER_VERTEX_BINDING,
};
