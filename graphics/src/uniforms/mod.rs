//! Transient uniform storage.
//!
//! Per-frame and per-draw uniform payloads are streamed through a shared ring
//! buffer ([`ring`]) instead of individually allocated buffers. Binding sets
//! of the same category share one ring by `Arc`: materials share the material
//! ring, compute kernels share the compute ring. The ring is created by the
//! first binder of its category and dropped with the last one.

pub mod ring;

pub use ring::{HostUniformRing, RingAllocator, UniformStream};

/// Which shared ring a binding set draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RingCategory {
    /// Ring shared by all material binding sets.
    Material,
    /// Ring shared by all compute binding sets.
    Compute,
}

impl RingCategory {
    /// Fixed backing capacity of this category's ring.
    pub fn capacity(self) -> u64 {
        match self {
            Self::Material => 32 << 20,
            Self::Compute => 8 << 20,
        }
    }

    /// Debug label for the backing buffer.
    pub fn label(self) -> &'static str {
        match self {
            Self::Material => "material_uniform_ring",
            Self::Compute => "compute_uniform_ring",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_capacities() {
        assert_eq!(RingCategory::Material.capacity(), 32 * 1024 * 1024);
        assert_eq!(RingCategory::Compute.capacity(), 8 * 1024 * 1024);
    }
}
