//! Ring allocation for streamed uniform data.
//!
//! A ring buffer hands out monotonically advancing, alignment-respecting byte
//! ranges of a fixed backing buffer. When an allocation does not fit in the
//! remaining space the cursor wraps to offset 0 and the allocation is served
//! from the start of the buffer.
//!
//! The allocator does not track in-flight GPU reads. Correctness depends on
//! the engine's frame pacing: the GPU may lag by at most as many frames as
//! fit in the ring, i.e. frames-in-flight times per-frame allocation volume
//! must not exceed the capacity. That is a capacity-planning constraint on
//! the caller, not something the allocator enforces.
//!
//! All allocation calls for a ring happen on the single submission thread;
//! the mutex on the shared ring types exists to satisfy aliasing rules, not
//! as a concurrency feature.

use parking_lot::Mutex;

use crate::error::GraphicsError;

/// The cursor logic of a ring buffer: align, commit, wrap.
#[derive(Debug)]
pub struct RingAllocator {
    capacity: u64,
    alignment: u64,
    cursor: u64,
}

impl RingAllocator {
    /// Create an allocator over `capacity` bytes with the given minimum
    /// alignment (typically the device's uniform-buffer offset alignment).
    pub fn new(capacity: u64, alignment: u64) -> Result<Self, GraphicsError> {
        if !alignment.is_power_of_two() {
            return Err(GraphicsError::InvalidParameter(format!(
                "ring alignment must be a power of 2, got {alignment}"
            )));
        }
        if capacity == 0 {
            return Err(GraphicsError::InvalidParameter(
                "ring capacity cannot be zero".to_string(),
            ));
        }

        Ok(Self {
            capacity: align_up(capacity, alignment),
            alignment,
            cursor: 0,
        })
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Configured minimum alignment.
    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Current write cursor.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Allocate `size` bytes and return the byte offset of the range.
    ///
    /// The cursor is aligned up before the range is handed out, so the
    /// returned offset is always a multiple of the configured alignment.
    /// If the aligned range does not fit, the cursor wraps and the range is
    /// served at offset 0.
    pub fn allocate(&mut self, size: u64) -> u64 {
        debug_assert!(
            size <= self.capacity,
            "allocation of {size} bytes exceeds ring capacity {}",
            self.capacity
        );

        let aligned = align_up(self.cursor, self.alignment);
        if aligned + size <= self.capacity {
            self.cursor = aligned + size;
            aligned
        } else {
            self.cursor = size;
            0
        }
    }

    /// Reset the cursor to the start of the buffer.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Align a value up to the given alignment.
#[inline]
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// A shared destination for streamed uniform payloads.
///
/// This is the seam between the binding layer and the backing storage: the
/// host ring below backs tests and software paths, the Vulkan backend
/// provides a persistently-mapped GPU ring.
pub trait UniformStream: Send + Sync {
    /// The ring's minimum offset alignment.
    fn alignment(&self) -> u64;

    /// The ring's total capacity in bytes.
    fn capacity(&self) -> u64;

    /// Copy `data` into the ring at the next cursor position and return the
    /// byte offset it was written at.
    fn write(&self, data: &[u8]) -> u32;
}

struct HostRingState {
    allocator: RingAllocator,
    bytes: Box<[u8]>,
}

/// A host-memory uniform ring.
pub struct HostUniformRing {
    state: Mutex<HostRingState>,
}

impl HostUniformRing {
    /// Create a host ring with the given capacity and alignment.
    pub fn new(capacity: u64, alignment: u64) -> Result<Self, GraphicsError> {
        let allocator = RingAllocator::new(capacity, alignment)?;
        let bytes = vec![0u8; allocator.capacity() as usize].into_boxed_slice();
        Ok(Self {
            state: Mutex::new(HostRingState { allocator, bytes }),
        })
    }

    /// Read back `len` bytes at `offset`.
    pub fn read(&self, offset: u64, len: usize) -> Vec<u8> {
        let state = self.state.lock();
        state.bytes[offset as usize..offset as usize + len].to_vec()
    }
}

impl UniformStream for HostUniformRing {
    fn alignment(&self) -> u64 {
        self.state.lock().allocator.alignment()
    }

    fn capacity(&self) -> u64 {
        self.state.lock().allocator.capacity()
    }

    fn write(&self, data: &[u8]) -> u32 {
        let mut state = self.state.lock();
        let offset = state.allocator.allocate(data.len() as u64) as usize;
        state.bytes[offset..offset + data.len()].copy_from_slice(data);
        offset as u32
    }
}

impl std::fmt::Debug for HostUniformRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HostUniformRing")
            .field("capacity", &state.allocator.capacity())
            .field("alignment", &state.allocator.alignment())
            .field("cursor", &state.allocator.cursor())
            .finish()
    }
}

static_assertions::assert_impl_all!(HostUniformRing: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_allocations_are_aligned() {
        let mut ring = RingAllocator::new(4096, 256).unwrap();
        for size in [1, 17, 100, 255, 256, 300] {
            let offset = ring.allocate(size);
            assert_eq!(offset % 256, 0, "offset {offset} not aligned");
        }
    }

    #[test]
    fn test_consecutive_allocations_do_not_overlap() {
        let mut ring = RingAllocator::new(4096, 64).unwrap();
        let a = ring.allocate(100);
        let b = ring.allocate(100);
        let c = ring.allocate(100);
        assert!(a + 100 <= b);
        assert!(b + 100 <= c);
    }

    #[test]
    fn test_wrap_returns_zero() {
        // Capacity 1024, alignment 256: 900 then 200 must wrap to exactly 0.
        let mut ring = RingAllocator::new(1024, 256).unwrap();
        assert_eq!(ring.allocate(900), 0);
        assert_eq!(ring.allocate(200), 0);
        assert_eq!(ring.cursor(), 200);
    }

    #[rstest]
    #[case(0, 256, 0)]
    #[case(1, 256, 256)]
    #[case(255, 256, 256)]
    #[case(256, 256, 256)]
    #[case(257, 256, 512)]
    #[case(100, 64, 128)]
    fn test_align_up(#[case] value: u64, #[case] alignment: u64, #[case] expected: u64) {
        assert_eq!(align_up(value, alignment), expected);
    }

    #[test]
    fn test_invalid_alignment_rejected() {
        assert!(RingAllocator::new(1024, 100).is_err());
        assert!(RingAllocator::new(0, 256).is_err());
    }

    #[test]
    fn test_host_ring_round_trip() {
        let ring = HostUniformRing::new(1024, 256).unwrap();
        let payload: Vec<u8> = (0..64).collect();
        let offset = ring.write(&payload);
        assert_eq!(offset % 256, 0);
        assert_eq!(ring.read(offset as u64, 64), payload);
    }

    #[test]
    fn test_host_ring_distinct_offsets() {
        let ring = HostUniformRing::new(4096, 256).unwrap();
        let a = ring.write(&[1u8; 64]);
        let b = ring.write(&[2u8; 64]);
        assert_ne!(a, b);
        assert_eq!(ring.read(a as u64, 64), vec![1u8; 64]);
        assert_eq!(ring.read(b as u64, 64), vec![2u8; 64]);
    }
}
