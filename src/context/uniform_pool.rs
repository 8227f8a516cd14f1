//! Per-frame uniform upload pools.
//!
//! Uniform data for a frame is suballocated from a single large buffer with a
//! bump pointer. The context keeps one pool per frame slot and resets a slot
//! when its frame is known complete, so allocations never need individual
//! frees.

use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::error::GraphicsError;
use crate::resources::Buffer;
use crate::types::{BufferDescriptor, BufferUsage};

/// Minimum alignment for uniform suballocations, matching the common GPU
/// requirement for dynamic uniform offsets.
pub const DEFAULT_UNIFORM_ALIGNMENT: u64 = 256;

fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// A suballocation within a frame's uniform pool.
#[derive(Debug, Clone)]
pub struct UniformAllocation {
    /// The pool's backing buffer.
    pub buffer: Arc<Buffer>,
    /// Byte offset of the allocation within the buffer.
    pub offset: u64,
    /// Size of the allocation in bytes.
    pub size: u64,
}

/// Bump allocator over a single uniform buffer.
pub(crate) struct UniformPool {
    buffer: Arc<Buffer>,
    capacity: u64,
    head: u64,
}

impl UniformPool {
    pub fn new(
        backend: &dyn GpuBackend,
        capacity: u64,
        label: &str,
    ) -> Result<Self, GraphicsError> {
        let descriptor = BufferDescriptor::new(capacity, BufferUsage::UNIFORM | BufferUsage::COPY_DST)
            .with_label(label);
        let id = backend.create_buffer(&descriptor)?;
        Ok(Self {
            buffer: Arc::new(Buffer::new(id, descriptor, None)),
            capacity,
            head: 0,
        })
    }

    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    /// Reserve `size` bytes at the default uniform alignment.
    pub fn allocate(&mut self, size: u64) -> Result<UniformAllocation, GraphicsError> {
        self.allocate_aligned(size, DEFAULT_UNIFORM_ALIGNMENT)
    }

    /// Reserve `size` bytes aligned to `alignment`.
    pub fn allocate_aligned(
        &mut self,
        size: u64,
        alignment: u64,
    ) -> Result<UniformAllocation, GraphicsError> {
        let offset = align_up(self.head, alignment);
        if offset + size > self.capacity {
            return Err(GraphicsError::ResourceCreationFailed(format!(
                "uniform pool exhausted: {} of {} bytes used, {} requested",
                self.head, self.capacity, size
            )));
        }
        self.head = offset + size;
        Ok(UniformAllocation {
            buffer: self.buffer.clone(),
            offset,
            size,
        })
    }

    /// Discard all allocations. Valid once the frame using them completed.
    pub fn reset(&mut self) {
        self.head = 0;
    }
}
