use crate::backend::BufferId;
use crate::types::BufferDescriptor;

/// A GPU buffer.
#[derive(Debug)]
pub struct Buffer {
    pub(crate) id: BufferId,
    descriptor: BufferDescriptor,
    /// Slot in the bindless storage table, when the usage asks for one.
    bindless_index: Option<u32>,
}

impl Buffer {
    pub(crate) fn new(
        id: BufferId,
        descriptor: BufferDescriptor,
        bindless_index: Option<u32>,
    ) -> Self {
        Self {
            id,
            descriptor,
            bindless_index,
        }
    }

    /// The backend id of the buffer.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The descriptor the buffer was created from.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Size of the buffer in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// The buffer's slot in the bindless storage table, if it has one.
    pub fn bindless_index(&self) -> Option<u32> {
        self.bindless_index
    }
}
