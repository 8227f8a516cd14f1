//! GPU backend abstraction.
//!
//! Everything above this layer works with opaque ids and descriptors; the
//! backend owns the concrete API objects. [`DummyBackend`] is a fully
//! instrumented no-op implementation used by the test suite.

mod dummy;

pub use dummy::DummyBackend;

use crate::command::CommandList;
use crate::error::GraphicsError;
use crate::types::{BufferDescriptor, TargetSetDescriptor, TextureDescriptor};

macro_rules! backend_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u64);
    };
}

backend_id!(
    /// Backend identifier for a texture.
    TextureId
);
backend_id!(
    /// Backend identifier for a buffer.
    BufferId
);
backend_id!(
    /// Backend identifier for a target set.
    TargetSetId
);
backend_id!(
    /// Backend identifier for a descriptor pool.
    DescriptorPoolId
);
backend_id!(
    /// Backend identifier for a pipeline cache.
    PipelineCacheId
);

/// Descriptor for the context-wide descriptor pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolDesc {
    /// Maximum number of descriptor sets the pool can serve.
    pub max_sets: u32,
    /// Capacity of the sampled-image bindless table.
    pub sampled_image_capacity: u32,
    /// Capacity of the storage-resource bindless table.
    pub storage_capacity: u32,
}

impl Default for DescriptorPoolDesc {
    fn default() -> Self {
        Self {
            max_sets: 4096,
            sampled_image_capacity: 16 * 1024,
            storage_capacity: 16 * 1024,
        }
    }
}

/// Interface every GPU backend implements.
///
/// All methods take `&self`; implementations handle their own interior
/// synchronization. Destruction methods must only be called once the
/// resource is no longer referenced by in-flight work, which the cleanup
/// queue guarantees by waiting for device idle first.
pub trait GpuBackend: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<TextureId, GraphicsError>;
    fn destroy_texture(&self, id: TextureId);

    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<BufferId, GraphicsError>;
    fn destroy_buffer(&self, id: BufferId);

    /// Write bytes into a buffer at the given offset.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), GraphicsError>;

    /// Create a target set from already-created attachment textures.
    fn create_target_set(
        &self,
        desc: &TargetSetDescriptor,
        colors: &[TextureId],
        depth: Option<TextureId>,
    ) -> Result<TargetSetId, GraphicsError>;
    fn destroy_target_set(&self, id: TargetSetId);

    fn create_descriptor_pool(
        &self,
        desc: &DescriptorPoolDesc,
    ) -> Result<DescriptorPoolId, GraphicsError>;
    fn destroy_descriptor_pool(&self, id: DescriptorPoolId);

    /// Create a pipeline cache, seeded with a previously saved blob if any.
    fn create_pipeline_cache(&self, initial_data: &[u8])
        -> Result<PipelineCacheId, GraphicsError>;
    /// Serialize the pipeline cache for saving to disk.
    fn pipeline_cache_data(&self, id: PipelineCacheId) -> Result<Vec<u8>, GraphicsError>;
    fn destroy_pipeline_cache(&self, id: PipelineCacheId);

    /// Submit a recorded command list for execution.
    fn submit(&self, commands: &CommandList) -> Result<(), GraphicsError>;

    /// Block until all submitted work has completed.
    fn wait_idle(&self);
}
