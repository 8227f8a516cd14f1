//! Instrumented no-op backend.
//!
//! Creates ids, counts live objects and records submissions without touching
//! a GPU. The test suite asserts against its counters to verify resource
//! lifetimes, cleanup ordering and submission contents.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::backend::{
    BufferId, DescriptorPoolDesc, DescriptorPoolId, GpuBackend, PipelineCacheId, TargetSetId,
    TextureId,
};
use crate::command::{Command, CommandList};
use crate::error::GraphicsError;
use crate::types::{BufferDescriptor, TargetSetDescriptor, TextureDescriptor};

#[derive(Debug, Default)]
struct Counters {
    textures: AtomicUsize,
    buffers: AtomicUsize,
    target_sets: AtomicUsize,
    descriptor_pools: AtomicUsize,
    pipeline_caches: AtomicUsize,
}

/// A backend that allocates ids and records calls but performs no GPU work.
#[derive(Debug, Default)]
pub struct DummyBackend {
    next_id: AtomicU64,
    alive: Counters,
    wait_idle_calls: AtomicUsize,
    /// Pass names of every submitted command list, in submission order.
    submissions: Mutex<Vec<Vec<String>>>,
    pipeline_cache_blob: Mutex<Vec<u8>>,
    /// When set, descriptor pool creation fails. Used to exercise the
    /// context's initialization error path.
    fail_descriptor_pool: bool,
}

impl DummyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose descriptor pool creation always fails.
    pub fn failing_descriptor_pool() -> Self {
        Self {
            fail_descriptor_pool: true,
            ..Self::default()
        }
    }

    fn fresh_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of textures created and not yet destroyed.
    pub fn alive_textures(&self) -> usize {
        self.alive.textures.load(Ordering::SeqCst)
    }

    /// Number of buffers created and not yet destroyed.
    pub fn alive_buffers(&self) -> usize {
        self.alive.buffers.load(Ordering::SeqCst)
    }

    /// Number of target sets created and not yet destroyed.
    pub fn alive_target_sets(&self) -> usize {
        self.alive.target_sets.load(Ordering::SeqCst)
    }

    /// Number of descriptor pools created and not yet destroyed.
    pub fn alive_descriptor_pools(&self) -> usize {
        self.alive.descriptor_pools.load(Ordering::SeqCst)
    }

    /// Number of pipeline caches created and not yet destroyed.
    pub fn alive_pipeline_caches(&self) -> usize {
        self.alive.pipeline_caches.load(Ordering::SeqCst)
    }

    /// How many times `wait_idle` has been called.
    pub fn wait_idle_calls(&self) -> usize {
        self.wait_idle_calls.load(Ordering::SeqCst)
    }

    /// Pass names of every submission so far.
    pub fn submitted_pass_names(&self) -> Vec<Vec<String>> {
        self.submissions.lock().clone()
    }

    /// The current pipeline cache contents, as handed to the most recent
    /// `create_pipeline_cache` or set through [`set_pipeline_cache_blob`].
    ///
    /// [`set_pipeline_cache_blob`]: DummyBackend::set_pipeline_cache_blob
    pub fn pipeline_cache_blob(&self) -> Vec<u8> {
        self.pipeline_cache_blob.lock().clone()
    }

    /// Overwrite the pipeline cache contents, standing in for pipelines
    /// compiled while the cache was live.
    pub fn set_pipeline_cache_blob(&self, data: &[u8]) {
        *self.pipeline_cache_blob.lock() = data.to_vec();
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &str {
        "dummy"
    }

    fn create_texture(&self, _desc: &TextureDescriptor) -> Result<TextureId, GraphicsError> {
        self.alive.textures.fetch_add(1, Ordering::SeqCst);
        Ok(TextureId(self.fresh_id()))
    }

    fn destroy_texture(&self, _id: TextureId) {
        self.alive.textures.fetch_sub(1, Ordering::SeqCst);
    }

    fn create_buffer(&self, _desc: &BufferDescriptor) -> Result<BufferId, GraphicsError> {
        self.alive.buffers.fetch_add(1, Ordering::SeqCst);
        Ok(BufferId(self.fresh_id()))
    }

    fn destroy_buffer(&self, _id: BufferId) {
        self.alive.buffers.fetch_sub(1, Ordering::SeqCst);
    }

    fn write_buffer(&self, _id: BufferId, _offset: u64, _data: &[u8]) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn create_target_set(
        &self,
        desc: &TargetSetDescriptor,
        colors: &[TextureId],
        depth: Option<TextureId>,
    ) -> Result<TargetSetId, GraphicsError> {
        if colors.len() != desc.color_formats.len() || depth.is_some() != desc.depth_format.is_some()
        {
            return Err(GraphicsError::InvalidParameter(
                "target set attachments do not match descriptor".into(),
            ));
        }
        self.alive.target_sets.fetch_add(1, Ordering::SeqCst);
        Ok(TargetSetId(self.fresh_id()))
    }

    fn destroy_target_set(&self, _id: TargetSetId) {
        self.alive.target_sets.fetch_sub(1, Ordering::SeqCst);
    }

    fn create_descriptor_pool(
        &self,
        _desc: &DescriptorPoolDesc,
    ) -> Result<DescriptorPoolId, GraphicsError> {
        if self.fail_descriptor_pool {
            return Err(GraphicsError::ResourceCreationFailed(
                "descriptor pool creation disabled".into(),
            ));
        }
        self.alive.descriptor_pools.fetch_add(1, Ordering::SeqCst);
        Ok(DescriptorPoolId(self.fresh_id()))
    }

    fn destroy_descriptor_pool(&self, _id: DescriptorPoolId) {
        self.alive.descriptor_pools.fetch_sub(1, Ordering::SeqCst);
    }

    fn create_pipeline_cache(
        &self,
        initial_data: &[u8],
    ) -> Result<PipelineCacheId, GraphicsError> {
        *self.pipeline_cache_blob.lock() = initial_data.to_vec();
        self.alive.pipeline_caches.fetch_add(1, Ordering::SeqCst);
        Ok(PipelineCacheId(self.fresh_id()))
    }

    fn pipeline_cache_data(&self, _id: PipelineCacheId) -> Result<Vec<u8>, GraphicsError> {
        Ok(self.pipeline_cache_blob.lock().clone())
    }

    fn destroy_pipeline_cache(&self, _id: PipelineCacheId) {
        self.alive.pipeline_caches.fetch_sub(1, Ordering::SeqCst);
    }

    fn submit(&self, commands: &CommandList) -> Result<(), GraphicsError> {
        let names = commands
            .commands()
            .iter()
            .filter_map(|command| match command {
                Command::BeginPass { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        self.submissions.lock().push(names);
        Ok(())
    }

    fn wait_idle(&self) {
        self.wait_idle_calls.fetch_add(1, Ordering::SeqCst);
    }
}
