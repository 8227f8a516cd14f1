//! GPU context.
//!
//! [`GpuContext`] owns the backend and everything with a device-wide
//! lifetime: the descriptor pool, the pipeline cache, the bindless index
//! tables, the per-frame uniform pools and the deferred cleanup queue.
//! Render graphs borrow the context to create resources and submit work.

mod cleanup;
mod uniform_pool;

pub use cleanup::CleanupListener;
pub use uniform_pool::{UniformAllocation, DEFAULT_UNIFORM_ALIGNMENT};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{DescriptorPoolDesc, DescriptorPoolId, GpuBackend, PipelineCacheId};
use crate::bindless::IndexAllocator;
use crate::command::CommandList;
use crate::error::GraphicsError;
use crate::resources::{Buffer, TargetSet, Texture};
use crate::types::{BufferDescriptor, BufferUsage, TargetSetDescriptor, TextureDescriptor, TextureUsage};

use self::cleanup::CleanupQueue;
use self::uniform_pool::UniformPool;

/// Configuration for creating a [`GpuContext`].
#[derive(Debug, Clone)]
pub struct GpuContextDesc {
    /// Number of frames that may be recorded before the oldest completes.
    pub frames_in_flight: usize,
    /// Capacity of each per-frame uniform pool in bytes.
    pub uniform_pool_size: u64,
    /// Descriptor pool sizing.
    pub descriptor_pool: DescriptorPoolDesc,
    /// Where to load and save the pipeline cache blob. Disk failures are
    /// logged and otherwise ignored.
    pub pipeline_cache_path: Option<PathBuf>,
}

impl Default for GpuContextDesc {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            uniform_pool_size: 4 * 1024 * 1024,
            descriptor_pool: DescriptorPoolDesc::default(),
            pipeline_cache_path: None,
        }
    }
}

impl GpuContextDesc {
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        assert!(frames >= 1);
        self.frames_in_flight = frames;
        self
    }

    pub fn with_uniform_pool_size(mut self, size: u64) -> Self {
        self.uniform_pool_size = size;
        self
    }

    pub fn with_pipeline_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pipeline_cache_path = Some(path.into());
        self
    }
}

/// Device-wide graphics state shared by all render graphs.
pub struct GpuContext {
    backend: Arc<dyn GpuBackend>,
    descriptor_pool: DescriptorPoolId,
    pipeline_cache: PipelineCacheId,
    pipeline_cache_path: Option<PathBuf>,
    /// Serializes backend submissions and fences cleanup against them.
    submit_lock: Mutex<()>,
    /// Serializes whole cleanup drains.
    cleanup_lock: Mutex<()>,
    cleanup: CleanupQueue,
    uniform_pools: Vec<Mutex<UniformPool>>,
    current_pool: AtomicUsize,
    active_render_views: AtomicU32,
    view_counter: AtomicU64,
    sampled_indices: Arc<Mutex<IndexAllocator>>,
    storage_indices: Arc<Mutex<IndexAllocator>>,
    /// True while a drain is running. Cleanup tasks that destroy further
    /// resources re-enter [`GpuContext::add_deferred_cleanup`] on the drain
    /// thread; they must only enqueue, never start a nested drain, because
    /// the drain already holds the submission lock.
    draining: AtomicBool,
    shut_down: AtomicBool,
}

impl GpuContext {
    /// Create a context on the given backend.
    pub fn new(desc: GpuContextDesc, backend: Arc<dyn GpuBackend>) -> Result<Arc<Self>, GraphicsError> {
        log::info!("initializing gpu context on backend '{}'", backend.name());

        let descriptor_pool = backend.create_descriptor_pool(&desc.descriptor_pool)?;

        let cache_blob = desc
            .pipeline_cache_path
            .as_ref()
            .and_then(|path| match std::fs::read(path) {
                Ok(blob) => {
                    log::debug!("loaded pipeline cache blob ({} bytes)", blob.len());
                    Some(blob)
                }
                Err(err) => {
                    log::debug!("no pipeline cache blob: {}", err);
                    None
                }
            })
            .unwrap_or_default();

        let pipeline_cache = match backend.create_pipeline_cache(&cache_blob) {
            Ok(cache) => cache,
            Err(err) => {
                backend.destroy_descriptor_pool(descriptor_pool);
                return Err(err);
            }
        };

        let mut uniform_pools = Vec::with_capacity(desc.frames_in_flight);
        for slot in 0..desc.frames_in_flight {
            let label = format!("uniform_pool_{}", slot);
            match UniformPool::new(backend.as_ref(), desc.uniform_pool_size, &label) {
                Ok(pool) => uniform_pools.push(Mutex::new(pool)),
                Err(err) => {
                    for pool in &uniform_pools {
                        backend.destroy_buffer(pool.lock().buffer().id());
                    }
                    backend.destroy_pipeline_cache(pipeline_cache);
                    backend.destroy_descriptor_pool(descriptor_pool);
                    return Err(err);
                }
            }
        }

        let sampled_capacity = desc.descriptor_pool.sampled_image_capacity;
        let storage_capacity = desc.descriptor_pool.storage_capacity;
        Ok(Arc::new(Self {
            backend,
            descriptor_pool,
            pipeline_cache,
            pipeline_cache_path: desc.pipeline_cache_path,
            submit_lock: Mutex::new(()),
            cleanup_lock: Mutex::new(()),
            cleanup: CleanupQueue::new(),
            uniform_pools,
            current_pool: AtomicUsize::new(0),
            active_render_views: AtomicU32::new(0),
            view_counter: AtomicU64::new(0),
            sampled_indices: Arc::new(Mutex::new(IndexAllocator::new(
                "sampled",
                0,
                sampled_capacity,
            ))),
            storage_indices: Arc::new(Mutex::new(IndexAllocator::new(
                "storage",
                0,
                storage_capacity,
            ))),
            draining: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }))
    }

    /// The backend the context was created on.
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// The context-wide descriptor pool.
    pub fn descriptor_pool(&self) -> DescriptorPoolId {
        self.descriptor_pool
    }

    /// Number of render views currently alive.
    pub fn active_render_views(&self) -> u32 {
        self.active_render_views.load(Ordering::SeqCst)
    }

    /// Create a texture. Textures with `TEXTURE_BINDING` usage receive a slot
    /// in the bindless sampled-image table.
    pub fn create_texture(&self, desc: TextureDescriptor) -> Result<Arc<Texture>, GraphicsError> {
        let bindless = if desc.usage.contains(TextureUsage::TEXTURE_BINDING) {
            Some(self.sampled_indices.lock().alloc()?)
        } else {
            None
        };
        match self.backend.create_texture(&desc) {
            Ok(id) => Ok(Arc::new(Texture::new(id, desc, bindless))),
            Err(err) => {
                if let Some(index) = bindless {
                    self.sampled_indices.lock().free(index);
                }
                Err(err)
            }
        }
    }

    /// Schedule a texture for destruction once in-flight work completes.
    pub fn destroy_texture(&self, texture: Arc<Texture>) {
        let backend = self.backend.clone();
        let sampled = self.sampled_indices.clone();
        self.add_deferred_cleanup(Box::new(move || {
            if let Some(index) = texture.bindless_index() {
                sampled.lock().free(index);
            }
            backend.destroy_texture(texture.id());
        }));
    }

    /// Create a buffer. Buffers with `STORAGE` usage receive a slot in the
    /// bindless storage table.
    pub fn create_buffer(&self, desc: BufferDescriptor) -> Result<Arc<Buffer>, GraphicsError> {
        let bindless = if desc.usage.contains(BufferUsage::STORAGE) {
            Some(self.storage_indices.lock().alloc()?)
        } else {
            None
        };
        match self.backend.create_buffer(&desc) {
            Ok(id) => Ok(Arc::new(Buffer::new(id, desc, bindless))),
            Err(err) => {
                if let Some(index) = bindless {
                    self.storage_indices.lock().free(index);
                }
                Err(err)
            }
        }
    }

    /// Schedule a buffer for destruction once in-flight work completes.
    pub fn destroy_buffer(&self, buffer: Arc<Buffer>) {
        let backend = self.backend.clone();
        let storage = self.storage_indices.clone();
        self.add_deferred_cleanup(Box::new(move || {
            if let Some(index) = buffer.bindless_index() {
                storage.lock().free(index);
            }
            backend.destroy_buffer(buffer.id());
        }));
    }

    /// Create a target set, creating its attachment textures first.
    pub fn create_target_set(
        &self,
        desc: TargetSetDescriptor,
    ) -> Result<Arc<TargetSet>, GraphicsError> {
        let usage = TextureUsage::RENDER_ATTACHMENT | desc.attachment_usage;
        let mut colors: Vec<Arc<Texture>> = Vec::with_capacity(desc.color_formats.len());

        let unwind = |context: &Self, created: &[Arc<Texture>]| {
            for texture in created {
                if let Some(index) = texture.bindless_index() {
                    context.sampled_indices.lock().free(index);
                }
                context.backend.destroy_texture(texture.id());
            }
        };

        for (index, format) in desc.color_formats.iter().enumerate() {
            let mut texture_desc =
                TextureDescriptor::new_2d(desc.width, desc.height, *format, usage)
                    .with_sample_count(desc.sample_count);
            if let Some(label) = &desc.label {
                texture_desc = texture_desc.with_label(format!("{}_color{}", label, index));
            }
            match self.create_texture(texture_desc) {
                Ok(texture) => colors.push(texture),
                Err(err) => {
                    unwind(self, &colors);
                    return Err(err);
                }
            }
        }

        let depth = match desc.depth_format {
            Some(format) => {
                let mut texture_desc =
                    TextureDescriptor::new_2d(desc.width, desc.height, format, usage)
                        .with_sample_count(desc.sample_count);
                if let Some(label) = &desc.label {
                    texture_desc = texture_desc.with_label(format!("{}_depth", label));
                }
                match self.create_texture(texture_desc) {
                    Ok(texture) => Some(texture),
                    Err(err) => {
                        unwind(self, &colors);
                        return Err(err);
                    }
                }
            }
            None => None,
        };

        let color_ids: Vec<_> = colors.iter().map(|texture| texture.id()).collect();
        let depth_id = depth.as_ref().map(|texture| texture.id());
        match self.backend.create_target_set(&desc, &color_ids, depth_id) {
            Ok(id) => Ok(Arc::new(TargetSet::new(id, desc, colors, depth))),
            Err(err) => {
                if let Some(texture) = &depth {
                    unwind(self, std::slice::from_ref(texture));
                }
                unwind(self, &colors);
                Err(err)
            }
        }
    }

    /// Schedule a target set and its attachments for destruction once
    /// in-flight work completes.
    pub fn destroy_target_set(&self, target_set: Arc<TargetSet>) {
        let backend = self.backend.clone();
        let sampled = self.sampled_indices.clone();
        self.add_deferred_cleanup(Box::new(move || {
            backend.destroy_target_set(target_set.id());
            let depth = target_set.depth().cloned();
            for texture in target_set.colors().iter().chain(depth.iter()) {
                if let Some(index) = texture.bindless_index() {
                    sampled.lock().free(index);
                }
                backend.destroy_texture(texture.id());
            }
        }));
    }

    /// Queue a cleanup task.
    ///
    /// With no render views alive the task (and everything else pending) runs
    /// immediately; otherwise it waits for the next [`perform_cleanup`] or
    /// for the last view to end.
    ///
    /// [`perform_cleanup`]: GpuContext::perform_cleanup
    pub fn add_deferred_cleanup(&self, task: Box<dyn FnOnce() + Send>) {
        self.cleanup.enqueue(task);
        if self.draining.load(Ordering::SeqCst) {
            // Called from inside a running drain; that drain's loop picks
            // the new entry up before it returns.
            return;
        }
        if self.active_render_views() == 0 {
            // Nothing is in flight, so pending pool suballocations are dead;
            // reset the pools before destruction runs against them.
            self.flush_uniform_pools();
            self.perform_cleanup();
        }
    }

    fn flush_uniform_pools(&self) {
        for pool in &self.uniform_pools {
            pool.lock().reset();
        }
    }

    /// Register a listener notified after each cleanup drain that ran tasks.
    pub fn add_cleanup_listener(&self, listener: CleanupListener) {
        self.cleanup.add_listener(listener);
    }

    /// Wait for the device to go idle and run all pending cleanup tasks.
    pub fn perform_cleanup(&self) {
        // Taking the submission lock first keeps new submissions from
        // slipping in between wait_idle and the drain.
        let _submit_guard = self.submit_lock.lock();
        let _cleanup_guard = self.cleanup_lock.lock();
        if self.cleanup.is_empty() {
            return;
        }
        self.backend.wait_idle();
        self.draining.store(true, Ordering::SeqCst);
        let executed = self.cleanup.drain();
        self.draining.store(false, Ordering::SeqCst);
        log::debug!("deferred cleanup ran {} tasks", executed);
    }

    /// Begin a frame. The returned guard keeps the frame's uniform pool slot
    /// alive; cleanup runs when the last guard drops.
    pub fn begin_render_view(self: &Arc<Self>) -> RenderView {
        let frame = self.view_counter.fetch_add(1, Ordering::SeqCst);
        let slot = (frame as usize) % self.uniform_pools.len();
        self.uniform_pools[slot].lock().reset();
        self.current_pool.store(slot, Ordering::SeqCst);
        self.active_render_views.fetch_add(1, Ordering::SeqCst);
        RenderView {
            context: self.clone(),
            frame,
        }
    }

    /// Upload uniform data into the current frame's pool.
    pub fn allocate_uniforms(&self, data: &[u8]) -> Result<UniformAllocation, GraphicsError> {
        let slot = self.current_pool.load(Ordering::SeqCst);
        let allocation = self.uniform_pools[slot].lock().allocate(data.len() as u64)?;
        self.backend
            .write_buffer(allocation.buffer.id(), allocation.offset, data)?;
        Ok(allocation)
    }

    /// Submit a recorded command list.
    pub fn submit(&self, commands: &CommandList) -> Result<(), GraphicsError> {
        let _guard = self.submit_lock.lock();
        self.backend.submit(commands)
    }

    fn save_pipeline_cache(&self) {
        let Some(path) = &self.pipeline_cache_path else {
            return;
        };
        match self.backend.pipeline_cache_data(self.pipeline_cache) {
            Ok(blob) => {
                if let Err(err) = std::fs::write(path, &blob) {
                    log::warn!("failed to save pipeline cache: {}", err);
                }
            }
            Err(err) => log::warn!("failed to serialize pipeline cache: {}", err),
        }
    }

    /// Tear the context down: wait for idle, run remaining cleanup, save the
    /// pipeline cache and destroy the context-owned objects.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        assert_eq!(
            self.active_render_views(),
            0,
            "shutdown with render views still alive"
        );
        self.backend.wait_idle();
        self.draining.store(true, Ordering::SeqCst);
        self.cleanup.drain();
        self.draining.store(false, Ordering::SeqCst);
        self.save_pipeline_cache();
        for pool in &self.uniform_pools {
            self.backend.destroy_buffer(pool.lock().buffer().id());
        }
        self.backend.destroy_pipeline_cache(self.pipeline_cache);
        self.backend.destroy_descriptor_pool(self.descriptor_pool);
        log::info!("gpu context shut down");
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// RAII guard for a frame being recorded.
///
/// Deferred cleanup stays queued while any view is alive; dropping the last
/// view triggers a cleanup pass.
pub struct RenderView {
    context: Arc<GpuContext>,
    frame: u64,
}

impl RenderView {
    /// The context the view was begun on.
    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    /// Monotonic index of the frame this view records.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

impl Drop for RenderView {
    fn drop(&mut self) {
        let remaining = self.context.active_render_views.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && !self.context.cleanup.is_empty() {
            self.context.perform_cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    fn test_context(backend: Arc<DummyBackend>) -> Arc<GpuContext> {
        GpuContext::new(GpuContextDesc::default(), backend).unwrap()
    }

    #[test]
    fn test_init_failure_leaks_nothing() {
        let backend = Arc::new(DummyBackend::failing_descriptor_pool());
        let result = GpuContext::new(GpuContextDesc::default(), backend.clone());
        assert!(result.is_err());
        assert_eq!(backend.alive_descriptor_pools(), 0);
        assert_eq!(backend.alive_buffers(), 0);
        assert_eq!(backend.alive_pipeline_caches(), 0);
    }

    #[test]
    fn test_cleanup_is_immediate_without_views() {
        let backend = Arc::new(DummyBackend::new());
        let context = test_context(backend.clone());
        let base = backend.alive_textures();

        let texture = context
            .create_texture(TextureDescriptor::new_2d(
                64,
                64,
                crate::types::TextureFormat::Rgba8Unorm,
                TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap();
        assert_eq!(backend.alive_textures(), base + 1);
        context.destroy_texture(texture);
        assert_eq!(backend.alive_textures(), base);
    }

    #[test]
    fn test_cleanup_waits_for_last_view() {
        let backend = Arc::new(DummyBackend::new());
        let context = test_context(backend.clone());
        let base = backend.alive_textures();

        let view = context.begin_render_view();
        let texture = context
            .create_texture(TextureDescriptor::new_2d(
                64,
                64,
                crate::types::TextureFormat::Rgba8Unorm,
                TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap();
        let idle_before = backend.wait_idle_calls();
        context.destroy_texture(texture);
        // The view is alive, so destruction is still pending.
        assert_eq!(backend.alive_textures(), base + 1);
        assert_eq!(backend.wait_idle_calls(), idle_before);

        drop(view);
        assert_eq!(backend.alive_textures(), base);
        assert!(backend.wait_idle_calls() > idle_before);
    }

    #[test]
    fn test_bindless_slot_returns_on_destroy() {
        let backend = Arc::new(DummyBackend::new());
        let context = test_context(backend);

        let desc = TextureDescriptor::new_2d(
            4,
            4,
            crate::types::TextureFormat::Rgba8Unorm,
            TextureUsage::TEXTURE_BINDING,
        );
        let a = context.create_texture(desc.clone()).unwrap();
        let slot_a = a.bindless_index().unwrap();
        context.destroy_texture(a);
        // No views alive, so the slot is free again and gets reused.
        let b = context.create_texture(desc).unwrap();
        assert_eq!(b.bindless_index().unwrap(), slot_a);
        context.destroy_texture(b);
    }

    #[test]
    fn test_target_set_creates_and_destroys_attachments() {
        let backend = Arc::new(DummyBackend::new());
        let context = test_context(backend.clone());
        let base = backend.alive_textures();

        let target_set = context
            .create_target_set(
                TargetSetDescriptor::new(128, 128)
                    .with_color(crate::types::TextureFormat::Rgba16Float)
                    .with_depth(crate::types::TextureFormat::Depth32Float)
                    .with_label("gbuffer"),
            )
            .unwrap();
        assert_eq!(backend.alive_textures(), base + 2);
        assert_eq!(backend.alive_target_sets(), 1);

        context.destroy_target_set(target_set);
        assert_eq!(backend.alive_textures(), base);
        assert_eq!(backend.alive_target_sets(), 0);
    }

    #[test]
    fn test_cleanup_task_may_destroy_further_resources() {
        let backend = Arc::new(DummyBackend::new());
        let context = test_context(backend.clone());
        let base = backend.alive_textures();

        let desc = TextureDescriptor::new_2d(
            64,
            64,
            crate::types::TextureFormat::Rgba8Unorm,
            TextureUsage::TEXTURE_BINDING,
        );
        let outer = context.create_texture(desc.clone()).unwrap();
        let inner = context.create_texture(desc).unwrap();
        assert_eq!(backend.alive_textures(), base + 2);

        let view = context.begin_render_view();
        let destroyer = context.clone();
        context.add_deferred_cleanup(Box::new(move || {
            destroyer.destroy_texture(inner);
        }));
        context.destroy_texture(outer);
        assert_eq!(backend.alive_textures(), base + 2);

        // Ending the view drains both the queued tasks and the destruction
        // requested from inside one of them, in a single pass.
        drop(view);
        assert_eq!(backend.alive_textures(), base);
    }

    #[test]
    fn test_pipeline_cache_round_trips_through_disk() {
        let path = std::env::temp_dir().join(format!(
            "vermilion_pipeline_cache_{}.bin",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let desc = GpuContextDesc::default().with_pipeline_cache_path(&path);

        let backend = Arc::new(DummyBackend::new());
        let context = GpuContext::new(desc.clone(), backend.clone()).unwrap();
        // A missing blob is a cold start, not an error.
        assert!(backend.pipeline_cache_blob().is_empty());
        backend.set_pipeline_cache_blob(b"compiled_pipelines");
        context.shutdown();
        assert_eq!(std::fs::read(&path).unwrap(), &b"compiled_pipelines"[..]);

        // A fresh context on the same path starts from the saved blob.
        let backend = Arc::new(DummyBackend::new());
        let context = GpuContext::new(desc, backend.clone()).unwrap();
        assert_eq!(backend.pipeline_cache_blob(), &b"compiled_pipelines"[..]);
        context.shutdown();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_shutdown_releases_context_objects() {
        let backend = Arc::new(DummyBackend::new());
        let context = test_context(backend.clone());
        context.shutdown();
        assert_eq!(backend.alive_buffers(), 0);
        assert_eq!(backend.alive_descriptor_pools(), 0);
        assert_eq!(backend.alive_pipeline_caches(), 0);
    }
}
