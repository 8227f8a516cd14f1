//! Dependency-driven render graph.
//!
//! Each frame, passes are declared with the resources they read and the one
//! resource they write; the graph derives an execution order from those
//! declarations, allocates transient resources with allocation reuse between
//! non-overlapping live ranges, resolves every handle and records the pass
//! closures into a [`CommandList`]. Building consumes the frame: passes and
//! transient declarations are cleared, persistent target sets survive.

mod handle;
mod image_context;
mod pass;
mod schedule;

pub use handle::{Handle, HandleKind};
pub use image_context::{ImageGraphContext, MAX_TECHNIQUE_FLAGS};
pub use pass::{BuildFn, PassOutput, RenderPass};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::command::{Command, CommandList, PassAttachments};
use crate::context::GpuContext;
use crate::error::GraphicsError;
use crate::resources::{Buffer, TargetSet, Texture};
use crate::types::{BufferDescriptor, TargetSetDescriptor, TextureDescriptor};

/// Which of the two slots of a persistent target set to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingPong {
    /// The slot written this frame.
    Current,
    /// The slot written last frame.
    Previous,
}

/// Both slots of a persistent target set, addressed for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoubleBufferedTarget {
    /// The slot written last frame.
    pub previous: Handle,
    /// The slot written this frame.
    pub current: Handle,
}

/// Counts from the most recent build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub passes: usize,
    pub transient_textures: usize,
    pub transient_buffers: usize,
    pub transient_target_sets: usize,
    /// Transient allocations served by reusing an earlier one.
    pub reused_allocations: usize,
}

/// Handle-to-resource mapping for one built frame.
#[derive(Default)]
pub struct ResolvedResources {
    textures: HashMap<Handle, Arc<Texture>>,
    buffers: HashMap<Handle, Arc<Buffer>>,
    target_sets: HashMap<Handle, Arc<TargetSet>>,
}

impl ResolvedResources {
    pub fn texture(&self, handle: Handle) -> Option<&Arc<Texture>> {
        self.textures.get(&handle)
    }

    pub fn buffer(&self, handle: Handle) -> Option<&Arc<Buffer>> {
        self.buffers.get(&handle)
    }

    pub fn target_set(&self, handle: Handle) -> Option<&Arc<TargetSet>> {
        self.target_sets.get(&handle)
    }
}

/// Recording interface handed to pass build closures.
///
/// Resolves the handles declared on the graph to live resources and appends
/// commands to the frame's command list.
pub struct RecordContext<'a> {
    commands: &'a mut CommandList,
    resolved: &'a ResolvedResources,
    context: &'a GpuContext,
    width: u32,
    height: u32,
}

impl<'a> RecordContext<'a> {
    /// The context the frame is built against.
    pub fn context(&self) -> &GpuContext {
        self.context
    }

    /// Width of the frame's presentation output.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the frame's presentation output.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolved(&self) -> &ResolvedResources {
        self.resolved
    }

    pub fn texture(&self, handle: Handle) -> Result<&Arc<Texture>, GraphicsError> {
        self.resolved.texture(handle).ok_or_else(|| {
            GraphicsError::UnresolvedHandle(format!("no texture for {:?}", handle))
        })
    }

    pub fn buffer(&self, handle: Handle) -> Result<&Arc<Buffer>, GraphicsError> {
        self.resolved
            .buffer(handle)
            .ok_or_else(|| GraphicsError::UnresolvedHandle(format!("no buffer for {:?}", handle)))
    }

    pub fn target_set(&self, handle: Handle) -> Result<&Arc<TargetSet>, GraphicsError> {
        self.resolved.target_set(handle).ok_or_else(|| {
            GraphicsError::UnresolvedHandle(format!("no target set for {:?}", handle))
        })
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.commands.push(Command::SetViewport { width, height });
    }

    pub fn bind_vertex_buffer(&mut self, slot: u32, buffer: &Buffer) {
        self.commands.push(Command::BindVertexBuffer {
            slot,
            buffer: buffer.id(),
        });
    }

    pub fn bind_index_buffer(&mut self, buffer: &Buffer) {
        self.commands
            .push(Command::BindIndexBuffer { buffer: buffer.id() });
    }

    pub fn draw(&mut self, vertices: u32, instances: u32) {
        self.commands.push(Command::Draw {
            vertices,
            instances,
        });
    }

    pub fn draw_indexed(&mut self, indices: u32, instances: u32) {
        self.commands.push(Command::DrawIndexed {
            indices,
            instances,
        });
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(Command::Dispatch { x, y, z });
    }

    pub fn copy_buffer(&mut self, src: &Buffer, src_offset: u64, dst: &Buffer, dst_offset: u64, size: u64) {
        self.commands.push(Command::CopyBuffer {
            src: src.id(),
            src_offset,
            dst: dst.id(),
            dst_offset,
            size,
        });
    }
}

struct PersistentSlot {
    handle: Handle,
    resource: Option<Arc<TargetSet>>,
}

struct PersistentPair {
    desc: TargetSetDescriptor,
    slots: [PersistentSlot; 2],
}

/// Per-frame render graph.
pub struct RenderGraph {
    passes: Vec<RenderPass>,
    transient_textures: HashMap<Handle, TextureDescriptor>,
    transient_buffers: HashMap<Handle, BufferDescriptor>,
    transient_target_sets: HashMap<Handle, TargetSetDescriptor>,
    dependencies: HashSet<Handle>,
    persistent: HashMap<String, PersistentPair>,
    /// Reverse map from a persistent slot handle to its pair and slot index.
    persistent_handles: HashMap<Handle, (String, usize)>,
    /// Monotone per-kind handle counters; never reset so persistent and
    /// transient handles cannot collide across frames.
    counters: [u32; 4],
    /// Handle-to-resource map of the build in progress. Taken back for
    /// destruction once recording finishes, so it is empty between builds.
    resolved: ResolvedResources,
    frame_count: u64,
    stats: GraphStats,
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            transient_textures: HashMap::new(),
            transient_buffers: HashMap::new(),
            transient_target_sets: HashMap::new(),
            dependencies: HashSet::new(),
            persistent: HashMap::new(),
            persistent_handles: HashMap::new(),
            counters: [0; 4],
            resolved: ResolvedResources::default(),
            frame_count: 0,
            stats: GraphStats::default(),
        }
    }

    /// Number of frames built so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Counts from the most recent build.
    pub fn stats(&self) -> GraphStats {
        self.stats
    }

    fn fresh_handle(&mut self, kind: HandleKind) -> Handle {
        let slot = match kind {
            HandleKind::TargetSet => 0,
            HandleKind::Buffer => 1,
            HandleKind::Texture => 2,
            HandleKind::Dependency => 3,
        };
        let handle = Handle::new(kind, self.counters[slot]);
        self.counters[slot] += 1;
        handle
    }

    /// Declare a transient texture for this frame.
    pub fn declare_texture(&mut self, desc: TextureDescriptor) -> Handle {
        let handle = self.fresh_handle(HandleKind::Texture);
        self.transient_textures.insert(handle, desc);
        handle
    }

    /// Declare a transient buffer for this frame.
    pub fn declare_buffer(&mut self, desc: BufferDescriptor) -> Handle {
        let handle = self.fresh_handle(HandleKind::Buffer);
        self.transient_buffers.insert(handle, desc);
        handle
    }

    /// Declare a transient target set for this frame.
    pub fn declare_target_set(&mut self, desc: TargetSetDescriptor) -> Handle {
        let handle = self.fresh_handle(HandleKind::TargetSet);
        self.transient_target_sets.insert(handle, desc);
        handle
    }

    /// Declare a pure ordering dependency with no backing resource.
    pub fn declare_dependency(&mut self) -> Handle {
        let handle = self.fresh_handle(HandleKind::Dependency);
        self.dependencies.insert(handle);
        handle
    }

    /// Address one slot of a double-buffered persistent target set.
    ///
    /// The pair is created on first use; the two slots swap roles every
    /// frame, so `Previous` this frame is what `Current` addressed last
    /// frame. Handles are stable across frames. Changing the descriptor
    /// recreates the slots lazily at the next build.
    pub fn persistent_target_set(
        &mut self,
        name: &str,
        desc: TargetSetDescriptor,
        ping_pong: PingPong,
    ) -> Handle {
        if !self.persistent.contains_key(name) {
            let slots = [
                PersistentSlot {
                    handle: self.fresh_handle(HandleKind::TargetSet),
                    resource: None,
                },
                PersistentSlot {
                    handle: self.fresh_handle(HandleKind::TargetSet),
                    resource: None,
                },
            ];
            self.persistent_handles
                .insert(slots[0].handle, (name.to_string(), 0));
            self.persistent_handles
                .insert(slots[1].handle, (name.to_string(), 1));
            self.persistent.insert(
                name.to_string(),
                PersistentPair {
                    desc: desc.clone(),
                    slots,
                },
            );
        }
        let pair = match self.persistent.get_mut(name) {
            Some(pair) => pair,
            None => unreachable!(),
        };
        pair.desc = desc;

        let parity = (self.frame_count % 2) as usize;
        let slot = match ping_pong {
            PingPong::Current => parity,
            PingPong::Previous => 1 - parity,
        };
        pair.slots[slot].handle
    }

    /// Address both slots of a double-buffered persistent target set.
    ///
    /// `previous` this frame is identical in identity to `current` last
    /// frame; no copy happens between the slots.
    pub fn add_double_buffered_target_set(
        &mut self,
        name: &str,
        desc: TargetSetDescriptor,
    ) -> DoubleBufferedTarget {
        let current = self.persistent_target_set(name, desc.clone(), PingPong::Current);
        let previous = self.persistent_target_set(name, desc, PingPong::Previous);
        DoubleBufferedTarget { previous, current }
    }

    /// The concrete target set a handle currently resolves to.
    ///
    /// Persistent slots resolve once their pair has been built; transient
    /// handles resolve only while a build is running, so outside a build
    /// they return `None`.
    pub fn get_target_set(&self, handle: Handle) -> Option<&Arc<TargetSet>> {
        if let Some(target_set) = self.resolved.target_set(handle) {
            return Some(target_set);
        }
        let (name, slot) = self.persistent_handles.get(&handle)?;
        self.persistent.get(name)?.slots[*slot].resource.as_ref()
    }

    /// The concrete texture a handle currently resolves to, if any.
    ///
    /// Textures are always transient, so this only resolves during a build.
    pub fn get_texture(&self, handle: Handle) -> Option<&Arc<Texture>> {
        self.resolved.texture(handle)
    }

    /// The concrete buffer a handle currently resolves to, if any.
    ///
    /// Buffers are always transient, so this only resolves during a build.
    pub fn get_buffer(&self, handle: Handle) -> Option<&Arc<Buffer>> {
        self.resolved.buffer(handle)
    }

    /// Add a pass to the frame.
    pub fn add_pass(&mut self, pass: RenderPass) {
        self.passes.push(pass);
    }

    fn is_declared(&self, handle: Handle) -> bool {
        self.transient_textures.contains_key(&handle)
            || self.transient_buffers.contains_key(&handle)
            || self.transient_target_sets.contains_key(&handle)
            || self.dependencies.contains(&handle)
            || self.persistent_handles.contains_key(&handle)
    }

    fn check_inputs(&self) -> Result<(), GraphicsError> {
        for pass in &self.passes {
            for &input in pass.inputs() {
                if !self.is_declared(input) {
                    return Err(GraphicsError::InvalidGraph(format!(
                        "pass '{}' reads an undeclared resource",
                        pass.name()
                    )));
                }
            }
            match pass.output() {
                None => {
                    return Err(GraphicsError::InvalidGraph(format!(
                        "pass '{}' has no output",
                        pass.name()
                    )));
                }
                Some(output) => {
                    if output.handle != Handle::OUTPUT && !self.is_declared(output.handle) {
                        return Err(GraphicsError::InvalidGraph(format!(
                            "pass '{}' writes an undeclared resource",
                            pass.name()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Check the declared frame without building it.
    ///
    /// Returns false and logs the problems when the graph has dangling
    /// handles or a dependency cycle.
    pub fn validate(&self) -> bool {
        let mut valid = true;
        if let Err(err) = self.check_inputs() {
            log::error!("render graph validation: {}", err);
            valid = false;
        }
        if let Err(err) = schedule::schedule_passes(&self.passes) {
            log::error!("render graph validation: {}", err);
            valid = false;
        }
        valid
    }

    fn resolve_persistent(
        &mut self,
        context: &GpuContext,
        handle: Handle,
    ) -> Result<Arc<TargetSet>, GraphicsError> {
        let (name, slot_index) = match self.persistent_handles.get(&handle) {
            Some(entry) => entry.clone(),
            None => {
                return Err(GraphicsError::UnresolvedHandle(format!(
                    "{:?} is not a persistent target set",
                    handle
                )))
            }
        };
        let pair = match self.persistent.get_mut(&name) {
            Some(pair) => pair,
            None => unreachable!(),
        };
        let slot = &mut pair.slots[slot_index];

        let stale = slot
            .resource
            .as_ref()
            .map(|resource| resource.descriptor().aliasing_key() != pair.desc.aliasing_key())
            .unwrap_or(false);
        if stale {
            if let Some(old) = slot.resource.take() {
                log::debug!("recreating persistent target set '{}' slot {}", name, slot_index);
                context.destroy_target_set(old);
            }
        }
        if slot.resource.is_none() {
            let desc = pair
                .desc
                .clone()
                .with_label(format!("{}_{}", name, slot_index));
            slot.resource = Some(context.create_target_set(desc)?);
        }
        match &slot.resource {
            Some(resource) => Ok(resource.clone()),
            None => unreachable!(),
        }
    }

    /// Build the declared frame into a command list.
    ///
    /// Schedules the passes, allocates transients with live-range reuse,
    /// runs the pass closures, then consumes the frame: transient resources
    /// are handed to the deferred cleanup queue and all declarations are
    /// cleared. `width` and `height` describe the presentation output for
    /// passes that render to [`Handle::OUTPUT`].
    pub fn build(
        &mut self,
        context: &GpuContext,
        width: u32,
        height: u32,
    ) -> Result<CommandList, GraphicsError> {
        let result = self.build_inner(context, width, height);
        self.reset_frame(result.is_ok());
        result
    }

    fn build_inner(
        &mut self,
        context: &GpuContext,
        width: u32,
        height: u32,
    ) -> Result<CommandList, GraphicsError> {
        self.check_inputs()?;
        let order = schedule::schedule_passes(&self.passes)?;
        let ranges = schedule::live_ranges(&self.passes, &order);

        let mut starts: Vec<Vec<Handle>> = vec![Vec::new(); order.len()];
        let mut ends: Vec<Vec<Handle>> = vec![Vec::new(); order.len()];
        for (&handle, &(first, last)) in &ranges {
            starts[first].push(handle);
            ends[last].push(handle);
        }

        let mut texture_pool: HashMap<TextureDescriptor, Vec<Arc<Texture>>> = HashMap::new();
        let mut buffer_pool: HashMap<BufferDescriptor, Vec<Arc<Buffer>>> = HashMap::new();
        let mut target_set_pool: HashMap<TargetSetDescriptor, Vec<Arc<TargetSet>>> =
            HashMap::new();
        self.resolved = ResolvedResources::default();
        let mut reused = 0usize;

        for position in 0..order.len() {
            for &handle in &starts[position] {
                match handle.kind() {
                    Some(HandleKind::Texture) => {
                        let desc = match self.transient_textures.get(&handle) {
                            Some(desc) => desc.clone(),
                            None => unreachable!(),
                        };
                        let key = desc.aliasing_key();
                        let texture = match texture_pool.get_mut(&key).and_then(Vec::pop) {
                            Some(texture) => {
                                reused += 1;
                                texture
                            }
                            None => context.create_texture(desc)?,
                        };
                        self.resolved.textures.insert(handle, texture);
                    }
                    Some(HandleKind::Buffer) => {
                        let desc = match self.transient_buffers.get(&handle) {
                            Some(desc) => desc.clone(),
                            None => unreachable!(),
                        };
                        let key = desc.aliasing_key();
                        let buffer = match buffer_pool.get_mut(&key).and_then(Vec::pop) {
                            Some(buffer) => {
                                reused += 1;
                                buffer
                            }
                            None => context.create_buffer(desc)?,
                        };
                        self.resolved.buffers.insert(handle, buffer);
                    }
                    Some(HandleKind::TargetSet) => {
                        if self.persistent_handles.contains_key(&handle) {
                            let target_set = self.resolve_persistent(context, handle)?;
                            self.resolved.target_sets.insert(handle, target_set);
                        } else {
                            let desc = match self.transient_target_sets.get(&handle) {
                                Some(desc) => desc.clone(),
                                None => unreachable!(),
                            };
                            let key = desc.aliasing_key();
                            let target_set =
                                match target_set_pool.get_mut(&key).and_then(Vec::pop) {
                                    Some(target_set) => {
                                        reused += 1;
                                        target_set
                                    }
                                    None => context.create_target_set(desc)?,
                                };
                            self.resolved.target_sets.insert(handle, target_set);
                        }
                    }
                    Some(HandleKind::Dependency) | None => {}
                }
            }

            // Live range over: the allocation can back a later transient.
            for &handle in &ends[position] {
                match handle.kind() {
                    Some(HandleKind::Texture) => {
                        if let Some(texture) = self.resolved.textures.get(&handle) {
                            texture_pool
                                .entry(texture.descriptor().aliasing_key())
                                .or_default()
                                .push(texture.clone());
                        }
                    }
                    Some(HandleKind::Buffer) => {
                        if let Some(buffer) = self.resolved.buffers.get(&handle) {
                            buffer_pool
                                .entry(buffer.descriptor().aliasing_key())
                                .or_default()
                                .push(buffer.clone());
                        }
                    }
                    Some(HandleKind::TargetSet) => {
                        if self.persistent_handles.contains_key(&handle) {
                            continue;
                        }
                        if let Some(target_set) = self.resolved.target_sets.get(&handle) {
                            target_set_pool
                                .entry(target_set.descriptor().aliasing_key())
                                .or_default()
                                .push(target_set.clone());
                        }
                    }
                    _ => {}
                }
            }
        }

        let mut commands = CommandList::new();
        let record_result: Result<(), GraphicsError> = (|| {
            for &index in &order {
                let pass = &self.passes[index];
                let attachments = match pass.output() {
                    None => PassAttachments::none(),
                    Some(output) => {
                        let target_set = if output.handle == Handle::OUTPUT {
                            None
                        } else if output.handle.kind() == Some(HandleKind::TargetSet) {
                            Some(
                                self.resolved
                                    .target_set(output.handle)
                                    .ok_or_else(|| {
                                        GraphicsError::UnresolvedHandle(format!(
                                            "no target set for {:?}",
                                            output.handle
                                        ))
                                    })?
                                    .id(),
                            )
                        } else {
                            None
                        };
                        PassAttachments {
                            target_set,
                            output: output.handle == Handle::OUTPUT,
                            clear: output.clear,
                            load_op: output.load_op,
                            store_op: output.store_op,
                        }
                    }
                };
                commands.push(Command::BeginPass {
                    name: pass.name().to_string(),
                    attachments,
                });
                let mut record = RecordContext {
                    commands: &mut commands,
                    resolved: &self.resolved,
                    context,
                    width,
                    height,
                };
                for build in pass.builds() {
                    build(&mut record)?;
                }
                commands.push(Command::EndPass);
            }
            Ok(())
        })();

        // Transients are consumed either way; persistent slots stay alive.
        let resolved = std::mem::take(&mut self.resolved);
        let mut destroyed_textures = HashSet::new();
        for texture in resolved.textures.into_values() {
            if destroyed_textures.insert(texture.id()) {
                context.destroy_texture(texture);
            }
        }
        let mut destroyed_buffers = HashSet::new();
        for buffer in resolved.buffers.into_values() {
            if destroyed_buffers.insert(buffer.id()) {
                context.destroy_buffer(buffer);
            }
        }
        let mut destroyed_target_sets = HashSet::new();
        for (handle, target_set) in resolved.target_sets {
            if self.persistent_handles.contains_key(&handle) {
                continue;
            }
            if destroyed_target_sets.insert(target_set.id()) {
                context.destroy_target_set(target_set);
            }
        }

        record_result?;

        self.stats = GraphStats {
            passes: order.len(),
            transient_textures: self.transient_textures.len(),
            transient_buffers: self.transient_buffers.len(),
            transient_target_sets: self.transient_target_sets.len(),
            reused_allocations: reused,
        };
        log::debug!(
            "built frame {}: {} passes, {} reused allocations",
            self.frame_count,
            self.stats.passes,
            self.stats.reused_allocations
        );
        Ok(commands)
    }

    fn reset_frame(&mut self, advance: bool) {
        self.passes.clear();
        self.transient_textures.clear();
        self.transient_buffers.clear();
        self.transient_target_sets.clear();
        self.dependencies.clear();
        if advance {
            self.frame_count += 1;
        }
    }

    /// Destroy the persistent target sets owned by the graph.
    pub fn release_persistent(&mut self, context: &GpuContext) {
        for pair in self.persistent.values_mut() {
            for slot in &mut pair.slots {
                if let Some(resource) = slot.resource.take() {
                    context.destroy_target_set(resource);
                }
            }
        }
        self.persistent.clear();
        self.persistent_handles.clear();
    }
}
