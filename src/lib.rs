//! Dependency-driven GPU render graph with bindless resource indices and
//! deferred cleanup.
//!
//! The crate is organized around three pieces:
//!
//! * [`GpuContext`] owns the backend and device-wide state: descriptor pool,
//!   pipeline cache, bindless index tables, per-frame uniform pools and the
//!   deferred cleanup queue.
//! * [`RenderGraph`] turns per-frame pass declarations into a scheduled,
//!   resource-resolved [`CommandList`], reusing transient allocations
//!   between non-overlapping live ranges.
//! * [`GpuBackend`] is the seam to the actual GPU API; [`DummyBackend`] is
//!   an instrumented no-op implementation for tests.
//!
//! ```
//! use std::sync::Arc;
//! use vermilion_graphics::{
//!     DummyBackend, GpuContext, GpuContextDesc, Handle, RenderGraph, RenderPass,
//! };
//!
//! # fn main() -> Result<(), vermilion_graphics::GraphicsError> {
//! let backend = Arc::new(DummyBackend::new());
//! let context = GpuContext::new(GpuContextDesc::default(), backend)?;
//!
//! let mut graph = RenderGraph::new();
//! graph.add_pass(
//!     RenderPass::new("present")
//!         .with_output(Handle::OUTPUT)
//!         .with_build(|record| {
//!             record.draw(3, 1);
//!             Ok(())
//!         }),
//! );
//! let commands = graph.build(&context, 1280, 720)?;
//! context.submit(&commands)?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod bindless;
pub mod command;
pub mod context;
pub mod error;
pub mod graph;
pub mod resources;
pub mod types;

pub use backend::{DummyBackend, GpuBackend};
pub use command::{Command, CommandList, PassAttachments};
pub use context::{GpuContext, GpuContextDesc, RenderView, UniformAllocation};
pub use error::GraphicsError;
pub use graph::{
    DoubleBufferedTarget, GraphStats, Handle, HandleKind, ImageGraphContext, PingPong,
    RecordContext, RenderGraph, RenderPass,
};
pub use resources::{Buffer, TargetSet, Texture};
pub use types::{
    BufferDescriptor, BufferUsage, ClearValue, Extent3d, LoadOp, StoreOp, TargetSetDescriptor,
    TextureDescriptor, TextureFormat, TextureUsage,
};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
