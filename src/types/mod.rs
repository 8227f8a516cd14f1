//! Types shared across the graphics system.

mod buffer;
mod common;
mod target_set;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use common::{ClearValue, Extent3d, LoadOp, StoreOp};
pub use target_set::TargetSetDescriptor;
pub use texture::{TextureDescriptor, TextureFormat, TextureUsage};
