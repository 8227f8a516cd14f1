//! GPU resource objects.
//!
//! Thin records pairing a backend id with the descriptor it was created from.
//! Resources are handed out as `Arc`s; the context destroys the backend
//! object through the deferred cleanup queue once the last reference drops
//! and the owner calls the matching `destroy_*` method.

mod buffer;
mod target_set;
mod texture;

pub use buffer::Buffer;
pub use target_set::TargetSet;
pub use texture::Texture;
