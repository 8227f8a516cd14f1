//! Common value types shared across the graphics system.

/// Size of a texture in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels (1 for 2D textures).
    pub depth: u32,
}

impl Extent3d {
    /// Create a 2D extent with depth 1.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }
}

impl Default for Extent3d {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth: 1,
        }
    }
}

/// Clear value for a render attachment.
///
/// Holds both color and depth/stencil components; which of them applies is
/// determined by the attachment format. The struct is `#[repr(C)]` POD so it
/// can cross the GPU boundary unchanged.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClearValue {
    /// Clear color as RGBA.
    pub color: [f32; 4],
    /// Clear depth.
    pub depth: f32,
    /// Clear stencil.
    pub stencil: u32,
}

impl ClearValue {
    /// Create a color clear value (depth 1.0, stencil 0).
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            color: [r, g, b, a],
            depth: 1.0,
            stencil: 0,
        }
    }

    /// Create a depth clear value (black color, stencil 0).
    pub fn depth(depth: f32) -> Self {
        Self {
            color: [0.0; 4],
            depth,
            stencil: 0,
        }
    }

    /// Create a depth/stencil clear value.
    pub fn depth_stencil(depth: f32, stencil: u32) -> Self {
        Self {
            color: [0.0; 4],
            depth,
            stencil,
        }
    }
}

impl Default for ClearValue {
    fn default() -> Self {
        Self::color(0.0, 0.0, 0.0, 1.0)
    }
}

/// Operation performed on a pass output when the pass begins.
///
/// Whether the previous contents of the attachment are preserved. An optional
/// clear value is carried separately on the output record, so `DontCare`
/// combined with a clear value means "clear, previous contents irrelevant".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadOp {
    /// Preserve the existing contents of the attachment.
    #[default]
    Load,
    /// Existing contents are undefined on pass entry.
    DontCare,
}

/// Operation performed on a pass output when the pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Retain the results for later passes.
    #[default]
    Store,
    /// Results may be discarded; no later pass consumes them.
    Discard,
}
