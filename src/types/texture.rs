//! Texture types and descriptors.

use bitflags::bitflags;

use super::Extent3d;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 16-bit red channel, float.
    R16Float,
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit red channel, unsigned integer.
    R32Uint,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 10-bit RGB with 2-bit alpha, unsigned normalized.
    Rgb10a2Unorm,
    /// 11/11/10-bit RGB, float.
    Rg11b10Float,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm | Self::Depth24PlusStencil8 | Self::Depth32Float
        )
    }

    /// Returns the size in bytes per texel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R16Float | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Rgb10a2Unorm
            | Self::Rg11b10Float
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied from.
        const COPY_SRC = 1 << 0;
        /// Texture can be copied to.
        const COPY_DST = 1 << 1;
        /// Texture can be sampled in a shader (receives a bindless slot).
        const TEXTURE_BINDING = 1 << 2;
        /// Texture can be used as a storage texture.
        const STORAGE_BINDING = 1 << 3;
        /// Texture can be used as a render attachment.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Size of the texture.
    pub size: Extent3d,
    /// Mip level count.
    pub mip_level_count: u32,
    /// Sample count for multisampling.
    pub sample_count: u32,
    /// Texture format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent3d::new_2d(width, height),
            mip_level_count: 1,
            sample_count: 1,
            format,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    /// Set the sample count for multisampling.
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    /// The descriptor with the label stripped.
    ///
    /// Two transient textures may share one allocation only when their
    /// descriptors match; the label is diagnostic and must not prevent reuse.
    pub(crate) fn aliasing_key(&self) -> Self {
        let mut key = self.clone();
        key.label = None;
        key
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            size: Extent3d::default(),
            mip_level_count: 1,
            sample_count: 1,
            format: TextureFormat::default(),
            usage: TextureUsage::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_stencil_formats() {
        assert!(TextureFormat::Depth32Float.is_depth_stencil());
        assert!(TextureFormat::Depth24PlusStencil8.is_depth_stencil());
        assert!(!TextureFormat::Rgba8Unorm.is_depth_stencil());
    }

    #[test]
    fn test_aliasing_key_ignores_label() {
        let a = TextureDescriptor::new_2d(
            256,
            256,
            TextureFormat::Rgba16Float,
            TextureUsage::RENDER_ATTACHMENT,
        )
        .with_label("bloom_a");
        let b = TextureDescriptor::new_2d(
            256,
            256,
            TextureFormat::Rgba16Float,
            TextureUsage::RENDER_ATTACHMENT,
        )
        .with_label("bloom_b");

        assert_ne!(a, b);
        assert_eq!(a.aliasing_key(), b.aliasing_key());
    }
}
