//! Target set descriptors.
//!
//! A target set is the GPU render-target bundle a graphics pass renders into:
//! zero or more color attachments plus an optional depth attachment, all with
//! one size and sample count. The backend owns the concrete object; this
//! descriptor declares it.

use super::{TextureFormat, TextureUsage};

/// Descriptor for creating a target set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetSetDescriptor {
    /// Debug label for the target set.
    pub label: Option<String>,
    /// Width of every attachment in texels.
    pub width: u32,
    /// Height of every attachment in texels.
    pub height: u32,
    /// Formats of the color attachments, in attachment order.
    pub color_formats: Vec<TextureFormat>,
    /// Format of the depth attachment, if any.
    pub depth_format: Option<TextureFormat>,
    /// Sample count for multisampling.
    pub sample_count: u32,
    /// Extra usage flags added to every attachment texture.
    ///
    /// `RENDER_ATTACHMENT` is always set; add `TEXTURE_BINDING` when later
    /// passes sample the attachments.
    pub attachment_usage: TextureUsage,
}

impl TargetSetDescriptor {
    /// Create a descriptor with no attachments.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            label: None,
            width,
            height,
            color_formats: Vec::new(),
            depth_format: None,
            sample_count: 1,
            attachment_usage: TextureUsage::TEXTURE_BINDING,
        }
    }

    /// Append a color attachment.
    pub fn with_color(mut self, format: TextureFormat) -> Self {
        debug_assert!(!format.is_depth_stencil());
        self.color_formats.push(format);
        self
    }

    /// Set the depth attachment.
    pub fn with_depth(mut self, format: TextureFormat) -> Self {
        debug_assert!(format.is_depth_stencil());
        self.depth_format = Some(format);
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the sample count for multisampling.
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    /// Set the extra usage flags for the attachment textures.
    pub fn with_attachment_usage(mut self, usage: TextureUsage) -> Self {
        self.attachment_usage = usage;
        self
    }

    /// Number of color attachments.
    pub fn color_count(&self) -> usize {
        self.color_formats.len()
    }

    /// Whether the target set has any attachment at all.
    pub fn has_attachments(&self) -> bool {
        !self.color_formats.is_empty() || self.depth_format.is_some()
    }

    /// The descriptor with the label stripped, used as the aliasing key.
    pub(crate) fn aliasing_key(&self) -> Self {
        let mut key = self.clone();
        key.label = None;
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_set_descriptor() {
        let desc = TargetSetDescriptor::new(1920, 1080)
            .with_color(TextureFormat::Rgba16Float)
            .with_color(TextureFormat::Rgb10a2Unorm)
            .with_depth(TextureFormat::Depth32Float)
            .with_label("gbuffer");

        assert_eq!(desc.color_count(), 2);
        assert!(desc.has_attachments());
        assert_eq!(desc.depth_format, Some(TextureFormat::Depth32Float));
    }

    #[test]
    fn test_empty_has_no_attachments() {
        assert!(!TargetSetDescriptor::new(16, 16).has_attachments());
    }
}
