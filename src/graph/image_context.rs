//! Named image bindings for shader techniques.
//!
//! Rendering techniques refer to images by name ("scene_color",
//! "history_depth"); where those names come from differs per frame. An
//! [`ImageGraphContext`] collects the name-to-source bindings declared while
//! the frame is set up and resolves them against the built graph when a pass
//! records, so technique code never handles graph handles directly.

use std::collections::HashMap;
use std::sync::Arc;

use crate::graph::{Handle, RecordContext};
use crate::resources::Texture;

/// Maximum number of technique flags a context can carry.
pub const MAX_TECHNIQUE_FLAGS: usize = 16;

/// Which attachment of a target set a binding selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attachment {
    /// A color attachment by index.
    Color(u32),
    /// The depth attachment.
    Depth,
}

#[derive(Clone)]
enum ImageBinding {
    /// A texture bound directly, outside the graph.
    Explicit(Arc<Texture>),
    /// A transient texture declared on the graph.
    GraphTexture(Handle),
    /// An attachment of a graph target set.
    TargetSetAttachment(Handle, Attachment),
}

/// Name-to-image bindings plus boolean technique flags for one frame.
#[derive(Default, Clone)]
pub struct ImageGraphContext {
    bindings: HashMap<String, ImageBinding>,
    /// Insertion-ordered; capped at [`MAX_TECHNIQUE_FLAGS`] names.
    flags: Vec<(String, bool)>,
}

impl ImageGraphContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name to a texture directly.
    ///
    /// Explicit bindings win over graph bindings of the same name.
    pub fn associate_explicit_texture(&mut self, name: impl Into<String>, texture: Arc<Texture>) {
        self.bindings
            .insert(name.into(), ImageBinding::Explicit(texture));
    }

    /// Bind a name to a transient texture declared on the graph.
    pub fn associate_texture(&mut self, name: impl Into<String>, handle: Handle) {
        self.bindings
            .insert(name.into(), ImageBinding::GraphTexture(handle));
    }

    /// Bind a name to a color attachment of a graph target set.
    pub fn associate_texture_target_set(
        &mut self,
        name: impl Into<String>,
        target_set: Handle,
        color_index: u32,
    ) {
        self.bindings.insert(
            name.into(),
            ImageBinding::TargetSetAttachment(target_set, Attachment::Color(color_index)),
        );
    }

    /// Bind a name to the depth attachment of a graph target set.
    pub fn associate_texture_target_set_depth(
        &mut self,
        name: impl Into<String>,
        target_set: Handle,
    ) {
        self.bindings.insert(
            name.into(),
            ImageBinding::TargetSetAttachment(target_set, Attachment::Depth),
        );
    }

    /// Remove a binding.
    pub fn unbind(&mut self, name: &str) {
        self.bindings.remove(name);
    }

    /// Resolve a name to a texture against the built frame.
    ///
    /// Returns `None` when the name is unbound or its source did not resolve
    /// (for example a target set without the selected attachment).
    pub fn find_texture(&self, name: &str, record: &RecordContext<'_>) -> Option<Arc<Texture>> {
        match self.bindings.get(name)? {
            ImageBinding::Explicit(texture) => Some(texture.clone()),
            ImageBinding::GraphTexture(handle) => {
                record.resolved().texture(*handle).cloned()
            }
            ImageBinding::TargetSetAttachment(handle, slot) => {
                let target_set = record.resolved().target_set(*handle)?;
                match slot {
                    Attachment::Color(index) => target_set.color(*index as usize).cloned(),
                    Attachment::Depth => target_set.depth().cloned(),
                }
            }
        }
    }

    /// Set a named technique flag.
    ///
    /// At most [`MAX_TECHNIQUE_FLAGS`] distinct names may be used; the cap
    /// matches the specialization constant block techniques compile against.
    pub fn set_technique_flag(&mut self, name: &str, value: bool) {
        if let Some(entry) = self.flags.iter_mut().find(|(flag, _)| flag == name) {
            entry.1 = value;
            return;
        }
        assert!(
            self.flags.len() < MAX_TECHNIQUE_FLAGS,
            "too many technique flags (max {})",
            MAX_TECHNIQUE_FLAGS
        );
        self.flags.push((name.to_string(), value));
    }

    /// Read a technique flag. Unset names read as false.
    pub fn technique_flag(&self, name: &str) -> bool {
        self.flags
            .iter()
            .find(|(flag, _)| flag == name)
            .map(|(_, value)| *value)
            .unwrap_or(false)
    }

    /// Copy every flag from `source`, overwriting names already set here.
    pub fn apply_technique_flags(&mut self, source: &ImageGraphContext) {
        for (name, value) in &source.flags {
            self.set_technique_flag(name, *value);
        }
    }

    /// The flags as an ordered bitmask, low bit first by insertion order.
    pub fn technique_flags(&self) -> u16 {
        let mut bits = 0u16;
        for (index, (_, value)) in self.flags.iter().enumerate() {
            if *value {
                bits |= 1 << index;
            }
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_read_and_overwrite() {
        let mut images = ImageGraphContext::new();
        assert!(!images.technique_flag("use_taa"));
        images.set_technique_flag("use_taa", true);
        images.set_technique_flag("use_ssao", false);
        assert!(images.technique_flag("use_taa"));
        images.set_technique_flag("use_taa", false);
        assert!(!images.technique_flag("use_taa"));
        assert_eq!(images.technique_flags(), 0);
    }

    #[test]
    fn test_apply_copies_flags() {
        let mut source = ImageGraphContext::new();
        source.set_technique_flag("use_taa", true);
        source.set_technique_flag("use_fog", true);

        let mut images = ImageGraphContext::new();
        images.set_technique_flag("use_taa", false);
        images.apply_technique_flags(&source);
        assert!(images.technique_flag("use_taa"));
        assert!(images.technique_flag("use_fog"));
    }

    #[test]
    #[should_panic]
    fn test_flag_overflow_panics() {
        let mut images = ImageGraphContext::new();
        for index in 0..=MAX_TECHNIQUE_FLAGS {
            images.set_technique_flag(&format!("flag_{}", index), true);
        }
    }
}
