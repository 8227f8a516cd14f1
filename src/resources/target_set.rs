use std::sync::Arc;

use crate::backend::TargetSetId;
use crate::resources::Texture;
use crate::types::TargetSetDescriptor;

/// A GPU target set: the attachment textures plus the backend object binding
/// them together.
#[derive(Debug)]
pub struct TargetSet {
    pub(crate) id: TargetSetId,
    descriptor: TargetSetDescriptor,
    colors: Vec<Arc<Texture>>,
    depth: Option<Arc<Texture>>,
}

impl TargetSet {
    pub(crate) fn new(
        id: TargetSetId,
        descriptor: TargetSetDescriptor,
        colors: Vec<Arc<Texture>>,
        depth: Option<Arc<Texture>>,
    ) -> Self {
        Self {
            id,
            descriptor,
            colors,
            depth,
        }
    }

    /// The backend id of the target set.
    pub fn id(&self) -> TargetSetId {
        self.id
    }

    /// The descriptor the target set was created from.
    pub fn descriptor(&self) -> &TargetSetDescriptor {
        &self.descriptor
    }

    /// The color attachment textures, in attachment order.
    pub fn colors(&self) -> &[Arc<Texture>] {
        &self.colors
    }

    /// A color attachment by index.
    pub fn color(&self, index: usize) -> Option<&Arc<Texture>> {
        self.colors.get(index)
    }

    /// The depth attachment texture, if any.
    pub fn depth(&self) -> Option<&Arc<Texture>> {
        self.depth.as_ref()
    }
}
