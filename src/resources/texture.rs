use crate::backend::TextureId;
use crate::types::TextureDescriptor;

/// A GPU texture.
#[derive(Debug)]
pub struct Texture {
    pub(crate) id: TextureId,
    descriptor: TextureDescriptor,
    /// Slot in the bindless sampled-image table, when the usage asks for one.
    bindless_index: Option<u32>,
}

impl Texture {
    pub(crate) fn new(
        id: TextureId,
        descriptor: TextureDescriptor,
        bindless_index: Option<u32>,
    ) -> Self {
        Self {
            id,
            descriptor,
            bindless_index,
        }
    }

    /// The backend id of the texture.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// The descriptor the texture was created from.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// The texture's slot in the bindless sampled-image table, if it has one.
    pub fn bindless_index(&self) -> Option<u32> {
        self.bindless_index
    }
}
