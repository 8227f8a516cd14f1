//! Graph resource handles.
//!
//! Handles are lightweight u32 identifiers for resources declared on a render
//! graph. The top three bits carry the resource kind so a handle can be
//! routed without a table lookup; the remaining bits are a per-graph index.

/// Kind of resource a graph handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// A target set (persistent or transient).
    TargetSet,
    /// A transient buffer.
    Buffer,
    /// A transient texture.
    Texture,
    /// A pure ordering dependency with no backing resource.
    Dependency,
}

/// Handle to a resource declared on a render graph.
///
/// Handles are only meaningful for the graph that issued them and for the
/// frame they were declared in; transient handles are invalidated when the
/// graph is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

const KIND_SHIFT: u32 = 29;
const INDEX_MASK: u32 = (1 << KIND_SHIFT) - 1;

impl Handle {
    /// Sentinel for "no resource". Passes silently skip it in input lists.
    pub const INVALID: Handle = Handle(u32::MAX);

    /// Sentinel for the final presentation output of the graph.
    pub const OUTPUT: Handle = Handle(u32::MAX - 1);

    pub(crate) fn new(kind: HandleKind, index: u32) -> Self {
        assert!(index <= INDEX_MASK, "graph handle index overflow");
        let tag = match kind {
            HandleKind::TargetSet => 0,
            HandleKind::Buffer => 1,
            HandleKind::Texture => 2,
            HandleKind::Dependency => 3,
        };
        Handle((tag << KIND_SHIFT) | index)
    }

    /// The resource kind, or `None` for the reserved sentinels.
    pub fn kind(&self) -> Option<HandleKind> {
        if *self == Self::INVALID || *self == Self::OUTPUT {
            return None;
        }
        match self.0 >> KIND_SHIFT {
            0 => Some(HandleKind::TargetSet),
            1 => Some(HandleKind::Buffer),
            2 => Some(HandleKind::Texture),
            3 => Some(HandleKind::Dependency),
            _ => None,
        }
    }

    /// The per-graph index within the handle's kind.
    pub(crate) fn index(&self) -> u32 {
        self.0 & INDEX_MASK
    }

    /// Whether the handle is one of the reserved sentinels.
    pub fn is_sentinel(&self) -> bool {
        *self == Self::INVALID || *self == Self::OUTPUT
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_kind_roundtrip() {
        for kind in [
            HandleKind::TargetSet,
            HandleKind::Buffer,
            HandleKind::Texture,
            HandleKind::Dependency,
        ] {
            let handle = Handle::new(kind, 42);
            assert_eq!(handle.kind(), Some(kind));
            assert_eq!(handle.index(), 42);
        }
    }

    #[test]
    fn test_sentinels_have_no_kind() {
        assert_eq!(Handle::INVALID.kind(), None);
        assert_eq!(Handle::OUTPUT.kind(), None);
        assert!(Handle::INVALID.is_sentinel());
        assert!(Handle::OUTPUT.is_sentinel());
        assert_ne!(Handle::INVALID, Handle::OUTPUT);
    }

    #[test]
    fn test_same_index_different_kind() {
        let texture = Handle::new(HandleKind::Texture, 7);
        let buffer = Handle::new(HandleKind::Buffer, 7);
        assert_ne!(texture, buffer);
    }
}
