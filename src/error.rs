//! Graphics error types.

use thiserror::Error;

/// Errors that can occur in the graphics system.
///
/// Graph construction problems (missing outputs, dangling handles, cycles)
/// are reported by [`RenderGraph::validate`](crate::graph::RenderGraph::validate)
/// as a `bool` plus a logged diagnostic; everything on the build and
/// initialization paths propagates through this enum.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to initialize the graphics context.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// Failed to create a backend resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// The render graph cannot be scheduled or built.
    #[error("invalid render graph: {0}")]
    InvalidGraph(String),

    /// A build callback referenced a handle the graph could not resolve.
    #[error("unresolved resource handle {0}")]
    UnresolvedHandle(String),

    /// The fixed bindless index range has no free slot left.
    ///
    /// This is a fixed-budget violation, not a transient condition; there is
    /// no growth path and callers must not retry.
    #[error("bindless index space '{category}' exhausted ({capacity} slots)")]
    IndexSpaceExhausted {
        /// Which index category ran out (e.g. sampled textures).
        category: &'static str,
        /// Total capacity of the exhausted range.
        capacity: u32,
    },

    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::InitializationFailed("no backend".to_string());
        assert_eq!(err.to_string(), "initialization failed: no backend");

        let err = GraphicsError::IndexSpaceExhausted {
            category: "sampled textures",
            capacity: 1024,
        };
        assert_eq!(
            err.to_string(),
            "bindless index space 'sampled textures' exhausted (1024 slots)"
        );
    }
}
