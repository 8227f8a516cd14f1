//! Recorded command lists.
//!
//! A built render graph produces a [`CommandList`]: the scheduled passes
//! flattened into begin/end markers with the draw and transfer commands the
//! pass thunks recorded between them. The list is backend-agnostic and can be
//! inspected before submission, which the test suite relies on.

use crate::backend::{BufferId, TargetSetId};
use crate::types::{ClearValue, LoadOp, StoreOp};

/// Where a graphics pass renders to.
#[derive(Debug, Clone, PartialEq)]
pub struct PassAttachments {
    /// The resolved target set, if the pass renders into one.
    pub target_set: Option<TargetSetId>,
    /// Whether the pass renders to the final presentation output instead.
    pub output: bool,
    /// Clear applied when the pass begins, if any.
    pub clear: Option<ClearValue>,
    /// Load behavior for the attachment contents.
    pub load_op: LoadOp,
    /// Store behavior for the attachment contents.
    pub store_op: StoreOp,
}

impl PassAttachments {
    /// Attachments for a pass with no render output (compute or transfer).
    pub fn none() -> Self {
        Self {
            target_set: None,
            output: false,
            clear: None,
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
        }
    }
}

/// A single recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Begin a pass. All commands until the matching [`Command::EndPass`]
    /// execute within it.
    BeginPass {
        name: String,
        attachments: PassAttachments,
    },
    /// End the current pass.
    EndPass,
    /// Set the viewport for subsequent draws.
    SetViewport { width: u32, height: u32 },
    /// Bind a vertex buffer to a slot.
    BindVertexBuffer { slot: u32, buffer: BufferId },
    /// Bind the index buffer.
    BindIndexBuffer { buffer: BufferId },
    /// Draw non-indexed geometry.
    Draw { vertices: u32, instances: u32 },
    /// Draw indexed geometry.
    DrawIndexed { indices: u32, instances: u32 },
    /// Dispatch a compute workload.
    Dispatch { x: u32, y: u32, z: u32 },
    /// Copy a byte range between buffers.
    CopyBuffer {
        src: BufferId,
        src_offset: u64,
        dst: BufferId,
        dst_offset: u64,
        size: u64,
    },
}

/// An ordered sequence of recorded commands ready for submission.
#[derive(Debug, Clone, Default)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// The recorded commands in submission order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Names of the passes in the list, in execution order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::BeginPass { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_names() {
        let mut list = CommandList::new();
        list.push(Command::BeginPass {
            name: "depth_prepass".into(),
            attachments: PassAttachments::none(),
        });
        list.push(Command::Draw {
            vertices: 3,
            instances: 1,
        });
        list.push(Command::EndPass);
        list.push(Command::BeginPass {
            name: "lighting".into(),
            attachments: PassAttachments::none(),
        });
        list.push(Command::EndPass);

        assert_eq!(list.pass_names(), ["depth_prepass", "lighting"]);
        assert_eq!(list.len(), 5);
    }
}
