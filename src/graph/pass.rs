//! Render pass declarations.

use crate::error::GraphicsError;
use crate::graph::{Handle, RecordContext};
use crate::types::{ClearValue, LoadOp, StoreOp};

/// Closure that records a pass's commands once the graph is resolved.
pub type BuildFn = Box<dyn Fn(&mut RecordContext) -> Result<(), GraphicsError> + Send>;

/// The single output a pass writes.
#[derive(Debug, Clone, Copy)]
pub struct PassOutput {
    /// The written resource, or [`Handle::OUTPUT`] for the final image.
    pub handle: Handle,
    /// Clear applied before the pass runs, if any.
    pub clear: Option<ClearValue>,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

/// A named unit of GPU work within a render graph.
///
/// A pass declares which resources it reads and the single resource it
/// writes; scheduling is derived purely from those declarations. The build
/// closures record the pass's actual commands and run only after every
/// handle has been resolved to a live resource.
pub struct RenderPass {
    name: String,
    inputs: Vec<Handle>,
    output: Option<PassOutput>,
    builds: Vec<BuildFn>,
}

impl RenderPass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            output: None,
            builds: Vec::new(),
        }
    }

    /// Declare a resource the pass reads.
    ///
    /// The sentinels are skipped silently, so optional inputs can be passed
    /// through without branching at the call site. Duplicates are kept out
    /// of the input list.
    pub fn with_input(mut self, handle: Handle) -> Self {
        if !handle.is_sentinel() && !self.inputs.contains(&handle) {
            self.inputs.push(handle);
        }
        self
    }

    /// Declare the resource the pass writes, replacing any previous output.
    pub fn with_output(mut self, handle: Handle) -> Self {
        assert_ne!(handle, Handle::INVALID, "pass output cannot be invalid");
        self.output = Some(PassOutput {
            handle,
            clear: None,
            load_op: LoadOp::default(),
            store_op: StoreOp::default(),
        });
        self
    }

    /// Clear the output before the pass runs.
    pub fn with_clear(mut self, clear: ClearValue) -> Self {
        let output = self
            .output
            .as_mut()
            .expect("with_clear requires an output");
        output.clear = Some(clear);
        output.load_op = LoadOp::DontCare;
        self
    }

    /// Set the load behavior of the output.
    pub fn with_load_op(mut self, op: LoadOp) -> Self {
        self.output
            .as_mut()
            .expect("with_load_op requires an output")
            .load_op = op;
        self
    }

    /// Set the store behavior of the output.
    pub fn with_store_op(mut self, op: StoreOp) -> Self {
        self.output
            .as_mut()
            .expect("with_store_op requires an output")
            .store_op = op;
        self
    }

    /// Append a closure that records the pass's commands.
    ///
    /// A pass may carry several closures; they run in the order added.
    pub fn with_build(
        mut self,
        build: impl Fn(&mut RecordContext) -> Result<(), GraphicsError> + Send + 'static,
    ) -> Self {
        self.builds.push(Box::new(build));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[Handle] {
        &self.inputs
    }

    pub fn output(&self) -> Option<&PassOutput> {
        self.output.as_ref()
    }

    pub(crate) fn builds(&self) -> &[BuildFn] {
        &self.builds
    }
}

impl std::fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .field("builds", &self.builds.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::HandleKind;

    #[test]
    fn test_sentinel_inputs_are_skipped() {
        let texture = Handle::new(HandleKind::Texture, 0);
        let pass = RenderPass::new("lighting")
            .with_input(Handle::INVALID)
            .with_input(texture)
            .with_input(texture)
            .with_input(Handle::OUTPUT)
            .with_input(Handle::INVALID);
        assert_eq!(pass.inputs(), [texture]);
    }

    #[test]
    fn test_output_is_overwritten_not_accumulated() {
        let a = Handle::new(HandleKind::TargetSet, 0);
        let b = Handle::new(HandleKind::TargetSet, 1);
        let pass = RenderPass::new("resolve").with_output(a).with_output(b);
        assert_eq!(pass.output().map(|output| output.handle), Some(b));
    }
}
