//! The context handed to a node type's lowering callback.

use std::collections::HashMap;

use chigraph_ir::{BlockId, FunctionBuilder, ValueId};

/// Everything one activation of a node may touch while emitting IR.
///
/// The builder is already positioned at the node's code block with the
/// node's synthetic line number set. `io` holds the loaded input values
/// followed by the output slots (pointers to the node's output allocas);
/// the callback reads inputs, stores outputs, and transfers control to one
/// of `output_blocks`.
pub struct LowerCtx<'a, 'f> {
    /// Builder positioned at the node's code block.
    pub builder: &'a mut FunctionBuilder<'f>,
    /// Which exec input activated the node. Always 0 for pure nodes.
    pub input_exec_id: usize,
    /// Loaded input values followed by output alloca pointers.
    pub io: &'a [ValueId],
    /// Reserved first blocks of the exec successors, one per exec output.
    /// For pure nodes this is the single jump-back block.
    pub output_blocks: &'a [BlockId],
    /// Synthetic line number of the node.
    pub line: u32,
    /// Stack slots of the function's local variables, by name.
    pub locals: &'a HashMap<String, ValueId>,
}

impl LowerCtx<'_, '_> {
    /// The stack slot of a local variable, if the function has one by this
    /// name.
    pub fn local_variable(&self, name: &str) -> Option<ValueId> {
        self.locals.get(name).copied()
    }
}
