//! Per-node compiler state.
//!
//! Lowering a node is split into two stages. Stage 1 reserves the node's
//! *first block* for a given activating exec input -- and, for impure nodes,
//! builds the chain of pure-dependency blocks that runs before it. Stage 2
//! fills the code block through the node type's lowering callback. The
//! split lets a predecessor branch to a successor's block before the
//! successor itself has been emitted.

use uuid::Uuid;

use chigraph_core::GraphFunction;
use chigraph_ir::builder::IndirectBrLoc;
use chigraph_ir::{BlockId, ValueId};

/// Lowering state for one node instance.
///
/// Owned by the function compiler, keyed by node ID. `return_values` holds
/// the alloc-block slots carrying each data output; the per-exec-input
/// vectors are sized by [`input_exec_count`].
#[derive(Debug, Default)]
pub struct NodeCompiler {
    /// One stack slot per data output, allocated in the alloc block.
    pub return_values: Vec<ValueId>,
    /// The code block per activating exec input, reserved by stage 1.
    pub code_blocks: Vec<Option<BlockId>>,
    /// The pure-dependency chain per activating exec input (impure nodes
    /// only).
    pub pure_blocks: Vec<Vec<BlockId>>,
    /// Whether stage 2 ran for a given exec input.
    pub compiled_inputs: Vec<bool>,
    /// For pure nodes: the indirect branch that jumps back to the consumer.
    /// Consumers register their return blocks here.
    pub jump_back: Option<IndirectBrLoc>,
}

impl NodeCompiler {
    pub fn new(input_execs: usize) -> Self {
        NodeCompiler {
            return_values: Vec::new(),
            code_blocks: vec![None; input_execs],
            pure_blocks: vec![Vec::new(); input_execs],
            compiled_inputs: vec![false; input_execs],
            jump_back: None,
        }
    }

    /// Whether stage 2 already ran for this activating exec input.
    pub fn compiled(&self, input_exec_id: usize) -> bool {
        self.compiled_inputs
            .get(input_exec_id)
            .copied()
            .unwrap_or(false)
    }

    /// The block predecessors branch to for this exec input: the head of the
    /// pure chain when there is one, else the code block itself.
    pub fn first_block(&self, input_exec_id: usize) -> Option<BlockId> {
        match self.pure_blocks.get(input_exec_id) {
            Some(chain) if !chain.is_empty() => Some(chain[0]),
            _ => self.code_blocks.get(input_exec_id).copied().flatten(),
        }
    }
}

/// How many distinct activations a node can have: one for pure nodes and
/// the entry node, one per exec input slot otherwise.
pub fn input_exec_count(func: &GraphFunction, node_id: Uuid) -> usize {
    let Some(node) = func.node(node_id) else {
        return 0;
    };
    let ty = node.node_type();
    if ty.pure() || ty.qualified_name() == "lang:entry" {
        1
    } else {
        node.input_exec_connections.len()
    }
}

/// The pure nodes transitively feeding `node_id`'s data inputs, dependencies
/// first, deduplicated so each pure is evaluated once per activation.
pub fn dependent_pures_recursive(func: &GraphFunction, node_id: Uuid) -> Vec<Uuid> {
    let mut out = Vec::new();
    collect_pures(func, node_id, &mut out);
    out
}

fn collect_pures(func: &GraphFunction, node_id: Uuid, out: &mut Vec<Uuid>) {
    let Some(node) = func.node(node_id) else {
        return;
    };
    for conn in node.input_data_connections.iter().flatten() {
        let (producer, _) = *conn;
        let Some(producer_node) = func.node(producer) else {
            continue;
        };
        if !producer_node.node_type().pure() || out.contains(&producer) {
            continue;
        }
        collect_pures(func, producer, out);
        if !out.contains(&producer) {
            out.push(producer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chigraph_core::lang;

    fn empty_func() -> GraphFunction {
        GraphFunction::new(
            "test/main",
            "f",
            vec![],
            vec![],
            vec!["".to_string()],
            vec!["".to_string()],
        )
    }

    #[test]
    fn pure_deps_come_out_in_dependency_order() {
        let mut func = empty_func();
        // two -> add <- three, add -> tofloat; consumer reads tofloat
        let two = Uuid::new_v4();
        let three = Uuid::new_v4();
        let add = Uuid::new_v4();
        let tofloat = Uuid::new_v4();
        let consumer = Uuid::new_v4();

        func.insert_node(Box::new(lang::ConstIntNodeType::new(2)), 0.0, 0.0, two);
        func.insert_node(Box::new(lang::ConstIntNodeType::new(3)), 0.0, 0.0, three);
        func.insert_node(
            Box::new(lang::BinaryOperationNodeType::new(
                lang::type_from_name("i32").unwrap(),
                "+",
                chigraph_ir::BinArithOp::Add,
            )),
            0.0,
            0.0,
            add,
        );
        func.insert_node(Box::new(lang::IntToFloatNodeType::new()), 0.0, 0.0, tofloat);
        func.insert_node(
            Box::new(chigraph_core::module::SetLocalNodeType::new(
                "test/main",
                chigraph_core::NamedDataType::new("x", lang::type_from_name("float").unwrap()),
            )),
            0.0,
            0.0,
            consumer,
        );

        assert!(func.connect_data(two, 0, add, 0).success());
        assert!(func.connect_data(three, 0, add, 1).success());
        assert!(func.connect_data(add, 0, tofloat, 0).success());
        assert!(func.connect_data(tofloat, 0, consumer, 0).success());

        let pures = dependent_pures_recursive(&func, consumer);
        assert_eq!(pures.len(), 4);
        // every producer appears before its consumer
        let pos = |id: Uuid| pures.iter().position(|p| *p == id).unwrap();
        assert!(pos(two) < pos(add));
        assert!(pos(three) < pos(add));
        assert!(pos(add) < pos(tofloat));
    }

    #[test]
    fn shared_pure_is_listed_once() {
        let mut func = empty_func();
        let shared = Uuid::new_v4();
        let add = Uuid::new_v4();
        func.insert_node(Box::new(lang::ConstIntNodeType::new(7)), 0.0, 0.0, shared);
        func.insert_node(
            Box::new(lang::BinaryOperationNodeType::new(
                lang::type_from_name("i32").unwrap(),
                "+",
                chigraph_ir::BinArithOp::Add,
            )),
            0.0,
            0.0,
            add,
        );
        // the same constant feeds both sides
        assert!(func.connect_data(shared, 0, add, 0).success());
        assert!(func.connect_data(shared, 0, add, 1).success());

        let pures = dependent_pures_recursive(&func, add);
        assert_eq!(pures, vec![shared]);
    }

    #[test]
    fn entry_has_one_activation() {
        let mut func = empty_func();
        let entry = Uuid::new_v4();
        func.get_or_insert_entry_node(0.0, 0.0, entry);
        assert_eq!(input_exec_count(&func, entry), 1);
    }

    #[test]
    fn first_block_prefers_the_pure_chain() {
        let mut nc = NodeCompiler::new(1);
        assert_eq!(nc.first_block(0), None);
        nc.code_blocks[0] = Some(BlockId(4));
        assert_eq!(nc.first_block(0), Some(BlockId(4)));
        nc.pure_blocks[0].push(BlockId(2));
        assert_eq!(nc.first_block(0), Some(BlockId(2)));
    }
}
