//! The per-function lowering driver.
//!
//! Lowering runs in two phases. [`FunctionCompiler::initialize`] creates the
//! IR function (mangled `<module>.<name>`), the alloc block with one stack
//! slot per local variable and the `pure_jumpback` slot, and binds debug
//! info for every parameter. [`FunctionCompiler::compile`] then walks the
//! exec graph from the entry node with a FIFO work list of
//! `(node, activating exec input)` pairs, lowering pure dependencies on
//! demand ahead of each node and reserving successor blocks (stage 1)
//! before emitting the node itself (stage 2).
//!
//! A failed compile leaves the target module untouched: the function under
//! construction is owned by the compiler and only lands in the module once
//! everything succeeded.

use std::collections::{HashMap, VecDeque};

use serde_json::json;
use uuid::Uuid;

use chigraph_check::validate_function;
use chigraph_core::{mangle_function_name, GraphFunction, LowerCtx, Report};
use chigraph_ir::{
    BlockId, Constant, FunctionBuilder, IrFunction, IrModule, IrType, Subprogram, ValueId,
};

use crate::node::{dependent_pures_recursive, input_exec_count, NodeCompiler};

/// Back-end state created by `initialize`.
struct IrState {
    func: IrFunction,
    alloc_block: BlockId,
    pure_jumpback: ValueId,
    locals: HashMap<String, ValueId>,
}

/// Lowers one graph function into an owned IR function.
pub struct FunctionCompiler<'a> {
    graph: &'a GraphFunction,
    node_lines: HashMap<Uuid, u32>,
    state: Option<IrState>,
    node_compilers: HashMap<Uuid, NodeCompiler>,
    compiled: bool,
}

/// The IR parameter list of a graph function: the activating exec index,
/// then data inputs by value, then data outputs by pointer. `None` when a
/// type has no back-end representation.
pub fn function_param_types(func: &GraphFunction) -> Option<Vec<(String, IrType)>> {
    let mut params = vec![("inputexec_id".to_string(), IrType::I32)];
    for input in func.data_inputs() {
        params.push((input.name.clone(), input.ty.ir_type()?.clone()));
    }
    for output in func.data_outputs() {
        params.push((output.name.clone(), output.ty.ir_type()?.ptr_to()));
    }
    Some(params)
}

impl<'a> FunctionCompiler<'a> {
    /// `node_lines` is the module-wide synthetic line table
    /// (`GraphModule::create_line_number_assoc`).
    pub fn new(graph: &'a GraphFunction, node_lines: HashMap<Uuid, u32>) -> Self {
        FunctionCompiler {
            graph,
            node_lines,
            state: None,
            node_compilers: HashMap::new(),
            compiled: false,
        }
    }

    pub fn initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn compiled(&self) -> bool {
        self.compiled
    }

    /// The synthetic line of a node, 0 when unknown.
    pub fn node_line_number(&self, node: Uuid) -> u32 {
        self.node_lines.get(&node).copied().unwrap_or(0)
    }

    /// The stack slot of a local variable, once initialized.
    pub fn local_variable(&self, name: &str) -> Option<ValueId> {
        self.state.as_ref().and_then(|s| s.locals.get(name).copied())
    }

    /// Creates the IR function and the alloc block. Idempotence is checked:
    /// a second call fails.
    pub fn initialize(&mut self, validate: bool) -> Report {
        let mut res = Report::new();
        if self.state.is_some() {
            res.add_entry(
                "EUKN",
                "Cannot initialize a function compiler more than once",
                json!({"Function": self.graph.name()}),
            );
            return res;
        }

        let graph = self.graph;
        let ctx_id = res.push_context(json!({
            "Function": graph.name(),
            "Module": graph.module_full_name(),
        }));

        if validate {
            res += validate_function(graph);
            if !res.success() {
                res.pop_context(ctx_id);
                return res;
            }
        }

        let Some(entry) = graph.entry_node() else {
            res.add_entry("EUKN", "No entry node", json!({}));
            res.pop_context(ctx_id);
            return res;
        };

        let Some(params) = function_param_types(graph) else {
            res.add_entry(
                "EUKN",
                "A parameter type has no backend representation",
                json!({}),
            );
            res.pop_context(ctx_id);
            return res;
        };

        let mangled = mangle_function_name(graph.module_full_name(), graph.name());
        let entry_line = self.node_lines.get(&entry).copied().unwrap_or(1);

        let mut ir_func =
            IrFunction::declaration(mangled.clone(), params.clone(), Some(IrType::I32));
        ir_func.subprogram = Some(Subprogram {
            name: format!("{}:{}", graph.module_full_name(), graph.name()),
            linkage_name: mangled,
            line: entry_line,
        });

        let mut builder = FunctionBuilder::new(&mut ir_func);
        let alloc_block = builder.append_block("alloc");
        builder.position_at_end(alloc_block);
        builder.set_line(Some(entry_line));

        for (idx, (name, _)) in params.iter().enumerate() {
            let param = builder.param(idx);
            builder.build_debug_declare(param, name.clone());
        }

        let pure_jumpback = builder.build_alloca(IrType::I8.ptr_to(), "pure_jumpback");

        let mut locals = HashMap::new();
        for local in graph.local_variables() {
            let Some(ty) = local.ty.ir_type().cloned() else {
                res.add_entry(
                    "EUKN",
                    "A local variable type has no backend representation",
                    json!({"Variable": local.name}),
                );
                res.pop_context(ctx_id);
                return res;
            };
            let slot = builder.build_alloca(ty.clone(), format!("var_{}", local.name));
            builder.build_store(Constant::Null(ty), slot);
            locals.insert(local.name.clone(), slot);
        }
        drop(builder);

        self.state = Some(IrState {
            func: ir_func,
            alloc_block,
            pure_jumpback,
            locals,
        });
        res.pop_context(ctx_id);
        res
    }

    /// Walks the exec graph from the entry node and emits every reachable
    /// node, exactly once per activating exec input. Requires `initialize`;
    /// a second call fails.
    pub fn compile(&mut self) -> Report {
        let mut res = Report::new();
        if self.state.is_none() {
            res.add_entry(
                "EUKN",
                "A function compiler must be initialized before compiling",
                json!({"Function": self.graph.name()}),
            );
            return res;
        }
        if self.compiled {
            res.add_entry(
                "EUKN",
                "Cannot compile a function compiler twice",
                json!({"Function": self.graph.name()}),
            );
            return res;
        }
        self.compiled = true;

        let graph = self.graph;
        let ctx_id = res.push_context(json!({
            "Function": graph.name(),
            "Module": graph.module_full_name(),
        }));

        let Some(entry) = graph.entry_node() else {
            res.add_entry("EUKN", "No entry node", json!({}));
            res.pop_context(ctx_id);
            return res;
        };

        let mut worklist: VecDeque<(Uuid, usize)> = VecDeque::new();
        worklist.push_back((entry, 0));

        while let Some((node_id, input_exec_id)) = worklist.pop_front() {
            if self
                .node_compilers
                .get(&node_id)
                .map(|nc| nc.compiled(input_exec_id))
                .unwrap_or(false)
            {
                continue;
            }

            res += self.compile_pure_dependencies(node_id);
            if !res.success() {
                res.pop_context(ctx_id);
                return res;
            }

            let Some(node) = graph.node(node_id) else {
                res.add_entry(
                    "EUKN",
                    "Work list references a node that doesn't exist",
                    json!({"Node ID": node_id.to_string()}),
                );
                res.pop_context(ctx_id);
                return res;
            };
            let successors: Vec<Option<(Uuid, usize)>> = node.output_exec_connections.clone();

            // stage 1 on every successor, collecting their first blocks
            let mut output_blocks = Vec::with_capacity(successors.len());
            for conn in &successors {
                let Some((succ, succ_exec)) = conn else {
                    res.add_entry(
                        "EUKN",
                        "Node is missing an output exec connection",
                        json!({"Node ID": node_id.to_string()}),
                    );
                    res.pop_context(ctx_id);
                    return res;
                };

                res += self.compile_pure_dependencies(*succ);
                if !res.success() {
                    res.pop_context(ctx_id);
                    return res;
                }

                self.compile_stage1(*succ, *succ_exec);
                match self
                    .node_compilers
                    .get(succ)
                    .and_then(|nc| nc.first_block(*succ_exec))
                {
                    Some(block) => output_blocks.push(block),
                    None => {
                        res.add_entry(
                            "EUKN",
                            "Successor has no first block after stage 1",
                            json!({"Node ID": succ.to_string()}),
                        );
                        res.pop_context(ctx_id);
                        return res;
                    }
                }
            }

            res += self.compile_stage2(node_id, output_blocks, input_exec_id);
            if !res.success() {
                res.pop_context(ctx_id);
                return res;
            }

            for conn in successors.iter().flatten() {
                worklist.push_back(*conn);
            }
        }

        // the alloc block falls through into the entry's first block
        let entry_first = self
            .node_compilers
            .get(&entry)
            .and_then(|nc| nc.first_block(0));
        let Some(entry_first) = entry_first else {
            res.add_entry("EUKN", "Entry node was never lowered", json!({}));
            res.pop_context(ctx_id);
            return res;
        };
        if let Some(state) = self.state.as_mut() {
            let alloc_block = state.alloc_block;
            let mut builder = FunctionBuilder::new(&mut state.func);
            builder.position_at_end(alloc_block);
            builder.build_br(entry_first);
        }

        res.pop_context(ctx_id);
        res
    }

    /// Consumes the compiler, yielding the built function (present once
    /// `initialize` succeeded).
    pub fn into_function(self) -> Option<IrFunction> {
        self.state.map(|s| s.func)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Stage-2 lowers every pure node transitively feeding `node_id`.
    fn compile_pure_dependencies(&mut self, node_id: Uuid) -> Report {
        let mut res = Report::new();
        for pure in dependent_pures_recursive(self.graph, node_id) {
            res += self.compile_stage2(pure, Vec::new(), 0);
            if !res.success() {
                return res;
            }
        }
        res
    }

    /// Creates the per-node state, allocating one output slot per data
    /// output in the alloc block.
    fn ensure_node_compiler(&mut self, node_id: Uuid) {
        if self.node_compilers.contains_key(&node_id) {
            return;
        }
        let graph = self.graph;
        let Some(node) = graph.node(node_id) else {
            return;
        };
        let Some(state) = self.state.as_mut() else {
            return;
        };

        let mut nc = NodeCompiler::new(input_exec_count(graph, node_id));

        let mut builder = FunctionBuilder::new(&mut state.func);
        builder.position_at_end(state.alloc_block);
        builder.set_line(None);
        for (idx, output) in node.node_type().data_outputs().iter().enumerate() {
            let ty = output.ty.ir_type().cloned().unwrap_or(IrType::I32);
            let slot_name = format!("{}__{}", node.string_id(), idx);
            let slot = builder.build_alloca(ty, slot_name.clone());
            builder.build_debug_declare(slot, slot_name);
            nc.return_values.push(slot);
        }
        drop(builder);

        self.node_compilers.insert(node_id, nc);
    }

    /// Stage 1: reserves the code block for `(node, exec input)` and, for
    /// impure nodes, builds the pure-dependency chain in front of it.
    fn compile_stage1(&mut self, node_id: Uuid, input_exec_id: usize) {
        self.ensure_node_compiler(node_id);

        let already_reserved = self
            .node_compilers
            .get(&node_id)
            .and_then(|nc| nc.code_blocks.get(input_exec_id).copied().flatten())
            .is_some();
        if already_reserved {
            return;
        }

        let graph = self.graph;
        let Some(node) = graph.node(node_id) else {
            return;
        };
        let is_pure = node.node_type().pure();

        // pure nodes don't call their dependencies, they are called by the
        // impure consumer through its chain
        let dep_pures = if is_pure {
            Vec::new()
        } else {
            dependent_pures_recursive(graph, node_id)
        };

        let (code_block, chain) = {
            let Some(state) = self.state.as_mut() else {
                return;
            };
            let mut builder = FunctionBuilder::new(&mut state.func);
            let code_block =
                builder.append_block(format!("node_{}__{}", node_id, input_exec_id));
            let chain: Vec<BlockId> = dep_pures
                .iter()
                .map(|p| builder.append_block(format!("node_{}__{}__{}", node_id, input_exec_id, p)))
                .collect();
            (code_block, chain)
        };

        if let Some(nc) = self.node_compilers.get_mut(&node_id) {
            if input_exec_id < nc.code_blocks.len() {
                nc.code_blocks[input_exec_id] = Some(code_block);
                nc.pure_blocks[input_exec_id] = chain.clone();
            }
        }

        // wire the chain: each link stores the next block's address into
        // pure_jumpback and branches into its pure node
        for (idx, pure) in dep_pures.iter().enumerate() {
            let next_block = if idx + 1 == dep_pures.len() {
                code_block
            } else {
                chain[idx + 1]
            };

            let jump_back = self.node_compilers.get(pure).and_then(|nc| nc.jump_back);
            let pure_first = self
                .node_compilers
                .get(pure)
                .and_then(|nc| nc.first_block(0));

            let Some(state) = self.state.as_mut() else {
                return;
            };
            let pure_jumpback = state.pure_jumpback;
            let mut builder = FunctionBuilder::new(&mut state.func);

            if let Some(loc) = jump_back {
                builder.add_indirect_destination(loc, next_block);
            }

            builder.position_at_end(chain[idx]);
            let address = builder.block_address(next_block);
            builder.build_store(address, pure_jumpback);
            if let Some(first) = pure_first {
                builder.build_br(first);
            }
        }
    }

    /// Stage 2: fills the code block through the node type's lowering
    /// callback. Pure nodes get a jump-back block with an indirect branch
    /// through `pure_jumpback` as their single trailing block.
    fn compile_stage2(
        &mut self,
        node_id: Uuid,
        trailing_blocks: Vec<BlockId>,
        input_exec_id: usize,
    ) -> Report {
        let mut res = Report::new();

        self.ensure_node_compiler(node_id);
        if self
            .node_compilers
            .get(&node_id)
            .map(|nc| nc.compiled(input_exec_id))
            .unwrap_or(false)
        {
            return res;
        }

        self.compile_stage1(node_id, input_exec_id);

        let graph = self.graph;
        let Some(node) = graph.node(node_id) else {
            res.add_entry(
                "EUKN",
                "Cannot lower a node that doesn't exist",
                json!({"Node ID": node_id.to_string()}),
            );
            return res;
        };
        let is_pure = node.node_type().pure();

        let code_block = self
            .node_compilers
            .get(&node_id)
            .and_then(|nc| nc.code_blocks.get(input_exec_id).copied().flatten());
        let Some(code_block) = code_block else {
            res.add_entry(
                "EUKN",
                "Stage 1 did not reserve a code block",
                json!({"Node ID": node_id.to_string(), "Input Exec": input_exec_id}),
            );
            return res;
        };

        // producers first, so their output slots exist
        let mut producers = Vec::with_capacity(node.input_data_connections.len());
        for (slot, conn) in node.input_data_connections.iter().enumerate() {
            let Some(pair) = conn else {
                res.add_entry(
                    "EUKN",
                    "Node is missing an input data connection",
                    json!({"Node ID": node_id.to_string(), "dataid": slot}),
                );
                return res;
            };
            producers.push(*pair);
        }
        for (producer, _) in &producers {
            self.ensure_node_compiler(*producer);
        }

        let line = self.node_lines.get(&node_id).copied().unwrap_or(0);

        let Some(state) = self.state.as_mut() else {
            res.add_entry("EUKN", "Function compiler is not initialized", json!({}));
            return res;
        };
        let pure_jumpback = state.pure_jumpback;
        let mut builder = FunctionBuilder::new(&mut state.func);
        builder.position_at_end(code_block);
        builder.set_line(Some(line));

        // io: loaded inputs followed by output slots
        let mut io: Vec<ValueId> = Vec::with_capacity(
            producers.len() + node.node_type().data_outputs().len(),
        );
        for (idx, (producer, producer_slot)) in producers.iter().enumerate() {
            let slot_value = self
                .node_compilers
                .get(producer)
                .and_then(|nc| nc.return_values.get(*producer_slot).copied());
            let Some(slot_value) = slot_value else {
                res.add_entry(
                    "EUKN",
                    "Connection to a value that doesn't exist",
                    json!({
                        "Node ID": node_id.to_string(),
                        "Producer": producer.to_string(),
                        "dataid": idx,
                    }),
                );
                return res;
            };
            let ty = node.node_type().data_inputs()[idx]
                .ty
                .ir_type()
                .cloned()
                .unwrap_or(IrType::I32);
            io.push(builder.build_load(slot_value, ty, ""));
        }
        if let Some(nc) = self.node_compilers.get(&node_id) {
            io.extend(nc.return_values.iter().copied());
        }

        // pure nodes return to their consumer through pure_jumpback
        let trailing = if is_pure {
            let jumpback_block = builder.append_block(format!("node_{}_jumpback", node_id));
            builder.position_at_end(jumpback_block);
            let address = builder.build_load(pure_jumpback, IrType::I8.ptr_to(), "");
            let loc = builder.build_indirect_br(address);
            if let Some(nc) = self.node_compilers.get_mut(&node_id) {
                nc.jump_back = Some(loc);
            }
            builder.position_at_end(code_block);
            vec![jumpback_block]
        } else {
            trailing_blocks
        };

        res += node.node_type().lower(LowerCtx {
            builder: &mut builder,
            input_exec_id,
            io: &io,
            output_blocks: &trailing,
            line,
            locals: &state.locals,
        });
        drop(builder);

        if let Some(nc) = self.node_compilers.get_mut(&node_id) {
            if input_exec_id < nc.compiled_inputs.len() {
                nc.compiled_inputs[input_exec_id] = true;
            }
        }
        res
    }
}

/// Lowers `func` into `module`: initialize (with validation), compile, and
/// install the finished function over its forward declaration. On failure
/// the module is left untouched.
pub fn compile_function(
    func: &GraphFunction,
    module: &mut IrModule,
    node_lines: &HashMap<Uuid, u32>,
) -> Report {
    let mut compiler = FunctionCompiler::new(func, node_lines.clone());
    let mut res = compiler.initialize(true);
    if !res.success() {
        return res;
    }
    res += compiler.compile();
    if !res.success() {
        return res;
    }

    if let Some(ir_func) = compiler.into_function() {
        let name = ir_func.name.clone();
        match module.function_mut(&name) {
            Some(existing) => *existing = ir_func,
            None => module.functions.push(ir_func),
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use chigraph_core::lang;

    fn minimal_main() -> GraphFunction {
        let mut func = GraphFunction::new(
            "test/main",
            "main",
            vec![],
            vec![],
            vec!["".to_string()],
            vec!["".to_string()],
        );
        let entry = Uuid::new_v4();
        let exit = Uuid::new_v4();
        func.get_or_insert_entry_node(0.0, 0.0, entry);
        func.insert_node(func.create_exit_node_type(), 10.0, 0.0, exit);
        func.connect_exec(entry, 0, exit, 0);
        func
    }

    #[test]
    fn initialize_twice_is_rejected() {
        let func = minimal_main();
        let mut compiler = FunctionCompiler::new(&func, HashMap::new());
        assert!(compiler.initialize(true).success());
        let res = compiler.initialize(true);
        assert!(!res.success());
    }

    #[test]
    fn compile_requires_initialize_and_runs_once() {
        let func = minimal_main();
        let mut compiler = FunctionCompiler::new(&func, HashMap::new());
        assert!(!compiler.compile().success());

        let mut compiler = FunctionCompiler::new(&func, HashMap::new());
        assert!(compiler.initialize(true).success());
        assert!(compiler.compile().success());
        assert!(!compiler.compile().success());
    }

    #[test]
    fn minimal_function_lands_in_the_module() {
        let func = minimal_main();
        let mut module = IrModule::new("test/main");
        let res = compile_function(&func, &mut module, &HashMap::new());
        assert!(res.success(), "{}", res.dump());

        let compiled = module.function("test/main.main").unwrap();
        assert!(!compiled.is_declaration());
        // alloc block ends with a branch into the entry's block
        assert_eq!(compiled.blocks[0].label, "alloc");
        assert!(matches!(
            compiled.blocks[0].instrs.last().map(|l| &l.instr),
            Some(chigraph_ir::Instr::Br { .. })
        ));
        assert!(chigraph_ir::verify_module(&module).is_ok());
    }

    #[test]
    fn failed_validation_leaves_the_module_untouched() {
        // entry's exec output dangles
        let mut func = minimal_main();
        let entry = func.entry_node().unwrap();
        func.disconnect_exec(entry, 0);

        let mut module = IrModule::new("test/main");
        let res = compile_function(&func, &mut module, &HashMap::new());
        assert!(!res.success());
        assert!(module.function("test/main.main").is_none());
    }

    #[test]
    fn params_follow_the_calling_convention() {
        let i32_ty = lang::type_from_name("i32").unwrap();
        let func = GraphFunction::new(
            "m/main",
            "f",
            vec![chigraph_core::NamedDataType::new("x", i32_ty.clone())],
            vec![chigraph_core::NamedDataType::new("out", i32_ty)],
            vec!["".to_string()],
            vec!["".to_string()],
        );
        let params = function_param_types(&func).unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0], ("inputexec_id".to_string(), IrType::I32));
        assert_eq!(params[1], ("x".to_string(), IrType::I32));
        assert_eq!(params[2], ("out".to_string(), IrType::I32.ptr_to()));
    }
}
