//! Validation of graph functions.
//!
//! [`validate_function`] checks every structural invariant compilation
//! relies on: two-way connection symmetry, connected inputs along every
//! execution path, no dangling exec outputs, entry/exit signature agreement,
//! data-edge type agreement, an acyclic pure-dependency graph, resolvable
//! local variables, and the `main` signature shape. All checks accumulate
//! into one [`Report`]; a successful validation guarantees compilation will
//! not fail with a slot-range or type-mismatch error.

use std::collections::HashMap;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use serde_json::json;
use uuid::Uuid;

use chigraph_core::{GraphFunction, Report};

/// Runs every validation pass over a function.
pub fn validate_function(func: &GraphFunction) -> Report {
    let mut res = Report::new();

    res += validate_connections_are_two_way(func);
    res += validate_node_inputs(func);
    res += validate_exec_outputs(func);
    res += validate_entry_type(func);
    res += validate_exit_types(func);
    res += validate_edge_types(func);
    res += validate_pure_dependencies_acyclic(func);
    res += validate_local_references(func);

    let module_short_name = func
        .module_full_name()
        .rsplit('/')
        .next()
        .unwrap_or_default();
    if func.name() == "main" && module_short_name == "main" {
        res += validate_main_signature(func);
    }

    res
}

fn function_context(func: &GraphFunction) -> serde_json::Value {
    json!({"function": func.name(), "module": func.module_full_name()})
}

/// Every connection must be mirrored on its other endpoint.
pub fn validate_connections_are_two_way(func: &GraphFunction) -> Report {
    let mut res = Report::new();
    res.scoped(function_context(func), |res| {
        for (id, node) in func.nodes() {
            // input data
            for (slot, conn) in node.input_data_connections.iter().enumerate() {
                let Some((producer, producer_slot)) = conn else {
                    res.add_entry(
                        "EUKN",
                        "Node is missing an input data connection",
                        json!({
                            "Node ID": id.to_string(),
                            "nodetype": node.node_type().qualified_name(),
                            "requested id": slot,
                        }),
                    );
                    continue;
                };

                let connects_back = func
                    .node(*producer)
                    .and_then(|p| p.output_data_connections.get(*producer_slot))
                    .map(|conns| conns.contains(&(*id, slot)))
                    .unwrap_or(false);
                if !connects_back {
                    res.add_entry(
                        "EUKN",
                        "Data connection doesn't connect back",
                        json!({
                            "Left Node": producer.to_string(),
                            "Right Node": id.to_string(),
                            "Right input ID": slot,
                        }),
                    );
                }
            }

            // output data
            for (slot, conns) in node.output_data_connections.iter().enumerate() {
                for (consumer, consumer_slot) in conns {
                    let mirrored = func
                        .node(*consumer)
                        .and_then(|c| c.input_data_connections.get(*consumer_slot))
                        .copied()
                        .flatten();
                    if mirrored != Some((*id, slot)) {
                        res.add_entry(
                            "EUKN",
                            "Data connection doesn't connect back",
                            json!({
                                "Left Node": id.to_string(),
                                "Right Node": consumer.to_string(),
                                "Right input ID": consumer_slot,
                            }),
                        );
                    }
                }
            }

            // input exec
            for (slot, conns) in node.input_exec_connections.iter().enumerate() {
                for (pred, pred_slot) in conns {
                    let mirrored = func
                        .node(*pred)
                        .and_then(|p| p.output_exec_connections.get(*pred_slot))
                        .copied()
                        .flatten();
                    if mirrored != Some((*id, slot)) {
                        res.add_entry(
                            "EUKN",
                            "Exec connection doesn't connect back",
                            json!({
                                "Left Node": pred.to_string(),
                                "Right Node": id.to_string(),
                                "Left output ID": pred_slot,
                            }),
                        );
                    }
                }
            }

            // output exec
            for (slot, conn) in node.output_exec_connections.iter().enumerate() {
                let Some((succ, succ_slot)) = conn else {
                    continue;
                };
                let connects_back = func
                    .node(*succ)
                    .and_then(|s| s.input_exec_connections.get(*succ_slot))
                    .map(|conns| conns.contains(&(*id, slot)))
                    .unwrap_or(false);
                if !connects_back {
                    res.add_entry(
                        "EUKN",
                        "Exec connection doesn't connect back",
                        json!({
                            "Left Node": id.to_string(),
                            "Left Node Type": node.node_type().qualified_name(),
                            "Right Node": succ.to_string(),
                            "Left output ID": slot,
                        }),
                    );
                }
            }
        }
    });
    res
}

/// Walks every exec path from the entry node, checking that each node's data
/// inputs are connected and that impure producers run before their
/// consumers.
pub fn validate_node_inputs(func: &GraphFunction) -> Report {
    let mut res = Report::new();
    res.scoped(function_context(func), |res| {
        let Some(entry) = func.entry_node() else {
            return;
        };

        let mut already_called: HashMap<Uuid, Vec<usize>> = HashMap::new();
        already_called.insert(entry, Vec::new());

        let Some(entry_node) = func.node(entry) else {
            return;
        };
        for conn in entry_node.output_exec_connections.iter().flatten() {
            validate_path(func, conn.0, conn.1, already_called.clone(), res);
        }
    });
    res
}

fn validate_path(
    func: &GraphFunction,
    node_id: Uuid,
    in_exec_id: usize,
    mut already_called: HashMap<Uuid, Vec<usize>>,
    res: &mut Report,
) {
    // been here through the same exec input: a loop, stop
    if already_called
        .get(&node_id)
        .map(|ids| ids.contains(&in_exec_id))
        .unwrap_or(false)
    {
        return;
    }

    let Some(node) = func.node(node_id) else {
        return;
    };

    for (slot, conn) in node.input_data_connections.iter().enumerate() {
        let Some((producer, _)) = conn else {
            res.add_entry(
                "EUKN",
                "Node is missing an input data connection",
                json!({
                    "Node ID": node_id.to_string(),
                    "dataid": slot,
                    "nodetype": node.node_type().qualified_name(),
                }),
            );
            continue;
        };

        let producer_pure = func
            .node(*producer)
            .map(|p| p.node_type().pure())
            .unwrap_or(false);
        if !producer_pure && !already_called.contains_key(producer) {
            res.add_entry(
                "EUKN",
                "Node that accepts data from another node is called first",
                json!({
                    "Node ID": node_id.to_string(),
                    "othernodeid": producer.to_string(),
                }),
            );
        }
    }

    already_called.entry(node_id).or_default().push(in_exec_id);

    for conn in node.output_exec_connections.iter().flatten() {
        validate_path(func, conn.0, conn.1, already_called.clone(), res);
    }
}

/// Every exec output slot must be connected (exits have none, so they pass
/// vacuously).
pub fn validate_exec_outputs(func: &GraphFunction) -> Report {
    let mut res = Report::new();
    res.scoped(function_context(func), |res| {
        for (id, node) in func.nodes() {
            for (slot, conn) in node.output_exec_connections.iter().enumerate() {
                if conn.is_none() {
                    res.add_entry(
                        "E45",
                        "Node is missing an output exec connection",
                        json!({"Node ID": id.to_string(), "Missing ID": slot}),
                    );
                }
            }
        }
    });
    res
}

/// There must be exactly one entry node, and its outputs must match the
/// function's declared inputs in order and type.
pub fn validate_entry_type(func: &GraphFunction) -> Report {
    let mut res = Report::new();

    let entries = func.nodes_with_type("lang", "entry");
    let entry = entries.first().and_then(|id| func.node(*id));
    let Some(entry) = (if entries.len() == 1 { entry } else { None }) else {
        res.add_entry(
            "E45",
            "Function must have exactly one valid entry node",
            json!({
                "Function": func.name(),
                "Module": func.module_full_name(),
                "Entry Count": entries.len(),
            }),
        );
        return res;
    };

    if entry.node_type().data_outputs() != func.data_inputs()
        || entry.node_type().exec_outputs() != func.exec_inputs()
    {
        let in_func: Vec<_> = func
            .data_inputs()
            .iter()
            .map(|t| json!({t.name.clone(): t.ty.qualified_name()}))
            .collect();
        let in_entry: Vec<_> = entry
            .node_type()
            .data_outputs()
            .iter()
            .map(|t| json!({t.name.clone(): t.ty.qualified_name()}))
            .collect();
        res.add_entry(
            "E45",
            "Inputs to function doesn't match function inputs",
            json!({"Function Inputs": in_func, "Entry Inputs": in_entry}),
        );
    }
    res
}

/// Every exit node's inputs must match the function's declared outputs in
/// order and type.
pub fn validate_exit_types(func: &GraphFunction) -> Report {
    let mut res = Report::new();

    for exit_id in func.exit_nodes() {
        let Some(exit) = func.node(exit_id) else {
            continue;
        };
        if exit.node_type().data_inputs() != func.data_outputs() {
            let out_func: Vec<_> = func
                .data_outputs()
                .iter()
                .map(|t| json!({t.name.clone(): t.ty.qualified_name()}))
                .collect();
            let out_exit: Vec<_> = exit
                .node_type()
                .data_inputs()
                .iter()
                .map(|t| json!({t.name.clone(): t.ty.qualified_name()}))
                .collect();
            res.add_entry(
                "E45",
                "Outputs to function doesn't match function exit",
                json!({
                    "Function Outputs": out_func,
                    "Exit Outputs": out_exit,
                    "Node ID": exit_id.to_string(),
                }),
            );
            return res;
        }
    }
    res
}

/// Every data edge must agree on its endpoint types.
pub fn validate_edge_types(func: &GraphFunction) -> Report {
    let mut res = Report::new();
    res.scoped(function_context(func), |res| {
        for (id, node) in func.nodes() {
            for (slot, conn) in node.input_data_connections.iter().enumerate() {
                let Some((producer, producer_slot)) = conn else {
                    continue;
                };
                let Some(producer_node) = func.node(*producer) else {
                    continue;
                };
                let Some(out_ty) = producer_node
                    .node_type()
                    .data_outputs()
                    .get(*producer_slot)
                else {
                    continue;
                };
                let in_ty = &node.node_type().data_inputs()[slot];
                if out_ty.ty != in_ty.ty {
                    res.add_entry(
                        "E24",
                        "Connecting data nodes with different types is invalid",
                        json!({
                            "Left Hand Type": out_ty.ty.qualified_name(),
                            "Right Hand Type": in_ty.ty.qualified_name(),
                            "Left Node": producer.to_string(),
                            "Right Node": id.to_string(),
                        }),
                    );
                }
            }
        }
    });
    res
}

/// The pure-dependency graph (data edges between pure nodes) must be
/// acyclic, or on-demand lowering would never terminate.
pub fn validate_pure_dependencies_acyclic(func: &GraphFunction) -> Report {
    let mut res = Report::new();

    let mut graph = DiGraph::<Uuid, ()>::new();
    let mut indices = HashMap::new();
    for (id, node) in func.nodes() {
        if node.node_type().pure() {
            indices.insert(*id, graph.add_node(*id));
        }
    }
    for (id, node) in func.nodes() {
        let Some(&to) = indices.get(id) else { continue };
        for (producer, _) in node.input_data_connections.iter().flatten() {
            if let Some(&from) = indices.get(producer) {
                graph.add_edge(from, to, ());
            }
        }
    }

    if is_cyclic_directed(&graph) {
        res.add_entry(
            "E45",
            "Pure nodes form a dependency cycle",
            json!({
                "Function": func.name(),
                "Module": func.module_full_name(),
            }),
        );
    }
    res
}

/// Every `_get_`/`_set_` accessor must name a local variable of the
/// function.
pub fn validate_local_references(func: &GraphFunction) -> Report {
    let mut res = Report::new();
    res.scoped(function_context(func), |res| {
        for (id, node) in func.nodes() {
            if node.node_type().module() != func.module_full_name() {
                continue;
            }
            let name = node.node_type().name().to_string();
            let var = name
                .strip_prefix("_get_")
                .or_else(|| name.strip_prefix("_set_"));
            let Some(var) = var else { continue };
            if func.local_variable(var).is_none() {
                res.add_entry(
                    "E45",
                    "Local variable accessor names an unknown local",
                    json!({"Node ID": id.to_string(), "Variable": var}),
                );
            }
        }
    });
    res
}

/// A `main/main` function takes nothing, has single exec slots, and returns
/// either nothing or one `lang:i32` exit code.
pub fn validate_main_signature(func: &GraphFunction) -> Report {
    let mut res = Report::new();

    if func.exec_inputs().len() != 1 {
        res.add_entry(
            "E45",
            "A main function must have exactly one exec in",
            json!({"Exec Inputs": func.exec_inputs()}),
        );
    }
    if func.exec_outputs().len() != 1 {
        res.add_entry(
            "E45",
            "A main function must have exactly one exec out",
            json!({"Exec Outputs": func.exec_outputs()}),
        );
    }
    if !func.data_inputs().is_empty() {
        let data: Vec<_> = func
            .data_inputs()
            .iter()
            .map(|t| json!({t.name.clone(): t.ty.qualified_name()}))
            .collect();
        res.add_entry(
            "E45",
            "A main function must have no data inputs",
            json!({"Data Inputs": data}),
        );
    }
    let outputs_ok = func.data_outputs().is_empty()
        || (func.data_outputs().len() == 1
            && func.data_outputs()[0].ty.qualified_name() == "lang:i32");
    if !outputs_ok {
        let data: Vec<_> = func
            .data_outputs()
            .iter()
            .map(|t| json!({t.name.clone(): t.ty.qualified_name()}))
            .collect();
        res.add_entry(
            "E45",
            "A main function must have at most one data output that's a lang:i32",
            json!({"Data Outputs": data}),
        );
    }
    res
}
