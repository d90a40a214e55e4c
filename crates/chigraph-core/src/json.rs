//! The on-disk JSON form of graph modules.
//!
//! A module document holds `dependencies`, `types`, and `graphs`. Each graph
//! holds its signature, `local_variables`, a `nodes` map keyed by UUID, and
//! a `connections` array of `[kind, from, fromSlot, to, toSlot]` entries.
//! Node IDs and positions round-trip exactly; serialization is canonical
//! (nodes ordered by UUID) so a load/save cycle is byte-stable.

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::context::Context;
use crate::function::GraphFunction;
use crate::module::GraphModule;
use crate::report::Report;
use crate::structure::GraphStruct;
use crate::types::NamedDataType;

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

fn named_types_json(types: &[NamedDataType]) -> Value {
    types
        .iter()
        .map(|t| json!({ t.name.clone(): t.ty.qualified_name() }))
        .collect()
}

pub fn graph_struct_to_json(def: &GraphStruct) -> Value {
    json!({
        "name": def.name(),
        "fields": def
            .fields()
            .iter()
            .map(|f| json!({"name": f.name, "qualifiedType": f.ty.qualified_name()}))
            .collect::<Vec<_>>(),
    })
}

pub fn graph_function_to_json(func: &GraphFunction) -> Value {
    let mut locals = Map::new();
    for local in func.local_variables() {
        locals.insert(local.name.clone(), json!(local.ty.qualified_name()));
    }

    // canonical order: nodes sorted by their string id
    let mut ids: Vec<Uuid> = func.nodes().keys().copied().collect();
    ids.sort_by_key(|id| id.to_string());

    let mut nodes = Map::new();
    let mut connections = Vec::new();
    for id in ids {
        let node = &func.nodes()[&id];
        nodes.insert(
            node.string_id(),
            json!({
                "type": node.node_type().qualified_name(),
                "location": [node.x(), node.y()],
                "data": node.node_type().to_json(),
            }),
        );

        for (slot, conn) in node.output_exec_connections.iter().enumerate() {
            if let Some((to, to_slot)) = conn {
                connections.push(json!([
                    "exec",
                    node.string_id(),
                    slot,
                    to.to_string(),
                    to_slot
                ]));
            }
        }
        for (slot, conn) in node.input_data_connections.iter().enumerate() {
            if let Some((from, from_slot)) = conn {
                connections.push(json!([
                    "data",
                    from.to_string(),
                    from_slot,
                    node.string_id(),
                    slot
                ]));
            }
        }
    }

    json!({
        "type": "function",
        "name": func.name(),
        "description": func.description(),
        "data_inputs": named_types_json(func.data_inputs()),
        "data_outputs": named_types_json(func.data_outputs()),
        "exec_inputs": func.exec_inputs(),
        "exec_outputs": func.exec_outputs(),
        "local_variables": Value::Object(locals),
        "nodes": Value::Object(nodes),
        "connections": connections,
    })
}

pub fn graph_module_to_json(module: &GraphModule) -> Value {
    json!({
        "dependencies": module.dependencies().iter().collect::<Vec<_>>(),
        "types": module
            .structs()
            .iter()
            .map(graph_struct_to_json)
            .collect::<Vec<_>>(),
        "graphs": module
            .functions()
            .iter()
            .map(graph_function_to_json)
            .collect::<Vec<_>>(),
    })
}

// ---------------------------------------------------------------------------
// Deserialization
// ---------------------------------------------------------------------------

fn parse_named_types(
    ctx: &Context,
    res: &mut Report,
    value: Option<&Value>,
) -> Vec<NamedDataType> {
    let mut out = Vec::new();
    let Some(Value::Array(items)) = value else {
        return out;
    };
    for item in items {
        let Value::Object(map) = item else { continue };
        let Some((name, qualified)) = map.iter().next() else {
            continue;
        };
        let Some(qualified) = qualified.as_str() else {
            continue;
        };
        let (module_part, name_part) = qualified.split_once(':').unwrap_or(("lang", qualified));
        let (type_res, ty) = ctx.type_from_module(module_part, name_part);
        *res += type_res;
        if let Some(ty) = ty {
            out.push(NamedDataType::new(name.clone(), ty));
        }
    }
    out
}

fn parse_string_array(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Builds a graph module from its JSON form and adds it to the context.
///
/// Dependencies are loaded first; then struct and function declarations go
/// in (so cross-references resolve), then struct fields and function bodies.
pub fn json_to_graph_module(ctx: &mut Context, full_name: &str, data: &Value) -> Report {
    let mut res = Report::new();

    // 1. dependencies
    for dep in parse_string_array(data.get("dependencies")) {
        res += ctx.load_module(&dep);
        if !res.success() {
            return res;
        }
    }

    // 2. the module shell, with dependency names and struct declarations
    let mut module = GraphModule::new(full_name);
    for dep in parse_string_array(data.get("dependencies")) {
        module.add_dependency_name(dep);
    }

    let struct_decls: Vec<(String, Value)> = match data.get("types") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let name = item.get("name")?.as_str()?.to_string();
                Some((name, item.get("fields").cloned().unwrap_or(Value::Null)))
            })
            .collect(),
        _ => Vec::new(),
    };
    for (name, _) in &struct_decls {
        module.get_or_create_struct(name.clone());
    }

    if !ctx.add_module(crate::context::ChiModule::Graph(module)) {
        res.add_entry(
            "EUKN",
            "Module already exists in context",
            json!({"Module Name": full_name}),
        );
        return res;
    }

    // 3. struct fields (may reference structs declared above)
    for (name, fields) in &struct_decls {
        let Value::Array(fields) = fields else {
            continue;
        };
        for field in fields {
            let field_name = field
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let Some(qualified) = field.get("qualifiedType").and_then(Value::as_str) else {
                res.add_entry(
                    "EUKN",
                    "Struct field is missing a qualifiedType",
                    json!({"Struct": name, "Field": field_name}),
                );
                return res;
            };
            let (module_part, name_part) = qualified.split_once(':').unwrap_or(("lang", qualified));
            let (type_res, ty) = ctx.type_from_module(module_part, name_part);
            res += type_res;
            let Some(ty) = ty else {
                return res;
            };
            if let Some(def) = ctx
                .graph_module_mut(full_name)
                .and_then(|m| m.struct_mut(name))
            {
                def.add_field(ty, field_name, usize::MAX);
            }
        }
    }

    // 4. function declarations, so call node types resolve in any order
    let graphs: Vec<Value> = match data.get("graphs") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    for graph in &graphs {
        let Some(name) = graph.get("name").and_then(Value::as_str) else {
            res.add_entry("EUKN", "Graph is missing a name", json!({}));
            return res;
        };
        let data_inputs = parse_named_types(ctx, &mut res, graph.get("data_inputs"));
        let data_outputs = parse_named_types(ctx, &mut res, graph.get("data_outputs"));
        if !res.success() {
            return res;
        }
        let exec_inputs = parse_string_array(graph.get("exec_inputs"));
        let exec_outputs = parse_string_array(graph.get("exec_outputs"));

        let description = graph
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let locals: Vec<(String, String)> = match graph.get("local_variables") {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                .collect(),
            _ => Vec::new(),
        };
        let mut resolved_locals = Vec::new();
        for (local_name, qualified) in locals {
            let (module_part, name_part) =
                qualified.split_once(':').unwrap_or(("lang", qualified.as_str()));
            let (type_res, ty) = ctx.type_from_module(module_part, name_part);
            res += type_res;
            match ty {
                Some(ty) => resolved_locals.push((local_name, ty)),
                None => return res,
            }
        }

        if let Some(module) = ctx.graph_module_mut(full_name) {
            let (func, _) = module.get_or_create_function(
                name,
                data_inputs,
                data_outputs,
                exec_inputs,
                exec_outputs,
            );
            func.set_description(description);
            for (local_name, ty) in resolved_locals {
                func.get_or_create_local_variable(local_name, ty);
            }
        }
    }

    // 5. bodies
    for graph in &graphs {
        let func_name = graph
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let nodes: Vec<(String, Value)> = match graph.get("nodes") {
            Some(Value::Object(map)) => {
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            _ => Vec::new(),
        };

        for (id_str, node) in nodes {
            let id = match Uuid::parse_str(&id_str) {
                Ok(id) => id,
                Err(_) => {
                    res.add_entry(
                        "EUKN",
                        "Node ID is not a valid UUID",
                        json!({"Node ID": id_str}),
                    );
                    return res;
                }
            };

            let Some(qualified) = node.get("type").and_then(Value::as_str) else {
                res.add_entry(
                    "EUKN",
                    "Node is missing a type",
                    json!({"Node ID": id_str}),
                );
                return res;
            };
            let (module_part, type_part) =
                qualified.split_once(':').unwrap_or(("lang", qualified));

            let node_data = node.get("data").cloned().unwrap_or(Value::Null);
            let (type_res, ty) = ctx.node_type_from_module(module_part, type_part, &node_data);
            res += type_res;
            let Some(ty) = ty else {
                return res;
            };

            let (x, y) = match node.get("location") {
                Some(Value::Array(loc)) if loc.len() == 2 => (
                    loc[0].as_f64().unwrap_or(0.0) as f32,
                    loc[1].as_f64().unwrap_or(0.0) as f32,
                ),
                _ => (0.0, 0.0),
            };

            if let Some(func) = ctx
                .graph_module_mut(full_name)
                .and_then(|m| m.function_mut(&func_name))
            {
                res += func.insert_node(ty, x, y, id);
                if !res.success() {
                    return res;
                }
            }
        }

        // connections: [kind, from, fromSlot, to, toSlot]
        let connections: Vec<Value> = match graph.get("connections") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        for conn in connections {
            let parts = conn.as_array();
            let parsed = parts.and_then(|parts| {
                if parts.len() != 5 {
                    return None;
                }
                let kind = parts[0].as_str()?;
                let from = Uuid::parse_str(parts[1].as_str()?).ok()?;
                let from_slot = parts[2].as_u64()? as usize;
                let to = Uuid::parse_str(parts[3].as_str()?).ok()?;
                let to_slot = parts[4].as_u64()? as usize;
                Some((kind.to_string(), from, from_slot, to, to_slot))
            });
            let Some((kind, from, from_slot, to, to_slot)) = parsed else {
                res.add_entry(
                    "EUKN",
                    "Malformed connection entry",
                    json!({"Connection": conn}),
                );
                return res;
            };

            if let Some(func) = ctx
                .graph_module_mut(full_name)
                .and_then(|m| m.function_mut(&func_name))
            {
                match kind.as_str() {
                    "data" => res += func.connect_data(from, from_slot, to, to_slot),
                    "exec" => res += func.connect_exec(from, from_slot, to, to_slot),
                    other => res.add_entry(
                        "EUKN",
                        "Unknown connection kind",
                        json!({"Kind": other}),
                    ),
                }
                if !res.success() {
                    return res;
                }
            }
        }
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang;

    /// Builds `test/main` with a `main` function whose graph computes
    /// `2 + 3` into a local, entry -> set -> exit.
    fn build_sample_context() -> Context {
        let mut ctx = Context::new(None);
        ctx.load_module("lang");
        let module = ctx.new_graph_module("test/main").unwrap();
        module.add_dependency_name("lang");

        let i32_ty = lang::type_from_name("i32").unwrap();
        let (func, _) =
            module.get_or_create_function("main", vec![], vec![], vec!["".into()], vec!["".into()]);
        func.get_or_create_local_variable("total", i32_ty.clone());

        let entry = Uuid::new_v4();
        let exit = Uuid::new_v4();
        let two = Uuid::new_v4();
        let three = Uuid::new_v4();
        let add = Uuid::new_v4();
        let set = Uuid::new_v4();

        func.get_or_insert_entry_node(0.0, 0.0, entry);
        func.insert_node(func.create_exit_node_type(), 50.0, 0.0, exit);
        func.insert_node(Box::new(lang::ConstIntNodeType::new(2)), 0.0, 10.0, two);
        func.insert_node(Box::new(lang::ConstIntNodeType::new(3)), 0.0, 20.0, three);
        let add_ty = ctx
            .node_type_from_module("lang", "i32+i32", &Value::Null)
            .1
            .unwrap();
        let set_ty = ctx
            .node_type_from_module("test/main", "_set_total", &json!("lang:i32"))
            .1
            .unwrap();
        let func = ctx
            .graph_module_mut("test/main")
            .unwrap()
            .function_mut("main")
            .unwrap();
        func.insert_node(add_ty, 20.0, 15.0, add);
        func.insert_node(set_ty, 35.0, 15.0, set);

        assert!(func.connect_data(two, 0, add, 0).success());
        assert!(func.connect_data(three, 0, add, 1).success());
        assert!(func.connect_data(add, 0, set, 0).success());
        assert!(func.connect_exec(entry, 0, set, 0).success());
        assert!(func.connect_exec(set, 0, exit, 0).success());

        ctx
    }

    #[test]
    fn module_json_shape() {
        let ctx = build_sample_context();
        let module = ctx.graph_module("test/main").unwrap();
        let j = graph_module_to_json(module);

        assert_eq!(j["dependencies"][0], "lang");
        assert_eq!(j["graphs"][0]["name"], "main");
        assert_eq!(j["graphs"][0]["local_variables"]["total"], "lang:i32");
        assert_eq!(j["graphs"][0]["nodes"].as_object().unwrap().len(), 6);
        // 3 data + 2 exec connections
        assert_eq!(j["graphs"][0]["connections"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn round_trip_preserves_everything() {
        let ctx = build_sample_context();
        let original = graph_module_to_json(ctx.graph_module("test/main").unwrap());

        let mut ctx2 = Context::new(None);
        let res = ctx2.add_module_from_json("test/main", &original);
        assert!(res.success(), "reload failed:\n{}", res.dump());

        let reloaded = graph_module_to_json(ctx2.graph_module("test/main").unwrap());
        assert_eq!(original, reloaded);
    }

    #[test]
    fn struct_round_trip() {
        let mut ctx = Context::new(None);
        ctx.load_module("lang");
        let module = ctx.new_graph_module("test/structs").unwrap();
        let (def, _) = module.get_or_create_struct("pair");
        def.add_field(lang::type_from_name("i32").unwrap(), "first", usize::MAX);
        def.add_field(lang::type_from_name("float").unwrap(), "second", usize::MAX);

        let original = graph_module_to_json(ctx.graph_module("test/structs").unwrap());
        assert_eq!(original["types"][0]["name"], "pair");
        assert_eq!(original["types"][0]["fields"][0]["qualifiedType"], "lang:i32");

        let mut ctx2 = Context::new(None);
        assert!(ctx2.add_module_from_json("test/structs", &original).success());
        let reloaded = graph_module_to_json(ctx2.graph_module("test/structs").unwrap());
        assert_eq!(original, reloaded);
    }

    #[test]
    fn malformed_connection_fails_and_unloads() {
        let mut ctx = Context::new(None);
        let doc = json!({
            "dependencies": ["lang"],
            "types": [],
            "graphs": [{
                "type": "function",
                "name": "main",
                "description": "",
                "data_inputs": [],
                "data_outputs": [],
                "exec_inputs": [""],
                "exec_outputs": [""],
                "local_variables": {},
                "nodes": {},
                "connections": [["data", "not-a-uuid", 0]],
            }],
        });
        let res = ctx.add_module_from_json("test/bad", &doc);
        assert!(!res.success());
        assert!(ctx.module_by_full_name("test/bad").is_none());
    }

    #[test]
    fn unknown_node_type_fails_load() {
        let mut ctx = Context::new(None);
        let doc = json!({
            "dependencies": ["lang"],
            "types": [],
            "graphs": [{
                "type": "function",
                "name": "main",
                "description": "",
                "data_inputs": [],
                "data_outputs": [],
                "exec_inputs": [""],
                "exec_outputs": [""],
                "local_variables": {},
                "nodes": {
                    "10000000-0000-0000-0000-000000000000": {
                        "type": "lang:doesnotexist",
                        "location": [0.0, 0.0],
                        "data": null,
                    }
                },
                "connections": [],
            }],
        });
        let res = ctx.add_module_from_json("test/bad", &doc);
        assert!(!res.success());
        assert!(res
            .entries()
            .iter()
            .any(|e| e.errorcode == "E37"));
        assert!(ctx.module_by_full_name("test/bad").is_none());
    }
}
