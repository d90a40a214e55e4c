//! A named unit of user code: functions, structs, and dependencies.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::SystemTime;

use serde_json::{json, Value};
use uuid::Uuid;

use chigraph_ir::{Constant, IrType, Operand};

use crate::function::GraphFunction;
use crate::lower::LowerCtx;
use crate::mangle::mangle_function_name;
use crate::node_type::{NodeType, NodeTypeInfo};
use crate::report::Report;
use crate::structure::GraphStruct;
use crate::types::NamedDataType;

/// A graph module: owned functions and structs plus a dependency set.
///
/// The full name is slash-separated (conventionally `host/user/name`); the
/// short name is the last path element. Every mutation bumps the module's
/// last-edit time, which the compile cache uses for freshness.
#[derive(Debug, Clone)]
pub struct GraphModule {
    full_name: String,
    description: String,
    functions: Vec<GraphFunction>,
    structs: Vec<GraphStruct>,
    dependencies: BTreeSet<String>,
    last_edit_time: SystemTime,
}

impl GraphModule {
    pub fn new(full_name: impl Into<String>) -> Self {
        GraphModule {
            full_name: full_name.into(),
            description: String::new(),
            functions: Vec::new(),
            structs: Vec::new(),
            dependencies: BTreeSet::new(),
            last_edit_time: SystemTime::now(),
        }
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The last path element of the full name.
    pub fn short_name(&self) -> &str {
        self.full_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.full_name)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn last_edit_time(&self) -> SystemTime {
        self.last_edit_time
    }

    /// Bumps the last-edit time to now (or to an explicit instant, e.g. the
    /// mtime of the file a module was loaded from).
    pub fn update_last_edit_time(&mut self, time: Option<SystemTime>) {
        self.last_edit_time = time.unwrap_or_else(SystemTime::now);
    }

    // -----------------------------------------------------------------------
    // Dependencies
    // -----------------------------------------------------------------------

    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    /// Records a dependency by name. Resolution against the context happens
    /// in `Context::add_module_dependency`.
    pub fn add_dependency_name(&mut self, name: impl Into<String>) {
        self.dependencies.insert(name.into());
        self.last_edit_time = SystemTime::now();
    }

    /// Removes a dependency name. The dependency module stays loaded in the
    /// context. Returns `false` if it wasn't a dependency.
    pub fn remove_dependency(&mut self, name: &str) -> bool {
        let removed = self.dependencies.remove(name);
        if removed {
            self.last_edit_time = SystemTime::now();
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    pub fn functions(&self) -> &[GraphFunction] {
        &self.functions
    }

    pub fn function_from_name(&self, name: &str) -> Option<&GraphFunction> {
        self.functions.iter().find(|f| f.name() == name)
    }

    /// Mutable access to a function. Bumps the edit time -- mutable access
    /// is assumed to mean mutation.
    pub fn function_mut(&mut self, name: &str) -> Option<&mut GraphFunction> {
        self.last_edit_time = SystemTime::now();
        self.functions.iter_mut().find(|f| f.name() == name)
    }

    /// Returns the function with this name, creating it if absent. The
    /// second element is `true` when a new function was created.
    pub fn get_or_create_function(
        &mut self,
        name: impl Into<String>,
        data_inputs: Vec<NamedDataType>,
        data_outputs: Vec<NamedDataType>,
        exec_inputs: Vec<String>,
        exec_outputs: Vec<String>,
    ) -> (&mut GraphFunction, bool) {
        let name = name.into();
        self.last_edit_time = SystemTime::now();
        if let Some(idx) = self.functions.iter().position(|f| f.name() == name) {
            return (&mut self.functions[idx], false);
        }
        self.functions.push(GraphFunction::new(
            &self.full_name,
            name,
            data_inputs,
            data_outputs,
            exec_inputs,
            exec_outputs,
        ));
        (self.functions.last_mut().expect("just pushed"), true)
    }

    /// Removes a function by name. Returns `false` if absent.
    pub fn remove_function(&mut self, name: &str) -> bool {
        let before = self.functions.len();
        self.functions.retain(|f| f.name() != name);
        let removed = self.functions.len() != before;
        if removed {
            self.last_edit_time = SystemTime::now();
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Structs
    // -----------------------------------------------------------------------

    pub fn structs(&self) -> &[GraphStruct] {
        &self.structs
    }

    pub fn struct_from_name(&self, name: &str) -> Option<&GraphStruct> {
        self.structs.iter().find(|s| s.name() == name)
    }

    pub fn struct_mut(&mut self, name: &str) -> Option<&mut GraphStruct> {
        self.last_edit_time = SystemTime::now();
        self.structs.iter_mut().find(|s| s.name() == name)
    }

    /// Returns the struct with this name, creating it if absent. The second
    /// element is `true` when a new struct was created.
    pub fn get_or_create_struct(&mut self, name: impl Into<String>) -> (&mut GraphStruct, bool) {
        let name = name.into();
        self.last_edit_time = SystemTime::now();
        if let Some(idx) = self.structs.iter().position(|s| s.name() == name) {
            return (&mut self.structs[idx], false);
        }
        self.structs.push(GraphStruct::new(&self.full_name, name));
        (self.structs.last_mut().expect("just pushed"), true)
    }

    /// Removes a struct by name. Returns `false` if absent.
    pub fn remove_struct(&mut self, name: &str) -> bool {
        let before = self.structs.len();
        self.structs.retain(|s| s.name() != name);
        let removed = self.structs.len() != before;
        if removed {
            self.last_edit_time = SystemTime::now();
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Type and node type surface
    // -----------------------------------------------------------------------

    /// Names of the types this module provides (its structs).
    pub fn type_names(&self) -> Vec<String> {
        self.structs.iter().map(|s| s.name().to_string()).collect()
    }

    /// Names of the node types this module provides: one per function, plus
    /// `_make_`/`_break_` per struct.
    pub fn node_type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .functions
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        for s in &self.structs {
            names.push(format!("_make_{}", s.name()));
            names.push(format!("_break_{}", s.name()));
        }
        names
    }

    /// The call node type for one of this module's functions.
    pub fn call_node_type(&self, function_name: &str) -> Option<GraphFuncCallType> {
        self.function_from_name(function_name)
            .map(|f| GraphFuncCallType::new(&self.full_name, f))
    }

    // -----------------------------------------------------------------------
    // Line numbers
    // -----------------------------------------------------------------------

    /// Synthetic line-number table: every node instance in the module gets a
    /// monotonic 1-based line, stable across a single compile. Nodes are
    /// ordered by `function-name:node-id`.
    pub fn create_line_number_assoc(&self) -> HashMap<Uuid, u32> {
        let mut keyed: Vec<(String, Uuid)> = self
            .functions
            .iter()
            .flat_map(|f| {
                f.nodes()
                    .keys()
                    .map(move |id| (format!("{}:{}", f.name(), id), *id))
            })
            .collect();
        keyed.sort();

        keyed
            .into_iter()
            .enumerate()
            .map(|(idx, (_, id))| (id, idx as u32 + 1))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Writes the module's JSON form under `<workspace>/src/<full/name>.chimod`.
    pub fn save_to_disk(&self, workspace: &Path) -> Report {
        let mut res = Report::new();
        let path = workspace
            .join("src")
            .join(format!("{}.chimod", self.full_name));

        if let Some(parent) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                res.add_entry(
                    "E38",
                    "Failed to create module directory",
                    json!({"Path": parent.display().to_string(), "Error": err.to_string()}),
                );
                return res;
            }
        }

        let data = crate::json::graph_module_to_json(self);
        let text = serde_json::to_string_pretty(&data).unwrap_or_default();
        if let Err(err) = std::fs::write(&path, text) {
            res.add_entry(
                "E38",
                "Failed to write module file",
                json!({"Path": path.display().to_string(), "Error": err.to_string()}),
            );
        }
        res
    }
}

// ---------------------------------------------------------------------------
// Node types a graph module provides
// ---------------------------------------------------------------------------

/// A call to a graph function: passes the activating exec index plus all
/// data slots, then dispatches on the callee's returned exec output.
#[derive(Debug, Clone)]
pub struct GraphFuncCallType {
    info: NodeTypeInfo,
}

impl GraphFuncCallType {
    pub fn new(module_full_name: &str, func: &GraphFunction) -> Self {
        let mut info = NodeTypeInfo::new(module_full_name, func.name(), func.description());
        info.data_inputs = func.data_inputs().to_vec();
        info.data_outputs = func.data_outputs().to_vec();
        info.exec_inputs = func.exec_inputs().to_vec();
        info.exec_outputs = func.exec_outputs().to_vec();
        GraphFuncCallType { info }
    }
}

impl NodeType for GraphFuncCallType {
    fn info(&self) -> &NodeTypeInfo {
        &self.info
    }

    fn lower(&self, ctx: LowerCtx<'_, '_>) -> Report {
        let mut res = Report::new();

        let mangled = mangle_function_name(&self.info.module, &self.info.name);

        let mut args: Vec<Operand> = Vec::with_capacity(ctx.io.len() + 1);
        args.push(Constant::I32(ctx.input_exec_id as i32).into());
        args.extend(ctx.io.iter().map(|v| Operand::Value(*v)));

        let ret = ctx
            .builder
            .build_call(mangled, args, Some(IrType::I32), "call_function");

        let (Some(ret), Some(default)) = (ret, ctx.output_blocks.first()) else {
            res.add_entry(
                "EUKN",
                "Call node lowered with no exec outputs",
                json!({"Function": self.info.qualified_name()}),
            );
            return res;
        };

        let cases = ctx
            .output_blocks
            .iter()
            .enumerate()
            .map(|(id, block)| (id as i32, *block))
            .collect();
        ctx.builder.build_switch(ret, *default, cases);
        res
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }
}

/// `_set_<local>` -- stores its input into the function-local stack slot.
#[derive(Debug, Clone)]
pub struct SetLocalNodeType {
    info: NodeTypeInfo,
    var: NamedDataType,
}

impl SetLocalNodeType {
    pub fn new(module_full_name: &str, var: NamedDataType) -> Self {
        let mut info = NodeTypeInfo::new(
            module_full_name,
            format!("_set_{}", var.name),
            format!("Set {}", var.name),
        );
        info.data_inputs = vec![NamedDataType::new("", var.ty.clone())];
        info.exec_inputs = vec!["".into()];
        info.exec_outputs = vec!["".into()];
        SetLocalNodeType { info, var }
    }
}

impl NodeType for SetLocalNodeType {
    fn info(&self) -> &NodeTypeInfo {
        &self.info
    }

    fn lower(&self, ctx: LowerCtx<'_, '_>) -> Report {
        let mut res = Report::new();
        let Some(slot) = ctx.local_variable(&self.var.name) else {
            res.add_entry(
                "EUKN",
                "Local variable not found in function",
                json!({"Variable": self.var.name}),
            );
            return res;
        };
        if ctx.io.len() != 1 || ctx.output_blocks.len() != 1 {
            res.add_entry(
                "EUKN",
                "Malformed lowering request for local set",
                json!({"io": ctx.io.len()}),
            );
            return res;
        }
        ctx.builder.build_store(ctx.io[0], slot);
        ctx.builder.build_br(ctx.output_blocks[0]);
        res
    }

    fn to_json(&self) -> Value {
        json!(self.var.ty.qualified_name())
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }
}

/// `_get_<local>` -- pure read of the function-local stack slot.
#[derive(Debug, Clone)]
pub struct GetLocalNodeType {
    info: NodeTypeInfo,
    var: NamedDataType,
}

impl GetLocalNodeType {
    pub fn new(module_full_name: &str, var: NamedDataType) -> Self {
        let mut info = NodeTypeInfo::new(
            module_full_name,
            format!("_get_{}", var.name),
            format!("Get {}", var.name),
        );
        info.make_pure();
        info.data_outputs = vec![NamedDataType::new("", var.ty.clone())];
        GetLocalNodeType { info, var }
    }
}

impl NodeType for GetLocalNodeType {
    fn info(&self) -> &NodeTypeInfo {
        &self.info
    }

    fn lower(&self, ctx: LowerCtx<'_, '_>) -> Report {
        let mut res = Report::new();
        let Some(slot) = ctx.local_variable(&self.var.name) else {
            res.add_entry(
                "EUKN",
                "Local variable not found in function",
                json!({"Variable": self.var.name}),
            );
            return res;
        };
        if ctx.io.len() != 1 || ctx.output_blocks.len() != 1 {
            res.add_entry(
                "EUKN",
                "Malformed lowering request for local get",
                json!({"io": ctx.io.len()}),
            );
            return res;
        }
        let ty = self
            .var
            .ty
            .ir_type()
            .cloned()
            .unwrap_or(chigraph_ir::IrType::I32);
        let value = ctx.builder.build_load(slot, ty, "");
        ctx.builder.build_store(value, ctx.io[0]);
        ctx.builder.build_br(ctx.output_blocks[0]);
        res
    }

    fn to_json(&self) -> Value {
        json!(self.var.ty.qualified_name())
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }
}
