//! A callable defined as a graph of nodes and edges.

use indexmap::IndexMap;
use serde_json::json;
use uuid::Uuid;

use crate::instance::NodeInstance;
use crate::lang;
use crate::module::{GetLocalNodeType, SetLocalNodeType};
use crate::node_type::NodeType;
use crate::report::Report;
use crate::types::{DataType, NamedDataType};

/// One graph function: signature, local variables, and the node arena.
///
/// Nodes are owned by the function and keyed by UUID; connections reference
/// peers by `(id, slot)`. All connection mutations go through the methods
/// here so that both endpoints stay symmetric.
#[derive(Debug, Clone)]
pub struct GraphFunction {
    module_full_name: String,
    name: String,
    description: String,
    data_inputs: Vec<NamedDataType>,
    data_outputs: Vec<NamedDataType>,
    exec_inputs: Vec<String>,
    exec_outputs: Vec<String>,
    local_variables: Vec<NamedDataType>,
    nodes: IndexMap<Uuid, NodeInstance>,
}

impl GraphFunction {
    pub fn new(
        module_full_name: impl Into<String>,
        name: impl Into<String>,
        data_inputs: Vec<NamedDataType>,
        data_outputs: Vec<NamedDataType>,
        exec_inputs: Vec<String>,
        exec_outputs: Vec<String>,
    ) -> Self {
        GraphFunction {
            module_full_name: module_full_name.into(),
            name: name.into(),
            description: String::new(),
            data_inputs,
            data_outputs,
            exec_inputs,
            exec_outputs,
            local_variables: Vec::new(),
            nodes: IndexMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module_full_name(&self) -> &str {
        &self.module_full_name
    }

    /// `module:function`.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.module_full_name, self.name)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn data_inputs(&self) -> &[NamedDataType] {
        &self.data_inputs
    }

    pub fn data_outputs(&self) -> &[NamedDataType] {
        &self.data_outputs
    }

    pub fn exec_inputs(&self) -> &[String] {
        &self.exec_inputs
    }

    pub fn exec_outputs(&self) -> &[String] {
        &self.exec_outputs
    }

    pub fn local_variables(&self) -> &[NamedDataType] {
        &self.local_variables
    }

    pub fn nodes(&self) -> &IndexMap<Uuid, NodeInstance> {
        &self.nodes
    }

    pub fn node(&self, id: Uuid) -> Option<&NodeInstance> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: Uuid) -> Option<&mut NodeInstance> {
        self.nodes.get_mut(&id)
    }

    /// IDs of all nodes whose type is `module:name`.
    pub fn nodes_with_type(&self, module: &str, name: &str) -> Vec<Uuid> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.node_type().module() == module && n.node_type().name() == name)
            .map(|(id, _)| *id)
            .collect()
    }

    /// The function's entry node: the unique `lang:entry` instance whose
    /// signature agrees with the function's inputs. `None` when absent,
    /// duplicated, or out of sync.
    pub fn entry_node(&self) -> Option<Uuid> {
        let matching = self.nodes_with_type("lang", "entry");
        if matching.len() != 1 {
            return None;
        }
        let entry = &self.nodes[&matching[0]];
        let ty = entry.node_type();
        if ty.data_outputs() != self.data_inputs.as_slice() {
            return None;
        }
        if ty.exec_outputs() != self.exec_inputs.as_slice() {
            return None;
        }
        Some(matching[0])
    }

    /// IDs of all exit nodes.
    pub fn exit_nodes(&self) -> Vec<Uuid> {
        self.nodes_with_type("lang", "exit")
    }

    // -----------------------------------------------------------------------
    // Node lifecycle
    // -----------------------------------------------------------------------

    /// Places a node. Fails with `E47` if the ID is taken.
    pub fn insert_node(&mut self, ty: Box<dyn NodeType>, x: f32, y: f32, id: Uuid) -> Report {
        let mut res = Report::new();
        if self.nodes.contains_key(&id) {
            res.add_entry(
                "E47",
                "Cannot have two nodes with the same ID",
                json!({"Requested ID": id.to_string()}),
            );
            return res;
        }
        self.nodes.insert(id, NodeInstance::new(ty, x, y, id));
        res
    }

    /// Removes a node, disconnecting all of its slots first.
    pub fn remove_node(&mut self, id: Uuid) -> Report {
        let mut res = Report::new();
        let node = match self.nodes.get(&id) {
            Some(n) => n,
            None => {
                res.add_entry(
                    "EUKN",
                    "Cannot remove a node that doesn't exist",
                    json!({"Node ID": id.to_string()}),
                );
                return res;
            }
        };

        // snapshot the connections, then sever them through the public ops
        let input_execs: Vec<(Uuid, usize)> = node
            .input_exec_connections
            .iter()
            .flatten()
            .copied()
            .collect();
        let output_exec_slots: Vec<usize> = node
            .output_exec_connections
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_some())
            .map(|(i, _)| i)
            .collect();
        let input_data: Vec<(Uuid, usize)> = node
            .input_data_connections
            .iter()
            .flatten()
            .copied()
            .collect();
        let output_data: Vec<(usize, Uuid)> = node
            .output_data_connections
            .iter()
            .enumerate()
            .flat_map(|(slot, conns)| conns.iter().map(move |(peer, _)| (slot, *peer)))
            .collect();

        for (pred, pred_slot) in input_execs {
            res += self.disconnect_exec(pred, pred_slot);
        }
        for slot in output_exec_slots {
            res += self.disconnect_exec(id, slot);
        }
        for (producer, producer_slot) in input_data {
            res += self.disconnect_data(producer, producer_slot, id);
        }
        for (slot, consumer) in output_data {
            res += self.disconnect_data(id, slot, consumer);
        }

        self.nodes.shift_remove(&id);
        res
    }

    /// Retypes a node, renormalizing its slot vectors.
    ///
    /// Exec connections on slots at or beyond the new arity are disconnected;
    /// lower-indexed exec connections are kept. Data connections survive only
    /// when their slot index survives and the endpoint type is unchanged.
    pub fn set_node_type(&mut self, id: Uuid, new_type: Box<dyn NodeType>) -> Report {
        let mut res = Report::new();
        let node = match self.nodes.get(&id) {
            Some(n) => n,
            None => {
                res.add_entry(
                    "EUKN",
                    "Cannot retype a node that doesn't exist",
                    json!({"Node ID": id.to_string()}),
                );
                return res;
            }
        };

        let old_type = node.node_type();
        let new_exec_in = new_type.exec_inputs().len();
        let new_exec_out = new_type.exec_outputs().len();

        // exec inputs past the new arity
        let drop_exec_in: Vec<(Uuid, usize)> = node
            .input_exec_connections
            .iter()
            .skip(new_exec_in)
            .flatten()
            .copied()
            .collect();

        // exec outputs past the new arity
        let drop_exec_out: Vec<usize> = node
            .output_exec_connections
            .iter()
            .enumerate()
            .skip(new_exec_out)
            .filter(|(_, c)| c.is_some())
            .map(|(i, _)| i)
            .collect();

        // data inputs that don't survive
        let drop_data_in: Vec<(Uuid, usize)> = node
            .input_data_connections
            .iter()
            .enumerate()
            .filter_map(|(slot, conn)| {
                let (producer, producer_slot) = (*conn)?;
                let survives = new_type.data_inputs().len() > slot
                    && old_type.data_inputs()[slot].ty == new_type.data_inputs()[slot].ty;
                if survives {
                    None
                } else {
                    Some((producer, producer_slot))
                }
            })
            .collect();

        // data outputs that don't survive
        let drop_data_out: Vec<(usize, Uuid)> = node
            .output_data_connections
            .iter()
            .enumerate()
            .filter(|(slot, _)| {
                !(new_type.data_outputs().len() > *slot
                    && old_type.data_outputs()[*slot].ty == new_type.data_outputs()[*slot].ty)
            })
            .flat_map(|(slot, conns)| conns.iter().map(move |(peer, _)| (slot, *peer)))
            .collect();

        for (pred, pred_slot) in drop_exec_in {
            res += self.disconnect_exec(pred, pred_slot);
        }
        for slot in drop_exec_out {
            res += self.disconnect_exec(id, slot);
        }
        for (producer, producer_slot) in drop_data_in {
            res += self.disconnect_data(producer, producer_slot, id);
        }
        for (slot, consumer) in drop_data_out {
            res += self.disconnect_data(id, slot, consumer);
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.replace_type(new_type);
        }
        res
    }

    // -----------------------------------------------------------------------
    // Connection operations
    // -----------------------------------------------------------------------

    fn node_json(node: &NodeInstance) -> serde_json::Value {
        node.node_type().to_json()
    }

    fn data_outputs_json(node: &NodeInstance) -> serde_json::Value {
        node.node_type()
            .data_outputs()
            .iter()
            .map(|out| json!({ out.name.clone(): out.ty.qualified_name() }))
            .collect()
    }

    fn data_inputs_json(node: &NodeInstance) -> serde_json::Value {
        node.node_type()
            .data_inputs()
            .iter()
            .map(|inp| json!({ inp.name.clone(): inp.ty.qualified_name() }))
            .collect()
    }

    fn missing_node_entry(res: &mut Report, id: Uuid) {
        res.add_entry(
            "EUKN",
            "Node doesn't exist in function",
            json!({"Node ID": id.to_string()}),
        );
    }

    /// Connects `lhs`'s data output `lhs_slot` to `rhs`'s data input
    /// `rhs_slot`. An already-connected input is disconnected first.
    pub fn connect_data(
        &mut self,
        lhs: Uuid,
        lhs_slot: usize,
        rhs: Uuid,
        rhs_slot: usize,
    ) -> Report {
        let mut res = Report::new();

        let (lhs_node, rhs_node) = match (self.nodes.get(&lhs), self.nodes.get(&rhs)) {
            (Some(l), Some(r)) => (l, r),
            (l, r) => {
                if l.is_none() {
                    Self::missing_node_entry(&mut res, lhs);
                }
                if r.is_none() {
                    Self::missing_node_entry(&mut res, rhs);
                }
                return res;
            }
        };

        if lhs_slot >= lhs_node.output_data_connections.len() {
            res.add_entry(
                "E22",
                "Output data connection doesn't exist in node",
                json!({
                    "Requested ID": lhs_slot,
                    "Node Type": lhs_node.node_type().qualified_name(),
                    "Node JSON": Self::node_json(lhs_node),
                    "Node Output Data Connections": Self::data_outputs_json(lhs_node),
                }),
            );
        }
        if rhs_slot >= rhs_node.input_data_connections.len() {
            res.add_entry(
                "E23",
                "Input data connection doesn't exist in node",
                json!({
                    "Requested ID": rhs_slot,
                    "Node Type": rhs_node.node_type().qualified_name(),
                    "Node JSON": Self::node_json(rhs_node),
                    "Node Input Data Connections": Self::data_inputs_json(rhs_node),
                }),
            );
        }
        if !res.success() {
            return res;
        }

        let out_ty = &lhs_node.node_type().data_outputs()[lhs_slot].ty;
        let in_ty = &rhs_node.node_type().data_inputs()[rhs_slot].ty;
        if out_ty != in_ty {
            res.add_entry(
                "E24",
                "Connecting data nodes with different types is invalid",
                json!({
                    "Left Hand Type": out_ty.qualified_name(),
                    "Right Hand Type": in_ty.qualified_name(),
                    "Left Node JSON": Self::node_json(lhs_node),
                    "Right Node JSON": Self::node_json(rhs_node),
                }),
            );
            return res;
        }

        // replacing an existing connection disconnects it first
        if let Some((prev, prev_slot)) = rhs_node.input_data_connections[rhs_slot] {
            res += self.disconnect_data(prev, prev_slot, rhs);
            if !res.success() {
                return res;
            }
        }

        if let Some(node) = self.nodes.get_mut(&lhs) {
            node.output_data_connections[lhs_slot].push((rhs, rhs_slot));
        }
        if let Some(node) = self.nodes.get_mut(&rhs) {
            node.input_data_connections[rhs_slot] = Some((lhs, lhs_slot));
        }
        res
    }

    /// Removes the data edge from `lhs`'s output `lhs_slot` into `rhs`.
    pub fn disconnect_data(&mut self, lhs: Uuid, lhs_slot: usize, rhs: Uuid) -> Report {
        let mut res = Report::new();

        let (lhs_node, rhs_node) = match (self.nodes.get(&lhs), self.nodes.get(&rhs)) {
            (Some(l), Some(r)) => (l, r),
            (l, r) => {
                if l.is_none() {
                    Self::missing_node_entry(&mut res, lhs);
                }
                if r.is_none() {
                    Self::missing_node_entry(&mut res, rhs);
                }
                return res;
            }
        };

        if lhs_slot >= lhs_node.output_data_connections.len() {
            res.add_entry(
                "E22",
                "Output data connection in node doesn't exist",
                json!({
                    "Requested ID": lhs_slot,
                    "Node Type": lhs_node.node_type().qualified_name(),
                    "Node JSON": Self::node_json(lhs_node),
                    "Node Output Data Connections": Self::data_outputs_json(lhs_node),
                }),
            );
            return res;
        }

        let entry = lhs_node.output_data_connections[lhs_slot]
            .iter()
            .find(|(peer, _)| *peer == rhs)
            .copied();
        let (_, rhs_slot) = match entry {
            Some(pair) => pair,
            None => {
                res.add_entry(
                    "EUKN",
                    "Cannot disconnect from connection that doesn't exist",
                    json!({
                        "Left node ID": lhs.to_string(),
                        "Right node ID": rhs.to_string(),
                        "Left dock ID": lhs_slot,
                    }),
                );
                return res;
            }
        };

        if rhs_node.input_data_connections.len() <= rhs_slot {
            res.add_entry(
                "E23",
                "Input data connection doesn't exist in node",
                json!({
                    "Requested ID": rhs_slot,
                    "Node Type": rhs_node.node_type().qualified_name(),
                    "Node JSON": Self::node_json(rhs_node),
                    "Node Input Data Connections": Self::data_inputs_json(rhs_node),
                }),
            );
            return res;
        }

        if rhs_node.input_data_connections[rhs_slot] != Some((lhs, lhs_slot)) {
            res.add_entry(
                "EUKN",
                "Cannot disconnect from connection that doesn't exist",
                json!({
                    "Left node ID": lhs.to_string(),
                    "Right node ID": rhs.to_string(),
                }),
            );
            return res;
        }

        if let Some(node) = self.nodes.get_mut(&rhs) {
            node.input_data_connections[rhs_slot] = None;
        }
        if let Some(node) = self.nodes.get_mut(&lhs) {
            node.output_data_connections[lhs_slot].retain(|(peer, _)| *peer != rhs);
        }
        res
    }

    /// Connects `lhs`'s exec output `lhs_slot` to `rhs`'s exec input
    /// `rhs_slot`. An already-connected output is disconnected first.
    pub fn connect_exec(
        &mut self,
        lhs: Uuid,
        lhs_slot: usize,
        rhs: Uuid,
        rhs_slot: usize,
    ) -> Report {
        let mut res = Report::new();

        let (lhs_node, rhs_node) = match (self.nodes.get(&lhs), self.nodes.get(&rhs)) {
            (Some(l), Some(r)) => (l, r),
            (l, r) => {
                if l.is_none() {
                    Self::missing_node_entry(&mut res, lhs);
                }
                if r.is_none() {
                    Self::missing_node_entry(&mut res, rhs);
                }
                return res;
            }
        };

        if lhs_slot >= lhs_node.output_exec_connections.len() {
            res.add_entry(
                "E22",
                "Output exec connection doesn't exist in node",
                json!({
                    "Requested ID": lhs_slot,
                    "Node Type": lhs_node.node_type().qualified_name(),
                    "Node Output Exec Connections": lhs_node.node_type().exec_outputs(),
                }),
            );
        }
        if rhs_slot >= rhs_node.input_exec_connections.len() {
            res.add_entry(
                "E23",
                "Input exec connection doesn't exist in node",
                json!({
                    "Requested ID": rhs_slot,
                    "Node Type": rhs_node.node_type().qualified_name(),
                    "Node Input Exec Connections": rhs_node.node_type().exec_inputs(),
                }),
            );
        }
        if !res.success() {
            return res;
        }

        if lhs_node.output_exec_connections[lhs_slot].is_some() {
            res += self.disconnect_exec(lhs, lhs_slot);
            if !res.success() {
                return res;
            }
        }

        if let Some(node) = self.nodes.get_mut(&lhs) {
            node.output_exec_connections[lhs_slot] = Some((rhs, rhs_slot));
        }
        if let Some(node) = self.nodes.get_mut(&rhs) {
            node.input_exec_connections[rhs_slot].push((lhs, lhs_slot));
        }
        res
    }

    /// Removes the exec edge leaving `lhs`'s output `lhs_slot`.
    pub fn disconnect_exec(&mut self, lhs: Uuid, lhs_slot: usize) -> Report {
        let mut res = Report::new();

        let lhs_node = match self.nodes.get(&lhs) {
            Some(n) => n,
            None => {
                Self::missing_node_entry(&mut res, lhs);
                return res;
            }
        };

        if lhs_slot >= lhs_node.output_exec_connections.len() {
            res.add_entry(
                "E22",
                "Output exec connection doesn't exist in node",
                json!({
                    "Requested ID": lhs_slot,
                    "Node Type": lhs_node.node_type().qualified_name(),
                    "Node Output Exec Connections": lhs_node.node_type().exec_outputs(),
                }),
            );
            return res;
        }

        let (rhs, rhs_slot) = match lhs_node.output_exec_connections[lhs_slot] {
            Some(pair) => pair,
            None => {
                res.add_entry(
                    "EUKN",
                    "Cannot disconnect an exec connection that isn't connected",
                    json!({
                        "Left node ID": lhs.to_string(),
                        "Left node dock id": lhs_slot,
                    }),
                );
                return res;
            }
        };

        let connects_back = self
            .nodes
            .get(&rhs)
            .and_then(|n| n.input_exec_connections.get(rhs_slot))
            .map(|conns| conns.contains(&(lhs, lhs_slot)))
            .unwrap_or(false);
        if !connects_back {
            res.add_entry(
                "EUKN",
                "Cannot disconnect an exec connection that doesn't connect back",
                json!({
                    "Left node ID": lhs.to_string(),
                    "Left node dock id": lhs_slot,
                }),
            );
            return res;
        }

        if let Some(node) = self.nodes.get_mut(&rhs) {
            node.input_exec_connections[rhs_slot].retain(|pair| *pair != (lhs, lhs_slot));
        }
        if let Some(node) = self.nodes.get_mut(&lhs) {
            node.output_exec_connections[lhs_slot] = None;
        }
        res
    }

    // -----------------------------------------------------------------------
    // Entry and exit synthesis
    // -----------------------------------------------------------------------

    /// The entry node type matching this function's signature.
    pub fn create_entry_node_type(&self) -> Box<dyn NodeType> {
        Box::new(lang::EntryNodeType::new(
            self.data_inputs.clone(),
            self.exec_inputs.clone(),
        ))
    }

    /// The exit node type matching this function's signature.
    pub fn create_exit_node_type(&self) -> Box<dyn NodeType> {
        Box::new(lang::ExitNodeType::new(
            self.data_outputs.clone(),
            self.exec_outputs.clone(),
        ))
    }

    /// Inserts an entry node if the function has none.
    pub fn get_or_insert_entry_node(&mut self, x: f32, y: f32, id: Uuid) -> Report {
        if self.entry_node().is_some() {
            return Report::new();
        }
        let ty = self.create_entry_node_type();
        self.insert_node(ty, x, y, id)
    }

    /// Retypes every entry node after a signature edit.
    fn update_entries(&mut self) {
        let ty_template = self.create_entry_node_type();
        for id in self.nodes_with_type("lang", "entry") {
            self.set_node_type(id, ty_template.clone());
        }
    }

    /// Retypes every exit node after a signature edit.
    fn update_exits(&mut self) {
        let ty_template = self.create_exit_node_type();
        for id in self.nodes_with_type("lang", "exit") {
            self.set_node_type(id, ty_template.clone());
        }
    }

    // -----------------------------------------------------------------------
    // Signature editing
    // -----------------------------------------------------------------------

    pub fn add_data_input(&mut self, ty: DataType, name: impl Into<String>, add_before: usize) {
        let idx = add_before.min(self.data_inputs.len());
        self.data_inputs.insert(idx, NamedDataType::new(name, ty));
        self.update_entries();
    }

    pub fn remove_data_input(&mut self, idx: usize) {
        if idx < self.data_inputs.len() {
            self.data_inputs.remove(idx);
            self.update_entries();
        }
    }

    pub fn rename_data_input(&mut self, idx: usize, name: impl Into<String>) {
        if let Some(input) = self.data_inputs.get_mut(idx) {
            input.name = name.into();
            self.update_entries();
        }
    }

    pub fn retype_data_input(&mut self, idx: usize, ty: DataType) {
        if let Some(input) = self.data_inputs.get_mut(idx) {
            input.ty = ty;
            self.update_entries();
        }
    }

    pub fn add_data_output(&mut self, ty: DataType, name: impl Into<String>, add_before: usize) {
        let idx = add_before.min(self.data_outputs.len());
        self.data_outputs.insert(idx, NamedDataType::new(name, ty));
        self.update_exits();
    }

    pub fn remove_data_output(&mut self, idx: usize) {
        if idx < self.data_outputs.len() {
            self.data_outputs.remove(idx);
            self.update_exits();
        }
    }

    pub fn rename_data_output(&mut self, idx: usize, name: impl Into<String>) {
        if let Some(output) = self.data_outputs.get_mut(idx) {
            output.name = name.into();
            self.update_exits();
        }
    }

    pub fn retype_data_output(&mut self, idx: usize, ty: DataType) {
        if let Some(output) = self.data_outputs.get_mut(idx) {
            output.ty = ty;
            self.update_exits();
        }
    }

    pub fn add_exec_input(&mut self, name: impl Into<String>, add_before: usize) {
        let idx = add_before.min(self.exec_inputs.len());
        self.exec_inputs.insert(idx, name.into());
        self.update_entries();
    }

    pub fn remove_exec_input(&mut self, idx: usize) {
        if idx < self.exec_inputs.len() {
            self.exec_inputs.remove(idx);
            self.update_entries();
        }
    }

    pub fn rename_exec_input(&mut self, idx: usize, name: impl Into<String>) {
        if let Some(slot) = self.exec_inputs.get_mut(idx) {
            *slot = name.into();
            self.update_entries();
        }
    }

    pub fn add_exec_output(&mut self, name: impl Into<String>, add_before: usize) {
        let idx = add_before.min(self.exec_outputs.len());
        self.exec_outputs.insert(idx, name.into());
        self.update_exits();
    }

    pub fn remove_exec_output(&mut self, idx: usize) {
        if idx < self.exec_outputs.len() {
            self.exec_outputs.remove(idx);
            self.update_exits();
        }
    }

    pub fn rename_exec_output(&mut self, idx: usize, name: impl Into<String>) {
        if let Some(slot) = self.exec_outputs.get_mut(idx) {
            *slot = name.into();
            self.update_exits();
        }
    }

    // -----------------------------------------------------------------------
    // Local variables
    // -----------------------------------------------------------------------

    pub fn local_variable(&self, name: &str) -> Option<&NamedDataType> {
        self.local_variables.iter().find(|v| v.name == name)
    }

    /// Returns the local with this name, creating it if absent. The second
    /// element is `true` when a new local was created.
    pub fn get_or_create_local_variable(
        &mut self,
        name: impl Into<String>,
        ty: DataType,
    ) -> (&NamedDataType, bool) {
        let name = name.into();
        if let Some(idx) = self.local_variables.iter().position(|v| v.name == name) {
            return (&self.local_variables[idx], false);
        }
        self.local_variables.push(NamedDataType::new(name, ty));
        (self.local_variables.last().expect("just pushed"), true)
    }

    /// Removes a local variable and every `_get_`/`_set_` node referencing
    /// it. Returns `false` if no such local exists.
    pub fn remove_local_variable(&mut self, name: &str) -> bool {
        let Some(idx) = self.local_variables.iter().position(|v| v.name == name) else {
            return false;
        };
        self.local_variables.remove(idx);

        let module = self.module_full_name.clone();
        let get_name = format!("_get_{}", name);
        let set_name = format!("_set_{}", name);
        let mut doomed = self.nodes_with_type(&module, &get_name);
        doomed.extend(self.nodes_with_type(&module, &set_name));
        for id in doomed {
            self.remove_node(id);
        }
        true
    }

    /// Renames a local variable, retyping its accessor nodes.
    pub fn rename_local_variable(&mut self, old_name: &str, new_name: impl Into<String>) {
        let new_name = new_name.into();
        let Some(var) = self
            .local_variables
            .iter_mut()
            .find(|v| v.name == old_name)
        else {
            return;
        };
        var.name = new_name.clone();
        let var = var.clone();

        let module = self.module_full_name.clone();
        for id in self.nodes_with_type(&module, &format!("_get_{}", old_name)) {
            self.set_node_type(id, Box::new(GetLocalNodeType::new(&module, var.clone())));
        }
        for id in self.nodes_with_type(&module, &format!("_set_{}", old_name)) {
            self.set_node_type(id, Box::new(SetLocalNodeType::new(&module, var.clone())));
        }
    }

    /// Retypes a local variable, retyping its accessor nodes (connections of
    /// the old type are dropped by the retype rules).
    pub fn retype_local_variable(&mut self, name: &str, new_type: DataType) {
        let Some(var) = self.local_variables.iter_mut().find(|v| v.name == name) else {
            return;
        };
        var.ty = new_type;
        let var = var.clone();

        let module = self.module_full_name.clone();
        for id in self.nodes_with_type(&module, &format!("_get_{}", name)) {
            self.set_node_type(id, Box::new(GetLocalNodeType::new(&module, var.clone())));
        }
        for id in self.nodes_with_type(&module, &format!("_set_{}", name)) {
            self.set_node_type(id, Box::new(SetLocalNodeType::new(&module, var.clone())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang;

    fn test_function() -> GraphFunction {
        GraphFunction::new(
            "test/main",
            "main",
            vec![],
            vec![],
            vec!["".to_string()],
            vec!["".to_string()],
        )
    }

    fn add_entry_exit(func: &mut GraphFunction) -> (Uuid, Uuid) {
        let entry_id = Uuid::new_v4();
        let exit_id = Uuid::new_v4();
        assert!(func
            .get_or_insert_entry_node(0.0, 0.0, entry_id)
            .success());
        assert!(func
            .insert_node(func.create_exit_node_type(), 10.0, 0.0, exit_id)
            .success());
        (entry_id, exit_id)
    }

    #[test]
    fn entry_node_requires_matching_signature() {
        let mut func = test_function();
        assert!(func.entry_node().is_none());

        let (entry_id, _) = add_entry_exit(&mut func);
        assert_eq!(func.entry_node(), Some(entry_id));
    }

    #[test]
    fn insert_node_rejects_duplicate_ids() {
        let mut func = test_function();
        let id = Uuid::new_v4();
        assert!(func
            .insert_node(Box::new(lang::ConstIntNodeType::new(3)), 0.0, 0.0, id)
            .success());
        let res = func.insert_node(Box::new(lang::ConstIntNodeType::new(4)), 0.0, 0.0, id);
        assert!(!res.success());
        assert_eq!(res.entries()[0].errorcode, "E47");
    }

    #[test]
    fn connect_exec_updates_both_endpoints() {
        let mut func = test_function();
        let (entry_id, exit_id) = add_entry_exit(&mut func);

        assert!(func.connect_exec(entry_id, 0, exit_id, 0).success());
        assert_eq!(
            func.node(entry_id).unwrap().output_exec_connections[0],
            Some((exit_id, 0))
        );
        assert!(func.node(exit_id).unwrap().input_exec_connections[0]
            .contains(&(entry_id, 0)));
    }

    #[test]
    fn connect_exec_out_of_range_is_e22_e23() {
        let mut func = test_function();
        let (entry_id, exit_id) = add_entry_exit(&mut func);

        let res = func.connect_exec(entry_id, 5, exit_id, 0);
        assert!(!res.success());
        assert_eq!(res.entries()[0].errorcode, "E22");

        let res = func.connect_exec(entry_id, 0, exit_id, 5);
        assert!(!res.success());
        assert_eq!(res.entries()[0].errorcode, "E23");
    }

    #[test]
    fn connect_data_type_mismatch_is_e24_and_leaves_no_edge() {
        let mut func = test_function();
        let int_node = Uuid::new_v4();
        let float_in = Uuid::new_v4();
        func.insert_node(Box::new(lang::ConstIntNodeType::new(1)), 0.0, 0.0, int_node);
        // float->int converter expects a float input
        func.insert_node(
            Box::new(lang::FloatToIntNodeType::new()),
            0.0,
            0.0,
            float_in,
        );

        let res = func.connect_data(int_node, 0, float_in, 0);
        assert!(!res.success());
        assert_eq!(res.entries()[0].errorcode, "E24");
        assert!(func.node(int_node).unwrap().output_data_connections[0].is_empty());
        assert!(func.node(float_in).unwrap().input_data_connections[0].is_none());
    }

    #[test]
    fn connect_data_twice_leaves_one_edge() {
        let mut func = test_function();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        func.insert_node(Box::new(lang::ConstIntNodeType::new(1)), 0.0, 0.0, a);
        func.insert_node(Box::new(lang::IntToFloatNodeType::new()), 0.0, 0.0, b);

        assert!(func.connect_data(a, 0, b, 0).success());
        assert!(func.connect_data(a, 0, b, 0).success());

        assert_eq!(func.node(a).unwrap().output_data_connections[0].len(), 1);
        assert_eq!(
            func.node(b).unwrap().input_data_connections[0],
            Some((a, 0))
        );
    }

    #[test]
    fn connecting_a_connected_input_replaces_the_producer() {
        let mut func = test_function();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let consumer = Uuid::new_v4();
        func.insert_node(Box::new(lang::ConstIntNodeType::new(1)), 0.0, 0.0, a);
        func.insert_node(Box::new(lang::ConstIntNodeType::new(2)), 0.0, 0.0, b);
        func.insert_node(Box::new(lang::IntToFloatNodeType::new()), 0.0, 0.0, consumer);

        assert!(func.connect_data(a, 0, consumer, 0).success());
        assert!(func.connect_data(b, 0, consumer, 0).success());

        assert!(func.node(a).unwrap().output_data_connections[0].is_empty());
        assert_eq!(func.node(b).unwrap().output_data_connections[0].len(), 1);
        assert_eq!(
            func.node(consumer).unwrap().input_data_connections[0],
            Some((b, 0))
        );
    }

    #[test]
    fn disconnect_missing_edge_is_eukn() {
        let mut func = test_function();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        func.insert_node(Box::new(lang::ConstIntNodeType::new(1)), 0.0, 0.0, a);
        func.insert_node(Box::new(lang::IntToFloatNodeType::new()), 0.0, 0.0, b);

        let res = func.disconnect_data(a, 0, b);
        assert!(!res.success());
        assert_eq!(res.entries()[0].errorcode, "EUKN");
    }

    #[test]
    fn remove_node_disconnects_everything() {
        let mut func = test_function();
        let (entry_id, exit_id) = add_entry_exit(&mut func);
        func.connect_exec(entry_id, 0, exit_id, 0);

        assert!(func.remove_node(exit_id).success());
        assert!(func.node(exit_id).is_none());
        assert_eq!(
            func.node(entry_id).unwrap().output_exec_connections[0],
            None
        );
    }

    #[test]
    fn retype_drops_out_of_range_exec_and_keeps_surviving_data() {
        let mut func = test_function();
        let cond = Uuid::new_v4();
        let if_node = Uuid::new_v4();
        let exit_a = Uuid::new_v4();
        let exit_b = Uuid::new_v4();
        func.insert_node(Box::new(lang::ConstBoolNodeType::new(true)), 0.0, 0.0, cond);
        func.insert_node(Box::new(lang::IfNodeType::new()), 0.0, 0.0, if_node);
        func.insert_node(func.create_exit_node_type(), 0.0, 0.0, exit_a);
        func.insert_node(func.create_exit_node_type(), 0.0, 0.0, exit_b);

        assert!(func.connect_data(cond, 0, if_node, 0).success());
        assert!(func.connect_exec(if_node, 0, exit_a, 0).success());
        assert!(func.connect_exec(if_node, 1, exit_b, 0).success());

        // retype to a single-exec-output type with the same data input
        let mut new_ty = lang::IfNodeType::new();
        new_ty.info.exec_outputs = vec!["True".to_string()];
        func.set_node_type(if_node, Box::new(new_ty));

        let node = func.node(if_node).unwrap();
        // slot 0 survives, slot 1 is gone
        assert_eq!(node.output_exec_connections.len(), 1);
        assert_eq!(node.output_exec_connections[0], Some((exit_a, 0)));
        assert!(func.node(exit_b).unwrap().input_exec_connections[0].is_empty());
        // data connection survives: same slot, same type
        assert_eq!(node.input_data_connections[0], Some((cond, 0)));
    }

    #[test]
    fn signature_edit_updates_entry_node() {
        let mut func = test_function();
        let (entry_id, _) = add_entry_exit(&mut func);

        func.add_data_input(lang::type_from_name("i32").unwrap(), "x", 0);

        // the entry node was retyped to produce the new input
        let entry = func.node(entry_id).unwrap();
        assert_eq!(entry.node_type().data_outputs().len(), 1);
        assert_eq!(
            entry.node_type().data_outputs()[0].ty.qualified_name(),
            "lang:i32"
        );
        assert_eq!(func.entry_node(), Some(entry_id));
    }

    #[test]
    fn local_variable_lifecycle() {
        let mut func = test_function();
        let i32_ty = lang::type_from_name("i32").unwrap();

        let (_, inserted) = func.get_or_create_local_variable("x", i32_ty.clone());
        assert!(inserted);
        let (_, inserted) = func.get_or_create_local_variable("x", i32_ty.clone());
        assert!(!inserted);
        assert_eq!(func.local_variables().len(), 1);

        // place accessors, then remove the local: accessors go away
        let get_id = Uuid::new_v4();
        func.insert_node(
            Box::new(GetLocalNodeType::new(
                "test/main",
                NamedDataType::new("x", i32_ty),
            )),
            0.0,
            0.0,
            get_id,
        );
        assert!(func.remove_local_variable("x"));
        assert!(func.node(get_id).is_none());
        assert!(!func.remove_local_variable("x"));
    }
}
