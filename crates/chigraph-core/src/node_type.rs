//! The node type abstraction: a node's signature plus its lowering.

use std::fmt;

use serde_json::Value;

use crate::lower::LowerCtx;
use crate::report::Report;
use crate::types::NamedDataType;

/// Signature data shared by every node type implementation.
#[derive(Debug, Clone, Default)]
pub struct NodeTypeInfo {
    /// Full name of the owning module.
    pub module: String,
    /// Unqualified type name within the module.
    pub name: String,
    /// Human description.
    pub description: String,
    /// Pure nodes have no exec slots and are lowered on demand.
    pub pure: bool,
    /// Converter node types seed the context's type-converter cache.
    pub converter: bool,
    pub data_inputs: Vec<NamedDataType>,
    pub data_outputs: Vec<NamedDataType>,
    pub exec_inputs: Vec<String>,
    pub exec_outputs: Vec<String>,
}

impl NodeTypeInfo {
    pub fn new(
        module: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        NodeTypeInfo {
            module: module.into(),
            name: name.into(),
            description: description.into(),
            ..NodeTypeInfo::default()
        }
    }

    /// Marks the type pure, clearing any exec slots.
    pub fn make_pure(&mut self) {
        self.pure = true;
        self.exec_inputs.clear();
        self.exec_outputs.clear();
    }

    /// `module:name`.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.module, self.name)
    }
}

/// A kind of node: signature plus lowering behavior. Clonable via
/// [`clone_box`](NodeType::clone_box).
pub trait NodeType: fmt::Debug {
    /// The signature data.
    fn info(&self) -> &NodeTypeInfo;

    /// Emits IR for one activation of the node. See [`LowerCtx`] for the
    /// calling convention.
    fn lower(&self, ctx: LowerCtx<'_, '_>) -> Report;

    /// The JSON payload that reconstructs this type via
    /// `node_type_from_module`.
    fn to_json(&self) -> Value {
        Value::Null
    }

    /// Clones the node type.
    fn clone_box(&self) -> Box<dyn NodeType>;

    // -------------------------------------------------------------------
    // Accessor conveniences over `info()`.
    // -------------------------------------------------------------------

    fn module(&self) -> &str {
        &self.info().module
    }

    fn name(&self) -> &str {
        &self.info().name
    }

    fn qualified_name(&self) -> String {
        self.info().qualified_name()
    }

    fn description(&self) -> &str {
        &self.info().description
    }

    fn pure(&self) -> bool {
        self.info().pure
    }

    fn converter(&self) -> bool {
        self.info().converter
    }

    fn data_inputs(&self) -> &[NamedDataType] {
        &self.info().data_inputs
    }

    fn data_outputs(&self) -> &[NamedDataType] {
        &self.info().data_outputs
    }

    fn exec_inputs(&self) -> &[String] {
        &self.info().exec_inputs
    }

    fn exec_outputs(&self) -> &[String] {
        &self.info().exec_outputs
    }
}

impl Clone for Box<dyn NodeType> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_pure_clears_exec_slots() {
        let mut info = NodeTypeInfo::new("lang", "const-int", "Integer");
        info.exec_inputs = vec!["".into()];
        info.exec_outputs = vec!["".into()];
        info.make_pure();
        assert!(info.pure);
        assert!(info.exec_inputs.is_empty());
        assert!(info.exec_outputs.is_empty());
    }

    #[test]
    fn qualified_name_format() {
        let info = NodeTypeInfo::new("test/main", "myfunc", "");
        assert_eq!(info.qualified_name(), "test/main:myfunc");
    }
}
