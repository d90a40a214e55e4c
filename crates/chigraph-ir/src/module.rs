//! IR containers: modules, functions, blocks, and value definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::instr::Located;
use crate::types::IrType;

/// Function-local SSA register identifier. Parameters occupy the first slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueId(pub u32);

/// Function-local basic block identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Definition of a register: its name (for printing) and type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDef {
    pub name: String,
    pub ty: IrType,
}

/// A basic block: a label plus an instruction sequence ending in a terminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    pub label: String,
    pub instrs: Vec<Located>,
}

/// Debug-info record tying an IR function back to its source function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subprogram {
    /// Source-level name, e.g. `test/main:main`.
    pub name: String,
    /// Symbol name in the module.
    pub linkage_name: String,
    /// Synthetic line number of the function's entry node.
    pub line: u32,
}

/// A function: signature, registers, and blocks. A function with no blocks is
/// an external declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrFunction {
    pub name: String,
    pub params: Vec<(String, IrType)>,
    /// `None` for void functions.
    pub ret: Option<IrType>,
    /// All registers, parameters first.
    pub values: Vec<ValueDef>,
    /// Basic blocks; index 0 is the entry block. Empty for declarations.
    pub blocks: Vec<Block>,
    /// Debug subprogram record, when the function carries debug info.
    pub subprogram: Option<Subprogram>,
}

impl IrFunction {
    /// Creates an external declaration with the given signature.
    pub fn declaration(
        name: impl Into<String>,
        params: Vec<(String, IrType)>,
        ret: Option<IrType>,
    ) -> Self {
        let values = params
            .iter()
            .map(|(n, ty)| ValueDef {
                name: n.clone(),
                ty: ty.clone(),
            })
            .collect();
        IrFunction {
            name: name.into(),
            params,
            ret,
            values,
            blocks: Vec::new(),
            subprogram: None,
        }
    }

    /// `true` if this function has no body.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The register holding parameter `idx`.
    pub fn param_value(&self, idx: usize) -> ValueId {
        debug_assert!(idx < self.params.len());
        ValueId(idx as u32)
    }

    /// Looks up the type of a register.
    pub fn value_type(&self, id: ValueId) -> &IrType {
        &self.values[id.0 as usize].ty
    }

    /// Looks up a block by label.
    pub fn block_by_label(&self, label: &str) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.label == label)
            .map(|i| BlockId(i as u32))
    }
}

/// A compiled module: an ordered set of functions keyed by symbol name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IrModule {
    pub name: String,
    pub functions: Vec<IrFunction>,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> Self {
        IrModule {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    /// Looks up a function by symbol name.
    pub fn function(&self, name: &str) -> Option<&IrFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Looks up a function by symbol name, mutably.
    pub fn function_mut(&mut self, name: &str) -> Option<&mut IrFunction> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    /// Gets the function with this name, inserting `make()` if absent.
    ///
    /// Returns the index of the function within the module.
    pub fn get_or_insert_function(&mut self, name: &str, make: impl FnOnce() -> IrFunction) -> usize {
        if let Some(idx) = self.functions.iter().position(|f| f.name == name) {
            return idx;
        }
        self.functions.push(make());
        self.functions.len() - 1
    }

    /// Removes a function entirely. Returns `true` if it was present.
    pub fn remove_function(&mut self, name: &str) -> bool {
        let before = self.functions.len();
        self.functions.retain(|f| f.name != name);
        self.functions.len() != before
    }

    /// Links `other` into this module.
    ///
    /// Definitions win over declarations; a second definition of an already
    /// defined symbol is dropped (dependency diamonds reach the same module
    /// more than once).
    pub fn link(&mut self, other: IrModule) {
        for func in other.functions {
            match self.functions.iter_mut().find(|f| f.name == func.name) {
                Some(existing) => {
                    if existing.is_declaration() && !func.is_declaration() {
                        *existing = func;
                    }
                }
                None => self.functions.push(func),
            }
        }
    }

    /// Serializes the module to cacheable bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("IR module serialization cannot fail")
    }

    /// Deserializes a module from cached bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<IrModule, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
