//! Graph data model and context layer.
//!
//! Programs are graphs of typed nodes connected by data edges (value flow)
//! and exec edges (control flow), organized into named modules. This crate
//! owns the data model -- [`NodeInstance`], [`GraphFunction`],
//! [`GraphStruct`], [`GraphModule`] -- together with the pre-installed
//! [`lang`] module, the [`Context`] that owns all loaded modules, the
//! accumulating [`Report`] diagnostics type, and the JSON on-disk form.
//!
//! Node instances live in an arena per function keyed by UUID; connections
//! are `(node id, slot)` pairs, so the mutually-referencing graph needs no
//! reference cycles.

pub mod context;
pub mod function;
pub mod instance;
pub mod json;
pub mod lang;
pub mod lower;
pub mod mangle;
pub mod module;
pub mod node_type;
pub mod report;
pub mod structure;
pub mod types;

pub use context::{workspace_from_child_path, ChiModule, Context};
pub use function::GraphFunction;
pub use instance::NodeInstance;
pub use lower::LowerCtx;
pub use mangle::{mangle_function_name, unmangle_function_name};
pub use module::GraphModule;
pub use node_type::{NodeType, NodeTypeInfo};
pub use report::Report;
pub use structure::GraphStruct;
pub use types::{DataType, NamedDataType};
