//! Graph-to-IR compilation.
//!
//! [`func::FunctionCompiler`] lowers one graph function with the two-stage
//! per-node algorithm; [`module::compile_module`] orchestrates whole modules:
//! dependency resolution across the module DAG, the cache, linking, and the
//! runtime externs.

pub mod func;
pub mod module;
pub mod node;
pub mod runtime;

pub use func::{compile_function, FunctionCompiler};
pub use module::{compile_module, module_fingerprint, CompileSettings};
pub use node::dependent_pures_recursive;
