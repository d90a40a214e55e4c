//! The IR sink for graph compilation.
//!
//! Lowered graphs are emitted into an [`IrModule`]: a collection of functions
//! made of basic blocks holding typed register instructions. The crate is the
//! whole back end surface:
//!
//! - [`builder::FunctionBuilder`] -- positioned instruction emission
//! - [`verify::verify_module`] -- structural well-formedness checks
//! - [`interp`] -- a reference interpreter for compiled modules
//! - a textual printer via the `Display` impls
//!
//! The IR has first-class block addresses and an indirect branch, which the
//! function compiler uses for pure-node re-entry.

pub mod builder;
pub mod instr;
pub mod interp;
pub mod module;
pub mod print;
pub mod types;
pub mod value;
pub mod verify;

pub use builder::FunctionBuilder;
pub use instr::{BinArithOp, CastKind, CmpPred, Instr, Located, Operand};
pub use interp::{interpret_function, interpret_main, InterpError, RtValue};
pub use module::{Block, BlockId, IrFunction, IrModule, Subprogram, ValueDef, ValueId};
pub use types::{DebugEncoding, DebugType, IrType};
pub use value::Constant;
pub use verify::{verify_module, VerifyError};
