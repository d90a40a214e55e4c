//! Instructions and operands.

use serde::{Deserialize, Serialize};

use crate::module::{BlockId, ValueId};
use crate::types::IrType;
use crate::value::Constant;

/// An instruction operand: a register or an immediate constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Value(ValueId),
    Const(Constant),
}

impl From<ValueId> for Operand {
    fn from(v: ValueId) -> Self {
        Operand::Value(v)
    }
}

impl From<Constant> for Operand {
    fn from(c: Constant) -> Self {
        Operand::Const(c)
    }
}

/// Binary arithmetic operators. Integer and float variants are distinguished
/// by the operand type at emission time, like the underlying machine ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Comparison predicates (signed for integers, ordered for floats).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpPred {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

/// Value cast kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastKind {
    /// Signed integer to float.
    SiToFp,
    /// Float to signed integer (truncating).
    FpToSi,
}

/// A single IR instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    /// Reserve a stack slot; `dest` has type pointer-to-`ty`.
    Alloca { dest: ValueId, ty: IrType },
    /// Load through a pointer.
    Load { dest: ValueId, ptr: ValueId },
    /// Store a value through a pointer.
    Store { value: Operand, ptr: ValueId },
    /// Binary arithmetic.
    BinOp {
        dest: ValueId,
        op: BinArithOp,
        lhs: Operand,
        rhs: Operand,
    },
    /// Comparison producing an `i1`.
    Cmp {
        dest: ValueId,
        pred: CmpPred,
        lhs: Operand,
        rhs: Operand,
    },
    /// Value cast.
    Cast {
        dest: ValueId,
        kind: CastKind,
        value: Operand,
        to: IrType,
    },
    /// Pointer to field `index` of the struct pointed to by `base`.
    FieldPtr {
        dest: ValueId,
        base: ValueId,
        index: usize,
    },
    /// Call a function by symbol name. `dest` is `None` for void calls.
    Call {
        dest: Option<ValueId>,
        callee: String,
        args: Vec<Operand>,
    },
    /// Debug-info declaration binding a register to a source variable name.
    DebugDeclare { value: ValueId, name: String },
    /// Unconditional branch.
    Br { target: BlockId },
    /// Two-way conditional branch on an `i1`.
    CondBr {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    /// Multi-way branch on an `i32`.
    Switch {
        value: Operand,
        default: BlockId,
        cases: Vec<(i32, BlockId)>,
    },
    /// Branch through a block address. `destinations` lists every block the
    /// address may name; the verifier checks the list is non-empty.
    IndirectBr {
        address: Operand,
        destinations: Vec<BlockId>,
    },
    /// Return from the function.
    Ret { value: Option<Operand> },
}

impl Instr {
    /// `true` for instructions that end a basic block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instr::Br { .. }
                | Instr::CondBr { .. }
                | Instr::Switch { .. }
                | Instr::IndirectBr { .. }
                | Instr::Ret { .. }
        )
    }
}

/// An instruction together with its synthetic source line, when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Located {
    pub instr: Instr,
    pub line: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_classification() {
        assert!(Instr::Ret { value: None }.is_terminator());
        assert!(Instr::Br {
            target: BlockId(0)
        }
        .is_terminator());
        assert!(!Instr::Load {
            dest: ValueId(0),
            ptr: ValueId(1)
        }
        .is_terminator());
    }

    #[test]
    fn operand_from_impls() {
        let v: Operand = ValueId(3).into();
        assert_eq!(v, Operand::Value(ValueId(3)));
        let c: Operand = Constant::I1(true).into();
        assert_eq!(c, Operand::Const(Constant::I1(true)));
    }
}
