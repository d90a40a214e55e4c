//! Constant operands.

use serde::{Deserialize, Serialize};

use crate::module::BlockId;
use crate::types::IrType;

/// A compile-time constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    I1(bool),
    I8(i8),
    I32(i32),
    F64(f64),
    /// String literal; has type `i8*`.
    Str(String),
    /// The zero value of the given type.
    Null(IrType),
    /// Address of a basic block in the containing function; has type `i8*`.
    BlockAddress(BlockId),
}

impl Constant {
    /// The IR type of this constant.
    pub fn ty(&self) -> IrType {
        match self {
            Constant::I1(_) => IrType::I1,
            Constant::I8(_) => IrType::I8,
            Constant::I32(_) => IrType::I32,
            Constant::F64(_) => IrType::F64,
            Constant::Str(_) => IrType::I8.ptr_to(),
            Constant::Null(ty) => ty.clone(),
            Constant::BlockAddress(_) => IrType::I8.ptr_to(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_types() {
        assert_eq!(Constant::I32(3).ty(), IrType::I32);
        assert_eq!(Constant::Str("hi".into()).ty(), IrType::I8.ptr_to());
        assert_eq!(Constant::Null(IrType::F64).ty(), IrType::F64);
        assert_eq!(Constant::BlockAddress(BlockId(2)).ty(), IrType::I8.ptr_to());
    }
}
