//! Structural well-formedness checks for compiled modules.
//!
//! Run after lowering; a failure here is a compiler bug, not a user error.

use thiserror::Error;

use crate::instr::{Instr, Operand};
use crate::module::{BlockId, IrFunction, IrModule, ValueId};

/// A single verification failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("function '{function}': block '{block}' is empty")]
    EmptyBlock { function: String, block: String },

    #[error("function '{function}': block '{block}' does not end with a terminator")]
    MissingTerminator { function: String, block: String },

    #[error("function '{function}': block '{block}' has a terminator before its end")]
    EarlyTerminator { function: String, block: String },

    #[error("function '{function}': branch to out-of-range block {target:?}")]
    BadBranchTarget { function: String, target: BlockId },

    #[error("function '{function}': indirect branch with no destinations")]
    EmptyIndirectBr { function: String },

    #[error("function '{function}': reference to undefined register {value:?}")]
    BadValue { function: String, value: ValueId },

    #[error("function '{function}': call to unknown symbol '{callee}'")]
    UnknownCallee { function: String, callee: String },

    #[error("function '{function}': ret shape disagrees with the declared return type")]
    RetMismatch { function: String },
}

/// Verifies every defined function in the module. Returns all failures found.
pub fn verify_module(module: &IrModule) -> Result<(), Vec<VerifyError>> {
    let mut errors = Vec::new();
    for func in &module.functions {
        if func.is_declaration() {
            continue;
        }
        verify_function(module, func, &mut errors);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn verify_function(module: &IrModule, func: &IrFunction, errors: &mut Vec<VerifyError>) {
    let block_count = func.blocks.len() as u32;
    let value_count = func.values.len() as u32;

    let check_block = |target: BlockId, errors: &mut Vec<VerifyError>| {
        if target.0 >= block_count {
            errors.push(VerifyError::BadBranchTarget {
                function: func.name.clone(),
                target,
            });
        }
    };

    for block in &func.blocks {
        match block.instrs.last() {
            None => {
                errors.push(VerifyError::EmptyBlock {
                    function: func.name.clone(),
                    block: block.label.clone(),
                });
                continue;
            }
            Some(last) if !last.instr.is_terminator() => {
                errors.push(VerifyError::MissingTerminator {
                    function: func.name.clone(),
                    block: block.label.clone(),
                });
            }
            _ => {}
        }

        for (idx, located) in block.instrs.iter().enumerate() {
            if located.instr.is_terminator() && idx + 1 != block.instrs.len() {
                errors.push(VerifyError::EarlyTerminator {
                    function: func.name.clone(),
                    block: block.label.clone(),
                });
            }
        }
    }

    // second pass over instruction payloads
    let check_value = |v: ValueId, errors: &mut Vec<VerifyError>| {
        if v.0 >= value_count {
            errors.push(VerifyError::BadValue {
                function: func.name.clone(),
                value: v,
            });
        }
    };
    let check_operand = |op: &Operand, errors: &mut Vec<VerifyError>| {
        if let Operand::Value(v) = op {
            if v.0 >= value_count {
                errors.push(VerifyError::BadValue {
                    function: func.name.clone(),
                    value: *v,
                });
            }
        }
    };

    for block in &func.blocks {
        for located in &block.instrs {
            match &located.instr {
                Instr::Alloca { .. } => {}
                Instr::Load { ptr, .. } => check_value(*ptr, errors),
                Instr::Store { value, ptr } => {
                    check_operand(value, errors);
                    check_value(*ptr, errors);
                }
                Instr::BinOp { lhs, rhs, .. } | Instr::Cmp { lhs, rhs, .. } => {
                    check_operand(lhs, errors);
                    check_operand(rhs, errors);
                }
                Instr::Cast { value, .. } => check_operand(value, errors),
                Instr::FieldPtr { base, .. } => check_value(*base, errors),
                Instr::Call { callee, args, .. } => {
                    if module.function(callee).is_none() {
                        errors.push(VerifyError::UnknownCallee {
                            function: func.name.clone(),
                            callee: callee.clone(),
                        });
                    }
                    for arg in args {
                        check_operand(arg, errors);
                    }
                }
                Instr::DebugDeclare { value, .. } => check_value(*value, errors),
                Instr::Br { target } => check_block(*target, errors),
                Instr::CondBr {
                    cond,
                    then_block,
                    else_block,
                } => {
                    check_operand(cond, errors);
                    check_block(*then_block, errors);
                    check_block(*else_block, errors);
                }
                Instr::Switch {
                    value,
                    default,
                    cases,
                } => {
                    check_operand(value, errors);
                    check_block(*default, errors);
                    for (_, target) in cases {
                        check_block(*target, errors);
                    }
                }
                Instr::IndirectBr {
                    address,
                    destinations,
                } => {
                    check_operand(address, errors);
                    if destinations.is_empty() {
                        errors.push(VerifyError::EmptyIndirectBr {
                            function: func.name.clone(),
                        });
                    }
                    for dest in destinations {
                        check_block(*dest, errors);
                    }
                }
                Instr::Ret { value } => {
                    if value.is_some() != func.ret.is_some() {
                        errors.push(VerifyError::RetMismatch {
                            function: func.name.clone(),
                        });
                    }
                    if let Some(op) = value {
                        check_operand(op, errors);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::types::IrType;
    use crate::value::Constant;

    fn module_with(func: IrFunction) -> IrModule {
        let mut m = IrModule::new("m");
        m.functions.push(func);
        m
    }

    #[test]
    fn well_formed_function_verifies() {
        let mut func = IrFunction::declaration("f", vec![], Some(IrType::I32));
        {
            let mut b = FunctionBuilder::new(&mut func);
            let entry = b.append_block("entry");
            b.position_at_end(entry);
            b.build_ret(Some(Constant::I32(0).into()));
        }
        assert!(verify_module(&module_with(func)).is_ok());
    }

    #[test]
    fn missing_terminator_is_reported() {
        let mut func = IrFunction::declaration("f", vec![], None);
        {
            let mut b = FunctionBuilder::new(&mut func);
            let entry = b.append_block("entry");
            b.position_at_end(entry);
            b.build_alloca(IrType::I32, "x");
        }
        let errs = verify_module(&module_with(func)).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, VerifyError::MissingTerminator { .. })));
    }

    #[test]
    fn unknown_callee_is_reported() {
        let mut func = IrFunction::declaration("f", vec![], None);
        {
            let mut b = FunctionBuilder::new(&mut func);
            let entry = b.append_block("entry");
            b.position_at_end(entry);
            b.build_call("missing", vec![], None, "");
            b.build_ret(None);
        }
        let errs = verify_module(&module_with(func)).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, VerifyError::UnknownCallee { .. })));
    }

    #[test]
    fn empty_indirect_br_is_reported() {
        let mut func = IrFunction::declaration("f", vec![], None);
        {
            let mut b = FunctionBuilder::new(&mut func);
            let entry = b.append_block("entry");
            b.position_at_end(entry);
            let slot = b.build_alloca(IrType::I8.ptr_to(), "jumpback");
            let addr = b.build_load(slot, IrType::I8.ptr_to(), "addr");
            b.build_indirect_br(addr);
        }
        let errs = verify_module(&module_with(func)).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, VerifyError::EmptyIndirectBr { .. })));
    }

    #[test]
    fn ret_mismatch_is_reported() {
        let mut func = IrFunction::declaration("f", vec![], Some(IrType::I32));
        {
            let mut b = FunctionBuilder::new(&mut func);
            let entry = b.append_block("entry");
            b.position_at_end(entry);
            b.build_ret(None);
        }
        let errs = verify_module(&module_with(func)).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, VerifyError::RetMismatch { .. })));
    }
}
