//! Textual form of modules, close enough to assembly to read in error
//! reports and CLI output.

use std::fmt;

use crate::instr::{BinArithOp, CastKind, CmpPred, Instr, Operand};
use crate::module::{Block, IrFunction, IrModule};
use crate::types::IrType;
use crate::value::Constant;

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::I1 => write!(f, "i1"),
            IrType::I8 => write!(f, "i8"),
            IrType::I32 => write!(f, "i32"),
            IrType::F64 => write!(f, "double"),
            IrType::Ptr(inner) => write!(f, "{}*", inner),
            IrType::Struct { name, .. } => write!(f, "%{}", name),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::I1(v) => write!(f, "i1 {}", if *v { 1 } else { 0 }),
            Constant::I8(v) => write!(f, "i8 {}", v),
            Constant::I32(v) => write!(f, "i32 {}", v),
            Constant::F64(v) => write!(f, "double {}", v),
            Constant::Str(s) => write!(f, "i8* {:?}", s),
            Constant::Null(ty) => write!(f, "{} zeroinitializer", ty),
            Constant::BlockAddress(b) => write!(f, "i8* blockaddress({})", b),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{}", v),
            Operand::Const(c) => write!(f, "{}", c),
        }
    }
}

fn bin_op_name(op: BinArithOp) -> &'static str {
    match op {
        BinArithOp::Add => "add",
        BinArithOp::Sub => "sub",
        BinArithOp::Mul => "mul",
        BinArithOp::Div => "div",
    }
}

fn cmp_name(pred: CmpPred) -> &'static str {
    match pred {
        CmpPred::Lt => "lt",
        CmpPred::Gt => "gt",
        CmpPred::Le => "le",
        CmpPred::Ge => "ge",
        CmpPred::Eq => "eq",
        CmpPred::Ne => "ne",
    }
}

fn write_instr(f: &mut fmt::Formatter<'_>, func: &IrFunction, instr: &Instr) -> fmt::Result {
    match instr {
        Instr::Alloca { dest, ty } => {
            write!(f, "{} = alloca {}", dest, ty)
        }
        Instr::Load { dest, ptr } => {
            write!(f, "{} = load {}, {}", dest, func.value_type(*dest), ptr)
        }
        Instr::Store { value, ptr } => write!(f, "store {}, {}", value, ptr),
        Instr::BinOp { dest, op, lhs, rhs } => {
            write!(f, "{} = {} {}, {}", dest, bin_op_name(*op), lhs, rhs)
        }
        Instr::Cmp {
            dest,
            pred,
            lhs,
            rhs,
        } => write!(f, "{} = cmp {} {}, {}", dest, cmp_name(*pred), lhs, rhs),
        Instr::Cast {
            dest,
            kind,
            value,
            to,
        } => {
            let op = match kind {
                CastKind::SiToFp => "sitofp",
                CastKind::FpToSi => "fptosi",
            };
            write!(f, "{} = {} {} to {}", dest, op, value, to)
        }
        Instr::FieldPtr { dest, base, index } => {
            write!(f, "{} = fieldptr {}, {}", dest, base, index)
        }
        Instr::Call { dest, callee, args } => {
            if let Some(dest) = dest {
                write!(f, "{} = call @{:?}(", dest, callee)?;
            } else {
                write!(f, "call @{:?}(", callee)?;
            }
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ")")
        }
        Instr::DebugDeclare { value, name } => {
            write!(f, "dbg.declare {}, {:?}", value, name)
        }
        Instr::Br { target } => write!(f, "br {}", label_of(func, *target)),
        Instr::CondBr {
            cond,
            then_block,
            else_block,
        } => write!(
            f,
            "br {}, {}, {}",
            cond,
            label_of(func, *then_block),
            label_of(func, *else_block)
        ),
        Instr::Switch {
            value,
            default,
            cases,
        } => {
            write!(f, "switch {}, {} [", value, label_of(func, *default))?;
            for (i, (case, target)) in cases.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} -> {}", case, label_of(func, *target))?;
            }
            write!(f, "]")
        }
        Instr::IndirectBr {
            address,
            destinations,
        } => {
            write!(f, "indirectbr {}, [", address)?;
            for (i, dest) in destinations.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", label_of(func, *dest))?;
            }
            write!(f, "]")
        }
        Instr::Ret { value } => match value {
            Some(v) => write!(f, "ret {}", v),
            None => write!(f, "ret void"),
        },
    }
}

fn label_of(func: &IrFunction, block: crate::module::BlockId) -> String {
    func.blocks
        .get(block.0 as usize)
        .map(|b| format!("%{}", b.label))
        .unwrap_or_else(|| format!("%<invalid:{}>", block.0))
}

fn write_block(f: &mut fmt::Formatter<'_>, func: &IrFunction, block: &Block) -> fmt::Result {
    writeln!(f, "{}:", block.label)?;
    for located in &block.instrs {
        write!(f, "  ")?;
        write_instr(f, func, &located.instr)?;
        if let Some(line) = located.line {
            write!(f, "  ; line {}", line)?;
        }
        writeln!(f)?;
    }
    Ok(())
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ret = match &self.ret {
            Some(ty) => ty.to_string(),
            None => "void".to_string(),
        };
        let keyword = if self.is_declaration() {
            "declare"
        } else {
            "define"
        };
        write!(f, "{} {} @{:?}(", keyword, ret, self.name)?;
        for (i, (name, ty)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} %{}", ty, name)?;
        }
        if self.is_declaration() {
            return writeln!(f, ")");
        }
        writeln!(f, ") {{")?;
        for block in &self.blocks {
            write_block(f, self, block)?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for IrModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        for func in &self.functions {
            writeln!(f)?;
            write!(f, "{}", func)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;

    #[test]
    fn prints_a_define_and_a_declare() {
        let mut m = IrModule::new("test/main");
        m.functions.push(IrFunction::declaration(
            "printf",
            vec![("fmt".into(), IrType::I8.ptr_to())],
            Some(IrType::I32),
        ));

        let mut func = IrFunction::declaration(
            "test/main.main",
            vec![("inputexec_id".into(), IrType::I32)],
            Some(IrType::I32),
        );
        {
            let mut b = FunctionBuilder::new(&mut func);
            let entry = b.append_block("alloc");
            b.position_at_end(entry);
            b.build_ret(Some(Constant::I32(0).into()));
        }
        m.functions.push(func);

        let text = m.to_string();
        assert!(text.contains("declare i32 @\"printf\""));
        assert!(text.contains("define i32 @\"test/main.main\""));
        assert!(text.contains("ret i32 0"));
    }
}
