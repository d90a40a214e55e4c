//! A reference interpreter for compiled modules.
//!
//! Executes defined functions instruction by instruction. Extern declarations
//! are limited to a small builtin set (`printf`, `puts`, `abort`); everything
//! else must be defined in the module, so dependency-linked modules run while
//! partial ones fail loudly.

use std::collections::VecDeque;

use thiserror::Error;

use crate::instr::{BinArithOp, CastKind, CmpPred, Instr, Operand};
use crate::module::{BlockId, IrModule, ValueId};
use crate::types::IrType;
use crate::value::Constant;

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum RtValue {
    I1(bool),
    I8(i8),
    I32(i32),
    F64(f64),
    Str(String),
    /// Pointer to a memory cell, optionally navigating into struct fields.
    Ptr { cell: usize, path: Vec<usize> },
    /// A block address, produced by `Constant::BlockAddress`.
    Block(BlockId),
    Struct(Vec<RtValue>),
    Undef,
}

/// Interpreter failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InterpError {
    #[error("unknown function: '{0}'")]
    UnknownFunction(String),

    #[error("call to undefined extern '{0}'")]
    UndefinedExtern(String),

    #[error("function '{0}' has no body")]
    NoBody(String),

    #[error("runtime fault: {0}")]
    Fault(String),

    #[error("step limit exceeded; possible non-terminating program")]
    StepLimit,
}

const DEFAULT_MAX_STEPS: usize = 1_000_000;

/// Interpreter state for one run over a module.
pub struct Interp<'m> {
    module: &'m IrModule,
    memory: Vec<RtValue>,
    output: Vec<String>,
    steps_left: usize,
}

impl<'m> Interp<'m> {
    pub fn new(module: &'m IrModule) -> Self {
        Interp {
            module,
            memory: Vec::new(),
            output: Vec::new(),
            steps_left: DEFAULT_MAX_STEPS,
        }
    }

    /// Text written through the `printf`/`puts` builtins during the run.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Allocates a memory cell initialized to `value` and returns a pointer
    /// to it.
    pub fn alloc_cell(&mut self, value: RtValue) -> RtValue {
        self.memory.push(value);
        RtValue::Ptr {
            cell: self.memory.len() - 1,
            path: Vec::new(),
        }
    }

    /// Reads through a pointer value.
    pub fn read(&self, ptr: &RtValue) -> Result<RtValue, InterpError> {
        match ptr {
            RtValue::Ptr { cell, path } => {
                let mut current = self
                    .memory
                    .get(*cell)
                    .ok_or_else(|| InterpError::Fault("dangling pointer read".into()))?;
                for idx in path {
                    match current {
                        RtValue::Struct(fields) => {
                            current = fields.get(*idx).ok_or_else(|| {
                                InterpError::Fault("struct field out of range".into())
                            })?;
                        }
                        _ => return Err(InterpError::Fault("field access on non-struct".into())),
                    }
                }
                Ok(current.clone())
            }
            _ => Err(InterpError::Fault("load through non-pointer".into())),
        }
    }

    /// Writes through a pointer value.
    pub fn write(&mut self, ptr: &RtValue, value: RtValue) -> Result<(), InterpError> {
        match ptr {
            RtValue::Ptr { cell, path } => {
                let mut current = self
                    .memory
                    .get_mut(*cell)
                    .ok_or_else(|| InterpError::Fault("dangling pointer write".into()))?;
                for idx in path {
                    match current {
                        RtValue::Struct(fields) => {
                            current = fields.get_mut(*idx).ok_or_else(|| {
                                InterpError::Fault("struct field out of range".into())
                            })?;
                        }
                        _ => return Err(InterpError::Fault("field access on non-struct".into())),
                    }
                }
                *current = value;
                Ok(())
            }
            _ => Err(InterpError::Fault("store through non-pointer".into())),
        }
    }

    /// Calls a function by symbol name.
    pub fn call(&mut self, name: &str, args: Vec<RtValue>) -> Result<Option<RtValue>, InterpError> {
        let func = self
            .module
            .function(name)
            .ok_or_else(|| InterpError::UnknownFunction(name.to_string()))?;

        if func.is_declaration() {
            return self.call_builtin(name, args);
        }

        let mut values: Vec<Option<RtValue>> = vec![None; func.values.len()];
        for (idx, arg) in args.into_iter().enumerate() {
            if idx < func.params.len() {
                values[idx] = Some(arg);
            }
        }

        let mut block = BlockId(0);
        loop {
            let mut next: Option<BlockId> = None;
            let mut returned: Option<Option<RtValue>> = None;

            // queued instead of iterated directly so a call can borrow self
            let instrs: VecDeque<Instr> = func.blocks[block.0 as usize]
                .instrs
                .iter()
                .map(|l| l.instr.clone())
                .collect();

            for instr in instrs {
                if self.steps_left == 0 {
                    return Err(InterpError::StepLimit);
                }
                self.steps_left -= 1;

                match instr {
                    Instr::Alloca { dest, ty } => {
                        let ptr = self.alloc_cell(zero_of(&ty));
                        values[dest.0 as usize] = Some(ptr);
                    }
                    Instr::Load { dest, ptr } => {
                        let ptr_val = get(&values, ptr)?;
                        values[dest.0 as usize] = Some(self.read(&ptr_val)?);
                    }
                    Instr::Store { value, ptr } => {
                        let v = self.eval(&values, &value)?;
                        let ptr_val = get(&values, ptr)?;
                        self.write(&ptr_val, v)?;
                    }
                    Instr::BinOp { dest, op, lhs, rhs } => {
                        let l = self.eval(&values, &lhs)?;
                        let r = self.eval(&values, &rhs)?;
                        values[dest.0 as usize] = Some(bin_op(op, l, r)?);
                    }
                    Instr::Cmp {
                        dest,
                        pred,
                        lhs,
                        rhs,
                    } => {
                        let l = self.eval(&values, &lhs)?;
                        let r = self.eval(&values, &rhs)?;
                        values[dest.0 as usize] = Some(RtValue::I1(compare(pred, l, r)?));
                    }
                    Instr::Cast {
                        dest, kind, value, ..
                    } => {
                        let v = self.eval(&values, &value)?;
                        values[dest.0 as usize] = Some(cast(kind, v)?);
                    }
                    Instr::FieldPtr { dest, base, index } => {
                        let base_val = get(&values, base)?;
                        match base_val {
                            RtValue::Ptr { cell, mut path } => {
                                path.push(index);
                                values[dest.0 as usize] = Some(RtValue::Ptr { cell, path });
                            }
                            _ => {
                                return Err(InterpError::Fault(
                                    "fieldptr on non-pointer".into(),
                                ))
                            }
                        }
                    }
                    Instr::Call { dest, callee, args } => {
                        let arg_vals = args
                            .iter()
                            .map(|a| self.eval(&values, a))
                            .collect::<Result<Vec<_>, _>>()?;
                        let ret = self.call(&callee, arg_vals)?;
                        if let Some(dest) = dest {
                            values[dest.0 as usize] = Some(ret.unwrap_or(RtValue::Undef));
                        }
                    }
                    Instr::DebugDeclare { .. } => {}
                    Instr::Br { target } => {
                        next = Some(target);
                        break;
                    }
                    Instr::CondBr {
                        cond,
                        then_block,
                        else_block,
                    } => {
                        let c = self.eval(&values, &cond)?;
                        next = Some(match c {
                            RtValue::I1(true) => then_block,
                            RtValue::I1(false) => else_block,
                            _ => {
                                return Err(InterpError::Fault(
                                    "conditional branch on non-boolean".into(),
                                ))
                            }
                        });
                        break;
                    }
                    Instr::Switch {
                        value,
                        default,
                        cases,
                    } => {
                        let v = match self.eval(&values, &value)? {
                            RtValue::I32(v) => v,
                            _ => {
                                return Err(InterpError::Fault("switch on non-i32".into()));
                            }
                        };
                        next = Some(
                            cases
                                .iter()
                                .find(|(case, _)| *case == v)
                                .map(|(_, target)| *target)
                                .unwrap_or(default),
                        );
                        break;
                    }
                    Instr::IndirectBr { address, .. } => {
                        match self.eval(&values, &address)? {
                            RtValue::Block(target) => {
                                next = Some(target);
                            }
                            _ => {
                                return Err(InterpError::Fault(
                                    "indirect branch through non-block-address".into(),
                                ))
                            }
                        }
                        break;
                    }
                    Instr::Ret { value } => {
                        returned = Some(match value {
                            Some(op) => Some(self.eval(&values, &op)?),
                            None => None,
                        });
                        break;
                    }
                }
            }

            if let Some(ret) = returned {
                return Ok(ret);
            }
            match next {
                Some(b) => block = b,
                None => {
                    return Err(InterpError::Fault(format!(
                        "block '{}' fell off its end",
                        func.blocks[block.0 as usize].label
                    )))
                }
            }
        }
    }

    fn call_builtin(
        &mut self,
        name: &str,
        args: Vec<RtValue>,
    ) -> Result<Option<RtValue>, InterpError> {
        match name {
            "printf" | "puts" => {
                let text = args
                    .iter()
                    .map(format_value)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.output.push(text);
                Ok(Some(RtValue::I32(0)))
            }
            "abort" => Err(InterpError::Fault("abort called".into())),
            other => Err(InterpError::UndefinedExtern(other.to_string())),
        }
    }

    fn eval(&self, values: &[Option<RtValue>], op: &Operand) -> Result<RtValue, InterpError> {
        match op {
            Operand::Value(v) => get(values, *v),
            Operand::Const(c) => Ok(match c {
                Constant::I1(v) => RtValue::I1(*v),
                Constant::I8(v) => RtValue::I8(*v),
                Constant::I32(v) => RtValue::I32(*v),
                Constant::F64(v) => RtValue::F64(*v),
                Constant::Str(s) => RtValue::Str(s.clone()),
                Constant::Null(ty) => zero_of(ty),
                Constant::BlockAddress(b) => RtValue::Block(*b),
            }),
        }
    }
}

fn get(values: &[Option<RtValue>], id: ValueId) -> Result<RtValue, InterpError> {
    values
        .get(id.0 as usize)
        .and_then(|v| v.clone())
        .ok_or_else(|| InterpError::Fault(format!("use of unset register %{}", id.0)))
}

/// The zero value of a type, used for alloca and `Null` initialization.
pub fn zero_of(ty: &IrType) -> RtValue {
    match ty {
        IrType::I1 => RtValue::I1(false),
        IrType::I8 => RtValue::I8(0),
        IrType::I32 => RtValue::I32(0),
        IrType::F64 => RtValue::F64(0.0),
        IrType::Ptr(_) => RtValue::Undef,
        IrType::Struct { fields, .. } => RtValue::Struct(fields.iter().map(zero_of).collect()),
    }
}

fn bin_op(op: BinArithOp, l: RtValue, r: RtValue) -> Result<RtValue, InterpError> {
    match (l, r) {
        (RtValue::I32(a), RtValue::I32(b)) => Ok(RtValue::I32(match op {
            BinArithOp::Add => a.wrapping_add(b),
            BinArithOp::Sub => a.wrapping_sub(b),
            BinArithOp::Mul => a.wrapping_mul(b),
            BinArithOp::Div => {
                if b == 0 {
                    return Err(InterpError::Fault("integer division by zero".into()));
                }
                a.wrapping_div(b)
            }
        })),
        (RtValue::F64(a), RtValue::F64(b)) => Ok(RtValue::F64(match op {
            BinArithOp::Add => a + b,
            BinArithOp::Sub => a - b,
            BinArithOp::Mul => a * b,
            BinArithOp::Div => a / b,
        })),
        (l, r) => Err(InterpError::Fault(format!(
            "arithmetic on mismatched values {:?} and {:?}",
            l, r
        ))),
    }
}

fn compare(pred: CmpPred, l: RtValue, r: RtValue) -> Result<bool, InterpError> {
    match (l, r) {
        (RtValue::I32(a), RtValue::I32(b)) => Ok(match pred {
            CmpPred::Lt => a < b,
            CmpPred::Gt => a > b,
            CmpPred::Le => a <= b,
            CmpPred::Ge => a >= b,
            CmpPred::Eq => a == b,
            CmpPred::Ne => a != b,
        }),
        (RtValue::F64(a), RtValue::F64(b)) => Ok(match pred {
            CmpPred::Lt => a < b,
            CmpPred::Gt => a > b,
            CmpPred::Le => a <= b,
            CmpPred::Ge => a >= b,
            CmpPred::Eq => a == b,
            CmpPred::Ne => a != b,
        }),
        (RtValue::I1(a), RtValue::I1(b)) => Ok(match pred {
            CmpPred::Eq => a == b,
            CmpPred::Ne => a != b,
            _ => return Err(InterpError::Fault("ordering comparison on i1".into())),
        }),
        (l, r) => Err(InterpError::Fault(format!(
            "comparison on mismatched values {:?} and {:?}",
            l, r
        ))),
    }
}

fn cast(kind: CastKind, v: RtValue) -> Result<RtValue, InterpError> {
    match (kind, v) {
        (CastKind::SiToFp, RtValue::I32(v)) => Ok(RtValue::F64(v as f64)),
        (CastKind::FpToSi, RtValue::F64(v)) => Ok(RtValue::I32(v as i32)),
        (_, v) => Err(InterpError::Fault(format!("invalid cast of {:?}", v))),
    }
}

fn format_value(v: &RtValue) -> String {
    match v {
        RtValue::I1(b) => b.to_string(),
        RtValue::I8(v) => v.to_string(),
        RtValue::I32(v) => v.to_string(),
        RtValue::F64(v) => v.to_string(),
        RtValue::Str(s) => s.clone(),
        other => format!("{:?}", other),
    }
}

/// Runs a function by symbol name with the given arguments.
pub fn interpret_function(
    module: &IrModule,
    name: &str,
    args: Vec<RtValue>,
) -> Result<Option<RtValue>, InterpError> {
    Interp::new(module).call(name, args)
}

/// Runs a graph-compiled main function and returns its exit code plus the
/// output written through the print builtins.
///
/// The callee follows the graph calling convention: parameter 0 is the
/// activating exec input (`0` is passed), value parameters get zero values,
/// and pointer parameters get freshly allocated zeroed out-slots. The exit
/// code is the first `i32` out-slot after the call, or `0` when the function
/// has no out-slots.
pub fn interpret_main(module: &IrModule, name: &str) -> Result<(i32, Vec<String>), InterpError> {
    let func = module
        .function(name)
        .ok_or_else(|| InterpError::UnknownFunction(name.to_string()))?;
    if func.is_declaration() {
        return Err(InterpError::NoBody(name.to_string()));
    }

    let params = func.params.clone();
    let mut interp = Interp::new(module);

    let mut args = Vec::with_capacity(params.len());
    let mut out_ptrs = Vec::new();
    for (idx, (_, ty)) in params.iter().enumerate() {
        if idx == 0 {
            args.push(RtValue::I32(0));
            continue;
        }
        match ty {
            IrType::Ptr(pointee) => {
                let ptr = interp.alloc_cell(zero_of(pointee));
                out_ptrs.push(ptr.clone());
                args.push(ptr);
            }
            other => args.push(zero_of(other)),
        }
    }

    interp.call(name, args)?;

    let mut exit_code = 0;
    if let Some(ptr) = out_ptrs.first() {
        if let RtValue::I32(code) = interp.read(ptr)? {
            exit_code = code;
        }
    }
    let output = interp.output().to_vec();
    Ok((exit_code, output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::module::IrFunction;

    /// define i32 @f(i32 %inputexec_id, i32* %out) { store 42 -> out; ret 0 }
    fn store_and_ret() -> IrModule {
        let mut func = IrFunction::declaration(
            "test/main.main",
            vec![
                ("inputexec_id".into(), IrType::I32),
                ("out".into(), IrType::I32.ptr_to()),
            ],
            Some(IrType::I32),
        );
        {
            let mut b = FunctionBuilder::new(&mut func);
            let entry = b.append_block("entry");
            b.position_at_end(entry);
            let out = b.param(1);
            b.build_store(Constant::I32(42), out);
            b.build_ret(Some(Constant::I32(0).into()));
        }
        let mut m = IrModule::new("test/main");
        m.functions.push(func);
        m
    }

    #[test]
    fn interpret_main_reads_exit_code() {
        let m = store_and_ret();
        let (code, output) = interpret_main(&m, "test/main.main").unwrap();
        assert_eq!(code, 42);
        assert!(output.is_empty());
    }

    #[test]
    fn arithmetic_and_branches() {
        // f() -> i32: if 3 < 5 then 1 else 2
        let mut func = IrFunction::declaration("f", vec![], Some(IrType::I32));
        {
            let mut b = FunctionBuilder::new(&mut func);
            let entry = b.append_block("entry");
            let yes = b.append_block("yes");
            let no = b.append_block("no");

            b.position_at_end(entry);
            let cond = b.build_cmp(CmpPred::Lt, Constant::I32(3), Constant::I32(5), "cond");
            b.build_cond_br(cond, yes, no);

            b.position_at_end(yes);
            b.build_ret(Some(Constant::I32(1).into()));

            b.position_at_end(no);
            b.build_ret(Some(Constant::I32(2).into()));
        }
        let mut m = IrModule::new("m");
        m.functions.push(func);

        let ret = interpret_function(&m, "f", vec![]).unwrap();
        assert_eq!(ret, Some(RtValue::I32(1)));
    }

    #[test]
    fn indirect_branch_through_stored_block_address() {
        let mut func = IrFunction::declaration("f", vec![], Some(IrType::I32));
        {
            let mut b = FunctionBuilder::new(&mut func);
            let entry = b.append_block("entry");
            let target = b.append_block("target");

            b.position_at_end(entry);
            let slot = b.build_alloca(IrType::I8.ptr_to(), "jumpback");
            b.build_store(b.block_address(target), slot);
            let addr = b.build_load(slot, IrType::I8.ptr_to(), "addr");
            let loc = b.build_indirect_br(addr);
            b.add_indirect_destination(loc, target);

            b.position_at_end(target);
            b.build_ret(Some(Constant::I32(9).into()));
        }
        let mut m = IrModule::new("m");
        m.functions.push(func);

        let ret = interpret_function(&m, "f", vec![]).unwrap();
        assert_eq!(ret, Some(RtValue::I32(9)));
    }

    #[test]
    fn struct_field_pointers() {
        let pair = IrType::Struct {
            name: "pair".into(),
            fields: vec![IrType::I32, IrType::I32],
        };
        let mut func = IrFunction::declaration("f", vec![], Some(IrType::I32));
        {
            let mut b = FunctionBuilder::new(&mut func);
            let entry = b.append_block("entry");
            b.position_at_end(entry);
            let slot = b.build_alloca(pair, "tmp");
            let second = b.build_field_ptr(slot, 1, IrType::I32, "second");
            b.build_store(Constant::I32(13), second);
            let loaded = b.build_load(second, IrType::I32, "loaded");
            b.build_ret(Some(loaded.into()));
        }
        let mut m = IrModule::new("m");
        m.functions.push(func);

        let ret = interpret_function(&m, "f", vec![]).unwrap();
        assert_eq!(ret, Some(RtValue::I32(13)));
    }

    #[test]
    fn division_by_zero_faults() {
        let mut func = IrFunction::declaration("f", vec![], Some(IrType::I32));
        {
            let mut b = FunctionBuilder::new(&mut func);
            let entry = b.append_block("entry");
            b.position_at_end(entry);
            let v = b.build_bin_op(
                BinArithOp::Div,
                Constant::I32(1),
                Constant::I32(0),
                IrType::I32,
                "v",
            );
            b.build_ret(Some(v.into()));
        }
        let mut m = IrModule::new("m");
        m.functions.push(func);

        assert!(matches!(
            interpret_function(&m, "f", vec![]),
            Err(InterpError::Fault(_))
        ));
    }

    #[test]
    fn calls_between_defined_functions() {
        // callee() -> i32 { ret 5 } ; caller() -> i32 { ret callee() }
        let mut callee = IrFunction::declaration("callee", vec![], Some(IrType::I32));
        {
            let mut b = FunctionBuilder::new(&mut callee);
            let entry = b.append_block("entry");
            b.position_at_end(entry);
            b.build_ret(Some(Constant::I32(5).into()));
        }
        let mut caller = IrFunction::declaration("caller", vec![], Some(IrType::I32));
        {
            let mut b = FunctionBuilder::new(&mut caller);
            let entry = b.append_block("entry");
            b.position_at_end(entry);
            let ret = b
                .build_call("callee", vec![], Some(IrType::I32), "call_function")
                .unwrap();
            b.build_ret(Some(ret.into()));
        }
        let mut m = IrModule::new("m");
        m.functions.push(callee);
        m.functions.push(caller);

        let ret = interpret_function(&m, "caller", vec![]).unwrap();
        assert_eq!(ret, Some(RtValue::I32(5)));
    }
}
