//! Positioned instruction emission into an [`IrFunction`].

use crate::instr::{BinArithOp, CastKind, CmpPred, Instr, Located, Operand};
use crate::module::{BlockId, IrFunction, ValueDef, ValueId};
use crate::types::IrType;
use crate::value::Constant;

/// Location of an emitted `IndirectBr`, so destinations can be added after
/// the fact (pure-node consumers register their return blocks lazily).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndirectBrLoc {
    pub block: BlockId,
    pub index: usize,
}

/// Builds instructions into a function, one block at a time.
///
/// The builder must be positioned with [`position_at_end`](Self::position_at_end)
/// before emitting; emitting while unpositioned is a programming error and
/// panics.
pub struct FunctionBuilder<'f> {
    func: &'f mut IrFunction,
    current: Option<BlockId>,
    line: Option<u32>,
}

impl<'f> FunctionBuilder<'f> {
    pub fn new(func: &'f mut IrFunction) -> Self {
        FunctionBuilder {
            func,
            current: None,
            line: None,
        }
    }

    /// The function being built.
    pub fn function(&self) -> &IrFunction {
        self.func
    }

    /// Appends a new, empty block to the function.
    pub fn append_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.func.blocks.len() as u32);
        self.func.blocks.push(crate::module::Block {
            label: label.into(),
            instrs: Vec::new(),
        });
        id
    }

    /// Positions the builder at the end of `block`.
    pub fn position_at_end(&mut self, block: BlockId) {
        debug_assert!((block.0 as usize) < self.func.blocks.len());
        self.current = Some(block);
    }

    /// The block the builder is positioned at, if any.
    pub fn current_block(&self) -> Option<BlockId> {
        self.current
    }

    /// Sets the synthetic line number attached to subsequent instructions.
    pub fn set_line(&mut self, line: Option<u32>) {
        self.line = line;
    }

    /// The register holding parameter `idx`.
    pub fn param(&self, idx: usize) -> ValueId {
        self.func.param_value(idx)
    }

    /// The address of a block, as a constant operand.
    pub fn block_address(&self, block: BlockId) -> Operand {
        Operand::Const(Constant::BlockAddress(block))
    }

    fn new_value(&mut self, name: impl Into<String>, ty: IrType) -> ValueId {
        let id = ValueId(self.func.values.len() as u32);
        self.func.values.push(ValueDef {
            name: name.into(),
            ty,
        });
        id
    }

    fn push(&mut self, instr: Instr) {
        let block = self
            .current
            .expect("builder is not positioned at a block");
        self.func.blocks[block.0 as usize].instrs.push(Located {
            instr,
            line: self.line,
        });
    }

    pub fn build_alloca(&mut self, ty: IrType, name: impl Into<String>) -> ValueId {
        let dest = self.new_value(name, ty.ptr_to());
        self.push(Instr::Alloca { dest, ty });
        dest
    }

    /// Loads a value of type `ty` through `ptr`.
    pub fn build_load(&mut self, ptr: ValueId, ty: IrType, name: impl Into<String>) -> ValueId {
        let dest = self.new_value(name, ty);
        self.push(Instr::Load { dest, ptr });
        dest
    }

    pub fn build_store(&mut self, value: impl Into<Operand>, ptr: ValueId) {
        self.push(Instr::Store {
            value: value.into(),
            ptr,
        });
    }

    pub fn build_bin_op(
        &mut self,
        op: BinArithOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
        ty: IrType,
        name: impl Into<String>,
    ) -> ValueId {
        let dest = self.new_value(name, ty);
        self.push(Instr::BinOp {
            dest,
            op,
            lhs: lhs.into(),
            rhs: rhs.into(),
        });
        dest
    }

    pub fn build_cmp(
        &mut self,
        pred: CmpPred,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
        name: impl Into<String>,
    ) -> ValueId {
        let dest = self.new_value(name, IrType::I1);
        self.push(Instr::Cmp {
            dest,
            pred,
            lhs: lhs.into(),
            rhs: rhs.into(),
        });
        dest
    }

    pub fn build_cast(
        &mut self,
        kind: CastKind,
        value: impl Into<Operand>,
        to: IrType,
        name: impl Into<String>,
    ) -> ValueId {
        let dest = self.new_value(name, to.clone());
        self.push(Instr::Cast {
            dest,
            kind,
            value: value.into(),
            to,
        });
        dest
    }

    pub fn build_field_ptr(
        &mut self,
        base: ValueId,
        index: usize,
        field_ty: IrType,
        name: impl Into<String>,
    ) -> ValueId {
        let dest = self.new_value(name, field_ty.ptr_to());
        self.push(Instr::FieldPtr { dest, base, index });
        dest
    }

    /// Calls `callee`. Returns the result register for non-void calls.
    pub fn build_call(
        &mut self,
        callee: impl Into<String>,
        args: Vec<Operand>,
        ret: Option<IrType>,
        name: impl Into<String>,
    ) -> Option<ValueId> {
        let dest = ret.map(|ty| self.new_value(name, ty));
        self.push(Instr::Call {
            dest,
            callee: callee.into(),
            args,
        });
        dest
    }

    pub fn build_debug_declare(&mut self, value: ValueId, name: impl Into<String>) {
        self.push(Instr::DebugDeclare {
            value,
            name: name.into(),
        });
    }

    pub fn build_br(&mut self, target: BlockId) {
        self.push(Instr::Br { target });
    }

    pub fn build_cond_br(&mut self, cond: impl Into<Operand>, then_block: BlockId, else_block: BlockId) {
        self.push(Instr::CondBr {
            cond: cond.into(),
            then_block,
            else_block,
        });
    }

    pub fn build_switch(
        &mut self,
        value: impl Into<Operand>,
        default: BlockId,
        cases: Vec<(i32, BlockId)>,
    ) {
        self.push(Instr::Switch {
            value: value.into(),
            default,
            cases,
        });
    }

    /// Emits an indirect branch with an empty destination list and returns its
    /// location so destinations can be registered later.
    pub fn build_indirect_br(&mut self, address: impl Into<Operand>) -> IndirectBrLoc {
        let block = self
            .current
            .expect("builder is not positioned at a block");
        self.push(Instr::IndirectBr {
            address: address.into(),
            destinations: Vec::new(),
        });
        IndirectBrLoc {
            block,
            index: self.func.blocks[block.0 as usize].instrs.len() - 1,
        }
    }

    /// Registers `dest` as a possible target of a previously emitted
    /// indirect branch.
    pub fn add_indirect_destination(&mut self, loc: IndirectBrLoc, dest: BlockId) {
        let located = &mut self.func.blocks[loc.block.0 as usize].instrs[loc.index];
        if let Instr::IndirectBr { destinations, .. } = &mut located.instr {
            if !destinations.contains(&dest) {
                destinations.push(dest);
            }
        } else {
            panic!("add_indirect_destination target is not an IndirectBr");
        }
    }

    pub fn build_ret(&mut self, value: Option<Operand>) {
        self.push(Instr::Ret { value });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::IrFunction;

    fn empty_func() -> IrFunction {
        IrFunction::declaration("f", vec![("inputexec_id".into(), IrType::I32)], Some(IrType::I32))
    }

    #[test]
    fn build_simple_function() {
        let mut func = empty_func();
        let mut b = FunctionBuilder::new(&mut func);

        let alloc = b.append_block("alloc");
        let body = b.append_block("body");

        b.position_at_end(alloc);
        let slot = b.build_alloca(IrType::I32, "slot");
        b.build_br(body);

        b.position_at_end(body);
        b.build_store(Constant::I32(7), slot);
        let loaded = b.build_load(slot, IrType::I32, "loaded");
        b.build_ret(Some(loaded.into()));

        assert_eq!(func.blocks.len(), 2);
        assert_eq!(func.blocks[0].instrs.len(), 2);
        assert_eq!(func.blocks[1].instrs.len(), 3);
        // slot register is pointer-typed
        assert_eq!(func.value_type(slot), &IrType::I32.ptr_to());
    }

    #[test]
    fn indirect_br_destinations_accumulate() {
        let mut func = empty_func();
        let mut b = FunctionBuilder::new(&mut func);
        let entry = b.append_block("entry");
        let a = b.append_block("a");
        let c = b.append_block("c");

        b.position_at_end(entry);
        let slot = b.build_alloca(IrType::I8.ptr_to(), "jumpback");
        let addr = b.build_load(slot, IrType::I8.ptr_to(), "addr");
        let loc = b.build_indirect_br(addr);
        b.add_indirect_destination(loc, a);
        b.add_indirect_destination(loc, c);
        b.add_indirect_destination(loc, a); // duplicate is ignored

        match &func.blocks[0].instrs[2].instr {
            Instr::IndirectBr { destinations, .. } => {
                assert_eq!(destinations, &vec![a, c]);
            }
            other => panic!("expected IndirectBr, got {:?}", other),
        }
    }

    #[test]
    fn line_numbers_attach_to_instructions() {
        let mut func = empty_func();
        let mut b = FunctionBuilder::new(&mut func);
        let entry = b.append_block("entry");
        b.position_at_end(entry);
        b.set_line(Some(4));
        b.build_ret(None);
        assert_eq!(func.blocks[0].instrs[0].line, Some(4));
    }
}
