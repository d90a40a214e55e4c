//! User-defined composite types and their synthesized node types.

use serde_json::json;

use chigraph_ir::{DebugEncoding, DebugType, IrType};

use crate::lower::LowerCtx;
use crate::node_type::{NodeType, NodeTypeInfo};
use crate::report::Report;
use crate::types::{DataType, NamedDataType};

/// A user-defined struct: a name plus ordered, named fields.
///
/// Each struct synthesizes two node types, `_make_<name>` (constructor) and
/// `_break_<name>` (destructurer), exposed through the owning module's node
/// type lookup.
#[derive(Debug, Clone)]
pub struct GraphStruct {
    module_full_name: String,
    name: String,
    fields: Vec<NamedDataType>,
}

impl GraphStruct {
    pub fn new(module_full_name: impl Into<String>, name: impl Into<String>) -> Self {
        GraphStruct {
            module_full_name: module_full_name.into(),
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module_full_name(&self) -> &str {
        &self.module_full_name
    }

    pub fn fields(&self) -> &[NamedDataType] {
        &self.fields
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn add_field(&mut self, ty: DataType, name: impl Into<String>, add_before: usize) {
        let idx = add_before.min(self.fields.len());
        self.fields.insert(idx, NamedDataType::new(name, ty));
    }

    pub fn modify_field(&mut self, idx: usize, ty: DataType, name: impl Into<String>) {
        if let Some(field) = self.fields.get_mut(idx) {
            *field = NamedDataType::new(name, ty);
        }
    }

    pub fn remove_field(&mut self, idx: usize) {
        if idx < self.fields.len() {
            self.fields.remove(idx);
        }
    }

    /// The `DataType` of this struct. Invalid while the struct has no fields
    /// or a field's back-end type is missing.
    pub fn data_type(&self) -> DataType {
        if self.fields.is_empty() {
            return DataType::default();
        }

        let mut ir_fields = Vec::with_capacity(self.fields.len());
        let mut size_bits = 0;
        for field in &self.fields {
            let Some(ir) = field.ty.ir_type() else {
                return DataType::default();
            };
            size_bits += ir.size_in_bits();
            ir_fields.push(ir.clone());
        }

        DataType::new(
            &self.module_full_name,
            &self.name,
            IrType::Struct {
                name: self.name.clone(),
                fields: ir_fields,
            },
            DebugType::new(
                format!("{}:{}", self.module_full_name, self.name),
                size_bits,
                DebugEncoding::Structure,
            ),
        )
    }

    /// The synthesized `_make_<name>` node type.
    pub fn make_node_type(&self) -> MakeStructNodeType {
        MakeStructNodeType::new(self)
    }

    /// The synthesized `_break_<name>` node type.
    pub fn break_node_type(&self) -> BreakStructNodeType {
        BreakStructNodeType::new(self)
    }
}

/// `_make_<struct>` -- pure constructor taking every field and producing the
/// struct value.
#[derive(Debug, Clone)]
pub struct MakeStructNodeType {
    info: NodeTypeInfo,
}

impl MakeStructNodeType {
    pub fn new(def: &GraphStruct) -> Self {
        let mut info = NodeTypeInfo::new(
            def.module_full_name(),
            format!("_make_{}", def.name()),
            format!("Make a {} structure", def.name()),
        );
        info.make_pure();
        info.data_inputs = def.fields().to_vec();
        info.data_outputs = vec![NamedDataType::new("", def.data_type())];
        MakeStructNodeType { info }
    }
}

impl NodeType for MakeStructNodeType {
    fn info(&self) -> &NodeTypeInfo {
        &self.info
    }

    fn lower(&self, ctx: LowerCtx<'_, '_>) -> Report {
        let mut res = Report::new();
        if ctx.io.len() != self.info.data_inputs.len() + 1 || ctx.output_blocks.len() != 1 {
            res.add_entry(
                "EUKN",
                "Malformed lowering request for struct constructor",
                json!({"io": ctx.io.len()}),
            );
            return res;
        }

        // the output slot goes last
        let out = ctx.io[ctx.io.len() - 1];
        for (idx, input) in ctx.io[..ctx.io.len() - 1].iter().enumerate() {
            let field_ty = self.info.data_inputs[idx]
                .ty
                .ir_type()
                .cloned()
                .unwrap_or(IrType::I32);
            let ptr = ctx.builder.build_field_ptr(out, idx, field_ty, "");
            ctx.builder.build_store(*input, ptr);
        }
        ctx.builder.build_br(ctx.output_blocks[0]);
        res
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }
}

/// `_break_<struct>` -- pure destructurer producing every field of a struct
/// value.
#[derive(Debug, Clone)]
pub struct BreakStructNodeType {
    info: NodeTypeInfo,
    struct_type: DataType,
}

impl BreakStructNodeType {
    pub fn new(def: &GraphStruct) -> Self {
        let struct_type = def.data_type();
        let mut info = NodeTypeInfo::new(
            def.module_full_name(),
            format!("_break_{}", def.name()),
            format!("Break a {} structure", def.name()),
        );
        info.make_pure();
        info.data_inputs = vec![NamedDataType::new("", struct_type.clone())];
        info.data_outputs = def.fields().to_vec();
        BreakStructNodeType { info, struct_type }
    }
}

impl NodeType for BreakStructNodeType {
    fn info(&self) -> &NodeTypeInfo {
        &self.info
    }

    fn lower(&self, ctx: LowerCtx<'_, '_>) -> Report {
        let mut res = Report::new();
        if ctx.io.len() != self.info.data_outputs.len() + 1 || ctx.output_blocks.len() != 1 {
            res.add_entry(
                "EUKN",
                "Malformed lowering request for struct destructurer",
                json!({"io": ctx.io.len()}),
            );
            return res;
        }

        let struct_ir = self
            .struct_type
            .ir_type()
            .cloned()
            .unwrap_or(IrType::I32);

        // spill the struct value so fields are addressable
        let temp = ctx.builder.build_alloca(struct_ir, "");
        ctx.builder.build_store(ctx.io[0], temp);

        for (idx, out_slot) in ctx.io[1..].iter().enumerate() {
            let field_ty = self.info.data_outputs[idx]
                .ty
                .ir_type()
                .cloned()
                .unwrap_or(IrType::I32);
            let ptr = ctx.builder.build_field_ptr(temp, idx, field_ty.clone(), "");
            let value = ctx.builder.build_load(ptr, field_ty, "");
            ctx.builder.build_store(value, *out_slot);
        }
        ctx.builder.build_br(ctx.output_blocks[0]);
        res
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang;

    fn hello_struct() -> GraphStruct {
        let mut s = GraphStruct::new("test/main", "hello");
        s.add_field(lang::type_from_name("i32").unwrap(), "a", usize::MAX);
        s.add_field(lang::type_from_name("float").unwrap(), "b", usize::MAX);
        s
    }

    #[test]
    fn empty_struct_has_invalid_type() {
        let s = GraphStruct::new("test/main", "empty");
        assert!(!s.data_type().valid());
    }

    #[test]
    fn data_type_is_module_qualified() {
        let s = hello_struct();
        let ty = s.data_type();
        assert!(ty.valid());
        assert_eq!(ty.qualified_name(), "test/main:hello");
        match ty.ir_type() {
            Some(IrType::Struct { name, fields }) => {
                assert_eq!(name, "hello");
                assert_eq!(fields, &vec![IrType::I32, IrType::F64]);
            }
            other => panic!("expected struct type, got {:?}", other),
        }
    }

    #[test]
    fn make_node_type_signature() {
        let s = hello_struct();
        let make = s.make_node_type();
        let info = make.info();
        assert_eq!(info.name, "_make_hello");
        assert!(info.pure);
        assert_eq!(info.data_inputs.len(), 2);
        assert_eq!(info.data_outputs.len(), 1);
        assert_eq!(
            info.data_outputs[0].ty.qualified_name(),
            "test/main:hello"
        );
    }

    #[test]
    fn break_node_type_signature() {
        let s = hello_struct();
        let brk = s.break_node_type();
        let info = brk.info();
        assert_eq!(info.name, "_break_hello");
        assert!(info.pure);
        assert_eq!(info.data_inputs.len(), 1);
        assert_eq!(info.data_outputs.len(), 2);
    }

    #[test]
    fn field_edits_change_the_type() {
        let mut s = hello_struct();
        s.remove_field(1);
        match s.data_type().ir_type() {
            Some(IrType::Struct { fields, .. }) => assert_eq!(fields.len(), 1),
            other => panic!("expected struct type, got {:?}", other),
        }
        s.modify_field(0, lang::type_from_name("i1").unwrap(), "flag");
        assert_eq!(s.fields()[0].name, "flag");
    }
}
