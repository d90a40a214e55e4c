//! The pre-installed `lang` module: primitive types and the core node types.
//!
//! Every context owns one `lang` module. It provides the primitives (`i32`,
//! `i1`, `i8`, `float`, and pointers spelled with a trailing `*`) and the
//! node types the compiler itself depends on: `entry`, `exit`, `if`, the
//! constants, `strliteral`, arithmetic and comparison on `i32`/`float`, and
//! the `inttofloat`/`floattoint` converters.

use serde_json::{json, Value};

use chigraph_ir::{BinArithOp, CastKind, CmpPred, Constant, DebugEncoding, DebugType, IrType};

use crate::context::Context;
use crate::lower::LowerCtx;
use crate::node_type::{NodeType, NodeTypeInfo};
use crate::report::Report;
use crate::types::{DataType, NamedDataType};

/// The built-in module. Stateless; all of its types and node types are
/// synthesized on demand.
#[derive(Debug, Clone, Default)]
pub struct LangModule;

impl LangModule {
    pub fn full_name(&self) -> &str {
        "lang"
    }

    pub fn short_name(&self) -> &str {
        "lang"
    }

    pub fn type_names(&self) -> Vec<String> {
        ["i32", "i1", "float", "i8", "i8*"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn node_type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = [
            "entry",
            "exit",
            "if",
            "const-int",
            "const-float",
            "const-bool",
            "strliteral",
            "inttofloat",
            "floattoint",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        for ty in ["i32", "float"] {
            for op in ["+", "-", "*", "/"] {
                names.push(format!("{}{}{}", ty, op, ty));
            }
            for cmp in ["<", ">", "<=", ">=", "==", "!="] {
                names.push(format!("{}{}{}", ty, cmp, ty));
            }
        }
        names
    }
}

/// Resolves a `lang` type by name. Pointer types are spelled `T*`.
pub fn type_from_name(name: &str) -> Option<DataType> {
    match name {
        "i32" => Some(DataType::new(
            "lang",
            "i32",
            IrType::I32,
            DebugType::new("lang:i32", 32, DebugEncoding::Signed),
        )),
        "i1" => Some(DataType::new(
            "lang",
            "i1",
            IrType::I1,
            DebugType::new("lang:i1", 8, DebugEncoding::Boolean),
        )),
        "float" => Some(DataType::new(
            "lang",
            "float",
            IrType::F64,
            DebugType::new("lang:float", 64, DebugEncoding::Float),
        )),
        "i8" => Some(DataType::new(
            "lang",
            "i8",
            IrType::I8,
            DebugType::new("lang:i8", 8, DebugEncoding::UnsignedChar),
        )),
        _ => {
            let inner_name = name.strip_suffix('*')?;
            let inner = type_from_name(inner_name)?;
            let ir = inner.ir_type()?.ptr_to();
            Some(DataType::new(
                "lang",
                name,
                ir,
                DebugType::new(format!("lang:{}", name), 64, DebugEncoding::Pointer),
            ))
        }
    }
}

/// Resolves a `module:name` qualified type string through the context.
fn qualified_type(ctx: &Context, qualified: &str) -> (Report, Option<DataType>) {
    let (module, name) = qualified
        .split_once(':')
        .unwrap_or(("lang", qualified));
    ctx.type_from_module(module, name)
}

/// Parses the `{"data": [...], "exec": [...]}` payload shared by `entry` and
/// `exit`.
fn parse_signature_payload(
    ctx: &Context,
    kind: &str,
    data: &Value,
) -> (Report, Vec<NamedDataType>, Vec<String>) {
    let mut res = Report::new();
    let mut named = Vec::new();
    let mut execs = Vec::new();

    match data.get("data") {
        Some(Value::Array(items)) => {
            for item in items {
                if let Value::Object(map) = item {
                    for (doc_string, qualified) in map {
                        let Some(qualified) = qualified.as_str() else {
                            continue;
                        };
                        let (type_res, ty) = qualified_type(ctx, qualified);
                        res += type_res;
                        if let Some(ty) = ty {
                            named.push(NamedDataType::new(doc_string.clone(), ty));
                        }
                    }
                }
            }
        }
        Some(other) => {
            res.add_entry(
                "WUKN",
                &format!("Data for lang:{} must be an array", kind),
                json!({"Given Data": other}),
            );
        }
        None => {
            res.add_entry(
                "WUKN",
                &format!("Data for lang:{} must have a data element", kind),
                json!({"Data JSON": data}),
            );
        }
    }

    match data.get("exec") {
        Some(Value::Array(items)) => {
            for item in items {
                if let Some(name) = item.as_str() {
                    execs.push(name.to_string());
                }
            }
        }
        Some(other) => {
            res.add_entry(
                "WUKN",
                &format!("Exec element for lang:{} must be an array", kind),
                json!({"Given Data": other}),
            );
        }
        None => {
            res.add_entry(
                "WUKN",
                &format!("Data for lang:{} must have a exec element", kind),
                json!({"Data JSON": data}),
            );
        }
    }

    (res, named, execs)
}

/// Builds a `lang` node type by name. `E37` when the name is unknown.
pub fn node_type_from_name(
    ctx: &Context,
    name: &str,
    data: &Value,
) -> (Report, Option<Box<dyn NodeType>>) {
    let mut res = Report::new();

    let built: Option<Box<dyn NodeType>> = match name {
        "if" => Some(Box::new(IfNodeType::new())),
        "entry" => {
            let (parse_res, named, execs) = parse_signature_payload(ctx, "entry", data);
            res += parse_res;
            if res.success() {
                Some(Box::new(EntryNodeType::new(named, execs)))
            } else {
                None
            }
        }
        "exit" => {
            let (parse_res, named, execs) = parse_signature_payload(ctx, "exit", data);
            res += parse_res;
            Some(Box::new(ExitNodeType::new(named, execs)))
        }
        "const-int" => {
            let num = match data.as_i64() {
                Some(n) => n as i32,
                None => {
                    res.add_entry(
                        "WUKN",
                        "Data for lang:const-int must be an integer",
                        json!({"Given Data": data}),
                    );
                    0
                }
            };
            Some(Box::new(ConstIntNodeType::new(num)))
        }
        "const-float" => {
            let num = match data.as_f64() {
                Some(n) => n,
                None => {
                    res.add_entry(
                        "WUKN",
                        "Data for lang:const-float must be a number",
                        json!({"Given Data": data}),
                    );
                    0.0
                }
            };
            Some(Box::new(ConstFloatNodeType::new(num)))
        }
        "const-bool" => {
            let val = match data.as_bool() {
                Some(b) => b,
                None => {
                    res.add_entry(
                        "WUKN",
                        "Data for lang:const-bool must be a boolean",
                        json!({"Given Data": data}),
                    );
                    false
                }
            };
            Some(Box::new(ConstBoolNodeType::new(val)))
        }
        "strliteral" => {
            let s = match data.as_str() {
                Some(s) => s.to_string(),
                None => {
                    res.add_entry(
                        "WUKN",
                        "Data for lang:strliteral must be a string",
                        json!({"Given Data": data}),
                    );
                    String::new()
                }
            };
            Some(Box::new(StringLiteralNodeType::new(s)))
        }
        "inttofloat" => Some(Box::new(IntToFloatNodeType::new())),
        "floattoint" => Some(Box::new(FloatToIntNodeType::new())),
        _ => binary_node_type(name),
    };

    match built {
        Some(ty) => (res, Some(ty)),
        None => {
            if res.success() {
                res.add_entry(
                    "E37",
                    "Failed to find node in module",
                    json!({"Module": "lang", "Requested Node Type": name}),
                );
            }
            (res, None)
        }
    }
}

/// Matches the arithmetic/comparison names (`i32+i32`, `float<=float`, ...).
fn binary_node_type(name: &str) -> Option<Box<dyn NodeType>> {
    for ty_name in ["i32", "float"] {
        let ty = type_from_name(ty_name)?;
        for (op_str, op) in [
            ("+", BinArithOp::Add),
            ("-", BinArithOp::Sub),
            ("*", BinArithOp::Mul),
            ("/", BinArithOp::Div),
        ] {
            if name == format!("{}{}{}", ty_name, op_str, ty_name) {
                return Some(Box::new(BinaryOperationNodeType::new(ty, op_str, op)));
            }
        }
        for (cmp_str, pred) in [
            ("<=", CmpPred::Le),
            (">=", CmpPred::Ge),
            ("==", CmpPred::Eq),
            ("!=", CmpPred::Ne),
            ("<", CmpPred::Lt),
            (">", CmpPred::Gt),
        ] {
            if name == format!("{}{}{}", ty_name, cmp_str, ty_name) {
                return Some(Box::new(CompareNodeType::new(ty, cmp_str, pred)));
            }
        }
    }
    None
}

fn ir_type_of(ty: &DataType) -> IrType {
    ty.ir_type().cloned().unwrap_or(IrType::I32)
}

// ---------------------------------------------------------------------------
// Node types
// ---------------------------------------------------------------------------

/// `lang:if` -- conditional control transfer.
#[derive(Debug, Clone)]
pub struct IfNodeType {
    pub(crate) info: NodeTypeInfo,
}

impl IfNodeType {
    pub fn new() -> Self {
        let mut info = NodeTypeInfo::new("lang", "if", "If");
        info.exec_inputs = vec!["".into()];
        info.exec_outputs = vec!["True".into(), "False".into()];
        info.data_inputs = vec![NamedDataType::new(
            "condition",
            type_from_name("i1").expect("lang:i1 exists"),
        )];
        IfNodeType { info }
    }
}

impl Default for IfNodeType {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeType for IfNodeType {
    fn info(&self) -> &NodeTypeInfo {
        &self.info
    }

    fn lower(&self, ctx: LowerCtx<'_, '_>) -> Report {
        let mut res = Report::new();
        if ctx.io.len() != 1 || ctx.output_blocks.len() != 2 {
            res.add_entry(
                "EUKN",
                "Malformed lowering request for lang:if",
                json!({"io": ctx.io.len(), "output blocks": ctx.output_blocks.len()}),
            );
            return res;
        }
        ctx.builder
            .build_cond_br(ctx.io[0], ctx.output_blocks[0], ctx.output_blocks[1]);
        res
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }
}

/// `lang:entry` -- stores the function arguments into its outputs and
/// dispatches on the activating exec input.
#[derive(Debug, Clone)]
pub struct EntryNodeType {
    pub(crate) info: NodeTypeInfo,
}

impl EntryNodeType {
    /// `data_inputs` are the *function's* data inputs (this node's outputs);
    /// `exec_inputs` are the function's exec inputs (this node's outputs).
    pub fn new(data_inputs: Vec<NamedDataType>, exec_inputs: Vec<String>) -> Self {
        let mut info = NodeTypeInfo::new("lang", "entry", "Entry");
        info.data_outputs = data_inputs;
        info.exec_outputs = exec_inputs;
        EntryNodeType { info }
    }
}

impl NodeType for EntryNodeType {
    fn info(&self) -> &NodeTypeInfo {
        &self.info
    }

    fn lower(&self, ctx: LowerCtx<'_, '_>) -> Report {
        let mut res = Report::new();
        if ctx.io.len() != self.info.data_outputs.len()
            || ctx.output_blocks.len() != self.info.exec_outputs.len()
            || ctx.output_blocks.is_empty()
        {
            res.add_entry(
                "EUKN",
                "Malformed lowering request for lang:entry",
                json!({"io": ctx.io.len(), "output blocks": ctx.output_blocks.len()}),
            );
            return res;
        }

        // store the arguments; argument 0 is the input exec ID
        for (idx, out_slot) in ctx.io.iter().enumerate() {
            let arg = ctx.builder.param(idx + 1);
            ctx.builder.build_store(arg, *out_slot);
        }

        let in_exec_id = ctx.builder.param(0);
        let cases = ctx
            .output_blocks
            .iter()
            .enumerate()
            .map(|(id, block)| (id as i32, *block))
            .collect();
        ctx.builder
            .build_switch(in_exec_id, ctx.output_blocks[0], cases);
        res
    }

    fn to_json(&self) -> Value {
        signature_json(&self.info.data_outputs, &self.info.exec_outputs)
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }
}

/// `lang:exit` -- stores its inputs into the function's out-parameters and
/// returns the activating exec input index.
#[derive(Debug, Clone)]
pub struct ExitNodeType {
    pub(crate) info: NodeTypeInfo,
}

impl ExitNodeType {
    /// `data_outputs` are the function's data outputs (this node's inputs);
    /// `exec_outputs` are the function's exec outputs (this node's inputs).
    pub fn new(data_outputs: Vec<NamedDataType>, exec_outputs: Vec<String>) -> Self {
        let mut info = NodeTypeInfo::new("lang", "exit", "Return from a function");
        info.data_inputs = data_outputs;
        info.exec_inputs = exec_outputs;
        ExitNodeType { info }
    }
}

impl NodeType for ExitNodeType {
    fn info(&self) -> &NodeTypeInfo {
        &self.info
    }

    fn lower(&self, ctx: LowerCtx<'_, '_>) -> Report {
        let mut res = Report::new();
        if ctx.io.len() != self.info.data_inputs.len() {
            res.add_entry(
                "EUKN",
                "Malformed lowering request for lang:exit",
                json!({"io": ctx.io.len()}),
            );
            return res;
        }

        // returns are passed by pointer after the arguments
        let param_count = ctx.builder.function().params.len();
        let ret_start = param_count - ctx.io.len();
        for (idx, value) in ctx.io.iter().enumerate() {
            let out_param = ctx.builder.param(ret_start + idx);
            ctx.builder.build_store(*value, out_param);
        }

        ctx.builder
            .build_ret(Some(Constant::I32(ctx.input_exec_id as i32).into()));
        res
    }

    fn to_json(&self) -> Value {
        signature_json(&self.info.data_inputs, &self.info.exec_inputs)
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }
}

fn signature_json(data: &[NamedDataType], exec: &[String]) -> Value {
    json!({
        "data": data
            .iter()
            .map(|pair| json!({ pair.name.clone(): pair.ty.qualified_name() }))
            .collect::<Vec<_>>(),
        "exec": exec,
    })
}

macro_rules! const_node_type {
    ($(#[$doc:meta])* $name:ident, $rust_ty:ty, $type_name:literal, $node_name:literal,
     $desc:literal, $to_const:expr, $to_json:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            pub(crate) info: NodeTypeInfo,
            value: $rust_ty,
        }

        impl $name {
            pub fn new(value: $rust_ty) -> Self {
                let mut info = NodeTypeInfo::new("lang", $node_name, $desc);
                info.make_pure();
                info.data_outputs = vec![NamedDataType::new(
                    "",
                    type_from_name($type_name).expect("lang type exists"),
                )];
                $name { info, value }
            }

            pub fn value(&self) -> &$rust_ty {
                &self.value
            }
        }

        impl NodeType for $name {
            fn info(&self) -> &NodeTypeInfo {
                &self.info
            }

            fn lower(&self, ctx: LowerCtx<'_, '_>) -> Report {
                let mut res = Report::new();
                if ctx.io.len() != 1 || ctx.output_blocks.len() != 1 {
                    res.add_entry(
                        "EUKN",
                        concat!("Malformed lowering request for lang:", $node_name),
                        json!({"io": ctx.io.len()}),
                    );
                    return res;
                }
                let constant = ($to_const)(&self.value);
                ctx.builder.build_store(constant, ctx.io[0]);
                ctx.builder.build_br(ctx.output_blocks[0]);
                res
            }

            fn to_json(&self) -> Value {
                ($to_json)(&self.value)
            }

            fn clone_box(&self) -> Box<dyn NodeType> {
                Box::new(self.clone())
            }
        }
    };
}

const_node_type!(
    /// `lang:const-int` -- a pure `i32` constant.
    ConstIntNodeType,
    i32,
    "i32",
    "const-int",
    "Integer",
    |v: &i32| Constant::I32(*v),
    |v: &i32| json!(v)
);

const_node_type!(
    /// `lang:const-float` -- a pure `float` constant.
    ConstFloatNodeType,
    f64,
    "float",
    "const-float",
    "Float",
    |v: &f64| Constant::F64(*v),
    |v: &f64| json!(v)
);

const_node_type!(
    /// `lang:const-bool` -- a pure `i1` constant.
    ConstBoolNodeType,
    bool,
    "i1",
    "const-bool",
    "Boolean literal",
    |v: &bool| Constant::I1(*v),
    |v: &bool| json!(v)
);

const_node_type!(
    /// `lang:strliteral` -- a pure string literal of type `i8*`.
    StringLiteralNodeType,
    String,
    "i8*",
    "strliteral",
    "String literal",
    |v: &String| Constant::Str(v.clone()),
    |v: &String| json!(v)
);

/// Arithmetic on two values of the same `lang` type.
#[derive(Debug, Clone)]
pub struct BinaryOperationNodeType {
    pub(crate) info: NodeTypeInfo,
    ty: DataType,
    op: BinArithOp,
}

impl BinaryOperationNodeType {
    pub fn new(ty: DataType, op_str: &str, op: BinArithOp) -> Self {
        let verb = match op {
            BinArithOp::Add => "Add",
            BinArithOp::Sub => "Subtract",
            BinArithOp::Mul => "Multiply",
            BinArithOp::Div => "Divide",
        };
        let mut info = NodeTypeInfo::new(
            "lang",
            format!(
                "{}{}{}",
                ty.unqualified_name(),
                op_str,
                ty.unqualified_name()
            ),
            format!("{} two {}s", verb, ty.unqualified_name()),
        );
        info.make_pure();
        info.data_inputs = vec![
            NamedDataType::new("a", ty.clone()),
            NamedDataType::new("b", ty.clone()),
        ];
        info.data_outputs = vec![NamedDataType::new("", ty.clone())];
        BinaryOperationNodeType { info, ty, op }
    }
}

impl NodeType for BinaryOperationNodeType {
    fn info(&self) -> &NodeTypeInfo {
        &self.info
    }

    fn lower(&self, ctx: LowerCtx<'_, '_>) -> Report {
        let mut res = Report::new();
        if ctx.io.len() != 3 || ctx.output_blocks.len() != 1 {
            res.add_entry(
                "EUKN",
                "Malformed lowering request for binary operation",
                json!({"io": ctx.io.len()}),
            );
            return res;
        }
        let result = ctx.builder.build_bin_op(
            self.op,
            ctx.io[0],
            ctx.io[1],
            ir_type_of(&self.ty),
            "",
        );
        ctx.builder.build_store(result, ctx.io[2]);
        ctx.builder.build_br(ctx.output_blocks[0]);
        res
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }
}

/// Comparison of two values of the same `lang` type, producing an `i1`.
#[derive(Debug, Clone)]
pub struct CompareNodeType {
    pub(crate) info: NodeTypeInfo,
    pred: CmpPred,
}

impl CompareNodeType {
    pub fn new(ty: DataType, cmp_str: &str, pred: CmpPred) -> Self {
        let mut info = NodeTypeInfo::new(
            "lang",
            format!(
                "{}{}{}",
                ty.unqualified_name(),
                cmp_str,
                ty.unqualified_name()
            ),
            format!("Compare two {}s", ty.unqualified_name()),
        );
        info.make_pure();
        info.data_inputs = vec![
            NamedDataType::new("a", ty.clone()),
            NamedDataType::new("b", ty),
        ];
        info.data_outputs = vec![NamedDataType::new(
            "",
            type_from_name("i1").expect("lang:i1 exists"),
        )];
        CompareNodeType { info, pred }
    }
}

impl NodeType for CompareNodeType {
    fn info(&self) -> &NodeTypeInfo {
        &self.info
    }

    fn lower(&self, ctx: LowerCtx<'_, '_>) -> Report {
        let mut res = Report::new();
        if ctx.io.len() != 3 || ctx.output_blocks.len() != 1 {
            res.add_entry(
                "EUKN",
                "Malformed lowering request for comparison",
                json!({"io": ctx.io.len()}),
            );
            return res;
        }
        let result = ctx.builder.build_cmp(self.pred, ctx.io[0], ctx.io[1], "");
        ctx.builder.build_store(result, ctx.io[2]);
        ctx.builder.build_br(ctx.output_blocks[0]);
        res
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }
}

macro_rules! cast_node_type {
    ($(#[$doc:meta])* $name:ident, $node_name:literal, $desc:literal, $from:literal, $to:literal,
     $kind:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            pub(crate) info: NodeTypeInfo,
        }

        impl $name {
            pub fn new() -> Self {
                let mut info = NodeTypeInfo::new("lang", $node_name, $desc);
                info.make_pure();
                info.converter = true;
                info.data_inputs = vec![NamedDataType::new(
                    "",
                    type_from_name($from).expect("lang type exists"),
                )];
                info.data_outputs = vec![NamedDataType::new(
                    "",
                    type_from_name($to).expect("lang type exists"),
                )];
                $name { info }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl NodeType for $name {
            fn info(&self) -> &NodeTypeInfo {
                &self.info
            }

            fn lower(&self, ctx: LowerCtx<'_, '_>) -> Report {
                let mut res = Report::new();
                if ctx.io.len() != 2 || ctx.output_blocks.len() != 1 {
                    res.add_entry(
                        "EUKN",
                        concat!("Malformed lowering request for lang:", $node_name),
                        json!({"io": ctx.io.len()}),
                    );
                    return res;
                }
                let to_ty = type_from_name($to).expect("lang type exists");
                let cast = ctx
                    .builder
                    .build_cast($kind, ctx.io[0], ir_type_of(&to_ty), "");
                ctx.builder.build_store(cast, ctx.io[1]);
                ctx.builder.build_br(ctx.output_blocks[0]);
                res
            }

            fn clone_box(&self) -> Box<dyn NodeType> {
                Box::new(self.clone())
            }
        }
    };
}

cast_node_type!(
    /// `lang:inttofloat` -- converter from `i32` to `float`.
    IntToFloatNodeType,
    "inttofloat",
    "Convert integer to float",
    "i32",
    "float",
    CastKind::SiToFp
);

cast_node_type!(
    /// `lang:floattoint` -- converter from `float` to `i32`.
    FloatToIntNodeType,
    "floattoint",
    "Convert float to integer",
    "float",
    "i32",
    CastKind::FpToSi
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_types_resolve() {
        for name in ["i32", "i1", "float", "i8", "i8*"] {
            let ty = type_from_name(name).unwrap();
            assert!(ty.valid());
            assert_eq!(ty.module(), "lang");
            assert_eq!(ty.unqualified_name(), name);
            assert!(ty.ir_type().is_some());
            assert!(ty.debug_type().is_some());
        }
        assert!(type_from_name("iiint").is_none());
    }

    #[test]
    fn pointer_types_nest() {
        let ty = type_from_name("i32*").unwrap();
        assert_eq!(ty.ir_type(), Some(&IrType::I32.ptr_to()));
        let ty = type_from_name("i32**").unwrap();
        assert_eq!(ty.ir_type(), Some(&IrType::I32.ptr_to().ptr_to()));
    }

    #[test]
    fn pure_flags() {
        assert!(ConstIntNodeType::new(3).info().pure);
        assert!(StringLiteralNodeType::new("x".into()).info().pure);
        assert!(!IfNodeType::new().info().pure);
        let entry = EntryNodeType::new(vec![], vec!["".into()]);
        assert!(!entry.info().pure);
    }

    #[test]
    fn converters_are_flagged() {
        assert!(IntToFloatNodeType::new().info().converter);
        assert!(FloatToIntNodeType::new().info().converter);
        assert!(!ConstIntNodeType::new(0).info().converter);
    }

    #[test]
    fn binary_names_resolve() {
        for name in ["i32+i32", "i32/i32", "float*float", "i32<=i32", "float!=float"] {
            assert!(binary_node_type(name).is_some(), "missing {}", name);
        }
        assert!(binary_node_type("i32%i32").is_none());
    }

    #[test]
    fn entry_json_roundtrips_signature() {
        let entry = EntryNodeType::new(
            vec![NamedDataType::new("x", type_from_name("i32").unwrap())],
            vec!["in".into()],
        );
        let j = entry.to_json();
        assert_eq!(j["data"][0]["x"], "lang:i32");
        assert_eq!(j["exec"][0], "in");
    }
}
