//! Source-level data types.

use std::fmt;

use chigraph_ir::{DebugType, IrType};

/// A module-qualified named type paired with its back-end type and debug
/// type.
///
/// A `DataType` is *valid* iff both the owning module and the type name are
/// non-empty; the back-end handles must additionally be present before the
/// type is used in lowering. Equality compares the qualified name only.
#[derive(Debug, Clone, Default)]
pub struct DataType {
    module: String,
    name: String,
    ir_type: Option<IrType>,
    debug_type: Option<DebugType>,
}

impl DataType {
    pub fn new(
        module: impl Into<String>,
        name: impl Into<String>,
        ir_type: IrType,
        debug_type: DebugType,
    ) -> Self {
        DataType {
            module: module.into(),
            name: name.into(),
            ir_type: Some(ir_type),
            debug_type: Some(debug_type),
        }
    }

    /// `true` iff the owning module and type name are set.
    pub fn valid(&self) -> bool {
        !self.module.is_empty() && !self.name.is_empty()
    }

    /// Full name of the owning module.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Unqualified type name.
    pub fn unqualified_name(&self) -> &str {
        &self.name
    }

    /// `module:name`.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.module, self.name)
    }

    /// Back-end type; present whenever the type is used in lowering.
    pub fn ir_type(&self) -> Option<&IrType> {
        self.ir_type.as_ref()
    }

    /// Debug type; present whenever the type is used in lowering.
    pub fn debug_type(&self) -> Option<&DebugType> {
        self.debug_type.as_ref()
    }
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module && self.name == other.name
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

/// A name paired with a type: parameters, struct fields, local variables.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedDataType {
    pub name: String,
    pub ty: DataType,
}

impl NamedDataType {
    pub fn new(name: impl Into<String>, ty: DataType) -> Self {
        NamedDataType {
            name: name.into(),
            ty,
        }
    }

    pub fn valid(&self) -> bool {
        self.ty.valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chigraph_ir::DebugEncoding;

    fn i32_ty() -> DataType {
        DataType::new(
            "lang",
            "i32",
            IrType::I32,
            DebugType::new("lang:i32", 32, DebugEncoding::Signed),
        )
    }

    #[test]
    fn default_is_invalid() {
        assert!(!DataType::default().valid());
    }

    #[test]
    fn equality_ignores_backend_handles() {
        let a = i32_ty();
        let b = DataType {
            module: "lang".into(),
            name: "i32".into(),
            ir_type: None,
            debug_type: None,
        };
        assert_eq!(a, b);
    }

    #[test]
    fn equality_respects_qualified_name() {
        let a = i32_ty();
        let mut b = i32_ty();
        b.module = "other".into();
        assert_ne!(a, b);
    }

    #[test]
    fn qualified_name_format() {
        assert_eq!(i32_ty().qualified_name(), "lang:i32");
        assert_eq!(i32_ty().to_string(), "lang:i32");
    }
}
