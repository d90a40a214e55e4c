//! IR-level types and their debug-info descriptions.

use serde::{Deserialize, Serialize};

/// A first-class IR type.
///
/// Pointers are typed; struct types are structural (name plus ordered field
/// types). Block addresses are represented as `i8*` values, so no dedicated
/// type variant is needed for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrType {
    /// 1-bit integer (booleans, branch conditions).
    I1,
    /// 8-bit integer.
    I8,
    /// 32-bit signed integer.
    I32,
    /// 64-bit IEEE float.
    F64,
    /// Pointer to a pointee type.
    Ptr(Box<IrType>),
    /// Named structure with ordered fields.
    Struct {
        name: String,
        fields: Vec<IrType>,
    },
}

impl IrType {
    /// Pointer to this type.
    pub fn ptr_to(&self) -> IrType {
        IrType::Ptr(Box::new(self.clone()))
    }

    /// The pointee type, if this is a pointer.
    pub fn pointee(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    /// Returns `true` for the integer types.
    pub fn is_integer(&self) -> bool {
        matches!(self, IrType::I1 | IrType::I8 | IrType::I32)
    }

    /// Returns `true` for the float type.
    pub fn is_float(&self) -> bool {
        matches!(self, IrType::F64)
    }

    /// Size of a value of this type in bits, for debug info.
    pub fn size_in_bits(&self) -> u32 {
        match self {
            IrType::I1 => 1,
            IrType::I8 => 8,
            IrType::I32 => 32,
            IrType::F64 => 64,
            IrType::Ptr(_) => 64,
            IrType::Struct { fields, .. } => fields.iter().map(IrType::size_in_bits).sum(),
        }
    }
}

/// DWARF-style encoding class for a debug type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugEncoding {
    Signed,
    Boolean,
    Float,
    UnsignedChar,
    Pointer,
    Structure,
}

/// Debug-info description of a source-level type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugType {
    /// Qualified source-level name, e.g. `lang:i32`.
    pub name: String,
    /// Size in bits.
    pub size_bits: u32,
    /// Encoding class.
    pub encoding: DebugEncoding,
}

impl DebugType {
    pub fn new(name: impl Into<String>, size_bits: u32, encoding: DebugEncoding) -> Self {
        DebugType {
            name: name.into(),
            size_bits,
            encoding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_roundtrip() {
        let ty = IrType::I32.ptr_to();
        assert_eq!(ty.pointee(), Some(&IrType::I32));
        assert!(IrType::I32.pointee().is_none());
    }

    #[test]
    fn struct_size_is_sum_of_fields() {
        let ty = IrType::Struct {
            name: "pair".into(),
            fields: vec![IrType::I32, IrType::F64],
        };
        assert_eq!(ty.size_in_bits(), 96);
    }

    #[test]
    fn serde_roundtrip() {
        let ty = IrType::Ptr(Box::new(IrType::Struct {
            name: "s".into(),
            fields: vec![IrType::I1, IrType::I8],
        }));
        let json = serde_json::to_string(&ty).unwrap();
        let back: IrType = serde_json::from_str(&json).unwrap();
        assert_eq!(ty, back);
    }
}
