//! Runtime support declarations.
//!
//! The runtime library itself ships separately; modules whose short name is
//! `main` get extern declarations for its entry points linked in so lowered
//! code can reference them.

use chigraph_ir::{IrFunction, IrModule, IrType};

/// Extern declarations for the runtime's surface.
pub fn runtime_module() -> IrModule {
    let mut module = IrModule::new("runtime");
    module.functions.push(IrFunction::declaration(
        "printf",
        vec![("format".to_string(), IrType::I8.ptr_to())],
        Some(IrType::I32),
    ));
    module.functions.push(IrFunction::declaration(
        "puts",
        vec![("s".to_string(), IrType::I8.ptr_to())],
        Some(IrType::I32),
    ));
    module.functions.push(IrFunction::declaration(
        "abort",
        vec![],
        None,
    ));
    module
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_only_declares() {
        let module = runtime_module();
        assert!(!module.functions.is_empty());
        assert!(module.functions.iter().all(|f| f.is_declaration()));
        assert!(module.function("printf").is_some());
    }
}
