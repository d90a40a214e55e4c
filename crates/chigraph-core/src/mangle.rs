//! Symbol name mangling for graph functions.

/// The symbol for a function: `<module_full_name>.<function_name>`, with the
/// module's slashes preserved verbatim.
pub fn mangle_function_name(module_full_name: &str, name: &str) -> String {
    format!("{}.{}", module_full_name, name)
}

/// Splits a mangled symbol back into `(module_full_name, function_name)`.
/// The function name is everything after the last `.`.
pub fn unmangle_function_name(mangled: &str) -> Option<(String, String)> {
    mangled
        .rsplit_once('.')
        .map(|(module, func)| (module.to_string(), func.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangles_verbatim() {
        assert_eq!(mangle_function_name("test/main", "main"), "test/main.main");
        assert_eq!(
            mangle_function_name("github.com/user/mod", "doit"),
            "github.com/user/mod.doit"
        );
    }

    #[test]
    fn unmangle_inverts_mangle() {
        let mangled = mangle_function_name("github.com/user/mod", "doit");
        assert_eq!(
            unmangle_function_name(&mangled),
            Some(("github.com/user/mod".to_string(), "doit".to_string()))
        );
        assert_eq!(unmangle_function_name("nodot"), None);
    }
}
