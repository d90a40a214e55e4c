//! Whole-module compilation: dependency resolution, caching, and linking.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::json;

use chigraph_core::{json::graph_module_to_json, mangle_function_name, ChiModule, Context, Report};
use chigraph_ir::{verify_module, IrFunction, IrModule, IrType};
use chigraph_storage::ModuleCache;

use crate::func::{compile_function, function_param_types};
use crate::runtime;

/// Flags controlling module compilation. Both default on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileSettings {
    /// Consult and populate the module cache.
    pub use_cache: bool,
    /// Link dependencies (and the runtime for main modules) into the result,
    /// producing a self-contained module. Off, the result carries extern
    /// declarations for everything it references.
    pub link_dependencies: bool,
}

impl Default for CompileSettings {
    fn default() -> Self {
        CompileSettings {
            use_cache: true,
            link_dependencies: true,
        }
    }
}

/// The cache fingerprint of a module: a digest over its JSON form, its
/// dependencies' fingerprints, and the compile settings. `None` when the
/// module (or a dependency) is not loaded.
pub fn module_fingerprint(
    ctx: &Context,
    full_name: &str,
    settings: &CompileSettings,
) -> Option<String> {
    let mut visiting = HashSet::new();
    fingerprint_inner(ctx, full_name, settings, &mut visiting).map(|h| h.to_hex().to_string())
}

fn fingerprint_inner(
    ctx: &Context,
    full_name: &str,
    settings: &CompileSettings,
    visiting: &mut HashSet<String>,
) -> Option<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    if !visiting.insert(full_name.to_string()) {
        // dependency cycle; hash the name alone so the walk terminates
        hasher.update(full_name.as_bytes());
        return Some(hasher.finalize());
    }

    let module = ctx.module_by_full_name(full_name)?;
    match module {
        ChiModule::Lang(_) => {
            hasher.update(b"lang");
        }
        ChiModule::Graph(graph) => {
            let bytes = serde_json::to_vec(&graph_module_to_json(graph)).ok()?;
            hasher.update(&bytes);
        }
    }

    for dep in module.dependencies() {
        let dep_hash = fingerprint_inner(ctx, &dep, settings, visiting)?;
        hasher.update(dep_hash.as_bytes());
    }

    hasher.update(&[settings.use_cache as u8, settings.link_dependencies as u8]);
    Some(hasher.finalize())
}

/// Compiles a loaded module to IR.
///
/// With `use_cache`, a cache entry with a matching fingerprint short-cuts
/// generation; with `link_dependencies`, every dependency (and, for main
/// modules, the runtime declarations) is linked into the result. A
/// per-compile memo over the dependency DAG ensures each module is lowered
/// at most once even when it is reached along several paths.
pub fn compile_module(
    ctx: &mut Context,
    full_name: &str,
    settings: &CompileSettings,
) -> (Report, Option<IrModule>) {
    let mut session = HashMap::new();
    compile_module_inner(ctx, full_name, settings, &mut session)
}

fn compile_module_inner(
    ctx: &mut Context,
    full_name: &str,
    settings: &CompileSettings,
    session: &mut HashMap<String, IrModule>,
) -> (Report, Option<IrModule>) {
    let mut res = Report::new();
    let ctx_id = res.push_context(json!({"Module Name": full_name}));

    if let Some(done) = session.get(full_name) {
        res.pop_context(ctx_id);
        return (res, Some(done.clone()));
    }

    let Some(module) = ctx.module_by_full_name(full_name) else {
        res.add_entry("E36", "Could not find module", json!({"module": full_name}));
        res.pop_context(ctx_id);
        return (res, None);
    };
    let dependencies = module.dependencies();
    let is_main = module.short_name() == "main";

    let fingerprint = module_fingerprint(ctx, full_name, settings).unwrap_or_default();

    // retrieve from the cache, or generate
    let mut ir_module = None;
    if settings.use_cache {
        if let Some(bytes) = ctx.module_cache().retrieve_from_cache(full_name, &fingerprint) {
            match IrModule::from_bytes(&bytes) {
                Ok(cached) => {
                    tracing::debug!(module = full_name, "module cache hit");
                    ir_module = Some(cached);
                }
                Err(err) => {
                    tracing::warn!(
                        module = full_name,
                        error = %err,
                        "discarding unreadable cache entry"
                    );
                }
            }
        }
    }

    let freshly_generated = ir_module.is_none();
    if ir_module.is_none() {
        let (gen_res, generated) = generate_module(ctx, full_name, &dependencies);
        res += gen_res;
        if !res.success() {
            res.pop_context(ctx_id);
            return (res, None);
        }
        ir_module = generated;
    }
    let Some(mut ir_module) = ir_module else {
        res.pop_context(ctx_id);
        return (res, None);
    };

    if freshly_generated {
        if let Err(err) =
            ctx.module_cache_mut()
                .cache_module(full_name, &ir_module.to_bytes(), &fingerprint)
        {
            res.add_entry(
                "EUKN",
                "Failed to cache compiled module",
                json!({"Error": err.to_string()}),
            );
            res.pop_context(ctx_id);
            return (res, None);
        }
    }

    if settings.link_dependencies {
        for dep in &dependencies {
            let (dep_res, dep_module) = compile_module_inner(ctx, dep, settings, session);
            res += dep_res;
            let Some(dep_module) = dep_module else {
                res.pop_context(ctx_id);
                return (res, None);
            };
            ir_module.link(dep_module);
        }

        if is_main {
            ir_module.link(runtime::runtime_module());
        }
    }

    session.insert(full_name.to_string(), ir_module.clone());
    res.pop_context(ctx_id);
    (res, Some(ir_module))
}

/// Lowers every function of one module, with extern declarations for the
/// whole transitive dependency closure in front.
fn generate_module(
    ctx: &Context,
    full_name: &str,
    dependencies: &[String],
) -> (Report, Option<IrModule>) {
    let mut res = Report::new();
    let mut ir_module = IrModule::new(full_name);

    // forward declarations for every transitive dependency
    let mut added: HashSet<String> = dependencies.iter().cloned().collect();
    let mut queue: VecDeque<String> = dependencies.iter().cloned().collect();
    while let Some(dep_name) = queue.pop_front() {
        let Some(dep) = ctx.module_by_full_name(&dep_name) else {
            res.add_entry("E36", "Could not find module", json!({"module": dep_name}));
            return (res, None);
        };
        res += add_forward_declarations(&mut ir_module, dep);
        if !res.success() {
            return (res, None);
        }
        for transitive in dep.dependencies() {
            if added.insert(transitive.clone()) {
                queue.push_back(transitive);
            }
        }
    }

    let Some(module) = ctx.module_by_full_name(full_name) else {
        res.add_entry("E36", "Could not find module", json!({"module": full_name}));
        return (res, None);
    };
    let ChiModule::Graph(graph) = module else {
        // the lang module contributes no functions of its own
        return (res, Some(ir_module));
    };

    // own prototypes first, so call nodes resolve in any order
    res += add_forward_declarations(&mut ir_module, module);
    if !res.success() {
        return (res, None);
    }

    let lines = graph.create_line_number_assoc();

    // a failing function doesn't short-circuit its siblings; the module as
    // a whole still fails
    let mut any_failed = false;
    for func in graph.functions() {
        tracing::debug!(module = full_name, function = func.name(), "lowering function");
        let func_res = compile_function(func, &mut ir_module, &lines);
        if !func_res.success() {
            any_failed = true;
        }
        res += func_res;
    }
    if any_failed {
        return (res, None);
    }

    if let Err(errors) = verify_module(&ir_module) {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        res.add_entry(
            "EINT",
            "Internal compiler error: Invalid module created",
            json!({
                "Errors": messages,
                "Full Name": full_name,
                "Module": ir_module.to_string(),
            }),
        );
        return (res, None);
    }

    (res, Some(ir_module))
}

/// Declares every function a module provides, without bodies.
fn add_forward_declarations(ir_module: &mut IrModule, module: &ChiModule) -> Report {
    let mut res = Report::new();
    let ChiModule::Graph(graph) = module else {
        return res;
    };
    for func in graph.functions() {
        let Some(params) = function_param_types(func) else {
            res.add_entry(
                "EUKN",
                "A parameter type has no backend representation",
                json!({"Function": func.qualified_name()}),
            );
            return res;
        };
        let mangled = mangle_function_name(graph.full_name(), func.name());
        ir_module.get_or_insert_function(&mangled, || {
            IrFunction::declaration(mangled.clone(), params, Some(IrType::I32))
        });
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use chigraph_core::lang;
    use uuid::Uuid;

    fn context_with_main() -> Context {
        let mut ctx = Context::new(None);
        ctx.new_graph_module("test/main").unwrap();
        assert!(ctx.add_module_dependency("test/main", "lang").success());

        let module = ctx.graph_module_mut("test/main").unwrap();
        let (func, _) =
            module.get_or_create_function("main", vec![], vec![], vec!["".into()], vec!["".into()]);
        let entry = Uuid::new_v4();
        let exit = Uuid::new_v4();
        func.get_or_insert_entry_node(0.0, 0.0, entry);
        func.insert_node(func.create_exit_node_type(), 10.0, 0.0, exit);
        func.connect_exec(entry, 0, exit, 0);
        ctx
    }

    #[test]
    fn unknown_module_is_e36() {
        let mut ctx = Context::new(None);
        let (res, module) = compile_module(&mut ctx, "nope", &CompileSettings::default());
        assert!(!res.success());
        assert_eq!(res.entries()[0].errorcode, "E36");
        assert!(module.is_none());
    }

    #[test]
    fn fingerprint_tracks_edits_and_settings() {
        let mut ctx = context_with_main();
        let settings = CompileSettings::default();

        let fp1 = module_fingerprint(&ctx, "test/main", &settings).unwrap();
        let fp2 = module_fingerprint(&ctx, "test/main", &settings).unwrap();
        assert_eq!(fp1, fp2);

        let unlinked = CompileSettings {
            link_dependencies: false,
            ..settings
        };
        assert_ne!(
            fp1,
            module_fingerprint(&ctx, "test/main", &unlinked).unwrap()
        );

        // an edit changes the fingerprint
        let module = ctx.graph_module_mut("test/main").unwrap();
        module.get_or_create_function("extra", vec![], vec![], vec!["".into()], vec!["".into()]);
        assert_ne!(
            fp1,
            module_fingerprint(&ctx, "test/main", &settings).unwrap()
        );
    }

    #[test]
    fn second_compile_hits_the_cache() {
        let mut ctx = context_with_main();
        let settings = CompileSettings::default();

        let (res, first) = compile_module(&mut ctx, "test/main", &settings);
        assert!(res.success(), "{}", res.dump());
        let first = first.unwrap();

        assert!(ctx
            .module_cache()
            .cache_update_time("test/main")
            .is_some());

        let (res, second) = compile_module(&mut ctx, "test/main", &settings);
        assert!(res.success());
        assert_eq!(first, second.unwrap());
    }

    #[test]
    fn unlinked_compile_keeps_declarations() {
        let mut ctx = context_with_main();
        let settings = CompileSettings {
            use_cache: false,
            link_dependencies: false,
        };
        let (res, module) = compile_module(&mut ctx, "test/main", &settings);
        assert!(res.success(), "{}", res.dump());
        let module = module.unwrap();

        // the main symbol is defined; no runtime declarations were linked
        assert!(!module.function("test/main.main").unwrap().is_declaration());
        assert!(module.function("printf").is_none());
    }

    #[test]
    fn linked_main_module_carries_the_runtime() {
        let mut ctx = context_with_main();
        let (res, module) = compile_module(&mut ctx, "test/main", &CompileSettings::default());
        assert!(res.success(), "{}", res.dump());
        let module = module.unwrap();
        assert!(module.function("printf").is_some());
    }

    #[test]
    fn broken_function_fails_but_compiles_siblings() {
        let mut ctx = context_with_main();
        {
            let module = ctx.graph_module_mut("test/main").unwrap();
            // a second function with no entry node at all
            module.get_or_create_function(
                "broken",
                vec![],
                vec![],
                vec!["".into()],
                vec!["".into()],
            );
        }

        let settings = CompileSettings {
            use_cache: false,
            link_dependencies: false,
        };
        let (res, module) = compile_module(&mut ctx, "test/main", &settings);
        assert!(!res.success());
        assert!(module.is_none());
        // nothing was cached for the failed compile
        assert!(ctx.module_cache().cache_update_time("test/main").is_none());
    }

    #[test]
    fn lang_nodes_compile_into_working_ir() {
        // main returning 2 + 3 through its i32 output
        let mut ctx = Context::new(None);
        ctx.new_graph_module("test/main").unwrap();
        assert!(ctx.add_module_dependency("test/main", "lang").success());

        let i32_ty = lang::type_from_name("i32").unwrap();
        let module = ctx.graph_module_mut("test/main").unwrap();
        let (func, _) = module.get_or_create_function(
            "main",
            vec![],
            vec![chigraph_core::NamedDataType::new("code", i32_ty.clone())],
            vec!["".into()],
            vec!["".into()],
        );

        let entry = Uuid::new_v4();
        let exit = Uuid::new_v4();
        let two = Uuid::new_v4();
        let three = Uuid::new_v4();
        let add = Uuid::new_v4();
        func.get_or_insert_entry_node(0.0, 0.0, entry);
        func.insert_node(func.create_exit_node_type(), 50.0, 0.0, exit);
        func.insert_node(Box::new(lang::ConstIntNodeType::new(2)), 0.0, 0.0, two);
        func.insert_node(Box::new(lang::ConstIntNodeType::new(3)), 0.0, 0.0, three);
        func.insert_node(
            Box::new(lang::BinaryOperationNodeType::new(
                i32_ty,
                "+",
                chigraph_ir::BinArithOp::Add,
            )),
            0.0,
            0.0,
            add,
        );
        assert!(func.connect_data(two, 0, add, 0).success());
        assert!(func.connect_data(three, 0, add, 1).success());
        assert!(func.connect_data(add, 0, exit, 0).success());
        assert!(func.connect_exec(entry, 0, exit, 0).success());

        let (res, module) = compile_module(&mut ctx, "test/main", &CompileSettings::default());
        assert!(res.success(), "{}", res.dump());
        let module = module.unwrap();

        let (code, _) = chigraph_ir::interpret_main(&module, "test/main.main").unwrap();
        assert_eq!(code, 5);
    }
}
