//! The context: owner of every loaded module and the compile-time caches.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use uuid::Uuid;

use chigraph_storage::{FileModuleCache, MemoryModuleCache, ModuleCache};

use crate::lang::{self, LangModule};
use crate::module::{GetLocalNodeType, GraphModule, SetLocalNodeType};
use crate::node_type::NodeType;
use crate::report::Report;
use crate::types::DataType;

/// A loaded module: the built-in `lang` module or a user graph module.
#[derive(Debug)]
pub enum ChiModule {
    Lang(LangModule),
    Graph(GraphModule),
}

impl ChiModule {
    pub fn full_name(&self) -> &str {
        match self {
            ChiModule::Lang(m) => m.full_name(),
            ChiModule::Graph(m) => m.full_name(),
        }
    }

    pub fn short_name(&self) -> &str {
        match self {
            ChiModule::Lang(m) => m.short_name(),
            ChiModule::Graph(m) => m.short_name(),
        }
    }

    pub fn dependencies(&self) -> Vec<String> {
        match self {
            ChiModule::Lang(_) => Vec::new(),
            ChiModule::Graph(m) => m.dependencies().iter().cloned().collect(),
        }
    }

    pub fn node_type_names(&self) -> Vec<String> {
        match self {
            ChiModule::Lang(m) => m.node_type_names(),
            ChiModule::Graph(m) => m.node_type_names(),
        }
    }

    pub fn type_names(&self) -> Vec<String> {
        match self {
            ChiModule::Lang(m) => m.type_names(),
            ChiModule::Graph(m) => m.type_names(),
        }
    }

    pub fn as_graph(&self) -> Option<&GraphModule> {
        match self {
            ChiModule::Graph(m) => Some(m),
            ChiModule::Lang(_) => None,
        }
    }
}

/// Owns the loaded modules, the workspace path, the module cache, and the
/// type-converter cache.
///
/// A context and its contents are single-threaded; modules never move
/// between contexts.
pub struct Context {
    workspace_path: Option<PathBuf>,
    modules: Vec<ChiModule>,
    converters: HashMap<(String, String), Box<dyn NodeType>>,
    module_cache: Box<dyn ModuleCache>,
}

impl Context {
    /// Creates a context. When `work_path` is inside a workspace (any parent
    /// directory holding a `.chigraphworkspace` file), modules load from and
    /// cache under that workspace; otherwise the context is workspace-less
    /// with an in-memory cache.
    pub fn new(work_path: Option<&Path>) -> Self {
        let workspace_path = work_path.and_then(workspace_from_child_path);
        let module_cache: Box<dyn ModuleCache> = match &workspace_path {
            Some(ws) => Box::new(FileModuleCache::new(ws)),
            None => Box::new(MemoryModuleCache::new()),
        };
        Context {
            workspace_path,
            modules: Vec::new(),
            converters: HashMap::new(),
            module_cache,
        }
    }

    pub fn workspace_path(&self) -> Option<&Path> {
        self.workspace_path.as_deref()
    }

    pub fn has_workspace(&self) -> bool {
        self.workspace_path.is_some()
    }

    pub fn module_cache(&self) -> &dyn ModuleCache {
        self.module_cache.as_ref()
    }

    pub fn module_cache_mut(&mut self) -> &mut dyn ModuleCache {
        self.module_cache.as_mut()
    }

    /// Swaps in a different cache implementation.
    pub fn set_module_cache(&mut self, cache: Box<dyn ModuleCache>) {
        self.module_cache = cache;
    }

    // -----------------------------------------------------------------------
    // Module access
    // -----------------------------------------------------------------------

    pub fn modules(&self) -> &[ChiModule] {
        &self.modules
    }

    pub fn module_by_full_name(&self, full_name: &str) -> Option<&ChiModule> {
        self.modules.iter().find(|m| m.full_name() == full_name)
    }

    pub fn lang_module(&self) -> Option<&LangModule> {
        self.modules.iter().find_map(|m| match m {
            ChiModule::Lang(l) => Some(l),
            _ => None,
        })
    }

    pub fn graph_module(&self, full_name: &str) -> Option<&GraphModule> {
        self.module_by_full_name(full_name).and_then(|m| m.as_graph())
    }

    pub fn graph_module_mut(&mut self, full_name: &str) -> Option<&mut GraphModule> {
        self.modules.iter_mut().find_map(|m| match m {
            ChiModule::Graph(g) if g.full_name() == full_name => Some(g),
            _ => None,
        })
    }

    /// Creates an empty graph module and adds it. Returns `None` on a name
    /// clash.
    pub fn new_graph_module(&mut self, full_name: &str) -> Option<&mut GraphModule> {
        if !self.add_module(ChiModule::Graph(GraphModule::new(full_name))) {
            return None;
        }
        self.graph_module_mut(full_name)
    }

    /// Adds an owned module. Returns `false` on a full-name clash. Converter
    /// node types the module provides are entered into the converter cache.
    pub fn add_module(&mut self, module: ChiModule) -> bool {
        if self.module_by_full_name(module.full_name()).is_some() {
            return false;
        }
        tracing::debug!(module = module.full_name(), "adding module to context");

        let full_name = module.full_name().to_string();
        let type_names = module.node_type_names();
        self.modules.push(module);

        // harvest converter node types
        for type_name in type_names {
            let (res, ty) = self.node_type_from_module(&full_name, &type_name, &Value::Null);
            if !res.success() {
                continue;
            }
            let Some(ty) = ty else { continue };
            if !ty.converter() || ty.data_inputs().len() != 1 || ty.data_outputs().len() != 1 {
                continue;
            }
            let key = (
                ty.data_inputs()[0].ty.qualified_name(),
                ty.data_outputs()[0].ty.qualified_name(),
            );
            self.converters.insert(key, ty);
        }
        true
    }

    /// Removes a module by full name. Returns `false` if absent.
    pub fn unload_module(&mut self, full_name: &str) -> bool {
        let before = self.modules.len();
        self.modules.retain(|m| m.full_name() != full_name);
        self.modules.len() != before
    }

    // -----------------------------------------------------------------------
    // Module loading
    // -----------------------------------------------------------------------

    /// Loads a module by full name, resolving its dependencies recursively.
    ///
    /// `lang` is built in; anything else comes from
    /// `<workspace>/src/<name>.chimod`.
    pub fn load_module(&mut self, name: &str) -> Report {
        debug_assert!(!name.is_empty(), "module name must not be empty");
        let mut res = Report::new();
        let ctx_id = res.push_context(json!({"Requested Module Name": name}));

        if name == "lang" {
            if self.lang_module().is_none() {
                self.add_module(ChiModule::Lang(LangModule));
            }
            res.pop_context(ctx_id);
            return res;
        }

        if self.module_by_full_name(name).is_some() {
            res.pop_context(ctx_id);
            return res;
        }

        let Some(workspace) = self.workspace_path.clone() else {
            res.add_entry(
                "E52",
                "Cannot load module without a workspace path",
                json!({}),
            );
            res.pop_context(ctx_id);
            return res;
        };

        let path = workspace.join("src").join(format!("{}.chimod", name));
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                res.add_entry(
                    "E38",
                    "Failed to find module file",
                    json!({
                        "Workspace Path": workspace.display().to_string(),
                        "Expected Path": path.display().to_string(),
                        "Error": err.to_string(),
                    }),
                );
                res.pop_context(ctx_id);
                return res;
            }
        };

        let json = match serde_json::from_str::<Value>(&text) {
            Ok(json) => json,
            Err(err) => {
                res.add_entry(
                    "E38",
                    "Failed to parse module json",
                    json!({"Error": err.to_string()}),
                );
                res.pop_context(ctx_id);
                return res;
            }
        };

        tracing::debug!(module = name, path = %path.display(), "loading module from workspace");
        res += self.add_module_from_json(name, &json);

        // freshness follows the file, not the load time
        let mtime = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        if let Some(module) = self.graph_module_mut(name) {
            module.update_last_edit_time(mtime);
        }

        res.pop_context(ctx_id);
        res
    }

    /// Adds a module from its JSON form. A module that is already loaded is
    /// left untouched.
    pub fn add_module_from_json(&mut self, full_name: &str, json: &Value) -> Report {
        let mut res = Report::new();
        let ctx_id = res.push_context(json!({"Requested Module Name": full_name}));

        if self.module_by_full_name(full_name).is_some() {
            res.pop_context(ctx_id);
            return res;
        }

        res += crate::json::json_to_graph_module(self, full_name, json);
        if !res.success() {
            self.unload_module(full_name);
        }

        res.pop_context(ctx_id);
        res
    }

    /// Every `.chimod` under `<workspace>/src`, as full module names.
    pub fn list_modules_in_workspace(&self) -> Vec<String> {
        let Some(workspace) = &self.workspace_path else {
            return Vec::new();
        };
        let src = workspace.join("src");
        let mut found = Vec::new();
        collect_chimods(&src, &src, &mut found);
        found.sort();
        found
    }

    /// Saves a graph module under the workspace.
    pub fn save_module(&self, full_name: &str) -> Report {
        let mut res = Report::new();
        let Some(workspace) = &self.workspace_path else {
            res.add_entry("EUKN", "Cannot serialize without a workspace", json!({}));
            return res;
        };
        let Some(module) = self.graph_module(full_name) else {
            res.add_entry("E36", "Could not find module", json!({"module": full_name}));
            return res;
        };
        module.save_to_disk(workspace)
    }

    // -----------------------------------------------------------------------
    // Dependencies
    // -----------------------------------------------------------------------

    /// Adds `dependency` to `module`'s dependency set, loading the
    /// dependency (and its dependencies) first.
    pub fn add_module_dependency(&mut self, module: &str, dependency: &str) -> Report {
        let mut res = Report::new();
        if self.graph_module(module).is_none() {
            res.add_entry("E36", "Could not find module", json!({"module": module}));
            return res;
        }

        res += self.load_module(dependency);
        if !res.success() {
            return res;
        }

        if let Some(module) = self.graph_module_mut(module) {
            module.add_dependency_name(dependency);
        }
        res
    }

    /// Removes `dependency` from `module`'s dependency set. The dependency
    /// module is *not* unloaded. Returns `false` when it wasn't a dependency.
    pub fn remove_module_dependency(&mut self, module: &str, dependency: &str) -> bool {
        self.graph_module_mut(module)
            .map(|m| m.remove_dependency(dependency))
            .unwrap_or(false)
    }

    // -----------------------------------------------------------------------
    // Types and node types
    // -----------------------------------------------------------------------

    /// Resolves a type from a loaded module. `E36` when the module is
    /// missing, `E37` when the type is.
    pub fn type_from_module(&self, module: &str, name: &str) -> (Report, Option<DataType>) {
        let mut res = Report::new();

        let Some(owner) = self.module_by_full_name(module) else {
            res.add_entry("E36", "Could not find module", json!({"module": module}));
            return (res, None);
        };

        let ty = match owner {
            ChiModule::Lang(_) => lang::type_from_name(name),
            ChiModule::Graph(g) => g
                .struct_from_name(name)
                .map(|s| s.data_type())
                .filter(|ty| ty.valid()),
        };

        if ty.is_none() {
            res.add_entry(
                "E37",
                "Could not find type in module",
                json!({"type": name, "module": module}),
            );
        }
        (res, ty)
    }

    /// Builds a node type from a loaded module. `E36` when the module is
    /// missing, `E37` when the type name is unknown.
    pub fn node_type_from_module(
        &self,
        module: &str,
        type_name: &str,
        data: &Value,
    ) -> (Report, Option<Box<dyn NodeType>>) {
        let mut res = Report::new();

        let Some(owner) = self.module_by_full_name(module) else {
            res.add_entry("E36", "Could not find module", json!({"module": module}));
            return (res, None);
        };

        match owner {
            ChiModule::Lang(_) => lang::node_type_from_name(self, type_name, data),
            ChiModule::Graph(graph) => {
                // a function call node
                if let Some(call) = graph.call_node_type(type_name) {
                    return (res, Some(Box::new(call)));
                }

                // struct make/break
                if let Some(struct_name) = type_name.strip_prefix("_make_") {
                    if let Some(def) = graph.struct_from_name(struct_name) {
                        return (res, Some(Box::new(def.make_node_type())));
                    }
                }
                if let Some(struct_name) = type_name.strip_prefix("_break_") {
                    if let Some(def) = graph.struct_from_name(struct_name) {
                        return (res, Some(Box::new(def.break_node_type())));
                    }
                }

                // local accessors; the payload is the qualified type
                let local = type_name
                    .strip_prefix("_get_")
                    .map(|n| (n, true))
                    .or_else(|| type_name.strip_prefix("_set_").map(|n| (n, false)));
                if let Some((var_name, is_get)) = local {
                    let Some(qualified) = data.as_str() else {
                        res.add_entry(
                            "EUKN",
                            "Data for a local accessor must be a qualified type string",
                            json!({"Given Data": data}),
                        );
                        return (res, None);
                    };
                    let (module_part, name_part) =
                        qualified.split_once(':').unwrap_or(("lang", qualified));
                    let (type_res, ty) = self.type_from_module(module_part, name_part);
                    res += type_res;
                    let Some(ty) = ty else {
                        return (res, None);
                    };
                    let var = crate::types::NamedDataType::new(var_name, ty);
                    let built: Box<dyn NodeType> = if is_get {
                        Box::new(GetLocalNodeType::new(module, var))
                    } else {
                        Box::new(SetLocalNodeType::new(module, var))
                    };
                    return (res, Some(built));
                }

                res.add_entry(
                    "E37",
                    "Failed to find node in module",
                    json!({"Module": module, "Requested Node Type": type_name}),
                );
                (res, None)
            }
        }
    }

    /// A converter node type turning `from` into `to`, if any loaded module
    /// provides one. Memoized at module-add time.
    pub fn create_converter_node_type(
        &self,
        from: &DataType,
        to: &DataType,
    ) -> Option<Box<dyn NodeType>> {
        self.converters
            .get(&(from.qualified_name(), to.qualified_name()))
            .cloned()
    }

    /// Every node instance of `module:type_name`, across every loaded graph
    /// module, as `(module, function, node)` paths.
    pub fn find_instances_of_type(
        &self,
        module: &str,
        type_name: &str,
    ) -> Vec<(String, String, Uuid)> {
        let mut found = Vec::new();
        for m in &self.modules {
            let Some(graph) = m.as_graph() else { continue };
            for func in graph.functions() {
                for id in func.nodes_with_type(module, type_name) {
                    found.push((graph.full_name().to_string(), func.name().to_string(), id));
                }
            }
        }
        found
    }

    /// Renames a struct and retypes every `_make_`/`_break_` instance of it
    /// across the loaded modules. Returns `false` when the struct is
    /// missing.
    pub fn rename_struct(&mut self, module: &str, old_name: &str, new_name: &str) -> bool {
        let renamed = self
            .graph_module_mut(module)
            .and_then(|m| m.struct_mut(old_name))
            .map(|def| def.set_name(new_name))
            .is_some();
        if !renamed {
            return false;
        }

        for kind in ["_make_", "_break_"] {
            let stale = format!("{}{}", kind, old_name);
            let fresh = format!("{}{}", kind, new_name);
            for (owner, function, node) in self.find_instances_of_type(module, &stale) {
                let (_, ty) = self.node_type_from_module(module, &fresh, &Value::Null);
                let Some(ty) = ty else { continue };
                if let Some(func) = self
                    .graph_module_mut(&owner)
                    .and_then(|m| m.function_mut(&function))
                {
                    func.set_node_type(node, ty);
                }
            }
        }
        true
    }

    /// Retypes every `_make_`/`_break_` instance of a struct after its
    /// fields changed.
    pub fn update_struct_references(&mut self, module: &str, struct_name: &str) -> Report {
        let mut res = Report::new();
        for kind in ["_make_", "_break_"] {
            let type_name = format!("{}{}", kind, struct_name);
            for (owner, function, node) in self.find_instances_of_type(module, &type_name) {
                let (type_res, ty) = self.node_type_from_module(module, &type_name, &Value::Null);
                res += type_res;
                let Some(ty) = ty else { continue };
                if let Some(func) = self
                    .graph_module_mut(&owner)
                    .and_then(|m| m.function_mut(&function))
                {
                    res += func.set_node_type(node, ty);
                }
            }
        }
        res
    }
}

/// Walks parents of `path` until a directory containing `.chigraphworkspace`
/// is found.
pub fn workspace_from_child_path(path: &Path) -> Option<PathBuf> {
    let mut current = Some(path);
    while let Some(dir) = current {
        if dir.join(".chigraphworkspace").is_file() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

fn collect_chimods(root: &Path, dir: &Path, found: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_chimods(root, &path, found);
        } else if path.extension().map(|e| e == "chimod").unwrap_or(false) {
            if let Ok(rel) = path.strip_prefix(root) {
                let mut name = rel.to_string_lossy().replace('\\', "/");
                name.truncate(name.len() - ".chimod".len());
                found.push(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".chigraphworkspace"), "").unwrap();
        dir
    }

    #[test]
    fn workspace_resolution_walks_parents() {
        let ws = make_workspace();
        fs::create_dir_all(ws.path().join("src/github.com")).unwrap();

        assert_eq!(
            workspace_from_child_path(ws.path()),
            Some(ws.path().to_path_buf())
        );
        assert_eq!(
            workspace_from_child_path(&ws.path().join("src")),
            Some(ws.path().to_path_buf())
        );
        assert_eq!(
            workspace_from_child_path(&ws.path().join("src/github.com")),
            Some(ws.path().to_path_buf())
        );
        assert_eq!(workspace_from_child_path(Path::new("/")), None);
    }

    /// Scenario: a context with no workspace holds exactly the modules that
    /// were created in it.
    #[test]
    fn empty_module_scenario() {
        let mut ctx = Context::new(None);
        assert!(ctx.modules().is_empty());

        assert!(ctx.new_graph_module("test/main").is_some());
        assert_eq!(ctx.modules().len(), 1);

        let module = ctx.module_by_full_name("test/main").unwrap();
        assert_eq!(module.full_name(), "test/main");
        assert_eq!(module.short_name(), "main");

        assert!(ctx.module_by_full_name("qwerty").is_none());
        assert!(ctx.module_by_full_name("").is_none());
    }

    /// Scenario: dependency add/remove loads the dependency but never
    /// implicitly unloads it.
    #[test]
    fn dependency_add_remove_scenario() {
        let mut ctx = Context::new(None);
        ctx.new_graph_module("test/main").unwrap();

        assert!(ctx.add_module_dependency("test/main", "lang").success());
        assert_eq!(ctx.modules().len(), 2);
        assert!(ctx.lang_module().is_some());
        assert!(ctx
            .graph_module("test/main")
            .unwrap()
            .dependencies()
            .contains("lang"));

        assert!(ctx.remove_module_dependency("test/main", "lang"));
        // removing the dependency does not unload the module
        assert_eq!(ctx.modules().len(), 2);

        let res = ctx.add_module_dependency("test/main", "notarealmodule");
        assert!(!res.success());
        assert!(ctx
            .graph_module("test/main")
            .unwrap()
            .dependencies()
            .is_empty());
    }

    #[test]
    fn duplicate_module_names_are_rejected() {
        let mut ctx = Context::new(None);
        assert!(ctx.new_graph_module("test/main").is_some());
        assert!(ctx.new_graph_module("test/main").is_none());
        assert_eq!(ctx.modules().len(), 1);
    }

    #[test]
    fn lang_types_resolve_through_the_context() {
        let mut ctx = Context::new(None);
        ctx.load_module("lang");

        let (res, ty) = ctx.type_from_module("lang", "i32");
        assert!(res.success());
        assert_eq!(ty.unwrap().qualified_name(), "lang:i32");

        let (res, ty) = ctx.type_from_module("lang", "iiint");
        assert!(!res.success());
        assert_eq!(res.entries()[0].errorcode, "E37");
        assert!(ty.is_none());

        let (res, ty) = ctx.type_from_module("lag", "i8");
        assert!(!res.success());
        assert_eq!(res.entries()[0].errorcode, "E36");
        assert!(ty.is_none());
    }

    #[test]
    fn lang_node_types_resolve_through_the_context() {
        let mut ctx = Context::new(None);
        ctx.load_module("lang");

        let (res, ty) = ctx.node_type_from_module("lang", "if", &Value::Null);
        assert!(res.success());
        assert!(ty.is_some());

        let (res, _) = ctx.node_type_from_module("lan", "if", &Value::Null);
        assert_eq!(res.entries()[0].errorcode, "E36");

        let (res, _) = ctx.node_type_from_module("lang", "eef", &Value::Null);
        assert_eq!(res.entries()[0].errorcode, "E37");
    }

    #[test]
    fn converter_cache_is_seeded_by_lang() {
        let mut ctx = Context::new(None);
        ctx.load_module("lang");

        let i32_ty = lang::type_from_name("i32").unwrap();
        let float_ty = lang::type_from_name("float").unwrap();

        let conv = ctx.create_converter_node_type(&i32_ty, &float_ty).unwrap();
        assert_eq!(conv.name(), "inttofloat");

        let conv = ctx.create_converter_node_type(&float_ty, &i32_ty).unwrap();
        assert_eq!(conv.name(), "floattoint");

        let i1_ty = lang::type_from_name("i1").unwrap();
        assert!(ctx.create_converter_node_type(&i1_ty, &i32_ty).is_none());
    }

    #[test]
    fn struct_types_resolve_from_graph_modules() {
        let mut ctx = Context::new(None);
        ctx.load_module("lang");
        let module = ctx.new_graph_module("test/main").unwrap();
        let (def, _) = module.get_or_create_struct("hello");
        def.add_field(lang::type_from_name("i32").unwrap(), "a", usize::MAX);

        let (res, ty) = ctx.type_from_module("test/main", "hello");
        assert!(res.success());
        assert_eq!(ty.unwrap().qualified_name(), "test/main:hello");

        let (res, ty) = ctx.node_type_from_module("test/main", "_make_hello", &Value::Null);
        assert!(res.success());
        assert_eq!(ty.unwrap().name(), "_make_hello");
    }

    #[test]
    fn rename_struct_retypes_its_instances() {
        let mut ctx = Context::new(None);
        ctx.load_module("lang");
        let module = ctx.new_graph_module("test/main").unwrap();
        let (def, _) = module.get_or_create_struct("hello");
        def.add_field(lang::type_from_name("i32").unwrap(), "a", usize::MAX);
        module.get_or_create_function("main", vec![], vec![], vec!["".into()], vec!["".into()]);
        let make = Uuid::new_v4();
        let ty = ctx
            .node_type_from_module("test/main", "_make_hello", &Value::Null)
            .1
            .unwrap();
        ctx.graph_module_mut("test/main")
            .unwrap()
            .function_mut("main")
            .unwrap()
            .insert_node(ty, 0.0, 0.0, make);

        assert!(ctx.rename_struct("test/main", "hello", "greeting"));
        let module = ctx.graph_module("test/main").unwrap();
        assert_eq!(module.type_names(), vec!["greeting"]);
        let node = module
            .function_from_name("main")
            .unwrap()
            .node(make)
            .unwrap();
        assert_eq!(node.node_type().name(), "_make_greeting");

        assert!(!ctx.rename_struct("test/main", "hello", "nope"));
    }

    #[test]
    fn find_instances_of_type_spans_modules() {
        let mut ctx = Context::new(None);
        ctx.load_module("lang");
        let module = ctx.new_graph_module("test/main").unwrap();
        let (func, _) =
            module.get_or_create_function("main", vec![], vec![], vec!["".into()], vec!["".into()]);
        let id = Uuid::new_v4();
        func.insert_node(
            Box::new(lang::ConstIntNodeType::new(3)),
            0.0,
            0.0,
            id,
        );

        let found = ctx.find_instances_of_type("lang", "const-int");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "test/main");
        assert_eq!(found[0].1, "main");
        assert_eq!(found[0].2, id);
    }

    #[test]
    fn load_module_without_workspace_is_e52() {
        let mut ctx = Context::new(None);
        let res = ctx.load_module("src/hello");
        assert!(!res.success());
        assert_eq!(res.entries()[0].errorcode, "E52");
    }

    #[test]
    fn list_modules_scans_the_workspace() {
        let ws = make_workspace();
        fs::create_dir_all(ws.path().join("src/test")).unwrap();
        fs::write(ws.path().join("src/test/main.chimod"), "{}").unwrap();
        fs::write(ws.path().join("src/other.chimod"), "{}").unwrap();

        let ctx = Context::new(Some(ws.path()));
        assert_eq!(
            ctx.list_modules_in_workspace(),
            vec!["other".to_string(), "test/main".to_string()]
        );
    }
}
