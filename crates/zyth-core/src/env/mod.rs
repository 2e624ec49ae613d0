//! Scoped type environment
//!
//! Holds everything inference learns about one compilation unit:
//! - Variable bindings keyed by scope (`None` for module level, `"f"` for a
//!   function, `"outer.inner"` for a nested function, `"Class.method"` for a
//!   method)
//! - The class registry (fields, method return types, properties, bases)
//! - The function-return-type registry, keyed by qualified function name
//! - The constructor-argument registry, keyed by class name
//! - Closure capture sets and the import table
//!
//! Variable lookups see the current scope, then ancestors only for names
//! the current closure captures, then module bindings. Sibling functions
//! never observe each other's locals.

mod class;

pub use class::ClassInfo;

use anyhow::Result;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::error::ZythError;
use crate::types::{widen, NativeType};

type Bindings = IndexMap<String, NativeType>;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeEnvironment {
    module: Bindings,
    scopes: IndexMap<String, Bindings>,
    classes: IndexMap<String, ClassInfo>,
    function_returns: IndexMap<String, NativeType>,
    function_params: IndexMap<String, Vec<NativeType>>,
    constructor_args: IndexMap<String, Vec<NativeType>>,
    captures: IndexMap<String, IndexSet<String>>,
    /// Local alias to the fully qualified module or member it names.
    imports: IndexMap<String, String>,
    /// Names declared `global` or `nonlocal`, per scope.
    #[serde(skip)]
    declared_outer: IndexMap<String, IndexSet<String>>,
    #[serde(skip)]
    scope_stack: Vec<String>,
}

impl TypeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- scope discipline -------------------------------------------------

    pub fn current_scope(&self) -> Option<&str> {
        self.scope_stack.last().map(String::as_str)
    }

    pub fn enter_scope(&mut self, name: impl Into<String>) {
        self.scope_stack.push(name.into());
    }

    pub fn exit_scope(&mut self) {
        self.scope_stack.pop();
    }

    pub fn scope_depth(&self) -> usize {
        self.scope_stack.len()
    }

    /// Drop scopes entered after the stack was at `depth`.
    pub fn restore_scope_depth(&mut self, depth: usize) {
        self.scope_stack.truncate(depth);
    }

    /// Run `f` inside `name`. The scope stack is restored to its prior depth
    /// however `f` returns.
    pub fn with_scope<R>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        let depth = self.scope_stack.len();
        self.enter_scope(name);
        let result = f(self);
        self.scope_stack.truncate(depth);
        result
    }

    /// Qualified name of a function defined at the current position.
    pub fn qualify(&self, name: &str) -> String {
        match self.current_scope() {
            Some(scope) => format!("{}.{}", scope, name),
            None => name.to_string(),
        }
    }

    // ---- variable bindings ------------------------------------------------

    /// Bindings of the scope a write from the current position lands in.
    fn target_bindings(&mut self, name: &str) -> &mut Bindings {
        let scope = self.current_scope().map(str::to_string);
        match scope {
            Some(scope) => {
                if let Some(owner) = self.outer_owner(&scope, name) {
                    return match owner {
                        Some(owner) => self.scopes.entry(owner).or_default(),
                        None => &mut self.module,
                    };
                }
                self.scopes.entry(scope).or_default()
            }
            None => &mut self.module,
        }
    }

    /// For a name declared `global`/`nonlocal` in `scope`, the scope that
    /// owns it (`Some(None)` for module level).
    fn outer_owner(&self, scope: &str, name: &str) -> Option<Option<String>> {
        let declared = self.declared_outer.get(scope)?;
        if !declared.contains(name) {
            return None;
        }
        let mut cursor = scope;
        while let Some((parent, _)) = cursor.rsplit_once('.') {
            if self.scopes.get(parent).is_some_and(|b| b.contains_key(name)) {
                return Some(Some(parent.to_string()));
            }
            cursor = parent;
        }
        Some(None)
    }

    /// Install `ty` for `name` in the current scope, replacing any binding.
    pub fn put_var(&mut self, name: &str, ty: NativeType) {
        self.target_bindings(name).insert(name.to_string(), ty);
    }

    /// First write installs `ty`; later writes widen with the existing type.
    pub fn widen_var(&mut self, name: &str, ty: NativeType) {
        let bindings = self.target_bindings(name);
        match bindings.get_mut(name) {
            Some(existing) => *existing = widen(existing, &ty),
            None => {
                bindings.insert(name.to_string(), ty);
            }
        }
    }

    /// Binding of `name` in the current scope only.
    pub fn get_var(&self, name: &str) -> Option<&NativeType> {
        match self.current_scope() {
            Some(scope) => self.scopes.get(scope)?.get(name),
            None => self.module.get(name),
        }
    }

    /// Binding of `name` in an explicit scope, as the code generator reads it.
    pub fn get_scoped_var(&self, scope: Option<&str>, name: &str) -> Option<&NativeType> {
        match scope {
            Some(scope) => self.scopes.get(scope)?.get(name),
            None => self.module.get(name),
        }
    }

    /// Resolve `name` as code at the current position sees it: local scope,
    /// then enclosing scopes when captured, then module level.
    pub fn lookup(&self, name: &str) -> Option<&NativeType> {
        match self.lookup_owner(name)? {
            Some(scope) => self.scopes.get(&scope)?.get(name),
            None => self.module.get(name),
        }
    }

    /// Replace the binding [`lookup`](Self::lookup) would find. Returns
    /// `false` when `name` is unbound from here.
    pub fn refine_var(&mut self, name: &str, ty: NativeType) -> bool {
        let slot = match self.lookup_owner(name) {
            Some(Some(scope)) => self.scopes.get_mut(&scope).and_then(|b| b.get_mut(name)),
            Some(None) => self.module.get_mut(name),
            None => None,
        };
        match slot {
            Some(slot) => {
                *slot = ty;
                true
            }
            None => false,
        }
    }

    /// Scope holding the binding of `name` visible from here (`Some(None)`
    /// for module level).
    fn lookup_owner(&self, name: &str) -> Option<Option<String>> {
        if let Some(scope) = self.current_scope() {
            if self.scopes.get(scope).is_some_and(|b| b.contains_key(name)) {
                return Some(Some(scope.to_string()));
            }
            let reaches_out = self.captures.get(scope).is_some_and(|c| c.contains(name))
                || self.declared_outer.get(scope).is_some_and(|d| d.contains(name));
            if reaches_out {
                let mut cursor = scope;
                while let Some((parent, _)) = cursor.rsplit_once('.') {
                    if self.scopes.get(parent).is_some_and(|b| b.contains_key(name)) {
                        return Some(Some(parent.to_string()));
                    }
                    cursor = parent;
                }
            }
        }
        self.module.contains_key(name).then_some(None)
    }

    pub fn declare_outer(&mut self, name: &str) {
        if let Some(scope) = self.current_scope().map(str::to_string) {
            self.declared_outer
                .entry(scope)
                .or_default()
                .insert(name.to_string());
        }
    }

    pub fn module_vars(&self) -> &IndexMap<String, NativeType> {
        &self.module
    }

    pub fn scope_vars(&self, scope: &str) -> Option<&IndexMap<String, NativeType>> {
        self.scopes.get(scope)
    }

    pub fn scope_names(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    /// Rewrite every binding of `name` that is a fixed array into a list of
    /// the same element type. Returns how many bindings changed.
    pub fn promote_array(&mut self, name: &str) -> usize {
        std::iter::once(&mut self.module)
            .chain(self.scopes.values_mut())
            .filter_map(|bindings| bindings.get_mut(name))
            .map(promote_in_place)
            .filter(|changed| *changed)
            .count()
    }

    /// Same as [`promote_array`](Self::promote_array) for a class field,
    /// across every class that has it.
    pub fn promote_field(&mut self, field: &str) -> usize {
        self.classes
            .values_mut()
            .filter_map(|class| class.fields.get_mut(field))
            .map(promote_in_place)
            .filter(|changed| *changed)
            .count()
    }

    // ---- class registry ---------------------------------------------------

    pub fn register_class(&mut self, info: ClassInfo) {
        self.classes.insert(info.name.clone(), info);
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    pub fn class_mut(&mut self, name: &str) -> Option<&mut ClassInfo> {
        self.classes.get_mut(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes.values()
    }

    /// Classes in method resolution order for `name`: the class, then its
    /// bases depth-first, each visited once.
    pub fn mro(&self, name: &str) -> Vec<&ClassInfo> {
        let mut order = Vec::new();
        let mut seen = IndexSet::new();
        let mut stack = vec![name];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(info) = self.classes.get(current) {
                order.push(info);
                stack.extend(info.bases.iter().rev().map(String::as_str));
            }
        }
        order
    }

    pub fn class_field(&self, class: &str, field: &str) -> Option<&NativeType> {
        self.mro(class).into_iter().find_map(|c| c.fields.get(field))
    }

    pub fn class_method_return(&self, class: &str, method: &str) -> Option<&NativeType> {
        self.mro(class).into_iter().find_map(|c| c.methods.get(method))
    }

    pub fn is_property(&self, class: &str, method: &str) -> bool {
        self.mro(class)
            .into_iter()
            .find(|c| c.methods.contains_key(method))
            .is_some_and(|c| c.is_property(method))
    }

    // ---- function registry ------------------------------------------------

    pub fn set_function_return(&mut self, name: &str, ty: NativeType) {
        self.function_returns.insert(name.to_string(), ty);
    }

    pub fn set_function_params(&mut self, name: &str, params: Vec<NativeType>) {
        self.function_params.insert(name.to_string(), params);
    }

    pub fn function_return(&self, name: &str) -> Option<&NativeType> {
        self.function_returns.get(name)
    }

    pub fn function_params(&self, name: &str) -> Option<&[NativeType]> {
        self.function_params.get(name).map(Vec::as_slice)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.function_returns.contains_key(name)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.function_returns.keys().map(String::as_str)
    }

    /// Resolve a called name to a registered function: definitions nested in
    /// the current scope first, then in each enclosing scope, then top level.
    pub fn resolve_function(&self, name: &str) -> Option<String> {
        let mut scope = self.current_scope();
        while let Some(s) = scope {
            let candidate = format!("{}.{}", s, name);
            if self.function_returns.contains_key(&candidate) {
                return Some(candidate);
            }
            scope = s.rsplit_once('.').map(|(parent, _)| parent);
        }
        self.function_returns
            .contains_key(name)
            .then(|| name.to_string())
    }

    /// Function type of a registered function, or its closure marker when it
    /// captures variables.
    pub fn function_type(&self, qualified: &str) -> Result<NativeType> {
        let ret = self
            .function_returns
            .get(qualified)
            .ok_or_else(|| ZythError::function_not_found(qualified))?;
        if self.captures.get(qualified).is_some_and(|c| !c.is_empty()) {
            return Ok(NativeType::Closure(qualified.to_string()));
        }
        let params = self.function_params(qualified).unwrap_or_default().to_vec();
        Ok(NativeType::function(params, ret.clone()))
    }

    /// [`NativeType::needs_allocator`] with closures answered by their
    /// registered return type. Unregistered closures, and closures reached
    /// again through their own return, stay `true`.
    pub fn needs_allocator(&self, ty: &NativeType) -> bool {
        self.needs_allocator_seen(ty, &mut Vec::new())
    }

    fn needs_allocator_seen<'a>(&'a self, ty: &'a NativeType, seen: &mut Vec<&'a str>) -> bool {
        match ty {
            NativeType::Closure(name) => {
                if seen.contains(&name.as_str()) {
                    return true;
                }
                seen.push(name.as_str());
                match self.function_returns.get(name) {
                    Some(ret) => self.needs_allocator_seen(ret, seen),
                    None => true,
                }
            }
            NativeType::Function { ret, .. } => self.needs_allocator_seen(ret, seen),
            NativeType::Optional(inner) => self.needs_allocator_seen(inner, seen),
            other => other.needs_allocator(),
        }
    }

    // ---- constructor arguments -------------------------------------------

    /// Merge the argument types of one constructor call site, position by
    /// position.
    pub fn record_constructor_args(&mut self, class: &str, args: Vec<NativeType>) {
        match self.constructor_args.get_mut(class) {
            Some(existing) => {
                for (i, ty) in args.into_iter().enumerate() {
                    match existing.get_mut(i) {
                        Some(slot) => *slot = widen(slot, &ty),
                        None => existing.push(ty),
                    }
                }
            }
            None => {
                self.constructor_args.insert(class.to_string(), args);
            }
        }
    }

    pub fn constructor_args(&self, class: &str) -> Option<&[NativeType]> {
        self.constructor_args.get(class).map(Vec::as_slice)
    }

    // ---- closures and imports --------------------------------------------

    pub fn set_captures(&mut self, function: &str, captures: IndexSet<String>) {
        self.captures.insert(function.to_string(), captures);
    }

    pub fn captures(&self, function: &str) -> Option<&IndexSet<String>> {
        self.captures.get(function)
    }

    pub fn add_import(&mut self, alias: &str, target: &str) {
        self.imports.insert(alias.to_string(), target.to_string());
    }

    pub fn import_target(&self, alias: &str) -> Option<&str> {
        self.imports.get(alias).map(String::as_str)
    }

    /// Serialize the final environment for the code generator.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn promote_in_place(ty: &mut NativeType) -> bool {
    if let NativeType::Array { elem, .. } = ty {
        *ty = NativeType::List(elem.clone());
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_allocator_follows_registered_return() {
        let mut env = TypeEnvironment::new();
        env.set_function_return("outer.count", NativeType::Int);
        env.set_function_return("outer.name", NativeType::string());
        env.set_function_return("loop.again", NativeType::Closure("loop.again".to_string()));

        assert!(!env.needs_allocator(&NativeType::Closure("outer.count".to_string())));
        assert!(env.needs_allocator(&NativeType::Closure("outer.name".to_string())));
        assert!(env.needs_allocator(&NativeType::Closure("missing".to_string())));
        assert!(env.needs_allocator(&NativeType::Closure("loop.again".to_string())));
        assert!(!env.needs_allocator(&NativeType::optional(NativeType::Closure(
            "outer.count".to_string()
        ))));
        assert!(env.needs_allocator(&NativeType::list(NativeType::Int)));
    }

    #[test]
    fn test_sibling_scopes_are_isolated() {
        let mut env = TypeEnvironment::new();
        env.with_scope("f", |env| env.put_var("x", NativeType::Int));
        env.with_scope("g", |env| {
            assert_eq!(env.lookup("x"), None);
            env.put_var("x", NativeType::string());
        });
        assert_eq!(env.get_scoped_var(Some("f"), "x"), Some(&NativeType::Int));
        assert_eq!(env.get_scoped_var(Some("g"), "x"), Some(&NativeType::string()));
        assert_eq!(env.get_scoped_var(None, "x"), None);
    }

    #[test]
    fn test_widen_var_merges_reassignments() {
        let mut env = TypeEnvironment::new();
        env.with_scope("f", |env| {
            env.widen_var("n", NativeType::Int);
            env.widen_var("n", NativeType::Float);
            assert_eq!(env.get_var("n"), Some(&NativeType::Float));
        });
    }

    #[test]
    fn test_module_bindings_are_visible_in_functions() {
        let mut env = TypeEnvironment::new();
        env.put_var("LIMIT", NativeType::Int);
        env.with_scope("f", |env| {
            assert_eq!(env.lookup("LIMIT"), Some(&NativeType::Int));
            assert_eq!(env.get_var("LIMIT"), None);
        });
    }

    #[test]
    fn test_captured_names_reach_enclosing_scope() {
        let mut env = TypeEnvironment::new();
        env.with_scope("outer", |env| env.put_var("y", NativeType::Float));
        env.set_captures("outer.inner", IndexSet::from(["y".to_string()]));
        env.enter_scope("outer.inner");
        assert_eq!(env.lookup("y"), Some(&NativeType::Float));
        env.exit_scope();

        env.with_scope("outer.other", |env| assert_eq!(env.lookup("y"), None));
    }

    #[test]
    fn test_refine_var_writes_where_the_name_lives() {
        let mut env = TypeEnvironment::new();
        env.put_var("xs", NativeType::list(NativeType::Unknown));
        env.with_scope("grow", |env| {
            assert!(env.refine_var("xs", NativeType::list(NativeType::Int)));
            assert!(!env.refine_var("missing", NativeType::Int));
        });
        assert_eq!(
            env.get_scoped_var(None, "xs"),
            Some(&NativeType::list(NativeType::Int))
        );
        assert_eq!(env.scope_vars("grow"), None);
    }

    #[test]
    fn test_global_declaration_writes_module_binding() {
        let mut env = TypeEnvironment::new();
        env.with_scope("bump", |env| {
            env.declare_outer("counter");
            env.widen_var("counter", NativeType::Int);
        });
        assert_eq!(env.get_scoped_var(None, "counter"), Some(&NativeType::Int));
        assert_eq!(env.get_scoped_var(Some("bump"), "counter"), None);
    }

    #[test]
    fn test_with_scope_restores_stack() {
        let mut env = TypeEnvironment::new();
        env.with_scope("f", |env| {
            env.enter_scope("f.g");
            env.enter_scope("f.g.h");
        });
        assert_eq!(env.current_scope(), None);
    }

    #[test]
    fn test_resolve_function_prefers_nested_definitions() {
        let mut env = TypeEnvironment::new();
        env.set_function_return("helper", NativeType::Int);
        env.set_function_return("outer.helper", NativeType::string());
        env.with_scope("outer", |env| {
            assert_eq!(env.resolve_function("helper").as_deref(), Some("outer.helper"));
        });
        assert_eq!(env.resolve_function("helper").as_deref(), Some("helper"));
        assert_eq!(env.resolve_function("missing"), None);
    }

    #[test]
    fn test_function_type_and_closures() {
        let mut env = TypeEnvironment::new();
        env.set_function_return("add", NativeType::Int);
        env.set_function_params("add", vec![NativeType::Int, NativeType::Int]);
        assert_eq!(
            env.function_type("add").unwrap(),
            NativeType::function(vec![NativeType::Int, NativeType::Int], NativeType::Int)
        );

        env.set_function_return("outer.inner", NativeType::Int);
        env.set_captures("outer.inner", IndexSet::from(["y".to_string()]));
        assert_eq!(
            env.function_type("outer.inner").unwrap(),
            NativeType::Closure("outer.inner".into())
        );
        assert!(env.function_type("nope").is_err());
    }

    #[test]
    fn test_inherited_lookups() {
        let mut env = TypeEnvironment::new();
        let mut base = ClassInfo::new("Shape");
        base.set_field("name", NativeType::string());
        base.set_method_return("area", NativeType::Float);
        base.mark_property("area");
        env.register_class(base);
        env.register_class(ClassInfo::new("Square").with_bases(vec!["Shape".into()]));

        assert_eq!(env.class_field("Square", "name"), Some(&NativeType::string()));
        assert_eq!(env.class_method_return("Square", "area"), Some(&NativeType::Float));
        assert!(env.is_property("Square", "area"));
        assert_eq!(env.class_field("Square", "missing"), None);
    }

    #[test]
    fn test_constructor_args_widen_by_position() {
        let mut env = TypeEnvironment::new();
        env.record_constructor_args("P", vec![NativeType::Int]);
        env.record_constructor_args("P", vec![NativeType::Float, NativeType::Bool]);
        assert_eq!(
            env.constructor_args("P"),
            Some(&[NativeType::Float, NativeType::Bool][..])
        );
    }

    #[test]
    fn test_promote_array_in_every_scope() {
        let mut env = TypeEnvironment::new();
        env.put_var("xs", NativeType::array(NativeType::Int, 3));
        env.with_scope("f", |env| env.put_var("xs", NativeType::array(NativeType::Int, 2)));
        env.with_scope("g", |env| env.put_var("xs", NativeType::Int));

        assert_eq!(env.promote_array("xs"), 2);
        assert_eq!(
            env.get_scoped_var(Some("f"), "xs"),
            Some(&NativeType::list(NativeType::Int))
        );
        assert_eq!(env.get_scoped_var(Some("g"), "xs"), Some(&NativeType::Int));
    }

    #[test]
    fn test_to_json_contains_registries() {
        let mut env = TypeEnvironment::new();
        env.put_var("x", NativeType::Int);
        env.set_function_return("main", NativeType::None);
        let json = env.to_json().unwrap();
        assert!(json.contains("\"function_returns\""));
        assert!(json.contains("\"main\""));
    }
}
