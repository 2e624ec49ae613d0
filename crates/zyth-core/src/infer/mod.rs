//! Expression and statement inference
//!
//! [`Inferencer`] walks HIR under the scope discipline of
//! [`TypeEnvironment`] and writes what it learns back into it. Expression
//! inference lives in `expr`, call resolution in `call` (with the static
//! tables in `builtins` and `stdlib`), and statement/function/class
//! visiting in `stmt`.

pub mod builtins;
mod call;
mod expr;
pub mod stdlib;
mod stmt;

use indexmap::IndexMap;

use crate::config::InferenceConfig;
use crate::env::TypeEnvironment;
use crate::types::NativeType;

pub struct Inferencer<'a> {
    env: &'a mut TypeEnvironment,
    config: &'a InferenceConfig,
    /// Names private to a comprehension or lambda, innermost last.
    overlays: Vec<IndexMap<String, NativeType>>,
    /// Enclosing class definitions, innermost last.
    classes: Vec<String>,
}

impl<'a> Inferencer<'a> {
    pub fn new(env: &'a mut TypeEnvironment, config: &'a InferenceConfig) -> Self {
        Self {
            env,
            config,
            overlays: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn env(&self) -> &TypeEnvironment {
        self.env
    }

    pub(crate) fn env_mut(&mut self) -> &mut TypeEnvironment {
        self.env
    }

    /// Run `f` in the scope `name`, restoring the scope stack afterwards.
    pub(crate) fn in_scope<R>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        let depth = self.env.scope_depth();
        self.env.enter_scope(name);
        let result = f(self);
        self.env.restore_scope_depth(depth);
        result
    }

    pub(crate) fn in_class<R>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        let depth = self.classes.len();
        self.classes.push(name.to_string());
        let result = f(self);
        self.classes.truncate(depth);
        result
    }

    pub(crate) fn with_overlay<R>(
        &mut self,
        bindings: IndexMap<String, NativeType>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let depth = self.overlays.len();
        self.overlays.push(bindings);
        let result = f(self);
        self.overlays.truncate(depth);
        result
    }

    pub(crate) fn current_class(&self) -> Option<&str> {
        self.classes.last().map(String::as_str)
    }

    /// Whether `name` is bound as a value at the current position.
    pub(crate) fn is_bound(&self, name: &str) -> bool {
        self.overlays.iter().any(|o| o.contains_key(name)) || self.env.lookup(name).is_some()
    }

    /// Type of a bare name: comprehension and lambda bindings, then scoped
    /// variables, then functions defined in scope. Unbound names are unknown.
    pub fn lookup_name(&self, name: &str) -> NativeType {
        if let Some(ty) = self.overlays.iter().rev().find_map(|o| o.get(name)) {
            return ty.clone();
        }
        if let Some(ty) = self.env.lookup(name) {
            return ty.clone();
        }
        if let Some(qualified) = self.env.resolve_function(name) {
            if let Ok(ty) = self.env.function_type(&qualified) {
                return ty;
            }
        }
        NativeType::Unknown
    }

    /// Fully qualified module path for a dotted name whose first segment is
    /// an imported alias or a known module, e.g. `np.linalg` to
    /// `numpy.linalg`. `None` when the first segment is a bound value.
    pub(crate) fn module_path(&self, dotted: &str) -> Option<String> {
        let (head, rest) = match dotted.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (dotted, None),
        };
        if self.is_bound(head) {
            return None;
        }
        let base = match self.env.import_target(head) {
            Some(target) => target.to_string(),
            None if stdlib::is_known_module(head) || matches!(head, "string" | "sys" | "os") => {
                head.to_string()
            }
            None => return None,
        };
        Some(match rest {
            Some(rest) => format!("{}.{}", base, rest),
            None => base,
        })
    }
}
