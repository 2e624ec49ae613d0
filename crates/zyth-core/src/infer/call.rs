//! Call resolution
//!
//! Every call shape funnels through one of three entry points: a call on a
//! bare name, a call on an attribute (methods and module functions), or a
//! call of any other callee. Each walks a fixed dispatch order and falls
//! back to [`NativeType::Unknown`] when nothing matches.

use tracing::trace;

use super::builtins::{builtin_function, builtin_method, is_exception_name};
use super::{stdlib, Inferencer};
use crate::hir::HirExpr;
use crate::types::{widen_all, NativeType};

impl Inferencer<'_> {
    /// `name(args)`: class construction, user function, function-valued
    /// variable, `super()`, imported function, builtin, builtin exception.
    pub(crate) fn call_type(&mut self, func: &str, args: &[HirExpr], kwargs: &[(String, HirExpr)]) -> NativeType {
        let arg_types: Vec<NativeType> = args.iter().map(|a| self.infer_expr(a)).collect();
        let kwarg_types: Vec<NativeType> = kwargs.iter().map(|(_, v)| self.infer_expr(v)).collect();

        if self.env.is_class(func) && !self.is_bound(func) {
            return NativeType::instance(func);
        }
        if !self.is_bound(func) {
            if let Some(qualified) = self.env.resolve_function(func) {
                return self.env.function_return(&qualified).cloned().unwrap_or_default();
            }
        }
        match self.lookup_name(func) {
            NativeType::Function { ret, .. } => return *ret,
            NativeType::Closure(name) => return self.env.function_return(&name).cloned().unwrap_or_default(),
            NativeType::Instance(class) => {
                return self
                    .env
                    .class_method_return(&class, "__call__")
                    .cloned()
                    .unwrap_or_default();
            }
            _ => {}
        }
        if func == "super" {
            return self
                .current_class()
                .and_then(|class| self.env.class(class))
                .and_then(|info| info.bases.first())
                .map(NativeType::instance)
                .unwrap_or_default();
        }
        if let Some(target) = self.env.import_target(func) {
            if let Some((module, name)) = target.rsplit_once('.') {
                if let Some(rule) = stdlib::module_function(module, name) {
                    return rule.apply(&arg_types, args);
                }
            }
        }
        if func == "dict" && args.is_empty() && !kwargs.is_empty() {
            return NativeType::dict(NativeType::string(), widen_all(kwarg_types.iter()).into_owned());
        }
        if let Some(rule) = builtin_function(func) {
            return rule.apply(&arg_types, args);
        }
        if is_exception_name(func) {
            return NativeType::exception(func);
        }
        trace!(callee = func, "call resolves to unknown");
        NativeType::Unknown
    }

    /// `object.method(args)`: `super()` methods, module functions and static
    /// methods through a dotted name, then dispatch on the receiver's type.
    pub(crate) fn method_call_type(&mut self, object: &HirExpr, method: &str, args: &[HirExpr]) -> NativeType {
        let arg_types: Vec<NativeType> = args.iter().map(|a| self.infer_expr(a)).collect();

        if let HirExpr::Call { func, .. } = object {
            if func == "super" && !self.is_bound("super") {
                return self.super_method_return(method).unwrap_or_default();
            }
        }

        if let Some(dotted) = object.dotted_name() {
            if let Some(module) = self.module_path(&dotted) {
                let qualified = format!("{}.{}", module, method);
                if let Some(ret) = self.env.function_return(&qualified) {
                    return ret.clone();
                }
                if let Some(rule) = stdlib::module_function(&module, method) {
                    return rule.apply(&arg_types, args);
                }
                trace!(function = %qualified, "module call resolves to unknown");
                return NativeType::Unknown;
            }
            // `Class.method(...)` and other dotted names already registered.
            let head = dotted.split('.').next().unwrap_or_default();
            if !self.is_bound(head) {
                if let Some(ret) = self.env.function_return(&format!("{}.{}", dotted, method)) {
                    return ret.clone();
                }
            }
        }

        let receiver = match self.infer_expr(object) {
            NativeType::Optional(inner) => *inner,
            other => other,
        };
        if let Some(ty) = builtin_method(&receiver, method, &arg_types) {
            return ty;
        }
        let resolved = match &receiver {
            NativeType::Library(lib) => stdlib::library_method(lib, method),
            NativeType::Instance(class) => self.instance_method_return(class, method),
            _ => None,
        };
        resolved.unwrap_or_else(|| {
            trace!(method, receiver = %receiver, "method call resolves to unknown");
            NativeType::Unknown
        })
    }

    /// Call of a computed callee such as `handlers[0](x)`.
    pub(crate) fn dynamic_call_type(&mut self, callee: &HirExpr, args: &[HirExpr]) -> NativeType {
        for arg in args {
            self.infer_expr(arg);
        }
        match self.infer_expr(callee) {
            NativeType::Function { ret, .. } => *ret,
            NativeType::Closure(name) => self.env.function_return(&name).cloned().unwrap_or_default(),
            NativeType::Instance(class) => self
                .env
                .class_method_return(&class, "__call__")
                .cloned()
                .unwrap_or_default(),
            _ => NativeType::Unknown,
        }
    }

    /// A method's return type, or the return type of a callable stored in a
    /// field (`self.handler(x)`).
    fn instance_method_return(&self, class: &str, method: &str) -> Option<NativeType> {
        if let Some(ret) = self.env.class_method_return(class, method) {
            return Some(ret.clone());
        }
        match self.env.class_field(class, method)? {
            NativeType::Function { ret, .. } => Some(ret.as_ref().clone()),
            NativeType::Closure(name) => self.env.function_return(name).cloned(),
            _ => None,
        }
    }

    fn super_method_return(&self, method: &str) -> Option<NativeType> {
        let class = self.env.class(self.current_class()?)?;
        class
            .bases
            .iter()
            .find_map(|base| self.env.class_method_return(base, method))
            .cloned()
    }
}
