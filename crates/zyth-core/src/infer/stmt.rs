//! Statement, function and class visiting
//!
//! Statements write what they learn into the environment: assignments widen
//! bindings and class fields, mutating method calls refine container
//! element types, imports fill the alias table. Function visits bind
//! parameters, sweep the body, recurse into nested functions and finally
//! record the inferred return type.

use std::sync::LazyLock;

use super::expr::destructure;
use super::{stdlib, Inferencer};
use crate::analysis::closure::nested_functions;
use crate::analysis::mutations::LIST_MUTATING_METHODS;
use crate::analysis::MutationRegistry;
use crate::hir::{AssignTarget, HirClass, HirExpr, HirFunction, HirStmt, Literal};
use crate::types::{parse_annotation, widen, widen_all, NativeType};

static MUTATIONS: LazyLock<MutationRegistry> = LazyLock::new(MutationRegistry::new);

impl Inferencer<'_> {
    /// Visit `body` in order. Function and class definitions are skipped;
    /// callers visit those explicitly.
    pub fn visit_block(&mut self, body: &[HirStmt]) {
        for stmt in body {
            self.visit_stmt(stmt);
        }
    }

    pub fn visit_stmt(&mut self, stmt: &HirStmt) {
        match stmt {
            HirStmt::Assign { targets, value } => {
                let ty = self.infer_expr(value);
                for target in targets {
                    self.assign_target(target, ty.clone());
                }
            }
            HirStmt::AnnAssign {
                target,
                annotation,
                value,
            } => {
                let declared = self.annotation_type(Some(annotation));
                let ty = match value {
                    Some(value) => {
                        let inferred = self.infer_expr(value);
                        if declared.is_unknown() {
                            inferred
                        } else {
                            declared
                        }
                    }
                    None => declared,
                };
                self.assign_target(target, ty);
            }
            HirStmt::AugAssign { target, op, value } => {
                let current = self.target_type(target);
                let rhs = self.infer_expr(value);
                let ty = self.binary_type(*op, &current, &rhs);
                self.assign_target(target, ty);
            }
            HirStmt::Expr(expr) => {
                self.infer_expr(expr);
                if let HirExpr::MethodCall {
                    object,
                    method,
                    args,
                    ..
                } = expr
                {
                    self.apply_mutation(object, method, args);
                }
            }
            HirStmt::Return(value) | HirStmt::Raise(value) => {
                if let Some(value) = value {
                    self.infer_expr(value);
                }
            }
            HirStmt::If {
                condition,
                then_body,
                else_body,
            } => {
                self.infer_expr(condition);
                self.visit_block(then_body);
                self.visit_block(else_body);
            }
            HirStmt::While {
                condition,
                body,
                orelse,
            } => {
                self.infer_expr(condition);
                self.visit_block(body);
                self.visit_block(orelse);
            }
            HirStmt::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let item = self.iteration_item(iter);
                self.assign_target(target, item);
                self.visit_block(body);
                self.visit_block(orelse);
            }
            HirStmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                self.visit_block(body);
                for handler in handlers {
                    if let Some(name) = &handler.name {
                        let class = handler.exception.as_deref().unwrap_or("Exception");
                        self.env.widen_var(name, NativeType::exception(class));
                    }
                    self.visit_block(&handler.body);
                }
                self.visit_block(orelse);
                self.visit_block(finalbody);
            }
            HirStmt::With { items, body } => {
                for item in items {
                    let context = self.infer_expr(&item.context);
                    let entered = self.entered_type(context);
                    if let Some(target) = &item.target {
                        self.assign_target(target, entered);
                    }
                }
                self.visit_block(body);
            }
            HirStmt::Assert { test, msg } => {
                self.infer_expr(test);
                if let Some(msg) = msg {
                    self.infer_expr(msg);
                }
            }
            HirStmt::Import(_) | HirStmt::ImportFrom { .. } => self.register_imports(stmt),
            HirStmt::Global(names) | HirStmt::Nonlocal(names) => {
                for name in names {
                    self.env.declare_outer(name);
                }
            }
            HirStmt::FunctionDef(_)
            | HirStmt::ClassDef(_)
            | HirStmt::Delete(_)
            | HirStmt::Pass
            | HirStmt::Break
            | HirStmt::Continue => {}
        }
    }

    /// Record the aliases an import statement introduces.
    pub(crate) fn register_imports(&mut self, stmt: &HirStmt) {
        match stmt {
            HirStmt::Import(names) => {
                for import in names {
                    match &import.alias {
                        Some(alias) => self.env.add_import(alias, &import.name),
                        None => {
                            // `import os.path` binds `os`.
                            let head = import.name.split('.').next().unwrap_or(&import.name);
                            self.env.add_import(head, head);
                        }
                    }
                }
            }
            HirStmt::ImportFrom { module, names } => {
                for import in names {
                    let alias = import.alias.as_deref().unwrap_or(&import.name);
                    self.env.add_import(alias, &format!("{}.{}", module, import.name));
                }
            }
            _ => {}
        }
    }

    /// Type a declared annotation stands for, honoring `use_annotations`.
    pub(crate) fn annotation_type(&self, annotation: Option<&String>) -> NativeType {
        match annotation {
            Some(text) if self.config.use_annotations => parse_annotation(text),
            _ => NativeType::Unknown,
        }
    }

    /// Current type of what an assignment target names.
    fn target_type(&mut self, target: &AssignTarget) -> NativeType {
        match target {
            AssignTarget::Symbol(name) => self.lookup_name(name),
            AssignTarget::Attribute { value, attr } => self.infer_expr(&HirExpr::Attribute {
                value: value.clone(),
                attr: attr.clone(),
            }),
            AssignTarget::Index { base, index } => {
                let base = self.infer_expr(base);
                self.index_type(&base, index)
            }
            AssignTarget::Tuple(_) | AssignTarget::Starred(_) => NativeType::Unknown,
        }
    }

    pub(crate) fn assign_target(&mut self, target: &AssignTarget, ty: NativeType) {
        for (leaf, ty) in destructure(target, ty) {
            match leaf {
                AssignTarget::Symbol(name) => self.env.widen_var(name, ty),
                AssignTarget::Attribute { value, attr } => self.assign_attribute(value, attr, ty),
                AssignTarget::Index { base, index } => self.assign_subscript(base, index, ty),
                AssignTarget::Tuple(_) | AssignTarget::Starred(_) => {}
            }
        }
    }

    fn assign_attribute(&mut self, value: &HirExpr, attr: &str, ty: NativeType) {
        if let NativeType::Instance(class) = self.infer_expr(value) {
            let owner = self.field_owner(&class, attr);
            if let Some(info) = self.env.class_mut(&owner) {
                info.widen_field(attr, ty.into_owned());
            }
        }
    }

    /// `d[k] = v` and `xs[i] = v` refine the container's key and element
    /// types. A string key on an unknown receiver makes it a dict.
    fn assign_subscript(&mut self, base: &HirExpr, index: &HirExpr, value: NativeType) {
        let current = self.infer_expr(base);
        let refined = match &current {
            NativeType::Dict { key, value: existing } => {
                let key_ty = self.infer_expr(index);
                NativeType::dict(
                    widen(key, &key_ty).into_owned(),
                    widen(existing, &value).into_owned(),
                )
            }
            NativeType::List(elem) => NativeType::list(widen(elem, &value).into_owned()),
            NativeType::Unknown if matches!(index, HirExpr::Literal(Literal::String(_))) => {
                NativeType::dict(NativeType::string(), value.into_owned())
            }
            _ => return,
        };
        if refined != current {
            self.write_back(base, refined);
        }
    }

    /// A list-mutating call on a fixed array grows it, so the receiver is
    /// rewritten to a list before the handler runs. Everything that reads
    /// the binding afterwards, returns included, sees the list.
    fn apply_mutation(&mut self, object: &HirExpr, method: &str, args: &[HirExpr]) {
        let current = self.infer_expr(object);
        let arg_types: Vec<NativeType> = args.iter().map(|a| self.infer_expr(a)).collect();
        let receiver = match &current {
            NativeType::Array { elem, .. }
                if self.config.promote_mutated_arrays && LIST_MUTATING_METHODS.contains(&method) =>
            {
                NativeType::List(elem.clone())
            }
            _ => current.clone(),
        };
        let refined = MUTATIONS
            .compute_mutation_type(&receiver, method, &arg_types)
            .unwrap_or(receiver);
        if refined != current {
            self.write_back(object, refined);
        }
    }

    /// Replace the type of a variable or instance field in place.
    fn write_back(&mut self, target: &HirExpr, ty: NativeType) {
        match target {
            HirExpr::Var(name) => {
                self.env.refine_var(name, ty);
            }
            HirExpr::Attribute { value, attr } => {
                if let NativeType::Instance(class) = self.infer_expr(value) {
                    let owner = self.field_owner(&class, attr);
                    if let Some(info) = self.env.class_mut(&owner) {
                        info.set_field(attr, ty);
                    }
                }
            }
            _ => {}
        }
    }

    /// The class in `class`'s hierarchy that declares `field`, or `class`
    /// itself for a new field.
    fn field_owner(&self, class: &str, field: &str) -> String {
        self.env
            .mro(class)
            .into_iter()
            .find(|info| info.fields.contains_key(field))
            .map(|info| info.name.clone())
            .unwrap_or_else(|| class.to_string())
    }

    /// What `with ctx as target` binds.
    fn entered_type(&self, context: NativeType) -> NativeType {
        let entered = match &context {
            NativeType::Instance(class) => self.env.class_method_return(class, "__enter__").cloned(),
            NativeType::Library(lib) => stdlib::library_method(lib, "__enter__"),
            _ => None,
        };
        entered.unwrap_or(context)
    }

    /// Bind parameters in the current scope and return their types,
    /// excluding the receiver of a method.
    fn bind_params(&mut self, func: &HirFunction, class: Option<&str>) -> Vec<NativeType> {
        let receiver = class.filter(|_| !func.is_staticmethod() && !func.params.is_empty());
        let skip = usize::from(receiver.is_some());
        let ctor_args: Option<Vec<NativeType>> = match class {
            Some(class) if func.name == "__init__" => self.env.constructor_args(class).map(<[_]>::to_vec),
            _ => None,
        };

        let mut types = Vec::with_capacity(func.params.len());
        for (i, param) in func.params.iter().enumerate() {
            if let (Some(class), 0) = (receiver, i) {
                self.env.put_var(&param.name, NativeType::instance(class));
                continue;
            }
            let mut ty = self.annotation_type(param.annotation.as_ref());
            if ty.is_unknown() {
                if let Some(default) = &param.default {
                    ty = self.infer_expr(default).into_owned();
                }
            }
            if ty.is_unknown() || ty == NativeType::None {
                if let Some(arg) = ctor_args.as_ref().and_then(|args| args.get(i - skip)) {
                    ty = widen(&ty, arg).into_owned();
                }
            }
            self.env.put_var(&param.name, ty.clone());
            types.push(ty);
        }
        types
    }

    /// Visit one function under the scope `qualified`. Nested functions are
    /// visited between two sweeps of the body, so the enclosing function's
    /// return type sees their inferred types.
    pub fn visit_function(&mut self, func: &HirFunction, qualified: &str, class: Option<&str>) {
        self.in_scope(qualified, |inf| {
            let params = inf.bind_params(func, class);
            inf.env.set_function_params(qualified, params);

            inf.visit_block(&func.body);
            let nested = nested_functions(&func.body);
            if !nested.is_empty() {
                for inner in &nested {
                    inf.visit_function(inner, &format!("{}.{}", qualified, inner.name), None);
                }
                inf.visit_block(&func.body);
            }

            let declared = inf.annotation_type(func.return_annotation.as_ref());
            if inf.config.infer_return_types && declared.is_unknown() {
                let mut returns = Vec::new();
                inf.collect_returns(&func.body, &mut returns);
                let ret = if returns.is_empty() {
                    NativeType::None
                } else {
                    widen_all(returns.iter()).into_owned()
                };
                inf.env.set_function_return(qualified, ret.clone());
                if let Some(info) = class.and_then(|c| inf.env.class_mut(c)) {
                    info.set_method_return(&func.name, ret);
                }
            }
        });
    }

    fn collect_returns(&mut self, body: &[HirStmt], out: &mut Vec<NativeType>) {
        for stmt in body {
            match stmt {
                HirStmt::Return(Some(value)) => {
                    let ty = self.infer_expr(value);
                    out.push(ty);
                }
                HirStmt::Return(None) => out.push(NativeType::None),
                HirStmt::FunctionDef(_) | HirStmt::ClassDef(_) => continue,
                _ => {}
            }
            for block in stmt.child_blocks() {
                self.collect_returns(block, out);
            }
        }
    }

    /// Register class-level attributes, then visit `__init__` before the
    /// other methods so their bodies see the constructor's fields.
    pub fn visit_class(&mut self, class: &HirClass) {
        self.in_class(&class.name, |inf| {
            for stmt in &class.body {
                let (name, ty) = match stmt {
                    HirStmt::AnnAssign {
                        target: AssignTarget::Symbol(name),
                        annotation,
                        value,
                    } => {
                        let mut ty = inf.annotation_type(Some(annotation));
                        if let (true, Some(value)) = (ty.is_unknown(), value) {
                            ty = inf.infer_expr(value);
                        }
                        (name, ty)
                    }
                    HirStmt::Assign { targets, value } => match targets.as_slice() {
                        [AssignTarget::Symbol(name)] => (name, inf.infer_expr(value)),
                        _ => continue,
                    },
                    _ => continue,
                };
                if let Some(info) = inf.env.class_mut(&class.name) {
                    info.widen_field(name, ty.into_owned());
                }
            }

            let init = class.methods().filter(|m| m.name == "__init__");
            let rest = class.methods().filter(|m| m.name != "__init__");
            for method in init.chain(rest) {
                let qualified = format!("{}.{}", class.name, method.name);
                inf.visit_function(method, &qualified, Some(&class.name));
            }
        });
    }
}
