//! Mutation tracking
//!
//! Two halves:
//! - [`MutationRegistry`] refines a container's element type when a
//!   mutating method is called on it (`xs = []` then `xs.append("a")`
//!   gives a list of strings). Each method has its own handler.
//! - [`MutationAnalyzer`] scans a whole unit once and records, per variable
//!   name, which mutations happen to it anywhere. The orchestrator uses it
//!   to promote fixed arrays that are grown or shrunk into lists.

mod dict;
mod list;
mod set;

pub use dict::{DictShapePreserving, DictUpdateMutation, SetDefaultMutation};
pub use list::{AppendMutation, ExtendMutation, InsertMutation, ShapePreservingMutation, LIST_MUTATING_METHODS};
pub use set::{AddMutation, SetShapePreserving, SetUpdateMutation};

use indexmap::IndexMap;

use crate::hir::{AssignTarget, HirExpr, HirModule, HirStmt};
use crate::types::{widen, NativeType};

/// A handler for one mutating method.
pub trait MutationHandler {
    /// The method name this handler responds to (e.g. "append", "add").
    fn method_name(&self) -> &'static str;

    fn applies_to(&self, method: &str) -> bool {
        method == self.method_name()
    }

    /// The receiver's type after the call, or `None` when the handler does
    /// not apply to a receiver of this type. `args` are the already inferred
    /// argument types.
    fn compute_type(&self, current: &NativeType, args: &[NativeType]) -> Option<NativeType>;
}

/// Registry of all mutation handlers
pub struct MutationRegistry {
    handlers: Vec<Box<dyn MutationHandler + Send + Sync>>,
}

impl MutationRegistry {
    pub fn new() -> Self {
        let mut registry = Self { handlers: Vec::new() };

        registry.register(Box::new(AppendMutation));
        registry.register(Box::new(ExtendMutation));
        registry.register(Box::new(InsertMutation));
        registry.register(Box::new(list::POP));
        registry.register(Box::new(list::REMOVE));
        registry.register(Box::new(list::CLEAR));
        registry.register(Box::new(list::SORT));
        registry.register(Box::new(list::REVERSE));

        registry.register(Box::new(AddMutation));
        registry.register(Box::new(SetUpdateMutation));
        registry.register(Box::new(set::DISCARD));
        registry.register(Box::new(set::REMOVE));
        registry.register(Box::new(set::POP));
        registry.register(Box::new(set::CLEAR));
        registry.register(Box::new(set::DIFFERENCE_UPDATE));
        registry.register(Box::new(set::INTERSECTION_UPDATE));

        registry.register(Box::new(DictUpdateMutation));
        registry.register(Box::new(SetDefaultMutation));
        registry.register(Box::new(dict::POP));
        registry.register(Box::new(dict::POPITEM));
        registry.register(Box::new(dict::CLEAR));

        registry
    }

    pub fn register(&mut self, handler: Box<dyn MutationHandler + Send + Sync>) {
        self.handlers.push(handler);
    }

    /// New receiver type after `method(args)`, if the call mutates it.
    pub fn compute_mutation_type(
        &self,
        current: &NativeType,
        method: &str,
        args: &[NativeType],
    ) -> Option<NativeType> {
        self.handlers
            .iter()
            .filter(|h| h.applies_to(method))
            .find_map(|h| h.compute_type(current, args))
            .or_else(|| Self::handle_unknown_container(current, method, args))
    }

    /// A receiver of unknown type mutated with list or set methods becomes
    /// that container.
    fn handle_unknown_container(
        current: &NativeType,
        method: &str,
        args: &[NativeType],
    ) -> Option<NativeType> {
        if !current.is_unknown() {
            return None;
        }
        let first = args.first().cloned().unwrap_or_default();
        match method {
            "append" => Some(NativeType::list(first.into_owned())),
            "extend" => Some(NativeType::list(first.iter_element().into_owned())),
            "insert" => Some(NativeType::list(
                args.get(1).cloned().unwrap_or_default().into_owned(),
            )),
            "add" | "discard" => Some(NativeType::set(first.into_owned())),
            "update" => match first {
                dict @ NativeType::Dict { .. } => Some(dict.into_owned()),
                other => Some(NativeType::set(other.iter_element().into_owned())),
            },
            _ => None,
        }
    }
}

impl Default for MutationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge a container's current element type with a newly observed one.
pub fn refine_element_type(current: &NativeType, new: &NativeType) -> NativeType {
    widen(current, new)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// A list-mutating method: append, pop, extend, insert, remove, clear,
    /// sort, reverse.
    ListMethod(&'static str),
    SubscriptAssign,
    AugAssign,
    Reassign,
}

impl MutationKind {
    pub fn is_list_mutation(&self) -> bool {
        matches!(self, MutationKind::ListMethod(_))
    }

    fn list_method(method: &str) -> Option<Self> {
        LIST_MUTATING_METHODS
            .iter()
            .find(|m| **m == method)
            .map(|m| MutationKind::ListMethod(*m))
    }
}

/// Per-name mutation events for a whole unit. Names are plain variable
/// names, or `self.field` for instance attributes.
#[derive(Debug, Clone, Default)]
pub struct MutationAnalyzer {
    events: IndexMap<String, Vec<MutationKind>>,
}

impl MutationAnalyzer {
    pub fn analyze(module: &HirModule) -> Self {
        let mut analyzer = Self::default();
        analyzer.scan_block(&module.body);
        analyzer
    }

    pub fn has_list_mutation(&self, name: &str) -> bool {
        self.events
            .get(name)
            .is_some_and(|events| events.iter().any(MutationKind::is_list_mutation))
    }

    pub fn events(&self, name: &str) -> &[MutationKind] {
        self.events.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Names with at least one list mutation.
    pub fn list_mutated(&self) -> impl Iterator<Item = &str> {
        self.events
            .iter()
            .filter(|(_, events)| events.iter().any(MutationKind::is_list_mutation))
            .map(|(name, _)| name.as_str())
    }

    fn record(&mut self, name: String, kind: MutationKind) {
        self.events.entry(name).or_default().push(kind);
    }

    fn scan_block(&mut self, body: &[HirStmt]) {
        for stmt in body {
            self.scan_stmt(stmt);
        }
    }

    fn scan_stmt(&mut self, stmt: &HirStmt) {
        match stmt {
            HirStmt::Assign { targets, .. } => {
                for target in targets {
                    self.scan_store(target, MutationKind::Reassign);
                }
            }
            HirStmt::AnnAssign { target, .. } => self.scan_store(target, MutationKind::Reassign),
            HirStmt::AugAssign { target, .. } => self.scan_store(target, MutationKind::AugAssign),
            HirStmt::FunctionDef(func) => self.scan_block(&func.body),
            HirStmt::ClassDef(class) => self.scan_block(&class.body),
            _ => {}
        }
        for expr in stmt.expressions() {
            self.scan_expr(expr);
        }
        for block in stmt.child_blocks() {
            self.scan_block(block);
        }
    }

    fn scan_store(&mut self, target: &AssignTarget, kind: MutationKind) {
        match target {
            AssignTarget::Symbol(name) => {
                if kind == MutationKind::AugAssign || self.events.contains_key(name) {
                    self.record(name.clone(), kind);
                } else {
                    // First binding is not a mutation, but makes the name known.
                    self.events.entry(name.clone()).or_default();
                }
            }
            AssignTarget::Index { base, .. } => {
                if let Some(name) = receiver_name(base) {
                    self.record(name, MutationKind::SubscriptAssign);
                }
            }
            AssignTarget::Tuple(items) => {
                for item in items {
                    self.scan_store(item, kind.clone());
                }
            }
            AssignTarget::Starred(inner) => self.scan_store(inner, kind),
            AssignTarget::Attribute { .. } => {}
        }
    }

    fn scan_expr(&mut self, expr: &HirExpr) {
        if let HirExpr::MethodCall { object, method, .. } = expr {
            if let (Some(name), Some(kind)) = (receiver_name(object), MutationKind::list_method(method)) {
                self.record(name, kind);
            }
        }
        for child in expr.children() {
            self.scan_expr(child);
        }
    }
}

/// Name a receiver expression is tracked under.
fn receiver_name(expr: &HirExpr) -> Option<String> {
    match expr {
        HirExpr::Var(name) => Some(name.clone()),
        HirExpr::Attribute { value, attr } if matches!(value.as_ref(), HirExpr::Var(v) if v == "self") => {
            Some(format!("self.{}", attr))
        }
        _ => None,
    }
}
