//! Closure capture analysis
//!
//! For every nested function, the captured set is the names it reads but
//! does not bind locally, restricted to names some enclosing function
//! actually binds. A name no ancestor binds is a global or unresolved, not a
//! capture. Free names of deeper nested functions count as reads of their
//! parent, so a middle function passes captures through.

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use crate::hir::{AssignTarget, HirExpr, HirFunction, HirModule, HirStmt};

/// Capture sets keyed by qualified function name (`outer.inner`,
/// `Class.method.helper`). Only nested functions have entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureAnalysis {
    captures: IndexMap<String, IndexSet<String>>,
}

impl CaptureAnalysis {
    pub fn captures(&self, function: &str) -> Option<&IndexSet<String>> {
        self.captures.get(function)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexSet<String>)> {
        self.captures.iter()
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

pub struct ClosureAnalyzer {
    result: CaptureAnalysis,
}

impl ClosureAnalyzer {
    pub fn analyze(module: &HirModule) -> CaptureAnalysis {
        let mut analyzer = Self {
            result: CaptureAnalysis::default(),
        };
        for stmt in &module.body {
            match stmt {
                HirStmt::FunctionDef(func) => analyzer.visit_function(func, &func.name, &IndexSet::new()),
                HirStmt::ClassDef(class) => {
                    for method in class.methods() {
                        let qualified = format!("{}.{}", class.name, method.name);
                        analyzer.visit_function(method, &qualified, &IndexSet::new());
                    }
                }
                _ => {}
            }
        }
        analyzer.result
    }

    /// `enclosing` is the union of locals of every enclosing function.
    fn visit_function(&mut self, func: &HirFunction, qualified: &str, enclosing: &IndexSet<String>) {
        let locals = local_vars(func);

        if !enclosing.is_empty() {
            let captured: IndexSet<String> = free_vars(func)
                .into_iter()
                .filter(|name| enclosing.contains(name))
                .collect();
            trace!(function = qualified, captures = ?captured, "closure captures");
            self.result.captures.insert(qualified.to_string(), captured);
        }

        let mut visible = enclosing.clone();
        visible.extend(locals);
        for nested in nested_functions(&func.body) {
            let nested_name = format!("{}.{}", qualified, nested.name);
            self.visit_function(nested, &nested_name, &visible);
        }
    }
}

/// Parameters plus every name bound by assignment, augmented assignment or
/// a `for` target in the body. Nested function bodies are private and not
/// included, but the nested function's own name is.
pub fn local_vars(func: &HirFunction) -> IndexSet<String> {
    let mut locals: IndexSet<String> = func.params.iter().map(|p| p.name.clone()).collect();
    collect_locals(&func.body, &mut locals);
    locals
}

fn collect_locals(body: &[HirStmt], out: &mut IndexSet<String>) {
    for stmt in body {
        match stmt {
            HirStmt::Assign { targets, .. } => {
                targets.iter().for_each(|t| bind_target(t, out));
            }
            HirStmt::AnnAssign { target, .. }
            | HirStmt::AugAssign { target, .. }
            | HirStmt::For { target, .. } => bind_target(target, out),
            HirStmt::With { items, .. } => {
                items
                    .iter()
                    .filter_map(|item| item.target.as_ref())
                    .for_each(|t| bind_target(t, out));
            }
            HirStmt::Try { handlers, .. } => {
                out.extend(handlers.iter().filter_map(|h| h.name.clone()));
            }
            HirStmt::FunctionDef(nested) => {
                out.insert(nested.name.clone());
            }
            HirStmt::ClassDef(class) => {
                out.insert(class.name.clone());
            }
            HirStmt::Import(names) | HirStmt::ImportFrom { names, .. } => {
                out.extend(names.iter().map(|n| {
                    n.alias
                        .clone()
                        .unwrap_or_else(|| n.name.split('.').next().unwrap_or_default().to_string())
                }));
            }
            _ => {}
        }
        for block in stmt.child_blocks() {
            collect_locals(block, out);
        }
    }
}

fn bind_target(target: &AssignTarget, out: &mut IndexSet<String>) {
    out.extend(target.bound_names().into_iter().map(str::to_string));
}

/// Names a function reads that it does not bind itself.
pub fn free_vars(func: &HirFunction) -> IndexSet<String> {
    let locals = local_vars(func);
    let mut declared_outer = IndexSet::new();
    collect_outer_declarations(&func.body, &mut declared_outer);
    used_vars(&func.body)
        .into_iter()
        .filter(|name| !locals.contains(name) || declared_outer.contains(name))
        .collect()
}

fn collect_outer_declarations(body: &[HirStmt], out: &mut IndexSet<String>) {
    for stmt in body {
        if let HirStmt::Nonlocal(names) = stmt {
            out.extend(names.iter().cloned());
        }
        for block in stmt.child_blocks() {
            collect_outer_declarations(block, out);
        }
    }
}

/// Every name read anywhere in `body`, including the free names of nested
/// functions.
pub fn used_vars(body: &[HirStmt]) -> IndexSet<String> {
    let mut used = IndexSet::new();
    collect_used_stmts(body, &mut used);
    used
}

fn collect_used_stmts(body: &[HirStmt], out: &mut IndexSet<String>) {
    for stmt in body {
        for expr in stmt.expressions() {
            collect_used_expr(expr, out);
        }
        match stmt {
            HirStmt::FunctionDef(nested) => out.extend(free_vars(nested)),
            HirStmt::ClassDef(class) => {
                out.extend(class.bases.iter().cloned());
                for method in class.methods() {
                    out.extend(free_vars(method));
                }
            }
            // `x += 1` reads `x` too.
            HirStmt::AugAssign {
                target: AssignTarget::Symbol(name),
                ..
            } => {
                out.insert(name.clone());
            }
            _ => {}
        }
        for block in stmt.child_blocks() {
            collect_used_stmts(block, out);
        }
    }
}

fn collect_used_expr(expr: &HirExpr, out: &mut IndexSet<String>) {
    match expr {
        HirExpr::Var(name) => {
            out.insert(name.clone());
        }
        HirExpr::Call { func, .. } => {
            out.insert(func.clone());
        }
        _ => {}
    }

    let private = expr.inner_bindings();
    if private.is_empty() {
        for child in expr.children() {
            collect_used_expr(child, out);
        }
    } else {
        let mut inner = IndexSet::new();
        for child in expr.children() {
            collect_used_expr(child, &mut inner);
        }
        out.extend(inner.into_iter().filter(|name| !private.contains(&name.as_str())));
    }
}

/// Function definitions directly in `body`, looking through control flow
/// but not into other functions or classes.
pub(crate) fn nested_functions(body: &[HirStmt]) -> Vec<&HirFunction> {
    let mut found = Vec::new();
    for stmt in body {
        if let HirStmt::FunctionDef(func) = stmt {
            found.push(func);
        }
        for block in stmt.child_blocks() {
            found.extend(nested_functions(block));
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{BinOp, HirParam};

    fn def(name: &str, params: &[&str], body: Vec<HirStmt>) -> HirStmt {
        HirStmt::FunctionDef(HirFunction::new(
            name,
            params.iter().map(|p| HirParam::new(*p)).collect(),
            body,
        ))
    }

    #[test]
    fn test_captures_enclosing_local() {
        let module = HirModule::new(vec![def(
            "outer",
            &[],
            vec![
                HirStmt::assign("y", HirExpr::int(1)),
                def("inner", &[], vec![HirStmt::Return(Some(HirExpr::var("y")))]),
            ],
        )]);
        let analysis = ClosureAnalyzer::analyze(&module);
        let captured: Vec<_> = analysis.captures("outer.inner").unwrap().iter().cloned().collect();
        assert_eq!(captured, vec!["y".to_string()]);
        assert!(analysis.captures("outer").is_none());
    }

    #[test]
    fn test_unbound_name_is_not_a_capture() {
        let module = HirModule::new(vec![def(
            "outer",
            &[],
            vec![def("inner", &[], vec![HirStmt::Return(Some(HirExpr::var("z")))])],
        )]);
        let analysis = ClosureAnalyzer::analyze(&module);
        assert!(analysis.captures("outer.inner").unwrap().is_empty());
    }

    #[test]
    fn test_locals_and_params_shadow() {
        let module = HirModule::new(vec![def(
            "outer",
            &["a"],
            vec![
                HirStmt::assign("b", HirExpr::int(2)),
                def(
                    "inner",
                    &["a"],
                    vec![
                        HirStmt::assign("b", HirExpr::int(3)),
                        HirStmt::Return(Some(HirExpr::binary(
                            BinOp::Add,
                            HirExpr::var("a"),
                            HirExpr::var("b"),
                        ))),
                    ],
                ),
            ],
        )]);
        let analysis = ClosureAnalyzer::analyze(&module);
        assert!(analysis.captures("outer.inner").unwrap().is_empty());
    }

    #[test]
    fn test_deep_nesting_passes_captures_through() {
        let module = HirModule::new(vec![def(
            "a",
            &["x"],
            vec![def(
                "b",
                &[],
                vec![def("c", &[], vec![HirStmt::Return(Some(HirExpr::var("x")))])],
            )],
        )]);
        let analysis = ClosureAnalyzer::analyze(&module);
        assert!(analysis.captures("a.b.c").unwrap().contains("x"));
        assert!(analysis.captures("a.b").unwrap().contains("x"));
    }

    #[test]
    fn test_comprehension_targets_are_private() {
        let comp = HirExpr::ListComp {
            element: Box::new(HirExpr::var("i")),
            generators: vec![crate::hir::Comprehension {
                target: AssignTarget::symbol("i"),
                iter: HirExpr::var("items"),
                conditions: vec![],
            }],
        };
        let used = used_vars(&[HirStmt::Expr(comp)]);
        assert!(used.contains("items"));
        assert!(!used.contains("i"));
    }

    #[test]
    fn test_local_vars_include_for_and_aug_targets() {
        let func = HirFunction::new(
            "f",
            vec![HirParam::new("n")],
            vec![
                HirStmt::For {
                    target: AssignTarget::Tuple(vec![
                        AssignTarget::symbol("i"),
                        AssignTarget::symbol("v"),
                    ]),
                    iter: HirExpr::var("pairs"),
                    body: vec![HirStmt::AugAssign {
                        target: AssignTarget::symbol("total"),
                        op: BinOp::Add,
                        value: HirExpr::var("v"),
                    }],
                    orelse: vec![],
                },
            ],
        );
        let locals: Vec<_> = local_vars(&func).into_iter().collect();
        assert_eq!(locals, vec!["n", "i", "v", "total"]);
    }
}
