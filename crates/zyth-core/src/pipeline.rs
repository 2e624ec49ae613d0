//! Whole-unit analysis as a typed sequence of stages
//!
//! Each stage consumes the pipeline in the previous state and returns it in
//! the next one, so the stages can only run in order:
//!
//! 1. [`Pipeline::capture`]: closure captures and mutation events, both
//!    type-free.
//! 2. [`Pipeline::register_signatures`]: declared return and parameter
//!    types, classes with bases and properties, imports. Needs nothing.
//! 3. [`Pipeline::collect_constructor_args`]: argument types at every call
//!    of a capitalized name. Needs the import table from stage 2.
//! 4. [`Pipeline::infer_returns`]: visit every function and class so
//!    unannotated returns are known. Needs stage 2's registry and stage 3's
//!    constructor arguments.
//! 5. [`Pipeline::visit`]: full sweep of module statements and definitions.
//!    Needs stage 4 so calls resolve to real return types.
//! 6. [`Pipeline::promote`]: fixed arrays that are list-mutated anywhere
//!    become lists. Runs last because it overrides stage 5.

use std::fmt;
use std::marker::PhantomData;

use tracing::debug;

use crate::analysis::closure::nested_functions;
use crate::analysis::{ClosureAnalyzer, MutationAnalyzer};
use crate::config::InferenceConfig;
use crate::env::{ClassInfo, TypeEnvironment};
use crate::hir::{HirExpr, HirFunction, HirModule, HirStmt};
use crate::infer::Inferencer;
use crate::types::NativeType;

/// The six analysis passes, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Captures,
    Signatures,
    Constructors,
    Returns,
    Visit,
    Promotion,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Captures,
        Stage::Signatures,
        Stage::Constructors,
        Stage::Returns,
        Stage::Visit,
        Stage::Promotion,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Captures => "captures",
            Stage::Signatures => "signatures",
            Stage::Constructors => "constructors",
            Stage::Returns => "returns",
            Stage::Visit => "visit",
            Stage::Promotion => "promotion",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct Fresh;
pub struct Captured;
pub struct Signatures;
pub struct Constructors;
pub struct Returns;
pub struct Visited;
pub struct Promoted;

pub struct Pipeline<'m, S> {
    module: &'m HirModule,
    config: InferenceConfig,
    env: TypeEnvironment,
    mutations: MutationAnalyzer,
    _stage: PhantomData<S>,
}

impl<'m, S> Pipeline<'m, S> {
    pub fn env(&self) -> &TypeEnvironment {
        &self.env
    }

    fn advance<T>(self) -> Pipeline<'m, T> {
        Pipeline {
            module: self.module,
            config: self.config,
            env: self.env,
            mutations: self.mutations,
            _stage: PhantomData,
        }
    }
}

impl<'m> Pipeline<'m, Fresh> {
    pub fn new(module: &'m HirModule, config: InferenceConfig) -> Self {
        Self {
            module,
            config,
            env: TypeEnvironment::new(),
            mutations: MutationAnalyzer::default(),
            _stage: PhantomData,
        }
    }

    /// Run all six stages.
    pub fn run(self) -> TypeEnvironment {
        self.capture()
            .register_signatures()
            .collect_constructor_args()
            .infer_returns()
            .visit()
            .promote()
            .finish()
    }

    pub fn capture(mut self) -> Pipeline<'m, Captured> {
        let captures = ClosureAnalyzer::analyze(self.module);
        for (function, names) in captures.iter() {
            self.env.set_captures(function, names.clone());
        }
        self.mutations = MutationAnalyzer::analyze(self.module);
        debug!(stage = %Stage::Captures, closures = captures.len(), "stage complete");
        self.advance()
    }
}

impl<'m> Pipeline<'m, Captured> {
    pub fn register_signatures(mut self) -> Pipeline<'m, Signatures> {
        let module = self.module;
        let mut functions = 0;
        for stmt in &module.body {
            match stmt {
                HirStmt::FunctionDef(func) => {
                    functions += self.register_function(func, &func.name, false);
                }
                HirStmt::ClassDef(class) => {
                    let mut info = ClassInfo::new(&class.name).with_bases(class.bases.clone());
                    for method in class.methods() {
                        let qualified = format!("{}.{}", class.name, method.name);
                        functions += self.register_function(method, &qualified, !method.is_staticmethod());
                        let ret = self.declared(method.return_annotation.as_ref());
                        info.set_method_return(&method.name, ret);
                        if method.is_property() {
                            info.mark_property(&method.name);
                        }
                    }
                    self.env.register_class(info);
                }
                HirStmt::Import(_) | HirStmt::ImportFrom { .. } => {
                    Inferencer::new(&mut self.env, &self.config).register_imports(stmt);
                }
                _ => {}
            }
        }
        debug!(
            stage = %Stage::Signatures,
            functions,
            classes = self.env.classes().count(),
            "stage complete"
        );
        self.advance()
    }

    /// Register `func` and everything nested in it. Returns how many
    /// functions were registered.
    fn register_function(&mut self, func: &HirFunction, qualified: &str, is_method: bool) -> usize {
        let ret = self.declared(func.return_annotation.as_ref());
        self.env.set_function_return(qualified, ret);
        let params = func
            .params
            .iter()
            .skip(usize::from(is_method))
            .map(|p| self.declared(p.annotation.as_ref()))
            .collect();
        self.env.set_function_params(qualified, params);

        let mut count = 1;
        for inner in nested_functions(&func.body) {
            count += self.register_function(inner, &format!("{}.{}", qualified, inner.name), false);
        }
        count
    }

    fn declared(&self, annotation: Option<&String>) -> NativeType {
        match annotation {
            Some(text) if self.config.use_annotations => crate::types::parse_annotation(text),
            _ => NativeType::Unknown,
        }
    }
}

impl<'m> Pipeline<'m, Signatures> {
    /// Calls of capitalized names are taken to be constructor calls; their
    /// argument types are inferred at module scope.
    pub fn collect_constructor_args(mut self) -> Pipeline<'m, Constructors> {
        let module = self.module;
        let mut calls = Vec::new();
        constructor_calls(&module.body, &mut calls);

        let mut inf = Inferencer::new(&mut self.env, &self.config);
        for (class, args) in &calls {
            let types = args.iter().map(|a| inf.infer_expr(a)).collect();
            inf.env_mut().record_constructor_args(class, types);
        }
        debug!(stage = %Stage::Constructors, calls = calls.len(), "stage complete");
        self.advance()
    }
}

impl<'m> Pipeline<'m, Constructors> {
    pub fn infer_returns(mut self) -> Pipeline<'m, Returns> {
        if self.config.infer_return_types {
            let mut inf = Inferencer::new(&mut self.env, &self.config);
            visit_definitions(&mut inf, self.module);
        }
        debug!(
            stage = %Stage::Returns,
            enabled = self.config.infer_return_types,
            "stage complete"
        );
        self.advance()
    }
}

impl<'m> Pipeline<'m, Returns> {
    /// Module statements, then definitions, then module statements again so
    /// top-level code sees fields and returns the definitions produced.
    pub fn visit(mut self) -> Pipeline<'m, Visited> {
        let module = self.module;
        let mut inf = Inferencer::new(&mut self.env, &self.config);
        visit_module_statements(&mut inf, module);
        visit_definitions(&mut inf, module);
        visit_module_statements(&mut inf, module);
        debug!(
            stage = %Stage::Visit,
            module_vars = self.env.module_vars().len(),
            scopes = self.env.scope_names().count(),
            "stage complete"
        );
        self.advance()
    }
}

impl<'m> Pipeline<'m, Visited> {
    pub fn promote(mut self) -> Pipeline<'m, Promoted> {
        let mut promoted = 0;
        if self.config.promote_mutated_arrays {
            for name in self.mutations.list_mutated() {
                promoted += match name.strip_prefix("self.") {
                    Some(field) => self.env.promote_field(field),
                    None => self.env.promote_array(name),
                };
            }
        }
        debug!(stage = %Stage::Promotion, promoted, "stage complete");
        self.advance()
    }
}

impl Pipeline<'_, Promoted> {
    pub fn finish(self) -> TypeEnvironment {
        self.env
    }
}

fn visit_module_statements(inf: &mut Inferencer<'_>, module: &HirModule) {
    for stmt in &module.body {
        if !matches!(stmt, HirStmt::FunctionDef(_) | HirStmt::ClassDef(_)) {
            inf.visit_stmt(stmt);
        }
    }
}

fn visit_definitions(inf: &mut Inferencer<'_>, module: &HirModule) {
    for stmt in &module.body {
        match stmt {
            HirStmt::FunctionDef(func) => inf.visit_function(func, &func.name, None),
            HirStmt::ClassDef(class) => inf.visit_class(class),
            _ => {}
        }
    }
}

fn constructor_calls<'a>(body: &'a [HirStmt], out: &mut Vec<(&'a str, &'a [HirExpr])>) {
    for stmt in body {
        for expr in stmt.expressions() {
            calls_in_expr(expr, out);
        }
        match stmt {
            HirStmt::FunctionDef(func) => constructor_calls(&func.body, out),
            HirStmt::ClassDef(class) => constructor_calls(&class.body, out),
            _ => {}
        }
        for block in stmt.child_blocks() {
            constructor_calls(block, out);
        }
    }
}

fn calls_in_expr<'a>(expr: &'a HirExpr, out: &mut Vec<(&'a str, &'a [HirExpr])>) {
    if let HirExpr::Call { func, args, .. } = expr {
        if func.starts_with(|c: char| c.is_ascii_uppercase()) {
            out.push((func.as_str(), args.as_slice()));
        }
    }
    for child in expr.children() {
        calls_in_expr(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{AssignTarget, HirClass, HirParam};

    fn point_module() -> HirModule {
        HirModule::new(vec![
            HirStmt::ClassDef(HirClass::new(
                "P",
                vec![HirStmt::FunctionDef(HirFunction::new(
                    "__init__",
                    vec![HirParam::new("self"), HirParam::new("n")],
                    vec![HirStmt::Assign {
                        targets: vec![AssignTarget::Attribute {
                            value: Box::new(HirExpr::var("self")),
                            attr: "name".into(),
                        }],
                        value: HirExpr::var("n"),
                    }],
                ))],
            )),
            HirStmt::assign("p", HirExpr::call("P", vec![HirExpr::string("x")])),
        ])
    }

    #[test]
    fn test_stage_names_in_order() {
        let names: Vec<_> = Stage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            ["captures", "signatures", "constructors", "returns", "visit", "promotion"]
        );
    }

    #[test]
    fn test_signatures_register_classes_and_annotations() {
        let module = HirModule::new(vec![
            HirStmt::FunctionDef(
                HirFunction::new("area", vec![HirParam::annotated("r", "float")], vec![]).returning("float"),
            ),
            HirStmt::ClassDef(HirClass::new(
                "Circle",
                vec![HirStmt::FunctionDef(
                    HirFunction::new("radius", vec![HirParam::new("self")], vec![])
                        .returning("float")
                        .decorated("property"),
                )],
            )),
        ]);
        let pipeline = Pipeline::new(&module, InferenceConfig::default())
            .capture()
            .register_signatures();
        let env = pipeline.env();
        assert_eq!(env.function_return("area"), Some(&NativeType::Float));
        assert_eq!(env.function_params("area"), Some(&[NativeType::Float][..]));
        assert_eq!(env.function_params("Circle.radius"), Some(&[][..]));
        assert!(env.is_property("Circle", "radius"));
    }

    #[test]
    fn test_constructor_args_collected_before_returns() {
        let module = point_module();
        let pipeline = Pipeline::new(&module, InferenceConfig::default())
            .capture()
            .register_signatures()
            .collect_constructor_args();
        assert_eq!(
            pipeline.env().constructor_args("P"),
            Some(&[NativeType::literal_string()][..])
        );
    }

    #[test]
    fn test_full_run_backfills_fields() {
        let module = point_module();
        let env = Pipeline::new(&module, InferenceConfig::default()).run();
        assert_eq!(env.class_field("P", "name"), Some(&NativeType::string()));
        assert_eq!(env.get_scoped_var(None, "p"), Some(&NativeType::instance("P")));
    }

    #[test]
    fn test_promotion_can_be_disabled() {
        let module = HirModule::new(vec![
            HirStmt::assign("xs", HirExpr::List(vec![HirExpr::int(1), HirExpr::int(2)])),
            HirStmt::Expr(HirExpr::method(HirExpr::var("xs"), "append", vec![HirExpr::int(3)])),
        ]);
        let env = Pipeline::new(&module, InferenceConfig::default()).run();
        assert_eq!(env.get_scoped_var(None, "xs"), Some(&NativeType::list(NativeType::Int)));

        let config = InferenceConfig::default().without_array_promotion();
        let env = Pipeline::new(&module, config).run();
        assert_eq!(
            env.get_scoped_var(None, "xs"),
            Some(&NativeType::array(NativeType::Int, 2))
        );
    }
}
