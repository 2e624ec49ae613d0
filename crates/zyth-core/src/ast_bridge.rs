//! Conversion from the rustpython AST to HIR
//!
//! Annotations are rendered back to source text (`list[int]`,
//! `Optional[str]`) and parsed later by [`crate::types::parse_annotation`].
//! Constructs the HIR has no shape for degrade instead of failing: unknown
//! statements become `Pass`, unknown expressions become an opaque name that
//! never resolves, so inference sees them as unknown.

use rustpython_ast as ast;

use crate::hir::{
    AssignTarget, BinOp, BoolOp, CmpOp, Comprehension, ExceptHandler, FStringPart, HirClass, HirExpr, HirFunction,
    HirModule, HirParam, HirStmt, ImportName, Literal, UnaryOp, WithItem,
};

/// Name standing in for an expression the HIR cannot express. It is not a
/// valid identifier, so it is never bound.
pub const OPAQUE: &str = "<expr>";

#[derive(Debug, Default)]
pub struct AstBridge {
    _private: (),
}

impl AstBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn python_to_hir(&self, suite: &[ast::Stmt]) -> HirModule {
        HirModule::new(self.convert_body(suite))
    }

    fn convert_body(&self, body: &[ast::Stmt]) -> Vec<HirStmt> {
        body.iter().map(|s| self.convert_stmt(s)).collect()
    }

    fn convert_stmt(&self, stmt: &ast::Stmt) -> HirStmt {
        match stmt {
            ast::Stmt::FunctionDef(f) => HirStmt::FunctionDef(self.convert_function(
                f.name.as_str(),
                &f.args,
                &f.body,
                &f.decorator_list,
                f.returns.as_deref(),
                false,
            )),
            ast::Stmt::AsyncFunctionDef(f) => HirStmt::FunctionDef(self.convert_function(
                f.name.as_str(),
                &f.args,
                &f.body,
                &f.decorator_list,
                f.returns.as_deref(),
                true,
            )),
            ast::Stmt::ClassDef(c) => HirStmt::ClassDef(HirClass {
                name: c.name.to_string(),
                bases: c.bases.iter().filter_map(dotted_name).collect(),
                decorators: c.decorator_list.iter().filter_map(decorator_name).collect(),
                body: self.convert_body(&c.body),
            }),
            ast::Stmt::Return(r) => HirStmt::Return(r.value.as_deref().map(|v| self.convert_expr(v))),
            ast::Stmt::Delete(d) => HirStmt::Delete(d.targets.iter().map(|t| self.convert_expr(t)).collect()),
            ast::Stmt::Assign(a) => {
                let value = self.convert_expr(&a.value);
                let targets: Vec<_> = a.targets.iter().filter_map(|t| self.convert_target(t)).collect();
                if targets.is_empty() {
                    HirStmt::Expr(value)
                } else {
                    HirStmt::Assign { targets, value }
                }
            }
            ast::Stmt::AugAssign(a) => match self.convert_target(&a.target) {
                Some(target) => HirStmt::AugAssign {
                    target,
                    op: convert_operator(&a.op),
                    value: self.convert_expr(&a.value),
                },
                None => HirStmt::Expr(self.convert_expr(&a.value)),
            },
            ast::Stmt::AnnAssign(a) => match self.convert_target(&a.target) {
                Some(target) => HirStmt::AnnAssign {
                    target,
                    annotation: render_annotation(&a.annotation),
                    value: a.value.as_deref().map(|v| self.convert_expr(v)),
                },
                None => HirStmt::Pass,
            },
            ast::Stmt::For(f) => self.convert_for(&f.target, &f.iter, &f.body, &f.orelse),
            ast::Stmt::AsyncFor(f) => self.convert_for(&f.target, &f.iter, &f.body, &f.orelse),
            ast::Stmt::While(w) => HirStmt::While {
                condition: self.convert_expr(&w.test),
                body: self.convert_body(&w.body),
                orelse: self.convert_body(&w.orelse),
            },
            ast::Stmt::If(i) => HirStmt::If {
                condition: self.convert_expr(&i.test),
                then_body: self.convert_body(&i.body),
                else_body: self.convert_body(&i.orelse),
            },
            ast::Stmt::With(w) => self.convert_with(&w.items, &w.body),
            ast::Stmt::AsyncWith(w) => self.convert_with(&w.items, &w.body),
            ast::Stmt::Raise(r) => HirStmt::Raise(r.exc.as_deref().map(|e| self.convert_expr(e))),
            ast::Stmt::Try(t) => self.convert_try(&t.body, &t.handlers, &t.orelse, &t.finalbody),
            ast::Stmt::TryStar(t) => self.convert_try(&t.body, &t.handlers, &t.orelse, &t.finalbody),
            ast::Stmt::Assert(a) => HirStmt::Assert {
                test: self.convert_expr(&a.test),
                msg: a.msg.as_deref().map(|m| self.convert_expr(m)),
            },
            ast::Stmt::Import(i) => HirStmt::Import(i.names.iter().map(convert_alias).collect()),
            ast::Stmt::ImportFrom(i) => HirStmt::ImportFrom {
                module: i.module.as_ref().map(|m| m.to_string()).unwrap_or_default(),
                names: i.names.iter().map(convert_alias).collect(),
            },
            ast::Stmt::Global(g) => HirStmt::Global(g.names.iter().map(|n| n.to_string()).collect()),
            ast::Stmt::Nonlocal(n) => HirStmt::Nonlocal(n.names.iter().map(|n| n.to_string()).collect()),
            ast::Stmt::Expr(e) => HirStmt::Expr(self.convert_expr(&e.value)),
            ast::Stmt::Break(_) => HirStmt::Break,
            ast::Stmt::Continue(_) => HirStmt::Continue,
            _ => HirStmt::Pass,
        }
    }

    fn convert_function(
        &self,
        name: &str,
        args: &ast::Arguments,
        body: &[ast::Stmt],
        decorators: &[ast::Expr],
        returns: Option<&ast::Expr>,
        is_async: bool,
    ) -> HirFunction {
        let mut func = HirFunction::new(name, self.convert_params(args), self.convert_body(body));
        func.return_annotation = returns.map(render_annotation);
        func.decorators = decorators.iter().filter_map(decorator_name).collect();
        func.is_async = is_async;
        func
    }

    fn convert_params(&self, args: &ast::Arguments) -> Vec<HirParam> {
        let plain = |arg: &ast::ArgWithDefault| HirParam {
            name: arg.def.arg.to_string(),
            annotation: arg.def.annotation.as_deref().map(render_annotation),
            default: arg.default.as_deref().map(|d| self.convert_expr(d)),
        };
        let mut params: Vec<HirParam> = args.posonlyargs.iter().chain(&args.args).map(plain).collect();
        if let Some(vararg) = &args.vararg {
            params.push(HirParam {
                name: vararg.arg.to_string(),
                annotation: Some(match vararg.annotation.as_deref() {
                    Some(ann) => format!("tuple[{}, ...]", render_annotation(ann)),
                    None => "tuple".to_string(),
                }),
                default: None,
            });
        }
        params.extend(args.kwonlyargs.iter().map(plain));
        if let Some(kwarg) = &args.kwarg {
            params.push(HirParam {
                name: kwarg.arg.to_string(),
                annotation: Some(match kwarg.annotation.as_deref() {
                    Some(ann) => format!("dict[str, {}]", render_annotation(ann)),
                    None => "dict".to_string(),
                }),
                default: None,
            });
        }
        params
    }

    fn convert_for(&self, target: &ast::Expr, iter: &ast::Expr, body: &[ast::Stmt], orelse: &[ast::Stmt]) -> HirStmt {
        HirStmt::For {
            target: self
                .convert_target(target)
                .unwrap_or_else(|| AssignTarget::Tuple(Vec::new())),
            iter: self.convert_expr(iter),
            body: self.convert_body(body),
            orelse: self.convert_body(orelse),
        }
    }

    fn convert_with(&self, items: &[ast::WithItem], body: &[ast::Stmt]) -> HirStmt {
        HirStmt::With {
            items: items
                .iter()
                .map(|item| WithItem {
                    context: self.convert_expr(&item.context_expr),
                    target: item.optional_vars.as_deref().and_then(|t| self.convert_target(t)),
                })
                .collect(),
            body: self.convert_body(body),
        }
    }

    fn convert_try(
        &self,
        body: &[ast::Stmt],
        handlers: &[ast::ExceptHandler],
        orelse: &[ast::Stmt],
        finalbody: &[ast::Stmt],
    ) -> HirStmt {
        HirStmt::Try {
            body: self.convert_body(body),
            handlers: handlers
                .iter()
                .map(|ast::ExceptHandler::ExceptHandler(h)| ExceptHandler {
                    exception: h.type_.as_deref().and_then(|t| match t {
                        ast::Expr::Tuple(tuple) => tuple.elts.first().and_then(dotted_name),
                        other => dotted_name(other),
                    }),
                    name: h.name.as_ref().map(|n| n.to_string()),
                    body: self.convert_body(&h.body),
                })
                .collect(),
            orelse: self.convert_body(orelse),
            finalbody: self.convert_body(finalbody),
        }
    }

    /// Store target of an assignment, `for` or `with`. `None` for shapes
    /// that cannot be stored to.
    fn convert_target(&self, expr: &ast::Expr) -> Option<AssignTarget> {
        let target = match expr {
            ast::Expr::Name(n) => AssignTarget::Symbol(n.id.to_string()),
            ast::Expr::Attribute(a) => AssignTarget::Attribute {
                value: Box::new(self.convert_expr(&a.value)),
                attr: a.attr.to_string(),
            },
            ast::Expr::Subscript(s) => AssignTarget::Index {
                base: Box::new(self.convert_expr(&s.value)),
                index: Box::new(self.convert_expr(&s.slice)),
            },
            ast::Expr::Tuple(t) => AssignTarget::Tuple(t.elts.iter().filter_map(|e| self.convert_target(e)).collect()),
            ast::Expr::List(l) => AssignTarget::Tuple(l.elts.iter().filter_map(|e| self.convert_target(e)).collect()),
            ast::Expr::Starred(s) => AssignTarget::Starred(Box::new(self.convert_target(&s.value)?)),
            _ => return None,
        };
        Some(target)
    }

    fn convert_expr(&self, expr: &ast::Expr) -> HirExpr {
        match expr {
            ast::Expr::Constant(c) => convert_constant(&c.value),
            ast::Expr::Name(n) => HirExpr::Var(n.id.to_string()),
            ast::Expr::BinOp(b) => HirExpr::Binary {
                op: convert_operator(&b.op),
                left: Box::new(self.convert_expr(&b.left)),
                right: Box::new(self.convert_expr(&b.right)),
            },
            ast::Expr::UnaryOp(u) => HirExpr::Unary {
                op: match u.op {
                    ast::UnaryOp::Not => UnaryOp::Not,
                    ast::UnaryOp::USub => UnaryOp::Neg,
                    ast::UnaryOp::UAdd => UnaryOp::Pos,
                    ast::UnaryOp::Invert => UnaryOp::BitNot,
                },
                operand: Box::new(self.convert_expr(&u.operand)),
            },
            ast::Expr::BoolOp(b) => HirExpr::BoolOp {
                op: match b.op {
                    ast::BoolOp::And => BoolOp::And,
                    ast::BoolOp::Or => BoolOp::Or,
                },
                values: self.convert_exprs(&b.values),
            },
            ast::Expr::Compare(c) => HirExpr::Compare {
                left: Box::new(self.convert_expr(&c.left)),
                ops: c.ops.iter().map(convert_cmpop).collect(),
                comparators: self.convert_exprs(&c.comparators),
            },
            ast::Expr::Call(c) => self.convert_call(c),
            ast::Expr::Attribute(a) => HirExpr::Attribute {
                value: Box::new(self.convert_expr(&a.value)),
                attr: a.attr.to_string(),
            },
            ast::Expr::Subscript(s) => {
                let base = Box::new(self.convert_expr(&s.value));
                match s.slice.as_ref() {
                    ast::Expr::Slice(slice) => HirExpr::Slice {
                        base,
                        start: slice.lower.as_deref().map(|e| Box::new(self.convert_expr(e))),
                        stop: slice.upper.as_deref().map(|e| Box::new(self.convert_expr(e))),
                        step: slice.step.as_deref().map(|e| Box::new(self.convert_expr(e))),
                    },
                    index => HirExpr::Index {
                        base,
                        index: Box::new(self.convert_expr(index)),
                    },
                }
            }
            ast::Expr::List(l) => HirExpr::List(self.convert_exprs(&l.elts)),
            ast::Expr::Tuple(t) => HirExpr::Tuple(self.convert_exprs(&t.elts)),
            ast::Expr::Set(s) => HirExpr::Set(self.convert_exprs(&s.elts)),
            // `{**other}` entries have no key and are dropped.
            ast::Expr::Dict(d) => HirExpr::Dict(
                d.keys
                    .iter()
                    .zip(&d.values)
                    .filter_map(|(k, v)| Some((self.convert_expr(k.as_ref()?), self.convert_expr(v))))
                    .collect(),
            ),
            ast::Expr::ListComp(c) => HirExpr::ListComp {
                element: Box::new(self.convert_expr(&c.elt)),
                generators: self.convert_generators(&c.generators),
            },
            ast::Expr::SetComp(c) => HirExpr::SetComp {
                element: Box::new(self.convert_expr(&c.elt)),
                generators: self.convert_generators(&c.generators),
            },
            ast::Expr::GeneratorExp(c) => HirExpr::GeneratorExp {
                element: Box::new(self.convert_expr(&c.elt)),
                generators: self.convert_generators(&c.generators),
            },
            ast::Expr::DictComp(c) => HirExpr::DictComp {
                key: Box::new(self.convert_expr(&c.key)),
                value: Box::new(self.convert_expr(&c.value)),
                generators: self.convert_generators(&c.generators),
            },
            ast::Expr::Lambda(l) => HirExpr::Lambda {
                params: self.convert_params(&l.args).into_iter().map(|p| p.name).collect(),
                body: Box::new(self.convert_expr(&l.body)),
            },
            ast::Expr::IfExp(i) => HirExpr::IfExpr {
                test: Box::new(self.convert_expr(&i.test)),
                body: Box::new(self.convert_expr(&i.body)),
                orelse: Box::new(self.convert_expr(&i.orelse)),
            },
            ast::Expr::JoinedStr(j) => HirExpr::FString(j.values.iter().map(|v| self.convert_fstring_part(v)).collect()),
            ast::Expr::FormattedValue(f) => HirExpr::FString(vec![FStringPart::Expr(Box::new(self.convert_expr(&f.value)))]),
            ast::Expr::Await(a) => HirExpr::Await(Box::new(self.convert_expr(&a.value))),
            ast::Expr::Yield(y) => HirExpr::Yield(y.value.as_deref().map(|v| Box::new(self.convert_expr(v)))),
            ast::Expr::YieldFrom(y) => HirExpr::Yield(Some(Box::new(self.convert_expr(&y.value)))),
            ast::Expr::Starred(s) => HirExpr::Starred(Box::new(self.convert_expr(&s.value))),
            // The walrus binding is dropped; its value is what the expression yields.
            ast::Expr::NamedExpr(n) => self.convert_expr(&n.value),
            _ => HirExpr::Var(OPAQUE.to_string()),
        }
    }

    fn convert_exprs(&self, exprs: &[ast::Expr]) -> Vec<HirExpr> {
        exprs.iter().map(|e| self.convert_expr(e)).collect()
    }

    fn convert_call(&self, call: &ast::ExprCall) -> HirExpr {
        let args = self.convert_exprs(&call.args);
        let kwargs: Vec<(String, HirExpr)> = call
            .keywords
            .iter()
            .filter_map(|k| Some((k.arg.as_ref()?.to_string(), self.convert_expr(&k.value))))
            .collect();
        match call.func.as_ref() {
            ast::Expr::Name(n) => HirExpr::Call {
                func: n.id.to_string(),
                args,
                kwargs,
            },
            ast::Expr::Attribute(a) => HirExpr::MethodCall {
                object: Box::new(self.convert_expr(&a.value)),
                method: a.attr.to_string(),
                args,
                kwargs,
            },
            other => HirExpr::DynamicCall {
                callee: Box::new(self.convert_expr(other)),
                args,
            },
        }
    }

    fn convert_generators(&self, generators: &[ast::Comprehension]) -> Vec<Comprehension> {
        generators
            .iter()
            .map(|g| Comprehension {
                target: self
                    .convert_target(&g.target)
                    .unwrap_or_else(|| AssignTarget::Tuple(Vec::new())),
                iter: self.convert_expr(&g.iter),
                conditions: self.convert_exprs(&g.ifs),
            })
            .collect()
    }

    fn convert_fstring_part(&self, value: &ast::Expr) -> FStringPart {
        match value {
            ast::Expr::Constant(ast::ExprConstant {
                value: ast::Constant::Str(s),
                ..
            }) => FStringPart::Literal(s.clone()),
            ast::Expr::FormattedValue(f) => FStringPart::Expr(Box::new(self.convert_expr(&f.value))),
            other => FStringPart::Expr(Box::new(self.convert_expr(other))),
        }
    }
}

fn convert_constant(constant: &ast::Constant) -> HirExpr {
    let lit = match constant {
        ast::Constant::None => Literal::None,
        ast::Constant::Bool(b) => Literal::Bool(*b),
        ast::Constant::Str(s) => Literal::String(s.clone()),
        ast::Constant::Bytes(b) => Literal::Bytes(b.clone()),
        ast::Constant::Int(n) => {
            let text = n.to_string();
            match text.parse::<i64>() {
                Ok(value) => Literal::Int(value),
                Err(_) => Literal::BigInt(text),
            }
        }
        ast::Constant::Float(f) => Literal::Float(*f),
        ast::Constant::Tuple(items) => return HirExpr::Tuple(items.iter().map(convert_constant).collect()),
        _ => return HirExpr::Var(OPAQUE.to_string()),
    };
    HirExpr::Literal(lit)
}

fn convert_operator(op: &ast::Operator) -> BinOp {
    match op {
        ast::Operator::Add => BinOp::Add,
        ast::Operator::Sub => BinOp::Sub,
        ast::Operator::Mult => BinOp::Mul,
        ast::Operator::MatMult => BinOp::MatMul,
        ast::Operator::Div => BinOp::Div,
        ast::Operator::Mod => BinOp::Mod,
        ast::Operator::Pow => BinOp::Pow,
        ast::Operator::LShift => BinOp::LShift,
        ast::Operator::RShift => BinOp::RShift,
        ast::Operator::BitOr => BinOp::BitOr,
        ast::Operator::BitXor => BinOp::BitXor,
        ast::Operator::BitAnd => BinOp::BitAnd,
        ast::Operator::FloorDiv => BinOp::FloorDiv,
    }
}

fn convert_cmpop(op: &ast::CmpOp) -> CmpOp {
    match op {
        ast::CmpOp::Eq => CmpOp::Eq,
        ast::CmpOp::NotEq => CmpOp::NotEq,
        ast::CmpOp::Lt => CmpOp::Lt,
        ast::CmpOp::LtE => CmpOp::LtEq,
        ast::CmpOp::Gt => CmpOp::Gt,
        ast::CmpOp::GtE => CmpOp::GtEq,
        ast::CmpOp::Is => CmpOp::Is,
        ast::CmpOp::IsNot => CmpOp::IsNot,
        ast::CmpOp::In => CmpOp::In,
        ast::CmpOp::NotIn => CmpOp::NotIn,
    }
}

fn convert_alias(alias: &ast::Alias) -> ImportName {
    ImportName {
        name: alias.name.to_string(),
        alias: alias.asname.as_ref().map(|a| a.to_string()),
    }
}

fn dotted_name(expr: &ast::Expr) -> Option<String> {
    match expr {
        ast::Expr::Name(n) => Some(n.id.to_string()),
        ast::Expr::Attribute(a) => Some(format!("{}.{}", dotted_name(&a.value)?, a.attr)),
        _ => None,
    }
}

/// `@property` and `@app.route("/")` both name their decorator.
fn decorator_name(expr: &ast::Expr) -> Option<String> {
    match expr {
        ast::Expr::Call(c) => dotted_name(&c.func),
        other => dotted_name(other),
    }
}

/// Render an annotation expression back to source form.
fn render_annotation(expr: &ast::Expr) -> String {
    match expr {
        ast::Expr::Name(n) => n.id.to_string(),
        ast::Expr::Attribute(a) => format!("{}.{}", render_annotation(&a.value), a.attr),
        ast::Expr::Subscript(s) => {
            let inner = match s.slice.as_ref() {
                ast::Expr::Tuple(t) => t.elts.iter().map(render_annotation).collect::<Vec<_>>().join(", "),
                other => render_annotation(other),
            };
            format!("{}[{}]", render_annotation(&s.value), inner)
        }
        ast::Expr::List(l) => format!("[{}]", l.elts.iter().map(render_annotation).collect::<Vec<_>>().join(", ")),
        ast::Expr::Tuple(t) => t.elts.iter().map(render_annotation).collect::<Vec<_>>().join(", "),
        ast::Expr::BinOp(b) if matches!(b.op, ast::Operator::BitOr) => {
            format!("{} | {}", render_annotation(&b.left), render_annotation(&b.right))
        }
        ast::Expr::Constant(c) => match &c.value {
            ast::Constant::Str(s) => s.clone(),
            ast::Constant::None => "None".to_string(),
            ast::Constant::Ellipsis => "...".to_string(),
            _ => "Any".to_string(),
        },
        _ => "Any".to_string(),
    }
}
