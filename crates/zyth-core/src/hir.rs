//! High-level intermediate representation of a Python compilation unit
//!
//! The inference engine only reads this tree. It is produced by
//! [`crate::ast_bridge::AstBridge`] from a parsed Python suite, or built
//! directly by an external front end.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A whole compilation unit (one Python module).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HirModule {
    pub body: Vec<HirStmt>,
}

impl HirModule {
    pub fn new(body: Vec<HirStmt>) -> Self {
        Self { body }
    }

    /// Top-level function definitions, in source order.
    pub fn functions(&self) -> impl Iterator<Item = &HirFunction> {
        self.body.iter().filter_map(|stmt| match stmt {
            HirStmt::FunctionDef(func) => Some(func),
            _ => None,
        })
    }

    /// Top-level class definitions, in source order.
    pub fn classes(&self) -> impl Iterator<Item = &HirClass> {
        self.body.iter().filter_map(|stmt| match stmt {
            HirStmt::ClassDef(class) => Some(class),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirParam {
    pub name: String,
    /// Annotation as written in source, e.g. `list[int]`.
    pub annotation: Option<String>,
    pub default: Option<HirExpr>,
}

impl HirParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: None,
            default: None,
        }
    }

    pub fn annotated(name: impl Into<String>, annotation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: Some(annotation.into()),
            default: None,
        }
    }

    pub fn with_default(mut self, default: HirExpr) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirFunction {
    pub name: String,
    pub params: SmallVec<[HirParam; 4]>,
    pub return_annotation: Option<String>,
    pub body: Vec<HirStmt>,
    /// Decorator names, dotted (`property`, `app.route`).
    pub decorators: Vec<String>,
    pub is_async: bool,
}

impl HirFunction {
    pub fn new(name: impl Into<String>, params: Vec<HirParam>, body: Vec<HirStmt>) -> Self {
        Self {
            name: name.into(),
            params: SmallVec::from_vec(params),
            return_annotation: None,
            body,
            decorators: Vec::new(),
            is_async: false,
        }
    }

    pub fn returning(mut self, annotation: impl Into<String>) -> Self {
        self.return_annotation = Some(annotation.into());
        self
    }

    pub fn decorated(mut self, decorator: impl Into<String>) -> Self {
        self.decorators.push(decorator.into());
        self
    }

    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators.iter().any(|d| d == name)
    }

    pub fn is_property(&self) -> bool {
        self.has_decorator("property")
    }

    pub fn is_staticmethod(&self) -> bool {
        self.has_decorator("staticmethod")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirClass {
    pub name: String,
    pub bases: Vec<String>,
    pub decorators: Vec<String>,
    pub body: Vec<HirStmt>,
}

impl HirClass {
    pub fn new(name: impl Into<String>, body: Vec<HirStmt>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            decorators: Vec::new(),
            body,
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    pub fn methods(&self) -> impl Iterator<Item = &HirFunction> {
        self.body.iter().filter_map(|stmt| match stmt {
            HirStmt::FunctionDef(func) => Some(func),
            _ => None,
        })
    }

    pub fn init(&self) -> Option<&HirFunction> {
        self.methods().find(|m| m.name == "__init__")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssignTarget {
    Symbol(String),
    Attribute { value: Box<HirExpr>, attr: String },
    Index { base: Box<HirExpr>, index: Box<HirExpr> },
    Tuple(Vec<AssignTarget>),
    Starred(Box<AssignTarget>),
}

impl AssignTarget {
    pub fn symbol(name: impl Into<String>) -> Self {
        AssignTarget::Symbol(name.into())
    }

    /// Every plain name bound by this target, including tuple elements.
    pub fn bound_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            AssignTarget::Symbol(name) => out.push(name),
            AssignTarget::Tuple(items) => items.iter().for_each(|t| t.collect_names(out)),
            AssignTarget::Starred(inner) => inner.collect_names(out),
            AssignTarget::Attribute { .. } | AssignTarget::Index { .. } => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptHandler {
    /// Exception class name as written (`ValueError`, `socket.error`).
    pub exception: Option<String>,
    pub name: Option<String>,
    pub body: Vec<HirStmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithItem {
    pub context: HirExpr,
    pub target: Option<AssignTarget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirStmt {
    /// `a = b = value`; more than one target for chained assignment.
    Assign {
        targets: Vec<AssignTarget>,
        value: HirExpr,
    },
    AnnAssign {
        target: AssignTarget,
        annotation: String,
        value: Option<HirExpr>,
    },
    AugAssign {
        target: AssignTarget,
        op: BinOp,
        value: HirExpr,
    },
    Expr(HirExpr),
    Return(Option<HirExpr>),
    If {
        condition: HirExpr,
        then_body: Vec<HirStmt>,
        else_body: Vec<HirStmt>,
    },
    While {
        condition: HirExpr,
        body: Vec<HirStmt>,
        orelse: Vec<HirStmt>,
    },
    For {
        target: AssignTarget,
        iter: HirExpr,
        body: Vec<HirStmt>,
        orelse: Vec<HirStmt>,
    },
    FunctionDef(HirFunction),
    ClassDef(HirClass),
    Try {
        body: Vec<HirStmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<HirStmt>,
        finalbody: Vec<HirStmt>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<HirStmt>,
    },
    Raise(Option<HirExpr>),
    Assert {
        test: HirExpr,
        msg: Option<HirExpr>,
    },
    Import(Vec<ImportName>),
    ImportFrom {
        module: String,
        names: Vec<ImportName>,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Delete(Vec<HirExpr>),
    Pass,
    Break,
    Continue,
}

impl HirStmt {
    pub fn assign(name: impl Into<String>, value: HirExpr) -> Self {
        HirStmt::Assign {
            targets: vec![AssignTarget::Symbol(name.into())],
            value,
        }
    }

    /// Nested statement blocks, in source order (not function/class bodies).
    pub fn child_blocks(&self) -> Vec<&[HirStmt]> {
        match self {
            HirStmt::If {
                then_body, else_body, ..
            } => vec![then_body.as_slice(), else_body.as_slice()],
            HirStmt::While { body, orelse, .. } | HirStmt::For { body, orelse, .. } => {
                vec![body.as_slice(), orelse.as_slice()]
            }
            HirStmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                let mut blocks: Vec<&[HirStmt]> = vec![body.as_slice()];
                blocks.extend(handlers.iter().map(|h| h.body.as_slice()));
                blocks.push(orelse.as_slice());
                blocks.push(finalbody.as_slice());
                blocks
            }
            HirStmt::With { body, .. } => vec![body.as_slice()],
            _ => Vec::new(),
        }
    }

    /// Expressions evaluated by this statement itself, excluding nested
    /// blocks. For a function definition these are its parameter defaults.
    pub fn expressions(&self) -> Vec<&HirExpr> {
        let mut out = Vec::new();
        match self {
            HirStmt::Assign { targets, value } => {
                targets.iter().for_each(|t| t.collect_exprs(&mut out));
                out.push(value);
            }
            HirStmt::AnnAssign { target, value, .. } => {
                target.collect_exprs(&mut out);
                out.extend(value.iter());
            }
            HirStmt::AugAssign { target, value, .. } => {
                target.collect_exprs(&mut out);
                out.push(value);
            }
            HirStmt::Expr(expr) => out.push(expr),
            HirStmt::Return(value) | HirStmt::Raise(value) => out.extend(value.iter()),
            HirStmt::If { condition, .. } | HirStmt::While { condition, .. } => out.push(condition),
            HirStmt::For { target, iter, .. } => {
                target.collect_exprs(&mut out);
                out.push(iter);
            }
            HirStmt::With { items, .. } => {
                for item in items {
                    out.push(&item.context);
                    if let Some(target) = &item.target {
                        target.collect_exprs(&mut out);
                    }
                }
            }
            HirStmt::Assert { test, msg } => {
                out.push(test);
                out.extend(msg.iter());
            }
            HirStmt::Delete(exprs) => out.extend(exprs.iter()),
            HirStmt::FunctionDef(func) => out.extend(func.params.iter().filter_map(|p| p.default.as_ref())),
            _ => {}
        }
        out
    }
}

impl AssignTarget {
    /// Expressions read when storing through this target (`obj` in
    /// `obj.x = v`, `xs` and `i` in `xs[i] = v`).
    fn collect_exprs<'a>(&'a self, out: &mut Vec<&'a HirExpr>) {
        match self {
            AssignTarget::Symbol(_) => {}
            AssignTarget::Attribute { value, .. } => out.push(value),
            AssignTarget::Index { base, index } => {
                out.push(base);
                out.push(index);
            }
            AssignTarget::Tuple(items) => items.iter().for_each(|t| t.collect_exprs(out)),
            AssignTarget::Starred(inner) => inner.collect_exprs(out),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    /// Integer literal that does not fit in 64 bits, kept as decimal text.
    BigInt(String),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Bool(bool),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    MatMul,
    LShift,
    RShift,
    BitAnd,
    BitOr,
    BitXor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Is,
    IsNot,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comprehension {
    pub target: AssignTarget,
    pub iter: HirExpr,
    pub conditions: Vec<HirExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FStringPart {
    Literal(String),
    Expr(Box<HirExpr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirExpr {
    Literal(Literal),
    Var(String),
    Binary {
        op: BinOp,
        left: Box<HirExpr>,
        right: Box<HirExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<HirExpr>,
    },
    Compare {
        left: Box<HirExpr>,
        ops: Vec<CmpOp>,
        comparators: Vec<HirExpr>,
    },
    BoolOp {
        op: BoolOp,
        values: Vec<HirExpr>,
    },
    /// Call whose callee is a bare name: `len(x)`, `Point(1, 2)`.
    Call {
        func: String,
        args: Vec<HirExpr>,
        kwargs: Vec<(String, HirExpr)>,
    },
    /// Call whose callee is an attribute: `s.upper()`, `math.sqrt(x)`.
    MethodCall {
        object: Box<HirExpr>,
        method: String,
        args: Vec<HirExpr>,
        kwargs: Vec<(String, HirExpr)>,
    },
    /// Call of any other callee expression: `handlers[0](x)`.
    DynamicCall {
        callee: Box<HirExpr>,
        args: Vec<HirExpr>,
    },
    Attribute {
        value: Box<HirExpr>,
        attr: String,
    },
    Index {
        base: Box<HirExpr>,
        index: Box<HirExpr>,
    },
    Slice {
        base: Box<HirExpr>,
        start: Option<Box<HirExpr>>,
        stop: Option<Box<HirExpr>>,
        step: Option<Box<HirExpr>>,
    },
    List(Vec<HirExpr>),
    Tuple(Vec<HirExpr>),
    Set(Vec<HirExpr>),
    Dict(Vec<(HirExpr, HirExpr)>),
    ListComp {
        element: Box<HirExpr>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        element: Box<HirExpr>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<HirExpr>,
        value: Box<HirExpr>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        element: Box<HirExpr>,
        generators: Vec<Comprehension>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<HirExpr>,
    },
    IfExpr {
        test: Box<HirExpr>,
        body: Box<HirExpr>,
        orelse: Box<HirExpr>,
    },
    FString(Vec<FStringPart>),
    Await(Box<HirExpr>),
    Yield(Option<Box<HirExpr>>),
    Starred(Box<HirExpr>),
}

impl HirExpr {
    pub fn var(name: impl Into<String>) -> Self {
        HirExpr::Var(name.into())
    }

    pub fn int(value: i64) -> Self {
        HirExpr::Literal(Literal::Int(value))
    }

    pub fn float(value: f64) -> Self {
        HirExpr::Literal(Literal::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        HirExpr::Literal(Literal::String(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        HirExpr::Literal(Literal::Bool(value))
    }

    pub fn binary(op: BinOp, left: HirExpr, right: HirExpr) -> Self {
        HirExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(func: impl Into<String>, args: Vec<HirExpr>) -> Self {
        HirExpr::Call {
            func: func.into(),
            args,
            kwargs: Vec::new(),
        }
    }

    pub fn method(object: HirExpr, method: impl Into<String>, args: Vec<HirExpr>) -> Self {
        HirExpr::MethodCall {
            object: Box::new(object),
            method: method.into(),
            args,
            kwargs: Vec::new(),
        }
    }

    pub fn attr(value: HirExpr, attr: impl Into<String>) -> Self {
        HirExpr::Attribute {
            value: Box::new(value),
            attr: attr.into(),
        }
    }

    pub fn index(base: HirExpr, index: HirExpr) -> Self {
        HirExpr::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    /// Literal integer value, looking through a unary minus.
    pub fn as_int_literal(&self) -> Option<i64> {
        match self {
            HirExpr::Literal(Literal::Int(n)) => Some(*n),
            HirExpr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => operand.as_int_literal().and_then(i64::checked_neg),
            HirExpr::Unary {
                op: UnaryOp::Pos,
                operand,
            } => operand.as_int_literal(),
            _ => None,
        }
    }

    /// The literal behind a constant expression, looking through a sign.
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            HirExpr::Literal(lit) => Some(lit),
            HirExpr::Unary {
                op: UnaryOp::Neg | UnaryOp::Pos,
                operand,
            } => match operand.as_ref() {
                HirExpr::Literal(lit @ (Literal::Int(_) | Literal::Float(_) | Literal::BigInt(_))) => Some(lit),
                _ => None,
            },
            _ => None,
        }
    }

    /// Direct sub-expressions, in evaluation order. Lambda bodies and
    /// comprehension parts are included.
    pub fn children(&self) -> Vec<&HirExpr> {
        fn comps<'a>(out: &mut Vec<&'a HirExpr>, generators: &'a [Comprehension]) {
            for g in generators {
                out.push(&g.iter);
                out.extend(g.conditions.iter());
            }
        }

        let mut out = Vec::new();
        match self {
            HirExpr::Literal(_) | HirExpr::Var(_) => {}
            HirExpr::Binary { left, right, .. } => {
                out.push(left.as_ref());
                out.push(right.as_ref());
            }
            HirExpr::Unary { operand, .. } => out.push(operand.as_ref()),
            HirExpr::Compare {
                left, comparators, ..
            } => {
                out.push(left.as_ref());
                out.extend(comparators.iter());
            }
            HirExpr::BoolOp { values, .. }
            | HirExpr::List(values)
            | HirExpr::Tuple(values)
            | HirExpr::Set(values) => out.extend(values.iter()),
            HirExpr::Call { args, kwargs, .. } => {
                out.extend(args.iter());
                out.extend(kwargs.iter().map(|(_, v)| v));
            }
            HirExpr::MethodCall {
                object, args, kwargs, ..
            } => {
                out.push(object.as_ref());
                out.extend(args.iter());
                out.extend(kwargs.iter().map(|(_, v)| v));
            }
            HirExpr::DynamicCall { callee, args } => {
                out.push(callee.as_ref());
                out.extend(args.iter());
            }
            HirExpr::Attribute { value, .. } => out.push(value.as_ref()),
            HirExpr::Index { base, index } => {
                out.push(base.as_ref());
                out.push(index.as_ref());
            }
            HirExpr::Slice {
                base,
                start,
                stop,
                step,
            } => {
                out.push(base.as_ref());
                out.extend([start, stop, step].into_iter().flatten().map(|e| e.as_ref()));
            }
            HirExpr::Dict(items) => {
                for (k, v) in items {
                    out.push(k);
                    out.push(v);
                }
            }
            HirExpr::ListComp {
                element,
                generators,
            }
            | HirExpr::SetComp {
                element,
                generators,
            }
            | HirExpr::GeneratorExp {
                element,
                generators,
            } => {
                comps(&mut out, generators);
                out.push(element.as_ref());
            }
            HirExpr::DictComp {
                key,
                value,
                generators,
            } => {
                comps(&mut out, generators);
                out.push(key.as_ref());
                out.push(value.as_ref());
            }
            HirExpr::Lambda { body, .. } => out.push(body.as_ref()),
            HirExpr::IfExpr { test, body, orelse } => {
                out.push(test.as_ref());
                out.push(body.as_ref());
                out.push(orelse.as_ref());
            }
            HirExpr::FString(parts) => out.extend(parts.iter().filter_map(|p| match p {
                FStringPart::Expr(e) => Some(e.as_ref()),
                FStringPart::Literal(_) => None,
            })),
            HirExpr::Await(inner) | HirExpr::Starred(inner) => out.push(inner.as_ref()),
            HirExpr::Yield(inner) => out.extend(inner.as_deref()),
        }
        out
    }

    /// Names bound inside this expression that are private to it:
    /// comprehension targets and lambda parameters.
    pub fn inner_bindings(&self) -> Vec<&str> {
        match self {
            HirExpr::ListComp { generators, .. }
            | HirExpr::SetComp { generators, .. }
            | HirExpr::GeneratorExp { generators, .. }
            | HirExpr::DictComp { generators, .. } => generators
                .iter()
                .flat_map(|g| g.target.bound_names())
                .collect(),
            HirExpr::Lambda { params, .. } => params.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Dotted name of a pure attribute chain: `os.path` for `os.path`.
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            HirExpr::Var(name) => Some(name.clone()),
            HirExpr::Attribute { value, attr } => value.dotted_name().map(|base| format!("{base}.{attr}")),
            _ => None,
        }
    }
}
