use indexmap::IndexMap;

use super::{stdlib, Inferencer};
use crate::hir::{AssignTarget, BinOp, Comprehension, HirExpr, Literal, UnaryOp};
use crate::types::{numeric_promotion, widen, widen_all, NativeType};

impl Inferencer<'_> {
    /// Native type of `expr` at the current position. Never fails: anything
    /// that cannot be resolved is [`NativeType::Unknown`].
    pub fn infer_expr(&mut self, expr: &HirExpr) -> NativeType {
        match expr {
            HirExpr::Literal(lit) => literal_type(lit),
            HirExpr::Var(name) => self.lookup_name(name),
            HirExpr::Binary { op, left, right } => {
                let left = self.infer_expr(left);
                let right = self.infer_expr(right);
                self.binary_type(*op, &left, &right)
            }
            HirExpr::Unary { op, operand } => {
                let operand = self.infer_expr(operand);
                unary_type(*op, operand)
            }
            HirExpr::Compare { .. } => NativeType::Bool,
            HirExpr::BoolOp { values, .. } => {
                let types: Vec<_> = values.iter().map(|v| self.infer_expr(v)).collect();
                widen_all(types.iter())
            }
            HirExpr::Call { func, args, kwargs } => self.call_type(func, args, kwargs),
            HirExpr::MethodCall {
                object,
                method,
                args,
                ..
            } => self.method_call_type(object, method, args),
            HirExpr::DynamicCall { callee, args } => self.dynamic_call_type(callee, args),
            HirExpr::Attribute { value, attr } => self.attribute_type(value, attr),
            HirExpr::Index { base, index } => {
                let base = self.infer_expr(base);
                self.index_type(&base, index)
            }
            HirExpr::Slice {
                base,
                start,
                stop,
                step,
            } => {
                let base = self.infer_expr(base);
                slice_type(&base, start.as_deref(), stop.as_deref(), step.as_deref())
            }
            HirExpr::List(items) => self.list_literal(items),
            HirExpr::Tuple(items) => NativeType::Tuple(items.iter().map(|e| self.infer_expr(e)).collect()),
            HirExpr::Set(items) => {
                let types: Vec<_> = items.iter().map(|e| self.infer_expr(e)).collect();
                NativeType::set(widen_all(types.iter()).into_owned())
            }
            HirExpr::Dict(items) => self.dict_literal(items),
            HirExpr::ListComp {
                element,
                generators,
            }
            | HirExpr::GeneratorExp {
                element,
                generators,
            } => {
                let elem = self.with_generators(generators, |inf| inf.infer_expr(element));
                NativeType::list(elem.into_owned())
            }
            HirExpr::SetComp {
                element,
                generators,
            } => {
                let elem = self.with_generators(generators, |inf| inf.infer_expr(element));
                NativeType::set(elem.into_owned())
            }
            HirExpr::DictComp {
                key,
                value,
                generators,
            } => self.with_generators(generators, |inf| {
                let key = inf.infer_expr(key);
                let value = inf.infer_expr(value);
                NativeType::dict(key.into_owned(), value.into_owned())
            }),
            // Parameters of a lambda are taken to be ints; there is no call
            // site information to do better.
            HirExpr::Lambda { params, .. } => {
                NativeType::function(vec![NativeType::Int; params.len()], NativeType::Int)
            }
            HirExpr::IfExpr { body, orelse, .. } => {
                let body = self.infer_expr(body);
                let orelse = self.infer_expr(orelse);
                widen(&body, &orelse)
            }
            HirExpr::FString(_) => NativeType::string(),
            HirExpr::Await(inner) | HirExpr::Starred(inner) => self.infer_expr(inner),
            HirExpr::Yield(_) => NativeType::Unknown,
        }
    }

    pub(crate) fn binary_type(&self, op: BinOp, left: &NativeType, right: &NativeType) -> NativeType {
        use NativeType::*;

        if op == BinOp::Div {
            return Float;
        }
        if let Instance(class) = left {
            if let Some(ret) = magic_method(op).and_then(|m| self.env.class_method_return(class, m)) {
                return ret.clone();
            }
        }
        match (op, left, right) {
            (BinOp::Add, l, r) if l.is_string() || r.is_string() => NativeType::string(),
            (BinOp::Add, List(a) | Array { elem: a, .. }, List(b) | Array { elem: b, .. }) => {
                NativeType::list(widen(a, b).into_owned())
            }
            (BinOp::Add, Tuple(a), Tuple(b)) => Tuple(a.iter().chain(b).cloned().collect()),
            (BinOp::Mul, Str(_), r) | (BinOp::Mul, r, Str(_)) if r.is_integer() || *r == Bool => {
                NativeType::string()
            }
            (BinOp::Mul, List(elem) | Array { elem, .. }, r) if r.is_integer() => {
                NativeType::list(elem.as_ref().clone().into_owned())
            }
            (BinOp::Mod, Str(_), _) => NativeType::string(),
            (BinOp::BitOr | BinOp::BitAnd | BinOp::Sub | BinOp::BitXor, Set(a), Set(b)) => {
                NativeType::set(widen(a, b))
            }
            (BinOp::BitOr, Dict { .. }, Dict { .. }) => widen(left, right).into_owned(),
            (BinOp::LShift | BinOp::RShift | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor, l, r)
                if matches!(l, Int | Bool | Usize) && matches!(r, Int | Bool | Usize) =>
            {
                Int
            }
            (_, l, r) => numeric_promotion(l, r).unwrap_or_else(|| widen(l, r)),
        }
    }

    pub(crate) fn index_type(&mut self, base: &NativeType, index: &HirExpr) -> NativeType {
        match base {
            NativeType::Str(_) => NativeType::slice_string(),
            NativeType::Array { elem, .. } | NativeType::List(elem) => elem.as_ref().clone(),
            NativeType::Dict { value, .. } => value.as_ref().clone(),
            NativeType::Tuple(items) => index
                .as_int_literal()
                .and_then(|i| tuple_position(items.len(), i))
                .map(|i| items[i].clone())
                .unwrap_or(NativeType::Unknown),
            NativeType::Optional(inner) => {
                let inner = inner.as_ref().clone();
                self.index_type(&inner, index)
            }
            NativeType::Instance(class) => self
                .env
                .class_method_return(class, "__getitem__")
                .cloned()
                .unwrap_or_default(),
            _ => NativeType::Unknown,
        }
    }

    fn attribute_type(&mut self, value: &HirExpr, attr: &str) -> NativeType {
        if let Some(module) = value.dotted_name().and_then(|d| self.module_path(&d)) {
            return stdlib::module_constant(&format!("{}.{}", module, attr)).unwrap_or_default();
        }
        // Class attribute through the class name itself: `Config.retries`.
        if let HirExpr::Var(name) = value {
            if self.env.is_class(name) && !self.is_bound(name) {
                return self.env.class_field(name, attr).cloned().unwrap_or_default();
            }
        }
        match self.infer_expr(value) {
            NativeType::Instance(class) => self.instance_attribute(&class, attr),
            NativeType::Library(lib) => stdlib::library_attribute(&lib, attr).unwrap_or_default(),
            NativeType::Float if matches!(attr, "real" | "imag") => NativeType::Float,
            NativeType::Int if matches!(attr, "real" | "numerator" | "denominator") => NativeType::Int,
            _ => NativeType::Unknown,
        }
    }

    /// Field, or property result, of an instance of `class`.
    pub(crate) fn instance_attribute(&self, class: &str, attr: &str) -> NativeType {
        if let Some(ty) = self.env.class_field(class, attr) {
            return ty.clone();
        }
        if self.env.is_property(class, attr) {
            return self
                .env
                .class_method_return(class, attr)
                .cloned()
                .unwrap_or_default();
        }
        NativeType::Unknown
    }

    /// A list literal of same-kind literal constants is a fixed array; any
    /// other list literal is growable.
    fn list_literal(&mut self, items: &[HirExpr]) -> NativeType {
        if items.is_empty() {
            return NativeType::list(NativeType::Unknown);
        }
        let types: Vec<_> = items.iter().map(|e| self.infer_expr(e)).collect();
        let all_literals = items.iter().all(|e| e.as_literal().is_some());
        let same_tag = types.windows(2).all(|w| w[0].same_tag(&w[1]));
        if self.config.literal_arrays && all_literals && same_tag {
            return NativeType::array(widen_all(types.iter()), items.len());
        }
        NativeType::list(widen_all(types.iter()).into_owned())
    }

    /// Keys are always strings. Values of more than one kind collapse to
    /// string so one map specialization serves them all.
    fn dict_literal(&mut self, items: &[(HirExpr, HirExpr)]) -> NativeType {
        let mut values = Vec::with_capacity(items.len());
        for (key, value) in items {
            self.infer_expr(key);
            values.push(self.infer_expr(value));
        }
        let known: Vec<_> = values.iter().filter(|t| !t.is_unknown()).collect();
        let mixed = known.windows(2).any(|w| !w[0].same_tag(w[1]));
        let value = if mixed {
            NativeType::string()
        } else {
            widen_all(values.iter()).into_owned()
        };
        NativeType::dict(NativeType::string(), value)
    }

    /// Element type produced by iterating `iter`, with the builtin iteration
    /// helpers understood directly.
    pub(crate) fn iteration_item(&mut self, iter: &HirExpr) -> NativeType {
        match iter {
            HirExpr::Call { func, args, .. } if !self.is_user_callable(func) => match func.as_str() {
                "range" => {
                    return if args.len() == 1 {
                        NativeType::Usize
                    } else {
                        NativeType::Int
                    };
                }
                "enumerate" => {
                    let elem = match args.first() {
                        Some(arg) => self.iteration_item(arg),
                        None => NativeType::Unknown,
                    };
                    return NativeType::Tuple(vec![NativeType::Usize, elem]);
                }
                "zip" => {
                    return NativeType::Tuple(args.iter().map(|a| self.iteration_item(a)).collect());
                }
                "reversed" | "sorted" | "iter" => {
                    if let Some(arg) = args.first() {
                        return self.iteration_item(arg);
                    }
                }
                _ => {}
            },
            HirExpr::MethodCall { object, method, args, .. } if args.is_empty() => {
                if let NativeType::Dict { key, value } = self.infer_expr(object) {
                    match method.as_str() {
                        "items" => return NativeType::Tuple(vec![*key, *value]),
                        "keys" => return *key,
                        "values" => return *value,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        self.infer_expr(iter).iter_element()
    }

    fn is_user_callable(&self, name: &str) -> bool {
        self.is_bound(name) || self.env.resolve_function(name).is_some() || self.env.is_class(name)
    }

    /// Run `f` with each generator's target bound to its iteration item.
    /// Later generators see the targets of earlier ones.
    fn with_generators<R>(&mut self, generators: &[Comprehension], f: impl FnOnce(&mut Self) -> R) -> R {
        let depth = self.overlays.len();
        for generator in generators {
            let item = self.iteration_item(&generator.iter);
            let mut bindings = IndexMap::new();
            for (leaf, ty) in destructure(&generator.target, item) {
                if let AssignTarget::Symbol(name) = leaf {
                    bindings.insert(name.clone(), ty);
                }
            }
            self.overlays.push(bindings);
        }
        let result = f(self);
        self.overlays.truncate(depth);
        result
    }
}

pub(crate) fn literal_type(lit: &Literal) -> NativeType {
    match lit {
        Literal::Int(_) => NativeType::Int,
        Literal::BigInt(_) => NativeType::BigInt,
        Literal::Float(_) => NativeType::Float,
        Literal::String(_) | Literal::Bytes(_) => NativeType::literal_string(),
        Literal::Bool(_) => NativeType::Bool,
        Literal::None => NativeType::None,
    }
}

fn unary_type(op: UnaryOp, operand: NativeType) -> NativeType {
    match (op, operand) {
        (UnaryOp::Not, _) => NativeType::Bool,
        (UnaryOp::Neg | UnaryOp::Pos | UnaryOp::BitNot, NativeType::Bool) => NativeType::Int,
        (UnaryOp::BitNot, NativeType::BigInt) => NativeType::BigInt,
        (UnaryOp::BitNot, NativeType::Unknown) => NativeType::Unknown,
        (UnaryOp::BitNot, _) => NativeType::Int,
        (_, operand) => operand,
    }
}

fn magic_method(op: BinOp) -> Option<&'static str> {
    match op {
        BinOp::Add => Some("__add__"),
        BinOp::Sub => Some("__sub__"),
        BinOp::Mul => Some("__mul__"),
        BinOp::Mod => Some("__mod__"),
        _ => None,
    }
}

/// Resolve a possibly negative literal index against a tuple of `len`.
fn tuple_position(len: usize, index: i64) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let pos = if index < 0 { len + index } else { index };
    (0..len).contains(&pos).then(|| pos as usize)
}

fn slice_type(
    base: &NativeType,
    start: Option<&HirExpr>,
    stop: Option<&HirExpr>,
    step: Option<&HirExpr>,
) -> NativeType {
    match base {
        NativeType::Str(_) => NativeType::slice_string(),
        NativeType::Array { elem, .. } | NativeType::List(elem) => NativeType::list(elem.as_ref().clone()),
        NativeType::Tuple(items) if step.is_none() => {
            let len = items.len() as i64;
            let bound = |expr: Option<&HirExpr>, default: i64| match expr {
                None => Some(default),
                Some(e) => e
                    .as_int_literal()
                    .map(|i| if i < 0 { (len + i).max(0) } else { i.min(len) }),
            };
            match (bound(start, 0), bound(stop, len)) {
                (Some(lo), Some(hi)) if lo <= hi => NativeType::Tuple(items[lo as usize..hi as usize].to_vec()),
                (Some(_), Some(_)) => NativeType::Tuple(Vec::new()),
                _ => NativeType::Unknown,
            }
        }
        _ => NativeType::Unknown,
    }
}

/// Pair every leaf of an assignment target with the type it receives.
/// Tuple targets unpack tuple types position by position; anything else is
/// unpacked element-wise, and a starred leaf collects a list.
pub(crate) fn destructure(target: &AssignTarget, ty: NativeType) -> Vec<(&AssignTarget, NativeType)> {
    let mut out = Vec::new();
    destructure_into(target, ty, &mut out);
    out
}

fn destructure_into<'t>(target: &'t AssignTarget, ty: NativeType, out: &mut Vec<(&'t AssignTarget, NativeType)>) {
    match target {
        AssignTarget::Tuple(items) => {
            let has_star = items.iter().any(|t| matches!(t, AssignTarget::Starred(_)));
            match ty {
                NativeType::Tuple(elems) if !has_star && elems.len() == items.len() => {
                    for (item, elem) in items.iter().zip(elems) {
                        destructure_into(item, elem, out);
                    }
                }
                other => {
                    let elem = other.iter_element();
                    for item in items {
                        destructure_into(item, elem.clone(), out);
                    }
                }
            }
        }
        AssignTarget::Starred(inner) => destructure_into(inner, NativeType::list(ty.into_owned()), out),
        leaf => out.push((leaf, ty)),
    }
}
