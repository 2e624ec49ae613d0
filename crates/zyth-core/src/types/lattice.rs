//! Widening lattice over native types
//!
//! `widen` is the join used wherever two control-flow paths must agree on
//! one representation:
//! - Unknown is the identity for join, and absorbing only against itself
//! - Strings dominate everything else
//! - Numeric promotion: index < int < big int < float
//! - Function-like values meet at the type-erased callable
//! - Anything else that disagrees falls to Unknown

use super::{NativeType, StringKind};

/// Merge two types into one that can represent both. Total and symmetric.
pub fn widen(a: &NativeType, b: &NativeType) -> NativeType {
    use NativeType::*;

    match (a, b) {
        (Unknown, Unknown) => Unknown,
        (Unknown, t) | (t, Unknown) => t.clone(),

        (Str(k1), Str(k2)) if k1 == k2 => Str(*k1),
        (Str(_), _) | (_, Str(_)) => Str(StringKind::Runtime),

        (Float, t) | (t, Float) if t.is_numeric() => Float,
        (BigInt, t) | (t, BigInt) if t.is_integer() => BigInt,
        (Int, Usize) | (Usize, Int) => Int,

        (None, None) => None,
        (Optional(x), Optional(y)) => NativeType::optional(widen(x, y)),
        (Optional(x), None) | (None, Optional(x)) => Optional(x.clone()),
        (Optional(x), t) | (t, Optional(x)) => NativeType::optional(widen(x, t)),
        (None, t) | (t, None) => NativeType::optional(t.clone()),

        (Array { elem: e1, len: l1 }, Array { elem: e2, len: l2 }) => {
            if l1 == l2 {
                NativeType::array(widen(e1, e2), *l1)
            } else {
                NativeType::list(widen(e1, e2))
            }
        }
        (List(e1), List(e2)) => NativeType::list(widen(e1, e2)),
        (List(e1), Array { elem: e2, .. }) | (Array { elem: e2, .. }, List(e1)) => {
            NativeType::list(widen(e1, e2))
        }
        (Dict { key: k1, value: v1 }, Dict { key: k2, value: v2 }) => {
            NativeType::dict(widen(k1, k2), widen(v1, v2))
        }
        (Set(e1), Set(e2)) => NativeType::set(widen(e1, e2)),
        (Tuple(t1), Tuple(t2)) if t1.len() == t2.len() => {
            Tuple(t1.iter().zip(t2).map(|(x, y)| widen(x, y)).collect())
        }

        (x, y) if x.is_function_like() && y.is_function_like() => {
            if x == y {
                x.clone()
            } else {
                Callable
            }
        }

        (x, y) if x == y => x.clone(),
        _ => Unknown,
    }
}

/// Fold `widen` over a sequence. An empty sequence widens to Unknown.
pub fn widen_all<'a>(types: impl IntoIterator<Item = &'a NativeType>) -> NativeType {
    types
        .into_iter()
        .fold(NativeType::Unknown, |acc, ty| widen(&acc, ty))
}

/// Result type of an arithmetic operator over two numeric operands, with
/// booleans counting as integers. `None` when either side is not numeric.
pub fn numeric_promotion(a: &NativeType, b: &NativeType) -> Option<NativeType> {
    let as_number = |t: &NativeType| match t {
        NativeType::Bool => Some(NativeType::Int),
        t if t.is_numeric() => Some(t.clone()),
        _ => Option::None,
    };
    let (a, b) = (as_number(a)?, as_number(b)?);
    Some(widen(&a, &b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LibraryType;

    #[test]
    fn test_unknown_is_identity() {
        assert_eq!(widen(&NativeType::Unknown, &NativeType::Int), NativeType::Int);
        assert_eq!(widen(&NativeType::Float, &NativeType::Unknown), NativeType::Float);
        assert_eq!(
            widen(&NativeType::Unknown, &NativeType::Unknown),
            NativeType::Unknown
        );
    }

    #[test]
    fn test_string_dominates() {
        assert_eq!(
            widen(&NativeType::literal_string(), &NativeType::Int),
            NativeType::string()
        );
        assert_eq!(
            widen(&NativeType::literal_string(), &NativeType::slice_string()),
            NativeType::string()
        );
        assert_eq!(
            widen(&NativeType::literal_string(), &NativeType::literal_string()),
            NativeType::literal_string()
        );
    }

    #[test]
    fn test_numeric_tower() {
        assert_eq!(widen(&NativeType::Int, &NativeType::BigInt), NativeType::BigInt);
        assert_eq!(widen(&NativeType::Usize, &NativeType::BigInt), NativeType::BigInt);
        assert_eq!(widen(&NativeType::BigInt, &NativeType::Float), NativeType::Float);
        assert_eq!(widen(&NativeType::Usize, &NativeType::Int), NativeType::Int);
        assert_eq!(widen(&NativeType::Usize, &NativeType::Usize), NativeType::Usize);
    }

    #[test]
    fn test_function_like_meet_at_callable() {
        let f = NativeType::function(vec![NativeType::Int], NativeType::Int);
        let g = NativeType::function(vec![], NativeType::string());
        assert_eq!(widen(&f, &f), f);
        assert_eq!(widen(&f, &g), NativeType::Callable);
        assert_eq!(
            widen(&f, &NativeType::Closure("outer.inner".into())),
            NativeType::Callable
        );
        assert_eq!(widen(&NativeType::Callable, &g), NativeType::Callable);
    }

    #[test]
    fn test_containers_widen_elementwise() {
        let a = NativeType::array(NativeType::Int, 3);
        let b = NativeType::array(NativeType::Float, 3);
        assert_eq!(widen(&a, &b), NativeType::array(NativeType::Float, 3));

        let short = NativeType::array(NativeType::Int, 2);
        assert_eq!(widen(&a, &short), NativeType::list(NativeType::Int));
        assert_eq!(
            widen(&a, &NativeType::list(NativeType::Unknown)),
            NativeType::list(NativeType::Int)
        );

        let t1 = NativeType::Tuple(vec![NativeType::Int, NativeType::Bool]);
        let t2 = NativeType::Tuple(vec![NativeType::Bool]);
        assert_eq!(widen(&t1, &t2), NativeType::Unknown);
    }

    #[test]
    fn test_none_forms_optional() {
        assert_eq!(
            widen(&NativeType::None, &NativeType::Int),
            NativeType::optional(NativeType::Int)
        );
        assert_eq!(
            widen(&NativeType::optional(NativeType::Int), &NativeType::Float),
            NativeType::optional(NativeType::Float)
        );
        assert_eq!(
            widen(&NativeType::None, &NativeType::optional(NativeType::Bool)),
            NativeType::optional(NativeType::Bool)
        );
    }

    #[test]
    fn test_mismatched_nominal_types_are_unknown() {
        assert_eq!(
            widen(&NativeType::instance("A"), &NativeType::instance("B")),
            NativeType::Unknown
        );
        assert_eq!(
            widen(&NativeType::Library(LibraryType::File), &NativeType::Int),
            NativeType::Unknown
        );
        assert_eq!(widen(&NativeType::Bool, &NativeType::Int), NativeType::Unknown);
    }

    #[test]
    fn test_widen_all_and_numeric_promotion() {
        let types = [NativeType::Int, NativeType::Usize, NativeType::Int];
        assert_eq!(widen_all(types.iter()), NativeType::Int);
        assert_eq!(widen_all(std::iter::empty()), NativeType::Unknown);

        assert_eq!(
            numeric_promotion(&NativeType::Bool, &NativeType::Float),
            Some(NativeType::Float)
        );
        assert_eq!(numeric_promotion(&NativeType::string(), &NativeType::Int), None);
    }
}
