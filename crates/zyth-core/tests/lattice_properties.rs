//! Property tests for the widening lattice and arithmetic result types

use proptest::prelude::*;
use quickcheck::{quickcheck, TestResult};
use zyth_core::hir::{BinOp, HirExpr, HirModule, HirStmt};
use zyth_core::pipeline::Pipeline;
use zyth_core::types::{numeric_promotion, StringKind};
use zyth_core::{widen, InferenceConfig, NativeType};

fn leaf() -> impl Strategy<Value = NativeType> {
    prop_oneof![
        Just(NativeType::Int),
        Just(NativeType::BigInt),
        Just(NativeType::Usize),
        Just(NativeType::Float),
        Just(NativeType::Bool),
        Just(NativeType::Str(StringKind::Literal)),
        Just(NativeType::Str(StringKind::Runtime)),
        Just(NativeType::Str(StringKind::Slice)),
        Just(NativeType::None),
        Just(NativeType::Unknown),
        Just(NativeType::Callable),
        Just(NativeType::Closure("outer.inner".to_string())),
        Just(NativeType::instance("A")),
        Just(NativeType::instance("B")),
    ]
}

fn native_type() -> impl Strategy<Value = NativeType> {
    leaf().prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(NativeType::list),
            inner.clone().prop_map(NativeType::set),
            inner.clone().prop_map(NativeType::optional),
            (inner.clone(), 1usize..4).prop_map(|(elem, len)| NativeType::array(elem, len)),
            (inner.clone(), inner.clone()).prop_map(|(k, v)| NativeType::dict(k, v)),
            prop::collection::vec(inner.clone(), 1..3).prop_map(NativeType::Tuple),
            (prop::collection::vec(inner.clone(), 0..2), inner).prop_map(|(p, r)| NativeType::function(p, r)),
        ]
    })
}

proptest! {
    #[test]
    fn widen_is_commutative(a in native_type(), b in native_type()) {
        prop_assert_eq!(widen(&a, &b), widen(&b, &a));
    }

    #[test]
    fn widen_is_idempotent(a in native_type()) {
        prop_assert_eq!(widen(&a, &a), a);
    }

    #[test]
    fn unknown_is_identity(a in native_type()) {
        prop_assert_eq!(widen(&NativeType::Unknown, &a), a.clone());
        prop_assert_eq!(widen(&a, &NativeType::Unknown), a);
    }

    #[test]
    fn strings_dominate(a in native_type(), kind in prop_oneof![
        Just(StringKind::Literal),
        Just(StringKind::Runtime),
        Just(StringKind::Slice),
    ]) {
        prop_assert!(widen(&NativeType::Str(kind), &a).is_string());
    }
}

fn numeric(selector: u8) -> NativeType {
    match selector % 4 {
        0 => NativeType::Usize,
        1 => NativeType::Int,
        2 => NativeType::BigInt,
        _ => NativeType::Float,
    }
}

fn infer_assignment(value: HirExpr) -> NativeType {
    let module = HirModule::new(vec![HirStmt::assign("x", value)]);
    let env = Pipeline::new(&module, InferenceConfig::default()).run();
    env.get_var("x").cloned().unwrap_or_default()
}

quickcheck! {
    fn true_division_is_float(a: i64, b: i64) -> bool {
        let expr = HirExpr::binary(BinOp::Div, HirExpr::int(a), HirExpr::int(b));
        infer_assignment(expr) == NativeType::Float
    }

    fn float_operand_makes_float_sum(a: i64, b: f64) -> TestResult {
        if !b.is_finite() {
            return TestResult::discard();
        }
        let expr = HirExpr::binary(BinOp::Add, HirExpr::int(a), HirExpr::float(b));
        TestResult::from_bool(infer_assignment(expr) == NativeType::Float)
    }

    fn numeric_promotion_commutes(a: u8, b: u8) -> bool {
        let (a, b) = (numeric(a), numeric(b));
        numeric_promotion(&a, &b) == numeric_promotion(&b, &a)
    }

    fn string_concatenation_stays_string(s: String, n: i64) -> bool {
        let expr = HirExpr::binary(BinOp::Add, HirExpr::string(s), HirExpr::int(n));
        infer_assignment(expr).is_string()
    }
}
