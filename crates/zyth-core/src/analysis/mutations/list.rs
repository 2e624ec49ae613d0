//! List mutation handlers

use super::{refine_element_type, MutationHandler};
use crate::types::NativeType;

/// `xs.append(v)`
pub struct AppendMutation;

impl MutationHandler for AppendMutation {
    fn method_name(&self) -> &'static str {
        "append"
    }

    fn compute_type(&self, current: &NativeType, args: &[NativeType]) -> Option<NativeType> {
        let NativeType::List(elem) = current else {
            return None;
        };
        let arg = args.first()?;
        Some(NativeType::list(refine_element_type(elem, &arg.clone().into_owned())))
    }
}

/// `xs.extend(iterable)`
pub struct ExtendMutation;

impl MutationHandler for ExtendMutation {
    fn method_name(&self) -> &'static str {
        "extend"
    }

    fn compute_type(&self, current: &NativeType, args: &[NativeType]) -> Option<NativeType> {
        let NativeType::List(elem) = current else {
            return None;
        };
        let added = args.first()?.iter_element().into_owned();
        Some(NativeType::list(refine_element_type(elem, &added)))
    }
}

/// `xs.insert(i, v)`; the value is the second argument.
pub struct InsertMutation;

impl MutationHandler for InsertMutation {
    fn method_name(&self) -> &'static str {
        "insert"
    }

    fn compute_type(&self, current: &NativeType, args: &[NativeType]) -> Option<NativeType> {
        let NativeType::List(elem) = current else {
            return None;
        };
        let value = args.get(1)?;
        Some(NativeType::list(refine_element_type(elem, &value.clone().into_owned())))
    }
}

/// Removal and reordering keep the element type: `pop`, `remove`, `clear`,
/// `sort`, `reverse`.
pub struct ShapePreservingMutation(pub &'static str);

pub const POP: ShapePreservingMutation = ShapePreservingMutation("pop");
pub const REMOVE: ShapePreservingMutation = ShapePreservingMutation("remove");
pub const CLEAR: ShapePreservingMutation = ShapePreservingMutation("clear");
pub const SORT: ShapePreservingMutation = ShapePreservingMutation("sort");
pub const REVERSE: ShapePreservingMutation = ShapePreservingMutation("reverse");

impl MutationHandler for ShapePreservingMutation {
    fn method_name(&self) -> &'static str {
        self.0
    }

    fn compute_type(&self, current: &NativeType, _args: &[NativeType]) -> Option<NativeType> {
        matches!(current, NativeType::List(_)).then(|| current.clone())
    }
}

/// Method names that mutate a list in place.
pub const LIST_MUTATING_METHODS: &[&str] = &[
    "append", "pop", "extend", "insert", "remove", "clear", "sort", "reverse",
];
