//! Set mutation handlers

use super::{refine_element_type, MutationHandler};
use crate::types::NativeType;

/// `s.add(v)`
pub struct AddMutation;

impl MutationHandler for AddMutation {
    fn method_name(&self) -> &'static str {
        "add"
    }

    fn compute_type(&self, current: &NativeType, args: &[NativeType]) -> Option<NativeType> {
        let NativeType::Set(elem) = current else {
            return None;
        };
        let arg = args.first()?;
        Some(NativeType::set(refine_element_type(elem, &arg.clone().into_owned())))
    }
}

/// `s.update(iterable)`
pub struct SetUpdateMutation;

impl MutationHandler for SetUpdateMutation {
    fn method_name(&self) -> &'static str {
        "update"
    }

    fn compute_type(&self, current: &NativeType, args: &[NativeType]) -> Option<NativeType> {
        let NativeType::Set(elem) = current else {
            return None;
        };
        let added = args.first()?.iter_element().into_owned();
        Some(NativeType::set(refine_element_type(elem, &added)))
    }
}

/// Removal keeps the element type: `discard`, `remove`, `pop`, `clear` and
/// the in-place set algebra updates.
pub struct SetShapePreserving(pub &'static str);

pub const DISCARD: SetShapePreserving = SetShapePreserving("discard");
pub const REMOVE: SetShapePreserving = SetShapePreserving("remove");
pub const POP: SetShapePreserving = SetShapePreserving("pop");
pub const CLEAR: SetShapePreserving = SetShapePreserving("clear");
pub const DIFFERENCE_UPDATE: SetShapePreserving = SetShapePreserving("difference_update");
pub const INTERSECTION_UPDATE: SetShapePreserving = SetShapePreserving("intersection_update");

impl MutationHandler for SetShapePreserving {
    fn method_name(&self) -> &'static str {
        self.0
    }

    fn compute_type(&self, current: &NativeType, _args: &[NativeType]) -> Option<NativeType> {
        matches!(current, NativeType::Set(_)).then(|| current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_refines_element() {
        let set = NativeType::set(NativeType::Unknown);
        assert_eq!(
            AddMutation.compute_type(&set, &[NativeType::Int]),
            Some(NativeType::set(NativeType::Int))
        );
    }

    #[test]
    fn test_update_from_list() {
        let set = NativeType::set(NativeType::Int);
        assert_eq!(
            SetUpdateMutation.compute_type(&set, &[NativeType::list(NativeType::Usize)]),
            Some(NativeType::set(NativeType::Int))
        );
    }

    #[test]
    fn test_discard_only_applies_to_sets() {
        assert_eq!(DISCARD.compute_type(&NativeType::list(NativeType::Int), &[]), None);
    }
}
