//! Dict mutation handlers

use super::{refine_element_type, MutationHandler};
use crate::types::NativeType;

/// `d.update(other)`
pub struct DictUpdateMutation;

impl MutationHandler for DictUpdateMutation {
    fn method_name(&self) -> &'static str {
        "update"
    }

    fn compute_type(&self, current: &NativeType, args: &[NativeType]) -> Option<NativeType> {
        let NativeType::Dict { key, value } = current else {
            return None;
        };
        match args.first() {
            Some(NativeType::Dict {
                key: new_key,
                value: new_value,
            }) => Some(NativeType::dict(
                refine_element_type(key, new_key),
                refine_element_type(value, &new_value.as_ref().clone().into_owned()),
            )),
            _ => Some(current.clone()),
        }
    }
}

/// `d.setdefault(k, default)`
pub struct SetDefaultMutation;

impl MutationHandler for SetDefaultMutation {
    fn method_name(&self) -> &'static str {
        "setdefault"
    }

    fn compute_type(&self, current: &NativeType, args: &[NativeType]) -> Option<NativeType> {
        let NativeType::Dict { key, value } = current else {
            return None;
        };
        let value = match args.get(1) {
            Some(default) => refine_element_type(value, &default.clone().into_owned()),
            None => value.as_ref().clone(),
        };
        Some(NativeType::dict(key.as_ref().clone(), value))
    }
}

/// Removal keeps key and value types: `pop`, `popitem`, `clear`.
pub struct DictShapePreserving(pub &'static str);

pub const POP: DictShapePreserving = DictShapePreserving("pop");
pub const POPITEM: DictShapePreserving = DictShapePreserving("popitem");
pub const CLEAR: DictShapePreserving = DictShapePreserving("clear");

impl MutationHandler for DictShapePreserving {
    fn method_name(&self) -> &'static str {
        self.0
    }

    fn compute_type(&self, current: &NativeType, _args: &[NativeType]) -> Option<NativeType> {
        matches!(current, NativeType::Dict { .. }).then(|| current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setdefault_refines_value() {
        let dict = NativeType::dict(NativeType::string(), NativeType::Unknown);
        assert_eq!(
            SetDefaultMutation.compute_type(
                &dict,
                &[NativeType::literal_string(), NativeType::list(NativeType::Unknown)]
            ),
            Some(NativeType::dict(
                NativeType::string(),
                NativeType::list(NativeType::Unknown)
            ))
        );
    }

    #[test]
    fn test_update_with_non_dict_keeps_type() {
        let dict = NativeType::dict(NativeType::string(), NativeType::Int);
        assert_eq!(
            DictUpdateMutation.compute_type(&dict, &[NativeType::Unknown]),
            Some(dict.clone())
        );
    }
}
