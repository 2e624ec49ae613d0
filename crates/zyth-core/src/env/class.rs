use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::types::{widen, NativeType};

/// Registry entry for one user class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    /// Direct base classes in declaration order.
    pub bases: Vec<String>,
    pub fields: IndexMap<String, NativeType>,
    /// Method name to return type.
    pub methods: IndexMap<String, NativeType>,
    /// Methods decorated with `@property`, read as attributes.
    pub properties: IndexSet<String>,
}

impl ClassInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_bases(mut self, bases: Vec<String>) -> Self {
        self.bases = bases;
        self
    }

    /// Record a field type, widening with any type already recorded.
    pub fn widen_field(&mut self, field: &str, ty: NativeType) {
        match self.fields.get_mut(field) {
            Some(existing) => *existing = widen(existing, &ty),
            None => {
                self.fields.insert(field.to_string(), ty);
            }
        }
    }

    /// Replace a field type outright.
    pub fn set_field(&mut self, field: &str, ty: NativeType) {
        self.fields.insert(field.to_string(), ty);
    }

    pub fn set_method_return(&mut self, method: &str, ty: NativeType) {
        self.methods.insert(method.to_string(), ty);
    }

    pub fn mark_property(&mut self, method: &str) {
        self.properties.insert(method.to_string());
    }

    pub fn is_property(&self, method: &str) -> bool {
        self.properties.contains(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widen_field_merges() {
        let mut info = ClassInfo::new("Counter");
        info.widen_field("count", NativeType::Usize);
        info.widen_field("count", NativeType::Int);
        assert_eq!(info.fields["count"], NativeType::Int);

        info.set_field("count", NativeType::Float);
        assert_eq!(info.fields["count"], NativeType::Float);
    }

    #[test]
    fn test_properties() {
        let mut info = ClassInfo::new("Circle").with_bases(vec!["Shape".into()]);
        info.mark_property("area");
        assert!(info.is_property("area"));
        assert!(!info.is_property("scale"));
        assert_eq!(info.bases, vec!["Shape".to_string()]);
    }
}
