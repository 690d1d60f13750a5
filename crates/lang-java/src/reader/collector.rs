use super::signature;
use ristretto_classfile::FieldType;
use std::collections::BTreeSet;

/// Whether a reference is part of what other units can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub(crate) fn of(is_private: bool) -> Self {
        if is_private {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }
}

/// Accumulates referenced class names into the public and private sets.
#[derive(Debug, Default)]
pub(crate) struct Collector {
    public: BTreeSet<String>,
    private: BTreeSet<String>,
}

impl Collector {
    pub(crate) fn add(&mut self, visibility: Visibility, class_name: &str) {
        if class_name.is_empty() {
            return;
        }
        let set = match visibility {
            Visibility::Public => &mut self.public,
            Visibility::Private => &mut self.private,
        };
        set.insert(class_name.to_string());
    }

    /// Arrays contribute their element type, primitives nothing.
    pub(crate) fn add_field_type(&mut self, visibility: Visibility, field_type: &FieldType) {
        match field_type {
            FieldType::Object(name) => self.add(visibility, name),
            FieldType::Array(component) => self.add_field_type(visibility, component),
            FieldType::Base(_) => {}
        }
    }

    pub(crate) fn add_signature(
        &mut self,
        visibility: Visibility,
        signature: &str,
    ) -> Result<(), String> {
        for class_name in signature::referenced_types(signature)? {
            self.add(visibility, &class_name);
        }
        Ok(())
    }

    /// Class constants name either a class or, for array types, a descriptor.
    pub(crate) fn add_class_constant(
        &mut self,
        visibility: Visibility,
        class_name: &str,
    ) -> Result<(), String> {
        if class_name.starts_with('[') {
            self.add_signature(visibility, class_name)
        } else {
            self.add(visibility, class_name);
            Ok(())
        }
    }

    pub(crate) fn into_sets(self) -> (BTreeSet<String>, BTreeSet<String>) {
        (self.public, self.private)
    }
}
