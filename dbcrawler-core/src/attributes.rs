//! Attribute bags and accumulated definition text.
//!
//! Both are shared by every catalog entity. Attribute merges overwrite by
//! key, so repeated passes over the same key never grow the bag. Definition
//! text is appended in row-arrival order because vendors split long DDL
//! across rows; running the same facet twice in one session appends twice.

use serde_json::Value;
use std::collections::BTreeMap;

/// Open-ended vendor metadata attached to an entity.
pub type AttributeBag = BTreeMap<String, Value>;

/// An entity carrying an [`AttributeBag`].
pub trait Attributed {
    /// Read access to the bag.
    fn attributes(&self) -> &AttributeBag;

    /// Write access to the bag.
    fn attributes_mut(&mut self) -> &mut AttributeBag;

    /// Copies every pair into the bag, replacing existing keys.
    fn merge_attributes(&mut self, row_attributes: AttributeBag) {
        let bag = self.attributes_mut();
        for (name, value) in row_attributes {
            bag.insert(name, value);
        }
    }

    /// Looks up one attribute.
    fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes().get(name)
    }
}

/// An entity with multi-row definition text.
pub trait Defined {
    /// The accumulated text, if any fragment has arrived.
    fn definition(&self) -> Option<&str>;

    /// Slot holding the accumulated text.
    fn definition_slot(&mut self) -> &mut Option<String>;

    /// Appends a fragment with no delimiter. Absent or empty fragments are
    /// ignored, so an entity with no definition rows keeps `None`.
    fn append_definition(&mut self, fragment: Option<&str>) {
        append_text(self.definition_slot(), fragment);
    }
}

/// Appends `fragment` to `slot`, creating the text on first use.
pub(crate) fn append_text(slot: &mut Option<String>, fragment: Option<&str>) {
    match fragment {
        Some(text) if !text.is_empty() => slot.get_or_insert_with(String::new).push_str(text),
        _ => {}
    }
}

/// Implements [`Attributed`] for structs with an `attributes` field.
macro_rules! impl_attributed {
    ($($entity:ty),* $(,)?) => {
        $(
            impl $crate::attributes::Attributed for $entity {
                fn attributes(&self) -> &$crate::attributes::AttributeBag {
                    &self.attributes
                }

                fn attributes_mut(&mut self) -> &mut $crate::attributes::AttributeBag {
                    &mut self.attributes
                }
            }
        )*
    };
}

/// Implements [`Defined`] for structs with a `definition` field.
macro_rules! impl_defined {
    ($($entity:ty),* $(,)?) => {
        $(
            impl $crate::attributes::Defined for $entity {
                fn definition(&self) -> Option<&str> {
                    self.definition.as_deref()
                }

                fn definition_slot(&mut self) -> &mut Option<String> {
                    &mut self.definition
                }
            }
        )*
    };
}

pub(crate) use {impl_attributed, impl_defined};
