//! Startup-built table of proxy classes and data-type constructors.

use super::catalog::{PROXY_CLASSES, RECORD_TYPES};
use crate::codec::SET_TAG;
use crate::error::{FlapiError, Result};
use crate::types::{DataKind, FrameNumber, Keycode, Timecode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Immutable lookup table consulted by the codec.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    classes: HashSet<Arc<str>>,
    data_types: HashMap<String, DataKind>,
}

impl TypeRegistry {
    /// Start an empty registry.
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Registry holding every class and data type a FilmLight server serves.
    pub fn builtin() -> Self {
        Self::builder().with_builtin().build()
    }

    /// Look up the interned class name for a `_handle` tag.
    pub fn class(&self, tag: &str) -> Result<Arc<str>> {
        self.classes
            .get(tag)
            .cloned()
            .ok_or_else(|| FlapiError::UnknownHandleType {
                tag: tag.to_string(),
            })
    }

    /// Look up the constructor for a `_type` tag.
    pub fn data_kind(&self, tag: &str) -> Result<DataKind> {
        self.data_types
            .get(tag)
            .copied()
            .ok_or_else(|| FlapiError::UnknownDataType {
                tag: tag.to_string(),
            })
    }

    pub fn has_class(&self, tag: &str) -> bool {
        self.classes.contains(tag)
    }

    pub fn has_data_type(&self, tag: &str) -> bool {
        self.data_types.contains_key(tag)
    }

    /// Registered class names, sorted.
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.iter().map(|c| c.as_ref()).collect();
        names.sort_unstable();
        names
    }
}

/// Builder for [`TypeRegistry`].
///
/// # Example
///
/// ```
/// use flapi::TypeRegistry;
///
/// let registry = TypeRegistry::builder()
///     .with_value_types()
///     .class("Scene")
///     .record("Rational")
///     .build();
///
/// assert!(registry.has_class("Scene"));
/// assert!(registry.has_data_type("timecode"));
/// ```
#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    registry: TypeRegistry,
}

impl TypeRegistryBuilder {
    /// Register a proxy class by its handle tag.
    pub fn class(mut self, name: &str) -> Self {
        self.registry.classes.insert(Arc::from(name));
        self
    }

    /// Register a data type decoded as a generic record.
    pub fn record(self, tag: &str) -> Self {
        self.data_type(tag, DataKind::Record)
    }

    /// Register a data type with an explicit constructor.
    ///
    /// The reserved `set` tag is handled by the codec itself and is ignored here.
    pub fn data_type(mut self, tag: &str, kind: DataKind) -> Self {
        if tag != SET_TAG {
            self.registry.data_types.insert(tag.to_string(), kind);
        }
        self
    }

    /// Register timecode, keycode and frame number.
    pub fn with_value_types(self) -> Self {
        self.data_type(Timecode::TAG, DataKind::Timecode)
            .data_type(Keycode::TAG, DataKind::Keycode)
            .data_type(FrameNumber::TAG, DataKind::FrameNumber)
    }

    /// Register the full FilmLight catalog.
    pub fn with_builtin(self) -> Self {
        let builder = PROXY_CLASSES
            .iter()
            .fold(self.with_value_types(), |b, name| b.class(name));
        RECORD_TYPES.iter().fold(builder, |b, tag| b.record(tag))
    }

    pub fn build(self) -> TypeRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_contains_catalog() {
        let registry = TypeRegistry::builtin();

        assert!(registry.has_class("Application"));
        assert!(registry.has_class("Timer"));
        assert_eq!(registry.data_kind("timecode").unwrap(), DataKind::Timecode);
        assert_eq!(registry.data_kind("keycode").unwrap(), DataKind::Keycode);
        assert_eq!(
            registry.data_kind("framenumber").unwrap(),
            DataKind::FrameNumber
        );
        assert_eq!(registry.data_kind("Rational").unwrap(), DataKind::Record);
        assert_eq!(registry.class_names().len(), PROXY_CLASSES.len());
    }

    #[test]
    fn test_unknown_tags_fail() {
        let registry = TypeRegistry::builder().build();

        match registry.data_kind("timecode") {
            Err(FlapiError::UnknownDataType { tag }) => assert_eq!(tag, "timecode"),
            other => panic!("Expected UnknownDataType, got {:?}", other),
        }
        match registry.class("Scene") {
            Err(FlapiError::UnknownHandleType { tag }) => assert_eq!(tag, "Scene"),
            other => panic!("Expected UnknownHandleType, got {:?}", other),
        }
    }

    #[test]
    fn test_namespaces_are_separate() {
        let registry = TypeRegistry::builder().class("Scene").record("Rational").build();

        assert!(registry.has_class("Scene"));
        assert!(!registry.has_data_type("Scene"));
        assert!(registry.has_data_type("Rational"));
        assert!(!registry.has_class("Rational"));
    }

    #[test]
    fn test_set_tag_is_reserved() {
        let registry = TypeRegistry::builder().record("set").build();
        assert!(!registry.has_data_type("set"));
    }

    #[test]
    fn test_class_names_are_interned() {
        let registry = TypeRegistry::builder().class("Shot").build();
        let a = registry.class("Shot").unwrap();
        let b = registry.class("Shot").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
