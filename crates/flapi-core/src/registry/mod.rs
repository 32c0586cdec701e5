//! Type registry for tagged wire objects.
//!
//! Two namespaces are kept apart:
//! - **Proxy classes**: the `_handle` tag of a remote-object reference
//! - **Data types**: the `_type` tag of a value-type instance
//!
//! The registry is built once while bootstrapping a session and never mutated
//! afterwards, so it can be shared freely behind an `Arc`.

pub mod catalog;
pub mod type_registry;

pub use type_registry::{TypeRegistry, TypeRegistryBuilder};
