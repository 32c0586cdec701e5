//! Identity map from handle ids to live proxies.

use super::SessionInner;
use crate::codec::HandleResolver;
use crate::error::Result;
use crate::registry::TypeRegistry;
use crate::remote::RemoteObject;
use crate::value::HandleId;
use std::collections::HashMap;
use std::sync::Weak;

/// One proxy per server-side object.
///
/// The registry owns the proxies it hands out until they are released or
/// the session closes.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: HashMap<HandleId, RemoteObject>,
    /// Handles created since the last `begin_decode`.
    created: Vec<HandleId>,
    session: Weak<SessionInner>,
}

impl ObjectRegistry {
    pub(crate) fn new(session: Weak<SessionInner>) -> Self {
        Self {
            objects: HashMap::new(),
            created: Vec::new(),
            session,
        }
    }

    pub fn get(&self, id: &HandleId) -> Option<RemoteObject> {
        self.objects.get(id).cloned()
    }

    pub fn contains(&self, id: &HandleId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn remove(&mut self, id: &HandleId) -> Option<RemoteObject> {
        self.objects.remove(id)
    }

    /// Empty the registry, returning what it held.
    pub fn clear(&mut self) -> Vec<RemoteObject> {
        self.objects.drain().map(|(_, obj)| obj).collect()
    }

    /// Start tracking the handles a decode creates.
    pub(crate) fn begin_decode(&mut self) {
        self.created.clear();
    }

    /// Remove the handles created since [`begin_decode`](Self::begin_decode).
    ///
    /// A decode that fails partway hands none of its proxies to a caller, so
    /// nothing would ever release them.
    pub(crate) fn rollback_decode(&mut self) -> Vec<RemoteObject> {
        let created = std::mem::take(&mut self.created);
        created
            .iter()
            .filter_map(|id| self.objects.remove(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl HandleResolver for ObjectRegistry {
    fn resolve(&mut self, types: &TypeRegistry, tag: &str, id: HandleId) -> Result<RemoteObject> {
        if let Some(existing) = self.objects.get(&id) {
            return Ok(existing.clone());
        }

        let class = types.class(tag)?;
        let obj = RemoteObject::bound(class, id.clone(), self.session.clone());
        self.objects.insert(id.clone(), obj.clone());
        self.created.push(id);
        Ok(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_keeps_existing_handles() {
        let types = TypeRegistry::builder().class("Foo").build();
        let mut objects = ObjectRegistry::default();
        let kept = objects.resolve(&types, "Foo", HandleId::from("h1")).unwrap();

        objects.begin_decode();
        objects.resolve(&types, "Foo", HandleId::from("h1")).unwrap();
        objects.resolve(&types, "Foo", HandleId::from("h9")).unwrap();
        let dropped = objects.rollback_decode();

        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].id(), Some(HandleId::from("h9")));
        assert!(objects.get(&HandleId::from("h1")).unwrap().ptr_eq(&kept));
        assert!(!objects.contains(&HandleId::from("h9")));
        assert!(objects.rollback_decode().is_empty());
    }

    #[test]
    fn test_resolve_creates_once() {
        let types = TypeRegistry::builder().class("Foo").build();
        let mut objects = ObjectRegistry::default();

        let a = objects.resolve(&types, "Foo", HandleId::from("h1")).unwrap();
        let b = objects.resolve(&types, "Foo", HandleId::from("h1")).unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.class(), "Foo");
        assert_eq!(a.id(), Some(HandleId::from("h1")));
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn test_distinct_ids_are_distinct_objects() {
        let types = TypeRegistry::builder().class("Foo").build();
        let mut objects = ObjectRegistry::default();

        let a = objects.resolve(&types, "Foo", HandleId::from(1)).unwrap();
        let b = objects.resolve(&types, "Foo", HandleId::from(2)).unwrap();
        assert!(!a.ptr_eq(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_remove_and_clear() {
        let types = TypeRegistry::builder().class("Foo").build();
        let mut objects = ObjectRegistry::default();
        objects.resolve(&types, "Foo", HandleId::from(1)).unwrap();
        objects.resolve(&types, "Foo", HandleId::from(2)).unwrap();

        assert!(objects.remove(&HandleId::from(1)).is_some());
        assert!(!objects.contains(&HandleId::from(1)));
        assert_eq!(objects.clear().len(), 1);
        assert!(objects.is_empty());
    }
}
