//! Per-object signal listener sets.
//!
//! The number of listeners registered for a signal is its subscription
//! reference count. Only the 0 -> 1 and 1 -> 0 edges produce network traffic;
//! [`SignalListeners`] reports those edges as [`Transition`]s and leaves the
//! sending to the caller.

use crate::remote::RemoteObject;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Identifies one registered listener on one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A signal delivered to a listener.
#[derive(Debug, Clone)]
pub struct SignalEvent {
    /// The object that emitted the signal.
    pub sender: RemoteObject,
    pub signal: String,
    pub args: Value,
}

/// Listener callback. The return value answers synchronous signals; the first
/// non-null result among a signal's listeners is sent back to the server.
pub type Listener = Arc<dyn Fn(&SignalEvent) -> Option<Value> + Send + Sync>;

/// Subscription edge produced by adding or removing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First listener for the signal: the server must start pushing it.
    Subscribe,
    /// Last listener removed: the server can stop pushing it.
    Unsubscribe,
    Unchanged,
}

/// Listener sets keyed by signal name.
#[derive(Default)]
pub struct SignalListeners {
    next_id: u64,
    by_signal: HashMap<String, BTreeMap<ListenerId, Listener>>,
}

impl SignalListeners {
    pub fn add(&mut self, signal: &str, listener: Listener) -> (ListenerId, Transition) {
        self.next_id += 1;
        let id = ListenerId(self.next_id);

        let set = self.by_signal.entry(signal.to_string()).or_default();
        let transition = if set.is_empty() {
            Transition::Subscribe
        } else {
            Transition::Unchanged
        };
        set.insert(id, listener);
        (id, transition)
    }

    /// Remove a listener. Returns `None` if it was not registered.
    pub fn remove(&mut self, signal: &str, id: ListenerId) -> Option<Transition> {
        let set = self.by_signal.get_mut(signal)?;
        set.remove(&id)?;
        if set.is_empty() {
            self.by_signal.remove(signal);
            Some(Transition::Unsubscribe)
        } else {
            Some(Transition::Unchanged)
        }
    }

    /// Snapshot of a signal's listeners in registration order.
    pub fn listeners(&self, signal: &str) -> Vec<Listener> {
        self.by_signal
            .get(signal)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, signal: &str) -> usize {
        self.by_signal.get(signal).map_or(0, BTreeMap::len)
    }

    pub fn is_subscribed(&self, signal: &str) -> bool {
        self.count(signal) > 0
    }

    /// Signals with at least one listener, sorted.
    pub fn signals(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_signal.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Drop every listener, returning the signals that were subscribed.
    pub fn clear(&mut self) -> Vec<String> {
        let names = self.signals();
        self.by_signal.clear();
        names
    }
}

impl fmt::Debug for SignalListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .by_signal
            .iter()
            .map(|(name, set)| (name.as_str(), set.len()))
            .collect();
        f.debug_struct("SignalListeners")
            .field("counts", &counts)
            .finish()
    }
}

/// Invoke listeners in order and return the first non-null result.
///
/// A panicking listener is logged and skipped.
pub(crate) fn dispatch(listeners: &[Listener], event: &SignalEvent) -> Option<Value> {
    let mut result = None;
    for listener in listeners {
        match catch_unwind(AssertUnwindSafe(|| listener(event))) {
            Ok(Some(value)) if result.is_none() && !value.is_null() => result = Some(value),
            Ok(_) => {}
            Err(_) => warn!(
                "Failed to dispatch signal '{}' from {}: listener panicked",
                event.signal, event.sender
            ),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::HandleId;
    use std::sync::Weak;

    fn noop() -> Listener {
        Arc::new(|_: &SignalEvent| -> Option<Value> { None })
    }

    #[test]
    fn test_edges_only_on_first_and_last() {
        let mut listeners = SignalListeners::default();

        let (a, t1) = listeners.add("SceneOpened", noop());
        let (b, t2) = listeners.add("SceneOpened", noop());
        assert_eq!(t1, Transition::Subscribe);
        assert_eq!(t2, Transition::Unchanged);
        assert_eq!(listeners.count("SceneOpened"), 2);

        assert_eq!(listeners.remove("SceneOpened", a), Some(Transition::Unchanged));
        assert!(listeners.is_subscribed("SceneOpened"));
        assert_eq!(
            listeners.remove("SceneOpened", b),
            Some(Transition::Unsubscribe)
        );
        assert!(!listeners.is_subscribed("SceneOpened"));
    }

    #[test]
    fn test_remove_unknown_listener() {
        let mut listeners = SignalListeners::default();
        let (id, _) = listeners.add("Tick", noop());

        assert_eq!(listeners.remove("Other", id), None);
        assert_eq!(listeners.remove("Tick", id), Some(Transition::Unsubscribe));
        assert_eq!(listeners.remove("Tick", id), None);
    }

    #[test]
    fn test_signals_are_independent() {
        let mut listeners = SignalListeners::default();
        let (_, t1) = listeners.add("A", noop());
        let (_, t2) = listeners.add("B", noop());
        assert_eq!(t1, Transition::Subscribe);
        assert_eq!(t2, Transition::Subscribe);
        assert_eq!(listeners.signals(), vec!["A".to_string(), "B".to_string()]);

        assert_eq!(listeners.clear(), vec!["A".to_string(), "B".to_string()]);
        assert!(listeners.signals().is_empty());
    }

    #[test]
    fn test_listener_ids_are_unique_across_signals() {
        let mut listeners = SignalListeners::default();
        let (a, _) = listeners.add("A", noop());
        let (b, _) = listeners.add("B", noop());
        assert_ne!(a, b);
    }

    #[test]
    fn test_dispatch_skips_panics_and_keeps_first_result() {
        let event = SignalEvent {
            sender: RemoteObject::bound(Arc::from("Scene"), HandleId::from(7), Weak::new()),
            signal: "Query".to_string(),
            args: Value::Null,
        };
        let listeners: Vec<Listener> = vec![
            noop(),
            Arc::new(|_: &SignalEvent| -> Option<Value> { panic!("listener failure") }),
            Arc::new(|_: &SignalEvent| Some(Value::from(serde_json::json!("first")))),
            Arc::new(|_: &SignalEvent| Some(Value::from(serde_json::json!("second")))),
        ];

        let result = dispatch(&listeners, &event);
        assert_eq!(result, Some(Value::from(serde_json::json!("first"))));
    }
}
