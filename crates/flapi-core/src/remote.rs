//! Local proxies for server-side objects.
//!
//! A [`RemoteObject`] is either an *instance* bound to a server-assigned
//! handle id, or a *class* proxy used for static methods. Proxies hold only a
//! weak reference to their session: the session's object registry decides how
//! long an instance lives, and a proxy outliving its session fails with
//! [`FlapiError::SessionDropped`].

use crate::codec::{HANDLE_KEY, ID_KEY};
use crate::error::{FlapiError, Result};
use crate::session::{PendingReply, SessionInner};
use crate::signals::{self, Listener, ListenerId, SignalEvent, SignalListeners, Transition};
use crate::value::{HandleId, Value};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use tracing::debug;

struct ObjectInner {
    class: Arc<str>,
    instance: bool,
    /// Cleared when the handle is released or its session closes.
    target: Mutex<Option<HandleId>>,
    session: Weak<SessionInner>,
    signals: Mutex<SignalListeners>,
}

/// Handle-bearing proxy. Clones share identity.
#[derive(Clone)]
pub struct RemoteObject {
    inner: Arc<ObjectInner>,
}

impl RemoteObject {
    pub(crate) fn bound(class: Arc<str>, id: HandleId, session: Weak<SessionInner>) -> Self {
        Self::new(class, true, Some(id), session)
    }

    pub(crate) fn unbound(class: Arc<str>, session: Weak<SessionInner>) -> Self {
        Self::new(class, false, None, session)
    }

    fn new(
        class: Arc<str>,
        instance: bool,
        target: Option<HandleId>,
        session: Weak<SessionInner>,
    ) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                class,
                instance,
                target: Mutex::new(target),
                session,
                signals: Mutex::new(SignalListeners::default()),
            }),
        }
    }

    pub fn class(&self) -> &str {
        &self.inner.class
    }

    /// Server-assigned id, if this proxy is a live instance.
    pub fn id(&self) -> Option<HandleId> {
        self.target().clone()
    }

    pub fn is_bound(&self) -> bool {
        self.target().is_some()
    }

    /// True for instance proxies, live or released.
    pub fn is_instance(&self) -> bool {
        self.inner.instance
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &RemoteObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Invoke an instance method. Returns once the call is queued.
    ///
    /// Fails immediately with [`FlapiError::NoInstance`] if the proxy was
    /// never bound or has been released.
    pub fn call(&self, method: &str, params: impl Into<Value>) -> Result<PendingReply> {
        let target = self.require_instance(method)?;
        let session = self.session()?;
        session.call(Some(target), &self.qualify(method), params.into())
    }

    /// [`call`](Self::call) and wait for the result.
    pub async fn request(&self, method: &str, params: impl Into<Value>) -> Result<Value> {
        let reply = self.call(method, params)?;
        self.session()?.await_reply(reply).await
    }

    /// Invoke a static method through a class proxy.
    pub fn call_static(&self, method: &str, params: impl Into<Value>) -> Result<PendingReply> {
        if self.inner.instance {
            return Err(FlapiError::StaticOnInstance {
                class: self.class().to_string(),
                operation: method.to_string(),
            });
        }
        let session = self.session()?;
        session.call(None, &self.qualify(method), params.into())
    }

    /// [`call_static`](Self::call_static) and wait for the result.
    pub async fn request_static(&self, method: &str, params: impl Into<Value>) -> Result<Value> {
        let reply = self.call_static(method, params)?;
        self.session()?.await_reply(reply).await
    }

    /// Release the server-side handle.
    ///
    /// Drops every listener, removes the proxy from its session and sends
    /// `forget`. The proxy is unusable afterwards.
    pub fn release(&self) -> Result<()> {
        let target = self.require_instance("release")?;
        self.lock_signals().clear();
        self.unbind();
        self.session()?.forget(&target)
    }

    /// Register a listener for `signal`.
    ///
    /// The first listener for a signal subscribes on the server; later ones
    /// only join the local set.
    pub fn connect<F>(&self, signal: &str, listener: F) -> Result<ListenerId>
    where
        F: Fn(&SignalEvent) -> Option<Value> + Send + Sync + 'static,
    {
        let target = self.require_instance("connect")?;
        let session = self.session()?;

        let mut listeners = self.lock_signals();
        let listener: Listener = Arc::new(listener);
        let (id, transition) = listeners.add(signal, listener);

        if transition == Transition::Subscribe {
            if let Err(err) = session.connect_signal(&target, signal) {
                listeners.remove(signal, id);
                return Err(err);
            }
        }
        Ok(id)
    }

    /// Remove a listener. Returns `false` if it was not registered.
    ///
    /// Removing the last listener for a signal unsubscribes on the server.
    pub fn disconnect(&self, signal: &str, id: ListenerId) -> Result<bool> {
        let mut listeners = self.lock_signals();
        let Some(transition) = listeners.remove(signal, id) else {
            return Ok(false);
        };

        if transition == Transition::Unsubscribe {
            if let (Some(target), Ok(session)) = (self.id(), self.session()) {
                if let Err(err) = session.disconnect_signal(&target, signal) {
                    debug!("Skipping unsubscribe of {} on {}: {}", signal, self, err);
                }
            }
        }
        Ok(true)
    }

    pub fn listener_count(&self, signal: &str) -> usize {
        self.lock_signals().count(signal)
    }

    /// Signals this proxy is subscribed to.
    pub fn subscriptions(&self) -> Vec<String> {
        self.lock_signals().signals()
    }

    /// Run the listeners for an inbound signal.
    pub(crate) fn dispatch(&self, signal: &str, args: Value) -> Option<Value> {
        let listeners = self.lock_signals().listeners(signal);
        if listeners.is_empty() {
            debug!("No listeners for {} on {}", signal, self);
            return None;
        }

        let event = SignalEvent {
            sender: self.clone(),
            signal: signal.to_string(),
            args,
        };
        signals::dispatch(&listeners, &event)
    }

    /// Forget the handle id and every listener without any network traffic.
    pub(crate) fn detach(&self) {
        self.lock_signals().clear();
        self.unbind();
    }

    /// `{"_handle": <class>, "_id": <id>}`
    pub fn to_wire(&self) -> Result<serde_json::Value> {
        let id = self.require_instance("encode")?;
        let mut node = serde_json::Map::with_capacity(2);
        node.insert(
            HANDLE_KEY.to_string(),
            serde_json::Value::String(self.class().to_string()),
        );
        node.insert(ID_KEY.to_string(), id.to_json());
        Ok(serde_json::Value::Object(node))
    }

    fn qualify(&self, method: &str) -> String {
        format!("{}.{}", self.inner.class, method)
    }

    fn require_instance(&self, operation: &str) -> Result<HandleId> {
        self.id().ok_or_else(|| FlapiError::NoInstance {
            class: self.class().to_string(),
            operation: operation.to_string(),
        })
    }

    fn session(&self) -> Result<Arc<SessionInner>> {
        self.inner
            .session
            .upgrade()
            .ok_or_else(|| FlapiError::SessionDropped {
                class: self.class().to_string(),
            })
    }

    fn unbind(&self) {
        self.inner
            .target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn target(&self) -> MutexGuard<'_, Option<HandleId>> {
        self.inner
            .target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_signals(&self) -> MutexGuard<'_, SignalListeners> {
        self.inner
            .signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for RemoteObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for RemoteObject {}

impl fmt::Display for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.inner.instance, self.id()) {
            (true, Some(id)) => write!(f, "{} id {}", self.inner.class, id),
            (true, None) => write!(f, "{} (released)", self.inner.class),
            (false, _) => write!(f, "{} (class)", self.inner.class),
        }
    }
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never block here: the holder of the signals lock may be waiting on
        // the session lock held by whoever is printing.
        let mut out = f.debug_struct("RemoteObject");
        out.field("class", &self.inner.class).field("id", &self.id());
        match self.inner.signals.try_lock() {
            Ok(signals) => out.field("signals", &*signals),
            Err(TryLockError::Poisoned(poisoned)) => {
                out.field("signals", &*poisoned.into_inner())
            }
            Err(TryLockError::WouldBlock) => out.field("signals", &format_args!("<locked>")),
        };
        out.finish()
    }
}
