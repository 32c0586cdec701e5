//! Session: connection lifecycle, call dispatch and inbound routing.
//!
//! # Architecture
//!
//! ```text
//! Session ──► SessionInner ──► Mutex<SessionState>
//!                 │                ├── Link (writer + reader tasks)
//!                 │                ├── PendingCalls   (id -> oneshot)
//!                 │                └── ObjectRegistry (handle id -> RemoteObject)
//!                 └── broadcast::Sender<SessionEvent>
//! ```
//!
//! Outgoing frames are queued on the link, so [`Session::call`] returns its
//! [`PendingReply`] without waiting on the socket. The reader task decodes
//! each inbound frame and either settles a pending call or dispatches a
//! signal to the target proxy's listeners.
//!
//! Listeners run on the reader task. They may issue new calls but must not
//! block waiting for a reply, since that reply is read by the same task.
//!
//! # Locking
//!
//! The state mutex is held only for short, non-async sections and never
//! while a listener runs or a proxy's own locks are taken. A proxy may call
//! into the session while holding its listener lock.

pub mod events;
mod objects;
mod pending;
mod transport;

pub use events::SessionEvent;
pub use objects::ObjectRegistry;
pub use pending::{PendingCalls, PendingReply};

use crate::codec;
use crate::config::{ConnectionConfig, EnvConfig, SessionConfig};
use crate::credentials::Credentials;
use crate::error::{FlapiError, Result};
use crate::protocol::{
    self, Handshake, Inbound, OutgoingMessage, ScriptRegistration, SignalNotification,
    METHOD_GET_PERMISSIONS,
};
use crate::registry::TypeRegistry;
use crate::remote::RemoteObject;
use crate::value::{HandleId, Value};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};
use transport::Link;

/// Client session with a FLAPI server.
///
/// Cheap to clone; clones share the connection.
///
/// # Example
///
/// ```rust,ignore
/// use flapi::{Session, SessionConfig, Value};
///
/// let session = Session::new(SessionConfig::builder("localhost").build());
/// session.connect().await?;
///
/// let app = session.class("Application")?.request_static("get", Value::Null).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
pub(crate) struct SessionInner {
    config: SessionConfig,
    credentials: Credentials,
    types: Arc<TypeRegistry>,
    state: Mutex<SessionState>,
    /// Serializes connect and close.
    connect_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
    next_id: AtomicU64,
    debug: AtomicBool,
}

struct SessionState {
    link: Option<Link>,
    pending: PendingCalls,
    objects: ObjectRegistry,
    generation: u64,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("connected", &self.link.is_some())
            .field("pending", &self.pending.len())
            .field("objects", &self.objects.len())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Builder for [`Session`].
#[derive(Debug)]
pub struct SessionBuilder {
    config: SessionConfig,
    types: Option<Arc<TypeRegistry>>,
    credentials: Option<Credentials>,
}

impl SessionBuilder {
    /// Use a custom type registry instead of the builtin catalog.
    pub fn types(mut self, types: Arc<TypeRegistry>) -> Self {
        self.types = Some(types);
        self
    }

    /// Use these credentials as-is instead of resolving them.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn build(self) -> Session {
        let credentials = self
            .credentials
            .unwrap_or_else(|| Credentials::resolve(&self.config));
        let types = self
            .types
            .unwrap_or_else(|| Arc::new(TypeRegistry::builtin()));
        let debug = self.config.debug
            || std::env::var(EnvConfig::DEBUG).is_ok_and(|v| v.trim() == "1");
        let (events, _) = broadcast::channel(ConnectionConfig::EVENT_CHANNEL_CAPACITY);
        let config = self.config;

        let inner = Arc::new_cyclic(|weak| SessionInner {
            config,
            credentials,
            types,
            state: Mutex::new(SessionState {
                link: None,
                pending: PendingCalls::default(),
                objects: ObjectRegistry::new(weak.clone()),
                generation: 0,
            }),
            connect_lock: tokio::sync::Mutex::new(()),
            events,
            next_id: AtomicU64::new(1),
            debug: AtomicBool::new(debug),
        });
        Session { inner }
    }
}

impl Session {
    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder {
            config,
            types: None,
            credentials: None,
        }
    }

    /// Session with the builtin type registry and resolved credentials.
    pub fn new(config: SessionConfig) -> Self {
        Self::builder(config).build()
    }

    /// Open the connection and authenticate.
    ///
    /// Returns immediately if already connected. On failure a
    /// [`SessionEvent::ConnectFailed`] is broadcast as well.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.inner.connect_lock.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        match self.inner.open().await {
            Ok(()) => {
                info!("Connected to {}:{}", self.inner.config.host, self.inner.config.port);
                Ok(())
            }
            Err(err) => {
                warn!("Failed to connect: {}", err);
                self.inner.emit(SessionEvent::connect_failed(&err));
                Err(err)
            }
        }
    }

    /// Close the connection.
    ///
    /// Outstanding calls fail with `ConnectionClosed` and every proxy is
    /// released locally.
    pub async fn close(&self) {
        let _guard = self.inner.connect_lock.lock().await;
        let (link, orphans) = self.inner.take_link(None);
        for obj in orphans {
            obj.detach();
        }
        if let Some(link) = link {
            link.shutdown().await;
            info!("Closed connection to {}", self.inner.config.host);
            self.inner.emit(SessionEvent::Close);
        }
    }

    /// Send a call and return its deferred result.
    ///
    /// `method` is the fully qualified wire name (`"Class.method"`); `target`
    /// is `None` for static methods.
    pub fn call(
        &self,
        target: Option<&HandleId>,
        method: &str,
        params: impl Into<Value>,
    ) -> Result<PendingReply> {
        self.inner.call(target.cloned(), method, params.into())
    }

    /// [`call`](Self::call) and wait, bounded by the configured call timeout.
    pub async fn request(
        &self,
        target: Option<&HandleId>,
        method: &str,
        params: impl Into<Value>,
    ) -> Result<Value> {
        let reply = self.call(target, method, params)?;
        self.inner.await_reply(reply).await
    }

    /// Ask the server to start pushing `signal` for `target`.
    pub fn connect_signal(&self, target: &HandleId, signal: &str) -> Result<()> {
        self.inner.connect_signal(target, signal)
    }

    /// Ask the server to stop pushing `signal` for `target`.
    pub fn disconnect_signal(&self, target: &HandleId, signal: &str) -> Result<()> {
        self.inner.disconnect_signal(target, signal)
    }

    /// Drop the proxy for `target` and tell the server it is no longer used.
    pub fn forget(&self, target: &HandleId) -> Result<()> {
        self.inner.forget(target)
    }

    /// Register a plugin script with the host application.
    pub fn register_script(&self, path: &str, status: impl Into<Value>) -> Result<()> {
        let status = codec::encode(&status.into())?;
        self.inner.notify(&ScriptRegistration::new(path, status))
    }

    /// Permissions granted to this connection.
    pub async fn get_permissions(&self) -> Result<Value> {
        self.request(None, METHOD_GET_PERMISSIONS, Value::Null).await
    }

    /// Class proxy for invoking static methods of `name`.
    pub fn class(&self, name: &str) -> Result<RemoteObject> {
        let class = self.inner.types.class(name)?;
        Ok(RemoteObject::unbound(class, Arc::downgrade(&self.inner)))
    }

    /// Live proxy for `id`, if one has been received.
    pub fn object(&self, id: &HandleId) -> Option<RemoteObject> {
        self.inner.lock_state().objects.get(id)
    }

    /// Subscribe to session-level conditions.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Log every frame at info level instead of trace.
    pub fn set_debug(&self, enable: bool) {
        self.inner.debug.store(enable, Ordering::Relaxed);
    }

    pub fn is_debug(&self) -> bool {
        self.inner.debug.load(Ordering::Relaxed)
    }

    /// True once the handshake has succeeded and until the connection ends.
    pub fn is_connected(&self) -> bool {
        self.inner
            .lock_state()
            .link
            .as_ref()
            .is_some_and(|link| link.ready)
    }

    pub fn object_count(&self) -> usize {
        self.inner.lock_state().objects.len()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.inner.types
    }
}

impl SessionInner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn log_frame(&self, direction: &str, frame: &str) {
        if self.debug.load(Ordering::Relaxed) {
            info!("{} {}", direction, frame);
        } else {
            trace!("{} {}", direction, frame);
        }
    }

    /// Connect the transport and run the handshake.
    async fn open(self: &Arc<Self>) -> Result<()> {
        let url = self.config.url()?;
        let host = self.config.host.clone();
        let limit = self.config.connect_timeout;
        debug!("Connecting to {}", url);

        let (ws, _) = tokio::time::timeout(limit, tokio_tungstenite::connect_async(url.as_str()))
            .await
            .map_err(|_| FlapiError::ConnectFailed {
                host: host.clone(),
                message: format!("timed out after {:?}", limit),
            })?
            .map_err(|e| FlapiError::ConnectFailed {
                host: host.clone(),
                message: e.to_string(),
            })?;

        let generation = {
            let mut state = self.lock_state();
            state.generation += 1;
            let generation = state.generation;
            state.link = Some(transport::attach(ws, Arc::downgrade(self), generation));
            generation
        };

        if let Err(err) = self.handshake().await {
            let (link, _) = self.take_link(Some(generation));
            if let Some(link) = link {
                link.shutdown().await;
            }
            return Err(err);
        }

        let mut state = self.lock_state();
        match state.link.as_mut() {
            Some(link) if link.generation == generation => {
                link.ready = true;
                Ok(())
            }
            _ => Err(FlapiError::ConnectionClosed),
        }
    }

    async fn handshake(&self) -> Result<()> {
        let id = self.next_id();
        let creds = &self.credentials;
        let frame = serde_json::to_string(&Handshake::new(
            id,
            creds.username.clone(),
            creds.password.clone(),
            creds.token.clone(),
        ))?;
        debug!(
            "Authenticating as {}",
            creds.username.as_deref().unwrap_or("<anonymous>")
        );
        let reply = self.send_call(id, frame, false)?;

        let limit = self.config.connect_timeout;
        let outcome = match tokio::time::timeout(limit, reply).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.lock_state().pending.remove(id);
                return Err(FlapiError::Timeout(limit));
            }
        };

        match outcome {
            Ok(result) if result.is_truthy_flag() => Ok(()),
            Ok(_) | Err(FlapiError::Remote { .. }) => Err(FlapiError::AuthenticationFailed {
                host: self.config.host.clone(),
            }),
            Err(err) => Err(err),
        }
    }

    /// Detach the current link if it matches `generation` (any link when
    /// `None`), failing pending calls and emptying the object registry.
    fn take_link(&self, generation: Option<u64>) -> (Option<Link>, Vec<RemoteObject>) {
        let mut state = self.lock_state();
        let matches = match (&state.link, generation) {
            (Some(link), Some(generation)) => link.generation == generation,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !matches {
            return (None, Vec::new());
        }

        let link = state.link.take();
        let failed = state.pending.fail_all();
        if failed > 0 {
            debug!("Failed {} outstanding calls on disconnect", failed);
        }
        (link, state.objects.clear())
    }

    /// Called by the reader task when its stream ends.
    pub(crate) fn transport_closed(&self, generation: u64) {
        let (link, orphans) = self.take_link(Some(generation));
        let Some(link) = link else {
            return;
        };
        let was_ready = link.ready;
        drop(link);

        for obj in orphans {
            obj.detach();
        }
        if was_ready {
            warn!("Connection to {} lost", self.config.host);
            self.emit(SessionEvent::Close);
        }
    }

    pub(crate) fn call(
        &self,
        target: Option<HandleId>,
        method: &str,
        params: Value,
    ) -> Result<PendingReply> {
        let params = codec::encode(&params)?;
        let id = self.next_id();
        let frame = serde_json::to_string(&OutgoingMessage::call(id, method, target, params))?;
        self.log_frame("->", &frame);
        self.send_call(id, frame, true)
    }

    fn send_call(&self, id: u64, frame: String, require_ready: bool) -> Result<PendingReply> {
        let mut state = self.lock_state();
        let link = state
            .link
            .as_ref()
            .filter(|link| link.ready || !require_ready)
            .ok_or(FlapiError::NotConnected)?;
        if !link.send(frame) {
            return Err(FlapiError::ConnectionClosed);
        }
        Ok(state.pending.insert(id))
    }

    pub(crate) async fn await_reply(&self, reply: PendingReply) -> Result<Value> {
        let Some(limit) = self.config.call_timeout else {
            return reply.await;
        };

        let id = reply.id();
        match tokio::time::timeout(limit, reply).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.lock_state().pending.remove(id);
                warn!("Call {} timed out after {:?}", id, limit);
                Err(FlapiError::Timeout(limit))
            }
        }
    }

    /// Send a fire-and-forget message.
    fn notify<T: Serialize>(&self, message: &T) -> Result<()> {
        let frame = serde_json::to_string(message)?;
        self.log_frame("->", &frame);

        let state = self.lock_state();
        let link = state
            .link
            .as_ref()
            .filter(|link| link.ready)
            .ok_or(FlapiError::NotConnected)?;
        if link.send(frame) {
            Ok(())
        } else {
            Err(FlapiError::ConnectionClosed)
        }
    }

    pub(crate) fn connect_signal(&self, target: &HandleId, signal: &str) -> Result<()> {
        debug!("Subscribing to {} on {}", signal, target);
        self.notify(&OutgoingMessage::connect_signal(target.clone(), signal))
    }

    pub(crate) fn disconnect_signal(&self, target: &HandleId, signal: &str) -> Result<()> {
        debug!("Unsubscribing from {} on {}", signal, target);
        self.notify(&OutgoingMessage::disconnect_signal(target.clone(), signal))
    }

    pub(crate) fn forget(&self, target: &HandleId) -> Result<()> {
        let removed = self.lock_state().objects.remove(target);
        if let Some(obj) = removed {
            obj.detach();
        }
        self.notify(&OutgoingMessage::forget(target.clone()))
    }

    /// Broadcast a session-level error.
    pub(crate) fn report(&self, err: &FlapiError) {
        match err.category() {
            crate::error::ErrorCategory::Transport => error!("Transport error: {}", err),
            _ => warn!("{}", err),
        }
        self.emit(SessionEvent::error(err));
    }

    /// Decode and route one inbound text frame.
    pub(crate) fn handle_frame(&self, text: &str) {
        self.log_frame("<-", text);

        let raw: serde_json::Value = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(e) => {
                self.report(&FlapiError::protocol(format!("Malformed frame: {}", e)));
                return;
            }
        };
        let response_id = protocol::peek_id(&raw);

        let decoded = {
            let mut state = self.lock_state();
            state.objects.begin_decode();
            let decoded = codec::decode(raw, &self.types, &mut state.objects);
            if decoded.is_err() {
                let dropped = state.objects.rollback_decode();
                if !dropped.is_empty() {
                    debug!("Dropped {} handle(s) from a failed decode", dropped.len());
                }
            }
            decoded
        };

        let message = match decoded.and_then(Inbound::classify) {
            Ok(message) => message,
            Err(err) => {
                self.report(&err);
                if let Some(id) = response_id {
                    self.lock_state().pending.complete(id, Err(err));
                }
                return;
            }
        };

        match message {
            Inbound::Response { id, outcome } => {
                let settled = self
                    .lock_state()
                    .pending
                    .complete(id, outcome.map_err(FlapiError::from));
                if !settled {
                    debug!("Dropping response {} with no pending call", id);
                }
            }
            Inbound::Signal(signal) => self.route_signal(signal),
            Inbound::Unsolicited { method } => {
                debug!("Ignoring unsolicited message {:?}", method);
            }
        }
    }

    fn route_signal(&self, signal: SignalNotification) {
        let target = self.lock_state().objects.get(&signal.target);
        let result = match target {
            Some(obj) => obj.dispatch(&signal.signal, signal.args),
            None => {
                self.report(&FlapiError::TargetNotFound {
                    target: signal.target.clone(),
                });
                None
            }
        };
        // The server blocks on a sync signal until it sees the reply, even
        // when nothing here could handle it.
        if !signal.sync {
            return;
        }

        let reply = codec::encode(&signal.sigid).and_then(|sigid| {
            let result = codec::encode(&result.unwrap_or_default())?;
            self.notify(&OutgoingMessage::signal_result(
                signal.target.clone(),
                sigid,
                result,
            ))
        });
        if let Err(err) = reply {
            self.report(&err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_session() -> Session {
        let types = TypeRegistry::builder().class("Foo").build();
        Session::builder(SessionConfig::default())
            .types(Arc::new(types))
            .credentials(Credentials::default())
            .build()
    }

    #[test]
    fn test_calls_require_connection() {
        let session = offline_session();
        assert!(!session.is_connected());
        assert!(matches!(
            session.call(None, "Foo.bar", Value::Null),
            Err(FlapiError::NotConnected)
        ));
        assert!(matches!(
            session.connect_signal(&HandleId::from(1), "Tick"),
            Err(FlapiError::NotConnected)
        ));
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn test_class_proxy_lookup() {
        let session = offline_session();
        let foo = session.class("Foo").unwrap();
        assert_eq!(foo.class(), "Foo");
        assert!(!foo.is_instance());
        assert!(matches!(
            session.class("Bar"),
            Err(FlapiError::UnknownHandleType { .. })
        ));
    }

    #[test]
    fn test_unknown_signal_target_raises_event() {
        let session = offline_session();
        let mut events = session.events();

        session.inner.handle_frame(
            r#"{"method": "signal", "target": 99, "params": {"signal": "Tick", "args": null}}"#,
        );

        match events.try_recv().unwrap() {
            SessionEvent::Error { category, message } => {
                assert_eq!(category, crate::error::ErrorCategory::Protocol);
                assert!(message.contains("99"));
            }
            other => panic!("Expected error event, got {:?}", other),
        }
    }

    #[test]
    fn test_response_registers_handles() {
        let session = offline_session();
        let _reply = session.inner.lock_state().pending.insert(1);
        session
            .inner
            .handle_frame(r#"{"id": 1, "result": {"_handle": "Foo", "_id": "h1"}}"#);

        assert_eq!(session.object_count(), 1);
        assert!(session.object(&HandleId::from("h1")).is_some());
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn test_malformed_frame_raises_event() {
        let session = offline_session();
        let mut events = session.events();

        session.inner.handle_frame("not json");
        assert!(matches!(
            events.try_recv(),
            Ok(SessionEvent::Error { .. })
        ));
    }

    #[test]
    fn test_failed_decode_drops_new_handles() {
        let session = offline_session();
        let mut events = session.events();
        let reply = session.inner.lock_state().pending.insert(4);
        session
            .inner
            .handle_frame(r#"{"id": 2, "result": {"_handle": "Foo", "_id": "h1"}}"#);
        assert_eq!(session.object_count(), 1);

        session.inner.handle_frame(
            r#"{"id": 4, "result": [{"_handle": "Foo", "_id": "h1"}, {"_handle": "Foo", "_id": "h9"}, {"_type": "Nope"}]}"#,
        );

        assert_eq!(session.object_count(), 1);
        assert!(session.object(&HandleId::from("h1")).is_some());
        assert!(session.object(&HandleId::from("h9")).is_none());
        assert!(matches!(events.try_recv(), Ok(SessionEvent::Error { .. })));
        assert_eq!(session.pending_count(), 0);
        drop(reply);
    }

    #[test]
    fn test_state_debug_does_not_touch_proxies() {
        let session = offline_session();
        let _reply = session.inner.lock_state().pending.insert(1);
        session
            .inner
            .handle_frame(r#"{"id": 1, "result": {"_handle": "Foo", "_id": "h1"}}"#);

        let text = format!("{:?}", *session.inner.lock_state());
        assert!(text.contains("objects: 1"));
        assert!(!text.contains("RemoteObject"));
    }

    #[test]
    fn test_debug_flag() {
        let session = offline_session();
        session.set_debug(true);
        assert!(session.is_debug());
        session.set_debug(false);
        assert!(!session.is_debug());
    }
}
