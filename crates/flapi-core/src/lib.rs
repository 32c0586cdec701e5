//! FLAPI - client session core for the FilmLight API.
//!
//! Talks JSON-RPC over a WebSocket to a FilmLight server (Baselight,
//! Daylight, flapid). Server-side objects appear locally as
//! [`RemoteObject`] proxies with stable identity; server-pushed signals are
//! delivered to listeners registered on those proxies.
//!
//! # Example
//!
//! ```rust,ignore
//! use flapi::{Session, SessionConfig, Value};
//!
//! #[tokio::main]
//! async fn main() -> flapi::Result<()> {
//!     let session = Session::new(SessionConfig::builder("localhost").build());
//!     session.connect().await?;
//!
//!     let app = session
//!         .class("Application")?
//!         .request_static("get", Value::Null)
//!         .await?;
//!     if let Some(app) = app.as_remote() {
//!         app.connect("SceneOpened", |event| {
//!             println!("{} opened a scene: {:?}", event.sender, event.args);
//!             None
//!         })?;
//!     }
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod credentials;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod remote;
pub mod session;
pub mod signals;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use config::{ConnectionConfig, SessionConfig, SessionConfigBuilder};
pub use credentials::Credentials;
pub use error::{ErrorCategory, FlapiError, Result};
pub use registry::{TypeRegistry, TypeRegistryBuilder};
pub use remote::RemoteObject;
pub use session::{PendingReply, Session, SessionBuilder, SessionEvent};
pub use signals::{ListenerId, SignalEvent};
pub use types::{DataKind, DataValue, FrameNumber, Keycode, Record, Timecode};
pub use value::{HandleId, Value};
