//! # doa-bridge
//!
//! WebSocket bridge for live control and visualisation of an audio
//! processing engine.
//!
//! The bridge sits between a browser and the engine's line-oriented
//! control connection. Clients send small JSON commands (change the
//! pooling window, toggle the beamformer, push the current pool); the
//! bridge translates each into a get/set against the engine's variable
//! tree and pushes read values back as `{"data": ...}` frames.
//!
//! ## Features
//!
//! - **Connection resilience**: a timeout or broken pipe on the control
//!   connection reopens it and drops the one affected message; the
//!   client session stays alive.
//! - **Serialized upstream access**: all sessions share a single
//!   control connection behind a mutex, so remote calls never
//!   interleave on the wire.
//! - **Stable command vocabulary**: a closed [`Command`] enum decoupled
//!   from the engine paths it manipulates.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use doa_bridge::{BridgeSettings, SessionBridge, TcpEngineLink};
//! use tokio::sync::Mutex;
//!
//! #[tokio::main]
//! async fn main() -> doa_bridge::Result<()> {
//!     // Connect to the engine's control port.
//!     let link = TcpEngineLink::connect("127.0.0.1", 33337, None).await?;
//!     let link = Arc::new(Mutex::new(link));
//!
//!     // One bridge per client session.
//!     let settings = BridgeSettings {
//!         pooling_id: "pool".into(),
//!         pool_path: None,
//!         beamformer_path: "mha.doachain.post.select".into(),
//!     };
//!     let mut session = SessionBridge::new(link, &settings).await?;
//!
//!     if let Some(value) = session.handle_message(r#"{"command": "send_data"}"#).await {
//!         println!("pool: {value}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use bridge::{BridgeSettings, Command, SessionBridge};
pub use engine::{discover_angles, AnglesRange, ControlLink, TcpEngineLink, Value};
pub use error::{BridgeError, Result};
