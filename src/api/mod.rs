//! API layer for doa-bridge.
//!
//! This module provides the HTTP and WebSocket surface clients talk to.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/info` - Name, version and the classifier's angle grid
//! - `WS /ws` - Control and data channel; one bridge session per socket
//!
//! ## Example
//!
//! ```no_run
//! use doa_bridge::api::{serve, AppState, ServerConfig};
//! use doa_bridge::engine::{discover_angles, TcpEngineLink};
//! use doa_bridge::BridgeSettings;
//!
//! #[tokio::main]
//! async fn main() -> doa_bridge::Result<()> {
//!     let angles = discover_angles("127.0.0.1", 33337, None, "svm").await?;
//!     let link = TcpEngineLink::connect("127.0.0.1", 33337, None).await?;
//!     let settings = BridgeSettings {
//!         pooling_id: "pool".into(),
//!         pool_path: None,
//!         beamformer_path: "mha.doachain.post.select".into(),
//!     };
//!     serve(
//!         ServerConfig::default(),
//!         AppState::new(link, settings, angles),
//!     )
//!     .await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;
pub mod websocket;

// Re-export commonly used types
pub use handlers::AppState;
pub use router::{create_router, serve, ServerConfig};
pub use types::{DataReply, InfoResponse};
