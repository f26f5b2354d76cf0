//! Engine control-connection layer.
//!
//! This module owns everything that touches the engine's line-oriented
//! control protocol: the [`ControlLink`] capability surface, its TCP
//! implementation, the value grammar, and the one-shot startup
//! discovery of classifier metadata.

mod discovery;
mod link;
mod value;

pub use discovery::{discover_angles, AnglesRange};
pub use link::{ControlLink, TcpEngineLink};
pub use value::Value;
