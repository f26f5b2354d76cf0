//! Startup discovery of classifier metadata.
//!
//! Runs once before any session exists, over a short-lived connection
//! that is dropped on every exit path. A missing classification plug-in
//! aborts process bootstrap.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use super::link::{ControlLink, TcpEngineLink};
use super::value::Value;
use crate::error::BridgeError;
use crate::Result;

/// Numeric range of the classifier's angle grid, handed to clients as
/// initial metadata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnglesRange {
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl AnglesRange {
    /// Compute the range of a non-empty angle vector.
    fn from_angles(angles: &[f64]) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &angle in angles {
            min = min.min(angle);
            max = max.max(angle);
        }
        Self {
            min,
            max,
            count: angles.len(),
        }
    }
}

/// Resolve the classification plug-in by id and read its angle grid.
///
/// Fails with [`BridgeError::NotFound`] if no instance matches the id;
/// the caller is expected to treat that as fatal.
pub async fn discover_angles(
    host: &str,
    port: u16,
    timeout: Option<Duration>,
    classification_id: &str,
) -> Result<AnglesRange> {
    let mut link = TcpEngineLink::connect(host, port, timeout).await?;

    let paths = link.find(classification_id).await?;
    let base = paths
        .first()
        .ok_or_else(|| BridgeError::NotFound(classification_id.to_string()))?;
    debug!(path = %base, "resolved classification plug-in");

    let value = link.get(&format!("{base}.angles")).await?;
    match value.as_vector() {
        Some(angles) if !angles.is_empty() => Ok(AnglesRange::from_angles(angles)),
        _ => Err(BridgeError::InvalidValue(format!(
            "expected a non-empty angle vector at \"{base}.angles\", got {value}"
        ))),
    }
}
