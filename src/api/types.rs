//! Client-facing message types.

use serde::Serialize;

use crate::engine::{AnglesRange, Value};

/// Reply pushed to the client for a pool read. The only outbound
/// message shape besides WebSocket control frames.
#[derive(Debug, Clone, Serialize)]
pub struct DataReply {
    /// The value at the pool path: a scalar or a per-angle array.
    pub data: Value,
}

/// Payload for `GET /api/info`.
#[derive(Debug, Clone, Serialize)]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    /// Smallest angle in the classifier's grid, in degrees.
    pub angles_min: f64,
    /// Largest angle in the classifier's grid, in degrees.
    pub angles_max: f64,
    /// Number of grid points.
    pub angles_count: usize,
}

impl InfoResponse {
    pub fn new(angles: AnglesRange) -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            angles_min: angles.min,
            angles_max: angles.max,
            angles_count: angles.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_reply_shape() {
        let reply = DataReply {
            data: Value::Vector(vec![0.25, 0.5]),
        };
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(json, r#"{"data":[0.25,0.5]}"#);
    }

    #[test]
    fn test_data_reply_scalar() {
        let reply = DataReply {
            data: Value::Float(0.5),
        };
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(json, r#"{"data":0.5}"#);
    }

    #[test]
    fn test_info_response() {
        let info = InfoResponse::new(AnglesRange {
            min: -90.0,
            max: 90.0,
            count: 37,
        });
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"angles_min\":-90.0"));
        assert!(json.contains("\"angles_count\":37"));
        assert!(json.contains(env!("CARGO_PKG_VERSION")));
    }
}
