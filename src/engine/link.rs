//! Control-connection client for the engine's variable tree.
//!
//! The engine exposes a line-oriented request/response protocol: one
//! request line out, zero or more payload lines back, closed by a
//! status line. Only this module knows that grammar; everything above
//! it talks to the [`ControlLink`] trait.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use super::value::Value;
use crate::error::BridgeError;
use crate::Result;

/// Status line closing a successful response.
const STATUS_SUCCESS: &str = "(engine:success)";
/// Status line closing a rejected request.
const STATUS_FAILURE: &str = "(engine:failure)";

/// Capability surface of the engine's control connection.
///
/// Every method can fail with [`BridgeError::Timeout`] or
/// [`BridgeError::ConnectionBroken`]; callers decide whether that is
/// fatal or triggers a [`reopen`](ControlLink::reopen).
#[allow(async_fn_in_trait)]
pub trait ControlLink {
    /// Resolve a plug-in instance id to its full paths. May be empty.
    async fn find(&mut self, id: &str) -> Result<Vec<String>>;

    /// Read the value of a variable.
    async fn get(&mut self, path: &str) -> Result<Value>;

    /// Write the value of a variable.
    async fn set(&mut self, path: &str, value: &Value) -> Result<()>;

    /// Drop any existing transport and establish a fresh one.
    ///
    /// Safe to call from any failure state and repeatedly in a row.
    async fn reopen(&mut self) -> Result<()>;
}

#[derive(Debug)]
struct Conn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// TCP implementation of [`ControlLink`].
///
/// Holds at most one underlying connection at a time. A `None` timeout
/// means no bound is enforced on individual operations.
#[derive(Debug)]
pub struct TcpEngineLink {
    host: String,
    port: u16,
    timeout: Option<Duration>,
    conn: Option<Conn>,
}

impl TcpEngineLink {
    /// Connect to the engine's control port.
    pub async fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<Self> {
        let conn = dial(host, port, timeout).await?;
        Ok(Self {
            host: host.to_string(),
            port,
            timeout,
            conn: Some(conn),
        })
    }

    /// Whether a transport connection is currently established.
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// One request/response exchange: send a line, collect payload
    /// lines until the status line.
    ///
    /// A timed-out exchange leaves the stream dirty: a late reply may
    /// still arrive and must not be read as the answer to a later
    /// request. Callers reopen before reusing the link after a timeout.
    async fn exchange(&mut self, request: &str) -> Result<Vec<String>> {
        let limit = self.timeout;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| BridgeError::ConnectionBroken("connection is closed".into()))?;

        debug!(request, "engine request");
        let line = format!("{request}\n");
        bounded(limit, conn.writer.write_all(line.as_bytes())).await?;

        let mut payload = Vec::new();
        loop {
            let mut line = String::new();
            let n = bounded(limit, conn.reader.read_line(&mut line)).await?;
            if n == 0 {
                return Err(BridgeError::ConnectionBroken(
                    "engine closed the connection".into(),
                ));
            }
            match line.trim_end() {
                STATUS_SUCCESS => return Ok(payload),
                STATUS_FAILURE => {
                    return Err(BridgeError::InvalidValue(format!(
                        "engine rejected request \"{request}\""
                    )))
                }
                other => payload.push(other.to_string()),
            }
        }
    }
}

impl ControlLink for TcpEngineLink {
    async fn find(&mut self, id: &str) -> Result<Vec<String>> {
        self.exchange(&format!("?lid {id}")).await
    }

    async fn get(&mut self, path: &str) -> Result<Value> {
        let payload = self.exchange(&format!("{path}?val")).await?;
        match payload.as_slice() {
            [line] => Ok(Value::parse(line)),
            other => Err(BridgeError::InvalidValue(format!(
                "expected one value line for \"{path}\", got {}",
                other.len()
            ))),
        }
    }

    async fn set(&mut self, path: &str, value: &Value) -> Result<()> {
        self.exchange(&format!("{path} = {value}")).await?;
        Ok(())
    }

    async fn reopen(&mut self) -> Result<()> {
        // Stale handle goes first so at most one connection is ever open.
        self.conn = None;
        self.conn = Some(dial(&self.host, self.port, self.timeout).await?);
        Ok(())
    }
}

async fn dial(host: &str, port: u16, timeout: Option<Duration>) -> Result<Conn> {
    let stream = bounded(timeout, TcpStream::connect((host, port))).await?;
    let (read, write) = stream.into_split();
    Ok(Conn {
        reader: BufReader::new(read),
        writer: write,
    })
}

/// Run one transport operation under the configured time bound.
async fn bounded<T, F>(limit: Option<Duration>, op: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    let outcome = match limit {
        Some(limit) => tokio::time::timeout(limit, op)
            .await
            .map_err(|_| BridgeError::Timeout)?,
        None => op.await,
    };
    outcome.map_err(|e| BridgeError::ConnectionBroken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    const TIMEOUT: Option<Duration> = Some(Duration::from_millis(500));

    async fn listen() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    /// Read one request line and write the given raw response.
    async fn answer(stream: TcpStream, response: &str) -> String {
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);
        let mut request = String::new();
        reader.read_line(&mut request).await.unwrap();
        write.write_all(response.as_bytes()).await.unwrap();
        request.trim_end().to_string()
    }

    #[tokio::test]
    async fn test_get_scalar() {
        let (listener, addr) = listen().await;
        let engine = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            answer(stream, "42\n(engine:success)\n").await
        });

        let mut link = TcpEngineLink::connect("127.0.0.1", addr.port(), TIMEOUT)
            .await
            .unwrap();
        let value = link.get("mha.chain.wndlen").await.unwrap();
        assert_eq!(value, Value::Float(42.0));
        assert_eq!(engine.await.unwrap(), "mha.chain.wndlen?val");
    }

    #[tokio::test]
    async fn test_get_vector() {
        let (listener, addr) = listen().await;
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            answer(stream, "[0.1 0.9 0.3]\n(engine:success)\n").await;
        });

        let mut link = TcpEngineLink::connect("127.0.0.1", addr.port(), TIMEOUT)
            .await
            .unwrap();
        let value = link.get("mha.mon.pool").await.unwrap();
        assert_eq!(value, Value::Vector(vec![0.1, 0.9, 0.3]));
    }

    #[tokio::test]
    async fn test_set_formats_request_line() {
        let (listener, addr) = listen().await;
        let engine = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            answer(stream, "(engine:success)\n").await
        });

        let mut link = TcpEngineLink::connect("127.0.0.1", addr.port(), TIMEOUT)
            .await
            .unwrap();
        link.set("mha.chain.pool.alpha", &Value::Float(0.9))
            .await
            .unwrap();
        assert_eq!(engine.await.unwrap(), "mha.chain.pool.alpha = 0.9");
    }

    #[tokio::test]
    async fn test_find_collects_paths() {
        let (listener, addr) = listen().await;
        let engine = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            answer(
                stream,
                "mha.chain.pool\nmha.other.pool\n(engine:success)\n",
            )
            .await
        });

        let mut link = TcpEngineLink::connect("127.0.0.1", addr.port(), TIMEOUT)
            .await
            .unwrap();
        let paths = link.find("pool").await.unwrap();
        assert_eq!(paths, vec!["mha.chain.pool", "mha.other.pool"]);
        assert_eq!(engine.await.unwrap(), "?lid pool");
    }

    #[tokio::test]
    async fn test_find_may_be_empty() {
        let (listener, addr) = listen().await;
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            answer(stream, "(engine:success)\n").await;
        });

        let mut link = TcpEngineLink::connect("127.0.0.1", addr.port(), TIMEOUT)
            .await
            .unwrap();
        let paths = link.find("missing").await.unwrap();
        assert!(paths.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_request_is_invalid_value() {
        let (listener, addr) = listen().await;
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            answer(stream, "(engine:failure)\n").await;
        });

        let mut link = TcpEngineLink::connect("127.0.0.1", addr.port(), TIMEOUT)
            .await
            .unwrap();
        let err = link.get("mha.nonsense").await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidValue(_)));
    }

    #[tokio::test]
    async fn test_silent_engine_times_out() {
        let (listener, addr) = listen().await;
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            // Read the request, then never reply.
            let (read, _write) = stream.into_split();
            let mut reader = BufReader::new(read);
            let mut request = String::new();
            reader.read_line(&mut request).await.unwrap();
            std::future::pending::<()>().await;
        });

        let mut link =
            TcpEngineLink::connect("127.0.0.1", addr.port(), Some(Duration::from_millis(50)))
                .await
                .unwrap();
        let err = link.get("mha.slow").await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout));
    }

    #[tokio::test]
    async fn test_eof_mid_response_is_connection_broken() {
        let (listener, addr) = listen().await;
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            // Close without a status line.
            answer(stream, "0.5\n").await;
        });

        let mut link = TcpEngineLink::connect("127.0.0.1", addr.port(), TIMEOUT)
            .await
            .unwrap();
        let err = link.get("mha.gone").await.unwrap_err();
        assert!(matches!(err, BridgeError::ConnectionBroken(_)));
    }

    #[tokio::test]
    async fn test_reopen_twice_is_idempotent() {
        let (listener, addr) = listen().await;
        tokio::spawn(async move {
            // First connection is abandoned by the reopens; the last one
            // gets a real exchange.
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                tokio::spawn(answer(stream, "7\n(engine:success)\n"));
            }
        });

        let mut link = TcpEngineLink::connect("127.0.0.1", addr.port(), TIMEOUT)
            .await
            .unwrap();
        link.reopen().await.unwrap();
        link.reopen().await.unwrap();
        assert!(link.is_open());

        let value = link.get("mha.x").await.unwrap();
        assert_eq!(value, Value::Float(7.0));
    }
}
